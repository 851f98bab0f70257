// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codec unit tests.

use super::*;
use crate::config::markers;
use crate::descriptor::{field_id, type_id, ClassCatalog};
use crate::error::CodecError;
use crate::model::{
    deep_eq, ClassDef, CustomSerialization, Externalizable, FieldType, HeapObject, Instance,
    ListKind, Value,
};
use std::sync::Arc;

fn env() -> CodecEnv {
    CodecEnv::new(
        Arc::new(ClassDescriptorRegistry::new()),
        Arc::new(FieldsIndexRegistry::new()),
        Arc::new(JsonFallback),
        64,
    )
}

fn encode(env: &CodecEnv, value: &Value) -> (Vec<u8>, EncodeStats) {
    let mut out = DataOutput::default();
    let mut handles = HandleTable::new();
    let stats = env
        .encode(value, &mut out, &mut handles)
        .expect("encode should succeed");
    (out.as_slice().to_vec(), stats)
}

fn decode(env: &CodecEnv, bytes: &[u8], loader: &dyn ClassLoader) -> CodecResult<Value> {
    let mut replay = HandleReplay::new();
    env.decode(DataInput::new(bytes), &mut replay, loader)
}

fn instance(value: &Value) -> Instance {
    value
        .as_object()
        .and_then(|o| o.read().as_instance().cloned())
        .expect("instance value")
}

struct Celsius;

impl CustomSerialization for Celsius {
    fn write_object(&self, instance: &Instance, out: &mut ObjectWriter<'_>) -> CodecResult<()> {
        out.default_write_object(instance)?;
        out.write_int(0x5EED);
        Ok(())
    }

    fn read_object(
        &self,
        instance: &mut Instance,
        input: &mut ObjectReader<'_>,
    ) -> CodecResult<()> {
        input.default_read_object(instance)?;
        assert_eq!(input.read_int()?, 0x5EED);
        Ok(())
    }
}

struct StagedFields;

impl CustomSerialization for StagedFields {
    fn write_object(&self, instance: &Instance, out: &mut ObjectWriter<'_>) -> CodecResult<()> {
        let doubled = instance.get("count").and_then(Value::as_int).unwrap_or(0) * 2;
        out.put_fields()?.put("count", doubled)?;
        out.write_fields()
    }

    fn read_object(
        &self,
        instance: &mut Instance,
        input: &mut ObjectReader<'_>,
    ) -> CodecResult<()> {
        let fields = input.read_fields()?;
        instance.set("count", fields.get_or("count", Value::Int(-1)))
    }
}

struct Money;

impl Externalizable for Money {
    fn write_external(&self, instance: &Instance, out: &mut ObjectWriter<'_>) -> CodecResult<()> {
        out.write_long(instance.get("cents").and_then(Value::as_long).unwrap_or(0));
        out.write_utf(instance.get("currency").and_then(Value::as_str).unwrap_or(""))
    }

    fn read_external(
        &self,
        instance: &mut Instance,
        input: &mut ObjectReader<'_>,
    ) -> CodecResult<()> {
        instance.set("cents", Value::Long(input.read_long()?))?;
        instance.set("currency", Value::from(input.read_utf()?))
    }
}

struct MisusedDefaults;

impl Externalizable for MisusedDefaults {
    fn write_external(&self, instance: &Instance, out: &mut ObjectWriter<'_>) -> CodecResult<()> {
        out.default_write_object(instance)
    }

    fn read_external(&self, _: &mut Instance, input: &mut ObjectReader<'_>) -> CodecResult<()> {
        input.read_fields().map(|_| ())
    }
}

#[test]
fn test_primitive_and_string_values() {
    let env = env();
    let catalog = ClassCatalog::new("test");
    for value in [
        Value::Int(-7),
        Value::Long(i64::MAX),
        Value::Double(2.5),
        Value::Char(0x263A),
        Value::Bool(true),
        Value::from("grid"),
        Value::Null,
    ] {
        let (bytes, stats) = encode(&env, &value);
        assert_eq!(stats.objects, 0);
        let back = decode(&env, &bytes, &catalog).expect("decode");
        assert_eq!(back, value);
    }
}

#[test]
fn test_shared_reference_written_once() {
    let env = env();
    let catalog = ClassCatalog::new("test");
    let shared = Value::object(HeapObject::Date(1_700_000_000_000));
    let list = Value::object(HeapObject::list(
        ListKind::ArrayList,
        vec![shared.clone(), shared.clone()],
    ));

    let (bytes, stats) = encode(&env, &list);
    assert_eq!(stats.objects, 2, "list and date");
    assert_eq!(stats.handle_refs, 1);

    let back = decode(&env, &bytes, &catalog).expect("decode");
    let items = match &*back.as_object().expect("list").read() {
        HeapObject::List { items, .. } => items.clone(),
        other => panic!("unexpected {:?}", other),
    };
    assert!(items[0].same(&items[1]));
    assert!(deep_eq(&back, &list));
}

#[test]
fn test_strings_are_not_deduplicated() {
    let env = env();
    let s = Value::from("repeat");
    let list = Value::object(HeapObject::list(ListKind::ArrayList, vec![s.clone(), s]));
    let (_, stats) = encode(&env, &list);
    assert_eq!(stats.handle_refs, 0);
}

#[test]
fn test_custom_methods_roundtrip() {
    let env = env();
    let class = ClassDef::builder("Temperature")
        .field("celsius", FieldType::Double)
        .field("label", FieldType::Other)
        .custom(Arc::new(Celsius))
        .build();
    let catalog = ClassCatalog::new("test")
        .with_classes([Arc::clone(&class)])
        .expect("register");

    let value = Value::object(HeapObject::Instance(
        Instance::new(&class)
            .with("celsius", 21.5)
            .and_then(|i| i.with("label", "lab"))
            .expect("fields"),
    ));
    let (bytes, _) = encode(&env, &value);
    let back = decode(&env, &bytes, &catalog).expect("decode");
    assert!(deep_eq(&back, &value));
}

#[test]
fn test_put_fields_and_read_fields() {
    let env = env();
    let class = ClassDef::builder("Counter")
        .field("count", FieldType::Int)
        .custom(Arc::new(StagedFields))
        .build();
    let catalog = ClassCatalog::new("test")
        .with_classes([Arc::clone(&class)])
        .expect("register");

    let value = Value::object(HeapObject::Instance(
        Instance::new(&class).with("count", 21).expect("count"),
    ));
    let (bytes, _) = encode(&env, &value);
    let back = decode(&env, &bytes, &catalog).expect("decode");
    assert_eq!(instance(&back).get("count"), Some(&Value::Int(42)));
}

#[test]
fn test_indexed_custom_routine_carries_footer() {
    let env = env();
    let class = ClassDef::builder("Counter")
        .field("count", FieldType::Int)
        .custom(Arc::new(StagedFields))
        .build();
    let desc = env.registry.descriptor_for_class(&class).expect("descriptor");
    assert!(env.index.enable(&desc));
    let catalog = ClassCatalog::new("test")
        .with_classes([Arc::clone(&class)])
        .expect("register");

    let value = Value::object(HeapObject::Instance(
        Instance::new(&class).with("count", 4).expect("count"),
    ));
    let (bytes, stats) = encode(&env, &value);
    assert_eq!(stats.footers, 1);

    let view = footer::FooterView::parse(&bytes, 0, bytes.len())
        .expect("valid footer")
        .expect("footer present");
    assert_eq!(view.obj_end(), bytes.len());
    let entry = view.find(field_id("count")).expect("count entry");
    assert_eq!(entry.entry.field_type, FieldType::Int);

    let back = decode(&env, &bytes, &catalog).expect("decode");
    assert_eq!(instance(&back).get("count"), Some(&Value::Int(8)));
}

#[test]
fn test_indexed_custom_routine_rejects_extra_data() {
    let env = env();
    let class = ClassDef::builder("Temperature")
        .field("celsius", FieldType::Double)
        .field("label", FieldType::Other)
        .custom(Arc::new(Celsius))
        .build();
    let desc = env.registry.descriptor_for_class(&class).expect("descriptor");
    assert!(env.index.enable(&desc));

    let value = Value::object(HeapObject::Instance(
        Instance::new(&class).with("celsius", 3.0).expect("celsius"),
    ));
    let mut out = DataOutput::default();
    let mut handles = HandleTable::new();
    let err = env.encode(&value, &mut out, &mut handles).unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedType { .. }), "{:?}", err);
}

#[test]
fn test_externalizable_roundtrip() {
    let env = env();
    let class = ClassDef::builder("Money")
        .field("cents", FieldType::Long)
        .field("currency", FieldType::Other)
        .externalizable(Arc::new(Money))
        .build();
    let catalog = ClassCatalog::new("test")
        .with_classes([Arc::clone(&class)])
        .expect("register");

    let value = Value::object(HeapObject::Instance(
        Instance::new(&class)
            .with("cents", 1999i64)
            .and_then(|i| i.with("currency", "EUR"))
            .expect("fields"),
    ));
    let (bytes, _) = encode(&env, &value);
    let back = decode(&env, &bytes, &catalog).expect("decode");
    assert!(deep_eq(&back, &value));
}

#[test]
fn test_default_write_outside_custom_routine_is_not_active() {
    let env = env();
    let class = ClassDef::builder("Broken")
        .field("x", FieldType::Int)
        .externalizable(Arc::new(MisusedDefaults))
        .build();
    let value = Value::object(HeapObject::Instance(Instance::new(&class)));

    let mut out = DataOutput::default();
    let mut handles = HandleTable::new();
    let err = env.encode(&value, &mut out, &mut handles).unwrap_err();
    assert!(matches!(err, CodecError::NotActive(_)), "{:?}", err);
}

#[test]
fn test_excluded_and_replaced_to_null() {
    let env = env();
    let secret = ClassDef::builder("Secret").excluded().build();
    let lazy = ClassDef::builder("LazyValue")
        .replace_with(|_| Value::Null)
        .build();

    for class in [secret, lazy] {
        let value = Value::object(HeapObject::Instance(Instance::new(&class)));
        let (bytes, _) = encode(&env, &value);
        assert_eq!(bytes, vec![markers::NULL]);
    }
}

#[test]
fn test_replace_resolves_substitute_descriptor() {
    let env = env();
    let proxy_target = ClassDef::builder("Resolved")
        .field("id", FieldType::Int)
        .build();
    let target = Arc::clone(&proxy_target);
    let proxy = ClassDef::builder("Proxy")
        .replace_with(move |_| {
            Value::object(HeapObject::Instance(
                Instance::new(&target).with("id", 3).unwrap_or_else(|_| Instance::new(&target)),
            ))
        })
        .build();
    let catalog = ClassCatalog::new("test")
        .with_classes([Arc::clone(&proxy_target)])
        .expect("register");

    let value = Value::object(HeapObject::Instance(Instance::new(&proxy)));
    let (bytes, _) = encode(&env, &value);
    assert_eq!(&bytes[1..5], &type_id("Resolved").to_le_bytes());
    let back = decode(&env, &bytes, &catalog).expect("decode");
    assert_eq!(instance(&back).get("id"), Some(&Value::Int(3)));
}

#[test]
fn test_unknown_class_is_unresolved() {
    let env = env();
    let class = ClassDef::builder("Orphan").build();
    let value = Value::object(HeapObject::Instance(Instance::new(&class)));
    let (bytes, _) = encode(&env, &value);

    let err = decode(&env, &bytes, &ClassCatalog::new("empty")).unwrap_err();
    assert!(matches!(err, CodecError::UnresolvedClass { type_id: id } if id == type_id("Orphan")));
}

#[test]
fn test_throwable_goes_through_fallback() {
    let env = env();
    let class = ClassDef::builder("TimeoutError")
        .field("message", FieldType::Other)
        .throwable()
        .build();
    let catalog = ClassCatalog::new("test")
        .with_classes([Arc::clone(&class)])
        .expect("register");
    let value = Value::object(HeapObject::Instance(
        Instance::new(&class).with("message", "late").expect("message"),
    ));

    let (bytes, stats) = encode(&env, &value);
    assert_eq!(bytes[0], markers::FALLBACK);
    assert_eq!(stats.objects, 0);
    let back = decode(&env, &bytes, &catalog).expect("decode");
    assert!(deep_eq(&back, &value));
}

#[test]
fn test_depth_limit() {
    let env = CodecEnv::new(
        Arc::new(ClassDescriptorRegistry::new()),
        Arc::new(FieldsIndexRegistry::new()),
        Arc::new(JsonFallback),
        4,
    );
    let mut value = Value::Null;
    for _ in 0..8 {
        value = Value::object(HeapObject::list(ListKind::LinkedList, vec![value]));
    }
    let mut out = DataOutput::default();
    let mut handles = HandleTable::new();
    let err = env.encode(&value, &mut out, &mut handles).unwrap_err();
    assert!(matches!(err, CodecError::DepthExceeded(4)));
}

#[test]
fn test_unknown_marker_and_dangling_handle() {
    let env = env();
    let catalog = ClassCatalog::new("test");
    let err = decode(&env, &[0x7E], &catalog).unwrap_err();
    assert!(matches!(err, CodecError::UnknownMarker { marker: 0x7E, offset: 0 }));

    let mut bytes = vec![markers::HANDLE];
    bytes.extend_from_slice(&4u32.to_le_bytes());
    let err = decode(&env, &bytes, &catalog).unwrap_err();
    assert!(matches!(err, CodecError::DanglingHandle { offset: 0, .. }));
}

#[test]
fn test_random_int_arrays() {
    let env = env();
    let catalog = ClassCatalog::new("test");
    let mut rng = fastrand::Rng::with_seed(0x6D61_7273);
    for _ in 0..32 {
        let len = rng.usize(0..64);
        let data: Vec<i32> = (0..len).map(|_| rng.i32(..)).collect();
        let value = Value::object(HeapObject::PrimitiveArray(
            crate::model::PrimitiveArray::Int(data),
        ));
        let (bytes, _) = encode(&env, &value);
        let back = decode(&env, &bytes, &catalog).expect("decode");
        assert!(deep_eq(&back, &value));
    }
}
