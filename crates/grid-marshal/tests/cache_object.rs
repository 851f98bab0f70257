// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Cache-object layer driven through a real marshaller.
//
// Exercises copy-on-get, detach from a shared buffer, key semantics,
// query-result unwrapping and interceptor isolation end to end.

#![allow(clippy::missing_panics_doc)]

use grid_marshal::cache::{CacheEntry, HookResult, TYPE_OPTIMIZED};
use grid_marshal::descriptor::{ClassCatalog, ClassLoader};
use grid_marshal::model::{deep_eq, ClassDef, FieldType, HeapObject, Instance, ListKind, Value};
use grid_marshal::{
    CacheInterceptor, CacheObjectContext, CacheObjectProcessor, CacheOptimizedObject,
    GridMarshaller, KernalConfig, KeyCacheOptimizedObject, OptimizedObjectProcessor, QueryItem,
};
use std::collections::HashMap;
use std::sync::Arc;

struct Fixture {
    address: Arc<ClassDef>,
    person: Arc<ClassDef>,
    ctx: CacheObjectContext,
}

fn fixture(copy_on_get: bool, store_value: bool) -> Fixture {
    let address = ClassDef::builder("Address")
        .field("city", FieldType::Other)
        .field("zip", FieldType::Int)
        .build();
    let person = ClassDef::builder("Person")
        .field("age", FieldType::Int)
        .field("home", FieldType::Other)
        .field("work", FieldType::Other)
        .build();
    let loader: Arc<dyn ClassLoader> = Arc::new(
        ClassCatalog::new("app")
            .with_classes([Arc::clone(&address), Arc::clone(&person)])
            .expect("catalog"),
    );

    let marshaller = GridMarshaller::builder()
        .fields_indexing(true)
        .index_class(Arc::clone(&address))
        .index_class(Arc::clone(&person))
        .build()
        .expect("marshaller");
    let processor = Arc::new(OptimizedObjectProcessor::new(Arc::new(marshaller)));
    let ctx = CacheObjectContext::builder(KernalConfig::new(loader), processor)
        .copy_on_get(copy_on_get)
        .store_value(store_value)
        .build();
    Fixture {
        address,
        person,
        ctx,
    }
}

impl Fixture {
    fn address(&self, city: &str, zip: i32) -> Value {
        Value::object(HeapObject::Instance(
            Instance::new(&self.address)
                .with("city", city)
                .and_then(|i| i.with("zip", zip))
                .expect("address"),
        ))
    }

    /// Person living and working at the same address.
    fn person(&self, age: i32, addr: &Value) -> Value {
        Value::object(HeapObject::Instance(
            Instance::new(&self.person)
                .with("age", age)
                .and_then(|i| i.with("home", addr.clone()))
                .and_then(|i| i.with("work", addr.clone()))
                .expect("person"),
        ))
    }

    fn encode(&self, value: &Value) -> Vec<u8> {
        self.ctx
            .processor()
            .marshal(&self.ctx, value)
            .expect("marshal")
    }
}

#[test]
fn test_copy_on_get_hands_out_independent_instances() {
    let fx = fixture(true, true);
    let addr = fx.address("Lyon", 69001);
    let obj = CacheOptimizedObject::from_bytes(fx.encode(&fx.person(41, &addr))).expect("bytes");

    let a = obj.value(&fx.ctx, true).expect("first get");
    let b = obj.value(&fx.ctx, true).expect("second get");
    assert!(deep_eq(&a, &b));
    assert!(!a.same(&b), "copy-on-get must not alias the stored value");

    let shared = obj.value(&fx.ctx, false).expect("no-copy get");
    let again = obj.value(&fx.ctx, false).expect("no-copy get");
    assert!(shared.same(&again), "stored value is returned as is");
}

#[test]
fn test_without_copy_on_get_value_is_shared() {
    let fx = fixture(false, true);
    let addr = fx.address("Nantes", 44000);
    let obj = CacheOptimizedObject::from_value(fx.person(30, &addr));

    let a = obj.value(&fx.ctx, true).expect("get");
    let b = obj.value(&fx.ctx, true).expect("get");
    assert!(a.same(&b));
}

#[test]
fn test_field_reads_and_detach() {
    let fx = fixture(true, true);
    let addr = fx.address("Brest", 29200);
    let bytes = fx.encode(&fx.person(52, &addr));
    let obj = Arc::new(CacheOptimizedObject::from_bytes(bytes).expect("bytes"));
    assert!(obj.is_detached());
    assert!(Arc::ptr_eq(&obj, &obj.detach()));

    assert!(obj.has_field(&fx.ctx, "age").expect("has age"));
    assert!(!obj.has_field(&fx.ctx, "salary").expect("has salary"));
    match obj.field(&fx.ctx, "age").expect("age") {
        Some(QueryItem::Value(Value::Int(52))) => {}
        other => panic!("unexpected age {:?}", other),
    }

    // Second reference to the address is a handle to an indexed object:
    // it comes back as a wrapper over a window of the parent's buffer.
    let work = match obj.field(&fx.ctx, "work").expect("work") {
        Some(QueryItem::Cached(work)) => work,
        other => panic!("expected a cached wrapper, got {:?}", other),
    };
    assert!(!work.is_detached());
    assert!(!work.has_value());

    let detached = work.detach();
    assert!(detached.is_detached());
    assert!(Arc::ptr_eq(&detached, &detached.detach()));
    let stored = work.prepare_for_cache(&fx.ctx);
    assert!(stored.is_detached());

    let city = detached.field(&fx.ctx, "city").expect("city");
    assert_eq!(
        city.as_ref().and_then(QueryItem::as_value),
        Some(&Value::from("Brest"))
    );
    let decoded = detached.value(&fx.ctx, false).expect("address value");
    assert!(deep_eq(&decoded, &addr));
}

#[test]
fn test_store_value_off_decodes_on_every_get() {
    let fx = fixture(false, false);
    let addr = fx.address("Metz", 57000);
    let obj = CacheOptimizedObject::from_bytes(fx.encode(&addr)).expect("bytes");
    let loader = Arc::clone(fx.ctx.kernal_config().class_loader());

    obj.finish_unmarshal(&fx.ctx, loader.as_ref()).expect("finish");
    assert!(!obj.has_value());
    let a = obj.value(&fx.ctx, false).expect("get");
    let b = obj.value(&fx.ctx, false).expect("get");
    assert!(deep_eq(&a, &b));
    assert!(!a.same(&b));
    assert!(!obj.has_value());
    assert_eq!(obj.cache_object_type(), TYPE_OPTIMIZED);
}

#[test]
fn test_keys_compare_by_value() {
    let fx = fixture(true, true);
    let k1 = Arc::new(KeyCacheOptimizedObject::new(fx.address("Pau", 64000)).expect("key"));
    let k2 = Arc::new(KeyCacheOptimizedObject::new(fx.address("Pau", 64000)).expect("key"));
    let k3 = Arc::new(KeyCacheOptimizedObject::new(fx.address("Pau", 64001)).expect("key"));

    assert!(Arc::ptr_eq(&k1, &k1.value(&fx.ctx, true)));
    assert!(Arc::ptr_eq(&k1, &k1.prepare_for_cache(&fx.ctx)));
    assert_eq!(*k1, *k2);
    assert_ne!(*k1, *k3);

    let mut owners: HashMap<Arc<KeyCacheOptimizedObject>, &str> = HashMap::new();
    owners.insert(Arc::clone(&k1), "first");
    owners.insert(Arc::clone(&k3), "other");
    assert_eq!(owners.get(&k2), Some(&"first"));

    let encoded = k1.value_bytes(&fx.ctx).expect("key bytes");
    assert!(!encoded.is_empty());
    assert!(!k1.internal());
}

#[test]
fn test_unwrap_query_results() {
    let fx = fixture(true, true);
    let addr = fx.address("Caen", 14000);
    let cached = Arc::new(
        CacheOptimizedObject::from_bytes(fx.encode(&addr)).expect("bytes"),
    );
    let key = Arc::new(KeyCacheOptimizedObject::new(Value::Long(7)).expect("key"));

    let item = QueryItem::Map(vec![(
        QueryItem::Key(key),
        QueryItem::Collection(vec![
            QueryItem::Cached(Arc::clone(&cached)),
            QueryItem::Value(Value::Int(1)),
        ]),
    )]);
    let unwrapped = fx.ctx.unwrap_if_needed(item).expect("unwrap");
    let entries = match unwrapped {
        QueryItem::Map(entries) => entries,
        other => panic!("expected map, got {:?}", other),
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0.as_value(), Some(&Value::Long(7)));
    match &entries[0].1 {
        QueryItem::List(items) => {
            assert!(items.iter().all(|i| !i.is_wrapped_or_collection()));
            let first = items[0].as_value().expect("value");
            assert!(deep_eq(first, &addr));
        }
        other => panic!("collections unwrap into lists, got {:?}", other),
    }
}

struct Auditing;

impl CacheInterceptor for Auditing {
    fn on_get(&self, _key: &Value, value: Option<Value>) -> HookResult<Option<Value>> {
        match value {
            Some(Value::Int(_)) => Err("audit backend unavailable".into()),
            other => Ok(other),
        }
    }

    fn on_before_put(&self, entry: CacheEntry<'_>, new_value: Value) -> HookResult<Option<Value>> {
        if entry.key.as_str() == Some("read-only") {
            return Ok(None);
        }
        Ok(Some(new_value))
    }

    fn on_after_put(&self, _entry: CacheEntry<'_>) -> HookResult<()> {
        panic!("after-put hook exploded");
    }
}

#[test]
fn test_interceptor_failures_do_not_escape() {
    let address = ClassDef::builder("Address").field("zip", FieldType::Int).build();
    let loader: Arc<dyn ClassLoader> = Arc::new(
        ClassCatalog::new("app")
            .with_classes([address])
            .expect("catalog"),
    );
    let processor = Arc::new(OptimizedObjectProcessor::new(Arc::new(GridMarshaller::new())));
    let ctx = CacheObjectContext::builder(KernalConfig::new(loader), processor)
        .interceptor(Arc::new(Auditing))
        .build();
    let guard = ctx.interceptor().expect("interceptor configured");

    let key = Value::from("k");
    assert_eq!(guard.on_get(&key, Some(Value::Int(3))), Some(Value::Int(3)));

    let read_only = Value::from("read-only");
    let entry = CacheEntry {
        key: &read_only,
        value: None,
    };
    assert_eq!(guard.on_before_put(entry, Value::Int(1)), None);

    let list = Value::object(HeapObject::list(ListKind::ArrayList, vec![Value::Int(1)]));
    let entry = CacheEntry {
        key: &key,
        value: Some(&list),
    };
    guard.on_after_put(entry);
    assert!(!guard.on_before_remove(entry).0);
}
