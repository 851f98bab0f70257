// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Whole-object fallback for throwable types.
//!
//! Throwables without an externalizable encoding bypass the field codec and
//! are handed to a [`FallbackMarshaller`]. The default, [`JsonFallback`],
//! writes the instance as a JSON document:
//!
//! ```text
//! {"message": "boom", "code": 7, "cause": {"@type": "IoError", "fields": {...}}}
//! ```
//!
//! Reference fields holding a narrow number keep its width through a tag:
//! `{"@prim": "int", "value": 5}`.

use crate::descriptor::ClassLoader;
use crate::error::{CodecError, CodecResult};
use crate::model::{ClassDef, FieldType, HeapObject, Instance, Value};
use serde_json::{Map, Number, Value as Json};
use std::sync::Arc;

const MAX_NESTING: usize = 64;
const TYPE_KEY: &str = "@type";
const FIELDS_KEY: &str = "fields";
const ENUM_KEY: &str = "@enum";
const ORDINAL_KEY: &str = "ordinal";
const PRIMITIVE_KEY: &str = "@prim";
const VALUE_KEY: &str = "value";

/// Opaque sub-marshaller used for throwable instances.
pub trait FallbackMarshaller: Send + Sync {
    fn marshal(&self, instance: &Instance) -> CodecResult<Vec<u8>>;

    fn unmarshal(
        &self,
        class: &Arc<ClassDef>,
        bytes: &[u8],
        loader: &dyn ClassLoader,
    ) -> CodecResult<Instance>;
}

/// JSON fallback via `serde_json`.
///
/// Supports primitives, strings, enum constants and nested instances (a
/// throwable's cause chain). Numbers in reference fields come back with the
/// variant they were written with.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFallback;

impl FallbackMarshaller for JsonFallback {
    fn marshal(&self, instance: &Instance) -> CodecResult<Vec<u8>> {
        let doc = instance_to_json(instance, 0)?;
        serde_json::to_vec(&Json::Object(doc)).map_err(|e| CodecError::Fallback(e.to_string()))
    }

    fn unmarshal(
        &self,
        class: &Arc<ClassDef>,
        bytes: &[u8],
        loader: &dyn ClassLoader,
    ) -> CodecResult<Instance> {
        let doc: Json =
            serde_json::from_slice(bytes).map_err(|e| CodecError::Fallback(e.to_string()))?;
        match doc {
            Json::Object(fields) => instance_from_json(class, &fields, loader, 0),
            other => Err(CodecError::Fallback(format!(
                "expected a JSON object for {}, got {}",
                class.name(),
                other
            ))),
        }
    }
}

fn instance_to_json(instance: &Instance, depth: usize) -> CodecResult<Map<String, Json>> {
    if depth > MAX_NESTING {
        return Err(CodecError::Fallback("cause chain too deep".into()));
    }
    let mut doc = Map::new();
    for (def, value) in instance.class().fields().iter().zip(instance.values()) {
        let json = match def.field_type {
            FieldType::Other => reference_to_json(value, depth)?,
            _ => value_to_json(value, depth)?,
        };
        doc.insert(def.name.to_string(), json);
    }
    Ok(doc)
}

/// Plain JSON numbers read back as `Long` or `Double`; other widths are tagged.
fn reference_to_json(value: &Value, depth: usize) -> CodecResult<Json> {
    let kind = match value {
        Value::Byte(_) => "byte",
        Value::Short(_) => "short",
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::Char(_) => "char",
        _ => return value_to_json(value, depth),
    };
    let mut doc = Map::new();
    doc.insert(PRIMITIVE_KEY.into(), Json::String(kind.into()));
    doc.insert(VALUE_KEY.into(), value_to_json(value, depth)?);
    Ok(Json::Object(doc))
}

fn value_to_json(value: &Value, depth: usize) -> CodecResult<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Byte(v) => Json::from(*v),
        Value::Short(v) => Json::from(*v),
        Value::Int(v) => Json::from(*v),
        Value::Long(v) => Json::from(*v),
        Value::Char(v) => Json::from(*v),
        Value::Bool(v) => Json::Bool(*v),
        Value::Float(v) => float_json(f64::from(*v))?,
        Value::Double(v) => float_json(*v)?,
        Value::Str(s) => Json::String(s.to_string()),
        Value::Enum { class, ordinal } => {
            let mut doc = Map::new();
            doc.insert(ENUM_KEY.into(), Json::String(class.name().into()));
            doc.insert(ORDINAL_KEY.into(), Json::from(*ordinal));
            Json::Object(doc)
        }
        Value::Object(obj) => {
            let nested = match &*obj.read() {
                HeapObject::Instance(inst) => inst.clone(),
                other => {
                    return Err(CodecError::Fallback(format!(
                        "{} cannot be written by the fallback marshaller",
                        other.kind_name()
                    )))
                }
            };
            let mut doc = Map::new();
            doc.insert(TYPE_KEY.into(), Json::String(nested.class().name().into()));
            doc.insert(
                FIELDS_KEY.into(),
                Json::Object(instance_to_json(&nested, depth + 1)?),
            );
            Json::Object(doc)
        }
        Value::Class(class) => {
            return Err(CodecError::Fallback(format!(
                "class literal {} cannot be written by the fallback marshaller",
                class.name()
            )))
        }
    })
}

fn float_json(v: f64) -> CodecResult<Json> {
    Number::from_f64(v)
        .map(Json::Number)
        .ok_or_else(|| CodecError::Fallback(format!("non-finite float {}", v)))
}

fn instance_from_json(
    class: &Arc<ClassDef>,
    doc: &Map<String, Json>,
    loader: &dyn ClassLoader,
    depth: usize,
) -> CodecResult<Instance> {
    if depth > MAX_NESTING {
        return Err(CodecError::Fallback("cause chain too deep".into()));
    }
    let mut instance = Instance::new(class);
    for def in class.fields() {
        let Some(json) = doc.get(&*def.name) else {
            continue;
        };
        let value = json_to_value(def.field_type, json, loader, depth)?;
        instance.set(&def.name, value)?;
    }
    Ok(instance)
}

fn json_to_value(
    field_type: FieldType,
    json: &Json,
    loader: &dyn ClassLoader,
    depth: usize,
) -> CodecResult<Value> {
    let bad = || CodecError::Fallback(format!("{} does not fit a {:?} field", json, field_type));
    let int = || json.as_i64().ok_or_else(bad);
    Ok(match field_type {
        FieldType::Byte => Value::Byte(i8::try_from(int()?).map_err(|_| bad())?),
        FieldType::Short => Value::Short(i16::try_from(int()?).map_err(|_| bad())?),
        FieldType::Int => Value::Int(i32::try_from(int()?).map_err(|_| bad())?),
        FieldType::Long => Value::Long(int()?),
        FieldType::Char => Value::Char(u16::try_from(int()?).map_err(|_| bad())?),
        FieldType::Float => Value::Float(json.as_f64().ok_or_else(bad)? as f32),
        FieldType::Double => Value::Double(json.as_f64().ok_or_else(bad)?),
        FieldType::Boolean => Value::Bool(json.as_bool().ok_or_else(bad)?),
        FieldType::Other => match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::String(s) => Value::from(s.as_str()),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Long(i),
                None => Value::Double(n.as_f64().ok_or_else(bad)?),
            },
            Json::Object(doc) => reference_from_json(doc, loader, depth)?,
            Json::Array(_) => return Err(bad()),
        },
    })
}

fn reference_from_json(
    doc: &Map<String, Json>,
    loader: &dyn ClassLoader,
    depth: usize,
) -> CodecResult<Value> {
    let load = |name: &str| {
        loader.load_by_name(name).ok_or_else(|| {
            CodecError::Fallback(format!("class {} unknown to loader {}", name, loader.name()))
        })
    };
    if let (Some(Json::String(kind)), Some(json)) = (doc.get(PRIMITIVE_KEY), doc.get(VALUE_KEY)) {
        let field_type = match kind.as_str() {
            "byte" => FieldType::Byte,
            "short" => FieldType::Short,
            "int" => FieldType::Int,
            "float" => FieldType::Float,
            "char" => FieldType::Char,
            other => {
                return Err(CodecError::Fallback(format!(
                    "unknown primitive tag {}",
                    other
                )))
            }
        };
        return json_to_value(field_type, json, loader, depth);
    }
    if let Some(Json::String(name)) = doc.get(ENUM_KEY) {
        let class = load(name)?;
        let ordinal = doc
            .get(ORDINAL_KEY)
            .and_then(Json::as_i64)
            .and_then(|o| i32::try_from(o).ok())
            .ok_or_else(|| CodecError::Fallback(format!("enum {} without ordinal", name)))?;
        return Ok(Value::Enum { class, ordinal });
    }
    match (doc.get(TYPE_KEY), doc.get(FIELDS_KEY)) {
        (Some(Json::String(name)), Some(Json::Object(fields))) => {
            let class = load(name)?;
            let nested = instance_from_json(&class, fields, loader, depth + 1)?;
            Ok(Value::object(HeapObject::Instance(nested)))
        }
        _ => Err(CodecError::Fallback(
            "nested object without type information".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ClassCatalog;

    #[test]
    fn test_cause_chain_roundtrip() {
        let io = ClassDef::builder("IoError")
            .field("message", FieldType::Other)
            .field("code", FieldType::Int)
            .field("cause", FieldType::Other)
            .throwable()
            .build();
        let catalog = ClassCatalog::new("app")
            .with_classes([Arc::clone(&io)])
            .expect("register");

        let cause = Instance::new(&io)
            .with("message", "disk gone")
            .and_then(|i| i.with("code", 5))
            .expect("cause");
        let outer = Instance::new(&io)
            .with("message", "write failed")
            .and_then(|i| i.with("code", 7))
            .and_then(|i| i.with("cause", Value::object(HeapObject::Instance(cause))))
            .expect("outer");

        let bytes = JsonFallback.marshal(&outer).expect("marshal");
        let back = JsonFallback
            .unmarshal(&io, &bytes, &catalog)
            .expect("unmarshal");

        assert_eq!(back.get("message").and_then(Value::as_str), Some("write failed"));
        assert_eq!(back.get("code"), Some(&Value::Int(7)));
        let cause = back.get("cause").and_then(Value::as_object).expect("cause");
        let cause = cause.read();
        let cause = cause.as_instance().expect("instance");
        assert_eq!(cause.get("code"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_non_finite_float_rejected() {
        let class = ClassDef::builder("Weird")
            .field("ratio", FieldType::Double)
            .throwable()
            .build();
        let inst = Instance::new(&class)
            .with("ratio", f64::NAN)
            .expect("set");
        assert!(matches!(
            JsonFallback.marshal(&inst),
            Err(CodecError::Fallback(_))
        ));
    }

    #[test]
    fn test_reference_numbers_keep_their_width() {
        let err = ClassDef::builder("RangeError")
            .field("code", FieldType::Other)
            .field("detail", FieldType::Other)
            .field("limit", FieldType::Other)
            .field("ratio", FieldType::Other)
            .field("sign", FieldType::Other)
            .field("total", FieldType::Other)
            .throwable()
            .build();
        let catalog = ClassCatalog::new("app")
            .with_classes([Arc::clone(&err)])
            .expect("register");

        let inst = Instance::new(&err)
            .with("code", Value::Int(5))
            .and_then(|i| i.with("detail", Value::Short(3)))
            .and_then(|i| i.with("limit", Value::Byte(-2)))
            .and_then(|i| i.with("ratio", Value::Float(0.5)))
            .and_then(|i| i.with("sign", Value::Char(u16::from(b'-'))))
            .and_then(|i| i.with("total", Value::Long(1 << 40)))
            .expect("fields");

        let bytes = JsonFallback.marshal(&inst).expect("marshal");
        let back = JsonFallback
            .unmarshal(&err, &bytes, &catalog)
            .expect("unmarshal");
        assert_eq!(back.get("code"), Some(&Value::Int(5)));
        assert_eq!(back.get("detail"), Some(&Value::Short(3)));
        assert_eq!(back.get("limit"), Some(&Value::Byte(-2)));
        assert_eq!(back.get("ratio"), Some(&Value::Float(0.5)));
        assert_eq!(back.get("sign"), Some(&Value::Char(u16::from(b'-'))));
        assert_eq!(back.get("total"), Some(&Value::Long(1 << 40)));
    }
}
