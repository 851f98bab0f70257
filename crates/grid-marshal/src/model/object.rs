// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Heap objects: identity-bearing nodes of an object graph.

use super::class::ClassDef;
use super::value::Value;
use crate::config::DEFAULT_LOAD_FACTOR;
use crate::error::{CodecError, CodecResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared, identity-bearing reference to a heap object.
pub type ObjectRef = Arc<RwLock<HeapObject>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    ArrayList,
    LinkedList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKind {
    /// Hash-ordered; stored order is kept as-is.
    Hash,
    /// Insertion-ordered.
    Linked,
}

/// Map contents.
#[derive(Debug, Clone)]
pub struct MapBody {
    pub kind: HashKind,
    pub load_factor: f32,
    /// Only meaningful for [`HashKind::Linked`].
    pub access_order: bool,
    pub entries: Vec<(Value, Value)>,
}

impl MapBody {
    pub fn new(kind: HashKind) -> Self {
        Self {
            kind,
            load_factor: DEFAULT_LOAD_FACTOR,
            access_order: false,
            entries: Vec::new(),
        }
    }

    pub fn with_load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Insert or replace by key (value equality for primitives/strings,
    /// identity for heap keys).
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        match self.entries.iter_mut().find(|(k, _)| k.same(&key)) {
            Some((_, v)) => Some(std::mem::replace(v, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k.same(key)).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Set contents.
#[derive(Debug, Clone)]
pub struct SetBody {
    pub kind: HashKind,
    pub load_factor: f32,
    pub items: Vec<Value>,
}

impl SetBody {
    pub fn new(kind: HashKind) -> Self {
        Self {
            kind,
            load_factor: DEFAULT_LOAD_FACTOR,
            items: Vec::new(),
        }
    }

    pub fn insert(&mut self, item: Value) -> bool {
        if self.items.iter().any(|v| v.same(&item)) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Array of primitives.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveArray {
    Byte(Vec<u8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Char(Vec<u16>),
    Bool(Vec<bool>),
}

impl PrimitiveArray {
    pub fn len(&self) -> usize {
        match self {
            Self::Byte(v) => v.len(),
            Self::Short(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Long(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::Char(v) => v.len(),
            Self::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Instance of a user class: one value per declared field slot.
#[derive(Debug, Clone)]
pub struct Instance {
    class: Arc<ClassDef>,
    fields: Vec<Value>,
}

impl Instance {
    /// New instance with every field at its zero value.
    pub fn new(class: &Arc<ClassDef>) -> Self {
        Self {
            fields: class
                .fields()
                .iter()
                .map(|f| f.field_type.default_value())
                .collect(),
            class: Arc::clone(class),
        }
    }

    pub fn class(&self) -> &Arc<ClassDef> {
        &self.class
    }

    /// Field values in declaration order.
    pub fn values(&self) -> &[Value] {
        &self.fields
    }

    pub fn slot(&self, slot: usize) -> Option<&Value> {
        self.fields.get(slot)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.class.slot_of(name).and_then(|slot| self.fields.get(slot))
    }

    /// Set a field by name; the value must fit the declared field type.
    pub fn set(&mut self, name: &str, value: Value) -> CodecResult<()> {
        let slot = self.class.slot_of(name).ok_or_else(|| {
            CodecError::invalid(format!("{} has no field {}", self.class.name(), name))
        })?;
        self.set_slot(slot, value)
    }

    pub fn set_slot(&mut self, slot: usize, value: Value) -> CodecResult<()> {
        let def = self.class.fields().get(slot).ok_or_else(|| {
            CodecError::invalid(format!("{} has no slot {}", self.class.name(), slot))
        })?;
        if !def.field_type.accepts(&value) {
            return Err(CodecError::invalid(format!(
                "field {}.{} ({:?}) cannot hold {:?}",
                self.class.name(),
                def.name,
                def.field_type,
                value
            )));
        }
        self.fields[slot] = value;
        Ok(())
    }

    /// Builder-style setter for tests and fixtures.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> CodecResult<Self> {
        self.set(name, value.into())?;
        Ok(self)
    }
}

/// Heap node contents.
#[derive(Debug, Clone)]
pub enum HeapObject {
    Instance(Instance),
    ObjectArray(Vec<Value>),
    PrimitiveArray(PrimitiveArray),
    List { kind: ListKind, items: Vec<Value> },
    Map(MapBody),
    Set(SetBody),
    /// Epoch milliseconds.
    Date(i64),
    Properties {
        defaults: Option<ObjectRef>,
        entries: Vec<(String, String)>,
    },
}

impl HeapObject {
    pub fn list(kind: ListKind, items: Vec<Value>) -> Self {
        Self::List { kind, items }
    }

    pub fn kind_name(&self) -> &str {
        match self {
            Self::Instance(inst) => inst.class().name(),
            Self::ObjectArray(_) => "Object[]",
            Self::PrimitiveArray(_) => "primitive[]",
            Self::List {
                kind: ListKind::ArrayList,
                ..
            } => "ArrayList",
            Self::List {
                kind: ListKind::LinkedList,
                ..
            } => "LinkedList",
            Self::Map(MapBody {
                kind: HashKind::Hash,
                ..
            }) => "HashMap",
            Self::Map(MapBody {
                kind: HashKind::Linked,
                ..
            }) => "LinkedHashMap",
            Self::Set(SetBody {
                kind: HashKind::Hash,
                ..
            }) => "HashSet",
            Self::Set(SetBody {
                kind: HashKind::Linked,
                ..
            }) => "LinkedHashSet",
            Self::Date(_) => "Date",
            Self::Properties { .. } => "Properties",
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Self::Instance(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn as_instance_mut(&mut self) -> Option<&mut Instance> {
        match self {
            Self::Instance(inst) => Some(inst),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;

    #[test]
    fn test_instance_set_type_checked() {
        let class = ClassDef::builder("Point")
            .field("x", FieldType::Int)
            .field("label", FieldType::Other)
            .build();
        let mut inst = Instance::new(&class);
        assert_eq!(inst.get("x"), Some(&Value::Int(0)));
        assert_eq!(inst.get("label"), Some(&Value::Null));

        inst.set("x", Value::Int(5)).expect("int fits");
        inst.set("label", Value::from("origin")).expect("string fits");
        assert!(inst.set("x", Value::Long(5)).is_err());
        assert!(inst.set("missing", Value::Null).is_err());
    }

    #[test]
    fn test_map_insert_replaces_by_key() {
        let mut map = MapBody::new(HashKind::Linked);
        assert!(map.insert(Value::from("a"), Value::Int(1)).is_none());
        assert!(map.insert(Value::from("b"), Value::Int(2)).is_none());
        assert_eq!(
            map.insert(Value::from("a"), Value::Int(3)),
            Some(Value::Int(1))
        );
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Value::from("a")), Some(&Value::Int(3)));
    }

    #[test]
    fn test_set_rejects_duplicates() {
        let mut set = SetBody::new(HashKind::Hash);
        assert!(set.insert(Value::Int(1)));
        assert!(!set.insert(Value::Int(1)));
        assert_eq!(set.len(), 1);
    }
}
