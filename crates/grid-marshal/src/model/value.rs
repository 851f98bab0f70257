// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Values: primitives, strings, enum constants, class literals and heap references.

use super::class::ClassDef;
use super::object::{HeapObject, ObjectRef};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A value in an object graph.
///
/// `PartialEq` compares heap references by identity. Use [`deep_eq`] for
/// structural comparison of whole graphs.
#[derive(Clone)]
pub enum Value {
    Null,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(u16),
    Bool(bool),
    /// Strings are written by value and never deduplicated.
    Str(Arc<str>),
    Enum {
        class: Arc<ClassDef>,
        ordinal: i32,
    },
    Class(Arc<ClassDef>),
    Object(ObjectRef),
}

impl Value {
    /// Allocate a new heap object.
    pub fn object(obj: HeapObject) -> Self {
        Self::Object(Arc::new(RwLock::new(obj)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Byte(_)
                | Self::Short(_)
                | Self::Int(_)
                | Self::Long(_)
                | Self::Float(_)
                | Self::Double(_)
                | Self::Char(_)
                | Self::Bool(_)
        )
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Class of an instance or enum constant.
    pub fn class(&self) -> Option<Arc<ClassDef>> {
        match self {
            Self::Enum { class, .. } | Self::Class(class) => Some(Arc::clone(class)),
            Self::Object(obj) => match &*obj.read() {
                HeapObject::Instance(inst) => Some(Arc::clone(inst.class())),
                _ => None,
            },
            _ => None,
        }
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Null => "null".into(),
            Self::Str(_) => "String".into(),
            Self::Enum { class, ordinal } => format!("{}#{}", class.name(), ordinal),
            Self::Class(class) => format!("Class<{}>", class.name()),
            Self::Object(obj) => {
                format!("{}@{:x}", obj.read().kind_name(), identity(obj))
            }
            other => format!("{:?}", other),
        }
    }

    /// Identity comparison for heap references, value comparison otherwise.
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => self == other,
        }
    }
}

/// Identity of a heap object.
pub fn identity(obj: &ObjectRef) -> usize {
    Arc::as_ptr(obj) as *const () as usize
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Byte(a), Self::Byte(b)) => a == b,
            (Self::Short(a), Self::Short(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (
                Self::Enum {
                    class: ca,
                    ordinal: oa,
                },
                Self::Enum {
                    class: cb,
                    ordinal: ob,
                },
            ) => ca.name() == cb.name() && oa == ob,
            (Self::Class(a), Self::Class(b)) => a.name() == b.name(),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Byte(v) => write!(f, "Byte({})", v),
            Self::Short(v) => write!(f, "Short({})", v),
            Self::Int(v) => write!(f, "Int({})", v),
            Self::Long(v) => write!(f, "Long({})", v),
            Self::Float(v) => write!(f, "Float({})", v),
            Self::Double(v) => write!(f, "Double({})", v),
            Self::Char(v) => write!(f, "Char({})", v),
            Self::Bool(v) => write!(f, "Bool({})", v),
            Self::Str(v) => write!(f, "Str({:?})", v),
            Self::Enum { class, ordinal } => write!(f, "Enum({}#{})", class.name(), ordinal),
            Self::Class(class) => write!(f, "Class({})", class.name()),
            // Heap contents may be cyclic; print identity only.
            Self::Object(obj) => write!(f, "Object@{:x}", identity(obj)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<HeapObject> for Value {
    fn from(obj: HeapObject) -> Self {
        Self::object(obj)
    }
}

/// Structural equality of two object graphs.
///
/// Cycles are handled by assuming a pair of objects already under comparison
/// is equal.
pub fn deep_eq(a: &Value, b: &Value) -> bool {
    let mut visiting = HashSet::new();
    deep_eq_inner(a, b, &mut visiting)
}

fn deep_eq_inner(a: &Value, b: &Value, visiting: &mut HashSet<(usize, usize)>) -> bool {
    let (oa, ob) = match (a, b) {
        (Value::Object(oa), Value::Object(ob)) => (oa, ob),
        _ => return a == b,
    };
    if Arc::ptr_eq(oa, ob) || !visiting.insert((identity(oa), identity(ob))) {
        return true;
    }
    // Snapshot under short read locks; never hold a lock across recursion.
    let left = oa.read().clone();
    let right = ob.read().clone();
    match (&left, &right) {
        (HeapObject::Instance(x), HeapObject::Instance(y)) => {
            x.class().name() == y.class().name()
                && seq_eq(x.values(), y.values(), visiting)
        }
        (HeapObject::ObjectArray(x), HeapObject::ObjectArray(y)) => seq_eq(x, y, visiting),
        (HeapObject::PrimitiveArray(x), HeapObject::PrimitiveArray(y)) => x == y,
        (
            HeapObject::List { kind: kx, items: x },
            HeapObject::List { kind: ky, items: y },
        ) => kx == ky && seq_eq(x, y, visiting),
        (HeapObject::Map(x), HeapObject::Map(y)) => {
            x.kind == y.kind
                && x.load_factor.to_bits() == y.load_factor.to_bits()
                && x.access_order == y.access_order
                && x.entries.len() == y.entries.len()
                && x.entries.iter().zip(&y.entries).all(|((k1, v1), (k2, v2))| {
                    deep_eq_inner(k1, k2, visiting) && deep_eq_inner(v1, v2, visiting)
                })
        }
        (HeapObject::Set(x), HeapObject::Set(y)) => {
            x.kind == y.kind
                && x.load_factor.to_bits() == y.load_factor.to_bits()
                && seq_eq(&x.items, &y.items, visiting)
        }
        (HeapObject::Date(x), HeapObject::Date(y)) => x == y,
        (
            HeapObject::Properties {
                defaults: dx,
                entries: x,
            },
            HeapObject::Properties {
                defaults: dy,
                entries: y,
            },
        ) => {
            x == y
                && match (dx, dy) {
                    (None, None) => true,
                    (Some(dx), Some(dy)) => deep_eq_inner(
                        &Value::Object(Arc::clone(dx)),
                        &Value::Object(Arc::clone(dy)),
                        visiting,
                    ),
                    _ => false,
                }
        }
        _ => false,
    }
}

fn seq_eq(a: &[Value], b: &[Value], visiting: &mut HashSet<(usize, usize)>) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| deep_eq_inner(x, y, visiting))
}

/// Structural hash, consistent with [`deep_eq`].
///
/// Heap contents are hashed down to `depth` levels; deeper references
/// contribute only their kind.
pub fn deep_hash<H: Hasher>(value: &Value, depth: usize, state: &mut H) {
    match value {
        Value::Null => 0u8.hash(state),
        Value::Byte(v) => v.hash(state),
        Value::Short(v) => v.hash(state),
        Value::Int(v) => v.hash(state),
        Value::Long(v) => v.hash(state),
        Value::Float(v) => v.to_bits().hash(state),
        Value::Double(v) => v.to_bits().hash(state),
        Value::Char(v) => v.hash(state),
        Value::Bool(v) => v.hash(state),
        Value::Str(v) => v.hash(state),
        Value::Enum { class, ordinal } => {
            class.name().hash(state);
            ordinal.hash(state);
        }
        Value::Class(class) => class.name().hash(state),
        Value::Object(obj) => {
            let snapshot = obj.read().clone();
            snapshot.kind_name().hash(state);
            if depth == 0 {
                return;
            }
            let next = depth - 1;
            match &snapshot {
                HeapObject::Instance(inst) => {
                    inst.class().name().hash(state);
                    inst.values().iter().for_each(|v| deep_hash(v, next, state));
                }
                HeapObject::ObjectArray(items) | HeapObject::List { items, .. } => {
                    items.iter().for_each(|v| deep_hash(v, next, state));
                }
                HeapObject::Set(set) => set.items.iter().for_each(|v| deep_hash(v, next, state)),
                HeapObject::Map(map) => {
                    for (k, v) in &map.entries {
                        deep_hash(k, next, state);
                        deep_hash(v, next, state);
                    }
                }
                HeapObject::PrimitiveArray(arr) => arr.len().hash(state),
                HeapObject::Date(ms) => ms.hash(state),
                HeapObject::Properties { entries, .. } => entries.hash(state),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldType, Instance, ListKind};

    #[test]
    fn test_identity_vs_structural_eq() {
        let a = Value::object(HeapObject::list(ListKind::ArrayList, vec![Value::Int(1)]));
        let b = Value::object(HeapObject::list(ListKind::ArrayList, vec![Value::Int(1)]));
        assert_ne!(a, b);
        assert!(deep_eq(&a, &b));
        assert!(a.same(&a.clone()));
    }

    #[test]
    fn test_deep_eq_on_cycles() {
        let class = ClassDef::builder("Node")
            .field("next", FieldType::Other)
            .build();
        let make_cycle = || {
            let node = Value::object(HeapObject::Instance(Instance::new(&class)));
            let obj = node.as_object().expect("object").clone();
            if let HeapObject::Instance(inst) = &mut *obj.write() {
                inst.set("next", node.clone()).expect("set");
            }
            node
        };
        assert!(deep_eq(&make_cycle(), &make_cycle()));
    }

    #[test]
    fn test_float_eq_is_bitwise() {
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
    }
}
