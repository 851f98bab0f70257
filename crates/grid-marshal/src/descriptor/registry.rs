// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide descriptor registry.
//!
//! Lookups go through a `DashMap`; a first-use race lets both callers build a
//! descriptor and keeps whichever was published first. Descriptors are pure
//! functions of their type so the discarded copy is equivalent.

use super::{BuiltinKind, ClassDescriptor, Strategy};
use crate::error::{CodecError, CodecResult};
use crate::model::{ClassDef, FieldType, HashKind, HeapObject, ListKind, MapBody, SetBody, Value};
use dashmap::DashMap;
use std::sync::Arc;

/// Registry key: standard types by static name, user classes by class name.
/// A user entry is only reused for the exact `ClassDef` it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Builtin(&'static str),
    User(Arc<str>),
}

#[derive(Default)]
pub struct ClassDescriptorRegistry {
    descriptors: DashMap<TypeKey, Arc<ClassDescriptor>>,
}

impl ClassDescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor of a value's runtime type. `None` for `Value::Null`.
    pub fn descriptor_for(&self, value: &Value) -> CodecResult<Option<Arc<ClassDescriptor>>> {
        let (name, strategy) = match value {
            Value::Null => return Ok(None),
            Value::Byte(_) => ("byte", Strategy::Primitive(FieldType::Byte)),
            Value::Short(_) => ("short", Strategy::Primitive(FieldType::Short)),
            Value::Int(_) => ("int", Strategy::Primitive(FieldType::Int)),
            Value::Long(_) => ("long", Strategy::Primitive(FieldType::Long)),
            Value::Float(_) => ("float", Strategy::Primitive(FieldType::Float)),
            Value::Double(_) => ("double", Strategy::Primitive(FieldType::Double)),
            Value::Char(_) => ("char", Strategy::Primitive(FieldType::Char)),
            Value::Bool(_) => ("boolean", Strategy::Primitive(FieldType::Boolean)),
            Value::Str(_) => ("String", Strategy::String),
            Value::Class(_) => ("Class", Strategy::Class),
            Value::Enum { class, .. } => {
                let desc = self.descriptor_for_class(class)?;
                if !matches!(desc.strategy(), Strategy::Enum) {
                    return Err(CodecError::unsupported(
                        class.name(),
                        "enum constant of a non-enum class",
                    ));
                }
                return Ok(Some(desc));
            }
            Value::Object(obj) => {
                // Classify under a short read lock, resolve after releasing it.
                let resolved = match &*obj.read() {
                    HeapObject::Instance(inst) => Err(Arc::clone(inst.class())),
                    other => Ok(builtin_of(other)),
                };
                return match resolved {
                    Ok((name, strategy)) => Ok(Some(self.builtin(name, strategy))),
                    Err(class) => self.descriptor_for_class(&class).map(Some),
                };
            }
        };
        Ok(Some(self.builtin(name, strategy)))
    }

    /// Descriptor of a user class.
    ///
    /// Entries are keyed by name but bound to the `ClassDef` they were built
    /// from; a redefined class with the same name replaces the cached entry.
    pub fn descriptor_for_class(&self, class: &Arc<ClassDef>) -> CodecResult<Arc<ClassDescriptor>> {
        let key = TypeKey::User(class.name_arc());
        if let Some(desc) = self.descriptors.get(&key) {
            if built_from(desc.value(), class) {
                return Ok(Arc::clone(desc.value()));
            }
        }
        let built = Arc::new(ClassDescriptor::for_class(class)?);
        log::debug!(
            "[registry] descriptor {} id={} strategy={:?} fields={}",
            built.name(),
            built.type_id(),
            built.strategy(),
            built.fields().len()
        );
        let mut entry = self
            .descriptors
            .entry(key)
            .or_insert_with(|| Arc::clone(&built));
        if !built_from(entry.value(), class) {
            log::debug!("[registry] class {} redefined, replacing descriptor", built.name());
            *entry.value_mut() = Arc::clone(&built);
        }
        Ok(Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    fn builtin(&self, name: &'static str, strategy: Strategy) -> Arc<ClassDescriptor> {
        let key = TypeKey::Builtin(name);
        if let Some(desc) = self.descriptors.get(&key) {
            return Arc::clone(desc.value());
        }
        let built = Arc::new(ClassDescriptor::builtin(name, strategy));
        Arc::clone(self.descriptors.entry(key).or_insert(built).value())
    }
}

fn built_from(desc: &ClassDescriptor, class: &Arc<ClassDef>) -> bool {
    desc.class().is_some_and(|c| Arc::ptr_eq(c, class))
}

fn builtin_of(obj: &HeapObject) -> (&'static str, Strategy) {
    match obj {
        HeapObject::ObjectArray(_) => ("Object[]", Strategy::Array),
        HeapObject::PrimitiveArray(_) => ("primitive[]", Strategy::Array),
        HeapObject::List {
            kind: ListKind::ArrayList,
            ..
        } => ("ArrayList", Strategy::Builtin(BuiltinKind::ArrayList)),
        HeapObject::List {
            kind: ListKind::LinkedList,
            ..
        } => ("LinkedList", Strategy::Builtin(BuiltinKind::LinkedList)),
        HeapObject::Map(MapBody {
            kind: HashKind::Hash,
            ..
        }) => ("HashMap", Strategy::Builtin(BuiltinKind::HashMap)),
        HeapObject::Map(MapBody {
            kind: HashKind::Linked,
            ..
        }) => ("LinkedHashMap", Strategy::Builtin(BuiltinKind::LinkedHashMap)),
        HeapObject::Set(SetBody {
            kind: HashKind::Hash,
            ..
        }) => ("HashSet", Strategy::Builtin(BuiltinKind::HashSet)),
        HeapObject::Set(SetBody {
            kind: HashKind::Linked,
            ..
        }) => ("LinkedHashSet", Strategy::Builtin(BuiltinKind::LinkedHashSet)),
        HeapObject::Date(_) => ("Date", Strategy::Builtin(BuiltinKind::Date)),
        HeapObject::Properties { .. } => ("Properties", Strategy::Builtin(BuiltinKind::Properties)),
        // Instances are resolved through their class.
        HeapObject::Instance(_) => ("Object", Strategy::DefaultFields),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Instance;
    use std::thread;

    #[test]
    fn test_builtin_descriptors_are_cached() {
        let registry = ClassDescriptorRegistry::new();
        let list = Value::object(HeapObject::list(ListKind::ArrayList, vec![]));
        let a = registry.descriptor_for(&list).expect("ok").expect("some");
        let b = registry.descriptor_for(&list).expect("ok").expect("some");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(matches!(
            a.strategy(),
            Strategy::Builtin(BuiltinKind::ArrayList)
        ));
        assert!(registry.descriptor_for(&Value::Null).expect("ok").is_none());
    }

    #[test]
    fn test_redefined_class_gets_its_own_layout() {
        let registry = ClassDescriptorRegistry::new();
        let first = ClassDef::builder("P")
            .field("a", FieldType::Int)
            .field("b", FieldType::Long)
            .build();
        let second = ClassDef::builder("P")
            .field("b", FieldType::Long)
            .field("a", FieldType::Int)
            .build();

        let d1 = registry.descriptor_for_class(&first).expect("first");
        assert_eq!(d1.field("a").map(|f| f.slot), Some(0));

        let d2 = registry.descriptor_for_class(&second).expect("second");
        assert_eq!(d2.field("a").map(|f| f.slot), Some(1));
        assert!(d2.class().is_some_and(|c| Arc::ptr_eq(c, &second)));
        assert_eq!(d1.type_id(), d2.type_id());

        // Switching back rebuilds for the first class again.
        let d3 = registry.descriptor_for_class(&first).expect("first again");
        assert_eq!(d3.field("a").map(|f| f.slot), Some(0));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_first_use_converges() {
        let registry = Arc::new(ClassDescriptorRegistry::new());
        let class = ClassDef::builder("Order")
            .field("qty", FieldType::Int)
            .field("sku", FieldType::Other)
            .build();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let class = Arc::clone(&class);
                thread::spawn(move || {
                    let value = Value::object(HeapObject::Instance(Instance::new(&class)));
                    registry
                        .descriptor_for(&value)
                        .expect("resolve")
                        .expect("some")
                })
            })
            .collect();

        let descs: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .collect();
        for desc in &descs {
            assert_eq!(desc.type_id(), descs[0].type_id());
            assert_eq!(desc.fields(), descs[0].fields());
        }
        assert_eq!(registry.len(), 1);
    }
}
