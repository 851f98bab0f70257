// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-type fields-indexing metadata.

use crate::descriptor::ClassDescriptor;
use crate::model::FieldType;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Field id -> field type of one indexed type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeIndex {
    type_name: Arc<str>,
    fields: HashMap<i32, FieldType>,
}

impl TypeIndex {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn field_type(&self, field_id: i32) -> Option<FieldType> {
        self.fields.get(&field_id).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Types whose objects are written with a field-index footer.
#[derive(Debug, Default)]
pub struct FieldsIndexRegistry {
    types: DashMap<i32, Arc<TypeIndex>>,
}

impl FieldsIndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register metadata for a descriptor. Returns false if the type's
    /// strategy cannot carry a footer.
    pub fn enable(&self, desc: &ClassDescriptor) -> bool {
        if !desc.fields_indexing_supported() {
            return false;
        }
        self.types.entry(desc.type_id()).or_insert_with(|| {
            log::debug!(
                "[fields-index] enabled for {} ({} fields)",
                desc.name(),
                desc.fields().len()
            );
            Arc::new(TypeIndex {
                type_name: Arc::from(desc.name()),
                fields: desc.fields().iter().map(|f| (f.id, f.field_type)).collect(),
            })
        });
        true
    }

    pub fn is_enabled(&self, type_id: i32) -> bool {
        self.types.contains_key(&type_id)
    }

    pub fn get(&self, type_id: i32) -> Option<Arc<TypeIndex>> {
        self.types.get(&type_id).map(|t| Arc::clone(t.value()))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::field_id;
    use crate::model::ClassDef;

    #[test]
    fn test_enable_default_fields_only() {
        let registry = FieldsIndexRegistry::new();
        let point = ClassDef::builder("Point")
            .field("x", FieldType::Int)
            .build();
        let desc = ClassDescriptor::for_class(&point).expect("descriptor");
        assert!(registry.enable(&desc));
        assert!(registry.enable(&desc));
        assert!(registry.is_enabled(desc.type_id()));
        assert_eq!(registry.len(), 1);

        let index = registry.get(desc.type_id()).expect("index");
        assert_eq!(index.field_type(field_id("x")), Some(FieldType::Int));
        assert_eq!(index.type_name(), "Point");

        let color = ClassDef::builder("Color").enum_constants(["RED"]).build();
        let desc = ClassDescriptor::for_class(&color).expect("descriptor");
        assert!(!registry.enable(&desc));
        assert!(!registry.is_enabled(desc.type_id()));
    }
}
