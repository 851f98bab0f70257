// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Class resolution on the decode side.

use super::ids::type_id;
use crate::error::{CodecError, CodecResult};
use crate::model::ClassDef;
use dashmap::DashMap;
use std::sync::Arc;

/// Resolves encoded type ids back to classes.
pub trait ClassLoader: Send + Sync {
    /// Name used in error messages.
    fn name(&self) -> &str;

    fn load(&self, type_id: i32) -> Option<Arc<ClassDef>>;

    fn load_by_name(&self, name: &str) -> Option<Arc<ClassDef>>;
}

/// Concurrent class catalog, the standard [`ClassLoader`].
pub struct ClassCatalog {
    name: String,
    by_id: DashMap<i32, Arc<ClassDef>>,
    by_name: DashMap<Arc<str>, Arc<ClassDef>>,
}

impl ClassCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            by_id: DashMap::new(),
            by_name: DashMap::new(),
        }
    }

    /// Register a class. Re-registering the same name replaces the entry; two
    /// distinct names hashing to the same type id are rejected.
    pub fn register(&self, class: Arc<ClassDef>) -> CodecResult<()> {
        let id = type_id(class.name());
        if let Some(existing) = self.by_id.get(&id) {
            if existing.name() != class.name() {
                return Err(CodecError::unsupported(
                    class.name(),
                    format!("type id {} already taken by {}", id, existing.name()),
                ));
            }
        }
        log::debug!("[class-catalog] {} registered {} (id={})", self.name, class.name(), id);
        self.by_name.insert(class.name_arc(), Arc::clone(&class));
        self.by_id.insert(id, class);
        Ok(())
    }

    /// Register several classes, stopping at the first conflict.
    pub fn with_classes<I>(self, classes: I) -> CodecResult<Self>
    where
        I: IntoIterator<Item = Arc<ClassDef>>,
    {
        for class in classes {
            self.register(class)?;
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl ClassLoader for ClassCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self, type_id: i32) -> Option<Arc<ClassDef>> {
        self.by_id.get(&type_id).map(|c| Arc::clone(c.value()))
    }

    fn load_by_name(&self, name: &str) -> Option<Arc<ClassDef>> {
        self.by_name.get(name).map(|c| Arc::clone(c.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;

    #[test]
    fn test_catalog_load() {
        let point = ClassDef::builder("Point")
            .field("x", FieldType::Int)
            .build();
        let catalog = ClassCatalog::new("app")
            .with_classes([Arc::clone(&point)])
            .expect("register");

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.name(), "app");
        let loaded = catalog.load(type_id("Point")).expect("known id");
        assert!(Arc::ptr_eq(&loaded, &point));
        assert!(catalog.load_by_name("Point").is_some());
        assert!(catalog.load(type_id("Other")).is_none());
    }
}
