// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Builder for [`GridMarshaller`].

use super::GridMarshaller;
use crate::codec::{FallbackMarshaller, FieldsIndexRegistry, JsonFallback};
use crate::config::MarshallerConfig;
use crate::descriptor::{ClassDescriptorRegistry, ClassLoader};
use crate::error::MarshalResult;
use crate::model::ClassDef;
use std::sync::Arc;

/// Builder for configuring and creating a [`GridMarshaller`].
pub struct GridMarshallerBuilder {
    config: MarshallerConfig,
    registry: Option<Arc<ClassDescriptorRegistry>>,
    fallback: Option<Arc<dyn FallbackMarshaller>>,
    /// Classes indexed at build time, on top of `config.indexed_types`
    indexed: Vec<Arc<ClassDef>>,
    /// Resolves `config.indexed_types` by name
    class_loader: Option<Arc<dyn ClassLoader>>,
}

impl GridMarshallerBuilder {
    pub(super) fn new() -> Self {
        Self {
            config: MarshallerConfig::default(),
            registry: None,
            fallback: None,
            indexed: Vec::new(),
            class_loader: None,
        }
    }

    pub fn config(mut self, config: MarshallerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.config.pool_size = pool_size;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    pub fn fields_indexing(mut self, enabled: bool) -> Self {
        self.config.fields_indexing = enabled;
        self
    }

    /// Share a descriptor registry with other marshallers.
    pub fn registry(mut self, registry: Arc<ClassDescriptorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace the JSON fallback used for throwables.
    pub fn fallback(mut self, fallback: Arc<dyn FallbackMarshaller>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn index_class(mut self, class: Arc<ClassDef>) -> Self {
        self.indexed.push(class);
        self
    }

    pub fn class_loader(mut self, loader: Arc<dyn ClassLoader>) -> Self {
        self.class_loader = Some(loader);
        self
    }

    /// Validate the configuration and enable fields indexing for every
    /// requested class. Unknown class names are logged and skipped.
    pub fn build(self) -> MarshalResult<GridMarshaller> {
        self.config.validate()?;

        let mut indexed = self.indexed;
        for name in &self.config.indexed_types {
            match self.class_loader.as_ref().and_then(|l| l.load_by_name(name)) {
                Some(class) => indexed.push(class),
                None => log::warn!(
                    "[marshaller] indexed type {} not found in class loader {}",
                    name,
                    self.class_loader.as_ref().map_or("<none>", |l| l.name())
                ),
            }
        }

        let marshaller = GridMarshaller::assemble(
            self.config,
            self.registry
                .unwrap_or_else(|| Arc::new(ClassDescriptorRegistry::new())),
            Arc::new(FieldsIndexRegistry::new()),
            self.fallback.unwrap_or_else(|| Arc::new(JsonFallback)),
        );
        for class in &indexed {
            if !marshaller.enable_fields_indexing(class)? {
                log::warn!(
                    "[marshaller] {} cannot carry a field footer, indexing skipped",
                    class.name()
                );
            }
        }
        log::debug!(
            "[marshaller] built (pool_size={}, max_depth={}, indexed={})",
            marshaller.config().pool_size,
            marshaller.config().max_depth,
            indexed.len()
        );
        Ok(marshaller)
    }
}
