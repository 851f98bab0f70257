// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Public marshaller entry points.
//!
//! [`GridMarshaller`] ties the codec to a [`StreamPool`]: every call borrows
//! a holder, runs one encode or decode session on it and converts low-level
//! [`CodecError`]s into [`MarshalError`]s with the object description or the
//! class loader name attached.
//!
//! # Example
//!
//! ```rust
//! use grid_marshal::descriptor::ClassCatalog;
//! use grid_marshal::model::{ClassDef, FieldType, HeapObject, Instance, Value};
//! use grid_marshal::GridMarshaller;
//!
//! let point = ClassDef::builder("Point")
//!     .field("x", FieldType::Int)
//!     .field("y", FieldType::Int)
//!     .build();
//! let loader = ClassCatalog::new("app")
//!     .with_classes([point.clone()])
//!     .unwrap();
//!
//! let marshaller = GridMarshaller::new();
//! marshaller.enable_fields_indexing(&point).unwrap();
//!
//! let inst = Instance::new(&point).with("x", 5).and_then(|i| i.with("y", 9)).unwrap();
//! let bytes = marshaller.marshal(&Value::object(HeapObject::Instance(inst))).unwrap();
//! assert!(marshaller.has_field("y", &bytes, 0, bytes.len()).unwrap());
//!
//! let decoded = marshaller.unmarshal(&bytes, &loader).unwrap();
//! assert_eq!(decoded.class().unwrap().name(), "Point");
//! ```

mod builder;
mod field;

pub use builder::GridMarshallerBuilder;
pub use field::{ByteWindow, FieldRead};

use crate::codec::{
    CodecEnv, DataInput, EncodeStats, FallbackMarshaller, FieldsIndexRegistry, JsonFallback,
};
use crate::config::MarshallerConfig;
use crate::descriptor::{type_id, ClassDescriptorRegistry, ClassLoader};
use crate::error::{CodecError, MarshalError, MarshalResult};
use crate::model::{ClassDef, Value};
use crate::pool::{PoolStats, StreamHolder, StreamPool};
use std::sync::Arc;

/// Footer-aware object marshaller.
pub struct GridMarshaller {
    env: CodecEnv,
    pool: StreamPool,
    config: MarshallerConfig,
}

impl GridMarshaller {
    /// Marshaller with the default configuration (per-thread holders, no
    /// indexed types).
    pub fn new() -> Self {
        let config = MarshallerConfig::default();
        Self::assemble(
            config,
            Arc::new(ClassDescriptorRegistry::new()),
            Arc::new(FieldsIndexRegistry::new()),
            Arc::new(JsonFallback),
        )
    }

    pub fn builder() -> GridMarshallerBuilder {
        GridMarshallerBuilder::new()
    }

    pub(crate) fn assemble(
        config: MarshallerConfig,
        registry: Arc<ClassDescriptorRegistry>,
        index: Arc<FieldsIndexRegistry>,
        fallback: Arc<dyn FallbackMarshaller>,
    ) -> Self {
        let env = CodecEnv::new(registry, index, fallback, config.max_depth);
        let pool = StreamPool::new(config.pool_size, config.initial_buffer_capacity);
        Self { env, pool, config }
    }

    /// Encode `value` into a fresh byte vector.
    pub fn marshal(&self, value: &Value) -> MarshalResult<Vec<u8>> {
        self.marshal_with_stats(value).map(|(bytes, _)| bytes)
    }

    /// Like [`Self::marshal`], also returning the session counters.
    pub fn marshal_with_stats(&self, value: &Value) -> MarshalResult<(Vec<u8>, EncodeStats)> {
        let mut guard = self.pool.acquire()?;
        let StreamHolder { out, handles, .. } = &mut *guard;
        let stats = self
            .env
            .encode(value, out, handles)
            .map_err(|err| encode_error(value, err))?;
        Ok((out.as_slice().to_vec(), stats))
    }

    /// Decode a whole buffer.
    pub fn unmarshal(&self, bytes: &[u8], loader: &dyn ClassLoader) -> MarshalResult<Value> {
        self.unmarshal_window(bytes, 0, bytes.len(), loader)
    }

    /// Decode the value encoded in `bytes[off..off + len]`.
    pub fn unmarshal_window(
        &self,
        bytes: &[u8],
        off: usize,
        len: usize,
        loader: &dyn ClassLoader,
    ) -> MarshalResult<Value> {
        let input = DataInput::window(bytes, off, len)
            .map_err(|err| MarshalError::from_decode(loader.name(), err))?;
        let mut guard = self.pool.acquire()?;
        self.env
            .decode(input, &mut guard.replay, loader)
            .map_err(|err| MarshalError::from_decode(loader.name(), err))
    }

    /// Register index metadata for `class` so its objects are written with a
    /// field footer. Returns `false` when the class's serialization kind
    /// cannot carry one.
    pub fn enable_fields_indexing(&self, class: &Arc<ClassDef>) -> MarshalResult<bool> {
        let desc = self
            .env
            .registry
            .descriptor_for_class(class)
            .map_err(|err| MarshalError::from_encode(class.name(), err))?;
        let enabled = self.env.index.enable(&desc);
        if !enabled {
            log::debug!(
                "[marshaller] fields indexing not supported for {} ({})",
                class.name(),
                desc.strategy().name()
            );
        }
        Ok(enabled)
    }

    pub fn fields_indexing_enabled(&self, class: &ClassDef) -> bool {
        self.env.index.is_enabled(type_id(class.name()))
    }

    pub fn registry(&self) -> &Arc<ClassDescriptorRegistry> {
        &self.env.registry
    }

    pub fn config(&self) -> &MarshallerConfig {
        &self.config
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl Default for GridMarshaller {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode failures name the object; internal classes get an advisory hint.
fn encode_error(value: &Value, err: CodecError) -> MarshalError {
    let object = match value.class() {
        Some(class) if class.is_internal() => format!(
            "{} (internal class {} is not meant to be marshalled, \
             make sure it is not passed to cache operations)",
            value.describe(),
            class.name()
        ),
        _ => value.describe(),
    };
    MarshalError::from_encode(object, err)
}
