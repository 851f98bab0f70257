// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # grid-marshal - footer-indexed object marshaller for cache nodes
//!
//! A binary object-graph codec for distributed cache values. Object graphs
//! (cycles and shared subgraphs included) are encoded with identity handles;
//! objects of indexed types carry a trailing field footer so a single field
//! can be read straight from the bytes, without materializing the object.
//!
//! ## Quick Start
//!
//! ```rust
//! use grid_marshal::descriptor::ClassCatalog;
//! use grid_marshal::model::{ClassDef, FieldType, HeapObject, Instance, Value};
//! use grid_marshal::{FieldRead, GridMarshaller, MarshalResult};
//! use std::sync::Arc;
//!
//! fn main() -> MarshalResult<()> {
//!     let person = ClassDef::builder("Person")
//!         .field("name", FieldType::Other)
//!         .field("age", FieldType::Int)
//!         .build();
//!     let loader = ClassCatalog::new("app").with_classes([person.clone()]).unwrap();
//!
//!     let marshaller = GridMarshaller::builder().pool_size(4).build()?;
//!     marshaller.enable_fields_indexing(&person)?;
//!
//!     let inst = Instance::new(&person)
//!         .with("name", "Ada")
//!         .and_then(|i| i.with("age", 36))
//!         .unwrap();
//!     let bytes: Arc<[u8]> = marshaller.marshal(&Value::object(HeapObject::Instance(inst)))?.into();
//!
//!     let age = marshaller.read_field("age", &bytes, 0, bytes.len(), &loader)?;
//!     assert!(matches!(age, Some(FieldRead::Value(Value::Int(36)))));
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                          Cache Layer                                |
//! |   CacheObjectContext | CacheOptimizedObject | KeyCacheOptimizedObject|
//! +---------------------------------------------------------------------+
//! |                        Marshaller Layer                             |
//! |   GridMarshaller (marshal/unmarshal/has_field/read_field) | Pool    |
//! +---------------------------------------------------------------------+
//! |                          Codec Layer                                |
//! |   ObjectWriter/ObjectReader | Handles | Footer | JSON fallback      |
//! +---------------------------------------------------------------------+
//! |                     Model + Descriptor Layer                        |
//! |   Value/HeapObject/ClassDef | ClassDescriptorRegistry | ClassLoader |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`model`] - values, heap objects and class definitions
//! - [`descriptor`] - per-class encoding metadata and class loaders
//! - [`codec`] - the recursive encode/decode engine
//! - [`pool`] - reusable per-session buffers
//! - [`marshaller`] - public entry points
//! - [`cache`] - cache value/key wrappers and their context
//! - [`config`] - wire constants and runtime configuration

pub mod cache;
pub mod codec;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod marshaller;
pub mod model;
pub mod pool;

pub use cache::{
    CacheInterceptor, CacheObjectContext, CacheObjectProcessor, CacheOptimizedObject,
    InterceptorGuard, KernalConfig, KeyCacheOptimizedObject, OptimizedObjectProcessor, QueryItem,
};
pub use config::MarshallerConfig;
pub use error::{CodecError, CodecResult, MarshalError, MarshalResult};
pub use marshaller::{ByteWindow, FieldRead, GridMarshaller, GridMarshallerBuilder};
pub use model::{ClassDef, FieldType, HeapObject, Instance, ObjectRef, Value};
pub use pool::{InterruptHandle, StreamPool};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
