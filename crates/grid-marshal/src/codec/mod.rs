// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binary object-graph codec
//!
//! Recursive encode/decode engine. Every value starts with a marker byte
//! (see [`crate::config::markers`]); heap objects are tracked by identity in a
//! [`HandleTable`] so repeated references become HANDLE markers carrying the
//! backward distance to the first encoding. Objects of indexed types carry a
//! trailing [`footer`] that locates each field without decoding the others.
//!
//! # Modules
//!
//! - `cursor`: little-endian output buffer and bounds-checked input window
//! - `handles`: identity -> offset (encode) and offset -> object (decode)
//! - `footer`: footer builder and validating parser
//! - `index`: per-type fields-indexing metadata
//! - `writer` / `reader`: the recursive engine and custom-routine contexts
//! - `fallback`: whole-object escape hatch for throwables

mod cursor;
mod fallback;
mod fields;
pub mod footer;
mod handles;
mod index;
mod reader;
mod writer;

pub use cursor::{DataInput, DataOutput};
pub use fallback::{FallbackMarshaller, JsonFallback};
pub use fields::{GetFields, PutFields};
pub use handles::{HandleReplay, HandleTable};
pub use index::{FieldsIndexRegistry, TypeIndex};
pub use reader::ObjectReader;
pub use writer::{EncodeStats, ObjectWriter};

use crate::descriptor::{ClassDescriptorRegistry, ClassLoader};
use crate::error::CodecResult;
use crate::model::Value;
use std::sync::Arc;

/// Shared, read-only collaborators of every codec session.
pub struct CodecEnv {
    pub(crate) registry: Arc<ClassDescriptorRegistry>,
    pub(crate) index: Arc<FieldsIndexRegistry>,
    pub(crate) fallback: Arc<dyn FallbackMarshaller>,
    pub(crate) max_depth: usize,
}

impl CodecEnv {
    pub fn new(
        registry: Arc<ClassDescriptorRegistry>,
        index: Arc<FieldsIndexRegistry>,
        fallback: Arc<dyn FallbackMarshaller>,
        max_depth: usize,
    ) -> Self {
        Self {
            registry,
            index,
            fallback,
            max_depth,
        }
    }

    /// Encode `value` into `out`, using `handles` as the session table.
    pub fn encode(
        &self,
        value: &Value,
        out: &mut DataOutput,
        handles: &mut HandleTable,
    ) -> CodecResult<EncodeStats> {
        let mut writer = ObjectWriter::new(out, handles, self);
        writer.write_value(value)?;
        Ok(writer.stats())
    }

    /// Decode one value from `input`.
    pub fn decode(
        &self,
        input: DataInput<'_>,
        replay: &mut HandleReplay,
        loader: &dyn ClassLoader,
    ) -> CodecResult<Value> {
        ObjectReader::new(input, replay, self, loader).read_value()
    }
}

#[cfg(test)]
mod tests;
