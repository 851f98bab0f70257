// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Marshaller configuration - single source of truth for wire constants.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: wire constants (marker bytes, footer layout)
//! - **Level 2 (Dynamic)**: [`MarshallerConfig`] loaded from YAML and/or
//!   environment variables
//!
//! # Example
//!
//! ```
//! use grid_marshal::config::MarshallerConfig;
//!
//! let config = MarshallerConfig::from_yaml_str("pool_size: 8\nfields_indexing: true\n")
//!     .expect("valid yaml");
//! assert_eq!(config.pool_size, 8);
//! assert!(config.fields_indexing);
//! ```

use crate::error::{MarshalError, MarshalResult};
use serde::Deserialize;
#[cfg(feature = "config-loaders")]
use std::path::Path;

/// Marker bytes written in front of every encoded value.
pub mod markers {
    pub const NULL: u8 = 0x00;
    pub const HANDLE: u8 = 0x01;
    /// Object written by the fallback (non-footer) marshaller.
    pub const FALLBACK: u8 = 0x02;

    pub const BYTE: u8 = 0x03;
    pub const SHORT: u8 = 0x04;
    pub const INT: u8 = 0x05;
    pub const LONG: u8 = 0x06;
    pub const FLOAT: u8 = 0x07;
    pub const DOUBLE: u8 = 0x08;
    pub const CHAR: u8 = 0x09;
    pub const BOOLEAN: u8 = 0x0A;

    pub const BYTE_ARR: u8 = 0x0B;
    pub const SHORT_ARR: u8 = 0x0C;
    pub const INT_ARR: u8 = 0x0D;
    pub const LONG_ARR: u8 = 0x0E;
    pub const FLOAT_ARR: u8 = 0x0F;
    pub const DOUBLE_ARR: u8 = 0x10;
    pub const CHAR_ARR: u8 = 0x11;
    pub const BOOLEAN_ARR: u8 = 0x12;
    pub const OBJ_ARR: u8 = 0x13;

    pub const STRING: u8 = 0x14;
    pub const ENUM: u8 = 0x15;
    pub const CLASS: u8 = 0x16;

    pub const ARRAY_LIST: u8 = 0x17;
    pub const LINKED_LIST: u8 = 0x18;
    pub const HASH_MAP: u8 = 0x19;
    pub const HASH_SET: u8 = 0x1A;
    pub const LINKED_HASH_MAP: u8 = 0x1B;
    pub const LINKED_HASH_SET: u8 = 0x1C;
    pub const DATE: u8 = 0x1D;
    pub const PROPERTIES: u8 = 0x1E;

    /// User class instance (default fields, custom methods or externalizable).
    pub const OBJECT: u8 = 0x20;
}

/// Footer terminator written after the last footer entry.
pub const EMPTY_FOOTER: u8 = 0xFF;

/// Size of the trailing footer-length word.
pub const FOOTER_LEN_SIZE: usize = 4;

/// Type-tag bit marking a footer entry that carries a handle position.
pub const FOOTER_HANDLE_FLAG: u8 = 0x80;

/// Object-header flag: footer present.
pub const FLAG_FOOTER: u8 = 0x01;

/// Default number of pooled stream holders (0 = per-thread only).
pub const DEFAULT_POOL_SIZE: usize = 0;

/// Default recursion limit for encode/decode.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Default scratch output capacity per stream holder.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4 * 1024;

/// Default load factor for hash-based collections.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

pub const ENV_POOL_SIZE: &str = "GRID_MARSHAL_POOL_SIZE";
pub const ENV_MAX_DEPTH: &str = "GRID_MARSHAL_MAX_DEPTH";
pub const ENV_FIELDS_INDEXING: &str = "GRID_MARSHAL_FIELDS_INDEXING";

/// Runtime configuration of a [`crate::GridMarshaller`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MarshallerConfig {
    /// Number of stream holders shared across threads. Zero keeps one holder per thread.
    pub pool_size: usize,
    /// Maximum object graph depth accepted by encode/decode.
    pub max_depth: usize,
    /// Whether the cache processor reports fields indexing as enabled.
    pub fields_indexing: bool,
    /// Class names whose fields indexing is enabled at startup.
    pub indexed_types: Vec<String>,
    /// Initial capacity of each holder's scratch output buffer.
    pub initial_buffer_capacity: usize,
}

impl Default for MarshallerConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            fields_indexing: false,
            indexed_types: Vec::new(),
            initial_buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl MarshallerConfig {
    /// Parse a YAML document.
    #[cfg(feature = "config-loaders")]
    pub fn from_yaml_str(yaml: &str) -> MarshalResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| MarshalError::Config(format!("failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file.
    #[cfg(feature = "config-loaders")]
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> MarshalResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MarshalError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Apply `GRID_MARSHAL_*` environment overrides.
    pub fn with_env_overrides(mut self) -> MarshalResult<Self> {
        if let Ok(raw) = std::env::var(ENV_POOL_SIZE) {
            self.pool_size = parse_env(ENV_POOL_SIZE, &raw)?;
        }
        if let Ok(raw) = std::env::var(ENV_MAX_DEPTH) {
            self.max_depth = parse_env(ENV_MAX_DEPTH, &raw)?;
        }
        if let Ok(raw) = std::env::var(ENV_FIELDS_INDEXING) {
            self.fields_indexing = parse_env(ENV_FIELDS_INDEXING, &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> MarshalResult<()> {
        if self.max_depth == 0 {
            return Err(MarshalError::Config("max_depth must be > 0".into()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> MarshalResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| MarshalError::Config(format!("{}={} is not valid", name, raw)))
}
