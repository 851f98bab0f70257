// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for the marshaller and the cache-object layer.
//!
//! Two levels:
//!
//! - [`CodecError`] is raised by the recursive writer/reader internals and
//!   propagates unwrapped through nested calls.
//! - [`MarshalError`] is what public entry points return. Each entry point
//!   converts a `CodecError` once, attaching the object description or the
//!   class loader name that was in use.

use thiserror::Error;

/// Low-level codec failure, raised inside recursive encode/decode calls.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("write failed at offset {offset}: {reason}")]
    WriteFailed { offset: usize, reason: String },

    #[error("read failed at offset {offset}: {reason}")]
    ReadFailed { offset: usize, reason: String },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("unknown marker 0x{marker:02x} at offset {offset}")]
    UnknownMarker { marker: u8, offset: usize },

    #[error("handle at offset {offset} points to {target} which is outside the decoded window")]
    DanglingHandle { offset: usize, target: i64 },

    #[error("class with type id {type_id} cannot be resolved")]
    UnresolvedClass { type_id: i32 },

    #[error("unsupported type {type_name}: {reason}")]
    UnsupportedType { type_name: String, reason: String },

    #[error("corrupt footer: {0}")]
    CorruptFooter(String),

    #[error("not in an active {0} call")]
    NotActive(&'static str),

    #[error("object graph deeper than {0} levels")]
    DepthExceeded(usize),

    #[error("fallback marshaller failed: {0}")]
    Fallback(String),
}

impl CodecError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidData(reason.into())
    }

    pub(crate) fn unsupported(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

pub type CodecResult<T> = core::result::Result<T, CodecError>;

/// Error returned by the public marshaller and cache-object API.
#[derive(Debug, Error)]
pub enum MarshalError {
    /// Any encode fault. Carries a description of the object being written.
    #[error("failed to serialize object: {object}")]
    Serialization {
        object: String,
        #[source]
        source: CodecError,
    },

    /// Decode fault not caused by a missing class.
    #[error("failed to deserialize object with class loader: {loader}")]
    Deserialization {
        loader: String,
        #[source]
        source: CodecError,
    },

    /// The receiving class loader does not know the encoded type id.
    #[error(
        "failed to find class with type id {type_id} using class loader {loader} \
         (make sure the same versions of all classes are available on all nodes \
         or enable peer class loading)"
    )]
    UnresolvedClass { type_id: i32, loader: String },

    /// A blocked stream-pool acquisition was interrupted.
    #[error("failed to take object stream from pool (thread interrupted)")]
    Interrupted,

    /// A footer entry is inconsistent with the buffer bounds.
    #[error("corrupt field footer: {0}")]
    CorruptFooter(String),

    /// Descriptor resolution cannot classify a type.
    #[error("unsupported type {type_name}: {reason}")]
    UnsupportedType { type_name: String, reason: String },

    /// Partial field read failed for a reason other than a corrupt footer.
    #[error("failed to find field with name: {field}")]
    FieldLookup {
        field: String,
        #[source]
        source: CodecError,
    },

    /// Invalid marshaller configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MarshalError {
    /// Wrap an encode-side codec error with the failing object's description.
    ///
    /// Class and footer errors keep their dedicated variants.
    pub(crate) fn from_encode(object: impl Into<String>, source: CodecError) -> Self {
        match source {
            CodecError::UnsupportedType { type_name, reason } => {
                Self::UnsupportedType { type_name, reason }
            }
            other => Self::Serialization {
                object: object.into(),
                source: other,
            },
        }
    }

    /// Wrap a decode-side codec error with the class loader that was in use.
    pub(crate) fn from_decode(loader: impl Into<String>, source: CodecError) -> Self {
        match source {
            CodecError::UnresolvedClass { type_id } => Self::UnresolvedClass {
                type_id,
                loader: loader.into(),
            },
            CodecError::CorruptFooter(reason) => Self::CorruptFooter(reason),
            CodecError::UnsupportedType { type_name, reason } => {
                Self::UnsupportedType { type_name, reason }
            }
            other => Self::Deserialization {
                loader: loader.into(),
                source: other,
            },
        }
    }

    /// Wrap a partial-read error with the requested field name.
    pub(crate) fn from_field(field: impl Into<String>, loader: &str, source: CodecError) -> Self {
        match source {
            CodecError::CorruptFooter(reason) => Self::CorruptFooter(reason),
            CodecError::UnresolvedClass { type_id } => Self::UnresolvedClass {
                type_id,
                loader: loader.to_string(),
            },
            other => Self::FieldLookup {
                field: field.into(),
                source: other,
            },
        }
    }

    /// True for the only failure the caller is expected to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

pub type MarshalResult<T> = core::result::Result<T, MarshalError>;
