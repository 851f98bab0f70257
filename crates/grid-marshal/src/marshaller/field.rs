// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Footer-aware partial reads.
//!
//! A field is located through the object's footer and decoded on its own.
//! A field carried by handle whose target is itself a footer object is not
//! decoded at all: the caller gets a [`ByteWindow`] over the target's bytes.

use super::GridMarshaller;
use crate::codec::footer::{FooterView, OBJECT_HEADER_LEN};
use crate::codec::{DataInput, HandleReplay};
use crate::config::{markers, FLAG_FOOTER};
use crate::descriptor::{field_id, ClassLoader};
use crate::error::{CodecError, CodecResult, MarshalError, MarshalResult};
use crate::model::Value;
use std::fmt;
use std::sync::Arc;

/// Owned buffer plus the `[start, start + len)` span of one encoded value.
#[derive(Clone)]
pub struct ByteWindow {
    buf: Arc<[u8]>,
    start: usize,
    len: usize,
}

impl ByteWindow {
    /// `None` if the span does not fit in `buf`.
    pub fn new(buf: Arc<[u8]>, start: usize, len: usize) -> Option<Self> {
        let end = start.checked_add(len)?;
        (end <= buf.len()).then_some(Self { buf, start, len })
    }

    /// Window covering all of `bytes`.
    pub fn owned(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Self {
            buf: Arc::from(bytes),
            start: 0,
            len,
        }
    }

    pub fn buffer(&self) -> &Arc<[u8]> {
        &self.buf
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[self.start..self.start + self.len]
    }

    /// True when the window spans its whole buffer.
    pub fn is_detached(&self) -> bool {
        self.start == 0 && self.len == self.buf.len()
    }

    /// Copy the span into a buffer of its own.
    pub fn detach(&self) -> Self {
        Self::owned(self.as_slice().to_vec())
    }
}

impl fmt::Debug for ByteWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteWindow")
            .field("start", &self.start)
            .field("len", &self.len)
            .field("buffer_len", &self.buf.len())
            .finish()
    }
}

/// Result of a partial field read.
#[derive(Debug, Clone)]
pub enum FieldRead {
    /// The field decoded on its own.
    Value(Value),
    /// Handle to an indexed object, left encoded.
    Serialized(ByteWindow),
}

impl FieldRead {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Serialized(_) => None,
        }
    }
}

impl GridMarshaller {
    /// Whether the object in `bytes[off..off + len]` has a footer entry for
    /// `name`. Objects without a footer report `false` for every name.
    pub fn has_field(&self, name: &str, bytes: &[u8], off: usize, len: usize) -> MarshalResult<bool> {
        let footer = FooterView::parse(bytes, off, len).map_err(|err| lookup_error(name, err))?;
        Ok(footer.is_some_and(|f| f.find(field_id(name)).is_some()))
    }

    /// Read one field of the object in `bytes[off..off + len]` without
    /// decoding the others.
    ///
    /// `Ok(None)` when the object has no footer or no entry for `name`.
    pub fn read_field(
        &self,
        name: &str,
        bytes: &Arc<[u8]>,
        off: usize,
        len: usize,
        loader: &dyn ClassLoader,
    ) -> MarshalResult<Option<FieldRead>> {
        let footer = match FooterView::parse(bytes, off, len) {
            Ok(Some(footer)) => footer,
            Ok(None) => return Ok(None),
            Err(err) => return Err(lookup_error(name, err)),
        };
        let id = field_id(name);
        let located = match footer.find(id) {
            Some(located) => *located,
            None => return Ok(None),
        };

        if let Some(expected) = self
            .env
            .index
            .get(footer.type_id())
            .and_then(|index| index.field_type(id))
        {
            if expected != located.entry.field_type {
                return Err(MarshalError::CorruptFooter(format!(
                    "field {} recorded as {:?}, indexed as {:?}",
                    name, located.entry.field_type, expected
                )));
            }
        }

        let mut guard = self.pool.acquire()?;
        let replay = &mut guard.replay;
        let result = match footer.handle_target(&located.entry) {
            Some(target) => self.read_handle_target(bytes, target, replay, loader),
            None => {
                let entry = located.entry;
                if let Some(width) = entry.field_type.width() {
                    if entry.len as usize != width + 1 {
                        return Err(MarshalError::CorruptFooter(format!(
                            "field {} ({:?}) spans {} bytes",
                            name, entry.field_type, entry.len
                        )));
                    }
                }
                self.decode_at(bytes, off, len, located.offset, replay, loader)
                    .map(FieldRead::Value)
            }
        };
        result.map(Some).map_err(|err| MarshalError::from_field(name, loader.name(), err))
    }

    /// Indexed targets stay encoded; anything else is decoded in place.
    fn read_handle_target(
        &self,
        bytes: &Arc<[u8]>,
        target: i64,
        replay: &mut HandleReplay,
        loader: &dyn ClassLoader,
    ) -> CodecResult<FieldRead> {
        let start = usize::try_from(target)
            .ok()
            .filter(|&t| t < bytes.len())
            .ok_or_else(|| {
                CodecError::CorruptFooter(format!(
                    "handle target {} outside buffer of {} bytes",
                    target,
                    bytes.len()
                ))
            })?;

        if let Some(total) = footer_object_len(bytes, start)? {
            let window = ByteWindow::new(Arc::clone(bytes), start, total).ok_or_else(|| {
                CodecError::CorruptFooter(format!(
                    "object at {} claims {} bytes, buffer holds {}",
                    start,
                    total,
                    bytes.len()
                ))
            })?;
            return Ok(FieldRead::Serialized(window));
        }
        self.decode_at(bytes, 0, bytes.len(), start, replay, loader)
            .map(FieldRead::Value)
    }

    fn decode_at(
        &self,
        bytes: &[u8],
        off: usize,
        len: usize,
        at: usize,
        replay: &mut HandleReplay,
        loader: &dyn ClassLoader,
    ) -> CodecResult<Value> {
        let mut input = DataInput::window(bytes, off, len)?;
        input.seek(at)?;
        self.env.decode(input, replay, loader)
    }
}

/// Total length of the footer object starting at `start`, if it is one.
fn footer_object_len(bytes: &[u8], start: usize) -> CodecResult<Option<usize>> {
    let mut input = DataInput::new(bytes);
    input.seek(start)?;
    if input.remaining() < OBJECT_HEADER_LEN || input.read_u8()? != markers::OBJECT {
        return Ok(None);
    }
    input.read_i32()?;
    if input.read_u8()? & FLAG_FOOTER == 0 {
        return Ok(None);
    }
    input
        .read_u32()
        .map(|total| Some(total as usize))
        .map_err(|err| CodecError::CorruptFooter(err.to_string()))
}

fn lookup_error(name: &str, err: CodecError) -> MarshalError {
    MarshalError::from_field(name, "", err)
}
