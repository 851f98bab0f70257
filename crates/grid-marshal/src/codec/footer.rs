// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field-index footer.
//!
//! Layout of an object carrying a footer:
//!
//! ```text
//! +--------+---------+-------+-----------+--------------+-----------------+------+------------+
//! | OBJECT | type id | flags | total len | field bytes  | footer entries  | 0xFF | footer len |
//! |  u8    |  i32    |  u8   |   u32     |   ...        | 9 or 13 bytes   |  u8  |    u32     |
//! +--------+---------+-------+-----------+--------------+-----------------+------+------------+
//! ```
//!
//! Entry: `field id i32 | tag u8 | len u32 [| handle i32]`. The tag's high bit
//! marks a handle entry; the handle is relative to the object start.

use super::cursor::{DataInput, DataOutput};
use crate::config::{markers, EMPTY_FOOTER, FLAG_FOOTER, FOOTER_HANDLE_FLAG, FOOTER_LEN_SIZE};
use crate::error::{CodecError, CodecResult};
use crate::model::FieldType;

/// Marker + type id + flags.
pub const OBJECT_HEADER_LEN: usize = 1 + 4 + 1;

/// Header of an object that carries a footer (adds the total length word).
pub const FOOTER_OBJECT_HEADER_LEN: usize = OBJECT_HEADER_LEN + 4;

const ENTRY_LEN: usize = 4 + 1 + 4;
const HANDLE_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FooterEntry {
    pub field_id: i32,
    pub field_type: FieldType,
    /// Encoded length of the field's bytes.
    pub len: u32,
    /// Handle target relative to the owning object's first byte.
    pub handle: Option<i32>,
}

/// Collects the entries of one object while its fields are written.
#[derive(Debug, Default)]
pub struct FooterBuilder {
    entries: Vec<FooterEntry>,
}

impl FooterBuilder {
    pub fn with_capacity(fields: usize) -> Self {
        Self {
            entries: Vec::with_capacity(fields),
        }
    }

    pub fn put(&mut self, field_id: i32, field_type: FieldType, len: usize) -> CodecResult<()> {
        self.push(field_id, field_type, len, None)
    }

    pub fn put_handle(
        &mut self,
        field_id: i32,
        field_type: FieldType,
        len: usize,
        handle: i64,
    ) -> CodecResult<()> {
        let rel = i32::try_from(handle)
            .map_err(|_| CodecError::invalid(format!("handle distance {} exceeds i32", handle)))?;
        self.push(field_id, field_type, len, Some(rel))
    }

    fn push(
        &mut self,
        field_id: i32,
        field_type: FieldType,
        len: usize,
        handle: Option<i32>,
    ) -> CodecResult<()> {
        let len = u32::try_from(len)
            .map_err(|_| CodecError::invalid(format!("field length {} exceeds u32", len)))?;
        self.entries.push(FooterEntry {
            field_id,
            field_type,
            len,
            handle,
        });
        Ok(())
    }

    pub fn entries(&self) -> &[FooterEntry] {
        &self.entries
    }

    /// Append entries, sentinel and footer length.
    pub fn write(&self, out: &mut DataOutput) -> CodecResult<()> {
        let start = out.offset();
        for entry in &self.entries {
            out.write_i32(entry.field_id);
            match entry.handle {
                Some(handle) => {
                    out.write_u8(entry.field_type.tag() | FOOTER_HANDLE_FLAG);
                    out.write_u32(entry.len);
                    out.write_i32(handle);
                }
                None => {
                    out.write_u8(entry.field_type.tag());
                    out.write_u32(entry.len);
                }
            }
        }
        out.write_u8(EMPTY_FOOTER);
        out.write_len(out.offset() - start + FOOTER_LEN_SIZE)
    }
}

/// Footer entry with the absolute position of the field's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatedEntry {
    pub entry: FooterEntry,
    pub offset: usize,
}

/// Parsed, validated footer of one encoded object.
#[derive(Debug, Clone)]
pub struct FooterView {
    type_id: i32,
    obj_start: usize,
    obj_end: usize,
    entries: Vec<LocatedEntry>,
}

impl FooterView {
    /// Parse the footer of the object starting at `start`, bounded by
    /// `start + len`. `Ok(None)` if the bytes are not an object with a footer.
    pub fn parse(buffer: &[u8], start: usize, len: usize) -> CodecResult<Option<Self>> {
        let mut input = DataInput::window(buffer, start, len)?;
        if input.remaining() < OBJECT_HEADER_LEN || input.read_u8()? != markers::OBJECT {
            return Ok(None);
        }
        let type_id = input.read_i32()?;
        if input.read_u8()? & FLAG_FOOTER == 0 {
            return Ok(None);
        }
        let total = input.read_u32().map_err(corrupt)? as usize;
        let obj_end = start
            .checked_add(total)
            .filter(|&end| end <= input.end())
            .ok_or_else(|| {
                CodecError::CorruptFooter(format!(
                    "object length {} exceeds window of {} bytes",
                    total, len
                ))
            })?;
        let body_start = start + FOOTER_OBJECT_HEADER_LEN;
        if obj_end < body_start + 1 + FOOTER_LEN_SIZE {
            return Err(CodecError::CorruptFooter(format!(
                "object length {} too small for a footer",
                total
            )));
        }

        input.seek(obj_end - FOOTER_LEN_SIZE).map_err(corrupt)?;
        let footer_len = input.read_u32().map_err(corrupt)? as usize;
        if footer_len < 1 + FOOTER_LEN_SIZE || footer_len > obj_end - body_start {
            return Err(CodecError::CorruptFooter(format!(
                "footer length {} inconsistent with object length {}",
                footer_len, total
            )));
        }
        let footer_start = obj_end - footer_len;
        let sentinel_at = obj_end - FOOTER_LEN_SIZE - 1;
        if buffer[sentinel_at] != EMPTY_FOOTER {
            return Err(CodecError::CorruptFooter(format!(
                "missing footer terminator at offset {}",
                sentinel_at
            )));
        }

        input.seek(footer_start).map_err(corrupt)?;
        let mut entries = Vec::new();
        let mut field_offset = body_start;
        while input.offset() < sentinel_at {
            if sentinel_at - input.offset() < ENTRY_LEN {
                return Err(CodecError::CorruptFooter(format!(
                    "truncated footer entry at offset {}",
                    input.offset()
                )));
            }
            let field_id = input.read_i32()?;
            let tag = input.read_u8()?;
            let field_len = input.read_u32()?;
            let handle = if tag & FOOTER_HANDLE_FLAG != 0 {
                if sentinel_at - input.offset() < HANDLE_LEN {
                    return Err(CodecError::CorruptFooter(
                        "truncated handle in footer entry".into(),
                    ));
                }
                Some(input.read_i32()?)
            } else {
                None
            };
            let field_type = FieldType::from_tag(tag & !FOOTER_HANDLE_FLAG).ok_or_else(|| {
                CodecError::CorruptFooter(format!("unknown field tag 0x{:02x}", tag))
            })?;
            entries.push(LocatedEntry {
                entry: FooterEntry {
                    field_id,
                    field_type,
                    len: field_len,
                    handle,
                },
                offset: field_offset,
            });
            field_offset = field_offset
                .checked_add(field_len as usize)
                .filter(|&off| off <= footer_start)
                .ok_or_else(|| {
                    CodecError::CorruptFooter(format!(
                        "field lengths overrun the footer at offset {}",
                        footer_start
                    ))
                })?;
        }
        if input.offset() != sentinel_at {
            return Err(CodecError::CorruptFooter("footer entries overrun terminator".into()));
        }
        if field_offset != footer_start {
            return Err(CodecError::CorruptFooter(format!(
                "field lengths cover {} bytes, body has {}",
                field_offset - body_start,
                footer_start - body_start
            )));
        }

        Ok(Some(Self {
            type_id,
            obj_start: start,
            obj_end,
            entries,
        }))
    }

    pub fn type_id(&self) -> i32 {
        self.type_id
    }

    pub fn obj_start(&self) -> usize {
        self.obj_start
    }

    pub fn obj_end(&self) -> usize {
        self.obj_end
    }

    pub fn entries(&self) -> &[LocatedEntry] {
        &self.entries
    }

    pub fn find(&self, field_id: i32) -> Option<&LocatedEntry> {
        self.entries.iter().find(|e| e.entry.field_id == field_id)
    }

    /// Absolute position of a handle entry's target.
    pub fn handle_target(&self, entry: &FooterEntry) -> Option<i64> {
        entry.handle.map(|rel| self.obj_start as i64 + i64::from(rel))
    }
}

fn corrupt(err: CodecError) -> CodecError {
    CodecError::CorruptFooter(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-built object: two int fields, x=5 and y=9.
    fn encoded_point() -> Vec<u8> {
        let mut out = DataOutput::default();
        out.write_u8(markers::OBJECT);
        out.write_i32(42);
        out.write_u8(FLAG_FOOTER);
        out.write_u32(0);
        let mut footer = FooterBuilder::default();
        for (id, v) in [(1, 5), (2, 9)] {
            let before = out.offset();
            out.write_u8(markers::INT);
            out.write_i32(v);
            footer
                .put(id, FieldType::Int, out.offset() - before)
                .expect("put");
        }
        footer.write(&mut out).expect("footer");
        let total = out.offset() as u32;
        out.patch_u32(6, total).expect("patch");
        out.as_slice().to_vec()
    }

    #[test]
    fn test_parse_locates_fields() {
        let bytes = encoded_point();
        let view = FooterView::parse(&bytes, 0, bytes.len())
            .expect("valid")
            .expect("has footer");
        assert_eq!(view.type_id(), 42);
        assert_eq!(view.obj_end(), bytes.len());

        let y = view.find(2).expect("y present");
        assert_eq!(y.entry.len, 5);
        assert_eq!(y.offset, FOOTER_OBJECT_HEADER_LEN + 5);
        assert_eq!(bytes[y.offset], markers::INT);
        assert!(view.find(3).is_none());
    }

    #[test]
    fn test_no_footer_flag_is_none() {
        let mut bytes = encoded_point();
        bytes[5] = 0;
        assert!(FooterView::parse(&bytes, 0, bytes.len())
            .expect("ok")
            .is_none());
        assert!(FooterView::parse(&[markers::NULL], 0, 1)
            .expect("ok")
            .is_none());
    }

    #[test]
    fn test_inconsistent_lengths_are_corrupt() {
        let mut bytes = encoded_point();
        let footer_start = FOOTER_OBJECT_HEADER_LEN + 10;
        // First entry length 5 -> 6.
        bytes[footer_start + 5] = 6;
        let err = FooterView::parse(&bytes, 0, bytes.len()).unwrap_err();
        assert!(matches!(err, CodecError::CorruptFooter(_)), "{:?}", err);
    }

    #[test]
    fn test_truncated_window_is_corrupt() {
        let bytes = encoded_point();
        let err = FooterView::parse(&bytes, 0, bytes.len() - 1).unwrap_err();
        assert!(matches!(err, CodecError::CorruptFooter(_)));
    }

    #[test]
    fn test_missing_terminator_is_corrupt() {
        let mut bytes = encoded_point();
        let at = bytes.len() - FOOTER_LEN_SIZE - 1;
        bytes[at] = 0;
        let err = FooterView::parse(&bytes, 0, bytes.len()).unwrap_err();
        assert!(matches!(err, CodecError::CorruptFooter(_)));
    }
}
