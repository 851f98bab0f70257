// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Little-endian output buffer and bounds-checked input window.

use crate::error::{CodecError, CodecResult};

/// Generate append methods for primitive types.
macro_rules! impl_write_le {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) {
            self.buffer.extend_from_slice(&value.to_le_bytes());
        }
    };
}

/// Generate read methods for primitive types.
///
/// Each generated method checks the window bound (returns
/// `CodecError::ReadFailed`), decodes via `from_le_bytes()` and advances.
macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> CodecResult<$type> {
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.read_bytes($size)?);
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// Growable output buffer. Reused across calls by the stream pool.
#[derive(Debug, Default)]
pub struct DataOutput {
    buffer: Vec<u8>,
}

impl DataOutput {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Current write position.
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Clear contents, keeping the allocation.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Drop oversized allocations kept from a previous large graph.
    pub fn shrink_to(&mut self, capacity: usize) {
        if self.buffer.capacity() > capacity.saturating_mul(4) {
            self.buffer.shrink_to(capacity);
        }
    }

    impl_write_le!(write_u8, u8);
    impl_write_le!(write_i8, i8);
    impl_write_le!(write_u16, u16);
    impl_write_le!(write_i16, i16);
    impl_write_le!(write_u32, u32);
    impl_write_le!(write_i32, i32);
    impl_write_le!(write_u64, u64);
    impl_write_le!(write_i64, i64);

    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.write_u64(value.to_bits());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Length-prefixed UTF-8.
    pub fn write_utf(&mut self, value: &str) -> CodecResult<()> {
        self.write_len(value.len())?;
        self.write_bytes(value.as_bytes());
        Ok(())
    }

    /// u32 length or element count.
    pub fn write_len(&mut self, len: usize) -> CodecResult<()> {
        let len = u32::try_from(len).map_err(|_| CodecError::WriteFailed {
            offset: self.offset(),
            reason: format!("length {} exceeds u32", len),
        })?;
        self.write_u32(len);
        Ok(())
    }

    /// Overwrite a previously reserved u32.
    pub fn patch_u32(&mut self, at: usize, value: u32) -> CodecResult<()> {
        if at + 4 > self.buffer.len() {
            return Err(CodecError::WriteFailed {
                offset: at,
                reason: "patch position outside written data".into(),
            });
        }
        self.buffer[at..at + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}

/// Read cursor over `buffer[start..end]`. Offsets are absolute buffer positions.
#[derive(Debug, Clone)]
pub struct DataInput<'a> {
    buffer: &'a [u8],
    offset: usize,
    start: usize,
    end: usize,
}

impl<'a> DataInput<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            offset: 0,
            start: 0,
            end: buffer.len(),
        }
    }

    /// Cursor over a window of `buffer`.
    pub fn window(buffer: &'a [u8], start: usize, len: usize) -> CodecResult<Self> {
        let end = start.checked_add(len).filter(|&end| end <= buffer.len());
        match end {
            Some(end) => Ok(Self {
                buffer,
                offset: start,
                start,
                end,
            }),
            None => Err(CodecError::ReadFailed {
                offset: start,
                reason: format!("window of {} bytes exceeds buffer of {}", len, buffer.len()),
            }),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(self.offset)
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.end
    }

    /// Move to an absolute position inside the window.
    pub fn seek(&mut self, pos: usize) -> CodecResult<()> {
        if pos < self.start || pos > self.end {
            return Err(CodecError::ReadFailed {
                offset: pos,
                reason: format!("seek outside window {}..{}", self.start, self.end),
            });
        }
        self.offset = pos;
        Ok(())
    }

    impl_read_le!(read_u8, u8, 1);
    impl_read_le!(read_i8, i8, 1);
    impl_read_le!(read_u16, u16, 2);
    impl_read_le!(read_i16, i16, 2);
    impl_read_le!(read_u32, u32, 4);
    impl_read_le!(read_i32, i32, 4);
    impl_read_le!(read_u64, u64, 8);
    impl_read_le!(read_i64, i64, 8);

    pub fn read_f32(&mut self) -> CodecResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> CodecResult<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    pub fn read_bool(&mut self) -> CodecResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::invalid(format!(
                "boolean byte 0x{:02x} at offset {}",
                other,
                self.offset - 1
            ))),
        }
    }

    pub fn peek_u8(&self) -> CodecResult<u8> {
        if self.offset >= self.end {
            return Err(self.eof());
        }
        Ok(self.buffer[self.offset])
    }

    pub fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.eof());
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn read_utf(&mut self) -> CodecResult<String> {
        let len = self.read_count(1)?;
        let at = self.offset;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CodecError::invalid(format!("invalid UTF-8 at offset {}: {}", at, e)))
    }

    /// u32 element count, rejected if `count * min_elem_size` cannot fit in the
    /// rest of the window.
    pub fn read_count(&mut self, min_elem_size: usize) -> CodecResult<usize> {
        let at = self.offset;
        let count = self.read_u32()? as usize;
        if count.saturating_mul(min_elem_size) > self.remaining() {
            return Err(CodecError::ReadFailed {
                offset: at,
                reason: format!("count {} exceeds remaining {} bytes", count, self.remaining()),
            });
        }
        Ok(count)
    }

    fn eof(&self) -> CodecError {
        CodecError::ReadFailed {
            offset: self.offset,
            reason: "unexpected end of buffer".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_U16: u16 = 0xCDEF;
    const TEST_U32: u32 = 0x1234_5678;
    const TEST_U64: u64 = 0x1122_3344_5566_7788;

    #[test]
    fn test_little_endian_layout() {
        let mut out = DataOutput::default();
        out.write_u16(TEST_U16);
        out.write_u32(TEST_U32);
        assert_eq!(out.as_slice(), &[0xEF, 0xCD, 0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn test_read_back() {
        let mut out = DataOutput::default();
        out.write_u64(TEST_U64);
        out.write_f64(std::f64::consts::PI);
        out.write_bool(true);
        out.write_utf("héllo").expect("utf");

        let mut input = DataInput::new(out.as_slice());
        assert_eq!(input.read_u64().expect("u64"), TEST_U64);
        assert_eq!(input.read_f64().expect("f64"), std::f64::consts::PI);
        assert!(input.read_bool().expect("bool"));
        assert_eq!(input.read_utf().expect("utf"), "héllo");
        assert!(input.is_eof());
    }

    #[test]
    fn test_read_overflow_reports_offset() {
        let buffer = [0u8; 1];
        let mut input = DataInput::new(&buffer);
        assert_eq!(input.read_u8().expect("Read u8 should succeed"), 0);

        match input.read_u8().unwrap_err() {
            CodecError::ReadFailed { offset, reason } => {
                assert_eq!(offset, 1);
                assert_eq!(reason, "unexpected end of buffer");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_window_bounds_reads() {
        let buffer = [1u8, 2, 3, 4, 5, 6];
        let mut input = DataInput::window(&buffer, 2, 2).expect("window");
        assert_eq!(input.read_u8().expect("in window"), 3);
        assert_eq!(input.read_u8().expect("in window"), 4);
        assert!(input.read_u8().is_err());
        assert!(input.seek(1).is_err());
        assert!(DataInput::window(&buffer, 4, 3).is_err());
    }

    #[test]
    fn test_patch_u32() {
        let mut out = DataOutput::default();
        out.write_u32(0);
        out.patch_u32(0, TEST_U32).expect("patch");
        assert_eq!(out.as_slice(), &TEST_U32.to_le_bytes());
        assert!(out.patch_u32(2, 1).is_err());
    }

    #[test]
    fn test_read_count_rejects_oversized() {
        let mut out = DataOutput::default();
        out.write_u32(1_000_000);
        let mut input = DataInput::new(out.as_slice());
        assert!(input.read_count(1).is_err());
    }
}
