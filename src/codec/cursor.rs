// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Big-endian read/write cursors for XNS wire records.
//!
//! Every multi-byte XNS field is most-significant-byte-first, the inverse
//! of the little-endian CDR2 cursors used elsewhere in this family of
//! protocol stacks. `Cursor` borrows a byte region for decoding; `CursorMut`
//! borrows one for encoding. Both are bounds-checked against an explicit
//! `limit`, independent of the backing buffer's length, so a cursor can be
//! handed a larger scratch buffer and still refuse to read or write past
//! the logical end of a record.

use super::error::CodecError;

/// Generate bounds-checked big-endian write methods (mirrors `impl_read_be!`).
macro_rules! impl_write_be {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self, value: $type) -> Result<(), CodecError> {
            self.write_bytes(&value.to_be_bytes())
        }
    };
}

/// Generate bounds-checked big-endian read methods (mirrors `impl_write_be!`).
macro_rules! impl_read_be {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> Result<$type, CodecError> {
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.read_bytes($size)?);
            Ok(<$type>::from_be_bytes(bytes))
        }
    };
}

/// Read-only cursor over a borrowed byte region.
///
/// `base`/`limit` bound the region `[base, limit)` within `buffer`;
/// `position` is the current absolute offset and always satisfies
/// `base <= position <= limit`.
#[derive(Clone, Copy)]
pub struct Cursor<'a> {
    buffer: &'a [u8],
    base: usize,
    limit: usize,
    position: usize,
}

impl<'a> Cursor<'a> {
    /// Wrap the entire slice as a cursor positioned at its start.
    #[must_use]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            base: 0,
            limit: buffer.len(),
            position: 0,
        }
    }

    impl_read_be!(read_u8, u8, 1);
    impl_read_be!(read_u16, u16, 2);
    impl_read_be!(read_u32, u32, 4);

    /// Read a 48-bit big-endian integer (XNS host addresses), widened to `u64`.
    pub fn read_u48(&mut self) -> Result<u64, CodecError> {
        let bytes = self.read_bytes(6)?;
        let mut widened = [0u8; 8];
        widened[2..8].copy_from_slice(bytes);
        Ok(u64::from_be_bytes(widened))
    }

    /// Read `len` raw bytes, advancing the position.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.position + len > self.limit {
            return Err(CodecError::ShortBuffer {
                offset: self.position,
                needed: len,
                limit: self.limit,
            });
        }
        let slice = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// Slice `[position, position+block)` as the remainder of a fixed block
    /// without advancing past `block`'s end. Used for `BLOCK` fields that
    /// represent "the rest of the enclosing frame".
    pub fn read_block(&mut self) -> &'a [u8] {
        let slice = &self.buffer[self.position..self.limit];
        self.position = self.limit;
        slice
    }

    /// Independent cursor over `[offset, offset+length)`, relative to this
    /// cursor's base, sharing the same backing storage and lifetime.
    pub fn sub(&self, offset: usize, length: usize) -> Result<Cursor<'a>, CodecError> {
        let start = self.base + offset;
        let end = start + length;
        if end > self.buffer.len() {
            return Err(CodecError::ShortBuffer {
                offset: start,
                needed: length,
                limit: self.buffer.len(),
            });
        }
        Ok(Cursor {
            buffer: self.buffer,
            base: start,
            limit: end,
            position: start,
        })
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) -> Result<(), CodecError> {
        if position > self.limit {
            return Err(CodecError::ShortBuffer {
                offset: position,
                needed: 0,
                limit: self.limit,
            });
        }
        self.position = position;
        Ok(())
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.position)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Save the current position for a later `restore`.
    #[must_use]
    pub fn checkpoint(&self) -> usize {
        self.position
    }

    /// Rewind to a position previously returned by `checkpoint`.
    pub fn restore(&mut self, checkpoint: usize) {
        self.position = checkpoint;
    }
}

/// Mutable cursor over a borrowed byte region, used for encoding.
pub struct CursorMut<'a> {
    buffer: &'a mut [u8],
    limit: usize,
    position: usize,
}

impl<'a> CursorMut<'a> {
    #[must_use]
    pub fn new(buffer: &'a mut [u8]) -> Self {
        let limit = buffer.len();
        Self {
            buffer,
            limit,
            position: 0,
        }
    }

    impl_write_be!(write_u8, u8, 1);
    impl_write_be!(write_u16, u16, 2);
    impl_write_be!(write_u32, u32, 4);

    /// Write the low 48 bits of `value` as a big-endian XNS host address.
    pub fn write_u48(&mut self, value: u64) -> Result<(), CodecError> {
        let bytes = value.to_be_bytes();
        self.write_bytes(&bytes[2..8])
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), CodecError> {
        if self.position + data.len() > self.limit {
            return Err(CodecError::ShortBuffer {
                offset: self.position,
                needed: data.len(),
                limit: self.limit,
            });
        }
        self.buffer[self.position..self.position + data.len()].copy_from_slice(data);
        self.position += data.len();
        Ok(())
    }

    /// Zero-fill `count` bytes (used for the IDP 46-octet padding rule).
    pub fn write_zeros(&mut self, count: usize) -> Result<(), CodecError> {
        if self.position + count > self.limit {
            return Err(CodecError::ShortBuffer {
                offset: self.position,
                needed: count,
                limit: self.limit,
            });
        }
        for b in &mut self.buffer[self.position..self.position + count] {
            *b = 0;
        }
        self.position += count;
        Ok(())
    }

    /// Reborrow of `[offset, offset+length)` for nested encoding (e.g. patching
    /// a length or checksum field after the body has been written).
    pub fn sub(&mut self, offset: usize, length: usize) -> Result<CursorMut<'_>, CodecError> {
        if offset + length > self.buffer.len() {
            return Err(CodecError::ShortBuffer {
                offset,
                needed: length,
                limit: self.buffer.len(),
            });
        }
        Ok(CursorMut {
            buffer: &mut self.buffer[offset..offset + length],
            limit: length,
            position: 0,
        })
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) -> Result<(), CodecError> {
        if position > self.limit {
            return Err(CodecError::ShortBuffer {
                offset: position,
                needed: 0,
                limit: self.limit,
            });
        }
        self.position = position;
        Ok(())
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.position)
    }

    #[must_use]
    pub fn checkpoint(&self) -> usize {
        self.position
    }

    pub fn restore(&mut self, checkpoint: usize) {
        self.position = checkpoint;
    }

    /// Immutable view of everything written so far.
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.buffer[..self.position]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_primitives() {
        let mut buf = [0u8; 32];
        {
            let mut w = CursorMut::new(&mut buf);
            w.write_u8(0xAB).unwrap();
            w.write_u16(0xCDEF).unwrap();
            w.write_u32(0x1122_3344).unwrap();
            w.write_u48(0x0001_0203_0405).unwrap();
            w.write_bytes(&[9, 9]).unwrap();
            assert_eq!(w.position(), 1 + 2 + 4 + 6 + 2);
        }

        let mut r = Cursor::new(&buf);
        assert_eq!(r.read_u8().unwrap(), 0xAB);
        assert_eq!(r.read_u16().unwrap(), 0xCDEF);
        assert_eq!(r.read_u32().unwrap(), 0x1122_3344);
        assert_eq!(r.read_u48().unwrap(), 0x0001_0203_0405);
        assert_eq!(r.read_bytes(2).unwrap(), &[9, 9]);
    }

    #[test]
    fn write_overflow_reports_short_buffer() {
        let mut buf = [0u8; 2];
        let mut w = CursorMut::new(&mut buf);
        w.write_u16(1).unwrap();
        let err = w.write_u8(2).unwrap_err();
        assert_eq!(
            err,
            CodecError::ShortBuffer {
                offset: 2,
                needed: 1,
                limit: 2
            }
        );
    }

    #[test]
    fn read_overflow_reports_short_buffer() {
        let buf = [0u8; 1];
        let mut r = Cursor::new(&buf);
        r.read_u8().unwrap();
        let err = r.read_u8().unwrap_err();
        assert_eq!(
            err,
            CodecError::ShortBuffer {
                offset: 1,
                needed: 1,
                limit: 1
            }
        );
    }

    #[test]
    fn sub_cursor_shares_storage() {
        let buf = [1, 2, 3, 4, 5, 6];
        let outer = Cursor::new(&buf);
        let mut inner = outer.sub(2, 3).unwrap();
        assert_eq!(inner.read_bytes(3).unwrap(), &[3, 4, 5]);
    }

    #[test]
    fn checkpoint_restore_roundtrip() {
        let buf = [1, 2, 3, 4];
        let mut r = Cursor::new(&buf);
        r.read_u16().unwrap();
        let cp = r.checkpoint();
        r.read_u16().unwrap();
        assert!(r.is_empty());
        r.restore(cp);
        assert_eq!(r.remaining(), 2);
    }

    #[test]
    fn read_block_takes_remainder() {
        let buf = [1, 2, 3, 4, 5];
        let mut r = Cursor::new(&buf);
        r.read_u8().unwrap();
        assert_eq!(r.read_block(), &[2, 3, 4, 5]);
        assert!(r.is_empty());
    }
}
