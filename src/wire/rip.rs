// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Routing Information Protocol records (IDP socket 1).

use crate::codec::{CodecResult, Cursor, CursorMut, Decode, Encode};

/// Distance reported for a network that cannot be reached.
pub const HOP_INFINITY: u16 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RipType {
    Request,
    Response,
}

impl RipType {
    #[must_use]
    pub fn to_u16(self) -> u16 {
        match self {
            RipType::Request => 1,
            RipType::Response => 2,
        }
    }

    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(RipType::Request),
            2 => Some(RipType::Response),
            _ => None,
        }
    }
}

/// One `(net, hop)` entry, either a route query or a route advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RipEntry {
    pub net: u32,
    pub hop: u16,
}

impl<'a> Decode<'a> for RipEntry {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        Ok(RipEntry { net: cursor.read_u32()?, hop: cursor.read_u16()? })
    }
}

impl Encode for RipEntry {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        cursor.write_u32(self.net)?;
        cursor.write_u16(self.hop)
    }
}

/// A RIP packet: a type followed by as many entries as fit the payload.
/// The original reads entries until the buffer is exhausted rather than
/// carrying an explicit count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rip {
    pub rip_type: RipType,
    pub entries: Vec<RipEntry>,
}

impl<'a> Decode<'a> for Rip {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        let raw_type = cursor.read_u16()?;
        let rip_type = RipType::from_u16(raw_type)
            .ok_or(crate::codec::CodecError::BadValue { field: "rip.type", value: raw_type as u32 })?;
        let mut entries = Vec::new();
        while !cursor.is_empty() {
            entries.push(RipEntry::decode(cursor)?);
        }
        Ok(Rip { rip_type, entries })
    }
}

impl Encode for Rip {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        cursor.write_u16(self.rip_type.to_u16())?;
        for entry in &self.entries {
            entry.encode(cursor)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_request_with_entries() {
        let rip = Rip {
            rip_type: RipType::Response,
            entries: vec![RipEntry { net: 1, hop: 0 }, RipEntry { net: 2, hop: HOP_INFINITY }],
        };
        let mut buf = [0u8; 16];
        let mut w = CursorMut::new(&mut buf);
        rip.encode(&mut w).unwrap();

        let mut r = Cursor::new(&buf[..w.position()]);
        let decoded = Rip::decode(&mut r).unwrap();
        assert_eq!(decoded, rip);
    }

    #[test]
    fn roundtrip_empty_entry_list() {
        let rip = Rip { rip_type: RipType::Request, entries: vec![] };
        let mut buf = [0u8; 4];
        let mut w = CursorMut::new(&mut buf);
        rip.encode(&mut w).unwrap();

        let mut r = Cursor::new(&buf[..w.position()]);
        let decoded = Rip::decode(&mut r).unwrap();
        assert_eq!(decoded, rip);
    }
}
