// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Packet Exchange records (IDP socket 4): a transaction id matching a
//! request to its reply, a client type, and the client's payload block.

use crate::codec::{CodecResult, Cursor, CursorMut, Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PexClientType {
    Unspec,
    Time,
    Chs,
    TeleDebug,
    Other(u16),
}

impl PexClientType {
    #[must_use]
    pub fn to_u16(self) -> u16 {
        match self {
            PexClientType::Unspec => 0,
            PexClientType::Time => 1,
            PexClientType::Chs => 2,
            PexClientType::TeleDebug => 8,
            PexClientType::Other(v) => v,
        }
    }

    #[must_use]
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => PexClientType::Unspec,
            1 => PexClientType::Time,
            2 => PexClientType::Chs,
            8 => PexClientType::TeleDebug,
            other => PexClientType::Other(other),
        }
    }
}

/// A PEX packet. `id` is an opaque 32-bit transaction identifier the
/// requester picks and the responder echoes back unchanged, used to match
/// replies to requests over this connectionless exchange.
#[derive(Debug, Clone)]
pub struct Pex<'a> {
    pub id: u32,
    pub client_type: PexClientType,
    pub block: &'a [u8],
}

impl<'a> Decode<'a> for Pex<'a> {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        let id = cursor.read_u32()?;
        let client_type = PexClientType::from_u16(cursor.read_u16()?);
        let block = cursor.read_block();
        Ok(Pex { id, client_type, block })
    }
}

impl Encode for Pex<'_> {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        cursor.write_u32(self.id)?;
        cursor.write_u16(self.client_type.to_u16())?;
        cursor.write_bytes(self.block)
    }
}
