// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error protocol records (IDP socket 3).
//!
//! Named `error` for its wire role; re-exported as `wire::error::Packet` to
//! avoid colliding with `codec::CodecError` and friends at call sites.

use crate::codec::{CodecResult, Cursor, CursorMut, Decode, Encode};

/// Error code, split into the destination-detected range (0..=6) and the
/// in-route range (0o1000..=0o1006) the original reserves for intermediate
/// routers. This core never forwards IDP traffic so it only ever emits the
/// destination-detected half, but decodes the full enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Unspec,
    BadChecksum,
    NoSocket,
    ResourceLimit,
    ListenReject,
    InvalidPacketType,
    ProtocolViolation,
    UnspecifiedInRoute,
    Inconsistent,
    CantGetThere,
    ExcessHops,
    TooBig,
    CongestionWarning,
    CongestionDiscard,
    Other(u16),
}

impl ErrorCode {
    #[must_use]
    pub fn to_u16(self) -> u16 {
        match self {
            ErrorCode::Unspec => 0,
            ErrorCode::BadChecksum => 1,
            ErrorCode::NoSocket => 2,
            ErrorCode::ResourceLimit => 3,
            ErrorCode::ListenReject => 4,
            ErrorCode::InvalidPacketType => 5,
            ErrorCode::ProtocolViolation => 6,
            ErrorCode::UnspecifiedInRoute => 0o1000,
            ErrorCode::Inconsistent => 0o1001,
            ErrorCode::CantGetThere => 0o1002,
            ErrorCode::ExcessHops => 0o1003,
            ErrorCode::TooBig => 0o1004,
            ErrorCode::CongestionWarning => 0o1005,
            ErrorCode::CongestionDiscard => 0o1006,
            ErrorCode::Other(v) => v,
        }
    }

    #[must_use]
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => ErrorCode::Unspec,
            1 => ErrorCode::BadChecksum,
            2 => ErrorCode::NoSocket,
            3 => ErrorCode::ResourceLimit,
            4 => ErrorCode::ListenReject,
            5 => ErrorCode::InvalidPacketType,
            6 => ErrorCode::ProtocolViolation,
            0o1000 => ErrorCode::UnspecifiedInRoute,
            0o1001 => ErrorCode::Inconsistent,
            0o1002 => ErrorCode::CantGetThere,
            0o1003 => ErrorCode::ExcessHops,
            0o1004 => ErrorCode::TooBig,
            0o1005 => ErrorCode::CongestionWarning,
            0o1006 => ErrorCode::CongestionDiscard,
            other => ErrorCode::Other(other),
        }
    }
}

/// An Error record: a code, a code-specific parameter (e.g. the largest
/// packet size that fit, for [`ErrorCode::TooBig`]), and the offending
/// packet (or a prefix of it) as the trailing block.
#[derive(Debug, Clone)]
pub struct Packet<'a> {
    pub code: ErrorCode,
    pub param: u16,
    pub block: &'a [u8],
}

impl<'a> Decode<'a> for Packet<'a> {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        let code = ErrorCode::from_u16(cursor.read_u16()?);
        let param = cursor.read_u16()?;
        let block = cursor.read_block();
        Ok(Packet { code, param, block })
    }
}

impl Encode for Packet<'_> {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        cursor.write_u16(self.code.to_u16())?;
        cursor.write_u16(self.param)?;
        cursor.write_bytes(self.block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_no_socket_error() {
        let packet = Packet { code: ErrorCode::NoSocket, param: 0, block: &[1, 2, 3, 4] };
        let mut buf = [0u8; 16];
        let mut w = CursorMut::new(&mut buf);
        packet.encode(&mut w).unwrap();

        let mut r = Cursor::new(&buf[..w.position()]);
        let decoded = Packet::decode(&mut r).unwrap();
        assert_eq!(decoded.code.to_u16(), ErrorCode::NoSocket.to_u16());
        assert_eq!(decoded.block, &[1, 2, 3, 4]);
    }

    #[test]
    fn octal_codes_roundtrip() {
        assert_eq!(ErrorCode::from_u16(0o1004).to_u16(), ErrorCode::TooBig.to_u16());
    }
}
