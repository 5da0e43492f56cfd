// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Echo protocol records (IDP socket 2): a type tag followed by an
//! arbitrary block that a reflector copies back verbatim.

use crate::codec::{CodecError, CodecResult, Cursor, CursorMut, Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoType {
    Request,
    Reply,
}

impl EchoType {
    #[must_use]
    pub fn to_u16(self) -> u16 {
        match self {
            EchoType::Request => 1,
            EchoType::Reply => 2,
        }
    }

    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(EchoType::Request),
            2 => Some(EchoType::Reply),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Echo<'a> {
    pub echo_type: EchoType,
    pub block: &'a [u8],
}

impl<'a> Decode<'a> for Echo<'a> {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        let raw_type = cursor.read_u16()?;
        let echo_type = EchoType::from_u16(raw_type)
            .ok_or(CodecError::BadValue { field: "echo.type", value: raw_type as u32 })?;
        let block = cursor.read_block();
        Ok(Echo { echo_type, block })
    }
}

impl Encode for Echo<'_> {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        cursor.write_u16(self.echo_type.to_u16())?;
        cursor.write_bytes(self.block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_echoes_the_request_block() {
        let request = Echo { echo_type: EchoType::Request, block: b"ping" };
        let mut buf = [0u8; 16];
        let mut w = CursorMut::new(&mut buf);
        request.encode(&mut w).unwrap();
        let request_len = w.position();

        let mut r = Cursor::new(&buf[..request_len]);
        let decoded = Echo::decode(&mut r).unwrap();
        assert_eq!(decoded.echo_type, EchoType::Request);

        let reply = Echo { echo_type: EchoType::Reply, block: decoded.block };
        let mut reply_buf = [0u8; 16];
        let mut rw = CursorMut::new(&mut reply_buf);
        reply.encode(&mut rw).unwrap();
        assert_eq!(&reply_buf[2..rw.position()], b"ping");
    }
}
