// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Boot protocol records (IDP socket 10), per
//! `APilot/15.0.1/Pilot/Friends/BootServerTypes.mesa`: workstation netboot
//! file transfer, either as whole UDP-style datagrams (`SimpleData`) or
//! riding an SPP connection (`SppRequest`). Codec-only: this crate does not
//! implement a netboot server.

use crate::codec::{CodecError, CodecResult, Cursor, CursorMut, Decode, Encode};

/// Boot File Number used to request GVWin's boot image, reused verbatim
/// from the original for symmetry with documentation and test fixtures.
pub const BFN_GVWIN: u64 = 0x0000_aa00_0e60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootType {
    SimpleRequest,
    SimpleData,
    SppRequest,
}

impl BootType {
    #[must_use]
    pub fn to_u16(self) -> u16 {
        match self {
            BootType::SimpleRequest => 1,
            BootType::SimpleData => 2,
            BootType::SppRequest => 3,
        }
    }

    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(BootType::SimpleRequest),
            2 => Some(BootType::SimpleData),
            3 => Some(BootType::SppRequest),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleRequest {
    pub boot_file_number: u64,
}

#[derive(Debug, Clone)]
pub struct SimpleData<'a> {
    pub boot_file_number: u64,
    /// Starts at 1; the original's readers bump this each packet.
    pub packet_number: u16,
    /// One page of the boot image, or empty to mark end of file.
    pub block: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SppRequest {
    pub boot_file_number: u64,
    pub connection_id: u16,
}

#[derive(Debug, Clone)]
pub enum BootBody<'a> {
    SimpleRequest(SimpleRequest),
    SimpleData(SimpleData<'a>),
    SppRequest(SppRequest),
}

#[derive(Debug, Clone)]
pub struct Boot<'a> {
    pub boot_type: BootType,
    pub body: BootBody<'a>,
}

impl<'a> Decode<'a> for Boot<'a> {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        let raw_type = cursor.read_u16()?;
        let boot_type = BootType::from_u16(raw_type)
            .ok_or(CodecError::BadValue { field: "boot.type", value: raw_type as u32 })?;
        let body = match boot_type {
            BootType::SimpleRequest => {
                BootBody::SimpleRequest(SimpleRequest { boot_file_number: cursor.read_u48()? })
            }
            BootType::SimpleData => {
                let boot_file_number = cursor.read_u48()?;
                let packet_number = cursor.read_u16()?;
                let block = cursor.read_block();
                BootBody::SimpleData(SimpleData { boot_file_number, packet_number, block })
            }
            BootType::SppRequest => {
                let boot_file_number = cursor.read_u48()?;
                let connection_id = cursor.read_u16()?;
                BootBody::SppRequest(SppRequest { boot_file_number, connection_id })
            }
        };
        Ok(Boot { boot_type, body })
    }
}

impl Encode for Boot<'_> {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        cursor.write_u16(self.boot_type.to_u16())?;
        match &self.body {
            BootBody::SimpleRequest(req) => cursor.write_u48(req.boot_file_number),
            BootBody::SimpleData(data) => {
                cursor.write_u48(data.boot_file_number)?;
                cursor.write_u16(data.packet_number)?;
                cursor.write_bytes(data.block)
            }
            BootBody::SppRequest(req) => {
                cursor.write_u48(req.boot_file_number)?;
                cursor.write_u16(req.connection_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_data_roundtrip() {
        let boot = Boot {
            boot_type: BootType::SimpleData,
            body: BootBody::SimpleData(SimpleData {
                boot_file_number: BFN_GVWIN,
                packet_number: 1,
                block: &[1, 2, 3],
            }),
        };
        let mut buf = [0u8; 32];
        let mut w = CursorMut::new(&mut buf);
        boot.encode(&mut w).unwrap();

        let mut r = Cursor::new(&buf[..w.position()]);
        let decoded = Boot::decode(&mut r).unwrap();
        match decoded.body {
            BootBody::SimpleData(data) => {
                assert_eq!(data.boot_file_number, BFN_GVWIN);
                assert_eq!(data.packet_number, 1);
                assert_eq!(data.block, &[1, 2, 3]);
            }
            _ => panic!("expected SimpleData"),
        }
    }
}
