// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The Internetwork Datagram Protocol header: XNS's IP-equivalent.

use crate::codec::{CodecError, CodecResult, Cursor, CursorMut, Decode, Encode};

/// Checksum value meaning "checksum not computed".
pub const CHECKSUM_NOCHECK: u16 = 0xFFFF;

/// Fixed IDP header length in octets (checksum..srcSocket, block excluded).
pub const HEADER_LENGTH: usize = 30;
/// Minimum length of an IDP packet's payload region after Ethernet padding
/// rules are applied (`Ethernet::MINIMUM_PACKET_LENGTH` minus its header).
pub const MINIMUM_PACKET_LENGTH: usize = 46;

/// Well-known IDP packet type values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Rip,
    Echo,
    Error,
    Pex,
    Spp,
    Boot,
    Other(u8),
}

impl PacketType {
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            PacketType::Rip => 1,
            PacketType::Echo => 2,
            PacketType::Error => 3,
            PacketType::Pex => 4,
            PacketType::Spp => 5,
            PacketType::Boot => 9,
            PacketType::Other(v) => v,
        }
    }

    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PacketType::Rip,
            2 => PacketType::Echo,
            3 => PacketType::Error,
            4 => PacketType::Pex,
            5 => PacketType::Spp,
            9 => PacketType::Boot,
            other => PacketType::Other(other),
        }
    }
}

/// Well-known socket numbers (1..=3000 decimal is the well-known range;
/// everything above is ephemeral and assigned by the dispatcher).
pub mod socket {
    pub const MAX_WELLKNOWN: u16 = 3000;
    pub const RIP: u16 = 1;
    pub const ECHO: u16 = 2;
    pub const ERROR: u16 = 3;
    pub const ENVOY: u16 = 4;
    pub const COURIER: u16 = 5;
    pub const CHS_OLD: u16 = 7;
    pub const TIME: u16 = 8;
    pub const BOOT: u16 = 10;
    pub const DIAG: u16 = 19;
    pub const CHS: u16 = 20;
    pub const AUTH: u16 = 21;
    pub const MAIL: u16 = 22;
    pub const NETEXEC: u16 = 23;
    pub const WSINFO: u16 = 24;
    pub const BINDING: u16 = 28;
    pub const GERM: u16 = 35;
    pub const TELEDEBUG: u16 = 48;
}

/// An IDP datagram address: network, host and socket triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub net: u32,
    pub host: u64,
    pub socket: u16,
}

/// The IDP header and its trailing `BLOCK` payload.
///
/// `length` is not modeled as a separate field: it is implied by
/// `payload.len()` and recomputed on encode, matching the original's
/// length-then-checksum write order (`IDP::toByteBuffer` sets length before
/// computing the checksum over it).
#[derive(Debug, Clone)]
pub struct Idp<'a> {
    pub checksum: u16,
    pub control: u8,
    pub packet_type: PacketType,
    pub dst: Address,
    pub src: Address,
    pub payload: &'a [u8],
}

impl<'a> Idp<'a> {
    /// Length field value: header plus payload, excluding Ethernet padding.
    #[must_use]
    pub fn length(&self) -> u16 {
        (HEADER_LENGTH + self.payload.len()) as u16
    }

    #[must_use]
    pub fn is_checksummed(&self) -> bool {
        self.checksum != CHECKSUM_NOCHECK
    }
}

impl<'a> Decode<'a> for Idp<'a> {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        let checksum = cursor.read_u16()?;
        let length = cursor.read_u16()? as usize;
        if length < HEADER_LENGTH {
            return Err(CodecError::BadValue { field: "idp.length", value: length as u32 });
        }
        let control = cursor.read_u8()?;
        let packet_type = PacketType::from_u8(cursor.read_u8()?);
        let dst = Address {
            net: cursor.read_u32()?,
            host: cursor.read_u48()?,
            socket: cursor.read_u16()?,
        };
        let src = Address {
            net: cursor.read_u32()?,
            host: cursor.read_u48()?,
            socket: cursor.read_u16()?,
        };
        let payload_len = length - HEADER_LENGTH;
        let payload = cursor.read_bytes(payload_len)?;
        Ok(Idp { checksum, control, packet_type, dst, src, payload })
    }
}

impl Encode for Idp<'_> {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        cursor.write_u16(self.checksum)?;
        cursor.write_u16(self.length())?;
        cursor.write_u8(self.control)?;
        cursor.write_u8(self.packet_type.to_u8())?;
        cursor.write_u32(self.dst.net)?;
        cursor.write_u48(self.dst.host)?;
        cursor.write_u16(self.dst.socket)?;
        cursor.write_u32(self.src.net)?;
        cursor.write_u48(self.src.host)?;
        cursor.write_u16(self.src.socket)?;
        cursor.write_bytes(self.payload)?;
        let written = HEADER_LENGTH + self.payload.len();
        if written < MINIMUM_PACKET_LENGTH {
            cursor.write_zeros(MINIMUM_PACKET_LENGTH - written)?;
        }
        Ok(())
    }
}

/// Compute the IDP checksum over `packet[2..length]` (the length field
/// through the end of the IDP header + payload, excluding the checksum
/// field itself and excluding any Ethernet padding past `length`).
///
/// This is the PUP/XNS one's-complement-with-rotate checksum: each 16-bit
/// big-endian word is added into a running sum, folded back into 16 bits on
/// overflow, then the sum is rotated left by one bit (again folding on
/// overflow) before the next word is added. `packet` must start at the
/// IDP header's first byte (the checksum field).
#[must_use]
pub fn compute_checksum(packet: &[u8]) -> u16 {
    let length = u16::from_be_bytes([packet[2], packet[3]]) as usize;
    let mut data = &packet[2..length];
    let mut sum: u32 = 0;
    let mut step = |word: u32, sum: &mut u32| {
        *sum += word;
        if *sum >= 0x1_0000 {
            *sum = (*sum + 1) & 0xFFFF;
        }
        *sum <<= 1;
        if *sum >= 0x1_0000 {
            *sum = (*sum + 1) & 0xFFFF;
        }
    };
    while data.len() >= 2 {
        let word = u32::from(data[0]) << 8 | u32::from(data[1]);
        data = &data[2..];
        step(word, &mut sum);
    }
    if data.len() == 1 {
        // Odd-length payload: the last word is the final octet with a
        // zero-padding low byte (§4.4/§8).
        let word = u32::from(data[0]) << 8;
        step(word, &mut sum);
    }
    sum as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample<'a>(payload: &'a [u8]) -> Idp<'a> {
        Idp {
            checksum: 0,
            control: 0,
            packet_type: PacketType::Echo,
            dst: Address { net: 1, host: 0x0000_aa00_0001, socket: socket::ECHO },
            src: Address { net: 1, host: 0x0000_aa00_0002, socket: socket::ECHO },
            payload,
        }
    }

    #[test]
    fn roundtrip_and_length() {
        let idp = sample(&[9, 9, 9, 9]);
        assert_eq!(idp.length() as usize, HEADER_LENGTH + 4);

        let mut buf = [0u8; 64];
        let mut w = CursorMut::new(&mut buf);
        idp.encode(&mut w).unwrap();

        let mut r = Cursor::new(&buf[..w.position()]);
        let decoded = Idp::decode(&mut r).unwrap();
        assert_eq!(decoded.dst, idp.dst);
        assert_eq!(decoded.src, idp.src);
        assert_eq!(decoded.payload, &[9, 9, 9, 9]);
    }

    #[test]
    fn pads_to_minimum_packet_length() {
        let idp = sample(&[1]);
        let mut buf = [0u8; 64];
        let mut w = CursorMut::new(&mut buf);
        idp.encode(&mut w).unwrap();
        assert_eq!(w.position(), MINIMUM_PACKET_LENGTH);
    }

    #[test]
    fn checksum_is_deterministic_and_position_sensitive() {
        let mut buf = [0u8; 64];
        let idp = sample(&[1, 2, 3, 4, 5, 6]);
        let mut w = CursorMut::new(&mut buf);
        idp.encode(&mut w).unwrap();
        let len = w.position();

        let c1 = compute_checksum(&buf[..len]);
        let c2 = compute_checksum(&buf[..len]);
        assert_eq!(c1, c2);

        let mut tampered = buf;
        tampered[10] ^= 0xFF;
        let c3 = compute_checksum(&tampered[..len]);
        assert_ne!(c1, c3);
    }

    #[test]
    fn checksum_pads_odd_length_payload_with_zero_octet() {
        // `length` field = 5, one payload octet (0xAB) trailing it: the
        // algorithm must fold [0x0005, 0xAB00] (zero-padded), not drop the
        // dangling byte.
        let packet = [0u8, 0, 0, 5, 0xAB];

        fn fold(sum: &mut u32, word: u32) {
            *sum += word;
            if *sum >= 0x1_0000 {
                *sum = (*sum + 1) & 0xFFFF;
            }
            *sum <<= 1;
            if *sum >= 0x1_0000 {
                *sum = (*sum + 1) & 0xFFFF;
            }
        }
        let mut expected: u32 = 0;
        fold(&mut expected, 0x0005);
        fold(&mut expected, 0xAB00);

        assert_eq!(compute_checksum(&packet), expected as u16);
    }

    #[test]
    fn rejects_length_shorter_than_header() {
        let mut buf = [0u8; 30];
        {
            let mut w = CursorMut::new(&mut buf);
            w.write_u16(0).unwrap();
            w.write_u16(10).unwrap();
        }
        let mut r = Cursor::new(&buf);
        assert!(Idp::decode(&mut r).is_err());
    }
}
