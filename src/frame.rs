// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The IDP engine (§4.4): checksum verification, padding, and the combined
//! Ethernet+IDP frame I/O the dispatcher's single transmit path uses. The
//! wire layout itself lives in [`crate::wire::ethernet`] and
//! [`crate::wire::idp`]; this module is the behavior layered on top of it.

use std::fmt;

use crate::codec::{Cursor, CursorMut, Decode, Encode};
use crate::wire::ethernet::{EthernetFrame, MacAddr, ETHER_TYPE_XNS, HEADER_LENGTH as ETH_HEADER_LENGTH};
use crate::wire::idp::{self, Idp, CHECKSUM_NOCHECK};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// `length < 30`.
    TooShort,
    /// `length` exceeds the received frame's actual size.
    TooLong,
    /// Checksum field was set (not `0xFFFF`) and disagreed with the
    /// recomputed value.
    BadChecksum,
    /// Ethernet ethertype was not [`ETHER_TYPE_XNS`].
    NotXns,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TooShort => write!(f, "idp length shorter than the fixed header"),
            FrameError::TooLong => write!(f, "idp length exceeds the received frame"),
            FrameError::BadChecksum => write!(f, "idp checksum mismatch"),
            FrameError::NotXns => write!(f, "ethernet frame is not XNS"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Verify an IDP packet's checksum per §4.4. `idp_bytes` starts at the
/// checksum field (byte 0 of the IDP header) and must contain at least
/// `length` bytes (Ethernet padding past `length` is not part of this
/// slice's meaningful span but may trail it harmlessly).
#[must_use]
pub fn verify_checksum(idp_bytes: &[u8]) -> bool {
    let on_wire = u16::from_be_bytes([idp_bytes[0], idp_bytes[1]]);
    if on_wire == CHECKSUM_NOCHECK {
        return true;
    }
    idp::compute_checksum(idp_bytes) == on_wire
}

/// Decode one received Ethernet frame carrying IDP, applying the receive
/// policy from §4.4/§4.5: reject frames whose ethertype is not XNS, whose
/// `length` is shorter than the fixed header or longer than the frame
/// actually received, or whose checksum (when set) disagrees.
pub fn decode_received<'a>(frame_bytes: &'a [u8]) -> Result<(EthernetFrame<'a>, Idp<'a>), FrameError> {
    let mut cursor = Cursor::new(frame_bytes);
    // Re-derive the ethertype ourselves: `EthernetFrame::decode` discards it.
    let ethertype_offset = 12;
    if frame_bytes.len() < ethertype_offset + 2 {
        return Err(FrameError::TooShort);
    }
    let ethertype = u16::from_be_bytes([frame_bytes[ethertype_offset], frame_bytes[ethertype_offset + 1]]);
    if ethertype != ETHER_TYPE_XNS {
        return Err(FrameError::NotXns);
    }

    let ethernet = EthernetFrame::decode(&mut cursor).map_err(|_| FrameError::TooShort)?;
    if ethernet.payload.len() < idp::HEADER_LENGTH {
        return Err(FrameError::TooShort);
    }

    let declared_length = u16::from_be_bytes([ethernet.payload[2], ethernet.payload[3]]) as usize;
    if declared_length < idp::HEADER_LENGTH {
        return Err(FrameError::TooShort);
    }
    if declared_length > ethernet.payload.len() {
        return Err(FrameError::TooLong);
    }
    if !verify_checksum(&ethernet.payload[..declared_length]) {
        return Err(FrameError::BadChecksum);
    }

    let mut idp_cursor = Cursor::new(&ethernet.payload[..declared_length]);
    let idp = Idp::decode(&mut idp_cursor).map_err(|_| FrameError::TooShort)?;
    Ok((ethernet, idp))
}

/// Compute the checksum for an IDP record already written to `buf[0..len]`
/// (buf starts at the checksum field) and patch it in, substituting
/// [`CHECKSUM_NOCHECK`] for the one value ([`compute_checksum`] cannot
/// otherwise naturally produce, per §4.4/§9) that would collide with the
/// "not computed" marker.
///
/// [`compute_checksum`]: idp::compute_checksum
fn finalize_checksum(buf: &mut [u8]) {
    let computed = idp::compute_checksum(buf);
    let on_wire = if computed == 0 { CHECKSUM_NOCHECK } else { computed };
    buf[0..2].copy_from_slice(&on_wire.to_be_bytes());
}

/// Encode one outbound Ethernet frame carrying `idp`, filling the source
/// MAC, recomputing the checksum, and applying the 46-octet/even-length
/// padding rule (§4.4). Returns the number of bytes written into `buf`.
pub fn encode_outbound(
    buf: &mut [u8],
    local_address: MacAddr,
    dst: MacAddr,
    idp: &Idp<'_>,
) -> Result<usize, crate::codec::CodecError> {
    let mut cursor = CursorMut::new(buf);
    let frame = EthernetFrame { dst, src: local_address, payload: &[] };
    // Write the Ethernet header by hand (payload is filled below, then the
    // checksum is patched after the whole IDP record is on the wire).
    cursor.write_u48(frame.dst.0)?;
    cursor.write_u48(frame.src.0)?;
    cursor.write_u16(ETHER_TYPE_XNS)?;
    let idp_offset = cursor.position();
    idp.encode(&mut cursor)?;
    let idp_end = cursor.position();

    finalize_checksum(&mut buf[idp_offset..idp_end]);

    let written = idp_end;
    if written < ETH_HEADER_LENGTH + idp::MINIMUM_PACKET_LENGTH {
        let pad = ETH_HEADER_LENGTH + idp::MINIMUM_PACKET_LENGTH - written;
        for b in &mut buf[written..written + pad] {
            *b = 0;
        }
        return Ok(written + pad);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::idp::{socket, Address, PacketType};

    fn sample_idp<'a>(payload: &'a [u8]) -> Idp<'a> {
        Idp {
            checksum: CHECKSUM_NOCHECK,
            control: 0,
            packet_type: PacketType::Echo,
            dst: Address { net: 1, host: 2, socket: socket::ECHO },
            src: Address { net: 1, host: 3, socket: socket::ECHO },
            payload,
        }
    }

    #[test]
    fn roundtrip_via_frame_io() {
        let idp = sample_idp(b"hello!");
        let local = MacAddr::from_octets([0xAA, 0, 0, 0, 0, 1]);
        let dst = MacAddr::from_octets([0xAA, 0, 0, 0, 0, 2]);

        let mut buf = [0u8; 128];
        let written = encode_outbound(&mut buf, local, dst, &idp).unwrap();
        assert!(written >= 60);

        let (ethernet, decoded) = decode_received(&buf[..written]).unwrap();
        assert_eq!(ethernet.src, local);
        assert_eq!(decoded.payload, b"hello!");
    }

    #[test]
    fn rejects_tampered_checksum() {
        let idp = sample_idp(b"hello!");
        let local = MacAddr::from_octets([0xAA, 0, 0, 0, 0, 1]);
        let dst = MacAddr::from_octets([0xAA, 0, 0, 0, 0, 2]);

        let mut buf = [0u8; 128];
        let written = encode_outbound(&mut buf, local, dst, &idp).unwrap();
        buf[ETH_HEADER_LENGTH + 10] ^= 0xFF;
        assert_eq!(decode_received(&buf[..written]).unwrap_err(), FrameError::BadChecksum);
    }

    #[test]
    fn accepts_header_only_length() {
        let idp = sample_idp(&[]);
        let local = MacAddr::from_octets([0xAA, 0, 0, 0, 0, 1]);
        let dst = MacAddr::from_octets([0xAA, 0, 0, 0, 0, 2]);

        let mut buf = [0u8; 128];
        let written = encode_outbound(&mut buf, local, dst, &idp).unwrap();
        let (_eth, decoded) = decode_received(&buf[..written]).unwrap();
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn rejects_length_past_received_frame() {
        let idp = sample_idp(b"1234");
        let local = MacAddr::from_octets([0xAA, 0, 0, 0, 0, 1]);
        let dst = MacAddr::from_octets([0xAA, 0, 0, 0, 0, 2]);

        let mut buf = [0u8; 128];
        let written = encode_outbound(&mut buf, local, dst, &idp).unwrap();
        // Truncate the received buffer so the declared length overruns it.
        assert_eq!(decode_received(&buf[..written - 20]).unwrap_err(), FrameError::TooLong);
    }
}
