// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sequenced Packet Protocol header (IDP socket 5): the reliable,
//! connection-oriented transport Courier and Bulk Data run over.

use crate::codec::{CodecResult, Cursor, CursorMut, Decode, Encode};

/// Control byte bit flags.
pub mod control_bits {
    /// This is a system packet (no data, used for bare acknowledgements and
    /// the open/close handshake).
    pub const SYSTEM: u8 = 0x80;
    /// Sender is requesting an immediate acknowledgement.
    pub const SEND_ACK: u8 = 0x40;
    /// Out-of-band attention signal.
    pub const ATTENTION: u8 = 0x20;
    /// This packet ends a logical message (record boundary).
    pub const END_OF_MESSAGE: u8 = 0x10;
}

/// Sub-system type: which protocol is riding on top of this SPP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sst {
    /// Courier (`Courier/Friends/CourierProtocol.mesa`).
    Data,
    /// Bulk Data (`Courier/Private/BulkData.mesa`).
    Bulk,
    /// Closing connection (`NS/Public/NetworkStream.mesa`).
    Close,
    /// Reply to `Close`, completing the close handshake.
    CloseReply,
    Other(u8),
}

impl Sst {
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            Sst::Data => 0,
            Sst::Bulk => 1,
            Sst::Close => 254,
            Sst::CloseReply => 255,
            Sst::Other(v) => v,
        }
    }

    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Sst::Data,
            1 => Sst::Bulk,
            254 => Sst::Close,
            255 => Sst::CloseReply,
            other => Sst::Other(other),
        }
    }
}

/// An SPP header and its data block.
///
/// Field order on the wire is `control, sst, idSrc, idDst, seq, ack, alloc,
/// block` — the *source* connection id precedes the *destination* one. This
/// is easy to get backwards; the field names below spell it out.
#[derive(Debug, Clone)]
pub struct Spp<'a> {
    pub control: u8,
    pub sst: Sst,
    pub src_conn_id: u16,
    pub dst_conn_id: u16,
    pub seq: u16,
    pub ack: u16,
    pub alloc: u16,
    pub data: &'a [u8],
}

impl Spp<'_> {
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.control & control_bits::SYSTEM != 0
    }

    #[must_use]
    pub fn is_send_ack(&self) -> bool {
        self.control & control_bits::SEND_ACK != 0
    }

    #[must_use]
    pub fn is_attention(&self) -> bool {
        self.control & control_bits::ATTENTION != 0
    }

    #[must_use]
    pub fn is_end_of_message(&self) -> bool {
        self.control & control_bits::END_OF_MESSAGE != 0
    }
}

impl<'a> Decode<'a> for Spp<'a> {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        let control = cursor.read_u8()?;
        let sst = Sst::from_u8(cursor.read_u8()?);
        let src_conn_id = cursor.read_u16()?;
        let dst_conn_id = cursor.read_u16()?;
        let seq = cursor.read_u16()?;
        let ack = cursor.read_u16()?;
        let alloc = cursor.read_u16()?;
        let data = cursor.read_block();
        Ok(Spp { control, sst, src_conn_id, dst_conn_id, seq, ack, alloc, data })
    }
}

impl Encode for Spp<'_> {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        cursor.write_u8(self.control)?;
        cursor.write_u8(self.sst.to_u8())?;
        cursor.write_u16(self.src_conn_id)?;
        cursor.write_u16(self.dst_conn_id)?;
        cursor.write_u16(self.seq)?;
        cursor.write_u16(self.ack)?;
        cursor.write_u16(self.alloc)?;
        cursor.write_bytes(self.data)
    }
}
