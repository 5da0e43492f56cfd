// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Courier message framing (Protocol 3): the wire shape of a call, its
//! return, and the ways a call can be refused.

use crate::codec::{CodecError, CodecResult, Cursor, CursorMut, Decode, Encode};

/// Decode a Courier `STRING`: a 16-bit byte count followed by that many
/// bytes, padded with one zero byte when the count is odd so the next field
/// starts on a 16-bit boundary.
pub fn decode_string<'a>(cursor: &mut Cursor<'a>) -> CodecResult<&'a [u8]> {
    let length = cursor.read_u16()? as usize;
    let bytes = cursor.read_bytes(length)?;
    if length % 2 == 1 {
        cursor.read_bytes(1)?;
    }
    Ok(bytes)
}

/// Encode a Courier `STRING`, applying the same odd-length pad byte.
pub fn encode_string(cursor: &mut CursorMut<'_>, bytes: &[u8]) -> CodecResult<()> {
    cursor.write_u16(bytes.len() as u16)?;
    cursor.write_bytes(bytes)?;
    if bytes.len() % 2 == 1 {
        cursor.write_zeros(1)?;
    }
    Ok(())
}

/// `ProtocolRange: RECORD [low, high: ProtocolType]`. Negotiates which
/// Courier protocol generations a peer accepts; this crate only speaks
/// Protocol 3 and expects `low..=high` to include it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolRange {
    pub low: u16,
    pub high: u16,
}

impl ProtocolRange {
    pub const PROTOCOL3: u16 = 3;

    #[must_use]
    pub fn exact(protocol: u16) -> Self {
        ProtocolRange { low: protocol, high: protocol }
    }

    #[must_use]
    pub fn includes(&self, protocol: u16) -> bool {
        self.low <= protocol && protocol <= self.high
    }
}

impl<'a> Decode<'a> for ProtocolRange {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        Ok(ProtocolRange { low: cursor.read_u16()?, high: cursor.read_u16()? })
    }
}

impl Encode for ProtocolRange {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        cursor.write_u16(self.low)?;
        cursor.write_u16(self.high)
    }
}

/// `VersionRange: RECORD [low, high: CARDINAL]`, returned on a
/// `noSuchVersionNumber` reject to advertise what the callee does support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    pub low: u16,
    pub high: u16,
}

impl<'a> Decode<'a> for VersionRange {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        Ok(VersionRange { low: cursor.read_u16()?, high: cursor.read_u16()? })
    }
}

impl Encode for VersionRange {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        cursor.write_u16(self.low)?;
        cursor.write_u16(self.high)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
    NoSuchProgramNumber,
    NoSuchVersionNumber,
    NoSuchProcedureValue,
    InvalidArguments,
}

impl RejectCode {
    #[must_use]
    pub fn to_u16(self) -> u16 {
        match self {
            RejectCode::NoSuchProgramNumber => 0,
            RejectCode::NoSuchVersionNumber => 1,
            RejectCode::NoSuchProcedureValue => 2,
            RejectCode::InvalidArguments => 3,
        }
    }

    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(RejectCode::NoSuchProgramNumber),
            1 => Some(RejectCode::NoSuchVersionNumber),
            2 => Some(RejectCode::NoSuchProcedureValue),
            3 => Some(RejectCode::InvalidArguments),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallBody<'a> {
    pub transaction: u16,
    pub program: u32,
    pub version: u16,
    pub procedure: u16,
    pub args: &'a [u8],
}

#[derive(Debug, Clone, Copy)]
pub struct RejectBody {
    pub transaction: u16,
    pub code: RejectCode,
    /// Present only when `code == NoSuchVersionNumber`.
    pub version_range: Option<VersionRange>,
}

#[derive(Debug, Clone)]
pub struct ReturnBody<'a> {
    pub transaction: u16,
    pub results: &'a [u8],
}

#[derive(Debug, Clone)]
pub struct AbortBody<'a> {
    pub transaction: u16,
    pub abort_code: u16,
    pub args: &'a [u8],
}

/// A single Courier Protocol 3 message, tagged on `MessageType`.
#[derive(Debug, Clone)]
pub enum Message<'a> {
    Call(CallBody<'a>),
    Reject(RejectBody),
    Return(ReturnBody<'a>),
    Abort(AbortBody<'a>),
}

impl Message<'_> {
    #[must_use]
    pub fn transaction(&self) -> u16 {
        match self {
            Message::Call(c) => c.transaction,
            Message::Reject(r) => r.transaction,
            Message::Return(r) => r.transaction,
            Message::Abort(a) => a.transaction,
        }
    }

    fn message_type(&self) -> u16 {
        match self {
            Message::Call(_) => 0,
            Message::Reject(_) => 1,
            Message::Return(_) => 2,
            Message::Abort(_) => 3,
        }
    }
}

impl<'a> Decode<'a> for Message<'a> {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        let raw_type = cursor.read_u16()?;
        match raw_type {
            0 => {
                let transaction = cursor.read_u16()?;
                let program = cursor.read_u32()?;
                let version = cursor.read_u16()?;
                let procedure = cursor.read_u16()?;
                let args = cursor.read_block();
                Ok(Message::Call(CallBody { transaction, program, version, procedure, args }))
            }
            1 => {
                let transaction = cursor.read_u16()?;
                let raw_code = cursor.read_u16()?;
                let code = RejectCode::from_u16(raw_code)
                    .ok_or(CodecError::BadValue { field: "courier.reject.code", value: raw_code as u32 })?;
                let version_range = if code == RejectCode::NoSuchVersionNumber {
                    Some(VersionRange::decode(cursor)?)
                } else {
                    None
                };
                Ok(Message::Reject(RejectBody { transaction, code, version_range }))
            }
            2 => {
                let transaction = cursor.read_u16()?;
                let results = cursor.read_block();
                Ok(Message::Return(ReturnBody { transaction, results }))
            }
            3 => {
                let transaction = cursor.read_u16()?;
                let abort_code = cursor.read_u16()?;
                let args = cursor.read_block();
                Ok(Message::Abort(AbortBody { transaction, abort_code, args }))
            }
            other => Err(CodecError::BadValue { field: "courier.message_type", value: other as u32 }),
        }
    }
}

impl Encode for Message<'_> {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        cursor.write_u16(self.message_type())?;
        match self {
            Message::Call(call) => {
                cursor.write_u16(call.transaction)?;
                cursor.write_u32(call.program)?;
                cursor.write_u16(call.version)?;
                cursor.write_u16(call.procedure)?;
                cursor.write_bytes(call.args)
            }
            Message::Reject(reject) => {
                cursor.write_u16(reject.transaction)?;
                cursor.write_u16(reject.code.to_u16())?;
                if let Some(range) = reject.version_range {
                    range.encode(cursor)?;
                }
                Ok(())
            }
            Message::Return(ret) => {
                cursor.write_u16(ret.transaction)?;
                cursor.write_bytes(ret.results)
            }
            Message::Abort(abort) => {
                cursor.write_u16(abort.transaction)?;
                cursor.write_u16(abort.abort_code)?;
                cursor.write_bytes(abort.args)
            }
        }
    }
}

/// An Expedited (PEX-carried) Courier header: `ProtocolRange` followed by a
/// single message, matching `ExpeditedCourier: RECORD [range, body]` from
/// the original Mesa interface.
#[derive(Debug, Clone)]
pub struct ExpeditedCourier<'a> {
    pub range: ProtocolRange,
    pub message: Message<'a>,
}

impl<'a> Decode<'a> for ExpeditedCourier<'a> {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        let range = ProtocolRange::decode(cursor)?;
        let message = Message::decode(cursor)?;
        Ok(ExpeditedCourier { range, message })
    }
}

impl Encode for ExpeditedCourier<'_> {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        self.range.encode(cursor)?;
        self.message.encode(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_roundtrip() {
        let msg = Message::Call(CallBody {
            transaction: 0x1234,
            program: 2,
            version: 3,
            procedure: 0,
            args: &[],
        });
        let framed = ExpeditedCourier { range: ProtocolRange::exact(3), message: msg };

        let mut buf = [0u8; 32];
        let mut w = CursorMut::new(&mut buf);
        framed.encode(&mut w).unwrap();

        let mut r = Cursor::new(&buf[..w.position()]);
        let decoded = ExpeditedCourier::decode(&mut r).unwrap();
        assert!(decoded.range.includes(3));
        match decoded.message {
            Message::Call(call) => {
                assert_eq!(call.transaction, 0x1234);
                assert_eq!(call.program, 2);
                assert_eq!(call.version, 3);
            }
            _ => panic!("expected Call"),
        }
    }

    #[test]
    fn no_such_version_reject_carries_range() {
        let reject = Message::Reject(RejectBody {
            transaction: 0x1234,
            code: RejectCode::NoSuchVersionNumber,
            version_range: Some(VersionRange { low: 2, high: 3 }),
        });
        let mut buf = [0u8; 16];
        let mut w = CursorMut::new(&mut buf);
        reject.encode(&mut w).unwrap();

        let mut r = Cursor::new(&buf[..w.position()]);
        let decoded = Message::decode(&mut r).unwrap();
        match decoded {
            Message::Reject(r) => {
                assert_eq!(r.code, RejectCode::NoSuchVersionNumber);
                assert_eq!(r.version_range, Some(VersionRange { low: 2, high: 3 }));
            }
            _ => panic!("expected Reject"),
        }
    }

    #[test]
    fn other_rejects_carry_no_range() {
        let reject = Message::Reject(RejectBody {
            transaction: 1,
            code: RejectCode::NoSuchProcedureValue,
            version_range: None,
        });
        let mut buf = [0u8; 8];
        let mut w = CursorMut::new(&mut buf);
        reject.encode(&mut w).unwrap();
        assert_eq!(w.position(), 6);
    }
}
