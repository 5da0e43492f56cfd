// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Authentication credentials and verifiers (Courier program 14).
//!
//! These are wire shapes only: this crate decodes and encodes their byte
//! layout but never validates a credential or verifier, and never performs
//! the DES-based strong-authentication key exchange the Mesa original
//! describes. Strong-credential contents stay opaque ciphertext blocks.

use crate::codec::{CodecResult, Cursor, CursorMut, Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsType {
    Simple,
    Strong,
    Other(u16),
}

impl CredentialsType {
    #[must_use]
    pub fn to_u16(self) -> u16 {
        match self {
            CredentialsType::Simple => 0,
            CredentialsType::Strong => 1,
            CredentialsType::Other(v) => v,
        }
    }

    #[must_use]
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CredentialsType::Simple,
            1 => CredentialsType::Strong,
            other => CredentialsType::Other(other),
        }
    }
}

/// `Credentials: RECORD [type: CredentialsType, value: SEQUENCE OF
/// UNSPECIFIED]`. For `Simple` this is a Clearinghouse name encoded as the
/// `value` bytes; for `Strong` it is opaque ciphertext. Either way this
/// crate stores `value` as the raw remainder of the record.
#[derive(Debug, Clone)]
pub struct Credentials<'a> {
    pub credentials_type: CredentialsType,
    pub value: &'a [u8],
}

impl<'a> Decode<'a> for Credentials<'a> {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        let credentials_type = CredentialsType::from_u16(cursor.read_u16()?);
        let value = cursor.read_block();
        Ok(Credentials { credentials_type, value })
    }
}

impl Encode for Credentials<'_> {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        cursor.write_u16(self.credentials_type.to_u16())?;
        cursor.write_bytes(self.value)
    }
}

/// `Verifier: SEQUENCE 12 OF UNSPECIFIED` — opaque, at most 12 sixteen-bit
/// words. Decoded as whatever remains of the enclosing record; callers that
/// need the count-prefixed Courier `SEQUENCE` framing parse `bytes` further.
#[derive(Debug, Clone)]
pub struct Verifier<'a> {
    pub bytes: &'a [u8],
}

impl<'a> Decode<'a> for Verifier<'a> {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        Ok(Verifier { bytes: cursor.read_block() })
    }
}

impl Encode for Verifier<'_> {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        cursor.write_bytes(self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_credentials_roundtrip() {
        let creds = Credentials { credentials_type: CredentialsType::Simple, value: b"chs-name" };
        let mut buf = [0u8; 32];
        let mut w = CursorMut::new(&mut buf);
        creds.encode(&mut w).unwrap();

        let mut r = Cursor::new(&buf[..w.position()]);
        let decoded = Credentials::decode(&mut r).unwrap();
        assert_eq!(decoded.credentials_type.to_u16(), CredentialsType::Simple.to_u16());
        assert_eq!(decoded.value, b"chs-name");
    }
}
