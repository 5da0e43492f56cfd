// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error type shared by every wire codec in this crate.

use std::fmt;

/// Result type for cursor and wire-record codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while decoding or encoding an XNS wire record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A read or write would cross the cursor's limit.
    ShortBuffer { offset: usize, needed: usize, limit: usize },
    /// A closed enumeration decoded a value it does not recognize.
    BadValue { field: &'static str, value: u32 },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortBuffer { offset, needed, limit } => write!(
                f,
                "short buffer: need {} byte(s) at offset {} but limit is {}",
                needed, offset, limit
            ),
            Self::BadValue { field, value } => {
                write!(f, "bad value {:#x} for field `{}`", value, field)
            }
        }
    }
}

impl std::error::Error for CodecError {}
