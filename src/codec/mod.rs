// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Big-endian cursor primitives shared by every XNS wire record.
//!
//! Mirrors the cursor-based approach used for CDR2 elsewhere in this
//! protocol-stack family (`Cursor`/`CursorMut` over a bounds-checked byte
//! region), but big-endian and with a `BLOCK` helper for "rest of frame"
//! fields that the XNS record family relies on throughout.

mod cursor;
mod error;

pub use cursor::{Cursor, CursorMut};
pub use error::{CodecError, CodecResult};

/// A wire record that can be read from a big-endian cursor.
pub trait Decode<'a>: Sized {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self>;
}

/// A wire record that can be written to a big-endian cursor.
pub trait Encode {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()>;
}
