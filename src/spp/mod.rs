// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The Sequenced Packet Protocol connection engine (§4.7): per-connection
//! windowed, in-order, retransmitting delivery over IDP, plus the acceptor
//! pattern that turns an inbound `SYSTEM+SEND-ACK` packet into a live
//! [`connection::Connection`] bound to its own ephemeral listener.

pub mod connection;
pub mod engine;
pub mod window;

use std::fmt;

pub use connection::{Connection, ConnState, ConnectionKey, GetResult, Outbound, Record};
pub use engine::{ConnectionEngine, RecordContext, RecordHandler, SppAcceptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SppError {
    WindowViolation,
    Duplicate,
    Timeout,
    ProtocolViolation,
}

impl fmt::Display for SppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SppError::WindowViolation => write!(f, "packet sequence number outside the receive window"),
            SppError::Duplicate => write!(f, "duplicate packet sequence number"),
            SppError::Timeout => write!(f, "connection timed out waiting for an acknowledgement"),
            SppError::ProtocolViolation => write!(f, "peer violated the SPP protocol"),
        }
    }
}

impl std::error::Error for SppError {}
