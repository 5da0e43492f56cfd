// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bulk Data transfer (§4.12): large byte streams carried over a dedicated
//! SPP connection with `sst = Bulk`, bound to a call by exchanging a
//! [`BulkDescriptor`] inside the call's own arguments/results.

use parking_lot::Mutex;

use crate::spp::connection::{Connection, GetResult, Outbound};
use crate::wire::spp::Sst;

/// How the last record of a bulk transfer ends (the Mesa interface's
/// `immediate`/`ordinary` end markers, both of which map to SPP's single
/// END-OF-MESSAGE bit on this wire — the distinction is kept at this layer
/// only so callers can still express their transfer's intent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkTerminator {
    /// End the stream now, mid-record.
    Immediate,
    /// End the stream after the current record completes normally.
    Ordinary,
}

/// Enough to find and bind the SPP connection a bulk transfer rides on.
/// Exchanged inside a call's arguments or results, never across the wire
/// on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkDescriptor {
    pub remote_host: u64,
    pub remote_socket: u16,
    pub remote_conn_id: u16,
}

/// The write side of a bulk transfer: an application-driven byte producer
/// that hands records to the underlying SPP connection.
pub struct BulkSource<'a> {
    connection: &'a Mutex<Connection>,
}

impl<'a> BulkSource<'a> {
    #[must_use]
    pub fn new(connection: &'a Mutex<Connection>) -> Self {
        BulkSource { connection }
    }

    /// Queue one record for transmission, marking it the stream's last on
    /// [`BulkTerminator::Immediate`]. Returns the packets the caller must
    /// hand to the transmitter.
    pub fn put(&self, record: &[u8], terminator: Option<BulkTerminator>) -> Vec<Outbound> {
        let mut connection = self.connection.lock();
        let outbound = connection.put(record, Sst::Bulk);
        if terminator == Some(BulkTerminator::Immediate) {
            connection.begin_close();
        }
        outbound
    }
}

/// The read side of a bulk transfer: pulls reassembled records off the
/// underlying SPP connection.
pub struct BulkSink<'a> {
    connection: &'a Mutex<Connection>,
}

impl<'a> BulkSink<'a> {
    #[must_use]
    pub fn new(connection: &'a Mutex<Connection>) -> Self {
        BulkSink { connection }
    }

    #[must_use]
    pub fn get(&self) -> GetResult {
        self.connection.lock().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spp::connection::ConnectionKey;
    use std::time::Instant;

    fn key() -> ConnectionKey {
        ConnectionKey { remote_host: 7, remote_conn_id: 1, local_conn_id: 2 }
    }

    #[test]
    fn source_put_produces_outbound_packets_with_bulk_sst() {
        let connection = Mutex::new(Connection::new(key(), 3000, 3001, Instant::now()));
        {
            let mut guard = connection.lock();
            guard.send_window_hi = 100;
        }
        let source = BulkSource::new(&connection);
        let outbound = source.put(b"chunk", None);
        assert_eq!(outbound.len(), 1);
    }

    #[test]
    fn immediate_terminator_begins_close() {
        let connection = Mutex::new(Connection::new(key(), 3000, 3001, Instant::now()));
        {
            let mut guard = connection.lock();
            guard.send_window_hi = 100;
        }
        let source = BulkSource::new(&connection);
        source.put(b"last", Some(BulkTerminator::Immediate));
        assert_eq!(connection.lock().state, crate::spp::connection::ConnState::CloseSent);
    }

    #[test]
    fn sink_get_reports_no_data_on_empty_connection() {
        let connection = Mutex::new(Connection::new(key(), 3000, 3001, Instant::now()));
        let sink = BulkSink::new(&connection);
        assert!(matches!(sink.get(), GetResult::NoData));
    }
}
