// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-connection SPP state (§4.7/§3): the sliding send/receive windows,
//! retransmit queue, reorder buffer, and the receive/send/ack policies
//! layered over them. A [`Connection`] is owned by its connection task and
//! is not `Sync`-shared beyond that task except through the message
//! channel the engine hands it (§5: "per-connection state is not shared").

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::window::{seq_le, seq_lt};
use crate::wire::idp::Address;
use crate::wire::spp::{control_bits, Spp, Sst};

/// Default advertised window size (four outstanding packets), matching the
/// worked example in spec.md §8 scenario 5 (`alloc = windowSize - 1 = 3`).
pub const DEFAULT_WINDOW_SIZE: u16 = 4;
/// Maximum IDP payload octets per SPP packet: 506 octets of IDP payload
/// minus the 12-octet SPP header (§4.7).
pub const MAX_SPP_PAYLOAD: usize = 506 - 12;
/// Request an acknowledgement every `N`th data packet (§4.7).
pub const SEND_ACK_EVERY: u32 = 4;

pub const INITIAL_RTO: Duration = Duration::from_millis(500);
pub const MAX_RTO: Duration = Duration::from_secs(4);
pub const ABORT_AFTER: Duration = Duration::from_secs(30);
/// Idle connection lifetime (§3).
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(600);
/// Send an ACK if data has sat unacknowledged this long (§4.7).
pub const ACK_DELAY: Duration = Duration::from_millis(200);

/// `(remoteHost, remoteConnId, localConnId)` — the connection demux key
/// (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub remote_host: u64,
    pub remote_conn_id: u16,
    pub local_conn_id: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Open,
    CloseSent,
    CloseReceived,
    Closed,
}

struct RetransmitEntry {
    packet: Vec<u8>,
    sent_at: Instant,
    rto: Duration,
}

struct ReorderEntry {
    payload: Vec<u8>,
    end_of_message: bool,
    sst: Sst,
}

/// A fully-assembled application record, possibly delivered across several
/// SPP packets joined at `END_OF_MESSAGE` boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub bytes: Vec<u8>,
}

/// What `get()` yields to the application (§4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetResult {
    Record(Record),
    /// A one-byte out-of-band ATTENTION signal, delivered ahead of queued
    /// in-band data.
    Attention(u8),
    /// The peer's sub-system type changed; further delivery is deferred
    /// until the application calls [`Connection::rebind`].
    SstChange(Sst),
    Eos,
    NoData,
}

/// Packets a connection wants transmitted right now; returned by the
/// mutating methods below instead of transmitting directly so callers can
/// route them through the shared [`crate::dispatch::Transmitter`] without
/// this module depending on it.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub spp_bytes: Vec<u8>,
}

pub struct Connection {
    pub key: ConnectionKey,
    pub remote_socket: u16,
    pub local_socket: u16,

    pub send_seq: u16,
    pub send_window_lo: u16,
    pub send_window_hi: u16,

    pub recv_seq: u16,
    pub recv_alloc: u16,
    window_size: u16,

    retransmit: BTreeMap<u16, RetransmitEntry>,
    reorder: BTreeMap<u16, ReorderEntry>,
    assembling_open: bool,
    bound_sst: Sst,
    pending_sst: Option<Sst>,
    delivered: std::collections::VecDeque<GetResult>,
    pending_attention: std::collections::VecDeque<u8>,

    last_ack_sent_recv_seq: u16,
    last_ack_sent_recv_alloc: u16,
    unacked_data_since: Option<Instant>,
    send_ack_counter: u32,

    pub state: ConnState,
    pub last_activity: Instant,
    connect_started: Instant,
}

impl Connection {
    #[must_use]
    pub fn new(key: ConnectionKey, remote_socket: u16, local_socket: u16, now: Instant) -> Self {
        let window_size = DEFAULT_WINDOW_SIZE;
        Connection {
            key,
            remote_socket,
            local_socket,
            send_seq: 0,
            send_window_lo: 0,
            send_window_hi: window_size.saturating_sub(1),
            recv_seq: 0,
            recv_alloc: window_size.saturating_sub(1),
            window_size,
            retransmit: BTreeMap::new(),
            reorder: BTreeMap::new(),
            assembling_open: false,
            bound_sst: Sst::Data,
            pending_sst: None,
            delivered: std::collections::VecDeque::new(),
            pending_attention: std::collections::VecDeque::new(),
            last_ack_sent_recv_seq: 0,
            last_ack_sent_recv_alloc: window_size.saturating_sub(1),
            unacked_data_since: None,
            send_ack_counter: 0,
            state: ConnState::Open,
            last_activity: now,
            connect_started: now,
        }
    }

    fn system_packet(&self, control: u8) -> Vec<u8> {
        let spp = Spp {
            control,
            sst: self.bound_sst,
            src_conn_id: self.key.local_conn_id,
            dst_conn_id: self.key.remote_conn_id,
            seq: self.send_seq,
            ack: self.recv_seq,
            alloc: self.recv_alloc,
            data: &[],
        };
        let mut buf = [0u8; 12];
        let mut cursor = crate::codec::CursorMut::new(&mut buf);
        crate::codec::Encode::encode(&spp, &mut cursor).expect("fixed-size SPP header fits");
        buf.to_vec()
    }

    /// Initial SYSTEM reply an acceptor sends on connection creation (§4.7):
    /// `seq=0, ack=0, alloc=windowSize-1`.
    #[must_use]
    pub fn accept_reply(&self) -> Outbound {
        Outbound { spp_bytes: self.system_packet(control_bits::SYSTEM | control_bits::SEND_ACK) }
    }

    /// Apply an incoming packet's `ack`/`alloc` fields to the send window
    /// (§4.7, applies to every packet: system or data). `ack` is the next
    /// seq the peer expects, so every retransmit entry strictly before it
    /// has been acknowledged and can be dropped.
    fn update_send_window(&mut self, ack: u16, alloc: u16) {
        if seq_le(self.send_window_lo, ack) {
            self.send_window_lo = ack;
            self.retransmit.retain(|&seq, _| !seq_lt(seq, ack));
        }
        self.send_window_hi = alloc;
    }

    /// §4.7 receive policy for a SYSTEM packet with no data.
    pub fn on_system(&mut self, spp: &Spp<'_>, now: Instant) -> Vec<Outbound> {
        self.last_activity = now;
        self.update_send_window(spp.ack, spp.alloc);
        if spp.is_send_ack() {
            vec![Outbound { spp_bytes: self.system_packet(control_bits::SYSTEM) }]
        } else {
            Vec::new()
        }
    }

    /// §4.7 receive policy for a data-carrying packet (control's SYSTEM bit
    /// clear). Returns any immediate ACK to send.
    pub fn on_data(&mut self, spp: &Spp<'_>, now: Instant) -> Vec<Outbound> {
        self.last_activity = now;
        self.update_send_window(spp.ack, spp.alloc);

        if spp.is_attention() {
            if let Some(&byte) = spp.data.first() {
                self.pending_attention.push_back(byte);
            }
            return self.ack_if_needed(spp.is_send_ack(), now, false);
        }

        let seq = spp.seq;
        let mut advanced = false;
        if seq_lt(seq, self.recv_seq) {
            // Duplicate: ack and drop (§4.7).
        } else if seq_lt(self.recv_alloc, seq) {
            // Out of window: drop silently.
        } else {
            self.reorder.entry(seq).or_insert_with(|| ReorderEntry {
                payload: spp.data.to_vec(),
                end_of_message: spp.is_end_of_message(),
                sst: spp.sst,
            });
            advanced = self.drain_reorder();
        }

        self.ack_if_needed(spp.is_send_ack(), now, advanced)
    }

    /// Deliver every contiguously-filled reorder slot starting at
    /// `recv_seq`, stopping (without consuming, advancing, or acking that
    /// slot) the first time it hits an entry whose `sst` differs from
    /// `bound_sst`: that slot stays buffered until [`Connection::rebind`]
    /// rebinds to it, so the peer is never told to stop resending it
    /// (spec.md §4.7's "delivery of subsequent data is deferred").
    fn drain_reorder(&mut self) -> bool {
        let mut advanced = false;
        while let Some(sst) = self.reorder.get(&self.recv_seq).map(|entry| entry.sst) {
            if sst != self.bound_sst {
                if self.pending_sst != Some(sst) {
                    self.pending_sst = Some(sst);
                    self.delivered.push_back(GetResult::SstChange(sst));
                }
                break;
            }
            let entry = self.reorder.remove(&self.recv_seq).expect("just peeked");
            self.recv_seq = self.recv_seq.wrapping_add(1);
            self.recv_alloc = self.recv_alloc.wrapping_add(1);
            advanced = true;
            self.append_record_bytes(entry.payload, entry.end_of_message);
        }
        advanced
    }

    fn append_record_bytes(&mut self, bytes: Vec<u8>, end_of_message: bool) {
        match self.delivered.back_mut() {
            Some(GetResult::Record(record)) if self.assembling_open => {
                record.bytes.extend_from_slice(&bytes);
            }
            _ => self.delivered.push_back(GetResult::Record(Record { bytes })),
        }
        self.assembling_open = !end_of_message;
    }

    fn ack_if_needed(&mut self, send_ack_requested: bool, now: Instant, advanced: bool) -> Vec<Outbound> {
        if advanced {
            self.unacked_data_since = None;
        } else if self.unacked_data_since.is_none() {
            self.unacked_data_since = Some(now);
        }

        let alloc_advanced = self.recv_alloc != self.last_ack_sent_recv_alloc;
        let recv_advanced = self.recv_seq != self.last_ack_sent_recv_seq;
        let stale = self
            .unacked_data_since
            .map(|since| now.duration_since(since) >= ACK_DELAY)
            .unwrap_or(false);

        if send_ack_requested || recv_advanced || alloc_advanced || stale {
            self.last_ack_sent_recv_seq = self.recv_seq;
            self.last_ack_sent_recv_alloc = self.recv_alloc;
            self.unacked_data_since = None;
            vec![Outbound { spp_bytes: self.system_packet(control_bits::SYSTEM) }]
        } else {
            Vec::new()
        }
    }

    /// §4.7 send policy: split `bytes` into ≤[`MAX_SPP_PAYLOAD`]-octet
    /// packets, mark END-OF-MESSAGE on the last, request an ack every
    /// [`SEND_ACK_EVERY`]th packet and on the record's last packet, and
    /// buffer anything past the peer's advertised window for later.
    pub fn put(&mut self, bytes: &[u8], sst: Sst) -> Vec<Outbound> {
        let mut outbound = Vec::new();
        let chunks: Vec<&[u8]> = if bytes.is_empty() {
            vec![&[]]
        } else {
            bytes.chunks(MAX_SPP_PAYLOAD).collect()
        };
        let last_index = chunks.len() - 1;

        for (i, chunk) in chunks.into_iter().enumerate() {
            if seq_lt(self.send_window_hi, self.send_seq) {
                // Past the peer's window: the original drops further
                // sending until an ack opens room. A complete core would
                // queue this chunk; this crate hands back what it could
                // send and lets the caller retry via `put` once acked.
                break;
            }
            self.send_ack_counter += 1;
            let is_last = i == last_index;
            let mut control = 0u8;
            if is_last {
                control |= control_bits::END_OF_MESSAGE;
            }
            if is_last || self.send_ack_counter % SEND_ACK_EVERY == 0 {
                control |= control_bits::SEND_ACK;
            }

            let seq = self.send_seq;
            let spp = Spp {
                control,
                sst,
                src_conn_id: self.key.local_conn_id,
                dst_conn_id: self.key.remote_conn_id,
                seq,
                ack: self.recv_seq,
                alloc: self.recv_alloc,
                data: chunk,
            };
            let mut buf = vec![0u8; 12 + chunk.len()];
            let mut cursor = crate::codec::CursorMut::new(&mut buf);
            crate::codec::Encode::encode(&spp, &mut cursor).expect("buffer sized for payload");

            self.retransmit.insert(seq, RetransmitEntry { packet: buf.clone(), sent_at: Instant::now(), rto: INITIAL_RTO });
            self.send_seq = self.send_seq.wrapping_add(1);
            outbound.push(Outbound { spp_bytes: buf });
        }
        outbound
    }

    /// Fetch whatever the application can see right now: queued attention
    /// byte first, then the oldest fully-assembled record or pending sst
    /// change. A record still awaiting its `END_OF_MESSAGE` fragment sits at
    /// the back of the queue and is never the sole entry returned here.
    pub fn get(&mut self) -> GetResult {
        if let Some(byte) = self.pending_attention.pop_front() {
            return GetResult::Attention(byte);
        }
        let sole_entry_still_open = self.delivered.len() == 1
            && self.assembling_open
            && matches!(self.delivered.front(), Some(GetResult::Record(_)));
        if sole_entry_still_open {
            return GetResult::NoData;
        }
        self.delivered.pop_front().unwrap_or(GetResult::NoData)
    }

    /// Resume delivery after a [`GetResult::SstChange`], binding the
    /// connection to `sst` and draining the buffered slot that triggered
    /// the change (plus any now-contiguous slots after it) into `get()`.
    /// Returns any ack this newly-delivered data now warrants.
    pub fn rebind(&mut self, sst: Sst, now: Instant) -> Vec<Outbound> {
        self.bound_sst = sst;
        self.pending_sst = None;
        let advanced = self.drain_reorder();
        self.ack_if_needed(false, now, advanced)
    }

    /// Retransmit-timer tick (§4.7/§8 scenario 6): doubles RTO up to
    /// [`MAX_RTO`] per retry and aborts the connection after
    /// [`ABORT_AFTER`] of no acknowledgement.
    pub fn tick_retransmit(&mut self, now: Instant) -> (Vec<Outbound>, bool) {
        let mut resend = Vec::new();
        let mut abort = false;
        for entry in self.retransmit.values_mut() {
            if now.duration_since(entry.sent_at) >= ABORT_AFTER {
                abort = true;
                break;
            }
            if now.duration_since(entry.sent_at) >= entry.rto {
                resend.push(Outbound { spp_bytes: entry.packet.clone() });
                entry.sent_at = now;
                entry.rto = (entry.rto * 2).min(MAX_RTO);
            }
        }
        (resend, abort)
    }

    #[must_use]
    pub fn is_idle(&self, now: Instant) -> bool {
        now.duration_since(self.last_activity) >= IDLE_TIMEOUT
    }

    /// Sender's half of the graceful close handshake (§4.7): an empty data
    /// packet with `sst = Close`.
    pub fn begin_close(&mut self) -> Outbound {
        self.state = ConnState::CloseSent;
        self.connect_started = Instant::now();
        let mut outbound = self.put(&[], Sst::Close);
        outbound.pop().unwrap_or_else(|| Outbound { spp_bytes: self.system_packet(control_bits::SYSTEM) })
    }

    /// Responder's half: reply `sst = CloseReply` and mark closed.
    pub fn reply_close(&mut self) -> Outbound {
        self.state = ConnState::Closed;
        let spp = Spp {
            control: 0,
            sst: Sst::CloseReply,
            src_conn_id: self.key.local_conn_id,
            dst_conn_id: self.key.remote_conn_id,
            seq: self.send_seq,
            ack: self.recv_seq,
            alloc: self.recv_alloc,
            data: &[],
        };
        let mut buf = [0u8; 12];
        let mut cursor = crate::codec::CursorMut::new(&mut buf);
        crate::codec::Encode::encode(&spp, &mut cursor).expect("fixed-size SPP header fits");
        Outbound { spp_bytes: buf.to_vec() }
    }

    pub fn on_close_reply(&mut self) {
        self.state = ConnState::Closed;
    }

    #[must_use]
    pub fn close_timed_out(&self, now: Instant) -> bool {
        self.state == ConnState::CloseSent && now.duration_since(self.connect_started) >= ABORT_AFTER
    }
}

#[must_use]
pub fn source_address(net: u32, host: u64, socket: u16) -> Address {
    Address { net, host, socket }
}
