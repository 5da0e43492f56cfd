// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The acceptor pattern and connection table that wire [`super::Connection`]
//! into the dispatch plane (§4.7, §4.6): an [`SppAcceptor`] listens at a
//! well-known socket for inbound `SYSTEM+SEND-ACK` packets and, for each,
//! allocates an ephemeral socket and connection-id, creates the connection
//! record, and registers a [`ConnectionListener`] that owns it from then on.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::connection::{Connection, ConnectionKey, Outbound};
use crate::codec::{Cursor, Decode};
use crate::dispatch::{Datagram, Listener, ListenerState, ServerHandles};
use crate::wire::ethernet::MacAddr;
use crate::wire::idp::{Address, Idp, PacketType};
use crate::wire::spp::{Spp, Sst};

/// A live connection plus the peer addressing the acceptor captured from the
/// opening packet; `remote_mac`/`remote` never change for the connection's
/// life so they sit outside the mutex guarding the protocol state.
pub struct ManagedConnection {
    pub inner: Mutex<Connection>,
    pub remote_mac: MacAddr,
    pub remote: Address,
}

/// What a [`RecordHandler`] needs to answer one reassembled record: who sent
/// it and where the reply's listener lives.
pub struct RecordContext<'a> {
    pub handles: &'a ServerHandles,
    pub remote_host: u64,
    pub local_socket: u16,
}

/// Consumes whole application records off an SPP connection bound to
/// `Sst::Data` and hands back whatever should be sent in reply (the
/// Streamed Courier framer is one such handler; a connection with no
/// handler just does ack/retransmit bookkeeping, e.g. a raw Bulk Data pipe
/// drained directly by its application instead).
pub trait RecordHandler: Send + Sync {
    fn on_record(&self, context: &RecordContext<'_>, record: &[u8]) -> Option<Vec<u8>>;
}

/// The live-connection table (§3/§4.7: demultiplexed by `(remoteHost,
/// remoteConnId, localConnId)`); also the home of the retransmit-timer
/// sweep and the monotonic local connection-id counter.
pub struct ConnectionEngine {
    connections: DashMap<ConnectionKey, Arc<ManagedConnection>>,
    next_local_conn_id: AtomicU32,
}

impl Default for ConnectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionEngine {
    #[must_use]
    pub fn new() -> Self {
        ConnectionEngine { connections: DashMap::new(), next_local_conn_id: AtomicU32::new(1) }
    }

    fn allocate_local_conn_id(&self) -> u16 {
        self.next_local_conn_id.fetch_add(1, Ordering::Relaxed) as u16
    }

    #[must_use]
    pub fn get(&self, key: &ConnectionKey) -> Option<Arc<ManagedConnection>> {
        self.connections.get(key).map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn remove(&self, key: &ConnectionKey) {
        self.connections.remove(key);
    }

    /// Retransmit-timer and idle/close-timeout sweep (§4.7/§5: "timers are
    /// internal" to each connection task; here driven by a single external
    /// tick rather than a per-connection thread, since this crate keeps
    /// connection state behind a plain mutex instead of spawning one task
    /// per connection). Called periodically by the embedding server.
    pub fn tick(&self, handles: &ServerHandles) {
        let now = Instant::now();
        let mut dead = Vec::new();
        for entry in self.connections.iter() {
            let key = *entry.key();
            let managed = Arc::clone(entry.value());
            let mut outbound = Vec::new();
            let mut drop_connection = false;
            {
                let mut conn = managed.inner.lock();
                let (resend, abort) = conn.tick_retransmit(now);
                outbound.extend(resend);
                if abort || conn.close_timed_out(now) || conn.is_idle(now) {
                    drop_connection = true;
                }
            }
            for ob in outbound {
                send_outbound(handles, &managed, ob);
            }
            if drop_connection {
                dead.push((key, managed.inner.lock().local_socket));
            }
        }
        for (key, local_socket) in dead {
            self.remove(&key);
            handles.registry.remove(local_socket);
        }
    }
}

/// Encode `outbound`'s SPP bytes into an IDP/Ethernet frame addressed back
/// to the connection's peer and hand it to the shared transmit path.
fn send_outbound(handles: &ServerHandles, managed: &ManagedConnection, outbound: Outbound) {
    let local_socket = managed.inner.lock().local_socket;
    let idp = Idp {
        checksum: crate::wire::idp::CHECKSUM_NOCHECK,
        control: 0,
        packet_type: PacketType::Spp,
        dst: managed.remote,
        src: Address { net: handles.context.local_net, host: handles.context.local_host(), socket: local_socket },
        payload: &outbound.spp_bytes,
    };
    let _ = handles.transmitter.transmit(managed.remote_mac, &idp);
}

fn decode_spp(datagram: &Datagram) -> Option<Spp<'_>> {
    let mut cursor = Cursor::new(&datagram.payload);
    Spp::decode(&mut cursor).ok()
}

/// Registered at a well-known socket (typically `idp::socket::COURIER`);
/// turns an inbound `SYSTEM+SEND-ACK` packet into a new connection bound to
/// its own ephemeral listener (§4.7).
pub struct SppAcceptor {
    socket: u16,
    name: &'static str,
    state: AtomicU8,
    engine: Arc<ConnectionEngine>,
    handler: Option<Arc<dyn RecordHandler>>,
}

impl SppAcceptor {
    #[must_use]
    pub fn new(socket: u16, name: &'static str, engine: Arc<ConnectionEngine>) -> Self {
        SppAcceptor { socket, name, state: AtomicU8::new(0), engine, handler: None }
    }

    /// Attach the handler every connection this acceptor creates will feed
    /// its reassembled records to (§4.8).
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn RecordHandler>) -> Self {
        self.handler = Some(handler);
        self
    }
}

fn decode_state(raw: u8) -> ListenerState {
    match raw {
        0 => ListenerState::New,
        1 => ListenerState::Initialized,
        2 => ListenerState::Started,
        _ => ListenerState::Stopped,
    }
}

impl Listener for SppAcceptor {
    fn socket(&self) -> u16 {
        self.socket
    }
    fn name(&self) -> &str {
        self.name
    }
    fn state(&self) -> ListenerState {
        decode_state(self.state.load(Ordering::SeqCst))
    }
    fn init(&self, _handles: &ServerHandles) {
        self.state.store(1, Ordering::SeqCst);
    }
    fn start(&self) {
        self.state.store(2, Ordering::SeqCst);
    }
    fn stop(&self) {
        self.state.store(3, Ordering::SeqCst);
    }

    fn handle(&self, handles: &ServerHandles, datagram: Datagram) {
        let Some(spp) = decode_spp(&datagram) else {
            log::debug!("spp acceptor on socket {}: undecodable packet", self.socket);
            return;
        };
        if !(spp.is_system() && spp.is_send_ack()) {
            log::debug!("spp acceptor on socket {}: ignoring non-open packet", self.socket);
            return;
        }

        let Some(local_socket) = handles.registry.ephemeral_socket() else {
            log::warn!("spp acceptor on socket {}: no ephemeral socket available", self.socket);
            return;
        };
        let local_conn_id = self.engine.allocate_local_conn_id();
        let key = ConnectionKey { remote_host: datagram.src.host, remote_conn_id: spp.src_conn_id, local_conn_id };

        let conn = Connection::new(key, datagram.src.socket, local_socket, Instant::now());
        let managed = Arc::new(ManagedConnection { inner: Mutex::new(conn), remote_mac: datagram.src_mac, remote: datagram.src });

        let listener: Arc<dyn Listener> = Arc::new(ConnectionListener::new(
            local_socket,
            Arc::clone(&managed),
            Arc::clone(&self.engine),
            key,
            self.handler.clone(),
        ));
        if let Err(err) = handles.registry.add(listener, handles, true) {
            log::warn!("spp acceptor: failed to register connection listener: {err}");
            return;
        }
        self.engine.connections.insert(key, Arc::clone(&managed));

        let reply = managed.inner.lock().accept_reply();
        send_outbound(handles, &managed, reply);
    }
}

/// One SPP connection's own listener, registered at its ephemeral socket;
/// every subsequent packet between these two endpoints routes here directly
/// rather than back through the acceptor (§4.6/§4.7).
pub struct ConnectionListener {
    socket: u16,
    name: String,
    state: AtomicU8,
    managed: Arc<ManagedConnection>,
    engine: Arc<ConnectionEngine>,
    key: ConnectionKey,
    handler: Option<Arc<dyn RecordHandler>>,
}

impl ConnectionListener {
    #[must_use]
    pub fn new(
        socket: u16,
        managed: Arc<ManagedConnection>,
        engine: Arc<ConnectionEngine>,
        key: ConnectionKey,
        handler: Option<Arc<dyn RecordHandler>>,
    ) -> Self {
        ConnectionListener { socket, name: format!("spp-conn-{socket}"), state: AtomicU8::new(0), managed, engine, key, handler }
    }

    fn teardown(&self, handles: &ServerHandles) {
        self.engine.remove(&self.key);
        handles.registry.remove(self.socket);
    }
}

impl Listener for ConnectionListener {
    fn socket(&self) -> u16 {
        self.socket
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn state(&self) -> ListenerState {
        decode_state(self.state.load(Ordering::SeqCst))
    }
    fn init(&self, _handles: &ServerHandles) {
        self.state.store(1, Ordering::SeqCst);
    }
    fn start(&self) {
        self.state.store(2, Ordering::SeqCst);
    }
    fn stop(&self) {
        self.state.store(3, Ordering::SeqCst);
    }

    fn handle(&self, handles: &ServerHandles, datagram: Datagram) {
        let Some(spp) = decode_spp(&datagram) else {
            log::debug!("spp connection {}: undecodable packet", self.socket);
            return;
        };
        let now = Instant::now();
        let is_close_request = !spp.is_system() && spp.sst == Sst::Close;
        let is_close_reply = spp.sst == Sst::CloseReply;

        let outbound = {
            let mut conn = self.managed.inner.lock();
            if spp.is_system() {
                conn.on_system(&spp, now)
            } else {
                conn.on_data(&spp, now)
            }
        };

        if is_close_request {
            let reply = self.managed.inner.lock().reply_close();
            send_outbound(handles, &self.managed, reply);
            self.teardown(handles);
            return;
        }

        for ob in outbound {
            send_outbound(handles, &self.managed, ob);
        }

        if let Some(handler) = &self.handler {
            self.drain_records(handles, handler.as_ref());
        }

        if is_close_reply {
            self.managed.inner.lock().on_close_reply();
            self.teardown(handles);
        }
    }
}

impl ConnectionListener {
    /// Pull every fully-reassembled record off the connection, hand each to
    /// `handler`, and `put()` back whatever it returns (§4.8: one Courier
    /// message per SPP record).
    fn drain_records(&self, handles: &ServerHandles, handler: &dyn RecordHandler) {
        loop {
            let record = {
                let mut conn = self.managed.inner.lock();
                match conn.get() {
                    super::connection::GetResult::Record(record) => record,
                    super::connection::GetResult::NoData => break,
                    // Attention/SstChange/Eos are not part of the Streamed
                    // Courier record plane; drop and keep draining.
                    _ => continue,
                }
            };
            let context = RecordContext { handles, remote_host: self.key.remote_host, local_socket: self.socket };
            let Some(reply) = handler.on_record(&context, &record.bytes) else { continue };
            let outbound = {
                let mut conn = self.managed.inner.lock();
                conn.put(&reply, Sst::Data)
            };
            for ob in outbound {
                send_outbound(handles, &self.managed, ob);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CursorMut, Encode};
    use crate::dispatch::ServerHandles;
    use crate::wire::spp::control_bits;

    fn encode_spp(spp: &Spp<'_>) -> Vec<u8> {
        let mut buf = vec![0u8; 12 + spp.data.len()];
        let mut cursor = CursorMut::new(&mut buf);
        spp.encode(&mut cursor).unwrap();
        buf
    }

    #[test]
    fn open_request_creates_connection_and_ephemeral_listener() {
        let handles = ServerHandles::for_test();
        let engine = Arc::new(ConnectionEngine::new());
        let acceptor = Arc::new(SppAcceptor::new(crate::wire::idp::socket::COURIER, "spp-acceptor", Arc::clone(&engine)));
        handles.registry.add(acceptor.clone(), &handles, true).unwrap();

        let open = Spp {
            control: control_bits::SYSTEM | control_bits::SEND_ACK,
            sst: Sst::Data,
            src_conn_id: 0xAAAA,
            dst_conn_id: 0,
            seq: 0,
            ack: 0,
            alloc: 3,
            data: &[],
        };
        let datagram = Datagram {
            src_mac: MacAddr::from_octets([1, 2, 3, 4, 5, 6]),
            timestamp: 0,
            control: 0,
            packet_type: PacketType::Spp,
            dst: Address { net: 1, host: 0, socket: crate::wire::idp::socket::COURIER },
            src: Address { net: 1, host: 0xBEEF, socket: 3500 },
            payload: encode_spp(&open),
            raw_prefix: Vec::new(),
        };
        acceptor.handle(&handles, datagram);

        assert_eq!(engine.len(), 1);
        let key = *engine.connections.iter().next().unwrap().key();
        assert_eq!(key.remote_host, 0xBEEF);
        assert_eq!(key.remote_conn_id, 0xAAAA);

        let local_socket = engine.get(&key).unwrap().inner.lock().local_socket;
        assert!(handles.registry.contains(local_socket));
    }

    #[test]
    fn close_handshake_tears_down_listener_and_table_entry() {
        let handles = ServerHandles::for_test();
        let engine = Arc::new(ConnectionEngine::new());
        let key = ConnectionKey { remote_host: 0xBEEF, remote_conn_id: 0xAAAA, local_conn_id: 1 };
        let conn = Connection::new(key, 3500, 3001, Instant::now());
        let managed = Arc::new(ManagedConnection {
            inner: Mutex::new(conn),
            remote_mac: MacAddr::from_octets([1, 2, 3, 4, 5, 6]),
            remote: Address { net: 1, host: 0xBEEF, socket: 3500 },
        });
        engine.connections.insert(key, Arc::clone(&managed));
        let listener = Arc::new(ConnectionListener::new(3001, Arc::clone(&managed), Arc::clone(&engine), key, None));
        handles.registry.add(listener.clone(), &handles, true).unwrap();

        let close = Spp { control: control_bits::END_OF_MESSAGE, sst: Sst::Close, src_conn_id: 0xAAAA, dst_conn_id: 1, seq: 0, ack: 0, alloc: 3, data: &[] };
        let datagram = Datagram {
            src_mac: managed.remote_mac,
            timestamp: 0,
            control: 0,
            packet_type: PacketType::Spp,
            dst: Address { net: 1, host: 0, socket: 3001 },
            src: managed.remote,
            payload: encode_spp(&close),
            raw_prefix: Vec::new(),
        };
        listener.handle(&handles, datagram);

        assert!(engine.is_empty());
        assert!(!handles.registry.contains(3001));
    }
}
