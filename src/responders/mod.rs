// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The three fixed-function well-known-socket services (§4.10): routing
//! table queries, the diagnostic echo loop, and the non-Courier Time
//! protocol. Each is a small, stateless [`Listener`] that answers directly
//! out of [`crate::config::Config`] rather than going through the Courier
//! call plane.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::{Cursor, CursorMut, Decode, Encode};
use crate::dispatch::{Datagram, Listener, ListenerState, ServerHandles};
use crate::wire::echo::{Echo, EchoType};
use crate::wire::idp::{Address, Idp, PacketType};
use crate::wire::pex::{Pex, PexClientType};
use crate::wire::rip::{Rip, RipEntry, RipType};
use crate::wire::time::{Time, TimeResponse, TimeType};

fn decode_state(raw: u8) -> ListenerState {
    match raw {
        0 => ListenerState::New,
        1 => ListenerState::Initialized,
        2 => ListenerState::Started,
        _ => ListenerState::Stopped,
    }
}

fn encode_owned(extra: usize, f: impl FnOnce(&mut CursorMut<'_>) -> crate::codec::CodecResult<()>) -> Vec<u8> {
    let mut buf = vec![0u8; extra + 32];
    let mut cursor = CursorMut::new(&mut buf);
    f(&mut cursor).expect("scratch buffer sized for the encoded record");
    let written = cursor.position();
    buf.truncate(written);
    buf
}

/// Routing Information Protocol responder (IDP socket 1, §4.10): answers a
/// request with every directly-reachable network when the request carries
/// no entries, or with only the subset it recognizes when the request names
/// specific nets — nets it doesn't know about are dropped silently rather
/// than answered with `hop = infinity`.
pub struct RipResponder {
    socket: u16,
    name: &'static str,
    state: AtomicU8,
}

impl RipResponder {
    #[must_use]
    pub fn new(socket: u16) -> Self {
        RipResponder { socket, name: "rip-responder", state: AtomicU8::new(0) }
    }
}

impl Default for RipResponder {
    fn default() -> Self {
        Self::new(crate::wire::idp::socket::RIP)
    }
}

impl Listener for RipResponder {
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
        if datagram.packet_type != PacketType::Rip {
            return;
        }
        let mut cursor = Cursor::new(&datagram.payload);
        let Ok(request) = Rip::decode(&mut cursor) else {
            log::debug!("rip responder: undecodable packet");
            return;
        };
        if request.rip_type != RipType::Request {
            return;
        }

        let entries: Vec<RipEntry> = if request.entries.is_empty() {
            handles.config.networks.iter().map(|net| RipEntry { net: net.net, hop: net.hop }).collect()
        } else {
            request
                .entries
                .iter()
                .filter_map(|queried| handles.config.network(queried.net))
                .map(|net| RipEntry { net: net.net, hop: net.hop })
                .collect()
        };
        if entries.is_empty() && !request.entries.is_empty() {
            // Every queried net was unknown; §4.10 says drop, not answer.
            return;
        }

        let response = Rip { rip_type: RipType::Response, entries };
        let body = encode_owned(response.entries.len() * 6, |cursor| response.encode(cursor));
        let idp = Idp {
            checksum: crate::wire::idp::CHECKSUM_NOCHECK,
            control: 0,
            packet_type: PacketType::Rip,
            dst: datagram.src,
            src: Address { net: handles.context.local_net, host: handles.context.local_host(), socket: self.socket },
            payload: &body,
        };
        let _ = handles.transmitter.transmit(datagram.src_mac, &idp);
    }
}

/// Echo diagnostic responder (IDP socket 2, §4.10): reflects a request's
/// block back verbatim with the type tag flipped to `Reply`.
pub struct EchoResponder {
    socket: u16,
    name: &'static str,
    state: AtomicU8,
}

impl EchoResponder {
    #[must_use]
    pub fn new(socket: u16) -> Self {
        EchoResponder { socket, name: "echo-responder", state: AtomicU8::new(0) }
    }
}

impl Default for EchoResponder {
    fn default() -> Self {
        Self::new(crate::wire::idp::socket::ECHO)
    }
}

impl Listener for EchoResponder {
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
        if datagram.packet_type != PacketType::Echo {
            return;
        }
        let mut cursor = Cursor::new(&datagram.payload);
        let Ok(request) = Echo::decode(&mut cursor) else {
            log::debug!("echo responder: undecodable packet");
            return;
        };
        if request.echo_type != EchoType::Request {
            return;
        }

        let reply = Echo { echo_type: EchoType::Reply, block: request.block };
        let body = encode_owned(reply.block.len(), |cursor| reply.encode(cursor));
        let idp = Idp {
            checksum: crate::wire::idp::CHECKSUM_NOCHECK,
            control: 0,
            packet_type: PacketType::Echo,
            dst: datagram.src,
            src: Address { net: handles.context.local_net, host: handles.context.local_host(), socket: self.socket },
            payload: &body,
        };
        let _ = handles.transmitter.transmit(datagram.src_mac, &idp);
    }
}

/// Time responder (PEX `clientType = time`, §4.10): a direct, non-Courier
/// protocol distinct from the Courier-carried Clearinghouse path — decodes
/// the request, builds a response from the wall clock and `config.time`,
/// and replies inside the same PEX envelope (echoing the request's
/// transaction id).
pub struct TimeResponder {
    socket: u16,
    name: &'static str,
    state: AtomicU8,
}

impl TimeResponder {
    #[must_use]
    pub fn new(socket: u16) -> Self {
        TimeResponder { socket, name: "time-responder", state: AtomicU8::new(0) }
    }

    fn build_response(handles: &ServerHandles) -> TimeResponse {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
        let time_cfg = &handles.config.time;
        TimeResponse {
            time: crate::wire::time::unix_to_xns_time(now),
            offset_direction: match time_cfg.offset_direction {
                crate::config::OffsetDirection::West => crate::wire::time::Direction::West,
                crate::config::OffsetDirection::East => crate::wire::time::Direction::East,
            },
            offset_hours: time_cfg.offset_hours,
            offset_minutes: time_cfg.offset_minutes,
            dst_start: time_cfg.dst_start,
            dst_end: time_cfg.dst_end,
            tolerance: crate::wire::time::Tolerance::Unknown,
            tolerance_value: 0,
        }
    }
}

impl Default for TimeResponder {
    fn default() -> Self {
        Self::new(crate::wire::idp::socket::TIME)
    }
}

impl Listener for TimeResponder {
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
        if datagram.packet_type != PacketType::Pex {
            return;
        }
        let mut cursor = Cursor::new(&datagram.payload);
        let Ok(pex) = Pex::decode(&mut cursor) else {
            log::debug!("time responder: undecodable PEX packet");
            return;
        };
        if pex.client_type != PexClientType::Time {
            return;
        }
        let mut body_cursor = Cursor::new(pex.block);
        let Ok(request) = Time::decode(&mut body_cursor) else {
            log::debug!("time responder: undecodable time packet");
            return;
        };
        if request.time_type != TimeType::Request {
            return;
        }

        let time = Time::response(Self::build_response(handles));
        let time_bytes = encode_owned(24, |cursor| time.encode(cursor));
        let pex_reply = Pex { id: pex.id, client_type: PexClientType::Time, block: &time_bytes };
        let pex_bytes = encode_owned(pex_reply.block.len(), |cursor| pex_reply.encode(cursor));

        let idp = Idp {
            checksum: crate::wire::idp::CHECKSUM_NOCHECK,
            control: 0,
            packet_type: PacketType::Pex,
            dst: datagram.src,
            src: Address { net: handles.context.local_net, host: handles.context.local_host(), socket: self.socket },
            payload: &pex_bytes,
        };
        let _ = handles.transmitter.transmit(datagram.src_mac, &idp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NetworkEntry, TimeConfig};
    use crate::dispatch::{Context, ListenerRegistry, Transmitter};
    use crate::driver::loopback::LoopbackDriver;
    use crate::driver::Driver;
    use crate::wire::ethernet::MacAddr;
    use crate::wire::idp::socket;
    use std::sync::Arc;

    fn test_handles(networks: Vec<NetworkEntry>) -> (ServerHandles, Arc<LoopbackDriver>) {
        let local = MacAddr::from_octets([0xAA, 0, 0, 0, 0, 1]);
        let loopback = Arc::new(LoopbackDriver::new(local));
        let driver: Arc<dyn Driver> = loopback.clone() as Arc<dyn Driver>;
        let handles = ServerHandles {
            registry: Arc::new(ListenerRegistry::new()),
            transmitter: Arc::new(Transmitter::new(driver)),
            config: Arc::new(crate::config::Config {
                interface: "test0".into(),
                networks,
                hosts: vec![],
                time: TimeConfig::default(),
            }),
            context: Context { local_net: 1, device_address: local },
        };
        (handles, loopback)
    }

    fn base_datagram(packet_type: PacketType, payload: Vec<u8>) -> Datagram {
        Datagram {
            src_mac: MacAddr::from_octets([1, 2, 3, 4, 5, 6]),
            timestamp: 0,
            control: 0,
            packet_type,
            dst: Address { net: 1, host: 0, socket: 0 },
            src: Address { net: 1, host: 0xBEEF, socket: 3500 },
            payload,
            raw_prefix: Vec::new(),
        }
    }

    #[test]
    fn rip_empty_request_returns_full_table() {
        let networks = vec![
            NetworkEntry { name: "a".into(), net: 1, hop: 0 },
            NetworkEntry { name: "b".into(), net: 7, hop: 2 },
        ];
        let (handles, driver) = test_handles(networks);
        let responder = RipResponder::new(socket::RIP);

        let request = Rip { rip_type: RipType::Request, entries: vec![] };
        let body = encode_owned(0, |cursor| request.encode(cursor));
        responder.handle(&handles, base_datagram(PacketType::Rip, body));

        let sent = driver.take_transmitted();
        assert_eq!(sent.len(), 1);
    }

    #[test]
    fn rip_unknown_net_request_is_dropped() {
        let (handles, driver) = test_handles(vec![NetworkEntry { name: "a".into(), net: 1, hop: 0 }]);
        let responder = RipResponder::new(socket::RIP);

        let request = Rip { rip_type: RipType::Request, entries: vec![RipEntry { net: 99, hop: 0 }] };
        let body = encode_owned(6, |cursor| request.encode(cursor));
        responder.handle(&handles, base_datagram(PacketType::Rip, body));

        assert!(driver.take_transmitted().is_empty());
    }

    #[test]
    fn echo_reflects_block() {
        let (handles, driver) = test_handles(vec![]);
        let responder = EchoResponder::new(socket::ECHO);

        let request = Echo { echo_type: EchoType::Request, block: b"ping" };
        let body = encode_owned(request.block.len(), |cursor| request.encode(cursor));
        responder.handle(&handles, base_datagram(PacketType::Echo, body));

        let sent = driver.take_transmitted();
        assert_eq!(sent.len(), 1);
    }

    #[test]
    fn time_request_gets_response() {
        let (handles, driver) = test_handles(vec![]);
        let responder = TimeResponder::new(socket::TIME);

        let request = Time::request();
        let time_bytes = encode_owned(4, |cursor| request.encode(cursor));
        let pex = Pex { id: 0x1122_3344, client_type: PexClientType::Time, block: &time_bytes };
        let pex_bytes = encode_owned(pex.block.len(), |cursor| pex.encode(cursor));
        responder.handle(&handles, base_datagram(PacketType::Pex, pex_bytes));

        let sent = driver.take_transmitted();
        assert_eq!(sent.len(), 1);
    }

    #[test]
    fn non_time_client_type_is_ignored() {
        let (handles, driver) = test_handles(vec![]);
        let responder = TimeResponder::new(socket::TIME);

        let pex = Pex { id: 1, client_type: PexClientType::Chs, block: &[] };
        let pex_bytes = encode_owned(0, |cursor| pex.encode(cursor));
        responder.handle(&handles, base_datagram(PacketType::Pex, pex_bytes));

        assert!(driver.take_transmitted().is_empty());
    }
}
