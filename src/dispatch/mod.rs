// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The dispatch plane (§4.5/§4.6): a single-reader ingress loop that parses
//! Ethernet→IDP, verifies the checksum, and demultiplexes by destination
//! socket to a registered [`Listener`]; a shared transmit path any task can
//! call, serialized by a mutex so frames land on the wire atomically.

pub mod registry;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::Config;
use crate::driver::{Driver, SelectResult, TimestampMs};
use crate::frame::{self, FrameError};
use crate::wire::error::{ErrorCode, Packet as ErrorPacket};
use crate::wire::ethernet::MacAddr;
use crate::wire::idp::{Address, Idp, PacketType};

pub use registry::ListenerRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    NoSocket,
    InvalidPacketType,
    SocketInUse(u16),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NoSocket => write!(f, "no listener for destination socket"),
            DispatchError::InvalidPacketType => write!(f, "invalid packet type for this socket"),
            DispatchError::SocketInUse(socket) => write!(f, "socket {socket} already in use"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Lifecycle state of a registered [`Listener`] (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    New,
    Initialized,
    Started,
    Stopped,
}

/// An owned copy of one received IDP datagram, handed to [`Listener::handle`]
/// on the dispatcher task. Owned (not borrowed from the receive buffer) so
/// a listener may queue it to another task without the dispatcher having to
/// wait — the dispatcher never retains a reference to its receive buffer
/// past `handle` returning.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub src_mac: MacAddr,
    pub timestamp: TimestampMs,
    pub control: u8,
    pub packet_type: PacketType,
    pub dst: Address,
    pub src: Address,
    pub payload: Vec<u8>,
    /// First 42 octets of the raw IDP record (header + payload prefix),
    /// kept around only to fill the body of a `noSocket` Error reply
    /// (§4.5/§7) without re-encoding the decoded fields.
    pub raw_prefix: Vec<u8>,
}

/// Error-reply prefix length: 42 octets of the offending datagram (§7).
const NO_SOCKET_PREFIX_LEN: usize = 42;

impl Datagram {
    fn from_idp(src_mac: MacAddr, timestamp: TimestampMs, idp: &Idp<'_>, raw_idp_bytes: &[u8]) -> Self {
        let prefix_len = raw_idp_bytes.len().min(NO_SOCKET_PREFIX_LEN);
        Datagram {
            src_mac,
            timestamp,
            control: idp.control,
            packet_type: idp.packet_type,
            dst: idp.dst,
            src: idp.src,
            payload: idp.payload.to_vec(),
            raw_prefix: raw_idp_bytes[..prefix_len].to_vec(),
        }
    }
}

/// The registration contract every socket handler implements (§4.6).
/// `handle` runs on the dispatcher task; listeners that do non-trivial work
/// must hand off to an owned task and return quickly.
pub trait Listener: Send + Sync {
    fn socket(&self) -> u16;
    fn name(&self) -> &str;
    fn state(&self) -> ListenerState;

    fn init(&self, handles: &ServerHandles);
    fn start(&self);
    fn stop(&self);

    fn handle(&self, handles: &ServerHandles, datagram: Datagram);
}

/// The shared transmit path (§4.5): fills the source MAC from the device
/// address, encodes IDP, applies padding and checksum, and writes one
/// frame. Serialized by an internal mutex so concurrent listener tasks
/// never interleave two frames on the wire.
pub struct Transmitter {
    driver: Arc<dyn Driver>,
    lock: Mutex<()>,
}

impl Transmitter {
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Transmitter { driver, lock: Mutex::new(()) }
    }

    /// Encode and transmit one IDP datagram addressed to `dst_mac`.
    pub fn transmit(&self, dst_mac: MacAddr, idp: &Idp<'_>) -> Result<(), crate::error::Error> {
        let mut buf = [0u8; 1514];
        let local = self.driver.address();
        let written = frame::encode_outbound(&mut buf, local, dst_mac, idp)?;
        let _guard = self.lock.lock();
        self.driver.transmit(&buf[..written]).map_err(|e| crate::error::Error::Io(
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        ))?;
        Ok(())
    }

    /// Emit an XNS Error(`noSocket`) reply (§4.5/§7): the first 42 octets
    /// of the offending datagram, addressed back to its source. Silently
    /// dropped if the source is a broadcast address, matching §7's "dropped
    /// if source is a broadcast address" rule.
    pub fn transmit_no_socket(&self, offending: &Datagram, local_net: u32, local_host: u64) {
        if offending.src.host == MacAddr::BROADCAST.0 || offending.src_mac == MacAddr::BROADCAST {
            return;
        }
        self.transmit_error(
            offending.src_mac,
            offending.src,
            local_net,
            local_host,
            ErrorCode::NoSocket,
            0,
            &offending.raw_prefix,
        );
    }

    /// Emit an XNS Error reply of any code (§7), addressed back to `dst`.
    /// Used by [`transmit_no_socket`](Self::transmit_no_socket) and by
    /// protocol layers above the dispatcher (the Courier framer's
    /// `invalidPacketType` reject, §4.8) that need to signal a malformed
    /// request without a matching reply format of their own.
    pub fn transmit_error(
        &self,
        dst_mac: MacAddr,
        dst: Address,
        local_net: u32,
        local_host: u64,
        code: ErrorCode,
        param: u16,
        block: &[u8],
    ) {
        let packet = ErrorPacket { code, param, block };
        let mut buf = vec![0u8; 4 + block.len()];
        let mut w = crate::codec::CursorMut::new(&mut buf);
        if crate::codec::Encode::encode(&packet, &mut w).is_err() {
            return;
        }
        let written = w.position();
        let body = buf[..written].to_vec();

        let idp = Idp {
            checksum: crate::wire::idp::CHECKSUM_NOCHECK,
            control: 0,
            packet_type: PacketType::Error,
            dst,
            src: Address { net: local_net, host: local_host, socket: crate::wire::idp::socket::ERROR },
            payload: &body,
        };
        let _ = self.transmit(dst_mac, &idp);
    }
}

/// Device/topology facts a handler needs to address its replies (§4.9:
/// "handlers operate against a small capability set: Config ... Context
/// (device address, local net)"). The XNS host value is the device's MAC
/// address widened to 48 bits.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub local_net: u32,
    pub device_address: MacAddr,
}

impl Context {
    #[must_use]
    pub fn local_host(&self) -> u64 {
        self.device_address.0
    }
}

/// The set of shared handles a `Listener` receives through its `init`.
#[derive(Clone)]
pub struct ServerHandles {
    pub registry: Arc<ListenerRegistry>,
    pub transmitter: Arc<Transmitter>,
    pub config: Arc<Config>,
    pub context: Context,
}

impl ServerHandles {
    #[cfg(test)]
    #[must_use]
    pub fn for_test() -> Self {
        use crate::driver::loopback::LoopbackDriver;
        let address = MacAddr::from_octets([0xAA, 0, 0, 0, 0, 1]);
        let driver: Arc<dyn Driver> = Arc::new(LoopbackDriver::new(address));
        ServerHandles {
            registry: Arc::new(ListenerRegistry::new()),
            transmitter: Arc::new(Transmitter::new(driver)),
            config: Arc::new(Config {
                interface: "test0".into(),
                networks: vec![],
                hosts: vec![],
                time: crate::config::TimeConfig::default(),
            }),
            context: Context { local_net: 1, device_address: address },
        }
    }
}

/// The single-reader ingress loop (§4.5).
pub struct Dispatcher {
    driver: Arc<dyn Driver>,
    handles: ServerHandles,
    stop_flag: Arc<AtomicBool>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>, handles: ServerHandles) -> Self {
        Dispatcher { driver, handles, stop_flag: Arc::new(AtomicBool::new(false)) }
    }

    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_flag)
    }

    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Run the ingress loop until `stop()` is called. Each iteration blocks
    /// up to one second in `driver.select`, so a stop request is observed
    /// within that bound (§5's "each task exits within one select timeout").
    pub fn run(&self) {
        self.driver.discard();
        let mut buf = [0u8; 1514];
        while !self.stop_flag.load(Ordering::SeqCst) {
            match self.driver.select(Duration::from_secs(1)) {
                Ok(SelectResult::Timeout) => continue,
                Ok(SelectResult::Readable) => {}
                Err(_) => break,
            }
            loop {
                match self.driver.receive(&mut buf) {
                    Ok((len, timestamp)) => self.handle_frame(&buf[..len], timestamp),
                    Err(crate::driver::DriverError::WouldBlock) => break,
                    Err(_) => break,
                }
            }
        }
    }

    fn handle_frame(&self, frame_bytes: &[u8], timestamp: TimestampMs) {
        let (ethernet, idp) = match frame::decode_received(frame_bytes) {
            Ok(decoded) => decoded,
            Err(FrameError::NotXns) => return,
            Err(_) => {
                log::debug!("dropping malformed XNS frame ({} bytes)", frame_bytes.len());
                return;
            }
        };

        let idp_bytes = &ethernet.payload[..(idp.length() as usize)];
        let datagram = Datagram::from_idp(ethernet.src, timestamp, &idp, idp_bytes);
        match self.handles.registry.get(datagram.dst.socket) {
            Some(listener) => listener.handle(&self.handles, datagram),
            None => {
                log::debug!("no listener for socket {}", datagram.dst.socket);
                self.handles.transmitter.transmit_no_socket(
                    &datagram,
                    self.handles.context.local_net,
                    self.handles.context.local_host(),
                );
            }
        }
    }
}
