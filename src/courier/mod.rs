// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The Courier call plane (§4.8/§4.9): a message framer that extracts
//! call/return/reject/abort from both the PEX-carried Expedited path and
//! the SPP-carried Streamed path, dispatches to the frozen-after-startup
//! [`registry::ServiceRegistry`], and turns whatever the handler returns
//! back into a reply of the same shape the call arrived in.

pub mod bulk;
pub mod registry;

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::codec::{CodecResult, Cursor, CursorMut, Decode, Encode};
use crate::dispatch::{Context, Datagram, Listener, ListenerState, ServerHandles};
use crate::spp::engine::{RecordContext, RecordHandler};
use crate::wire::courier::{
    AbortBody, CallBody, ExpeditedCourier, Message, ProtocolRange, RejectBody, RejectCode, ReturnBody, VersionRange,
};
use crate::wire::error::ErrorCode;
use crate::wire::idp::{Address, Idp, PacketType};
use crate::wire::pex::{Pex, PexClientType};

pub use bulk::{BulkDescriptor, BulkSink, BulkSource, BulkTerminator};
pub use registry::{CallContext, Procedure, ServiceRecord, ServiceRegistry, Session, SessionKey, SessionTable};

/// Errors the call plane maps to a Courier reject/abort (§4.8's error
/// mapping, §7's Courier taxonomy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourierError {
    NoSuchProgram,
    NoSuchVersion { low: u16, high: u16 },
    NoSuchProcedure,
    InvalidArguments,
    /// A handler ran and explicitly refused the call; `code`/`body` are its
    /// own abort payload, carried verbatim into the `Abort` message.
    HandlerError { code: u16, body: Vec<u8> },
}

impl fmt::Display for CourierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourierError::NoSuchProgram => write!(f, "no such program number"),
            CourierError::NoSuchVersion { low, high } => write!(f, "no such version number (have {low}..={high})"),
            CourierError::NoSuchProcedure => write!(f, "no such procedure value"),
            CourierError::InvalidArguments => write!(f, "invalid arguments"),
            CourierError::HandlerError { code, .. } => write!(f, "handler aborted with code {code}"),
        }
    }
}

impl std::error::Error for CourierError {}

/// Encode any wire value through the closure `f` into an owned, exactly
/// sized buffer. Every record here is variable-length (argument/result
/// blocks), so this sizes the scratch buffer to `extra` (the one dynamic
/// contribution) plus headroom for the fixed fields, then truncates to
/// what was actually written.
fn encode_owned(extra: usize, f: impl FnOnce(&mut CursorMut<'_>) -> CodecResult<()>) -> Vec<u8> {
    let mut buf = vec![0u8; extra + 32];
    let mut cursor = CursorMut::new(&mut buf);
    f(&mut cursor).expect("scratch buffer sized for the encoded record");
    let written = cursor.position();
    buf.truncate(written);
    buf
}

fn encode_message(message: &Message<'_>) -> Vec<u8> {
    let extra = match message {
        Message::Call(c) => c.args.len(),
        Message::Reject(_) => 0,
        Message::Return(r) => r.results.len(),
        Message::Abort(a) => a.args.len(),
    };
    encode_owned(extra, |cursor| message.encode(cursor))
}

/// Turn the outcome of one [`ServiceRegistry::invoke`] into the Courier
/// message bytes that reply to it (§4.8's error mapping).
fn reply_message(transaction: u16, result: &Result<Vec<u8>, CourierError>) -> Vec<u8> {
    match result {
        Ok(results) => encode_message(&Message::Return(ReturnBody { transaction, results })),
        Err(CourierError::NoSuchProgram) => encode_message(&Message::Reject(RejectBody {
            transaction,
            code: RejectCode::NoSuchProgramNumber,
            version_range: None,
        })),
        Err(CourierError::NoSuchVersion { low, high }) => encode_message(&Message::Reject(RejectBody {
            transaction,
            code: RejectCode::NoSuchVersionNumber,
            version_range: Some(VersionRange { low: *low, high: *high }),
        })),
        Err(CourierError::NoSuchProcedure) => encode_message(&Message::Reject(RejectBody {
            transaction,
            code: RejectCode::NoSuchProcedureValue,
            version_range: None,
        })),
        Err(CourierError::InvalidArguments) => encode_message(&Message::Reject(RejectBody {
            transaction,
            code: RejectCode::InvalidArguments,
            version_range: None,
        })),
        Err(CourierError::HandlerError { code, body }) => {
            encode_message(&Message::Abort(AbortBody { transaction, abort_code: *code, args: body }))
        }
    }
}

/// Run one decoded [`CallBody`] against `services`, charging it to the
/// session keyed by `(remote_host, transaction)` (§4.9: sessions are
/// ephemeral records keyed by the transaction context), and return the
/// encoded reply message.
fn invoke_call(
    services: &ServiceRegistry,
    sessions: &SessionTable,
    remote_host: u64,
    config: &crate::config::Config,
    context: &Context,
    call: &CallBody<'_>,
) -> Vec<u8> {
    let key = SessionKey { remote_host, transaction: call.transaction };
    let now = Instant::now();
    let result = sessions.with_session(key, now, |session| {
        services.invoke(call.program, call.version, call.procedure, call.args, session, config, context)
    });
    reply_message(call.transaction, &result)
}

fn decode_state(raw: u8) -> ListenerState {
    match raw {
        0 => ListenerState::New,
        1 => ListenerState::Initialized,
        2 => ListenerState::Started,
        _ => ListenerState::Stopped,
    }
}

/// The Expedited (PEX-carried) Courier path (§4.8): one complete Courier
/// message per PEX packet, preceded by a [`ProtocolRange`]. Registered at
/// the Clearinghouse socket; accepts `clientType ∈ {time, CHS}` per §4.8,
/// rejecting anything else (or a protocol range that excludes 3) with an
/// `invalidPacketType` Error.
pub struct ExpeditedCourierListener {
    socket: u16,
    name: String,
    state: AtomicU8,
    services: Arc<ServiceRegistry>,
    sessions: Arc<SessionTable>,
    accepted_client_types: Vec<PexClientType>,
}

impl ExpeditedCourierListener {
    #[must_use]
    pub fn new(
        socket: u16,
        name: &str,
        services: Arc<ServiceRegistry>,
        sessions: Arc<SessionTable>,
        accepted_client_types: Vec<PexClientType>,
    ) -> Self {
        ExpeditedCourierListener {
            socket,
            name: name.to_string(),
            state: AtomicU8::new(0),
            services,
            sessions,
            accepted_client_types,
        }
    }

    fn invalid_packet_type(&self, handles: &ServerHandles, datagram: &Datagram) {
        handles.transmitter.transmit_error(
            datagram.src_mac,
            datagram.src,
            handles.context.local_net,
            handles.context.local_host(),
            ErrorCode::InvalidPacketType,
            0,
            &datagram.raw_prefix,
        );
    }
}

impl Listener for ExpeditedCourierListener {
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
        if datagram.packet_type != PacketType::Pex {
            return;
        }
        let mut cursor = Cursor::new(&datagram.payload);
        let Ok(pex) = Pex::decode(&mut cursor) else {
            log::debug!("pex-courier {}: undecodable PEX packet", self.socket);
            return;
        };
        if !self.accepted_client_types.contains(&pex.client_type) {
            self.invalid_packet_type(handles, &datagram);
            return;
        }

        let mut body_cursor = Cursor::new(pex.block);
        let Ok(framed) = ExpeditedCourier::decode(&mut body_cursor) else {
            self.invalid_packet_type(handles, &datagram);
            return;
        };
        if !framed.range.includes(ProtocolRange::PROTOCOL3) {
            self.invalid_packet_type(handles, &datagram);
            return;
        }

        let Message::Call(call) = &framed.message else {
            // A server only ever receives `Call`; a stray return/reject/
            // abort addressed here has no connection to resume it on.
            return;
        };
        let reply_bytes =
            invoke_call(&self.services, &self.sessions, datagram.src.host, &handles.config, &handles.context, call);

        let pex_reply = Pex { id: pex.id, client_type: pex.client_type, block: &reply_bytes };
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

/// The Streamed (SPP-carried) Courier path (§4.8): one Courier message per
/// SPP record (no leading [`ProtocolRange`] — the connection already
/// established protocol 3 implicitly by riding `sst = Data`). Attached to
/// every connection an [`crate::spp::engine::SppAcceptor`] creates via
/// [`crate::spp::engine::SppAcceptor::with_handler`].
pub struct StreamedCourierHandler {
    services: Arc<ServiceRegistry>,
    sessions: Arc<SessionTable>,
}

impl StreamedCourierHandler {
    #[must_use]
    pub fn new(services: Arc<ServiceRegistry>, sessions: Arc<SessionTable>) -> Self {
        StreamedCourierHandler { services, sessions }
    }
}

impl RecordHandler for StreamedCourierHandler {
    fn on_record(&self, context: &RecordContext<'_>, record: &[u8]) -> Option<Vec<u8>> {
        let mut cursor = Cursor::new(record);
        let message = Message::decode(&mut cursor).ok()?;
        let Message::Call(call) = &message else {
            return None;
        };
        Some(invoke_call(
            &self.services,
            &self.sessions,
            context.remote_host,
            &context.handles.config,
            &context.handles.context,
            call,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{ListenerRegistry, Transmitter};
    use crate::driver::loopback::LoopbackDriver;
    use crate::driver::Driver;
    use crate::wire::ethernet::MacAddr;
    use crate::wire::idp::socket;

    fn registry_with_echo_program() -> Arc<ServiceRegistry> {
        let mut registry = ServiceRegistry::new();
        registry.register(2, 3, 0, false, Box::new(|_ctx, args| Ok(args.to_vec())));
        Arc::new(registry)
    }

    fn test_handles() -> (ServerHandles, Arc<LoopbackDriver>) {
        let local = MacAddr::from_octets([0xAA, 0, 0, 0, 0, 1]);
        let loopback = Arc::new(LoopbackDriver::new(local));
        let driver: Arc<dyn Driver> = loopback.clone() as Arc<dyn Driver>;
        let handles = ServerHandles {
            registry: Arc::new(ListenerRegistry::new()),
            transmitter: Arc::new(Transmitter::new(driver)),
            config: Arc::new(crate::config::Config {
                interface: "test0".into(),
                networks: vec![],
                hosts: vec![],
                time: crate::config::TimeConfig::default(),
            }),
            context: Context { local_net: 1, device_address: local },
        };
        (handles, loopback)
    }

    fn encode_expedited_call(
        id: u32,
        client_type: PexClientType,
        program: u32,
        version: u16,
        procedure: u16,
        args: &[u8],
    ) -> Vec<u8> {
        let message = Message::Call(CallBody { transaction: 0x1234, program, version, procedure, args });
        let framed = ExpeditedCourier { range: ProtocolRange::exact(ProtocolRange::PROTOCOL3), message };
        let mut msg_buf = vec![0u8; 64 + args.len()];
        let mut w = CursorMut::new(&mut msg_buf);
        framed.encode(&mut w).unwrap();
        let msg_len = w.position();

        let pex = Pex { id, client_type, block: &msg_buf[..msg_len] };
        let mut pex_buf = vec![0u8; 16 + msg_len];
        let mut pw = CursorMut::new(&mut pex_buf);
        pex.encode(&mut pw).unwrap();
        let pex_len = pw.position();
        pex_buf.truncate(pex_len);
        pex_buf
    }

    #[test]
    fn expedited_call_dispatches_and_replies_with_return() {
        let (handles, driver) = test_handles();
        let services = registry_with_echo_program();
        let sessions = Arc::new(SessionTable::new());
        let listener =
            ExpeditedCourierListener::new(socket::CHS, "pex-courier-chs", services, sessions, vec![PexClientType::Chs]);

        let payload = encode_expedited_call(0xCAFE, PexClientType::Chs, 2, 3, 0, b"ping");
        let datagram = Datagram {
            src_mac: MacAddr::from_octets([1, 2, 3, 4, 5, 6]),
            timestamp: 0,
            control: 0,
            packet_type: PacketType::Pex,
            dst: Address { net: 1, host: 0, socket: socket::CHS },
            src: Address { net: 1, host: 0xBEEF, socket: 3500 },
            payload,
            raw_prefix: Vec::new(),
        };
        listener.handle(&handles, datagram);

        let transmitted = driver.take_transmitted();
        assert_eq!(transmitted.len(), 1);
    }

    #[test]
    fn wrong_client_type_is_rejected_with_invalid_packet_type_error() {
        let (handles, driver) = test_handles();
        let services = registry_with_echo_program();
        let sessions = Arc::new(SessionTable::new());
        let listener =
            ExpeditedCourierListener::new(socket::CHS, "pex-courier-chs", services, sessions, vec![PexClientType::Chs]);

        let payload = encode_expedited_call(0xCAFE, PexClientType::TeleDebug, 2, 3, 0, b"ping");
        let datagram = Datagram {
            src_mac: MacAddr::from_octets([1, 2, 3, 4, 5, 6]),
            timestamp: 0,
            control: 0,
            packet_type: PacketType::Pex,
            dst: Address { net: 1, host: 0, socket: socket::CHS },
            src: Address { net: 1, host: 0xBEEF, socket: 3500 },
            payload,
            raw_prefix: vec![0u8; 4],
        };
        listener.handle(&handles, datagram);

        let transmitted = driver.take_transmitted();
        assert_eq!(transmitted.len(), 1);
    }

    #[test]
    fn unregistered_version_is_rejected_with_version_range() {
        let (handles, driver) = test_handles();
        let services = registry_with_echo_program();
        let sessions = Arc::new(SessionTable::new());
        let listener =
            ExpeditedCourierListener::new(socket::CHS, "pex-courier-chs", services, sessions, vec![PexClientType::Chs]);

        let payload = encode_expedited_call(0xCAFE, PexClientType::Chs, 2, 99, 0, b"");
        let datagram = Datagram {
            src_mac: MacAddr::from_octets([1, 2, 3, 4, 5, 6]),
            timestamp: 0,
            control: 0,
            packet_type: PacketType::Pex,
            dst: Address { net: 1, host: 0, socket: socket::CHS },
            src: Address { net: 1, host: 0xBEEF, socket: 3500 },
            payload,
            raw_prefix: Vec::new(),
        };
        listener.handle(&handles, datagram);

        let transmitted = driver.take_transmitted();
        assert_eq!(transmitted.len(), 1);
    }

    #[test]
    fn streamed_call_dispatches_through_record_handler() {
        let (handles, _driver) = test_handles();
        let services = registry_with_echo_program();
        let sessions = Arc::new(SessionTable::new());
        let handler = StreamedCourierHandler::new(services, sessions);

        let message = Message::Call(CallBody { transaction: 7, program: 2, version: 3, procedure: 0, args: b"hi" });
        let mut buf = vec![0u8; 32];
        let mut w = CursorMut::new(&mut buf);
        message.encode(&mut w).unwrap();
        let len = w.position();

        let context = RecordContext { handles: &handles, remote_host: 0xBEEF, local_socket: socket::COURIER };
        let reply = handler.on_record(&context, &buf[..len]).expect("call should produce a reply");

        let mut r = Cursor::new(&reply);
        match Message::decode(&mut r).unwrap() {
            Message::Return(ret) => {
                assert_eq!(ret.transaction, 7);
                assert_eq!(ret.results, b"hi");
            }
            other => panic!("expected Return, got {other:?}"),
        }
    }

    #[test]
    fn streamed_non_call_message_is_dropped() {
        let (handles, _driver) = test_handles();
        let services = registry_with_echo_program();
        let sessions = Arc::new(SessionTable::new());
        let handler = StreamedCourierHandler::new(services, sessions);

        let message =
            Message::Reject(RejectBody { transaction: 1, code: RejectCode::NoSuchProcedureValue, version_range: None });
        let mut buf = vec![0u8; 16];
        let mut w = CursorMut::new(&mut buf);
        message.encode(&mut w).unwrap();
        let len = w.position();

        let context = RecordContext { handles: &handles, remote_host: 0xBEEF, local_socket: socket::COURIER };
        assert!(handler.on_record(&context, &buf[..len]).is_none());
    }
}
