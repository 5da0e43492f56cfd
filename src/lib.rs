// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # xns-stack
//!
//! A pure Rust implementation of the Xerox Network Systems (XNS) protocol
//! stack over raw Ethernet: IDP, RIP, Echo, PEX, SPP and Courier.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use xns_stack::config::Config;
//! use xns_stack::courier::ServiceRegistry;
//! use xns_stack::driver::Driver;
//! use xns_stack::services::chs;
//! use xns_stack::{Result, Server};
//!
//! fn run(driver: Arc<dyn Driver>, config: Config) -> Result<()> {
//!     let mut registry = ServiceRegistry::new();
//!     chs::register_stubs(&mut registry); // override with real handlers first
//!     let services = Arc::new(registry);
//!     let mut server = Server::new(driver, config, services)?;
//!     server.start();
//!     // ... run until shutdown ...
//!     server.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                     Courier call plane (services)                   |
//! |   ServiceRegistry | SessionTable | Expedited(PEX) | Streamed(SPP)   |
//! +---------------------------------------------------------------------+
//! |                     SPP connection engine                           |
//! |   ConnectionEngine | Connection (windows, retransmit, reorder)      |
//! +---------------------------------------------------------------------+
//! |                       Dispatch plane                                |
//! |   Dispatcher (ingress loop) | ListenerRegistry | Transmitter        |
//! +---------------------------------------------------------------------+
//! |                    Codec / wire record layer                        |
//! |   Ethernet | IDP | RIP | Echo | Error | PEX | SPP | Courier | Time  |
//! +---------------------------------------------------------------------+
//! |                        Driver (transport)                           |
//! |   caller-supplied raw-Ethernet send/receive, this crate never owns it|
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Server`] | Owns the dispatcher, connection engine and well-known listeners |
//! | [`driver::Driver`] | The raw-Ethernet transport the embedder implements |
//! | [`courier::ServiceRegistry`] | `(program, version, procedure)` call table |
//! | [`config::Config`] | Parsed network/host/time configuration |
//! | [`dispatch::Listener`] | The per-socket registration contract |
//!
//! ## Modules Overview
//!
//! - [`codec`] - Big-endian cursor primitives shared by every wire record
//! - [`config`] - Parsed network/host/time-zone configuration
//! - [`courier`] - Call plane: service registry, sessions, PEX/SPP framers
//! - [`dispatch`] - Ingress loop, listener registry, shared transmit path
//! - [`driver`] - The raw-Ethernet transport contract an embedder implements
//! - [`error`] - Crate-level error type composing each subsystem's own
//! - [`frame`] - Ethernet/IDP framing, checksum and padding
//! - [`responders`] - RIP/Echo/Time well-known-socket services
//! - [`services`] - Optional Courier program registrations (Clearinghouse)
//! - [`spp`] - Sequenced Packet Protocol connection engine
//! - [`wire`] - Decode/Encode impls for every XNS record format

pub mod codec;
pub mod config;
pub mod courier;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod frame;
pub mod responders;
pub mod services;
pub mod spp;
pub mod wire;

pub use error::{Error, Result};

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, select, tick, Sender};

use config::Config;
use courier::{ExpeditedCourierListener, ServiceRegistry, SessionTable, StreamedCourierHandler};
use dispatch::{Context, Dispatcher, ListenerRegistry, ServerHandles, Transmitter};
use driver::Driver;
use responders::{EchoResponder, RipResponder, TimeResponder};
use spp::engine::{ConnectionEngine, SppAcceptor};
use wire::idp::socket;
use wire::pex::PexClientType;

/// Interval between retransmit/idle-timeout/session-sweep ticks (§4.7/§4.9).
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Ties the dispatch plane, the SPP connection engine and the Courier call
/// plane together, registers the five well-known-socket services, and owns
/// the two background threads that drive the server while it is running.
pub struct Server {
    handles: ServerHandles,
    engine: Arc<ConnectionEngine>,
    sessions: Arc<SessionTable>,
    dispatcher: Arc<Dispatcher>,
    dispatcher_thread: Option<JoinHandle<()>>,
    tick_thread: Option<JoinHandle<()>>,
    tick_stop: Option<Sender<()>>,
}

impl Server {
    /// Build a server over `driver`, registering the RIP/Echo/Time
    /// responders and the Courier Expedited (PEX/Clearinghouse) and
    /// Streamed (SPP) paths against `services`. Does not start any
    /// background thread — call [`Server::start`] once ready.
    pub fn new(driver: Arc<dyn Driver>, config: Config, services: Arc<ServiceRegistry>) -> Result<Self> {
        let local_net =
            config.networks.iter().find(|net| net.hop == 0).map(|net| net.net).ok_or(config::ConfigError::MissingLocalNetwork)?;
        let device_address = driver.address();

        let handles = ServerHandles {
            registry: Arc::new(ListenerRegistry::new()),
            transmitter: Arc::new(Transmitter::new(Arc::clone(&driver))),
            config: Arc::new(config),
            context: Context { local_net, device_address },
        };

        let engine = Arc::new(ConnectionEngine::new());
        let sessions = Arc::new(SessionTable::new());

        let streamed_handler = Arc::new(StreamedCourierHandler::new(Arc::clone(&services), Arc::clone(&sessions)));
        let acceptor: Arc<dyn dispatch::Listener> = Arc::new(
            SppAcceptor::new(socket::COURIER, "spp-courier-acceptor", Arc::clone(&engine)).with_handler(streamed_handler),
        );
        let expedited: Arc<dyn dispatch::Listener> = Arc::new(ExpeditedCourierListener::new(
            socket::CHS,
            "pex-courier-chs",
            Arc::clone(&services),
            Arc::clone(&sessions),
            vec![PexClientType::Time, PexClientType::Chs],
        ));
        let rip: Arc<dyn dispatch::Listener> = Arc::new(RipResponder::new(socket::RIP));
        let echo: Arc<dyn dispatch::Listener> = Arc::new(EchoResponder::new(socket::ECHO));
        let time: Arc<dyn dispatch::Listener> = Arc::new(TimeResponder::new(socket::TIME));

        for listener in [acceptor, expedited, rip, echo, time] {
            handles.registry.add(listener, &handles, false)?;
        }

        let dispatcher = Arc::new(Dispatcher::new(driver, handles.clone()));

        Ok(Server { handles, engine, sessions, dispatcher, dispatcher_thread: None, tick_thread: None, tick_stop: None })
    }

    /// Shared handles (config/context/registry/transmitter) this server was
    /// built with, for an embedder that wants to register its own listener
    /// before or after starting.
    #[must_use]
    pub fn handles(&self) -> &ServerHandles {
        &self.handles
    }

    /// Start the ingress-loop thread and the retransmit/sweep tick thread.
    /// Idempotent only in the sense that calling it twice spawns a second
    /// pair of threads sharing the same state — callers should call it once.
    pub fn start(&mut self) {
        self.handles.registry.set_state_started();

        let dispatcher = Arc::clone(&self.dispatcher);
        self.dispatcher_thread = Some(thread::spawn(move || dispatcher.run()));

        let (tick_stop_tx, tick_stop_rx) = bounded::<()>(0);
        let engine = Arc::clone(&self.engine);
        let sessions = Arc::clone(&self.sessions);
        let handles = self.handles.clone();
        self.tick_thread = Some(thread::spawn(move || {
            let ticker = tick(TICK_INTERVAL);
            loop {
                select! {
                    recv(ticker) -> _ => {
                        engine.tick(&handles);
                        sessions.sweep(Instant::now());
                    }
                    recv(tick_stop_rx) -> _ => break,
                }
            }
        }));
        self.tick_stop = Some(tick_stop_tx);
    }

    /// Stop both background threads and every registered listener, joining
    /// each thread before returning.
    pub fn stop(&mut self) {
        self.dispatcher.stop();
        if let Some(stop) = self.tick_stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.dispatcher_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.tick_thread.take() {
            let _ = handle.join();
        }
        self.handles.registry.stop_all();
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.dispatcher_thread.is_some() || self.tick_thread.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NetworkEntry, TimeConfig};
    use crate::driver::loopback::LoopbackDriver;
    use crate::wire::ethernet::MacAddr;

    fn test_config() -> Config {
        Config {
            interface: "test0".into(),
            networks: vec![NetworkEntry { name: "home".into(), net: 1, hop: 0 }],
            hosts: vec![],
            time: TimeConfig::default(),
        }
    }

    #[test]
    fn new_registers_all_well_known_listeners() {
        let local = MacAddr::from_octets([0xAA, 0, 0, 0, 0, 1]);
        let driver: Arc<dyn Driver> = Arc::new(LoopbackDriver::new(local));
        let services = Arc::new(ServiceRegistry::new());
        let server = Server::new(driver, test_config(), services).unwrap();

        assert!(server.handles().registry.contains(socket::RIP));
        assert!(server.handles().registry.contains(socket::ECHO));
        assert!(server.handles().registry.contains(socket::TIME));
        assert!(server.handles().registry.contains(socket::COURIER));
        assert!(server.handles().registry.contains(socket::CHS));
    }

    #[test]
    fn new_rejects_config_with_no_local_network() {
        let local = MacAddr::from_octets([0xAA, 0, 0, 0, 0, 1]);
        let driver: Arc<dyn Driver> = Arc::new(LoopbackDriver::new(local));
        let services = Arc::new(ServiceRegistry::new());
        let config = Config { interface: "test0".into(), networks: vec![], hosts: vec![], time: TimeConfig::default() };
        assert!(Server::new(driver, config, services).is_err());
    }

    #[test]
    fn start_and_stop_joins_background_threads() {
        let local = MacAddr::from_octets([0xAA, 0, 0, 0, 0, 1]);
        let driver: Arc<dyn Driver> = Arc::new(LoopbackDriver::new(local));
        let services = Arc::new(ServiceRegistry::new());
        let mut server = Server::new(driver, test_config(), services).unwrap();

        server.start();
        assert!(server.dispatcher_thread.is_some());
        assert!(server.tick_thread.is_some());
        server.stop();
        assert!(server.dispatcher_thread.is_none());
        assert!(server.tick_thread.is_none());
    }

}
