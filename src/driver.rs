// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The narrow interface the core calls to reach a raw Ethernet device
//! (§4.3). The actual packet-capture driver (BPF or equivalent), device
//! enumeration, and signal handling live outside this crate; callers
//! implement [`Driver`] against whatever platform API they have.

use std::fmt;
use std::time::Duration;

use crate::wire::ethernet::MacAddr;

/// Outcome of [`Driver::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectResult {
    Readable,
    Timeout,
}

/// Milliseconds since the Unix epoch, as returned by [`Driver::receive`].
pub type TimestampMs = u64;

#[derive(Debug)]
pub enum DriverError {
    WouldBlock,
    Io(std::io::Error),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::WouldBlock => write!(f, "would block"),
            DriverError::Io(e) => write!(f, "driver i/o error: {e}"),
        }
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DriverError::WouldBlock => None,
            DriverError::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for DriverError {
    fn from(e: std::io::Error) -> Self {
        DriverError::Io(e)
    }
}

/// Abstract byte-level Ethernet send/receive with timestamping (§4.3).
///
/// Implementations are expected to be thread-safe for `transmit` (the
/// dispatcher serializes calls through a mutex regardless, per §4.5) but
/// `select`/`receive`/`discard` are only ever called from the single
/// dispatcher task.
pub trait Driver: Send + Sync {
    /// This device's own MAC address, used to fill the source field of
    /// outbound frames (`transmit` is "header-complete mode": the caller,
    /// not the driver, supplies the source MAC).
    fn address(&self) -> MacAddr;

    /// Block up to `timeout` for at least one frame to become readable.
    fn select(&self, timeout: Duration) -> Result<SelectResult, DriverError>;

    /// Read one frame into `buf`, returning its length and receive
    /// timestamp. Returns [`DriverError::WouldBlock`] once nothing is
    /// immediately readable (the dispatcher loops this until it sees that).
    fn receive(&self, buf: &mut [u8]) -> Result<(usize, TimestampMs), DriverError>;

    /// Write exactly one Ethernet frame.
    fn transmit(&self, frame: &[u8]) -> Result<usize, DriverError>;

    /// Purge any frames buffered by the OS/driver before the dispatcher
    /// started reading, called once at startup.
    fn discard(&self);

    fn close(&self);
}

/// Enumerates Ethernet devices available to embed as a [`Driver`]; the
/// actual enumeration mechanism (e.g. walking `/sys/class/net`) is left to
/// the embedding binary, matching spec.md §1's "device enumeration" carve-
/// out.
pub trait DeviceEnumerator {
    fn devices(&self) -> Vec<DeviceInfo>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub address: MacAddr,
}

#[cfg(test)]
pub mod loopback {
    //! An in-memory [`Driver`] used by this crate's own integration tests:
    //! two instances share a `VecDeque`-backed channel so test code can
    //! push a frame in on one "wire" and assert what the other side
    //! transmitted, without a real network device.
    use super::{Driver, DriverError, SelectResult, TimestampMs};
    use crate::wire::ethernet::MacAddr;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct Shared {
        inbound: VecDeque<Vec<u8>>,
        outbound: Vec<Vec<u8>>,
    }

    pub struct LoopbackDriver {
        address: MacAddr,
        shared: Arc<Mutex<Shared>>,
    }

    impl LoopbackDriver {
        #[must_use]
        pub fn new(address: MacAddr) -> Self {
            LoopbackDriver { address, shared: Arc::new(Mutex::new(Shared::default())) }
        }

        /// Queue a frame as if it had just arrived on the wire.
        pub fn inject(&self, frame: Vec<u8>) {
            self.shared.lock().inbound.push_back(frame);
        }

        /// Drain every frame transmitted so far.
        pub fn take_transmitted(&self) -> Vec<Vec<u8>> {
            std::mem::take(&mut self.shared.lock().outbound)
        }
    }

    impl Driver for LoopbackDriver {
        fn address(&self) -> MacAddr {
            self.address
        }

        fn select(&self, _timeout: Duration) -> Result<SelectResult, DriverError> {
            if self.shared.lock().inbound.is_empty() {
                Ok(SelectResult::Timeout)
            } else {
                Ok(SelectResult::Readable)
            }
        }

        fn receive(&self, buf: &mut [u8]) -> Result<(usize, TimestampMs), DriverError> {
            let mut shared = self.shared.lock();
            match shared.inbound.pop_front() {
                Some(frame) => {
                    let len = frame.len();
                    buf[..len].copy_from_slice(&frame);
                    Ok((len, 0))
                }
                None => Err(DriverError::WouldBlock),
            }
        }

        fn transmit(&self, frame: &[u8]) -> Result<usize, DriverError> {
            self.shared.lock().outbound.push(frame.to_vec());
            Ok(frame.len())
        }

        fn discard(&self) {
            self.shared.lock().inbound.clear();
        }

        fn close(&self) {}
    }
}
