// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The listener registry (§4.6): socket → listener map with well-known and
//! ephemeral allocation, guarded for concurrent add/remove from any task.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::{DispatchError, Listener, ListenerState, ServerHandles};
use crate::wire::idp::socket::MAX_WELLKNOWN;

/// First ephemeral socket number (§3: "1..3000 well-known ... ephemeral
/// allocation draws from 3001..65535").
pub const EPHEMERAL_LO: u16 = MAX_WELLKNOWN + 1;
pub const EPHEMERAL_HI: u16 = u16::MAX;

pub struct ListenerRegistry {
    listeners: DashMap<u16, Arc<dyn Listener>>,
    next_ephemeral: AtomicU32,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        ListenerRegistry { listeners: DashMap::new(), next_ephemeral: AtomicU32::new(u32::from(EPHEMERAL_LO)) }
    }

    /// Register `listener` at `socket`, running its `init`/`start` lifecycle
    /// if the server is already running. Fails with
    /// [`DispatchError::SocketInUse`] if the socket is already bound.
    pub fn add(
        &self,
        listener: Arc<dyn Listener>,
        handles: &ServerHandles,
        running: bool,
    ) -> Result<(), DispatchError> {
        let socket = listener.socket();
        let entry = self.listeners.entry(socket);
        match entry {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(DispatchError::SocketInUse(socket)),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                listener.init(handles);
                if running {
                    listener.start();
                }
                vacant.insert(listener);
                Ok(())
            }
        }
    }

    /// Remove the listener bound to `socket`, invoking `stop` on it. The
    /// listener's `autoDelete` policy (spec.md §4.6) is the caller's
    /// decision to drop the returned `Arc` or retain it elsewhere.
    pub fn remove(&self, socket: u16) -> Option<Arc<dyn Listener>> {
        let (_, listener) = self.listeners.remove(&socket)?;
        listener.stop();
        Some(listener)
    }

    #[must_use]
    pub fn get(&self, socket: u16) -> Option<Arc<dyn Listener>> {
        self.listeners.get(&socket).map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn contains(&self, socket: u16) -> bool {
        self.listeners.contains_key(&socket)
    }

    /// Allocate an unused socket in the ephemeral range by linear probe
    /// with wrap, starting from a rolling counter (§4.6).
    pub fn ephemeral_socket(&self) -> Option<u16> {
        let span = u32::from(EPHEMERAL_HI) - u32::from(EPHEMERAL_LO) + 1;
        for _ in 0..span {
            let candidate = self.next_ephemeral.fetch_add(1, Ordering::Relaxed);
            let wrapped = u32::from(EPHEMERAL_LO) + (candidate - u32::from(EPHEMERAL_LO)) % span;
            let socket = wrapped as u16;
            if !self.listeners.contains_key(&socket) {
                return Some(socket);
            }
        }
        None
    }

    /// Stop and drop every registered listener; called from `Server::stop`.
    pub fn stop_all(&self) {
        for entry in self.listeners.iter() {
            entry.value().stop();
        }
        self.listeners.clear();
    }

    pub fn set_state_started(&self) {
        for entry in self.listeners.iter() {
            if entry.value().state() == ListenerState::Initialized {
                entry.value().start();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::tests::NullListener;

    #[test]
    fn ephemeral_allocation_avoids_collisions() {
        let registry = ListenerRegistry::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..16 {
            let socket = registry.ephemeral_socket().unwrap();
            assert!(socket >= EPHEMERAL_LO);
            assert!(seen.insert(socket));
        }
    }

    #[test]
    fn add_rejects_duplicate_socket() {
        let registry = ListenerRegistry::new();
        let handles = ServerHandles::for_test();
        let a = Arc::new(NullListener::new(100));
        let b = Arc::new(NullListener::new(100));
        registry.add(a, &handles, false).unwrap();
        assert!(matches!(registry.add(b, &handles, false), Err(DispatchError::SocketInUse(100))));
    }

    #[test]
    fn remove_frees_the_socket_for_reuse() {
        let registry = ListenerRegistry::new();
        let handles = ServerHandles::for_test();
        let listener = Arc::new(NullListener::new(200));
        registry.add(listener, &handles, false).unwrap();
        assert!(registry.remove(200).is_some());
        assert!(registry.get(200).is_none());
    }
}
