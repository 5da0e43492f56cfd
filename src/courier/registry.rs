// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The service registry (§4.9): `(program, version) -> procedure table`,
//! frozen after startup, plus the ephemeral session store handlers use to
//! carry state (bulk-data binding, authenticator context) across calls on
//! the same transaction.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::CourierError;
use crate::config::Config;
use crate::dispatch::Context;

/// A session expires this long after its last use (§4.9).
pub const SESSION_TTL: Duration = Duration::from_secs(600);

/// Per-transaction state a handler may stash between calls — most commonly
/// a bulk-data descriptor bound by one call and consumed by a later one.
#[derive(Debug, Default)]
pub struct Session {
    pub last_used_hint: Option<Instant>,
    pub bulk: Option<super::bulk::BulkDescriptor>,
}

/// Keys a [`Session`] by the SPP/PEX transaction context it belongs to:
/// the calling host plus the Courier transaction id it used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub remote_host: u64,
    pub transaction: u16,
}

/// Ephemeral session table, swept for entries idle past [`SESSION_TTL`].
#[derive(Default)]
pub struct SessionTable {
    sessions: DashMap<SessionKey, (Session, Instant)>,
}

impl SessionTable {
    #[must_use]
    pub fn new() -> Self {
        SessionTable { sessions: DashMap::new() }
    }

    /// Look up (creating if absent) the session for `key`, run `f` against
    /// it, and stamp its last-use time to `now`.
    pub fn with_session<R>(&self, key: SessionKey, now: Instant, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut entry = self.sessions.entry(key).or_insert_with(|| (Session::default(), now));
        entry.1 = now;
        f(&mut entry.0)
    }

    /// Drop every session idle longer than [`SESSION_TTL`].
    pub fn sweep(&self, now: Instant) {
        self.sessions.retain(|_, (_, last_used)| now.duration_since(*last_used) < SESSION_TTL);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// The capability set a procedure handler is given (§4.9): local
/// configuration, device/topology context, and its call's session.
pub struct CallContext<'a> {
    pub config: &'a Config,
    pub context: &'a Context,
    pub session: &'a mut Session,
}

/// A registered procedure: decode `args`, do the work, encode the result
/// bytes (the caller wraps them into a `return`/`abort` Courier message).
pub type Procedure = dyn Fn(&mut CallContext<'_>, &[u8]) -> Result<Vec<u8>, CourierError> + Send + Sync;

pub struct ServiceRecord {
    pub program: u32,
    pub version: u16,
    pub bulk_allowed: bool,
    procedures: HashMap<u16, Box<Procedure>>,
}

/// `(program, version) -> procedure table` (§3/§4.9). Registered at startup
/// and not mutated again; reads from any number of connection/dispatcher
/// tasks are safe without further synchronization.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<(u32, u16), ServiceRecord>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        ServiceRegistry { services: HashMap::new() }
    }

    /// Register one procedure of a `(program, version)` pair, creating the
    /// service record on first use (§4.9's literal `register(program,
    /// version, procedure, handler, bulkAllowed)`).
    pub fn register(
        &mut self,
        program: u32,
        version: u16,
        procedure: u16,
        bulk_allowed: bool,
        handler: Box<Procedure>,
    ) {
        let record = self.services.entry((program, version)).or_insert_with(|| ServiceRecord {
            program,
            version,
            bulk_allowed,
            procedures: HashMap::new(),
        });
        record.bulk_allowed = record.bulk_allowed || bulk_allowed;
        record.procedures.insert(procedure, handler);
    }

    /// The full range of registered versions for `program`, used to answer
    /// a `noSuchVersionNumber` reject with the callee's supported range
    /// (§4.8's Open Question (a): "the full registered range").
    fn version_range(&self, program: u32) -> Option<(u16, u16)> {
        let mut versions: Vec<u16> =
            self.services.keys().filter(|(p, _)| *p == program).map(|(_, v)| *v).collect();
        versions.sort_unstable();
        versions.first().copied().zip(versions.last().copied())
    }

    /// Dispatch one call (§4.8's error mapping).
    pub fn invoke(
        &self,
        program: u32,
        version: u16,
        procedure: u16,
        args: &[u8],
        session: &mut Session,
        config: &Config,
        context: &Context,
    ) -> Result<Vec<u8>, CourierError> {
        let Some(range) = self.version_range(program) else {
            return Err(CourierError::NoSuchProgram);
        };
        let Some(record) = self.services.get(&(program, version)) else {
            return Err(CourierError::NoSuchVersion { low: range.0, high: range.1 });
        };
        let handler = record.procedures.get(&procedure).ok_or(CourierError::NoSuchProcedure)?;
        let mut call_context = CallContext { config, context, session };
        handler(&mut call_context, args)
    }

    #[must_use]
    pub fn bulk_allowed(&self, program: u32, version: u16) -> bool {
        self.services.get(&(program, version)).is_some_and(|record| record.bulk_allowed)
    }
}
