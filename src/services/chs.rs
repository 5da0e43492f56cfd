// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Clearinghouse (Courier program 2, version 2) record shapes and
//! registration contract (§4.10/§4.14). Grounded on
//! `Courier/Clearinghouse2.h`'s `ThreePartName`/`Property` definitions and
//! its `RetrieveAddresses`/`ListDomainServed` procedures, the two calls a
//! workstation issues during boot to find its naming and time services.
//!
//! This module only supplies the wire shapes and a stub registration for
//! every numbered procedure the original program defines — it holds no
//! actual name database. An embedder registers its own handlers over the
//! stubs with [`ServiceRegistry::register`] before starting the server;
//! anything left unregistered keeps answering `noSuchProcedureNumber`.

use crate::codec::{CodecResult, Cursor, CursorMut, Decode, Encode};
use crate::courier::{CourierError, ServiceRegistry};
use crate::wire::courier::{decode_string, encode_string};

/// Clearinghouse's Courier program number.
pub const PROGRAM: u32 = 2;
/// The only version this module knows the procedure numbering for.
pub const VERSION: u16 = 2;

/// `Property: TYPE = LONG CARDINAL`. `ALL` (0) matches every property on a
/// name; `NULL_PROPERTY` (all-ones) never matches a real one.
pub type Property = u32;

/// Matches every property of a name in a `ListProperties`-style query.
pub const ALL: Property = 0;
/// Never matches a real property; used as a sentinel, not sent on the wire.
pub const NULL_PROPERTY: Property = u32::MAX;

/// `ThreePartName: RECORD [organization, domain, object: STRING]`, Courier's
/// fully qualified name for everything the Clearinghouse tracks (users,
/// servers, mail boxes). Also used, unmodified, as `ObjectName`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectName<'a> {
    pub organization: &'a [u8],
    pub domain: &'a [u8],
    pub object: &'a [u8],
}

impl<'a> Decode<'a> for ObjectName<'a> {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        let organization = decode_string(cursor)?;
        let domain = decode_string(cursor)?;
        let object = decode_string(cursor)?;
        Ok(ObjectName { organization, domain, object })
    }
}

impl Encode for ObjectName<'_> {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        encode_string(cursor, self.organization)?;
        encode_string(cursor, self.domain)?;
        encode_string(cursor, self.object)
    }
}

/// `NetworkAddress: RECORD [network: ARRAY 2 OF UNSPECIFIED, host: ARRAY 3
/// OF UNSPECIFIED, socket: UNSPECIFIED]`, the shape `RetrieveAddresses`
/// returns: the caller's own net/host/socket as the Clearinghouse server
/// sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkAddress {
    pub net: u32,
    pub host: u64,
    pub socket: u16,
}

impl<'a> Decode<'a> for NetworkAddress {
    fn decode(cursor: &mut Cursor<'a>) -> CodecResult<Self> {
        let net = cursor.read_u32()?;
        let host_hi = cursor.read_u16()? as u64;
        let host_lo = cursor.read_u32()? as u64;
        let socket = cursor.read_u16()?;
        Ok(NetworkAddress { net, host: (host_hi << 32) | host_lo, socket })
    }
}

impl Encode for NetworkAddress {
    fn encode(&self, cursor: &mut CursorMut<'_>) -> CodecResult<()> {
        cursor.write_u32(self.net)?;
        cursor.write_u16((self.host >> 32) as u16)?;
        cursor.write_u32((self.host & 0xFFFF_FFFF) as u32)?;
        cursor.write_u16(self.socket)
    }
}

/// The 23 procedure numbers `Courier::Clearinghouse2` assigns, in the order
/// the header lists their `= N` annotations. Kept as a flat constant table
/// rather than one enum variant per call since nothing here interprets the
/// arguments — only [`register_stubs`] needs the numbers.
pub mod procedure {
    pub const RETRIEVE_ADDRESSES: u16 = 0;
    pub const LIST_DOMAIN_SERVED: u16 = 1;
    pub const CREATE_OBJECT: u16 = 2;
    pub const DELETE_OBJECT: u16 = 3;
    pub const LOOKUP_OBJECT: u16 = 4;
    pub const LIST_ORGANIZATIONS: u16 = 5;
    pub const LIST_DOMAIN: u16 = 6;
    pub const LIST_OBJECTS: u16 = 7;
    pub const LIST_ALIASES: u16 = 8;
    pub const LIST_ALIASES_OF: u16 = 9;
    pub const CREATE_ALIAS: u16 = 10;
    pub const DELETE_ALIAS: u16 = 11;
    pub const ADD_GROUP_PROPERTY: u16 = 12;
    pub const ADD_ITEM_PROPERTY: u16 = 13;
    pub const DELETE_PROPERTY: u16 = 14;
    pub const LIST_PROPERTIES: u16 = 15;
    pub const RETRIEVE_ITEM: u16 = 16;
    pub const CHANGE_ITEM: u16 = 17;
    pub const RETRIEVE_MEMBERS: u16 = 18;
    pub const ADD_MEMBER: u16 = 19;
    pub const ADD_SELF: u16 = 20;
    pub const DELETE_SELF: u16 = 21;
    pub const IS_MEMBER: u16 = 22;
}

/// Every procedure number above, paired with whether its signature takes a
/// `BulkData.Sink`/`BulkData.Source` argument (`record.bulk_allowed` only
/// needs to be true once per `(program, version)`, but marking it per call
/// here keeps the table self-documenting).
const ALL_PROCEDURES: &[(u16, bool)] = &[
    (procedure::RETRIEVE_ADDRESSES, false),
    (procedure::LIST_DOMAIN_SERVED, true),
    (procedure::CREATE_OBJECT, false),
    (procedure::DELETE_OBJECT, false),
    (procedure::LOOKUP_OBJECT, false),
    (procedure::LIST_ORGANIZATIONS, true),
    (procedure::LIST_DOMAIN, true),
    (procedure::LIST_OBJECTS, true),
    (procedure::LIST_ALIASES, true),
    (procedure::LIST_ALIASES_OF, true),
    (procedure::CREATE_ALIAS, false),
    (procedure::DELETE_ALIAS, false),
    (procedure::ADD_GROUP_PROPERTY, true),
    (procedure::ADD_ITEM_PROPERTY, false),
    (procedure::DELETE_PROPERTY, false),
    (procedure::LIST_PROPERTIES, false),
    (procedure::RETRIEVE_ITEM, false),
    (procedure::CHANGE_ITEM, false),
    (procedure::RETRIEVE_MEMBERS, true),
    (procedure::ADD_MEMBER, false),
    (procedure::ADD_SELF, false),
    (procedure::DELETE_SELF, false),
    (procedure::IS_MEMBER, false),
];

/// Register every Clearinghouse procedure number against `registry` with a
/// handler that always answers `noSuchProcedureNumber`. Call this once at
/// startup, then call [`ServiceRegistry::register`] again for each
/// procedure the embedding application actually implements — a later
/// registration of the same `(program, version, procedure)` replaces the
/// stub.
pub fn register_stubs(registry: &mut ServiceRegistry) {
    for &(number, bulk_allowed) in ALL_PROCEDURES {
        registry.register(PROGRAM, VERSION, number, bulk_allowed, Box::new(|_ctx, _args| Err(CourierError::NoSuchProcedure)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CursorMut;

    #[test]
    fn object_name_round_trips() {
        let mut buf = [0u8; 64];
        let mut cursor = CursorMut::new(&mut buf);
        let name = ObjectName { organization: b"Naskel", domain: b"Corp", object: b"Printer1" };
        name.encode(&mut cursor).unwrap();
        let len = cursor.position();

        let mut reader = Cursor::new(&buf[..len]);
        let decoded = ObjectName::decode(&mut reader).unwrap();
        assert_eq!(decoded, name);
    }

    #[test]
    fn network_address_round_trips() {
        let mut buf = [0u8; 16];
        let mut cursor = CursorMut::new(&mut buf);
        let address = NetworkAddress { net: 1, host: 0x0000_AABB_CCDD_EEFF, socket: 3 };
        address.encode(&mut cursor).unwrap();
        let len = cursor.position();

        let mut reader = Cursor::new(&buf[..len]);
        let decoded = NetworkAddress::decode(&mut reader).unwrap();
        assert_eq!(decoded, address);
    }

    #[test]
    fn register_stubs_answers_no_such_procedure_until_overridden() {
        let mut registry = ServiceRegistry::new();
        register_stubs(&mut registry);
        assert!(registry.bulk_allowed(PROGRAM, VERSION));

        registry.register(PROGRAM, VERSION, procedure::RETRIEVE_ADDRESSES, false, Box::new(|_ctx, _args| Ok(vec![1, 2, 3])));

        // Overridden procedure now runs the real handler...
        let config = crate::config::Config {
            interface: "test0".into(),
            networks: vec![],
            hosts: vec![],
            time: crate::config::TimeConfig::default(),
        };
        let context = crate::dispatch::Context { local_net: 1, device_address: crate::wire::ethernet::MacAddr::from_octets([0xAA, 0, 0, 0, 0, 1]) };
        let mut session = crate::courier::Session::default();
        let result =
            registry.invoke(PROGRAM, VERSION, procedure::RETRIEVE_ADDRESSES, &[], &mut session, &config, &context).unwrap();
        assert_eq!(result, vec![1, 2, 3]);

        // ...while an unregistered-by-the-app procedure still answers the stub.
        let err =
            registry.invoke(PROGRAM, VERSION, procedure::LOOKUP_OBJECT, &[], &mut session, &config, &context).unwrap_err();
        assert_eq!(err, CourierError::NoSuchProcedure);
    }
}
