// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Parsed configuration (§6): directly-reachable networks, host aliases,
//! and the local time-zone fields the Time responder needs. Reading the
//! file from disk is the embedding binary's job — this module only models
//! the parsed shape and, with the `config-loader` feature, parses it out of
//! an already-read YAML document (grounded on the teacher's
//! `dds/qos/loaders/yaml.rs` profile-file convention).

use std::fmt;

#[cfg(feature = "config-loader")]
use serde::Deserialize;

/// A directly-reachable network (`network.list[]`). `hop == 0` marks the
/// local net the host's interface sits on.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-loader", derive(Deserialize))]
pub struct NetworkEntry {
    pub name: String,
    pub net: u32,
    pub hop: u16,
}

/// A human-readable host alias (`host.list[]`). `value` is the 48-bit XNS
/// host address widened into a `u64`, as parsed by [`parse_host_value`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-loader", derive(Deserialize))]
pub struct HostEntry {
    pub name: String,
    #[cfg_attr(feature = "config-loader", serde(deserialize_with = "deserialize_host_value"))]
    pub value: u64,
}

#[cfg(feature = "config-loader")]
fn deserialize_host_value<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_host_value(&raw).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config-loader", derive(Deserialize))]
#[cfg_attr(feature = "config-loader", serde(rename_all = "lowercase"))]
pub enum OffsetDirection {
    West,
    East,
}

/// `time.*` fields (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config-loader", derive(Deserialize))]
pub struct TimeConfig {
    pub offset_direction: OffsetDirection,
    pub offset_hours: u16,
    pub offset_minutes: u16,
    pub dst_start: u16,
    pub dst_end: u16,
}

impl Default for TimeConfig {
    fn default() -> Self {
        TimeConfig {
            offset_direction: OffsetDirection::West,
            offset_hours: 0,
            offset_minutes: 0,
            dst_start: 0,
            dst_end: 0,
        }
    }
}

/// The parsed configuration the core consumes: `network.interface`,
/// `network.list[]`, `host.list[]`, `time.*`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-loader", derive(Deserialize))]
pub struct Config {
    pub interface: String,
    #[cfg_attr(feature = "config-loader", serde(default))]
    pub networks: Vec<NetworkEntry>,
    #[cfg_attr(feature = "config-loader", serde(default))]
    pub hosts: Vec<HostEntry>,
    pub time: TimeConfig,
}

impl Config {
    /// Look up a configured network by its number, following §4.10's RIP
    /// specific-net request rule.
    #[must_use]
    pub fn network(&self, net: u32) -> Option<&NetworkEntry> {
        self.networks.iter().find(|entry| entry.net == net)
    }

    /// Look up a host alias by its configured name.
    #[must_use]
    pub fn host(&self, name: &str) -> Option<u64> {
        self.hosts.iter().find(|entry| entry.name == name).map(|entry| entry.value)
    }

    #[cfg(feature = "config-loader")]
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|e| ConfigError::Yaml(e.to_string()))
    }
}

/// Parse one of the three textual host/net value encodings the original
/// `IDP::Host::fromString` accepts:
/// - octal `nnnnb` (trailing `b`, e.g. `1000b`)
/// - colon- or hyphen-separated hex octets, e.g. `aa:bb:cc:dd:ee:ff`
/// - decimal-triplet grouping, e.g. `123-456-789-012[-345]`, whose groups
///   concatenate (decimal-digit-wise) into one value, per spec.md §6.
pub fn parse_host_value(text: &str) -> Result<u64, ConfigError> {
    if let Some(digits) = text.strip_suffix('b').or_else(|| text.strip_suffix('B')) {
        return u64::from_str_radix(digits, 8)
            .map_err(|_| ConfigError::BadHostValue(text.to_string()));
    }

    if text.contains(':') || text.contains('-') && looks_like_hex_octets(text) {
        let sep = if text.contains(':') { ':' } else { '-' };
        let mut value: u64 = 0;
        let mut count = 0;
        for octet in text.split(sep) {
            let byte = u8::from_str_radix(octet, 16)
                .map_err(|_| ConfigError::BadHostValue(text.to_string()))?;
            value = (value << 8) | u64::from(byte);
            count += 1;
        }
        if count == 0 {
            return Err(ConfigError::BadHostValue(text.to_string()));
        }
        return Ok(value);
    }

    if text.contains('-') {
        let mut joined = String::new();
        for group in text.split('-') {
            if group.is_empty() || group.len() > 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ConfigError::BadHostValue(text.to_string()));
            }
            joined.push_str(group);
        }
        return joined.parse::<u64>().map_err(|_| ConfigError::BadHostValue(text.to_string()));
    }

    text.parse::<u64>().map_err(|_| ConfigError::BadHostValue(text.to_string()))
}

/// Disambiguate `aa-bb-cc-dd-ee-ff` (hex octets) from `123-456-789-012`
/// (decimal triplets): a hyphenated group containing a hex-only digit
/// (`a`..`f`) or exceeding 3 characters can only be the hex form.
fn looks_like_hex_octets(text: &str) -> bool {
    text.split('-').any(|group| {
        group.len() > 3 || group.bytes().any(|b| matches!(b, b'a'..=b'f' | b'A'..=b'F'))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    BadHostValue(String),
    Yaml(String),
    /// No `network.list[]` entry has `hop == 0`, so the server has nothing
    /// to treat as the net its own interface sits on.
    MissingLocalNetwork,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::BadHostValue(text) => write!(f, "unparseable host/net value: `{text}`"),
            ConfigError::Yaml(msg) => write!(f, "yaml config error: {msg}"),
            ConfigError::MissingLocalNetwork => write!(f, "no network entry with hop == 0 (local network)"),
        }
    }
}

impl std::error::Error for ConfigError {}
