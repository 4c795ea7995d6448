// crates/autoconf-core/src/document.rs
// ============================================================================
// Module: AutoConf Document Model
// Description: Typed representation of the autoconf JSON document.
// Purpose: Decode, hold, and filter network-wide bootstrap and routing settings.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! [`Config`] mirrors the autoconf JSON document field for field. Field names
//! on the wire are stable and case-sensitive; unknown fields are ignored so
//! newer servers can extend the document without breaking older clients.
//!
//! The accessors implement the "native system" rule: when a host already runs
//! a system through its own protocol stack, delegated HTTP endpoints serving
//! that system are suppressed so that each system is reached through exactly
//! one path.
//!
//! Invariants:
//! - Collections decode `null` and missing values as empty.
//! - Accessors never mutate the document; they return filtered copies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// The only document schema version this client understands.
pub const SUPPORTED_SCHEMA: u32 = 1;

/// System name of the public Amino DHT.
pub const SYSTEM_AMINO_DHT: &str = "AminoDHT";

/// System name of the network indexer.
pub const SYSTEM_IPNI: &str = "IPNI";

// ============================================================================
// SECTION: Document Types
// ============================================================================

/// The autoconf document.
///
/// # Invariants
/// - After validation: `version > 0` and `schema == SUPPORTED_SCHEMA`.
/// - `delegated_endpoints` keys are base URLs; paths live in `read`/`write`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Payload identity; a strictly greater value is newer.
    #[serde(rename = "AutoConfVersion", default)]
    pub version: i64,
    /// Document schema version.
    #[serde(rename = "AutoConfSchema", default)]
    pub schema: u32,
    /// Server-advertised maximum cache age in seconds. Non-positive means no hint.
    #[serde(rename = "AutoConfTTL", default)]
    pub ttl_secs: i64,
    /// Systems known to the network, keyed by system name.
    #[serde(rename = "SystemRegistry", default, deserialize_with = "null_as_default")]
    pub system_registry: BTreeMap<String, SystemConfig>,
    /// DNS-over-HTTPS resolvers keyed by DNS suffix (with trailing dot).
    #[serde(rename = "DNSResolvers", default, deserialize_with = "null_as_default")]
    pub dns_resolvers: BTreeMap<String, Vec<String>>,
    /// Delegated HTTP endpoints keyed by base URL.
    #[serde(rename = "DelegatedEndpoints", default, deserialize_with = "null_as_default")]
    pub delegated_endpoints: BTreeMap<String, EndpointConfig>,
}

/// Registry entry describing one routing or indexing system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Optional documentation URL.
    #[serde(rename = "URL", default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    /// Human-readable description.
    #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Present when hosts may run the system locally.
    #[serde(rename = "NativeConfig", default, skip_serializing_if = "Option::is_none")]
    pub native_config: Option<NativeConfig>,
    /// Present when the system may be reached over HTTP.
    #[serde(rename = "DelegatedConfig", default, skip_serializing_if = "Option::is_none")]
    pub delegated_config: Option<DelegatedConfig>,
}

/// Settings for running a system natively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeConfig {
    /// Bootstrap multiaddresses.
    #[serde(rename = "Bootstrap", default, deserialize_with = "null_as_default")]
    pub bootstrap: Vec<String>,
}

/// Routing paths a system exposes over HTTP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatedConfig {
    /// Paths used for read operations.
    #[serde(rename = "Read", default, deserialize_with = "null_as_default")]
    pub read: Vec<String>,
    /// Paths used for write operations.
    #[serde(rename = "Write", default, deserialize_with = "null_as_default")]
    pub write: Vec<String>,
}

/// A delegated HTTP endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Names of the systems this endpoint serves.
    #[serde(rename = "Systems", default, deserialize_with = "null_as_default")]
    pub systems: Vec<String>,
    /// Paths used for read operations.
    #[serde(rename = "Read", default, deserialize_with = "null_as_default")]
    pub read: Vec<String>,
    /// Paths used for write operations.
    #[serde(rename = "Write", default, deserialize_with = "null_as_default")]
    pub write: Vec<String>,
}

impl EndpointConfig {
    /// Returns true when the endpoint serves any of the given systems.
    fn serves_any<S: AsRef<str>>(&self, systems: &[S]) -> bool {
        self.systems.iter().any(|served| systems.iter().any(|system| system.as_ref() == served))
    }

    /// Returns true when neither direction has any path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty()
    }
}

// ============================================================================
// SECTION: Accessors
// ============================================================================

impl Config {
    /// Returns the server TTL hint, if any.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        u64::try_from(self.ttl_secs).ok().filter(|secs| *secs > 0).map(Duration::from_secs)
    }

    /// Returns deduplicated bootstrap peers of the named systems.
    ///
    /// Systems are visited in the given order and peers keep their first-seen
    /// position. Unknown systems and systems without a native config
    /// contribute nothing.
    #[must_use]
    pub fn bootstrap_peers<S: AsRef<str>>(&self, systems: &[S]) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut peers = Vec::new();
        for system in systems {
            let Some(native) =
                self.system_registry.get(system.as_ref()).and_then(|entry| entry.native_config.as_ref())
            else {
                continue;
            };
            for peer in &native.bootstrap {
                if seen.insert(peer.as_str()) {
                    peers.push(peer.clone());
                }
            }
        }
        peers
    }

    /// Returns delegated endpoints that do not serve any ignored native system.
    #[must_use]
    pub fn delegated_endpoints<S: AsRef<str>>(
        &self,
        ignored_native_systems: &[S],
    ) -> BTreeMap<String, EndpointConfig> {
        self.delegated_endpoints
            .iter()
            .filter(|(_, endpoint)| !endpoint.serves_any(ignored_native_systems))
            .map(|(base, endpoint)| (base.clone(), endpoint.clone()))
            .collect()
    }

    /// Returns delegated endpoints usable for reads, with write paths cleared.
    #[must_use]
    pub fn delegated_endpoints_for_read<S: AsRef<str>>(
        &self,
        ignored_native_systems: &[S],
    ) -> BTreeMap<String, EndpointConfig> {
        self.delegated_endpoints(ignored_native_systems)
            .into_iter()
            .filter(|(_, endpoint)| !endpoint.read.is_empty())
            .map(|(base, endpoint)| {
                (base, EndpointConfig {
                    write: Vec::new(),
                    ..endpoint
                })
            })
            .collect()
    }

    /// Returns delegated endpoints usable for writes, with read paths cleared.
    #[must_use]
    pub fn delegated_endpoints_for_write<S: AsRef<str>>(
        &self,
        ignored_native_systems: &[S],
    ) -> BTreeMap<String, EndpointConfig> {
        self.delegated_endpoints(ignored_native_systems)
            .into_iter()
            .filter(|(_, endpoint)| !endpoint.write.is_empty())
            .map(|(base, endpoint)| {
                (base, EndpointConfig {
                    read: Vec::new(),
                    ..endpoint
                })
            })
            .collect()
    }

    /// Returns a copy whose endpoint paths are restricted to `paths`.
    ///
    /// Endpoints left without read and write paths are dropped.
    #[must_use]
    pub fn with_supported_paths_only<S: AsRef<str>>(&self, paths: &[S]) -> Self {
        let supported: BTreeSet<&str> = paths.iter().map(AsRef::as_ref).collect();
        let retain = |list: &[String]| -> Vec<String> {
            list.iter().filter(|path| supported.contains(path.as_str())).cloned().collect()
        };
        let delegated_endpoints = self
            .delegated_endpoints
            .iter()
            .filter_map(|(base, endpoint)| {
                let narrowed = EndpointConfig {
                    systems: endpoint.systems.clone(),
                    read: retain(&endpoint.read),
                    write: retain(&endpoint.write),
                };
                (!narrowed.is_empty()).then(|| (base.clone(), narrowed))
            })
            .collect();
        Self {
            delegated_endpoints,
            ..self.clone()
        }
    }
}

// ============================================================================
// SECTION: Serde Helpers
// ============================================================================

/// Decodes an explicit JSON `null` as the type's default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
