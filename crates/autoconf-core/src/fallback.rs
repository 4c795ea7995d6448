// crates/autoconf-core/src/fallback.rs
// ============================================================================
// Module: Mainnet Fallback Document
// Description: Built-in autoconf document for the public mainnet.
// Purpose: Give hosts a usable configuration before any fetch succeeds.
// Dependencies: none
// ============================================================================

//! ## Overview
//! [`mainnet_fallback`] returns a compiled-in snapshot of the mainnet autoconf
//! document. Clients use it as the default fallback when neither the cache nor
//! the network can furnish a document.
//!
//! Invariants:
//! - The returned document passes [`crate::validate_document`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::document::Config;
use crate::document::EndpointConfig;
use crate::document::NativeConfig;
use crate::document::SUPPORTED_SCHEMA;
use crate::document::SYSTEM_AMINO_DHT;
use crate::document::SYSTEM_IPNI;
use crate::document::SystemConfig;
use crate::routing::ROUTING_V1_IPNS_PATH;
use crate::routing::ROUTING_V1_PEERS_PATH;
use crate::routing::ROUTING_V1_PROVIDERS_PATH;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Authoritative autoconf URL of the public mainnet.
pub const MAINNET_AUTOCONF_URL: &str = "https://conf.ipfs-mainnet.org/autoconf.json";

/// Version stamped on the built-in snapshot.
const FALLBACK_VERSION: i64 = 2_025_071_801;

/// Cache hint of the built-in snapshot, one day.
const FALLBACK_TTL_SECS: i64 = 86_400;

/// Amino DHT bootstrap peers.
const MAINNET_BOOTSTRAP_PEERS: &[&str] = &[
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmNnooDu7bfjPFoTZYxMNLWUQJyrVwtbZg5gBMjTezGAJN",
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmQCU2EcMqAqQPR2i9bChDtGNJchTbq5TbXJJ16u19uLTa",
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmbLHAnMoJPWSCR5Zhtx6BHJX9KiKNN6tpvbUcqanj75Nb",
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmcZf59bWwK5XFi76CZX8cbJ4BhTzzA3gU1ZjYZcYW3dwt",
    "/dnsaddr/va1.bootstrap.libp2p.io/p2p/12D3KooWKnDdG3iXw9eTFijk3EWSunZcFi54Zka4wmtqtt6rPxc8",
    "/ip4/104.131.131.82/tcp/4001/p2p/QmaCpDMGvV2BGHeYERUEnRQAwe3N8SzbUtfsmvsqQLuvuJ",
    "/ip4/104.131.131.82/udp/4001/quic-v1/p2p/QmaCpDMGvV2BGHeYERUEnRQAwe3N8SzbUtfsmvsqQLuvuJ",
];

// ============================================================================
// SECTION: Fallback Document
// ============================================================================

/// Converts static strings into owned strings.
fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

/// Returns the built-in mainnet autoconf document.
#[must_use]
pub fn mainnet_fallback() -> Config {
    let mut system_registry = BTreeMap::new();
    system_registry.insert(SYSTEM_AMINO_DHT.to_string(), SystemConfig {
        url: "https://github.com/ipfs/specs/pull/497".to_string(),
        description: "Public DHT swarm that implements the IPFS Kademlia DHT specification"
            .to_string(),
        native_config: Some(NativeConfig {
            bootstrap: owned(MAINNET_BOOTSTRAP_PEERS),
        }),
        delegated_config: None,
    });
    system_registry.insert(SYSTEM_IPNI.to_string(), SystemConfig {
        url: "https://cid.contact".to_string(),
        description: "Network Indexer - content routing database for large storage providers"
            .to_string(),
        native_config: None,
        delegated_config: None,
    });

    let mut dns_resolvers = BTreeMap::new();
    dns_resolvers.insert("eth.".to_string(), owned(&["https://dns.eth.limo/dns-query"]));

    let mut delegated_endpoints = BTreeMap::new();
    delegated_endpoints.insert("https://cid.contact".to_string(), EndpointConfig {
        systems: owned(&[SYSTEM_IPNI]),
        read: owned(&[ROUTING_V1_PROVIDERS_PATH]),
        write: Vec::new(),
    });
    delegated_endpoints.insert("https://delegated-ipfs.dev".to_string(), EndpointConfig {
        systems: owned(&[SYSTEM_AMINO_DHT, SYSTEM_IPNI]),
        read: owned(&[ROUTING_V1_PROVIDERS_PATH, ROUTING_V1_PEERS_PATH, ROUTING_V1_IPNS_PATH]),
        write: owned(&[ROUTING_V1_IPNS_PATH]),
    });

    Config {
        version: FALLBACK_VERSION,
        schema: SUPPORTED_SCHEMA,
        ttl_secs: FALLBACK_TTL_SECS,
        system_registry,
        dns_resolvers,
        delegated_endpoints,
    }
}
