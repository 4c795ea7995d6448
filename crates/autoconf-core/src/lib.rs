// crates/autoconf-core/src/lib.rs
// ============================================================================
// Module: AutoConf Core Library
// Description: Autoconf document model, routing URL classifier, validator, and expander.
// Purpose: Provide the network-independent half of the autoconf client.
// Dependencies: multiaddr, rand, serde, serde_json, thiserror, tracing, url
// ============================================================================

//! ## Overview
//! AutoConf Core models the JSON autoconf document published by an
//! authoritative endpoint and everything that can be done with it without
//! touching the network or the filesystem:
//! - [`Config`] and its accessors filter bootstrap peers and delegated
//!   endpoints by the systems a host runs natively.
//! - [`routing`] classifies delegated routing URLs into capability sets.
//! - [`validate`] checks a freshly decoded document before it is trusted.
//! - [`expand`] substitutes the `auto` placeholder in host settings.
//!
//! Invariants:
//! - Documents are immutable values once validated.
//! - Expansion never emits the `auto` placeholder.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod document;
pub mod expand;
pub mod fallback;
pub mod routing;
pub mod validate;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use document::Config;
pub use document::DelegatedConfig;
pub use document::EndpointConfig;
pub use document::NativeConfig;
pub use document::SUPPORTED_SCHEMA;
pub use document::SYSTEM_AMINO_DHT;
pub use document::SYSTEM_IPNI;
pub use document::SystemConfig;
pub use expand::AUTO_PLACEHOLDER;
pub use expand::HostAutoConfFields;
pub use expand::HostConfigError;
pub use expand::expand_bootstrap_peers;
pub use expand::expand_delegated_endpoints;
pub use expand::expand_delegated_publishers;
pub use expand::expand_dns_resolvers;
pub use expand::expand_json_fields;
pub use expand::native_systems_for_routing_type;
pub use fallback::MAINNET_AUTOCONF_URL;
pub use fallback::mainnet_fallback;
pub use routing::DelegatedRoutingEndpoint;
pub use routing::EndpointCapabilities;
pub use routing::HttpUrlError;
pub use routing::ROUTING_V1_IPNS_PATH;
pub use routing::ROUTING_V1_PEERS_PATH;
pub use routing::ROUTING_V1_PROVIDERS_PATH;
pub use routing::RoutingUrlError;
pub use routing::build_endpoint_url;
pub use routing::build_endpoint_urls;
pub use routing::determine_known_capabilities;
pub use routing::extract_unique_base_urls;
pub use routing::filter_valid_routing_urls;
pub use routing::group_by_known_capabilities;
pub use routing::parse_http_url;
pub use validate::ValidationError;
pub use validate::validate_document;
pub use validate::validate_http_url;
