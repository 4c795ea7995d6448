// crates/autoconf-core/src/expand.rs
// ============================================================================
// Module: AutoConf Placeholder Expansion
// Description: Substitutes the `auto` placeholder in host settings.
// Purpose: Turn user lists and maps into concrete peers, resolvers, and routers.
// Dependencies: rand, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! Host settings may contain the reserved token [`AUTO_PLACEHOLDER`] wherever a
//! list of bootstrap peers, DNS resolvers, or delegated routers is expected.
//! The functions here replace that token with values drawn from a cached
//! [`Config`], keeping every static entry the user wrote in its original
//! position.
//!
//! Invariants:
//! - Output never contains the placeholder.
//! - Expansion is single-shot: only the first `auto` in a list expands.
//! - A missing document drops placeholders and keeps static entries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use tracing::error;

use crate::document::Config;
use crate::document::SYSTEM_AMINO_DHT;
use crate::routing::ROUTING_V1_IPNS_PATH;
use crate::routing::build_endpoint_url;
use crate::routing::filter_valid_routing_urls;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reserved token meaning "substitute autoconf values here".
pub const AUTO_PLACEHOLDER: &str = "auto";

/// Key of the wildcard DNS domain.
const WILDCARD_DOMAIN: &str = ".";

/// Native systems of the DHT-backed routing modes.
const DHT_NATIVE_SYSTEMS: &[&str] = &[SYSTEM_AMINO_DHT];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Host settings that cannot work without autoconf.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostConfigError {
    /// Bootstrap consists only of the placeholder while autoconf is disabled.
    #[error(
        "no usable bootstrap peers: autoconf is disabled but the 'auto' placeholder is used in Bootstrap; enable autoconf or replace 'auto' with specific bootstrap peer addresses"
    )]
    OnlyAutoBootstrap,
}

// ============================================================================
// SECTION: Routing Modes
// ============================================================================

/// Returns the systems a host runs natively for a routing mode.
///
/// DHT modes (`dht`, `dhtclient`, `dhtserver`, `auto`, `autoclient`) run the
/// Amino DHT natively; every other mode delegates everything.
#[must_use]
pub fn native_systems_for_routing_type(routing_type: &str) -> &'static [&'static str] {
    match routing_type {
        "dht" | "dhtclient" | "dhtserver" | "auto" | "autoclient" => DHT_NATIVE_SYSTEMS,
        _ => &[],
    }
}

// ============================================================================
// SECTION: List Expansion
// ============================================================================

/// Replaces the first placeholder with `values` and drops later placeholders.
fn expand_list(user: &[String], values: &[String], field: &str) -> Vec<String> {
    let mut resolved = Vec::with_capacity(user.len() + values.len());
    let mut expanded = false;
    for item in user {
        if item != AUTO_PLACEHOLDER {
            resolved.push(item.clone());
        } else if !expanded {
            debug!(field, count = values.len(), "expanding auto placeholder");
            resolved.extend(values.iter().cloned());
            expanded = true;
        }
    }
    resolved
}

/// Drops invalid routing URLs and trailing slashes.
fn canonical_routing_urls(urls: Vec<String>) -> Vec<String> {
    filter_valid_routing_urls(urls)
        .into_iter()
        .map(|url| url.trim_end_matches('/').to_string())
        .collect()
}

/// Expands bootstrap peers.
///
/// The first `auto` becomes [`Config::bootstrap_peers`] for `native_systems`.
#[must_use]
pub fn expand_bootstrap_peers<S: AsRef<str>>(
    user: &[String],
    config: Option<&Config>,
    native_systems: &[S],
) -> Vec<String> {
    let peers = config.map(|config| config.bootstrap_peers(native_systems)).unwrap_or_default();
    let resolved = expand_list(user, &peers, "Bootstrap");
    debug!(count = resolved.len(), "expanded bootstrap peers");
    resolved
}

/// Expands delegated routing endpoints.
///
/// With non-empty `supported_paths` the document is first narrowed to those
/// paths. Every endpoint surviving the native-system filter contributes one URL
/// per distinct read or write path.
#[must_use]
pub fn expand_delegated_endpoints<S: AsRef<str>, P: AsRef<str>>(
    user: &[String],
    config: Option<&Config>,
    native_systems: &[S],
    supported_paths: &[P],
) -> Vec<String> {
    let routers = config.map_or_else(Vec::new, |config| {
        let narrowed;
        let config = if supported_paths.is_empty() {
            config
        } else {
            narrowed = config.with_supported_paths_only(supported_paths);
            &narrowed
        };
        let mut routers = Vec::new();
        for (base, endpoint) in config.delegated_endpoints(native_systems) {
            let mut paths: Vec<&String> = Vec::new();
            for path in endpoint.read.iter().chain(endpoint.write.iter()) {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
            routers.extend(paths.into_iter().map(|path| build_endpoint_url(&base, path)));
        }
        routers
    });
    let resolved = canonical_routing_urls(expand_list(user, &routers, "DelegatedRouters"));
    debug!(count = resolved.len(), "expanded delegated endpoints");
    resolved
}

/// Expands delegated IPNS publishers.
///
/// Every surviving endpoint whose write paths include the IPNS path
/// contributes `<base>/routing/v1/ipns`.
#[must_use]
pub fn expand_delegated_publishers<S: AsRef<str>>(
    user: &[String],
    config: Option<&Config>,
    native_systems: &[S],
) -> Vec<String> {
    let publishers = config.map_or_else(Vec::new, |config| {
        config
            .delegated_endpoints(native_systems)
            .into_iter()
            .filter(|(_, endpoint)| endpoint.write.iter().any(|path| path == ROUTING_V1_IPNS_PATH))
            .map(|(base, _)| build_endpoint_url(&base, ROUTING_V1_IPNS_PATH))
            .collect()
    });
    canonical_routing_urls(expand_list(user, &publishers, "DelegatedPublishers"))
}

// ============================================================================
// SECTION: DNS Expansion
// ============================================================================

/// Picks one resolver uniformly at random.
fn pick_resolver(resolvers: &[String]) -> Option<String> {
    resolvers.choose(&mut rand::thread_rng()).cloned()
}

/// Expands DNS resolvers keyed by domain.
///
/// A per-domain `auto` becomes one random resolver for that domain, or is
/// dropped when the document has none. A wildcard `"."` set to `auto`, or an
/// empty user map, adds every document domain the user has not set.
#[must_use]
pub fn expand_dns_resolvers(
    user: &BTreeMap<String, String>,
    config: Option<&Config>,
) -> BTreeMap<String, String> {
    let mut resolved = BTreeMap::new();
    let mut expanded = 0_usize;
    for (domain, resolver) in user {
        if resolver != AUTO_PLACEHOLDER {
            resolved.insert(domain.clone(), resolver.clone());
            continue;
        }
        let pick = config
            .and_then(|config| config.dns_resolvers.get(domain))
            .and_then(|resolvers| pick_resolver(resolvers.as_slice()));
        if let Some(pick) = pick {
            resolved.insert(domain.clone(), pick);
            expanded += 1;
        }
    }

    let wildcard =
        user.is_empty() || user.get(WILDCARD_DOMAIN).is_some_and(|value| value == AUTO_PLACEHOLDER);
    if let Some(config) = config.filter(|_| wildcard) {
        for (domain, resolvers) in &config.dns_resolvers {
            if resolved.contains_key(domain) {
                continue;
            }
            if let Some(pick) = pick_resolver(resolvers) {
                resolved.insert(domain.clone(), pick);
                expanded += 1;
            }
        }
    }
    if expanded > 0 {
        debug!(count = expanded, "expanded auto DNS resolvers");
    }
    resolved
}

// ============================================================================
// SECTION: Host Fields
// ============================================================================

/// The four host settings that accept the placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostAutoConfFields {
    /// `Bootstrap` multiaddresses.
    pub bootstrap: Vec<String>,
    /// `DNS.Resolvers` keyed by domain.
    pub dns_resolvers: BTreeMap<String, String>,
    /// `Routing.DelegatedRouters` URLs.
    pub delegated_routers: Vec<String>,
    /// `Ipns.DelegatedPublishers` URLs.
    pub delegated_publishers: Vec<String>,
}

impl HostAutoConfFields {
    /// Returns a fully expanded copy.
    ///
    /// Routers are built from read paths only; publishers from the IPNS write
    /// path.
    #[must_use]
    pub fn expand<S: AsRef<str>>(&self, config: Option<&Config>, native_systems: &[S]) -> Self {
        let read_view = config.map(|config| Config {
            delegated_endpoints: config.delegated_endpoints_for_read(native_systems),
            ..config.clone()
        });
        Self {
            bootstrap: expand_bootstrap_peers(&self.bootstrap, config, native_systems),
            dns_resolvers: expand_dns_resolvers(&self.dns_resolvers, config),
            delegated_routers: expand_delegated_endpoints::<S, &str>(
                &self.delegated_routers,
                read_view.as_ref(),
                native_systems,
                &[],
            ),
            delegated_publishers: expand_delegated_publishers(
                &self.delegated_publishers,
                config,
                native_systems,
            ),
        }
    }

    /// Reads the expandable fields from a JSON host configuration.
    ///
    /// Missing or mistyped fields read as empty; non-string entries are skipped.
    #[must_use]
    pub fn from_json(host: &Value) -> Self {
        Self {
            bootstrap: string_list(host.get("Bootstrap")),
            dns_resolvers: host
                .pointer("/DNS/Resolvers")
                .and_then(Value::as_object)
                .map(|map| {
                    map.iter()
                        .filter_map(|(domain, value)| {
                            value.as_str().map(|value| (domain.clone(), value.to_string()))
                        })
                        .collect()
                })
                .unwrap_or_default(),
            delegated_routers: string_list(host.pointer("/Routing/DelegatedRouters")),
            delegated_publishers: string_list(host.pointer("/Ipns/DelegatedPublishers")),
        }
    }

    /// Logs every field that still uses the placeholder while autoconf is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`HostConfigError::OnlyAutoBootstrap`] when the bootstrap list is
    /// exactly `["auto"]`, since the host could not join the network.
    pub fn check_without_autoconf(&self) -> Result<(), HostConfigError> {
        let fields = [
            ("Bootstrap", has_placeholder(self.bootstrap.iter())),
            ("DNS.Resolvers", has_placeholder(self.dns_resolvers.values())),
            ("Routing.DelegatedRouters", has_placeholder(self.delegated_routers.iter())),
            ("Ipns.DelegatedPublishers", has_placeholder(self.delegated_publishers.iter())),
        ];
        for (field, has_auto) in fields {
            if has_auto {
                error!(field, "field contains 'auto' but autoconf is disabled");
            }
        }
        if matches!(self.bootstrap.as_slice(), [only] if only == AUTO_PLACEHOLDER) {
            error!("cannot start with only 'auto' bootstrap peers while autoconf is disabled");
            return Err(HostConfigError::OnlyAutoBootstrap);
        }
        Ok(())
    }
}

/// Returns true when any value is the placeholder.
fn has_placeholder<'a>(mut values: impl Iterator<Item = &'a String>) -> bool {
    values.any(|value| value == AUTO_PLACEHOLDER)
}

/// Collects the string entries of a JSON array.
fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Rewrites the expandable fields of a JSON host configuration.
///
/// Only fields already present are replaced; absent fields and sections stay
/// absent, and every other field is copied unchanged.
#[must_use]
pub fn expand_json_fields<S: AsRef<str>>(
    host: &Value,
    config: Option<&Config>,
    native_systems: &[S],
) -> Value {
    let Some(object) = host.as_object() else {
        return host.clone();
    };
    let expanded = HostAutoConfFields::from_json(host).expand(config, native_systems);
    let mut result = object.clone();
    replace_field(&mut result, None, "Bootstrap", string_array(expanded.bootstrap));
    let resolvers: Map<String, Value> = expanded
        .dns_resolvers
        .into_iter()
        .map(|(domain, resolver)| (domain, Value::String(resolver)))
        .collect();
    replace_field(&mut result, Some("DNS"), "Resolvers", Value::Object(resolvers));
    replace_field(
        &mut result,
        Some("Routing"),
        "DelegatedRouters",
        string_array(expanded.delegated_routers),
    );
    replace_field(
        &mut result,
        Some("Ipns"),
        "DelegatedPublishers",
        string_array(expanded.delegated_publishers),
    );
    Value::Object(result)
}

/// Converts strings into a JSON array.
fn string_array(values: Vec<String>) -> Value {
    Value::Array(values.into_iter().map(Value::String).collect())
}

/// Replaces `section.field` (or top-level `field`) when it already exists.
fn replace_field(root: &mut Map<String, Value>, section: Option<&str>, field: &str, value: Value) {
    let target = match section {
        None => Some(root),
        Some(section) => root.get_mut(section).and_then(Value::as_object_mut),
    };
    if let Some(slot) = target.and_then(|map| map.get_mut(field)) {
        *slot = value;
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
