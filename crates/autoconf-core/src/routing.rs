// crates/autoconf-core/src/routing.rs
// ============================================================================
// Module: Delegated Routing URL Classifier
// Description: Parses routing URLs into base URLs and capability sets.
// Purpose: Decide which routing operations a delegated endpoint serves.
// Dependencies: thiserror, tracing, url
// ============================================================================

//! ## Overview
//! Delegated routing endpoints may be written either as a bare base URL
//! (`https://example.com`, meaning every routing operation) or with one of the
//! well-known routing paths appended. This module splits such URLs into a
//! canonical base and an [`EndpointCapabilities`] value, and groups lists of
//! URLs by base so path-specific entries pointing at the same server merge.
//!
//! Invariants:
//! - Only `http` and `https` URLs with a non-empty host are accepted.
//! - Only the empty path and the three routing paths are recognized.
//! - [`build_endpoint_url`] output never ends with `/`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;
use url::ParseError;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Provider lookups (`GET /routing/v1/providers`).
pub const ROUTING_V1_PROVIDERS_PATH: &str = "/routing/v1/providers";

/// Peer lookups (`GET /routing/v1/peers`).
pub const ROUTING_V1_PEERS_PATH: &str = "/routing/v1/peers";

/// IPNS resolution (`GET`) and publishing (`PUT`).
pub const ROUTING_V1_IPNS_PATH: &str = "/routing/v1/ipns";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Reasons a string is not an absolute HTTP(S) URL.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpUrlError {
    /// The string could not be parsed as a URL.
    #[error("invalid: {0}")]
    Invalid(String),
    /// The URL is relative.
    #[error("must be absolute (missing scheme)")]
    MissingScheme,
    /// The scheme is neither `http` nor `https`.
    #[error("must use http or https scheme, got \"{0}\"")]
    UnsupportedScheme(String),
    /// The URL has no host.
    #[error("must have a host")]
    MissingHost,
}

/// Errors produced while classifying a routing URL.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingUrlError {
    /// The URL itself is unusable.
    #[error("invalid routing URL \"{url}\": URL {source}")]
    Url {
        /// Offending input.
        url: String,
        /// Underlying URL problem.
        source: HttpUrlError,
    },
    /// The URL path is not a recognized routing path.
    #[error("invalid routing URL \"{url}\": unsupported routing path \"{path}\"")]
    UnsupportedPath {
        /// Offending input.
        url: String,
        /// Path after trailing-slash removal.
        path: String,
    },
}

// ============================================================================
// SECTION: Capabilities
// ============================================================================

/// Routing operations supported by an endpoint.
///
/// # Invariants
/// - [`EndpointCapabilities::merge`] is commutative, associative, and idempotent,
///   with the default (empty) value as identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EndpointCapabilities {
    /// `GET /routing/v1/providers`.
    pub providers: bool,
    /// `GET /routing/v1/peers`.
    pub peers: bool,
    /// `GET /routing/v1/ipns`.
    pub ipns_get: bool,
    /// `PUT /routing/v1/ipns`.
    pub ipns_put: bool,
}

impl EndpointCapabilities {
    /// Returns true when no capability is enabled.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.providers && !self.peers && !self.ipns_get && !self.ipns_put
    }

    /// Returns the union of both capability sets.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            providers: self.providers || other.providers,
            peers: self.peers || other.peers,
            ipns_get: self.ipns_get || other.ipns_get,
            ipns_put: self.ipns_put || other.ipns_put,
        }
    }
}

/// A routing URL split into base and capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatedRoutingEndpoint {
    /// Scheme and authority only, e.g. `https://example.com`.
    pub base_url: String,
    /// Operations the URL grants.
    pub capabilities: EndpointCapabilities,
}

// ============================================================================
// SECTION: URL Parsing
// ============================================================================

/// Parses `raw` as an absolute HTTP(S) URL with a host.
///
/// Scheme problems are reported before host problems so that `ftp:///x`
/// reports the scheme.
///
/// # Errors
///
/// Returns [`HttpUrlError`] describing the first problem found.
pub fn parse_http_url(raw: &str) -> Result<Url, HttpUrlError> {
    if raw.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
        return Err(HttpUrlError::Invalid("contains whitespace or control characters".to_string()));
    }
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) if !raw.starts_with(':') => {
            return Err(HttpUrlError::MissingScheme);
        }
        Err(ParseError::RelativeUrlWithoutBase) => {
            return Err(HttpUrlError::Invalid("missing protocol scheme".to_string()));
        }
        Err(ParseError::EmptyHost) => return Err(HttpUrlError::MissingHost),
        Err(err) => return Err(HttpUrlError::Invalid(err.to_string())),
    };
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(HttpUrlError::UnsupportedScheme(other.to_string())),
    }
    // The WHATWG parser skips extra slashes (`https:///host`); treat them as an empty authority.
    let authority_empty = raw.find(':').and_then(|idx| raw.get(idx ..)).is_some_and(|rest| rest.starts_with(":///"));
    if authority_empty || url.host_str().is_none_or(str::is_empty) {
        return Err(HttpUrlError::MissingHost);
    }
    Ok(url)
}

/// Splits a routing URL into `(base, path)` and checks the path is recognized.
fn parse_routing_url(endpoint: &str) -> Result<(String, String), RoutingUrlError> {
    let url = parse_http_url(endpoint).map_err(|source| RoutingUrlError::Url {
        url: endpoint.to_string(),
        source,
    })?;
    let host = url.host_str().unwrap_or_default();
    let base = match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    };
    let path = url.path().trim_end_matches('/').to_string();
    match path.as_str() {
        "" | ROUTING_V1_PROVIDERS_PATH | ROUTING_V1_PEERS_PATH | ROUTING_V1_IPNS_PATH => {
            Ok((base, path))
        }
        _ => Err(RoutingUrlError::UnsupportedPath {
            url: endpoint.to_string(),
            path,
        }),
    }
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Parses a routing URL and determines the capabilities it grants.
///
/// `supports_read` enables the read flags of the path and `supports_write`
/// the write flag; a base URL grants every flag of the enabled directions.
///
/// # Errors
///
/// Returns [`RoutingUrlError`] for non-HTTP URLs and unknown routing paths.
pub fn determine_known_capabilities(
    endpoint: &str,
    supports_read: bool,
    supports_write: bool,
) -> Result<DelegatedRoutingEndpoint, RoutingUrlError> {
    let (base_url, path) = parse_routing_url(endpoint)?;
    let capabilities = match path.as_str() {
        ROUTING_V1_PROVIDERS_PATH => EndpointCapabilities {
            providers: supports_read,
            ..EndpointCapabilities::default()
        },
        ROUTING_V1_PEERS_PATH => EndpointCapabilities {
            peers: supports_read,
            ..EndpointCapabilities::default()
        },
        ROUTING_V1_IPNS_PATH => EndpointCapabilities {
            ipns_get: supports_read,
            ipns_put: supports_write,
            ..EndpointCapabilities::default()
        },
        _ => EndpointCapabilities {
            providers: supports_read,
            peers: supports_read,
            ipns_get: supports_read,
            ipns_put: supports_write,
        },
    };
    Ok(DelegatedRoutingEndpoint {
        base_url,
        capabilities,
    })
}

/// Groups routing URLs by base URL, merging their capabilities.
///
/// Blank entries are skipped; entries that fail classification are logged at
/// debug level and skipped.
#[must_use]
pub fn group_by_known_capabilities<S: AsRef<str>>(
    endpoints: &[S],
    supports_read: bool,
    supports_write: bool,
) -> BTreeMap<String, EndpointCapabilities> {
    let mut grouped: BTreeMap<String, EndpointCapabilities> = BTreeMap::new();
    for endpoint in endpoints {
        let endpoint = endpoint.as_ref().trim();
        if endpoint.is_empty() {
            continue;
        }
        match determine_known_capabilities(endpoint, supports_read, supports_write) {
            Ok(parsed) => {
                let entry = grouped.entry(parsed.base_url).or_default();
                *entry = entry.merge(parsed.capabilities);
            }
            Err(err) => debug!(endpoint, error = %err, "skipping invalid routing endpoint"),
        }
    }
    grouped
}

/// Returns the unique base URLs of the given routing URLs in first-seen order.
#[must_use]
pub fn extract_unique_base_urls<S: AsRef<str>>(endpoints: &[S]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut bases = Vec::new();
    for endpoint in endpoints {
        let endpoint = endpoint.as_ref().trim();
        if endpoint.is_empty() {
            continue;
        }
        match parse_routing_url(endpoint) {
            Ok((base, _)) => {
                if seen.insert(base.clone()) {
                    bases.push(base);
                }
            }
            Err(err) => debug!(endpoint, error = %err, "skipping invalid routing endpoint"),
        }
    }
    bases
}

/// Keeps only URLs the classifier accepts, preserving order.
#[must_use]
pub fn filter_valid_routing_urls(urls: Vec<String>) -> Vec<String> {
    urls.into_iter()
        .filter(|url| match parse_routing_url(url) {
            Ok(_) => true,
            Err(err) => {
                debug!(url = %url, error = %err, "skipping invalid routing URL");
                false
            }
        })
        .collect()
}

// ============================================================================
// SECTION: URL Construction
// ============================================================================

/// Joins a base URL and a routing path into the canonical endpoint form.
///
/// Trailing slashes are removed from both parts, a leading `/` is added to a
/// non-empty path, and the result never ends with `/`.
#[must_use]
pub fn build_endpoint_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_end_matches('/');
    let joined = if path.is_empty() || path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    };
    joined.trim_end_matches('/').to_string()
}

/// Builds one canonical endpoint URL per path.
#[must_use]
pub fn build_endpoint_urls<S: AsRef<str>>(base_url: &str, paths: &[S]) -> Vec<String> {
    paths.iter().map(|path| build_endpoint_url(base_url, path.as_ref())).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
