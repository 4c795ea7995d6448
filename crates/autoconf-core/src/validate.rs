// crates/autoconf-core/src/validate.rs
// ============================================================================
// Module: AutoConf Document Validation
// Description: Structural checks applied to freshly decoded documents.
// Purpose: Reject malformed documents before they are cached or returned.
// Dependencies: multiaddr, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`validate_document`] walks a decoded [`Config`] in a fixed order (version
//! and schema, bootstrap addresses, DNS resolvers, delegated endpoints) and
//! returns the first problem found. Every error carries a breadcrumb naming
//! the offending field and value so operators can locate it in the payload.
//!
//! Invariants:
//! - Validation is pure and deterministic; map fields are walked in key order.
//! - Only structural validity is checked; semantic fitness is left to the host.
//! - Delegated endpoint keys are base URLs; a key with a path is rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::str::FromStr;

use multiaddr::Multiaddr;
use thiserror::Error;
use tracing::warn;

use crate::document::Config;
use crate::document::SUPPORTED_SCHEMA;
use crate::routing::HttpUrlError;
use crate::routing::parse_http_url;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Document validation failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `AutoConfVersion` is absent or not positive.
    #[error("missing AutoConfVersion")]
    MissingVersion,
    /// `AutoConfSchema` is absent or zero.
    #[error("missing AutoConfSchema")]
    MissingSchema,
    /// The document uses a schema this client does not understand.
    #[error(
        "unsupported autoconf schema version {found} (this client supports version {supported}, consider updating)"
    )]
    UnsupportedSchema {
        /// Schema declared by the document.
        found: u32,
        /// Schema understood by this client.
        supported: u32,
    },
    /// A bootstrap entry is not a multiaddress.
    #[error("{field} invalid multiaddr \"{value}\": {reason}")]
    InvalidMultiaddr {
        /// Breadcrumb to the entry.
        field: String,
        /// Offending value.
        value: String,
        /// Parser message.
        reason: String,
    },
    /// A resolver or endpoint URL is not an absolute HTTP(S) URL.
    #[error("{field} URL \"{value}\" {source}")]
    InvalidUrl {
        /// Breadcrumb to the entry.
        field: String,
        /// Offending value.
        value: String,
        /// Underlying URL problem.
        source: HttpUrlError,
    },
    /// A read or write path does not start with `/`.
    #[error("{field} path \"{value}\" must start with /")]
    InvalidPath {
        /// Breadcrumb to the entry.
        field: String,
        /// Offending value.
        value: String,
    },
    /// A `DelegatedEndpoints` key carries a path instead of being a base URL.
    #[error("{field} key must be a base URL without a path, got path \"{path}\"")]
    EndpointKeyHasPath {
        /// Breadcrumb to the entry.
        field: String,
        /// Path found in the key, trailing `/` trimmed.
        path: String,
    },
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates a decoded document.
///
/// # Errors
///
/// Returns the first [`ValidationError`] in walk order.
pub fn validate_document(config: &Config) -> Result<(), ValidationError> {
    validate_header(config)?;
    validate_bootstrap(config)?;
    validate_resolvers(config)?;
    validate_endpoints(config)
}

/// Checks `raw` is an absolute HTTP(S) URL with a host.
///
/// `field` is the breadcrumb used in the error message.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidUrl`] describing the problem.
pub fn validate_http_url(raw: &str, field: &str) -> Result<(), ValidationError> {
    parse_http_url(raw).map(|_| ()).map_err(|source| ValidationError::InvalidUrl {
        field: field.to_string(),
        value: raw.to_string(),
        source,
    })
}

/// Checks version and schema.
fn validate_header(config: &Config) -> Result<(), ValidationError> {
    if config.version <= 0 {
        return Err(ValidationError::MissingVersion);
    }
    if config.schema == 0 {
        return Err(ValidationError::MissingSchema);
    }
    if config.schema != SUPPORTED_SCHEMA {
        warn!(
            found = config.schema,
            supported = SUPPORTED_SCHEMA,
            "autoconf document uses an unsupported schema, consider updating this client"
        );
        return Err(ValidationError::UnsupportedSchema {
            found: config.schema,
            supported: SUPPORTED_SCHEMA,
        });
    }
    Ok(())
}

/// Checks every native bootstrap entry parses as a multiaddress.
fn validate_bootstrap(config: &Config) -> Result<(), ValidationError> {
    for (name, system) in &config.system_registry {
        let Some(native) = &system.native_config else {
            continue;
        };
        for (index, addr) in native.bootstrap.iter().enumerate() {
            if let Err(err) = Multiaddr::from_str(addr) {
                return Err(ValidationError::InvalidMultiaddr {
                    field: format!("SystemRegistry[\"{name}\"].NativeConfig.Bootstrap[{index}]"),
                    value: addr.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Checks every DNS resolver URL.
fn validate_resolvers(config: &Config) -> Result<(), ValidationError> {
    for (domain, resolvers) in &config.dns_resolvers {
        for (index, resolver) in resolvers.iter().enumerate() {
            validate_http_url(resolver, &format!("DNSResolvers[\"{domain}\"][{index}]"))?;
        }
    }
    Ok(())
}

/// Checks every delegated endpoint key and its paths.
fn validate_endpoints(config: &Config) -> Result<(), ValidationError> {
    for (base, endpoint) in &config.delegated_endpoints {
        let url = parse_http_url(base).map_err(|source| ValidationError::InvalidUrl {
            field: "DelegatedEndpoints".to_string(),
            value: base.clone(),
            source,
        })?;
        let path = url.path().trim_end_matches('/');
        if !path.is_empty() {
            return Err(ValidationError::EndpointKeyHasPath {
                field: format!("DelegatedEndpoints[\"{base}\"]"),
                path: path.to_string(),
            });
        }
        validate_paths(base, "Read", &endpoint.read)?;
        validate_paths(base, "Write", &endpoint.write)?;
    }
    Ok(())
}

/// Checks one direction's path list of an endpoint.
fn validate_paths(base: &str, direction: &str, paths: &[String]) -> Result<(), ValidationError> {
    for (index, path) in paths.iter().enumerate() {
        if !path.starts_with('/') {
            return Err(ValidationError::InvalidPath {
                field: format!("DelegatedEndpoints[\"{base}\"].{direction}[{index}]"),
                value: path.clone(),
            });
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;
    use crate::document::EndpointConfig;
    use crate::document::NativeConfig;
    use crate::document::SystemConfig;

    /// Smallest document that passes validation.
    fn valid() -> Config {
        let mut config = Config {
            version: 2_025_080_101,
            schema: SUPPORTED_SCHEMA,
            ttl_secs: 3600,
            ..Config::default()
        };
        config.system_registry.insert("AminoDHT".to_string(), SystemConfig {
            native_config: Some(NativeConfig {
                bootstrap: vec![
                    "/dnsaddr/bootstrap.libp2p.io/p2p/QmNnooDu7bfjPFoTZYxMNLWUQJyrVwtbZg5gBMjTezGAJN"
                        .to_string(),
                    "/ip4/104.131.131.82/udp/4001/quic-v1/p2p/QmaCpDMGvV2BGHeYERUEnRQAwe3N8SzbUtfsmvsqQLuvuJ"
                        .to_string(),
                ],
            }),
            ..SystemConfig::default()
        });
        config
            .dns_resolvers
            .insert("eth.".to_string(), vec!["https://dns.eth.limo/dns-query".to_string()]);
        config.delegated_endpoints.insert("https://x.example".to_string(), EndpointConfig {
            systems: vec!["IPNI".to_string()],
            read: vec!["/routing/v1/providers".to_string()],
            write: Vec::new(),
        });
        config
    }

    #[test]
    fn accepts_well_formed_document() {
        assert_eq!(validate_document(&valid()), Ok(()));
    }

    #[test]
    fn header_errors_come_first() {
        let mut config = valid();
        config.version = 0;
        config.schema = 0;
        assert_eq!(validate_document(&config), Err(ValidationError::MissingVersion));
        config.version = 1;
        assert_eq!(validate_document(&config), Err(ValidationError::MissingSchema));
        config.schema = 2;
        let err = validate_document(&config).unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedSchema {
            found: 2,
            supported: 1
        });
        assert_eq!(
            err.to_string(),
            "unsupported autoconf schema version 2 (this client supports version 1, consider updating)"
        );
    }

    #[test]
    fn bootstrap_error_names_system_and_index() {
        let mut config = valid();
        if let Some(native) = config
            .system_registry
            .get_mut("AminoDHT")
            .and_then(|system| system.native_config.as_mut())
        {
            native.bootstrap.push("not-a-multiaddr".to_string());
        }
        let err = validate_document(&config).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with(
            "SystemRegistry[\"AminoDHT\"].NativeConfig.Bootstrap[2] invalid multiaddr \"not-a-multiaddr\""
        ));
    }

    #[test]
    fn resolver_url_errors_are_specific() {
        let mut config = valid();
        config.dns_resolvers.insert("bad.".to_string(), vec!["ftp://x.example".to_string()]);
        assert_eq!(
            validate_document(&config).unwrap_err().to_string(),
            "DNSResolvers[\"bad.\"][0] URL \"ftp://x.example\" must use http or https scheme, got \"ftp\""
        );
        config.dns_resolvers.insert("bad.".to_string(), vec!["x.example/dns-query".to_string()]);
        assert_eq!(
            validate_document(&config).unwrap_err().to_string(),
            "DNSResolvers[\"bad.\"][0] URL \"x.example/dns-query\" must be absolute (missing scheme)"
        );
    }

    #[test]
    fn endpoint_key_and_paths_are_checked() {
        let mut config = valid();
        config.delegated_endpoints.insert("https://".to_string(), EndpointConfig::default());
        assert_eq!(
            validate_document(&config).unwrap_err().to_string(),
            "DelegatedEndpoints URL \"https://\" must have a host"
        );

        let mut config = valid();
        config.delegated_endpoints.insert("https://y.example".to_string(), EndpointConfig {
            systems: Vec::new(),
            read: Vec::new(),
            write: vec!["routing/v1/ipns".to_string()],
        });
        assert_eq!(
            validate_document(&config).unwrap_err().to_string(),
            "DelegatedEndpoints[\"https://y.example\"].Write[0] path \"routing/v1/ipns\" must start with /"
        );
    }

    #[test]
    fn endpoint_keys_must_be_base_urls() {
        let mut config = valid();
        config.delegated_endpoints.insert("https://z.example/".to_string(), EndpointConfig::default());
        assert_eq!(validate_document(&config), Ok(()));

        config.delegated_endpoints.insert("https://x.example/routing/v1/providers".to_string(), EndpointConfig {
            systems: vec!["IPNI".to_string()],
            read: vec!["/routing/v1/providers".to_string()],
            write: Vec::new(),
        });
        let err = validate_document(&config).unwrap_err();
        assert_eq!(err, ValidationError::EndpointKeyHasPath {
            field: "DelegatedEndpoints[\"https://x.example/routing/v1/providers\"]".to_string(),
            path: "/routing/v1/providers".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "DelegatedEndpoints[\"https://x.example/routing/v1/providers\"] key must be a base URL without a path, got path \"/routing/v1/providers\""
        );
    }

    #[test]
    fn standalone_url_check_uses_field_breadcrumb() {
        assert!(validate_http_url("https://x.example", "URL").is_ok());
        let err = validate_http_url("https://", "URL").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidUrl {
            source: HttpUrlError::MissingHost,
            ..
        }));
    }
}
