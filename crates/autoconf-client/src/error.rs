// crates/autoconf-client/src/error.rs
// ============================================================================
// Module: AutoConf Client Errors
// Description: Error type shared by the cache, fetcher, client, and refresher.
// Purpose: Let callers distinguish configuration, network, payload, and cache failures.
// Dependencies: autoconf-core, thiserror
// ============================================================================

//! ## Overview
//! [`AutoConfError`] carries every failure the client can surface. Callers that
//! only need to branch on the failure class use [`AutoConfError::kind`].
//!
//! Invariants:
//! - Cancellation is always reported as [`ErrorKind::Cancelled`], never as a
//!   transport failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use autoconf_core::ValidationError;
use thiserror::Error;

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Failure classes of [`AutoConfError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid client option.
    Configuration,
    /// HTTP round-trip failed.
    Transport,
    /// Unexpected HTTP status.
    Protocol,
    /// Oversized, undecodable, or invalid document.
    Payload,
    /// Filesystem failure in the cache.
    Cache,
    /// The operation was cancelled.
    Cancelled,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced by the autoconf client.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum AutoConfError {
    /// A client option is invalid.
    #[error("invalid autoconf client configuration: {0}")]
    Configuration(String),
    /// The HTTP request could not be completed.
    #[error("failed to fetch autoconf from {url}: {reason}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Transport failure description.
        reason: String,
    },
    /// The server answered with neither 200 nor 304.
    #[error("unexpected status code {status} from {url}")]
    Protocol {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// The response body is unusable.
    #[error("invalid autoconf payload: {0}")]
    Payload(String),
    /// The decoded document failed validation.
    #[error("invalid autoconf JSON: {0}")]
    Validation(#[from] ValidationError),
    /// The cache directory could not be read or written.
    #[error("autoconf cache error: {0}")]
    Cache(String),
    /// The cache holds no payload.
    #[error("no cached versions available")]
    NoCachedVersions,
    /// The operation was cancelled before completing.
    #[error("autoconf operation cancelled")]
    Cancelled,
    /// The fetch failed and no cached document could be used.
    #[error("failed to fetch from remote ({fetch}) and no valid cache available ({cache})")]
    Unavailable {
        /// Fetch failure.
        fetch: Box<AutoConfError>,
        /// Cache failure.
        cache: Box<AutoConfError>,
    },
    /// A background refresh attempt failed.
    #[error("autoconf background update failed (attempt {attempt}): {source}, retrying in {}s", .retry_in.as_secs())]
    Background {
        /// Consecutive failure count, starting at 1.
        attempt: u32,
        /// Delay before the next attempt.
        retry_in: Duration,
        /// Failure of this attempt.
        source: Box<AutoConfError>,
    },
}

impl AutoConfError {
    /// Returns the failure class.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Transport {
                ..
            } => ErrorKind::Transport,
            Self::Protocol {
                ..
            } => ErrorKind::Protocol,
            Self::Payload(_) | Self::Validation(_) => ErrorKind::Payload,
            Self::Cache(_) | Self::NoCachedVersions => ErrorKind::Cache,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Unavailable {
                fetch, ..
            } => fetch.kind(),
            Self::Background {
                source, ..
            } => source.kind(),
        }
    }

    /// Builds a cache error from a failed filesystem operation.
    pub(crate) fn cache(action: &str, err: &std::io::Error) -> Self {
        Self::Cache(format!("{action}: {err}"))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
