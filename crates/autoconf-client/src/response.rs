// crates/autoconf-client/src/response.rs
// ============================================================================
// Module: AutoConf Response
// Description: A document together with its fetch metadata.
// Purpose: Tell callers whether a document came from the network or the cache.
// Dependencies: autoconf-core, time
// ============================================================================

//! ## Overview
//! A [`Response`] pairs a [`Config`] with the time of the HTTP round-trip that
//! produced or revalidated it, the server's version token, and the cache age.
//!
//! Invariants:
//! - `cache_age` is zero exactly when the response came from a live request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use autoconf_core::Config;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Response
// ============================================================================

/// A document and its fetch metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The autoconf document.
    pub config: Config,
    /// Time of the HTTP round-trip that produced or last revalidated it.
    pub fetch_time: OffsetDateTime,
    /// ETag of the payload, or Last-Modified when no ETag was sent.
    pub version: String,
    /// Time since `fetch_time` for cached responses; zero for live ones.
    pub cache_age: Duration,
}

impl Response {
    /// Returns true when the response was served from disk.
    #[must_use]
    pub const fn from_cache(&self) -> bool {
        !self.cache_age.is_zero()
    }
}

/// Picks the version token: the ETag when present, else Last-Modified.
pub(crate) fn version_token(etag: &str, last_modified: &str) -> String {
    if etag.is_empty() { last_modified.to_string() } else { etag.to_string() }
}
