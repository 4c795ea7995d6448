// crates/autoconf-client/src/fetch.rs
// ============================================================================
// Module: AutoConf Fetcher
// Description: HTTP conditional-request protocol for autoconf documents.
// Purpose: Fetch, validate, deduplicate, and persist documents from one URL.
// Dependencies: autoconf-core, reqwest, serde_json, time, tokio, tokio-util, tracing
// ============================================================================

//! ## Overview
//! [`Fetcher::fetch`] performs one attempt against a URL:
//! 1. Check the URL is HTTP(S).
//! 2. Send `GET` with `If-None-Match` (preferred) or `If-Modified-Since` built
//!    from cached metadata.
//! 3. On `304 Not Modified`, record the round-trip and return the cached document.
//! 4. On `200 OK`, read the body under a size cap, decode and validate it, and
//!    save it unless it is byte-identical to the newest cached payload.
//!
//! Invariants:
//! - Cancellation is observed during the round-trip and body read; a cancelled
//!   attempt never touches the cache.
//! - Invalid payloads are never cached.
//! - `.last-refresh` advances on every completed 200 or 304 round-trip.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use autoconf_core::Config;
use autoconf_core::parse_http_url;
use autoconf_core::validate_document;
use reqwest::StatusCode;
use reqwest::header::ETAG;
use reqwest::header::HeaderMap;
use reqwest::header::IF_MODIFIED_SINCE;
use reqwest::header::IF_NONE_MATCH;
use reqwest::header::LAST_MODIFIED;
use reqwest::header::USER_AGENT;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::cache::CacheMetadata;
use crate::cache::CacheStore;
use crate::error::AutoConfError;
use crate::response::Response;
use crate::response::version_token;

// ============================================================================
// SECTION: Refresh Policy
// ============================================================================

/// Returns the effective refresh interval.
///
/// A positive server TTL caps the user interval; otherwise the user interval
/// applies unchanged.
#[must_use]
pub fn effective_refresh_interval(user_interval: Duration, ttl_secs: i64) -> Duration {
    match u64::try_from(ttl_secs) {
        Ok(secs) if secs > 0 => user_interval.min(Duration::from_secs(secs)),
        _ => user_interval,
    }
}

/// Formats a cache age for operators: `42m`, `3.0h`, `2.5-day`, `1.0-week`.
#[must_use]
pub fn format_age(age: Duration) -> String {
    let hours = age.as_secs_f64() / 3600.0;
    if hours < 1.0 {
        return format!("{:.0}m", age.as_secs_f64() / 60.0);
    }
    if hours < 24.0 {
        return format!("{hours:.1}h");
    }
    let days = hours / 24.0;
    if days < 7.0 {
        return format!("{days:.1}-day");
    }
    format!("{:.1}-week", days / 7.0)
}

// ============================================================================
// SECTION: Fetcher
// ============================================================================

/// Result of the network half of an attempt.
struct Exchange {
    /// HTTP status.
    status: StatusCode,
    /// Response ETag; empty when absent.
    etag: String,
    /// Response Last-Modified; empty when absent.
    last_modified: String,
    /// Body of a 200 response.
    body: Vec<u8>,
}

/// Performs single fetch attempts against autoconf URLs.
#[derive(Debug, Clone)]
pub struct Fetcher {
    /// HTTP client used for every request.
    http: reqwest::Client,
    /// User agent sent with every request; empty to send none.
    user_agent: String,
    /// Largest accepted body in bytes.
    max_response_size: usize,
}

impl Fetcher {
    /// Creates a fetcher.
    #[must_use]
    pub const fn new(http: reqwest::Client, user_agent: String, max_response_size: usize) -> Self {
        Self {
            http,
            user_agent,
            max_response_size,
        }
    }

    /// Fetches `url` once, updating `store` on success.
    ///
    /// # Errors
    ///
    /// Returns [`AutoConfError::Configuration`] for non-HTTP URLs,
    /// [`AutoConfError::Transport`] and [`AutoConfError::Protocol`] for network
    /// failures, [`AutoConfError::Payload`] and [`AutoConfError::Validation`]
    /// for unusable bodies, and [`AutoConfError::Cancelled`] when `cancel`
    /// fires first.
    pub async fn fetch(
        &self,
        store: &CacheStore,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Response, AutoConfError> {
        parse_http_url(url)
            .map_err(|err| AutoConfError::Configuration(format!("invalid config URL {url}: {err}")))?;
        let metadata = if store.has_cached_config() {
            store.read_metadata()
        } else {
            debug!(url, "no cached payload, sending unconditional request");
            CacheMetadata::default()
        };
        let mut request = self.http.get(url);
        if !self.user_agent.is_empty() {
            request = request.header(USER_AGENT, self.user_agent.as_str());
        }
        if !metadata.etag.is_empty() {
            debug!(url, etag = %metadata.etag, "conditional request with ETag");
            request = request.header(IF_NONE_MATCH, metadata.etag.as_str());
        } else if !metadata.last_modified.is_empty() {
            info!(url, last_modified = %metadata.last_modified, "conditional request with If-Modified-Since");
            request = request.header(IF_MODIFIED_SINCE, metadata.last_modified.as_str());
        } else {
            info!(url, "fetching autoconf");
        }

        let requested_at = OffsetDateTime::now_utc();
        let exchange = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AutoConfError::Cancelled),
            exchange = self.exchange(request, url) => exchange?,
        };

        if exchange.status == StatusCode::NOT_MODIFIED {
            debug!(url, "autoconf not modified, updating last refresh time");
            if let Err(err) = store.write_last_refresh(requested_at) {
                warn!(error = %err, "failed to write last refresh time");
            }
            let config = store.cached_config()?;
            let stored = store.read_metadata();
            let version = if exchange.etag.is_empty() && exchange.last_modified.is_empty() {
                version_token(&stored.etag, &stored.last_modified)
            } else {
                version_token(&exchange.etag, &exchange.last_modified)
            };
            return Ok(Response {
                config,
                fetch_time: requested_at,
                version,
                cache_age: Duration::ZERO,
            });
        }

        let config = decode_payload(&exchange.body)?;
        if store.is_new_payload(&exchange.body) {
            if let Err(err) =
                store.save(&exchange.body, &exchange.etag, &exchange.last_modified, requested_at)
            {
                warn!(error = %err, "failed to save autoconf to cache");
            }
            info!(version = config.version, "fetched autoconf version");
        } else {
            debug!("received identical payload, skipping cache update");
            if let Err(err) = store.write_last_refresh(requested_at) {
                warn!(error = %err, "failed to write last refresh time");
            }
        }
        Ok(Response {
            config,
            fetch_time: requested_at,
            version: version_token(&exchange.etag, &exchange.last_modified),
            cache_age: Duration::ZERO,
        })
    }

    /// Sends the request and reads a 200 body under the size cap.
    async fn exchange(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<Exchange, AutoConfError> {
        let mut response = request.send().await.map_err(|err| AutoConfError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        let status = response.status();
        let etag = header_text(response.headers(), &ETAG);
        let last_modified = header_text(response.headers(), &LAST_MODIFIED);
        if status == StatusCode::NOT_MODIFIED {
            return Ok(Exchange {
                status,
                etag,
                last_modified,
                body: Vec::new(),
            });
        }
        if status != StatusCode::OK {
            return Err(AutoConfError::Protocol {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let limit = self.max_response_size;
        let too_large = || AutoConfError::Payload(format!("response exceeds {limit} bytes"));
        if let Some(expected) = response.content_length()
            && !usize::try_from(expected).is_ok_and(|expected| expected <= limit)
        {
            return Err(too_large());
        }
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|err| AutoConfError::Transport {
            url: url.to_string(),
            reason: format!("failed to read response body: {err}"),
        })? {
            if body.len().saturating_add(chunk.len()) > limit {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        debug!(url, bytes = body.len(), etag = %etag, last_modified = %last_modified, "autoconf response received");
        Ok(Exchange {
            status,
            etag,
            last_modified,
            body,
        })
    }
}

/// Returns a header value as trimmed text; empty when absent or not UTF-8.
fn header_text(headers: &HeaderMap, name: &reqwest::header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

/// Decodes and validates a response body.
fn decode_payload(body: &[u8]) -> Result<Config, AutoConfError> {
    let config: Config = serde_json::from_slice(body)
        .map_err(|err| AutoConfError::Payload(format!("failed to parse JSON: {err}")))?;
    validate_document(&config)?;
    Ok(config)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
