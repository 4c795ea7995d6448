// crates/autoconf-client/src/lib.rs
// ============================================================================
// Module: AutoConf Client Library
// Description: Cached HTTP client and background refresher for autoconf documents.
// Purpose: Keep a host's network configuration in sync with an authoritative endpoint.
// Dependencies: autoconf-core, reqwest, time, tokio, tokio-util, toml, tracing
// ============================================================================

//! ## Overview
//! AutoConf Client fetches the autoconf document over HTTP with conditional
//! requests, keeps a small versioned cache on disk, and serves hosts from that
//! cache when the network is unavailable:
//! - [`CacheStore`] owns the per-URL-set cache directory.
//! - [`Fetcher`] performs one validated fetch attempt.
//! - [`Client`] applies the refresh policy and fallback semantics.
//! - [`RefreshHandle`] controls the background refresher started by
//!   [`Client::start`].
//! - [`AutoConfSettings`] loads client options from TOML.
//!
//! The library never installs a `tracing` subscriber; hosts do.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cache;
pub mod client;
pub mod error;
pub mod fetch;
pub mod refresher;
pub mod response;
pub mod settings;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cache::CacheMetadata;
pub use cache::CacheStore;
pub use cache::cache_key;
pub use client::Client;
pub use client::ClientBuilder;
pub use client::DEFAULT_CACHE_SIZE;
pub use client::DEFAULT_MAX_RESPONSE_SIZE;
pub use client::DEFAULT_REFRESH_INTERVAL;
pub use client::DEFAULT_TIMEOUT;
pub use client::DEFAULT_USER_AGENT;
pub use error::AutoConfError;
pub use error::ErrorKind;
pub use fetch::Fetcher;
pub use fetch::effective_refresh_interval;
pub use fetch::format_age;
pub use refresher::RefreshCallbacks;
pub use refresher::RefreshHandle;
pub use refresher::backoff_delay;
pub use response::Response;
pub use settings::AutoConfSettings;
pub use settings::SettingsError;
