// crates/autoconf-client/src/client.rs
// ============================================================================
// Module: AutoConf Client
// Description: Client facade over the cache store, fetcher, and refresher.
// Purpose: Serve autoconf documents to hosts with cache and fallback semantics.
// Dependencies: autoconf-core, rand, reqwest, time, tokio, tokio-util, tracing
// ============================================================================

//! ## Overview
//! [`ClientBuilder`] validates options and produces a [`Client`]. The client
//! exposes four read paths:
//! - [`Client::get_cached`]: filesystem only, never fails (falls back).
//! - [`Client::get_cached_or_refresh`]: cache-or-network, never fails (falls back).
//! - [`Client::get_latest`]: cache-or-network, surfaces errors.
//! - [`Client::has_cached_config`]: does any payload exist?
//!
//! Refresh policy: a cached entry younger than the refresh interval is served
//! without HTTP. Otherwise one URL is chosen uniformly at random and fetched;
//! failures fall back to the cached entry when one exists. A successful fetch
//! prunes the cache to the configured size.
//!
//! Invariants:
//! - Cancellation is surfaced as [`AutoConfError::Cancelled`] and never falls
//!   back to the cache.
//! - The client is cheap to clone; clones share the cache lock and refresher flag.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fs::DirBuilder;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use autoconf_core::Config;
use autoconf_core::MAINNET_AUTOCONF_URL;
use autoconf_core::mainnet_fallback;
use rand::seq::SliceRandom;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::cache::CacheStore;
use crate::error::AutoConfError;
use crate::fetch::Fetcher;
use crate::fetch::effective_refresh_interval;
use crate::fetch::format_age;
use crate::refresher;
use crate::refresher::RefreshCallbacks;
use crate::refresher::RefreshHandle;
use crate::response::Response;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default refresh interval.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default number of retained payload files.
pub const DEFAULT_CACHE_SIZE: usize = 3;

/// Default HTTP timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default response size cap in bytes.
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 2 * 1024 * 1024;

/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("autoconf-client/", env!("CARGO_PKG_VERSION"));

/// Upper bound on the cache priming performed by [`Client::start`].
const PRIME_TIMEOUT: Duration = Duration::from_secs(30);

/// Mode of a generated private cache root.
#[cfg(unix)]
const PRIVATE_DIR_MODE: u32 = 0o700;

/// Host-supplied factory for the last-resort document.
type FallbackFn = Arc<dyn Fn() -> Config + Send + Sync>;

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for [`Client`].
///
/// # Invariants
/// - `build` rejects empty URLs, a zero cache size, a zero refresh interval,
///   and a zero response size cap.
/// - URL schemes are checked at fetch time, not here.
pub struct ClientBuilder {
    /// Configured autoconf URLs; the mainnet URL when empty.
    urls: Vec<String>,
    /// User-facing freshness budget.
    refresh_interval: Duration,
    /// Cache root; a private temporary directory when unset.
    cache_dir: Option<PathBuf>,
    /// Retained payload files.
    cache_size: usize,
    /// `User-Agent` sent with every request.
    user_agent: String,
    /// HTTP timeout for the built-in client.
    timeout: Duration,
    /// Disables certificate verification on the built-in client.
    tls_insecure_skip_verify: bool,
    /// Last-resort document factory.
    fallback: FallbackFn,
    /// Fully custom HTTP client.
    http_client: Option<reqwest::Client>,
    /// Response size cap in bytes.
    max_response_size: usize,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            cache_dir: None,
            cache_size: DEFAULT_CACHE_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            tls_insecure_skip_verify: false,
            fallback: Arc::new(mainnet_fallback),
            http_client: None,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }
}

impl ClientBuilder {
    /// Adds one autoconf URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    /// Adds several autoconf URLs; each fetch picks one at random.
    #[must_use]
    pub fn urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls.extend(urls.into_iter().map(Into::into));
        self
    }

    /// Sets the refresh interval.
    #[must_use]
    pub const fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Sets the cache root directory.
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Sets the number of payload files kept after pruning.
    #[must_use]
    pub const fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    /// Sets the `User-Agent` header; empty sends none.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the HTTP timeout of the built-in client.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables TLS certificate verification. Testing only.
    #[must_use]
    pub const fn tls_insecure_skip_verify(mut self, skip: bool) -> Self {
        self.tls_insecure_skip_verify = skip;
        self
    }

    /// Sets the last-resort document factory.
    #[must_use]
    pub fn fallback(mut self, fallback: impl Fn() -> Config + Send + Sync + 'static) -> Self {
        self.fallback = Arc::new(fallback);
        self
    }

    /// Uses a custom HTTP client, overriding the timeout and TLS options.
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the response size cap in bytes.
    #[must_use]
    pub const fn max_response_size(mut self, bytes: usize) -> Self {
        self.max_response_size = bytes;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`AutoConfError::Configuration`] for invalid options and
    /// [`AutoConfError::Cache`] when a private cache root cannot be created.
    pub fn build(self) -> Result<Client, AutoConfError> {
        if self.urls.iter().any(|url| url.trim().is_empty()) {
            return Err(AutoConfError::Configuration("URL cannot be empty".to_string()));
        }
        if self.cache_size < 1 {
            return Err(AutoConfError::Configuration("cache size must be at least 1".to_string()));
        }
        if self.refresh_interval.is_zero() {
            return Err(AutoConfError::Configuration("refresh interval must be positive".to_string()));
        }
        if self.max_response_size == 0 {
            return Err(AutoConfError::Configuration("max response size must be positive".to_string()));
        }

        let urls = if self.urls.is_empty() { vec![MAINNET_AUTOCONF_URL.to_string()] } else { self.urls };
        let http = match self.http_client {
            Some(client) => client,
            None => {
                let mut builder = reqwest::Client::builder().timeout(self.timeout);
                if self.tls_insecure_skip_verify {
                    warn!("TLS certificate verification is disabled for autoconf; use only for testing");
                    builder = builder.danger_accept_invalid_certs(true);
                }
                builder.build().map_err(|err| {
                    AutoConfError::Configuration(format!("failed to build HTTP client: {err}"))
                })?
            }
        };
        let cache_root = match self.cache_dir {
            Some(dir) => dir,
            None => create_private_cache_root()?,
        };
        let store = CacheStore::new(&cache_root, &urls);
        debug!(cache_dir = %store.dir().display(), urls = urls.len(), "autoconf client configured");

        Ok(Client {
            inner: Arc::new(ClientInner {
                urls,
                refresh_interval: self.refresh_interval,
                cache_size: self.cache_size,
                fallback: self.fallback,
                store,
                fetcher: Fetcher::new(http, self.user_agent, self.max_response_size),
                started: Arc::new(AtomicBool::new(false)),
            }),
        })
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("urls", &self.urls)
            .field("refresh_interval", &self.refresh_interval)
            .field("cache_dir", &self.cache_dir)
            .field("cache_size", &self.cache_size)
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("tls_insecure_skip_verify", &self.tls_insecure_skip_verify)
            .field("max_response_size", &self.max_response_size)
            .finish_non_exhaustive()
    }
}

/// Creates `<tmp>/autoconf-<pid>-<random>` readable only by the owner.
fn create_private_cache_root() -> Result<PathBuf, AutoConfError> {
    let dir = std::env::temp_dir().join(format!(
        "autoconf-{}-{:016x}",
        std::process::id(),
        rand::random::<u64>()
    ));
    let mut builder = DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(PRIVATE_DIR_MODE);
    }
    builder
        .create(&dir)
        .map_err(|err| AutoConfError::cache("failed to create temporary cache dir", &err))?;
    Ok(dir)
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Shared state behind [`Client`].
struct ClientInner {
    /// Configured URLs; never empty.
    urls: Vec<String>,
    /// User-facing freshness budget.
    refresh_interval: Duration,
    /// Retained payload files.
    cache_size: usize,
    /// Last-resort document factory.
    fallback: FallbackFn,
    /// Cache directory of this URL set.
    store: CacheStore,
    /// HTTP fetcher.
    fetcher: Fetcher,
    /// Set while a refresher is running.
    started: Arc<AtomicBool>,
}

/// How the shared refresh path treats a cached entry younger than the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshMode {
    /// Serve a fresh cached entry without HTTP.
    CacheFirst,
    /// Always contact the server; the cache is only a failure fallback.
    Revalidate,
}

/// Outcome of the shared refresh path.
pub(crate) struct Latest {
    /// Served response.
    pub(crate) response: Response,
    /// URL of the live fetch that produced `response`; `None` when cached.
    pub(crate) url: Option<String>,
}

/// Autoconf client.
#[derive(Clone)]
pub struct Client {
    /// Shared state.
    inner: Arc<ClientInner>,
}

impl Client {
    /// Returns a builder with default options.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Returns the configured URLs.
    #[must_use]
    pub fn urls(&self) -> &[String] {
        &self.inner.urls
    }

    /// Returns the refresh interval.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        self.inner.refresh_interval
    }

    /// Returns the number of payload files kept after pruning.
    #[must_use]
    pub fn cache_size(&self) -> usize {
        self.inner.cache_size
    }

    /// Returns the cache directory of this client's URL set.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        self.inner.store.dir()
    }

    /// Picks one configured URL uniformly at random.
    #[must_use]
    pub fn select_url(&self) -> String {
        self.inner
            .urls
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| MAINNET_AUTOCONF_URL.to_string())
    }

    /// Returns the host fallback document.
    #[must_use]
    pub fn fallback(&self) -> Config {
        (self.inner.fallback)()
    }

    /// Returns the newest cached document, or the fallback.
    ///
    /// Reads only the filesystem.
    #[must_use]
    pub fn get_cached(&self) -> Config {
        match self.inner.store.cached_config() {
            Ok(config) => {
                debug!(version = config.version, "using cached autoconf");
                config
            }
            Err(err) => {
                debug!(error = %err, "no cached autoconf, using fallback");
                self.fallback()
            }
        }
    }

    /// Returns the current document, refreshing it when stale.
    ///
    /// Any error, including cancellation, yields the fallback.
    pub async fn get_cached_or_refresh(&self, cancel: &CancellationToken) -> Config {
        match self.refresh(cancel, RefreshMode::CacheFirst).await {
            Ok(latest) => {
                debug!(
                    version = latest.response.config.version,
                    cached = latest.response.from_cache(),
                    "using autoconf"
                );
                latest.response.config
            }
            Err(err) => {
                error!(error = %err, "failed to get autoconf, using fallback");
                self.fallback()
            }
        }
    }

    /// Returns the current document, refreshing it when stale.
    ///
    /// # Errors
    ///
    /// Returns [`AutoConfError::Cancelled`] when `cancel` fires,
    /// [`AutoConfError::Unavailable`] when the fetch fails and no cached entry
    /// exists, and [`AutoConfError::Cache`] when the cache directory cannot be
    /// created.
    pub async fn get_latest(&self, cancel: &CancellationToken) -> Result<Response, AutoConfError> {
        self.refresh(cancel, RefreshMode::CacheFirst).await.map(|latest| latest.response)
    }

    /// Returns true when at least one payload file is cached.
    #[must_use]
    pub fn has_cached_config(&self) -> bool {
        self.inner.store.has_cached_config()
    }

    /// Primes the cache and starts the background refresher.
    ///
    /// Priming is bounded; a slow network delays start by at most 30 seconds.
    /// Cancelling `cancel` stops the refresher like [`RefreshHandle::stop`].
    ///
    /// # Errors
    ///
    /// Returns [`AutoConfError::Configuration`] when a refresher is already
    /// running and [`AutoConfError::Cancelled`] when `cancel` fires during
    /// priming.
    pub async fn start(
        &self,
        callbacks: RefreshCallbacks,
        cancel: &CancellationToken,
    ) -> Result<RefreshHandle, AutoConfError> {
        if self.inner.started.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Err(AutoConfError::Configuration(
                "autoconf background updater already started".to_string(),
            ));
        }

        let prime = cancel.child_token();
        match tokio::time::timeout(PRIME_TIMEOUT, self.get_cached_or_refresh(&prime)).await {
            Ok(config) => info!(version = config.version, "primed autoconf cache"),
            Err(_) => {
                prime.cancel();
                warn!(timeout_secs = PRIME_TIMEOUT.as_secs(), "timed out priming autoconf cache");
            }
        }
        if cancel.is_cancelled() {
            self.inner.started.store(false, Ordering::Release);
            return Err(AutoConfError::Cancelled);
        }

        Ok(refresher::spawn(
            self.clone(),
            callbacks,
            cancel.child_token(),
            Arc::clone(&self.inner.started),
        ))
    }

    // ------------------------------------------------------------------------
    // Shared Refresh Path
    // ------------------------------------------------------------------------

    /// Returns the version of the newest cached document; 0 when none.
    pub(crate) fn cached_version(&self) -> i64 {
        self.inner.store.cached_config().map_or(0, |config| config.version)
    }

    /// Fetches with cache fallback; under [`RefreshMode::CacheFirst`] a fresh
    /// cached entry is served without HTTP.
    pub(crate) async fn refresh(&self, cancel: &CancellationToken, mode: RefreshMode) -> Result<Latest, AutoConfError> {
        let inner = &self.inner;
        inner.store.ensure_dir()?;

        let cached = match inner.store.cached_response(OffsetDateTime::now_utc()) {
            Ok(response) if mode == RefreshMode::CacheFirst && response.cache_age < inner.refresh_interval => {
                debug!(age = %format_age(response.cache_age), "autoconf cache is fresh");
                return Ok(Latest {
                    response,
                    url: None,
                });
            }
            cached => cached,
        };

        let url = self.select_url();
        match inner.fetcher.fetch(&inner.store, &url, cancel).await {
            Ok(fresh) => {
                if let Ok(cached) = cached {
                    let effective = effective_refresh_interval(inner.refresh_interval, fresh.config.ttl_secs);
                    if effective < inner.refresh_interval && cached.cache_age < effective {
                        debug!(
                            age = %format_age(cached.cache_age),
                            effective_secs = effective.as_secs(),
                            "cached autoconf within server TTL"
                        );
                        return Ok(Latest {
                            response: cached,
                            url: None,
                        });
                    }
                }
                match inner.store.prune(inner.cache_size) {
                    Ok(0) => {}
                    Ok(removed) => debug!(removed, "pruned autoconf cache"),
                    Err(err) => warn!(error = %err, "failed to prune autoconf cache"),
                }
                Ok(Latest {
                    response: fresh,
                    url: Some(url),
                })
            }
            Err(AutoConfError::Cancelled) => Err(AutoConfError::Cancelled),
            Err(fetch_err) => match cached {
                Ok(cached) => {
                    error!(
                        url = %url,
                        error = %fetch_err,
                        age = %format_age(cached.cache_age),
                        fetched_at = %cached.fetch_time,
                        "autoconf fetch failed, using cached config"
                    );
                    Ok(Latest {
                        response: cached,
                        url: None,
                    })
                }
                Err(cache_err) => {
                    warn!(url = %url, error = %fetch_err, "autoconf fetch failed and no cache is available");
                    Err(AutoConfError::Unavailable {
                        fetch: Box::new(fetch_err),
                        cache: Box::new(cache_err),
                    })
                }
            },
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("urls", &self.inner.urls)
            .field("refresh_interval", &self.inner.refresh_interval)
            .field("cache_size", &self.inner.cache_size)
            .field("cache_dir", &self.inner.store.dir())
            .field("started", &self.inner.started.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
