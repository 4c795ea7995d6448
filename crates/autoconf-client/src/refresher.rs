// crates/autoconf-client/src/refresher.rs
// ============================================================================
// Module: AutoConf Background Refresher
// Description: Periodic refresh task with exponential backoff and callbacks.
// Purpose: Keep the cache current for long-running hosts.
// Dependencies: tokio, tokio-util, tracing
// ============================================================================

//! ## Overview
//! [`Client::start`] spawns one refresher per client. The task waits on a
//! ticker at the client's refresh interval and calls the same refresh path as
//! [`Client::get_latest`], except that every tick contacts the server: the
//! entry written by the previous tick is always slightly younger than the
//! interval and would otherwise be served from disk. Failures pause the ticker for
//! `min(1 minute x 2^failures, 24 hours)`; one success resets the counter.
//!
//! Invariants:
//! - At most one refresher runs per client.
//! - The task exits promptly on cancellation, including mid-request.
//! - Errors never end the task; they are reported through
//!   [`RefreshCallbacks::on_update_error`] wrapped in
//!   [`AutoConfError::Background`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::Interval;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::client::Client;
use crate::client::RefreshMode;
use crate::error::AutoConfError;
use crate::response::Response;

// ============================================================================
// SECTION: Backoff
// ============================================================================

/// Delay after the first failure is `2 x` this base.
const BACKOFF_BASE_MINUTES: u64 = 1;

/// Longest backoff delay, in minutes.
const BACKOFF_MAX_MINUTES: u64 = 24 * 60;

/// Returns the pause after `failures` consecutive failures.
///
/// The delay is `min(1 minute x 2^failures, 24 hours)`; zero failures yields
/// the one-minute base.
#[must_use]
pub fn backoff_delay(failures: u32) -> Duration {
    let factor = 1_u64.checked_shl(failures).unwrap_or(u64::MAX);
    let minutes = BACKOFF_BASE_MINUTES.saturating_mul(factor).min(BACKOFF_MAX_MINUTES);
    Duration::from_secs(minutes * 60)
}

// ============================================================================
// SECTION: Callbacks
// ============================================================================

/// Hook fired with `(old_version, new_version, url)`.
type VersionChangeHook = Box<dyn Fn(i64, i64, &str) + Send + Sync>;

/// Hook fired after every successful refresh.
type SuccessHook = Box<dyn Fn(&Response) + Send + Sync>;

/// Hook fired after every failed refresh.
type ErrorHook = Box<dyn Fn(&AutoConfError) + Send + Sync>;

/// Host callbacks invoked by the refresher.
///
/// Callbacks run on the refresher task; a slow callback delays the next tick.
#[derive(Default)]
pub struct RefreshCallbacks {
    /// Fired when a live fetch produced a higher document version.
    version_change: Option<VersionChangeHook>,
    /// Fired after every successful refresh, cached or live.
    update_success: Option<SuccessHook>,
    /// Fired after every failed refresh.
    update_error: Option<ErrorHook>,
}

impl RefreshCallbacks {
    /// Creates an empty callback set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hook fired with `(old_version, new_version, url)` when a live
    /// fetch returns a higher version than the cache held before the tick.
    #[must_use]
    pub fn on_version_change(mut self, hook: impl Fn(i64, i64, &str) + Send + Sync + 'static) -> Self {
        self.version_change = Some(Box::new(hook));
        self
    }

    /// Sets the hook fired after every successful refresh.
    #[must_use]
    pub fn on_update_success(mut self, hook: impl Fn(&Response) + Send + Sync + 'static) -> Self {
        self.update_success = Some(Box::new(hook));
        self
    }

    /// Sets the hook fired after every failed refresh.
    #[must_use]
    pub fn on_update_error(mut self, hook: impl Fn(&AutoConfError) + Send + Sync + 'static) -> Self {
        self.update_error = Some(Box::new(hook));
        self
    }

    /// Fires the version-change hook, if set.
    fn version_changed(&self, old_version: i64, new_version: i64, url: &str) {
        if let Some(hook) = &self.version_change {
            hook(old_version, new_version, url);
        }
    }

    /// Fires the success hook, if set.
    fn update_succeeded(&self, response: &Response) {
        if let Some(hook) = &self.update_success {
            hook(response);
        }
    }

    /// Fires the error hook, if set.
    fn update_failed(&self, err: &AutoConfError) {
        if let Some(hook) = &self.update_error {
            hook(err);
        }
    }
}

impl fmt::Debug for RefreshCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCallbacks")
            .field("on_version_change", &self.version_change.is_some())
            .field("on_update_success", &self.update_success.is_some())
            .field("on_update_error", &self.update_error.is_some())
            .finish()
    }
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Handle to a running refresher.
///
/// Dropping the handle cancels the task without waiting for it.
#[derive(Debug)]
pub struct RefreshHandle {
    /// Cancels the refresher; a child of the token passed to `start`.
    cancel: CancellationToken,
    /// Task handle; taken by the first `stop`.
    task: Mutex<Option<JoinHandle<()>>>,
    /// Shared "refresher started" flag of the owning client.
    started: Arc<AtomicBool>,
}

impl RefreshHandle {
    /// Cancels the refresher and waits for it to exit.
    ///
    /// Safe to call more than once; later calls return once the task is gone.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let mut task = self.task.lock().await;
        if let Some(handle) = task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "autoconf background updater ended abnormally");
            }
            self.started.store(false, Ordering::Release);
        }
    }

    /// Returns true until the refresher has been cancelled or has exited.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && self.started.load(Ordering::Acquire)
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ============================================================================
// SECTION: Task
// ============================================================================

/// Spawns the refresher for `client`.
///
/// `started` must already be set; the task clears it on exit.
pub(crate) fn spawn(
    client: Client,
    callbacks: RefreshCallbacks,
    cancel: CancellationToken,
    started: Arc<AtomicBool>,
) -> RefreshHandle {
    let task_cancel = cancel.clone();
    let task_started = Arc::clone(&started);
    let task = tokio::spawn(async move {
        run(&client, &callbacks, &task_cancel).await;
        task_started.store(false, Ordering::Release);
    });
    RefreshHandle {
        cancel,
        task: Mutex::new(Some(task)),
        started,
    }
}

/// Creates a ticker whose first tick is one `period` from now.
fn new_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Refresh loop; returns when `cancel` fires.
async fn run(client: &Client, callbacks: &RefreshCallbacks, cancel: &CancellationToken) {
    let period = client.refresh_interval();
    let mut ticker = new_ticker(period);
    let mut failures: u32 = 0;
    info!(interval_secs = period.as_secs(), "started autoconf background updater");

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let old_version = client.cached_version();
        match client.refresh(cancel, RefreshMode::Revalidate).await {
            Ok(latest) => {
                failures = 0;
                let new_version = latest.response.config.version;
                if let Some(url) = &latest.url
                    && new_version > old_version
                {
                    if old_version == 0 {
                        info!(version = new_version, url = %url, "fetched autoconf version");
                    } else {
                        info!(old_version, new_version, url = %url, "fetched autoconf version (updated from previous)");
                    }
                    callbacks.version_changed(old_version, new_version, url);
                } else {
                    debug!(version = new_version, cached = latest.response.from_cache(), "autoconf refresh completed");
                }
                callbacks.update_succeeded(&latest.response);
            }
            Err(AutoConfError::Cancelled) if cancel.is_cancelled() => break,
            Err(err) => {
                failures = failures.saturating_add(1);
                let retry_in = backoff_delay(failures);
                let err = AutoConfError::Background {
                    attempt: failures,
                    retry_in,
                    source: Box::new(err),
                };
                warn!(error = %err, "autoconf background update failed");
                callbacks.update_failed(&err);
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(retry_in) => {}
                }
                ticker = new_ticker(period);
            }
        }
    }
    info!("stopped autoconf background updater");
}

// ============================================================================
// SECTION: Tests
// ============================================================================
