// crates/autoconf-client/tests/refresher.rs
// ============================================================================
// Module: Background Refresher Tests
// Description: Start/stop lifecycle and callbacks of the background refresher.
// Purpose: Validate version-change detection, error reporting, and shutdown.
// Dependencies: autoconf-client, tiny_http, tempfile, tokio
// ============================================================================

//! ## Overview
//! Runs the refresher with a 50 ms interval against scripted servers and
//! observes it only through its callbacks and handle.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use autoconf_client::AutoConfError;
use autoconf_client::Client;
use autoconf_client::ErrorKind;
use autoconf_client::RefreshCallbacks;
use tokio_util::sync::CancellationToken;

use crate::common::MockServer;
use crate::common::Reply;
use crate::common::document;
use crate::common::init_tracing;
use crate::common::wait_until;

/// Refresher tick period used by every test.
const INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound on waiting for an expected callback.
const PATIENCE: Duration = Duration::from_secs(10);

/// Counts cached payload files under `dir`.
fn payload_files(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("autoconf-") && name.ends_with(".json"))
        .count()
}

/// Client refreshing every [`INTERVAL`] from `server`.
fn client(root: &std::path::Path, server: &MockServer) -> Client {
    Client::builder()
        .cache_dir(root)
        .url(server.url())
        .refresh_interval(INTERVAL)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn version_change_fires_once_for_a_newer_document() {
    init_tracing();
    let server = MockServer::start(vec![
        Reply::ok(document(1)).with_etag("\"a\""),
        Reply::ok(document(2)).with_etag("\"b\""),
    ]);
    let root = tempfile::tempdir().unwrap();
    let client = client(root.path(), &server);

    let changes = Arc::new(Mutex::new(Vec::new()));
    let successes = Arc::new(AtomicUsize::new(0));
    let callbacks = RefreshCallbacks::new()
        .on_version_change({
            let changes = Arc::clone(&changes);
            move |old, new, url: &str| changes.lock().unwrap().push((old, new, url.to_string()))
        })
        .on_update_success({
            let successes = Arc::clone(&successes);
            move |_| {
                successes.fetch_add(1, Ordering::SeqCst);
            }
        });

    let handle = client.start(callbacks, &CancellationToken::new()).await.unwrap();
    assert!(handle.is_running());
    assert_eq!(client.get_cached().version, 1);

    assert!(wait_until(PATIENCE, || successes.load(Ordering::SeqCst) >= 3).await);
    handle.stop().await;
    assert!(!handle.is_running());

    let changes = changes.lock().unwrap().clone();
    assert_eq!(changes, vec![(1, 2, server.url().to_string())]);
    assert_eq!(client.get_cached().version, 2);
    assert_eq!(payload_files(client.cache_dir()), 2);
}

#[tokio::test]
async fn every_tick_contacts_the_server() {
    let server = MockServer::start(vec![Reply::ok(document(1)).with_etag("\"a\"")]);
    let root = tempfile::tempdir().unwrap();
    let client = client(root.path(), &server);

    let served_from_cache = Arc::new(Mutex::new(Vec::new()));
    let callbacks = RefreshCallbacks::new().on_update_success({
        let served_from_cache = Arc::clone(&served_from_cache);
        move |response| served_from_cache.lock().unwrap().push(response.from_cache())
    });

    let handle = client.start(callbacks, &CancellationToken::new()).await.unwrap();
    assert!(wait_until(PATIENCE, || served_from_cache.lock().unwrap().len() >= 5).await);
    handle.stop().await;

    let served_from_cache = served_from_cache.lock().unwrap().clone();
    assert!(served_from_cache.iter().all(|cached| !cached), "{served_from_cache:?}");
    assert!(server.request_count() > served_from_cache.len());
}

#[tokio::test]
async fn failures_are_reported_with_backoff_and_stop_interrupts_the_wait() {
    init_tracing();
    let server = MockServer::start(vec![Reply::status(503)]);
    let root = tempfile::tempdir().unwrap();
    let client = client(root.path(), &server);

    let errors = Arc::new(Mutex::new(Vec::new()));
    let callbacks = RefreshCallbacks::new().on_update_error({
        let errors = Arc::clone(&errors);
        move |err: &AutoConfError| errors.lock().unwrap().push(err.to_string())
    });

    let handle = client.start(callbacks, &CancellationToken::new()).await.unwrap();
    assert!(wait_until(PATIENCE, || !errors.lock().unwrap().is_empty()).await);

    tokio::time::timeout(Duration::from_secs(5), handle.stop()).await.unwrap();
    let errors = errors.lock().unwrap().clone();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("autoconf background update failed (attempt 1): "), "{}", errors[0]);
    assert!(errors[0].ends_with("retrying in 120s"), "{}", errors[0]);
}

#[tokio::test]
async fn start_is_exclusive_until_stopped() {
    let server = MockServer::start(vec![Reply::ok(document(1))]);
    let root = tempfile::tempdir().unwrap();
    let client = client(root.path(), &server);
    let cancel = CancellationToken::new();

    let handle = client.start(RefreshCallbacks::new(), &cancel).await.unwrap();
    let err = client.start(RefreshCallbacks::new(), &cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    handle.stop().await;
    handle.stop().await;
    let again = client.start(RefreshCallbacks::new(), &cancel).await.unwrap();
    again.stop().await;
}

#[tokio::test]
async fn cancelling_the_start_token_stops_the_refresher() {
    let server = MockServer::start(vec![Reply::ok(document(1))]);
    let root = tempfile::tempdir().unwrap();
    let client = client(root.path(), &server);
    let cancel = CancellationToken::new();

    let handle = client.start(RefreshCallbacks::new(), &cancel).await.unwrap();
    cancel.cancel();
    assert!(!handle.is_running());
    tokio::time::timeout(Duration::from_secs(5), handle.stop()).await.unwrap();

    let fresh = CancellationToken::new();
    client.start(RefreshCallbacks::new(), &fresh).await.unwrap().stop().await;
}

#[tokio::test]
async fn start_with_a_cancelled_token_fails() {
    let server = MockServer::start(vec![Reply::ok(document(1))]);
    let root = tempfile::tempdir().unwrap();
    let client = client(root.path(), &server);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = client.start(RefreshCallbacks::new(), &cancel).await.unwrap_err();
    assert!(matches!(err, AutoConfError::Cancelled));
    assert!(!client.has_cached_config());
    client.start(RefreshCallbacks::new(), &CancellationToken::new()).await.unwrap().stop().await;
}
