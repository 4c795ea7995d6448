//! Refresh policy property-based tests.
//!
//! ## Purpose
//! These tests check the timing rules of the client and the ordering rules of
//! the cache store over randomized inputs.
//!
//! ## What is covered
//! - The effective refresh interval never exceeds the user interval.
//! - Backoff is monotonic and capped at one day.
//! - Cached payloads are listed newest first and the newest save wins.
// crates/autoconf-client/tests/proptest_policy.rs
// ============================================================================
// Module: Refresh Policy Property-Based Tests
// Description: Interval, backoff, and cache ordering properties.
// Purpose: Ensure timing and ordering rules hold for all inputs.
// ============================================================================

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
    reason = "Test-only assertions and helpers are permitted."
)]

use std::time::Duration;

use autoconf_client::CacheStore;
use autoconf_client::backoff_delay;
use autoconf_client::effective_refresh_interval;
use autoconf_client::format_age;
use proptest::prelude::*;
use time::OffsetDateTime;

proptest! {
    #[test]
    fn effective_interval_is_capped_by_positive_ttl(user_secs in 1_u64 .. 10_000_000, ttl in any::<i64>()) {
        let user = Duration::from_secs(user_secs);
        let effective = effective_refresh_interval(user, ttl);
        prop_assert!(effective <= user);
        if ttl > 0 {
            prop_assert_eq!(effective, user.min(Duration::from_secs(ttl.unsigned_abs())));
        } else {
            prop_assert_eq!(effective, user);
        }
    }

    #[test]
    fn backoff_is_monotonic_and_capped(failures in 0_u32 .. 128) {
        let current = backoff_delay(failures);
        let next = backoff_delay(failures.saturating_add(1));
        prop_assert!(current <= next);
        prop_assert!(current >= Duration::from_secs(60));
        prop_assert!(next <= Duration::from_secs(86_400));
    }

    #[test]
    fn ages_always_carry_a_unit(secs in 0_u64 .. 100_000_000) {
        let text = format_age(Duration::from_secs(secs));
        prop_assert!(
            text.ends_with('m') || text.ends_with('h') || text.ends_with("-day") || text.ends_with("-week"),
            "{}",
            text
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn newest_save_is_served_and_listed_first(versions in prop::collection::vec(1_i64 .. 1_000_000, 1 .. 6)) {
        let root = tempfile::tempdir().unwrap();
        let store = CacheStore::new(root.path(), &["https://conf.example/autoconf.json"]);
        store.ensure_dir().unwrap();
        for (index, version) in versions.iter().enumerate() {
            let payload = format!(r#"{{"AutoConfVersion":{version},"AutoConfSchema":1,"Note":{index}}}"#);
            store.save(payload.as_bytes(), "", "", OffsetDateTime::now_utc()).unwrap();
        }

        let files = store.list_cache_files().unwrap();
        prop_assert_eq!(files.len(), versions.len());
        let mut names: Vec<_> = files.iter().map(|path| path.file_name().unwrap().to_os_string()).collect();
        let listed = names.clone();
        names.sort();
        names.reverse();
        prop_assert_eq!(listed, names);
        prop_assert_eq!(store.cached_config().unwrap().version, *versions.last().unwrap());

        store.prune(2).unwrap();
        prop_assert_eq!(store.list_cache_files().unwrap().len(), versions.len().min(2));
        prop_assert_eq!(store.cached_config().unwrap().version, *versions.last().unwrap());
    }
}
