//! Routing classifier property-based tests.
//!
//! ## Purpose
//! These tests exercise capability merging and endpoint URL construction with
//! randomized inputs so that the canonical forms relied on by expansion hold
//! for every input, not only the hand-picked ones.
//!
//! ## What is covered
//! - Capability merge is associative, commutative, and idempotent with the
//!   empty set as identity.
//! - Built endpoint URLs never end with `/` and contain the path exactly once.
//! - Arbitrary strings never panic the classifier.
// crates/autoconf-core/tests/proptest_routing.rs
// ============================================================================
// Module: Routing Classifier Property-Based Tests
// Description: Lattice and canonical-form checks for the routing classifier.
// Purpose: Ensure grouping and URL construction are order-independent and canonical.
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

use autoconf_core::EndpointCapabilities;
use autoconf_core::build_endpoint_url;
use autoconf_core::determine_known_capabilities;
use autoconf_core::group_by_known_capabilities;
use proptest::prelude::*;

/// Arbitrary capability set.
fn capabilities() -> impl Strategy<Value = EndpointCapabilities> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(providers, peers, ipns_get, ipns_put)| EndpointCapabilities {
            providers,
            peers,
            ipns_get,
            ipns_put,
        },
    )
}

/// Known routing paths, with and without a trailing slash.
fn routing_path() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "",
        "/",
        "/routing/v1/providers",
        "/routing/v1/peers",
        "/routing/v1/ipns",
        "/routing/v1/ipns/",
    ])
}

proptest! {
    #[test]
    fn merge_is_a_lattice_join(a in capabilities(), b in capabilities(), c in capabilities()) {
        prop_assert_eq!(a.merge(b).merge(c), a.merge(b.merge(c)));
        prop_assert_eq!(a.merge(b), b.merge(a));
        prop_assert_eq!(a.merge(a), a);
        prop_assert_eq!(a.merge(EndpointCapabilities::default()), a);
    }

    #[test]
    fn endpoint_urls_are_canonical(
        host in "[a-z][a-z0-9]{0,12}\\.example",
        trailing in 0_usize..3,
        segment in "[A-Z]{1,10}(/[A-Z]{1,10}){0,2}",
        leading in any::<bool>(),
        path_trailing in any::<bool>(),
    ) {
        let base = format!("https://{host}{}", "/".repeat(trailing));
        let mut path = segment.clone();
        if leading {
            path.insert(0, '/');
        }
        if path_trailing {
            path.push('/');
        }
        let url = build_endpoint_url(&base, &path);
        prop_assert!(!url.ends_with('/'));
        prop_assert_eq!(url.matches(segment.as_str()).count(), 1);
        prop_assert_eq!(url, format!("https://{host}/{segment}"));
    }

    #[test]
    fn grouping_is_order_independent(
        paths in prop::collection::vec(routing_path(), 0..8),
        read in any::<bool>(),
        write in any::<bool>(),
    ) {
        let urls: Vec<String> = paths.iter().map(|path| format!("https://x.example{path}")).collect();
        let mut reversed = urls.clone();
        reversed.reverse();
        prop_assert_eq!(
            group_by_known_capabilities(&urls, read, write),
            group_by_known_capabilities(&reversed, read, write)
        );
    }

    #[test]
    fn classifier_never_panics(input in "\\PC{0,64}", read in any::<bool>(), write in any::<bool>()) {
        if let Ok(parsed) = determine_known_capabilities(&input, read, write) {
            prop_assert!(parsed.base_url.starts_with("http://") || parsed.base_url.starts_with("https://"));
        }
    }
}
