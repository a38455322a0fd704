#![allow(clippy::expect_used, clippy::panic)]
//! Integration tests for fail-point injection in the authn crate.
//!
//! These tests require both `failpoints` and `testutil` features:
//! ```bash
//! cargo test -p arca-wsaa-authn --features failpoints,testutil --test failpoint_tests
//! ```

use std::sync::Arc;

use arca_wsaa_authn::{
    AuthError, TicketCache,
    testutil::{ManualClock, MockLoginTransport, StubSigner},
};
use arca_wsaa_storage::{MemoryTicketStore, TicketStore};
use chrono::{TimeDelta, Utc};

fn setup_cache() -> (Arc<TicketCache>, MemoryTicketStore, MockLoginTransport) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = MemoryTicketStore::new();
    let transport = MockLoginTransport::new(clock.clone(), TimeDelta::hours(12));

    let cache = TicketCache::builder()
        .store(Arc::new(store.clone()))
        .transport(Arc::new(transport.clone()))
        .signer(Arc::new(StubSigner::new()))
        .clock(clock)
        .build()
        .expect("valid cache");

    (Arc::new(cache), store, transport)
}

#[tokio::test]
async fn exchange_failpoint_aborts_acquisition() {
    let scenario = fail::FailScenario::setup();
    let (cache, store, transport) = setup_cache();

    // Enable fail point; acquisition should fail before reaching the transport
    fail::cfg("ticket-before-exchange", "return").expect("failed to configure fail point");

    let result = cache.get_credentials("wsfe").await;
    assert!(
        matches!(result, Err(AuthError::Transport { .. })),
        "acquisition should fail when fail point is active, got {result:?}"
    );
    assert_eq!(transport.exchange_count(), 0);
    assert!(store.load("wsfe").await.expect("load").is_none(), "nothing may be persisted");
    assert_eq!(cache.stats().acquisition_failures, 1);

    // Removing the fail point lets the next call acquire normally
    fail::remove("ticket-before-exchange");
    let credentials = cache.get_credentials("wsfe").await.expect("retry should succeed");
    assert_eq!(credentials.token(), "token-wsfe-1");

    scenario.teardown();
}

#[tokio::test]
async fn exchange_without_failpoint_succeeds() {
    let scenario = fail::FailScenario::setup();
    let (cache, store, transport) = setup_cache();

    // No fail point configured, so acquisition should succeed
    let result = cache.get_credentials("wsfe").await;
    assert!(result.is_ok(), "acquisition should succeed without fail point");
    assert_eq!(transport.exchange_count(), 1);
    assert!(store.load("wsfe").await.expect("load").is_some());

    scenario.teardown();
}
