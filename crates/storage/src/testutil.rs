//! Shared test utilities for ticket storage testing.
//!
//! This module provides ticket factories, a fault-injecting store wrapper and
//! assertion macros. It is feature-gated behind `testutil` to prevent leaking
//! into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! arca-wsaa-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use arca_wsaa_storage::testutil::{FaultyTicketStore, ticket_expiring_at};
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::{
    auth::{MemoryTicketStore, Ticket, TicketStore},
    error::{StorageError, StorageResult},
};

/// Builds a valid ticket for `service` whose usable deadline is `expires_at`.
///
/// The server deadline is set ten minutes later, mirroring the default
/// safety margin. Token and sign are derived from the service name.
#[must_use]
pub fn ticket_expiring_at(service: &str, expires_at: DateTime<Utc>) -> Ticket {
    ticket_with_token(service, &format!("token-{service}"), expires_at)
}

/// Builds a valid ticket with an explicit token.
#[must_use]
pub fn ticket_with_token(service: &str, token: &str, expires_at: DateTime<Utc>) -> Ticket {
    Ticket::builder()
        .service(service)
        .raw_response(format!(
            "<loginTicketResponse><service>{service}</service></loginTicketResponse>"
        ))
        .server_expires_at(expires_at + TimeDelta::minutes(10))
        .safety_margin(std::time::Duration::from_secs(600))
        .token(token)
        .sign(format!("sign-{service}"))
        .build()
        .expect("test ticket must be valid")
}

/// [`TicketStore`] wrapper that counts calls and fails on demand.
///
/// Delegates to an inner [`MemoryTicketStore`] unless a failure mode is
/// switched on. Clones share counters, switches and contents.
#[derive(Debug, Default, Clone)]
pub struct FaultyTicketStore {
    inner: MemoryTicketStore,
    state: Arc<FaultState>,
}

#[derive(Debug, Default)]
struct FaultState {
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl FaultyTicketStore {
    /// Creates an empty store with all failure modes off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped store, for seeding or inspecting contents directly.
    #[must_use]
    pub fn inner(&self) -> &MemoryTicketStore {
        &self.inner
    }

    /// Makes every subsequent `load` fail with an I/O error.
    pub fn set_fail_loads(&self, fail: bool) {
        self.state.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `save` fail with an I/O error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.state.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of `load` calls seen, including failed ones.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.state.loads.load(Ordering::SeqCst)
    }

    /// Number of `save` calls seen, including failed ones.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.state.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TicketStore for FaultyTicketStore {
    async fn load(&self, service: &str) -> StorageResult<Option<Ticket>> {
        self.state.loads.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_loads.load(Ordering::SeqCst) {
            return Err(StorageError::io(format!("injected load failure for {service}")));
        }
        self.inner.load(service).await
    }

    async fn save(&self, service: &str, ticket: &Ticket) -> StorageResult<()> {
        self.state.saves.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::io(format!("injected save failure for {service}")));
        }
        self.inner.save(service, ticket).await
    }
}

/// Asserts that a [`StorageResult`] is an `Err` matching the given
/// [`StorageError`] variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use arca_wsaa_storage::{assert_storage_error, StorageError, StorageResult};
///
/// let result: StorageResult<()> = Err(StorageError::io("disk"));
/// assert_storage_error!(result, Io);
/// ```
#[macro_export]
macro_rules! assert_storage_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::$variant { .. })),
            "expected StorageError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
}
