//! Time source used for ticket validity checks.

use std::fmt;

use chrono::{DateTime, Utc};

/// Source of the current instant.
///
/// Ticket validity is always evaluated against a `Clock` rather than the
/// system time directly, so expiry behaviour can be tested deterministically.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
