//! Ticket persistence for the ARCA WSAA client.
//!
//! The WSAA login service issues short-lived access tickets, one per target
//! web service. Requesting a new ticket while a valid one exists is rejected
//! by the authority, so tickets must outlive the process that obtained them.
//! This crate provides the data model and the storage seam for that.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  arca-wsaa-authn                            │
//! │      TicketCache (sign → login → parse → persist)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  arca-wsaa-storage                          │
//! │            Ticket + TicketStore trait                       │
//! │                 (load, save)                                │
//! ├──────────────────────┬──────────────────────────────────────┤
//! │  MemoryTicketStore   │          FileTicketStore             │
//! │      (testing)       │   (<dir>/<service>.ticket, atomic)   │
//! └──────────────────────┴──────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use arca_wsaa_storage::auth::{FileTicketStore, Ticket, TicketStore};
//! use chrono::{TimeDelta, Utc};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dir = std::env::temp_dir().join("arca-wsaa-doctest");
//!     let store = FileTicketStore::new(&dir);
//!
//!     let ticket = Ticket::builder()
//!         .service("wsfe")
//!         .raw_response("<loginTicketResponse/>")
//!         .server_expires_at(Utc::now() + TimeDelta::hours(12))
//!         .safety_margin(Duration::from_secs(600))
//!         .token("token")
//!         .sign("sign")
//!         .build()?;
//!
//!     store.save("wsfe", &ticket).await?;
//!     let loaded = store.load("wsfe").await?;
//!     assert_eq!(loaded.map(|t| t.expires_at()), Some(ticket.expires_at()));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`]. Callers decide whether a
//! failed load is fatal; the ticket cache treats it as an empty slot.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with ticket factories, a fault-injecting store
//!   and assertion macros. Enable this in `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]

pub mod auth;
pub mod error;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

// Re-export primary types at crate root for convenience
pub use auth::{FileTicketStore, MemoryTicketStore, Ticket, TicketStore};
pub use error::{BoxError, StorageError, StorageResult};
pub use zeroize::Zeroizing;
