//! Access tickets and their persistence.
//!
//! This module contains the [`Ticket`](crate::auth::Ticket) data model and the
//! [`TicketStore`](crate::auth::TicketStore) trait through which tickets survive
//! process restarts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  save/load   ┌──────────────────┐
//! │ ticket cache │─────────────►│   TicketStore    │
//! │   (authn)    │              ├────────┬─────────┤
//! └──────────────┘              │ Memory │  File   │
//!                               └────────┴─────────┘
//! ```
//!
//! # Slots
//!
//! One slot per service name. [`FileTicketStore`](crate::auth::FileTicketStore)
//! maps a slot to `<dir>/<service>.ticket`; [`validate_service_name`] guards
//! against names that would escape the directory.
//!
//! # Examples
//!
//! ```
//! use arca_wsaa_storage::auth::{MemoryTicketStore, Ticket, TicketStore};
//! use chrono::{TimeDelta, Utc};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let store = MemoryTicketStore::new();
//! let ticket = Ticket::builder()
//!     .service("wsfecred")
//!     .raw_response("<loginTicketResponse/>")
//!     .server_expires_at(Utc::now() + TimeDelta::hours(12))
//!     .token("token")
//!     .sign("sign")
//!     .build()
//!     .unwrap();
//!
//! store.save("wsfecred", &ticket).await.unwrap();
//! assert!(store.load("wsfecred").await.unwrap().is_some());
//! # });
//! ```

mod file_store;
mod store;
mod ticket;

pub use file_store::{FileTicketStore, TICKET_FILE_EXTENSION};
pub use store::{MAX_SERVICE_NAME_LEN, MemoryTicketStore, TicketStore, validate_service_name};
pub use ticket::Ticket;
