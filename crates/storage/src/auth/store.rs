//! Storage trait for persisted access tickets.
//!
//! This module provides the [`TicketStore`] trait that abstracts where tickets
//! live between process restarts. Implementations can use different backends
//! (a directory of files in production, in-memory for testing).
//!
//! # Slots
//!
//! Every service name owns exactly one slot. Saving overwrites whatever the
//! slot held before; tickets are superseded, never merged.
//!
//! # Usage
//!
//! ```no_run
//! // Demonstrates the trait interface; requires a concrete store implementation.
//! use arca_wsaa_storage::{
//!     StorageResult,
//!     auth::{Ticket, TicketStore},
//! };
//!
//! async fn replace<S: TicketStore>(store: &S, ticket: &Ticket) -> StorageResult<()> {
//!     store.save(ticket.service(), ticket).await
//! }
//! ```

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    auth::Ticket,
    error::{StorageError, StorageResult},
};

/// Maximum accepted length of a service name, in bytes.
pub const MAX_SERVICE_NAME_LEN: usize = 128;

/// Persistence layer for access tickets, one slot per service name.
///
/// # Atomicity
///
/// A concurrent [`load`](Self::load) must never observe a half-written
/// ticket: it sees either the previous ticket or the new one.
///
/// # Error Handling
///
/// Operations return [`StorageResult`]. Callers that can recover (for
/// example by requesting a fresh ticket) decide how to treat a failed load.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Loads the ticket persisted for `service`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(ticket))` if the slot holds a ticket
    /// - `Ok(None)` if the slot is empty
    /// - `Err(...)` if the slot exists but cannot be read or decoded
    ///
    /// Expired tickets are returned as-is; validity is the caller's concern.
    async fn load(&self, service: &str) -> StorageResult<Option<Ticket>>;

    /// Persists `ticket` in the slot for `service`, replacing any previous
    /// ticket.
    ///
    /// # Errors
    ///
    /// Returns an error if the service name is invalid, the ticket was
    /// issued for a different service, the ticket cannot be encoded or the
    /// slot cannot be written. On error the previous ticket, if any, is left
    /// intact.
    async fn save(&self, service: &str, ticket: &Ticket) -> StorageResult<()>;
}

/// Checks that `service` can address a storage slot.
///
/// Accepted names are non-empty, at most [`MAX_SERVICE_NAME_LEN`] bytes,
/// consist of ASCII letters, digits, `_`, `-` and `.`, and do not start
/// with `.`. Every service name the login authority publishes
/// (`wsfe`, `ws_sr_padron_a10`, ...) satisfies these rules.
///
/// # Errors
///
/// Returns [`StorageError::InvalidServiceName`] describing the first
/// violated rule.
pub fn validate_service_name(service: &str) -> StorageResult<()> {
    if service.is_empty() {
        return Err(StorageError::invalid_service_name(service, "must not be empty"));
    }
    if service.len() > MAX_SERVICE_NAME_LEN {
        return Err(StorageError::invalid_service_name(
            service,
            format!("longer than {MAX_SERVICE_NAME_LEN} bytes"),
        ));
    }
    if service.starts_with('.') {
        return Err(StorageError::invalid_service_name(service, "must not start with '.'"));
    }
    if let Some(c) =
        service.chars().find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(StorageError::invalid_service_name(
            service,
            format!("contains disallowed character {c:?}"),
        ));
    }
    Ok(())
}

/// Checks that `ticket` was issued for the slot it is stored under.
///
/// # Errors
///
/// Returns [`StorageError::InvalidTicket`] naming both services.
pub(crate) fn ensure_ticket_for(service: &str, ticket: &Ticket) -> StorageResult<()> {
    if ticket.service() != service {
        return Err(StorageError::invalid_ticket(format!(
            "slot {service:?} cannot hold a ticket for service {:?}",
            ticket.service()
        )));
    }
    Ok(())
}

/// In-memory implementation of [`TicketStore`].
///
/// Suitable for unit tests and for processes that do not need tickets to
/// survive a restart. Clones share the same underlying map.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use arca_wsaa_storage::auth::{MemoryTicketStore, Ticket, TicketStore};
/// use chrono::{TimeDelta, Utc};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryTicketStore::new();
///     let ticket = Ticket::builder()
///         .service("wsfe")
///         .raw_response("<loginTicketResponse/>")
///         .server_expires_at(Utc::now() + TimeDelta::hours(12))
///         .token("token")
///         .sign("sign")
///         .build()?;
///
///     store.save("wsfe", &ticket).await?;
///     assert_eq!(store.load("wsfe").await?, Some(ticket));
///     assert_eq!(store.load("wsfecred").await?, None);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryTicketStore {
    tickets: Arc<RwLock<HashMap<String, Ticket>>>,
}

impl MemoryTicketStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.read().len()
    }

    /// Returns `true` if no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.read().is_empty()
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    #[tracing::instrument(skip(self))]
    async fn load(&self, service: &str) -> StorageResult<Option<Ticket>> {
        validate_service_name(service)?;
        let ticket = self.tickets.read().get(service).cloned();
        if let Some(ticket) = &ticket {
            ensure_ticket_for(service, ticket)?;
        }
        Ok(ticket)
    }

    #[tracing::instrument(skip(self, ticket), fields(expires_at = %ticket.expires_at()))]
    async fn save(&self, service: &str, ticket: &Ticket) -> StorageResult<()> {
        validate_service_name(service)?;
        ensure_ticket_for(service, ticket)?;
        self.tickets.write().insert(service.to_owned(), ticket.clone());
        Ok(())
    }
}
