//! Storage error types and result alias.
//!
//! All [`TicketStore`](crate::auth::TicketStore) implementations map their
//! internal failures to [`StorageError`].
//!
//! # Error Types
//!
//! - [`StorageError::Io`] - The storage slot could not be read or written
//! - [`StorageError::Serialization`] - A persisted ticket could not be encoded or decoded
//! - [`StorageError::InvalidTicket`] - Ticket fields violate the ticket invariants
//! - [`StorageError::InvalidServiceName`] - The service name cannot address a storage slot
//! - [`StorageError::Internal`] - Backend-specific internal errors
//!
//! # Example
//!
//! ```
//! use arca_wsaa_storage::{StorageError, StorageResult};
//!
//! fn slot(service: &str) -> StorageResult<String> {
//!     if service.is_empty() {
//!         return Err(StorageError::invalid_service_name(service, "must not be empty"));
//!     }
//!     Ok(format!("{service}.ticket"))
//! }
//!
//! assert!(slot("").is_err());
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while loading or saving tickets.
///
/// Errors preserve their source chain via the `#[source]` attribute.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions
/// must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// Reading or writing the storage slot failed.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the failed operation.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: Option<BoxError>,
    },

    /// A persisted ticket could not be encoded or decoded.
    ///
    /// Usually means the slot holds a truncated or hand-edited file.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying error that caused serialization to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// The ticket fields violate an invariant (empty token or sign,
    /// expiry after the server deadline).
    #[error("Invalid ticket: {message}")]
    InvalidTicket {
        /// Which invariant was violated.
        message: String,
    },

    /// The service name cannot be mapped to a storage slot.
    #[error("Invalid service name {service:?}: {reason}")]
    InvalidServiceName {
        /// The rejected service name.
        service: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Internal storage backend error.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },
}

impl StorageError {
    /// Creates a new `Io` error with the given message.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io { message: message.into(), source: None }
    }

    /// Creates a new `Io` error with a message and source error.
    #[must_use]
    pub fn io_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Io { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `InvalidTicket` error.
    #[must_use]
    pub fn invalid_ticket(message: impl Into<String>) -> Self {
        Self::InvalidTicket { message: message.into() }
    }

    /// Creates a new `InvalidServiceName` error.
    #[must_use]
    pub fn invalid_service_name(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidServiceName { service: service.into(), reason: reason.into() }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Internal` error with a message and source error.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }
}
