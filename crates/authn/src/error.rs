//! Authentication error types.
//!
//! This module defines errors that can occur while acquiring, parsing and
//! caching WSAA access tickets.

use std::{sync::Arc, time::Duration};

use arca_wsaa_storage::{BoxError, StorageError};
use thiserror::Error;

/// Ticket acquisition errors.
///
/// Every failure on the path build → sign → exchange → parse → persist
/// surfaces as one of these variants. None of them is retried by this crate.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// Certificate or private key unreadable, malformed or mismatched, or
    /// the CMS envelope could not be produced.
    #[error("Signing error: {message}")]
    Signing {
        /// What failed.
        message: String,
        /// The underlying error, typically from OpenSSL or the filesystem.
        #[source]
        source: Option<BoxError>,
    },

    /// Network or HTTP failure reaching the login endpoint.
    #[error("Transport error: {message}")]
    Transport {
        /// What failed.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// The login exchange did not complete within the configured timeout.
    #[error("Login exchange timed out after {timeout:?}")]
    TransportTimeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The login authority answered with a SOAP fault.
    #[error("Login rejected ({code}): {message}")]
    LoginRejected {
        /// Fault code, e.g. `ns1:coe.alreadyAuthenticated`.
        code: String,
        /// Fault string as sent by the authority.
        message: String,
    },

    /// The login response lacks required fields or has an unparseable
    /// timestamp.
    #[error("Malformed ticket: {0}")]
    MalformedTicket(String),

    /// Ticket storage failed.
    ///
    /// Wraps the original [`StorageError`] to preserve the full error source
    /// chain for debugging and structured logging.
    #[error("Ticket storage error: {0}")]
    Persistence(
        /// The underlying storage error.
        #[source]
        StorageError,
    ),

    /// The ticket request could not be built (empty service name,
    /// unrepresentable timestamp).
    #[error("Invalid ticket request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing { message: message.into(), source: None }
    }

    /// Creates a new `Signing` error with a source error.
    #[must_use]
    pub fn signing_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Signing { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Transport` error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), source: None }
    }

    /// Creates a new `Transport` error with a source error.
    #[must_use]
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `LoginRejected` error.
    #[must_use]
    pub fn login_rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LoginRejected { code: code.into(), message: message.into() }
    }

    /// Creates a new `MalformedTicket` error.
    #[must_use]
    pub fn malformed_ticket(message: impl Into<String>) -> Self {
        Self::MalformedTicket(message.into())
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Creates a new `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns `true` for failures of the login exchange itself
    /// (`Transport`, `TransportTimeout`, `LoginRejected`).
    ///
    /// These are the failures a later call may reasonably retry.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::TransportTimeout { .. } | Self::LoginRejected { .. }
        )
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::Persistence(err)
    }
}

impl From<openssl::error::ErrorStack> for AuthError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        AuthError::signing_with_source("OpenSSL operation failed", err)
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::error::Error;

    use rstest::rstest;

    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(AuthError::signing("bad key").to_string(), "Signing error: bad key");
        assert_eq!(AuthError::transport("refused").to_string(), "Transport error: refused");
        assert_eq!(
            AuthError::TransportTimeout { timeout: Duration::from_secs(30) }.to_string(),
            "Login exchange timed out after 30s"
        );
        assert_eq!(
            AuthError::login_rejected("ns1:coe.alreadyAuthenticated", "TA valido").to_string(),
            "Login rejected (ns1:coe.alreadyAuthenticated): TA valido"
        );
        assert_eq!(
            AuthError::malformed_ticket("missing <token>").to_string(),
            "Malformed ticket: missing <token>"
        );
        assert_eq!(
            AuthError::invalid_request("empty service").to_string(),
            "Invalid ticket request: empty service"
        );
        assert_eq!(
            AuthError::config("zero timeout").to_string(),
            "Configuration error: zero timeout"
        );
    }

    #[rstest]
    #[case::transport(AuthError::transport("x"), true)]
    #[case::timeout(AuthError::TransportTimeout { timeout: Duration::from_secs(1) }, true)]
    #[case::rejected(AuthError::login_rejected("c", "m"), true)]
    #[case::signing(AuthError::signing("x"), false)]
    #[case::malformed(AuthError::malformed_ticket("x"), false)]
    #[case::persistence(AuthError::Persistence(StorageError::io("x")), false)]
    fn test_is_transport(#[case] err: AuthError, #[case] expected: bool) {
        assert_eq!(err.is_transport(), expected);
    }

    #[test]
    fn test_persistence_error_preserves_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let auth_err: AuthError = StorageError::io_with_source("writing wsfe.ticket", io).into();

        // Level 1: AuthError → StorageError
        let level_1 = auth_err.source().expect("level 1 source");
        assert_eq!(level_1.to_string(), "I/O error: writing wsfe.ticket");

        // Level 2: StorageError → io::Error
        let level_2 = level_1.source().expect("level 2 source");
        assert_eq!(level_2.to_string(), "denied");
    }

    #[test]
    fn test_signing_error_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = AuthError::signing_with_source("reading key.pem", io);

        assert_eq!(err.source().expect("source").to_string(), "no such file");
    }
}
