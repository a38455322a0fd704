//! # ARCA WSAA Authentication
//!
//! Access ticket acquisition, caching and renewal for the ARCA (formerly
//! AFIP) web services.
//!
//! Every ARCA web service call needs a short-lived `(token, sign)` pair
//! issued by the WSAA login service. This crate provides:
//! - **Signing**: CMS envelopes over ticket requests ([`signer`])
//! - **Login**: the SOAP `loginCms` exchange ([`transport`])
//! - **Parsing**: login ticket responses with safety-margin expiry ([`ticket`])
//! - **Caching**: per-service in-memory and persisted tickets with
//!   single-flight renewal ([`TicketCache`])
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ service clients (wsfe, wslpg, ...)           │
//! └──────────────────┬───────────────────────────┘
//!                    │ CredentialsProvider
//! ┌──────────────────▼───────────────────────────┐
//! │ TicketCache                                  │
//! │   memory → TicketStore → login               │
//! └───┬──────────────┬──────────────┬────────────┘
//!     │              │              │
//! RequestSigner  LoginTransport  TicketStore
//! (CmsSigner)    (SoapLogin...)  (FileTicketStore)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use arca_wsaa_authn::{
//!     TicketCache,
//!     config::{Environment, WsaaConfig},
//!     services,
//! };
//!
//! # async fn example() -> Result<(), arca_wsaa_authn::AuthError> {
//! let config = WsaaConfig::builder()
//!     .certificate_path("data/cert.pem")
//!     .private_key_path("data/key.pem")
//!     .ticket_storage_dir("data/tickets")
//!     .environment(Environment::Production)
//!     .build()?;
//! let cache = TicketCache::from_config(&config)?;
//!
//! let (token, sign) = cache.get_credentials(services::WSFE).await?.into_pair();
//! # let _ = (token, sign);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Per-service ticket cache.
pub mod cache;
/// Time source.
pub mod clock;
pub mod config;
/// Authentication error types.
pub mod error;
pub mod request;
pub mod services;
pub mod signer;
pub mod soap;
pub mod ticket;
pub mod transport;

/// Shared test utilities (feature-gated).
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

// Re-export key types for convenience
pub use arca_wsaa_storage::{FileTicketStore, MemoryTicketStore, Ticket, TicketStore};
pub use cache::{CacheStatsSnapshot, Credentials, CredentialsProvider, TicketCache};
pub use clock::{Clock, SystemClock};
pub use config::{Environment, WsaaConfig};
pub use error::{AuthError, Result};
pub use signer::{CmsSigner, RequestSigner};
pub use transport::{LoginTransport, SoapLoginTransport};
