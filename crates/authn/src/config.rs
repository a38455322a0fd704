//! Configuration for WSAA ticket acquisition.
//!
//! This module provides [`WsaaConfig`], the explicit configuration value
//! passed to [`TicketCache::from_config`](crate::TicketCache::from_config).
//! Nothing in this crate reads process-wide settings.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// LoginCms endpoint of the homologation (testing) environment.
pub const HOMOLOGATION_LOGIN_ENDPOINT: &str = "https://wsaahomo.afip.gov.ar/ws/services/LoginCms";

/// LoginCms endpoint of the production environment.
pub const PRODUCTION_LOGIN_ENDPOINT: &str = "https://wsaa.afip.gov.ar/ws/services/LoginCms";

/// Default safety margin subtracted from the server-declared expiration (10 minutes).
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(600);

/// Default validity window requested in each ticket request (12 hours).
pub const DEFAULT_REQUEST_VALIDITY: Duration = Duration::from_secs(12 * 60 * 60);

/// Default bound on a single login exchange (30 seconds).
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Login authority environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Homologation environment, for integration testing.
    #[default]
    Testing,
    /// Production environment.
    Production,
}

impl Environment {
    /// LoginCms endpoint serving this environment.
    #[must_use]
    pub fn login_endpoint(self) -> &'static str {
        match self {
            Self::Testing => HOMOLOGATION_LOGIN_ENDPOINT,
            Self::Production => PRODUCTION_LOGIN_ENDPOINT,
        }
    }
}

/// Configuration for [`TicketCache`](crate::TicketCache) and its collaborators.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// use arca_wsaa_authn::config::{Environment, WsaaConfig};
///
/// let config = WsaaConfig::builder()
///     .certificate_path("data/cert.pem")
///     .private_key_path("data/key.pem")
///     .ticket_storage_dir("data/tickets")
///     .environment(Environment::Production)
///     .safety_margin(Duration::from_secs(300))
///     .build()?;
///
/// assert_eq!(config.login_endpoint(), "https://wsaa.afip.gov.ar/ws/services/LoginCms");
/// # Ok::<(), arca_wsaa_authn::AuthError>(())
/// ```
///
/// Deserialized configurations accept humantime durations:
///
/// ```toml
/// certificate_path = "data/cert.pem"
/// private_key_path = "data/key.pem"
/// ticket_storage_dir = "data/tickets"
/// environment = "testing"
/// safety_margin = "10m"
/// request_validity = "12h"
/// login_timeout = "30s"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WsaaConfig {
    /// PEM-encoded X.509 certificate registered with the authority.
    pub(crate) certificate_path: PathBuf,

    /// PEM-encoded unencrypted private key matching the certificate.
    pub(crate) private_key_path: PathBuf,

    /// Directory holding one persisted ticket per service.
    pub(crate) ticket_storage_dir: PathBuf,

    /// Environment selecting the login endpoint.
    #[serde(default)]
    pub(crate) environment: Environment,

    /// Time subtracted from the server-declared expiration.
    #[serde(with = "humantime_serde", default = "default_safety_margin")]
    pub(crate) safety_margin: Duration,

    /// Validity window requested in each ticket request.
    #[serde(with = "humantime_serde", default = "default_request_validity")]
    pub(crate) request_validity: Duration,

    /// Bound on a single login exchange.
    #[serde(with = "humantime_serde", default = "default_login_timeout")]
    pub(crate) login_timeout: Duration,

    /// Overrides the environment's login endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) login_endpoint: Option<String>,
}

fn default_safety_margin() -> Duration {
    DEFAULT_SAFETY_MARGIN
}

fn default_request_validity() -> Duration {
    DEFAULT_REQUEST_VALIDITY
}

fn default_login_timeout() -> Duration {
    DEFAULT_LOGIN_TIMEOUT
}

#[bon::bon]
impl WsaaConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Optional Fields
    ///
    /// * `environment` - Login environment (default: [`Environment::Testing`])
    /// * `safety_margin` - Default [`DEFAULT_SAFETY_MARGIN`]
    /// * `request_validity` - Default [`DEFAULT_REQUEST_VALIDITY`]
    /// * `login_timeout` - Default [`DEFAULT_LOGIN_TIMEOUT`]
    /// * `login_endpoint` - Endpoint override
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if validation fails; see
    /// [`validate`](Self::validate).
    #[builder]
    pub fn new(
        #[builder(into)] certificate_path: PathBuf,
        #[builder(into)] private_key_path: PathBuf,
        #[builder(into)] ticket_storage_dir: PathBuf,
        #[builder(default)] environment: Environment,
        #[builder(default = DEFAULT_SAFETY_MARGIN)] safety_margin: Duration,
        #[builder(default = DEFAULT_REQUEST_VALIDITY)] request_validity: Duration,
        #[builder(default = DEFAULT_LOGIN_TIMEOUT)] login_timeout: Duration,
        #[builder(into)] login_endpoint: Option<String>,
    ) -> Result<Self> {
        let config = Self {
            certificate_path,
            private_key_path,
            ticket_storage_dir,
            environment,
            safety_margin,
            request_validity,
            login_timeout,
            login_endpoint,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration invariants.
    ///
    /// Deserialized configurations skip the builder, so callers loading a
    /// configuration file should call this before use.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if:
    /// - Any path is empty
    /// - `request_validity` or `login_timeout` is zero
    /// - `safety_margin >= request_validity`
    /// - `login_endpoint` is set but empty
    pub fn validate(&self) -> Result<()> {
        if self.certificate_path.as_os_str().is_empty() {
            return Err(AuthError::config("certificate_path cannot be empty"));
        }
        if self.private_key_path.as_os_str().is_empty() {
            return Err(AuthError::config("private_key_path cannot be empty"));
        }
        if self.ticket_storage_dir.as_os_str().is_empty() {
            return Err(AuthError::config("ticket_storage_dir cannot be empty"));
        }
        if self.request_validity.is_zero() {
            return Err(AuthError::config("request_validity must be positive"));
        }
        if self.login_timeout.is_zero() {
            return Err(AuthError::config("login_timeout must be positive"));
        }
        if self.safety_margin >= self.request_validity {
            return Err(AuthError::config(format!(
                "safety_margin ({:?}) must be shorter than request_validity ({:?})",
                self.safety_margin, self.request_validity
            )));
        }
        if self.login_endpoint.as_deref().is_some_and(|e| e.trim().is_empty()) {
            return Err(AuthError::config("login_endpoint cannot be empty when set"));
        }
        Ok(())
    }

    /// Path of the PEM certificate.
    #[must_use]
    pub fn certificate_path(&self) -> &std::path::Path {
        &self.certificate_path
    }

    /// Path of the PEM private key.
    #[must_use]
    pub fn private_key_path(&self) -> &std::path::Path {
        &self.private_key_path
    }

    /// Directory for persisted tickets.
    #[must_use]
    pub fn ticket_storage_dir(&self) -> &std::path::Path {
        &self.ticket_storage_dir
    }

    /// Configured environment.
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Safety margin subtracted from server expirations.
    #[must_use]
    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    /// Validity window requested from the authority.
    #[must_use]
    pub fn request_validity(&self) -> Duration {
        self.request_validity
    }

    /// Timeout for one login exchange.
    #[must_use]
    pub fn login_timeout(&self) -> Duration {
        self.login_timeout
    }

    /// Effective login endpoint: the override if set, else the
    /// environment's endpoint.
    #[must_use]
    pub fn login_endpoint(&self) -> &str {
        self.login_endpoint.as_deref().unwrap_or(self.environment.login_endpoint())
    }
}
