//! Login transport: the network seam between the cache and the authority.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::{
    config::Environment,
    error::{AuthError, Result},
    soap,
};

/// Exchanges a signed ticket request for a ticket response.
///
/// Implementations perform exactly one remote call per invocation and never
/// retry. The cache bounds each call with its own timeout.
#[async_trait]
pub trait LoginTransport: Send + Sync + fmt::Debug {
    /// Sends the base64 CMS envelope and returns the ticket response XML.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Transport`] on network, HTTP or protocol failures
    /// - [`AuthError::LoginRejected`] if the authority refuses the request
    async fn exchange(&self, signed_request_b64: &str) -> Result<String>;
}

/// [`LoginTransport`] speaking SOAP 1.1 over HTTPS to a LoginCms endpoint.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use arca_wsaa_authn::{config::Environment, transport::SoapLoginTransport};
///
/// let transport = SoapLoginTransport::for_environment(Environment::Testing, Duration::from_secs(30))?;
/// assert_eq!(transport.endpoint(), "https://wsaahomo.afip.gov.ar/ws/services/LoginCms");
/// # Ok::<(), arca_wsaa_authn::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SoapLoginTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl SoapLoginTransport {
    /// Creates a transport posting to `endpoint`, with `timeout` applied to
    /// each HTTP request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Transport`] if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AuthError::transport_with_source("building HTTP client", err))?;
        Ok(Self { client, endpoint: endpoint.into() })
    }

    /// Creates a transport for the environment's LoginCms endpoint.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn for_environment(environment: Environment, timeout: Duration) -> Result<Self> {
        Self::new(environment.login_endpoint(), timeout)
    }

    /// Endpoint this transport posts to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LoginTransport for SoapLoginTransport {
    #[tracing::instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn exchange(&self, signed_request_b64: &str) -> Result<String> {
        let envelope = soap::login_cms_envelope(signed_request_b64)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", "\"\"")
            .body(envelope)
            .send()
            .await
            .map_err(|err| AuthError::transport_with_source("sending loginCms request", err))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| AuthError::transport_with_source("reading loginCms response", err))?;
        tracing::debug!(%status, bytes = body.len(), "loginCms response received");

        // Faults arrive with HTTP 500, so the body is inspected before the status.
        let parsed = soap::parse_login_cms_response(&body);
        if status.is_success() || matches!(parsed, Err(AuthError::LoginRejected { .. })) {
            return parsed;
        }
        Err(AuthError::transport(format!("login endpoint answered HTTP {status}")))
    }
}
