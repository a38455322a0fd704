//! Per-service access ticket cache.
//!
//! This module provides [`TicketCache`], the single entry point downstream
//! service clients use to obtain a `(token, sign)` pair.
//!
//! # Lookup Order
//!
//! ```text
//! get_credentials(service)
//!   → in-memory ticket valid?           → return            (tier = memory)
//!   → wait for the service's acquire lock
//!   → in-memory ticket valid now?       → return            (tier = memory)
//!   → persisted ticket valid?           → adopt, return     (tier = store)
//!   → build → sign → exchange → parse   → adopt, persist    (tier = login)
//! ```
//!
//! Expiry is detected lazily on access; nothing runs in the background.
//!
//! # Concurrency
//!
//! Reads of a valid ticket take a shared lock only. Acquisition is
//! serialized per service: concurrent callers for the same service wait for
//! the one in-flight login and then observe its ticket. Different services
//! never wait on each other.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use arca_wsaa_storage::{
    FileTicketStore, Ticket, TicketStore, Zeroizing, auth::validate_service_name,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fail::fail_point;
use parking_lot::RwLock;

use crate::{
    clock::{Clock, SystemClock},
    config::{
        DEFAULT_LOGIN_TIMEOUT, DEFAULT_REQUEST_VALIDITY, DEFAULT_SAFETY_MARGIN, WsaaConfig,
    },
    error::{AuthError, Result},
    request::build_request,
    signer::{CmsSigner, RequestSigner},
    ticket::parse_login_response,
    transport::{LoginTransport, SoapLoginTransport},
};

/// Token and sign authorizing calls to one service.
///
/// Cheap to clone; the secrets are shared with the cached ticket and
/// never appear in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    ticket: Arc<Ticket>,
}

impl Credentials {
    /// Service these credentials authorize.
    #[must_use]
    pub fn service(&self) -> &str {
        self.ticket.service()
    }

    /// Opaque authorization token.
    #[must_use]
    pub fn token(&self) -> &str {
        self.ticket.token()
    }

    /// Signature accompanying the token.
    #[must_use]
    pub fn sign(&self) -> &str {
        self.ticket.sign()
    }

    /// Instant after which these credentials must not be used.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.ticket.expires_at()
    }

    /// Returns owned copies of `(token, sign)`, zeroized on drop.
    #[must_use]
    pub fn into_pair(self) -> (Zeroizing<String>, Zeroizing<String>) {
        (Zeroizing::new(self.token().to_owned()), Zeroizing::new(self.sign().to_owned()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("service", &self.service())
            .field("token", &"[REDACTED]")
            .field("sign", &"[REDACTED]")
            .field("expires_at", &self.expires_at())
            .finish()
    }
}

/// Source of service credentials.
///
/// This is the only seam service clients depend on; [`TicketCache`] is the
/// production implementation.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// Returns currently valid credentials for `service`.
    async fn credentials(&self, service: &str) -> Result<Credentials>;
}

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    /// Calls answered from the in-memory ticket.
    pub memory_hits: u64,
    /// Calls answered by adopting a persisted ticket.
    pub store_hits: u64,
    /// Login exchanges started.
    pub login_exchanges: u64,
    /// Acquisitions that failed before a ticket was adopted.
    pub acquisition_failures: u64,
    /// Acquired tickets that could not be persisted.
    pub persist_failures: u64,
}

#[derive(Debug, Default)]
struct CacheStats {
    memory_hits: AtomicU64,
    store_hits: AtomicU64,
    login_exchanges: AtomicU64,
    acquisition_failures: AtomicU64,
    persist_failures: AtomicU64,
}

impl CacheStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            store_hits: self.store_hits.load(Ordering::Relaxed),
            login_exchanges: self.login_exchanges.load(Ordering::Relaxed),
            acquisition_failures: self.acquisition_failures.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
        }
    }
}

/// Cache state for one service.
#[derive(Debug, Default)]
struct ServiceEntry {
    current: RwLock<Option<Arc<Ticket>>>,
    acquire: tokio::sync::Mutex<()>,
}

impl ServiceEntry {
    fn valid_at(&self, now: DateTime<Utc>) -> Option<Arc<Ticket>> {
        self.current.read().as_ref().filter(|t| t.is_valid_at(now)).cloned()
    }

    fn adopt(&self, ticket: Ticket) -> Arc<Ticket> {
        let ticket = Arc::new(ticket);
        *self.current.write() = Some(Arc::clone(&ticket));
        ticket
    }
}

/// Access ticket cache with persistence and single-flight acquisition.
///
/// Any [`Credentials`] returned satisfy `now < expires_at` according to the
/// cache's [`Clock`].
///
/// # Failure Handling
///
/// - Build, sign, exchange and parse failures are returned to the caller
///   and leave both the in-memory and the persisted ticket untouched.
/// - A failed store read is logged and treated as an empty slot.
/// - A failed store write after a successful login is returned as
///   [`AuthError::Persistence`]. The new ticket is adopted in memory first,
///   so the next call is served from memory without another login.
///
/// Nothing is retried; the next call starts a new acquisition.
///
/// # Examples
///
/// ```no_run
/// use arca_wsaa_authn::{TicketCache, config::WsaaConfig, services};
///
/// # async fn example() -> Result<(), arca_wsaa_authn::AuthError> {
/// let config = WsaaConfig::builder()
///     .certificate_path("data/cert.pem")
///     .private_key_path("data/key.pem")
///     .ticket_storage_dir("data/tickets")
///     .build()?;
/// let cache = TicketCache::from_config(&config)?;
///
/// let credentials = cache.get_credentials(services::WSFE).await?;
/// println!("token valid until {}", credentials.expires_at());
/// # Ok(())
/// # }
/// ```
pub struct TicketCache {
    store: Arc<dyn TicketStore>,
    transport: Arc<dyn LoginTransport>,
    signer: Arc<dyn RequestSigner>,
    clock: Arc<dyn Clock>,
    safety_margin: Duration,
    request_validity: Duration,
    login_timeout: Duration,
    entries: RwLock<HashMap<String, Arc<ServiceEntry>>>,
    stats: CacheStats,
}

#[bon::bon]
impl TicketCache {
    /// Creates a cache over explicit collaborators.
    ///
    /// # Optional Fields
    ///
    /// * `clock` - Default [`SystemClock`]
    /// * `safety_margin` - Default [`DEFAULT_SAFETY_MARGIN`]
    /// * `request_validity` - Default [`DEFAULT_REQUEST_VALIDITY`]
    /// * `login_timeout` - Default [`DEFAULT_LOGIN_TIMEOUT`]
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if `request_validity` or
    /// `login_timeout` is zero, or `safety_margin >= request_validity`.
    #[builder]
    pub fn new(
        store: Arc<dyn TicketStore>,
        transport: Arc<dyn LoginTransport>,
        signer: Arc<dyn RequestSigner>,
        #[builder(default = system_clock())] clock: Arc<dyn Clock>,
        #[builder(default = DEFAULT_SAFETY_MARGIN)] safety_margin: Duration,
        #[builder(default = DEFAULT_REQUEST_VALIDITY)] request_validity: Duration,
        #[builder(default = DEFAULT_LOGIN_TIMEOUT)] login_timeout: Duration,
    ) -> Result<Self> {
        if request_validity.is_zero() {
            return Err(AuthError::config("request_validity must be positive"));
        }
        if login_timeout.is_zero() {
            return Err(AuthError::config("login_timeout must be positive"));
        }
        if safety_margin >= request_validity {
            return Err(AuthError::config(format!(
                "safety_margin ({safety_margin:?}) must be shorter than \
                 request_validity ({request_validity:?})"
            )));
        }

        Ok(Self {
            store,
            transport,
            signer,
            clock,
            safety_margin,
            request_validity,
            login_timeout,
            entries: RwLock::new(HashMap::new()),
            stats: CacheStats::default(),
        })
    }
}

impl TicketCache {
    /// Wires the production collaborators described by `config`: a CMS
    /// signer over the configured PEM files, a file store under
    /// `ticket_storage_dir` and a SOAP transport to the login endpoint.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Config`] if the configuration is invalid
    /// - [`AuthError::Signing`] if the certificate or key cannot be loaded
    /// - [`AuthError::Transport`] if the HTTP client cannot be built
    pub fn from_config(config: &WsaaConfig) -> Result<Self> {
        config.validate()?;

        let signer =
            CmsSigner::from_pem_files(config.certificate_path(), config.private_key_path())?;
        let transport = SoapLoginTransport::new(config.login_endpoint(), config.login_timeout())?;
        let store = FileTicketStore::new(config.ticket_storage_dir());

        tracing::info!(
            endpoint = config.login_endpoint(),
            dir = %config.ticket_storage_dir().display(),
            "ticket cache configured"
        );

        Self::builder()
            .store(Arc::new(store))
            .transport(Arc::new(transport))
            .signer(Arc::new(signer))
            .safety_margin(config.safety_margin())
            .request_validity(config.request_validity())
            .login_timeout(config.login_timeout())
            .build()
    }

    /// Returns valid credentials for `service`, acquiring a new ticket if
    /// neither memory nor the store holds one.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidRequest`] if `service` cannot name a ticket slot
    /// - [`AuthError::Signing`], [`AuthError::Transport`],
    ///   [`AuthError::TransportTimeout`], [`AuthError::LoginRejected`] or
    ///   [`AuthError::MalformedTicket`] if acquisition fails
    /// - [`AuthError::Persistence`] if the acquired ticket could not be saved;
    ///   it is still adopted in memory
    #[tracing::instrument(
        skip(self),
        fields(tier = tracing::field::Empty, expires_at = tracing::field::Empty)
    )]
    pub async fn get_credentials(&self, service: &str) -> Result<Credentials> {
        validate_service_name(service)
            .map_err(|err| AuthError::invalid_request(err.to_string()))?;

        let entry = self.entry(service);

        if let Some(ticket) = entry.valid_at(self.clock.now()) {
            return Ok(self.hit(ticket, "memory"));
        }

        let _guard = entry.acquire.lock().await;

        // Another caller may have finished an acquisition while we waited.
        let now = self.clock.now();
        if let Some(ticket) = entry.valid_at(now) {
            return Ok(self.hit(ticket, "memory"));
        }

        let persisted = self
            .store
            .load(service)
            .await
            .and_then(|found| found.map(|t| t.with_safety_margin(self.safety_margin)).transpose());
        match persisted {
            Ok(Some(ticket)) if ticket.is_valid_at(now) => {
                CacheStats::bump(&self.stats.store_hits);
                return Ok(self.hit(entry.adopt(ticket), "store"));
            },
            Ok(Some(ticket)) => {
                tracing::debug!(expired_at = %ticket.expires_at(), "persisted ticket expired");
            },
            Ok(None) => tracing::debug!("no persisted ticket"),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "failed to load persisted ticket, acquiring a new one"
                );
            },
        }

        let ticket = match self.acquire(service).await {
            Ok(ticket) => ticket,
            Err(err) => {
                CacheStats::bump(&self.stats.acquisition_failures);
                tracing::warn!(error = %err, "ticket acquisition failed");
                return Err(err);
            },
        };

        let saved = self.store.save(service, &ticket).await;
        let ticket = entry.adopt(ticket);
        if let Err(err) = saved {
            CacheStats::bump(&self.stats.persist_failures);
            tracing::error!(
                error = %err,
                expires_at = %ticket.expires_at(),
                "failed to persist acquired ticket, keeping it in memory only"
            );
            return Err(AuthError::Persistence(err));
        }

        Ok(self.hit(ticket, "login"))
    }

    /// Drops the in-memory ticket for `service`.
    ///
    /// The persisted ticket is kept, so the next call reloads it if it is
    /// still valid. Returns `true` if a ticket was dropped.
    #[tracing::instrument(skip(self))]
    pub fn evict(&self, service: &str) -> bool {
        let entry = self.entries.read().get(service).cloned();
        let dropped = entry.is_some_and(|e| e.current.write().take().is_some());
        if dropped {
            tracing::info!("in-memory ticket evicted");
        }
        dropped
    }

    /// The in-memory ticket for `service`, valid or not.
    #[must_use]
    pub fn cached_ticket(&self, service: &str) -> Option<Arc<Ticket>> {
        self.entries.read().get(service).and_then(|e| e.current.read().clone())
    }

    /// Current counter values.
    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    fn entry(&self, service: &str) -> Arc<ServiceEntry> {
        if let Some(entry) = self.entries.read().get(service) {
            return Arc::clone(entry);
        }
        Arc::clone(self.entries.write().entry(service.to_owned()).or_default())
    }

    fn hit(&self, ticket: Arc<Ticket>, tier: &'static str) -> Credentials {
        if tier == "memory" {
            CacheStats::bump(&self.stats.memory_hits);
        }
        let span = tracing::Span::current();
        span.record("tier", tier);
        span.record("expires_at", tracing::field::display(ticket.expires_at()));
        tracing::debug!(tier, "credentials served");
        Credentials { ticket }
    }

    /// Runs build → sign → exchange → parse for `service`.
    async fn acquire(&self, service: &str) -> Result<Ticket> {
        let request = build_request(service, self.clock.now(), self.request_validity)?;
        let signed = self.signer.sign_base64(&request)?;

        fail_point!("ticket-before-exchange", |_| {
            Err(AuthError::transport("injected failure before login exchange"))
        });

        CacheStats::bump(&self.stats.login_exchanges);
        let raw = tokio::time::timeout(self.login_timeout, self.transport.exchange(&signed))
            .await
            .map_err(|_| AuthError::TransportTimeout { timeout: self.login_timeout })??;

        let ticket = parse_login_response(service, &raw, self.safety_margin)?;

        let now = self.clock.now();
        if !ticket.is_valid_at(now) {
            return Err(AuthError::malformed_ticket(format!(
                "granted ticket expires at {} (after safety margin), not after {now}",
                ticket.expires_at()
            )));
        }

        tracing::info!(expires_at = %ticket.expires_at(), "acquired new ticket");
        Ok(ticket)
    }
}

fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

impl fmt::Debug for TicketCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketCache")
            .field("transport", &self.transport)
            .field("signer", &self.signer)
            .field("clock", &self.clock)
            .field("safety_margin", &self.safety_margin)
            .field("request_validity", &self.request_validity)
            .field("login_timeout", &self.login_timeout)
            .field("services", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialsProvider for TicketCache {
    async fn credentials(&self, service: &str) -> Result<Credentials> {
        self.get_credentials(service).await
    }
}
