//! Shared test utilities for ticket acquisition testing.
//!
//! This module provides self-signed certificate generation, canned login
//! responses, a scriptable [`LoginTransport`], a pass-through signer and a
//! manually driven [`Clock`]. It is feature-gated behind `testutil` to
//! prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! arca-wsaa-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use arca_wsaa_authn::testutil::{ManualClock, MockLoginTransport, StubSigner};
//! ```

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, TimeDelta, Utc};
use openssl::{
    asn1::Asn1Time,
    bn::BigNum,
    hash::MessageDigest,
    pkey::PKey,
    rsa::Rsa,
    x509::{X509Builder, X509NameBuilder},
};
use parking_lot::{Mutex, RwLock};
use zeroize::Zeroizing;

use crate::{
    clock::Clock,
    error::{AuthError, Result},
    signer::RequestSigner,
    transport::LoginTransport,
};

/// PEM-encoded certificate and matching private key.
pub struct SelfSignedIdentity {
    /// X.509 certificate, PEM.
    pub certificate_pem: Vec<u8>,
    /// PKCS#8 RSA private key, PEM.
    pub private_key_pem: Zeroizing<Vec<u8>>,
}

/// Generates a fresh 2048-bit RSA key and a self-signed certificate for it,
/// with `common_name` as subject and issuer, valid for one year.
///
/// # Panics
///
/// Panics if OpenSSL fails, which should not happen with valid inputs.
#[must_use]
pub fn generate_self_signed(common_name: &str) -> SelfSignedIdentity {
    let key = PKey::from_rsa(Rsa::generate(2048).expect("RSA key")).expect("PKey");

    let mut name = X509NameBuilder::new().expect("name builder");
    name.append_entry_by_text("CN", common_name).expect("CN");
    let name = name.build();

    let serial = BigNum::from_u32(1).and_then(|n| n.to_asn1_integer()).expect("serial");
    let not_before = Asn1Time::days_from_now(0).expect("not_before");
    let not_after = Asn1Time::days_from_now(365).expect("not_after");

    let mut builder = X509Builder::new().expect("x509 builder");
    builder.set_version(2).expect("version");
    builder.set_serial_number(&serial).expect("serial number");
    builder.set_subject_name(&name).expect("subject");
    builder.set_issuer_name(&name).expect("issuer");
    builder.set_pubkey(&key).expect("public key");
    builder.set_not_before(&not_before).expect("not_before");
    builder.set_not_after(&not_after).expect("not_after");
    builder.sign(&key, MessageDigest::sha256()).expect("self-sign");
    let certificate = builder.build();

    SelfSignedIdentity {
        certificate_pem: certificate.to_pem().expect("certificate PEM"),
        private_key_pem: Zeroizing::new(key.private_key_to_pem_pkcs8().expect("key PEM")),
    }
}

/// Renders a `loginTicketResponse` document as the authority sends it.
#[must_use]
pub fn login_response_xml(
    generation_time: DateTime<Utc>,
    expiration_time: DateTime<Utc>,
    token: &str,
    sign: &str,
) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <loginTicketResponse version=\"1.0\">\
         <header>\
         <source>CN=wsaahomo, O=AFIP, C=AR, SERIALNUMBER=CUIT 33693450239</source>\
         <destination>SERIALNUMBER=CUIT 20111111112, CN=test</destination>\
         <uniqueId>{}</uniqueId>\
         <generationTime>{}</generationTime>\
         <expirationTime>{}</expirationTime>\
         </header>\
         <credentials><token>{token}</token><sign>{sign}</sign></credentials>\
         </loginTicketResponse>",
        generation_time.timestamp(),
        generation_time.to_rfc3339(),
        expiration_time.to_rfc3339(),
    )
}

/// Extracts `<service>` from a request signed by [`StubSigner`].
#[must_use]
pub fn requested_service(signed_request_b64: &str) -> Option<String> {
    let payload = STANDARD.decode(signed_request_b64).ok()?;
    let payload = String::from_utf8(payload).ok()?;
    let start = payload.find("<service>")? + "<service>".len();
    let end = payload[start..].find("</service>")? + start;
    Some(payload[start..end].to_owned())
}

/// [`Clock`] that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: RwLock::new(now) }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        *self.now.write() += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// [`RequestSigner`] that returns the payload unchanged and counts calls.
#[derive(Debug, Default)]
pub struct StubSigner {
    calls: AtomicUsize,
    fail: std::sync::atomic::AtomicBool,
}

impl StubSigner {
    /// Creates a signer that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent calls fail with [`AuthError::Signing`].
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of sign calls seen.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RequestSigner for StubSigner {
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AuthError::signing("injected signing failure"));
        }
        Ok(payload.to_vec())
    }
}

#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<Result<String>>,
    delay: Option<Duration>,
}

#[derive(Debug)]
struct MockState {
    clock: Arc<dyn Clock>,
    lifetime: TimeDelta,
    default_delay: Mutex<Duration>,
    scripts: Mutex<HashMap<String, Script>>,
    exchanges: AtomicUsize,
    per_service: Mutex<HashMap<String, usize>>,
}

/// Scriptable [`LoginTransport`] for requests signed by [`StubSigner`].
///
/// Unless a response is queued for the requested service, every exchange
/// issues a fresh ticket generated at the clock's current time and expiring
/// `lifetime` later, with token `token-<service>-<n>` where `n` counts the
/// exchanges for that service starting at 1. Clones share all state.
#[derive(Debug, Clone)]
pub struct MockLoginTransport {
    state: Arc<MockState>,
}

impl MockLoginTransport {
    /// Creates a transport issuing tickets that live for `lifetime`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, lifetime: TimeDelta) -> Self {
        Self {
            state: Arc::new(MockState {
                clock,
                lifetime,
                default_delay: Mutex::new(Duration::ZERO),
                scripts: Mutex::new(HashMap::new()),
                exchanges: AtomicUsize::new(0),
                per_service: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Queues a raw response for the next exchange for `service`.
    pub fn push_response(&self, service: &str, raw: impl Into<String>) {
        self.script(service, |s| s.responses.push_back(Ok(raw.into())));
    }

    /// Queues a failure for the next exchange for `service`.
    pub fn push_failure(&self, service: &str, error: AuthError) {
        self.script(service, |s| s.responses.push_back(Err(error)));
    }

    /// Delays every exchange by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.state.default_delay.lock() = delay;
    }

    /// Delays exchanges for `service` by `delay`, overriding [`set_delay`](Self::set_delay).
    pub fn set_delay_for(&self, service: &str, delay: Duration) {
        self.script(service, |s| s.delay = Some(delay));
    }

    /// Total exchanges started, including failed and timed-out ones.
    #[must_use]
    pub fn exchange_count(&self) -> usize {
        self.state.exchanges.load(Ordering::SeqCst)
    }

    /// Exchanges started for `service`.
    #[must_use]
    pub fn exchange_count_for(&self, service: &str) -> usize {
        self.state.per_service.lock().get(service).copied().unwrap_or(0)
    }

    fn script(&self, service: &str, f: impl FnOnce(&mut Script)) {
        f(self.state.scripts.lock().entry(service.to_owned()).or_default());
    }
}

#[async_trait]
impl LoginTransport for MockLoginTransport {
    async fn exchange(&self, signed_request_b64: &str) -> Result<String> {
        self.state.exchanges.fetch_add(1, Ordering::SeqCst);
        let service = requested_service(signed_request_b64)
            .ok_or_else(|| AuthError::transport("mock transport could not read the request"))?;
        let n = {
            let mut counts = self.state.per_service.lock();
            let count = counts.entry(service.clone()).or_default();
            *count += 1;
            *count
        };

        let (scripted, delay) = {
            let mut scripts = self.state.scripts.lock();
            let script = scripts.entry(service.clone()).or_default();
            (script.responses.pop_front(), script.delay)
        };
        let delay = delay.unwrap_or_else(|| *self.state.default_delay.lock());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        scripted.unwrap_or_else(|| {
            let now = self.state.clock.now();
            Ok(login_response_xml(
                now,
                now + self.state.lifetime,
                &format!("token-{service}-{n}"),
                &format!("sign-{service}-{n}"),
            ))
        })
    }
}

/// Asserts that a [`Result`](crate::Result) is an `Err` matching the given
/// [`AuthError`] variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use arca_wsaa_authn::{AuthError, assert_auth_error};
///
/// let result: arca_wsaa_authn::Result<()> = Err(AuthError::transport("refused"));
/// assert_auth_error!(result, Transport);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
}
