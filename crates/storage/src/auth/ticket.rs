//! Access ticket issued by the WSAA login service.

use std::{fmt, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{StorageError, StorageResult};

/// Short-lived credential pair authorizing calls to one ARCA web service.
///
/// A ticket is created only by parsing a login response, is immutable after
/// construction and is superseded (never mutated) by a newly requested one.
///
/// # Expiry
///
/// The login authority declares an absolute `expirationTime`. The ticket
/// keeps that instant as [`server_expires_at`](Self::server_expires_at) and
/// derives [`expires_at`](Self::expires_at) by subtracting a safety margin,
/// so renewal happens before the server-side deadline.
///
/// # Invariants
///
/// - `token` and `sign` are both non-empty
/// - `expires_at <= server_expires_at`
///
/// Both are checked by the builder and again when a persisted ticket is
/// deserialized, so a damaged file can never yield a usable ticket.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use arca_wsaa_storage::auth::Ticket;
/// use chrono::{TimeDelta, Utc};
///
/// let server_deadline = Utc::now() + TimeDelta::hours(12);
/// let ticket = Ticket::builder()
///     .service("wsfe")
///     .raw_response("<loginTicketResponse/>")
///     .server_expires_at(server_deadline)
///     .safety_margin(Duration::from_secs(600))
///     .token("PD94bWwg...")
///     .sign("lNsL3xW...")
///     .build()?;
///
/// assert_eq!(ticket.expires_at(), server_deadline - TimeDelta::minutes(10));
/// assert!(ticket.is_valid_at(Utc::now()));
/// # Ok::<(), arca_wsaa_storage::StorageError>(())
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TicketRecord", into = "TicketRecord")]
pub struct Ticket {
    service: String,
    raw_response: String,
    issued_at: Option<DateTime<Utc>>,
    server_expires_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    token: Zeroizing<String>,
    sign: Zeroizing<String>,
}

#[bon::bon]
impl Ticket {
    /// Creates a ticket, validating the credential invariants.
    ///
    /// # Arguments
    ///
    /// * `service` - Service name the ticket authorizes
    /// * `raw_response` - Verbatim login response, kept for audit
    /// * `issued_at` - Server-declared generation time, if present
    /// * `server_expires_at` - Server-declared expiration time
    /// * `safety_margin` - Subtracted from `server_expires_at` (default: zero)
    /// * `token` - Opaque authorization token
    /// * `sign` - Opaque signature accompanying the token
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidTicket`] if `token` or `sign` is empty
    /// or the safety margin cannot be represented.
    #[builder]
    pub fn new(
        #[builder(into)] service: String,
        #[builder(into)] raw_response: String,
        issued_at: Option<DateTime<Utc>>,
        server_expires_at: DateTime<Utc>,
        #[builder(default = Duration::ZERO)] safety_margin: Duration,
        #[builder(into)] token: String,
        #[builder(into)] sign: String,
    ) -> StorageResult<Self> {
        let expires_at = deadline(server_expires_at, safety_margin)?;

        TicketRecord {
            service,
            raw_response,
            issued_at,
            server_expires_at,
            expires_at,
            token: Zeroizing::new(token),
            sign: Zeroizing::new(sign),
        }
        .try_into()
    }

    /// Returns a copy whose deadline is `server_expires_at - safety_margin`.
    ///
    /// Used when a persisted ticket written under one margin is adopted by a
    /// process configured with another.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidTicket`] if the margin cannot be
    /// represented.
    pub fn with_safety_margin(&self, safety_margin: Duration) -> StorageResult<Self> {
        let expires_at = deadline(self.server_expires_at, safety_margin)?;
        Ok(Self { expires_at, ..self.clone() })
    }

    /// Service name this ticket authorizes.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Verbatim login response the ticket was parsed from.
    #[must_use]
    pub fn raw_response(&self) -> &str {
        &self.raw_response
    }

    /// Server-declared generation time, if the response carried one.
    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    /// Server-declared expiration time.
    #[must_use]
    pub fn server_expires_at(&self) -> DateTime<Utc> {
        self.server_expires_at
    }

    /// Instant after which the ticket must no longer be used.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Authorization token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Authorization signature.
    #[must_use]
    pub fn sign(&self) -> &str {
        &self.sign
    }

    /// Returns `true` while `now < expires_at`.
    ///
    /// The boundary instant itself counts as expired.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Time left until [`expires_at`](Self::expires_at), or `None` once expired.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.expires_at - now).to_std().ok().filter(|d| !d.is_zero())
    }
}

fn deadline(
    server_expires_at: DateTime<Utc>,
    safety_margin: Duration,
) -> StorageResult<DateTime<Utc>> {
    let margin = TimeDelta::from_std(safety_margin)
        .map_err(|_| StorageError::invalid_ticket("safety margin out of range"))?;
    server_expires_at
        .checked_sub_signed(margin)
        .ok_or_else(|| StorageError::invalid_ticket("expiry underflows after safety margin"))
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket")
            .field("service", &self.service)
            .field("issued_at", &self.issued_at)
            .field("server_expires_at", &self.server_expires_at)
            .field("expires_at", &self.expires_at)
            .field("token", &"<redacted>")
            .field("sign", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// On-disk representation of a [`Ticket`].
///
/// Both expiry instants are stored. A reader configured with a different
/// safety margin rederives the deadline with [`Ticket::with_safety_margin`].
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TicketRecord {
    service: String,
    raw_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issued_at: Option<DateTime<Utc>>,
    server_expires_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    token: Zeroizing<String>,
    sign: Zeroizing<String>,
}

impl TryFrom<TicketRecord> for Ticket {
    type Error = StorageError;

    fn try_from(record: TicketRecord) -> StorageResult<Self> {
        if record.token.trim().is_empty() {
            return Err(StorageError::invalid_ticket("token is empty"));
        }
        if record.sign.trim().is_empty() {
            return Err(StorageError::invalid_ticket("sign is empty"));
        }
        if record.expires_at > record.server_expires_at {
            return Err(StorageError::invalid_ticket("expires_at is after the server deadline"));
        }

        Ok(Self {
            service: record.service,
            raw_response: record.raw_response,
            issued_at: record.issued_at,
            server_expires_at: record.server_expires_at,
            expires_at: record.expires_at,
            token: record.token,
            sign: record.sign,
        })
    }
}

impl From<Ticket> for TicketRecord {
    fn from(ticket: Ticket) -> Self {
        Self {
            service: ticket.service,
            raw_response: ticket.raw_response,
            issued_at: ticket.issued_at,
            server_expires_at: ticket.server_expires_at,
            expires_at: ticket.expires_at,
            token: ticket.token,
            sign: ticket.sign,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).single().expect("valid date")
    }

    fn ticket_expiring(server_expires_at: DateTime<Utc>, margin: Duration) -> Ticket {
        Ticket::builder()
            .service("wsfe")
            .raw_response("<loginTicketResponse/>")
            .server_expires_at(server_expires_at)
            .safety_margin(margin)
            .token("tok")
            .sign("sig")
            .build()
            .expect("valid ticket")
    }

    #[test]
    fn test_safety_margin_moves_deadline_earlier() {
        let t = base_time();
        let ticket = ticket_expiring(t + TimeDelta::hours(11), Duration::from_secs(600));

        assert_eq!(ticket.server_expires_at(), t + TimeDelta::hours(11));
        assert_eq!(ticket.expires_at(), t + TimeDelta::hours(10) + TimeDelta::minutes(50));
    }

    #[rstest]
    #[case::well_before(TimeDelta::hours(10) + TimeDelta::minutes(49), true)]
    #[case::exact_boundary(TimeDelta::hours(10) + TimeDelta::minutes(50), false)]
    #[case::after_margin(TimeDelta::hours(10) + TimeDelta::minutes(51), false)]
    #[case::after_server_deadline(TimeDelta::hours(12), false)]
    fn test_validity_around_deadline(#[case] offset: TimeDelta, #[case] expected: bool) {
        let t = base_time();
        let ticket = ticket_expiring(t + TimeDelta::hours(11), Duration::from_secs(600));

        assert_eq!(ticket.is_valid_at(t + offset), expected);
    }

    #[rstest]
    #[case::empty_token("", "sig")]
    #[case::blank_token("   ", "sig")]
    #[case::empty_sign("tok", "")]
    fn test_builder_rejects_missing_credentials(#[case] token: &str, #[case] sign: &str) {
        let result = Ticket::builder()
            .service("wsfe")
            .raw_response("")
            .server_expires_at(base_time())
            .token(token)
            .sign(sign)
            .build();

        assert!(matches!(result, Err(StorageError::InvalidTicket { .. })));
    }

    #[test]
    fn test_with_safety_margin_rederives_deadline() {
        let t = base_time();
        let written = ticket_expiring(t + TimeDelta::hours(1), Duration::ZERO);

        let widened = written.with_safety_margin(Duration::from_secs(1800)).expect("margin");

        assert_eq!(widened.server_expires_at(), written.server_expires_at());
        assert_eq!(widened.expires_at(), t + TimeDelta::minutes(30));
        assert_eq!(widened.token(), written.token());
        assert!(written.is_valid_at(t + TimeDelta::minutes(45)));
        assert!(!widened.is_valid_at(t + TimeDelta::minutes(45)));
    }

    #[test]
    fn test_remaining_at() {
        let t = base_time();
        let ticket = ticket_expiring(t + TimeDelta::hours(1), Duration::ZERO);

        assert_eq!(ticket.remaining_at(t), Some(Duration::from_secs(3600)));
        assert_eq!(ticket.remaining_at(t + TimeDelta::hours(1)), None);
        assert_eq!(ticket.remaining_at(t + TimeDelta::hours(2)), None);
    }

    #[test]
    fn test_serde_round_trip_keeps_fields() {
        let ticket = ticket_expiring(base_time(), Duration::from_secs(600));

        let json = serde_json::to_string(&ticket).expect("serialize");
        let restored: Ticket = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(restored, ticket);
        assert_eq!(restored.token(), "tok");
        assert_eq!(restored.sign(), "sig");
        assert_eq!(restored.expires_at(), ticket.expires_at());
    }

    #[test]
    fn test_deserialize_rejects_empty_token() {
        let ticket = ticket_expiring(base_time(), Duration::ZERO);
        let mut value = serde_json::to_value(&ticket).expect("serialize");
        value["token"] = serde_json::Value::String(String::new());

        let result: Result<Ticket, _> = serde_json::from_value(value);
        assert!(result.is_err(), "ticket with empty token must not deserialize");
    }

    #[test]
    fn test_deserialize_rejects_expiry_after_server_deadline() {
        let ticket = ticket_expiring(base_time(), Duration::ZERO);
        let mut value = serde_json::to_value(&ticket).expect("serialize");
        value["expires_at"] =
            serde_json::to_value(base_time() + TimeDelta::minutes(1)).expect("serialize time");

        let result: Result<Ticket, _> = serde_json::from_value(value);
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let ticket = ticket_expiring(base_time(), Duration::ZERO);
        let debug = format!("{ticket:?}");

        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("tok\""), "token leaked into Debug: {debug}");
        assert!(!debug.contains("sig\""), "sign leaked into Debug: {debug}");
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            /// A ticket is valid strictly before its deadline and invalid from
            /// the deadline onwards.
            #[test]
            fn validity_matches_strict_ordering(
                deadline_offset in -86_400i64..86_400,
                now_offset in -86_400i64..86_400,
                margin_secs in 0u64..7_200,
            ) {
                let t = base_time();
                let ticket = ticket_expiring(
                    t + TimeDelta::seconds(deadline_offset),
                    Duration::from_secs(margin_secs),
                );
                let now = t + TimeDelta::seconds(now_offset);

                prop_assert_eq!(ticket.is_valid_at(now), now < ticket.expires_at());
            }
        }
    }
}
