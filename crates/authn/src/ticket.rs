//! Login ticket response parsing and validity.
//!
//! The authority answers a ticket request with a `loginTicketResponse`
//! document:
//!
//! ```xml
//! <loginTicketResponse version="1.0">
//!   <header>
//!     <source>CN=wsaahomo, O=AFIP, C=AR, SERIALNUMBER=CUIT 33693450239</source>
//!     <destination>SERIALNUMBER=CUIT 20111111112, CN=app</destination>
//!     <uniqueId>3924893342</uniqueId>
//!     <generationTime>2026-10-17T09:00:00.000-03:00</generationTime>
//!     <expirationTime>2026-10-17T21:00:00.000-03:00</expirationTime>
//!   </header>
//!   <credentials>
//!     <token>PD94bWwg...</token>
//!     <sign>cGfBL8Dw...</sign>
//!   </credentials>
//! </loginTicketResponse>
//! ```
//!
//! Only `expirationTime`, `token` and `sign` are required. Elements are
//! matched by local name wherever they appear.

use std::time::Duration;

use arca_wsaa_storage::{StorageError, Ticket};
use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::{Reader, events::Event};

use crate::error::{AuthError, Result};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Field {
    GenerationTime,
    ExpirationTime,
    Token,
    Sign,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"generationTime" => Some(Self::GenerationTime),
            b"expirationTime" => Some(Self::ExpirationTime),
            b"token" => Some(Self::Token),
            b"sign" => Some(Self::Sign),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::GenerationTime => "generationTime",
            Self::ExpirationTime => "expirationTime",
            Self::Token => "token",
            Self::Sign => "sign",
        }
    }
}

#[derive(Default)]
struct Fields {
    generation_time: Option<String>,
    expiration_time: Option<String>,
    token: Option<String>,
    sign: Option<String>,
}

impl Fields {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::GenerationTime => &mut self.generation_time,
            Field::ExpirationTime => &mut self.expiration_time,
            Field::Token => &mut self.token,
            Field::Sign => &mut self.sign,
        }
    }
}

/// Parses a login ticket response into a [`Ticket`] for `service`.
///
/// The ticket's usable deadline is the declared `expirationTime` minus
/// `safety_margin`. The response text is kept verbatim on the ticket.
///
/// # Errors
///
/// Returns [`AuthError::MalformedTicket`] if the document is not XML, a
/// required element is missing, empty or repeated, or a timestamp cannot be
/// parsed.
pub fn parse_login_response(service: &str, raw: &str, safety_margin: Duration) -> Result<Ticket> {
    let fields = extract_fields(raw)?;

    let expiration_time = fields
        .expiration_time
        .ok_or_else(|| AuthError::malformed_ticket("missing <expirationTime>"))?;
    let token = fields.token.ok_or_else(|| AuthError::malformed_ticket("missing <token>"))?;
    let sign = fields.sign.ok_or_else(|| AuthError::malformed_ticket("missing <sign>"))?;

    let server_expires_at = parse_timestamp(&expiration_time)?;
    let issued_at = fields.generation_time.as_deref().map(parse_timestamp).transpose()?;

    Ticket::builder()
        .service(service)
        .raw_response(raw)
        .maybe_issued_at(issued_at)
        .server_expires_at(server_expires_at)
        .safety_margin(safety_margin)
        .token(token)
        .sign(sign)
        .build()
        .map_err(|err| match err {
            StorageError::InvalidTicket { message } => AuthError::malformed_ticket(message),
            other => AuthError::Persistence(other),
        })
}

/// Reports whether `ticket` may be used at `now`.
///
/// A ticket is valid strictly before its deadline; at the deadline itself
/// it is already invalid.
#[must_use]
pub fn is_valid(ticket: &Ticket, now: DateTime<Utc>) -> bool {
    ticket.is_valid_at(now)
}

fn extract_fields(raw: &str) -> Result<Fields> {
    let mut reader = Reader::from_str(raw);
    reader.trim_text(true);

    let mut fields = Fields::default();
    let mut current: Option<Field> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| AuthError::malformed_ticket(format!("invalid XML: {err}")))?;
        match event {
            Event::Start(e) => {
                current = Field::from_local_name(e.local_name().as_ref());
                if let Some(field) = current
                    && fields.slot(field).is_some()
                {
                    return Err(AuthError::malformed_ticket(format!(
                        "repeated <{}>",
                        field.name()
                    )));
                }
            },
            Event::End(_) => current = None,
            Event::Text(t) => {
                if let Some(field) = current {
                    let text = t.unescape().map_err(|err| invalid_text(field, err))?;
                    fields.slot(field).get_or_insert_with(String::new).push_str(&text);
                }
            },
            Event::CData(c) => {
                if let Some(field) = current {
                    let text = std::str::from_utf8(&c).map_err(|err| invalid_text(field, err))?;
                    fields.slot(field).get_or_insert_with(String::new).push_str(text);
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(fields)
}

fn invalid_text(field: Field, err: impl std::fmt::Display) -> AuthError {
    AuthError::malformed_ticket(format!("invalid <{}> text: {err}", field.name()))
}

/// Parses an RFC 3339 timestamp; timestamps without an offset are UTC.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc())
        })
        .map_err(|err| {
            AuthError::malformed_ticket(format!("unparseable timestamp {value:?}: {err}"))
        })
}
