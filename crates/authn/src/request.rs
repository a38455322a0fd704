//! Ticket request (TRA) construction.
//!
//! A ticket request is a small XML document naming the target service and
//! the validity window the caller asks the authority to honor:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <loginTicketRequest version="1.0">
//!   <header>
//!     <uniqueId>1792238400</uniqueId>
//!     <generationTime>2026-10-17T12:00:00Z</generationTime>
//!     <expirationTime>2026-10-18T00:00:00Z</expirationTime>
//!   </header>
//!   <service>wsfe</service>
//! </loginTicketRequest>
//! ```
//!
//! The authority decides the granted expiration; the requested window is
//! only an upper bound.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesText, Event},
};

use crate::error::{AuthError, Result};

/// Serializes a ticket request for `service`, generated at `now` and asking
/// for `validity` of lifetime.
///
/// The output depends only on the arguments.
///
/// # Errors
///
/// Returns [`AuthError::InvalidRequest`] if `service` is empty or if `now`
/// or `now + validity` cannot be represented.
pub fn build_request(service: &str, now: DateTime<Utc>, validity: Duration) -> Result<Vec<u8>> {
    if service.trim().is_empty() {
        return Err(AuthError::invalid_request("service name cannot be empty"));
    }

    let unique_id = u32::try_from(now.timestamp()).map_err(|_| {
        AuthError::invalid_request(format!("{now} cannot be expressed as a request id"))
    })?;
    let expiration = TimeDelta::from_std(validity)
        .ok()
        .and_then(|validity| now.checked_add_signed(validity))
        .ok_or_else(|| {
            AuthError::invalid_request(format!("validity {validity:?} overflows the window"))
        })?;

    let unique_id = unique_id.to_string();
    let generation_time = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let expiration_time = expiration.to_rfc3339_opts(SecondsFormat::Secs, true);

    let xml_error = |err: quick_xml::Error| {
        AuthError::invalid_request(format!("serializing ticket request: {err}"))
    };

    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None))).map_err(xml_error)?;
    writer
        .create_element("loginTicketRequest")
        .with_attribute(("version", "1.0"))
        .write_inner_content(|w| {
            w.create_element("header").write_inner_content(|w| {
                w.create_element("uniqueId").write_text_content(BytesText::new(&unique_id))?;
                w.create_element("generationTime")
                    .write_text_content(BytesText::new(&generation_time))?;
                w.create_element("expirationTime")
                    .write_text_content(BytesText::new(&expiration_time))?;
                Ok::<(), quick_xml::Error>(())
            })?;
            w.create_element("service").write_text_content(BytesText::new(service))?;
            Ok(())
        })
        .map_err(xml_error)?;

    Ok(writer.into_inner())
}
