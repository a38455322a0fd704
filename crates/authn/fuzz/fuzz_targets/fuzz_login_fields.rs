//! Structured fuzz target for login ticket responses.
//!
//! Uses the `arbitrary` crate to generate plausible `loginTicketResponse`
//! documents with fuzzed field contents, reaching the timestamp and
//! credential checks that raw byte fuzzing rarely gets past.

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use arca_wsaa_authn::ticket::{is_valid, parse_login_response};
use chrono::DateTime;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzedResponse {
    generation_time: Option<String>,
    expiration_time: FuzzedTimestamp,
    token: String,
    sign: String,
    /// Safety margin in seconds
    margin: u32,
    /// Wrap the credentials in a namespaced envelope
    namespaced: bool,
    /// Seconds since the epoch at which validity is checked
    check_at: i64,
}

#[derive(Debug, Arbitrary)]
enum FuzzedTimestamp {
    /// Seconds since the epoch, rendered as RFC 3339
    Epoch(i64),
    /// Arbitrary text
    Raw(String),
}

fuzz_target!(|input: FuzzedResponse| {
    let expiration = match &input.expiration_time {
        FuzzedTimestamp::Epoch(secs) => match DateTime::from_timestamp(*secs, 0) {
            Some(at) => at.to_rfc3339(),
            None => return,
        },
        FuzzedTimestamp::Raw(text) => text.clone(),
    };
    let generation = input
        .generation_time
        .as_deref()
        .map(|g| format!("<generationTime>{g}</generationTime>"))
        .unwrap_or_default();
    let prefix = if input.namespaced { "ns1:" } else { "" };

    let raw = format!(
        "<{prefix}loginTicketResponse><{prefix}header>{generation}\
         <{prefix}expirationTime>{expiration}</{prefix}expirationTime></{prefix}header>\
         <{prefix}credentials><{prefix}token>{}</{prefix}token><{prefix}sign>{}</{prefix}sign>\
         </{prefix}credentials></{prefix}loginTicketResponse>",
        input.token, input.sign,
    );

    let margin = Duration::from_secs(u64::from(input.margin));
    if let Ok(ticket) = parse_login_response("wsfe", &raw, margin) {
        assert!(ticket.expires_at() <= ticket.server_expires_at());
        if let Some(at) = DateTime::from_timestamp(input.check_at, 0) {
            assert_eq!(is_valid(&ticket, at), at < ticket.expires_at());
        }
    }
});
