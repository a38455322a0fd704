//! Fuzz target for login response parsing.
//!
//! Feeds arbitrary byte strings to the SOAP response reader and to the
//! ticket response parser. Every result must be either `Ok(...)` or
//! `Err(AuthError)`; any ticket that parses must satisfy its invariants.

#![no_main]

use std::time::Duration;

use arca_wsaa_authn::{soap::parse_login_cms_response, ticket::parse_login_response};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Responses are XML text; non-UTF-8 input never reaches the parsers
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    // The SOAP layer must not panic on any input
    if let Ok(inner) = parse_login_cms_response(raw) {
        let _ = parse_login_response("wsfe", &inner, Duration::from_secs(600));
    }

    if let Ok(ticket) = parse_login_response("wsfe", raw, Duration::from_secs(600)) {
        assert!(!ticket.token().trim().is_empty());
        assert!(!ticket.sign().trim().is_empty());
        assert!(ticket.expires_at() <= ticket.server_expires_at());
        assert_eq!(ticket.raw_response(), raw);
    }
});
