//! SOAP 1.1 framing of the `loginCms` operation.
//!
//! The login authority exposes one operation, `loginCms(in0)`, where `in0`
//! is the base64 CMS envelope and the result, `loginCmsReturn`, is the
//! ticket response XML carried as escaped text. Failures come back as SOAP
//! faults:
//!
//! ```xml
//! <soapenv:Fault>
//!   <faultcode>ns1:coe.alreadyAuthenticated</faultcode>
//!   <faultstring>El CEE ya posee un TA valido para el acceso al WSN solicitado</faultstring>
//! </soapenv:Fault>
//! ```

use quick_xml::{
    Reader, Writer,
    events::{BytesDecl, BytesText, Event},
};

use crate::error::{AuthError, Result};

/// SOAP 1.1 envelope namespace.
pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Namespace of the `loginCms` operation.
pub const WSAA_NS: &str = "http://wsaa.view.sua.dvadac.desein.afip.gov";

/// Wraps a base64 CMS envelope in a `loginCms` SOAP request.
///
/// # Errors
///
/// Returns [`AuthError::Transport`] if the envelope cannot be serialized.
pub fn login_cms_envelope(signed_request_b64: &str) -> Result<String> {
    let xml_error =
        |err: quick_xml::Error| AuthError::transport_with_source("serializing SOAP request", err);

    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None))).map_err(xml_error)?;
    writer
        .create_element("soapenv:Envelope")
        .with_attributes([("xmlns:soapenv", SOAP_ENVELOPE_NS), ("xmlns:wsaa", WSAA_NS)])
        .write_inner_content(|w| {
            w.create_element("soapenv:Header").write_empty()?;
            w.create_element("soapenv:Body").write_inner_content(|w| {
                w.create_element("wsaa:loginCms").write_inner_content(|w| {
                    w.create_element("wsaa:in0")
                        .write_text_content(BytesText::new(signed_request_b64))?;
                    Ok::<(), quick_xml::Error>(())
                })?;
                Ok::<(), quick_xml::Error>(())
            })?;
            Ok(())
        })
        .map_err(xml_error)?;

    String::from_utf8(writer.into_inner())
        .map_err(|err| AuthError::transport_with_source("SOAP request is not UTF-8", err))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Return,
    FaultCode,
    FaultString,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"loginCmsReturn" => Some(Self::Return),
            b"faultcode" => Some(Self::FaultCode),
            b"faultstring" => Some(Self::FaultString),
            _ => None,
        }
    }
}

/// Extracts the ticket response XML from a `loginCms` SOAP response.
///
/// Elements are matched by local name, so any namespace prefixes work.
///
/// # Errors
///
/// - [`AuthError::LoginRejected`] if the body carries a SOAP fault
/// - [`AuthError::Transport`] if the body is not XML or lacks
///   `loginCmsReturn`
pub fn parse_login_cms_response(body: &str) -> Result<String> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut current: Option<Field> = None;
    let mut login_return: Option<String> = None;
    let mut fault_code: Option<String> = None;
    let mut fault_string: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| AuthError::transport_with_source("malformed SOAP response", err))?;
        let text = match event {
            Event::Start(e) => {
                current = Field::from_local_name(e.local_name().as_ref());
                continue;
            },
            Event::End(_) => {
                current = None;
                continue;
            },
            Event::Text(t) if current.is_some() => t
                .unescape()
                .map_err(|err| AuthError::transport_with_source("malformed SOAP text", err))?
                .into_owned(),
            Event::CData(c) if current.is_some() => String::from_utf8(c.into_inner().into_owned())
                .map_err(|err| AuthError::transport_with_source("SOAP CDATA is not UTF-8", err))?,
            Event::Eof => break,
            _ => continue,
        };

        let slot = match current {
            Some(Field::Return) => &mut login_return,
            Some(Field::FaultCode) => &mut fault_code,
            Some(Field::FaultString) => &mut fault_string,
            None => continue,
        };
        slot.get_or_insert_with(String::new).push_str(&text);
    }

    if fault_code.is_some() || fault_string.is_some() {
        return Err(AuthError::login_rejected(
            fault_code.unwrap_or_default(),
            fault_string.unwrap_or_default(),
        ));
    }

    login_return.ok_or_else(|| AuthError::transport("SOAP response lacks loginCmsReturn"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_carries_payload() {
        let envelope = login_cms_envelope("TUlJR...==").expect("envelope");

        assert!(envelope.contains(r#"xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/""#));
        assert!(envelope.contains(r#"xmlns:wsaa="http://wsaa.view.sua.dvadac.desein.afip.gov""#));
        assert!(envelope.contains("<wsaa:loginCms><wsaa:in0>TUlJR...==</wsaa:in0></wsaa:loginCms>"));
    }

    #[test]
    fn test_parse_escaped_return() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
            <soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
              <soapenv:Body>
                <loginCmsResponse xmlns="http://wsaa.view.sua.dvadac.desein.afip.gov">
                  <loginCmsReturn>&lt;loginTicketResponse&gt;&lt;credentials&gt;&lt;token&gt;T&lt;/token&gt;&lt;/credentials&gt;&lt;/loginTicketResponse&gt;</loginCmsReturn>
                </loginCmsResponse>
              </soapenv:Body>
            </soapenv:Envelope>"#;

        let inner = parse_login_cms_response(body).expect("return");
        assert_eq!(
            inner,
            "<loginTicketResponse><credentials><token>T</token></credentials></loginTicketResponse>"
        );
    }

    #[test]
    fn test_parse_cdata_return() {
        let body = r#"<Envelope><Body><loginCmsResponse><ns:loginCmsReturn xmlns:ns="x"><![CDATA[<loginTicketResponse/>]]></ns:loginCmsReturn></loginCmsResponse></Body></Envelope>"#;

        assert_eq!(parse_login_cms_response(body).expect("return"), "<loginTicketResponse/>");
    }

    #[test]
    fn test_parse_fault() {
        let body = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
              <soapenv:Body>
                <soapenv:Fault>
                  <faultcode xmlns:ns1="http://xml.apache.org/axis/">ns1:coe.alreadyAuthenticated</faultcode>
                  <faultstring>El CEE ya posee un TA valido para el acceso al WSN solicitado</faultstring>
                </soapenv:Fault>
              </soapenv:Body>
            </soapenv:Envelope>"#;

        match parse_login_cms_response(body) {
            Err(AuthError::LoginRejected { code, message }) => {
                assert_eq!(code, "ns1:coe.alreadyAuthenticated");
                assert!(message.starts_with("El CEE ya posee un TA valido"));
            },
            other => panic!("expected LoginRejected, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_missing_return() {
        let body = "<Envelope><Body><loginCmsResponse/></Body></Envelope>";
        let result = parse_login_cms_response(body);
        assert!(matches!(result, Err(AuthError::Transport { .. })), "got {result:?}");
    }

    #[test]
    fn test_parse_non_xml() {
        let result = parse_login_cms_response("<html><body>502 Bad Gateway</body>");
        assert!(result.is_err());
        assert!(result.unwrap_err().is_transport());
    }
}
