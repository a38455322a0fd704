//! CMS signing of ticket requests.
//!
//! The login authority accepts a ticket request only as a base64-encoded,
//! DER-serialized CMS `SignedData` envelope that carries the request itself,
//! signed with the private key of a certificate registered for the caller.
//!
//! # Envelope
//!
//! - Content: attached (the request XML travels inside the envelope)
//! - Digest: SHA-256 (OpenSSL default for RSA keys)
//! - Signer certificate: included
//! - S/MIME capabilities attribute: omitted
//! - Encoding: DER, then standard base64 with padding

use std::{fmt, path::Path};

use base64::{Engine, engine::general_purpose::STANDARD};
use openssl::{
    pkcs7::{Pkcs7, Pkcs7Flags},
    pkey::{PKey, Private},
    stack::Stack,
    x509::X509,
};
use zeroize::Zeroizing;

use crate::error::{AuthError, Result};

/// Produces the signed envelope for a serialized ticket request.
///
/// Implementations must be deterministic in their inputs apart from
/// signing-time attributes; they perform no I/O per call.
pub trait RequestSigner: Send + Sync + fmt::Debug {
    /// Signs `payload` and returns the DER-encoded envelope.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if the envelope cannot be produced.
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>>;

    /// Signs `payload` and returns the envelope as standard base64.
    ///
    /// # Errors
    ///
    /// Same as [`sign`](Self::sign).
    fn sign_base64(&self, payload: &[u8]) -> Result<String> {
        Ok(STANDARD.encode(self.sign(payload)?))
    }
}

/// [`RequestSigner`] backed by an X.509 certificate and its RSA private key.
///
/// Both are loaded once, at construction; a key that does not match the
/// certificate is rejected there rather than on the first login.
///
/// # Examples
///
/// ```no_run
/// use arca_wsaa_authn::signer::{CmsSigner, RequestSigner};
///
/// let signer = CmsSigner::from_pem_files("data/cert.pem", "data/key.pem")?;
/// let envelope = signer.sign_base64(b"<loginTicketRequest/>")?;
/// # Ok::<(), arca_wsaa_authn::AuthError>(())
/// ```
pub struct CmsSigner {
    certificate: X509,
    private_key: PKey<Private>,
}

impl CmsSigner {
    /// Loads a PEM certificate and PEM private key from disk.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if either file is unreadable or
    /// malformed, or if the key does not belong to the certificate.
    pub fn from_pem_files(
        certificate_path: impl AsRef<Path>,
        private_key_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let certificate_path = certificate_path.as_ref();
        let private_key_path = private_key_path.as_ref();

        let certificate = std::fs::read(certificate_path).map_err(|err| {
            AuthError::signing_with_source(
                format!("reading certificate {}", certificate_path.display()),
                err,
            )
        })?;
        let private_key = Zeroizing::new(std::fs::read(private_key_path).map_err(|err| {
            AuthError::signing_with_source(
                format!("reading private key {}", private_key_path.display()),
                err,
            )
        })?);

        Self::from_pem(&certificate, &private_key)
    }

    /// Builds a signer from in-memory PEM data.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if either input is malformed or the key
    /// does not belong to the certificate.
    pub fn from_pem(certificate_pem: &[u8], private_key_pem: &[u8]) -> Result<Self> {
        let certificate = X509::from_pem(certificate_pem)
            .map_err(|err| AuthError::signing_with_source("malformed PEM certificate", err))?;
        let private_key = PKey::private_key_from_pem(private_key_pem)
            .map_err(|err| AuthError::signing_with_source("malformed PEM private key", err))?;

        let public_key = certificate.public_key()?;
        if !public_key.public_eq(&private_key) {
            return Err(AuthError::signing("private key does not match the certificate"));
        }

        Ok(Self { certificate, private_key })
    }

    /// The signing certificate.
    #[must_use]
    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }
}

impl RequestSigner for CmsSigner {
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let extra_certs: Stack<X509> = Stack::new()?;
        let envelope = Pkcs7::sign(
            &self.certificate,
            &self.private_key,
            &extra_certs,
            payload,
            Pkcs7Flags::BINARY | Pkcs7Flags::NOSMIMECAP,
        )
        .map_err(|err| AuthError::signing_with_source("building CMS envelope", err))?;

        envelope
            .to_der()
            .map_err(|err| AuthError::signing_with_source("encoding CMS envelope", err))
    }
}

impl fmt::Debug for CmsSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = self
            .certificate
            .subject_name()
            .entries()
            .filter_map(|entry| entry.data().as_utf8().ok().map(|s| s.to_string()))
            .collect::<Vec<_>>()
            .join(", ");
        f.debug_struct("CmsSigner")
            .field("subject", &subject)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use openssl::x509::store::X509StoreBuilder;

    use super::*;
    use crate::testutil::generate_self_signed;

    fn open_envelope(der: &[u8]) -> Vec<u8> {
        let envelope = Pkcs7::from_der(der).expect("valid DER");
        let store = X509StoreBuilder::new().expect("store builder").build();
        let certs: Stack<X509> = Stack::new().expect("stack");
        let mut content = Vec::new();
        envelope
            .verify(&certs, &store, None, Some(&mut content), Pkcs7Flags::NOVERIFY)
            .expect("signature verifies");
        content
    }

    #[test]
    fn test_sign_attaches_payload() {
        let identity = generate_self_signed("wsaa-signer-test");
        let signer = CmsSigner::from_pem(&identity.certificate_pem, &identity.private_key_pem)
            .expect("signer");

        let payload = b"<loginTicketRequest version=\"1.0\"/>";
        let der = signer.sign(payload).expect("sign");

        assert_eq!(open_envelope(&der), payload);
    }

    #[test]
    fn test_sign_base64_decodes_to_der() {
        let identity = generate_self_signed("wsaa-signer-test");
        let signer = CmsSigner::from_pem(&identity.certificate_pem, &identity.private_key_pem)
            .expect("signer");

        let encoded = signer.sign_base64(b"payload").expect("sign");
        let der = STANDARD.decode(encoded).expect("standard base64");

        assert_eq!(open_envelope(&der), b"payload");
    }

    #[test]
    fn test_sign_uses_sha256_digest() {
        // DER-encoded OBJECT IDENTIFIERs for id-sha256 and id-sha1
        const SHA256_OID: &[u8] =
            &[0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];
        const SHA1_OID: &[u8] = &[0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a];

        let identity = generate_self_signed("wsaa-digest-test");
        let signer = CmsSigner::from_pem(&identity.certificate_pem, &identity.private_key_pem)
            .expect("signer");

        let der = signer.sign(b"<loginTicketRequest/>").expect("sign");
        let contains = |needle: &[u8]| der.windows(needle.len()).any(|w| w == needle);

        assert!(contains(SHA256_OID), "envelope must declare a SHA-256 digest");
        assert!(!contains(SHA1_OID), "envelope must not use SHA-1");
    }

    #[test]
    fn test_mismatched_key_rejected() {
        let a = generate_self_signed("a");
        let b = generate_self_signed("b");

        let result = CmsSigner::from_pem(&a.certificate_pem, &b.private_key_pem);
        assert!(matches!(result, Err(AuthError::Signing { .. })), "got {result:?}");
    }

    #[test]
    fn test_malformed_pem_rejected() {
        let identity = generate_self_signed("a");

        let result = CmsSigner::from_pem(b"not a certificate", &identity.private_key_pem);
        assert!(matches!(result, Err(AuthError::Signing { .. })));

        let result = CmsSigner::from_pem(&identity.certificate_pem, b"not a key");
        assert!(matches!(result, Err(AuthError::Signing { .. })));
    }

    #[test]
    fn test_from_pem_files() {
        let identity = generate_self_signed("files");
        let dir = tempfile::tempdir().expect("tempdir");
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, &identity.certificate_pem).expect("write cert");
        std::fs::write(&key, &identity.private_key_pem).expect("write key");

        let signer = CmsSigner::from_pem_files(&cert, &key).expect("signer");
        assert!(signer.sign(b"x").is_ok());

        let missing = CmsSigner::from_pem_files(dir.path().join("nope.pem"), &key);
        assert!(matches!(missing, Err(AuthError::Signing { .. })));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let identity = generate_self_signed("debug-subject");
        let signer = CmsSigner::from_pem(&identity.certificate_pem, &identity.private_key_pem)
            .expect("signer");

        let debug = format!("{signer:?}");
        assert!(debug.contains("debug-subject"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("PRIVATE KEY"));
    }
}
