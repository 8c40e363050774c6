//! Self-signed X.509 certificate generation for signing fixtures.
//!
//! Produces the RSA key pair and self-signed certificate a test key
//! store needs. Generated certificates are verified against their own
//! public key before they are handed out; a verification failure is a
//! propagated [`Error::Certificate`], never a process exit.

use crate::{Error, Result};
use const_oid::db::rfc5280::{ID_KP_CLIENT_AUTH, ID_KP_SERVER_AUTH};
use const_oid::ObjectIdentifier;
use der::asn1::{GeneralizedTime, OctetString, UtcTime};
use der::{Decode, Encode};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::EncodePublicKey;
use rsa::signature::Verifier;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::ext::pkix::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages, SubjectKeyIdentifier,
};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::{Time, Validity};
use x509_cert::Certificate;

const SECONDS_PER_DAY: u64 = 86_400;

// 2.5.29.37.0, anyExtendedKeyUsage.
const ANY_EXTENDED_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37.0");

/// Parameters for certificate generation.
///
/// The 1024-bit default key size reproduces the original fixtures and is
/// cryptographically weak by modern standards; raise `key_bits` when the
/// certificates are used for anything beyond test fixtures.
#[derive(Debug, Clone)]
pub struct CertificateOptions {
    /// Subject (and issuer — self-signed) distinguished name, RFC 4514.
    pub subject: String,
    /// RSA modulus size in bits.
    pub key_bits: usize,
    /// `notBefore` backdate, in days before now.
    pub not_before_days: u64,
    /// `notAfter` offset, in days after now.
    pub not_after_days: u64,
}

impl CertificateOptions {
    /// Options for the given subject with the fixture defaults: 1024-bit
    /// key, valid from one year ago to one hundred years out.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            key_bits: 1024,
            not_before_days: 365,
            not_after_days: 36_500,
        }
    }
}

impl Default for CertificateOptions {
    fn default() -> Self {
        Self::new("CN=wsign test")
    }
}

/// A generated private key with its self-signed certificate.
pub struct SigningIdentity {
    /// The self-signed certificate.
    pub certificate: Certificate,
    /// DER encoding of the certificate, as embedded in security tokens.
    pub certificate_der: Vec<u8>,
    /// The RSA private key matching the certificate's public key.
    pub private_key: RsaPrivateKey,
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("subject", &self.certificate.tbs_certificate.subject)
            .field("serial", &self.certificate.tbs_certificate.serial_number)
            .finish()
    }
}

/// Generates self-signed certificates and their key pairs.
///
/// The CSPRNG is injected so tests can pass a seeded source; production
/// callers use the [`OsRng`] default. Each instance owns its source, so
/// concurrent use means one authority per thread.
pub struct CertificateAuthority<R = OsRng> {
    rng: R,
}

impl CertificateAuthority<OsRng> {
    /// Create an authority backed by the operating system CSPRNG.
    pub fn new() -> Self {
        Self { rng: OsRng }
    }
}

impl Default for CertificateAuthority<OsRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore + CryptoRng> CertificateAuthority<R> {
    /// Create an authority backed by the given random source.
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Generate an RSA key pair and a self-signed X.509v3 certificate.
    ///
    /// The certificate carries SubjectKeyIdentifier, BasicConstraints
    /// (CA), KeyUsage and ExtendedKeyUsage extensions and is signed with
    /// SHA256withRSA. Before returning, the certificate is checked to be
    /// within its validity window and to verify against its own public
    /// key.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSubject`] if the distinguished name does not
    /// parse; [`Error::Certificate`] if assembly or the post-condition
    /// checks fail.
    pub fn issue(&mut self, options: &CertificateOptions) -> Result<SigningIdentity> {
        let subject = Name::from_str(&options.subject)
            .map_err(|e| Error::InvalidSubject(format!("{}: {e}", options.subject)))?;

        debug!(subject = %options.subject, bits = options.key_bits, "generating RSA key pair");
        let private_key = RsaPrivateKey::new(&mut self.rng, options.key_bits)
            .map_err(|e| Error::Certificate(format!("RSA key generation failed: {e}")))?;
        let public_key = RsaPublicKey::from(&private_key);

        // Serial numbers only need uniqueness, not unpredictability.
        let serial = self.rng.next_u64() >> 1;

        let certificate = build_self_signed(&subject, serial, &private_key, &public_key, options)?;
        let certificate_der = certificate
            .to_der()
            .map_err(|e| Error::Certificate(format!("certificate DER encoding failed: {e}")))?;

        check_validity(&certificate)?;
        verify_self_signature(&certificate, &public_key)?;

        info!(subject = %options.subject, serial, "issued self-signed certificate");
        Ok(SigningIdentity {
            certificate,
            certificate_der,
            private_key,
        })
    }
}

fn build_self_signed(
    subject: &Name,
    serial: u64,
    private_key: &RsaPrivateKey,
    public_key: &RsaPublicKey,
    options: &CertificateOptions,
) -> Result<Certificate> {
    let cert_err = |e: &dyn fmt::Display| Error::Certificate(format!("certificate build failed: {e}"));

    let spki_der = public_key
        .to_public_key_der()
        .map_err(|e| cert_err(&e))?;
    let spki = SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes()).map_err(|e| cert_err(&e))?;

    // Key identifier per RFC 5280: SHA-1 over the subjectPublicKey bits.
    let ski = Sha1::digest(spki.subject_public_key.raw_bytes());

    let validity = validity_window(options)?;
    let serial_number =
        SerialNumber::new(minimal_be_bytes(serial).as_slice()).map_err(|e| cert_err(&e))?;

    let signer = SigningKey::<Sha256>::new(private_key.clone());
    let mut builder = CertificateBuilder::new(
        Profile::Manual { issuer: None },
        serial_number,
        validity,
        subject.clone(),
        spki,
        &signer,
    )
    .map_err(|e| cert_err(&e))?;

    builder
        .add_extension(&SubjectKeyIdentifier(
            OctetString::new(ski.to_vec()).map_err(|e| cert_err(&e))?,
        ))
        .map_err(|e| cert_err(&e))?;
    builder
        .add_extension(&BasicConstraints {
            ca: true,
            path_len_constraint: None,
        })
        .map_err(|e| cert_err(&e))?;
    builder
        .add_extension(&KeyUsage(
            KeyUsages::KeyCertSign
                | KeyUsages::DigitalSignature
                | KeyUsages::KeyEncipherment
                | KeyUsages::DataEncipherment
                | KeyUsages::CRLSign,
        ))
        .map_err(|e| cert_err(&e))?;
    builder
        .add_extension(&ExtendedKeyUsage(vec![
            ID_KP_SERVER_AUTH,
            ID_KP_CLIENT_AUTH,
            ANY_EXTENDED_KEY_USAGE,
        ]))
        .map_err(|e| cert_err(&e))?;

    builder.build::<Signature>().map_err(|e| cert_err(&e))
}

fn validity_window(options: &CertificateOptions) -> Result<Validity> {
    let cert_err = |e: &dyn fmt::Display| Error::Certificate(format!("invalid validity window: {e}"));
    let now = SystemTime::now();

    let not_before = now - Duration::from_secs(options.not_before_days * SECONDS_PER_DAY);
    let not_after = now + Duration::from_secs(options.not_after_days * SECONDS_PER_DAY);

    let nb = not_before
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|e| cert_err(&e))?;
    let na = not_after
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|e| cert_err(&e))?;

    Ok(Validity {
        not_before: Time::UtcTime(UtcTime::from_unix_duration(nb).map_err(|e| cert_err(&e))?),
        // A hundred years out is past 2049, which UTCTime cannot express.
        not_after: Time::GeneralTime(
            GeneralizedTime::from_unix_duration(na).map_err(|e| cert_err(&e))?,
        ),
    })
}

fn check_validity(certificate: &Certificate) -> Result<()> {
    let now = SystemTime::now();
    let validity = &certificate.tbs_certificate.validity;
    let not_before = validity.not_before.to_system_time();
    let not_after = validity.not_after.to_system_time();
    if now < not_before || now > not_after {
        return Err(Error::Certificate(
            "generated certificate is outside its own validity window".into(),
        ));
    }
    Ok(())
}

fn verify_self_signature(certificate: &Certificate, public_key: &RsaPublicKey) -> Result<()> {
    let tbs = certificate
        .tbs_certificate
        .to_der()
        .map_err(|e| Error::Certificate(format!("TBSCertificate encoding failed: {e}")))?;
    let sig_bytes = certificate
        .signature
        .as_bytes()
        .ok_or_else(|| Error::Certificate("certificate signature has unused bits".into()))?;
    let signature = Signature::try_from(sig_bytes)
        .map_err(|e| Error::Certificate(format!("malformed certificate signature: {e}")))?;

    VerifyingKey::<Sha256>::new(public_key.clone())
        .verify(&tbs, &signature)
        .map_err(|_| Error::Certificate("self-signature verification failed".into()))
}

// Big-endian bytes of `value` without leading zeros, at least one byte.
fn minimal_be_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    bytes[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use const_oid::db::rfc5280::{
        ID_CE_BASIC_CONSTRAINTS, ID_CE_EXT_KEY_USAGE, ID_CE_KEY_USAGE,
        ID_CE_SUBJECT_KEY_IDENTIFIER,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn issue_test_identity() -> SigningIdentity {
        let mut ca = CertificateAuthority::with_rng(StdRng::seed_from_u64(42));
        ca.issue(&CertificateOptions::new("CN=test")).unwrap()
    }

    #[test]
    fn test_certificate_verifies_and_is_valid_now() {
        let identity = issue_test_identity();
        let public_key = RsaPublicKey::from(&identity.private_key);
        check_validity(&identity.certificate).unwrap();
        verify_self_signature(&identity.certificate, &public_key).unwrap();
    }

    #[test]
    fn test_certificate_is_self_issued() {
        let identity = issue_test_identity();
        let tbs = &identity.certificate.tbs_certificate;
        assert_eq!(tbs.subject, tbs.issuer);
    }

    #[test]
    fn test_certificate_carries_standard_extensions() {
        let identity = issue_test_identity();
        let extensions = identity
            .certificate
            .tbs_certificate
            .extensions
            .as_ref()
            .unwrap();
        let oids: Vec<_> = extensions.iter().map(|e| e.extn_id).collect();
        assert!(oids.contains(&ID_CE_SUBJECT_KEY_IDENTIFIER));
        assert!(oids.contains(&ID_CE_BASIC_CONSTRAINTS));
        assert!(oids.contains(&ID_CE_KEY_USAGE));
        assert!(oids.contains(&ID_CE_EXT_KEY_USAGE));
    }

    #[test]
    fn test_invalid_subject_is_rejected() {
        let mut ca = CertificateAuthority::with_rng(StdRng::seed_from_u64(1));
        let result = ca.issue(&CertificateOptions::new("not a distinguished name"));
        assert!(matches!(result, Err(Error::InvalidSubject(_))));
    }

    #[test]
    fn test_minimal_be_bytes() {
        assert_eq!(minimal_be_bytes(0), vec![0]);
        assert_eq!(minimal_be_bytes(1), vec![1]);
        assert_eq!(minimal_be_bytes(0x0102), vec![1, 2]);
    }
}
