//! Enveloped XML digital signatures for SOAP envelopes.
//!
//! The signer inserts a `wsse:Security` header carrying an X.509
//! BinarySecurityToken and an XMLDSig `<Signature>` computed over the
//! canonicalized document; the verifier checks a signed envelope against
//! the certificate it embeds.

mod signer;
mod verifier;

pub use signer::EnvelopeSigner;
pub use verifier::verify_envelope;

use crate::xml::XmlElement;
use crate::{Error, Result};
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use x509_cert::der::{Decode, Encode};
use x509_cert::Certificate;

/// Algorithm URIs for the RSA-SHA1 signature suite.
pub mod algorithms {
    /// SHA-1 digest method.
    pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
    /// RSA-SHA1 signature method.
    pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
    /// Inclusive C14N, comments omitted.
    pub const INCLUSIVE_C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
    /// Enveloped-signature transform.
    pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
}

/// WS-Security and XMLDSig namespaces.
pub mod ns {
    pub const WSSE: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
    pub const WSU: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
    pub const DS: &str = "http://www.w3.org/2000/09/xmldsig#";
}

/// ValueType of an X.509v3 BinarySecurityToken.
pub const X509_V3_VALUE_TYPE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-x509-token-profile-1.0#X509v3";

/// EncodingType of a base64 BinarySecurityToken.
pub const BASE64_ENCODING_TYPE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// `wsu:Id` given to the inserted BinarySecurityToken.
pub const BINARY_TOKEN_ID: &str = "X509Token";

/// Build the `SignedInfo` element for the given document digest.
///
/// Signing and verification both canonicalize the stand-alone form (with
/// the xmldsig namespace declared on the element itself); the copy
/// embedded under `<Signature>` inherits the namespace from its parent
/// and omits the declaration.
fn build_signed_info(digest_b64: &str, with_xmlns: bool) -> XmlElement {
    let mut signed_info = XmlElement::new("SignedInfo");
    if with_xmlns {
        signed_info = signed_info.attribute("xmlns", ns::DS);
    }
    signed_info
        .child(
            XmlElement::new("CanonicalizationMethod")
                .attribute("Algorithm", algorithms::INCLUSIVE_C14N),
        )
        .child(XmlElement::new("SignatureMethod").attribute("Algorithm", algorithms::RSA_SHA1))
        .child(
            XmlElement::new("Reference")
                .attribute("URI", "")
                .child(XmlElement::new("Transforms").child(
                    XmlElement::new("Transform")
                        .attribute("Algorithm", algorithms::ENVELOPED_SIGNATURE),
                ))
                .child(XmlElement::new("DigestMethod").attribute("Algorithm", algorithms::SHA1))
                .child(XmlElement::new("DigestValue").text_content(digest_b64)),
        )
}

/// Extract the RSA public key from a DER-encoded certificate.
fn rsa_public_key_from_cert_der(cert_der: &[u8]) -> Result<RsaPublicKey> {
    let certificate = Certificate::from_der(cert_der)
        .map_err(|e| Error::Certificate(format!("certificate DER parse failed: {e}")))?;
    let spki_der = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::Certificate(format!("SPKI encoding failed: {e}")))?;
    RsaPublicKey::from_public_key_der(&spki_der)
        .map_err(|e| Error::Certificate(format!("certificate public key is not RSA: {e}")))
}
