//! Canonicalizes and signs SOAP envelopes.

use super::{
    build_signed_info, rsa_public_key_from_cert_der, BASE64_ENCODING_TYPE, BINARY_TOKEN_ID, ns,
    X509_V3_VALUE_TYPE,
};
use crate::ca::SigningIdentity;
use crate::xml::{canonicalize, XmlElement, XmlNode};
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use tracing::{debug, info};

/// Signs SOAP envelopes with an RSA key and X.509 certificate.
///
/// Construction fails with [`Error::KeyMismatch`] when the private key
/// does not belong to the certificate, so a mismatch surfaces before any
/// envelope is touched.
pub struct EnvelopeSigner {
    private_key: RsaPrivateKey,
    certificate_der: Vec<u8>,
}

impl EnvelopeSigner {
    /// Create a signer from a generated [`SigningIdentity`].
    pub fn new(identity: &SigningIdentity) -> Result<Self> {
        Self::from_parts(identity.private_key.clone(), identity.certificate_der.clone())
    }

    /// Create a signer from a private key and a DER-encoded certificate.
    pub fn from_parts(private_key: RsaPrivateKey, certificate_der: Vec<u8>) -> Result<Self> {
        let certificate_key = rsa_public_key_from_cert_der(&certificate_der)?;
        if certificate_key != RsaPublicKey::from(&private_key) {
            return Err(Error::KeyMismatch);
        }
        Ok(Self {
            private_key,
            certificate_der,
        })
    }

    /// Sign a SOAP envelope, returning the secured document.
    ///
    /// Inserts a `wsse:Security` header with a BinarySecurityToken
    /// carrying the certificate, canonicalizes the document (C14N,
    /// comments omitted), computes an RSA-SHA1 enveloped signature and
    /// embeds it in the security header. The positions of the inserted
    /// elements are tracked from the insertion step; nothing is looked
    /// up again by tag name.
    pub fn sign_envelope(&self, envelope_xml: &str) -> Result<String> {
        let mut root = XmlElement::parse(envelope_xml)?;
        let prefix = root
            .prefix()
            .map(|p| format!("{p}:"))
            .unwrap_or_default();

        // Locate or create the SOAP Header ahead of the Body.
        let header_index = match root.child_index("Header") {
            Some(index) => index,
            None => {
                root.children
                    .insert(0, XmlNode::Element(XmlElement::new(format!("{prefix}Header"))));
                0
            }
        };

        // The token text is set before canonicalization so the digest
        // covers the final token bytes; only the Signature element is
        // added afterwards, and the enveloped transform excludes it.
        let cert_b64 = BASE64.encode(&self.certificate_der);
        let security = build_security_header(&cert_b64);
        let header = root
            .element_at_mut(header_index)
            .ok_or_else(|| Error::Xml("SOAP Header is not an element".into()))?;
        header.children.insert(0, XmlNode::Element(security));
        let security_index = 0;

        let canonical = canonicalize(&root);
        let digest_b64 = BASE64.encode(Sha1::digest(canonical.as_bytes()));
        debug!(digest = %digest_b64, "canonicalized envelope digested");

        let signed_info = build_signed_info(&digest_b64, true);
        let signature_b64 = BASE64.encode(self.sign_bytes(canonicalize(&signed_info).as_bytes())?);

        let signature = self.build_signature_element(&digest_b64, &signature_b64, &cert_b64);
        root.element_at_mut(header_index)
            .and_then(|h| h.element_at_mut(security_index))
            .ok_or_else(|| Error::Xml("security header vanished during signing".into()))?
            .children
            .push(XmlNode::Element(signature));

        info!("envelope signed");
        Ok(root.to_xml())
    }

    fn sign_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signing_key = SigningKey::<Sha1>::new(self.private_key.clone());
        let signature = signing_key
            .try_sign(data)
            .map_err(|e| Error::Signing(e.to_string()))?;
        Ok(signature.to_vec())
    }

    // KeyInfo carries both the certificate and the raw public key.
    fn build_signature_element(
        &self,
        digest_b64: &str,
        signature_b64: &str,
        cert_b64: &str,
    ) -> XmlElement {
        let public_key = RsaPublicKey::from(&self.private_key);
        let modulus_b64 = BASE64.encode(public_key.n().to_bytes_be());
        let exponent_b64 = BASE64.encode(public_key.e().to_bytes_be());

        XmlElement::new("Signature")
            .attribute("xmlns", ns::DS)
            .child(build_signed_info(digest_b64, false))
            .child(XmlElement::new("SignatureValue").text_content(signature_b64))
            .child(
                XmlElement::new("KeyInfo")
                    .child(
                        XmlElement::new("X509Data")
                            .child(XmlElement::new("X509Certificate").text_content(cert_b64)),
                    )
                    .child(
                        XmlElement::new("KeyValue").child(
                            XmlElement::new("RSAKeyValue")
                                .child(XmlElement::new("Modulus").text_content(modulus_b64))
                                .child(XmlElement::new("Exponent").text_content(exponent_b64)),
                        ),
                    ),
            )
    }
}

fn build_security_header(cert_b64: &str) -> XmlElement {
    XmlElement::new("wsse:Security")
        .attribute("xmlns:wsse", ns::WSSE)
        .attribute("xmlns:wsu", ns::WSU)
        .child(
            XmlElement::new("wsse:BinarySecurityToken")
                .attribute("EncodingType", BASE64_ENCODING_TYPE)
                .attribute("ValueType", X509_V3_VALUE_TYPE)
                .attribute("wsu:Id", BINARY_TOKEN_ID)
                .text_content(cert_b64),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ca::{CertificateAuthority, CertificateOptions};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn test_identity(seed: u64) -> SigningIdentity {
        let mut ca = CertificateAuthority::with_rng(StdRng::seed_from_u64(seed));
        ca.issue(&CertificateOptions::new("CN=test")).unwrap()
    }

    #[test]
    fn test_signed_envelope_structure() {
        let identity = test_identity(10);
        let signer = EnvelopeSigner::new(&identity).unwrap();
        let signed = signer
            .sign_envelope("<Envelope><Body><x/></Body></Envelope>")
            .unwrap();

        assert!(signed.contains("<wsse:Security"));
        assert!(signed.contains("<wsse:BinarySecurityToken"));
        assert!(signed.contains(X509_V3_VALUE_TYPE));
        assert!(signed.contains(r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#">"#));
        assert!(signed.contains("<SignatureValue>"));
        assert!(signed.contains("<Modulus>"));
        assert!(signed.contains("<X509Certificate>"));
    }

    #[test]
    fn test_embedded_token_is_the_certificate() {
        let identity = test_identity(11);
        let signer = EnvelopeSigner::new(&identity).unwrap();
        let signed = signer
            .sign_envelope("<Envelope><Body><x/></Body></Envelope>")
            .unwrap();

        let root = XmlElement::parse(&signed).unwrap();
        let token = root.find("BinarySecurityToken").unwrap();
        let der = BASE64.decode(token.text()).unwrap();
        assert_eq!(der, identity.certificate_der);
    }

    #[test]
    fn test_existing_header_is_reused() {
        let identity = test_identity(12);
        let signer = EnvelopeSigner::new(&identity).unwrap();
        let signed = signer
            .sign_envelope("<s:Envelope xmlns:s=\"urn:e\"><s:Header><Route/></s:Header><s:Body><x/></s:Body></s:Envelope>")
            .unwrap();
        let root = XmlElement::parse(&signed).unwrap();
        assert!(root.find("Route").is_some());
        assert!(root.find("Security").is_some());
    }

    #[test]
    fn test_key_certificate_mismatch_is_rejected() {
        let identity_a = test_identity(13);
        let identity_b = test_identity(14);
        let result = EnvelopeSigner::from_parts(
            identity_a.private_key.clone(),
            identity_b.certificate_der.clone(),
        );
        assert!(matches!(result, Err(Error::KeyMismatch)));
    }

    #[test]
    fn test_malformed_envelope_is_rejected() {
        let identity = test_identity(15);
        let signer = EnvelopeSigner::new(&identity).unwrap();
        assert!(matches!(
            signer.sign_envelope("<Envelope><Body>"),
            Err(Error::Xml(_))
        ));
    }
}
