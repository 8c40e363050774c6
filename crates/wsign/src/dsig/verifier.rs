//! Verifies signed SOAP envelopes against their embedded certificate.

use super::{algorithms, build_signed_info, ns, rsa_public_key_from_cert_der};
use crate::xml::{canonicalize, XmlElement};
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use sha1::{Digest, Sha1};
use tracing::{debug, warn};

/// Verify the enveloped signature of a signed SOAP document.
///
/// Returns `Ok(true)` when the document digest and the RSA-SHA1
/// signature both check out against the embedded certificate's public
/// key, `Ok(false)` when the envelope was mutated after signing, and an
/// error when signature parts are missing or use unsupported algorithms.
pub fn verify_envelope(signed_xml: &str) -> Result<bool> {
    let root = XmlElement::parse(signed_xml)?;
    // The envelope payload may legitimately contain elements named
    // Signature; only the xmldsig one (it declares the namespace on
    // itself) is ours.
    let is_dsig_signature =
        |el: &XmlElement| el.local_name() == "Signature" && el.attr("xmlns") == Some(ns::DS);
    let signature = root
        .find_where(&is_dsig_signature)
        .ok_or_else(|| Error::Verification("no Signature element".into()))?;

    check_algorithm(signature, "SignatureMethod", algorithms::RSA_SHA1)?;
    check_algorithm(signature, "CanonicalizationMethod", algorithms::INCLUSIVE_C14N)?;
    check_algorithm(signature, "DigestMethod", algorithms::SHA1)?;

    let digest_value = element_text(signature, "DigestValue")?;
    let signature_value = element_text(signature, "SignatureValue")?;

    // Prefer the BinarySecurityToken; fall back to KeyInfo's X509Data.
    let cert_b64 = root
        .find("BinarySecurityToken")
        .map(|el| el.text())
        .or_else(|| signature.find("X509Certificate").map(|el| el.text()))
        .ok_or_else(|| Error::Verification("no embedded certificate".into()))?;
    let cert_der = decode_b64(&cert_b64, "certificate")?;

    // Enveloped-signature transform: the digest covers the document
    // without the signature that was inserted into it. Only that one
    // element is stripped; same-named payload elements were present at
    // signing time and stay in the digest input.
    let mut document = root.clone();
    document.remove_first_where(&is_dsig_signature);
    let actual_digest = BASE64.encode(Sha1::digest(canonicalize(&document).as_bytes()));
    if actual_digest != digest_value {
        warn!("digest mismatch, envelope was mutated after signing");
        return Ok(false);
    }

    let public_key = rsa_public_key_from_cert_der(&cert_der)?;
    let signature_bytes = decode_b64(&signature_value, "signature value")?;
    let rsa_signature = match Signature::try_from(signature_bytes.as_slice()) {
        Ok(sig) => sig,
        Err(_) => return Ok(false),
    };

    let signed_info = build_signed_info(&digest_value, true);
    let verified = VerifyingKey::<Sha1>::new(public_key)
        .verify(canonicalize(&signed_info).as_bytes(), &rsa_signature)
        .is_ok();
    debug!(verified, "envelope signature checked");
    Ok(verified)
}

fn check_algorithm(signature: &XmlElement, element: &str, expected: &str) -> Result<()> {
    let found = signature
        .find(element)
        .and_then(|el| el.attr("Algorithm"))
        .ok_or_else(|| Error::Verification(format!("missing {element}")))?;
    if found != expected {
        return Err(Error::Verification(format!(
            "unsupported algorithm {found} in {element}"
        )));
    }
    Ok(())
}

fn element_text(signature: &XmlElement, element: &str) -> Result<String> {
    signature
        .find(element)
        .map(|el| el.text())
        .ok_or_else(|| Error::Verification(format!("missing {element}")))
}

fn decode_b64(value: &str, what: &str) -> Result<Vec<u8>> {
    let compact: String = value.split_whitespace().collect();
    BASE64
        .decode(compact)
        .map_err(|e| Error::Verification(format!("{what} is not valid base64: {e}")))
}
