//! PKCS#12 key store assembly and reloading.
//!
//! A store holds one alias mapping to a private key plus its
//! single-certificate chain, gated by a password. PKCS#12 is the
//! container format the surrounding tooling (and Spring-WS style
//! key-store loaders) can read back; its one password protects both the
//! container and the key entry.

use crate::ca::SigningIdentity;
use crate::{Error, Result};
use p12::PFX;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::RsaPrivateKey;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Assembles a password-protected key store with a single key entry.
///
/// # Example
///
/// ```ignore
/// let store = KeyStoreBuilder::new()
///     .alias("client")
///     .password("changeit")
///     .identity(&identity)
///     .build()?;
/// store.save("client.p12")?;
/// ```
#[derive(Default)]
pub struct KeyStoreBuilder {
    alias: Option<String>,
    password: Option<String>,
    entry: Option<(RsaPrivateKey, Vec<u8>)>,
}

impl KeyStoreBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry alias (the PKCS#12 friendly name).
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the store password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the key entry from a private key and DER-encoded certificate.
    pub fn key_entry(mut self, private_key: RsaPrivateKey, certificate_der: Vec<u8>) -> Self {
        self.entry = Some((private_key, certificate_der));
        self
    }

    /// Set the key entry from a generated [`SigningIdentity`].
    pub fn identity(self, identity: &SigningIdentity) -> Self {
        self.key_entry(
            identity.private_key.clone(),
            identity.certificate_der.clone(),
        )
    }

    /// Assemble the in-memory key store.
    pub fn build(self) -> Result<KeyStore> {
        let alias = self
            .alias
            .ok_or_else(|| Error::KeyStore("alias is required".into()))?;
        let password = self
            .password
            .ok_or_else(|| Error::KeyStore("password is required".into()))?;
        let (private_key, certificate_der) = self
            .entry
            .ok_or_else(|| Error::KeyStore("key entry is required".into()))?;

        let key_der = private_key
            .to_pkcs8_der()
            .map_err(|e| Error::KeyStore(format!("PKCS#8 encoding failed: {e}")))?;

        debug!(alias, "assembling PKCS#12 store");
        let pfx = PFX::new(
            &certificate_der,
            key_der.as_bytes(),
            None,
            &password,
            &alias,
        )
        .ok_or_else(|| Error::KeyStore("PKCS#12 assembly failed".into()))?;

        Ok(KeyStore { der: pfx.to_der() })
    }
}

/// An assembled key store, ready to serialize.
pub struct KeyStore {
    der: Vec<u8>,
}

impl KeyStore {
    /// DER bytes of the PKCS#12 container.
    pub fn to_der(&self) -> &[u8] {
        &self.der
    }

    /// Write the store to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path.as_ref(), &self.der)?;
        info!(path = %path.as_ref().display(), "key store written");
        Ok(())
    }

    /// Reload a store from its DER bytes and extract the key entry.
    ///
    /// The container MAC is checked first; a wrong password is
    /// [`Error::InvalidPassword`].
    pub fn open(der: &[u8], password: &str) -> Result<KeyStoreEntry> {
        let pfx =
            PFX::parse(der).map_err(|e| Error::KeyStore(format!("PKCS#12 parse failed: {e:?}")))?;

        if !pfx.verify_mac(password) {
            return Err(Error::InvalidPassword);
        }

        let keys = pfx
            .key_bags(password)
            .map_err(|e| Error::KeyStore(format!("key extraction failed: {e:?}")))?;
        let certs = pfx
            .cert_x509_bags(password)
            .map_err(|e| Error::KeyStore(format!("certificate extraction failed: {e:?}")))?;

        let private_key_der = keys
            .into_iter()
            .next()
            .ok_or_else(|| Error::KeyStore("no private key in store".into()))?;
        let certificate_der = certs
            .into_iter()
            .next()
            .ok_or_else(|| Error::KeyStore("no certificate in store".into()))?;

        Ok(KeyStoreEntry {
            private_key_der,
            certificate_der,
        })
    }

    /// Reload a store from a file.
    pub fn open_file(path: impl AsRef<Path>, password: &str) -> Result<KeyStoreEntry> {
        let der = fs::read(path)?;
        Self::open(&der, password)
    }
}

/// The key entry extracted from a reloaded store.
pub struct KeyStoreEntry {
    private_key_der: Vec<u8>,
    certificate_der: Vec<u8>,
}

impl KeyStoreEntry {
    /// Parse the entry's private key.
    pub fn private_key(&self) -> Result<RsaPrivateKey> {
        RsaPrivateKey::from_pkcs8_der(&self.private_key_der)
            .map_err(|e| Error::KeyStore(format!("stored key is not PKCS#8 RSA: {e}")))
    }

    /// DER bytes of the entry's certificate.
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ca::{CertificateAuthority, CertificateOptions};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rsa::RsaPublicKey;

    fn test_identity() -> SigningIdentity {
        let mut ca = CertificateAuthority::with_rng(StdRng::seed_from_u64(30));
        ca.issue(&CertificateOptions::new("CN=keystore test")).unwrap()
    }

    #[test]
    fn test_round_trip_preserves_entry() {
        let identity = test_identity();
        let store = KeyStoreBuilder::new()
            .alias("client")
            .password("changeit")
            .identity(&identity)
            .build()
            .unwrap();

        let entry = KeyStore::open(store.to_der(), "changeit").unwrap();
        assert_eq!(entry.certificate_der(), identity.certificate_der.as_slice());
        assert_eq!(
            RsaPublicKey::from(&entry.private_key().unwrap()),
            RsaPublicKey::from(&identity.private_key)
        );
    }

    #[test]
    fn test_wrong_password_is_rejected() {
        let identity = test_identity();
        let store = KeyStoreBuilder::new()
            .alias("client")
            .password("changeit")
            .identity(&identity)
            .build()
            .unwrap();

        assert!(matches!(
            KeyStore::open(store.to_der(), "wrong"),
            Err(Error::InvalidPassword)
        ));
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        assert!(matches!(
            KeyStoreBuilder::new().build(),
            Err(Error::KeyStore(_))
        ));
        let identity = test_identity();
        assert!(matches!(
            KeyStoreBuilder::new()
                .alias("client")
                .identity(&identity)
                .build(),
            Err(Error::KeyStore(_))
        ));
    }
}
