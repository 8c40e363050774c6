//! UsernameToken security header assembly.

use crate::templates::{TemplateId, TemplateRenderer};
use crate::token::{created_timestamp, password_digest, NonceGenerator};
use crate::Result;
use chrono::Utc;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use std::collections::BTreeMap;
use tracing::debug;

/// Builds plain and digest UsernameToken security headers.
///
/// The builder computes the named substitution values (nonce, created
/// time, password digest) and delegates the XML shape to the injected
/// [`TemplateRenderer`]. Each digest header consumes a fresh nonce and
/// timestamp; neither is ever reused.
pub struct UsernameTokenBuilder<'r, R = OsRng> {
    renderer: &'r dyn TemplateRenderer,
    nonce: NonceGenerator<R>,
}

impl<'r> UsernameTokenBuilder<'r, OsRng> {
    /// Create a builder using the operating system CSPRNG for nonces.
    pub fn new(renderer: &'r dyn TemplateRenderer) -> Self {
        Self {
            renderer,
            nonce: NonceGenerator::new(),
        }
    }
}

impl<'r, R: RngCore + CryptoRng> UsernameTokenBuilder<'r, R> {
    /// Create a builder with an injected random source.
    pub fn with_rng(renderer: &'r dyn TemplateRenderer, rng: R) -> Self {
        Self {
            renderer,
            nonce: NonceGenerator::with_rng(rng),
        }
    }

    /// Render a UsernameToken header carrying the clear-text password.
    pub fn plain_header(&self, username: &str, password: &str) -> Result<String> {
        debug!(user = username, "rendering plain UsernameToken header");
        let mut values = BTreeMap::new();
        values.insert("user", username.to_string());
        values.insert("password", password.to_string());
        self.renderer.render(TemplateId::UsernameTokenPlain, &values)
    }

    /// Render a UsernameToken header carrying a digested password.
    ///
    /// Consumes one nonce and one timestamp per call.
    pub fn digest_header(&mut self, username: &str, password: &str) -> Result<String> {
        let nonce = self.nonce.generate();
        let created = created_timestamp(Utc::now());
        self.digest_header_at(username, password, &nonce, &created)
    }

    // Split out so tests can pin nonce and timestamp.
    fn digest_header_at(
        &self,
        username: &str,
        password: &str,
        nonce: &str,
        created: &str,
    ) -> Result<String> {
        debug!(user = username, created, "rendering digest UsernameToken header");
        let digest = password_digest(nonce, created, password)?;
        let mut values = BTreeMap::new();
        values.insert("user", username.to_string());
        values.insert("password", password.to_string());
        values.insert("nonce", nonce.to_string());
        values.insert("date", created.to_string());
        values.insert("digest", digest);
        self.renderer.render(TemplateId::UsernameTokenDigest, &values)
    }
}
