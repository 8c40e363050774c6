//! Single-use random token generation.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

/// Nonce length in raw bytes, per the WS-Security username token profile
/// as used here.
pub const NONCE_LEN: usize = 16;

/// Generates base64-encoded random nonces.
///
/// The random source is injected so tests can supply deterministic
/// randomness; production callers use the [`OsRng`]-backed default. The
/// generator owns its source, so concurrent callers each construct their
/// own instance instead of sharing one.
///
/// # Panics
///
/// `generate` panics if the platform CSPRNG is unavailable. That is a
/// fatal configuration problem, not a recoverable error.
pub struct NonceGenerator<R = OsRng> {
    rng: R,
}

impl NonceGenerator<OsRng> {
    /// Create a generator backed by the operating system CSPRNG.
    pub fn new() -> Self {
        Self { rng: OsRng }
    }
}

impl Default for NonceGenerator<OsRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore + CryptoRng> NonceGenerator<R> {
    /// Create a generator backed by the given random source.
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Produce [`NONCE_LEN`] random bytes, base64-encoded.
    pub fn generate(&mut self) -> String {
        let mut bytes = [0u8; NONCE_LEN];
        self.rng.fill_bytes(&mut bytes);
        BASE64.encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_nonce_decodes_to_sixteen_bytes() {
        let mut gen = NonceGenerator::new();
        let nonce = gen.generate();
        let raw = BASE64.decode(nonce).unwrap();
        assert_eq!(raw.len(), NONCE_LEN);
    }

    #[test]
    fn test_sequential_nonces_differ() {
        let mut gen = NonceGenerator::new();
        assert_ne!(gen.generate(), gen.generate());
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let mut a = NonceGenerator::with_rng(StdRng::seed_from_u64(7));
        let mut b = NonceGenerator::with_rng(StdRng::seed_from_u64(7));
        assert_eq!(a.generate(), b.generate());
    }
}
