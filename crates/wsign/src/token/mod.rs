//! UsernameToken construction: nonces, password digests and header
//! rendering.

mod digest;
mod nonce;
mod username;

pub use digest::{created_timestamp, password_digest, CREATED_FORMAT};
pub use nonce::{NonceGenerator, NONCE_LEN};
pub use username::UsernameTokenBuilder;
