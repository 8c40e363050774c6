//! Error types for WS-Security operations.

use thiserror::Error;

/// Error type for all wsign operations.
///
/// Public functions in this crate return [`crate::Result<T>`], which uses
/// this error type. Match on variants to handle specific failure cases.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Occurs when reading or writing key stores and envelope files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing or serialization failed.
    ///
    /// The input document is not well-formed XML, or a required element
    /// is structurally out of place.
    #[error("XML error: {0}")]
    Xml(String),

    /// Template rendering failed.
    ///
    /// A placeholder in the security-header template has no value, or the
    /// renderer rejected the substitution map.
    #[error("Template error: {0}")]
    Template(String),

    /// UsernameToken material is invalid.
    ///
    /// Typically a nonce that is not valid base64.
    #[error("Token error: {0}")]
    Token(String),

    /// Certificate generation or validation failed.
    ///
    /// Covers self-signature verification failures and validity-window
    /// violations.
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// The subject distinguished name could not be parsed.
    #[error("Invalid subject name: {0}")]
    InvalidSubject(String),

    /// The private key does not match the certificate's public key.
    #[error("Private key does not match certificate public key")]
    KeyMismatch,

    /// Signature computation failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// A signed envelope is missing signature parts or uses an
    /// unsupported algorithm, so verification cannot proceed.
    #[error("Signature verification error: {0}")]
    Verification(String),

    /// Key store assembly or parsing failed.
    #[error("Key store error: {0}")]
    KeyStore(String),

    /// Incorrect password for the key store.
    #[error("Invalid key store password")]
    InvalidPassword,
}
