//! WS-Security artifact construction for SOAP messages.
//!
//! Builds the security material a SOAP client needs at message level:
//! UsernameToken headers (plain and digested password), enveloped XML
//! digital signatures with an X.509 BinarySecurityToken, self-signed
//! test certificates, and PKCS#12 key stores.
//!
//! The SOAP transport and endpoint dispatch are out of scope; this crate
//! only produces (and verifies) the secured documents handed to them.

pub mod ca;
pub mod dsig;
pub mod error;
pub mod keystore;
pub mod templates;
pub mod token;
pub mod xml;

pub use ca::{CertificateAuthority, CertificateOptions, SigningIdentity};
pub use dsig::{verify_envelope, EnvelopeSigner};
pub use error::Error;
pub use keystore::{KeyStore, KeyStoreBuilder, KeyStoreEntry};
pub use templates::{BuiltinTemplates, TemplateId, TemplateRenderer};
pub use token::{created_timestamp, password_digest, NonceGenerator, UsernameTokenBuilder};

pub type Result<T> = std::result::Result<T, Error>;
