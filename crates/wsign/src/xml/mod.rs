//! Minimal owned XML tree with C14N support.
//!
//! The signature code needs three primitives from its XML collaborator:
//! parse a document into a mutable tree, serialize it back, and produce
//! the canonical (C14N, comments omitted) byte form used as signature
//! input. `quick-xml` does the parsing (safe against XXE by default, it
//! does not expand entities); the tree and the canonical writer live
//! here.

pub mod c14n;
mod dom;

pub use c14n::canonicalize;
pub use dom::{local_name, XmlElement, XmlNode};

pub(crate) use dom::escape_text as dom_escape;
