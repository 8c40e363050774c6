//! Security-header template rendering.
//!
//! The token builder never concatenates XML itself; it computes named
//! values and hands them to a [`TemplateRenderer`]. That keeps the token
//! logic independent of the templating technology — the built-in renderer
//! below does plain placeholder substitution, but anything that can turn
//! a template id plus a string map into XML can stand in.

use crate::dsig::ns::{WSSE as WSSE_NS, WSU as WSU_NS};
use crate::dsig::BASE64_ENCODING_TYPE;
use crate::xml::dom_escape;
use crate::{Error, Result};
use std::collections::BTreeMap;

const PASSWORD_TEXT_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordText";
const PASSWORD_DIGEST_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";

/// Identifies a security-header template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateId {
    /// UsernameToken with a clear-text password.
    UsernameTokenPlain,
    /// UsernameToken with a digested password, nonce and created time.
    UsernameTokenDigest,
}

/// Renders a template id plus substitution values into XML text.
pub trait TemplateRenderer {
    /// Render the template, substituting every placeholder from `values`.
    fn render(&self, template: TemplateId, values: &BTreeMap<&str, String>) -> Result<String>;
}

/// Built-in renderer: embedded templates with `${name}` placeholders.
///
/// Values are XML-escaped on substitution. Rendering fails if a
/// placeholder remains unfilled.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinTemplates;

const PLAIN_TEMPLATE: &str = r#"<wsse:Security xmlns:wsse="${wsse_ns}"><wsse:UsernameToken xmlns:wsu="${wsu_ns}" wsu:Id="UsernameToken-1"><wsse:Username>${user}</wsse:Username><wsse:Password Type="${password_type}">${password}</wsse:Password></wsse:UsernameToken></wsse:Security>"#;

const DIGEST_TEMPLATE: &str = r#"<wsse:Security xmlns:wsse="${wsse_ns}"><wsse:UsernameToken xmlns:wsu="${wsu_ns}" wsu:Id="UsernameToken-1"><wsse:Username>${user}</wsse:Username><wsse:Password Type="${password_type}">${digest}</wsse:Password><wsse:Nonce EncodingType="${encoding_type}">${nonce}</wsse:Nonce><wsu:Created>${date}</wsu:Created></wsse:UsernameToken></wsse:Security>"#;

impl TemplateRenderer for BuiltinTemplates {
    fn render(&self, template: TemplateId, values: &BTreeMap<&str, String>) -> Result<String> {
        let (body, password_type) = match template {
            TemplateId::UsernameTokenPlain => (PLAIN_TEMPLATE, PASSWORD_TEXT_TYPE),
            TemplateId::UsernameTokenDigest => (DIGEST_TEMPLATE, PASSWORD_DIGEST_TYPE),
        };

        let mut out = body.to_string();
        out = out.replace("${wsse_ns}", WSSE_NS);
        out = out.replace("${wsu_ns}", WSU_NS);
        out = out.replace("${password_type}", password_type);
        out = out.replace("${encoding_type}", BASE64_ENCODING_TYPE);
        for (key, value) in values {
            out = out.replace(&format!("${{{key}}}"), &dom_escape(value));
        }

        if let Some(start) = out.find("${") {
            let end = out[start..].find('}').map_or(out.len(), |i| start + i + 1);
            return Err(Error::Template(format!(
                "unfilled placeholder {}",
                &out[start..end]
            )));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&'static str, &str)]) -> BTreeMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_plain_token_contains_credentials() {
        let xml = BuiltinTemplates
            .render(
                TemplateId::UsernameTokenPlain,
                &values(&[("user", "alice"), ("password", "s3cret")]),
            )
            .unwrap();
        assert!(xml.contains("<wsse:Username>alice</wsse:Username>"));
        assert!(xml.contains("#PasswordText"));
        assert!(xml.contains(">s3cret</wsse:Password>"));
        assert!(xml.contains(WSSE_NS));
    }

    #[test]
    fn test_digest_token_contains_all_parts() {
        let xml = BuiltinTemplates
            .render(
                TemplateId::UsernameTokenDigest,
                &values(&[
                    ("user", "alice"),
                    ("password", "s3cret"),
                    ("nonce", "AAAAAAAAAAAAAAAAAAAAAA=="),
                    ("date", "2024-01-01T00:00:00Z"),
                    ("digest", "zHMmNcsYGgWLqGqvfP9QdhfCEwQ="),
                ]),
            )
            .unwrap();
        assert!(xml.contains("#PasswordDigest"));
        assert!(xml.contains("<wsse:Nonce"));
        assert!(xml.contains(BASE64_ENCODING_TYPE));
        assert!(xml.contains("AAAAAAAAAAAAAAAAAAAAAA=="));
        assert!(xml.contains("<wsu:Created>2024-01-01T00:00:00Z</wsu:Created>"));
        assert!(xml.contains("zHMmNcsYGgWLqGqvfP9QdhfCEwQ="));
    }

    #[test]
    fn test_values_are_xml_escaped() {
        let xml = BuiltinTemplates
            .render(
                TemplateId::UsernameTokenPlain,
                &values(&[("user", "a<b>&c"), ("password", "p")]),
            )
            .unwrap();
        assert!(xml.contains("a&lt;b&gt;&amp;c"));
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let result = BuiltinTemplates.render(
            TemplateId::UsernameTokenDigest,
            &values(&[("user", "alice")]),
        );
        assert!(matches!(result, Err(Error::Template(_))));
    }
}
