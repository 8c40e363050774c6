//! Owned XML tree parsed with quick-xml.
//!
//! Attribute order and inter-element whitespace are preserved verbatim so
//! that a serialize→parse round trip yields an identical tree. Signature
//! digests depend on that: the canonical form of a freshly signed tree
//! must match the canonical form of the same document after it has been
//! written out and read back.

use crate::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// A node in the XML tree.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
}

/// An XML element with its qualified name, attributes and children.
///
/// Namespace declarations are kept as ordinary `xmlns`/`xmlns:*`
/// attributes; qualified names are stored as written (`wsse:Security`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    /// Qualified name as it appears in the document.
    pub name: String,
    /// Attributes in document order, values unescaped.
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<XmlNode>,
}

/// Strip the namespace prefix from a qualified name.
pub fn local_name(qname: &str) -> &str {
    match qname.rsplit_once(':') {
        Some((_, local)) => local,
        None => qname,
    }
}

impl XmlElement {
    /// Create an empty element with the given qualified name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute, builder style.
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Add a text child, builder style.
    pub fn text_content(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Add an element child, builder style.
    pub fn child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Look up an attribute by its qualified name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Local part of this element's name.
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Namespace prefix of this element's name, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.name.rsplit_once(':').map(|(p, _)| p)
    }

    /// Concatenated direct text and CDATA content.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
                _ => {}
            }
        }
        out
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![XmlNode::Text(text.into())];
    }

    /// Depth-first search for the first descendant element (or self) with
    /// the given local name.
    pub fn find(&self, local: &str) -> Option<&XmlElement> {
        if self.local_name() == local {
            return Some(self);
        }
        for child in &self.children {
            if let XmlNode::Element(el) = child {
                if let Some(found) = el.find(local) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Index of the first direct child element with the given local name.
    pub fn child_index(&self, local: &str) -> Option<usize> {
        self.children.iter().position(|node| {
            matches!(node, XmlNode::Element(el) if el.local_name() == local)
        })
    }

    /// Direct child element at the given child index, if it is an element.
    pub fn element_at_mut(&mut self, index: usize) -> Option<&mut XmlElement> {
        match self.children.get_mut(index) {
            Some(XmlNode::Element(el)) => Some(el),
            _ => None,
        }
    }

    /// Depth-first search for the first element (or self) matching the
    /// predicate.
    pub fn find_where<F>(&self, pred: &F) -> Option<&XmlElement>
    where
        F: Fn(&XmlElement) -> bool,
    {
        if pred(self) {
            return Some(self);
        }
        for child in &self.children {
            if let XmlNode::Element(el) = child {
                if let Some(found) = el.find_where(pred) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Remove the first descendant element matching the predicate,
    /// depth-first. Returns whether an element was removed.
    pub fn remove_first_where<F>(&mut self, pred: &F) -> bool
    where
        F: Fn(&XmlElement) -> bool,
    {
        for index in 0..self.children.len() {
            if let XmlNode::Element(el) = &mut self.children[index] {
                if pred(el) {
                    self.children.remove(index);
                    return true;
                }
                if el.remove_first_where(pred) {
                    return true;
                }
            }
        }
        false
    }

    /// Parse a document into its root element.
    ///
    /// The XML declaration, DOCTYPE and processing instructions are
    /// dropped; comments and CDATA are kept as nodes.
    pub fn parse(xml: &str) -> Result<XmlElement> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| Error::Xml(format!("parse error: {e}")))?;
            match event {
                Event::Start(e) => {
                    stack.push(element_from_start(&e)?);
                }
                Event::Empty(e) => {
                    let el = element_from_start(&e)?;
                    attach(&mut stack, &mut root, el)?;
                }
                Event::End(_) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| Error::Xml("unexpected closing tag".into()))?;
                    attach(&mut stack, &mut root, el)?;
                }
                Event::Text(t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| Error::Xml(format!("bad text content: {e}")))?
                        .into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::Text(text));
                    }
                }
                Event::CData(t) => {
                    let text = String::from_utf8(t.into_inner().into_owned())
                        .map_err(|e| Error::Xml(format!("bad CDATA content: {e}")))?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::CData(text));
                    }
                }
                Event::Comment(t) => {
                    let text = String::from_utf8_lossy(t.as_ref()).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::Comment(text));
                    }
                }
                Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        if !stack.is_empty() {
            return Err(Error::Xml("document ended with open elements".into()));
        }
        root.ok_or_else(|| Error::Xml("document has no root element".into()))
    }

    /// Serialize without an XML declaration.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

fn element_from_start(start: &quick_xml::events::BytesStart<'_>) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::Xml(format!("bad attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Xml(format!("bad attribute value: {e}")))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    el: XmlElement,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(el));
        Ok(())
    } else if root.is_none() {
        *root = Some(el);
        Ok(())
    } else {
        Err(Error::Xml("multiple root elements".into()))
    }
}

fn write_element(el: &XmlElement, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for (name, value) in &el.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    if el.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &el.children {
        match child {
            XmlNode::Element(inner) => write_element(inner, out),
            XmlNode::Text(t) => out.push_str(&escape_text(t)),
            XmlNode::CData(t) => {
                out.push_str("<![CDATA[");
                out.push_str(t);
                out.push_str("]]>");
            }
            XmlNode::Comment(t) => {
                out.push_str("<!--");
                out.push_str(t);
                out.push_str("-->");
            }
        }
    }
    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

/// Escape character data: `&`, `<`, `>` and carriage returns.
pub(crate) fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            other => out.push(other),
        }
    }
    out
}

/// Escape an attribute value: `&`, `<`, `"` and whitespace controls.
pub(crate) fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_envelope() {
        let root = XmlElement::parse("<Envelope><Body><x/></Body></Envelope>").unwrap();
        assert_eq!(root.name, "Envelope");
        assert_eq!(root.children.len(), 1);
        let body = root.find("Body").unwrap();
        assert!(body.find("x").is_some());
    }

    #[test]
    fn test_parse_keeps_prefixed_attributes() {
        let xml = r#"<a xmlns:wsu="urn:x" wsu:Id="T-1"><b>v</b></a>"#;
        let root = XmlElement::parse(xml).unwrap();
        assert_eq!(root.attr("wsu:Id"), Some("T-1"));
        assert_eq!(root.attr("xmlns:wsu"), Some("urn:x"));
    }

    #[test]
    fn test_serialize_parse_round_trip_is_stable() {
        let xml = r#"<s:Envelope xmlns:s="urn:e"><s:Body attr="a&amp;b"> text &lt;here&gt; <x/></s:Body></s:Envelope>"#;
        let first = XmlElement::parse(xml).unwrap();
        let second = XmlElement::parse(&first.to_xml()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_text_unescaped_in_tree() {
        let root = XmlElement::parse("<a>1 &amp; 2</a>").unwrap();
        assert_eq!(root.text(), "1 & 2");
        assert_eq!(root.to_xml(), "<a>1 &amp; 2</a>");
    }

    #[test]
    fn test_find_where_matches_on_attributes() {
        let xml = r#"<a><Sig/><Sig xmlns="urn:d"><x/></Sig></a>"#;
        let root = XmlElement::parse(xml).unwrap();
        let found = root
            .find_where(&|el: &XmlElement| el.attr("xmlns") == Some("urn:d"))
            .unwrap();
        assert!(found.find("x").is_some());
    }

    #[test]
    fn test_remove_first_where_leaves_later_matches() {
        let xml = "<a><b><Sig id=\"1\"/></b><Sig id=\"2\"/></a>";
        let mut root = XmlElement::parse(xml).unwrap();
        let removed =
            root.remove_first_where(&|el: &XmlElement| el.local_name() == "Sig");
        assert!(removed);
        assert_eq!(root.find("Sig").unwrap().attr("id"), Some("2"));
        assert!(!root.remove_first_where(&|el: &XmlElement| el.local_name() == "Gone"));
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        assert!(XmlElement::parse("<a><b></a>").is_err());
        assert!(XmlElement::parse("no markup at all").is_err());
    }

    #[test]
    fn test_child_index_and_mutation() {
        let mut root = XmlElement::parse("<e><Header/><Body/></e>").unwrap();
        let idx = root.child_index("Header").unwrap();
        assert_eq!(idx, 0);
        root.element_at_mut(idx)
            .unwrap()
            .children
            .push(XmlNode::Element(XmlElement::new("inserted")));
        assert!(root.find("inserted").is_some());
    }
}
