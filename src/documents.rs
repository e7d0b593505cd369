//! NeXML document parsing
//!
//! This module reads NeXML text into an [`Element`] tree that the
//! structural builder consumes. Attributes keep document order, xmlns
//! declarations are split out from ordinary attributes, and each element
//! records the namespace URI its tag resolves to (needed later for the
//! cross-namespace collision check).

use crate::error::{Error, Result};
use crate::namespaces::{NamespaceScope, NamespaceStack};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// XML element in the document tree
#[derive(Debug, Clone, Default)]
pub struct Element {
    /// Tag name as written in the source (prefix included)
    pub tag: String,
    /// Namespace URI the tag resolved to, if any
    pub namespace: Option<String>,
    /// Attributes in document order, xmlns declarations excluded
    pub attributes: Vec<(String, String)>,
    /// Xmlns declarations on this element (prefix, uri); empty prefix is
    /// the default namespace
    pub xmlns: Vec<(String, String)>,
    /// Concatenated, trimmed text content (None when whitespace-only)
    pub text: Option<String>,
    /// Child elements in document order
    pub children: Vec<Element>,
}

impl Element {
    /// Create a new element
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Tag name with any prefix stripped
    pub fn local_name(&self) -> &str {
        match self.tag.split_once(':') {
            Some((_, local)) => local,
            None => &self.tag,
        }
    }

    /// Get an attribute value by its as-written name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get an attribute value by local name, ignoring any prefix
    pub fn attribute_local(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| match k.split_once(':') {
                Some((_, l)) => l == local,
                None => k == local,
            })
            .map(|(_, v)| v.as_str())
    }

    /// Append a trimmed text segment
    fn push_text(&mut self, segment: &str) {
        let segment = segment.trim();
        if segment.is_empty() {
            return;
        }
        match &mut self.text {
            Some(text) => {
                text.push(' ');
                text.push_str(segment);
            }
            None => self.text = Some(segment.to_string()),
        }
    }
}

/// Parsed NeXML document
#[derive(Debug, Default)]
pub struct XmlDocument {
    /// Root element of the document
    pub root: Option<Element>,
}

impl XmlDocument {
    /// Parse a document from a string
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes())
    }

    /// Parse a document from bytes
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(false);

        let mut doc = XmlDocument::default();
        let mut element_stack: Vec<Element> = Vec::new();
        let mut ns_stack = NamespaceStack::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let element = Self::open_element(&e, &mut ns_stack)?;
                    element_stack.push(element);
                }
                Ok(Event::End(_)) => {
                    ns_stack.pop();
                    if let Some(current) = element_stack.pop() {
                        if let Some(parent) = element_stack.last_mut() {
                            parent.children.push(current);
                        } else {
                            doc.root = Some(current);
                        }
                    }
                }
                Ok(Event::Empty(e)) => {
                    let element = Self::open_element(&e, &mut ns_stack)?;
                    ns_stack.pop();
                    if let Some(parent) = element_stack.last_mut() {
                        parent.children.push(element);
                    } else {
                        doc.root = Some(element);
                    }
                }
                Ok(Event::Text(e)) => {
                    if let Some(current) = element_stack.last_mut() {
                        let text = e
                            .unescape()
                            .map_err(|e| Error::Xml(format!("failed to unescape text: {}", e)))?;
                        current.push_text(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(current) = element_stack.last_mut() {
                        let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                        current.push_text(&text);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "error parsing XML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {} // Ignore comments, PIs, doctype
            }
            buf.clear();
        }

        if !element_stack.is_empty() {
            return Err(Error::Xml("unclosed element at end of input".to_string()));
        }
        doc.root
            .as_ref()
            .ok_or_else(|| Error::Xml("document has no root element".to_string()))?;
        Ok(doc)
    }

    /// Build an element from a start tag, pushing its namespace scope
    ///
    /// The scope is pushed even when empty so that End events can pop
    /// unconditionally.
    fn open_element(start: &BytesStart, ns_stack: &mut NamespaceStack) -> Result<Element> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| Error::Xml(format!("invalid element name: {}", e)))?
            .to_string();

        let mut element = Element::new(name);
        let mut scope = NamespaceScope::new();

        for attr_result in start.attributes() {
            let attr = attr_result
                .map_err(|e| Error::Xml(format!("failed to parse attribute: {}", e)))?;
            let attr_name = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| Error::Xml(format!("invalid attribute name: {}", e)))?;
            let attr_value = attr
                .unescape_value()
                .map_err(|e| Error::Xml(format!("failed to unescape attribute value: {}", e)))?
                .to_string();

            if attr_name == "xmlns" {
                scope.set_default_namespace(&attr_value);
                element.xmlns.push((String::new(), attr_value));
            } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
                scope.add_prefix(prefix, &attr_value);
                element.xmlns.push((prefix.to_string(), attr_value));
            } else {
                element.attributes.push((attr_name.to_string(), attr_value));
            }
        }

        ns_stack.push(scope);
        element.namespace = ns_stack.resolve_tag(&element.tag);
        Ok(element)
    }

    /// Get the root element
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }
}
