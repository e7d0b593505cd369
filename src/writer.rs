//! NeXML serialization
//!
//! Walks a nested-by-tag JSON document (direct HoneyBadgerFish or legacy
//! BadgerFish) and re-emits NeXML text. Flattened `^`-prefixed
//! annotations are reconstructed into `meta` elements by reversing the
//! classifier's decomposition: a scalar value becomes a `LiteralMeta`
//! with an inferred datatype, a structured object becomes a
//! `ResourceMeta` (or a literal with extra attributes when it carries a
//! `$` value).
//!
//! By-id documents must be expanded to direct form first; the
//! orchestrator does that.

use serde_json::{Map, Value as JsonValue};

use crate::converters::{ATTR_PREFIX, META_PREFIX, TEXT_KEY};
use crate::error::{Error, Result};
use crate::formats::NEXML2JSON_KEY;
use crate::{NEXML_NAMESPACE, OT_NAMESPACE, XSI_NAMESPACE};

/// Configurable NeXML writer
///
/// Empty `indent` and `newline` strings produce compact single-line
/// output. A trailing newline is always appended to the document.
#[derive(Debug, Clone)]
pub struct NexmlWriter {
    indent: String,
    newline: String,
    root_atts_default: bool,
}

impl Default for NexmlWriter {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            newline: "\n".to_string(),
            root_atts_default: false,
        }
    }
}

impl NexmlWriter {
    /// Create a writer with two-space indent and newlines
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer producing compact single-line output
    pub fn compact() -> Self {
        Self::new().with_indent("").with_newline("")
    }

    /// Set the indentation string
    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    /// Set the newline string
    pub fn with_newline(mut self, newline: impl Into<String>) -> Self {
        self.newline = newline.into();
        self
    }

    /// Inject the standard NeXML namespace declarations when the root
    /// element carries none (hand-authored JSON documents usually lack
    /// them)
    pub fn with_root_atts_default(mut self, inject: bool) -> Self {
        self.root_atts_default = inject;
        self
    }

    /// Serialize a document to NeXML text
    pub fn write_document(&self, doc: &JsonValue) -> Result<String> {
        let obj = doc
            .as_object()
            .ok_or_else(|| Error::Structural("document is not a JSON object".to_string()))?;
        if obj.len() != 1 {
            return Err(Error::Structural(format!(
                "document must have exactly one root key, found {}",
                obj.len()
            )));
        }
        let (tag, root) = obj.iter().next().ok_or_else(|| {
            Error::Structural("document must have exactly one root key".to_string())
        })?;

        let mut out = String::new();
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        out.push_str(&self.newline);
        self.write_element(&mut out, tag, root, 0)?;
        if !out.ends_with('\n') {
            out.push('\n');
        }
        Ok(out)
    }

    /// Serialize a document to a stream
    pub fn write_to(&self, doc: &JsonValue, out: &mut dyn std::io::Write) -> Result<()> {
        let text = self.write_document(doc)?;
        out.write_all(text.as_bytes())?;
        Ok(())
    }

    fn write_element(
        &self,
        out: &mut String,
        tag: &str,
        value: &JsonValue,
        depth: usize,
    ) -> Result<()> {
        let node = match value {
            JsonValue::Object(node) => node,
            // A bare scalar child is an element with text content only.
            JsonValue::String(s) => {
                self.write_text_element(out, tag, s, depth);
                return Ok(());
            }
            JsonValue::Bool(_) | JsonValue::Number(_) => {
                self.write_text_element(out, tag, &scalar_to_string(value, tag)?, depth);
                return Ok(());
            }
            _ => {
                return Err(Error::Structural(format!(
                    "element {:?} has an unserializable value shape",
                    tag
                )))
            }
        };

        let mut attrs: Vec<(String, String)> = Vec::new();
        let mut text: Option<&str> = None;
        let mut metas: Vec<(&str, &JsonValue)> = Vec::new();
        let mut children: Vec<(&str, &JsonValue)> = Vec::new();

        for (key, val) in node {
            if key == NEXML2JSON_KEY {
                continue;
            } else if key == "@xmlns" {
                collect_xmlns(&mut attrs, val)?;
            } else if let Some(name) = key.strip_prefix(ATTR_PREFIX) {
                attrs.push((name.to_string(), scalar_to_string(val, key)?));
            } else if key == TEXT_KEY {
                text = val.as_str();
                if text.is_none() {
                    return Err(Error::Structural(format!(
                        "text content of {:?} is not a string",
                        tag
                    )));
                }
            } else if let Some(prop) = key.strip_prefix(META_PREFIX) {
                metas.push((prop, val));
            } else {
                children.push((key, val));
            }
        }

        if !metas.is_empty() && children.iter().any(|(key, _)| *key == "meta") {
            return Err(Error::Structural(format!(
                "element {:?} mixes flattened annotations with nested meta children",
                tag
            )));
        }

        if depth == 0 && self.root_atts_default && !attrs.iter().any(|(k, _)| k.starts_with("xmlns"))
        {
            let mut defaults = vec![
                ("xmlns".to_string(), NEXML_NAMESPACE.to_string()),
                ("xmlns:nex".to_string(), NEXML_NAMESPACE.to_string()),
                ("xmlns:ot".to_string(), OT_NAMESPACE.to_string()),
                ("xmlns:xsi".to_string(), XSI_NAMESPACE.to_string()),
            ];
            if !attrs.iter().any(|(k, _)| k == "version") {
                defaults.push(("version".to_string(), "0.9".to_string()));
            }
            defaults.extend(attrs);
            attrs = defaults;
        }

        let pad = self.indent.repeat(depth);
        out.push_str(&pad);
        out.push('<');
        out.push_str(tag);
        for (name, value) in &attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }

        if metas.is_empty() && children.is_empty() {
            match text {
                Some(text) => {
                    out.push('>');
                    out.push_str(&escape_text(text));
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
                None => out.push_str("/>"),
            }
            out.push_str(&self.newline);
            return Ok(());
        }

        out.push('>');
        out.push_str(&self.newline);
        if let Some(text) = text {
            out.push_str(&self.indent.repeat(depth + 1));
            out.push_str(&escape_text(text));
            out.push_str(&self.newline);
        }
        // NeXML wants meta children ahead of structural ones.
        for (prop, val) in metas {
            self.write_meta(out, prop, val, depth + 1)?;
        }
        for (child_tag, val) in children {
            match val {
                JsonValue::Array(items) => {
                    for item in items {
                        self.write_element(out, child_tag, item, depth + 1)?;
                    }
                }
                _ => self.write_element(out, child_tag, val, depth + 1)?,
            }
        }
        out.push_str(&pad);
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
        out.push_str(&self.newline);
        Ok(())
    }

    /// Reconstruct one flattened annotation as `meta` element(s)
    fn write_meta(
        &self,
        out: &mut String,
        prop: &str,
        value: &JsonValue,
        depth: usize,
    ) -> Result<()> {
        match value {
            JsonValue::Array(items) => {
                for item in items {
                    self.write_meta(out, prop, item, depth)?;
                }
                Ok(())
            }
            JsonValue::Object(obj) if obj.contains_key(TEXT_KEY) => {
                let mut literal = Map::new();
                literal.insert(
                    "@xsi:type".to_string(),
                    JsonValue::String("nex:LiteralMeta".to_string()),
                );
                literal.insert("@property".to_string(), JsonValue::String(prop.to_string()));
                let content = obj.get(TEXT_KEY).cloned().unwrap_or(JsonValue::Null);
                if let Some(datatype) = inferred_datatype(&content) {
                    literal.insert(
                        "@datatype".to_string(),
                        JsonValue::String(datatype.to_string()),
                    );
                }
                literal.insert(
                    "@content".to_string(),
                    JsonValue::String(scalar_to_string(&content, prop)?),
                );
                for (key, val) in obj {
                    if key == TEXT_KEY {
                        continue;
                    }
                    if !key.starts_with(ATTR_PREFIX) {
                        return Err(Error::Structural(format!(
                            "literal annotation {:?} carries nested content under {:?}",
                            prop, key
                        )));
                    }
                    literal.insert(key.clone(), val.clone());
                }
                self.write_element(out, "meta", &JsonValue::Object(literal), depth)
            }
            JsonValue::Object(obj) => {
                let mut resource = Map::new();
                resource.insert(
                    "@xsi:type".to_string(),
                    JsonValue::String("nex:ResourceMeta".to_string()),
                );
                resource.insert("@rel".to_string(), JsonValue::String(prop.to_string()));
                for (key, val) in obj {
                    resource.insert(key.clone(), val.clone());
                }
                self.write_element(out, "meta", &JsonValue::Object(resource), depth)
            }
            scalar => {
                let mut literal = Map::new();
                literal.insert(
                    "@xsi:type".to_string(),
                    JsonValue::String("nex:LiteralMeta".to_string()),
                );
                literal.insert("@property".to_string(), JsonValue::String(prop.to_string()));
                if let Some(datatype) = inferred_datatype(scalar) {
                    literal.insert(
                        "@datatype".to_string(),
                        JsonValue::String(datatype.to_string()),
                    );
                }
                literal.insert(
                    "@content".to_string(),
                    JsonValue::String(scalar_to_string(scalar, prop)?),
                );
                self.write_element(out, "meta", &JsonValue::Object(literal), depth)
            }
        }
    }

    fn write_text_element(&self, out: &mut String, tag: &str, text: &str, depth: usize) {
        out.push_str(&self.indent.repeat(depth));
        out.push('<');
        out.push_str(tag);
        out.push('>');
        out.push_str(&escape_text(text));
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
        out.push_str(&self.newline);
    }
}

/// Infer the `datatype` attribute for a reconstructed literal meta
fn inferred_datatype(value: &JsonValue) -> Option<&'static str> {
    match value {
        JsonValue::Bool(_) => Some("xsd:boolean"),
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => Some("xsd:integer"),
        JsonValue::Number(_) => Some("xsd:double"),
        _ => None,
    }
}

fn scalar_to_string(value: &JsonValue, context: &str) -> Result<String> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Bool(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        JsonValue::Number(n) => Ok(n.to_string()),
        _ => Err(Error::Structural(format!(
            "value of {:?} is not a scalar",
            context
        ))),
    }
}

fn collect_xmlns(attrs: &mut Vec<(String, String)>, value: &JsonValue) -> Result<()> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::Structural("@xmlns is not an object".to_string()))?;
    for (prefix, uri) in obj {
        let uri = uri
            .as_str()
            .ok_or_else(|| Error::Structural("@xmlns entry is not a string".to_string()))?;
        let name = if prefix == "$" {
            "xmlns".to_string()
        } else {
            format!("xmlns:{}", prefix)
        };
        attrs.push((name, uri.to_string()));
    }
    Ok(())
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_simple_document() {
        let doc = json!({"nexml": {
            "@id": "study",
            "@nexml2json": "1.0.0",
            "otus": {"@id": "otus1", "otu": {"@id": "t1"}}
        }});
        let xml = NexmlWriter::new().write_document(&doc).unwrap();
        let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                        <nexml id=\"study\">\n\
                        \x20 <otus id=\"otus1\">\n\
                        \x20   <otu id=\"t1\"/>\n\
                        \x20 </otus>\n\
                        </nexml>\n";
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_compact_output_has_trailing_newline() {
        let doc = json!({"nexml": {"@id": "s"}});
        let xml = NexmlWriter::compact().write_document(&doc).unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><nexml id=\"s\"/>\n"
        );
    }

    #[test]
    fn test_literal_meta_reconstruction() {
        let doc = json!({"otu": {"@id": "t1", "^ot:ottId": 770315}});
        let xml = NexmlWriter::compact().write_document(&doc).unwrap();
        assert!(xml.contains(
            "<meta xsi:type=\"nex:LiteralMeta\" property=\"ot:ottId\" \
             datatype=\"xsd:integer\" content=\"770315\"/>"
        ));
    }

    #[test]
    fn test_boolean_meta_datatype() {
        let doc = json!({"tree": {"@id": "tr", "^ot:unrootedTree": true}});
        let xml = NexmlWriter::compact().write_document(&doc).unwrap();
        assert!(xml.contains("datatype=\"xsd:boolean\""));
        assert!(xml.contains("content=\"true\""));
    }

    #[test]
    fn test_resource_meta_reconstruction() {
        let doc = json!({"nexml": {
            "@id": "s",
            "^ot:dataDeposit": {"@href": "http://example.org/d"}
        }});
        let xml = NexmlWriter::compact().write_document(&doc).unwrap();
        assert!(xml.contains(
            "<meta xsi:type=\"nex:ResourceMeta\" rel=\"ot:dataDeposit\" \
             href=\"http://example.org/d\"/>"
        ));
    }

    #[test]
    fn test_repeated_annotation_array() {
        let doc = json!({"nexml": {"@id": "s", "^ot:tag": ["a", "b"]}});
        let xml = NexmlWriter::compact().write_document(&doc).unwrap();
        assert_eq!(xml.matches("<meta ").count(), 2);
    }

    #[test]
    fn test_root_atts_default_injection() {
        let doc = json!({"nexml": {"@id": "s"}});
        let xml = NexmlWriter::compact()
            .with_root_atts_default(true)
            .write_document(&doc)
            .unwrap();
        assert!(xml.contains("xmlns=\"http://www.nexml.org/2009\""));
        assert!(xml.contains("xmlns:ot="));
        assert!(xml.contains("version=\"0.9\""));
    }

    #[test]
    fn test_root_atts_default_not_injected_when_present() {
        let doc = json!({"nexml": {"@xmlns": {"$": "http://example.org/ns"}}});
        let xml = NexmlWriter::compact()
            .with_root_atts_default(true)
            .write_document(&doc)
            .unwrap();
        assert!(xml.contains("xmlns=\"http://example.org/ns\""));
        assert!(!xml.contains("http://www.nexml.org/2009"));
    }

    #[test]
    fn test_mixed_meta_conventions_fatal() {
        let doc = json!({"otu": {
            "^ot:ottId": 1,
            "meta": {"@property": "ot:ottId", "@content": "1"}
        }});
        let err = NexmlWriter::compact().write_document(&doc).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn test_escaping() {
        let doc = json!({"otu": {"@label": "a \"b\" & c", "$": "1 < 2"}});
        let xml = NexmlWriter::compact().write_document(&doc).unwrap();
        assert!(xml.contains("label=\"a &quot;b&quot; &amp; c\""));
        assert!(xml.contains(">1 &lt; 2</otu>"));
    }

    #[test]
    fn test_version_tag_never_serialized() {
        let doc = json!({"nexml": {"@nexml2json": "1.0.0", "@id": "s"}});
        let xml = NexmlWriter::compact().write_document(&doc).unwrap();
        assert!(!xml.contains("nexml2json"));
    }

    #[test]
    fn test_multiple_root_keys_fatal() {
        let doc = json!({"nexml": {}, "extra": {}});
        let err = NexmlWriter::compact().write_document(&doc).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }
}
