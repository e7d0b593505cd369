//! Conversion orchestration
//!
//! The public entry points for moving a study document between the four
//! encodings. JSON-native pairs (direct ⇄ by-id) convert in place;
//! any pair with a BadgerFish endpoint routes through NeXML text, the
//! only common denominator, which costs a full re-serialize and
//! re-parse and is therefore the expensive path.

use serde_json::Value as JsonValue;

use crate::converters::{by_id, JsonFlavor, StructuralBuilder};
use crate::documents::XmlDocument;
use crate::error::{Error, Result};
use crate::formats::{self, NexsonFormat};
use crate::writer::NexmlWriter;

/// Options governing a conversion
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Source format; detected from the document when None
    pub source: Option<NexsonFormat>,
    /// Discard source-format structures once the target is built; false
    /// is the "fat" migration mode where both coexist
    pub remove_old_structures: bool,
    /// On failure, guarantee the input document is left unmodified (costs
    /// a defensive copy)
    pub pristine_if_invalid: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            source: None,
            remove_old_structures: true,
            pristine_if_invalid: false,
        }
    }
}

impl ConvertOptions {
    /// Create options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit source format, skipping detection
    pub fn with_source(mut self, source: NexsonFormat) -> Self {
        self.source = Some(source);
        self
    }

    /// Set whether source-format structures are discarded
    pub fn with_remove_old_structures(mut self, remove: bool) -> Self {
        self.remove_old_structures = remove;
        self
    }

    /// Set the failure-atomicity guarantee
    pub fn with_pristine_if_invalid(mut self, pristine: bool) -> Self {
        self.pristine_if_invalid = pristine;
        self
    }
}

/// Convert an in-memory JSON document to `target`, in place
///
/// `NexsonFormat::Nexml` endpoints are rejected here: XML lives in text,
/// not in a JSON value. Use [`convert_document`], [`parse_nexml`] or
/// [`write_nexml`] for those legs.
pub fn convert(doc: &mut JsonValue, target: NexsonFormat, opts: &ConvertOptions) -> Result<()> {
    let source = match opts.source {
        Some(source) => source,
        None => formats::detect(doc)?,
    };
    if !formats::can_convert(source, target) {
        return Err(Error::UnsupportedConversion {
            from: source,
            to: target,
        });
    }
    if source == target {
        return Ok(());
    }
    if source == NexsonFormat::Nexml || target == NexsonFormat::Nexml {
        return Err(Error::UnsupportedConversion {
            from: source,
            to: target,
        });
    }

    if opts.pristine_if_invalid {
        let mut work = doc.clone();
        convert_in_place(&mut work, source, target, opts)?;
        *doc = work;
        Ok(())
    } else {
        convert_in_place(doc, source, target, opts)
    }
}

/// By-value convenience over [`convert`]
pub fn converted(
    mut doc: JsonValue,
    target: NexsonFormat,
    opts: &ConvertOptions,
) -> Result<JsonValue> {
    convert(&mut doc, target, opts)?;
    Ok(doc)
}

fn convert_in_place(
    doc: &mut JsonValue,
    source: NexsonFormat,
    target: NexsonFormat,
    opts: &ConvertOptions,
) -> Result<()> {
    use NexsonFormat::*;
    match (source, target) {
        (DirectHbf, ByIdHbf) => by_id::compact(doc, opts.remove_old_structures),
        (ByIdHbf, DirectHbf) => by_id::expand(doc, opts.remove_old_structures),
        (BadgerFish, DirectHbf) => {
            *doc = reparse(doc, JsonFlavor::Direct)?;
            Ok(())
        }
        (BadgerFish, ByIdHbf) => {
            *doc = reparse(doc, JsonFlavor::Direct)?;
            by_id::compact(doc, opts.remove_old_structures)
        }
        (DirectHbf, BadgerFish) => {
            *doc = reparse(doc, JsonFlavor::BadgerFish)?;
            Ok(())
        }
        (ByIdHbf, BadgerFish) => {
            // The intermediate direct form is rebuilt anyway, so old
            // structures never survive this leg.
            by_id::expand(doc, true)?;
            *doc = reparse(doc, JsonFlavor::BadgerFish)?;
            Ok(())
        }
        _ => Err(Error::UnsupportedConversion {
            from: source,
            to: target,
        }),
    }
}

/// Round-trip a nested-by-tag document through NeXML text
fn reparse(doc: &JsonValue, flavor: JsonFlavor) -> Result<JsonValue> {
    let xml = NexmlWriter::new().write_document(doc)?;
    parse_nexml(&xml, flavor)
}

/// Parse NeXML text into the requested nested-by-tag JSON flavor
pub fn parse_nexml(xml: &str, flavor: JsonFlavor) -> Result<JsonValue> {
    let doc = XmlDocument::from_string(xml)?;
    let root = doc
        .root()
        .ok_or_else(|| Error::Xml("document has no root element".to_string()))?;
    StructuralBuilder::new(flavor).build_document(root)
}

/// Serialize a JSON document as NeXML text
///
/// By-id documents are expanded (on a copy) first; the writer itself
/// only accepts nested-by-tag shapes.
pub fn write_nexml(doc: &JsonValue, writer: &NexmlWriter) -> Result<String> {
    match formats::detect(doc)? {
        NexsonFormat::ByIdHbf => {
            let mut direct = doc.clone();
            by_id::expand(&mut direct, true)?;
            writer.write_document(&direct)
        }
        _ => writer.write_document(doc),
    }
}

/// Options for JSON text output
#[derive(Debug, Clone)]
pub struct JsonWriteOptions {
    /// Indentation string; None produces compact output
    pub indent: Option<String>,
    /// Sort object keys lexically (diff stability, never semantically
    /// required)
    pub sort_keys: bool,
}

impl Default for JsonWriteOptions {
    fn default() -> Self {
        Self {
            indent: Some("  ".to_string()),
            sort_keys: false,
        }
    }
}

impl JsonWriteOptions {
    /// Create options with defaults (two-space indent, insertion order)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the indentation string (None for compact output)
    pub fn with_indent(mut self, indent: Option<String>) -> Self {
        self.indent = indent;
        self
    }

    /// Set lexical key sorting
    pub fn with_sort_keys(mut self, sort: bool) -> Self {
        self.sort_keys = sort;
        self
    }
}

/// Write a JSON document to a stream
///
/// This is the call the persistence layer uses; the engine itself never
/// opens files.
pub fn write_json(
    doc: &JsonValue,
    out: &mut dyn std::io::Write,
    opts: &JsonWriteOptions,
) -> Result<()> {
    let sorted;
    let doc = if opts.sort_keys {
        sorted = sorted_keys(doc);
        &sorted
    } else {
        doc
    };
    match &opts.indent {
        Some(indent) => {
            let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
            let mut ser = serde_json::Serializer::with_formatter(&mut *out, formatter);
            serde::Serialize::serialize(doc, &mut ser)?;
        }
        None => serde_json::to_writer(&mut *out, doc)?,
    }
    Ok(())
}

/// Render a JSON document to a string
pub fn to_json_string(doc: &JsonValue, opts: &JsonWriteOptions) -> Result<String> {
    let mut buf = Vec::new();
    write_json(doc, &mut buf, opts)?;
    String::from_utf8(buf).map_err(|e| Error::Structural(format!("non-UTF-8 JSON output: {}", e)))
}

/// Recursively rebuild a value with lexically sorted object keys
fn sorted_keys(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                sorted.insert(key.clone(), sorted_keys(&obj[key]));
            }
            JsonValue::Object(sorted)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(sorted_keys).collect()),
        other => other.clone(),
    }
}

/// Convert between any two encodings at the text level
///
/// When `source` is None the format is sniffed: text starting with `<`
/// is NeXML, anything else is JSON and carries its own version tag.
pub fn convert_document(
    text: &str,
    source: Option<NexsonFormat>,
    target: NexsonFormat,
    opts: &ConvertOptions,
) -> Result<String> {
    let source = match source {
        Some(source) => source,
        None => {
            if text.trim_start().starts_with('<') {
                NexsonFormat::Nexml
            } else {
                formats::detect(&serde_json::from_str(text)?)?
            }
        }
    };

    match (source, target) {
        (NexsonFormat::Nexml, NexsonFormat::Nexml) => Ok(text.to_string()),
        (NexsonFormat::Nexml, json_target) => {
            let flavor = if json_target == NexsonFormat::BadgerFish {
                JsonFlavor::BadgerFish
            } else {
                JsonFlavor::Direct
            };
            let mut doc = parse_nexml(text, flavor)?;
            if json_target == NexsonFormat::ByIdHbf {
                by_id::compact(&mut doc, opts.remove_old_structures)?;
            }
            to_json_string(&doc, &JsonWriteOptions::default())
        }
        (_, NexsonFormat::Nexml) => {
            let doc: JsonValue = serde_json::from_str(text)?;
            let mut direct = doc;
            if formats::detect(&direct)? == NexsonFormat::ByIdHbf {
                by_id::expand(&mut direct, true)?;
            }
            NexmlWriter::new().write_document(&direct)
        }
        (json_source, json_target) => {
            let mut doc: JsonValue = serde_json::from_str(text)?;
            let leg_opts = opts.clone().with_source(json_source);
            convert(&mut doc, json_target, &leg_opts)?;
            to_json_string(&doc, &JsonWriteOptions::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn direct_doc() -> JsonValue {
        json!({"nexml": {
            "@id": "study",
            "@nexml2json": "1.0.0",
            "otus": {"@id": "otus1", "otu": [{"@id": "t1"}, {"@id": "t2"}]}
        }})
    }

    #[test]
    fn test_identity_is_noop() {
        let mut doc = direct_doc();
        let before = doc.clone();
        convert(&mut doc, NexsonFormat::DirectHbf, &ConvertOptions::new()).unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn test_source_detected_when_omitted() {
        let mut doc = direct_doc();
        convert(&mut doc, NexsonFormat::ByIdHbf, &ConvertOptions::new()).unwrap();
        assert_eq!(formats::detect(&doc).unwrap(), NexsonFormat::ByIdHbf);
    }

    #[test]
    fn test_nexml_endpoint_rejected_at_value_level() {
        let mut doc = direct_doc();
        let err = convert(&mut doc, NexsonFormat::Nexml, &ConvertOptions::new()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConversion { .. }));
    }

    #[test]
    fn test_badgerfish_round_trips_through_xml() {
        let mut doc = direct_doc();
        convert(&mut doc, NexsonFormat::BadgerFish, &ConvertOptions::new()).unwrap();
        assert_eq!(formats::detect(&doc).unwrap(), NexsonFormat::BadgerFish);
        assert!(doc["nexml"].get("@nexml2json").is_none());

        convert(&mut doc, NexsonFormat::DirectHbf, &ConvertOptions::new()).unwrap();
        assert_eq!(doc, direct_doc());
    }

    #[test]
    fn test_pristine_leaves_input_untouched_on_failure() {
        // Duplicate edge targets make compaction fail.
        let bad = json!({"nexml": {
            "@nexml2json": "1.0.0",
            "trees": {"@id": "trees1", "tree": {
                "@id": "tree1",
                "node": [{"@id": "n1"}, {"@id": "n2"}],
                "edge": [
                    {"@id": "e1", "@source": "n1", "@target": "n2"},
                    {"@id": "e2", "@source": "n2", "@target": "n2"}
                ]
            }}
        }});
        let mut doc = bad.clone();
        let opts = ConvertOptions::new().with_pristine_if_invalid(true);
        let err = convert(&mut doc, NexsonFormat::ByIdHbf, &opts).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
        assert_eq!(doc, bad);
    }

    #[test]
    fn test_explicit_source_overrides_detection() {
        let mut doc = json!({"nexml": {"@id": "s"}});
        // Detected as BadgerFish, but the caller insists it is direct.
        let opts = ConvertOptions::new().with_source(NexsonFormat::DirectHbf);
        convert(&mut doc, NexsonFormat::ByIdHbf, &opts).unwrap();
        assert_eq!(doc["nexml"]["@nexml2json"], json!("1.2.1"));
    }

    #[test]
    fn test_write_json_sorted_and_compact() {
        let doc = json!({"b": 1, "a": {"d": 2, "c": 3}});
        let opts = JsonWriteOptions::new()
            .with_indent(None)
            .with_sort_keys(true);
        let text = to_json_string(&doc, &opts).unwrap();
        assert_eq!(text, r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn test_write_json_custom_indent() {
        let doc = json!({"a": 1});
        let opts = JsonWriteOptions::new().with_indent(Some("\t".to_string()));
        let text = to_json_string(&doc, &opts).unwrap();
        assert_eq!(text, "{\n\t\"a\": 1\n}");
    }

    #[test]
    fn test_convert_document_sniffs_xml() {
        let xml = r#"<nexml id="s"><otus id="o1"><otu id="t1"/></otus></nexml>"#;
        let out = convert_document(xml, None, NexsonFormat::ByIdHbf, &ConvertOptions::new())
            .unwrap();
        let doc: JsonValue = serde_json::from_str(&out).unwrap();
        assert_eq!(doc["nexml"]["@nexml2json"], json!("1.2.1"));
        assert_eq!(doc["nexml"]["^ot:otusElementOrder"], json!(["o1"]));
    }

    #[test]
    fn test_convert_document_json_to_nexml() {
        let text = to_json_string(&direct_doc(), &JsonWriteOptions::default()).unwrap();
        let xml = convert_document(&text, None, NexsonFormat::Nexml, &ConvertOptions::new())
            .unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<otu id=\"t1\"/>"));
        assert!(xml.ends_with('\n'));
    }
}
