//! Meta element classification
//!
//! NeXML carries RDFa-style metadata in `meta` elements whose `xsi:type`
//! names one of two dialects: `LiteralMeta` (a scalar typed fact) or
//! `ResourceMeta` (a reference/relational fact). The HoneyBadgerFish
//! conventions flatten these into `^`-prefixed properties on the owning
//! node instead of keeping them as nested children.
//!
//! Classification is a pure function of the element. Unrecognized dialects
//! and valueless elements are non-fatal (logged, skipped); a value that
//! fails its declared datatype is the distinct [`CoercionError`]
//! condition.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use crate::documents::Element;
use crate::error::{CoercionError, Result};

/// Matches `LiteralMeta` with any (or no) namespace prefix
static LITERAL_META_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[^:]+:)?LiteralMeta$").unwrap());

/// Matches `ResourceMeta` with any (or no) namespace prefix
static RESOURCE_META_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[^:]+:)?ResourceMeta$").unwrap());

/// Outcome of classifying a `meta` element's `xsi:type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCategory {
    /// A scalar typed fact (`…LiteralMeta`)
    Literal,
    /// A reference/relational fact (`…ResourceMeta`)
    Resource,
    /// Neither dialect; the element is skipped, not fatal
    Unrecognized,
}

/// Classify an `xsi:type` attribute value, namespace-prefix-agnostic
pub fn classify_xsi_type(xsi_type: &str) -> MetaCategory {
    if LITERAL_META_RE.is_match(xsi_type) {
        MetaCategory::Literal
    } else if RESOURCE_META_RE.is_match(xsi_type) {
        MetaCategory::Resource
    } else {
        MetaCategory::Unrecognized
    }
}

/// A flattened metadata fact ready to attach to its owning node
#[derive(Debug, Clone, PartialEq)]
pub enum MetaAnnotation {
    /// `(property, coerced value)` from a LiteralMeta element
    Literal {
        /// The `property` attribute (annotation key, without `^`)
        property: String,
        /// The coerced value
        value: JsonValue,
    },
    /// `(rel, object)` from a ResourceMeta element
    Resource {
        /// The `rel` attribute (annotation key, without `^`)
        rel: String,
        /// Reference attributes and nested content
        object: JsonValue,
    },
}

impl MetaAnnotation {
    /// The annotation key (no `^` prefix)
    pub fn key(&self) -> &str {
        match self {
            MetaAnnotation::Literal { property, .. } => property,
            MetaAnnotation::Resource { rel, .. } => rel,
        }
    }

    /// Decompose into the `(key, value)` pair the builder merges
    pub fn into_pair(self) -> (String, JsonValue) {
        match self {
            MetaAnnotation::Literal { property, value } => (property, value),
            MetaAnnotation::Resource { rel, object } => (rel, object),
        }
    }
}

/// Coerce a literal value according to its declared `xsd:` datatype
///
/// Unrecognized datatypes leave the value as an uncoerced string (logged);
/// a lexical form outside the declared datatype is a [`CoercionError`].
pub fn coerce_literal(property: &str, datatype: &str, raw: &str) -> Result<JsonValue> {
    let local = match datatype.split_once(':') {
        Some((_, local)) => local,
        None => datatype,
    };
    let fail = || CoercionError::new(property, datatype, raw);

    let value = match local {
        "string" => JsonValue::String(raw.to_string()),
        "int" | "integer" | "long" => {
            let i: i64 = raw.trim().parse().map_err(|_| fail())?;
            JsonValue::from(i)
        }
        "float" | "double" => {
            let f: f64 = raw.trim().parse().map_err(|_| fail())?;
            serde_json::Number::from_f64(f)
                .map(JsonValue::Number)
                .ok_or_else(fail)?
        }
        "boolean" => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => JsonValue::Bool(true),
            "false" | "0" => JsonValue::Bool(false),
            _ => return Err(fail().into()),
        },
        _ => {
            warn!(property, datatype, "unrecognized datatype, leaving value uncoerced");
            JsonValue::String(raw.to_string())
        }
    };
    Ok(value)
}

/// Attribute names a literal meta element consumes positionally
fn is_consumed_literal_attr(name: &str) -> bool {
    matches!(name, "content" | "datatype" | "property" | "id") || name == "xsi:type"
}

/// Build a literal annotation from a `meta` element already classified as
/// [`MetaCategory::Literal`]
///
/// Returns `Ok(None)` (non-fatal, logged) when no simple annotation is
/// possible: missing `property`, no value, or nested element children.
/// Returns the typed coercion error when a declared datatype rejects the
/// value.
pub fn literal_annotation(elem: &Element) -> Result<Option<MetaAnnotation>> {
    if !elem.children.is_empty() {
        warn!(tag = %elem.tag, "literal meta with nested elements, skipping");
        return Ok(None);
    }
    let property = match elem.attribute_local("property") {
        Some(p) => p.to_string(),
        None => {
            warn!(tag = %elem.tag, "literal meta without property attribute, skipping");
            return Ok(None);
        }
    };
    let raw = match elem.attribute_local("content").or(elem.text.as_deref()) {
        Some(v) => v.to_string(),
        None => {
            warn!(property, "literal meta without content or text, skipping");
            return Ok(None);
        }
    };

    let value = match elem.attribute_local("datatype") {
        Some(datatype) => coerce_literal(&property, datatype, &raw)?,
        None => JsonValue::String(raw),
    };

    // Attributes not consumed above wrap the value in an object; a bare
    // scalar is emitted otherwise.
    let own_id = elem.attribute_local("id");
    let mut extras = Map::new();
    for (name, attr_value) in &elem.attributes {
        if is_consumed_literal_attr(name) {
            continue;
        }
        // A self-referential @about restates the element's own id.
        if name == "about" {
            if let Some(id) = own_id {
                if attr_value.strip_prefix('#') == Some(id) {
                    continue;
                }
            }
        }
        extras.insert(format!("@{}", name), JsonValue::String(attr_value.clone()));
    }
    if !elem.xmlns.is_empty() {
        extras.insert("@xmlns".to_string(), xmlns_object(&elem.xmlns));
    }

    let value = if extras.is_empty() {
        value
    } else {
        extras.insert("$".to_string(), value);
        JsonValue::Object(extras)
    };
    Ok(Some(MetaAnnotation::Literal { property, value }))
}

/// Render xmlns declarations as a nested namespace object
///
/// The default namespace goes under `$`, prefixed declarations under their
/// prefix.
pub fn xmlns_object(decls: &[(String, String)]) -> JsonValue {
    let mut obj = Map::new();
    for (prefix, uri) in decls {
        let key = if prefix.is_empty() {
            "$".to_string()
        } else {
            prefix.clone()
        };
        obj.insert(key, JsonValue::String(uri.clone()));
    }
    JsonValue::Object(obj)
}
