//! Generic structural builder
//!
//! Recursively turns a parsed [`Element`] tree into one of the
//! nested-by-tag JSON conventions. Attributes become `@`-prefixed keys,
//! trimmed text goes under `$`, children group by tag (a repeated tag
//! becomes an array in document order). The HoneyBadgerFish flavor
//! additionally routes every `meta` child through the meta classifier and
//! merges the resulting annotation under a `^`-prefixed key.

use std::collections::HashMap;

use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use super::{ATTR_PREFIX, META_PREFIX, TEXT_KEY};
use crate::documents::Element;
use crate::error::{Error, Result};
use crate::formats::{DIRECT_VERSION, NEXML2JSON_KEY};
use crate::meta::{
    classify_xsi_type, literal_annotation, xmlns_object, MetaAnnotation, MetaCategory,
};

/// Which nested-by-tag convention to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonFlavor {
    /// Legacy BadgerFish: `meta` stays an ordinary nested element
    BadgerFish,
    /// Direct HoneyBadgerFish: `meta` flattens into typed properties
    Direct,
}

/// Recursive XML-to-JSON structural converter
#[derive(Debug, Clone, Copy)]
pub struct StructuralBuilder {
    flavor: JsonFlavor,
}

impl StructuralBuilder {
    /// Create a builder for the given flavor
    pub fn new(flavor: JsonFlavor) -> Self {
        Self { flavor }
    }

    /// Convert a whole document rooted at `root`
    ///
    /// The result has a single top-level key (the root tag); the direct
    /// flavor stamps the `@nexml2json` version tag on the root element.
    pub fn build_document(&self, root: &Element) -> Result<JsonValue> {
        let mut node = self.build_node(root)?;
        if self.flavor == JsonFlavor::Direct {
            node.insert(
                NEXML2JSON_KEY.to_string(),
                JsonValue::String(DIRECT_VERSION.to_string()),
            );
        }
        let mut value = JsonValue::Object(node);
        cull_redundant_about(&mut value);

        let mut wrapper = Map::new();
        wrapper.insert(root.tag.clone(), value);
        Ok(JsonValue::Object(wrapper))
    }

    /// Convert one element into its key/value mapping
    pub fn build_node(&self, elem: &Element) -> Result<Map<String, JsonValue>> {
        let mut node = Map::new();

        for (name, value) in &elem.attributes {
            node.insert(
                format!("{}{}", ATTR_PREFIX, name),
                JsonValue::String(value.clone()),
            );
        }
        if !elem.xmlns.is_empty() {
            node.insert("@xmlns".to_string(), xmlns_object(&elem.xmlns));
        }
        if let Some(text) = &elem.text {
            node.insert(TEXT_KEY.to_string(), JsonValue::String(text.clone()));
        }

        // First-seen namespace per child key, for the collision check.
        let mut child_namespaces: HashMap<String, Option<String>> = HashMap::new();

        for child in &elem.children {
            if self.flavor == JsonFlavor::Direct && child.local_name() == "meta" {
                if let Some(annotation) = self.classify_meta(child)? {
                    let (key, value) = annotation.into_pair();
                    let key = format!("{}{}", META_PREFIX, key);
                    if node.contains_key(&key) {
                        return Err(Error::Structural(format!(
                            "annotation key collision on {:?} under <{}>",
                            key, elem.tag
                        )));
                    }
                    node.insert(key, value);
                }
                continue;
            }

            let key = child.tag.clone();
            match child_namespaces.get(&key) {
                Some(first) if *first != child.namespace => {
                    return Err(Error::Structural(format!(
                        "tag {:?} appears under <{}> in namespaces {:?} and {:?}; \
                         collapsing them to one JSON key would lose information",
                        key, elem.tag, first, child.namespace
                    )));
                }
                Some(_) => {}
                None => {
                    child_namespaces.insert(key.clone(), child.namespace.clone());
                }
            }

            let value = JsonValue::Object(self.build_node(child)?);
            match node.get_mut(&key) {
                None => {
                    node.insert(key, value);
                }
                Some(JsonValue::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = JsonValue::Array(vec![first, value]);
                }
            }
        }

        Ok(node)
    }

    /// Classify one `meta` child into an annotation, or skip it
    ///
    /// Skips (with a diagnostic) are non-fatal: noisy legacy metadata must
    /// not abort a whole-document conversion. Coercion failures propagate.
    fn classify_meta(&self, elem: &Element) -> Result<Option<MetaAnnotation>> {
        let Some(xsi_type) = elem.attribute("xsi:type") else {
            warn!(tag = %elem.tag, "meta element without xsi:type, skipping");
            return Ok(None);
        };
        match classify_xsi_type(xsi_type) {
            MetaCategory::Literal => literal_annotation(elem),
            MetaCategory::Resource => self.resource_annotation(elem),
            MetaCategory::Unrecognized => {
                warn!(xsi_type, "unrecognized meta dialect, skipping");
                Ok(None)
            }
        }
    }

    /// Build a resource annotation from a `meta` element classified as
    /// [`MetaCategory::Resource`]
    fn resource_annotation(&self, elem: &Element) -> Result<Option<MetaAnnotation>> {
        let Some(rel) = elem.attribute_local("rel") else {
            warn!(tag = %elem.tag, "resource meta without rel attribute, skipping");
            return Ok(None);
        };
        let rel = rel.to_string();

        // The object is the element itself minus the consumed attributes;
        // nested children (including nested meta) convert recursively.
        let mut object = self.build_node(elem)?;
        object.remove("@rel");
        object.remove("@xsi:type");

        if object.is_empty() {
            warn!(rel, "resource meta with neither reference nor content, skipping");
            return Ok(None);
        }
        Ok(Some(MetaAnnotation::Resource {
            rel,
            object: JsonValue::Object(object),
        }))
    }
}

/// Recursively delete `@about` entries that restate their own `@id`
///
/// A self-reference adds no information and breaks the XML round trip if
/// re-emitted.
pub fn cull_redundant_about(value: &mut JsonValue) {
    match value {
        JsonValue::Object(obj) => {
            let redundant = match (obj.get("@about"), obj.get("@id")) {
                (Some(JsonValue::String(about)), Some(JsonValue::String(id))) => {
                    about.strip_prefix('#') == Some(id.as_str())
                }
                _ => false,
            };
            if redundant {
                obj.remove("@about");
            }
            for child in obj.values_mut() {
                cull_redundant_about(child);
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                cull_redundant_about(item);
            }
        }
        _ => {}
    }
}
