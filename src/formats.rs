//! NexSON format registry
//!
//! The four physical encodings of a study document form a closed set:
//! NeXML itself plus three JSON conventions distinguished by the
//! `@nexml2json` version tag. A JSON document without the tag is legacy
//! BadgerFish by definition, not an error.

use std::fmt;
use std::str::FromStr;

use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Key carrying the JSON convention version tag on the root element
pub const NEXML2JSON_KEY: &str = "@nexml2json";

/// Version tag for the legacy BadgerFish convention (never emitted; the
/// tag's absence identifies BadgerFish)
pub const BADGERFISH_VERSION: &str = "0.0.0";

/// Version tag for direct HoneyBadgerFish (nested-by-tag, flattened meta)
pub const DIRECT_VERSION: &str = "1.0.0";

/// Version tag for by-id HoneyBadgerFish (indexed by identifier)
pub const BY_ID_VERSION: &str = "1.2.1";

/// The four document encodings the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NexsonFormat {
    /// NeXML XML text
    Nexml,
    /// Legacy BadgerFish JSON (meta as ordinary nested elements, no tag)
    BadgerFish,
    /// Direct HoneyBadgerFish JSON (1.0.x)
    DirectHbf,
    /// By-id ("optimal") HoneyBadgerFish JSON (1.2.x)
    ByIdHbf,
}

impl NexsonFormat {
    /// The version tag emitted for this convention, if any
    pub fn version_tag(&self) -> Option<&'static str> {
        match self {
            NexsonFormat::Nexml | NexsonFormat::BadgerFish => None,
            NexsonFormat::DirectHbf => Some(DIRECT_VERSION),
            NexsonFormat::ByIdHbf => Some(BY_ID_VERSION),
        }
    }

    /// Whether this is one of the JSON conventions
    pub fn is_json(&self) -> bool {
        !matches!(self, NexsonFormat::Nexml)
    }
}

impl fmt::Display for NexsonFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NexsonFormat::Nexml => "nexml",
            NexsonFormat::BadgerFish => "badgerfish",
            NexsonFormat::DirectHbf => "nexson-1.0",
            NexsonFormat::ByIdHbf => "nexson-1.2",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for NexsonFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nexml" | "xml" => Ok(NexsonFormat::Nexml),
            "badgerfish" | "nexson-0.0" => Ok(NexsonFormat::BadgerFish),
            "direct" | "nexson-1.0" => Ok(NexsonFormat::DirectHbf),
            "byid" | "optimal" | "nexson-1.2" => Ok(NexsonFormat::ByIdHbf),
            other => Err(Error::UnknownVersion(other.to_string())),
        }
    }
}

/// Classify a `@nexml2json` tag value
pub fn format_for_version(version: &str) -> Result<NexsonFormat> {
    if version.starts_with("0.") {
        Ok(NexsonFormat::BadgerFish)
    } else if version.starts_with("1.0") {
        Ok(NexsonFormat::DirectHbf)
    } else if version.starts_with("1.2") {
        Ok(NexsonFormat::ByIdHbf)
    } else {
        Err(Error::UnknownVersion(version.to_string()))
    }
}

/// Detect the convention of an in-memory JSON document
///
/// Reads the version tag under the single root key; its absence means
/// legacy BadgerFish. The tag is the single piece of ground truth, nothing
/// else about the document shape is consulted.
pub fn detect(doc: &JsonValue) -> Result<NexsonFormat> {
    let obj = doc
        .as_object()
        .ok_or_else(|| Error::Structural("document is not a JSON object".to_string()))?;

    // The tag lives on the root element's mapping; tolerate documents that
    // are handed in already unwrapped.
    let root = if obj.len() == 1 {
        match obj.values().next() {
            Some(JsonValue::Object(inner)) => inner,
            _ => obj,
        }
    } else {
        obj
    };

    match root.get(NEXML2JSON_KEY) {
        None => Ok(NexsonFormat::BadgerFish),
        Some(JsonValue::String(version)) => format_for_version(version),
        Some(other) => Err(Error::UnknownVersion(other.to_string())),
    }
}

/// Report whether the registry supports converting `from` into `to`
///
/// The supported graph: identity on every format, Direct↔ById directly,
/// BadgerFish↔{Direct, ById} by round-tripping through XML, and NeXML to
/// or from each JSON convention. The format set is closed, so every pair
/// of [`NexsonFormat`] values is reachable; anything outside the set never
/// produces a format value in the first place (detection rejects unknown
/// version tags).
pub fn can_convert(from: NexsonFormat, to: NexsonFormat) -> bool {
    use NexsonFormat::*;
    matches!(
        (from, to),
        (Nexml, _)
            | (_, Nexml)
            | (BadgerFish, BadgerFish)
            | (BadgerFish, DirectHbf)
            | (BadgerFish, ByIdHbf)
            | (DirectHbf, BadgerFish)
            | (DirectHbf, DirectHbf)
            | (DirectHbf, ByIdHbf)
            | (ByIdHbf, BadgerFish)
            | (ByIdHbf, DirectHbf)
            | (ByIdHbf, ByIdHbf)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_direct() {
        let doc = json!({"nexml": {"@nexml2json": "1.0.0"}});
        assert_eq!(detect(&doc).unwrap(), NexsonFormat::DirectHbf);
    }

    #[test]
    fn test_detect_by_id_minor_versions() {
        for v in ["1.2.0", "1.2.1"] {
            let doc = json!({"nexml": {"@nexml2json": v}});
            assert_eq!(detect(&doc).unwrap(), NexsonFormat::ByIdHbf);
        }
    }

    #[test]
    fn test_detect_missing_tag_is_badgerfish() {
        let doc = json!({"nexml": {"@id": "study"}});
        assert_eq!(detect(&doc).unwrap(), NexsonFormat::BadgerFish);
    }

    #[test]
    fn test_detect_explicit_legacy_tag() {
        let doc = json!({"nexml": {"@nexml2json": "0.0.0"}});
        assert_eq!(detect(&doc).unwrap(), NexsonFormat::BadgerFish);
    }

    #[test]
    fn test_detect_unknown_version() {
        let doc = json!({"nexml": {"@nexml2json": "9.9.9"}});
        assert!(matches!(
            detect(&doc).unwrap_err(),
            Error::UnknownVersion(_)
        ));
    }

    #[test]
    fn test_detect_non_object_is_structural() {
        assert!(matches!(
            detect(&json!([1, 2])).unwrap_err(),
            Error::Structural(_)
        ));
    }

    #[test]
    fn test_convertible_pairs() {
        use NexsonFormat::*;
        assert!(can_convert(DirectHbf, ByIdHbf));
        assert!(can_convert(BadgerFish, ByIdHbf));
        assert!(can_convert(Nexml, DirectHbf));
        assert!(can_convert(ByIdHbf, Nexml));
        assert!(can_convert(DirectHbf, DirectHbf));
    }

    #[test]
    fn test_format_round_trip_names() {
        for f in [
            NexsonFormat::Nexml,
            NexsonFormat::BadgerFish,
            NexsonFormat::DirectHbf,
            NexsonFormat::ByIdHbf,
        ] {
            assert_eq!(f.to_string().parse::<NexsonFormat>().unwrap(), f);
        }
    }
}
