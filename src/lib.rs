//! # nexson
//!
//! A Rust implementation of the NexSON conversion engine for phylogenetic
//! study documents.
//!
//! NeXML studies travel in four interchangeable encodings: the NeXML XML
//! text itself, a faithful BadgerFish JSON mapping, a "direct" HoneyBadgerFish
//! form where meta annotations become first-class `^`-prefixed keys, and a
//! "by-id" HoneyBadgerFish form where taxa, trees, nodes and edges are
//! re-grouped into id-keyed maps for random access. This crate converts
//! between any pair of them while preserving document order and meta
//! annotation typing.
//!
//! ## Example
//!
//! ```rust,ignore
//! use nexson::{convert, parse_nexml, ConvertOptions, JsonFlavor, NexsonFormat};
//!
//! // Parse NeXML text into the direct JSON form
//! let mut doc = parse_nexml(&xml_text, JsonFlavor::Direct)?;
//!
//! // Re-group it by id
//! convert(&mut doc, NexsonFormat::ByIdHbf, &ConvertOptions::new())?;
//!
//! // And back again
//! convert(&mut doc, NexsonFormat::DirectHbf, &ConvertOptions::new())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;

// XML layer
pub mod documents;
pub mod namespaces;
pub mod writer;

// JSON layer
pub mod converters;
pub mod formats;
pub mod meta;
pub mod ordered;

// Orchestration
pub mod convert;

// Re-exports for convenience
pub use convert::{
    convert, convert_document, converted, parse_nexml, to_json_string, write_json, write_nexml,
    ConvertOptions, JsonWriteOptions,
};
pub use converters::{JsonFlavor, StructuralBuilder};
pub use error::{Error, Result};
pub use formats::{can_convert, detect, NexsonFormat};
pub use writer::NexmlWriter;

/// Version of the nexson library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// NeXML namespace
pub const NEXML_NAMESPACE: &str = "http://www.nexml.org/2009";

/// Open Tree of Life term namespace
pub const OT_NAMESPACE: &str = "http://purl.org/opentree-terms#";

/// XML Schema instance namespace
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
