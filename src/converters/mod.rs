//! Structural converters between the JSON conventions
//!
//! Two converters live here:
//! - [`direct`]: the generic structural builder turning a parsed XML tree
//!   into BadgerFish or direct HoneyBadgerFish JSON.
//! - [`by_id`]: the compactor/expander between direct (nested-by-tag) and
//!   by-id (indexed-by-identifier) HoneyBadgerFish.
//!
//! BadgerFish has no by-id variant; reaching it from the HoneyBadgerFish
//! forms always routes through NeXML text (see the orchestrator).

pub mod by_id;
pub mod direct;

pub use direct::{JsonFlavor, StructuralBuilder};

/// Reserved key for text content
pub const TEXT_KEY: &str = "$";

/// Prefix marking source-XML attributes
pub const ATTR_PREFIX: char = '@';

/// Prefix marking flattened meta annotations
pub const META_PREFIX: char = '^';
