//! Error types for nexson
//!
//! This module defines all error types used throughout the library.
//! The taxonomy separates fatal structural problems (which unwind
//! immediately) from the typed coercion condition that callers may choose
//! to tolerate per property. Non-fatal conditions (unrecognized metadata
//! dialects, empty resource annotations) never appear here at all; they
//! are logged where they are detected and the conversion continues.

use std::fmt;
use thiserror::Error;

use crate::formats::NexsonFormat;

/// Result type alias using nexson Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for nexson operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed XML input
    #[error("XML error: {0}")]
    Xml(String),

    /// Malformed JSON input
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Datatype coercion failure on a literal meta annotation
    #[error("coercion error: {0}")]
    Coercion(#[from] CoercionError),

    /// Structural invariant violation: the source document cannot be
    /// represented without loss
    #[error("structural error: {0}")]
    Structural(String),

    /// Conversion between two formats that the registry does not support
    #[error("unsupported conversion: {from} -> {to}")]
    UnsupportedConversion {
        /// Requested source format
        from: NexsonFormat,
        /// Requested target format
        to: NexsonFormat,
    },

    /// Unrecognized `@nexml2json` version tag value
    #[error("unrecognized nexml2json version: {0:?}")]
    UnknownVersion(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Typed coercion failure for a literal meta annotation
///
/// Distinct from "no value present": the value was there, a datatype was
/// declared, and the lexical form does not belong to that datatype.
#[derive(Debug, Clone)]
pub struct CoercionError {
    /// The `property` attribute of the offending meta element
    pub property: String,
    /// The declared `datatype` attribute
    pub datatype: String,
    /// The raw value that failed to coerce
    pub value: String,
}

impl CoercionError {
    /// Create a new coercion error
    pub fn new(
        property: impl Into<String>,
        datatype: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            property: property.into(),
            datatype: datatype.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot coerce {:?} to {} for property {:?}",
            self.value, self.datatype, self.property
        )
    }
}

impl std::error::Error for CoercionError {}
