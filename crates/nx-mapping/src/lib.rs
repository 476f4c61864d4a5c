#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # nx-mapping
//!
//! Mapping configuration and the reader plugin interface.
//!
//! A [`Mapping`] is an ordered list of rules written in YAML or JSON. The
//! [`MappingRuntime`] turns them into contributions for the population
//! engine, reading values out of a data document where a rule asks for it.
//! Readers implement [`Reader`]; the shipped [`JsonMapReader`] loads JSON or
//! YAML data files and applies the mapping to them.
//!
//! ```yaml
//! name: xrd_lab
//! rules:
//!   - type: value
//!     target: /ENTRY[entry]/definition
//!     value: NXxrd_scan
//!   - type: field
//!     source: /scan/wavelength
//!     target: /ENTRY[entry]/INSTRUMENT[instrument]/beam/incident_wavelength
//!     unit: angstrom
//!   - type: link
//!     target: /ENTRY[entry]/DATA[data]/wavelength
//!     to: /entry/instrument/beam/incident_wavelength
//!   - type: skip
//!     target: /ENTRY[entry]/operator
//! ```

/// Mapping rule definitions and parsing.
pub mod dsl;
/// Reader plugin interface, JSON-map reader and registry.
pub mod reader;
/// Rule execution against a data document.
pub mod runtime;

pub use dsl::{Mapping, MappingDsl, MappingRule};
pub use reader::{JsonMapReader, Reader, ReaderOutput, ReaderRegistry};
pub use runtime::{MappingRuntime, lookup};

use thiserror::Error;

/// Errors that can occur while loading mappings or reading inputs
#[derive(Error, Debug)]
pub enum Error {
    #[error("Mapping parse error: {0}")]
    Parse(String),

    #[error("Rule {rule}: no value at '{source_path}' in the data document")]
    MissingSource { rule: usize, source_path: String },

    #[error("Rule {rule} reads '{source_path}' but no data document was supplied")]
    NoData { rule: usize, source_path: String },

    #[error("Unsupported input file: {0}")]
    UnsupportedInput(String),

    #[error("Unknown reader: {0}")]
    UnknownReader(String),

    #[error("Reader registry error: {0}")]
    Registry(String),

    #[error(transparent)]
    Value(#[from] nx_ir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Build an error for a rule whose source path has no value
    pub fn missing_source(rule: usize, source_path: impl Into<String>) -> Self {
        Self::MissingSource {
            rule,
            source_path: source_path.into(),
        }
    }
}

/// Crate-local result type for mapping operations.
pub type Result<T> = std::result::Result<T, Error>;
