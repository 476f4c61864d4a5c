#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # nx-ir
//!
//! Intermediate representation shared by the NXDL template engine.
//!
//! Readers and mapping configuration produce [`Contribution`]s: a data path
//! written in the data-converter syntax (`/ENTRY[entry]/beam/energy`), a
//! typed [`Value`] or a directive (link, concatenation), an optional unit and
//! the [`Provenance`] of the value. The population engine consumes them in
//! order.

/// Contributions and the directives they may carry.
pub mod contribution;
/// Data-converter style paths (`/ENTRY[entry]/sample/@units`).
pub mod path;
/// Typed scalar and array values.
pub mod value;

pub use contribution::{ConcatPart, Contribution, ContributionValue, Provenance};
pub use path::{DataPath, DataSegment};
pub use value::{ArrayData, DataType, Scalar, Value};

use thiserror::Error;

/// Errors that can occur when working with the IR
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid array shape {shape:?}: {reason}")]
    InvalidShape { shape: Vec<usize>, reason: String },

    #[error("Conversion error in {context}: {message}")]
    Conversion { context: String, message: String },
}

impl Error {
    /// Build an invalid-path error with input path and parsing reason.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build a conversion error with conversion context.
    pub fn conversion(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Crate-local result type for IR operations.
pub type Result<T> = std::result::Result<T, Error>;
