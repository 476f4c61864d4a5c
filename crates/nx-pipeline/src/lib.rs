#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # nx-pipeline
//!
//! Conversion orchestration: run a reader over the inputs, build the
//! template for the requested application definition, populate and
//! validate it, then write the container and commit it atomically.
//!
//! Nothing is written when validation fails (or, in strict mode, when it
//! only warns), and a cancelled run stops at the next checkpoint without
//! leaving output behind.
//!
//! Committed containers can be read back and inspected: each node is
//! annotated with the schema concept it instantiates and the default
//! plottable data is located.

/// Conversion settings.
pub mod config;
/// The conversion driver.
pub mod converter;
/// Container inspection.
pub mod inspect;
/// Strictness levels.
pub mod policies;

pub use config::ConversionConfig;
pub use converter::{ConversionOutcome, Converter};
pub use inspect::{
    InspectionReport, Inspector, NodeAnnotation, NodeRole, Plottable, find_default_plottable,
};
pub use policies::StrictnessLevel;

use nx_validation::DiagnosticsReport;
use thiserror::Error;

/// Errors that can occur in a conversion
#[derive(Error, Debug)]
pub enum Error {
    #[error("Pipeline error during {operation} for '{path}': {message}")]
    Pipeline {
        operation: String,
        path: String,
        message: String,
    },

    #[error("Conversion rejected with {errors} error(s) and {warnings} warning(s)")]
    Validation {
        errors: usize,
        warnings: usize,
        report: DiagnosticsReport,
    },

    #[error("IO error during {operation} for '{path}': {message}")]
    Io {
        operation: String,
        path: String,
        message: String,
    },

    #[error(transparent)]
    Schema(#[from] nx_schema::Error),

    #[error(transparent)]
    Template(#[from] nx_template::Error),

    #[error(transparent)]
    Engine(#[from] nx_validation::Error),

    #[error(transparent)]
    Mapping(#[from] nx_mapping::Error),

    #[error(transparent)]
    Container(#[from] nx_adapter_container::Error),
}

impl Error {
    /// Create a structured pipeline error with operation/path context.
    pub fn pipeline(
        operation: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Pipeline {
            operation: operation.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a structured I/O error with operation/path context.
    pub fn io(
        operation: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Rejection carrying the report that caused it
    #[must_use]
    pub fn validation(report: DiagnosticsReport) -> Self {
        Self::Validation {
            errors: report.errors().count(),
            warnings: report.warnings().count(),
            report,
        }
    }

    /// Diagnostics behind a rejected conversion
    #[must_use]
    pub fn report(&self) -> Option<&DiagnosticsReport> {
        match self {
            Error::Validation { report, .. } => Some(report),
            _ => None,
        }
    }

    /// Whether the run stopped because it was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Engine(nx_validation::Error::Cancelled(_)))
    }
}

/// Crate-local result type for conversions.
pub type Result<T> = std::result::Result<T, Error>;
