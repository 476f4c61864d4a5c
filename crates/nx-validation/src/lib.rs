#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # nx-validation
//!
//! Population and validation engine. Contributions are merged into a
//! [`nx_template::Template`] in order (last writer wins), link and
//! concatenation directives are resolved through an explicit dependency
//! graph, and the populated tree is checked for units, completeness and
//! cardinality. Data problems never abort the run: they accumulate in a
//! [`DiagnosticsReport`]. Only cancellation is an `Err`.
//!
//! ```no_run
//! use nx_ir::Contribution;
//! use nx_schema::SchemaLoader;
//! use nx_validation::{CancellationToken, PopulationEngine, ValidationConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let loader = SchemaLoader::from_paths(vec!["definitions".into()]);
//! let template = nx_template::build_template(&loader, "XRDMeasurement", &[])?;
//! let contributions = vec![Contribution::data("/beam/energy", 8.0).with_unit("keV")];
//!
//! let engine = PopulationEngine::new(&template, ValidationConfig::default());
//! let population = engine.populate(&contributions, &CancellationToken::new())?;
//! assert!(!population.is_failed());
//! # Ok(())
//! # }
//! ```

/// Cooperative cancellation.
pub mod cancel;
/// Completeness and cardinality checks.
pub mod completeness;
/// Contribution merge and directive resolution.
pub mod engine;
/// Link and concatenation dependency graph.
pub mod graph;
/// Diagnostics report.
pub mod reporter;
/// Value validation rules.
pub mod rules;

pub use cancel::CancellationToken;
pub use engine::{EntryValue, PopulatedEntry, Population, PopulationEngine};
pub use graph::DirectiveGraph;
pub use reporter::{Diagnostic, DiagnosticCode, DiagnosticsReport, RunStatus, Severity};
pub use rules::{RuleResult, storage_type};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a population run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Conversion cancelled during {0}")]
    Cancelled(String),
}

/// Crate-local result type for population runs.
pub type Result<T> = std::result::Result<T, Error>;

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Severity of a missing unit when the template does not require `@units`
    pub missing_unit: Severity,

    /// Keep entries that match no template path
    pub write_undocumented: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            missing_unit: Severity::Warning,
            write_undocumented: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_fill_missing_keys() {
        let config: ValidationConfig =
            serde_json::from_str(r#"{"missing_unit": "error"}"#).unwrap();
        assert_eq!(config.missing_unit, Severity::Error);
        assert!(config.write_undocumented);
    }
}
