//! Strictness levels

use nx_validation::DiagnosticsReport;
use serde::{Deserialize, Serialize};

/// How much of a report blocks the write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrictnessLevel {
    /// Only errors block; warnings are reported
    #[default]
    Permissive,

    /// Warnings block as well
    Strict,
}

impl StrictnessLevel {
    /// Whether `report` stops the conversion before anything is written
    #[must_use]
    pub fn rejects(self, report: &DiagnosticsReport) -> bool {
        match self {
            StrictnessLevel::Permissive => report.has_errors(),
            StrictnessLevel::Strict => report.has_errors() || report.has_warnings(),
        }
    }
}
