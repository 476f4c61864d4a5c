//! Contributions produced by readers and mapping configuration

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a contributed value came from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Provenance {
    /// Producer identifier (reader name, `config`, ...)
    pub source: String,

    /// Location inside the producer (file, rule index, source key)
    pub location: Option<String>,
}

/// One fragment of a string concatenation directive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConcatPart {
    /// Value of another populated path
    Field { path: String },

    /// Literal text
    Literal { value: String },
}

/// Payload of a contribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContributionValue {
    /// Direct data
    Data(Value),

    /// Same data as another path, written as a link
    Link { target: String },

    /// String assembled from fragments joined by `separator`
    Concat {
        parts: Vec<ConcatPart>,
        separator: String,
    },
}

/// One (path-pattern, value, provenance) unit supplied to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    /// Data-converter style key, e.g. `/ENTRY[entry]/beam/energy`
    pub path: String,

    /// Value or directive
    pub value: ContributionValue,

    /// Unit accompanying the value
    pub unit: Option<String>,

    /// Origin of the value
    pub provenance: Provenance,
}

impl Provenance {
    /// Create provenance for a producer
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            location: None,
        }
    }

    /// Attach a location inside the producer
    #[must_use]
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} ({location})", self.source),
            None => f.write_str(&self.source),
        }
    }
}

impl Contribution {
    /// Contribution carrying data
    pub fn data(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: ContributionValue::Data(value.into()),
            unit: None,
            provenance: Provenance::default(),
        }
    }

    /// Contribution aliasing another path
    pub fn link(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: ContributionValue::Link {
                target: target.into(),
            },
            unit: None,
            provenance: Provenance::default(),
        }
    }

    /// Contribution assembling a string from fragments
    pub fn concat(
        path: impl Into<String>,
        parts: Vec<ConcatPart>,
        separator: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            value: ContributionValue::Concat {
                parts,
                separator: separator.into(),
            },
            unit: None,
            provenance: Provenance::default(),
        }
    }

    /// Set the unit
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the provenance
    #[must_use]
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_set_unit_and_provenance() {
        let c = Contribution::data("/beam/energy", 8.0)
            .with_unit("keV")
            .with_provenance(Provenance::new("xrd").at("scan.json"));
        assert_eq!(c.unit.as_deref(), Some("keV"));
        assert_eq!(c.provenance.to_string(), "xrd (scan.json)");
        assert_eq!(c.value, ContributionValue::Data(Value::float(8.0)));
    }

    #[test]
    fn test_concat_part_serde_tagging() {
        let part: ConcatPart =
            serde_json::from_str(r#"{"type": "field", "path": "/sample/name"}"#).unwrap();
        assert_eq!(
            part,
            ConcatPart::Field {
                path: "/sample/name".to_string()
            }
        );
    }
}
