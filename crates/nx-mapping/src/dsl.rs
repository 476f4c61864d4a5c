//! Mapping rule definitions
//!
//! Mappings are YAML documents; JSON is accepted as well since it parses
//! as YAML.

use crate::{Error, Result};
use nx_ir::ConcatPart;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A named, ordered list of rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mapping {
    /// Mapping name, recorded in contribution provenance
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Rules in application order
    #[serde(default)]
    pub rules: Vec<MappingRule>,
}

/// Individual mapping rule
///
/// Targets use the data-converter path syntax (`/ENTRY[entry]/title`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MappingRule {
    /// Literal value
    Value {
        target: String,
        value: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },

    /// Value copied from the data document by slash path
    Field {
        source: String,
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
        /// Skip the rule instead of failing when the source is absent
        #[serde(default)]
        optional: bool,
    },

    /// Alias of another output path
    Link { target: String, to: String },

    /// String assembled from other entries and literals
    Concat {
        target: String,
        values: Vec<ConcatPart>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        separator: Option<String>,
    },

    /// Drop every contribution at or beneath the target
    Skip { target: String },
}

impl MappingRule {
    /// Target path of the rule
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            MappingRule::Value { target, .. }
            | MappingRule::Field { target, .. }
            | MappingRule::Link { target, .. }
            | MappingRule::Concat { target, .. }
            | MappingRule::Skip { target } => target,
        }
    }
}

/// Mapping parser
pub struct MappingDsl;

impl MappingDsl {
    /// Parse a mapping from YAML or JSON text
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] with the failing location when known.
    pub fn parse(text: &str) -> Result<Mapping> {
        serde_yaml::from_str(text).map_err(|e| match e.location() {
            Some(at) => Error::Parse(format!("{e} (line {}, column {})", at.line(), at.column())),
            None => Error::Parse(e.to_string()),
        })
    }

    /// Parse a mapping file
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn parse_file(path: &Path) -> Result<Mapping> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Serialize a mapping to YAML
    ///
    /// # Errors
    ///
    /// Returns an error when serialization fails.
    pub fn to_yaml(mapping: &Mapping) -> Result<String> {
        Ok(serde_yaml::to_string(mapping)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_rule_kind() {
        let yaml = r#"
name: xrd_lab
rules:
  - type: value
    target: /ENTRY[entry]/definition
    value: NXxrd_scan
  - type: field
    source: /scan/wavelength
    target: /ENTRY[entry]/INSTRUMENT[instrument]/beam/incident_wavelength
    unit: angstrom
  - type: link
    target: /ENTRY[entry]/DATA[data]/wavelength
    to: /entry/instrument/beam/incident_wavelength
  - type: concat
    target: /ENTRY[entry]/title
    values:
      - type: literal
        value: "Scan"
      - type: field
        path: /ENTRY[entry]/definition
    separator: " "
  - type: skip
    target: /ENTRY[entry]/operator
"#;
        let mapping = MappingDsl::parse(yaml).unwrap();
        assert_eq!(mapping.name, "xrd_lab");
        assert_eq!(mapping.rules.len(), 5);

        match &mapping.rules[1] {
            MappingRule::Field {
                source,
                unit,
                optional,
                ..
            } => {
                assert_eq!(source, "/scan/wavelength");
                assert_eq!(unit.as_deref(), Some("angstrom"));
                assert!(!optional);
            }
            other => panic!("Expected Field rule, got {other:?}"),
        }
        match &mapping.rules[3] {
            MappingRule::Concat {
                values, separator, ..
            } => {
                assert_eq!(values.len(), 2);
                assert_eq!(separator.as_deref(), Some(" "));
            }
            other => panic!("Expected Concat rule, got {other:?}"),
        }
        assert_eq!(mapping.rules[4].target(), "/ENTRY[entry]/operator");
    }

    #[test]
    fn test_json_mappings_are_accepted() {
        let json = r#"{"name": "m", "rules": [{"type": "value", "target": "/x", "value": [1, 2]}]}"#;
        let mapping = MappingDsl::parse(json).unwrap();
        assert!(matches!(&mapping.rules[0], MappingRule::Value { value, .. } if value.is_array()));
    }

    #[test]
    fn test_yaml_output_parses_back() {
        let mapping = Mapping {
            name: "m".into(),
            description: Some("demo".into()),
            rules: vec![MappingRule::Skip {
                target: "/ENTRY[entry]/notes".into(),
            }],
        };
        let yaml = MappingDsl::to_yaml(&mapping).unwrap();
        assert_eq!(MappingDsl::parse(&yaml).unwrap(), mapping);
    }

    #[test]
    fn test_parse_errors_name_the_problem() {
        let err = MappingDsl::parse("name: m\nrules:\n  - type: teleport\n").unwrap_err();
        assert!(err.to_string().contains("teleport"), "{err}");
        assert!(MappingDsl::parse("rules: []").is_err());
    }
}
