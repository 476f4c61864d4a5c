//! Mapping runtime
//!
//! Executes rules in order and emits one contribution per rule. `skip`
//! rules are collected first and filter everything, including the
//! contributions a reader produced before the mapping ran.

use crate::dsl::{Mapping, MappingRule};
use crate::{Error, Result};
use nx_ir::{Contribution, DataPath, Provenance, Value};
use tracing::{debug, trace};

/// Value at a slash path (`/scan/axes/0`) inside a JSON document
///
/// Object members are matched by key, array elements by index. A leading
/// `/` is optional; the empty path addresses the whole document.
#[must_use]
pub fn lookup<'d>(document: &'d serde_json::Value, path: &str) -> Option<&'d serde_json::Value> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .try_fold(document, |current, key| match current {
            serde_json::Value::Object(members) => members.get(key),
            serde_json::Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Output path of a contribution path; `CONCEPT[name]` and `name` agree
fn output_path(path: &str) -> String {
    DataPath::parse(path).map_or_else(
        |_| path.trim_end_matches('/').to_string(),
        |parsed| parsed.output_path(),
    )
}

/// Whether `path` equals `prefix` or lies beneath it, compared as output paths
fn is_within(path: &str, prefix: &str) -> bool {
    let path = output_path(path);
    let prefix = output_path(prefix);
    let prefix = prefix.trim_end_matches('/');
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Runtime for executing mappings
pub struct MappingRuntime<'d> {
    /// Producer name recorded in provenance
    source: String,

    /// Document `field` rules read from
    data: Option<&'d serde_json::Value>,
}

impl<'d> MappingRuntime<'d> {
    /// Create a runtime whose contributions are attributed to `source`
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            data: None,
        }
    }

    /// Read `field` rules from `data`
    #[must_use]
    pub fn with_data(mut self, data: &'d serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Apply `mapping` after the contributions already in `base`
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSource`] or [`Error::NoData`] when a required
    /// `field` rule finds nothing, and [`Error::Value`] when a value cannot
    /// be represented (objects, `null` literals, ragged arrays).
    pub fn apply(&self, mapping: &Mapping, base: Vec<Contribution>) -> Result<Vec<Contribution>> {
        let skipped: Vec<&str> = mapping
            .rules
            .iter()
            .filter_map(|rule| match rule {
                MappingRule::Skip { target } => Some(target.as_str()),
                _ => None,
            })
            .collect();
        let keep = |path: &str| !skipped.iter().any(|prefix| is_within(path, prefix));

        let before = base.len();
        let mut out: Vec<Contribution> = base.into_iter().filter(|c| keep(&c.path)).collect();
        let mut dropped = before - out.len();

        for (index, rule) in mapping.rules.iter().enumerate() {
            let Some(contribution) = self.execute_rule(index, rule)? else {
                continue;
            };
            let contribution = contribution.with_provenance(
                Provenance::new(&self.source).at(format!("{}#{index}", mapping.name)),
            );
            if keep(&contribution.path) {
                out.push(contribution);
            } else {
                dropped += 1;
            }
        }

        debug!(
            mapping = %mapping.name,
            contributions = out.len(),
            skipped = dropped,
            "Applied mapping"
        );
        Ok(out)
    }

    fn execute_rule(&self, index: usize, rule: &MappingRule) -> Result<Option<Contribution>> {
        let contribution = match rule {
            MappingRule::Value {
                target,
                value,
                unit,
            } => with_unit(
                Contribution::data(target, Value::from_json(value)?),
                unit.as_deref(),
            ),
            MappingRule::Field {
                source,
                target,
                unit,
                optional,
            } => {
                let Some(data) = self.data else {
                    return Err(Error::NoData {
                        rule: index,
                        source_path: source.clone(),
                    });
                };
                match lookup(data, source).filter(|v| !v.is_null()) {
                    Some(found) => with_unit(
                        Contribution::data(target, Value::from_json(found)?),
                        unit.as_deref(),
                    ),
                    None if *optional => {
                        trace!(rule = index, source = %source, "Optional source absent");
                        return Ok(None);
                    }
                    None => return Err(Error::missing_source(index, source.as_str())),
                }
            }
            MappingRule::Link { target, to } => Contribution::link(target, to),
            MappingRule::Concat {
                target,
                values,
                separator,
            } => Contribution::concat(
                target,
                values.clone(),
                separator.clone().unwrap_or_default(),
            ),
            MappingRule::Skip { .. } => return Ok(None),
        };
        Ok(Some(contribution))
    }
}

fn with_unit(contribution: Contribution, unit: Option<&str>) -> Contribution {
    match unit {
        Some(unit) => contribution.with_unit(unit),
        None => contribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::MappingDsl;
    use nx_ir::{ContributionValue, Scalar};
    use serde_json::json;

    fn mapping(yaml: &str) -> Mapping {
        MappingDsl::parse(yaml).unwrap()
    }

    #[test]
    fn test_lookup_by_slash_path() {
        let doc = json!({"scan": {"axes": [{"name": "two_theta"}], "count": 3}});
        assert_eq!(lookup(&doc, "/scan/count"), Some(&json!(3)));
        assert_eq!(lookup(&doc, "scan/axes/0/name"), Some(&json!("two_theta")));
        assert_eq!(lookup(&doc, "/"), Some(&doc));
        assert_eq!(lookup(&doc, "/scan/axes/7"), None);
        assert_eq!(lookup(&doc, "/scan/count/deeper"), None);
    }

    #[test]
    fn test_rules_become_contributions_in_order() {
        let data = json!({"beam": {"energy": 8.0, "profile": [[1, 2], [3, 4]]}});
        let mapping = mapping(
            r"
name: beam_map
rules:
  - type: field
    source: /beam/energy
    target: /beam/energy
    unit: keV
  - type: field
    source: /beam/profile
    target: /beam/profile
  - type: value
    target: /beam/mode
    value: single
  - type: link
    target: /beam/alias
    to: /beam/energy
",
        );
        let out = MappingRuntime::new("test")
            .with_data(&data)
            .apply(&mapping, Vec::new())
            .unwrap();
        let paths: Vec<&str> = out.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(
            paths,
            ["/beam/energy", "/beam/profile", "/beam/mode", "/beam/alias"]
        );
        assert_eq!(out[0].unit.as_deref(), Some("keV"));
        assert_eq!(out[0].provenance.to_string(), "test (beam_map#0)");
        match &out[1].value {
            ContributionValue::Data(value) => assert_eq!(value.shape(), &[2, 2]),
            other => panic!("expected data, got {other:?}"),
        }
        match &out[2].value {
            ContributionValue::Data(value) => {
                assert_eq!(value.as_scalar(), Some(&Scalar::Str("single".into())));
            }
            other => panic!("expected data, got {other:?}"),
        }
        assert!(matches!(&out[3].value, ContributionValue::Link { target } if target == "/beam/energy"));
    }

    #[test]
    fn test_skip_filters_reader_output_and_rules() {
        let mapping = mapping(
            r"
name: m
rules:
  - type: value
    target: /ENTRY[entry]/operator/name
    value: someone
  - type: skip
    target: /ENTRY[entry]/operator
",
        );
        let base = vec![
            Contribution::data("/ENTRY[entry]/operator", "x"),
            Contribution::data("/ENTRY[entry]/operator_id", 4_i64),
        ];
        let out = MappingRuntime::new("test").apply(&mapping, base).unwrap();
        let paths: Vec<&str> = out.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, ["/ENTRY[entry]/operator_id"]);
    }

    #[test]
    fn test_skip_matches_any_spelling_of_the_path() {
        let mapping = mapping(
            r"
name: m
rules:
  - type: skip
    target: /ENTRY[entry]/operator
",
        );
        let base = vec![
            Contribution::data("/entry/operator", "x"),
            Contribution::data("/entry/operator/name", "someone"),
            Contribution::data("/ENTRY[entry]/USER[operator]/@role", "pi"),
            Contribution::data("/entry/operator_id", 4_i64),
        ];
        let out = MappingRuntime::new("test").apply(&mapping, base).unwrap();
        let paths: Vec<&str> = out.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, ["/entry/operator_id"]);

        assert!(is_within("/ENTRY[entry]/operator", "/entry/operator/"));
        assert!(!is_within("/entry/operators", "/ENTRY[entry]/operator"));
    }

    #[test]
    fn test_missing_sources() {
        let data = json!({"present": null});
        let required = mapping(
            "name: m\nrules:\n  - type: field\n    source: /absent\n    target: /x\n",
        );
        let err = MappingRuntime::new("test")
            .with_data(&data)
            .apply(&required, Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::MissingSource { rule: 0, .. }));

        let err = MappingRuntime::new("test")
            .apply(&required, Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::NoData { .. }));

        let optional = mapping(
            "name: m\nrules:\n  - type: field\n    source: /present\n    target: /x\n    optional: true\n",
        );
        let out = MappingRuntime::new("test")
            .with_data(&data)
            .apply(&optional, Vec::new())
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_object_values_are_rejected() {
        let data = json!({"beam": {"energy": 8.0}});
        let mapping = mapping("name: m\nrules:\n  - type: field\n    source: /beam\n    target: /x\n");
        let err = MappingRuntime::new("test")
            .with_data(&data)
            .apply(&mapping, Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::Value(_)));
    }
}
