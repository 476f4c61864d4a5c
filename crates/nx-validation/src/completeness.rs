//! Completeness and cardinality checks over a populated tree
//!
//! The template is walked from the root. Each template entry is matched
//! against the populated instances beneath every existing parent instance:
//!
//! * a missing required field or attribute is an error;
//! * a missing required group is descended virtually so that its required
//!   descendants are reported, falling back to the group itself;
//! * a missing recommended node is a warning and optional nodes are skipped
//!   together with everything inside them.

use crate::reporter::{DiagnosticCode, DiagnosticsReport};
use nx_schema::{NodeKind, Occurrence};
use nx_template::{ConcretePath, FieldSpec, Template};
use std::collections::HashMap;
use std::fmt::Write as _;
use tracing::debug;

/// Output paths of populated instances, keyed by template pattern
#[derive(Debug, Default)]
struct Instances {
    by_pattern: HashMap<String, Vec<String>>,
}

impl Instances {
    /// Every documented path contributes all of its prefixes; a unit
    /// supplied with the value stands for its `@units` attribute
    fn collect<'p>(paths: impl IntoIterator<Item = (&'p ConcretePath, bool)>) -> Self {
        let mut instances = Self::default();
        for (path, has_unit) in paths {
            let Some(pattern) = &path.pattern else { continue };
            let mut key = String::new();
            let mut output = String::new();
            for (template_segment, segment) in pattern.segments().iter().zip(&path.segments) {
                let _ = write!(key, "/{template_segment}");
                output.push('/');
                if segment.kind == NodeKind::Attribute {
                    output.push('@');
                }
                output.push_str(&segment.name);
                instances.add(&key, &output);
            }
            if has_unit {
                instances.add(&format!("{key}/@units"), &format!("{output}/@units"));
            }
        }
        instances
    }

    fn add(&mut self, key: &str, output: &str) {
        let list = self.by_pattern.entry(key.to_string()).or_default();
        if !list.iter().any(|o| o == output) {
            list.push(output.to_string());
        }
    }

    /// Instances of `pattern` directly beneath the `parent` output path
    fn under(&self, pattern: &str, parent: &str) -> Vec<&str> {
        self.by_pattern
            .get(pattern)
            .into_iter()
            .flatten()
            .filter(|output| output.rfind('/').is_some_and(|i| &output[..i] == parent))
            .map(String::as_str)
            .collect()
    }
}

struct Walker<'a> {
    template: &'a Template,
    instances: &'a Instances,
    report: &'a mut DiagnosticsReport,
}

impl Walker<'_> {
    /// Check the children of `parent_key`; `parent` is `None` below a
    /// missing required group
    fn visit(&mut self, parent_key: &str, parent: Option<&str>, display: &str) {
        let template = self.template;
        let instances = self.instances;
        for spec in template.children_of(parent_key) {
            let key = spec.path.to_string();
            let found = parent.map(|p| instances.under(&key, p)).unwrap_or_default();
            if found.is_empty() {
                self.missing(spec, &key, display);
                continue;
            }

            self.check_cardinality(spec, found.len(), display);
            if spec.kind != NodeKind::Attribute {
                for instance in found {
                    self.visit(&key, Some(instance), instance);
                }
            }
        }
    }

    fn missing(&mut self, spec: &FieldSpec, key: &str, display: &str) {
        let Some(segment) = spec.path.last() else { return };
        let shown = format!("{display}/{segment}");
        match spec.occurrence {
            Occurrence::Required if spec.kind == NodeKind::Group => {
                let before = self.report.errors().count();
                self.visit(key, None, &shown);
                if self.report.errors().count() == before {
                    self.report.error(
                        DiagnosticCode::MissingRequiredField,
                        shown,
                        format!(
                            "required group ({}) is absent",
                            spec.nx_class.as_deref().unwrap_or("NXobject")
                        ),
                    );
                }
            }
            Occurrence::Required => {
                self.report.error(
                    DiagnosticCode::MissingRequiredField,
                    shown,
                    format!("required {} is absent", spec.kind),
                );
            }
            Occurrence::Recommended => {
                self.report.warning(
                    DiagnosticCode::RecommendedFieldMissing,
                    shown,
                    format!("recommended {} is absent", spec.kind),
                );
            }
            Occurrence::Optional => {}
        }
    }

    fn check_cardinality(&mut self, spec: &FieldSpec, count: usize, display: &str) {
        let min = spec.min_occurs.unwrap_or(0) as usize;
        let within_max = spec.max_occurs.is_none_or(|max| max.allows(count));
        if count >= min && within_max {
            return;
        }
        let Some(segment) = spec.path.last() else { return };
        let max = spec
            .max_occurs
            .map_or_else(|| "unbounded".to_string(), |max| max.to_string());
        self.report.error(
            DiagnosticCode::CardinalityViolation,
            format!("{display}/{segment}"),
            format!("{count} instance(s) found, expected between {min} and {max}"),
        );
    }
}

/// Report missing required and recommended nodes and cardinality
/// violations for the populated `paths`, each flagged with whether a unit
/// accompanied its value
pub fn check_completeness<'p>(
    template: &Template,
    paths: impl IntoIterator<Item = (&'p ConcretePath, bool)>,
    report: &mut DiagnosticsReport,
) {
    let instances = Instances::collect(paths);
    let before = report.len();
    let mut walker = Walker {
        template,
        instances: &instances,
        report: &mut *report,
    };
    walker.visit("", Some(""), "");
    debug!(
        patterns = instances.by_pattern.len(),
        findings = report.len() - before,
        "Completeness pass finished"
    );
}
