//! Contribution merge and directive resolution

use crate::completeness::check_completeness;
use crate::graph::DirectiveGraph;
use crate::reporter::{DiagnosticCode, DiagnosticsReport, Severity};
use crate::rules::{validate_data_type, validate_enumeration, validate_instance_name, validate_rank};
use crate::{CancellationToken, Result, ValidationConfig};
use nx_ir::{ConcatPart, Contribution, ContributionValue, DataPath, Provenance, Value};
use nx_schema::{NodeKind, NxType};
use nx_template::{ConcretePath, ConcreteSegment, FieldSpec, SegmentName, Template, TemplateSegment};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, trace};

/// Value of a populated entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntryValue {
    Data(Value),
    /// Same data as the node at the target output path
    Link { target: String },
}

/// One concrete output node produced by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulatedEntry {
    pub path: ConcretePath,
    pub value: EntryValue,
    pub unit: Option<String>,
    /// Declared type of the matched template entry
    pub data_type: Option<NxType>,
    pub provenance: Provenance,
}

impl PopulatedEntry {
    #[must_use]
    pub fn output_path(&self) -> String {
        self.path.output_path()
    }
}

/// Result of one population run
#[derive(Debug, Clone, Default)]
pub struct Population {
    entries: Vec<PopulatedEntry>,
    report: DiagnosticsReport,
}

impl Population {
    /// Entries in first-write order
    #[must_use]
    pub fn entries(&self) -> &[PopulatedEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, output_path: &str) -> Option<&PopulatedEntry> {
        self.entries
            .iter()
            .find(|entry| entry.path.output_path() == output_path)
    }

    /// Data stored at `output_path`, `None` for links and absent paths
    #[must_use]
    pub fn value(&self, output_path: &str) -> Option<&Value> {
        match &self.get(output_path)?.value {
            EntryValue::Data(value) => Some(value),
            EntryValue::Link { .. } => None,
        }
    }

    #[must_use]
    pub fn report(&self) -> &DiagnosticsReport {
        &self.report
    }

    /// Whether the report holds at least one error
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.report.has_errors()
    }

    #[must_use]
    pub fn into_parts(self) -> (Vec<PopulatedEntry>, DiagnosticsReport) {
        (self.entries, self.report)
    }
}

#[derive(Debug, Clone)]
enum Part {
    /// Output path of the source node
    Field(String),
    Literal(String),
}

#[derive(Debug, Clone)]
enum Content {
    Data(Value),
    Link(String),
    Concat { parts: Vec<Part>, separator: String },
}

#[derive(Debug)]
struct Slot<'t> {
    path: ConcretePath,
    spec: Option<&'t FieldSpec>,
    content: Content,
    unit: Option<String>,
    provenance: Provenance,
}

/// Slots keyed by output path, kept in first-write order
#[derive(Debug, Default)]
struct Slots<'t> {
    slots: Vec<Option<Slot<'t>>>,
    index: HashMap<String, usize>,
}

impl<'t> Slots<'t> {
    fn get(&self, output: &str) -> Option<&Slot<'t>> {
        self.index.get(output).and_then(|&i| self.slots[i].as_ref())
    }

    fn get_mut(&mut self, output: &str) -> Option<&mut Slot<'t>> {
        let i = *self.index.get(output)?;
        self.slots[i].as_mut()
    }

    fn contains(&self, output: &str) -> bool {
        self.get(output).is_some()
    }

    /// Whether a node exists at `output` or anything was written beneath it
    fn covers(&self, output: &str) -> bool {
        if self.contains(output) {
            return true;
        }
        let prefix = format!("{output}/");
        self.index
            .iter()
            .any(|(key, &i)| key.starts_with(&prefix) && self.slots[i].is_some())
    }

    /// Store a slot; returns whether an earlier value was replaced
    fn put(&mut self, output: String, slot: Slot<'t>) -> bool {
        if let Some(&i) = self.index.get(&output) {
            return self.slots[i].replace(slot).is_some();
        }
        self.index.insert(output, self.slots.len());
        self.slots.push(Some(slot));
        false
    }

    fn remove(&mut self, output: &str) {
        if let Some(&i) = self.index.get(output) {
            self.slots[i] = None;
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Slot<'t>> {
        self.slots.iter().flatten()
    }

    fn into_entries(self) -> Vec<PopulatedEntry> {
        self.slots
            .into_iter()
            .flatten()
            .filter_map(|slot| {
                let value = match slot.content {
                    Content::Data(value) => EntryValue::Data(value),
                    Content::Link(target) => EntryValue::Link { target },
                    Content::Concat { .. } => return None,
                };
                Some(PopulatedEntry {
                    data_type: slot.spec.and_then(|spec| spec.data_type),
                    path: slot.path,
                    value,
                    unit: slot.unit,
                    provenance: slot.provenance,
                })
            })
            .collect()
    }
}

/// Merges contributions into a template and validates the result
pub struct PopulationEngine<'t> {
    template: &'t Template,
    config: ValidationConfig,
}

impl<'t> PopulationEngine<'t> {
    #[must_use]
    pub fn new(template: &'t Template, config: ValidationConfig) -> Self {
        Self { template, config }
    }

    /// Run one population over `contributions`, in order
    ///
    /// # Errors
    ///
    /// [`crate::Error::Cancelled`] when `cancel` fires between contributions
    /// or before the completeness pass. Data problems are reported in the
    /// returned [`Population`] instead.
    pub fn populate(
        &self,
        contributions: &[Contribution],
        cancel: &CancellationToken,
    ) -> Result<Population> {
        let mut report = DiagnosticsReport::new();
        let mut slots = Slots::default();

        for contribution in contributions {
            cancel.check("population")?;
            self.merge(contribution, &mut slots, &mut report);
        }
        self.resolve_directives(&mut slots, &mut report);

        cancel.check("validation")?;
        self.check_units(&slots, &mut report);
        check_completeness(
            self.template,
            slots.iter().map(|slot| (&slot.path, slot.unit.is_some())),
            &mut report,
        );

        let entries = slots.into_entries();
        info!(
            template = self.template.name(),
            contributions = contributions.len(),
            entries = entries.len(),
            errors = report.errors().count(),
            warnings = report.warnings().count(),
            "Population finished"
        );
        Ok(Population { entries, report })
    }

    fn merge(&self, contribution: &Contribution, slots: &mut Slots<'t>, report: &mut DiagnosticsReport) {
        let raw = contribution.path.as_str();
        let data_path = match DataPath::parse(raw) {
            Ok(path) => path,
            Err(err) => {
                report.error(DiagnosticCode::InvalidPath, raw, err.to_string());
                return;
            }
        };

        let path = if let Some(path) = self.locate(&data_path) {
            path
        } else {
            report.warning(
                DiagnosticCode::UnknownField,
                data_path.output_path(),
                format!("'{raw}' matches no path in {}", self.template.name()),
            );
            if !self.config.write_undocumented {
                return;
            }
            ConcretePath::undocumented(&data_path)
        };
        let output = path.output_path();

        if let Some(bad) = path
            .segments
            .iter()
            .find(|segment| !validate_instance_name(&segment.name).is_valid)
        {
            report.error(
                DiagnosticCode::InvalidPath,
                &output,
                format!("'{}' is not a valid instance name", bad.name),
            );
            return;
        }

        let spec = self.spec_for(&path);
        let content = match &contribution.value {
            ContributionValue::Data(value) => {
                if !check_value(spec, &output, value, report) {
                    debug!(path = %output, "Dropped contribution that failed validation");
                    return;
                }
                Content::Data(value.clone())
            }
            ContributionValue::Link { target } => match self.output_of(target) {
                Ok(target) => Content::Link(target),
                Err(err) => {
                    report.error(DiagnosticCode::InvalidPath, &output, err.to_string());
                    return;
                }
            },
            ContributionValue::Concat { parts, separator } => {
                let mut resolved = Vec::with_capacity(parts.len());
                for part in parts {
                    resolved.push(match part {
                        ConcatPart::Literal { value } => Part::Literal(value.clone()),
                        ConcatPart::Field { path } => match self.output_of(path) {
                            Ok(source) => Part::Field(source),
                            Err(err) => {
                                report.error(DiagnosticCode::InvalidPath, &output, err.to_string());
                                return;
                            }
                        },
                    });
                }
                Content::Concat {
                    parts: resolved,
                    separator: separator.clone(),
                }
            }
        };

        trace!(path = %output, source = %contribution.provenance, "Merged contribution");
        let slot = Slot {
            path,
            spec,
            content,
            unit: contribution.unit.clone(),
            provenance: contribution.provenance.clone(),
        };
        if slots.put(output.clone(), slot) {
            report.warning(
                DiagnosticCode::OverriddenValue,
                output,
                format!(
                    "earlier value replaced by a later contribution ({})",
                    contribution.provenance
                ),
            );
        }
    }

    /// Resolve a data path, accepting `@units` on fields that declare units
    fn locate(&self, path: &DataPath) -> Option<ConcretePath> {
        if let Some(found) = self.template.resolve(path) {
            return Some(found);
        }

        let (last, owner) = path.segments().split_last()?;
        if !(last.attribute && last.name == "units") || owner.is_empty() {
            return None;
        }
        let mut resolved = self
            .template
            .resolve(&DataPath::from_segments(owner.to_vec()))?;
        let owner_spec = self.spec_for(&resolved)?;
        if owner_spec.kind != NodeKind::Field || owner_spec.units.is_none() {
            return None;
        }
        resolved.segments.push(ConcreteSegment {
            kind: NodeKind::Attribute,
            name: last.name.clone(),
            concept: None,
            nx_class: None,
        });
        resolved.pattern = resolved.pattern.map(|pattern| {
            pattern.join(TemplateSegment {
                kind: NodeKind::Attribute,
                name: SegmentName::Literal(last.name.clone()),
                nx_class: None,
            })
        });
        Some(resolved)
    }

    fn spec_for(&self, path: &ConcretePath) -> Option<&'t FieldSpec> {
        let template: &'t Template = self.template;
        path.pattern
            .as_ref()
            .and_then(|pattern| template.get(&pattern.to_string()))
    }

    /// Output path a directive refers to, documented or not
    fn output_of(&self, raw: &str) -> nx_ir::Result<String> {
        let path = DataPath::parse(raw)?;
        Ok(self
            .locate(&path)
            .map_or_else(|| path.output_path(), |found| found.output_path()))
    }

    fn resolve_directives(&self, slots: &mut Slots<'t>, report: &mut DiagnosticsReport) {
        let mut graph = DirectiveGraph::new();
        let mut links = BTreeSet::new();
        let mut concats = BTreeSet::new();
        for slot in slots.iter() {
            let output = slot.path.output_path();
            match &slot.content {
                Content::Data(_) => continue,
                Content::Link(target) => {
                    graph.add_edge(output.clone(), target.clone());
                    links.insert(output);
                }
                Content::Concat { parts, .. } => {
                    graph.add_node(output.clone());
                    for part in parts {
                        if let Part::Field(source) = part {
                            graph.add_edge(output.clone(), source.clone());
                        }
                    }
                    concats.insert(output);
                }
            }
        }
        if links.is_empty() && concats.is_empty() {
            return;
        }

        let cyclic = graph.nodes_on_cycles();
        for path in &cyclic {
            report.error(
                DiagnosticCode::LinkCycle,
                path,
                format!(
                    "directive depends on itself through {}",
                    graph.dependencies(path).join(", ")
                ),
            );
            slots.remove(path);
        }

        let order = graph.topological_order(&cyclic);
        debug!(
            links = links.len(),
            concats = concats.len(),
            cyclic = cyclic.len(),
            "Resolving directives"
        );
        for path in order.iter().filter(|p| links.contains(p.as_str())) {
            resolve_link(path, slots, report);
        }
        for path in order.iter().filter(|p| concats.contains(p.as_str())) {
            resolve_concat(path, slots, report);
        }

        // A link may point at a concatenation that failed afterwards
        for path in &links {
            let target = match slots.get(path).map(|slot| &slot.content) {
                Some(Content::Link(target)) => target.clone(),
                _ => continue,
            };
            if !slots.covers(&target) {
                report.error(
                    DiagnosticCode::UnresolvedReference,
                    path,
                    format!("link target {target} was dropped"),
                );
                slots.remove(path);
            }
        }
    }

    fn check_units(&self, slots: &Slots<'t>, report: &mut DiagnosticsReport) {
        for slot in slots.iter() {
            let Some(spec) = slot.spec else { continue };
            if !spec.needs_unit() || !matches!(slot.content, Content::Data(_)) {
                continue;
            }
            let output = slot.path.output_path();
            if slot.unit.is_some() || slots.contains(&format!("{output}/@units")) {
                continue;
            }

            let units_required = self
                .template
                .get(&format!("{}/@units", spec.path))
                .is_some_and(FieldSpec::is_required);
            let severity = if units_required {
                Severity::Error
            } else {
                self.config.missing_unit
            };
            report.record(
                severity,
                DiagnosticCode::MissingUnit,
                output,
                format!(
                    "field declares unit category {} but no unit was supplied",
                    spec.units.as_deref().unwrap_or_default()
                ),
            );
        }
    }
}

/// Check a value against its spec; records every failure
fn check_value(
    spec: Option<&FieldSpec>,
    output: &str,
    value: &Value,
    report: &mut DiagnosticsReport,
) -> bool {
    let Some(spec) = spec else { return true };
    if spec.kind == NodeKind::Group {
        report.error(
            DiagnosticCode::TypeMismatch,
            output,
            format!("group {} cannot hold a value", spec.path),
        );
        return false;
    }

    let mut ok = true;
    let mut fail = |code: DiagnosticCode, message: Option<String>| {
        report.error(code, output, message.unwrap_or_default());
        ok = false;
    };
    if let Some(data_type) = spec.data_type {
        let result = validate_data_type(value, data_type);
        if !result.is_valid {
            fail(DiagnosticCode::TypeMismatch, result.message);
        }
    }
    let result = validate_enumeration(value, &spec.enumeration);
    if !result.is_valid {
        fail(DiagnosticCode::InvalidEnumValue, result.message);
    }
    if let Some(dimensions) = &spec.dimensions {
        let result = validate_rank(value, dimensions);
        if !result.is_valid {
            fail(DiagnosticCode::TypeMismatch, result.message);
        }
    }
    ok
}

/// Point a link at the final node of its chain
fn resolve_link(path: &str, slots: &mut Slots<'_>, report: &mut DiagnosticsReport) {
    let (target, spec) = match slots.get(path) {
        Some(Slot {
            content: Content::Link(target),
            spec,
            ..
        }) => (target.clone(), *spec),
        _ => return,
    };

    let resolved = match slots.get(&target).map(|slot| &slot.content) {
        Some(Content::Link(next)) => Some(next.clone()),
        Some(_) => Some(target.clone()),
        None if slots.covers(&target) => Some(target.clone()),
        None => None,
    };
    let Some(resolved) = resolved else {
        report.error(
            DiagnosticCode::UnresolvedReference,
            path,
            format!("link target {target} was never populated"),
        );
        slots.remove(path);
        return;
    };

    if let (Some(data_type), Some(Content::Data(value))) = (
        spec.and_then(|spec| spec.data_type),
        slots.get(&resolved).map(|slot| &slot.content),
    ) {
        let result = validate_data_type(value, data_type);
        if !result.is_valid {
            report.error(
                DiagnosticCode::TypeMismatch,
                path,
                format!(
                    "linked {resolved}: {}",
                    result.message.unwrap_or_default()
                ),
            );
            slots.remove(path);
            return;
        }
    }

    trace!(path, target = %resolved, "Resolved link");
    if let Some(slot) = slots.get_mut(path) {
        slot.content = Content::Link(resolved);
    }
}

/// Replace a concatenation by the joined string
fn resolve_concat(path: &str, slots: &mut Slots<'_>, report: &mut DiagnosticsReport) {
    let (parts, separator, spec) = match slots.get(path) {
        Some(Slot {
            content: Content::Concat { parts, separator },
            spec,
            ..
        }) => (parts.clone(), separator.clone(), *spec),
        _ => return,
    };

    let mut pieces = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            Part::Literal(text) => pieces.push(text),
            Part::Field(source) => match scalar_text(slots, &source) {
                Ok(text) => pieces.push(text),
                Err((code, message)) => {
                    report.error(code, path, message);
                    slots.remove(path);
                    return;
                }
            },
        }
    }

    let value = Value::string(pieces.join(&separator));
    if !check_value(spec, path, &value, report) {
        slots.remove(path);
        return;
    }
    trace!(path, value = %pieces.join(&separator), "Resolved concatenation");
    if let Some(slot) = slots.get_mut(path) {
        slot.content = Content::Data(value);
    }
}

/// Text of the scalar stored at `source`, following one link
fn scalar_text(
    slots: &Slots<'_>,
    source: &str,
) -> std::result::Result<String, (DiagnosticCode, String)> {
    let content = match slots.get(source).map(|slot| &slot.content) {
        Some(Content::Link(target)) => slots.get(target).map(|slot| &slot.content),
        other => other,
    };
    match content {
        Some(Content::Data(value)) => value.as_scalar().map(ToString::to_string).ok_or_else(|| {
            (
                DiagnosticCode::TypeMismatch,
                format!("{source} holds an array and cannot be concatenated"),
            )
        }),
        _ => Err((
            DiagnosticCode::UnresolvedReference,
            format!("concatenation source {source} was never populated"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nx_ir::ArrayData;
    use nx_schema::{Category, MaxOccurs, Occurrence, SchemaClass, SchemaNode};
    use nx_template::TemplateBuilder;

    fn template() -> Template {
        let mut class = SchemaClass::new("NXdemo", Category::Application);
        class.root.children = vec![
            SchemaNode::group(None, "NXentry")
                .with_child(SchemaNode::field("title", None))
                .with_child(SchemaNode::field("label", None).with_occurrence(Occurrence::Optional))
                .with_child(
                    SchemaNode::field("mode", None)
                        .with_occurrence(Occurrence::Optional)
                        .with_enumeration(["fast", "slow"]),
                )
                .with_child(
                    SchemaNode::group(Some("sample"), "NXsample")
                        .with_occurrence(Occurrence::Optional)
                        .with_child(
                            SchemaNode::field("temperature", Some(NxType::Float))
                                .with_units("NX_TEMPERATURE"),
                        ),
                )
                .with_child(
                    SchemaNode::group(None, "NXdata")
                        .with_occurrence(Occurrence::Optional)
                        .with_occurs(None, Some(MaxOccurs::Bounded(1)))
                        .with_child(
                            SchemaNode::field("counts", Some(NxType::Number))
                                .with_occurrence(Occurrence::Optional),
                        ),
                ),
        ];
        TemplateBuilder::new(&class).build().unwrap()
    }

    fn run(template: &Template, contributions: &[Contribution]) -> Population {
        PopulationEngine::new(template, ValidationConfig::default())
            .populate(contributions, &CancellationToken::new())
            .unwrap()
    }

    fn codes(population: &Population) -> Vec<DiagnosticCode> {
        population.report().diagnostics().iter().map(|d| d.code).collect()
    }

    #[test]
    fn test_last_writer_wins() {
        let template = template();
        let population = run(
            &template,
            &[
                Contribution::data("/ENTRY[entry]/title", "first"),
                Contribution::data("/ENTRY[entry]/title", "second"),
            ],
        );
        assert_eq!(population.value("/entry/title"), Some(&Value::string("second")));
        assert_eq!(codes(&population), vec![DiagnosticCode::OverriddenValue]);
        assert!(!population.is_failed());
    }

    #[test]
    fn test_invalid_values_are_dropped() {
        let template = template();
        let population = run(
            &template,
            &[
                Contribution::data("/ENTRY[entry]/title", "scan"),
                Contribution::data("/ENTRY[entry]/mode", "medium"),
                Contribution::data("/ENTRY[entry]/sample/temperature", "warm").with_unit("K"),
            ],
        );
        assert!(population.get("/entry/mode").is_none());
        assert!(population.get("/entry/sample/temperature").is_none());
        assert_eq!(
            codes(&population),
            vec![DiagnosticCode::InvalidEnumValue, DiagnosticCode::TypeMismatch]
        );
    }

    #[test]
    fn test_unknown_paths_are_kept_as_undocumented() {
        let template = template();
        let population = run(
            &template,
            &[
                Contribution::data("/ENTRY[entry]/title", "scan"),
                Contribution::data("/ENTRY[entry]/vendor/serial", "A-17"),
            ],
        );
        let entry = population.get("/entry/vendor/serial").unwrap();
        assert!(!entry.path.is_documented());
        assert_eq!(codes(&population), vec![DiagnosticCode::UnknownField]);

        let strict = ValidationConfig {
            write_undocumented: false,
            ..ValidationConfig::default()
        };
        let population = PopulationEngine::new(&template, strict)
            .populate(
                &[Contribution::data("/ENTRY[entry]/vendor/serial", "A-17")],
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(population.get("/entry/vendor/serial").is_none());
    }

    #[test]
    fn test_links_follow_chains_and_detect_cycles() {
        let template = template();
        let population = run(
            &template,
            &[
                Contribution::data("/ENTRY[entry]/title", "scan"),
                Contribution::link("/ENTRY[entry]/label", "/ENTRY[entry]/mode"),
                Contribution::link("/ENTRY[entry]/mode", "/ENTRY[entry]/label"),
                Contribution::link("/ENTRY[entry]/DATA[data]/counts", "/ENTRY[entry]/extra"),
            ],
        );
        let cycles = population
            .report()
            .with_code(DiagnosticCode::LinkCycle)
            .count();
        assert_eq!(cycles, 2);
        assert_eq!(
            population
                .report()
                .with_code(DiagnosticCode::UnresolvedReference)
                .count(),
            1
        );
        assert!(population.get("/entry/label").is_none());
        assert!(population.is_failed());
    }

    #[test]
    fn test_concatenation_reads_links() {
        let template = template();
        let population = run(
            &template,
            &[
                Contribution::data("/ENTRY[entry]/mode", "fast"),
                Contribution::link("/ENTRY[entry]/label", "/ENTRY[entry]/mode"),
                Contribution::concat(
                    "/ENTRY[entry]/title",
                    vec![
                        ConcatPart::Literal {
                            value: "scan".into(),
                        },
                        ConcatPart::Field {
                            path: "/ENTRY[entry]/label".into(),
                        },
                    ],
                    " ",
                ),
            ],
        );
        assert_eq!(population.value("/entry/title"), Some(&Value::string("scan fast")));
        assert_eq!(
            population.get("/entry/label").unwrap().value,
            EntryValue::Link {
                target: "/entry/mode".into()
            }
        );
        assert!(population.report().is_empty());
    }

    #[test]
    fn test_units_from_attribute_entries() {
        let template = template();
        let population = run(
            &template,
            &[
                Contribution::data("/ENTRY[entry]/title", "scan"),
                Contribution::data("/ENTRY[entry]/sample/temperature", 300.0),
                Contribution::data("/ENTRY[entry]/sample/temperature/@units", "K"),
            ],
        );
        assert!(population.report().is_empty());
        assert!(population.get("/entry/sample/temperature/@units").unwrap().path.is_documented());

        let population = run(
            &template,
            &[
                Contribution::data("/ENTRY[entry]/title", "scan"),
                Contribution::data("/ENTRY[entry]/sample/temperature", 300.0),
            ],
        );
        let missing: Vec<_> = population.report().with_code(DiagnosticCode::MissingUnit).collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].severity, Severity::Warning);
    }

    #[test]
    fn test_cardinality_and_names() {
        let template = template();
        let counts = Value::vector(ArrayData::Int(vec![1, 2]));
        let population = run(
            &template,
            &[
                Contribution::data("/ENTRY[entry]/title", "scan"),
                Contribution::data("/ENTRY[entry]/DATA[data_1]/counts", counts.clone()),
                Contribution::data("/ENTRY[entry]/DATA[data_2]/counts", counts),
                Contribution::data("/ENTRY[entry]/DATA[bad name]/counts", 1_i64),
            ],
        );
        assert_eq!(
            codes(&population),
            vec![DiagnosticCode::InvalidPath, DiagnosticCode::CardinalityViolation]
        );
    }

    #[test]
    fn test_cancellation_stops_the_run() {
        let template = template();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = PopulationEngine::new(&template, ValidationConfig::default()).populate(
            &[Contribution::data("/ENTRY[entry]/title", "scan")],
            &cancel,
        );
        assert!(matches!(result, Err(crate::Error::Cancelled(_))));
    }
}
