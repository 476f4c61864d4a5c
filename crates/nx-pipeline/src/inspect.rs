//! Container inspection
//!
//! Reads a committed container back and explains it against the schema:
//! every node is annotated with the template path it instantiates, its
//! documentation and, for groups, the inheritance chain of its class. Nodes
//! the application definition does not describe are reported, and the
//! default plottable (entry, `NXdata`, signal and axes) is located.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use nx_adapter_container::{ContainerNode, Hdf5Container, JsonContainer};
use nx_ir::{DataPath, DataSegment};
use nx_schema::{NodeKind, SchemaLoader};
use nx_schema::model::concept_from_class;
use nx_template::{ConcretePath, Template, build_template};
use tracing::{debug, info};

use crate::{Error, Result};

/// Attributes that describe the container rather than the data
const STRUCTURAL_ATTRIBUTES: [&str; 2] = ["NX_class", "target"];

/// Links followed before a path is treated as dangling
const MAX_LINK_HOPS: usize = 8;

/// Node kinds found in a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Group,
    Field,
    Attribute,
    Link,
}

impl NodeRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NodeRole::Group => "group",
            NodeRole::Field => "field",
            NodeRole::Attribute => "attribute",
            NodeRole::Link => "link",
        }
    }
}

/// Schema information for one container node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAnnotation {
    /// Output path (`/entry/data/@signal` for attributes)
    pub path: String,
    pub role: NodeRole,
    /// `NX_class` of a group
    pub nx_class: Option<String>,
    /// Template path the node instantiates (`/ENTRY/DATA/two_theta`)
    pub concept: Option<String>,
    pub doc: Option<String>,
    /// Class that declared the template path
    pub defined_in: Option<String>,
    /// Inheritance chain of a group's class, the class itself first
    pub inheritance: Vec<String>,
    /// Link target
    pub target: Option<String>,
}

impl NodeAnnotation {
    /// Whether the application definition describes the node
    #[must_use]
    pub fn is_documented(&self) -> bool {
        self.concept.is_some()
    }
}

/// Default plottable data of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plottable {
    pub entry: String,
    pub data: String,
    pub signal: String,
    /// Axis dataset paths per signal dimension; the preferred axis first
    pub axes: Vec<Vec<String>>,
}

/// Result of inspecting one container
#[derive(Debug, Clone)]
pub struct InspectionReport {
    pub application: String,
    pub annotations: Vec<NodeAnnotation>,
    pub plottable: Option<Plottable>,
}

impl InspectionReport {
    /// Nodes the application definition does not describe
    pub fn undocumented(&self) -> impl Iterator<Item = &NodeAnnotation> {
        self.annotations.iter().filter(|a| !a.is_documented())
    }

    /// Annotation of the node at `path`
    #[must_use]
    pub fn annotation(&self, path: &str) -> Option<&NodeAnnotation> {
        self.annotations.iter().find(|a| a.path == path)
    }

    /// Human-readable listing
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("# Inspection against {}\n", self.application);
        for annotation in &self.annotations {
            let _ = write!(out, "{} ({}", annotation.path, annotation.role.as_str());
            if let Some(nx_class) = &annotation.nx_class {
                let _ = write!(out, " {nx_class}");
            }
            out.push(')');
            match &annotation.concept {
                Some(concept) => {
                    let _ = write!(out, " -> {concept}");
                }
                None => out.push_str(" UNDOCUMENTED"),
            }
            if let Some(target) = &annotation.target {
                let _ = write!(out, " => {target}");
            }
            out.push('\n');
            if annotation.inheritance.len() > 1 {
                let _ = writeln!(out, "  inherits: {}", annotation.inheritance.join(" < "));
            }
            if let Some(class) = &annotation.defined_in {
                let _ = writeln!(out, "  defined in: {class}");
            }
            if let Some(line) = annotation.doc.as_deref().and_then(|d| d.lines().next()) {
                let _ = writeln!(out, "  doc: {line}");
            }
        }

        let undocumented: Vec<&str> = self.undocumented().map(|a| a.path.as_str()).collect();
        let _ = writeln!(out, "# Undocumented nodes: {}", undocumented.len());
        for path in undocumented {
            let _ = writeln!(out, "{path}");
        }

        match &self.plottable {
            Some(plottable) => {
                out.push_str("# Default plottable\n");
                let _ = writeln!(out, "entry: {}", plottable.entry);
                let _ = writeln!(out, "data: {}", plottable.data);
                let _ = writeln!(out, "signal: {}", plottable.signal);
                for (dim, axes) in plottable.axes.iter().enumerate() {
                    let _ = writeln!(out, "axis {dim}: {}", axes.join(", "));
                }
            }
            None => out.push_str("# No default plottable\n"),
        }
        out
    }
}

/// Annotates committed containers against their application definition
pub struct Inspector {
    loader: SchemaLoader,
    application: Option<String>,
    mixins: Vec<String>,
}

impl Inspector {
    /// Inspector loading schemas from `schema_paths`
    #[must_use]
    pub fn new(schema_paths: Vec<PathBuf>) -> Self {
        Self::with_loader(SchemaLoader::from_paths(schema_paths))
    }

    #[must_use]
    pub fn with_loader(loader: SchemaLoader) -> Self {
        Self {
            loader,
            application: None,
            mixins: Vec::new(),
        }
    }

    /// Inspect against `application` instead of the entry's `definition`
    #[must_use]
    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    /// Overlay the same mix-ins the conversion used
    #[must_use]
    pub fn with_mixins(mut self, mixins: Vec<String>) -> Self {
        self.mixins = mixins;
        self
    }

    /// Read the container at `path` and inspect it
    ///
    /// # Errors
    ///
    /// Container read failures and everything [`Inspector::inspect`] returns.
    pub fn inspect_file(&self, path: &Path) -> Result<InspectionReport> {
        let tree = Hdf5Container::read(path)?;
        self.inspect(&tree)
    }

    /// Annotate every node of `tree` and find its default plottable
    ///
    /// # Errors
    ///
    /// [`Error::Pipeline`] when no application definition is given or
    /// recorded in the container, and schema or template failures.
    pub fn inspect(&self, tree: &JsonContainer) -> Result<InspectionReport> {
        let application = match &self.application {
            Some(name) => name.clone(),
            None => recorded_definition(tree).ok_or_else(|| {
                Error::pipeline(
                    "inspect",
                    "/",
                    "no entry records a definition; name the application explicitly",
                )
            })?,
        };
        let template = build_template(&self.loader, &application, &self.mixins)?;

        let mut annotations = Vec::new();
        if let Some(children) = tree.root().children() {
            for (name, node) in children {
                self.annotate(&template, &[], name, node, &mut annotations);
            }
        }
        let plottable = find_default_plottable(tree);

        info!(
            application = %application,
            nodes = annotations.len(),
            undocumented = annotations.iter().filter(|a| !a.is_documented()).count(),
            plottable = plottable.is_some(),
            "Inspected container"
        );
        Ok(InspectionReport {
            application,
            annotations,
            plottable,
        })
    }

    /// Annotate `node` and its members; `parents` are the enclosing groups
    fn annotate(
        &self,
        template: &Template,
        parents: &[(String, Option<String>)],
        name: &str,
        node: &ContainerNode,
        out: &mut Vec<NodeAnnotation>,
    ) {
        let path = output_path(parents, name);
        match node {
            ContainerNode::Link { target } => {
                let mut annotation = self.describe(template, parents, name, NodeRole::Link, None);
                annotation.target = Some(target.clone());
                out.push(annotation);
            }
            ContainerNode::Dataset { .. } => {
                out.push(self.describe(template, parents, name, NodeRole::Field, None));
                self.annotate_attributes(template, parents, name, node, out);
            }
            ContainerNode::Group { children, .. } => {
                let nx_class = string_attribute(node, "NX_class");
                out.push(self.describe(template, parents, name, NodeRole::Group, nx_class.clone()));
                self.annotate_attributes(template, parents, name, node, out);

                let mut inner = parents.to_vec();
                inner.push((name.to_string(), nx_class));
                for (child, member) in children {
                    self.annotate(template, &inner, child, member, out);
                }
            }
        }
        debug!(path = %path, "Annotated node");
    }

    fn annotate_attributes(
        &self,
        template: &Template,
        parents: &[(String, Option<String>)],
        name: &str,
        node: &ContainerNode,
        out: &mut Vec<NodeAnnotation>,
    ) {
        let attributes = match node {
            ContainerNode::Group { attributes, .. } | ContainerNode::Dataset { attributes, .. } => {
                attributes
            }
            ContainerNode::Link { .. } => return,
        };
        let owner_class = string_attribute(node, "NX_class");
        let mut owner = parents.to_vec();
        owner.push((name.to_string(), owner_class));

        for key in attributes.keys() {
            if STRUCTURAL_ATTRIBUTES.contains(&key.as_str()) {
                continue;
            }
            let mut annotation = self.describe(template, &owner, key, NodeRole::Attribute, None);
            if annotation.concept.is_none() && key == "units" {
                let field = resolve(template, parents, name, NodeRole::Field, None);
                if let Some(spec) = field
                    .and_then(|path| path.pattern)
                    .and_then(|pattern| template.get(&pattern.to_string()))
                    .filter(|spec| spec.units.is_some())
                {
                    annotation.concept = Some(format!("{}/@units", spec.path));
                    annotation.defined_in = Some(spec.source.clone());
                    annotation.doc = spec.units.as_ref().map(|u| format!("Unit of category {u}"));
                }
            }
            out.push(annotation);
        }
    }

    fn describe(
        &self,
        template: &Template,
        parents: &[(String, Option<String>)],
        name: &str,
        role: NodeRole,
        nx_class: Option<String>,
    ) -> NodeAnnotation {
        let path = match role {
            NodeRole::Attribute => {
                let owner = parents
                    .iter()
                    .map(|(n, _)| format!("/{n}"))
                    .collect::<String>();
                format!("{owner}/@{name}")
            }
            _ => output_path(parents, name),
        };
        let spec = resolve(template, parents, name, role, nx_class.as_deref())
            .and_then(|resolved| resolved.pattern)
            .and_then(|pattern| template.get(&pattern.to_string()));

        let inheritance = nx_class
            .as_deref()
            .map(|class| self.inheritance(class))
            .unwrap_or_default();
        let doc = spec.and_then(|s| s.doc.clone()).or_else(|| {
            nx_class
                .as_deref()
                .and_then(|class| self.loader.load(class).ok())
                .and_then(|class| class.doc.clone())
        });

        NodeAnnotation {
            path,
            role,
            nx_class,
            concept: spec.map(|s| s.path.to_string()),
            doc,
            defined_in: spec.map(|s| s.source.clone()),
            inheritance,
            target: None,
        }
    }

    /// Class names from `nx_class` up to its root; empty when the corpus
    /// lacks the class
    fn inheritance(&self, nx_class: &str) -> Vec<String> {
        match self.loader.resolve_inheritance_chain(nx_class) {
            Ok(chain) => chain.iter().rev().map(|c| c.name.clone()).collect(),
            Err(err) => {
                debug!(nx_class, error = %err, "No inheritance chain");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for Inspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inspector")
            .field("application", &self.application)
            .field("mixins", &self.mixins)
            .finish_non_exhaustive()
    }
}

fn output_path(parents: &[(String, Option<String>)], name: &str) -> String {
    let mut path: String = parents.iter().map(|(n, _)| format!("/{n}")).collect();
    path.push('/');
    path.push_str(name);
    path
}

/// Resolve a container node against the template
///
/// Groups are first addressed by the concept of their class
/// (`ENTRY[entry]`), then by bare name. A bare-name match only counts when
/// every matched group carries the container's class and the leaf has the
/// node's kind.
fn resolve(
    template: &Template,
    parents: &[(String, Option<String>)],
    name: &str,
    role: NodeRole,
    nx_class: Option<&str>,
) -> Option<ConcretePath> {
    let mut classes: Vec<Option<&str>> = parents.iter().map(|(_, c)| c.as_deref()).collect();
    let leaf = |by_concept: bool| match role {
        NodeRole::Attribute => DataSegment::attribute(name),
        NodeRole::Group => match nx_class {
            Some(class) if by_concept => DataSegment::instance(concept_from_class(class), name),
            _ => DataSegment::named(name),
        },
        NodeRole::Field | NodeRole::Link => DataSegment::named(name),
    };

    let mut by_concept: Vec<DataSegment> = parents
        .iter()
        .map(|(n, class)| match class {
            Some(class) => DataSegment::instance(concept_from_class(class), n),
            None => DataSegment::named(n),
        })
        .collect();
    by_concept.push(leaf(true));
    let mut by_name: Vec<DataSegment> = parents.iter().map(|(n, _)| DataSegment::named(n)).collect();
    by_name.push(leaf(false));

    if role == NodeRole::Group {
        classes.push(nx_class);
    }
    let expected = match role {
        NodeRole::Group => NodeKind::Group,
        NodeRole::Attribute => NodeKind::Attribute,
        NodeRole::Field | NodeRole::Link => NodeKind::Field,
    };
    let agrees = |found: &ConcretePath| {
        found.segments.last().is_some_and(|s| s.kind == expected)
            && classes
                .iter()
                .zip(&found.segments)
                .all(|(class, segment)| class.is_none() || *class == segment.nx_class.as_deref())
    };

    [by_concept, by_name]
        .into_iter()
        .filter_map(|segments| template.resolve(&DataPath::from_segments(segments)))
        .find(|found| agrees(found))
}

fn string_attribute(node: &ContainerNode, key: &str) -> Option<String> {
    node.attribute(key)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

/// Follow links from `path` to a group or dataset
fn follow<'t>(tree: &'t JsonContainer, path: &str) -> Option<(String, &'t ContainerNode)> {
    let mut current = path.to_string();
    for _ in 0..MAX_LINK_HOPS {
        let node = tree.node(&current)?;
        match node.target() {
            Some(target) => current = target.to_string(),
            None => return Some((current, node)),
        }
    }
    None
}

/// `definition` of the first entry that records one
fn recorded_definition(tree: &JsonContainer) -> Option<String> {
    tree.root()
        .children()?
        .iter()
        .filter(|(_, node)| string_attribute(node, "NX_class").as_deref() == Some("NXentry"))
        .find_map(|(name, _)| {
            let (_, definition) = follow(tree, &format!("/{name}/definition"))?;
            definition.data()?.as_str().map(str::to_string)
        })
}

/// Member of `group` named by its `@default`, or its first member of `nx_class`
fn pick_group(
    tree: &JsonContainer,
    path: &str,
    node: &ContainerNode,
    nx_class: &str,
) -> Option<String> {
    let base = if path == "/" { "" } else { path };
    let is_class = |candidate: &str| {
        follow(tree, candidate)
            .is_some_and(|(_, n)| string_attribute(n, "NX_class").as_deref() == Some(nx_class))
    };
    if let Some(default) = string_attribute(node, "default") {
        let candidate = format!("{base}/{default}");
        if is_class(&candidate) {
            return follow(tree, &candidate).map(|(p, _)| p);
        }
    }
    node.children()?
        .keys()
        .map(|name| format!("{base}/{name}"))
        .find(|candidate| is_class(candidate))
        .and_then(|candidate| follow(tree, &candidate).map(|(p, _)| p))
}

/// Names listed in an attribute holding a string or an array of strings
fn name_list(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::String(s) => vec![s.clone()],
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(serde_json::Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn integer(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Array(items) if items.len() == 1 => integer(&items[0]),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        other => other.as_i64(),
    }
}

/// Locate the default plottable: entry, `NXdata` group, signal and axes
#[must_use]
pub fn find_default_plottable(tree: &JsonContainer) -> Option<Plottable> {
    let entry = pick_group(tree, "/", tree.root(), "NXentry")?;
    let entry_node = tree.node(&entry)?;
    let data = pick_group(tree, &entry, entry_node, "NXdata")?;
    let data_node = tree.node(&data)?;
    let members = data_node.children()?;

    let datasets: Vec<(&String, String, &ContainerNode)> = members
        .keys()
        .filter_map(|name| {
            let (path, node) = follow(tree, &format!("{data}/{name}"))?;
            node.is_dataset().then_some((name, path, node))
        })
        .collect();
    let dataset = |name: &str| datasets.iter().find(|(n, _, _)| n.as_str() == name);

    let named_signal = string_attribute(data_node, "signal").and_then(|s| dataset(&s));
    let signal = named_signal
        .or_else(|| (datasets.len() == 1).then(|| &datasets[0]))
        .or_else(|| {
            datasets
                .iter()
                .find(|(_, _, node)| node.attribute("signal").and_then(integer) == Some(1))
        })?;
    let (signal_name, signal_path, signal_node) = signal;

    let rank = match signal_node {
        ContainerNode::Dataset { shape, .. } => shape.len(),
        _ => 0,
    };
    let listed = data_node.attribute("axes").map(name_list).unwrap_or_default();
    let from_signal: Vec<String> = string_attribute(signal_node, "axes")
        .map(|axes| {
            axes.split([':', ','])
                .map(|s| s.trim().to_string())
                .collect()
        })
        .unwrap_or_default();

    let axis_path = |name: &str| {
        if name == "." || name == signal_name.as_str() {
            return None;
        }
        dataset(name).map(|(_, path, _)| path.clone())
    };
    let indexed = |name: &str| {
        data_node
            .attribute(&format!("{name}_indices"))
            .and_then(integer)
            .and_then(|i| usize::try_from(i).ok())
    };
    let group_attributes = match data_node {
        ContainerNode::Group { attributes, .. } => Some(attributes),
        _ => None,
    };

    let mut axes = Vec::with_capacity(rank);
    for dim in 0..rank {
        let mut names: Vec<&str> = listed
            .iter()
            .filter(|name| indexed(name) == Some(dim))
            .map(String::as_str)
            .collect();
        if let Some(name) = listed.get(dim).filter(|name| indexed(name).is_none()) {
            names.push(name);
        }
        for (key, value) in group_attributes.into_iter().flatten() {
            if let Some(name) = key.strip_suffix("_indices") {
                if integer(value).and_then(|i| usize::try_from(i).ok()) == Some(dim) {
                    names.push(name);
                }
            }
        }
        if let Some(name) = from_signal.get(dim) {
            names.push(name);
        }

        let mut found: Vec<String> = Vec::new();
        for path in names.into_iter().filter_map(&axis_path) {
            if !found.contains(&path) {
                found.push(path);
            }
        }
        if found.is_empty() {
            let axis = i64::try_from(dim + 1).ok();
            let mut candidates: Vec<&(&String, String, &ContainerNode)> = datasets
                .iter()
                .filter(|(_, _, node)| node.attribute("axis").and_then(integer) == axis)
                .collect();
            candidates.sort_by_key(|(_, _, node)| {
                node.attribute("primary").and_then(integer) != Some(1)
            });
            found.extend(candidates.into_iter().filter_map(|(name, _, _)| axis_path(name)));
        }
        axes.push(found);
    }
    Some(Plottable {
        entry,
        data,
        signal: signal_path.clone(),
        axes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nx_adapter_container::ContainerSink;
    use nx_ir::{ArrayData, DataType, Value};
    use nx_schema::MemoryCorpus;
    use std::sync::Arc;

    const OBJECT: &str = r#"<definition name="NXobject" type="group" category="base">
  <doc>Root of every class hierarchy.</doc>
</definition>"#;

    const ENTRY: &str = r#"<definition name="NXentry" type="group" extends="NXobject" category="base">
  <doc>Top-level measurement entry.</doc>
  <field name="title"/>
  <group type="NXdata"/>
</definition>"#;

    const DATA: &str = r#"<definition name="NXdata" type="group" extends="NXobject" category="base">
  <doc>Plottable data.</doc>
</definition>"#;

    const APP: &str = r#"<definition name="NXtiny" type="group" extends="NXobject" category="application">
  <group type="NXentry">
    <field name="definition">
      <enumeration><item value="NXtiny"/></enumeration>
    </field>
    <field name="title"><doc>Extended title for the entry.</doc></field>
    <group type="NXdata">
      <attribute name="signal"/>
      <field name="intensity" type="NX_NUMBER"/>
      <field name="two_theta" type="NX_FLOAT" units="NX_ANGLE"/>
    </group>
  </group>
</definition>"#;

    fn loader() -> SchemaLoader {
        let corpus = MemoryCorpus::new()
            .with("NXobject", OBJECT)
            .with("NXentry", ENTRY)
            .with("NXdata", DATA)
            .with("NXtiny", APP);
        SchemaLoader::new(Arc::new(corpus))
    }

    fn scan() -> JsonContainer {
        let mut tree = JsonContainer::new();
        tree.create_group("/entry", "NXentry").unwrap();
        tree.create_dataset("/entry/definition", &Value::string("NXtiny"), DataType::Utf8, &[])
            .unwrap();
        tree.create_dataset("/entry/title", &Value::string("quartz"), DataType::Utf8, &[])
            .unwrap();
        tree.create_group("/entry/notes", "NXcollection").unwrap();
        tree.create_group("/entry/data", "NXdata").unwrap();
        tree.create_dataset(
            "/entry/data/two_theta",
            &Value::vector(ArrayData::Float(vec![10.0, 10.5, 11.0])),
            DataType::Float64,
            &[3],
        )
        .unwrap();
        tree.set_attribute("/entry/data/two_theta", "units", &Value::string("deg"))
            .unwrap();
        tree.create_dataset(
            "/entry/data/intensity",
            &Value::vector(ArrayData::Int(vec![120, 340, 95])),
            DataType::Int64,
            &[3],
        )
        .unwrap();
        tree.set_attribute("/entry/data", "signal", &Value::string("intensity"))
            .unwrap();
        tree.set_attribute("/entry/data", "axes", &Value::string("two_theta"))
            .unwrap();
        tree.create_link("/entry/counts", "/entry/data/intensity").unwrap();
        tree
    }

    #[test]
    fn test_nodes_are_annotated_with_their_concepts() {
        let report = Inspector::with_loader(loader()).inspect(&scan()).unwrap();
        assert_eq!(report.application, "NXtiny");

        let entry = report.annotation("/entry").unwrap();
        assert_eq!(entry.role, NodeRole::Group);
        assert_eq!(entry.concept.as_deref(), Some("/ENTRY"));
        assert_eq!(entry.inheritance, ["NXentry", "NXobject"]);
        assert_eq!(entry.doc.as_deref(), Some("Top-level measurement entry."));

        let title = report.annotation("/entry/title").unwrap();
        assert_eq!(title.concept.as_deref(), Some("/ENTRY/title"));
        assert_eq!(title.doc.as_deref(), Some("Extended title for the entry."));

        let two_theta = report.annotation("/entry/data/two_theta").unwrap();
        assert_eq!(two_theta.concept.as_deref(), Some("/ENTRY/DATA/two_theta"));
        let units = report.annotation("/entry/data/two_theta/@units").unwrap();
        assert!(units.is_documented());

        let signal = report.annotation("/entry/data/@signal").unwrap();
        assert_eq!(signal.concept.as_deref(), Some("/ENTRY/DATA/@signal"));
        assert!(report.annotation("/entry/@NX_class").is_none());

        let counts = report.annotation("/entry/counts").unwrap();
        assert_eq!(counts.role, NodeRole::Link);
        assert_eq!(counts.target.as_deref(), Some("/entry/data/intensity"));
    }

    #[test]
    fn test_undocumented_nodes_are_reported() {
        let report = Inspector::with_loader(loader()).inspect(&scan()).unwrap();
        let undocumented: Vec<&str> = report.undocumented().map(|a| a.path.as_str()).collect();
        assert!(undocumented.contains(&"/entry/notes"), "{undocumented:?}");
        assert!(undocumented.contains(&"/entry/data/@axes"), "{undocumented:?}");
        assert!(!undocumented.contains(&"/entry/title"));

        let text = report.render();
        assert!(text.contains("/entry/notes (group NXcollection) UNDOCUMENTED"), "{text}");
        assert!(text.contains("signal: /entry/data/intensity"), "{text}");
    }

    #[test]
    fn test_missing_definition_needs_an_explicit_application() {
        let mut tree = JsonContainer::new();
        tree.create_group("/entry", "NXentry").unwrap();
        let err = Inspector::with_loader(loader()).inspect(&tree).unwrap_err();
        assert!(matches!(err, Error::Pipeline { ref operation, .. } if operation == "inspect"), "{err}");

        let report = Inspector::with_loader(loader())
            .with_application("NXtiny")
            .inspect(&tree)
            .unwrap();
        assert!(report.plottable.is_none());
    }

    #[test]
    fn test_default_plottable_follows_signal_and_axes() {
        let plottable = find_default_plottable(&scan()).unwrap();
        assert_eq!(plottable.entry, "/entry");
        assert_eq!(plottable.data, "/entry/data");
        assert_eq!(plottable.signal, "/entry/data/intensity");
        assert_eq!(plottable.axes, vec![vec!["/entry/data/two_theta".to_string()]]);
    }

    #[test]
    fn test_default_plottable_fallbacks() {
        let mut tree = JsonContainer::new();
        tree.create_group("/first", "NXentry").unwrap();
        tree.create_group("/second", "NXentry").unwrap();
        tree.set_attribute("/", "default", &Value::string("second")).unwrap();
        tree.create_group("/second/image", "NXdata").unwrap();
        let frame = Value::array(ArrayData::Int(vec![1, 2, 3, 4, 5, 6]), vec![2, 3]).unwrap();
        tree.create_dataset("/second/image/frame", &frame, DataType::Int64, &[2, 3])
            .unwrap();
        tree.set_attribute("/second/image/frame", "signal", &Value::int(1)).unwrap();
        tree.set_attribute("/second/image/frame", "axes", &Value::string("y:x")).unwrap();
        for (name, len) in [("x", 3), ("y", 2), ("x_fine", 3)] {
            let values = Value::vector(ArrayData::Float(vec![0.0; len]));
            tree.create_dataset(&format!("/second/image/{name}"), &values, DataType::Float64, &[len])
                .unwrap();
        }

        let plottable = find_default_plottable(&tree).unwrap();
        assert_eq!(plottable.entry, "/second");
        assert_eq!(plottable.signal, "/second/image/frame");
        assert_eq!(
            plottable.axes,
            vec![
                vec!["/second/image/y".to_string()],
                vec!["/second/image/x".to_string()]
            ]
        );
    }
}
