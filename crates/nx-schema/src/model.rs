//! Schema model definitions
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Class that terminates every inheritance chain
pub const ROOT_CLASS: &str = "NXobject";

/// Unit categories that do not require a unit value
pub const UNITLESS_CATEGORIES: &[&str] = &["NX_UNITLESS"];

/// Kind of a schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Group,
    Field,
    Attribute,
}

/// Category of a definition file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Base class: nodes default to optional
    #[default]
    Base,
    /// Application definition: nodes default to required
    Application,
    /// Contributed definition, treated like an application definition
    Contributed,
}

/// Whether a node must be present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Occurrence {
    Required,
    Recommended,
    Optional,
}

/// Upper bound on the number of instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

/// How a derived node combines with the base node it overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideMode {
    /// Children are merged with the base node's children
    #[default]
    Extend,
    /// Children replace the base node's children
    Replace,
}

/// NXDL primitive data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NxType {
    Char,
    Float,
    Int,
    UInt,
    PosInt,
    Number,
    Complex,
    Boolean,
    Binary,
    DateTime,
    Iso8601,
    CharOrNumber,
}

/// Declared array dimensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Number of dimensions
    pub rank: usize,
    /// Symbolic or literal size per index, in index order
    pub values: Vec<String>,
}

/// One element of a class definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    pub kind: NodeKind,
    /// Declared name; `None` for unnamed typed groups
    pub name: Option<String>,
    /// NX class of a group (`NXbeam`)
    pub nx_class: Option<String>,
    /// Declared type of a field or attribute
    pub data_type: Option<NxType>,
    /// `nameType` marker (`any` makes the name a placeholder)
    pub name_type: Option<String>,
    /// Unit category (`NX_ENERGY`)
    pub units: Option<String>,
    pub occurrence: Option<Occurrence>,
    pub min_occurs: Option<u32>,
    pub max_occurs: Option<MaxOccurs>,
    /// Allowed literal values; empty means unconstrained
    pub enumeration: Vec<String>,
    pub dimensions: Option<Dimensions>,
    pub doc: Option<String>,
    /// Comments attached to the node in the source
    pub comments: Vec<String>,
    pub override_mode: OverrideMode,
    pub children: Vec<SchemaNode>,
}

/// A named class definition with an optional parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaClass {
    pub name: String,
    pub extends: Option<String>,
    pub category: Category,
    pub doc: Option<String>,
    pub comments: Vec<String>,
    /// Top-level group holding the class members
    pub root: SchemaNode,
    /// Classes merged into this one, base first; empty until resolved
    pub resolved_chain: Vec<String>,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Group => "group",
            NodeKind::Field => "field",
            NodeKind::Attribute => "attribute",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Category {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "base" => Some(Category::Base),
            "application" => Some(Category::Application),
            "contributed" => Some(Category::Contributed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Base => "base",
            Category::Application => "application",
            Category::Contributed => "contributed",
        }
    }
}

impl Occurrence {
    pub fn as_str(self) -> &'static str {
        match self {
            Occurrence::Required => "required",
            Occurrence::Recommended => "recommended",
            Occurrence::Optional => "optional",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "required" => Some(Occurrence::Required),
            "recommended" => Some(Occurrence::Recommended),
            "optional" => Some(Occurrence::Optional),
            _ => None,
        }
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MaxOccurs {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unbounded" | "infty" => Some(MaxOccurs::Unbounded),
            other => other.parse().ok().map(MaxOccurs::Bounded),
        }
    }

    /// Whether `count` instances are within the bound
    pub fn allows(self, count: usize) -> bool {
        match self {
            MaxOccurs::Unbounded => true,
            MaxOccurs::Bounded(max) => count <= max as usize,
        }
    }
}

impl fmt::Display for MaxOccurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxOccurs::Bounded(n) => write!(f, "{n}"),
            MaxOccurs::Unbounded => f.write_str("unbounded"),
        }
    }
}

impl NxType {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "NX_CHAR" => NxType::Char,
            "NX_FLOAT" => NxType::Float,
            "NX_INT" => NxType::Int,
            "NX_UINT" => NxType::UInt,
            "NX_POSINT" => NxType::PosInt,
            "NX_NUMBER" => NxType::Number,
            "NX_COMPLEX" => NxType::Complex,
            "NX_BOOLEAN" => NxType::Boolean,
            "NX_BINARY" => NxType::Binary,
            "NX_DATE_TIME" => NxType::DateTime,
            "ISO8601" => NxType::Iso8601,
            "NX_CHAR_OR_NUMBER" => NxType::CharOrNumber,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NxType::Char => "NX_CHAR",
            NxType::Float => "NX_FLOAT",
            NxType::Int => "NX_INT",
            NxType::UInt => "NX_UINT",
            NxType::PosInt => "NX_POSINT",
            NxType::Number => "NX_NUMBER",
            NxType::Complex => "NX_COMPLEX",
            NxType::Boolean => "NX_BOOLEAN",
            NxType::Binary => "NX_BINARY",
            NxType::DateTime => "NX_DATE_TIME",
            NxType::Iso8601 => "ISO8601",
            NxType::CharOrNumber => "NX_CHAR_OR_NUMBER",
        }
    }

    /// Whether every value of `other` is also a valid value of `self`
    pub fn accepts(self, other: NxType) -> bool {
        if self == other {
            return true;
        }
        match self {
            NxType::Number | NxType::Complex => matches!(
                other,
                NxType::Float | NxType::Int | NxType::UInt | NxType::PosInt | NxType::Number
            ),
            NxType::Int => matches!(other, NxType::UInt | NxType::PosInt),
            NxType::UInt => other == NxType::PosInt,
            NxType::Char => matches!(other, NxType::DateTime | NxType::Iso8601),
            NxType::DateTime => other == NxType::Iso8601,
            NxType::Iso8601 => other == NxType::DateTime,
            NxType::CharOrNumber => other != NxType::Boolean && other != NxType::Binary,
            _ => false,
        }
    }
}

impl fmt::Display for NxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concept name for an unnamed group of the given class (`NXentry` → `ENTRY`)
pub fn concept_from_class(nx_class: &str) -> String {
    nx_class
        .strip_prefix("NX")
        .unwrap_or(nx_class)
        .to_uppercase()
}

/// Normalize documentation or comment text
///
/// Trailing whitespace is dropped, the common indentation removed and
/// leading/trailing blank lines stripped. Only ASCII spaces and tabs count
/// as indentation.
pub fn normalize_text(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let indent = lines
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| indentation(l))
        .min()
        .unwrap_or(0);
    let stripped: Vec<&str> = lines
        .iter()
        .map(|l| l.get(indent.min(indentation(l))..).unwrap_or(l))
        .collect();
    let start = stripped.iter().position(|l| !l.is_empty()).unwrap_or(stripped.len());
    let end = stripped.iter().rposition(|l| !l.is_empty()).map_or(start, |p| p + 1);
    stripped[start..end].join("\n")
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

impl SchemaNode {
    /// Create an empty node of the given kind
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            name: None,
            nx_class: None,
            data_type: None,
            name_type: None,
            units: None,
            occurrence: None,
            min_occurs: None,
            max_occurs: None,
            enumeration: Vec::new(),
            dimensions: None,
            doc: None,
            comments: Vec::new(),
            override_mode: OverrideMode::Extend,
            children: Vec::new(),
        }
    }

    /// Group node; `name` may be `None` for a typed placeholder
    pub fn group(name: Option<&str>, nx_class: &str) -> Self {
        let mut node = Self::new(NodeKind::Group);
        node.name = name.map(str::to_string);
        node.nx_class = Some(nx_class.to_string());
        node
    }

    /// Field node
    pub fn field(name: &str, data_type: Option<NxType>) -> Self {
        let mut node = Self::new(NodeKind::Field);
        node.name = Some(name.to_string());
        node.data_type = data_type;
        node
    }

    /// Attribute node
    pub fn attribute(name: &str, data_type: Option<NxType>) -> Self {
        let mut node = Self::new(NodeKind::Attribute);
        node.name = Some(name.to_string());
        node.data_type = data_type;
        node
    }

    pub fn with_occurrence(mut self, occurrence: Occurrence) -> Self {
        self.occurrence = Some(occurrence);
        self
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    pub fn with_occurs(mut self, min: Option<u32>, max: Option<MaxOccurs>) -> Self {
        self.min_occurs = min;
        self.max_occurs = max;
        self
    }

    pub fn with_enumeration<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enumeration = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_doc(mut self, doc: &str) -> Self {
        self.doc = Some(doc.to_string());
        self
    }

    pub fn with_override(mut self, mode: OverrideMode) -> Self {
        self.override_mode = mode;
        self
    }

    pub fn with_child(mut self, child: SchemaNode) -> Self {
        self.children.push(child);
        self
    }

    /// Placeholder concept if the node's name is resolved at population time
    pub fn placeholder_concept(&self) -> Option<String> {
        match &self.name {
            None => self.nx_class.as_deref().map(concept_from_class),
            Some(name) => {
                let any = self.name_type.as_deref() == Some("any");
                let upper = name.chars().any(char::is_uppercase)
                    && !name.chars().any(char::is_lowercase);
                (any || upper).then(|| name.clone())
            }
        }
    }

    /// Whether the node is a placeholder for dynamically named instances
    pub fn is_placeholder(&self) -> bool {
        self.placeholder_concept().is_some()
    }

    /// Name used to address the node in paths
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.nx_class.as_deref().map(concept_from_class))
            .unwrap_or_default()
    }

    /// Identity used to match nodes across classes
    pub fn key(&self) -> (NodeKind, String) {
        (self.kind, self.display_name())
    }

    /// Explicit occurrence, or the one implied by `minOccurs`
    pub fn declared_occurrence(&self) -> Option<Occurrence> {
        self.occurrence.or_else(|| {
            self.min_occurs.map(|min| {
                if min == 0 {
                    Occurrence::Optional
                } else {
                    Occurrence::Required
                }
            })
        })
    }

    /// Whether `maxOccurs="0"` forbids the node
    pub fn is_forbidden(&self) -> bool {
        self.max_occurs == Some(MaxOccurs::Bounded(0))
    }

    /// Find a direct child by kind and display name
    pub fn find_child(&self, kind: NodeKind, name: &str) -> Option<&SchemaNode> {
        self.children
            .iter()
            .find(|c| c.kind == kind && c.display_name() == name)
    }

    /// Count nodes in this subtree, including `self`
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SchemaNode::node_count).sum::<usize>()
    }
}

impl SchemaClass {
    /// Create an empty class
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        Self {
            name: name.into(),
            extends: None,
            category,
            doc: None,
            comments: Vec::new(),
            root: SchemaNode::new(NodeKind::Group),
            resolved_chain: Vec::new(),
        }
    }

    /// Set the parent class
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    /// Append a top-level member
    pub fn with_member(mut self, node: SchemaNode) -> Self {
        self.root.children.push(node);
        self
    }

    /// Parent class that must be loaded, ignoring the chain terminator
    pub fn parent_name(&self) -> Option<&str> {
        self.extends.as_deref().filter(|p| *p != ROOT_CLASS)
    }

    /// Whether inheritance has been resolved into this class
    pub fn is_resolved(&self) -> bool {
        !self.resolved_chain.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_detection() {
        assert_eq!(
            SchemaNode::group(None, "NXentry").placeholder_concept(),
            Some("ENTRY".to_string())
        );
        assert_eq!(
            SchemaNode::field("DATA", Some(NxType::Number)).placeholder_concept(),
            Some("DATA".to_string())
        );
        assert!(!SchemaNode::field("energy", None).is_placeholder());
        let mut any = SchemaNode::field("mode", None);
        any.name_type = Some("any".to_string());
        assert!(any.is_placeholder());
    }

    #[test]
    fn test_declared_occurrence_from_min_occurs() {
        let node = SchemaNode::group(None, "NXentry").with_occurs(Some(0), None);
        assert_eq!(node.declared_occurrence(), Some(Occurrence::Optional));
        let node = SchemaNode::group(None, "NXentry").with_occurs(Some(2), None);
        assert_eq!(node.declared_occurrence(), Some(Occurrence::Required));
        let node = SchemaNode::field("x", None).with_occurrence(Occurrence::Recommended);
        assert_eq!(node.declared_occurrence(), Some(Occurrence::Recommended));
        assert_eq!(SchemaNode::field("x", None).declared_occurrence(), None);
    }

    #[test]
    fn test_nx_type_acceptance() {
        assert!(NxType::Number.accepts(NxType::Float));
        assert!(NxType::Int.accepts(NxType::PosInt));
        assert!(!NxType::Float.accepts(NxType::Char));
        assert!(!NxType::Char.accepts(NxType::Float));
    }

    #[test]
    fn test_normalize_text_dedents_and_trims() {
        let text = "\n      First line\n        indented\n\n      last   \n    ";
        assert_eq!(normalize_text(text), "First line\n  indented\n\nlast");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_normalize_text_keeps_non_ascii_whitespace() {
        assert_eq!(normalize_text("\n \u{a0}x\n y\n"), "\u{a0}x\ny");
        assert_eq!(normalize_text("\u{a0}\u{a0}x\n  y"), "\u{a0}\u{a0}x\n  y");
    }

    #[test]
    fn test_parent_name_ignores_root_class() {
        let class = SchemaClass::new("NXbeam", Category::Base).with_parent(ROOT_CLASS);
        assert_eq!(class.parent_name(), None);
        let class = SchemaClass::new("NXxrd", Category::Application).with_parent("NXbeam_base");
        assert_eq!(class.parent_name(), Some("NXbeam_base"));
    }
}
