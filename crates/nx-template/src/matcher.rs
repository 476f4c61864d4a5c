//! Deterministic placeholder matching
//!
//! A data path such as `/ENTRY[entry]/INSTRUMENT[instrument]/beam/energy` is
//! walked segment by segment against the template:
//!
//! * `CONCEPT[name]` selects the placeholder with that concept, falling back
//!   to a literal named `CONCEPT`;
//! * a bare name prefers an exact literal, then a placeholder whose
//!   lower-cased concept equals the name, then the first placeholder;
//! * inner segments are groups, the last segment is a field (or a group),
//!   an `@name` segment is an attribute and its owner may be a group or a
//!   field.

use crate::path::{SegmentName, TemplatePath, index_key};
use crate::template::{FieldSpec, Template};
use nx_ir::{DataPath, DataSegment};
use nx_schema::NodeKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One segment of a resolved path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConcreteSegment {
    pub kind: NodeKind,
    /// Instance name written to the output
    pub name: String,
    /// Placeholder concept the instance belongs to
    pub concept: Option<String>,
    pub nx_class: Option<String>,
}

/// Output path with the template pattern it instantiates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConcretePath {
    pub segments: Vec<ConcreteSegment>,
    /// Matched template path; `None` for undocumented entries
    pub pattern: Option<TemplatePath>,
}

impl ConcretePath {
    /// Path for data the template does not describe
    ///
    /// Inner segments are groups; the last one is an attribute or a field.
    pub fn undocumented(path: &DataPath) -> Self {
        let count = path.segments().len();
        let segments = path
            .segments()
            .iter()
            .enumerate()
            .map(|(i, s)| ConcreteSegment {
                kind: if s.attribute {
                    NodeKind::Attribute
                } else if i + 1 == count {
                    NodeKind::Field
                } else {
                    NodeKind::Group
                },
                name: s.name.clone(),
                concept: s.concept.clone(),
                nx_class: None,
            })
            .collect();
        Self {
            segments,
            pattern: None,
        }
    }

    /// Kind of the addressed node
    pub fn kind(&self) -> NodeKind {
        self.segments.last().map_or(NodeKind::Group, |s| s.kind)
    }

    pub fn is_attribute(&self) -> bool {
        self.kind() == NodeKind::Attribute
    }

    /// Whether the path matched a template entry
    pub fn is_documented(&self) -> bool {
        self.pattern.is_some()
    }

    /// Path of the owning node, `None` for top-level nodes
    pub fn parent(&self) -> Option<ConcretePath> {
        let (_, rest) = self.segments.split_last()?;
        if rest.is_empty() {
            return None;
        }
        Some(Self {
            segments: rest.to_vec(),
            pattern: self.pattern.as_ref().and_then(TemplatePath::parent),
        })
    }

    /// Name of the addressed node
    pub fn name(&self) -> &str {
        self.segments.last().map_or("", |s| s.name.as_str())
    }

    /// Output path (`/entry/beam/energy`, `/entry/data/@signal`)
    pub fn output_path(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            if segment.kind == NodeKind::Attribute {
                out.push('@');
            }
            out.push_str(&segment.name);
        }
        out
    }
}

impl fmt::Display for ConcretePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.output_path())
    }
}

impl Template {
    /// Resolve a data path against the template
    ///
    /// Candidates are tried in priority order with backtracking, so the
    /// first complete match wins. Returns `None` when no assignment of
    /// template entries covers every segment.
    pub fn resolve(&self, path: &DataPath) -> Option<ConcretePath> {
        let mut matched = Vec::with_capacity(path.segments().len());
        if !self.walk("", path.segments(), &mut matched) {
            return None;
        }

        let pattern = matched.last()?.path.clone();
        let segments = path
            .segments()
            .iter()
            .zip(&matched)
            .map(|(segment, spec)| ConcreteSegment {
                kind: spec.kind,
                name: segment.name.clone(),
                concept: spec
                    .path
                    .last()
                    .filter(|s| s.name.is_placeholder())
                    .map(|s| s.name.as_str().to_string()),
                nx_class: spec.nx_class.clone(),
            })
            .collect();
        Some(ConcretePath {
            segments,
            pattern: Some(pattern),
        })
    }

    fn walk<'t>(
        &'t self,
        parent_key: &str,
        rest: &[DataSegment],
        matched: &mut Vec<&'t FieldSpec>,
    ) -> bool {
        let Some((segment, tail)) = rest.split_first() else {
            return true;
        };
        let kinds: &[NodeKind] = if segment.attribute {
            &[NodeKind::Attribute]
        } else if tail.first().is_some_and(|s| s.attribute) {
            &[NodeKind::Group, NodeKind::Field]
        } else if tail.is_empty() {
            &[NodeKind::Field, NodeKind::Group]
        } else {
            &[NodeKind::Group]
        };

        for spec in self.candidates(parent_key, segment, kinds) {
            matched.push(spec);
            if self.walk(&index_key(&spec.path), tail, matched) {
                return true;
            }
            matched.pop();
        }
        false
    }

    /// Template children that may instantiate `segment`, best first
    fn candidates(
        &self,
        parent_key: &str,
        segment: &DataSegment,
        kinds: &[NodeKind],
    ) -> Vec<&FieldSpec> {
        let children: Vec<&FieldSpec> = self
            .children_of(parent_key)
            .filter(|spec| kinds.contains(&spec.kind))
            .collect();

        let mut ordered = match &segment.concept {
            Some(concept) => {
                let mut list = select(&children, kinds, |n| {
                    n.is_placeholder() && n.as_str() == concept
                });
                list.extend(select(&children, kinds, |n| {
                    !n.is_placeholder() && n.as_str() == concept
                }));
                list
            }
            None => {
                let name = segment.name.as_str();
                let mut list = select(&children, kinds, |n| !n.is_placeholder() && n.as_str() == name);
                list.extend(select(&children, kinds, |n| {
                    n.is_placeholder() && n.as_str().to_lowercase() == name
                }));
                list.extend(select(&children, kinds, SegmentName::is_placeholder));
                list
            }
        };
        let mut seen = Vec::new();
        ordered.retain(|spec| {
            let fresh = !seen.contains(&spec.path);
            if fresh {
                seen.push(spec.path.clone());
            }
            fresh
        });
        ordered
    }
}

/// Children whose last segment satisfies `pred`, grouped by kind order
fn select<'t>(
    children: &[&'t FieldSpec],
    kinds: &[NodeKind],
    pred: impl Fn(&SegmentName) -> bool,
) -> Vec<&'t FieldSpec> {
    let mut out = Vec::new();
    for kind in kinds {
        for spec in children {
            if spec.kind == *kind && spec.path.last().is_some_and(|s| pred(&s.name)) {
                out.push(*spec);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::TemplateBuilder;
    use nx_ir::DataPath;
    use nx_schema::{Category, NodeKind, NxType, SchemaClass, SchemaNode};

    fn template() -> crate::Template {
        let mut class = SchemaClass::new("NXapp", Category::Application);
        class.root.children = vec![
            SchemaNode::group(None, "NXentry")
                .with_child(SchemaNode::field("title", None))
                .with_child(
                    SchemaNode::group(None, "NXinstrument").with_child(
                        SchemaNode::group(Some("beam"), "NXbeam").with_child(
                            SchemaNode::field("energy", Some(NxType::Float))
                                .with_units("NX_ENERGY"),
                        ),
                    ),
                )
                .with_child(
                    SchemaNode::group(None, "NXdata")
                        .with_child(SchemaNode::attribute("signal", None))
                        .with_child(SchemaNode::field("DATA", Some(NxType::Number))),
                )
                .with_child(SchemaNode::group(None, "NXmonitor")),
        ];
        TemplateBuilder::new(&class).build().unwrap()
    }

    fn resolve(raw: &str) -> Option<crate::ConcretePath> {
        template().resolve(&DataPath::parse(raw).unwrap())
    }

    #[test]
    fn test_concept_brackets_select_placeholders() {
        let path = resolve("/ENTRY[entry]/INSTRUMENT[instrument]/beam/energy").unwrap();
        assert_eq!(path.output_path(), "/entry/instrument/beam/energy");
        assert_eq!(
            path.pattern.unwrap().to_string(),
            "/ENTRY/INSTRUMENT/beam/energy"
        );
        assert_eq!(path.segments[0].concept.as_deref(), Some("ENTRY"));
        assert_eq!(path.segments[2].concept, None);
    }

    #[test]
    fn test_bare_names_use_lowercase_concept_then_first_placeholder() {
        let path = resolve("/entry/data/counts").unwrap();
        assert_eq!(path.output_path(), "/entry/data/counts");
        assert_eq!(path.pattern.unwrap().to_string(), "/ENTRY/DATA/DATA");

        // "scan_1" matches no concept, so the first group placeholder wins
        let path = resolve("/scan_1/title").unwrap();
        assert_eq!(path.pattern.unwrap().to_string(), "/ENTRY/title");
    }

    #[test]
    fn test_attributes_and_unknown_paths() {
        let path = resolve("/ENTRY[entry]/DATA[data]/@signal").unwrap();
        assert!(path.is_attribute());
        assert_eq!(path.output_path(), "/entry/data/@signal");
        assert_eq!(path.parent().unwrap().output_path(), "/entry/data");

        assert!(resolve("/ENTRY[entry]/INSTRUMENT[instrument]/beam/unknown_xyz").is_none());
        assert!(resolve("/ENTRY[entry]/title/@nonexistent").is_none());
        assert!(resolve("/ENTRY[entry]/MONITOR[monitor]/x").is_none());
    }

    #[test]
    fn test_literal_beats_placeholder_before_attribute() {
        let path = resolve("/entry/DATA[data]/@signal").unwrap();
        assert_eq!(path.pattern.unwrap().to_string(), "/ENTRY/DATA/@signal");
        // "title" is a literal field; group placeholders are not tried first
        assert!(resolve("/entry/title/@units").is_none());
    }

    #[test]
    fn test_undocumented_path_kinds() {
        let raw = DataPath::parse("/entry/extra/@note").unwrap();
        let path = crate::ConcretePath::undocumented(&raw);
        assert_eq!(path.kind(), NodeKind::Attribute);
        assert_eq!(path.segments[1].kind, NodeKind::Group);
        assert!(!path.is_documented());
    }
}
