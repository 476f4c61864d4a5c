//! Flattened templates and their field specifications
#![allow(clippy::must_use_candidate)] // Accessors read naturally at call sites without #[must_use].

use crate::path::{TemplatePath, index_key};
use nx_schema::model::UNITLESS_CATEGORIES;
use nx_schema::{Dimensions, MaxOccurs, NodeKind, NxType, Occurrence};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Effective constraints for one template path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub path: TemplatePath,
    pub kind: NodeKind,
    pub occurrence: Occurrence,
    /// Declared type; untyped fields and attributes become `NX_CHAR`
    pub data_type: Option<NxType>,
    pub nx_class: Option<String>,
    /// Unit category
    pub units: Option<String>,
    pub enumeration: Vec<String>,
    pub min_occurs: Option<u32>,
    pub max_occurs: Option<MaxOccurs>,
    pub dimensions: Option<Dimensions>,
    /// Whether more than one instance may exist
    pub repeatable: bool,
    pub doc: Option<String>,
    /// Class that declared the path first
    pub source: String,
}

impl FieldSpec {
    pub fn is_required(&self) -> bool {
        self.occurrence == Occurrence::Required
    }

    /// `maxOccurs="0"`
    pub fn is_forbidden(&self) -> bool {
        self.max_occurs == Some(MaxOccurs::Bounded(0))
    }

    /// Whether a value written here must carry a unit
    pub fn needs_unit(&self) -> bool {
        self.kind == NodeKind::Field
            && self
                .units
                .as_deref()
                .is_some_and(|u| !UNITLESS_CATEGORIES.contains(&u))
    }
}

/// Mapping from normalized path to effective field specification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Template {
    name: String,
    entries: Vec<FieldSpec>,
    index: HashMap<String, usize>,
    children: HashMap<String, Vec<usize>>,
}

impl Template {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub(crate) fn insert(&mut self, spec: FieldSpec) -> usize {
        let key = index_key(&spec.path);
        let parent = spec.path.parent().map(|p| index_key(&p)).unwrap_or_default();
        let idx = self.entries.len();
        self.entries.push(spec);
        self.index.insert(key, idx);
        self.children.entry(parent).or_default().push(idx);
        idx
    }

    pub(crate) fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub(crate) fn entry_mut(&mut self, idx: usize) -> &mut FieldSpec {
        &mut self.entries[idx]
    }

    /// Name of the application definition the template was built from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a spec by its display path (`/ENTRY/title`)
    pub fn get(&self, path: &str) -> Option<&FieldSpec> {
        self.index.get(path).map(|&i| &self.entries[i])
    }

    /// All specs in depth-first declaration order
    pub fn entries(&self) -> &[FieldSpec] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Direct children of the path with the given display key (`""` is the root)
    pub fn children_of(&self, key: &str) -> impl Iterator<Item = &FieldSpec> {
        self.children
            .get(key)
            .into_iter()
            .flatten()
            .map(|&i| &self.entries[i])
    }

    /// Human readable listing of every path with its constraints
    pub fn dump(&self) -> String {
        let mut out = format!("# Template for {} ({} paths)\n", self.name, self.len());
        for spec in &self.entries {
            let mut detail = String::new();
            match spec.kind {
                NodeKind::Group => {
                    if let Some(class) = &spec.nx_class {
                        let _ = write!(detail, " {class}");
                    }
                }
                NodeKind::Field | NodeKind::Attribute => {
                    if let Some(dtype) = spec.data_type {
                        let _ = write!(detail, " {dtype}");
                    }
                }
            }
            if let Some(units) = &spec.units {
                let _ = write!(detail, " units={units}");
            }
            if !spec.enumeration.is_empty() {
                let _ = write!(detail, " enum=[{}]", spec.enumeration.join(", "));
            }
            if let Some(dims) = &spec.dimensions {
                let _ = write!(detail, " rank={}", dims.rank);
            }
            if spec.repeatable {
                detail.push_str(" repeatable");
            }
            let _ = writeln!(
                out,
                "{:<12}{:<10}{}{}",
                spec.occurrence.as_str(),
                spec.kind.as_str(),
                spec.path,
                detail
            );
        }
        out
    }
}
