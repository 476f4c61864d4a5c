//! Schema inheritance and merge logic
//!
//! A class chain `base → ... → leaf` is resolved by folding [`merge_nodes`]
//! over the class roots. The merge is a plain data operation: a derived node
//! replaces the matching base node attribute by attribute, unset attributes
//! inherit, and children are merged recursively.

use crate::model::{Category, NodeKind, Occurrence, OverrideMode, SchemaClass, SchemaNode};
use std::collections::HashSet;

/// Tracks inheritance relationships to detect cycles
#[derive(Debug, Default)]
pub struct InheritanceGraph {
    edges: Vec<(String, String)>, // (child, parent)
}

impl InheritanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, child: impl Into<String>, parent: impl Into<String>) {
        self.edges.push((child.into(), parent.into()));
    }

    /// Detect if adding this edge would create a cycle
    pub fn would_create_cycle(&self, child: &str, parent: &str) -> bool {
        if child == parent {
            return true;
        }

        // Check if parent depends on child (directly or transitively)
        let mut to_visit = vec![parent.to_string()];
        let mut visited = HashSet::new();

        while let Some(current) = to_visit.pop() {
            if current == child {
                return true;
            }
            if visited.insert(current.clone()) {
                for (c, p) in &self.edges {
                    if c == &current {
                        to_visit.push(p.clone());
                    }
                }
            }
        }

        false
    }
}

/// Mark every node without an occurrence as optional
///
/// Applied to base classes before merging: base-class members are optional
/// unless the definition says otherwise.
pub fn apply_category_defaults(class: &mut SchemaClass) {
    fn walk(node: &mut SchemaNode) {
        for child in &mut node.children {
            if child.declared_occurrence().is_none() {
                child.occurrence = Some(Occurrence::Optional);
            }
            walk(child);
        }
    }
    if class.category == Category::Base {
        walk(&mut class.root);
    }
}

/// Merge a derived node over the base node it overrides
///
/// Attributes set on `child` win; unset ones are taken from `parent`.
/// Children keep the base order, matching children are merged recursively
/// and new derived children are appended. With [`OverrideMode::Replace`]
/// on `child` only the derived children are kept.
pub fn merge_nodes(parent: &SchemaNode, child: &SchemaNode) -> SchemaNode {
    let children = if child.override_mode == OverrideMode::Replace {
        child.children.clone()
    } else {
        merge_children(&parent.children, &child.children)
    };

    SchemaNode {
        kind: child.kind,
        name: child.name.clone().or_else(|| parent.name.clone()),
        nx_class: child.nx_class.clone().or_else(|| parent.nx_class.clone()),
        data_type: child.data_type.or(parent.data_type),
        name_type: child.name_type.clone().or_else(|| parent.name_type.clone()),
        units: child.units.clone().or_else(|| parent.units.clone()),
        occurrence: child.occurrence.or(parent.occurrence),
        min_occurs: child.min_occurs.or(parent.min_occurs),
        max_occurs: child.max_occurs.or(parent.max_occurs),
        enumeration: if child.enumeration.is_empty() {
            parent.enumeration.clone()
        } else {
            child.enumeration.clone()
        },
        dimensions: child.dimensions.clone().or_else(|| parent.dimensions.clone()),
        doc: child.doc.clone().or_else(|| parent.doc.clone()),
        comments: if child.comments.is_empty() {
            parent.comments.clone()
        } else {
            child.comments.clone()
        },
        override_mode: if child.override_mode == OverrideMode::Replace {
            OverrideMode::Replace
        } else {
            parent.override_mode
        },
        children,
    }
}

fn merge_children(base: &[SchemaNode], derived: &[SchemaNode]) -> Vec<SchemaNode> {
    let mut used = vec![false; derived.len()];
    let mut merged = Vec::with_capacity(base.len() + derived.len());

    for node in base {
        let key = node.key();
        match derived
            .iter()
            .enumerate()
            .find(|(i, d)| !used[*i] && d.key() == key)
        {
            Some((i, d)) => {
                used[i] = true;
                merged.push(merge_nodes(node, d));
            }
            None => merged.push(node.clone()),
        }
    }

    for (i, node) in derived.iter().enumerate() {
        if used[i] {
            continue;
        }
        match matching_placeholder(base, node) {
            Some(placeholder) => merged.push(merge_nodes(placeholder, node)),
            None => merged.push(node.clone()),
        }
    }
    merged
}

/// Base placeholder a new concrete node instantiates
///
/// Groups match on NX class; fields and attributes on an identical declared
/// type.
fn matching_placeholder<'a>(base: &'a [SchemaNode], node: &SchemaNode) -> Option<&'a SchemaNode> {
    if node.is_placeholder() {
        return None;
    }
    base.iter().find(|b| {
        b.kind == node.kind
            && b.is_placeholder()
            && match node.kind {
                NodeKind::Group => b.nx_class.is_some() && b.nx_class == node.nx_class,
                NodeKind::Field | NodeKind::Attribute => {
                    node.data_type.is_some() && b.data_type == node.data_type
                }
            }
    })
}

/// Merge a chain of classes ordered base → leaf into one class
///
/// The result carries the leaf's identity and the names of every merged
/// class in `resolved_chain`.
pub fn apply_inheritance_chain(chain: &[SchemaClass]) -> Option<SchemaClass> {
    let (leaf, _) = chain.split_last()?;
    let root = chain[1..]
        .iter()
        .fold(chain[0].root.clone(), |acc, class| merge_nodes(&acc, &class.root));

    let mut merged = leaf.clone();
    merged.root = root;
    merged.doc = leaf
        .doc
        .clone()
        .or_else(|| chain.iter().rev().find_map(|c| c.doc.clone()));
    merged.resolved_chain = chain.iter().map(|c| c.name.clone()).collect();
    Some(merged)
}
