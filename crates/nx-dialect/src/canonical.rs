//! Canonical comparison of classes
//!
//! Two classes are equivalent when they agree after doc and comment text
//! is normalized, empty comments are dropped and the resolved inheritance
//! chain is ignored. Child order stays significant.

use nx_schema::SchemaClass;
use nx_schema::SchemaNode;
use nx_schema::model::normalize_text;

fn canonical_comments(comments: &[String]) -> Vec<String> {
    comments
        .iter()
        .map(|c| normalize_text(c))
        .filter(|c| !c.is_empty())
        .collect()
}

fn canonical_node(node: &mut SchemaNode) {
    node.doc = node.doc.as_deref().map(normalize_text);
    node.comments = canonical_comments(&node.comments);
    node.children.iter_mut().for_each(canonical_node);
}

/// Canonical form of a class
#[must_use]
pub fn canonicalize(class: &SchemaClass) -> SchemaClass {
    let mut class = class.clone();
    class.resolved_chain.clear();
    class.doc = class.doc.as_deref().map(normalize_text);
    let mut comments = std::mem::take(&mut class.comments);
    comments.append(&mut class.root.comments);
    class.comments = canonical_comments(&comments);
    canonical_node(&mut class.root);
    class
}

/// Whether two classes are equal in canonical form
#[must_use]
pub fn equivalent(left: &SchemaClass, right: &SchemaClass) -> bool {
    canonicalize(left) == canonicalize(right)
}
