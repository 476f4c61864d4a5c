//! Dialect writer

use crate::syntax::{format_dimensions, format_header, format_list, format_occurs};
use nx_schema::{OverrideMode, SchemaClass, SchemaNode};
use tracing::trace;

/// Spaces per nesting level
pub const INDENT: usize = 2;

struct Emitter {
    out: String,
}

impl Emitter {
    fn line(&mut self, indent: usize, text: &str) {
        self.out.extend(std::iter::repeat_n(' ', indent));
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn property(&mut self, indent: usize, key: &str, value: &str) {
        self.line(indent, &format!("{key}: {value}"));
    }

    fn comments(&mut self, indent: usize, comments: &[String]) {
        for comment in comments {
            if comment.trim().is_empty() {
                continue;
            }
            let single = !comment.contains('\n') && comment.trim() == comment && comment != "|";
            if single {
                self.line(indent, &format!("# {comment}"));
                continue;
            }
            self.line(indent, "# |");
            for line in comment.lines() {
                if line.trim().is_empty() {
                    self.line(indent, "#");
                } else {
                    self.line(indent, &format!("#   {}", line.trim_end()));
                }
            }
        }
    }

    fn doc(&mut self, indent: usize, doc: &str) {
        let single = !doc.is_empty() && !doc.contains('\n') && doc.trim() == doc && doc != "|";
        if single {
            self.property(indent, "doc", doc);
            return;
        }
        self.property(indent, "doc", "|");
        for line in doc.lines() {
            if line.trim().is_empty() {
                self.out.push('\n');
            } else {
                self.line(indent + INDENT, line.trim_end());
            }
        }
    }

    fn node(&mut self, indent: usize, node: &SchemaNode) {
        self.comments(indent, &node.comments);
        self.line(indent, &format_header(node));

        let inner = indent + INDENT;
        if let Some(occurrence) = node.occurrence {
            self.property(inner, "exists", occurrence.as_str());
        }
        if let Some(occurs) = format_occurs(node.min_occurs, node.max_occurs) {
            self.property(inner, "occurs", &occurs);
        }
        if let Some(name_type) = &node.name_type {
            self.property(inner, "nameType", name_type);
        }
        if let Some(units) = &node.units {
            self.property(inner, "unit", units);
        }
        if node.override_mode == OverrideMode::Replace {
            self.property(inner, "override", "replace");
        }
        if let Some(dims) = &node.dimensions {
            self.property(inner, "dimensions", &format_dimensions(dims));
        }
        if !node.enumeration.is_empty() {
            self.property(inner, "enumeration", &format_list(&node.enumeration));
        }
        if let Some(doc) = &node.doc {
            self.doc(inner, doc);
        }
        for child in &node.children {
            self.node(inner, child);
        }
    }
}

/// Render a class as dialect text
///
/// Class comments come first, then `category:` and the class `doc:`, then
/// the `Name(Parent):` header with every member indented beneath it.
/// Resolved inheritance is not written; only the declared parent is.
pub fn canonical_to_dialect(class: &SchemaClass) -> String {
    let mut emitter = Emitter { out: String::new() };
    emitter.comments(0, &class.comments);
    emitter.comments(0, &class.root.comments);
    emitter.property(0, "category", class.category.as_str());
    if let Some(doc) = &class.doc {
        emitter.doc(0, doc);
    }
    match &class.extends {
        Some(parent) => emitter.line(0, &format!("{}({parent}):", class.name)),
        None => emitter.line(0, &format!("{}:", class.name)),
    }
    for child in &class.root.children {
        emitter.node(INDENT, child);
    }
    trace!(
        class = %class.name,
        lines = emitter.out.lines().count(),
        "Wrote dialect text"
    );
    emitter.out
}
