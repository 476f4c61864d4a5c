//! Template construction from a resolved application definition and mix-ins

use crate::path::{SegmentName, TemplatePath, TemplateSegment, index_key};
use crate::template::{FieldSpec, Template};
use crate::{Error, Result};
use nx_schema::{Category, MaxOccurs, NodeKind, NxType, Occurrence, SchemaClass, SchemaNode};
use std::collections::HashSet;
use tracing::{debug, info};

/// Builds a [`Template`] from an application definition and auxiliary classes
///
/// A mix-in whose name equals the NX class of a group is overlaid beneath
/// every such group, recursively. A mix-in that matches no group is
/// overlaid at the root. Application nodes keep their constraints; mix-in
/// nodes only fill attributes the application left unset and add new paths.
pub struct TemplateBuilder<'a> {
    application: &'a SchemaClass,
    mixins: Vec<&'a SchemaClass>,
}

struct Origin<'a> {
    category: Category,
    class: &'a str,
}

impl<'a> TemplateBuilder<'a> {
    /// Start from a resolved application definition
    pub fn new(application: &'a SchemaClass) -> Self {
        Self {
            application,
            mixins: Vec::new(),
        }
    }

    /// Add an auxiliary class
    #[must_use]
    pub fn with_mixin(mut self, mixin: &'a SchemaClass) -> Self {
        self.mixins.push(mixin);
        self
    }

    /// Flatten everything into a template
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] when two classes declare incompatible
    /// constraints for the same path.
    pub fn build(self) -> Result<Template> {
        let mut template = Template::new(&self.application.name);
        let mut used = HashSet::new();
        let origin = Origin {
            category: self.application.category,
            class: &self.application.name,
        };

        let root = TemplatePath::root();
        let mut stack = Vec::new();
        for node in &self.application.root.children {
            self.apply(&mut template, node, &root, &origin, &mut stack, &mut used)?;
        }

        for mixin in &self.mixins {
            if used.contains(mixin.name.as_str()) {
                continue;
            }
            debug!(mixin = %mixin.name, "Mix-in matches no group, overlaying at root");
            used.insert(mixin.name.clone());
            self.overlay(&mut template, mixin, &root, &mut stack, &mut used)?;
        }

        for idx in 0..template.len() {
            let spec = template.entry_mut(idx);
            if spec.kind != NodeKind::Group && spec.data_type.is_none() {
                spec.data_type = Some(NxType::Char);
            }
        }

        info!(
            application = %self.application.name,
            mixins = self.mixins.len(),
            paths = template.len(),
            "Built template"
        );
        Ok(template)
    }

    fn overlay(
        &self,
        template: &mut Template,
        mixin: &SchemaClass,
        at: &TemplatePath,
        stack: &mut Vec<String>,
        used: &mut HashSet<String>,
    ) -> Result<()> {
        stack.push(mixin.name.clone());
        let origin = Origin {
            category: mixin.category,
            class: &mixin.name,
        };
        for node in &mixin.root.children {
            self.apply(template, node, at, &origin, stack, used)?;
        }
        stack.pop();
        Ok(())
    }

    fn apply(
        &self,
        template: &mut Template,
        node: &SchemaNode,
        parent: &TemplatePath,
        origin: &Origin<'_>,
        stack: &mut Vec<String>,
        used: &mut HashSet<String>,
    ) -> Result<()> {
        let segment = TemplateSegment {
            kind: node.kind,
            name: match node.placeholder_concept() {
                Some(concept) => SegmentName::Placeholder(concept),
                None => SegmentName::Literal(node.display_name()),
            },
            nx_class: node.nx_class.clone(),
        };
        let path = parent.join(segment);
        let key = index_key(&path);

        match template.position(&key) {
            Some(idx) => {
                let existing = template.entry_mut(idx);
                check_conflict(existing, node, &key)?;
                fill_unset(existing, node);
            }
            None => {
                template.insert(new_spec(node, path.clone(), origin));
            }
        }

        for child in &node.children {
            self.apply(template, child, &path, origin, stack, used)?;
        }

        if node.kind == NodeKind::Group {
            if let Some(mixin) = self
                .mixins
                .iter()
                .find(|m| node.nx_class.as_deref() == Some(m.name.as_str()))
            {
                if !stack.contains(&mixin.name) {
                    used.insert(mixin.name.clone());
                    self.overlay(template, mixin, &path, stack, used)?;
                }
            }
        }
        Ok(())
    }
}

fn default_occurrence(kind: NodeKind, category: Category) -> Occurrence {
    match (kind, category) {
        (NodeKind::Attribute, _) | (_, Category::Base) => Occurrence::Optional,
        _ => Occurrence::Required,
    }
}

fn new_spec(node: &SchemaNode, path: TemplatePath, origin: &Origin<'_>) -> FieldSpec {
    let repeatable = node.is_placeholder()
        || matches!(node.max_occurs, Some(MaxOccurs::Unbounded))
        || matches!(node.max_occurs, Some(MaxOccurs::Bounded(n)) if n > 1);
    FieldSpec {
        path,
        kind: node.kind,
        occurrence: node
            .declared_occurrence()
            .unwrap_or_else(|| default_occurrence(node.kind, origin.category)),
        data_type: node.data_type,
        nx_class: node.nx_class.clone(),
        units: node.units.clone(),
        enumeration: node.enumeration.clone(),
        min_occurs: node.min_occurs,
        max_occurs: node.max_occurs,
        dimensions: node.dimensions.clone(),
        repeatable,
        doc: node.doc.clone(),
        source: origin.class.to_string(),
    }
}

fn check_conflict(existing: &FieldSpec, node: &SchemaNode, key: &str) -> Result<()> {
    if existing.kind != node.kind {
        return Err(Error::conflict(
            key,
            format!("different node kinds ({} vs {})", existing.kind, node.kind),
        ));
    }
    if let (Some(a), Some(b)) = (&existing.nx_class, &node.nx_class) {
        if a != b {
            return Err(Error::conflict(key, format!("different group classes ({a} vs {b})")));
        }
    }
    if let (Some(a), Some(b)) = (existing.data_type, node.data_type) {
        if !a.accepts(b) && !b.accepts(a) {
            return Err(Error::conflict(key, format!("incompatible data types ({a} vs {b})")));
        }
    }
    if let (Some(a), Some(b)) = (&existing.units, &node.units) {
        if a != b {
            return Err(Error::conflict(key, format!("different unit categories ({a} vs {b})")));
        }
    }
    if !existing.enumeration.is_empty()
        && !node.enumeration.is_empty()
        && !existing.enumeration.iter().any(|v| node.enumeration.contains(v))
    {
        return Err(Error::conflict(key, "disjoint enumerations"));
    }
    let required_vs_forbidden = (existing.is_required() && node.is_forbidden())
        || (existing.is_forbidden() && node.declared_occurrence() == Some(Occurrence::Required));
    if required_vs_forbidden {
        return Err(Error::conflict(key, "required in one class and forbidden in another"));
    }
    Ok(())
}

fn fill_unset(spec: &mut FieldSpec, node: &SchemaNode) {
    if spec.data_type.is_none() {
        spec.data_type = node.data_type;
    }
    if spec.nx_class.is_none() {
        spec.nx_class.clone_from(&node.nx_class);
    }
    if spec.units.is_none() {
        spec.units.clone_from(&node.units);
    }
    if spec.enumeration.is_empty() {
        spec.enumeration.clone_from(&node.enumeration);
    }
    if spec.min_occurs.is_none() {
        spec.min_occurs = node.min_occurs;
    }
    if spec.max_occurs.is_none() {
        spec.max_occurs = node.max_occurs;
    }
    if spec.dimensions.is_none() {
        spec.dimensions.clone_from(&node.dimensions);
    }
    if spec.doc.is_none() {
        spec.doc.clone_from(&node.doc);
    }
}
