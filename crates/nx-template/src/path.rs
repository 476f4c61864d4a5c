//! Normalized template paths

use nx_schema::NodeKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of one template path segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentName {
    /// Fixed name written as-is
    Literal(String),
    /// Concept whose instance name is chosen at population time
    Placeholder(String),
}

/// One segment of a [`TemplatePath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateSegment {
    pub kind: NodeKind,
    pub name: SegmentName,
    /// NX class for group segments
    pub nx_class: Option<String>,
}

/// Path of a template entry, e.g. `/ENTRY/INSTRUMENT/beam/energy/@units`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TemplatePath {
    segments: Vec<TemplateSegment>,
}

impl SegmentName {
    /// Literal name or placeholder concept
    pub fn as_str(&self) -> &str {
        match self {
            SegmentName::Literal(s) | SegmentName::Placeholder(s) => s,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, SegmentName::Placeholder(_))
    }
}

impl fmt::Display for TemplateSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == NodeKind::Attribute {
            f.write_str("@")?;
        }
        f.write_str(self.name.as_str())
    }
}

impl TemplatePath {
    /// The empty (root) path
    pub fn root() -> Self {
        Self::default()
    }

    /// Path extended by one segment
    #[must_use]
    pub fn join(&self, segment: TemplateSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn segments(&self) -> &[TemplateSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, `None` for the root
    pub fn last(&self) -> Option<&TemplateSegment> {
        self.segments.last()
    }

    /// Parent path, `None` for the root
    pub fn parent(&self) -> Option<TemplatePath> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }

    /// Whether any segment is a placeholder
    pub fn has_placeholder(&self) -> bool {
        self.segments.iter().any(|s| s.name.is_placeholder())
    }
}

impl fmt::Display for TemplatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// Key of a path in the template index (`""` for the root)
pub(crate) fn index_key(path: &TemplatePath) -> String {
    if path.is_root() {
        String::new()
    } else {
        path.to_string()
    }
}
