//! Data-converter style paths
//!
//! Contributions address the output tree with paths such as
//! `/ENTRY[entry]/INSTRUMENT[instrument]/beam/energy/@units`. A segment may
//! name the schema concept it instantiates (`ENTRY[entry]`) or just the
//! instance (`entry`); a leading `@` marks an attribute, which must be the
//! last segment.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One segment of a [`DataPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataSegment {
    /// Schema concept named in brackets notation (`ENTRY` in `ENTRY[entry]`)
    pub concept: Option<String>,

    /// Instance name written to the output
    pub name: String,

    /// Whether the segment addresses an attribute
    pub attribute: bool,
}

/// Parsed contribution key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataPath {
    segments: Vec<DataSegment>,
}

impl DataSegment {
    /// Plain instance segment
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            concept: None,
            name: name.into(),
            attribute: false,
        }
    }

    /// `CONCEPT[name]` segment
    pub fn instance(concept: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            concept: Some(concept.into()),
            name: name.into(),
            attribute: false,
        }
    }

    /// `@name` segment
    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            concept: None,
            name: name.into(),
            attribute: true,
        }
    }

    fn parse(raw: &str, full: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::invalid_path(full, "empty segment"));
        }
        if let Some(name) = raw.strip_prefix('@') {
            check_name(name, full)?;
            return Ok(Self::attribute(name));
        }
        match raw.find('[') {
            Some(open) => {
                let inner = raw[open + 1..]
                    .strip_suffix(']')
                    .ok_or_else(|| Error::invalid_path(full, format!("unclosed '[' in '{raw}'")))?;
                let concept = &raw[..open];
                check_name(concept, full)?;
                check_name(inner, full)?;
                Ok(Self::instance(concept, inner))
            }
            None => {
                check_name(raw, full)?;
                Ok(Self::named(raw))
            }
        }
    }
}

fn check_name(name: &str, full: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_path(full, "empty name"));
    }
    if name.contains(['[', ']', '@', '/']) {
        return Err(Error::invalid_path(
            full,
            format!("'{name}' contains a reserved character"),
        ));
    }
    Ok(())
}

impl fmt::Display for DataSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attribute {
            return write!(f, "@{}", self.name);
        }
        match &self.concept {
            Some(concept) => write!(f, "{concept}[{}]", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl DataPath {
    /// Parse a contribution key
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] for relative paths, empty segments,
    /// malformed brackets or attributes that are not the last segment.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix('/')
            .ok_or_else(|| Error::invalid_path(raw, "path must start with '/'"))?;
        if body.is_empty() {
            return Err(Error::invalid_path(raw, "path addresses the root"));
        }
        let segments = body
            .split('/')
            .map(|s| DataSegment::parse(s, raw))
            .collect::<Result<Vec<_>>>()?;
        if let Some(pos) = segments.iter().position(|s| s.attribute) {
            if pos + 1 != segments.len() {
                return Err(Error::invalid_path(raw, "attribute must be the last segment"));
            }
        }
        Ok(Self { segments })
    }

    /// Build a path from already parsed segments
    pub fn from_segments(segments: Vec<DataSegment>) -> Self {
        Self { segments }
    }

    /// The parsed segments
    pub fn segments(&self) -> &[DataSegment] {
        &self.segments
    }

    /// Whether the path ends with an attribute segment
    pub fn is_attribute(&self) -> bool {
        self.segments.last().is_some_and(|s| s.attribute)
    }

    /// Output path using instance names only (`/entry/beam/energy`)
    pub fn output_path(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            if segment.attribute {
                out.push('@');
            }
            out.push_str(&segment.name);
        }
        out
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for DataPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
