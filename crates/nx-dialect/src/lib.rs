#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # nx-dialect
//!
//! A line-oriented, indentation-based rendering of NXDL definitions that is
//! easier to read and edit than the XML form.
//!
//! ```text
//! # Incident beam description
//! category: application
//! doc: Measurement of an X-ray diffraction scan.
//! NXxrd(NXobject):
//!   beam(NXbeam):
//!     exists: required
//!     energy(NX_FLOAT):
//!       unit: NX_ENERGY
//!       \@units(NX_CHAR):
//!   mode:
//!     enumeration: [fast, slow]
//! ```
//!
//! One class per file. Nodes are written `name(TYPE):`: a type starting
//! with `NX` but not `NX_` makes a group, `\@` marks an attribute, and an
//! unnamed group is written `(NXclass):`. Properties are `key: value`
//! lines inside the node's block; `#` lines are comments on the node that
//! follows them.
//!
//! [`dialect_to_canonical`] and [`canonical_to_dialect`] convert between
//! the text and a [`SchemaClass`]; [`equivalent`] compares two classes the
//! way round-trips are judged.

/// Canonical comparison of classes.
pub mod canonical;
/// Dialect reader.
pub mod parser;
/// Dialect writer.
pub mod serializer;
/// Headers, lists and quoting shared by reader and writer.
pub mod syntax;

pub use canonical::{canonicalize, equivalent};
pub use parser::dialect_to_canonical;
pub use serializer::canonical_to_dialect;

use nx_schema::SchemaClass;
use thiserror::Error;

/// Errors that can occur while converting dialect text
#[derive(Error, Debug)]
pub enum Error {
    #[error("Dialect parse error at line {line} ({path}): {message}")]
    Parse {
        line: usize,
        path: String,
        message: String,
    },

    #[error(transparent)]
    Schema(#[from] nx_schema::Error),
}

impl Error {
    /// Build a parse error for a 1-based line and the node path being read
    pub fn parse(line: usize, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Crate-local result type for dialect operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Convert an NXDL document to dialect text
///
/// # Errors
///
/// Returns [`Error::Schema`] when the XML is not a valid definition.
pub fn nxdl_to_dialect(xml: &str) -> Result<String> {
    let class = nx_schema::parse_nxdl(xml, "nxdl document")?;
    Ok(canonical_to_dialect(&class))
}

/// Convert dialect text to an NXDL document
///
/// # Errors
///
/// Returns [`Error::Parse`] for malformed dialect text and
/// [`Error::Schema`] if the XML cannot be written.
pub fn dialect_to_nxdl(text: &str) -> Result<String> {
    let class: SchemaClass = dialect_to_canonical(text)?;
    Ok(nx_schema::to_nxdl_string(&class)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<definition name="NXdemo" type="group" extends="NXobject" category="application">
  <doc>Demo definition.</doc>
  <group type="NXentry">
    <field name="title" recommended="true"/>
  </group>
</definition>
"#;

    #[test]
    fn test_text_level_helpers_compose() {
        let dialect = nxdl_to_dialect(XML).unwrap();
        assert!(dialect.contains("NXdemo(NXobject):"));
        assert!(dialect.contains("  (NXentry):"));
        assert!(dialect.contains("      exists: recommended"));

        let xml = dialect_to_nxdl(&dialect).unwrap();
        let back = nx_schema::parse_nxdl(&xml, "NXdemo").unwrap();
        let original = nx_schema::parse_nxdl(XML, "NXdemo").unwrap();
        assert!(equivalent(&back, &original));
    }

    #[test]
    fn test_parse_error_names_line_and_path() {
        let err = dialect_to_nxdl("NXdemo:\n  beam(NXbeam):\n    exists: always\n").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("line 3"), "{message}");
        assert!(message.contains("/beam"), "{message}");
    }
}
