#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # nx-template
//!
//! Flattens a resolved application definition plus auxiliary base classes
//! into a [`Template`]: a mapping from normalized path to the effective
//! [`FieldSpec`]. Repeatable groups stay patterns (`/ENTRY/DATA`); the
//! [`Template::resolve`] matcher turns data paths into concrete output paths
//! at population time.

/// Template construction and mix-in overlay.
pub mod builder;
/// Data path to template path matching.
pub mod matcher;
/// Template path segments.
pub mod path;
/// Template storage and field specs.
pub mod template;

pub use builder::TemplateBuilder;
pub use matcher::{ConcretePath, ConcreteSegment};
pub use path::{SegmentName, TemplatePath, TemplateSegment};
pub use template::{FieldSpec, Template};

use nx_schema::SchemaLoader;
use thiserror::Error;

/// Errors that can occur while building templates
#[derive(Error, Debug)]
pub enum Error {
    #[error("Template conflict at {path}: {reason}")]
    Conflict { path: String, reason: String },

    #[error(transparent)]
    Schema(#[from] nx_schema::Error),
}

impl Error {
    /// Build a conflict error for a template path
    pub fn conflict(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conflict {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Crate-local result type for template operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Load an application definition and mix-ins through `loader` and build
/// the template
///
/// # Errors
///
/// Schema loading errors, or [`Error::Conflict`] from the builder.
pub fn build_template(
    loader: &SchemaLoader,
    application: &str,
    mixins: &[String],
) -> Result<Template> {
    let application = loader.load_resolved(application)?;
    let mixins = mixins
        .iter()
        .map(|name| loader.load_resolved(name))
        .collect::<nx_schema::Result<Vec<_>>>()?;

    let mut builder = TemplateBuilder::new(&application);
    for mixin in &mixins {
        builder = builder.with_mixin(mixin);
    }
    builder.build()
}
