#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # nx-schema
//!
//! Schema model, NXDL reader/writer, corpus access and inheritance merge.
//!
//! Definitions are loaded by class name from a [`SchemaSource`], parsed into
//! a [`SchemaClass`] and, on request, resolved against their `extends` chain:
//! `NXobject` → base class → ... → application definition.

/// Schema corpus access (directory tree or in-memory).
pub mod corpus;
/// Inheritance graph and node merge logic.
pub mod inheritance;
/// Loader with caching and chain resolution.
pub mod loader;
/// Schema model types.
pub mod model;
/// NXDL XML reader and writer.
pub mod nxdl;
/// Concurrent cache of loaded classes.
pub mod registry;

pub use corpus::{DirectoryCorpus, MemoryCorpus, SchemaSource};
pub use inheritance::{InheritanceGraph, apply_inheritance_chain, merge_nodes};
pub use loader::SchemaLoader;
pub use model::{
    Category, Dimensions, MaxOccurs, NodeKind, NxType, Occurrence, OverrideMode, SchemaClass,
    SchemaNode,
};
pub use nxdl::{parse_nxdl, to_nxdl_string};
pub use registry::ConcurrentSchemaRegistry;

use thiserror::Error;

/// Errors that can occur when working with schemas
#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema not found: {0}")]
    NotFound(String),

    #[error("Schema parse error in {class}: {message}")]
    Parse { class: String, message: String },

    #[error("Failed to serialize {class}: {message}")]
    Serialize { class: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a parse error for the named class or source
    pub fn parse(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            class: class.into(),
            message: message.into(),
        }
    }
}

/// Crate-local result type for schema operations.
pub type Result<T> = std::result::Result<T, Error>;
