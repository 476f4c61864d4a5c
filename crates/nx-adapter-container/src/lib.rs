#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # nx-adapter-container
//!
//! Writes a validated population into a hierarchical container: groups
//! carry an `NX_class` attribute, fields become typed datasets, attributes
//! attach to their owner and links are stored as references.
//!
//! The writer talks to storage through the four-call [`ContainerSink`]
//! contract. [`Hdf5Container`] is the shipped backend: real HDF5 groups,
//! typed datasets, attributes and soft links, staged next to the target and
//! renamed into place on commit. [`JsonContainer`] is the in-memory tree
//! used to read committed files back and to test the writer.
//!
//! ```rust
//! use nx_adapter_container::{ContainerSink, JsonContainer};
//! use nx_ir::Value;
//!
//! let mut container = JsonContainer::new();
//! container.create_group("/entry", "NXentry").unwrap();
//! container
//!     .set_attribute("/entry", "default", &Value::string("data"))
//!     .unwrap();
//! assert!(container.node("/entry").is_some());
//! ```

/// HDF5 container backend.
pub mod h5;
/// In-memory container tree.
pub mod json;
/// Backend contract.
pub mod sink;
/// Population to container writer.
pub mod writer;

pub use h5::Hdf5Container;
pub use json::{ContainerNode, JsonContainer};
pub use sink::ContainerSink;
pub use writer::{HierarchicalWriter, WriteSummary};

use thiserror::Error;

/// Errors that can occur while writing containers
#[derive(Error, Debug)]
pub enum Error {
    #[error("Write error at {path}: {message}")]
    Write { path: String, message: String },

    #[error("Refusing to write a population with {0} error(s)")]
    Rejected(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HDF5 error: {0}")]
    Hdf5(#[from] ::hdf5::Error),

    #[error(transparent)]
    Value(#[from] nx_ir::Error),
}

impl Error {
    /// Build a write error for a container path
    pub fn write(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Crate-local result type for container operations.
pub type Result<T> = std::result::Result<T, Error>;
