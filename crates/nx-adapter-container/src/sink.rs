//! Backend contract for hierarchical containers

use crate::Result;
use nx_ir::{DataType, Value};

/// Storage backend the writer drives
///
/// Paths are absolute output paths (`/entry/instrument/beam`). Parents are
/// created before children; attributes are set after their owner exists.
pub trait ContainerSink {
    /// Create (or reopen) a group and tag it with `NX_class`
    fn create_group(&mut self, path: &str, nx_class: &str) -> Result<()>;

    /// Store `value` as a dataset with element type `dtype`
    fn create_dataset(
        &mut self,
        path: &str,
        value: &Value,
        dtype: DataType,
        shape: &[usize],
    ) -> Result<()>;

    /// Attach an attribute to the group or dataset at `path`
    fn set_attribute(&mut self, path: &str, key: &str, value: &Value) -> Result<()>;

    /// Make `path` refer to the node at `target` without copying it
    fn create_link(&mut self, path: &str, target: &str) -> Result<()>;
}
