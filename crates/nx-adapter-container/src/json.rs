//! In-memory container tree
//!
//! Mirrors the layout of a committed container: groups with attributes and
//! members, datasets holding their payload as JSON, links holding their
//! target. Committed HDF5 files are read back into this tree.

use crate::sink::ContainerSink;
use crate::{Error, Result};
use chrono::Utc;
use nx_ir::{DataType, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// Attribute values by name
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// One node of the container tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContainerNode {
    Group {
        #[serde(default)]
        attributes: Attributes,
        #[serde(default)]
        children: BTreeMap<String, ContainerNode>,
    },
    Dataset {
        dtype: DataType,
        shape: Vec<usize>,
        data: serde_json::Value,
        #[serde(default)]
        attributes: Attributes,
    },
    Link {
        target: String,
    },
}

impl ContainerNode {
    fn empty_group() -> Self {
        ContainerNode::Group {
            attributes: Attributes::new(),
            children: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self, ContainerNode::Group { .. })
    }

    #[must_use]
    pub fn is_dataset(&self) -> bool {
        matches!(self, ContainerNode::Dataset { .. })
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        match self {
            ContainerNode::Group { attributes, .. } | ContainerNode::Dataset { attributes, .. } => {
                attributes.get(key)
            }
            ContainerNode::Link { .. } => None,
        }
    }

    /// Dataset payload
    #[must_use]
    pub fn data(&self) -> Option<&serde_json::Value> {
        match self {
            ContainerNode::Dataset { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Link target
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            ContainerNode::Link { target } => Some(target),
            _ => None,
        }
    }

    /// Group members by name
    #[must_use]
    pub fn children(&self) -> Option<&BTreeMap<String, ContainerNode>> {
        match self {
            ContainerNode::Group { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Element type of a dataset
    #[must_use]
    pub fn dtype(&self) -> Option<DataType> {
        match self {
            ContainerNode::Dataset { dtype, .. } => Some(*dtype),
            _ => None,
        }
    }

    /// Typed dataset payload, decoded with the stored element type
    ///
    /// # Errors
    ///
    /// [`Error::Value`] when the payload does not match its element type.
    pub fn value(&self) -> Result<Option<Value>> {
        match self {
            ContainerNode::Dataset { dtype, data, .. } => {
                Ok(Some(Value::from_json_as(data, *dtype)?))
            }
            _ => Ok(None),
        }
    }
}

/// In-memory container tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonContainer {
    root: ContainerNode,
}

fn split(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn split_parent(path: &str) -> Result<(Vec<&str>, &str)> {
    let mut names = split(path);
    let name = names
        .pop()
        .ok_or_else(|| Error::write(path, "path addresses the root"))?;
    Ok((names, name))
}

impl JsonContainer {
    /// Empty container whose root is an `NXroot` group stamped with the
    /// creation time
    #[must_use]
    pub fn new() -> Self {
        let mut attributes = Attributes::new();
        attributes.insert("NX_class".into(), "NXroot".into());
        attributes.insert("file_time".into(), Utc::now().to_rfc3339().into());
        attributes.insert(
            "creator".into(),
            concat!("nx-template-engine ", env!("CARGO_PKG_VERSION")).into(),
        );
        Self {
            root: ContainerNode::Group {
                attributes,
                children: BTreeMap::new(),
            },
        }
    }

    #[must_use]
    pub fn root(&self) -> &ContainerNode {
        &self.root
    }

    /// Node at an absolute path; `/` is the root
    #[must_use]
    pub fn node(&self, path: &str) -> Option<&ContainerNode> {
        let mut current = &self.root;
        for name in split(path) {
            current = current.children()?.get(name)?;
        }
        Some(current)
    }

    fn node_mut(&mut self, path: &str) -> Option<&mut ContainerNode> {
        let mut current = &mut self.root;
        for name in split(path) {
            let ContainerNode::Group { children, .. } = current else {
                return None;
            };
            current = children.get_mut(name)?;
        }
        Some(current)
    }

    /// Members of the group reached through `names`, creating missing groups
    fn ensure_group(
        &mut self,
        names: &[&str],
        path: &str,
    ) -> Result<&mut BTreeMap<String, ContainerNode>> {
        let mut current = &mut self.root;
        for name in names {
            let ContainerNode::Group { children, .. } = current else {
                return Err(Error::write(path, format!("'{name}' lies beneath a non-group node")));
            };
            current = children
                .entry((*name).to_string())
                .or_insert_with(ContainerNode::empty_group);
        }
        match current {
            ContainerNode::Group { children, .. } => Ok(children),
            _ => Err(Error::write(path, "parent is not a group")),
        }
    }

    /// Create `path` and any missing parents as groups without a class
    pub(crate) fn create_plain_group(&mut self, path: &str) -> Result<()> {
        let names = split(path);
        self.ensure_group(&names, path)?;
        Ok(())
    }
}

impl Default for JsonContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerSink for JsonContainer {
    fn create_group(&mut self, path: &str, nx_class: &str) -> Result<()> {
        let (parents, name) = split_parent(path)?;
        let children = self.ensure_group(&parents, path)?;
        match children
            .entry(name.to_string())
            .or_insert_with(ContainerNode::empty_group)
        {
            ContainerNode::Group { attributes, .. } => {
                attributes.insert("NX_class".into(), nx_class.into());
                trace!(path, nx_class, "Created group");
                Ok(())
            }
            _ => Err(Error::write(path, "a dataset or link already exists here")),
        }
    }

    fn create_dataset(
        &mut self,
        path: &str,
        value: &Value,
        dtype: DataType,
        shape: &[usize],
    ) -> Result<()> {
        let (parents, name) = split_parent(path)?;
        let data = value.cast(dtype)?.to_json();
        let children = self.ensure_group(&parents, path)?;
        if children.get(name).is_some_and(ContainerNode::is_group) {
            return Err(Error::write(path, "a group already exists here"));
        }
        children.insert(
            name.to_string(),
            ContainerNode::Dataset {
                dtype,
                shape: shape.to_vec(),
                data,
                attributes: Attributes::new(),
            },
        );
        trace!(path, %dtype, ?shape, "Created dataset");
        Ok(())
    }

    fn set_attribute(&mut self, path: &str, key: &str, value: &Value) -> Result<()> {
        let node = self
            .node_mut(path)
            .ok_or_else(|| Error::write(path, "no node to attach the attribute to"))?;
        match node {
            ContainerNode::Group { attributes, .. } | ContainerNode::Dataset { attributes, .. } => {
                attributes.insert(key.to_string(), value.to_json());
                Ok(())
            }
            ContainerNode::Link { .. } => Err(Error::write(path, "links cannot carry attributes")),
        }
    }

    fn create_link(&mut self, path: &str, target: &str) -> Result<()> {
        let (parents, name) = split_parent(path)?;
        let children = self.ensure_group(&parents, path)?;
        if children.get(name).is_some_and(ContainerNode::is_group) {
            return Err(Error::write(path, "a group already exists here"));
        }
        children.insert(
            name.to_string(),
            ContainerNode::Link {
                target: target.to_string(),
            },
        );
        trace!(path, target, "Created link");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nx_ir::ArrayData;

    #[test]
    fn test_root_is_stamped() {
        let container = JsonContainer::new();
        let root = container.node("/").unwrap();
        assert_eq!(root.attribute("NX_class").unwrap(), "NXroot");
        let stamp = root.attribute("file_time").unwrap().as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[test]
    fn test_build_tree() {
        let mut container = JsonContainer::new();
        container.create_group("/entry", "NXentry").unwrap();
        container.create_group("/entry/data", "NXdata").unwrap();
        let counts = Value::vector(ArrayData::Int(vec![1, 2, 3]));
        container
            .create_dataset("/entry/data/counts", &counts, DataType::Float64, &[3])
            .unwrap();
        container
            .set_attribute("/entry/data/counts", "units", &Value::string("counts"))
            .unwrap();
        container.create_link("/entry/counts", "/entry/data/counts").unwrap();

        let counts = container.node("/entry/data/counts").unwrap();
        assert!(counts.is_dataset());
        assert_eq!(counts.data().unwrap(), &serde_json::json!([1.0, 2.0, 3.0]));
        assert_eq!(counts.attribute("units").unwrap(), "counts");
        assert_eq!(
            container.node("/entry/counts").unwrap().target(),
            Some("/entry/data/counts")
        );
        assert_eq!(
            container.node("/entry/data").unwrap().attribute("NX_class").unwrap(),
            "NXdata"
        );
    }

    #[test]
    fn test_conflicting_nodes_are_rejected() {
        let mut container = JsonContainer::new();
        container
            .create_dataset("/entry/title", &Value::string("x"), DataType::Utf8, &[])
            .unwrap();
        assert!(container.create_group("/entry/title", "NXnote").is_err());
        assert!(
            container
                .create_dataset("/entry/title/inner", &Value::int(1), DataType::Int64, &[])
                .is_err()
        );
        container.create_link("/entry/alias", "/entry/title").unwrap();
        assert!(
            container
                .set_attribute("/entry/alias", "units", &Value::string("m"))
                .is_err()
        );
        assert!(
            container
                .set_attribute("/entry/missing", "units", &Value::string("m"))
                .is_err()
        );
    }

    #[test]
    fn test_non_finite_dataset_decodes() {
        let mut container = JsonContainer::new();
        container
            .create_dataset("/entry/x", &Value::float(f64::NAN), DataType::Float64, &[])
            .unwrap();
        let x = container.node("/entry/x").unwrap();
        assert_eq!(x.data().unwrap(), "NaN");
        assert!(matches!(x.value().unwrap(), Some(Value::Scalar(nx_ir::Scalar::Float(v))) if v.is_nan()));
    }

    #[test]
    fn test_plain_groups_carry_no_class() {
        let mut container = JsonContainer::new();
        container.create_plain_group("/entry/notes").unwrap();
        let notes = container.node("/entry/notes").unwrap();
        assert!(notes.is_group());
        assert!(notes.attribute("NX_class").is_none());
        assert_eq!(container.node("/entry").unwrap().value().unwrap(), None);
    }
}
