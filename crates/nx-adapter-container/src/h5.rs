//! HDF5 container backend
//!
//! Groups, typed datasets and soft links go straight into an HDF5 file
//! staged next to the target. Attributes are kept until commit so a key set
//! twice keeps its last value. [`Hdf5Container::commit`] closes the file and
//! renames it into place; dropping an uncommitted container deletes the
//! staged file.

use crate::json::JsonContainer;
use crate::sink::ContainerSink;
use crate::{Error, Result};
use chrono::Utc;
use hdf5::types::{TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Container, File, Group, H5Type, Location};
use nx_ir::{ArrayData, DataType, Scalar, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, info, trace, warn};

/// Attribute naming the node a link points at
const TARGET_ATTRIBUTE: &str = "target";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Group,
    Dataset,
    Link,
}

/// Container written into an HDF5 file
///
/// ```rust,no_run
/// use nx_adapter_container::{ContainerSink, Hdf5Container};
/// use nx_ir::{DataType, Value};
///
/// let mut container = Hdf5Container::create("scan.nxs")?;
/// container.create_group("/entry", "NXentry")?;
/// container.create_dataset("/entry/title", &Value::string("quartz"), DataType::Utf8, &[])?;
/// container.commit()?;
/// # Ok::<(), nx_adapter_container::Error>(())
/// ```
#[derive(Debug)]
pub struct Hdf5Container {
    // Declared before `staged`: the file closes before the staged path is removed.
    file: File,
    staged: TempPath,
    target: PathBuf,
    kinds: BTreeMap<String, Kind>,
    attributes: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Hdf5Container {
    /// Stage a new container that [`Hdf5Container::commit`] moves to `target`
    ///
    /// The root group is stamped as `NXroot` with the creation time, the
    /// creator and the HDF5 library version.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the staging file cannot be created next to
    /// `target`, [`Error::Hdf5`] when HDF5 cannot open it.
    pub fn create(target: impl Into<PathBuf>) -> Result<Self> {
        let target = target.into();
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let staged = tempfile::Builder::new()
            .prefix(".nx-")
            .suffix(".tmp")
            .tempfile_in(&dir)?
            .into_temp_path();
        let file = File::create(&staged)?;
        debug!(staged = %staged.display(), target = %target.display(), "Staged container");

        let (major, minor, release) = hdf5::library_version();
        let mut root = BTreeMap::new();
        root.insert("NX_class".to_string(), Value::string("NXroot"));
        root.insert("file_time".to_string(), Value::string(Utc::now().to_rfc3339()));
        root.insert(
            "creator".to_string(),
            Value::string(concat!("nx-template-engine ", env!("CARGO_PKG_VERSION"))),
        );
        root.insert(
            "HDF5_Version".to_string(),
            Value::string(format!("{major}.{minor}.{release}")),
        );

        Ok(Self {
            file,
            staged,
            target,
            kinds: BTreeMap::from([("/".to_string(), Kind::Group)]),
            attributes: BTreeMap::from([("/".to_string(), root)]),
        })
    }

    /// Where the container lands on commit
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Write the pending attributes, close the file and rename it into place
    ///
    /// # Errors
    ///
    /// [`Error::Hdf5`] when an attribute or the close fails, and
    /// [`Error::Write`] when the rename fails. The staged file is removed in
    /// every failure case.
    pub fn commit(self) -> Result<()> {
        let Self {
            file,
            staged,
            target,
            kinds,
            attributes,
        } = self;

        let mut written = 0;
        for (path, values) in &attributes {
            match kinds.get(path) {
                Some(Kind::Dataset) => write_attributes(&file.dataset(path)?, path, values)?,
                _ => write_attributes(&file.group(path)?, path, values)?,
            }
            written += values.len();
        }
        file.close()?;

        staged
            .persist(&target)
            .map_err(|err| Error::write(target.display().to_string(), err.error.to_string()))?;
        info!(
            path = %target.display(),
            nodes = kinds.len(),
            attributes = written,
            "Committed container"
        );
        Ok(())
    }

    /// Read a committed container into an in-memory tree
    ///
    /// A member whose `target` attribute names another node is read back as
    /// a link to that node.
    ///
    /// # Errors
    ///
    /// [`Error::Hdf5`] when the file cannot be read, [`Error::Write`] for
    /// element types the tree cannot hold.
    pub fn read(path: &Path) -> Result<JsonContainer> {
        let file = File::open(path)?;
        let mut tree = JsonContainer::new();
        copy_attributes(&file, "/", &mut tree)?;
        copy_members(&file, "/", &mut tree)?;
        debug!(path = %path.display(), "Read container");
        Ok(tree)
    }

    /// Create the missing groups above `path`
    fn ensure_parents(&mut self, path: &str) -> Result<()> {
        let names: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut current = String::new();
        for name in names.iter().take(names.len().saturating_sub(1)) {
            current.push('/');
            current.push_str(name);
            match self.kinds.get(&current) {
                Some(Kind::Group) => {}
                Some(_) => {
                    return Err(Error::write(
                        path,
                        format!("'{name}' lies beneath a non-group node"),
                    ));
                }
                None => {
                    self.file.create_group(&current)?;
                    self.kinds.insert(current.clone(), Kind::Group);
                }
            }
        }
        Ok(())
    }

    /// Make room for a dataset or link at `path`
    fn replace_leaf(&mut self, path: &str) -> Result<()> {
        let (parent, name) = split(path)?;
        match self.kinds.get(path) {
            Some(Kind::Group) => Err(Error::write(path, "a group already exists here")),
            Some(_) => {
                self.file.group(parent)?.unlink(name)?;
                self.kinds.remove(path);
                self.attributes.remove(path);
                Ok(())
            }
            None => self.ensure_parents(path),
        }
    }
}

impl ContainerSink for Hdf5Container {
    fn create_group(&mut self, path: &str, nx_class: &str) -> Result<()> {
        let path = normalize(path);
        split(&path)?;
        match self.kinds.get(&path) {
            Some(Kind::Group) => {}
            Some(_) => return Err(Error::write(&path, "a dataset or link already exists here")),
            None => {
                self.ensure_parents(&path)?;
                self.file.create_group(&path)?;
                self.kinds.insert(path.clone(), Kind::Group);
            }
        }
        self.attributes
            .entry(path.clone())
            .or_default()
            .insert("NX_class".to_string(), Value::string(nx_class));
        trace!(path, nx_class, "Created group");
        Ok(())
    }

    fn create_dataset(
        &mut self,
        path: &str,
        value: &Value,
        dtype: DataType,
        shape: &[usize],
    ) -> Result<()> {
        let path = normalize(path);
        let value = value.cast(dtype)?;
        let data = flatten(&value);
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::write(
                &path,
                format!("shape {shape:?} does not hold {} element(s)", data.len()),
            ));
        }

        self.replace_leaf(&path)?;
        let (parent, name) = split(&path)?;
        let group = self.file.group(parent)?;
        match &data {
            ArrayData::Str(v) => write_dataset(&group, name, shape, &unicode(&path, v)?)?,
            ArrayData::Int(v) => write_dataset(&group, name, shape, v)?,
            ArrayData::UInt(v) => write_dataset(&group, name, shape, v)?,
            ArrayData::Float(v) => write_dataset(&group, name, shape, v)?,
            ArrayData::Bool(v) => write_dataset(&group, name, shape, v)?,
        }
        self.kinds.insert(path.clone(), Kind::Dataset);
        trace!(path, %dtype, ?shape, "Created dataset");
        Ok(())
    }

    fn set_attribute(&mut self, path: &str, key: &str, value: &Value) -> Result<()> {
        let path = normalize(path);
        match self.kinds.get(&path) {
            None => Err(Error::write(&path, "no node to attach the attribute to")),
            Some(Kind::Link) => Err(Error::write(&path, "links cannot carry attributes")),
            Some(_) => {
                self.attributes
                    .entry(path)
                    .or_default()
                    .insert(key.to_string(), value.clone());
                Ok(())
            }
        }
    }

    fn create_link(&mut self, path: &str, target: &str) -> Result<()> {
        let path = normalize(path);
        let target = normalize(target);
        self.replace_leaf(&path)?;
        let (parent, name) = split(&path)?;
        self.file.group(parent)?.link_soft(&target, name)?;
        self.kinds.insert(path.clone(), Kind::Link);

        if matches!(self.kinds.get(&target), Some(Kind::Group | Kind::Dataset)) {
            self.attributes
                .entry(target.clone())
                .or_default()
                .entry(TARGET_ATTRIBUTE.to_string())
                .or_insert_with(|| Value::string(&target));
        }
        trace!(path, target, "Created link");
        Ok(())
    }
}

fn normalize(path: &str) -> String {
    let names: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", names.join("/"))
}

fn split(path: &str) -> Result<(&str, &str)> {
    match path.rsplit_once('/') {
        Some((_, "")) | None => Err(Error::write(path, "path addresses the root")),
        Some(("", name)) => Ok(("/", name)),
        Some((parent, name)) => Ok((parent, name)),
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn flatten(value: &Value) -> ArrayData {
    match value {
        Value::Array { data, .. } => data.clone(),
        Value::Scalar(Scalar::Str(s)) => ArrayData::Str(vec![s.clone()]),
        Value::Scalar(Scalar::Int(i)) => ArrayData::Int(vec![*i]),
        Value::Scalar(Scalar::UInt(u)) => ArrayData::UInt(vec![*u]),
        Value::Scalar(Scalar::Float(x)) => ArrayData::Float(vec![*x]),
        Value::Scalar(Scalar::Bool(b)) => ArrayData::Bool(vec![*b]),
    }
}

fn unicode(path: &str, values: &[String]) -> Result<Vec<VarLenUnicode>> {
    values
        .iter()
        .map(|s| {
            s.parse::<VarLenUnicode>()
                .map_err(|err| Error::write(path, format!("string cannot be stored: {err}")))
        })
        .collect()
}

fn write_dataset<T: H5Type>(
    group: &Group,
    name: &str,
    shape: &[usize],
    data: &[T],
) -> hdf5::Result<()> {
    let builder = group.new_dataset::<T>();
    let dataset = if shape.is_empty() {
        builder.shape(()).create(name)?
    } else {
        builder.shape(shape.to_vec()).create(name)?
    };
    dataset.write_raw(data)
}

fn write_attribute<T: H5Type>(
    location: &Location,
    name: &str,
    shape: &[usize],
    data: &[T],
) -> hdf5::Result<()> {
    let builder = location.new_attr::<T>();
    let attribute = if shape.is_empty() {
        builder.shape(()).create(name)?
    } else {
        builder.shape(shape.to_vec()).create(name)?
    };
    attribute.write_raw(data)
}

fn write_attributes(location: &Location, path: &str, values: &BTreeMap<String, Value>) -> Result<()> {
    for (key, value) in values {
        let shape = value.shape();
        match &flatten(value) {
            ArrayData::Str(v) => write_attribute(location, key, shape, &unicode(path, v)?)?,
            ArrayData::Int(v) => write_attribute(location, key, shape, v)?,
            ArrayData::UInt(v) => write_attribute(location, key, shape, v)?,
            ArrayData::Float(v) => write_attribute(location, key, shape, v)?,
            ArrayData::Bool(v) => write_attribute(location, key, shape, v)?,
        }
    }
    Ok(())
}

fn read_value(container: &Container) -> Result<(DataType, Value)> {
    let shape = container.shape();
    let data = match container.dtype()?.to_descriptor()? {
        TypeDescriptor::Float(_) => ArrayData::Float(container.read_raw()?),
        TypeDescriptor::Integer(_) => ArrayData::Int(container.read_raw()?),
        TypeDescriptor::Unsigned(_) => ArrayData::UInt(container.read_raw()?),
        TypeDescriptor::Boolean => ArrayData::Bool(container.read_raw()?),
        TypeDescriptor::VarLenUnicode => ArrayData::Str(
            container
                .read_raw::<VarLenUnicode>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        ),
        TypeDescriptor::VarLenAscii => ArrayData::Str(
            container
                .read_raw::<VarLenAscii>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        ),
        other => {
            return Err(Error::write(
                container.name(),
                format!("unsupported element type {other:?}"),
            ));
        }
    };
    let dtype = data.dtype();
    let value = if shape.is_empty() {
        data.scalars()
            .into_iter()
            .next()
            .map(Value::Scalar)
            .ok_or_else(|| Error::write(container.name(), "scalar without a value"))?
    } else {
        Value::array(data, shape)?
    };
    Ok((dtype, value))
}

fn link_target(location: &Location, path: &str) -> Result<Option<String>> {
    if !location.attr_names()?.iter().any(|n| n == TARGET_ATTRIBUTE) {
        return Ok(None);
    }
    let (_, value) = read_value(&location.attr(TARGET_ATTRIBUTE)?)?;
    Ok(match value {
        Value::Scalar(Scalar::Str(target)) if target != path => Some(target),
        _ => None,
    })
}

fn copy_attributes(location: &Location, path: &str, tree: &mut JsonContainer) -> Result<()> {
    for key in location.attr_names()? {
        let (_, value) = read_value(&location.attr(&key)?)?;
        tree.set_attribute(path, &key, &value)?;
    }
    Ok(())
}

fn copy_members(group: &Group, path: &str, tree: &mut JsonContainer) -> Result<()> {
    for name in group.member_names()? {
        let child = join(path, &name);
        if let Ok(dataset) = group.dataset(&name) {
            if let Some(target) = link_target(&dataset, &child)? {
                tree.create_link(&child, &target)?;
                continue;
            }
            let (dtype, value) = read_value(&dataset)?;
            tree.create_dataset(&child, &value, dtype, value.shape())?;
            copy_attributes(&dataset, &child, tree)?;
            continue;
        }
        match group.group(&name) {
            Ok(member) => {
                if let Some(target) = link_target(&member, &child)? {
                    tree.create_link(&child, &target)?;
                    continue;
                }
                tree.create_plain_group(&child)?;
                copy_attributes(&member, &child, tree)?;
                copy_members(&member, &child, tree)?;
            }
            Err(err) => warn!(path = %child, error = %err, "Skipping unreadable member"),
        }
    }
    Ok(())
}
