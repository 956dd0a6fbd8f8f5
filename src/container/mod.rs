//! Read-only access to hierarchical data containers.
//!
//! Mappers never talk to a file format directly. They navigate a
//! [`Container`] through [`Group`] and [`Dataset`] handles, which keeps the
//! mapping logic independent of the storage backend:
//!
//! - [`MemoryContainer`]: in-memory layout, built programmatically. Used by
//!   the test-suite and by callers that synthesise layouts.
//! - `Hdf5Container` (feature `storage_hdf5`): HDF5 files via the `hdf5` crate.
//!
//! All paths are absolute, `/`-separated, with `/` as the root group.

pub mod memory;

#[cfg(feature = "storage_hdf5")]
pub mod hdf5;

pub use memory::MemoryContainer;

#[cfg(feature = "storage_hdf5")]
pub use self::hdf5::Hdf5Container;

use crate::dtype::DType;
use crate::error::ContainerError;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Kind of node stored at a container path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A group of other nodes.
    Group,
    /// A record dataset.
    Dataset,
}

/// Value of a group or dataset attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Text.
    Str(String),
    /// Integer of any width.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// Array of scalars.
    Array(Vec<AttrValue>),
}

impl AttrValue {
    /// String value, if the attribute is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value as `f64`, if the attribute is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer value, if the attribute is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Free-form metadata representation of the attribute.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttrValue::Str(s) => serde_json::Value::String(s.clone()),
            AttrValue::Int(v) => serde_json::Value::from(*v),
            AttrValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            AttrValue::Bool(v) => serde_json::Value::Bool(*v),
            AttrValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(AttrValue::to_json).collect())
            }
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => f.write_str(s),
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Bool(v) => write!(f, "{v}"),
            AttrValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(i64::from(value))
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// Description of one named field of a record dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// Element type.
    pub dtype: DType,
    /// Per-record shape of the field; empty for scalars.
    pub shape: Vec<usize>,
}

impl FieldInfo {
    /// Scalar field.
    pub fn scalar(name: impl Into<String>, dtype: DType) -> Self {
        Self {
            name: name.into(),
            dtype,
            shape: Vec::new(),
        }
    }

    /// Array-valued field.
    pub fn array(name: impl Into<String>, dtype: DType, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            dtype,
            shape,
        }
    }

    /// True for fields holding one element per record.
    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }
}

/// Backend answering structural queries about a container.
///
/// Implementations are read-only; nothing in this crate writes to a container.
pub trait Container: Send + Sync {
    /// Kind of node at `path`, or `None` if nothing exists there.
    fn node_kind(&self, path: &str) -> Option<NodeKind>;

    /// Names of the immediate children of the group at `path`.
    fn member_names(&self, path: &str) -> Result<Vec<String>, ContainerError>;

    /// Names of the attributes attached to the node at `path`.
    fn attr_names(&self, path: &str) -> Result<Vec<String>, ContainerError>;

    /// Read attribute `name` of the node at `path`; `Ok(None)` if absent.
    fn read_attr(&self, path: &str, name: &str) -> Result<Option<AttrValue>, ContainerError>;

    /// Named fields of the dataset at `path`; `Ok(None)` if the dataset does
    /// not store named-field records.
    fn dataset_fields(&self, path: &str) -> Result<Option<Vec<FieldInfo>>, ContainerError>;

    /// Value of the scalar `field` for every record of the dataset at `path`.
    fn read_field(&self, path: &str, field: &str) -> Result<Vec<AttrValue>, ContainerError>;
}

/// Join a child name onto a group path.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" || parent.is_empty() {
        format!("/{name}")
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// Final component of `path`.
pub fn base_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Handle to a group of a shared container.
#[derive(Clone)]
pub struct Group {
    container: Arc<dyn Container>,
    path: String,
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group").field("path", &self.path).finish()
    }
}

impl Group {
    /// Handle to the root group of `container`.
    pub fn root(container: Arc<dyn Container>) -> Self {
        Self {
            container,
            path: "/".to_string(),
        }
    }

    /// Open the group at absolute `path`.
    pub fn open(container: Arc<dyn Container>, path: &str) -> Result<Self, ContainerError> {
        match container.node_kind(path) {
            Some(NodeKind::Group) => Ok(Self {
                container,
                path: path.to_string(),
            }),
            Some(NodeKind::Dataset) => Err(ContainerError::NotAGroup(path.to_string())),
            None => Err(ContainerError::NotFound(path.to_string())),
        }
    }

    /// Name of the group (last path component).
    pub fn name(&self) -> &str {
        base_name(&self.path)
    }

    /// Absolute path of the group.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Backend the group reads from.
    pub fn container(&self) -> &Arc<dyn Container> {
        &self.container
    }

    /// Absolute path of the child `name`.
    pub fn child_path(&self, name: &str) -> String {
        join_path(&self.path, name)
    }

    /// True if a child group or dataset `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.container.node_kind(&self.child_path(name)).is_some()
    }

    /// Names of every immediate child.
    pub fn member_names(&self) -> Result<Vec<String>, ContainerError> {
        self.container.member_names(&self.path)
    }

    fn members_of_kind(&self, kind: NodeKind) -> Result<Vec<String>, ContainerError> {
        Ok(self
            .member_names()?
            .into_iter()
            .filter(|name| self.container.node_kind(&self.child_path(name)) == Some(kind))
            .collect())
    }

    /// Names of the immediate sub-groups.
    pub fn subgroup_names(&self) -> Result<Vec<String>, ContainerError> {
        self.members_of_kind(NodeKind::Group)
    }

    /// Names of the immediate datasets.
    pub fn dataset_names(&self) -> Result<Vec<String>, ContainerError> {
        self.members_of_kind(NodeKind::Dataset)
    }

    /// Open sub-group `name`.
    pub fn group(&self, name: &str) -> Result<Group, ContainerError> {
        Group::open(Arc::clone(&self.container), &self.child_path(name))
    }

    /// Open dataset `name`.
    pub fn dataset(&self, name: &str) -> Result<Dataset, ContainerError> {
        let path = self.child_path(name);
        match self.container.node_kind(&path) {
            Some(NodeKind::Dataset) => {
                let fields = self.container.dataset_fields(&path)?;
                Ok(Dataset { path, fields })
            }
            Some(NodeKind::Group) => Err(ContainerError::NotADataset(path)),
            None => Err(ContainerError::NotFound(path)),
        }
    }

    /// Records of `field` in dataset `name`.
    pub fn read_field(&self, name: &str, field: &str) -> Result<Vec<AttrValue>, ContainerError> {
        self.container.read_field(&self.child_path(name), field)
    }

    /// Records of the string field `field` in dataset `name`.
    pub fn read_str_field(&self, name: &str, field: &str) -> Result<Vec<String>, ContainerError> {
        self.read_field(name, field)?
            .into_iter()
            .map(|value| match value {
                AttrValue::Str(s) => Ok(s),
                other => Err(ContainerError::Backend(format!(
                    "field '{field}' of '{name}' holds non-string value {other}"
                ))),
            })
            .collect()
    }

    /// Read attribute `name`; `Ok(None)` if the group lacks it.
    pub fn attr(&self, name: &str) -> Result<Option<AttrValue>, ContainerError> {
        self.container.read_attr(&self.path, name)
    }

    /// Names of the group's attributes.
    pub fn attr_names(&self) -> Result<Vec<String>, ContainerError> {
        self.container.attr_names(&self.path)
    }

    /// True if attribute `name` is present and readable.
    pub fn has_attr(&self, name: &str) -> bool {
        matches!(self.attr(name), Ok(Some(_)))
    }
}

/// Structural snapshot of a record dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    path: String,
    fields: Option<Vec<FieldInfo>>,
}

impl Dataset {
    /// Absolute path of the dataset.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Name of the dataset (last path component).
    pub fn name(&self) -> &str {
        base_name(&self.path)
    }

    /// True if the dataset stores named-field records.
    pub fn has_named_fields(&self) -> bool {
        self.fields.is_some()
    }

    /// Named fields; empty for datasets without named fields.
    pub fn fields(&self) -> &[FieldInfo] {
        self.fields.as_deref().unwrap_or(&[])
    }

    /// Field `name`, if the dataset has one.
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// Names of the fields in storage order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields().iter().map(|f| f.name.as_str()).collect()
    }
}
