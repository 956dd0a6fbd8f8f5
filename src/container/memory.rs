//! In-memory container backend.

use super::{base_name, AttrValue, Container, FieldInfo, NodeKind};
use crate::error::ContainerError;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct MemoryNode {
    kind: NodeKind,
    attrs: BTreeMap<String, AttrValue>,
    fields: Option<Vec<FieldInfo>>,
    records: BTreeMap<String, Vec<AttrValue>>,
}

impl MemoryNode {
    fn group() -> Self {
        Self {
            kind: NodeKind::Group,
            attrs: BTreeMap::new(),
            fields: None,
            records: BTreeMap::new(),
        }
    }

    fn dataset(fields: Option<Vec<FieldInfo>>) -> Self {
        Self {
            kind: NodeKind::Dataset,
            attrs: BTreeMap::new(),
            fields,
            records: BTreeMap::new(),
        }
    }
}

/// Container held entirely in memory.
///
/// Members are listed in lexicographic order, matching the default link order
/// of HDF5 groups.
///
/// # Example
///
/// ```
/// use daq_control_map::container::{Container, FieldInfo, MemoryContainer};
/// use daq_control_map::dtype::DType;
///
/// let mut mem = MemoryContainer::new();
/// mem.add_group("/Raw data + config/Waveform/waveform_50to150kHz_df10kHz_nf11")
///     .set_attr(
///         "/Raw data + config/Waveform/waveform_50to150kHz_df10kHz_nf11",
///         "Waveform command list",
///         "FREQ 50000.0\nFREQ 60000.0",
///     )
///     .add_dataset(
///         "/Raw data + config/Waveform/Run time list",
///         vec![FieldInfo::scalar("Shot number", DType::Int32)],
///     );
///
/// assert_eq!(
///     mem.member_names("/Raw data + config/Waveform").unwrap(),
///     vec!["Run time list", "waveform_50to150kHz_df10kHz_nf11"]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct MemoryContainer {
    nodes: BTreeMap<String, MemoryNode>,
}

impl Default for MemoryContainer {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn parent_of(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(idx) => Some(path[..idx].to_string()),
        None => Some("/".to_string()),
    }
}

impl MemoryContainer {
    /// Empty container holding only the root group.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), MemoryNode::group());
        Self { nodes }
    }

    fn ensure_parents(&mut self, path: &str) {
        let mut ancestors = Vec::new();
        let mut current = parent_of(path);
        while let Some(p) = current {
            if self.nodes.contains_key(&p) {
                break;
            }
            current = parent_of(&p);
            ancestors.push(p);
        }
        for p in ancestors {
            self.nodes.insert(p, MemoryNode::group());
        }
    }

    /// Create the group at `path`, including any missing parents.
    pub fn add_group(&mut self, path: &str) -> &mut Self {
        let path = normalize(path);
        self.ensure_parents(&path);
        self.nodes.entry(path).or_insert_with(MemoryNode::group);
        self
    }

    /// Create a record dataset at `path` with the given named fields.
    pub fn add_dataset(&mut self, path: &str, fields: Vec<FieldInfo>) -> &mut Self {
        let path = normalize(path);
        self.ensure_parents(&path);
        self.nodes.insert(path, MemoryNode::dataset(Some(fields)));
        self
    }

    /// Create a dataset at `path` that has no named fields.
    pub fn add_plain_dataset(&mut self, path: &str) -> &mut Self {
        let path = normalize(path);
        self.ensure_parents(&path);
        self.nodes.insert(path, MemoryNode::dataset(None));
        self
    }

    /// Set attribute `name` on the node at `path`, creating a group there if
    /// nothing exists yet.
    pub fn set_attr(&mut self, path: &str, name: &str, value: impl Into<AttrValue>) -> &mut Self {
        let path = normalize(path);
        if !self.nodes.contains_key(&path) {
            self.add_group(&path);
        }
        if let Some(node) = self.nodes.get_mut(&path) {
            node.attrs.insert(name.to_string(), value.into());
        }
        self
    }

    /// Store the records of `field` in the dataset at `path`.
    ///
    /// Fields declared on the dataset without stored records read as empty.
    pub fn set_records<V>(&mut self, path: &str, field: &str, values: impl IntoIterator<Item = V>) -> &mut Self
    where
        V: Into<AttrValue>,
    {
        if let Some(node) = self.nodes.get_mut(&normalize(path)) {
            if node.kind == NodeKind::Dataset {
                node.records
                    .insert(field.to_string(), values.into_iter().map(Into::into).collect());
            }
        }
        self
    }

    /// Remove attribute `name` from the node at `path`.
    pub fn remove_attr(&mut self, path: &str, name: &str) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(&normalize(path)) {
            node.attrs.remove(name);
        }
        self
    }

    /// Remove the node at `path` and everything below it.
    pub fn remove(&mut self, path: &str) -> &mut Self {
        let path = normalize(path);
        let prefix = format!("{path}/");
        self.nodes
            .retain(|key, _| key != &path && !key.starts_with(&prefix));
        self
    }

    /// Wrap into a shareable container handle.
    pub fn into_shared(self) -> Arc<dyn Container> {
        Arc::new(self)
    }

    fn node(&self, path: &str) -> Result<&MemoryNode, ContainerError> {
        let path = normalize(path);
        self.nodes
            .get(&path)
            .ok_or(ContainerError::NotFound(path))
    }
}

impl Container for MemoryContainer {
    fn node_kind(&self, path: &str) -> Option<NodeKind> {
        self.nodes.get(&normalize(path)).map(|n| n.kind)
    }

    fn member_names(&self, path: &str) -> Result<Vec<String>, ContainerError> {
        let node = self.node(path)?;
        if node.kind != NodeKind::Group {
            return Err(ContainerError::NotAGroup(normalize(path)));
        }
        let path = normalize(path);
        Ok(self
            .nodes
            .keys()
            .filter(|key| parent_of(key).as_deref() == Some(path.as_str()))
            .map(|key| base_name(key).to_string())
            .collect())
    }

    fn attr_names(&self, path: &str) -> Result<Vec<String>, ContainerError> {
        Ok(self.node(path)?.attrs.keys().cloned().collect())
    }

    fn read_attr(&self, path: &str, name: &str) -> Result<Option<AttrValue>, ContainerError> {
        Ok(self.node(path)?.attrs.get(name).cloned())
    }

    fn dataset_fields(&self, path: &str) -> Result<Option<Vec<FieldInfo>>, ContainerError> {
        let node = self.node(path)?;
        if node.kind != NodeKind::Dataset {
            return Err(ContainerError::NotADataset(normalize(path)));
        }
        Ok(node.fields.clone())
    }

    fn read_field(&self, path: &str, field: &str) -> Result<Vec<AttrValue>, ContainerError> {
        let node = self.node(path)?;
        let declared = node
            .fields
            .as_ref()
            .is_some_and(|fields| fields.iter().any(|f| f.name == field));
        if node.kind != NodeKind::Dataset || !declared {
            return Err(ContainerError::NotFound(format!("{}[{field}]", normalize(path))));
        }
        Ok(node.records.get(field).cloned().unwrap_or_default())
    }
}
