//! HDF5 container backend.
//!
//! Reads the structure of an already-open HDF5 file through the `hdf5` crate.
//! Only compound (named-field) datasets expose fields; every other dataset is
//! reported without named fields.
//!
//! Record reads are not supported yet: the `hdf5` crate only reads compound
//! members through statically typed `H5Type` structs, so mappers that inspect
//! record values (bmotion) fail to map on this backend.

use super::{AttrValue, Container, FieldInfo, NodeKind};
use crate::dtype::DType;
use crate::error::ContainerError;
use hdf5::types::{FloatSize, IntSize, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{File, Location};
use std::path::Path;

/// Read-only view of an HDF5 file.
pub struct Hdf5Container {
    file: File,
}

impl Hdf5Container {
    /// Open the file at `path` read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        Ok(Self {
            file: File::open(path)?,
        })
    }

    /// Wrap a file handle opened by the caller.
    pub fn from_file(file: File) -> Self {
        Self { file }
    }

    fn with_location<T>(
        &self,
        path: &str,
        f: impl FnOnce(&Location) -> Result<T, ContainerError>,
    ) -> Result<T, ContainerError> {
        if let Ok(group) = self.file.group(path) {
            return f(&group);
        }
        match self.file.dataset(path) {
            Ok(dataset) => f(&dataset),
            Err(_) => Err(ContainerError::NotFound(path.to_string())),
        }
    }
}

fn int_dtype(size: IntSize, signed: bool) -> DType {
    match (size, signed) {
        (IntSize::U1, true) => DType::Int8,
        (IntSize::U2, true) => DType::Int16,
        (IntSize::U4, true) => DType::Int32,
        (IntSize::U8, true) => DType::Int64,
        (IntSize::U1, false) => DType::UInt8,
        (IntSize::U2, false) => DType::UInt16,
        (IntSize::U4, false) => DType::UInt32,
        (IntSize::U8, false) => DType::UInt64,
    }
}

/// Element type and per-record shape of a compound member.
fn describe(ty: &TypeDescriptor) -> Option<(DType, Vec<usize>)> {
    match ty {
        TypeDescriptor::Integer(size) => Some((int_dtype(*size, true), Vec::new())),
        TypeDescriptor::Unsigned(size) => Some((int_dtype(*size, false), Vec::new())),
        TypeDescriptor::Float(FloatSize::U4) => Some((DType::Float32, Vec::new())),
        TypeDescriptor::Float(_) => Some((DType::Float64, Vec::new())),
        TypeDescriptor::Boolean => Some((DType::Bool, Vec::new())),
        TypeDescriptor::Enum(e) => Some((int_dtype(e.size, e.signed), Vec::new())),
        TypeDescriptor::FixedAscii(n) | TypeDescriptor::FixedUnicode(n) => {
            Some((DType::FixedStr(*n), Vec::new()))
        }
        TypeDescriptor::VarLenAscii | TypeDescriptor::VarLenUnicode => {
            Some((DType::FixedStr(0), Vec::new()))
        }
        TypeDescriptor::FixedArray(inner, n) => {
            let (dtype, mut shape) = describe(inner)?;
            shape.insert(0, *n);
            Some((dtype, shape))
        }
        _ => None,
    }
}

fn read_attribute(attr: &hdf5::Attribute) -> Result<AttrValue, ContainerError> {
    let descriptor = attr.dtype()?.to_descriptor()?;
    let scalar = attr.is_scalar();
    let value = match descriptor {
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) | TypeDescriptor::Enum(_) => {
            if scalar {
                AttrValue::Int(attr.read_scalar::<i64>()?)
            } else {
                AttrValue::Array(attr.read_raw::<i64>()?.into_iter().map(AttrValue::Int).collect())
            }
        }
        TypeDescriptor::Float(_) => {
            if scalar {
                AttrValue::Float(attr.read_scalar::<f64>()?)
            } else {
                AttrValue::Array(
                    attr.read_raw::<f64>()?
                        .into_iter()
                        .map(AttrValue::Float)
                        .collect(),
                )
            }
        }
        TypeDescriptor::Boolean => AttrValue::Bool(attr.read_scalar::<bool>()?),
        TypeDescriptor::VarLenAscii => {
            AttrValue::Str(attr.read_scalar::<VarLenAscii>()?.as_str().to_string())
        }
        TypeDescriptor::VarLenUnicode
        | TypeDescriptor::FixedAscii(_)
        | TypeDescriptor::FixedUnicode(_) => {
            AttrValue::Str(attr.read_scalar::<VarLenUnicode>()?.as_str().to_string())
        }
        other => {
            return Err(ContainerError::Backend(format!(
                "unsupported attribute type {other:?}"
            )))
        }
    };
    Ok(value)
}

impl Container for Hdf5Container {
    fn node_kind(&self, path: &str) -> Option<NodeKind> {
        if path == "/" || self.file.group(path).is_ok() {
            Some(NodeKind::Group)
        } else if self.file.dataset(path).is_ok() {
            Some(NodeKind::Dataset)
        } else {
            None
        }
    }

    fn member_names(&self, path: &str) -> Result<Vec<String>, ContainerError> {
        let group = self
            .file
            .group(path)
            .map_err(|_| ContainerError::NotAGroup(path.to_string()))?;
        Ok(group.member_names()?)
    }

    fn attr_names(&self, path: &str) -> Result<Vec<String>, ContainerError> {
        self.with_location(path, |loc| Ok(loc.attr_names()?))
    }

    fn read_attr(&self, path: &str, name: &str) -> Result<Option<AttrValue>, ContainerError> {
        self.with_location(path, |loc| {
            if !loc.attr_names()?.iter().any(|n| n == name) {
                return Ok(None);
            }
            let attr = loc.attr(name)?;
            read_attribute(&attr).map(Some)
        })
    }

    fn dataset_fields(&self, path: &str) -> Result<Option<Vec<FieldInfo>>, ContainerError> {
        let dataset = self
            .file
            .dataset(path)
            .map_err(|_| ContainerError::NotADataset(path.to_string()))?;
        match dataset.dtype()?.to_descriptor()? {
            TypeDescriptor::Compound(compound) => Ok(Some(
                compound
                    .fields
                    .iter()
                    .filter_map(|field| match describe(&field.ty) {
                        Some((dtype, shape)) => Some(FieldInfo {
                            name: field.name.clone(),
                            dtype,
                            shape,
                        }),
                        None => {
                            tracing::debug!(dataset = path, field = %field.name, "skipping field with unsupported type");
                            None
                        }
                    })
                    .collect(),
            )),
            _ => Ok(None),
        }
    }

    fn read_field(&self, path: &str, field: &str) -> Result<Vec<AttrValue>, ContainerError> {
        // TODO: read single compound members once the hdf5 crate exposes dynamic compound reads.
        Err(ContainerError::Backend(format!(
            "reading records of '{path}[{field}]' is not supported by the HDF5 backend"
        )))
    }
}
