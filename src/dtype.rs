//! Element types of dataset fields and state values.

use serde::{Serialize, Serializer};
use std::fmt;

/// Element type of a named dataset field or of a generated state value.
///
/// Displays (and serializes) using numpy-style type strings, e.g. `int32`,
/// `float64` or `<U12` for a 12 character fixed-width string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// `int8`
    Int8,
    /// `int16`
    Int16,
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `uint8`
    UInt8,
    /// `uint16`
    UInt16,
    /// `uint32`
    UInt32,
    /// `uint64`
    UInt64,
    /// `float32`
    Float32,
    /// `float64`
    Float64,
    /// `bool`
    Bool,
    /// Fixed-width string holding at most `n` characters.
    FixedStr(usize),
}

impl DType {
    /// True for signed and unsigned integer types.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DType::Int8
                | DType::Int16
                | DType::Int32
                | DType::Int64
                | DType::UInt8
                | DType::UInt16
                | DType::UInt32
                | DType::UInt64
        )
    }

    /// True for `float32` and `float64`.
    pub fn is_float(&self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    /// True for fixed-width strings.
    pub fn is_string(&self) -> bool {
        matches!(self, DType::FixedStr(_))
    }

    /// Fixed-width string type wide enough for the longest of `values`.
    pub fn string_for<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let width = values
            .into_iter()
            .map(|v| v.chars().count())
            .max()
            .unwrap_or(0);
        DType::FixedStr(width)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Int8 => f.write_str("int8"),
            DType::Int16 => f.write_str("int16"),
            DType::Int32 => f.write_str("int32"),
            DType::Int64 => f.write_str("int64"),
            DType::UInt8 => f.write_str("uint8"),
            DType::UInt16 => f.write_str("uint16"),
            DType::UInt32 => f.write_str("uint32"),
            DType::UInt64 => f.write_str("uint64"),
            DType::Float32 => f.write_str("float32"),
            DType::Float64 => f.write_str("float64"),
            DType::Bool => f.write_str("bool"),
            DType::FixedStr(n) => write!(f, "<U{n}"),
        }
    }
}

impl Serialize for DType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
