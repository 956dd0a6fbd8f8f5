//! Custom error types for the crate.
//!
//! This module defines the error values raised while mapping a control-device
//! group into a schema. Using the `thiserror` crate, each failure category gets
//! its own type so callers can match on exactly what went wrong, and
//! [`MapError`] consolidates them for APIs that can fail in more than one way.
//!
//! ## Error Hierarchy
//!
//! - **`MappingError`**: fatal for one device. A required dataset, group,
//!   attribute or field is absent, a dataset name cannot be constructed, or no
//!   configuration could be discovered. Carries the device name and a reason.
//! - **`PatternError`**: a regular expression handed to the command-list
//!   parser is malformed, uses a reserved group name, or shares its column
//!   name with another pattern. Raised before any parsing happens.
//! - **`SchemaError`**: a [`Configuration`](crate::schema::Configuration)
//!   violates one of the schema invariants. This signals a defect in the code
//!   that built the schema, not bad user input.
//! - **`ContainerError`**: the container backend could not answer a query.
//! - **`CommandListError`**: a dynamically typed command list held something
//!   other than strings.
//!
//! Recoverable anomalies are never errors; they are recorded in a
//! [`Diagnostics`](crate::diagnostics::Diagnostics) collector instead.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type MapResult<T> = std::result::Result<T, MapError>;

/// Fatal failure while mapping a single control device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{device_name}' mapping failed: {reason}")]
pub struct MappingError {
    /// Name (or group path) of the device that failed to map.
    pub device_name: String,
    /// Human-readable reason for the failure.
    pub reason: String,
}

impl MappingError {
    /// Create a new mapping error for `device_name`.
    pub fn new(device_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            reason: reason.into(),
        }
    }
}

/// Invalid regular expression handed to the command-list parser.
#[derive(Error, Debug)]
pub enum PatternError {
    /// The pattern does not compile.
    #[error("Invalid regular expression '{pattern}': {source}")]
    Invalid {
        /// Source text of the pattern.
        pattern: String,
        /// Compiler error.
        #[source]
        source: Box<regex::Error>,
    },

    /// The pattern does not define exactly two named groups.
    #[error(
        "Pattern '{pattern}' must define exactly two named groups (VALUE and a column name), found {found}"
    )]
    GroupCount {
        /// Source text of the pattern.
        pattern: String,
        /// Number of named groups found.
        found: usize,
    },

    /// The pattern lacks the `VALUE` group.
    #[error("Pattern '{pattern}' does not define the value group VALUE")]
    MissingValueGroup {
        /// Source text of the pattern.
        pattern: String,
    },

    /// The column name is reserved for the leftover text.
    #[error("Can not use '{name}' as a named group, it is reserved")]
    ReservedName {
        /// Offending column name.
        name: String,
    },

    /// Two patterns define the same column name.
    #[error("Named group '{name}' is defined in multiple patterns")]
    DuplicateName {
        /// Shared column name.
        name: String,
    },
}

/// Violation of a schema invariant.
///
/// `config` is the name of the offending configuration in every variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SchemaError {
    /// No dataset paths at all.
    #[error("Configuration '{config}' has no dataset paths")]
    NoDatasetPaths { config: String },

    /// A dataset path that is empty, relative or otherwise malformed.
    #[error("Configuration '{config}': invalid dataset path '{path}': {why}")]
    InvalidDatasetPath {
        config: String,
        path: String,
        why: &'static str,
    },

    /// The shot number is not stored as an integer.
    #[error("Configuration '{config}': shot number dtype must be an integer type, got {dtype}")]
    ShotNumberNotInteger { config: String, dtype: String },

    /// The shot number does not come from exactly one field.
    #[error("Configuration '{config}': shot number must come from exactly one field, got {count}")]
    ShotNumberFieldCount { config: String, count: usize },

    /// A state value uses the reserved name `signal`.
    #[error("Configuration '{config}': state value name '{name}' is reserved")]
    ReservedStateValue { config: String, name: String },

    /// A state value reads a dataset the configuration does not list.
    #[error("Configuration '{config}': state value '{name}' uses dataset '{path}' which is not one of the configuration's dataset paths")]
    ForeignDatasetPath {
        config: String,
        name: String,
        path: String,
    },

    /// A command list configuration holds a state value without provenance.
    #[error("Configuration '{config}': state value '{name}' lacks command list linkage")]
    MissingCommandListLink { config: String, name: String },

    /// A plain configuration holds a command list state value.
    #[error("Configuration '{config}': state value '{name}' has command list linkage but the configuration has no command list")]
    UnexpectedCommandListLink { config: String, name: String },

    /// The state value map is empty.
    #[error("Configuration '{config}' has no state values")]
    NoStateValues { config: String },
}

/// Failure reported by a container backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// Nothing exists at the path.
    #[error("'{0}' not found")]
    NotFound(String),

    /// The path names a dataset where a group was expected.
    #[error("'{0}' is not a group")]
    NotAGroup(String),

    /// The path names a group where a dataset was expected.
    #[error("'{0}' is not a dataset")]
    NotADataset(String),

    /// Any other backend failure.
    #[error("Container backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "storage_hdf5")]
impl From<hdf5::Error> for ContainerError {
    fn from(value: hdf5::Error) -> Self {
        ContainerError::Backend(value.to_string())
    }
}

/// A dynamically typed command list contained something other than strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("`command_list` must be a str or a sequence of strings: {0}")]
pub struct CommandListError(pub String);

/// Crate-level error consolidating every failure category.
#[derive(Error, Debug)]
pub enum MapError {
    /// A device could not be mapped.
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Invalid parser patterns.
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// A built configuration broke a schema invariant.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The container backend failed.
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// A dynamically typed command list held non-strings.
    #[error(transparent)]
    CommandList(#[from] CommandListError),

    /// No configuration of that name.
    #[error("Configuration '{0}' is not defined for this device")]
    UnknownConfiguration(String),

    /// The configuration exists but was not built from a command list.
    #[error("Configuration '{0}' does not use a command list")]
    NoCommandList(String),

    /// A nickname or id resolves to several configurations.
    #[error("'{name}' matches more than one configuration, use one of {candidates:?}")]
    AmbiguousConfiguration {
        /// The name that was looked up.
        name: String,
        /// Configurations it could mean.
        candidates: Vec<String>,
    },

    /// No run configuration of that name.
    #[error("Run configuration '{0}' does not exist")]
    UnknownRunConfiguration(String),
}
