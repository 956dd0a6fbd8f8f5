//! The translation schema produced by device mappers.
//!
//! A [`DeviceMap`] holds one [`Configuration`] per operating mode (or
//! physical instance) of a control device. Each configuration tells the
//! downstream reader where the shot numbers live and how to assemble every
//! named *state value* of the output record from dataset fields.
//!
//! ```text
//! DeviceMap ("Waveform", waveform)
//!   └── Configuration "waveform_50to150kHz_df10kHz_nf11"
//!         ├── dset paths   ["/Raw data + config/Waveform/Run time list"]
//!         ├── shotnum      {field "Shot number", int32}
//!         ├── state values {"FREQ": {...}, "VOLT": {...}}
//!         ├── command list ["FREQ 50000.0 VOLT 2.0", ...]
//!         └── meta         {"IP address": "10.0.1.3", ...}
//! ```
//!
//! Configurations are validated with [`Configuration::validate`]; a failure
//! indicates a defect in the mapper that built it.

use crate::dtype::DType;
use crate::error::SchemaError;
use crate::parser::{ColumnResult, ColumnValue, CommandList, PatternDescriptor};
use crate::validation;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Key of the positional state value.
pub const XYZ: &str = "xyz";

/// Dataset field holding the shot number.
pub const SHOT_NUMBER_FIELD: &str = "Shot number";

/// Dataset field holding the command list index of each shot.
pub const COMMAND_INDEX_FIELD: &str = "Command index";

/// Key of the fallback state value wrapping an unparsed command list.
pub const DEFAULT_COMMAND_KEY: &str = "command";

/// Control device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConType {
    /// Motion stages and positioners.
    Motion,
    /// Power supplies.
    Power,
    /// Timing and trigger units.
    Timing,
    /// Function generators.
    Waveform,
}

impl fmt::Display for ConType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConType::Motion => f.write_str("motion"),
            ConType::Power => f.write_str("power"),
            ConType::Timing => f.write_str("timing"),
            ConType::Waveform => f.write_str("waveform"),
        }
    }
}

/// Where the shot numbers of a configuration are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShotNumDescriptor {
    /// Datasets holding the shot numbers.
    #[serde(rename = "dset paths")]
    pub dset_paths: Vec<String>,
    /// Field holding the shot numbers.
    #[serde(rename = "dset field")]
    pub dset_field: Vec<String>,
    /// Per-record shape of the field.
    pub shape: Vec<usize>,
    /// Integer element type.
    pub dtype: DType,
}

impl ShotNumDescriptor {
    /// Shot numbers read from the `"Shot number"` field as `int32`.
    pub fn new(dset_paths: Vec<String>, shape: Vec<usize>) -> Self {
        Self {
            dset_paths,
            dset_field: vec![SHOT_NUMBER_FIELD.to_string()],
            shape,
            dtype: DType::Int32,
        }
    }
}

/// Command list provenance of a state value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandListLink {
    /// Pattern that produced the values; `None` for the unparsed default.
    #[serde(rename = "re pattern")]
    pub re_pattern: Option<PatternDescriptor>,
    /// Command text matched per command.
    #[serde(rename = "cl str")]
    pub cl_str: Vec<String>,
    /// Value extracted per command.
    #[serde(rename = "command list")]
    pub values: Vec<ColumnValue>,
}

/// How to materialize one named field of the output record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateValueDescriptor {
    /// Datasets the value is read from.
    #[serde(rename = "dset paths")]
    pub dset_paths: Vec<String>,
    /// Fields read, one per vector element.
    #[serde(rename = "dset field")]
    pub dset_field: Vec<String>,
    /// Per-record shape of the value.
    pub shape: Vec<usize>,
    /// Element type.
    pub dtype: DType,
    /// Dataset column identifying the configuration of each row.
    #[serde(rename = "config column", skip_serializing_if = "Option::is_none")]
    pub config_column: Option<String>,
    /// Command list provenance; only set for command list configurations.
    #[serde(flatten)]
    pub command_list: Option<CommandListLink>,
}

impl StateValueDescriptor {
    /// Descriptor reading the scalar `field` from `dset_paths`.
    pub fn field(dset_paths: &[String], field: &str, dtype: DType) -> Self {
        Self {
            dset_paths: dset_paths.to_vec(),
            dset_field: vec![field.to_string()],
            shape: Vec::new(),
            dtype,
            config_column: None,
            command_list: None,
        }
    }

    /// Descriptor gathering three fields into a 3-vector.
    pub fn vector(dset_paths: &[String], fields: [&str; 3], dtype: DType) -> Self {
        Self {
            dset_paths: dset_paths.to_vec(),
            dset_field: fields.iter().map(|f| f.to_string()).collect(),
            shape: vec![3],
            dtype,
            config_column: None,
            command_list: None,
        }
    }

    /// Descriptor for a parsed command list column, indexed per shot by the
    /// `"Command index"` field.
    pub fn from_column(column: &ColumnResult, dset_paths: &[String]) -> Self {
        Self {
            dset_paths: dset_paths.to_vec(),
            dset_field: vec![COMMAND_INDEX_FIELD.to_string()],
            shape: Vec::new(),
            dtype: column.dtype(),
            config_column: None,
            command_list: Some(CommandListLink {
                re_pattern: column.pattern().cloned(),
                cl_str: column.cl_str().to_vec(),
                values: column.values().to_vec(),
            }),
        }
    }

    /// Descriptor wrapping the raw command list verbatim.
    pub fn raw_command_list(command_list: &CommandList, dset_paths: &[String]) -> Self {
        Self {
            dset_paths: dset_paths.to_vec(),
            dset_field: vec![COMMAND_INDEX_FIELD.to_string()],
            shape: Vec::new(),
            dtype: command_list.dtype(),
            config_column: None,
            command_list: Some(CommandListLink {
                re_pattern: None,
                cl_str: command_list.as_slice().to_vec(),
                values: command_list
                    .iter()
                    .cloned()
                    .map(ColumnValue::Str)
                    .collect(),
            }),
        }
    }

    /// Mark the rows of each configuration by `column`.
    pub fn with_config_column(mut self, column: impl Into<String>) -> Self {
        self.config_column = Some(column.into());
        self
    }

    /// True if the value was derived from a command list.
    pub fn has_command_list(&self) -> bool {
        self.command_list.is_some()
    }
}

/// Named state values of a configuration.
pub type StateValues = BTreeMap<String, StateValueDescriptor>;

/// Build the state values of a command list configuration from parsed
/// columns.
pub fn state_values_from_columns(columns: &[ColumnResult], dset_paths: &[String]) -> StateValues {
    columns
        .iter()
        .map(|c| {
            (
                c.name().to_string(),
                StateValueDescriptor::from_column(c, dset_paths),
            )
        })
        .collect()
}

/// State values holding the unparsed command list under `"command"`.
pub fn default_command_state_values(command_list: &CommandList, dset_paths: &[String]) -> StateValues {
    let mut map = StateValues::new();
    map.insert(
        DEFAULT_COMMAND_KEY.to_string(),
        StateValueDescriptor::raw_command_list(command_list, dset_paths),
    );
    map
}

/// Cartesian axis of a positional state value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// First element.
    X,
    /// Second element.
    Y,
    /// Third element.
    Z,
}

impl Axis {
    /// The three axes in vector order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Position of the axis inside the `"xyz"` vector.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Axis called `name` (lowercase).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            _ => None,
        }
    }

    /// Lowercase axis name.
    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

/// Key of a renamed positional state value, e.g. `xyz_target`.
pub fn renamed_xyz(suffix: &str) -> String {
    format!("{XYZ}_{suffix}")
}

/// Merge one axis contribution into the 3-vector state value `key`.
///
/// The first contribution creates the descriptor with empty field names;
/// later contributions fill in their slot instead of replacing the entry.
pub fn accumulate_axis(
    state_values: &mut StateValues,
    key: &str,
    axis: Axis,
    dset_paths: &[String],
    field: &str,
    dtype: DType,
) {
    let entry = state_values
        .entry(key.to_string())
        .or_insert_with(|| StateValueDescriptor::vector(dset_paths, ["", "", ""], dtype));
    entry.dset_field[axis.index()] = field.to_string();
}

/// One translation recipe of a control device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Configuration {
    /// Configuration name, used as the key of the device map.
    #[serde(skip)]
    pub name: String,
    /// Datasets used by the configuration.
    #[serde(rename = "dset paths")]
    pub dset_paths: Vec<String>,
    /// Where the shot numbers are stored.
    pub shotnum: ShotNumDescriptor,
    /// Named fields of the output record.
    #[serde(rename = "state values")]
    pub state_values: StateValues,
    /// Command list the state values were derived from.
    #[serde(rename = "command list", skip_serializing_if = "Option::is_none")]
    pub command_list: Option<CommandList>,
    /// Free-form per-device metadata, passed through to the reader.
    #[serde(flatten)]
    pub meta: BTreeMap<String, serde_json::Value>,
}

impl Configuration {
    /// Configuration without state values or metadata.
    pub fn new(name: impl Into<String>, dset_paths: Vec<String>, shotnum: ShotNumDescriptor) -> Self {
        Self {
            name: name.into(),
            dset_paths,
            shotnum,
            state_values: StateValues::new(),
            command_list: None,
            meta: BTreeMap::new(),
        }
    }

    /// Attach the command list the configuration is built from.
    pub fn with_command_list(mut self, command_list: CommandList) -> Self {
        self.command_list = Some(command_list);
        self
    }

    /// Set metadata entry `key`.
    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.meta.insert(key.into(), value.into());
    }

    /// True if the configuration was built from a command list.
    pub fn is_command_list_capable(&self) -> bool {
        self.command_list.is_some()
    }

    /// Check every schema invariant of the configuration.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.dset_paths.is_empty() {
            return Err(SchemaError::NoDatasetPaths {
                config: self.name.clone(),
            });
        }
        for path in &self.dset_paths {
            validation::is_valid_dset_path(path).map_err(|why| SchemaError::InvalidDatasetPath {
                config: self.name.clone(),
                path: path.clone(),
                why,
            })?;
        }

        validation::is_integer_dtype(self.shotnum.dtype).map_err(|_| {
            SchemaError::ShotNumberNotInteger {
                config: self.name.clone(),
                dtype: self.shotnum.dtype.to_string(),
            }
        })?;
        if self.shotnum.dset_field.len() != 1 {
            return Err(SchemaError::ShotNumberFieldCount {
                config: self.name.clone(),
                count: self.shotnum.dset_field.len(),
            });
        }
        self.check_paths("shotnum", &self.shotnum.dset_paths)?;

        self.check_state_values(&self.state_values)
    }

    fn check_paths(&self, name: &str, paths: &[String]) -> Result<(), SchemaError> {
        match paths.iter().find(|p| !self.dset_paths.contains(p)) {
            Some(path) => Err(SchemaError::ForeignDatasetPath {
                config: self.name.clone(),
                name: name.to_string(),
                path: path.clone(),
            }),
            None => Ok(()),
        }
    }

    fn check_state_values(&self, state_values: &StateValues) -> Result<(), SchemaError> {
        if state_values.is_empty() {
            return Err(SchemaError::NoStateValues {
                config: self.name.clone(),
            });
        }
        for (name, sv) in state_values {
            if validation::is_allowed_state_value(name).is_err() {
                return Err(SchemaError::ReservedStateValue {
                    config: self.name.clone(),
                    name: name.clone(),
                });
            }
            self.check_paths(name, &sv.dset_paths)?;
            match (self.is_command_list_capable(), sv.has_command_list()) {
                (true, false) => {
                    return Err(SchemaError::MissingCommandListLink {
                        config: self.name.clone(),
                        name: name.clone(),
                    })
                }
                (false, true) => {
                    return Err(SchemaError::UnexpectedCommandListLink {
                        config: self.name.clone(),
                        name: name.clone(),
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Replace the whole state value map.
    ///
    /// The candidate map is validated first; on error the current map is
    /// left untouched.
    pub fn replace_state_values(&mut self, state_values: StateValues) -> Result<(), SchemaError> {
        self.check_state_values(&state_values)?;
        self.state_values = state_values;
        Ok(())
    }
}

/// Complete mapping of one control device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceMap {
    /// Name of the device group.
    #[serde(rename = "device name")]
    pub device_name: String,
    /// Device type.
    pub contype: ConType,
    /// Configurations in build order.
    #[serde(serialize_with = "serialize_configs")]
    pub configs: Vec<Configuration>,
}

fn serialize_configs<S: serde::Serializer>(configs: &[Configuration], serializer: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut map = serializer.serialize_map(Some(configs.len()))?;
    for config in configs {
        map.serialize_entry(&config.name, config)?;
    }
    map.end()
}

impl DeviceMap {
    /// Empty map of `device_name`.
    pub fn new(device_name: impl Into<String>, contype: ConType) -> Self {
        Self {
            device_name: device_name.into(),
            contype,
            configs: Vec::new(),
        }
    }

    /// Configuration `name`.
    pub fn get(&self, name: &str) -> Option<&Configuration> {
        self.configs.iter().find(|c| c.name == name)
    }

    /// Mutable configuration `name`.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Configuration> {
        self.configs.iter_mut().find(|c| c.name == name)
    }

    /// True if an entry with that name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Configuration names in build order.
    pub fn names(&self) -> Vec<&str> {
        self.configs.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of configurations.
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Validate every configuration.
    pub fn validate(&self) -> Result<(), SchemaError> {
        self.configs.iter().try_for_each(Configuration::validate)
    }

    /// Pretty JSON rendering for the downstream reader.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
