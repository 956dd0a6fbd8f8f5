//! Control device mappers.
//!
//! A mapper inspects one control device group of a container and builds the
//! [`DeviceMap`] describing how the downstream reader assembles its data.
//! Mappers are constructed through fallible constructors: either a fully
//! built mapper is returned, or a [`MappingError`] naming the device and the
//! reason. No partially built mapper is ever observable.
//!
//! Two flavours exist:
//!
//! - [`ControlMapper`]: every mapper. Exposes the group, the device map and
//!   the diagnostics recorded while building.
//! - [`CommandListMapper`]: mappers of devices that record a *command list*.
//!   Their state values are derived by applying regular expressions to the
//!   command list and can be re-derived or reset after construction.
//!
//! | Device          | Mapper                    | Type     |
//! |-----------------|---------------------------|----------|
//! | `bmotion`       | [`BMotionMapper`]         | motion   |
//! | `N5700_PS`      | [`N5700PsMapper`]         | power    |
//! | `NI_XYZ`        | [`NiXyzMapper`]           | motion   |
//! | `6K Compumotor` | [`SixKMapper`]            | motion   |
//! | `Waveform`      | [`WaveformMapper`]        | waveform |

pub mod bmotion;
pub mod command_list;
pub mod n5700ps;
pub mod nixyz;
pub mod sixk;
pub mod waveform;

pub use bmotion::BMotionMapper;
pub use n5700ps::N5700PsMapper;
pub use nixyz::NiXyzMapper;
pub use sixk::SixKMapper;
pub use waveform::WaveformMapper;

use crate::container::{AttrValue, Dataset, Group};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{ContainerError, MapError, MappingError};
use crate::parser::{CommandList, CommandListParser, PatternSet};
use crate::schema::{
    default_command_state_values, ConType, Configuration, DeviceMap, ShotNumDescriptor, StateValues,
    SHOT_NUMBER_FIELD,
};
use serde::Serialize;
use std::fmt;

/// Where a mapper lives and what kind of device it maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapperInfo {
    /// Name of the device group.
    #[serde(rename = "group name")]
    pub group_name: String,
    /// Absolute path of the device group.
    #[serde(rename = "group path")]
    pub group_path: String,
    /// Device type.
    pub contype: ConType,
}

/// State shared by every mapper: the device group, its children, the map
/// being built and the diagnostics recorded on the way.
#[derive(Debug, Clone)]
pub struct MapperCore {
    group: Group,
    dataset_names: Vec<String>,
    subgroup_names: Vec<String>,
    map: DeviceMap,
    diagnostics: Diagnostics,
}

impl MapperCore {
    /// Start building a map of `group`.
    pub fn new(group: Group, contype: ConType) -> Result<Self, MappingError> {
        let device_name = group.name().to_string();
        let fail = |err: ContainerError| MappingError::new(&device_name, err.to_string());
        let dataset_names = group.dataset_names().map_err(fail)?;
        let subgroup_names = group.subgroup_names().map_err(fail)?;

        tracing::debug!(
            device = %device_name,
            path = group.path(),
            datasets = dataset_names.len(),
            subgroups = subgroup_names.len(),
            "mapping control device"
        );

        Ok(Self {
            map: DeviceMap::new(&device_name, contype),
            group,
            dataset_names,
            subgroup_names,
            diagnostics: Diagnostics::new(),
        })
    }

    /// The device group.
    pub fn group(&self) -> &Group {
        &self.group
    }

    /// Name of the device group.
    pub fn device_name(&self) -> &str {
        &self.map.device_name
    }

    /// Datasets directly under the device group.
    pub fn dataset_names(&self) -> &[String] {
        &self.dataset_names
    }

    /// Sub-groups directly under the device group.
    pub fn subgroup_names(&self) -> &[String] {
        &self.subgroup_names
    }

    /// Map built so far.
    pub fn map(&self) -> &DeviceMap {
        &self.map
    }

    /// Mutable access to the map built so far.
    pub fn map_mut(&mut self) -> &mut DeviceMap {
        &mut self.map
    }

    /// Diagnostics recorded so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Mutable access to the diagnostics.
    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Fatal error for this device.
    pub fn fail(&self, reason: impl Into<String>) -> MappingError {
        MappingError::new(self.device_name(), reason)
    }

    /// Record a non-fatal anomaly.
    pub fn warn(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let source = self.map.device_name.clone();
        self.diagnostics.push(kind, source, message);
    }

    /// Open the required dataset `name` of the device group.
    pub fn dataset(&self, name: &str) -> Result<Dataset, MappingError> {
        self.group
            .dataset(name)
            .map_err(|_| self.fail(format!("Dataset '{name}' not found")))
    }

    /// Open the sub-group `name` of the device group.
    pub fn subgroup(&self, name: &str) -> Result<Group, MappingError> {
        self.group
            .group(name)
            .map_err(|err| self.fail(err.to_string()))
    }

    /// Read an attribute that may be absent. A missing attribute is recorded
    /// as a diagnostic naming `context` and yields `None`.
    pub fn optional_attr(
        &mut self,
        group: &Group,
        attr: &str,
        context: &str,
    ) -> Result<Option<AttrValue>, MappingError> {
        match group.attr(attr) {
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) => {
                self.warn(
                    DiagnosticKind::MissingAttribute,
                    format!("Attribute '{attr}' not found in {context}, continuing with mapping"),
                );
                Ok(None)
            }
            Err(err) => Err(self.fail(err.to_string())),
        }
    }

    /// Shot number descriptor for `dset`, which must have a `"Shot number"`
    /// field.
    pub fn shot_number(&self, dset: &Dataset) -> Result<ShotNumDescriptor, MappingError> {
        let field = dset.field(SHOT_NUMBER_FIELD).ok_or_else(|| {
            self.fail(format!(
                "Dataset '{}' is missing '{SHOT_NUMBER_FIELD}' field",
                dset.path()
            ))
        })?;
        Ok(ShotNumDescriptor::new(
            vec![dset.path().to_string()],
            field.shape.clone(),
        ))
    }

    /// Validate `config` and append it to the map.
    pub fn push_config(&mut self, config: Configuration) -> Result<(), MappingError> {
        config.validate().map_err(|err| self.fail(err.to_string()))?;
        tracing::debug!(
            device = %self.map.device_name,
            config = %config.name,
            state_values = config.state_values.len(),
            "mapped configuration"
        );
        self.map.configs.push(config);
        Ok(())
    }

    /// Finish building; a device without configurations is not mappable.
    pub fn finish(self) -> Result<Self, MappingError> {
        if self.map.is_empty() {
            return Err(self.fail("has no mappable configurations"));
        }
        Ok(self)
    }
}

/// Behaviour shared by every control device mapper.
pub trait ControlMapper: fmt::Debug + Send + Sync {
    /// Shared mapper state.
    fn core(&self) -> &MapperCore;

    /// Name of the dataset holding the state value data selected by `args`.
    ///
    /// The meaning of `args` is device specific; devices with a single
    /// dataset ignore them.
    fn construct_dataset_name(&self, args: &[&str]) -> Result<String, MappingError>;

    /// This mapper as a command list mapper, if it is one.
    fn as_command_list(&self) -> Option<&dyn CommandListMapper> {
        None
    }

    /// This mapper as a mutable command list mapper, if it is one.
    fn as_command_list_mut(&mut self) -> Option<&mut dyn CommandListMapper> {
        None
    }

    /// The device group.
    fn group(&self) -> &Group {
        self.core().group()
    }

    /// Name of the mapped device.
    fn device_name(&self) -> &str {
        self.core().device_name()
    }

    /// Device type.
    fn contype(&self) -> ConType {
        self.core().map().contype
    }

    /// The complete device map.
    fn device_map(&self) -> &DeviceMap {
        self.core().map()
    }

    /// Configurations in build order.
    fn configs(&self) -> &[Configuration] {
        &self.core().map().configs
    }

    /// Non-fatal anomalies recorded while building.
    fn diagnostics(&self) -> &Diagnostics {
        self.core().diagnostics()
    }

    /// Datasets directly under the device group.
    fn dataset_names(&self) -> &[String] {
        self.core().dataset_names()
    }

    /// Sub-groups directly under the device group.
    fn subgroup_names(&self) -> &[String] {
        self.core().subgroup_names()
    }

    /// True if every configuration has its own dataset.
    fn one_config_per_dset(&self) -> bool {
        self.dataset_names().len() == self.device_map().len()
    }

    /// True if any configuration was built from a command list.
    fn has_command_list(&self) -> bool {
        self.configs().iter().any(Configuration::is_command_list_capable)
    }

    /// Name, path and type of the mapped group.
    fn info(&self) -> MapperInfo {
        MapperInfo {
            group_name: self.group().name().to_string(),
            group_path: self.group().path().to_string(),
            contype: self.contype(),
        }
    }

    /// Identifier of `config_name` as stored in the device datasets.
    fn get_config_id(&self, config_name: &str) -> Result<String, MapError> {
        if self.device_map().contains(config_name) {
            Ok(config_name.to_string())
        } else {
            Err(MapError::UnknownConfiguration(config_name.to_string()))
        }
    }

    /// Value of the configuration column that marks the rows of
    /// `config_name` in datasets shared by several configurations; `None`
    /// when the device has no such column.
    fn config_column_value(&self, config_name: &str) -> Result<Option<String>, MapError> {
        self.get_config_id(config_name)?;
        Ok(None)
    }
}

/// Mapper of a device whose state values come from a command list.
pub trait CommandListMapper: ControlMapper {
    /// Mutable shared mapper state.
    fn core_mut(&mut self) -> &mut MapperCore;

    /// Patterns applied when the mapper is built.
    fn default_patterns(&self) -> PatternSet;

    /// Configuration `config_name`.
    fn configuration(&self, config_name: &str) -> Result<&Configuration, MapError> {
        self.device_map()
            .get(config_name)
            .ok_or_else(|| MapError::UnknownConfiguration(config_name.to_string()))
    }

    /// Command list of `config_name`.
    fn command_list(&self, config_name: &str) -> Result<&CommandList, MapError> {
        self.configuration(config_name)?
            .command_list
            .as_ref()
            .ok_or_else(|| MapError::NoCommandList(config_name.to_string()))
    }

    /// Parser over the command list of `config_name`.
    fn clparse(&self, config_name: &str) -> Result<CommandListParser, MapError> {
        Ok(CommandListParser::new(self.command_list(config_name)?.clone()))
    }

    /// State values wrapping the raw command list under `"command"`.
    fn default_state_values(&self, config_name: &str) -> Result<StateValues, MapError> {
        let config = self.configuration(config_name)?;
        let command_list = self.command_list(config_name)?;
        Ok(default_command_state_values(command_list, &config.dset_paths))
    }

    /// State values derived by applying `patterns`; `Ok(None)` when the
    /// dataset lacks an integer `"Command index"` field or parsing is
    /// unsuccessful.
    fn construct_state_values(
        &self,
        config_name: &str,
        patterns: &PatternSet,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<StateValues>, MapError> {
        let config = self.configuration(config_name)?;
        Ok(command_list::construct_state_values(
            self.group(),
            config,
            patterns,
            diagnostics,
        )?)
    }

    /// Reset the state values of `config_name` to the default, or to the
    /// result of the default patterns when `apply_patterns` is set.
    fn reset_state_values(&mut self, config_name: &str, apply_patterns: bool) -> Result<(), MapError> {
        let mut diagnostics = Diagnostics::new();
        let derived = if apply_patterns {
            self.construct_state_values(config_name, &self.default_patterns(), &mut diagnostics)?
        } else {
            None
        };
        let state_values = match derived {
            Some(svs) => svs,
            None => self.default_state_values(config_name)?,
        };
        store_state_values(self.core_mut(), config_name, state_values, diagnostics)
    }

    /// Re-derive the state values of `config_name` from `patterns`.
    ///
    /// Invalid patterns leave the current state values untouched. An
    /// unsuccessful parse falls back to the default state values.
    fn set_state_values(&mut self, config_name: &str, patterns: PatternSet) -> Result<(), MapError> {
        let mut diagnostics = Diagnostics::new();
        let state_values = match self.construct_state_values(config_name, &patterns, &mut diagnostics)? {
            Some(svs) => svs,
            None => {
                diagnostics.push(
                    DiagnosticKind::UnsuccessfulParse,
                    config_name,
                    "RE parsing of 'command list' was unsuccessful, using default state values",
                );
                self.default_state_values(config_name)?
            }
        };
        store_state_values(self.core_mut(), config_name, state_values, diagnostics)
    }

    /// Text table of what `patterns` extract from the command list of
    /// `config_name`.
    fn try_patterns(&self, config_name: &str, patterns: PatternSet) -> Result<String, MapError> {
        Ok(self.clparse(config_name)?.try_patterns(patterns)?)
    }
}

fn store_state_values(
    core: &mut MapperCore,
    config_name: &str,
    state_values: StateValues,
    diagnostics: Diagnostics,
) -> Result<(), MapError> {
    let config = core
        .map_mut()
        .get_mut(config_name)
        .ok_or_else(|| MapError::UnknownConfiguration(config_name.to_string()))?;
    config.replace_state_values(state_values)?;
    core.diagnostics_mut().extend(diagnostics);
    Ok(())
}
