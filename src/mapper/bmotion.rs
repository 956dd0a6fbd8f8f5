//! Mapper for the `bmotion` motion manager.
//!
//! ```text
//! +-- bmotion
//! |   +-- <run configuration>          (attribute RUN_CONFIG, TOML)
//! |   +-- Run time list
//! |   +-- bmotion_axis_names
//! |   +-- bmotion_positions
//! |   +-- bmotion_target_positions
//! ```
//!
//! A run configuration lists the motion groups deployed during a run under
//! `[run.motion_group.<id>]`, and every motion group becomes one
//! configuration. The position datasets store up to six generic axis columns
//! `a0`..`a5`, named per motion group by `bmotion_axis_names`. Axes named
//! `x`, `y` or `z` accumulate into `xyz` (positions) and `xyz_target`
//! (target positions); any other axis gets its own state value. All motion
//! groups share the position datasets, so every state value carries the
//! `motion_group_name` configuration column.

use super::command_list::RUN_TIME_LIST;
use super::{ControlMapper, MapperCore};
use crate::container::{Dataset, Group};
use crate::diagnostics::DiagnosticKind;
use crate::dtype::DType;
use crate::error::{ContainerError, MapError, MappingError};
use crate::schema::{
    accumulate_axis, renamed_xyz, Axis, ConType, Configuration, StateValueDescriptor, StateValues,
    SHOT_NUMBER_FIELD, XYZ,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Column naming the motion group of each row of the position datasets.
pub const MOTION_GROUP_COLUMN: &str = "motion_group_name";

/// Group attribute holding a TOML run configuration.
pub const RUN_CONFIG_ATTR: &str = "RUN_CONFIG";

/// Dataset naming the axes of every motion group.
pub const AXIS_NAMES: &str = "bmotion_axis_names";
/// Dataset of measured positions.
pub const POSITIONS: &str = "bmotion_positions";
/// Dataset of commanded positions.
pub const TARGET_POSITIONS: &str = "bmotion_target_positions";

/// Datasets of the device group, keyed by the selector accepted by
/// `construct_dataset_name`.
pub const DATASETS: [(&str, &str); 4] = [
    ("main", RUN_TIME_LIST),
    ("axis_names", AXIS_NAMES),
    ("positions", POSITIONS),
    ("target_positions", TARGET_POSITIONS),
];

const AXIS_COLUMNS: [&str; 6] = ["a0", "a1", "a2", "a3", "a4", "a5"];
const CONFIG_NAME_COLUMN: &str = "Configuration name";
const TARGET_SUFFIX: &str = "target";

/// Keys of a deployment lifted into its configuration when the motion group
/// was deployed by a single run configuration.
const LIFTED_KEYS: [&str; 4] = [
    "BAPSFDAQ_MOTION_LV_VERSION",
    "BAPSF_MOTION_VERSION",
    "EXPANSION_ATTR",
    "MG_CONFIG",
];

static CONFIG_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<ID>[0-9]+)\s+-\s+(?P<MG>.+)$").expect("Invalid configuration name regex")
});

fn config_name(mg_id: &str, mg_name: &str) -> String {
    format!("{mg_id} - {mg_name}")
}

/// Split `"<id> - <motion group>"` into its parts; other names have no id.
fn split_config_name(name: &str) -> (Option<&str>, &str) {
    match CONFIG_NAME_RE.captures(name) {
        Some(caps) => match (caps.name("ID"), caps.name("MG")) {
            (Some(id), Some(mg)) => (Some(id.as_str().trim()), mg.as_str().trim()),
            _ => (None, name),
        },
        None => (None, name),
    }
}

fn position_columns() -> Vec<&'static str> {
    let mut columns = vec![
        SHOT_NUMBER_FIELD,
        "motion_group_id",
        MOTION_GROUP_COLUMN,
        "motionlist_index",
    ];
    columns.extend(AXIS_COLUMNS);
    columns
}

fn read_ints(group: &Group, dset: &str, field: &str) -> Result<Vec<i64>, ContainerError> {
    group
        .read_field(dset, field)?
        .into_iter()
        .map(|value| {
            value.as_i64().ok_or_else(|| {
                ContainerError::Backend(format!(
                    "field '{field}' of '{dset}' holds non-integer value {value}"
                ))
            })
        })
        .collect()
}

/// Rows of `Run time list`.
#[derive(Debug)]
struct RunTimeList {
    shotnum: Vec<i64>,
    config_name: Vec<String>,
}

impl RunTimeList {
    fn read(core: &MapperCore) -> Result<Self, MappingError> {
        let fail = |err: ContainerError| core.fail(err.to_string());
        let shotnum = read_ints(core.group(), RUN_TIME_LIST, SHOT_NUMBER_FIELD).map_err(fail)?;
        let config_name = core
            .group()
            .read_str_field(RUN_TIME_LIST, CONFIG_NAME_COLUMN)
            .map_err(fail)?;
        if shotnum.len() != config_name.len() {
            return Err(core.fail(format!(
                "Dataset '{RUN_TIME_LIST}' has columns of differing length"
            )));
        }
        Ok(Self {
            shotnum,
            config_name,
        })
    }

    /// Shot numbers recorded under run configuration `name`.
    fn shots_of(&self, name: &str) -> BTreeSet<i64> {
        self.config_name
            .iter()
            .zip(&self.shotnum)
            .filter(|(n, _)| *n == name)
            .map(|(_, shot)| *shot)
            .collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.config_name.iter().any(|n| n == name)
    }
}

/// Rows of `bmotion_axis_names`.
#[derive(Debug)]
struct AxisNameTable {
    shotnum: Vec<i64>,
    motion_group: Vec<String>,
    axes: Vec<[String; 6]>,
}

impl AxisNameTable {
    fn read(core: &MapperCore) -> Result<Self, MappingError> {
        let group = core.group();
        let fail = |err: ContainerError| core.fail(err.to_string());
        let shotnum = read_ints(group, AXIS_NAMES, SHOT_NUMBER_FIELD).map_err(fail)?;
        let motion_group = group
            .read_str_field(AXIS_NAMES, MOTION_GROUP_COLUMN)
            .map_err(fail)?;
        let mut columns = Vec::with_capacity(AXIS_COLUMNS.len());
        for column in AXIS_COLUMNS {
            columns.push(group.read_str_field(AXIS_NAMES, column).map_err(fail)?);
        }

        let rows = motion_group.len();
        if shotnum.len() != rows || columns.iter().any(|c| c.len() != rows) {
            return Err(core.fail(format!(
                "Dataset '{AXIS_NAMES}' has columns of differing length"
            )));
        }
        let axes = (0..rows)
            .map(|row| std::array::from_fn(|col| columns[col][row].clone()))
            .collect();
        Ok(Self {
            shotnum,
            motion_group,
            axes,
        })
    }

    /// Axis names of the first row describing `mg_name`, optionally limited
    /// to rows recorded during `shots`.
    fn row(&self, mg_name: &str, shots: Option<&BTreeSet<i64>>) -> Option<&[String; 6]> {
        (0..self.axes.len())
            .find(|&i| {
                self.motion_group[i] == mg_name
                    && shots.map_or(true, |shots| shots.contains(&self.shotnum[i]))
            })
            .map(|i| &self.axes[i])
    }
}

/// A run configuration group and its parsed TOML document.
#[derive(Debug, Clone)]
struct RunConfig {
    name: String,
    toml: String,
    document: Value,
    attrs: Map<String, Value>,
}

impl RunConfig {
    fn read(core: &MapperCore, group: &Group, text: String) -> Result<Self, MappingError> {
        let name = group.name().to_string();
        let document: Value = toml::from_str(&text).map_err(|err| {
            core.fail(format!("Run configuration '{name}' is not valid TOML: {err}"))
        })?;

        let mut attrs = Map::new();
        let attr_names = group.attr_names().map_err(|err| core.fail(err.to_string()))?;
        for attr in attr_names.into_iter().filter(|a| a != RUN_CONFIG_ATTR) {
            if let Some(value) = group.attr(&attr).map_err(|err| core.fail(err.to_string()))? {
                attrs.insert(attr, value.to_json());
            }
        }

        Ok(Self {
            name,
            toml: text,
            document,
            attrs,
        })
    }

    /// Motion groups deployed by this run configuration.
    fn deployments(&self, core: &MapperCore) -> Result<Vec<Deployment>, MappingError> {
        let groups = self
            .document
            .pointer("/run/motion_group")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                core.fail(format!(
                    "Run configuration '{}' does not define a 'run.motion_group' table",
                    self.name
                ))
            })?;

        groups
            .iter()
            .map(|(mg_id, mg_config)| {
                let lookup = |pointer: &str| {
                    mg_config
                        .pointer(pointer)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| {
                            core.fail(format!(
                                "Motion group '{mg_id}' of run configuration '{}' lacks '{pointer}'",
                                self.name
                            ))
                        })
                };
                let mg_name = lookup("/name")?;
                let drive_name = lookup("/drive/name")?;

                let mut meta = self.attrs.clone();
                meta.insert("MG_ID".into(), Value::from(mg_id.as_str()));
                meta.insert("MG_CONFIG".into(), mg_config.clone());
                meta.insert("RUN_CONFIG_NAME".into(), Value::from(self.name.as_str()));
                meta.insert("DRIVE_NAME".into(), Value::from(drive_name.as_str()));

                Ok(Deployment {
                    mg_id: mg_id.clone(),
                    mg_name,
                    drive_name,
                    run_config_name: self.name.clone(),
                    meta,
                })
            })
            .collect()
    }
}

/// One motion group as deployed by one run configuration.
#[derive(Debug, Clone)]
struct Deployment {
    mg_id: String,
    mg_name: String,
    drive_name: String,
    run_config_name: String,
    meta: Map<String, Value>,
}

/// Maps the `bmotion` group.
///
/// Configurations are named `"<id> - <motion group>"`, or just the motion
/// group name when several run configurations deployed the same motion
/// group. Drive names work as nicknames wherever a configuration name is
/// accepted, as long as the drive is used by a single configuration.
#[derive(Debug, Clone)]
pub struct BMotionMapper {
    core: MapperCore,
    run_configs: Vec<RunConfig>,
    /// Deployments behind each configuration, in configuration order.
    deployments: Vec<(String, Vec<Deployment>)>,
}

impl BMotionMapper {
    /// Map the `bmotion` device group.
    pub fn new(group: Group) -> Result<Self, MappingError> {
        let mut core = MapperCore::new(group, ConType::Motion)?;
        verify_datasets(&core)?;
        let rtl = RunTimeList::read(&core)?;
        let run_configs = collect_run_configs(&mut core, &rtl)?;

        let mut deployments: Vec<(String, Vec<Deployment>)> = Vec::new();
        for rc in &run_configs {
            for dep in rc.deployments(&core)? {
                match deployments.iter_mut().find(|(name, _)| *name == dep.mg_name) {
                    Some((_, deps)) => deps.push(dep),
                    None => deployments.push((dep.mg_name.clone(), vec![dep])),
                }
            }
        }
        for (name, deps) in deployments.iter_mut() {
            if let [dep] = deps.as_slice() {
                *name = config_name(&dep.mg_id, &dep.mg_name);
            }
        }

        let axis_names = AxisNameTable::read(&core)?;
        if run_configs.len() > 1 {
            deployments.retain(|(name, deps)| {
                deps.len() < 2 || consistent_axes(&mut core, name, deps, &rtl, &axis_names)
            });
        }
        if deployments.is_empty() {
            return Err(core.fail("Unable to fully map any of the motion group configurations"));
        }

        let dset_paths: Vec<String> = DATASETS
            .iter()
            .map(|(_, name)| core.group().child_path(name))
            .collect();
        let main = core.dataset(RUN_TIME_LIST)?;
        let positions = core.dataset(POSITIONS)?;
        let targets = core.dataset(TARGET_POSITIONS)?;
        let shotnum = core.shot_number(&main)?;

        let mut mapped = Vec::with_capacity(deployments.len());
        for (name, deps) in deployments {
            let Some(mg_name) = deps.first().map(|d| d.mg_name.clone()) else {
                continue;
            };
            let Some(axes) = axis_mapping(&mut core, &axis_names, &mg_name) else {
                continue;
            };

            let mut config = Configuration::new(&name, dset_paths.clone(), shotnum.clone());
            config.state_values = axis_state_values(&axes, &positions, &targets);
            config.set_meta(
                "meta",
                Value::Array(deps.iter().map(|d| Value::Object(d.meta.clone())).collect()),
            );
            if let [dep] = deps.as_slice() {
                for key in LIFTED_KEYS {
                    if let Some(value) = dep.meta.get(key) {
                        config.set_meta(key, value.clone());
                    }
                }
            }

            core.push_config(config)?;
            mapped.push((name, deps));
        }
        if mapped.is_empty() {
            return Err(core.fail("Unable to fully map any of the motion group configurations"));
        }

        Ok(Self {
            core: core.finish()?,
            run_configs,
            deployments: mapped,
        })
    }

    /// Names of the run configurations behind the mapped configurations.
    pub fn run_config_names(&self) -> Vec<&str> {
        self.deployments
            .iter()
            .flat_map(|(_, deps)| deps.iter().map(|d| d.run_config_name.as_str()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Resolve an exact configuration name or a drive nickname.
    pub fn process_config_name(&self, name: &str) -> Result<&str, MapError> {
        if let Some((config, _)) = self.deployments.iter().find(|(c, _)| c == name) {
            return Ok(config);
        }
        let candidates: Vec<&str> = self
            .deployments
            .iter()
            .filter(|(_, deps)| deps.first().is_some_and(|d| d.drive_name == name))
            .map(|(c, _)| c.as_str())
            .collect();
        match candidates.as_slice() {
            [] => Err(MapError::UnknownConfiguration(name.to_string())),
            [config] => Ok(config),
            _ => Err(MapError::AmbiguousConfiguration {
                name: name.to_string(),
                candidates: candidates.iter().map(|c| c.to_string()).collect(),
            }),
        }
    }

    /// Configuration driven by drive `drive`.
    pub fn config_name_by_drive_name(&self, drive: &str) -> Result<&str, MapError> {
        self.deployments
            .iter()
            .find(|(_, deps)| deps.first().is_some_and(|d| d.drive_name == drive))
            .map(|(c, _)| c.as_str())
            .ok_or_else(|| MapError::UnknownConfiguration(drive.to_string()))
    }

    /// Configuration of the motion group with id `mg_id`.
    ///
    /// Only motion groups deployed by a single run configuration carry an id
    /// in their configuration name; an id used by several of them is
    /// ambiguous.
    pub fn config_name_by_motion_group_id(&self, mg_id: &str) -> Result<&str, MapError> {
        let candidates: Vec<&str> = self
            .deployments
            .iter()
            .filter(|(c, deps)| deps.len() == 1 && split_config_name(c).0 == Some(mg_id))
            .map(|(c, _)| c.as_str())
            .collect();
        match candidates.as_slice() {
            [] => Err(MapError::UnknownConfiguration(mg_id.to_string())),
            [config] => Ok(config),
            _ => Err(MapError::AmbiguousConfiguration {
                name: mg_id.to_string(),
                candidates: candidates.iter().map(|c| c.to_string()).collect(),
            }),
        }
    }

    /// Configuration of the motion group named `mg_name`.
    pub fn config_name_by_motion_group_name(&self, mg_name: &str) -> Result<&str, MapError> {
        self.deployments
            .iter()
            .find(|(_, deps)| deps.first().is_some_and(|d| d.mg_name == mg_name))
            .map(|(c, _)| c.as_str())
            .ok_or_else(|| MapError::UnknownConfiguration(mg_name.to_string()))
    }

    fn run_config(&self, name: Option<&str>) -> Result<&RunConfig, MapError> {
        match name {
            Some(name) => self
                .run_configs
                .iter()
                .find(|rc| rc.name == name)
                .ok_or_else(|| MapError::UnknownRunConfiguration(name.to_string())),
            None => match self.run_configs.as_slice() {
                [rc] => Ok(rc),
                all => Err(MapError::AmbiguousConfiguration {
                    name: "run configuration".to_string(),
                    candidates: all.iter().map(|rc| rc.name.clone()).collect(),
                }),
            },
        }
    }

    /// TOML text of run configuration `name`, or of the only one when
    /// `name` is `None`.
    pub fn run_configuration(&self, name: Option<&str>) -> Result<&str, MapError> {
        Ok(&self.run_config(name)?.toml)
    }

    /// Parsed run configuration `name`, or the only one when `name` is
    /// `None`.
    pub fn run_configuration_document(&self, name: Option<&str>) -> Result<&Value, MapError> {
        Ok(&self.run_config(name)?.document)
    }
}

impl ControlMapper for BMotionMapper {
    fn core(&self) -> &MapperCore {
        &self.core
    }

    /// `args[0]` selects one of `main`, `axis_names`, `positions` or
    /// `target_positions`; defaults to `main`.
    fn construct_dataset_name(&self, args: &[&str]) -> Result<String, MappingError> {
        let which = args.first().copied().unwrap_or("main");
        DATASETS
            .iter()
            .find(|(key, _)| *key == which)
            .map(|(_, name)| name.to_string())
            .ok_or_else(|| {
                let valid: Vec<&str> = DATASETS.iter().map(|(key, _)| *key).collect();
                self.core.fail(format!(
                    "The requested dataset is invalid, got request '{which}' and valid requests are {valid:?}"
                ))
            })
    }

    fn get_config_id(&self, config_name: &str) -> Result<String, MapError> {
        self.process_config_name(config_name).map(str::to_string)
    }

    fn config_column_value(&self, config_name: &str) -> Result<Option<String>, MapError> {
        let name = self.process_config_name(config_name)?;
        Ok(Some(split_config_name(name).1.to_string()))
    }
}

fn verify_datasets(core: &MapperCore) -> Result<(), MappingError> {
    let present = core.dataset_names();
    let missing: Vec<&str> = DATASETS
        .iter()
        .map(|(_, name)| *name)
        .filter(|name| !present.iter().any(|p| p == name))
        .collect();
    if !missing.is_empty() {
        return Err(core.fail(format!("Missing datasets {missing:?}")));
    }
    if present.len() != DATASETS.len() {
        return Err(core.fail(format!(
            "Expected {} datasets, found {} datasets",
            DATASETS.len(),
            present.len()
        )));
    }

    for (which, name) in DATASETS {
        let dset = core.dataset(name)?;
        if !dset.has_named_fields() {
            return Err(core.fail(format!(
                "Dataset '{}' does not have named columns",
                dset.path()
            )));
        }
        let required = if which == "main" {
            vec![SHOT_NUMBER_FIELD, CONFIG_NAME_COLUMN]
        } else {
            position_columns()
        };
        let missing: Vec<&str> = required
            .into_iter()
            .filter(|column| dset.field(column).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(core.fail(format!(
                "Dataset '{}' does not have all required columns, missing columns: {missing:?}",
                dset.path()
            )));
        }
    }
    Ok(())
}

/// Run configuration groups that were used during the data run.
fn collect_run_configs(core: &mut MapperCore, rtl: &RunTimeList) -> Result<Vec<RunConfig>, MappingError> {
    if core.subgroup_names().is_empty() {
        return Err(core.fail("Expected at least 1 sub-group, found NO groups"));
    }

    let mut run_configs = Vec::new();
    for name in core.subgroup_names().to_vec() {
        let group = core.subgroup(&name)?;
        let Some(attr) = group.attr(RUN_CONFIG_ATTR).map_err(|err| core.fail(err.to_string()))? else {
            tracing::debug!(group = %name, "not a run configuration group");
            continue;
        };
        let Some(text) = attr.as_str().map(str::to_string) else {
            return Err(core.fail(format!(
                "Attribute '{RUN_CONFIG_ATTR}' of group '{name}' is not a string"
            )));
        };
        if !rtl.contains(&name) {
            core.warn(
                DiagnosticKind::DroppedConfiguration,
                format!(
                    "bmotion run configuration '{name}' was not found in the '{RUN_TIME_LIST}' dataset, not including configuration in the mapping"
                ),
            );
            continue;
        }
        run_configs.push(RunConfig::read(core, &group, text)?);
    }

    if run_configs.is_empty() {
        return Err(core.fail("There are no valid configurations in the bmotion group"));
    }
    Ok(run_configs)
}

/// A motion group deployed by several run configurations must have used the
/// same axis names in each of them.
fn consistent_axes(
    core: &mut MapperCore,
    config_name: &str,
    deps: &[Deployment],
    rtl: &RunTimeList,
    table: &AxisNameTable,
) -> bool {
    let mut expected: Option<&[String; 6]> = None;
    for dep in deps {
        let shots = rtl.shots_of(&dep.run_config_name);
        let Some(row) = table.row(&dep.mg_name, Some(&shots)) else {
            core.warn(
                DiagnosticKind::DroppedConfiguration,
                format!(
                    "bmotion: the motion group '{config_name}' has no axis names recorded for run configuration '{}', removing it from mapping",
                    dep.run_config_name
                ),
            );
            return false;
        };
        match expected {
            Some(prev) if prev != row => {
                core.warn(
                    DiagnosticKind::DroppedConfiguration,
                    format!(
                        "bmotion: the motion group '{config_name}' has differing axis names for the specified run configurations, removing it from mapping"
                    ),
                );
                return false;
            }
            Some(_) => {}
            None => expected = Some(row),
        }
    }
    true
}

/// `(column, axis name)` of every axis used by motion group `mg_name`.
fn axis_mapping(
    core: &mut MapperCore,
    table: &AxisNameTable,
    mg_name: &str,
) -> Option<Vec<(&'static str, String)>> {
    let Some(row) = table.row(mg_name, None) else {
        core.warn(
            DiagnosticKind::DroppedConfiguration,
            format!("Unable to locate the '{mg_name}' configuration in the '{AXIS_NAMES}' dataset"),
        );
        return None;
    };
    let axes: Vec<(&'static str, String)> = AXIS_COLUMNS
        .iter()
        .zip(row)
        .filter(|(_, axis)| !axis.is_empty())
        .map(|(column, axis)| (*column, axis.clone()))
        .collect();
    if axes.is_empty() {
        core.warn(
            DiagnosticKind::DroppedConfiguration,
            format!("Unable to identify any used axes for the '{mg_name}' motion group configuration"),
        );
        return None;
    }
    Some(axes)
}

fn axis_state_values(axes: &[(&str, String)], positions: &Dataset, targets: &Dataset) -> StateValues {
    let mut state_values = StateValues::new();
    for (column, axis_name) in axes {
        add_axis(&mut state_values, positions, column, axis_name, None);
        add_axis(&mut state_values, targets, column, axis_name, Some(TARGET_SUFFIX));
    }
    state_values
}

/// Add the state value reading axis `axis_name` from `column` of `dset`,
/// keyed with `suffix` appended when given.
fn add_axis(
    state_values: &mut StateValues,
    dset: &Dataset,
    column: &str,
    axis_name: &str,
    suffix: Option<&str>,
) {
    let paths = [dset.path().to_string()];
    match Axis::from_name(&axis_name.to_lowercase()) {
        Some(axis) => {
            let key = suffix.map_or_else(|| XYZ.to_string(), renamed_xyz);
            accumulate_axis(state_values, &key, axis, &paths, column, DType::Float64);
            if let Some(entry) = state_values.get_mut(&key) {
                entry.config_column = Some(MOTION_GROUP_COLUMN.to_string());
            }
        }
        None => {
            let key = match suffix {
                Some(suffix) => format!("{axis_name}_{suffix}"),
                None => axis_name.to_string(),
            };
            let dtype = dset.field(column).map_or(DType::Float64, |f| f.dtype);
            state_values.insert(
                key,
                StateValueDescriptor::field(&paths, column, dtype).with_config_column(MOTION_GROUP_COLUMN),
            );
        }
    }
}
