//! Mapper for the `NI_XYZ` probe drive.

use super::command_list::RUN_TIME_LIST;
use super::{ControlMapper, MapperCore};
use crate::container::Group;
use crate::diagnostics::DiagnosticKind;
use crate::dtype::DType;
use crate::error::MappingError;
use crate::schema::{accumulate_axis, Axis, ConType, Configuration, XYZ};
use serde_json::{json, Map, Value};

/// The drive has a single configuration.
pub const CONFIG_NAME: &str = "config01";

/// Distance between the probe drive pivot point and the machine axis, in cm.
pub const LPP_CM: f64 = 58.771;

const NOTE: &str = "The 'r', 'theta', and 'phi' fields in the NI_XYZ data set are \
                    supposed to represent spherical coordinates of the probe tip with \
                    respect to the pivot point of the probe drive, but the current \
                    calculation and population of the fields is inaccurate. For user \
                    reference, the distance between the probe drive pivot point and \
                    LaPD axis is (Lpp =) 58.771 cm.";

/// A sub-group carrying any of these attributes is a motion list.
const MOTION_LIST_MARKERS: [&str; 9] = ["Nx", "Ny", "Nz", "dx", "dy", "dz", "x0", "y0", "z0"];

const MOTION_LIST_ATTRS: [(&str, &str); 15] = [
    ("Nx", "Nx"),
    ("Ny", "Ny"),
    ("Nz", "Nz"),
    ("dx", "dx"),
    ("dy", "dy"),
    ("dz", "dz"),
    ("fan_XYZ", "fan_XYZ"),
    ("max_ydrive_steps", "max_ydrive_steps"),
    ("min_ydrive_steps", "min_ydrive_steps"),
    ("max_zdrive_steps", "max_zdrive_steps"),
    ("min_zdrive_steps", "min_zdrive_steps"),
    ("x0", "x0"),
    ("y0", "y0"),
    ("z0", "z0"),
    ("port", "z_port"),
];

/// Maps the `NI_XYZ` group.
///
/// ```text
/// +-- NI_XYZ
/// |   +-- <motion list>
/// |   +-- Run time list
/// ```
///
/// Probe positions are read from the `x`, `y` and `z` fields of
/// `Run time list`. A missing axis leaves its slot of the `xyz` field list
/// empty.
#[derive(Debug, Clone)]
pub struct NiXyzMapper {
    core: MapperCore,
}

impl NiXyzMapper {
    /// Map the `NI_XYZ` device group.
    pub fn new(group: Group) -> Result<Self, MappingError> {
        let mut core = MapperCore::new(group, ConType::Motion)?;
        if core.subgroup_names().is_empty() {
            core.warn(
                DiagnosticKind::MissingSubgroup,
                "no defining motion list groups exist",
            );
        }

        let dset = core.dataset(RUN_TIME_LIST)?;
        let dset_paths = vec![dset.path().to_string()];
        let shotnum = core.shot_number(&dset)?;
        let mut config = Configuration::new(CONFIG_NAME, dset_paths.clone(), shotnum);
        config.set_meta("Note", NOTE);
        config.set_meta("Lpp", json!({ "value": LPP_CM, "unit": "cm" }));

        let mut motion_lists = Map::new();
        for name in core.subgroup_names().to_vec() {
            let ml_group = core.subgroup(&name)?;
            if !MOTION_LIST_MARKERS.iter().any(|attr| ml_group.has_attr(attr)) {
                tracing::debug!(group = %name, "not a motion list group");
                continue;
            }

            let context = format!("ML group '{name}'");
            let mut ml = Map::new();
            for (key, attr) in MOTION_LIST_ATTRS {
                let value = match core.optional_attr(&ml_group, attr, &context)? {
                    Some(v) if attr == "fan_XYZ" => Value::Bool(v.as_str() == Some("TRUE")),
                    Some(v) => v.to_json(),
                    None => Value::Null,
                };
                ml.insert(key.to_string(), value);
            }
            motion_lists.insert(name, Value::Object(ml));
        }
        if motion_lists.is_empty() {
            core.warn(
                DiagnosticKind::MissingSubgroup,
                "NI_XYZ has no identifiable motion lists",
            );
        }
        config.set_meta("motion lists", Value::Object(motion_lists));

        let missing: Vec<&str> = Axis::ALL
            .iter()
            .filter(|axis| dset.field(axis.name()).is_none())
            .map(|axis| axis.name())
            .collect();
        if missing.len() == Axis::ALL.len() {
            return Err(core.fail(format!(
                "Dataset '{}' missing fields 'x', 'y' and 'z'",
                dset.path()
            )));
        }
        if !missing.is_empty() {
            core.warn(
                DiagnosticKind::MissingField,
                format!("Dataset '{}' missing field '{}'", dset.path(), missing.join(", ")),
            );
        }
        for axis in Axis::ALL {
            if !missing.contains(&axis.name()) {
                accumulate_axis(
                    &mut config.state_values,
                    XYZ,
                    axis,
                    &dset_paths,
                    axis.name(),
                    DType::Float64,
                );
            }
        }

        core.push_config(config)?;
        Ok(Self {
            core: core.finish()?,
        })
    }
}

impl ControlMapper for NiXyzMapper {
    fn core(&self) -> &MapperCore {
        &self.core
    }

    fn construct_dataset_name(&self, _args: &[&str]) -> Result<String, MappingError> {
        Ok(RUN_TIME_LIST.to_string())
    }
}
