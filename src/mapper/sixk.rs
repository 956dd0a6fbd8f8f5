//! Mapper for the `6K Compumotor` probe drive.
//!
//! The device group holds two kinds of sub-groups, told apart by name:
//!
//! - motion lists, `Motion list: <name>`, describing a grid of positions, and
//! - probe lists, `Probe: XY[<receptacle>]: <probe name>`, one per probe
//!   mounted on a drive receptacle.
//!
//! Every probe list becomes a configuration named after its receptacle
//! number, whose data lives in the dataset `XY[<receptacle>]: <probe name>`.

use super::{ControlMapper, MapperCore};
use crate::container::Group;
use crate::diagnostics::DiagnosticKind;
use crate::dtype::DType;
use crate::error::MappingError;
use crate::schema::{accumulate_axis, Axis, ConType, Configuration, StateValueDescriptor, XYZ};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

static MOTION_LIST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\bMotion list:\s)(?P<NAME>.+\b)$").expect("Invalid motion list regex")
});

static PROBE_LIST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\bProbe:\sXY\[)(?P<RNUM>\b\d+\b)(\]:\s)(?P<NAME>.+\b)$")
        .expect("Invalid probe list regex")
});

const PROBE_LIST_ATTRS: [(&str, &str); 8] = [
    ("calib", "Calibration"),
    ("level sy (cm)", "Level sy (cm)"),
    ("port", "Port"),
    ("probe channels", "Probe channels"),
    ("probe type", "Probe type"),
    ("unnamed", "Unnamed"),
    ("sx at end (cm)", "sx at end (cm)"),
    ("z", "z"),
];

/// Probe list discovered from a sub-group name.
#[derive(Debug, Clone)]
struct ProbeList {
    probe_name: String,
    receptacle: u32,
    meta: Map<String, Value>,
}

/// Maps the `6K Compumotor` group.
#[derive(Debug, Clone)]
pub struct SixKMapper {
    core: MapperCore,
    /// `(receptacle, probe name)` of every configuration.
    probes: Vec<(String, String)>,
}

impl SixKMapper {
    /// Map the `6K Compumotor` device group.
    pub fn new(group: Group) -> Result<Self, MappingError> {
        let mut core = MapperCore::new(group, ConType::Motion)?;

        let mut motion_lists = Map::new();
        let mut probe_lists = Vec::new();
        for name in core.subgroup_names().to_vec() {
            if let Some(ml_name) = MOTION_LIST_RE
                .captures(&name)
                .and_then(|caps| caps.name("NAME"))
                .map(|m| m.as_str().to_string())
            {
                let meta = analyze_motion_list(&mut core, &name, &ml_name)?;
                motion_lists.insert(ml_name, Value::Object(meta));
            } else if let Some(pl) = analyze_probe_list(&mut core, &name)? {
                probe_lists.push(pl);
            } else {
                tracing::debug!(group = %name, "neither a motion list nor a probe list");
            }
        }

        if probe_lists.is_empty() {
            return Err(core.fail("has no mappable configurations (Probe List groups)"));
        }

        let mut probes: Vec<(String, String)> = Vec::new();
        for pl in probe_lists {
            let config_name = pl.receptacle.to_string();
            if probes.iter().any(|(r, _)| *r == config_name) {
                core.warn(
                    DiagnosticKind::DroppedConfiguration,
                    format!(
                        "Probe '{}' uses receptacle {} which is already mapped, skipping",
                        pl.probe_name, pl.receptacle
                    ),
                );
                continue;
            }

            let dset_name = dataset_name(&config_name, &pl.probe_name);
            let dset = core.dataset(&dset_name).map_err(|_| {
                core.fail(format!(
                    "Dataset for configuration '{} - {}' could not be determined or found",
                    pl.probe_name, pl.receptacle
                ))
            })?;
            let dset_paths = vec![dset.path().to_string()];
            let shotnum = core.shot_number(&dset)?;

            let mut config = Configuration::new(&config_name, dset_paths.clone(), shotnum);
            config.set_meta("motion lists", Value::Object(motion_lists.clone()));
            config.set_meta("probe", Value::Object(pl.meta));
            config.set_meta("receptacle", pl.receptacle);

            for axis in Axis::ALL {
                accumulate_axis(
                    &mut config.state_values,
                    XYZ,
                    axis,
                    &dset_paths,
                    axis.name(),
                    DType::Float64,
                );
            }
            config.state_values.insert(
                "ptip_rot_theta".to_string(),
                StateValueDescriptor::field(&dset_paths, "theta", DType::Float64),
            );
            config.state_values.insert(
                "ptip_rot_phi".to_string(),
                StateValueDescriptor::field(&dset_paths, "phi", DType::Float64),
            );

            core.push_config(config)?;
            probes.push((config_name, pl.probe_name));
        }

        Ok(Self {
            core: core.finish()?,
            probes,
        })
    }

    /// Receptacle numbers of the mapped probes.
    pub fn receptacles(&self) -> Vec<&str> {
        self.probes.iter().map(|(r, _)| r.as_str()).collect()
    }
}

fn dataset_name(receptacle: &str, probe_name: &str) -> String {
    format!("XY[{receptacle}]: {probe_name}")
}

/// Pair of attributes combined into a 3-vector with a fixed third element.
fn attr_vector(
    core: &mut MapperCore,
    group: &Group,
    attrs: [&str; 2],
    third: Value,
    ml_name: &str,
) -> Result<Value, MappingError> {
    let first = group.attr(attrs[0]).map_err(|err| core.fail(err.to_string()))?;
    let second = group.attr(attrs[1]).map_err(|err| core.fail(err.to_string()))?;
    match (first, second) {
        (Some(a), Some(b)) => Ok(json!([a.to_json(), b.to_json(), third])),
        _ => {
            core.warn(
                DiagnosticKind::MissingAttribute,
                format!(
                    "Motion list attributes '{}' and/or '{}' not found for ML '{ml_name}'",
                    attrs[0], attrs[1]
                ),
            );
            Ok(json!([null, null, null]))
        }
    }
}

fn analyze_motion_list(
    core: &mut MapperCore,
    group_name: &str,
    ml_name: &str,
) -> Result<Map<String, Value>, MappingError> {
    let ml_group = core.subgroup(group_name)?;
    let mut meta = Map::new();
    meta.insert("group name".into(), json!(group_name));
    meta.insert("group path".into(), json!(ml_group.path()));

    let context = format!("ML '{ml_name}'");
    if let Some(attr_name) = core.optional_attr(&ml_group, "Motion list", &context)? {
        if attr_name.as_str() != Some(ml_name) {
            core.warn(
                DiagnosticKind::AttributeMismatch,
                format!(
                    "Discovered motion list name '{ml_name}' does not match the name defined in attributes '{attr_name}', using discovered name"
                ),
            );
        }
    }

    for (key, attr) in [
        ("created date", "Created date"),
        ("data motion count", "Data motion count"),
        ("motion count", "Motion count"),
    ] {
        let value = core.optional_attr(&ml_group, attr, &context)?;
        meta.insert(key.into(), value.map_or(Value::Null, |v| v.to_json()));
    }

    let delta = attr_vector(core, &ml_group, ["Delta x", "Delta y"], json!(0.0), ml_name)?;
    meta.insert("delta".into(), delta);
    let center = attr_vector(core, &ml_group, ["Grid center x", "Grid center y"], json!(0.0), ml_name)?;
    meta.insert("center".into(), center);
    let npoints = attr_vector(core, &ml_group, ["Nx", "Ny"], json!(1), ml_name)?;
    meta.insert("npoints".into(), npoints);

    Ok(meta)
}

fn analyze_probe_list(core: &mut MapperCore, group_name: &str) -> Result<Option<ProbeList>, MappingError> {
    let Some(caps) = PROBE_LIST_RE.captures(group_name) else {
        return Ok(None);
    };
    let (Some(rnum), Some(name)) = (caps.name("RNUM"), caps.name("NAME")) else {
        return Ok(None);
    };
    let probe_name = name.as_str().to_string();
    let Ok(receptacle) = rnum.as_str().parse::<u32>() else {
        core.warn(
            DiagnosticKind::MissingSubgroup,
            format!("{group_name}: receptacle number '{}' is out of range", rnum.as_str()),
        );
        return Ok(None);
    };

    let pl_group = core.subgroup(group_name)?;
    let mut meta = Map::new();
    meta.insert("group name".into(), json!(group_name));
    meta.insert("group path".into(), json!(pl_group.path()));
    meta.insert("probe name".into(), json!(probe_name));

    let context = format!("probe list '{group_name}'");
    if let Some(attr_name) = core.optional_attr(&pl_group, "Probe", &context)? {
        if attr_name.as_str() != Some(probe_name.as_str()) {
            core.warn(
                DiagnosticKind::AttributeMismatch,
                format!(
                    "{group_name}: Discovered probe list name '{probe_name}' does not match the name defined in attributes '{attr_name}', using discovered name"
                ),
            );
        }
    }

    meta.insert("receptacle".into(), json!(receptacle));
    if let Some(attr_rnum) = core.optional_attr(&pl_group, "Receptacle", &context)? {
        if attr_rnum.as_i64() != Some(i64::from(receptacle)) {
            core.warn(
                DiagnosticKind::AttributeMismatch,
                format!(
                    "{group_name}: Discovered receptacle number '{receptacle}' does not match the number defined in attributes '{attr_rnum}', using discovered number"
                ),
            );
        }
    }

    for (key, attr) in PROBE_LIST_ATTRS {
        let value = core.optional_attr(&pl_group, attr, &context)?;
        meta.insert(key.into(), value.map_or(Value::Null, |v| v.to_json()));
    }

    Ok(Some(ProbeList {
        probe_name,
        receptacle,
        meta,
    }))
}

impl ControlMapper for SixKMapper {
    fn core(&self) -> &MapperCore {
        &self.core
    }

    /// `args[0]` selects the receptacle; it may be omitted when only one
    /// probe is mapped.
    fn construct_dataset_name(&self, args: &[&str]) -> Result<String, MappingError> {
        let selected = match args.first() {
            Some(receptacle) => self.probes.iter().find(|(r, _)| r == receptacle),
            None if self.probes.len() == 1 => self.probes.first(),
            None => None,
        };
        match selected {
            Some((receptacle, probe_name)) => Ok(dataset_name(receptacle, probe_name)),
            None => Err(MappingError::new(
                self.device_name(),
                format!(
                    "A valid receptacle number needs to be passed: {:?}",
                    self.receptacles()
                ),
            )),
        }
    }
}
