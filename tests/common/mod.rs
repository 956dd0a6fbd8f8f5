//! Container fixtures shared by the integration tests.
#![allow(dead_code)]

use daq_control_map::container::{FieldInfo, Group, MemoryContainer};
use daq_control_map::dtype::DType;

pub const RAW: &str = "/Raw data + config";

pub const WAVEFORM_CL: &str = "FREQ 50000.0\nFREQ 60000.0\nFREQ 70000.0\nFREQ 80000.0";
pub const N5700_CL: &str = "SOURCE:VOLTAGE:LEVEL 10.0\nSOURCE:VOLTAGE:LEVEL 20.0\nSOURCE:VOLTAGE:LEVEL 30.0";

pub fn path(parts: &[&str]) -> String {
    let mut out = RAW.to_string();
    for p in parts {
        out.push('/');
        out.push_str(p);
    }
    out
}

pub fn run_time_list_fields() -> Vec<FieldInfo> {
    vec![
        FieldInfo::scalar("Shot number", DType::Int32),
        FieldInfo::scalar("Configuration name", DType::FixedStr(120)),
        FieldInfo::scalar("Command index", DType::Int32),
    ]
}

/// `Waveform` group with one configuration per entry of `configs`.
pub fn add_waveform(mem: &mut MemoryContainer, configs: &[(&str, &str)]) {
    for (name, cl) in configs {
        let group = path(&["Waveform", name]);
        mem.set_attr(&group, "Waveform command list", *cl)
            .set_attr(&group, "IP address", "192.168.7.3")
            .set_attr(&group, "Generator type", "Agilent 33220A")
            .set_attr(&group, "GPIB address", 10)
            .set_attr(&group, "Initial state", "OUTP ON");
    }
    mem.add_dataset(&path(&["Waveform", "Run time list"]), run_time_list_fields());
}

/// `N5700_PS` group with one configuration per entry of `configs`.
pub fn add_n5700(mem: &mut MemoryContainer, configs: &[(&str, &str)]) {
    for (name, cl) in configs {
        let group = path(&["N5700_PS", name]);
        mem.set_attr(&group, "N5700 power supply command list", *cl)
            .set_attr(&group, "IP address", "192.168.7.4")
            .set_attr(&group, "Model Number", "N5751A")
            .set_attr(&group, "Initialization commands", "*RST");
    }
    mem.add_dataset(&path(&["N5700_PS", "Run time list"]), run_time_list_fields());
}

/// `NI_XYZ` group with a single motion list and the listed position fields.
pub fn add_nixyz(mem: &mut MemoryContainer, axes: &[&str]) {
    let ml = path(&["NI_XYZ", "ml-0001"]);
    for attr in ["Nx", "Ny", "Nz"] {
        mem.set_attr(&ml, attr, 3);
    }
    for attr in ["dx", "dy", "dz", "x0", "y0", "z0"] {
        mem.set_attr(&ml, attr, 0.5);
    }
    mem.set_attr(&ml, "fan_XYZ", "TRUE")
        .set_attr(&ml, "max_ydrive_steps", 1000)
        .set_attr(&ml, "min_ydrive_steps", -1000)
        .set_attr(&ml, "max_zdrive_steps", 1000)
        .set_attr(&ml, "min_zdrive_steps", -1000)
        .set_attr(&ml, "z_port", 25);

    let mut fields = vec![FieldInfo::scalar("Shot number", DType::Int32)];
    for axis in axes {
        fields.push(FieldInfo::scalar(*axis, DType::Float64));
    }
    mem.add_dataset(&path(&["NI_XYZ", "Run time list"]), fields);
}

/// `6K Compumotor` group with one motion list and one probe per
/// `(receptacle, probe name)`.
pub fn add_sixk(mem: &mut MemoryContainer, probes: &[(u32, &str)]) {
    let ml = path(&["6K Compumotor", "Motion list: grid_a"]);
    mem.set_attr(&ml, "Motion list", "grid_a")
        .set_attr(&ml, "Created date", "8/14/2018 11:32:15 AM")
        .set_attr(&ml, "Data motion count", 11)
        .set_attr(&ml, "Motion count", 11)
        .set_attr(&ml, "Delta x", 0.5)
        .set_attr(&ml, "Delta y", 0.5)
        .set_attr(&ml, "Grid center x", 0.0)
        .set_attr(&ml, "Grid center y", 0.0)
        .set_attr(&ml, "Nx", 11)
        .set_attr(&ml, "Ny", 1);

    for (rnum, probe) in probes {
        let pl_name = format!("Probe: XY[{rnum}]: {probe}");
        let pl = path(&["6K Compumotor", pl_name.as_str()]);
        mem.set_attr(&pl, "Probe", *probe)
            .set_attr(&pl, "Receptacle", i64::from(*rnum))
            .set_attr(&pl, "Calibration", "")
            .set_attr(&pl, "Level sy (cm)", 70.0)
            .set_attr(&pl, "Port", 27)
            .set_attr(&pl, "Probe channels", "")
            .set_attr(&pl, "Probe type", "LaPD probe")
            .set_attr(&pl, "Unnamed", "")
            .set_attr(&pl, "sx at end (cm)", 0.0)
            .set_attr(&pl, "z", 0.0);
        let dset_name = format!("XY[{rnum}]: {probe}");
        mem.add_dataset(
            &path(&["6K Compumotor", dset_name.as_str()]),
            vec![
                FieldInfo::scalar("Shot number", DType::Int32),
                FieldInfo::scalar("x", DType::Float64),
                FieldInfo::scalar("y", DType::Float64),
                FieldInfo::scalar("z", DType::Float64),
                FieldInfo::scalar("theta", DType::Float64),
                FieldInfo::scalar("phi", DType::Float64),
                FieldInfo::scalar("Motion list", DType::FixedStr(120)),
                FieldInfo::scalar("Probe name", DType::FixedStr(120)),
            ],
        );
    }
}

/// TOML run configuration deploying `(id, motion group, drive)` triples.
pub fn run_config_toml(groups: &[(&str, &str, &str)]) -> String {
    let mut out = String::from("[run]\nname = \"test run\"\n");
    for (id, name, drive) in groups {
        out.push_str(&format!(
            "\n[run.motion_group.{id}]\nname = \"{name}\"\n\n[run.motion_group.{id}.drive]\nname = \"{drive}\"\n"
        ));
    }
    out
}

fn bmotion_position_fields(axis_dtype: DType) -> Vec<FieldInfo> {
    let mut fields = vec![
        FieldInfo::scalar("Shot number", DType::Int32),
        FieldInfo::scalar("motion_group_id", DType::Int32),
        FieldInfo::scalar("motion_group_name", DType::FixedStr(120)),
        FieldInfo::scalar("motionlist_index", DType::Int32),
    ];
    for axis in ["a0", "a1", "a2", "a3", "a4", "a5"] {
        fields.push(FieldInfo::scalar(axis, axis_dtype));
    }
    fields
}

/// The four `bmotion` datasets, without records.
pub fn add_bmotion_datasets(mem: &mut MemoryContainer) {
    mem.add_dataset(
        &path(&["bmotion", "Run time list"]),
        vec![
            FieldInfo::scalar("Shot number", DType::Int32),
            FieldInfo::scalar("Configuration name", DType::FixedStr(120)),
        ],
    )
    .add_dataset(
        &path(&["bmotion", "bmotion_axis_names"]),
        bmotion_position_fields(DType::FixedStr(120)),
    )
    .add_dataset(
        &path(&["bmotion", "bmotion_positions"]),
        bmotion_position_fields(DType::Float64),
    )
    .add_dataset(
        &path(&["bmotion", "bmotion_target_positions"]),
        bmotion_position_fields(DType::Float64),
    );
}

/// Run configuration group `name` deploying `(id, motion group, drive)`.
pub fn add_run_config(mem: &mut MemoryContainer, name: &str, groups: &[(&str, &str, &str)]) {
    let group = path(&["bmotion", name]);
    mem.set_attr(&group, "RUN_CONFIG", run_config_toml(groups))
        .set_attr(&group, "BAPSF_MOTION_VERSION", "0.2.0");
}

/// Records of `Run time list` as `(shot, run configuration)` and of
/// `bmotion_axis_names` as `(shot, motion group, axis names)`.
pub fn set_bmotion_records(
    mem: &mut MemoryContainer,
    run_time_list: &[(i32, &str)],
    axis_names: &[(i32, &str, [&str; 6])],
) {
    let rtl = path(&["bmotion", "Run time list"]);
    mem.set_records(&rtl, "Shot number", run_time_list.iter().map(|(shot, _)| *shot))
        .set_records(&rtl, "Configuration name", run_time_list.iter().map(|(_, name)| *name));

    let ban = path(&["bmotion", "bmotion_axis_names"]);
    mem.set_records(&ban, "Shot number", axis_names.iter().map(|(shot, _, _)| *shot))
        .set_records(&ban, "motion_group_name", axis_names.iter().map(|(_, mg, _)| *mg));
    for (col, axis) in ["a0", "a1", "a2", "a3", "a4", "a5"].iter().enumerate() {
        mem.set_records(&ban, axis, axis_names.iter().map(|(_, _, names)| names[col]));
    }
}

/// `bmotion` group with run configuration `run_a` deploying the planar
/// `hera_mg` (drive `Hera`) and the 3D `zeus_mg` (drive `Zeus`) with a
/// rotation axis.
pub fn add_bmotion(mem: &mut MemoryContainer) {
    add_bmotion_datasets(mem);
    add_run_config(mem, "run_a", &[("0", "hera_mg", "Hera"), ("1", "zeus_mg", "Zeus")]);
    set_bmotion_records(
        mem,
        &[(1, "run_a"), (2, "run_a")],
        &[
            (1, "hera_mg", ["X", "Y", "", "", "", ""]),
            (1, "zeus_mg", ["x", "y", "z", "theta", "", ""]),
            (2, "hera_mg", ["X", "Y", "", "", "", ""]),
            (2, "zeus_mg", ["x", "y", "z", "theta", "", ""]),
        ],
    );
}

/// A container with every supported device.
pub fn full_container() -> MemoryContainer {
    let mut mem = MemoryContainer::new();
    add_waveform(&mut mem, &[("waveform_50to80kHz", WAVEFORM_CL)]);
    add_n5700(&mut mem, &[("nsconf_10to30V", N5700_CL)]);
    add_nixyz(&mut mem, &["x", "y", "z"]);
    add_sixk(&mut mem, &[(1, "probe_a")]);
    add_bmotion(&mut mem);
    mem
}

pub fn device_group(mem: MemoryContainer, device: &str) -> Group {
    Group::open(mem.into_shared(), &path(&[device])).unwrap()
}

pub fn raw_group(mem: MemoryContainer) -> Group {
    Group::open(mem.into_shared(), RAW).unwrap()
}
