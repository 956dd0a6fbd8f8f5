//! Building the device maps of every supported control device.

mod common;

use common::*;
use daq_control_map::container::{FieldInfo, MemoryContainer};
use daq_control_map::dtype::DType;
use daq_control_map::error::MapError;
use daq_control_map::mapper::{
    BMotionMapper, N5700PsMapper, NiXyzMapper, SixKMapper, WaveformMapper,
};
use daq_control_map::parser::{ColumnValue, PatternSet};
use daq_control_map::schema::{ConType, DEFAULT_COMMAND_KEY, XYZ};
use daq_control_map::{CommandListMapper, ControlMapper, DiagnosticKind, MappingError};

const AMP: &str = r"(?P<AMP>(\bAMP\s)(?P<VALUE>(\d+\.\d*|\.\d+|\d+\b)))";

fn waveform() -> WaveformMapper {
    let mut mem = MemoryContainer::new();
    add_waveform(&mut mem, &[("waveform_50to80kHz", WAVEFORM_CL)]);
    WaveformMapper::new(device_group(mem, "Waveform")).unwrap()
}

// =============================================================================
// Waveform
// =============================================================================

#[test]
fn waveform_maps_frequency_column() {
    let mapper = waveform();
    assert_eq!(mapper.contype(), ConType::Waveform);
    assert_eq!(mapper.device_map().names(), vec!["waveform_50to80kHz"]);
    assert!(mapper.has_command_list());

    let config = mapper.device_map().get("waveform_50to80kHz").unwrap();
    assert_eq!(config.dset_paths, vec![path(&["Waveform", "Run time list"])]);
    assert_eq!(config.shotnum.dset_field, vec!["Shot number"]);
    assert_eq!(config.shotnum.dtype, DType::Int32);
    assert_eq!(config.meta["IP address"], "192.168.7.3");
    assert_eq!(config.meta["generator device"], "Agilent 33220A");
    assert_eq!(config.meta["GPIB address"], 10);

    let keys: Vec<&str> = config.state_values.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["FREQ"]);
    let freq = &config.state_values["FREQ"];
    assert_eq!(freq.dset_field, vec!["Command index"]);
    assert_eq!(freq.dtype, DType::Float64);
    let link = freq.command_list.as_ref().unwrap();
    assert_eq!(
        link.values,
        vec![
            ColumnValue::Float(50000.0),
            ColumnValue::Float(60000.0),
            ColumnValue::Float(70000.0),
            ColumnValue::Float(80000.0),
        ]
    );
    assert!(link.re_pattern.is_some());
    assert!(mapper.device_map().validate().is_ok());
}

#[test]
fn waveform_configs_follow_group_order() {
    let mut mem = MemoryContainer::new();
    add_waveform(
        &mut mem,
        &[("waveform_b", WAVEFORM_CL), ("waveform_a", "VOLT 1.0\nVOLT 2.0")],
    );
    let mapper = WaveformMapper::new(device_group(mem, "Waveform")).unwrap();
    assert_eq!(mapper.device_map().names(), vec!["waveform_a", "waveform_b"]);
    assert!(mapper
        .device_map()
        .get("waveform_a")
        .unwrap()
        .state_values
        .contains_key("VOLT"));
    assert!(!mapper.one_config_per_dset());
}

#[test]
fn waveform_missing_optional_attribute_is_a_diagnostic() {
    let mut mem = MemoryContainer::new();
    add_waveform(&mut mem, &[("waveform_a", WAVEFORM_CL)]);
    mem.remove_attr(&path(&["Waveform", "waveform_a"]), "GPIB address");

    let mapper = WaveformMapper::new(device_group(mem, "Waveform")).unwrap();
    let config = mapper.device_map().get("waveform_a").unwrap();
    assert!(config.meta["GPIB address"].is_null());
    assert_eq!(
        mapper
            .diagnostics()
            .of_kind(DiagnosticKind::MissingAttribute)
            .count(),
        1
    );
    assert!(mapper.diagnostics().contains("GPIB address"));
}

#[test]
fn waveform_missing_command_list_is_fatal() {
    let mut mem = MemoryContainer::new();
    add_waveform(&mut mem, &[("waveform_a", WAVEFORM_CL)]);
    mem.remove_attr(&path(&["Waveform", "waveform_a"]), "Waveform command list");

    let err = WaveformMapper::new(device_group(mem, "Waveform")).unwrap_err();
    assert_eq!(err.device_name, "Waveform");
    assert!(err.reason.contains("Waveform command list"));
}

#[test]
fn waveform_missing_run_time_list_is_fatal() {
    let mut mem = MemoryContainer::new();
    add_waveform(&mut mem, &[("waveform_a", WAVEFORM_CL)]);
    mem.remove(&path(&["Waveform", "Run time list"]));

    let err = WaveformMapper::new(device_group(mem, "Waveform")).unwrap_err();
    assert!(err.reason.contains("Run time list"));
}

#[test]
fn waveform_without_configurations_is_fatal() {
    let mut mem = MemoryContainer::new();
    mem.add_dataset(&path(&["Waveform", "Run time list"]), run_time_list_fields());

    let err = WaveformMapper::new(device_group(mem, "Waveform")).unwrap_err();
    assert!(err.reason.contains("has no mappable configurations"));
    assert!(err.to_string().starts_with("'Waveform' mapping failed"));
}

#[test]
fn missing_command_index_keeps_raw_command_list() {
    let mut mem = MemoryContainer::new();
    add_waveform(&mut mem, &[("waveform_a", WAVEFORM_CL)]);
    mem.add_dataset(
        &path(&["Waveform", "Run time list"]),
        vec![FieldInfo::scalar("Shot number", DType::Int32)],
    );

    let mapper = WaveformMapper::new(device_group(mem, "Waveform")).unwrap();
    let config = mapper.device_map().get("waveform_a").unwrap();
    let keys: Vec<&str> = config.state_values.keys().map(String::as_str).collect();
    assert_eq!(keys, vec![DEFAULT_COMMAND_KEY]);
    let link = config.state_values[DEFAULT_COMMAND_KEY]
        .command_list
        .as_ref()
        .unwrap();
    assert!(link.re_pattern.is_none());
    assert_eq!(link.cl_str.len(), 4);
}

// =============================================================================
// Re-deriving state values
// =============================================================================

#[test]
fn reset_state_values_switches_between_default_and_parsed() {
    let mut mapper = waveform();
    let name = "waveform_50to80kHz";

    mapper.reset_state_values(name, false).unwrap();
    let config = mapper.device_map().get(name).unwrap();
    assert!(config.state_values.contains_key(DEFAULT_COMMAND_KEY));
    assert_eq!(config.state_values.len(), 1);

    mapper.reset_state_values(name, true).unwrap();
    let config = mapper.device_map().get(name).unwrap();
    assert!(config.state_values.contains_key("FREQ"));
    assert!(!config.state_values.contains_key(DEFAULT_COMMAND_KEY));
}

#[test]
fn unsuccessful_parse_falls_back_to_default() {
    let mut mapper = waveform();
    let name = "waveform_50to80kHz";

    mapper.set_state_values(name, PatternSet::from(AMP)).unwrap();

    let config = mapper.device_map().get(name).unwrap();
    assert!(config.state_values.contains_key(DEFAULT_COMMAND_KEY));
    assert!(mapper
        .diagnostics()
        .of_kind(DiagnosticKind::UnsuccessfulParse)
        .any(|d| d.source == name && d.message.contains("was unsuccessful")));
}

#[test]
fn invalid_patterns_leave_state_values_untouched() {
    let mut mapper = waveform();
    let name = "waveform_50to80kHz";
    let before = mapper.device_map().get(name).unwrap().state_values.clone();

    let err = mapper
        .set_state_values(name, PatternSet::from(r"(?P<AMP>AMP)"))
        .unwrap_err();
    assert!(matches!(err, MapError::Pattern(_)));
    assert_eq!(mapper.device_map().get(name).unwrap().state_values, before);
}

#[test]
fn unknown_configuration_is_an_error() {
    let mut mapper = waveform();
    assert!(matches!(
        mapper.set_state_values("nope", PatternSet::from(AMP)),
        Err(MapError::UnknownConfiguration(_))
    ));
    assert!(mapper.get_config_id("nope").is_err());
    assert_eq!(mapper.get_config_id("waveform_50to80kHz").unwrap(), "waveform_50to80kHz");
}

#[test]
fn try_patterns_renders_command_list() {
    let mapper = waveform();
    let table = mapper
        .try_patterns("waveform_50to80kHz", mapper.default_patterns())
        .unwrap();
    assert_eq!(table.lines().count(), 6);
    assert!(table.contains("FREQ 80000.0"));
}

#[test]
fn command_list_view_through_trait_object() {
    let mut mapper: Box<dyn ControlMapper> = Box::new(waveform());
    assert!(mapper.as_command_list().is_some());
    let cl = mapper.as_command_list_mut().unwrap();
    let parser = cl.clparse("waveform_50to80kHz").unwrap();
    assert_eq!(parser.command_list().len(), 4);
}

// =============================================================================
// N5700_PS
// =============================================================================

#[test]
fn n5700_maps_voltage_column() {
    let mut mem = MemoryContainer::new();
    add_n5700(&mut mem, &[("nsconf_10to30V", N5700_CL)]);
    let mapper = N5700PsMapper::new(device_group(mem, "N5700_PS")).unwrap();

    assert_eq!(mapper.contype(), ConType::Power);
    assert_eq!(mapper.construct_dataset_name(&[]).unwrap(), "Run time list");

    let config = mapper.device_map().get("nsconf_10to30V").unwrap();
    assert_eq!(config.meta["power supply device"], "N5751A");
    assert_eq!(config.meta["initial state"], "*RST");
    let volt = config.state_values["VOLT"].command_list.as_ref().unwrap();
    let values: Vec<f64> = volt.values.iter().filter_map(ColumnValue::as_f64).collect();
    assert_eq!(values, vec![10.0, 20.0, 30.0]);
}

#[test]
fn n5700_missing_command_list_is_fatal() {
    let mut mem = MemoryContainer::new();
    add_n5700(&mut mem, &[("nsconf_a", N5700_CL)]);
    mem.remove_attr(&path(&["N5700_PS", "nsconf_a"]), "N5700 power supply command list");
    let err = N5700PsMapper::new(device_group(mem, "N5700_PS")).unwrap_err();
    assert_eq!(err.device_name, "N5700_PS");
}

// =============================================================================
// NI_XYZ
// =============================================================================

#[test]
fn nixyz_maps_position_vector() {
    let mut mem = MemoryContainer::new();
    add_nixyz(&mut mem, &["x", "y", "z"]);
    let mapper = NiXyzMapper::new(device_group(mem, "NI_XYZ")).unwrap();

    assert_eq!(mapper.contype(), ConType::Motion);
    assert!(!mapper.has_command_list());
    let config = mapper.device_map().get("config01").unwrap();
    let xyz = &config.state_values[XYZ];
    assert_eq!(xyz.dset_field, vec!["x", "y", "z"]);
    assert_eq!(xyz.shape, vec![3]);
    assert_eq!(xyz.dtype, DType::Float64);

    let ml = &config.meta["motion lists"]["ml-0001"];
    assert_eq!(ml["fan_XYZ"], true);
    assert_eq!(ml["port"], 25);
    assert_eq!(config.meta["Lpp"]["unit"], "cm");
    assert!(mapper.diagnostics().is_empty());
}

#[test]
fn nixyz_missing_axis_leaves_slot_empty() {
    let mut mem = MemoryContainer::new();
    add_nixyz(&mut mem, &["x", "z"]);
    let mapper = NiXyzMapper::new(device_group(mem, "NI_XYZ")).unwrap();

    let xyz = &mapper.device_map().get("config01").unwrap().state_values[XYZ];
    assert_eq!(xyz.dset_field, vec!["x", "", "z"]);
    assert_eq!(
        mapper
            .diagnostics()
            .of_kind(DiagnosticKind::MissingField)
            .count(),
        1
    );
}

#[test]
fn nixyz_without_any_axis_is_fatal() {
    let mut mem = MemoryContainer::new();
    add_nixyz(&mut mem, &[]);
    let err = NiXyzMapper::new(device_group(mem, "NI_XYZ")).unwrap_err();
    assert!(err.reason.contains("missing fields"));
}

#[test]
fn nixyz_missing_motion_list_attributes_are_null() {
    let mut mem = MemoryContainer::new();
    add_nixyz(&mut mem, &["x", "y", "z"]);
    mem.remove_attr(&path(&["NI_XYZ", "ml-0001"]), "z_port");
    let mapper = NiXyzMapper::new(device_group(mem, "NI_XYZ")).unwrap();

    let config = mapper.device_map().get("config01").unwrap();
    assert!(config.meta["motion lists"]["ml-0001"]["port"].is_null());
    assert!(mapper.diagnostics().contains("z_port"));
}

// =============================================================================
// 6K Compumotor
// =============================================================================

#[test]
fn sixk_maps_one_configuration_per_receptacle() {
    let mut mem = MemoryContainer::new();
    add_sixk(&mut mem, &[(1, "probe_a"), (3, "probe_b")]);
    let mapper = SixKMapper::new(device_group(mem, "6K Compumotor")).unwrap();

    assert_eq!(mapper.device_map().names(), vec!["1", "3"]);
    assert_eq!(mapper.receptacles(), vec!["1", "3"]);
    assert!(mapper.one_config_per_dset());

    let config = mapper.device_map().get("3").unwrap();
    assert_eq!(
        config.dset_paths,
        vec![path(&["6K Compumotor", "XY[3]: probe_b"])]
    );
    assert_eq!(config.state_values[XYZ].dset_field, vec!["x", "y", "z"]);
    assert_eq!(config.state_values["ptip_rot_theta"].dset_field, vec!["theta"]);
    assert_eq!(config.state_values["ptip_rot_phi"].dset_field, vec!["phi"]);
    assert_eq!(config.meta["receptacle"], 3);
    assert_eq!(config.meta["probe"]["probe name"], "probe_b");
    assert_eq!(config.meta["motion lists"]["grid_a"]["npoints"], serde_json::json!([11, 1, 1]));
}

#[test]
fn sixk_dataset_name_needs_receptacle_when_ambiguous() {
    let mut mem = MemoryContainer::new();
    add_sixk(&mut mem, &[(1, "probe_a"), (3, "probe_b")]);
    let mapper = SixKMapper::new(device_group(mem, "6K Compumotor")).unwrap();

    assert_eq!(mapper.construct_dataset_name(&["3"]).unwrap(), "XY[3]: probe_b");
    let err = mapper.construct_dataset_name(&[]).unwrap_err();
    assert!(err.reason.contains("receptacle"));
    assert!(mapper.construct_dataset_name(&["7"]).is_err());
}

#[test]
fn sixk_single_receptacle_is_the_default_dataset() {
    let mut mem = MemoryContainer::new();
    add_sixk(&mut mem, &[(2, "probe_a")]);
    let mapper = SixKMapper::new(device_group(mem, "6K Compumotor")).unwrap();
    assert_eq!(mapper.construct_dataset_name(&[]).unwrap(), "XY[2]: probe_a");
}

#[test]
fn sixk_mismatched_receptacle_name_is_a_diagnostic() {
    let mut mem = MemoryContainer::new();
    add_sixk(&mut mem, &[(1, "probe_a")]);
    mem.set_attr(&path(&["6K Compumotor", "Probe: XY[1]: probe_a"]), "Probe", "other");
    let mapper = SixKMapper::new(device_group(mem, "6K Compumotor")).unwrap();

    assert!(mapper
        .diagnostics()
        .of_kind(DiagnosticKind::AttributeMismatch)
        .any(|d| d.message.contains("probe_a")));
    let config = mapper.device_map().get("1").unwrap();
    assert_eq!(config.meta["probe"]["probe name"], "probe_a");
}

#[test]
fn sixk_without_receptacle_lists_is_fatal() {
    let mut mem = MemoryContainer::new();
    add_sixk(&mut mem, &[]);
    let err = SixKMapper::new(device_group(mem, "6K Compumotor")).unwrap_err();
    assert!(err.reason.contains("Probe List"));
}

#[test]
fn sixk_missing_receptacle_dataset_is_fatal() {
    let mut mem = MemoryContainer::new();
    add_sixk(&mut mem, &[(1, "probe_a")]);
    mem.remove(&path(&["6K Compumotor", "XY[1]: probe_a"]));
    let err = SixKMapper::new(device_group(mem, "6K Compumotor")).unwrap_err();
    assert!(err.reason.contains("could not be determined or found"));
}

#[test]
fn device_map_serializes_configs_by_name() {
    let mapper = waveform();
    let json: serde_json::Value = serde_json::from_str(&mapper.device_map().to_json().unwrap()).unwrap();
    assert_eq!(json["contype"], "waveform");
    let config = &json["configs"]["waveform_50to80kHz"];
    assert_eq!(config["shotnum"]["dtype"], "int32");
    assert_eq!(config["state values"]["FREQ"]["dset field"][0], "Command index");
    assert_eq!(config["state values"]["FREQ"]["command list"][0], 50000.0);
}

// =============================================================================
// bmotion
// =============================================================================

fn bmotion(mem: MemoryContainer) -> Result<BMotionMapper, MappingError> {
    BMotionMapper::new(device_group(mem, "bmotion"))
}

fn default_bmotion() -> BMotionMapper {
    let mut mem = MemoryContainer::new();
    add_bmotion(&mut mem);
    bmotion(mem).unwrap()
}

/// `hera_mg` deployed by both `run_a` and `run_b`, `zeus_mg` by `run_b` only.
fn shared_motion_group(hera_run_b_axes: [&str; 6]) -> MemoryContainer {
    let mut mem = MemoryContainer::new();
    add_bmotion_datasets(&mut mem);
    add_run_config(&mut mem, "run_a", &[("0", "hera_mg", "Hera")]);
    add_run_config(&mut mem, "run_b", &[("0", "hera_mg", "Hera"), ("1", "zeus_mg", "Zeus")]);
    set_bmotion_records(
        &mut mem,
        &[(1, "run_a"), (2, "run_b")],
        &[
            (1, "hera_mg", ["x", "y", "", "", "", ""]),
            (2, "hera_mg", hera_run_b_axes),
            (2, "zeus_mg", ["x", "y", "z", "", "", ""]),
        ],
    );
    mem
}

#[test]
fn bmotion_maps_one_configuration_per_motion_group() {
    let mapper = default_bmotion();
    assert_eq!(mapper.contype(), ConType::Motion);
    assert_eq!(mapper.device_map().names(), vec!["0 - hera_mg", "1 - zeus_mg"]);
    assert!(mapper.diagnostics().is_empty());
    assert!(mapper.device_map().validate().is_ok());

    let positions = path(&["bmotion", "bmotion_positions"]);
    let targets = path(&["bmotion", "bmotion_target_positions"]);

    let hera = mapper.device_map().get("0 - hera_mg").unwrap();
    assert_eq!(hera.dset_paths.len(), 4);
    assert_eq!(hera.shotnum.dset_paths, vec![path(&["bmotion", "Run time list"])]);
    assert_eq!(hera.state_values.len(), 2);
    let xyz = &hera.state_values[XYZ];
    assert_eq!(xyz.dset_field, vec!["a0", "a1", ""]);
    assert_eq!(xyz.dset_paths, vec![positions.clone()]);
    assert_eq!(xyz.config_column.as_deref(), Some("motion_group_name"));
    let target = &hera.state_values["xyz_target"];
    assert_eq!(target.dset_field, vec!["a0", "a1", ""]);
    assert_eq!(target.dset_paths, vec![targets.clone()]);

    let zeus = mapper.device_map().get("1 - zeus_mg").unwrap();
    let keys: Vec<&str> = zeus.state_values.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["theta", "theta_target", "xyz", "xyz_target"]);
    assert_eq!(zeus.state_values["xyz"].dset_field, vec!["a0", "a1", "a2"]);
    let theta = &zeus.state_values["theta_target"];
    assert_eq!(theta.dset_field, vec!["a3"]);
    assert_eq!(theta.dtype, DType::Float64);
    assert_eq!(theta.dset_paths, vec![targets]);
    assert_eq!(theta.config_column.as_deref(), Some("motion_group_name"));
}

#[test]
fn bmotion_single_run_metadata_is_lifted() {
    let mapper = default_bmotion();
    let hera = mapper.device_map().get("0 - hera_mg").unwrap();
    assert_eq!(hera.meta["MG_CONFIG"]["drive"]["name"], "Hera");
    assert_eq!(hera.meta["BAPSF_MOTION_VERSION"], "0.2.0");
    assert_eq!(hera.meta["meta"][0]["RUN_CONFIG_NAME"], "run_a");
    assert_eq!(hera.meta["meta"][0]["MG_ID"], "0");
    assert!(hera.meta["meta"][0].get("RUN_CONFIG").is_none());
}

#[test]
fn bmotion_dataset_names_by_selector() {
    let mapper = default_bmotion();
    assert_eq!(mapper.construct_dataset_name(&[]).unwrap(), "Run time list");
    assert_eq!(
        mapper.construct_dataset_name(&["axis_names"]).unwrap(),
        "bmotion_axis_names"
    );
    assert_eq!(
        mapper.construct_dataset_name(&["target_positions"]).unwrap(),
        "bmotion_target_positions"
    );
    let err = mapper.construct_dataset_name(&["velocities"]).unwrap_err();
    assert!(err.reason.contains("'velocities'"));
}

#[test]
fn bmotion_drive_names_work_as_nicknames() {
    let mapper = default_bmotion();
    assert_eq!(mapper.get_config_id("Hera").unwrap(), "0 - hera_mg");
    assert_eq!(mapper.get_config_id("1 - zeus_mg").unwrap(), "1 - zeus_mg");
    assert!(matches!(
        mapper.get_config_id("Apollo"),
        Err(MapError::UnknownConfiguration(_))
    ));

    assert_eq!(mapper.config_column_value("Zeus").unwrap().as_deref(), Some("zeus_mg"));
    assert_eq!(
        mapper.config_column_value("0 - hera_mg").unwrap().as_deref(),
        Some("hera_mg")
    );
    assert_eq!(mapper.config_name_by_drive_name("Zeus").unwrap(), "1 - zeus_mg");
    assert_eq!(mapper.config_name_by_motion_group_id("1").unwrap(), "1 - zeus_mg");
    assert_eq!(mapper.config_name_by_motion_group_name("hera_mg").unwrap(), "0 - hera_mg");
    assert!(mapper.config_name_by_motion_group_id("7").is_err());

    assert_eq!(
        waveform().config_column_value("waveform_50to80kHz").unwrap(),
        None
    );
}

#[test]
fn bmotion_run_configuration_lookup() {
    let mapper = default_bmotion();
    assert_eq!(mapper.run_config_names(), vec!["run_a"]);
    assert!(mapper
        .run_configuration(None)
        .unwrap()
        .contains("[run.motion_group.0]"));
    let document = mapper.run_configuration_document(Some("run_a")).unwrap();
    assert_eq!(document["run"]["motion_group"]["1"]["drive"]["name"], "Zeus");
    assert!(matches!(
        mapper.run_configuration(Some("run_b")),
        Err(MapError::UnknownRunConfiguration(_))
    ));
}

#[test]
fn bmotion_unused_run_configuration_is_skipped() {
    let mut mem = MemoryContainer::new();
    add_bmotion(&mut mem);
    add_run_config(&mut mem, "run_z", &[("0", "apollo_mg", "Apollo")]);
    let mapper = bmotion(mem).unwrap();

    assert_eq!(mapper.device_map().len(), 2);
    let dropped: Vec<_> = mapper
        .diagnostics()
        .of_kind(DiagnosticKind::DroppedConfiguration)
        .collect();
    assert_eq!(dropped.len(), 1);
    assert!(dropped[0].message.contains("'run_z'"));
}

#[test]
fn bmotion_motion_group_shared_by_runs_keeps_its_name() {
    let mapper = bmotion(shared_motion_group(["x", "y", "", "", "", ""])).unwrap();

    assert_eq!(mapper.device_map().names(), vec!["hera_mg", "1 - zeus_mg"]);
    assert_eq!(mapper.run_config_names(), vec!["run_a", "run_b"]);
    let hera = mapper.device_map().get("hera_mg").unwrap();
    assert_eq!(hera.meta["meta"].as_array().map(Vec::len), Some(2));
    assert!(!hera.meta.contains_key("MG_CONFIG"));
    assert_eq!(mapper.config_column_value("hera_mg").unwrap().as_deref(), Some("hera_mg"));

    assert!(matches!(
        mapper.config_name_by_motion_group_id("0"),
        Err(MapError::UnknownConfiguration(_))
    ));
    assert!(matches!(
        mapper.run_configuration(None),
        Err(MapError::AmbiguousConfiguration { .. })
    ));
}

#[test]
fn bmotion_differing_axis_names_drop_the_motion_group() {
    let mapper = bmotion(shared_motion_group(["y", "x", "", "", "", ""])).unwrap();

    assert_eq!(mapper.device_map().names(), vec!["1 - zeus_mg"]);
    assert!(mapper.diagnostics().contains("differing axis names"));
}

#[test]
fn bmotion_motion_group_without_axis_names_is_dropped() {
    let mut mem = MemoryContainer::new();
    add_bmotion(&mut mem);
    set_bmotion_records(
        &mut mem,
        &[(1, "run_a")],
        &[(1, "zeus_mg", ["x", "y", "z", "", "", ""])],
    );
    let mapper = bmotion(mem).unwrap();
    assert_eq!(mapper.device_map().names(), vec!["1 - zeus_mg"]);
    assert!(mapper.diagnostics().contains("Unable to locate the 'hera_mg'"));

    let mut mem = MemoryContainer::new();
    add_bmotion(&mut mem);
    set_bmotion_records(&mut mem, &[(1, "run_a")], &[]);
    let err = bmotion(mem).unwrap_err();
    assert!(err.reason.contains("Unable to fully map"));
}

#[test]
fn bmotion_missing_dataset_is_fatal() {
    let mut mem = MemoryContainer::new();
    add_bmotion(&mut mem);
    mem.remove(&path(&["bmotion", "bmotion_target_positions"]));
    let err = bmotion(mem).unwrap_err();
    assert_eq!(err.device_name, "bmotion");
    assert!(err.reason.contains("Missing datasets"));
    assert!(err.reason.contains("bmotion_target_positions"));
}

#[test]
fn bmotion_unexpected_dataset_is_fatal() {
    let mut mem = MemoryContainer::new();
    add_bmotion(&mut mem);
    mem.add_dataset(
        &path(&["bmotion", "bmotion_velocities"]),
        vec![FieldInfo::scalar("Shot number", DType::Int32)],
    );
    let err = bmotion(mem).unwrap_err();
    assert!(err.reason.contains("Expected 4 datasets"));
}

#[test]
fn bmotion_missing_axis_column_is_fatal() {
    let mut mem = MemoryContainer::new();
    add_bmotion(&mut mem);
    mem.add_dataset(
        &path(&["bmotion", "bmotion_positions"]),
        vec![FieldInfo::scalar("Shot number", DType::Int32)],
    );
    let err = bmotion(mem).unwrap_err();
    assert!(err.reason.contains("missing columns"));
}

#[test]
fn bmotion_invalid_run_configuration_is_fatal() {
    let mut mem = MemoryContainer::new();
    add_bmotion(&mut mem);
    mem.set_attr(&path(&["bmotion", "run_a"]), "RUN_CONFIG", "[run");
    let err = bmotion(mem).unwrap_err();
    assert!(err.reason.contains("not valid TOML"));
}
