//! Mapper for the `Waveform` function generator.

use super::command_list::{self, CommandListLayout, RUN_TIME_LIST};
use super::{CommandListMapper, ControlMapper, MapperCore};
use crate::container::Group;
use crate::error::MappingError;
use crate::parser::PatternSet;
use crate::schema::ConType;

/// Layout of the `Waveform` device group.
///
/// ```text
/// +-- Waveform
/// |   +-- Run time list
/// |   +-- waveform_<descr>
/// ```
pub const LAYOUT: CommandListLayout = CommandListLayout {
    contype: ConType::Waveform,
    command_list_attr: "Waveform command list",
    meta_attrs: &[
        ("IP address", "IP address"),
        ("generator device", "Generator type"),
        ("GPIB address", "GPIB address"),
        ("initial state", "Initial state"),
    ],
    default_patterns: &[
        r"(?P<FREQ>(\bFREQ\s)(?P<VALUE>(\d+\.\d*|\.\d+|\d+\b)))",
        r"(?P<VOLT>(\bVOLT\s)(?P<VALUE>(\d+\.\d*|\.\d+|\d+\b)))",
    ],
};

/// Maps the `Waveform` group.
#[derive(Debug, Clone)]
pub struct WaveformMapper {
    core: MapperCore,
}

impl WaveformMapper {
    /// Map the `Waveform` device group.
    pub fn new(group: Group) -> Result<Self, MappingError> {
        Ok(Self {
            core: command_list::build(group, &LAYOUT)?,
        })
    }
}

impl ControlMapper for WaveformMapper {
    fn core(&self) -> &MapperCore {
        &self.core
    }

    fn construct_dataset_name(&self, _args: &[&str]) -> Result<String, MappingError> {
        Ok(RUN_TIME_LIST.to_string())
    }

    fn as_command_list(&self) -> Option<&dyn CommandListMapper> {
        Some(self)
    }

    fn as_command_list_mut(&mut self) -> Option<&mut dyn CommandListMapper> {
        Some(self)
    }
}

impl CommandListMapper for WaveformMapper {
    fn core_mut(&mut self) -> &mut MapperCore {
        &mut self.core
    }

    fn default_patterns(&self) -> PatternSet {
        LAYOUT.default_patterns()
    }
}
