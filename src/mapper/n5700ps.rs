//! Mapper for the `N5700_PS` programmable power supply.

use super::command_list::{self, CommandListLayout, RUN_TIME_LIST};
use super::{CommandListMapper, ControlMapper, MapperCore};
use crate::container::Group;
use crate::error::MappingError;
use crate::parser::PatternSet;
use crate::schema::ConType;

/// Layout of the `N5700_PS` device group; same shape as `Waveform`.
pub const LAYOUT: CommandListLayout = CommandListLayout {
    contype: ConType::Power,
    command_list_attr: "N5700 power supply command list",
    meta_attrs: &[
        ("IP address", "IP address"),
        ("power supply device", "Model Number"),
        ("initial state", "Initialization commands"),
    ],
    default_patterns: &[r"(?P<VOLT>(\bSOURCE:VOLTAGE:LEVEL\s)(?P<VALUE>(\d+\.\d*|\.\d+|\d+\b)))"],
};

/// Maps the `N5700_PS` group.
#[derive(Debug, Clone)]
pub struct N5700PsMapper {
    core: MapperCore,
}

impl N5700PsMapper {
    /// Map the `N5700_PS` device group.
    pub fn new(group: Group) -> Result<Self, MappingError> {
        Ok(Self {
            core: command_list::build(group, &LAYOUT)?,
        })
    }
}

impl ControlMapper for N5700PsMapper {
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

impl CommandListMapper for N5700PsMapper {
    fn core_mut(&mut self) -> &mut MapperCore {
        &mut self.core
    }

    fn default_patterns(&self) -> PatternSet {
        LAYOUT.default_patterns()
    }
}
