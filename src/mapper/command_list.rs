//! Building blocks shared by command list device mappers.
//!
//! Command list devices share one layout:
//!
//! ```text
//! +-- <device>
//! |   +-- Run time list          (dataset: Shot number, Command index, ...)
//! |   +-- <configuration group>  (attributes, incl. the command list)
//! |   +-- <configuration group>
//! ```
//!
//! Every sub-group is a configuration. They differ only in the name of the
//! command list attribute, the metadata attributes they carry and their
//! default patterns, which is what [`CommandListLayout`] captures.

use super::MapperCore;
use crate::container::{AttrValue, Group};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{MappingError, PatternError};
use crate::parser::{CommandList, CommandListParser, PatternSet};
use crate::schema::{
    default_command_state_values, state_values_from_columns, ConType, Configuration, StateValues,
    COMMAND_INDEX_FIELD,
};

/// Dataset holding the per-shot records of command list devices.
pub const RUN_TIME_LIST: &str = "Run time list";

/// Static description of a command list device.
#[derive(Debug, Clone, Copy)]
pub struct CommandListLayout {
    /// Device type.
    pub contype: ConType,
    /// Attribute holding the newline separated command list.
    pub command_list_attr: &'static str,
    /// Optional attributes copied into the configuration metadata, as
    /// `(meta key, attribute name)` pairs.
    pub meta_attrs: &'static [(&'static str, &'static str)],
    /// Patterns applied when the device is mapped.
    pub default_patterns: &'static [&'static str],
}

impl CommandListLayout {
    /// The default patterns as a deduplicated set.
    pub fn default_patterns(&self) -> PatternSet {
        PatternSet::new(self.default_patterns.iter().copied())
    }
}

/// Read a command list attribute: either one newline separated string or an
/// array of strings.
fn read_command_list(value: &AttrValue) -> Option<CommandList> {
    match value {
        AttrValue::Str(text) => Some(CommandList::from_multiline(text)),
        AttrValue::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(|s| s.trim().to_string()))
            .collect::<Option<Vec<_>>>()
            .map(CommandList::from),
        _ => None,
    }
}

/// Build the configurations of a command list device.
pub(crate) fn build(group: Group, layout: &CommandListLayout) -> Result<MapperCore, MappingError> {
    let mut core = MapperCore::new(group, layout.contype)?;
    if core.subgroup_names().is_empty() {
        return Err(core.fail("has no mappable configurations"));
    }

    let patterns = layout.default_patterns();
    for name in core.subgroup_names().to_vec() {
        let dset = core.dataset(RUN_TIME_LIST).map_err(|_| {
            core.fail(format!(
                "Dataset '{RUN_TIME_LIST}' not found for configuration group '{name}'"
            ))
        })?;
        let config_group = core.subgroup(&name)?;
        let context = format!(
            "control device '{}' configuration group '{name}'",
            core.device_name()
        );

        let mut meta = Vec::with_capacity(layout.meta_attrs.len());
        for (key, attr) in layout.meta_attrs {
            let value = core.optional_attr(&config_group, attr, &context)?;
            meta.push((*key, value.map_or(serde_json::Value::Null, |v| v.to_json())));
        }

        let raw = config_group
            .attr(layout.command_list_attr)
            .map_err(|err| core.fail(err.to_string()))?
            .ok_or_else(|| {
                core.fail(format!(
                    "Attribute '{}' not found for configuration group '{name}'",
                    layout.command_list_attr
                ))
            })?;
        let command_list = read_command_list(&raw).ok_or_else(|| {
            core.fail(format!(
                "Attribute '{}' of configuration group '{name}' is not text",
                layout.command_list_attr
            ))
        })?;

        let shotnum = core.shot_number(&dset)?;
        let mut config = Configuration::new(&name, vec![dset.path().to_string()], shotnum)
            .with_command_list(command_list);
        for (key, value) in meta {
            config.set_meta(key, value);
        }

        // parse anomalies of the default patterns are expected, keep them quiet
        let mut quiet = Diagnostics::muted();
        let derived = construct_state_values(core.group(), &config, &patterns, &mut quiet)
            .map_err(|err| core.fail(format!("invalid default pattern: {err}")))?;
        config.state_values = match (derived, config.command_list.as_ref()) {
            (Some(svs), _) => svs,
            (None, Some(cl)) => default_command_state_values(cl, &config.dset_paths),
            (None, None) => StateValues::new(),
        };

        core.push_config(config)?;
    }

    core.finish()
}

/// Apply `patterns` to the command list of `config`.
///
/// Patterns are validated before anything else. Returns `Ok(None)` when the
/// configuration dataset has no integer scalar `"Command index"` field, or
/// when parsing is unsuccessful.
pub fn construct_state_values(
    group: &Group,
    config: &Configuration,
    patterns: &PatternSet,
    diagnostics: &mut Diagnostics,
) -> Result<Option<StateValues>, PatternError> {
    let compiled = patterns.compile()?;

    let (Some(command_list), Some(dset_path)) = (config.command_list.as_ref(), config.dset_paths.first())
    else {
        return Ok(None);
    };

    let fields = match group.container().dataset_fields(dset_path) {
        Ok(fields) => fields.unwrap_or_default(),
        Err(err) => {
            diagnostics.push(DiagnosticKind::MissingField, group.name(), err.to_string());
            return Ok(None);
        }
    };
    match fields.iter().find(|f| f.name == COMMAND_INDEX_FIELD) {
        None => {
            diagnostics.push(
                DiagnosticKind::MissingField,
                group.name(),
                format!("Dataset '{dset_path}' does NOT have '{COMMAND_INDEX_FIELD}' field"),
            );
            return Ok(None);
        }
        Some(field) if !field.is_scalar() || !field.dtype.is_integer() => {
            diagnostics.push(
                DiagnosticKind::MissingField,
                group.name(),
                format!("Dataset '{dset_path}' '{COMMAND_INDEX_FIELD}' field is NOT a column of integers"),
            );
            return Ok(None);
        }
        Some(_) => {}
    }

    let child = if diagnostics.is_muted() {
        Diagnostics::muted()
    } else {
        Diagnostics::new()
    };
    let outcome = CommandListParser::new(command_list.clone()).apply_compiled(compiled, child);
    let (success, columns, parse_diagnostics) = outcome.into_parts();
    diagnostics.extend(parse_diagnostics);

    if !success {
        return Ok(None);
    }
    Ok(Some(state_values_from_columns(&columns, &config.dset_paths)))
}
