//! Registry of control device mappers.
//!
//! [`MapperRegistry`] maps device group names to mapper constructors. Given
//! the group that holds the control devices of a container, [`build`] tries
//! every child group whose name is known and keeps the mappers that build.
//! Devices failing to map are dropped with a diagnostic; that is the normal
//! outcome for partially recorded or unusual containers.
//!
//! [`build`]: MapperRegistry::build

use crate::container::Group;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::MappingError;
use crate::mapper::{
    BMotionMapper, ControlMapper, N5700PsMapper, NiXyzMapper, SixKMapper, WaveformMapper,
};
use crate::parser::PatternSet;
use crate::schema::DeviceMap;
use crate::settings::MapSettings;
use anyhow::anyhow;
use std::collections::BTreeMap;

/// Constructor of a boxed mapper for one device group.
pub type MapperFactory = fn(Group) -> Result<Box<dyn ControlMapper>, MappingError>;

fn boxed<M, F>(build: F, group: Group) -> Result<Box<dyn ControlMapper>, MappingError>
where
    M: ControlMapper + 'static,
    F: FnOnce(Group) -> Result<M, MappingError>,
{
    Ok(Box::new(build(group)?))
}

/// Device group names and the mapper built for each.
pub struct MapperRegistry {
    factories: Vec<(String, MapperFactory)>,
    overrides: BTreeMap<String, PatternSet>,
}

impl Default for MapperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapperRegistry")
            .field("devices", &self.mappable_devices())
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MapperRegistry {
    /// Registry of every built-in device mapper.
    pub fn new() -> Self {
        let mut registry = Self {
            factories: Vec::new(),
            overrides: BTreeMap::new(),
        };
        registry.register("N5700_PS", |g| boxed(N5700PsMapper::new, g));
        registry.register("NI_XYZ", |g| boxed(NiXyzMapper::new, g));
        registry.register("6K Compumotor", |g| boxed(SixKMapper::new, g));
        registry.register("Waveform", |g| boxed(WaveformMapper::new, g));
        registry.register("bmotion", |g| boxed(BMotionMapper::new, g));
        registry
    }

    /// Registry restricted and configured by `settings`.
    pub fn from_settings(settings: &MapSettings) -> anyhow::Result<Self> {
        settings
            .validate()
            .map_err(|e| anyhow!("Invalid mapping settings: {}", e))?;

        let mut registry = Self::new();
        if let Some(devices) = &settings.devices {
            registry.retain(|name| devices.iter().any(|d| d == name));
        }
        for device in settings.patterns.keys() {
            if let Some(patterns) = settings.patterns_for(device) {
                registry.set_pattern_override(device, patterns);
            }
        }
        Ok(registry)
    }

    /// Register (or replace) the mapper for device group `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: MapperFactory) {
        let name = name.into();
        match self.factories.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = factory,
            None => self.factories.push((name, factory)),
        }
    }

    /// Keep only the devices for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.factories.retain(|(name, _)| keep(name));
    }

    /// Patterns applied to every configuration of command list device
    /// `device` after it is mapped.
    pub fn set_pattern_override(&mut self, device: impl Into<String>, patterns: PatternSet) {
        self.overrides.insert(device.into(), patterns);
    }

    /// Device group names this registry knows how to map.
    pub fn mappable_devices(&self) -> Vec<&str> {
        self.factories.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn factory(&self, name: &str) -> Option<MapperFactory> {
        self.factories
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, factory)| *factory)
    }

    /// Map every known device group directly under `root`.
    pub fn build(&self, root: &Group) -> ControlMaps {
        let mut result = ControlMaps::default();
        let names = match root.subgroup_names() {
            Ok(names) => names,
            Err(err) => {
                result
                    .diagnostics
                    .push(DiagnosticKind::DroppedDevice, root.path(), err.to_string());
                return result;
            }
        };

        for name in names {
            let Some(factory) = self.factory(&name) else {
                tracing::debug!(group = %name, "no mapper for group");
                continue;
            };
            let mapper = root
                .group(&name)
                .map_err(|err| MappingError::new(&name, err.to_string()))
                .and_then(factory);
            match mapper {
                Ok(mut mapper) => {
                    if let Some(patterns) = self.overrides.get(&name) {
                        apply_override(mapper.as_mut(), patterns, &mut result.diagnostics);
                    }
                    tracing::debug!(device = %name, configs = mapper.device_map().len(), "device mapped");
                    result.maps.insert(name, mapper);
                }
                Err(err) => {
                    result
                        .diagnostics
                        .push(DiagnosticKind::DroppedDevice, &name, err.to_string());
                }
            }
        }
        result
    }
}

fn apply_override(mapper: &mut dyn ControlMapper, patterns: &PatternSet, diagnostics: &mut Diagnostics) {
    let device = mapper.device_name().to_string();
    let Some(cl_mapper) = mapper.as_command_list_mut() else {
        diagnostics.push(
            DiagnosticKind::UnsuccessfulParse,
            &device,
            "pattern override ignored, device does not use a command list",
        );
        return;
    };
    let configs: Vec<String> = cl_mapper
        .device_map()
        .names()
        .into_iter()
        .map(str::to_string)
        .collect();
    for config in configs {
        if let Err(err) = cl_mapper.set_state_values(&config, patterns.clone()) {
            diagnostics.push(DiagnosticKind::UnsuccessfulParse, &device, err.to_string());
        }
    }
}

/// Mappers built by a registry, keyed by device name.
#[derive(Debug, Default)]
pub struct ControlMaps {
    maps: BTreeMap<String, Box<dyn ControlMapper>>,
    diagnostics: Diagnostics,
}

impl ControlMaps {
    /// Mapper of `device`.
    pub fn get(&self, device: &str) -> Option<&dyn ControlMapper> {
        self.maps.get(device).map(|m| m.as_ref())
    }

    /// Mutable mapper of `device`.
    pub fn get_mut(&mut self, device: &str) -> Option<&mut (dyn ControlMapper + 'static)> {
        self.maps.get_mut(device).map(|m| m.as_mut())
    }

    /// True if an entry with that name exists.
    pub fn contains(&self, device: &str) -> bool {
        self.maps.contains_key(device)
    }

    /// Names of the mapped devices.
    pub fn names(&self) -> Vec<&str> {
        self.maps.keys().map(String::as_str).collect()
    }

    /// Number of mapped devices.
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Mapped devices in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn ControlMapper)> {
        self.maps.iter().map(|(name, m)| (name.as_str(), m.as_ref()))
    }

    /// Devices dropped while building, and anything else worth a look.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Device maps in name order.
    pub fn device_maps(&self) -> Vec<&DeviceMap> {
        self.maps.values().map(|m| m.device_map()).collect()
    }

    /// All device maps as one JSON object keyed by device name.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut out = serde_json::Map::new();
        for (name, mapper) in &self.maps {
            out.insert(name.clone(), serde_json::to_value(mapper.device_map())?);
        }
        Ok(serde_json::Value::Object(out))
    }
}
