//! Mapping settings loaded with Figment.
//!
//! Settings are merged from, in increasing priority:
//! 1. a TOML file (optional; a missing file contributes nothing)
//! 2. environment variables prefixed with `DAQ_MAP_`, nested keys split
//!    on `__`
//!
//! ```toml
//! log_level = "debug"
//! devices = ["Waveform", "6K Compumotor"]
//!
//! [patterns]
//! Waveform = ['(?P<FREQ>(\bFREQ\s)(?P<VALUE>(\d+\.\d*|\.\d+|\d+\b)))']
//! ```
//!
//! # Example
//! ```no_run
//! use daq_control_map::settings::MapSettings;
//!
//! let settings = MapSettings::load_from("control_map.toml")?;
//! settings.validate().map_err(anyhow::Error::msg)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::parser::PatternSet;
use crate::registry::MapperRegistry;
use anyhow::Context;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Prefix of environment variables overriding settings.
pub const ENV_PREFIX: &str = "DAQ_MAP_";

/// Settings of a mapping run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSettings {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Restrict the registry to these devices; all known devices if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<String>>,
    /// Pattern overrides per command list device, applied to every
    /// configuration after the device is mapped.
    #[serde(default)]
    pub patterns: BTreeMap<String, Vec<String>>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            devices: None,
            patterns: BTreeMap::new(),
        }
    }
}

impl MapSettings {
    /// Load settings from `path` and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        Figment::from(Serialized::defaults(MapSettings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load mapping settings from {}", path.display()))
    }

    /// Load settings from the environment only.
    pub fn from_env() -> anyhow::Result<Self> {
        Figment::from(Serialized::defaults(MapSettings::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to load mapping settings from the environment")
    }

    /// Render as TOML, e.g. to write a settings template.
    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize mapping settings")
    }

    /// Validate settings after loading
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }

        let registry = MapperRegistry::new();
        let known = registry.mappable_devices();
        let check_device = |name: &str| {
            if known.contains(&name) {
                Ok(())
            } else {
                Err(format!(
                    "Unknown device '{}'. Must be one of: {}",
                    name,
                    known.join(", ")
                ))
            }
        };

        if let Some(devices) = &self.devices {
            let mut seen = std::collections::HashSet::new();
            for device in devices {
                check_device(device.as_str())?;
                if !seen.insert(device) {
                    return Err(format!("Duplicate device: {}", device));
                }
            }
        }

        for (device, patterns) in &self.patterns {
            check_device(device.as_str())?;
            PatternSet::from(patterns.as_slice())
                .compile()
                .map_err(|e| format!("Invalid patterns for '{}': {}", device, e))?;
        }

        Ok(())
    }

    /// Pattern overrides of `device`, if any.
    pub fn patterns_for(&self, device: &str) -> Option<PatternSet> {
        self.patterns
            .get(device)
            .map(|p| PatternSet::from(p.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FREQ: &str = r"(?P<FREQ>(\bFREQ\s)(?P<VALUE>(\d+\.\d*|\.\d+|\d+\b)))";

    #[test]
    fn defaults_are_valid() {
        let settings = MapSettings::default();
        assert_eq!(settings.log_level, "info");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn invalid_log_level() {
        let settings = MapSettings {
            log_level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn unknown_and_duplicate_devices() {
        let settings = MapSettings {
            devices: Some(vec!["Bogus".to_string()]),
            ..Default::default()
        };
        assert!(settings.validate().unwrap_err().contains("Unknown device"));

        let settings = MapSettings {
            devices: Some(vec!["Waveform".to_string(), "Waveform".to_string()]),
            ..Default::default()
        };
        assert!(settings.validate().unwrap_err().contains("Duplicate"));
    }

    #[test]
    fn pattern_overrides_must_compile() {
        let mut settings = MapSettings::default();
        settings
            .patterns
            .insert("Waveform".to_string(), vec![FREQ.to_string()]);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.patterns_for("Waveform").map(|p| p.len()), Some(1));

        settings
            .patterns
            .insert("N5700_PS".to_string(), vec!["(?P<remainder>x(?P<VALUE>1))".to_string()]);
        assert!(settings.validate().unwrap_err().contains("N5700_PS"));
    }

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.toml");
        std::fs::write(
            &path,
            r#"
            log_level = "debug"
            devices = ["Waveform"]
            "#,
        )
        .unwrap();

        let settings = MapSettings::load_from(&path).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.devices, Some(vec!["Waveform".to_string()]));
        assert!(settings.patterns.is_empty());
    }

    #[test]
    fn toml_round_trip_through_file() {
        let mut settings = MapSettings::default();
        settings
            .patterns
            .insert("Waveform".to_string(), vec![FREQ.to_string()]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.toml");
        std::fs::write(&path, settings.to_toml_string().unwrap()).unwrap();

        assert_eq!(MapSettings::load_from(&path).unwrap(), settings);
    }
}
