//! # DAQ Control Map Library
//!
//! This crate maps the *control device* groups of a hierarchical data
//! container (HDF5 in practice) into a translation schema: a description of
//! which datasets and fields hold the shot numbers and the per-shot state of
//! each device configuration. A downstream reader uses that schema to
//! assemble shot-indexed arrays; reading the actual data is out of scope here.
//!
//! ## Crate Structure
//!
//! - **`container`**: The `Container` trait abstracting the hierarchical file,
//!   an in-memory backend and (feature `storage_hdf5`) an HDF5 backend.
//! - **`parser`**: `CommandListParser`, which applies named regular
//!   expressions to a device command list and extracts typed value columns.
//! - **`schema`**: `Configuration`, `ShotNumDescriptor` and
//!   `StateValueDescriptor`, the translation schema and its invariants.
//! - **`mapper`**: The `ControlMapper` and `CommandListMapper` traits and the
//!   mappers of every supported device.
//! - **`registry`**: `MapperRegistry`, which finds known devices in a
//!   container and builds their mappers.
//! - **`diagnostics`**: Collector for the non-fatal anomalies met while mapping.
//! - **`error`**: Error types for every fallible operation.
//! - **`settings`**: Figment-based settings (TOML file plus environment).
//! - **`logging`**: `tracing-subscriber` setup for binaries and tests.
//! - **`validation`**: Small validation helpers shared by the schema checks.
//!
//! ## Example
//!
//! ```
//! use daq_control_map::container::{FieldInfo, Group, MemoryContainer};
//! use daq_control_map::dtype::DType;
//! use daq_control_map::MapperRegistry;
//!
//! let mut mem = MemoryContainer::new();
//! mem.set_attr(
//!     "/Raw data + config/Waveform/waveform_A",
//!     "Waveform command list",
//!     "FREQ 50000.0\nFREQ 60000.0",
//! )
//! .add_dataset(
//!     "/Raw data + config/Waveform/Run time list",
//!     vec![
//!         FieldInfo::scalar("Shot number", DType::Int32),
//!         FieldInfo::scalar("Command index", DType::Int32),
//!     ],
//! );
//!
//! let root = Group::open(mem.into_shared(), "/Raw data + config").unwrap();
//! let maps = MapperRegistry::new().build(&root);
//! let waveform = maps.get("Waveform").unwrap();
//! let config = waveform.device_map().get("waveform_A").unwrap();
//! assert!(config.state_values.contains_key("FREQ"));
//! ```

pub mod container;
pub mod diagnostics;
pub mod dtype;
pub mod error;
pub mod logging;
pub mod mapper;
pub mod parser;
pub mod registry;
pub mod schema;
pub mod settings;
pub mod validation;

pub use diagnostics::{DiagnosticKind, Diagnostics};
pub use error::{MapError, MapResult, MappingError};
pub use mapper::{CommandListMapper, ControlMapper};
pub use parser::{CommandList, CommandListParser, PatternSet};
pub use registry::{ControlMaps, MapperRegistry};
pub use schema::{Configuration, DeviceMap, StateValueDescriptor};
