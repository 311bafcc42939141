// src/config/mod.rs

//! Configuration loading and validation for builddag.
//!
//! - [`model`]: the TOML-backed data model.
//! - [`loader`]: read a config file from disk.
//! - [`validate`]: `RawConfigFile` → `ConfigFile` checks.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, DEFAULT_CONFIG_FILE};
pub use model::{ConfigFile, ConfigSection, ParamConfig, RawConfigFile, TargetConfig};
