// src/config/validate.rs

//! Semantic checks for a parsed config.
//!
//! Graph-level rules (unknown references, cycles, name syntax) are enforced
//! by [`crate::dag::TargetGraph`] once the targets are built; this module
//! covers what only the file format can get wrong.

use crate::artifacts::ArtifactPattern;
use crate::config::model::{ConfigFile, RawConfigFile, TargetConfig};
use crate::errors::{BuilddagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuilddagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.param, raw.target))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_targets(cfg)?;
    validate_global_config(cfg)?;
    for (name, target) in cfg.target.iter() {
        validate_target(name, target)?;
    }
    Ok(())
}

fn ensure_has_targets(cfg: &RawConfigFile) -> Result<()> {
    if cfg.target.is_empty() {
        return Err(BuilddagError::ConfigError(
            "config must contain at least one [target.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.max_parallel == 0 {
        return Err(BuilddagError::ConfigError(
            "[config].max_parallel must be >= 1 (got 0)".to_string(),
        ));
    }

    if let Some(default) = &cfg.config.default_target {
        if !cfg.target.contains_key(default) {
            return Err(BuilddagError::ConfigError(format!(
                "[config].default_target '{default}' is not a declared target"
            )));
        }
    }

    Ok(())
}

fn validate_target(name: &str, target: &TargetConfig) -> Result<()> {
    for (i, requirement) in target.requires.iter().enumerate() {
        if requirement.to_requirement().is_none() {
            return Err(BuilddagError::ConfigError(format!(
                "target '{name}': requires[{i}] must be {{ param = .. }}, \
                 {{ param = .., equals = .. }} or {{ cmd = .. }}"
            )));
        }
    }

    for glob in target.produces.iter().chain(target.consumes.iter()) {
        check_glob(name, glob)?;
    }

    if let Some(partition) = &target.partition {
        if partition.count == 0 {
            return Err(BuilddagError::ConfigError(format!(
                "target '{name}': partition.count must be >= 1 (got 0)"
            )));
        }
        match (&partition.items, &partition.glob) {
            (Some(_), Some(_)) | (None, None) => {
                return Err(BuilddagError::ConfigError(format!(
                    "target '{name}': partition needs exactly one of `items` or `glob`"
                )));
            }
            (None, Some(glob)) => check_glob(name, glob)?,
            (Some(_), None) => {}
        }
    }

    Ok(())
}

fn check_glob(target: &str, glob: &str) -> Result<()> {
    ArtifactPattern::new(glob)
        .map(|_| ())
        .map_err(|e| BuilddagError::ConfigError(format!("target '{target}': {e:#}")))
}
