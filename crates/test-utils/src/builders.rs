#![allow(dead_code)]

use builddag::config::model::{PartitionConfig, RequirementConfig};
use builddag::config::{ConfigFile, ConfigSection, ParamConfig, RawConfigFile, TargetConfig};
use builddag::types::FailurePolicy;
use indexmap::IndexMap;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                param: IndexMap::new(),
                target: IndexMap::new(),
            },
        }
    }

    pub fn with_target(mut self, name: &str, target: TargetConfig) -> Self {
        self.config.target.insert(name.to_string(), target);
        self
    }

    pub fn with_param(mut self, name: &str, param: ParamConfig) -> Self {
        self.config.param.insert(name.to_string(), param);
        self
    }

    pub fn with_default_target(mut self, name: &str) -> Self {
        self.config.config.default_target = Some(name.to_string());
        self
    }

    pub fn with_max_parallel(mut self, n: usize) -> Self {
        self.config.config.max_parallel = n;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.config.failure_policy = policy;
        self
    }

    /// The unvalidated config, for tests that expect validation to fail.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TargetConfig`.
#[derive(Default)]
pub struct TargetConfigBuilder {
    target: TargetConfig,
}

impl TargetConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.target.cmd = Some(cmd.to_string());
        self
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.target.depends_on.push(dep.to_string());
        self
    }

    pub fn before(mut self, other: &str) -> Self {
        self.target.before.push(other.to_string());
        self
    }

    pub fn after(mut self, other: &str) -> Self {
        self.target.after.push(other.to_string());
        self
    }

    pub fn triggers(mut self, other: &str) -> Self {
        self.target.triggers.push(other.to_string());
        self
    }

    pub fn requires_param(mut self, name: &str) -> Self {
        self.target.requires.push(RequirementConfig {
            param: Some(name.to_string()),
            ..Default::default()
        });
        self
    }

    pub fn requires_param_equals(mut self, name: &str, value: &str) -> Self {
        self.target.requires.push(RequirementConfig {
            param: Some(name.to_string()),
            equals: Some(value.to_string()),
            cmd: None,
        });
        self
    }

    pub fn requires_cmd(mut self, cmd: &str) -> Self {
        self.target.requires.push(RequirementConfig {
            cmd: Some(cmd.to_string()),
            ..Default::default()
        });
        self
    }

    pub fn produces(mut self, glob: &str) -> Self {
        self.target.produces.push(glob.to_string());
        self
    }

    pub fn consumes(mut self, glob: &str) -> Self {
        self.target.consumes.push(glob.to_string());
        self
    }

    pub fn partition_items(mut self, count: usize, items: &[&str]) -> Self {
        self.target.partition = Some(PartitionConfig {
            count,
            items: Some(items.iter().map(|s| s.to_string()).collect()),
            glob: None,
        });
        self
    }

    pub fn partition_glob(mut self, count: usize, glob: &str) -> Self {
        self.target.partition = Some(PartitionConfig {
            count,
            items: None,
            glob: Some(glob.to_string()),
        });
        self
    }

    pub fn proceed_after_failure(mut self) -> Self {
        self.target.proceed_after_failure = true;
        self
    }

    pub fn build(self) -> TargetConfig {
        self.target
    }
}
