// src/config/model.rs

use indexmap::IndexMap;
use serde::Deserialize;

use crate::context::ParameterDecl;
use crate::partition::{PartitionItems, PartitionSpec};
use crate::target::{Requirement, Target};
use crate::types::FailurePolicy;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// default_target = "Test"
/// max_parallel = 2
///
/// [param.CONFIGURATION]
/// default = "debug"
///
/// [target.Restore]
/// cmd = "dotnet restore"
///
/// [target.Compile]
/// cmd = "dotnet build -c $CONFIGURATION"
/// depends_on = ["Restore"]
/// ```
///
/// Tables keep the order they are written in; that order is the target
/// declaration order used to break planning ties.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Global behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Parameters from `[param.<NAME>]`.
    #[serde(default)]
    pub param: IndexMap<String, ParamConfig>,

    /// Targets from `[target.<name>]`.
    #[serde(default)]
    pub target: IndexMap<String, TargetConfig>,
}

/// Validated configuration. Only constructed through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub param: IndexMap<String, ParamConfig>,
    pub target: IndexMap<String, TargetConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        param: IndexMap<String, ParamConfig>,
        target: IndexMap<String, TargetConfig>,
    ) -> Self {
        Self {
            config,
            param,
            target,
        }
    }

    /// Declared targets in file order.
    pub fn to_targets(&self) -> Vec<Target> {
        self.target
            .iter()
            .map(|(name, cfg)| cfg.to_target(name))
            .collect()
    }

    /// `[param.*]` declarations, followed by names that only appear in a
    /// `requires = [{ param = .. }]` entry.
    ///
    /// The implicit ones resolve from `--param` and the environment like any
    /// other parameter, have no default, and are masked: they are usually
    /// CI secrets such as API keys.
    pub fn parameter_decls(&self) -> Vec<ParameterDecl> {
        let mut decls: Vec<ParameterDecl> = self
            .param
            .iter()
            .map(|(name, p)| ParameterDecl {
                name: name.clone(),
                default: p.default.clone(),
                required: p.required,
                secret: p.secret,
                description: p.description.clone(),
            })
            .collect();

        let required_by_targets = self
            .target
            .values()
            .flat_map(|t| t.requires.iter())
            .filter_map(|r| r.param.as_ref());
        for name in required_by_targets {
            if !decls.iter().any(|d| &d.name == name) {
                decls.push(ParameterDecl {
                    name: name.clone(),
                    secret: true,
                    ..ParameterDecl::default()
                });
            }
        }
        decls
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Target run when none is named on the command line.
    #[serde(default)]
    pub default_target: Option<String>,

    /// How many independent targets may run at once.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// `"fail_fast"` (default) or `"continue"`.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Output directory, relative to the build root unless absolute.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_max_parallel() -> usize {
    1
}

fn default_output_dir() -> String {
    "output".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            default_target: None,
            max_parallel: default_max_parallel(),
            failure_policy: FailurePolicy::default(),
            output_dir: default_output_dir(),
        }
    }
}

/// `[param.<NAME>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamConfig {
    #[serde(default)]
    pub default: Option<String>,

    /// Fail before anything runs when no value is supplied.
    #[serde(default)]
    pub required: bool,

    /// Mask the value in logs and plan output.
    #[serde(default)]
    pub secret: bool,

    #[serde(default)]
    pub description: Option<String>,
}

/// One entry of a target's `requires` list.
///
/// ```toml
/// requires = [{ param = "NUGET_API_KEY" }, { param = "CONFIGURATION", equals = "release" }, { cmd = "git diff --quiet" }]
/// ```
///
/// Exactly one of `param` / `cmd` must be set; `equals` only goes with
/// `param`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequirementConfig {
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default)]
    pub equals: Option<String>,
    #[serde(default)]
    pub cmd: Option<String>,
}

impl RequirementConfig {
    /// `None` for combinations that don't describe a requirement.
    pub fn to_requirement(&self) -> Option<Requirement> {
        match (&self.param, &self.equals, &self.cmd) {
            (Some(name), Some(value), None) => Some(Requirement::ParameterEquals {
                name: name.clone(),
                value: value.clone(),
            }),
            (Some(name), None, None) => Some(Requirement::Parameter(name.clone())),
            (None, None, Some(cmd)) => Some(Requirement::Command(cmd.clone())),
            _ => None,
        }
    }
}

/// `partition = { count = 2, glob = "tests/*/*.csproj" }` or
/// `partition = { count = 3, items = ["a", "b", "c"] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartitionConfig {
    pub count: usize,
    #[serde(default)]
    pub items: Option<Vec<String>>,
    #[serde(default)]
    pub glob: Option<String>,
}

/// `[target.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Shell command; targets without one only aggregate or trigger others.
    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub before: Vec<String>,

    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub triggers: Vec<String>,

    #[serde(default)]
    pub requires: Vec<RequirementConfig>,

    #[serde(default)]
    pub produces: Vec<String>,

    #[serde(default)]
    pub consumes: Vec<String>,

    #[serde(default)]
    pub partition: Option<PartitionConfig>,

    #[serde(default)]
    pub proceed_after_failure: bool,
}

impl TargetConfig {
    pub fn to_target(&self, name: &str) -> Target {
        let mut target = Target::new(name)
            .depends_on(self.depends_on.iter().cloned())
            .before(self.before.iter().cloned())
            .after(self.after.iter().cloned())
            .triggers(self.triggers.iter().cloned());

        target.description = self.description.clone();
        target.requires = self
            .requires
            .iter()
            .filter_map(RequirementConfig::to_requirement)
            .collect();
        target.produces = self.produces.clone();
        target.consumes = self.consumes.clone();
        target.proceed_after_failure = self.proceed_after_failure;
        target.partition = self.partition.as_ref().map(|p| {
            let items = match (&p.items, &p.glob) {
                (_, Some(glob)) => PartitionItems::Glob(glob.clone()),
                (Some(items), None) => PartitionItems::List(items.clone()),
                (None, None) => PartitionItems::List(Vec::new()),
            };
            PartitionSpec::new(p.count, items)
        });

        match &self.cmd {
            Some(cmd) => target.command(cmd.clone()),
            None => target,
        }
    }
}
