// src/context.rs

//! Immutable per-invocation build state.
//!
//! A [`BuildContext`] is assembled once after planning and shared by `Arc`
//! with every requirement check and target body. Nothing mutates it while the
//! plan runs.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::TargetName;
use crate::errors::{BuilddagError, Result};
use crate::fs::{FileSystem, RealFileSystem};

/// A declared parameter (`[param.NAME]`).
#[derive(Debug, Clone, Default)]
pub struct ParameterDecl {
    pub name: String,
    pub default: Option<String>,
    pub required: bool,
    pub secret: bool,
    pub description: Option<String>,
}

/// Resolved parameter value.
#[derive(Clone, PartialEq, Eq)]
pub struct ParamValue {
    pub value: String,
    pub secret: bool,
}

impl ParamValue {
    /// Value suitable for logs and plan output.
    pub fn display(&self) -> &str {
        if self.secret { "****" } else { &self.value }
    }
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

/// Resolve parameter values.
///
/// Precedence: explicit `KEY=VALUE` overrides, then the environment variable
/// of the same name, then the declared default. A `required` parameter that
/// ends up without a non-empty value is an error. Overrides for undeclared
/// names are accepted as plain (non-secret) parameters.
pub fn resolve_parameters<E>(
    decls: &[ParameterDecl],
    overrides: &[(String, String)],
    env: E,
) -> Result<BTreeMap<String, ParamValue>>
where
    E: Fn(&str) -> Option<String>,
{
    let mut params = BTreeMap::new();

    for decl in decls {
        let value = overrides
            .iter()
            .rev()
            .find(|(k, _)| k == &decl.name)
            .map(|(_, v)| v.clone())
            .or_else(|| env(&decl.name))
            .or_else(|| decl.default.clone());

        if let Some(value) = value {
            params.insert(
                decl.name.clone(),
                ParamValue {
                    value,
                    secret: decl.secret,
                },
            );
        }

        if decl.required && params.get(&decl.name).is_none_or(|p| p.value.trim().is_empty()) {
            return Err(BuilddagError::MissingParameter(decl.name.clone()));
        }
    }

    for (key, value) in overrides {
        if !decls.iter().any(|d| &d.name == key) {
            warn!(param = %key, "parameter is not declared in the config; passing it through");
            params.insert(
                key.clone(),
                ParamValue {
                    value: value.clone(),
                    secret: false,
                },
            );
        }
    }

    debug!(?params, "resolved parameters");
    Ok(params)
}

/// Parse a `KEY=VALUE` override.
pub fn parse_param_override(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("invalid parameter '{raw}' (expected KEY=VALUE)")),
    }
}

/// State every target body can read.
#[derive(Debug, Clone)]
pub struct BuildContext {
    root_dir: PathBuf,
    output_dir: PathBuf,
    params: BTreeMap<String, ParamValue>,
    invoked: Vec<TargetName>,
    planned: Vec<TargetName>,
    partition_index: Option<usize>,
    fs: Arc<dyn FileSystem>,
}

impl BuildContext {
    pub fn builder(root_dir: impl Into<PathBuf>) -> BuildContextBuilder {
        BuildContextBuilder::new(root_dir)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Raw parameter value, if set.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|p| p.value.as_str())
    }

    /// Whether the parameter is set to something other than whitespace.
    pub fn has_param(&self, name: &str) -> bool {
        self.param(name).is_some_and(|v| !v.trim().is_empty())
    }

    pub fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }

    /// Targets explicitly requested by the invoker.
    pub fn invoked_targets(&self) -> &[TargetName] {
        &self.invoked
    }

    pub fn is_invoked(&self, target: &str) -> bool {
        self.invoked.iter().any(|t| t == target)
    }

    /// Every target in the execution plan, in plan order.
    pub fn planned_targets(&self) -> &[TargetName] {
        &self.planned
    }

    pub fn is_planned(&self, target: &str) -> bool {
        self.planned.iter().any(|t| t == target)
    }

    pub fn partition_index(&self) -> Option<usize> {
        self.partition_index
    }

    /// Environment exported to command bodies and command requirements.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect();
        vars.push((
            "BUILDDAG_ROOT".to_string(),
            self.root_dir.to_string_lossy().into_owned(),
        ));
        vars.push((
            "BUILDDAG_OUTPUT".to_string(),
            self.output_dir.to_string_lossy().into_owned(),
        ));
        vars
    }
}

pub struct BuildContextBuilder {
    root_dir: PathBuf,
    output_dir: Option<PathBuf>,
    params: BTreeMap<String, ParamValue>,
    invoked: Vec<TargetName>,
    planned: Vec<TargetName>,
    partition_index: Option<usize>,
    fs: Option<Arc<dyn FileSystem>>,
}

impl BuildContextBuilder {
    fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            output_dir: None,
            params: BTreeMap::new(),
            invoked: Vec::new(),
            planned: Vec::new(),
            partition_index: None,
            fs: None,
        }
    }

    /// Output directory; relative paths are resolved against the root.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn params(mut self, params: BTreeMap<String, ParamValue>) -> Self {
        self.params = params;
        self
    }

    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(
            name.to_string(),
            ParamValue {
                value: value.to_string(),
                secret: false,
            },
        );
        self
    }

    pub fn invoked(mut self, targets: Vec<TargetName>) -> Self {
        self.invoked = targets;
        self
    }

    pub fn planned(mut self, targets: Vec<TargetName>) -> Self {
        self.planned = targets;
        self
    }

    pub fn partition_index(mut self, index: Option<usize>) -> Self {
        self.partition_index = index;
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn build(self) -> BuildContext {
        let output_dir = match self.output_dir {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => self.root_dir.join(dir),
            None => self.root_dir.join("output"),
        };
        BuildContext {
            root_dir: self.root_dir,
            output_dir,
            params: self.params,
            invoked: self.invoked,
            planned: self.planned,
            partition_index: self.partition_index,
            fs: self.fs.unwrap_or_else(|| Arc::new(RealFileSystem)),
        }
    }
}
