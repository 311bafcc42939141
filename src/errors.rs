// src/errors.rs

//! Crate-wide error types.
//!
//! Everything in [`BuilddagError`] is fatal and surfaces *before* any target
//! runs. Failures that happen while the plan executes are recorded per target
//! as [`crate::report::FailureReason`] values instead.

use std::fmt;

use thiserror::Error;

use crate::engine::TargetName;

/// Which target relation an unknown reference was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    DependsOn,
    Before,
    After,
    Triggers,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relation::DependsOn => "depends_on",
            Relation::Before => "before",
            Relation::After => "after",
            Relation::Triggers => "triggers",
        };
        f.write_str(s)
    }
}

/// Coarse classification of fatal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The declared target set is malformed (unknown names, cycles).
    GraphValidation,
    /// The planner hit an internal invariant violation.
    Planning,
    /// The selected partition index does not fit a partitioned target.
    Partition,
    /// Configuration, parameters, IO or anything else about the invocation.
    Invocation,
}

#[derive(Error, Debug)]
pub enum BuilddagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("target '{0}' is declared more than once")]
    DuplicateTarget(TargetName),

    #[error("invalid target name '{0}'")]
    InvalidTargetName(String),

    #[error("target '{target}' references unknown target '{reference}' in `{relation}`")]
    UnknownTargetReference {
        target: TargetName,
        relation: Relation,
        reference: TargetName,
    },

    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<TargetName> },

    #[error("unknown target '{0}' requested")]
    UnknownEntryTarget(TargetName),

    #[error("ambiguous ordering between targets: {}", .cycle.join(", "))]
    AmbiguousOrdering { cycle: Vec<TargetName> },

    #[error("partition index {index} is out of range for target '{target}' (count = {count})")]
    InvalidPartitionIndex {
        target: TargetName,
        index: usize,
        count: usize,
    },

    #[error("required parameter '{0}' has no value")]
    MissingParameter(String),

    #[error("no target requested and no default_target configured")]
    NoTargetRequested,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuilddagError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BuilddagError::DuplicateTarget(_)
            | BuilddagError::InvalidTargetName(_)
            | BuilddagError::UnknownTargetReference { .. }
            | BuilddagError::CyclicDependency { .. } => ErrorCategory::GraphValidation,
            BuilddagError::AmbiguousOrdering { .. } | BuilddagError::UnknownEntryTarget(_) => {
                ErrorCategory::Planning
            }
            BuilddagError::InvalidPartitionIndex { .. } => ErrorCategory::Partition,
            _ => ErrorCategory::Invocation,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuilddagError>;
