// src/report.rs

//! Per-target outcomes and the aggregate run status.
//!
//! The executor records one [`TargetResult`] per planned target; a
//! [`RunReport`] is the single place that decides whether the invocation as a
//! whole succeeded and which exit code the process returns.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::engine::TargetName;

/// Coarse classification of execution-time failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Precondition,
    BodyExecution,
    ArtifactContract,
}

/// Why a target that started did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("requirement #{index} not met: {description}")]
    RequirementNotMet { index: usize, description: String },

    #[error("consumed artifact missing: nothing matches '{pattern}'")]
    ConsumesContractViolation { pattern: String },

    #[error("{0}")]
    BodyFailed(String),

    #[error("produced artifact missing: nothing matches '{pattern}'")]
    ProducesContractViolation { pattern: String },
}

impl FailureReason {
    pub fn kind(&self) -> FailureKind {
        match self {
            FailureReason::RequirementNotMet { .. } => FailureKind::Precondition,
            FailureReason::BodyFailed(_) => FailureKind::BodyExecution,
            FailureReason::ConsumesContractViolation { .. }
            | FailureReason::ProducesContractViolation { .. } => FailureKind::ArtifactContract,
        }
    }
}

/// Why a target never started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A non-tolerant dependency did not succeed; carries the name of the
    /// target that originally failed.
    UpstreamFailure(TargetName),
    /// Fail-fast mode stopped the run after an earlier failure.
    AbortedByEarlierFailure,
    /// The run was interrupted (Ctrl-C).
    Interrupted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UpstreamFailure(name) => write!(f, "upstream failure in '{name}'"),
            SkipReason::AbortedByEarlierFailure => f.write_str("aborted by earlier failure"),
            SkipReason::Interrupted => f.write_str("interrupted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStatus {
    Succeeded,
    Failed(FailureReason),
    Skipped(SkipReason),
}

impl TargetStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TargetStatus::Succeeded)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TargetStatus::Succeeded => "succeeded",
            TargetStatus::Failed(_) => "failed",
            TargetStatus::Skipped(_) => "skipped",
        }
    }

    fn detail(&self) -> String {
        match self {
            TargetStatus::Succeeded => String::new(),
            TargetStatus::Failed(reason) => reason.to_string(),
            TargetStatus::Skipped(reason) => reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetResult {
    pub name: TargetName,
    pub status: TargetStatus,
    pub duration: Duration,
    /// `proceed_after_failure` of the target.
    pub tolerant: bool,
}

impl TargetResult {
    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.status {
            TargetStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    Failed,
    Interrupted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Succeeded => "Build succeeded",
            RunStatus::Failed => "Build failed",
            RunStatus::Interrupted => "Build interrupted",
        };
        f.write_str(s)
    }
}

/// Results of one run, in plan order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    results: Vec<TargetResult>,
    interrupted: bool,
}

impl RunReport {
    pub fn new(results: Vec<TargetResult>, interrupted: bool) -> Self {
        Self {
            results,
            interrupted,
        }
    }

    pub fn results(&self) -> &[TargetResult] {
        &self.results
    }

    pub fn result(&self, name: &str) -> Option<&TargetResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn status_of(&self, name: &str) -> Option<&TargetStatus> {
        self.result(name).map(|r| &r.status)
    }

    /// Every failed target, tolerant ones included.
    pub fn failures(&self) -> Vec<&TargetResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.status, TargetStatus::Failed(_)))
            .collect()
    }

    pub fn was_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Aggregate status.
    ///
    /// A tolerant target's body or artifact failure does not fail the run,
    /// an unmet requirement always does.
    pub fn status(&self) -> RunStatus {
        if self.interrupted {
            return RunStatus::Interrupted;
        }
        let failed = self.results.iter().any(|r| match &r.status {
            TargetStatus::Failed(FailureReason::RequirementNotMet { .. }) => true,
            TargetStatus::Failed(_) => !r.tolerant,
            _ => false,
        });
        if failed {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.status() {
            RunStatus::Succeeded => 0,
            RunStatus::Failed => 1,
            RunStatus::Interrupted => 130,
        }
    }

    /// Human-readable summary table.
    pub fn summary(&self) -> String {
        let name_width = self
            .results
            .iter()
            .map(|r| r.name.len())
            .max()
            .unwrap_or(0)
            .max("TARGET".len());

        let mut out = String::new();
        out.push_str(&format!(
            "{:<name_width$}  {:<9}  {:>9}  DETAIL\n",
            "TARGET", "STATUS", "DURATION"
        ));
        for r in &self.results {
            let status = if r.tolerant && matches!(r.status, TargetStatus::Failed(_)) {
                "failed*"
            } else {
                r.status.label()
            };
            let line = format!(
                "{:<name_width$}  {:<9}  {:>8.2}s  {}",
                r.name,
                status,
                r.duration.as_secs_f64(),
                r.status.detail()
            );
            out.push_str(line.trim_end());
            out.push('\n');
        }

        let count = |label: &str| {
            self.results
                .iter()
                .filter(|r| r.status.label() == label)
                .count()
        };
        out.push_str(&format!(
            "\n{} ({} succeeded, {} failed, {} skipped)\n",
            self.status(),
            count("succeeded"),
            count("failed"),
            count("skipped")
        ));
        if self.results.iter().any(|r| r.tolerant && r.failure().is_some()) {
            out.push_str("* failure tolerated (proceed_after_failure)\n");
        }
        out
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}
