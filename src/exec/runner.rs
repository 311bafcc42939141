// src/exec/runner.rs

//! Execution of a single planned target.
//!
//! Order of checks: `requires` (in declaration order), `consumes`, body,
//! `produces`. The first failing step decides the [`FailureReason`].

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::artifacts::{first_unmatched, ArtifactPattern};
use crate::engine::{RuntimeEvent, TargetOutcome};
use crate::exec::command::run_shell;
use crate::report::FailureReason;
use crate::target::{Requirement, Target, TargetContext};

/// Run `target` and report the outcome to the runtime.
pub async fn run_target(
    target: Arc<Target>,
    ctx: TargetContext,
    plan_index: usize,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let started = Instant::now();
    // Separate task so a panicking body still produces a completion event.
    let handle = {
        let target = target.clone();
        tokio::spawn(async move { execute_target(&target, &ctx).await })
    };
    let outcome = match handle.await {
        Ok(outcome) => outcome,
        Err(err) => TargetOutcome::Failed(FailureReason::BodyFailed(format!(
            "target body panicked: {err}"
        ))),
    };
    let duration = started.elapsed();

    let event = RuntimeEvent::TargetCompleted {
        target: target.name.clone(),
        plan_index,
        outcome,
        duration,
    };
    if runtime_tx.send(event).await.is_err() {
        error!(target_name = %target.name, "runtime is gone; dropping target completion");
    }
}

/// Evaluate requirements and artifact contracts around the target body.
pub async fn execute_target(target: &Target, ctx: &TargetContext) -> TargetOutcome {
    info!(target_name = %target.name, "starting target");

    for (index, requirement) in target.requires.iter().enumerate() {
        if !requirement_holds(requirement, ctx).await {
            return TargetOutcome::Failed(FailureReason::RequirementNotMet {
                index,
                description: requirement.describe(),
            });
        }
    }

    if let Some(pattern) = missing_artifact(&target.consumes, ctx) {
        return TargetOutcome::Failed(FailureReason::ConsumesContractViolation { pattern });
    }

    if let Err(err) = target.body.execute(ctx).await {
        return TargetOutcome::Failed(FailureReason::BodyFailed(format!("{err:#}")));
    }

    if let Some(pattern) = missing_artifact(&target.produces, ctx) {
        return TargetOutcome::Failed(FailureReason::ProducesContractViolation { pattern });
    }

    TargetOutcome::Succeeded
}

async fn requirement_holds(requirement: &Requirement, ctx: &TargetContext) -> bool {
    let build = ctx.build();
    let holds = match requirement {
        Requirement::Parameter(name) => build.has_param(name),
        Requirement::ParameterEquals { name, value } => build
            .param(name)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case(value.trim())),
        Requirement::Command(cmd) => match run_shell(cmd, ctx).await {
            Ok(code) => code == 0,
            Err(err) => {
                warn!(target_name = %ctx.target(), error = %format!("{err:#}"), "requirement command failed to run");
                false
            }
        },
        Requirement::Predicate { check, .. } => check(build),
    };
    debug!(
        target_name = %ctx.target(),
        requirement = %requirement.describe(),
        holds,
        "checked requirement"
    );
    holds
}

/// The first glob in `globs` that matches nothing under the build root.
fn missing_artifact(globs: &[String], ctx: &TargetContext) -> Option<String> {
    if globs.is_empty() {
        return None;
    }

    let patterns = match globs
        .iter()
        .map(|g| ArtifactPattern::new(g))
        .collect::<anyhow::Result<Vec<_>>>()
    {
        Ok(patterns) => patterns,
        Err(err) => {
            warn!(target_name = %ctx.target(), error = %format!("{err:#}"), "invalid artifact glob");
            return Some(globs.join(", "));
        }
    };

    let build = ctx.build();
    match first_unmatched(build.fs(), build.root_dir(), &patterns) {
        Ok(missing) => missing.map(|p| p.as_str().to_string()),
        Err(err) => {
            warn!(target_name = %ctx.target(), error = %format!("{err:#}"), "artifact lookup failed");
            Some(globs.join(", "))
        }
    }
}
