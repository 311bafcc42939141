// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated per-run state
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) reads events from channels,
//! sends `ScheduledTarget`s to the executor and handles Ctrl+C. The core is
//! unit tested without any Tokio, channels, filesystem, or processes.

use crate::dag::ExecutionPlan;
use crate::engine::event_handlers::{
    dispatch_ready, handle_shutdown, handle_target_completion, CoreStep,
};
use crate::engine::state::{PlanState, TargetRunState};
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::report::RunReport;

#[derive(Debug)]
pub struct CoreRuntime {
    state: PlanState,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(plan: ExecutionPlan, options: RuntimeOptions) -> Self {
        let options = RuntimeOptions {
            max_parallel: options.max_parallel.max(1),
            ..options
        };
        Self {
            state: PlanState::new(plan),
            options,
        }
    }

    /// Dispatch the first batch of targets.
    pub fn start(&mut self) -> CoreStep {
        dispatch_ready(&mut self.state, &self.options)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TargetCompleted {
                plan_index,
                outcome,
                duration,
                ..
            } => handle_target_completion(
                &mut self.state,
                &self.options,
                plan_index,
                outcome,
                duration,
            ),
            RuntimeEvent::ShutdownRequested => handle_shutdown(&mut self.state),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    pub fn running(&self) -> usize {
        self.state.running()
    }

    pub fn state_of(&self, name: &str) -> Option<TargetRunState> {
        self.state.state_of(name)
    }

    pub fn into_report(self) -> RunReport {
        self.state.into_report()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dag::{plan, TargetGraph};
    use crate::engine::{CoreCommand, ScheduledTarget, TargetOutcome};
    use crate::report::{FailureReason, SkipReason, TargetStatus};
    use crate::target::Target;
    use crate::types::FailurePolicy;

    fn core(targets: Vec<Target>, entries: &[&str], options: RuntimeOptions) -> CoreRuntime {
        let graph = TargetGraph::new(targets).unwrap();
        let entries: Vec<String> = entries.iter().map(|s| s.to_string()).collect();
        CoreRuntime::new(plan(&graph, &entries).unwrap(), options)
    }

    fn dispatched(step: &CoreStep) -> Vec<String> {
        step.commands
            .iter()
            .flat_map(|c| match c {
                CoreCommand::DispatchTargets(ts) => ts.iter().map(|t| t.name.clone()).collect(),
                CoreCommand::Finished => Vec::new(),
            })
            .collect()
    }

    fn complete(core: &mut CoreRuntime, name: &str, outcome: TargetOutcome) -> CoreStep {
        let plan_index = core.state.plan().position(name).unwrap();
        core.step(RuntimeEvent::TargetCompleted {
            target: name.to_string(),
            plan_index,
            outcome,
            duration: Duration::from_millis(5),
        })
    }

    fn failed() -> TargetOutcome {
        TargetOutcome::Failed(FailureReason::BodyFailed("boom".into()))
    }

    fn parallel(n: usize, failure_policy: FailurePolicy) -> RuntimeOptions {
        RuntimeOptions {
            max_parallel: n,
            failure_policy,
        }
    }

    #[test]
    fn sequential_chain_dispatches_one_at_a_time() {
        let mut core = core(
            vec![
                Target::new("Restore"),
                Target::new("Compile").depends_on(["Restore"]),
            ],
            &["Compile"],
            RuntimeOptions::default(),
        );

        let step = core.start();
        assert_eq!(
            step.commands,
            vec![CoreCommand::DispatchTargets(vec![ScheduledTarget {
                name: "Restore".into(),
                plan_index: 0,
            }])]
        );

        let step = complete(&mut core, "Restore", TargetOutcome::Succeeded);
        assert_eq!(dispatched(&step), vec!["Compile"]);
        assert!(step.keep_running);

        let step = complete(&mut core, "Compile", TargetOutcome::Succeeded);
        assert_eq!(step.commands, vec![CoreCommand::Finished]);
        assert!(!step.keep_running);
        assert_eq!(core.into_report().exit_code(), 0);
    }

    #[test]
    fn independent_targets_respect_the_worker_bound() {
        let mut core = core(
            vec![
                Target::new("A"),
                Target::new("B"),
                Target::new("C"),
                Target::new("All").depends_on(["A", "B", "C"]),
            ],
            &["All"],
            parallel(2, FailurePolicy::FailFast),
        );

        assert_eq!(dispatched(&core.start()), vec!["A", "B"]);
        assert_eq!(core.running(), 2);
        assert_eq!(dispatched(&complete(&mut core, "B", TargetOutcome::Succeeded)), vec!["C"]);
        assert!(dispatched(&complete(&mut core, "A", TargetOutcome::Succeeded)).is_empty());
        assert_eq!(dispatched(&complete(&mut core, "C", TargetOutcome::Succeeded)), vec!["All"]);
    }

    #[test]
    fn soft_edges_hold_back_dispatch() {
        let mut core = core(
            vec![
                Target::new("Clean").before(["Restore"]),
                Target::new("Restore"),
                Target::new("All").depends_on(["Clean", "Restore"]),
            ],
            &["All"],
            parallel(4, FailurePolicy::FailFast),
        );

        assert_eq!(dispatched(&core.start()), vec!["Clean"]);
        assert_eq!(
            dispatched(&complete(&mut core, "Clean", TargetOutcome::Succeeded)),
            vec!["Restore"]
        );
    }

    #[test]
    fn upstream_failure_skips_dependents_transitively() {
        let mut core = core(
            vec![
                Target::new("Compile"),
                Target::new("Test").depends_on(["Compile"]),
                Target::new("Pack").depends_on(["Test"]),
                Target::new("Lint"),
                Target::new("All").depends_on(["Pack", "Lint"]).proceed_after_failure(),
            ],
            &["All"],
            parallel(1, FailurePolicy::Continue),
        );

        assert_eq!(dispatched(&core.start()), vec!["Compile"]);
        let step = complete(&mut core, "Compile", failed());
        assert_eq!(dispatched(&step), vec!["Lint"]);
        complete(&mut core, "Lint", TargetOutcome::Succeeded);

        let report = core.into_report();
        let upstream = TargetStatus::Skipped(SkipReason::UpstreamFailure("Compile".into()));
        assert_eq!(report.status_of("Test"), Some(&upstream));
        assert_eq!(report.status_of("Pack"), Some(&upstream));
        assert_eq!(report.status_of("All"), Some(&upstream));
        assert_eq!(report.status_of("Lint"), Some(&TargetStatus::Succeeded));
    }

    #[test]
    fn fail_fast_aborts_non_tolerant_targets_only() {
        let mut core = core(
            vec![
                Target::new("Compile"),
                Target::new("Lint"),
                Target::new("Report").proceed_after_failure(),
                Target::new("All").depends_on(["Compile", "Lint", "Report"]),
            ],
            &["All"],
            RuntimeOptions::default(),
        );

        assert_eq!(dispatched(&core.start()), vec!["Compile"]);
        let step = complete(&mut core, "Compile", failed());
        assert_eq!(dispatched(&step), vec!["Report"]);
        let step = complete(&mut core, "Report", TargetOutcome::Succeeded);
        assert!(!step.keep_running);

        let report = core.into_report();
        assert_eq!(
            report.status_of("Lint"),
            Some(&TargetStatus::Skipped(SkipReason::AbortedByEarlierFailure))
        );
        assert_eq!(
            report.status_of("All"),
            Some(&TargetStatus::Skipped(SkipReason::UpstreamFailure("Compile".into())))
        );
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn tolerant_dependency_failure_does_not_block_dependents() {
        let mut core = core(
            vec![
                Target::new("Coverage").proceed_after_failure(),
                Target::new("Publish").depends_on(["Coverage"]),
            ],
            &["Publish"],
            RuntimeOptions::default(),
        );

        core.start();
        let step = complete(&mut core, "Coverage", failed());
        assert_eq!(dispatched(&step), vec!["Publish"]);
        complete(&mut core, "Publish", TargetOutcome::Succeeded);

        let report = core.into_report();
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.failures().len(), 1);
    }

    #[test]
    fn shutdown_skips_pending_and_waits_for_running() {
        let mut core = core(
            vec![Target::new("A"), Target::new("B").depends_on(["A"])],
            &["B"],
            RuntimeOptions::default(),
        );

        core.start();
        let step = core.step(RuntimeEvent::ShutdownRequested);
        assert!(step.keep_running);
        assert!(step.commands.is_empty());

        let step = complete(&mut core, "A", TargetOutcome::Succeeded);
        assert!(!step.keep_running);

        let report = core.into_report();
        assert_eq!(report.status_of("A"), Some(&TargetStatus::Succeeded));
        assert_eq!(
            report.status_of("B"),
            Some(&TargetStatus::Skipped(SkipReason::Interrupted))
        );
        assert_eq!(report.exit_code(), 130);
    }

    #[test]
    fn stray_completions_are_ignored() {
        let mut core = core(vec![Target::new("A"), Target::new("B")], &["A", "B"], RuntimeOptions::default());
        core.start();
        let step = complete(&mut core, "B", TargetOutcome::Succeeded);
        assert!(step.commands.is_empty());
        assert_eq!(core.state_of("B"), Some(TargetRunState::Pending));
    }

    #[test]
    fn empty_plan_finishes_immediately() {
        let mut core = CoreRuntime::new(
            plan(&TargetGraph::new(Vec::new()).unwrap(), &[]).unwrap(),
            RuntimeOptions::default(),
        );
        let step = core.start();
        assert_eq!(step.commands, vec![CoreCommand::Finished]);
        assert!(!step.keep_running);
    }
}
