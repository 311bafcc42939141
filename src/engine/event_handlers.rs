// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::time::Duration;

use tracing::{error, info};

use crate::engine::state::PlanState;
use crate::engine::{RuntimeOptions, ScheduledTarget, TargetOutcome};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Send these targets to the executor.
    DispatchTargets(Vec<ScheduledTarget>),
    /// Every planned target is terminal.
    Finished,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Handle a target completion event.
pub fn handle_target_completion(
    state: &mut PlanState,
    options: &RuntimeOptions,
    plan_index: usize,
    outcome: TargetOutcome,
    duration: Duration,
) -> CoreStep {
    state.record_completion(plan_index, outcome, duration, options.failure_policy);
    dispatch_ready(state, options)
}

/// Handle Ctrl-C: nothing new starts, running targets finish.
pub fn handle_shutdown(state: &mut PlanState) -> CoreStep {
    info!(running = state.running(), "shutdown requested; waiting for running targets");
    state.interrupt();
    finish_if_done(state, Vec::new())
}

/// Dispatch whatever is runnable now.
pub fn dispatch_ready(state: &mut PlanState, options: &RuntimeOptions) -> CoreStep {
    let mut commands = Vec::new();

    let ready = state.collect_ready(options.max_parallel);
    if ready.is_empty() && state.running() == 0 && !state.is_finished() {
        error!("no target can start and none is running; abandoning the rest of the plan");
        state.abandon_pending();
    }
    if !ready.is_empty() {
        commands.push(CoreCommand::DispatchTargets(ready));
    }

    finish_if_done(state, commands)
}

fn finish_if_done(state: &PlanState, mut commands: Vec<CoreCommand>) -> CoreStep {
    let done = state.is_finished();
    if done {
        commands.push(CoreCommand::Finished);
    }
    CoreStep {
        commands,
        keep_running: !done,
    }
}
