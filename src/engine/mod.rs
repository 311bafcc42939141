// src/engine/mod.rs

//! Orchestration engine for builddag.
//!
//! The engine walks an [`crate::dag::ExecutionPlan`]:
//! - dispatches targets whose plan predecessors are all terminal, up to
//!   `max_parallel` at a time,
//! - records skips for targets whose dependencies failed or that can no
//!   longer start (fail-fast abort, Ctrl-C),
//! - collects per-target outcomes into a [`crate::report::RunReport`].
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::time::Duration;

use crate::report::FailureReason;
use crate::types::FailurePolicy;

/// Canonical target name type used throughout the crate.
pub type TargetName = String;

/// Outcome of a target that was actually started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Succeeded,
    Failed(FailureReason),
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Upper bound on concurrently running targets (>= 1).
    pub max_parallel: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            max_parallel: 1,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

/// A target handed to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTarget {
    pub name: TargetName,
    pub plan_index: usize,
}

/// Events flowing into the runtime from executors and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A dispatched target finished (successfully or not).
    TargetCompleted {
        target: TargetName,
        plan_index: usize,
        outcome: TargetOutcome,
        duration: Duration,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;
pub mod state;

pub use self::core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
pub use state::TargetRunState;
