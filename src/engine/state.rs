// src/engine/state.rs

//! Per-run state of every planned target.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dag::ExecutionPlan;
use crate::engine::{ScheduledTarget, TargetOutcome};
use crate::report::{RunReport, SkipReason, TargetResult, TargetStatus};
use crate::types::FailurePolicy;

/// Per-run state of a target (internal).
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    /// Waiting for plan predecessors or for a free worker.
    Pending,
    /// Dispatched to the executor.
    Running,
    Done(TargetStatus),
}

impl Slot {
    fn is_done(&self) -> bool {
        matches!(self, Slot::Done(_))
    }
}

/// Public, read-only view of a target's state in the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRunState {
    Pending,
    Running,
    Done(TargetStatus),
}

#[derive(Debug)]
pub struct PlanState {
    plan: ExecutionPlan,
    slots: Vec<Slot>,
    durations: Vec<Duration>,
    running: usize,
    /// Set once a non-tolerant target failed in fail-fast mode.
    aborted: bool,
    interrupted: bool,
}

impl PlanState {
    pub fn new(plan: ExecutionPlan) -> Self {
        let len = plan.len();
        Self {
            plan,
            slots: vec![Slot::Pending; len],
            durations: vec![Duration::ZERO; len],
            running: 0,
            aborted: false,
            interrupted: false,
        }
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn running(&self) -> usize {
        self.running
    }

    pub fn is_finished(&self) -> bool {
        self.slots.iter().all(Slot::is_done)
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn state_of(&self, name: &str) -> Option<TargetRunState> {
        let index = self.plan.position(name)?;
        Some(match &self.slots[index] {
            Slot::Pending => TargetRunState::Pending,
            Slot::Running => TargetRunState::Running,
            Slot::Done(status) => TargetRunState::Done(status.clone()),
        })
    }

    /// Walk pending targets in plan order: record skips for those that can no
    /// longer run, and mark up to `capacity` runnable ones as `Running`.
    pub fn collect_ready(&mut self, max_parallel: usize) -> Vec<ScheduledTarget> {
        let mut ready = Vec::new();

        for index in 0..self.slots.len() {
            if self.slots[index] != Slot::Pending {
                continue;
            }
            let entry = &self.plan.entries()[index];
            if !entry.predecessors.iter().all(|&p| self.slots[p].is_done()) {
                continue;
            }

            if let Some(reason) = self.skip_reason(index) {
                info!(target_name = %entry.name, %reason, "skipping target");
                self.slots[index] = Slot::Done(TargetStatus::Skipped(reason));
                continue;
            }

            if self.running >= max_parallel {
                continue;
            }

            debug!(target_name = %entry.name, plan_index = index, "target ready");
            ready.push(ScheduledTarget {
                name: entry.name.clone(),
                plan_index: index,
            });
            self.slots[index] = Slot::Running;
            self.running += 1;
        }

        ready
    }

    /// Why the target at `index` must not start, if anything.
    fn skip_reason(&self, index: usize) -> Option<SkipReason> {
        let entries = self.plan.entries();
        let entry = &entries[index];

        for &dep in &entry.depends_on {
            match &self.slots[dep] {
                Slot::Done(TargetStatus::Succeeded) => {}
                Slot::Done(TargetStatus::Failed(_)) if entries[dep].proceed_after_failure => {}
                Slot::Done(TargetStatus::Failed(_)) => {
                    return Some(SkipReason::UpstreamFailure(entries[dep].name.clone()));
                }
                Slot::Done(TargetStatus::Skipped(reason)) => return Some(reason.clone()),
                Slot::Pending | Slot::Running => {}
            }
        }

        if self.interrupted {
            return Some(SkipReason::Interrupted);
        }
        if self.aborted && !entry.proceed_after_failure {
            return Some(SkipReason::AbortedByEarlierFailure);
        }
        None
    }

    /// Record the outcome of a dispatched target.
    ///
    /// Returns `false` (and changes nothing) for completions of targets that
    /// are not running.
    pub fn record_completion(
        &mut self,
        index: usize,
        outcome: TargetOutcome,
        duration: Duration,
        policy: FailurePolicy,
    ) -> bool {
        if self.slots.get(index) != Some(&Slot::Running) {
            warn!(plan_index = index, "completion for a target that is not running; ignoring");
            return false;
        }
        let entry = &self.plan.entries()[index];

        let status = match outcome {
            TargetOutcome::Succeeded => {
                info!(target_name = %entry.name, ?duration, "target succeeded");
                TargetStatus::Succeeded
            }
            TargetOutcome::Failed(reason) => {
                if entry.proceed_after_failure {
                    warn!(target_name = %entry.name, %reason, "tolerant target failed; proceeding");
                } else {
                    warn!(target_name = %entry.name, %reason, "target failed");
                    if policy == FailurePolicy::FailFast && !self.aborted {
                        info!("fail-fast: no further non-tolerant targets will start");
                        self.aborted = true;
                    }
                }
                TargetStatus::Failed(reason)
            }
        };

        self.slots[index] = Slot::Done(status);
        self.durations[index] = duration;
        self.running -= 1;
        true
    }

    /// Stop starting targets: every pending target becomes
    /// `Skipped(Interrupted)`. Running targets are left to finish.
    pub fn interrupt(&mut self) {
        self.interrupted = true;
        for slot in &mut self.slots {
            if *slot == Slot::Pending {
                *slot = Slot::Done(TargetStatus::Skipped(SkipReason::Interrupted));
            }
        }
    }

    /// Give up on every pending target. Only used when nothing is running
    /// and nothing can start, which a well-formed plan never produces.
    pub fn abandon_pending(&mut self) {
        for slot in &mut self.slots {
            if *slot == Slot::Pending {
                *slot = Slot::Done(TargetStatus::Skipped(SkipReason::AbortedByEarlierFailure));
            }
        }
    }

    pub fn into_report(self) -> RunReport {
        let interrupted = self.interrupted;
        let results = self
            .plan
            .entries()
            .iter()
            .zip(self.slots)
            .zip(self.durations)
            .map(|((entry, slot), duration)| TargetResult {
                name: entry.name.clone(),
                status: match slot {
                    Slot::Done(status) => status,
                    Slot::Pending | Slot::Running => TargetStatus::Skipped(SkipReason::Interrupted),
                },
                duration,
                tolerant: entry.proceed_after_failure,
            })
            .collect();
        RunReport::new(results, interrupted)
    }
}
