// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of spawning targets
//! itself. Production code uses [`RealExecutorBackend`], which runs each
//! target on its own Tokio task; tests can provide a fake that records the
//! dispatch order and emits `TargetCompleted` events directly.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::debug;

use crate::context::BuildContext;
use crate::dag::{ExecutionPlan, TargetGraph};
use crate::engine::{RuntimeEvent, ScheduledTarget, TargetName};
use crate::errors::Result;
use crate::partition::PartitionSlice;
use crate::target::{Target, TargetContext};

use super::runner::run_target;

/// Trait abstracting how scheduled targets are executed.
pub trait ExecutorBackend: Send {
    /// Start the given targets. Completion is reported asynchronously through
    /// `RuntimeEvent::TargetCompleted`.
    fn spawn_ready_targets(
        &mut self,
        targets: Vec<ScheduledTarget>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real executor backend used in production.
pub struct RealExecutorBackend {
    /// Planned targets, indexed by plan index.
    targets: Vec<Arc<Target>>,
    build: Arc<BuildContext>,
    slices: HashMap<TargetName, PartitionSlice>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl RealExecutorBackend {
    pub fn new(
        graph: &TargetGraph,
        plan: &ExecutionPlan,
        build: Arc<BuildContext>,
        slices: HashMap<TargetName, PartitionSlice>,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        let targets = plan
            .entries()
            .iter()
            .filter_map(|entry| graph.get(&entry.name).cloned())
            .collect();
        Self {
            targets,
            build,
            slices,
            runtime_tx,
        }
    }

    fn spawn_all(&self, scheduled: Vec<ScheduledTarget>) -> Result<()> {
        for st in scheduled {
            let target = self
                .targets
                .get(st.plan_index)
                .filter(|t| t.name == st.name)
                .cloned()
                .ok_or_else(|| anyhow!("target '{}' is not part of the plan", st.name))?;

            let ctx = TargetContext::new(
                st.name.clone(),
                self.build.clone(),
                self.slices.get(&st.name).cloned(),
            );
            debug!(target_name = %st.name, plan_index = st.plan_index, "spawning target");
            tokio::spawn(run_target(target, ctx, st.plan_index, self.runtime_tx.clone()));
        }
        Ok(())
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_targets(
        &mut self,
        targets: Vec<ScheduledTarget>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let spawned = self.spawn_all(targets);
        Box::pin(async move { spawned })
    }
}
