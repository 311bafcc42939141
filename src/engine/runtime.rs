// src/engine/runtime.rs

use std::fmt;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::ScheduledTarget;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::report::RunReport;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Drives the plan in response to `RuntimeEvent`s and delegates target
/// execution to an `ExecutorBackend`.
///
/// All scheduling semantics live in `CoreRuntime`; this struct only reads
/// events from the channel and dispatches targets to the executor.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
        }
    }

    /// Run the plan to completion and return the per-target results.
    pub async fn run(mut self) -> Result<RunReport> {
        info!("builddag runtime started");

        let mut step = self.core.start();
        loop {
            for command in step.commands {
                self.execute_command(command).await?;
            }
            if !step.keep_running {
                break;
            }

            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    return Err(anyhow!(
                        "runtime event channel closed with {} target(s) still running",
                        self.core.running()
                    )
                    .into());
                }
            };
            debug!(?event, "runtime received event");

            step = self.core.step(event);
        }

        info!("all planned targets are terminal; runtime exiting");
        Ok(self.core.into_report())
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTargets(targets) => self.spawn_ready(targets).await?,
            CoreCommand::Finished => debug!("core reported plan finished"),
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, targets: Vec<ScheduledTarget>) -> Result<()> {
        if targets.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = targets.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, "spawning ready targets");

        self.executor.spawn_ready_targets(targets).await
    }
}
