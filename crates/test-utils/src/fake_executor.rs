use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use builddag::engine::{RuntimeEvent, ScheduledTarget, TargetOutcome};
use builddag::errors::Result;
use builddag::exec::ExecutorBackend;
use builddag::report::FailureReason;
use tokio::sync::mpsc;

/// A fake executor that:
/// - records which targets were dispatched, in order
/// - immediately reports `TargetCompleted` for each of them, succeeding
///   unless a failure was scripted with [`FakeExecutor::fail`].
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    failures: HashMap<String, FailureReason>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            runtime_tx,
            executed,
            failures: HashMap::new(),
        }
    }

    /// Make `target` fail with `reason` whenever it is dispatched.
    pub fn fail(mut self, target: &str, reason: FailureReason) -> Self {
        self.failures.insert(target.to_string(), reason);
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_targets(
        &mut self,
        targets: Vec<ScheduledTarget>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let failures = self.failures.clone();

        Box::pin(async move {
            for t in targets {
                executed.lock().unwrap().push(t.name.clone());

                let outcome = match failures.get(&t.name) {
                    Some(reason) => TargetOutcome::Failed(reason.clone()),
                    None => TargetOutcome::Succeeded,
                };
                tx.send(RuntimeEvent::TargetCompleted {
                    target: t.name.clone(),
                    plan_index: t.plan_index,
                    outcome,
                    duration: Duration::ZERO,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
