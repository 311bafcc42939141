// tests/runtime_fake_executor.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, TargetConfigBuilder};
use crate::common::fake_executor::FakeExecutor;
use crate::common::{init_tracing, plan_for, with_timeout};

use std::error::Error;
use std::sync::{Arc, Mutex};

use builddag::config::ConfigFile;
use builddag::dag::ExecutionPlan;
use builddag::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use builddag::report::{FailureReason, RunReport, RunStatus, SkipReason, TargetStatus};
use builddag::types::FailurePolicy;
use tokio::sync::mpsc;

type TestResult = Result<(), Box<dyn Error>>;

fn body_failed() -> FailureReason {
    FailureReason::BodyFailed("exit code 1".into())
}

/// Run `plan` against a `FakeExecutor`; returns the report and dispatch order.
async fn run_with_fake(
    plan: ExecutionPlan,
    options: RuntimeOptions,
    failing: &[&str],
) -> Result<(RunReport, Vec<String>), Box<dyn Error>> {
    init_tracing();

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(32);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let mut executor = FakeExecutor::new(tx, executed.clone());
    for name in failing {
        executor = executor.fail(name, body_failed());
    }

    let runtime = Runtime::new(CoreRuntime::new(plan, options), rx, executor);
    let report = with_timeout(runtime.run()).await?;
    let order = executed.lock().unwrap().clone();
    Ok((report, order))
}

fn release_pipeline() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_target("Restore", TargetConfigBuilder::new().build())
        .with_target("Compile", TargetConfigBuilder::new().depends_on("Restore").build())
        .with_target("Test", TargetConfigBuilder::new().depends_on("Compile").build())
        .with_target("Lint", TargetConfigBuilder::new().build())
        .with_target(
            "Coverage",
            TargetConfigBuilder::new()
                .depends_on("Test")
                .proceed_after_failure()
                .build(),
        )
        .with_target(
            "Publish",
            TargetConfigBuilder::new()
                .depends_on("Coverage")
                .depends_on("Lint")
                .build(),
        )
        .build()
}

#[tokio::test]
async fn test_all_targets_run_in_plan_order() -> TestResult {
    let cfg = release_pipeline();
    let (_, plan) = plan_for(&cfg, &["Publish"]);

    let (report, order) = run_with_fake(plan, RuntimeOptions::default(), &[]).await?;

    assert_eq!(
        order,
        vec!["Restore", "Compile", "Test", "Lint", "Coverage", "Publish"]
    );
    assert_eq!(report.status(), RunStatus::Succeeded);
    assert_eq!(report.exit_code(), 0);
    assert!(report.results().iter().all(|r| r.status.is_success()));
    Ok(())
}

#[tokio::test]
async fn test_fail_fast_stops_starting_new_targets() -> TestResult {
    let cfg = release_pipeline();
    let (_, plan) = plan_for(&cfg, &["Publish"]);

    let (report, order) = run_with_fake(plan, RuntimeOptions::default(), &["Compile"]).await?;

    assert_eq!(order, vec!["Restore", "Compile"]);
    assert_eq!(report.status(), RunStatus::Failed);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(
        report.status_of("Test"),
        Some(&TargetStatus::Skipped(SkipReason::UpstreamFailure(
            "Compile".into()
        )))
    );
    // Lint is independent but fail-fast keeps it from starting.
    assert_eq!(
        report.status_of("Lint"),
        Some(&TargetStatus::Skipped(SkipReason::AbortedByEarlierFailure))
    );
    Ok(())
}

#[tokio::test]
async fn test_continue_mode_runs_independent_targets() -> TestResult {
    let cfg = release_pipeline();
    let (_, plan) = plan_for(&cfg, &["Publish"]);
    let options = RuntimeOptions {
        max_parallel: 1,
        failure_policy: FailurePolicy::Continue,
    };

    let (report, order) = run_with_fake(plan, options, &["Compile"]).await?;

    assert_eq!(order, vec!["Restore", "Compile", "Lint"]);
    assert_eq!(report.status_of("Lint"), Some(&TargetStatus::Succeeded));
    // The skip reason is carried down the chain.
    for name in ["Test", "Coverage", "Publish"] {
        assert_eq!(
            report.status_of(name),
            Some(&TargetStatus::Skipped(SkipReason::UpstreamFailure(
                "Compile".into()
            ))),
            "{name}"
        );
    }
    assert_eq!(report.failures().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_tolerant_failure_lets_dependents_run() -> TestResult {
    let cfg = release_pipeline();
    let (_, plan) = plan_for(&cfg, &["Publish"]);

    let (report, order) = run_with_fake(plan, RuntimeOptions::default(), &["Coverage"]).await?;

    assert_eq!(
        order,
        vec!["Restore", "Compile", "Test", "Lint", "Coverage", "Publish"]
    );
    assert!(matches!(
        report.status_of("Coverage"),
        Some(TargetStatus::Failed(FailureReason::BodyFailed(_)))
    ));
    assert_eq!(report.status_of("Publish"), Some(&TargetStatus::Succeeded));
    assert_eq!(report.status(), RunStatus::Succeeded);
    assert!(report.summary().contains("failed*"));
    Ok(())
}

#[tokio::test]
async fn test_requirement_failure_fails_the_run_even_when_tolerated() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_target(
            "Announce",
            TargetConfigBuilder::new()
                .requires_param("SLACK_WEBHOOK")
                .proceed_after_failure()
                .build(),
        )
        .build();
    let (_, plan) = plan_for(&cfg, &["Announce"]);

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(8);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx, executed).fail(
        "Announce",
        FailureReason::RequirementNotMet {
            index: 0,
            description: "parameter 'SLACK_WEBHOOK' is set".into(),
        },
    );
    let runtime = Runtime::new(CoreRuntime::new(plan, RuntimeOptions::default()), rx, executor);
    let report = with_timeout(runtime.run()).await?;

    assert_eq!(report.status(), RunStatus::Failed);
    assert_eq!(report.exit_code(), 1);
    Ok(())
}

#[tokio::test]
async fn test_parallel_slots_follow_plan_order() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_target("Restore", TargetConfigBuilder::new().build())
        .with_target("UnitTests", TargetConfigBuilder::new().depends_on("Restore").build())
        .with_target("Docs", TargetConfigBuilder::new().build())
        .with_target("Lint", TargetConfigBuilder::new().build())
        .with_target(
            "All",
            TargetConfigBuilder::new()
                .depends_on("UnitTests")
                .depends_on("Docs")
                .depends_on("Lint")
                .build(),
        )
        .with_max_parallel(2)
        .build();
    let (_, plan) = plan_for(&cfg, &["All"]);
    let options = RuntimeOptions {
        max_parallel: cfg.config.max_parallel,
        ..RuntimeOptions::default()
    };

    let (report, order) = run_with_fake(plan, options, &[]).await?;

    // Restore and Docs take the two slots first; All always runs last.
    assert_eq!(&order[..2], &["Restore", "Docs"]);
    assert_eq!(order.last().map(String::as_str), Some("All"));
    assert_eq!(order.len(), 5);
    assert_eq!(report.status(), RunStatus::Succeeded);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_before_start_skips_everything() -> TestResult {
    init_tracing();
    let cfg = release_pipeline();
    let (_, plan) = plan_for(&cfg, &["Test"]);

    let mut core = CoreRuntime::new(plan, RuntimeOptions::default());
    let step = core.step(RuntimeEvent::ShutdownRequested);
    assert!(!step.keep_running);

    let report = core.into_report();
    assert!(report.was_interrupted());
    assert_eq!(report.status(), RunStatus::Interrupted);
    assert_eq!(report.exit_code(), 130);
    assert!(report
        .results()
        .iter()
        .all(|r| r.status == TargetStatus::Skipped(SkipReason::Interrupted)));
    Ok(())
}
