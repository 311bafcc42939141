// src/lib.rs

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod context;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod partition;
pub mod report;
pub mod target;
pub mod types;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::context::{resolve_parameters, BuildContext, BuildContextBuilder};
use crate::dag::{plan, ExecutionPlan, TargetGraph};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, TargetName};
use crate::errors::{BuilddagError, Result};
use crate::exec::RealExecutorBackend;
use crate::partition::PartitionSlice;
use crate::report::RunReport;
use crate::target::Requirement;
use crate::types::FailurePolicy;

/// A plan together with everything resolved before execution starts.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub plan: ExecutionPlan,
    pub build: Arc<BuildContext>,
    /// Selected slice per partitioned target.
    pub slices: HashMap<TargetName, PartitionSlice>,
}

impl PreparedRun {
    /// `(target, parameter)` pairs for planned targets whose `requires` names
    /// a parameter that has no value. Those targets will fail with
    /// `RequirementNotMet` when they are reached.
    pub fn unset_parameters(&self, graph: &TargetGraph) -> Vec<(TargetName, String)> {
        let mut unset = Vec::new();
        for entry in self.plan.entries() {
            let Some(target) = graph.get(&entry.name) else {
                continue;
            };
            for requirement in &target.requires {
                let name = match requirement {
                    Requirement::Parameter(name) | Requirement::ParameterEquals { name, .. } => name,
                    Requirement::Command(_) | Requirement::Predicate { .. } => continue,
                };
                if !self.build.has_param(name) {
                    unset.push((entry.name.clone(), name.clone()));
                }
            }
        }
        unset
    }
}

/// Plan `entries` and resolve partitions.
///
/// Every error here is fatal and happens before any target runs.
pub fn prepare(
    graph: &TargetGraph,
    entries: &[TargetName],
    build: BuildContextBuilder,
) -> Result<PreparedRun> {
    if entries.is_empty() {
        return Err(BuilddagError::NoTargetRequested);
    }
    let plan = plan(graph, entries)?;
    let build = build
        .invoked(entries.to_vec())
        .planned(plan.names())
        .build();

    let mut slices = HashMap::new();
    for entry in plan.entries() {
        let Some(spec) = graph.get(&entry.name).and_then(|t| t.partition.as_ref()) else {
            continue;
        };
        let slice = partition::resolve(
            &entry.name,
            spec,
            build.partition_index(),
            build.fs(),
            build.root_dir(),
        )?;
        info!(
            target_name = %entry.name,
            index = ?slice.index,
            count = slice.count,
            items = slice.items.len(),
            "partition resolved"
        );
        slices.insert(entry.name.clone(), slice);
    }

    let prepared = PreparedRun {
        plan,
        build: Arc::new(build),
        slices,
    };
    for (target, param) in prepared.unset_parameters(graph) {
        warn!(
            target_name = %target,
            %param,
            "required parameter has no value; the target will fail when reached"
        );
    }
    Ok(prepared)
}

/// Execute a prepared run with the real executor and return the results.
///
/// Ctrl-C stops new targets from starting; running ones finish.
pub async fn execute(
    graph: &TargetGraph,
    prepared: PreparedRun,
    options: RuntimeOptions,
) -> Result<RunReport> {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let executor = RealExecutorBackend::new(
        graph,
        &prepared.plan,
        prepared.build,
        prepared.slices,
        rt_tx.clone(),
    );

    let ctrl_c = {
        let tx = rt_tx;
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        })
    };

    let core = CoreRuntime::new(prepared.plan, options);
    let report = Runtime::new(core, rt_rx, executor).run().await;
    ctrl_c.abort();
    report
}

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together config loading, graph validation, parameter
/// resolution, planning, partition selection, the runtime and the summary.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let graph = TargetGraph::new(cfg.to_targets())?;

    if args.list {
        print_targets(&cfg, &graph);
        return Ok(0);
    }

    let entries = requested_targets(&args, &cfg)?;
    let params = resolve_parameters(&cfg.parameter_decls(), &args.params, |name| {
        std::env::var(name).ok()
    })?;
    let root = args
        .root
        .clone()
        .unwrap_or_else(|| config_root_dir(&config_path));

    let builder = BuildContext::builder(root)
        .output_dir(&cfg.config.output_dir)
        .params(params)
        .partition_index(args.partition);
    let prepared = prepare(&graph, &entries, builder)?;

    if args.plan {
        print_plan(&graph, &prepared);
        return Ok(0);
    }

    let options = RuntimeOptions {
        max_parallel: args.parallel.unwrap_or(cfg.config.max_parallel),
        failure_policy: if args.continue_on_failure {
            FailurePolicy::Continue
        } else {
            cfg.config.failure_policy
        },
    };
    debug!(?options, "runtime options");

    let report = execute(&graph, prepared, options).await?;
    print!("{report}");
    Ok(report.exit_code())
}

fn requested_targets(args: &CliArgs, cfg: &ConfigFile) -> Result<Vec<TargetName>> {
    if !args.targets.is_empty() {
        return Ok(args.targets.clone());
    }
    cfg.config
        .default_target
        .clone()
        .map(|t| vec![t])
        .ok_or(BuilddagError::NoTargetRequested)
}

/// Project root for a config path.
///
/// - A config path with a non-empty parent (e.g. "ci/Builddag.toml") uses
///   that directory.
/// - A bare filename like "Builddag.toml" falls back to the current working
///   directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// `--list` output: declared targets with their direct relations.
fn print_targets(cfg: &ConfigFile, graph: &TargetGraph) {
    println!("targets ({}):", graph.len());
    for target in graph.targets() {
        let marker = if cfg.config.default_target.as_deref() == Some(target.name.as_str()) {
            " (default)"
        } else {
            ""
        };
        match &target.description {
            Some(desc) => println!("  {}{marker}  {desc}", target.name),
            None => println!("  {}{marker}", target.name),
        }
        if !target.depends_on.is_empty() {
            println!("      depends_on: {}", target.depends_on.join(", "));
        }
        if !target.triggers.is_empty() {
            println!("      triggers: {}", target.triggers.join(", "));
        }
    }
}

/// `--plan` output: the plan in order, with what each target waits for.
fn print_plan(graph: &TargetGraph, prepared: &PreparedRun) {
    let entries = prepared.plan.entries();
    println!("builddag plan ({} targets)", entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let mut line = format!("  {:>2}. {}", i + 1, entry.name);
        if let Some(slice) = prepared.slices.get(&entry.name) {
            match slice.index {
                Some(index) => line.push_str(&format!(" [partition {}/{}]", index + 1, slice.count)),
                None => line.push_str(&format!(" [all {} partitions]", slice.count)),
            }
        }
        if entry.proceed_after_failure {
            line.push_str(" (proceed after failure)");
        }
        println!("{line}");

        if !entry.predecessors.is_empty() {
            let waits: Vec<&str> = entry
                .predecessors
                .iter()
                .map(|&p| entries[p].name.as_str())
                .collect();
            println!("      after: {}", waits.join(", "));
        }
        if let Some(body) = graph.get(&entry.name).and_then(|t| t.body.describe()) {
            println!("      cmd: {body}");
        }
    }

    let unset = prepared.unset_parameters(graph);
    if !unset.is_empty() {
        println!();
        println!("warnings:");
        for (target, param) in &unset {
            println!("  {target} requires parameter '{param}', which has no value");
        }
    }

    let params = prepared.build.params();
    if !params.is_empty() {
        println!();
        println!("parameters:");
        for (name, value) in params {
            println!("  {name} = {}", value.display());
        }
    }
}
