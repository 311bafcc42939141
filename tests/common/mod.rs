#![allow(dead_code)]

pub use builddag_test_utils::{builders, fake_executor, init_tracing, with_timeout};

use builddag::config::ConfigFile;
use builddag::dag::{plan, ExecutionPlan, TargetGraph};

/// Graph + plan for `entries` of a config built in a test.
pub fn plan_for(cfg: &ConfigFile, entries: &[&str]) -> (TargetGraph, ExecutionPlan) {
    let graph = TargetGraph::new(cfg.to_targets()).expect("valid graph");
    let entries: Vec<String> = entries.iter().map(|s| s.to_string()).collect();
    let plan = plan(&graph, &entries).expect("valid plan");
    (graph, plan)
}
