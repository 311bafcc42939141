// tests/planning.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, TargetConfigBuilder};
use crate::common::plan_for;

use std::collections::{BTreeSet, HashSet};

use builddag::config::ConfigFile;
use builddag::dag::{plan, TargetGraph};
use builddag::errors::BuilddagError;
use proptest::prelude::*;

/// A pipeline shaped like a typical .NET build script.
fn pipeline() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_target("Clean", TargetConfigBuilder::new().before("Restore").build())
        .with_target("Restore", TargetConfigBuilder::new().build())
        .with_target("Compile", TargetConfigBuilder::new().depends_on("Restore").build())
        .with_target("Test", TargetConfigBuilder::new().depends_on("Compile").build())
        .with_target(
            "Coverage",
            TargetConfigBuilder::new()
                .depends_on("Test")
                .proceed_after_failure()
                .build(),
        )
        .with_target(
            "Pack",
            TargetConfigBuilder::new()
                .depends_on("Compile")
                .after("Test")
                .build(),
        )
        .with_target(
            "Publish",
            TargetConfigBuilder::new()
                .depends_on("Test")
                .depends_on("Pack")
                .build(),
        )
        .with_target("Lint", TargetConfigBuilder::new().before("Compile").build())
        .with_target(
            "Rebuild",
            TargetConfigBuilder::new()
                .triggers("Clean")
                .triggers("Compile")
                .build(),
        )
        .build()
}

#[test]
fn test_plan_is_the_dependency_closure() {
    let cfg = pipeline();
    let (_, plan) = plan_for(&cfg, &["Publish"]);
    assert_eq!(plan.names(), vec!["Restore", "Compile", "Test", "Pack", "Publish"]);

    let (_, plan) = plan_for(&cfg, &["Compile"]);
    assert_eq!(plan.names(), vec!["Restore", "Compile"]);
}

#[test]
fn test_soft_edges_only_reorder_members() {
    let cfg = pipeline();

    // Pack.after = Test only matters once Test is in the plan.
    let (_, plan) = plan_for(&cfg, &["Pack"]);
    assert_eq!(plan.names(), vec!["Restore", "Compile", "Pack"]);

    // Clean and Lint are ordered before their targets when requested too.
    let (_, plan) = plan_for(&cfg, &["Compile", "Lint", "Clean"]);
    assert_eq!(plan.names(), vec!["Clean", "Restore", "Lint", "Compile"]);
}

#[test]
fn test_triggers_extend_the_plan() {
    let cfg = pipeline();
    let (_, plan) = plan_for(&cfg, &["Rebuild"]);
    assert_eq!(plan.names(), vec!["Rebuild", "Clean", "Restore", "Compile"]);
    assert!(plan.get(0).unwrap().invoked);
    assert!(!plan.get(3).unwrap().invoked);
}

#[test]
fn test_multiple_entries_share_prerequisites() {
    let cfg = pipeline();
    let (_, plan) = plan_for(&cfg, &["Coverage", "Pack"]);
    assert_eq!(
        plan.names(),
        vec!["Restore", "Compile", "Test", "Coverage", "Pack"]
    );
    let names: HashSet<_> = plan.names().into_iter().collect();
    assert_eq!(names.len(), plan.len());
}

#[test]
fn test_contradicting_soft_edge_is_ambiguous() {
    let cfg = ConfigFileBuilder::new()
        .with_target("Restore", TargetConfigBuilder::new().after("Compile").build())
        .with_target("Compile", TargetConfigBuilder::new().depends_on("Restore").build())
        .build();
    let graph = TargetGraph::new(cfg.to_targets()).unwrap();

    match plan(&graph, &["Compile".to_string()]) {
        Err(BuilddagError::AmbiguousOrdering { cycle }) => {
            assert!(cycle.contains(&"Restore".to_string()));
            assert!(cycle.contains(&"Compile".to_string()));
        }
        other => panic!("Expected AmbiguousOrdering, got: {other:?}"),
    }
}

// Acyclic graphs: target N may only depend on targets 0..N-1, soft edges
// always point forward in declaration order.
fn dag_config_strategy(max_targets: usize) -> impl Strategy<Value = ConfigFile> {
    (1..=max_targets).prop_flat_map(|n| {
        let deps = proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..3), n);
        let soft = proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..2), n);
        (deps, soft).prop_map(move |(raw_deps, raw_soft)| {
            let mut builder = ConfigFileBuilder::new();
            for (i, (deps, soft)) in raw_deps.into_iter().zip(raw_soft).enumerate() {
                let mut target = TargetConfigBuilder::new();
                if i > 0 {
                    let deps: BTreeSet<usize> = deps.into_iter().map(|d| d % i).collect();
                    for d in deps {
                        target = target.depends_on(&format!("t{d}"));
                    }
                    let soft: BTreeSet<usize> = soft.into_iter().map(|s| s % i).collect();
                    for s in soft {
                        target = target.after(&format!("t{s}"));
                    }
                }
                builder = builder.with_target(&format!("t{i}"), target.build());
            }
            builder.build()
        })
    })
}

fn closure(graph: &TargetGraph, entries: &[String]) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<String> = entries.to_vec();
    while let Some(name) = stack.pop() {
        if seen.insert(name.clone()) {
            stack.extend(graph.dependencies_of(&name).iter().cloned());
        }
    }
    seen
}

proptest! {
    #[test]
    fn prop_plan_is_exact_closure_in_valid_order(
        cfg in dag_config_strategy(12),
        picks in proptest::collection::vec(any::<usize>(), 1..4),
    ) {
        let graph = TargetGraph::new(cfg.to_targets()).unwrap();
        let names: Vec<String> = graph.targets().map(|t| t.name.clone()).collect();
        let entries: Vec<String> = picks.iter().map(|p| names[p % names.len()].clone()).collect();

        let first = plan(&graph, &entries).unwrap();
        let again = plan(&graph, &entries).unwrap();
        prop_assert_eq!(&first, &again);

        let planned: BTreeSet<String> = first.names().into_iter().collect();
        prop_assert_eq!(planned.len(), first.len());
        prop_assert_eq!(planned, closure(&graph, &entries));

        for (i, entry) in first.entries().iter().enumerate() {
            for dep in graph.dependencies_of(&entry.name) {
                let pos = first.position(dep).unwrap();
                prop_assert!(pos < i, "{} must precede {}", dep, entry.name);
            }
            for other in &graph.get(&entry.name).unwrap().after {
                if let Some(pos) = first.position(other) {
                    prop_assert!(pos < i, "{} must precede {}", other, entry.name);
                }
            }
        }
    }
}
