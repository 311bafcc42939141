// src/dag/planner.rs

//! Execution planning.
//!
//! Given a validated [`TargetGraph`] and the requested entry targets, compute
//! the deterministic, ordered list of targets to run:
//!
//! 1. the `depends_on` closure of the entries,
//! 2. extended to a fixpoint by `triggers` (each newly pulled-in target, and
//!    its own closure, is ordered after the target that triggered it),
//! 3. topologically sorted with hard (`depends_on`, `triggers`) and soft
//!    (`before` / `after`) edges between members, ties broken by declaration
//!    order.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, info};

use crate::dag::graph::{find_cycle, TargetGraph};
use crate::engine::TargetName;
use crate::errors::{BuilddagError, Result};

/// One entry of an [`ExecutionPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTarget {
    pub name: TargetName,
    /// Plan indices that must be terminal before this target may start.
    pub predecessors: Vec<usize>,
    /// Plan indices of direct `depends_on` entries (a subset of
    /// `predecessors`).
    pub depends_on: Vec<usize>,
    pub proceed_after_failure: bool,
    /// Whether the invoker asked for this target explicitly.
    pub invoked: bool,
}

/// Ordered, immutable list of targets to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    entries: Vec<PlannedTarget>,
}

impl ExecutionPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PlannedTarget] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&PlannedTarget> {
        self.entries.get(index)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn names(&self) -> Vec<TargetName> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.entries.iter().map(|e| e.name.as_str()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Compute the plan for `entries`.
pub fn plan(graph: &TargetGraph, entries: &[TargetName]) -> Result<ExecutionPlan> {
    let mut requested: Vec<usize> = Vec::with_capacity(entries.len());
    for name in entries {
        let pos = graph
            .position(name)
            .ok_or_else(|| BuilddagError::UnknownEntryTarget(name.clone()))?;
        if !requested.contains(&pos) {
            requested.push(pos);
        }
    }

    let (members, trigger_edges) = collect_members(graph, &requested);
    let order = sort_members(graph, &members, &trigger_edges)?;

    let plan_pos: HashMap<usize, usize> =
        order.iter().enumerate().map(|(p, &decl)| (decl, p)).collect();
    let edges = ordering_edges(graph, &members, &trigger_edges);

    let targets: Vec<_> = graph.targets().collect();
    let mut planned: Vec<PlannedTarget> = order
        .iter()
        .map(|&decl| PlannedTarget {
            name: targets[decl].name.clone(),
            predecessors: Vec::new(),
            depends_on: Vec::new(),
            proceed_after_failure: targets[decl].proceed_after_failure,
            invoked: requested.contains(&decl),
        })
        .collect();

    for (from, to) in edges {
        let (from, to) = (plan_pos[&from], plan_pos[&to]);
        let preds = &mut planned[to].predecessors;
        if !preds.contains(&from) {
            preds.push(from);
        }
    }
    for (p, &decl) in order.iter().enumerate() {
        let deps = graph.dependencies_of(&planned[p].name).to_vec();
        let mut dep_positions: Vec<usize> = deps
            .iter()
            .filter_map(|d| graph.position(d))
            .filter_map(|d| plan_pos.get(&d).copied())
            .collect();
        dep_positions.sort_unstable();
        dep_positions.dedup();
        planned[p].depends_on = dep_positions;
        planned[p].predecessors.sort_unstable();
        debug!(
            target_name = %planned[p].name,
            declaration = decl,
            predecessors = ?planned[p].predecessors,
            "planned target"
        );
    }

    let plan = ExecutionPlan { entries: planned };
    info!(%plan, "execution plan computed");
    Ok(plan)
}

/// `depends_on` closure of the requested targets, extended by `triggers`.
///
/// Returns the member set (declaration indices) and the extra ordering edges
/// `(trigger, pulled_in)` introduced by trigger extension.
fn collect_members(
    graph: &TargetGraph,
    requested: &[usize],
) -> (BTreeSet<usize>, Vec<(usize, usize)>) {
    let targets: Vec<_> = graph.targets().collect();
    let mut members = BTreeSet::new();
    let mut trigger_edges = Vec::new();

    let closure_into = |start: usize, members: &mut BTreeSet<usize>| -> Vec<usize> {
        let mut added = Vec::new();
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            if !members.insert(i) {
                continue;
            }
            added.push(i);
            for dep in &targets[i].depends_on {
                if let Some(d) = graph.position(dep) {
                    stack.push(d);
                }
            }
        }
        added
    };

    for &entry in requested {
        closure_into(entry, &mut members);
    }

    // Trigger extension to a fixpoint, scanning in declaration order.
    let mut scanned = BTreeSet::new();
    loop {
        let Some(&next) = members.iter().find(|m| !scanned.contains(*m)) else {
            break;
        };
        scanned.insert(next);

        for triggered in &targets[next].triggers {
            let Some(t) = graph.position(triggered) else {
                continue;
            };
            trigger_edges.push((next, t));
            for added in closure_into(t, &mut members) {
                if added != t {
                    trigger_edges.push((next, added));
                }
            }
        }
    }

    (members, trigger_edges)
}

/// All ordering edges `(earlier, later)` between members.
fn ordering_edges(
    graph: &TargetGraph,
    members: &BTreeSet<usize>,
    trigger_edges: &[(usize, usize)],
) -> Vec<(usize, usize)> {
    let targets: Vec<_> = graph.targets().collect();
    let mut edges = Vec::new();

    for &m in members {
        let target = &targets[m];
        let in_plan = |name: &TargetName| graph.position(name).filter(|p| members.contains(p));

        for dep in target.depends_on.iter().filter_map(in_plan) {
            edges.push((dep, m));
        }
        for later in target.before.iter().filter_map(in_plan) {
            edges.push((m, later));
        }
        for earlier in target.after.iter().filter_map(in_plan) {
            edges.push((earlier, m));
        }
        for triggered in target.triggers.iter().filter_map(in_plan) {
            edges.push((m, triggered));
        }
    }
    edges.extend_from_slice(trigger_edges);
    edges.sort_unstable();
    edges.dedup();
    edges
}

/// Kahn's algorithm with a min-heap over declaration indices.
fn sort_members(
    graph: &TargetGraph,
    members: &BTreeSet<usize>,
    trigger_edges: &[(usize, usize)],
) -> Result<Vec<usize>> {
    let edges = ordering_edges(graph, members, trigger_edges);

    let mut in_degree: HashMap<usize, usize> = members.iter().map(|&m| (m, 0)).collect();
    let mut successors: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(from, to) in &edges {
        *in_degree.entry(to).or_default() += 1;
        successors.entry(from).or_default().push(to);
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .filter(|&(_, &d)| d == 0)
        .map(|(&m, _)| Reverse(m))
        .collect();
    let mut order = Vec::with_capacity(members.len());

    while let Some(Reverse(m)) = ready.pop() {
        order.push(m);
        for &next in successors.get(&m).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(d) = in_degree.get_mut(&next) {
                *d -= 1;
                if *d == 0 {
                    ready.push(Reverse(next));
                }
            }
        }
    }

    if order.len() != members.len() {
        let stuck: Vec<usize> = members
            .iter()
            .copied()
            .filter(|m| !order.contains(m))
            .collect();
        return Err(BuilddagError::AmbiguousOrdering {
            cycle: ordering_cycle(graph, &stuck, &edges),
        });
    }

    Ok(order)
}

/// Names on one ordering cycle among the `stuck` members.
fn ordering_cycle(graph: &TargetGraph, stuck: &[usize], edges: &[(usize, usize)]) -> Vec<TargetName> {
    let names: Vec<TargetName> = graph.targets().map(|t| t.name.clone()).collect();

    // Edge direction flipped to `later -> earlier` to read like "waits for".
    let mut sub: DiGraph<usize, ()> = DiGraph::new();
    let nodes: HashMap<usize, NodeIndex> =
        stuck.iter().map(|&s| (s, sub.add_node(s))).collect();
    for (from, to) in edges {
        if let (Some(&f), Some(&t)) = (nodes.get(from), nodes.get(to)) {
            sub.add_edge(t, f, ());
        }
    }

    let cycle = find_cycle(&sub);
    let members = if cycle.is_empty() { stuck.to_vec() } else { cycle };
    members.into_iter().map(|i| names[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Target;

    fn t(name: &str) -> Target {
        Target::new(name)
    }

    fn names(plan: &ExecutionPlan) -> Vec<String> {
        plan.names()
    }

    fn entries(list: &[&str]) -> Vec<TargetName> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn chain_is_planned_dependencies_first() {
        let graph = TargetGraph::new(vec![
            t("A").depends_on(["B"]),
            t("B").depends_on(["C"]),
            t("C"),
        ])
        .unwrap();

        let plan = plan(&graph, &entries(&["A"])).unwrap();
        assert_eq!(names(&plan), vec!["C", "B", "A"]);
        assert!(plan.get(2).unwrap().invoked);
        assert!(!plan.get(0).unwrap().invoked);
        assert_eq!(plan.get(2).unwrap().depends_on, vec![1]);
    }

    #[test]
    fn targets_outside_the_closure_are_excluded() {
        let graph = TargetGraph::new(vec![
            t("Restore"),
            t("Compile").depends_on(["Restore"]),
            t("Pack").depends_on(["Compile"]),
            t("Lint"),
        ])
        .unwrap();

        let plan = plan(&graph, &entries(&["Compile"])).unwrap();
        assert_eq!(names(&plan), vec!["Restore", "Compile"]);
    }

    #[test]
    fn soft_edges_reorder_but_never_pull_in() {
        let graph = TargetGraph::new(vec![
            t("Restore"),
            t("Clean").before(["Restore"]),
            t("X").before(["Y"]),
            t("Y"),
            t("Compile").depends_on(["Restore", "Clean"]),
        ])
        .unwrap();

        let only_restore = plan(&graph, &entries(&["Restore"])).unwrap();
        assert_eq!(names(&only_restore), vec!["Restore"]);

        let compile = plan(&graph, &entries(&["Compile"])).unwrap();
        assert_eq!(names(&compile), vec!["Clean", "Restore", "Compile"]);
    }

    #[test]
    fn after_edges_apply_between_members() {
        let graph = TargetGraph::new(vec![
            t("Report").after(["Test"]),
            t("Test"),
            t("All").depends_on(["Report", "Test"]),
        ])
        .unwrap();

        let plan = plan(&graph, &entries(&["All"])).unwrap();
        assert_eq!(names(&plan), vec!["Test", "Report", "All"]);
        let report = plan.get(1).unwrap();
        assert_eq!(report.predecessors, vec![0]);
        assert!(report.depends_on.is_empty());
    }

    #[test]
    fn ties_follow_declaration_order() {
        let graph = TargetGraph::new(vec![
            t("Zeta"),
            t("Alpha"),
            t("Mid"),
            t("All").depends_on(["Mid", "Alpha", "Zeta"]),
        ])
        .unwrap();

        let plan = plan(&graph, &entries(&["All"])).unwrap();
        assert_eq!(names(&plan), vec!["Zeta", "Alpha", "Mid", "All"]);
    }

    #[test]
    fn triggers_extend_the_plan_after_the_trigger() {
        let graph = TargetGraph::new(vec![
            t("Clean").before(["Restore"]),
            t("Restore"),
            t("Compile").depends_on(["Restore"]),
            t("CC").triggers(["Clean", "Compile"]),
        ])
        .unwrap();

        let plan = plan(&graph, &entries(&["CC"])).unwrap();
        assert_eq!(names(&plan), vec!["CC", "Clean", "Restore", "Compile"]);

        let restore = plan.position("Restore").unwrap();
        assert!(plan.get(restore).unwrap().predecessors.contains(&0));
    }

    #[test]
    fn duplicate_entries_are_planned_once() {
        let graph = TargetGraph::new(vec![t("A"), t("B").depends_on(["A"])]).unwrap();
        let plan = plan(&graph, &entries(&["B", "A", "B"])).unwrap();
        assert_eq!(names(&plan), vec!["A", "B"]);
    }

    #[test]
    fn unknown_entry_is_rejected() {
        let graph = TargetGraph::new(vec![t("A")]).unwrap();
        assert!(matches!(
            plan(&graph, &entries(&["Nope"])),
            Err(BuilddagError::UnknownEntryTarget(n)) if n == "Nope"
        ));
    }

    #[test]
    fn contradicting_soft_edges_are_ambiguous() {
        let graph = TargetGraph::new(vec![
            t("A").before(["B"]),
            t("B").before(["A"]),
            t("All").depends_on(["A", "B"]),
        ])
        .unwrap();

        match plan(&graph, &entries(&["All"])) {
            Err(BuilddagError::AmbiguousOrdering { cycle }) => {
                assert!(cycle.contains(&"A".to_string()));
                assert!(cycle.contains(&"B".to_string()));
                assert!(!cycle.contains(&"All".to_string()));
            }
            other => panic!("expected AmbiguousOrdering, got {other:?}"),
        }
    }

    #[test]
    fn planning_is_deterministic() {
        let graph = TargetGraph::new(vec![
            t("D"),
            t("C").depends_on(["D"]),
            t("B").depends_on(["D"]),
            t("A").depends_on(["B", "C"]),
        ])
        .unwrap();

        let first = plan(&graph, &entries(&["A"])).unwrap();
        for _ in 0..10 {
            assert_eq!(plan(&graph, &entries(&["A"])).unwrap(), first);
        }
        assert_eq!(first.to_string(), "[D, C, B, A]");
    }
}
