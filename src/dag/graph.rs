// src/dag/graph.rs

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;
use tracing::debug;

use crate::engine::TargetName;
use crate::errors::{BuilddagError, Relation, Result};
use crate::target::Target;

static TARGET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("target name pattern is valid")
});

/// Validated, read-only set of declared targets.
///
/// Targets keep their registration order ("declaration order"), which the
/// planner uses to break ties.
#[derive(Debug, Clone)]
pub struct TargetGraph {
    targets: Vec<Arc<Target>>,
    index: HashMap<TargetName, usize>,
}

impl TargetGraph {
    /// Validate `targets` and build the graph.
    ///
    /// Fails on duplicate or malformed names, references to undeclared
    /// targets, and cycles over `depends_on` + `triggers`.
    pub fn new(targets: Vec<Target>) -> Result<Self> {
        let mut index = HashMap::with_capacity(targets.len());
        for (i, target) in targets.iter().enumerate() {
            if !TARGET_NAME.is_match(&target.name) {
                return Err(BuilddagError::InvalidTargetName(target.name.clone()));
            }
            if index.insert(target.name.clone(), i).is_some() {
                return Err(BuilddagError::DuplicateTarget(target.name.clone()));
            }
        }

        validate_references(&targets, &index)?;
        validate_acyclic(&targets, &index)?;

        debug!(targets = targets.len(), "target graph validated");

        Ok(Self {
            targets: targets.into_iter().map(Arc::new).collect(),
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// All targets in declaration order.
    pub fn targets(&self) -> impl Iterator<Item = &Arc<Target>> {
        self.targets.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Target>> {
        self.index.get(name).map(|&i| &self.targets[i])
    }

    /// Declaration index of a target.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Direct `depends_on` entries of a target.
    pub fn dependencies_of(&self, name: &str) -> &[TargetName] {
        self.get(name)
            .map(|t| t.depends_on.as_slice())
            .unwrap_or(&[])
    }

    /// Targets that list `name` in their `depends_on`.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|t| t.depends_on.iter().any(|d| d == name))
            .map(|t| t.name.as_str())
            .collect()
    }
}

fn validate_references(targets: &[Target], index: &HashMap<TargetName, usize>) -> Result<()> {
    for target in targets {
        let relations = [
            (Relation::DependsOn, &target.depends_on),
            (Relation::Before, &target.before),
            (Relation::After, &target.after),
            (Relation::Triggers, &target.triggers),
        ];
        for (relation, names) in relations {
            if let Some(missing) = names.iter().find(|n| !index.contains_key(n.as_str())) {
                return Err(BuilddagError::UnknownTargetReference {
                    target: target.name.clone(),
                    relation,
                    reference: missing.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Check `depends_on` + `triggers` for cycles.
///
/// Edge direction: `waiter -> waited-for`. For
///   Compile.depends_on = ["Restore"]
/// we add Compile -> Restore; for `CC.triggers = ["Clean"]` we add
/// Clean -> CC, since a triggered target runs after its trigger.
fn validate_acyclic(targets: &[Target], index: &HashMap<TargetName, usize>) -> Result<()> {
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(targets.len(), 0);
    for i in 0..targets.len() {
        graph.add_node(i);
    }

    for (i, target) in targets.iter().enumerate() {
        for dep in &target.depends_on {
            graph.add_edge(NodeIndex::new(i), NodeIndex::new(index[dep.as_str()]), ());
        }
        for triggered in &target.triggers {
            graph.add_edge(NodeIndex::new(index[triggered.as_str()]), NodeIndex::new(i), ());
        }
    }

    if toposort(&graph, None).is_ok() {
        return Ok(());
    }

    let cycle = find_cycle(&graph)
        .into_iter()
        .map(|i| targets[i].name.clone())
        .collect();
    Err(BuilddagError::CyclicDependency { cycle })
}

/// Extract one concrete cycle from a graph known to contain one.
///
/// The cycle starts (and ends) at the lowest declaration index among the
/// members of the first cyclic strongly connected component, so the report
/// is stable across runs.
pub(crate) fn find_cycle(graph: &DiGraph<usize, ()>) -> Vec<usize> {
    let mut components: Vec<Vec<NodeIndex>> = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| {
            scc.len() > 1 || graph.contains_edge(scc[0], scc[0])
        })
        .collect();
    for scc in &mut components {
        scc.sort();
    }
    components.sort();

    let Some(scc) = components.first() else {
        return Vec::new();
    };
    let members: HashSet<NodeIndex> = scc.iter().copied().collect();
    let start = scc[0];

    // DFS restricted to the component until an edge leads back to `start`.
    let mut path = vec![start];
    let mut visited = HashSet::from([start]);
    let mut stack: Vec<Vec<NodeIndex>> = vec![sorted_neighbors(graph, start, &members)];

    while let Some(frontier) = stack.last_mut() {
        let Some(next) = frontier.pop() else {
            stack.pop();
            path.pop();
            continue;
        };
        if next == start {
            path.push(start);
            return path.into_iter().map(|n| graph[n]).collect();
        }
        if visited.insert(next) {
            path.push(next);
            stack.push(sorted_neighbors(graph, next, &members));
        }
    }

    scc.iter().map(|&n| graph[n]).collect()
}

/// Neighbors inside the component, reversed so `pop` yields ascending order.
fn sorted_neighbors(
    graph: &DiGraph<usize, ()>,
    node: NodeIndex,
    members: &HashSet<NodeIndex>,
) -> Vec<NodeIndex> {
    let mut next: Vec<NodeIndex> = graph
        .neighbors(node)
        .filter(|n| members.contains(n))
        .collect();
    next.sort();
    next.dedup();
    next.reverse();
    next
}
