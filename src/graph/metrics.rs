//! Cycle detection and graph metrics.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Per-node coupling numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub fan_in: usize,
    pub fan_out: usize,
    pub in_cycle: bool,
}

/// Whole-graph summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphMetrics {
    pub node_count: usize,
    /// Distinct edges, self-loops excluded.
    pub edge_count: usize,
    pub external_count: usize,
    /// Longest dependency chain, counting each cycle cluster as one step.
    pub max_depth: usize,
    pub average_fan_out: f64,
    pub cyclic_cluster_count: usize,
    /// Modules whose fan-in reaches the configured threshold, most depended-on first.
    pub high_coupling: Vec<String>,
}

/// Everything derived from the node and edge sets.
#[derive(Debug, Default)]
pub(super) struct Analysis {
    pub node_metrics: BTreeMap<String, NodeMetrics>,
    pub cycles: Vec<Vec<String>>,
    pub metrics: GraphMetrics,
}

/// Compute metrics over `nodes` and `edges`.
///
/// Duplicate edges and self-loops are dropped first. Edge endpoints must be
/// in `nodes`; edges that are not are ignored.
pub(super) fn analyze(
    nodes: &[String],
    edges: &[(String, String)],
    external_count: usize,
    high_coupling_fan_in: usize,
) -> Analysis {
    let mut graph: DiGraph<&str, ()> = DiGraph::with_capacity(nodes.len(), edges.len());
    let mut ids: HashMap<&str, NodeIndex> = HashMap::with_capacity(nodes.len());
    for node in nodes {
        ids.insert(node.as_str(), graph.add_node(node.as_str()));
    }

    let distinct: BTreeSet<(&str, &str)> = edges
        .iter()
        .map(|(from, to)| (from.as_str(), to.as_str()))
        .filter(|(from, to)| from != to)
        .collect();

    let mut node_metrics: BTreeMap<String, NodeMetrics> = nodes
        .iter()
        .map(|n| (n.clone(), NodeMetrics::default()))
        .collect();

    let mut edge_count = 0;
    for (from, to) in &distinct {
        let (Some(&a), Some(&b)) = (ids.get(from), ids.get(to)) else {
            continue;
        };
        graph.add_edge(a, b, ());
        edge_count += 1;
        if let Some(m) = node_metrics.get_mut(*from) {
            m.fan_out += 1;
        }
        if let Some(m) = node_metrics.get_mut(*to) {
            m.fan_in += 1;
        }
    }

    // Components come back in reverse topological order.
    let components = tarjan_scc(&graph);

    let mut cycles: Vec<Vec<String>> = Vec::new();
    for component in components.iter().filter(|c| c.len() > 1) {
        let mut members: Vec<String> = component.iter().map(|&i| graph[i].to_string()).collect();
        members.sort();
        for member in &members {
            if let Some(m) = node_metrics.get_mut(member) {
                m.in_cycle = true;
            }
        }
        cycles.push(members);
    }
    cycles.sort();

    let max_depth = condensed_depth(&graph, &components);

    let average_fan_out = if nodes.is_empty() {
        0.0
    } else {
        ((edge_count as f64 / nodes.len() as f64) * 100.0).round() / 100.0
    };

    let mut high_coupling: Vec<(&String, usize)> = node_metrics
        .iter()
        .filter(|(_, m)| high_coupling_fan_in > 0 && m.fan_in >= high_coupling_fan_in)
        .map(|(path, m)| (path, m.fan_in))
        .collect();
    high_coupling.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let metrics = GraphMetrics {
        node_count: nodes.len(),
        edge_count,
        external_count,
        max_depth,
        average_fan_out,
        cyclic_cluster_count: cycles.len(),
        high_coupling: high_coupling.into_iter().map(|(p, _)| p.clone()).collect(),
    };

    Analysis {
        node_metrics,
        cycles,
        metrics,
    }
}

#[derive(Clone, Copy)]
enum Visit {
    Unvisited,
    InProgress,
    Done(usize),
}

/// Longest path, in edges, through the condensation of `graph`.
///
/// Iterative depth-first search over components. The visit state doubles as
/// the recursion guard: an in-progress component reached again contributes
/// nothing instead of being re-entered.
fn condensed_depth(graph: &DiGraph<&str, ()>, components: &[Vec<NodeIndex>]) -> usize {
    let mut component_of = vec![0usize; graph.node_count()];
    for (c, members) in components.iter().enumerate() {
        for node in members {
            component_of[node.index()] = c;
        }
    }

    let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); components.len()];
    for edge in graph.raw_edges() {
        let from = component_of[edge.source().index()];
        let to = component_of[edge.target().index()];
        if from != to {
            successors[from].insert(to);
        }
    }
    let successors: Vec<Vec<usize>> = successors
        .into_iter()
        .map(|s| s.into_iter().collect())
        .collect();

    let mut visit = vec![Visit::Unvisited; components.len()];
    let mut deepest = 0;

    for start in 0..components.len() {
        if !matches!(visit[start], Visit::Unvisited) {
            continue;
        }

        // (component, index of the next successor to look at)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        visit[start] = Visit::InProgress;

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            if let Some(&succ) = successors[node].get(top.1) {
                top.1 += 1;
                if matches!(visit[succ], Visit::Unvisited) {
                    visit[succ] = Visit::InProgress;
                    stack.push((succ, 0));
                }
                continue;
            }

            let depth = successors[node]
                .iter()
                .map(|&s| match visit[s] {
                    Visit::Done(d) => d + 1,
                    _ => 0,
                })
                .max()
                .unwrap_or(0);
            visit[node] = Visit::Done(depth);
            deepest = deepest.max(depth);
            stack.pop();
        }
    }

    deepest
}
