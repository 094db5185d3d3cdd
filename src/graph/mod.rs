//! Dependency graph builder.
//!
//! Every non-binary file is a node. Each file is read once, its references
//! are extracted by the extractor registered for its language, and each
//! reference is resolved either to repository files (edges) or to an
//! external reference. Cycle clusters and coupling metrics are computed over
//! the deduplicated edge set.

mod extract;
mod languages;
mod metrics;
mod resolve;

pub use extract::{ExtractorRegistry, RawReference, ReferenceExtractor};
pub use metrics::{GraphMetrics, NodeMetrics};
pub use resolve::PathIndex;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::config::GraphSettings;
use crate::scan::Inventory;
use crate::state::{Degraded, DegradedKind, Stage};
use crate::workers;

/// A resolved reference between two repository files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    /// Line of the reference in `from`.
    pub line: usize,
}

/// A reference that did not resolve to a repository file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalReference {
    pub from: String,
    pub target: String,
    pub line: usize,
}

/// The graph stage's section of the analysis state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    /// Sorted node paths.
    pub nodes: Vec<String>,
    /// Raw edges sorted by (from, line, to). Kept as extracted.
    pub edges: Vec<Edge>,
    pub external: Vec<ExternalReference>,
    pub node_metrics: BTreeMap<String, NodeMetrics>,
    /// Strongly connected components of more than one node.
    pub cycles: Vec<Vec<String>>,
    pub metrics: GraphMetrics,
}

impl DependencyGraph {
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.iter().any(|e| e.from == from && e.to == to)
    }

    /// Size of the largest cycle cluster.
    pub fn largest_cycle(&self) -> usize {
        self.cycles.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Graph stage result.
#[derive(Debug)]
pub struct GraphOutput {
    pub graph: DependencyGraph,
    pub degraded: Vec<Degraded>,
}

/// What one file contributed.
struct FileReferences {
    edges: Vec<Edge>,
    external: Vec<ExternalReference>,
    failure: Option<Degraded>,
}

impl FileReferences {
    fn empty() -> Self {
        Self {
            edges: Vec::new(),
            external: Vec::new(),
            failure: None,
        }
    }

    fn failed(path: &str, message: String) -> Self {
        Self {
            failure: Some(Degraded::new(Stage::Graph, DegradedKind::File, path, message)),
            ..Self::empty()
        }
    }
}

/// Build the dependency graph for the inventory.
pub fn build_graph(
    root: &Path,
    inventory: &Inventory,
    registry: &ExtractorRegistry,
    settings: &GraphSettings,
    workers: usize,
) -> GraphOutput {
    let nodes: Vec<String> = inventory
        .files
        .iter()
        .filter(|f| !f.binary)
        .map(|f| f.path.clone())
        .collect();
    let index = PathIndex::new(nodes.iter().map(String::as_str));

    let candidates: Vec<_> = inventory
        .files
        .iter()
        .filter(|f| !f.binary && registry.supports(f.language))
        .collect();
    debug!(
        nodes = nodes.len(),
        candidates = candidates.len(),
        "extracting references"
    );

    let per_file: Vec<FileReferences> = workers::install(workers, || {
        candidates
            .par_iter()
            .map(|file| {
                let Some(extractor) = registry.for_language(file.language) else {
                    return FileReferences::empty();
                };
                let bytes = match std::fs::read(root.join(&file.path)) {
                    Ok(bytes) => bytes,
                    Err(e) => return FileReferences::failed(&file.path, e.to_string()),
                };
                let content = match String::from_utf8(bytes) {
                    Ok(content) => content,
                    Err(_) => {
                        return FileReferences::failed(&file.path, "content is not valid UTF-8".into())
                    }
                };

                let mut out = FileReferences::empty();
                for reference in extractor.extract(&content) {
                    let targets = extractor.resolve(&file.path, &reference, &index);
                    if targets.is_empty() {
                        out.external.push(ExternalReference {
                            from: file.path.clone(),
                            target: reference.target.clone(),
                            line: reference.line,
                        });
                    }
                    for to in targets {
                        out.edges.push(Edge {
                            from: file.path.clone(),
                            to,
                            line: reference.line,
                        });
                    }
                }
                out
            })
            .collect()
    });

    let mut edges = Vec::new();
    let mut external = Vec::new();
    let mut degraded = Vec::new();
    for file in per_file {
        edges.extend(file.edges);
        external.extend(file.external);
        degraded.extend(file.failure);
    }
    edges.sort_by(|a, b| {
        a.from
            .cmp(&b.from)
            .then(a.line.cmp(&b.line))
            .then_with(|| a.to.cmp(&b.to))
    });
    external.sort_by(|a, b| {
        a.from
            .cmp(&b.from)
            .then(a.line.cmp(&b.line))
            .then_with(|| a.target.cmp(&b.target))
    });

    let pairs: Vec<(String, String)> = edges
        .iter()
        .map(|e| (e.from.clone(), e.to.clone()))
        .collect();
    let analysis = metrics::analyze(&nodes, &pairs, external.len(), settings.high_coupling_fan_in);

    info!(
        nodes = analysis.metrics.node_count,
        edges = analysis.metrics.edge_count,
        cycles = analysis.metrics.cyclic_cluster_count,
        "dependency graph built"
    );

    GraphOutput {
        graph: DependencyGraph {
            nodes,
            edges,
            external,
            node_metrics: analysis.node_metrics,
            cycles: analysis.cycles,
            metrics: analysis.metrics,
        },
        degraded,
    }
}
