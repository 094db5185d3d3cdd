//! Shared analysis state.
//!
//! Every stage contributes one section. A section is written exactly once and
//! is read-only afterwards; later stages only ever see frozen data.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::classify::ArchitectureReport;
use crate::extract::Extraction;
use crate::graph::DependencyGraph;
use crate::index::ChunkIndex;
use crate::report::SynthesizedReport;
use crate::rules::GapReport;
use crate::scan::Inventory;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Scan,
    Graph,
    Index,
    Extraction,
    Classification,
    GapAnalysis,
    Report,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Scan,
        Stage::Graph,
        Stage::Index,
        Stage::Extraction,
        Stage::Classification,
        Stage::GapAnalysis,
        Stage::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Scan => "scan",
            Stage::Graph => "graph",
            Stage::Index => "index",
            Stage::Extraction => "extraction",
            Stage::Classification => "classification",
            Stage::GapAnalysis => "gap-analysis",
            Stage::Report => "report",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a degraded record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegradedKind {
    /// A single file could not be read or decoded.
    File,
    /// A chunk has no embedding.
    Chunk,
    /// A domain query produced no records.
    Query,
    /// A rule could not inspect part of the repository.
    Rule,
    /// A configured limit cut the input short.
    Truncation,
    /// A directory walk error (permissions, symlink loop).
    Traversal,
}

impl std::fmt::Display for DegradedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DegradedKind::File => "file",
            DegradedKind::Chunk => "chunk",
            DegradedKind::Query => "query",
            DegradedKind::Rule => "rule",
            DegradedKind::Truncation => "truncation",
            DegradedKind::Traversal => "traversal",
        };
        write!(f, "{}", s)
    }
}

/// A non-fatal failure. The stage completed, but part of its output is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degraded {
    pub stage: Stage,
    pub kind: DegradedKind,
    /// Path, chunk id or query name the failure applies to.
    pub subject: String,
    pub message: String,
}

impl Degraded {
    pub fn new(
        stage: Stage,
        kind: DegradedKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by illegal state writes.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StateError {
    #[error("section `{0}` is already frozen")]
    AlreadyFrozen(&'static str),
    #[error("section `{0}` has not been written")]
    Missing(&'static str),
}

/// Accumulated output of one pipeline run.
#[derive(Debug)]
pub struct AnalysisState {
    repo_root: PathBuf,
    inventory: OnceCell<Inventory>,
    graph: OnceCell<DependencyGraph>,
    chunk_index: OnceCell<ChunkIndex>,
    extraction: OnceCell<Extraction>,
    architecture: OnceCell<ArchitectureReport>,
    gaps: OnceCell<GapReport>,
    report: OnceCell<SynthesizedReport>,
    stage_errors: BTreeMap<Stage, Vec<Degraded>>,
}

fn freeze<T>(cell: &OnceCell<T>, section: &'static str, value: T) -> Result<(), StateError> {
    cell.set(value).map_err(|_| StateError::AlreadyFrozen(section))
}

impl AnalysisState {
    pub fn new<P: AsRef<Path>>(repo_root: P) -> Self {
        Self {
            repo_root: repo_root.as_ref().to_path_buf(),
            inventory: OnceCell::new(),
            graph: OnceCell::new(),
            chunk_index: OnceCell::new(),
            extraction: OnceCell::new(),
            architecture: OnceCell::new(),
            gaps: OnceCell::new(),
            report: OnceCell::new(),
            stage_errors: BTreeMap::new(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn inventory(&self) -> Option<&Inventory> {
        self.inventory.get()
    }

    pub fn graph(&self) -> Option<&DependencyGraph> {
        self.graph.get()
    }

    pub fn chunk_index(&self) -> Option<&ChunkIndex> {
        self.chunk_index.get()
    }

    pub fn extraction(&self) -> Option<&Extraction> {
        self.extraction.get()
    }

    pub fn architecture(&self) -> Option<&ArchitectureReport> {
        self.architecture.get()
    }

    pub fn gaps(&self) -> Option<&GapReport> {
        self.gaps.get()
    }

    pub fn report(&self) -> Option<&SynthesizedReport> {
        self.report.get()
    }

    pub fn freeze_inventory(&self, value: Inventory) -> Result<(), StateError> {
        freeze(&self.inventory, "inventory", value)
    }

    pub fn freeze_graph(&self, value: DependencyGraph) -> Result<(), StateError> {
        freeze(&self.graph, "graph", value)
    }

    pub fn freeze_chunk_index(&self, value: ChunkIndex) -> Result<(), StateError> {
        freeze(&self.chunk_index, "chunk_index", value)
    }

    pub fn freeze_extraction(&self, value: Extraction) -> Result<(), StateError> {
        freeze(&self.extraction, "extraction", value)
    }

    pub fn freeze_architecture(&self, value: ArchitectureReport) -> Result<(), StateError> {
        freeze(&self.architecture, "architecture", value)
    }

    pub fn freeze_gaps(&self, value: GapReport) -> Result<(), StateError> {
        freeze(&self.gaps, "gaps", value)
    }

    pub fn freeze_report(&self, value: SynthesizedReport) -> Result<(), StateError> {
        freeze(&self.report, "report", value)
    }

    /// Record the degraded list for a completed stage. Each stage records once.
    pub fn record_stage(&mut self, stage: Stage, degraded: Vec<Degraded>) -> Result<(), StateError> {
        if self.stage_errors.contains_key(&stage) {
            return Err(StateError::AlreadyFrozen(stage.as_str()));
        }
        self.stage_errors.insert(stage, degraded);
        Ok(())
    }

    /// Degraded records keyed by stage. Completed stages appear even when clean.
    pub fn stage_errors(&self) -> &BTreeMap<Stage, Vec<Degraded>> {
        &self.stage_errors
    }

    /// All degraded records in stage order.
    pub fn degraded(&self) -> impl Iterator<Item = &Degraded> {
        self.stage_errors.values().flatten()
    }

    pub fn completed_stages(&self) -> Vec<Stage> {
        self.stage_errors.keys().copied().collect()
    }

    /// True when every completed stage finished without degradation.
    pub fn is_clean(&self) -> bool {
        self.stage_errors.values().all(|v| v.is_empty())
    }
}
