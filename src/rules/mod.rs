//! Gap analysis: a fixed battery of deterministic checks plus the maturity score.
//!
//! Each check reads the frozen inventory, graph and architecture through a
//! [`RuleContext`] and never depends on another check's output. File text is
//! loaded once, capped at `rules.secret_scan_max_bytes` per file.

mod context;
mod frameworks;
mod hygiene;
mod runner;
mod secrets;
mod types;
mod web;

pub use context::RuleContext;
pub use runner::Runner;
pub use types::{Finding, RuleId, RuleResult, Severity};

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::classify::ArchitectureReport;
use crate::config::Settings;
use crate::graph::DependencyGraph;
use crate::scan::Inventory;
use crate::score::{self, MaturityScore};
use crate::state::Degraded;

/// Findings in evaluation order plus the score derived from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapReport {
    pub findings: Vec<Finding>,
    pub score: MaturityScore,
    /// Files whose contents at least one check read.
    pub files_scanned: usize,
}

impl GapReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    pub fn of_rule(&self, rule: RuleId) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.rule == rule)
    }
}

/// Gap analysis stage result.
#[derive(Debug)]
pub struct GapOutput {
    pub report: GapReport,
    pub degraded: Vec<Degraded>,
}

pub fn analyze_gaps(
    root: &Path,
    inventory: &Inventory,
    graph: &DependencyGraph,
    architecture: &ArchitectureReport,
    settings: &Settings,
) -> GapOutput {
    let ctx = RuleContext::new(root, inventory, graph, architecture, settings);
    let result = Runner::new().run(&ctx);
    let files_scanned = inventory.files.iter().filter(|f| ctx.text(&f.path).is_some()).count();
    let degraded = ctx.take_failures();

    let score = score::calculate(&result.findings, &settings.scoring);
    info!(
        findings = result.findings.len(),
        score = score.score,
        grade = %score.grade,
        "gap analysis finished"
    );

    GapOutput {
        report: GapReport {
            findings: result.findings,
            score,
            files_scanned,
        },
        degraded,
    }
}
