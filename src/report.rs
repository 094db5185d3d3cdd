//! Report synthesis and output formatting.
//!
//! [`synthesize`] turns a frozen [`AnalysisState`] into a Markdown document
//! and a [`JsonReport`]. It is pure: it reads only the state and never fails,
//! so a run that completed with degraded stages still gets a full report.
//!
//! Output formats:
//! - Markdown: the full assessment document
//! - JSON: the same data for programmatic consumption
//! - Pretty: colored terminal summary

use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classify::{ArchitectureReport, TechCategory};
use crate::extract::{ExtractedRecord, Extraction, DOMAIN_QUERIES};
use crate::graph::{DependencyGraph, GraphMetrics};
use crate::rules::{Finding, GapReport, Severity};
use crate::scan::Inventory;
use crate::score::grades;
use crate::state::{AnalysisState, Degraded};

/// Findings listed per severity in the risk heat-map before truncating.
const MAX_FINDINGS_PER_SEVERITY: usize = 50;

/// Records listed per extraction kind.
const MAX_RECORDS_PER_KIND: usize = 25;

/// The report stage's section of the analysis state.
#[derive(Debug, Clone)]
pub struct SynthesizedReport {
    pub markdown: String,
    pub json: JsonReport,
}

// =============================================================================
// JSON Format
// =============================================================================

/// Machine-readable report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    pub inventory: JsonInventory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<JsonGraph>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<ArchitectureReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction: Option<Extraction>,
    pub findings: Vec<Finding>,
    pub breakdown: Vec<BreakdownEntry>,
    /// True when no stage recorded a degraded result.
    pub complete: bool,
    pub degraded: Vec<Degraded>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonInventory {
    pub files: usize,
    pub total_bytes: u64,
    pub truncated: bool,
    pub languages: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonGraph {
    pub metrics: GraphMetrics,
    pub cycles: Vec<Vec<String>>,
}

/// Breakdown entry for score details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub rule: String,
    pub points: u32,
    pub findings: usize,
}

/// Build both report forms from the state.
pub fn synthesize(state: &AnalysisState) -> SynthesizedReport {
    SynthesizedReport {
        markdown: render_markdown(state),
        json: build_json(state),
    }
}

fn build_json(state: &AnalysisState) -> JsonReport {
    let inventory = state
        .inventory()
        .map(|inv| JsonInventory {
            files: inv.files.len(),
            total_bytes: inv.total_bytes,
            truncated: inv.truncated,
            languages: inv
                .languages
                .iter()
                .map(|(lang, count)| (lang.as_str().to_string(), *count))
                .collect(),
        })
        .unwrap_or_default();

    JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        path: state.repo_root().display().to_string(),
        score: state.gaps().map(|g| g.score.score),
        grade: state.gaps().map(|g| g.score.grade.clone()),
        inventory,
        graph: state.graph().map(|g| JsonGraph {
            metrics: g.metrics.clone(),
            cycles: g.cycles.clone(),
        }),
        architecture: state.architecture().cloned(),
        extraction: state.extraction().cloned(),
        findings: state.gaps().map(|g| g.findings.clone()).unwrap_or_default(),
        breakdown: state.gaps().map(breakdown).unwrap_or_default(),
        complete: state.is_clean(),
        degraded: state.degraded().cloned().collect(),
    }
}

/// Per-rule points, highest first, then by rule name.
fn breakdown(gaps: &GapReport) -> Vec<BreakdownEntry> {
    let mut entries: Vec<BreakdownEntry> = gaps
        .score
        .breakdown
        .iter()
        .map(|(rule, points)| BreakdownEntry {
            rule: rule.clone(),
            points: *points,
            findings: gaps.findings.iter().filter(|f| f.rule.as_str() == rule).count(),
        })
        .collect();
    entries.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.rule.cmp(&b.rule)));
    entries
}

/// Serialize the JSON report.
pub fn to_json(report: &JsonReport) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

// =============================================================================
// Markdown Format
// =============================================================================

/// Line-oriented Markdown builder.
#[derive(Default)]
struct Markdown {
    out: String,
}

impl Markdown {
    fn heading(&mut self, level: usize, text: &str) {
        self.out.push_str(&"#".repeat(level));
        self.out.push(' ');
        self.out.push_str(text);
        self.out.push_str("\n\n");
    }

    fn line(&mut self, text: impl AsRef<str>) {
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn para(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.blank();
    }

    fn bullet(&mut self, text: impl AsRef<str>) {
        self.out.push_str("- ");
        self.line(text);
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) {
        self.line(format!("| {} |", headers.join(" | ")));
        self.line(format!(
            "|{}|",
            headers.iter().map(|_| "---").collect::<Vec<_>>().join("|")
        ));
        for row in rows {
            let cells: Vec<String> = row.iter().map(|c| escape_cell(c)).collect();
            self.line(format!("| {} |", cells.join(" | ")));
        }
        self.blank();
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

const UNAVAILABLE: &str = "_Not available: this stage did not complete._";

fn render_markdown(state: &AnalysisState) -> String {
    let mut md = Markdown::default();
    let name = state
        .repo_root()
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| state.repo_root().display().to_string());

    md.heading(1, &format!("Repository Intelligence Report: {}", name));
    match state.gaps() {
        Some(gaps) => md.para(format!(
            "**Maturity score:** {}/100 (grade {})",
            gaps.score.score, gaps.score.grade
        )),
        None => md.para("**Maturity score:** not available"),
    }
    if let Some(arch) = state.architecture() {
        md.para(format!(
            "**Architecture:** {}, **API style:** {}",
            arch.style, arch.api_style
        ));
    }

    md.heading(2, "Inventory");
    match state.inventory() {
        Some(inv) => inventory_section(&mut md, inv),
        None => md.para(UNAVAILABLE),
    }

    md.heading(2, "Technology Stack");
    match state.architecture() {
        Some(arch) => technology_section(&mut md, arch),
        None => md.para(UNAVAILABLE),
    }

    md.heading(2, "Dependency Graph");
    match state.graph() {
        Some(graph) => graph_section(&mut md, graph),
        None => md.para(UNAVAILABLE),
    }

    md.heading(2, "Architecture");
    match state.architecture() {
        Some(arch) => architecture_section(&mut md, arch),
        None => md.para(UNAVAILABLE),
    }

    md.heading(2, "Complexity");
    match state.architecture() {
        Some(arch) => complexity_section(&mut md, arch),
        None => md.para(UNAVAILABLE),
    }

    md.heading(2, "Domain Entities");
    extraction_section(&mut md, state.extraction(), false);

    md.heading(2, "Workflows");
    extraction_section(&mut md, state.extraction(), true);

    md.heading(2, "Risk Heat-Map");
    match state.gaps() {
        Some(gaps) => risk_section(&mut md, gaps),
        None => md.para(UNAVAILABLE),
    }

    md.heading(2, "Maturity Score Breakdown");
    match state.gaps() {
        Some(gaps) => score_section(&mut md, gaps),
        None => md.para(UNAVAILABLE),
    }

    md.heading(2, "Data Completeness");
    completeness_section(&mut md, state);

    md.out
}

fn inventory_section(md: &mut Markdown, inv: &Inventory) {
    md.bullet(format!("Files: {}", inv.files.len()));
    md.bullet(format!("Total size: {} bytes", inv.total_bytes));
    if inv.truncated {
        md.bullet("Inventory truncated at the configured file limit");
    }
    md.blank();

    if !inv.languages.is_empty() {
        let mut langs: Vec<(_, _)> = inv.languages.iter().collect();
        langs.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        let rows: Vec<Vec<String>> = langs
            .into_iter()
            .map(|(lang, count)| vec![lang.as_str().to_string(), count.to_string()])
            .collect();
        md.table(&["Language", "Files"], &rows);
    }
}

fn technology_section(md: &mut Markdown, arch: &ArchitectureReport) {
    if arch.technologies.is_empty() {
        md.para("No frameworks, databases or auth libraries detected.");
        return;
    }
    for category in [TechCategory::Framework, TechCategory::Database, TechCategory::Auth] {
        let names: Vec<&str> = arch
            .technologies_in(category)
            .map(|t| t.name.as_str())
            .collect();
        if !names.is_empty() {
            md.bullet(format!("**{}:** {}", category, names.join(", ")));
        }
    }
    md.blank();
}

fn graph_section(md: &mut Markdown, graph: &DependencyGraph) {
    let m = &graph.metrics;
    md.bullet(format!("Modules: {}", m.node_count));
    md.bullet(format!("Internal dependencies: {}", m.edge_count));
    md.bullet(format!("External references: {}", m.external_count));
    md.bullet(format!("Max dependency depth: {}", m.max_depth));
    md.bullet(format!("Average fan-out: {:.2}", m.average_fan_out));
    md.bullet(format!("Cyclic clusters: {}", m.cyclic_cluster_count));
    md.blank();

    if !graph.cycles.is_empty() {
        md.heading(3, "Circular Dependencies");
        for cycle in &graph.cycles {
            md.bullet(cycle.join(" → "));
        }
        md.blank();
    }

    if !m.high_coupling.is_empty() {
        md.heading(3, "High-Coupling Modules");
        for module in &m.high_coupling {
            let fan_in = graph.node_metrics.get(module).map(|n| n.fan_in).unwrap_or(0);
            md.bullet(format!("`{}` (fan-in {})", module, fan_in));
        }
        md.blank();
    }
}

fn architecture_section(md: &mut Markdown, arch: &ArchitectureReport) {
    md.para(format!("**Style:** {}", arch.style));
    for evidence in &arch.evidence {
        md.bullet(evidence);
    }
    md.blank();

    if arch.services.len() > 1 {
        let rows: Vec<Vec<String>> = arch
            .services
            .iter()
            .map(|s| {
                vec![
                    s.path.clone(),
                    s.manifests.join(", "),
                    s.source_files.to_string(),
                ]
            })
            .collect();
        md.table(&["Service root", "Manifests", "Source files"], &rows);
    }

    md.para(format!("**API style:** {}", arch.api_style));
    for evidence in &arch.api_evidence {
        md.bullet(evidence);
    }
    if !arch.api_evidence.is_empty() {
        md.blank();
    }

    if !arch.layers.is_empty() {
        md.heading(3, "Layers");
        for layer in &arch.layers {
            md.bullet(format!("**{}:** {}", layer.kind, layer.matches.join(", ")));
        }
        md.blank();
    }
}

fn complexity_section(md: &mut Markdown, arch: &ArchitectureReport) {
    let c = &arch.complexity;
    md.bullet(format!("Lines of code: {}", c.total_loc));
    md.bullet(format!("Source files: {}", c.source_files));
    md.bullet(format!("Test files: {}", c.test_files));
    md.bullet(format!(
        "Test-to-source ratio: {:.2} (coverage {})",
        c.test_to_source_ratio,
        c.coverage.describe()
    ));
    md.bullet(format!("Services: {}", c.service_count));
    md.blank();

    if !c.loc_by_language.is_empty() {
        let rows: Vec<Vec<String>> = c
            .loc_by_language
            .iter()
            .map(|(lang, loc)| vec![lang.as_str().to_string(), loc.to_string()])
            .collect();
        md.table(&["Language", "LOC"], &rows);
    }
}

fn extraction_section(md: &mut Markdown, extraction: Option<&Extraction>, workflows: bool) {
    let Some(extraction) = extraction else {
        md.para(UNAVAILABLE);
        return;
    };

    md.para("_Model-generated: these records come from a language model and may differ between runs._");

    let mut any = false;
    for query in DOMAIN_QUERIES.iter().filter(|q| q.kind.is_workflow() == workflows) {
        let records: Vec<&ExtractedRecord> = extraction.of_kind(query.kind).collect();
        if records.is_empty() {
            continue;
        }
        any = true;
        md.heading(3, query.kind.title());
        for record in records.iter().take(MAX_RECORDS_PER_KIND) {
            md.bullet(record_line(record));
        }
        if records.len() > MAX_RECORDS_PER_KIND {
            md.bullet(format!("… {} more", records.len() - MAX_RECORDS_PER_KIND));
        }
        md.blank();
    }

    if !any {
        let what = if workflows { "workflows" } else { "entities" };
        md.para(format!("No {} extracted.", what));
    }
}

fn record_line(record: &ExtractedRecord) -> String {
    let mut line = format!("**{}**", record.name);
    if let Some(detail) = &record.detail {
        line.push_str(": ");
        line.push_str(detail);
    }
    line.push_str(&format!(" _(confidence {:.2}", record.confidence));
    if let Some(source) = record.sources.first() {
        line.push_str(&format!(", see `{}`", source.path));
    }
    line.push_str(")_");
    line
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "🔴 CRITICAL",
        Severity::Warning => "🟠 WARNING",
        Severity::Info => "🟡 INFO",
    }
}

fn risk_section(md: &mut Markdown, gaps: &GapReport) {
    if gaps.findings.is_empty() {
        md.para("No gaps found.");
        return;
    }

    let summary: Vec<String> = Severity::DESCENDING
        .iter()
        .map(|s| format!("{}: {}", severity_tag(*s), gaps.count(*s)))
        .collect();
    md.para(summary.join(" · "));

    for severity in Severity::DESCENDING {
        let findings: Vec<&Finding> = gaps.findings.iter().filter(|f| f.severity == severity).collect();
        if findings.is_empty() {
            continue;
        }
        md.heading(3, severity_tag(severity));
        let rows: Vec<Vec<String>> = findings
            .iter()
            .take(MAX_FINDINGS_PER_SEVERITY)
            .map(|f| {
                vec![
                    f.rule.as_str().to_string(),
                    f.location(),
                    f.message.clone(),
                    f.recommendation.clone().unwrap_or_default(),
                ]
            })
            .collect();
        md.table(&["Rule", "Location", "Finding", "Recommendation"], &rows);
        if findings.len() > MAX_FINDINGS_PER_SEVERITY {
            md.para(format!(
                "… {} more {} findings omitted.",
                findings.len() - MAX_FINDINGS_PER_SEVERITY,
                severity
            ));
        }
    }
}

fn score_section(md: &mut Markdown, gaps: &GapReport) {
    let score = &gaps.score;
    md.para(format!(
        "Score = clamp(100 − {}, 0, 100) = **{}** (grade **{}**)",
        score.penalty, score.score, score.grade
    ));
    let entries = breakdown(gaps);
    if !entries.is_empty() {
        let rows: Vec<Vec<String>> = entries
            .iter()
            .map(|e| vec![e.rule.clone(), e.findings.to_string(), e.points.to_string()])
            .collect();
        md.table(&["Rule", "Findings", "Points"], &rows);
    }
}

fn completeness_section(md: &mut Markdown, state: &AnalysisState) {
    if state.is_clean() {
        md.para("Analysis complete: every stage finished without degraded results.");
        return;
    }
    let degraded: Vec<&Degraded> = state.degraded().collect();
    md.para(format!(
        "{} item(s) could not be analysed. The results above omit them.",
        degraded.len()
    ));
    let rows: Vec<Vec<String>> = degraded
        .iter()
        .map(|d| {
            vec![
                d.stage.to_string(),
                d.kind.to_string(),
                d.subject.clone(),
                d.message.clone(),
            ]
        })
        .collect();
    md.table(&["Stage", "Kind", "Subject", "Reason"], &rows);
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write a colored terminal summary.
pub fn write_pretty(state: &AnalysisState) {
    println!();
    print!("  ");
    print!("{}", "repointel".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Repository: ".dimmed());
    println!("{}", state.repo_root().display());
    if let Some(inv) = state.inventory() {
        print!("  {}", "Files:      ".dimmed());
        print!("{}", inv.files.len());
        if inv.truncated {
            print!(" {}", "(truncated)".yellow());
        }
        println!();
    }
    if let Some(arch) = state.architecture() {
        print!("  {}", "Style:      ".dimmed());
        println!("{}  API: {}", arch.style, arch.api_style);
    }
    if let Some(graph) = state.graph() {
        print!("  {}", "Graph:      ".dimmed());
        println!(
            "{} modules, {} edges, {} cycles",
            graph.metrics.node_count, graph.metrics.edge_count, graph.metrics.cyclic_cluster_count
        );
    }
    println!();

    if let Some(gaps) = state.gaps() {
        write_score_line(gaps);
        println!();
        if !gaps.findings.is_empty() {
            write_findings(&gaps.findings);
            println!();
        }
    }

    let degraded = state.degraded().count();
    if degraded > 0 {
        println!(
            "  {}",
            format!("{} degraded item(s); see the data completeness section", degraded).yellow()
        );
        println!();
    }
}

fn write_score_line(gaps: &GapReport) {
    print!("  Maturity: ");
    write_colored_score(gaps.score.score);
    print!("/100  Grade: ");
    write_colored_grade(&gaps.score.grade);
    println!(
        "  {}",
        format!(
            "({} critical, {} warning, {} info)",
            gaps.score.counts.critical, gaps.score.counts.warning, gaps.score.counts.info
        )
        .dimmed()
    );
}

fn write_colored_score(s: u8) {
    print!("{}", colored_score(s));
}

/// Score colored by the grade band it falls in.
fn colored_score(s: u8) -> ColoredString {
    let text = s.to_string();
    match s {
        s if s >= grades::A_MIN => text.green().bold(),
        s if s >= grades::B_MIN => text.green(),
        s if s >= grades::C_MIN => text.yellow(),
        s if s >= grades::D_MIN => text.yellow().bold(),
        _ => text.red(),
    }
}

fn write_colored_grade(grade: &str) {
    match grade {
        "A" => print!("{}", grade.green().bold()),
        "B" => print!("{}", grade.green()),
        "C" => print!("{}", grade.yellow()),
        "D" => print!("{}", grade.yellow().bold()),
        _ => print!("{}", grade.red()),
    }
}

fn write_findings(findings: &[Finding]) {
    println!("  {} ({}):", "Findings".bold(), findings.len());
    println!();

    for f in findings {
        write_severity_tag(f.severity);
        print!("   ");
        print!("{:<26}", f.rule.as_str().dimmed());
        print!("{}", f.location().blue());
        println!();
        println!("            {}", f.message);
    }
}

fn write_severity_tag(severity: Severity) {
    match severity {
        Severity::Critical => print!("    {} ", "CRIT ".red()),
        Severity::Warning => print!("    {} ", "WARN ".yellow()),
        Severity::Info => print!("    {} ", "INFO ".blue()),
    }
}
