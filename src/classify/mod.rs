//! Architecture classification.
//!
//! Deterministic: reads the inventory, the dependency graph and the
//! repository's manifests, and never calls an external service. Every
//! decision comes with the evidence that produced it.

mod api;
mod complexity;
mod layers;
mod technology;

pub use api::ApiStyle;
pub use complexity::{ComplexityMetrics, CoverageLabel};
pub use layers::{Layer, LayerKind};
pub use technology::{DetectedTechnology, TechCategory};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

use crate::config::ClassificationSettings;
use crate::graph::DependencyGraph;
use crate::scan::Inventory;
use crate::state::{Degraded, DegradedKind, Stage};
use technology::{manifest_tokens, TechnologyMatcher};

/// Files whose presence makes a directory a service root.
pub const SERVICE_MANIFESTS: &[&str] = &[
    "package.json",
    "requirements.txt",
    "pyproject.toml",
    "Pipfile",
    "go.mod",
    "Cargo.toml",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "Gemfile",
    "Dockerfile",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchitectureStyle {
    Monolith,
    ModularMonolith,
    Microservices,
    Unknown,
}

impl ArchitectureStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchitectureStyle::Monolith => "monolith",
            ArchitectureStyle::ModularMonolith => "modular-monolith",
            ArchitectureStyle::Microservices => "microservices",
            ArchitectureStyle::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ArchitectureStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directory holding a service manifest, with the source files it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRoot {
    /// Relative directory, `.` for the repository root.
    pub path: String,
    pub manifests: Vec<String>,
    pub source_files: usize,
}

/// The classification stage's section of the analysis state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectureReport {
    pub style: ArchitectureStyle,
    pub evidence: Vec<String>,
    pub services: Vec<ServiceRoot>,
    /// Share of source-to-source edges that cross a service boundary.
    pub cross_service_edge_ratio: f64,
    /// Share of source files inside the largest cycle cluster.
    pub largest_cycle_share: f64,
    pub layers: Vec<Layer>,
    pub technologies: Vec<DetectedTechnology>,
    pub api_style: ApiStyle,
    pub api_evidence: Vec<String>,
    pub complexity: ComplexityMetrics,
}

impl ArchitectureReport {
    pub fn technologies_in(&self, category: TechCategory) -> impl Iterator<Item = &DetectedTechnology> {
        self.technologies.iter().filter(move |t| t.category == category)
    }

    pub fn has_technology(&self, name: &str) -> bool {
        self.technologies.iter().any(|t| t.name == name)
    }

    /// Whether the repository serves an HTTP-facing API.
    pub fn exposes_http_api(&self) -> bool {
        !matches!(self.api_style, ApiStyle::None | ApiStyle::Grpc)
    }
}

/// Classification stage result.
#[derive(Debug)]
pub struct ClassifyOutput {
    pub report: ArchitectureReport,
    pub degraded: Vec<Degraded>,
}

/// Classify the repository's architecture.
pub fn classify(
    root: &Path,
    inventory: &Inventory,
    graph: &DependencyGraph,
    settings: &ClassificationSettings,
) -> ClassifyOutput {
    let mut degraded = Vec::new();
    let mut matcher = TechnologyMatcher::default();

    for reference in &graph.external {
        let location = format!("{}:{}", reference.from, reference.line);
        matcher.observe(&reference.target.to_ascii_lowercase(), &location);
    }

    let mut roots: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for file in inventory.files.iter().filter(|f| SERVICE_MANIFESTS.contains(&f.file_name())) {
        roots
            .entry(parent_dir(&file.path).to_string())
            .or_default()
            .push(file.file_name().to_string());

        if !file.has_text() {
            continue;
        }
        match std::fs::read(root.join(&file.path)) {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes);
                for token in manifest_tokens(&content) {
                    matcher.observe(&token, &file.path);
                }
            }
            Err(e) => degraded.push(Degraded::new(
                Stage::Classification,
                DegradedKind::File,
                &file.path,
                e.to_string(),
            )),
        }
    }

    let (technologies, hints) = matcher.finish();
    let (api_style, api_evidence) = api::detect(inventory, &hints);

    // Each source file belongs to its deepest enclosing service root.
    let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
    let mut owned: BTreeMap<&str, usize> = BTreeMap::new();
    for file in inventory.source_files() {
        let owner = roots
            .keys()
            .map(String::as_str)
            .filter(|dir| dir.is_empty() || file.path.starts_with(&format!("{}/", dir)))
            .max_by_key(|dir| dir.len())
            .unwrap_or("");
        owners.insert(file.path.as_str(), owner);
        *owned.entry(owner).or_insert(0) += 1;
    }

    let services: Vec<ServiceRoot> = owned
        .iter()
        .map(|(dir, count)| ServiceRoot {
            path: if dir.is_empty() { ".".to_string() } else { dir.to_string() },
            manifests: roots.get(*dir).cloned().unwrap_or_default(),
            source_files: *count,
        })
        .collect();

    let source_edges: BTreeSet<(&str, &str)> = graph
        .edges
        .iter()
        .filter(|e| e.from != e.to)
        .filter(|e| owners.contains_key(e.from.as_str()) && owners.contains_key(e.to.as_str()))
        .map(|e| (e.from.as_str(), e.to.as_str()))
        .collect();
    let cross = source_edges
        .iter()
        .filter(|(from, to)| owners.get(from) != owners.get(to))
        .count();
    let cross_service_edge_ratio = if source_edges.is_empty() {
        0.0
    } else {
        cross as f64 / source_edges.len() as f64
    };

    let source_count = owners.len();
    let largest_cycle = graph
        .cycles
        .iter()
        .map(|c| c.iter().filter(|n| owners.contains_key(n.as_str())).count())
        .max()
        .unwrap_or(0);
    let largest_cycle_share = if source_count == 0 {
        0.0
    } else {
        largest_cycle as f64 / source_count as f64
    };

    let (style, evidence) = decide_style(
        source_count,
        &services,
        cross_service_edge_ratio,
        largest_cycle,
        largest_cycle_share,
        settings,
    );

    let report = ArchitectureReport {
        style,
        evidence,
        complexity: complexity::measure(inventory, services.len(), settings),
        services,
        cross_service_edge_ratio,
        largest_cycle_share,
        layers: layers::detect(inventory),
        technologies,
        api_style,
        api_evidence,
    };

    info!(
        style = %report.style,
        api = %report.api_style,
        services = report.services.len(),
        "architecture classified"
    );
    ClassifyOutput { report, degraded }
}

fn decide_style(
    source_count: usize,
    services: &[ServiceRoot],
    cross_ratio: f64,
    largest_cycle: usize,
    cycle_share: f64,
    settings: &ClassificationSettings,
) -> (ArchitectureStyle, Vec<String>) {
    if source_count == 0 {
        return (
            ArchitectureStyle::Unknown,
            vec!["no source files in a programming language".to_string()],
        );
    }

    let service_list = services
        .iter()
        .map(|s| s.path.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    if services.len() >= settings.microservices_min_services
        && cross_ratio <= settings.microservices_max_cross_ratio
    {
        return (
            ArchitectureStyle::Microservices,
            vec![
                format!("{} independently packaged services: {}", services.len(), service_list),
                format!(
                    "{:.0}% of source dependencies cross a service boundary (limit {:.0}%)",
                    cross_ratio * 100.0,
                    settings.microservices_max_cross_ratio * 100.0
                ),
            ],
        );
    }

    if largest_cycle > 1 && cycle_share >= settings.monolith_scc_share {
        return (
            ArchitectureStyle::Monolith,
            vec![format!(
                "largest dependency cycle spans {} of {} source files ({:.0}%)",
                largest_cycle,
                source_count,
                cycle_share * 100.0
            )],
        );
    }

    if services.len() >= 2 {
        return (
            ArchitectureStyle::ModularMonolith,
            vec![
                format!("{} packaged modules: {}", services.len(), service_list),
                format!(
                    "{:.0}% of source dependencies cross a module boundary",
                    cross_ratio * 100.0
                ),
            ],
        );
    }

    (
        ArchitectureStyle::Monolith,
        vec![format!(
            "single deployable unit with {} source files",
            source_count
        )],
    )
}

fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::graph::{build_graph, ExtractorRegistry};
    use crate::scan::scan_repository;
    use std::fs;
    use tempfile::TempDir;

    fn write(temp: &TempDir, path: &str, content: &str) {
        let full = temp.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    fn run(temp: &TempDir) -> ClassifyOutput {
        let settings = Settings::default();
        let scan = scan_repository(temp.path(), &settings).unwrap();
        let graph = build_graph(
            temp.path(),
            &scan.inventory,
            &ExtractorRegistry::with_defaults(),
            &settings.graph,
            2,
        );
        classify(temp.path(), &scan.inventory, &graph.graph, &settings.classification)
    }

    #[test]
    fn test_independent_services_are_microservices() {
        let temp = TempDir::new().unwrap();
        write(&temp, "orders/requirements.txt", "flask\nredis\n");
        write(&temp, "orders/app.py", "from flask import Flask\n");
        write(&temp, "web/package.json", "{\"dependencies\": {\"express\": \"^4\"}}");
        write(&temp, "web/index.js", "const express = require('express');\n");
        write(&temp, "billing/go.mod", "module example.com/billing\n");
        write(&temp, "billing/main.go", "package main\n");

        let output = run(&temp);
        let report = &output.report;
        assert!(output.degraded.is_empty());
        assert_eq!(report.style, ArchitectureStyle::Microservices);
        assert_eq!(report.services.len(), 3);
        assert_eq!(report.cross_service_edge_ratio, 0.0);
        assert!(report.has_technology("Flask"));
        assert!(report.has_technology("Express"));
        assert!(report.has_technology("Redis"));
        assert_eq!(report.api_style, ApiStyle::Rest);
        assert!(report.exposes_http_api());
    }

    #[test]
    fn test_dominant_cycle_is_monolith() {
        let temp = TempDir::new().unwrap();
        write(&temp, "a.py", "import b\n");
        write(&temp, "b.py", "import c\n");
        write(&temp, "c.py", "import a\n");
        write(&temp, "d.py", "import a\n");

        let report = run(&temp).report;
        assert_eq!(report.style, ArchitectureStyle::Monolith);
        assert_eq!(report.largest_cycle_share, 0.75);
        assert!(report.evidence[0].contains("3 of 4"));
        assert_eq!(report.services[0].path, ".");
    }

    #[test]
    fn test_coupled_packages_are_modular_monolith() {
        let temp = TempDir::new().unwrap();
        write(&temp, "api/package.json", "{}");
        write(&temp, "api/index.js", "const job = require('../worker/job');\n");
        write(&temp, "worker/package.json", "{}");
        write(&temp, "worker/job.js", "module.exports = {};\n");

        let report = run(&temp).report;
        assert_eq!(report.style, ArchitectureStyle::ModularMonolith);
        assert_eq!(report.cross_service_edge_ratio, 1.0);
        assert_eq!(report.api_style, ApiStyle::None);
    }

    #[test]
    fn test_text_only_repository_is_unknown() {
        let temp = TempDir::new().unwrap();
        write(&temp, "A.txt", "secret = 'x'\n");
        write(&temp, "README.md", "# notes\n");

        let report = run(&temp).report;
        assert_eq!(report.style, ArchitectureStyle::Unknown);
        assert!(report.services.is_empty());
        assert_eq!(report.complexity.source_files, 0);
        assert!(!report.exposes_http_api());
    }
}
