//! Classification and gap analysis against the checked-in FastAPI fixture.

use std::path::PathBuf;

use repointel::classify::{self, ApiStyle, ArchitectureStyle, LayerKind, TechCategory};
use repointel::graph::{self, ExtractorRegistry};
use repointel::rules::{self, GapOutput};
use repointel::scan::scan_repository;
use repointel::{RuleId, Settings, Severity};

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

struct Analyzed {
    architecture: classify::ArchitectureReport,
    graph: graph::DependencyGraph,
    gaps: GapOutput,
}

fn analyze_shop_api() -> Analyzed {
    let root = testdata_path().join("shop_api");
    let settings = Settings::default();

    let inventory = scan_repository(&root, &settings)
        .expect("fixture should be readable")
        .inventory;
    let graph = graph::build_graph(
        &root,
        &inventory,
        &ExtractorRegistry::with_defaults(),
        &settings.graph,
        settings.scan.workers,
    )
    .graph;
    let classified = classify::classify(&root, &inventory, &graph, &settings.classification);
    assert!(classified.degraded.is_empty());

    let gaps = rules::analyze_gaps(&root, &inventory, &graph, &classified.report, &settings);
    Analyzed {
        architecture: classified.report,
        graph,
        gaps,
    }
}

#[test]
fn test_fixture_imports_resolve() {
    let analyzed = analyze_shop_api();
    assert!(analyzed.graph.has_edge("main.py", "models.py"));
    assert!(analyzed
        .graph
        .external
        .iter()
        .any(|e| e.from == "main.py" && e.target.starts_with("fastapi")));
}

#[test]
fn test_fixture_architecture() {
    let arch = analyze_shop_api().architecture;

    assert_eq!(arch.style, ArchitectureStyle::Monolith);
    assert_eq!(arch.services.len(), 1);
    assert_eq!(arch.services[0].path, ".");
    assert_eq!(arch.api_style, ApiStyle::Rest);
    assert!(arch.exposes_http_api());
    assert!(arch.has_technology("FastAPI"));
    assert_eq!(arch.technologies_in(TechCategory::Auth).count(), 0);
    assert!(arch
        .layers
        .iter()
        .any(|l| l.kind == LayerKind::Data && l.matches.contains(&"models.py".to_string())));
}

#[test]
fn test_fixture_findings() {
    let gaps = analyze_shop_api().gaps;
    assert!(gaps.degraded.is_empty());

    let rules: Vec<RuleId> = gaps.report.findings.iter().map(|f| f.rule).collect();
    assert_eq!(
        rules,
        vec![
            RuleId::MissingCi,
            RuleId::MissingLintConfig,
            RuleId::MissingTests,
            RuleId::MissingReadme,
            RuleId::MissingContainerConfig,
            RuleId::PermissiveCors,
            RuleId::MissingRateLimiting,
            RuleId::MissingAuthentication,
            RuleId::FrameworkAntiPattern,
        ]
    );

    let cors = gaps.report.of_rule(RuleId::PermissiveCors).next().unwrap();
    assert_eq!(cors.location(), "main.py:9");

    let readme = gaps.report.of_rule(RuleId::MissingReadme).next().unwrap();
    assert_eq!(readme.severity, Severity::Info);
    assert_eq!(readme.file.as_deref(), Some("README.md"));

    // Pydantic models satisfy the validation check; response_model is declared.
    assert_eq!(gaps.report.of_rule(RuleId::MissingInputValidation).count(), 0);
    assert_eq!(gaps.report.of_rule(RuleId::FrameworkAntiPattern).count(), 1);
}

#[test]
fn test_fixture_score() {
    let report = analyze_shop_api().gaps.report;

    assert_eq!(report.count(Severity::Critical), 0);
    assert_eq!(report.count(Severity::Warning), 7);
    assert_eq!(report.count(Severity::Info), 2);
    assert_eq!(report.score.penalty, 37);
    assert_eq!(report.score.score, 63);
    assert_eq!(report.score.grade, "C");
    assert_eq!(report.score.points_for("permissive_cors"), 5);
}
