//! Report output format tests.
//!
//! These run the full pipeline offline against the FastAPI fixture and check
//! the JSON field names and Markdown layout consumers depend on.

use std::path::PathBuf;
use std::sync::Arc;

use repointel::report::{self, JsonReport};
use repointel::services::OfflineServices;
use repointel::{Pipeline, PipelineOutcome, Settings};

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn run_shop_api() -> PipelineOutcome {
    let runtime = tokio::runtime::Runtime::new().expect("runtime should start");
    let pipeline = Pipeline::new(
        Settings::default(),
        Arc::new(OfflineServices),
        Arc::new(OfflineServices),
    );
    runtime
        .block_on(pipeline.run(testdata_path().join("shop_api")))
        .expect("pipeline should complete")
}

fn json_report() -> JsonReport {
    run_shop_api().report().expect("report should exist").json.clone()
}

#[test]
fn test_json_report_structure() {
    let report = json_report();

    assert_eq!(report.version, env!("CARGO_PKG_VERSION"));
    assert!(report.path.ends_with("shop_api"));
    assert_eq!(report.score, Some(63));
    assert_eq!(report.grade.as_deref(), Some("C"));
    assert_eq!(report.inventory.files, 4);
    assert_eq!(report.inventory.languages.get("python"), Some(&2));
    assert!(!report.inventory.truncated);
    assert!(report.graph.is_some());
    assert!(report.architecture.is_some());
}

#[test]
fn test_json_breakdown_format() {
    let report = json_report();

    // Highest points first, ties by rule name.
    let first = &report.breakdown[0];
    assert_eq!(first.rule, "framework_anti_pattern");
    assert_eq!(first.points, 5);
    assert_eq!(first.findings, 1);

    let total: u32 = report.breakdown.iter().map(|e| e.points).sum();
    assert_eq!(total, 37);
    let listed: usize = report.breakdown.iter().map(|e| e.findings).sum();
    assert_eq!(listed, report.findings.len());
}

#[test]
fn test_offline_run_is_marked_incomplete() {
    let report = json_report();

    assert!(!report.complete);
    assert!(report.degraded.iter().any(|d| d.stage == repointel::Stage::Index));
    assert!(report.degraded.iter().any(|d| d.stage == repointel::Stage::Extraction));
    let extraction = report.extraction.expect("extraction section is written even when empty");
    assert!(extraction.is_empty());
}

#[test]
fn test_json_field_names() {
    let json = report::to_json(&json_report()).expect("should serialize");
    let value: serde_json::Value = serde_json::from_str(&json).expect("should parse");

    for field in [
        "version",
        "path",
        "score",
        "grade",
        "inventory",
        "graph",
        "architecture",
        "extraction",
        "findings",
        "breakdown",
        "complete",
        "degraded",
    ] {
        assert!(value.get(field).is_some(), "missing field {}", field);
    }

    let cors = value["findings"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["rule"] == "permissive_cors")
        .expect("cors finding");
    assert_eq!(cors["severity"], "warning");
    assert_eq!(cors["file"], "main.py");
    assert_eq!(cors["line"], 9);
    assert_eq!(value["degraded"][0]["stage"], "index");
}

#[test]
fn test_markdown_sections_in_order() {
    let outcome = run_shop_api();
    let markdown = &outcome.report().unwrap().markdown;

    let headings = [
        "## Inventory",
        "## Technology Stack",
        "## Dependency Graph",
        "## Architecture",
        "## Complexity",
        "## Domain Entities",
        "## Workflows",
        "## Risk Heat-Map",
        "## Maturity Score Breakdown",
        "## Data Completeness",
    ];
    let positions: Vec<usize> = headings
        .iter()
        .map(|h| markdown.find(h).unwrap_or_else(|| panic!("missing {}", h)))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    assert!(markdown.contains("FastAPI"));
    assert!(markdown.contains("main.py:9"));
    assert!(markdown.contains("**63**"));
}
