//! End-to-end pipeline runs against small temporary repositories.

use async_trait::async_trait;
use repointel::graph::DependencyGraph;
use repointel::pipeline::{Pipeline, PipelineError, PipelineObserver, PipelineStatus};
use repointel::services::{
    EmbeddingService, GenerationRequest, GenerativeService, OfflineServices, ServiceError,
};
use repointel::{Degraded, DegradedKind, RuleId, Settings, Severity, Stage};
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Embeds everything to the same vector except text containing `fail_on`.
struct FixedEmbedder {
    fail_on: Option<&'static str>,
}

#[async_trait]
impl EmbeddingService for FixedEmbedder {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        match self.fail_on {
            Some(marker) if text.contains(marker) => {
                Err(ServiceError::Malformed("refused".to_string()))
            }
            _ => Ok(vec![1.0, 0.5, 0.25]),
        }
    }
}

/// Answers every prompt with one record.
struct CannedGenerator;

#[async_trait]
impl GenerativeService for CannedGenerator {
    fn name(&self) -> &str {
        "canned"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<String, ServiceError> {
        Ok(r#"{"records": [{"name": "Order", "detail": "a purchase", "confidence": 0.9}]}"#.to_string())
    }
}

/// Cancels the run from inside the first call and never answers.
struct CancellingService {
    token: CancellationToken,
}

impl CancellingService {
    async fn hang<T>(&self) -> T {
        self.token.cancel();
        futures::future::pending().await
    }
}

#[async_trait]
impl EmbeddingService for CancellingService {
    fn name(&self) -> &str {
        "cancelling"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
        self.hang().await
    }
}

#[async_trait]
impl GenerativeService for CancellingService {
    fn name(&self) -> &str {
        "cancelling"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<String, ServiceError> {
        self.hang().await
    }
}

/// Records every status and completed stage it is told about.
#[derive(Default)]
struct Recorder {
    statuses: Mutex<Vec<PipelineStatus>>,
    stages: Mutex<Vec<Stage>>,
}

impl PipelineObserver for Recorder {
    fn on_status(&self, status: PipelineStatus) {
        self.statuses.lock().unwrap().push(status);
    }

    fn on_stage_complete(&self, stage: Stage, _degraded: &[Degraded]) {
        self.stages.lock().unwrap().push(stage);
    }
}

fn offline(settings: Settings) -> Pipeline {
    Pipeline::new(settings, Arc::new(OfflineServices), Arc::new(OfflineServices))
}

fn write(dir: &TempDir, path: &str, content: &str) {
    let full = dir.path().join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(full, content).unwrap();
}

fn graph_of(outcome: &repointel::PipelineOutcome) -> &DependencyGraph {
    outcome.state.graph().unwrap()
}

#[tokio::test]
async fn test_secret_and_import_end_to_end() {
    let dir = TempDir::new().unwrap();
    write(&dir, "A.txt", "secret = \"hunter22hunter22\"\n");
    write(&dir, "B.txt", "import A\n");

    let outcome = offline(Settings::default()).run(dir.path()).await.unwrap();
    assert_eq!(outcome.status, PipelineStatus::Done);

    let graph = graph_of(&outcome);
    assert!(graph.has_edge("B.txt", "A.txt"));
    assert_eq!(graph.edges.len(), 1);
    assert!(graph.cycles.is_empty());

    let gaps = outcome.state.gaps().unwrap();
    let rules: Vec<RuleId> = gaps.findings.iter().map(|f| f.rule).collect();
    assert_eq!(rules, vec![RuleId::MissingCi, RuleId::HardcodedSecret]);
    assert_eq!(gaps.findings[1].severity, Severity::Critical);
    assert_eq!(gaps.findings[1].location(), "A.txt:1");
    assert_eq!(gaps.score.score, 80);
    assert_eq!(gaps.score.grade, "B");

    let report = outcome.report().unwrap();
    assert_eq!(report.json.score, Some(80));
    assert!(!report.json.complete);
    assert!(report.markdown.contains("hardcoded_secret"));
}

#[tokio::test]
async fn test_three_file_cycle_is_one_cluster() {
    let dir = TempDir::new().unwrap();
    write(&dir, "A.txt", "import B\n");
    write(&dir, "B.txt", "import C\n");
    write(&dir, "C.txt", "import A\n");

    let outcome = offline(Settings::default()).run(dir.path()).await.unwrap();
    let graph = graph_of(&outcome);

    assert_eq!(graph.edges.len(), 3);
    assert_eq!(graph.cycles.len(), 1);
    let mut members = graph.cycles[0].clone();
    members.sort();
    assert_eq!(members, vec!["A.txt", "B.txt", "C.txt"]);
    assert_eq!(graph.metrics.cyclic_cluster_count, 1);
    assert_eq!(graph.largest_cycle(), 3);
}

#[tokio::test]
async fn test_single_chunk_failure_is_isolated() {
    let dir = TempDir::new().unwrap();
    write(&dir, "orders.py", "class Order:\n    total = 0\n");
    write(&dir, "broken.py", "# POISON\nvalue = 1\n");
    write(&dir, "users.py", "class User:\n    name = ''\n");

    let pipeline = Pipeline::new(
        Settings::default(),
        Arc::new(FixedEmbedder {
            fail_on: Some("POISON"),
        }),
        Arc::new(CannedGenerator),
    );
    let outcome = pipeline.run(dir.path()).await.unwrap();

    assert_eq!(outcome.status, PipelineStatus::Done);
    let degraded: Vec<_> = outcome.state.degraded().collect();
    assert_eq!(degraded.len(), 1, "{:?}", degraded);
    assert_eq!(degraded[0].stage, Stage::Index);
    assert_eq!(degraded[0].kind, DegradedKind::Chunk);
    assert!(degraded[0].subject.starts_with("broken.py#"));

    let index = outcome.state.chunk_index().unwrap();
    assert_eq!(index.len(), 3);
    assert_eq!(index.embedded_count(), 2);

    let extraction = outcome.state.extraction().unwrap();
    assert!(!extraction.entities.is_empty());
    assert!(extraction
        .entities
        .iter()
        .all(|r| r.sources.iter().all(|s| s.path != "broken.py")));
}

#[tokio::test]
async fn test_file_ceiling_truncates_inventory() {
    let dir = TempDir::new().unwrap();
    for name in ["a.txt", "b.txt", "c.txt", "d.txt"] {
        write(&dir, name, "notes\n");
    }

    let mut settings = Settings::default();
    settings.scan.max_files = 2;
    let outcome = offline(settings).run(dir.path()).await.unwrap();

    let inventory = outcome.state.inventory().unwrap();
    assert_eq!(inventory.files.len(), 2);
    assert!(inventory.truncated);
    let scan_errors = &outcome.state.stage_errors()[&Stage::Scan];
    assert_eq!(scan_errors.len(), 1);
    assert_eq!(scan_errors[0].kind, DegradedKind::Truncation);
    assert_eq!(outcome.status, PipelineStatus::Done);
}

#[tokio::test]
async fn test_missing_root_is_fatal() {
    let dir = TempDir::new().unwrap();
    let err = offline(Settings::default())
        .run(dir.path().join("does-not-exist"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Fatal { stage: Stage::Scan, .. }));
}

#[tokio::test]
async fn test_runs_are_deterministic() {
    let dir = TempDir::new().unwrap();
    write(&dir, "app/main.py", "from app import models\nfrom app.db import session\n");
    write(&dir, "app/models.py", "from app.db import session\npassword = \"s3cr3t-value\"\n");
    write(&dir, "app/db.py", "session = None\n");
    write(&dir, "app/__init__.py", "");
    write(&dir, "requirements.txt", "sqlalchemy\n");

    let first = offline(Settings::default()).run(dir.path()).await.unwrap();
    let second = offline(Settings::default()).run(dir.path()).await.unwrap();

    let (g1, g2) = (graph_of(&first), graph_of(&second));
    assert_eq!(g1.nodes, g2.nodes);
    assert_eq!(g1.edges, g2.edges);
    assert_eq!(g1.cycles, g2.cycles);
    assert_eq!(
        first.state.gaps().unwrap().findings,
        second.state.gaps().unwrap().findings
    );
    assert_eq!(
        first.report().unwrap().markdown,
        second.report().unwrap().markdown
    );
}

#[tokio::test]
async fn test_cancelled_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    write(&dir, "main.py", "print('hi')\n");

    let token = CancellationToken::new();
    token.cancel();
    let err = offline(Settings::default())
        .with_cancellation(token)
        .run(dir.path())
        .await
        .unwrap_err();

    match err {
        PipelineError::Cancelled { last_completed } => assert_eq!(last_completed, None),
        other => panic!("expected cancellation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_during_indexing_stops_after_graph() {
    let dir = TempDir::new().unwrap();
    write(&dir, "orders.py", "class Order:\n    total = 0\n");

    let token = CancellationToken::new();
    let recorder = Arc::new(Recorder::default());
    let err = Pipeline::new(
        Settings::default(),
        Arc::new(CancellingService {
            token: token.clone(),
        }),
        Arc::new(CannedGenerator),
    )
    .with_cancellation(token)
    .with_observer(recorder.clone())
    .run(dir.path())
    .await
    .unwrap_err();

    match err {
        PipelineError::Cancelled { last_completed } => {
            assert_eq!(last_completed, Some(Stage::Graph))
        }
        other => panic!("expected cancellation, got {:?}", other),
    }
    assert_eq!(*recorder.stages.lock().unwrap(), vec![Stage::Scan, Stage::Graph]);
    let statuses = recorder.statuses.lock().unwrap();
    assert_eq!(statuses.last(), Some(&PipelineStatus::Cancelled));
    assert!(statuses.contains(&PipelineStatus::ChunkIndexing));
    assert!(!statuses.contains(&PipelineStatus::EntityExtraction));
}

#[tokio::test]
async fn test_cancel_during_extraction_stops_after_index() {
    let dir = TempDir::new().unwrap();
    write(&dir, "orders.py", "class Order:\n    total = 0\n");

    let token = CancellationToken::new();
    let err = Pipeline::new(
        Settings::default(),
        Arc::new(FixedEmbedder { fail_on: None }),
        Arc::new(CancellingService {
            token: token.clone(),
        }),
    )
    .with_cancellation(token)
    .run(dir.path())
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Cancelled {
            last_completed: Some(Stage::Index)
        }
    ));
}
