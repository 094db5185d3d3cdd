//! Pipeline orchestration.
//!
//! Stages run in a fixed order against one [`AnalysisState`]. Each stage reads
//! frozen sections, writes its own section once, and records its degraded
//! results. Only an unreadable repository root stops a run; every other
//! failure is recorded and the run continues.
//!
//! Cancellation is checked before each stage and raced against the two
//! service-backed stages, so a cancelled run never writes a partial section.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::classify;
use crate::config::Settings;
use crate::extract::{self, ExtractOutput};
use crate::graph::{self, ExtractorRegistry, GraphOutput};
use crate::index::{self, IndexOutput};
use crate::report;
use crate::rules::{self, GapOutput};
use crate::scan::{self, ScanError};
use crate::services::{CallPolicy, EmbeddingService, GenerativeService};
use crate::state::{AnalysisState, Degraded, Stage, StateError};

/// Where a run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStatus {
    Pending,
    Scanning,
    GraphBuilding,
    ChunkIndexing,
    EntityExtraction,
    ArchitectureClassification,
    GapAnalysis,
    ReportSynthesis,
    Done,
    Failed,
    Cancelled,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Pending => "pending",
            PipelineStatus::Scanning => "scanning",
            PipelineStatus::GraphBuilding => "graph-building",
            PipelineStatus::ChunkIndexing => "chunk-indexing",
            PipelineStatus::EntityExtraction => "entity-extraction",
            PipelineStatus::ArchitectureClassification => "architecture-classification",
            PipelineStatus::GapAnalysis => "gap-analysis",
            PipelineStatus::ReportSynthesis => "report-synthesis",
            PipelineStatus::Done => "done",
            PipelineStatus::Failed => "failed",
            PipelineStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Done | PipelineStatus::Failed | PipelineStatus::Cancelled
        )
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that end a run without a report.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{stage} stage failed: {source}")]
    Fatal { stage: Stage, source: ScanError },
    #[error("analysis cancelled (last completed stage: {})", .last_completed.map(|s| s.as_str()).unwrap_or("none"))]
    Cancelled { last_completed: Option<Stage> },
    #[error(transparent)]
    State(#[from] StateError),
}

/// Receives progress while a run is in flight.
pub trait PipelineObserver: Send + Sync {
    fn on_status(&self, _status: PipelineStatus) {}

    fn on_stage_complete(&self, _stage: Stage, _degraded: &[Degraded]) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// A finished run.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub state: AnalysisState,
    pub status: PipelineStatus,
    /// Every status the run passed through, in order.
    pub history: Vec<PipelineStatus>,
}

impl PipelineOutcome {
    pub fn report(&self) -> Option<&report::SynthesizedReport> {
        self.state.report()
    }

    /// True when no stage recorded a degraded result.
    pub fn is_clean(&self) -> bool {
        self.state.is_clean()
    }
}

/// Runs the analysis stages against a repository.
pub struct Pipeline {
    settings: Arc<Settings>,
    embedder: Arc<dyn EmbeddingService>,
    generator: Arc<dyn GenerativeService>,
    registry: Arc<ExtractorRegistry>,
    observer: Arc<dyn PipelineObserver>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(
        settings: Settings,
        embedder: Arc<dyn EmbeddingService>,
        generator: Arc<dyn GenerativeService>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            embedder,
            generator,
            registry: Arc::new(ExtractorRegistry::with_defaults()),
            observer: Arc::new(NoopObserver),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Replace the built-in reference extractors.
    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run every stage against `root`.
    pub async fn run<P: AsRef<Path>>(&self, root: P) -> Result<PipelineOutcome, PipelineError> {
        let root = root.as_ref();
        let settings = Arc::clone(&self.settings);
        let mut run = Run::new(self);
        let mut state = AnalysisState::new(root);

        // Scan
        run.enter(&state, PipelineStatus::Scanning)?;
        let scanned = match scan::scan_repository(root, &settings) {
            Ok(output) => output,
            Err(source) => {
                error!(path = %root.display(), error = %source, "scan failed");
                run.set(PipelineStatus::Failed);
                return Err(PipelineError::Fatal {
                    stage: Stage::Scan,
                    source,
                });
            }
        };
        state.freeze_inventory(scanned.inventory)?;
        run.complete(&mut state, Stage::Scan, scanned.degraded)?;

        // Dependency graph
        run.enter(&state, PipelineStatus::GraphBuilding)?;
        let GraphOutput { graph, degraded } = graph::build_graph(
            root,
            frozen(state.inventory(), "inventory")?,
            &self.registry,
            &settings.graph,
            settings.scan.workers,
        );
        state.freeze_graph(graph)?;
        run.complete(&mut state, Stage::Graph, degraded)?;

        // Chunk index
        run.enter(&state, PipelineStatus::ChunkIndexing)?;
        let built = {
            let inventory = frozen(state.inventory(), "inventory")?;
            let policy = CallPolicy::from_settings(&settings.services);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                output = index::build_index(
                    root,
                    inventory,
                    Arc::clone(&self.embedder),
                    policy,
                    settings.scan.workers,
                ) => Some(output),
            }
        };
        let Some(IndexOutput { index, degraded }) = built else {
            return Err(run.cancelled(&state));
        };
        state.freeze_chunk_index(index)?;
        run.complete(&mut state, Stage::Index, degraded)?;

        // Entities and workflows
        run.enter(&state, PipelineStatus::EntityExtraction)?;
        let extracted = {
            let index = frozen(state.chunk_index(), "chunk_index")?;
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                output = extract::extract_domain(
                    index,
                    Arc::clone(&self.embedder),
                    Arc::clone(&self.generator),
                    &settings,
                ) => Some(output),
            }
        };
        let Some(ExtractOutput {
            extraction,
            degraded,
        }) = extracted
        else {
            return Err(run.cancelled(&state));
        };
        state.freeze_extraction(extraction)?;
        run.complete(&mut state, Stage::Extraction, degraded)?;

        // Architecture
        run.enter(&state, PipelineStatus::ArchitectureClassification)?;
        let classified = classify::classify(
            root,
            frozen(state.inventory(), "inventory")?,
            frozen(state.graph(), "graph")?,
            &settings.classification,
        );
        state.freeze_architecture(classified.report)?;
        run.complete(&mut state, Stage::Classification, classified.degraded)?;

        // Gap analysis
        run.enter(&state, PipelineStatus::GapAnalysis)?;
        let GapOutput {
            report: gaps,
            degraded,
        } = rules::analyze_gaps(
            root,
            frozen(state.inventory(), "inventory")?,
            frozen(state.graph(), "graph")?,
            frozen(state.architecture(), "architecture")?,
            &settings,
        );
        state.freeze_gaps(gaps)?;
        run.complete(&mut state, Stage::GapAnalysis, degraded)?;

        // Report
        run.enter(&state, PipelineStatus::ReportSynthesis)?;
        let synthesized = report::synthesize(&state);
        state.freeze_report(synthesized)?;
        run.complete(&mut state, Stage::Report, Vec::new())?;

        run.set(PipelineStatus::Done);
        info!(
            path = %root.display(),
            degraded = state.degraded().count(),
            "analysis complete"
        );
        Ok(PipelineOutcome {
            state,
            status: PipelineStatus::Done,
            history: run.history,
        })
    }
}

fn frozen<'a, T>(section: Option<&'a T>, name: &'static str) -> Result<&'a T, StateError> {
    section.ok_or(StateError::Missing(name))
}

/// Status bookkeeping for one run.
struct Run<'p> {
    pipeline: &'p Pipeline,
    history: Vec<PipelineStatus>,
}

impl<'p> Run<'p> {
    fn new(pipeline: &'p Pipeline) -> Self {
        let mut run = Self {
            pipeline,
            history: Vec::new(),
        };
        run.set(PipelineStatus::Pending);
        run
    }

    fn set(&mut self, status: PipelineStatus) {
        info!(status = %status, "pipeline status");
        self.history.push(status);
        self.pipeline.observer.on_status(status);
    }

    /// Move to `status` unless the run has been cancelled.
    fn enter(&mut self, state: &AnalysisState, status: PipelineStatus) -> Result<(), PipelineError> {
        if self.pipeline.cancel.is_cancelled() {
            return Err(self.cancelled(state));
        }
        self.set(status);
        Ok(())
    }

    fn cancelled(&mut self, state: &AnalysisState) -> PipelineError {
        let last_completed = state.completed_stages().last().copied();
        warn!(last_completed = ?last_completed, "analysis cancelled");
        self.set(PipelineStatus::Cancelled);
        PipelineError::Cancelled { last_completed }
    }

    fn complete(
        &mut self,
        state: &mut AnalysisState,
        stage: Stage,
        degraded: Vec<Degraded>,
    ) -> Result<(), PipelineError> {
        if !degraded.is_empty() {
            warn!(stage = %stage, count = degraded.len(), "stage completed with degraded results");
        }
        state.record_stage(stage, degraded)?;
        let recorded = state
            .stage_errors()
            .get(&stage)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        self.pipeline.observer.on_stage_complete(stage, recorded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::OfflineServices;
    use std::sync::Mutex;
    use tempfile::TempDir;

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

    fn offline_pipeline() -> Pipeline {
        Pipeline::new(
            Settings::default(),
            Arc::new(OfflineServices),
            Arc::new(OfflineServices),
        )
    }

    #[tokio::test]
    async fn test_statuses_follow_stage_order() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("main.py"), "print('hi')\n").unwrap();

        let recorder = Arc::new(Recorder::default());
        let outcome = offline_pipeline()
            .with_observer(recorder.clone())
            .run(temp.path())
            .await
            .unwrap();

        let expected = vec![
            PipelineStatus::Pending,
            PipelineStatus::Scanning,
            PipelineStatus::GraphBuilding,
            PipelineStatus::ChunkIndexing,
            PipelineStatus::EntityExtraction,
            PipelineStatus::ArchitectureClassification,
            PipelineStatus::GapAnalysis,
            PipelineStatus::ReportSynthesis,
            PipelineStatus::Done,
        ];
        assert_eq!(outcome.history, expected);
        assert_eq!(*recorder.statuses.lock().unwrap(), expected);
        assert_eq!(*recorder.stages.lock().unwrap(), Stage::ALL.to_vec());
        assert_eq!(outcome.state.completed_stages(), Stage::ALL.to_vec());
        assert!(outcome.report().is_some());
    }

    #[tokio::test]
    async fn test_offline_services_degrade_but_complete() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("main.py"), "print('hi')\n").unwrap();

        let outcome = offline_pipeline().run(temp.path()).await.unwrap();
        assert_eq!(outcome.status, PipelineStatus::Done);
        assert!(!outcome.is_clean());
        let errors = outcome.state.stage_errors();
        assert_eq!(errors[&Stage::Index].len(), 1);
        assert_eq!(errors[&Stage::Extraction].len(), 7);
        assert!(errors[&Stage::GapAnalysis].is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");

        let recorder = Arc::new(Recorder::default());
        let err = offline_pipeline()
            .with_observer(recorder.clone())
            .run(&missing)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Fatal { stage: Stage::Scan, .. }));
        assert_eq!(
            recorder.statuses.lock().unwrap().last(),
            Some(&PipelineStatus::Failed)
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let temp = TempDir::new().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let err = offline_pipeline()
            .with_cancellation(token)
            .run(temp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { last_completed: None }));
    }

    #[test]
    fn test_status_names() {
        assert_eq!(PipelineStatus::GraphBuilding.to_string(), "graph-building");
        assert!(PipelineStatus::Cancelled.is_terminal());
        assert!(!PipelineStatus::GapAnalysis.is_terminal());
    }
}
