//! repointel - repository intelligence.
//!
//! repointel runs a staged analysis over a source repository and produces a
//! scored engineering-maturity report. Each stage writes one frozen section
//! of the shared [`AnalysisState`]:
//!
//! - `scan`: file inventory with languages, sizes and content hashes
//! - `graph`: file-level dependency graph, cycles and coupling metrics
//! - `index`: semantic chunk index backed by an embedding service
//! - `extract`: domain entities and workflows from a generative service
//! - `classify`: architecture style, layers, technology stack, API surface
//! - `rules`: deterministic gap checks producing findings
//! - `score`: maturity score and grade from findings
//! - `report`: markdown and JSON synthesis
//!
//! The `pipeline` module sequences the stages, reports progress to an
//! observer and honours cancellation. Model services live behind the traits
//! in `services`; an offline implementation lets every deterministic stage
//! run without a model server.

pub mod classify;
pub mod cli;
pub mod config;
pub mod extract;
pub mod graph;
pub mod index;
pub mod pipeline;
pub mod report;
pub mod rules;
pub mod scan;
pub mod score;
pub mod services;
pub mod state;
pub mod workers;

pub use config::Settings;
pub use pipeline::{Pipeline, PipelineError, PipelineObserver, PipelineOutcome, PipelineStatus};
pub use rules::{Finding, GapReport, RuleId, Severity};
pub use score::MaturityScore;
pub use state::{AnalysisState, Degraded, DegradedKind, Stage};
