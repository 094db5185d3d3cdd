//! Command-line interface for repointel.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{self, Settings};
use crate::pipeline::{Pipeline, PipelineError, PipelineObserver, PipelineStatus};
use crate::report;
use crate::services::{EmbeddingService, GenerativeService, OfflineServices, OllamaClient};
use crate::state::{Degraded, Stage};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Output formats accepted by `analyze`.
const FORMATS: &[&str] = &["markdown", "json", "pretty"];

/// Repository intelligence - architecture and engineering-maturity analysis.
///
/// repointel scans a source repository, builds its dependency graph,
/// classifies its architecture, runs a deterministic battery of gap checks
/// and writes a scored report. Entity and workflow extraction use an
/// Ollama-compatible model service unless `--offline` is given.
#[derive(Parser)]
#[command(name = "repointel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a repository and write a report
    Analyze(AnalyzeArgs),
    /// Write the default configuration file
    Init(InitArgs),
}

/// Arguments for the analyze command.
#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Repository root to analyze
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: markdown, json, or pretty
    #[arg(short, long, default_value = "markdown")]
    pub format: String,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print stage progress to stderr while the analysis runs
    #[arg(long)]
    pub stream: bool,

    /// Generation model to use (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Do not contact any model service
    #[arg(long)]
    pub offline: bool,

    /// Minimum acceptable maturity score (exit 1 if the score is lower)
    #[arg(long)]
    pub min_score: Option<u8>,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "repointel.yaml")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Prints stage progress to stderr.
struct StreamObserver;

impl PipelineObserver for StreamObserver {
    fn on_status(&self, status: PipelineStatus) {
        if status.is_terminal() {
            eprintln!("  {} {}", "●".cyan(), status);
        } else if status != PipelineStatus::Pending {
            eprintln!("  {} {}", "→".dimmed(), status);
        }
    }

    fn on_stage_complete(&self, stage: Stage, degraded: &[Degraded]) {
        if degraded.is_empty() {
            eprintln!("  {} {}", "✓".green(), stage);
        } else {
            eprintln!(
                "  {} {} {}",
                "!".yellow(),
                stage,
                format!("({} degraded)", degraded.len()).yellow()
            );
        }
    }
}

type Services = (Arc<dyn EmbeddingService>, Arc<dyn GenerativeService>);

fn build_services(settings: &Settings, offline: bool) -> anyhow::Result<Services> {
    if offline {
        return Ok((Arc::new(OfflineServices), Arc::new(OfflineServices)));
    }
    let client = Arc::new(OllamaClient::new(&settings.services)?);
    Ok((client.clone(), client))
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    // Validate format
    if !FORMATS.contains(&args.format.as_str()) {
        eprintln!(
            "Error: invalid format {:?}, must be one of: {}",
            args.format,
            FORMATS.join(", ")
        );
        return Ok(EXIT_ERROR);
    }

    // Load settings
    let mut settings = match Settings::load(args.config.as_deref()) {
        Ok((settings, _source)) => settings,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            return Ok(EXIT_ERROR);
        }
    };
    if let Some(model) = &args.model {
        settings.services.generation_model = model.clone();
    }
    if let Err(e) = config::validate(&settings) {
        eprintln!("Error: invalid config: {}", e);
        return Ok(EXIT_ERROR);
    }

    // Resolve path
    let abs_path = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };
    if !abs_path.is_dir() {
        eprintln!("Error: {} is not a directory", abs_path.display());
        return Ok(EXIT_ERROR);
    }

    let (embedder, generator) = match build_services(&settings, args.offline) {
        Ok(services) => services,
        Err(e) => {
            eprintln!("Error: failed to set up model services: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let cancel = CancellationToken::new();
    let mut pipeline = Pipeline::new(settings, embedder, generator).with_cancellation(cancel.clone());
    if args.stream {
        pipeline = pipeline.with_observer(Arc::new(StreamObserver));
    }

    // Run the pipeline; Ctrl-C cancels it
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async {
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Interrupted, cancelling analysis...");
                on_interrupt.cancel();
            }
        });
        pipeline.run(&abs_path).await
    });

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e @ PipelineError::Cancelled { .. }) => {
            eprintln!("{}", e);
            return Ok(EXIT_ERROR);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let Some(synthesized) = outcome.report() else {
        eprintln!("Error: analysis finished without a report");
        return Ok(EXIT_ERROR);
    };

    // Output results
    match args.format.as_str() {
        "json" => emit(args.output.as_deref(), &report::to_json(&synthesized.json)?)?,
        "pretty" => {
            report::write_pretty(&outcome.state);
            if let Some(path) = &args.output {
                emit(Some(path), &synthesized.markdown)?;
            }
        }
        _ => emit(args.output.as_deref(), &synthesized.markdown)?,
    }

    // Return appropriate exit code
    let score = outcome.state.gaps().map(|g| g.score.score);
    match (args.min_score, score) {
        (Some(min), Some(score)) if score < min => Ok(EXIT_FAILED),
        _ => Ok(EXIT_SUCCESS),
    }
}

fn emit(output: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .map_err(|e| anyhow::anyhow!("failed to write {}: {}", path.display(), e))?;
            eprintln!("Report written to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    // Check if output already exists
    if args.output.exists() && !args.force {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Use --force to overwrite it or --output to choose another path");
        return Ok(EXIT_ERROR);
    }

    // Create output directory if needed
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    let yaml = Settings::default().to_yaml()?;
    if let Err(e) = std::fs::write(&args.output, yaml) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to tune limits, models and thresholds", args.output.display());
    println!("  2. Run: repointel analyze . --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("conf/repointel.yaml");
        let args = InitArgs {
            output: path.clone(),
            force: false,
        };

        assert_eq!(run_init(&args).unwrap(), EXIT_SUCCESS);
        let parsed = Settings::parse_file(&path).unwrap();
        assert_eq!(parsed.scoring.critical, 15);

        // A second run refuses to overwrite without --force.
        assert_eq!(run_init(&args).unwrap(), EXIT_ERROR);
        let forced = InitArgs {
            output: path,
            force: true,
        };
        assert_eq!(run_init(&forced).unwrap(), EXIT_SUCCESS);
    }

    #[test]
    fn test_analyze_rejects_unknown_format() {
        let args = AnalyzeArgs {
            path: PathBuf::from("."),
            config: None,
            format: "sarif".to_string(),
            output: None,
            stream: false,
            model: None,
            offline: true,
            min_score: None,
        };
        assert_eq!(run_analyze(&args).unwrap(), EXIT_ERROR);
    }

    #[test]
    fn test_analyze_offline_writes_json_and_checks_min_score() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        std::fs::create_dir(&repo).unwrap();
        std::fs::write(repo.join("A.txt"), "password = \"correct-horse-battery\"\n").unwrap();
        std::fs::write(repo.join("B.txt"), "import A\n").unwrap();
        let out = temp.path().join("report.json");

        let args = AnalyzeArgs {
            path: repo,
            config: None,
            format: "json".to_string(),
            output: Some(out.clone()),
            stream: false,
            model: None,
            offline: true,
            min_score: Some(90),
        };
        assert_eq!(run_analyze(&args).unwrap(), EXIT_FAILED);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json["score"], 80);
        assert_eq!(json["findings"][0]["rule"], "missing_ci");
    }
}
