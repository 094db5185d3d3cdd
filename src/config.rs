//! Configuration schema for repointel.
//!
//! Settings are read from YAML, overlaid with environment overrides and
//! validated once. The pipeline receives an immutable snapshot per run.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Config file names searched for in the working directory.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["repointel.yaml", ".repointel.yaml"];

/// Environment variables that override file settings.
pub mod env {
    pub const MODEL: &str = "REPOINTEL_MODEL";
    pub const MAX_FILES: &str = "REPOINTEL_MAX_FILES";
    pub const CHUNK_CHARS: &str = "REPOINTEL_CHUNK_CHARS";
    pub const TOP_K: &str = "REPOINTEL_TOP_K";
    pub const COVERAGE_GOOD_RATIO: &str = "REPOINTEL_COVERAGE_GOOD_RATIO";
    pub const COVERAGE_MODERATE_RATIO: &str = "REPOINTEL_COVERAGE_MODERATE_RATIO";
}

/// Top-level settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub graph: GraphSettings,
    #[serde(default)]
    pub index: IndexSettings,
    #[serde(default)]
    pub services: ServiceSettings,
    #[serde(default)]
    pub scoring: SeverityWeights,
    #[serde(default)]
    pub classification: ClassificationSettings,
    #[serde(default)]
    pub rules: RuleSettings,
}

impl Settings {
    /// Parse settings from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(settings)
    }

    /// Load settings from an explicit path or the discovered default, then
    /// apply environment overrides and validate.
    ///
    /// Returns the settings and the file they came from, if any.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<(Self, Option<PathBuf>)> {
        let source = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => discover(),
        };

        let mut settings = match &source {
            Some(path) => Self::parse_file(path)?,
            None => Self::default(),
        };

        settings.apply_overrides(|key| std::env::var(key).ok())?;
        validate(&settings)?;
        Ok((settings, source))
    }

    /// Apply overrides from a key lookup (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup(env::MODEL) {
            if !model.trim().is_empty() {
                self.services.generation_model = model.trim().to_string();
            }
        }
        if let Some(raw) = lookup(env::MAX_FILES) {
            self.scan.max_files = parse_override(env::MAX_FILES, &raw)?;
        }
        if let Some(raw) = lookup(env::CHUNK_CHARS) {
            self.index.chunk_chars = parse_override(env::CHUNK_CHARS, &raw)?;
        }
        if let Some(raw) = lookup(env::TOP_K) {
            self.index.top_k = parse_override(env::TOP_K, &raw)?;
        }
        if let Some(raw) = lookup(env::COVERAGE_GOOD_RATIO) {
            self.classification.coverage_good_ratio =
                parse_override(env::COVERAGE_GOOD_RATIO, &raw)?;
        }
        if let Some(raw) = lookup(env::COVERAGE_MODERATE_RATIO) {
            self.classification.coverage_moderate_ratio =
                parse_override(env::COVERAGE_MODERATE_RATIO, &raw)?;
        }
        Ok(())
    }

    /// Render the settings as YAML (used by `repointel init`).
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn parse_override<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("invalid value for {}: {:?}", key, raw))
}

/// Discover a config file: working directory first, then the user config dir.
fn discover() -> Option<PathBuf> {
    for name in DEFAULT_CONFIG_NAMES {
        let path = PathBuf::from(name);
        if path.is_file() {
            return Some(path);
        }
    }

    directories::ProjectDirs::from("", "", "repointel")
        .map(|dirs| dirs.config_dir().join("config.yaml"))
        .filter(|path| path.is_file())
}

/// Repository walk limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanSettings {
    /// Maximum number of files collected before the inventory is truncated (default: 2000)
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Files larger than this are recorded without hashing or chunking (default: 500000)
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    /// Worker threads for per-file work and concurrent service calls
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Directory names pruned from the walk
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,
    /// Glob patterns (relative paths) excluded from the inventory
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_max_files() -> usize {
    2000
}

fn default_max_file_size() -> u64 {
    500_000
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8))
        .unwrap_or(4)
}

fn default_skip_dirs() -> Vec<String> {
    [
        ".git",
        ".svn",
        ".hg",
        "__pycache__",
        "node_modules",
        ".venv",
        "venv",
        "env",
        ".tox",
        ".mypy_cache",
        ".pytest_cache",
        ".eggs",
        ".idea",
        ".vscode",
        "dist",
        "build",
        "target",
        "vendor",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_file_size_bytes: default_max_file_size(),
            workers: default_workers(),
            skip_dirs: default_skip_dirs(),
            exclude: Vec::new(),
        }
    }
}

/// Dependency graph thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphSettings {
    /// Fan-in at which a module is reported as highly coupled (default: 5)
    #[serde(default = "default_high_coupling")]
    pub high_coupling_fan_in: usize,
}

fn default_high_coupling() -> usize {
    5
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            high_coupling_fan_in: default_high_coupling(),
        }
    }
}

/// Chunking and retrieval.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexSettings {
    /// Maximum chunk length in characters (default: 1500)
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    /// Chunks retrieved per domain query (default: 10)
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Upper bound on the context handed to the generative service (default: 8000)
    #[serde(default = "default_max_context")]
    pub max_context_chars: usize,
}

fn default_chunk_chars() -> usize {
    1500
}

fn default_top_k() -> usize {
    10
}

fn default_max_context() -> usize {
    8000
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            chunk_chars: default_chunk_chars(),
            top_k: default_top_k(),
            max_context_chars: default_max_context(),
        }
    }
}

/// External embedding and generation services.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-call timeout in milliseconds (default: 120000)
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// Retries after a failed call; at most 1 (default: 1)
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_generation_model() -> String {
    "qwen3:4b".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout() -> u64 {
    120_000
}

fn default_retries() -> u32 {
    1
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
            generation_model: default_generation_model(),
            temperature: default_temperature(),
            timeout_ms: default_timeout(),
            retries: default_retries(),
        }
    }
}

/// Points subtracted from the maturity score per finding severity.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct SeverityWeights {
    #[serde(default = "default_critical")]
    pub critical: u32,
    #[serde(default = "default_warning")]
    pub warning: u32,
    #[serde(default = "default_info")]
    pub info: u32,
}

fn default_critical() -> u32 {
    crate::score::weights::CRITICAL
}

fn default_warning() -> u32 {
    crate::score::weights::WARNING
}

fn default_info() -> u32 {
    crate::score::weights::INFO
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            critical: default_critical(),
            warning: default_warning(),
            info: default_info(),
        }
    }
}

/// Thresholds for the architecture style decision.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassificationSettings {
    /// Minimum independently deployable units for a microservices verdict (default: 3)
    #[serde(default = "default_min_services")]
    pub microservices_min_services: usize,
    /// Maximum share of edges crossing service boundaries for microservices (default: 0.1)
    #[serde(default = "default_max_cross_ratio")]
    pub microservices_max_cross_ratio: f64,
    /// Share of source files in one cycle cluster that marks a monolith (default: 0.25)
    #[serde(default = "default_scc_share")]
    pub monolith_scc_share: f64,
    /// Test-to-source ratio above which coverage is labelled good (default: 0.3)
    #[serde(default = "default_coverage_good")]
    pub coverage_good_ratio: f64,
    /// Test-to-source ratio above which coverage is labelled moderate (default: 0.1)
    #[serde(default = "default_coverage_moderate")]
    pub coverage_moderate_ratio: f64,
}

fn default_min_services() -> usize {
    3
}

fn default_max_cross_ratio() -> f64 {
    0.1
}

fn default_scc_share() -> f64 {
    0.25
}

fn default_coverage_good() -> f64 {
    0.3
}

fn default_coverage_moderate() -> f64 {
    0.1
}

impl Default for ClassificationSettings {
    fn default() -> Self {
        Self {
            microservices_min_services: default_min_services(),
            microservices_max_cross_ratio: default_max_cross_ratio(),
            monolith_scc_share: default_scc_share(),
            coverage_good_ratio: default_coverage_good(),
            coverage_moderate_ratio: default_coverage_moderate(),
        }
    }
}

/// Gap analysis knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleSettings {
    /// Bytes read per file by content rules (default: 200000)
    #[serde(default = "default_scan_bytes")]
    pub secret_scan_max_bytes: usize,
}

fn default_scan_bytes() -> usize {
    200_000
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            secret_scan_max_bytes: default_scan_bytes(),
        }
    }
}

/// Validate settings for correctness.
pub fn validate(settings: &Settings) -> anyhow::Result<()> {
    if settings.scan.max_files == 0 {
        anyhow::bail!("scan.max_files must be greater than zero");
    }
    if settings.scan.workers == 0 {
        anyhow::bail!("scan.workers must be greater than zero");
    }
    for pattern in &settings.scan.exclude {
        globset::Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid scan.exclude pattern {:?}: {}", pattern, e))?;
    }

    if settings.index.chunk_chars == 0 {
        anyhow::bail!("index.chunk_chars must be greater than zero");
    }
    if settings.index.top_k == 0 {
        anyhow::bail!("index.top_k must be greater than zero");
    }

    if settings.services.retries > 1 {
        anyhow::bail!(
            "services.retries must be 0 or 1, got {}",
            settings.services.retries
        );
    }
    if settings.services.timeout_ms == 0 {
        anyhow::bail!("services.timeout_ms must be greater than zero");
    }

    let c = &settings.classification;
    for (name, value) in [
        ("microservices_max_cross_ratio", c.microservices_max_cross_ratio),
        ("monolith_scc_share", c.monolith_scc_share),
        ("coverage_good_ratio", c.coverage_good_ratio),
        ("coverage_moderate_ratio", c.coverage_moderate_ratio),
    ] {
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("classification.{} must be within [0, 1], got {}", name, value);
        }
    }
    if c.microservices_min_services < 2 {
        anyhow::bail!("classification.microservices_min_services must be at least 2");
    }
    if c.coverage_moderate_ratio > c.coverage_good_ratio {
        anyhow::bail!(
            "classification.coverage_moderate_ratio ({}) must not exceed coverage_good_ratio ({})",
            c.coverage_moderate_ratio,
            c.coverage_good_ratio
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_partial_config() {
        let yaml = r#"
scan:
  max_files: 50
services:
  generation_model: "llama3:8b"
  retries: 0
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.scan.max_files, 50);
        assert_eq!(settings.scan.max_file_size_bytes, 500_000);
        assert!(settings.scan.skip_dirs.iter().any(|d| d == "node_modules"));
        assert_eq!(settings.services.generation_model, "llama3:8b");
        assert_eq!(settings.services.retries, 0);
        assert_eq!(settings.index.chunk_chars, 1500);
        assert_eq!(settings.scoring, SeverityWeights::default());
    }

    #[test]
    fn test_default_weights() {
        let w = SeverityWeights::default();
        assert_eq!((w.critical, w.warning, w.info), (15, 5, 1));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (env::MODEL, "mistral"),
            (env::MAX_FILES, "10"),
            (env::TOP_K, "3"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.services.generation_model, "mistral");
        assert_eq!(settings.scan.max_files, 10);
        assert_eq!(settings.index.top_k, 3);
        assert_eq!(settings.index.chunk_chars, 1500);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(|key| (key == env::CHUNK_CHARS).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(env::CHUNK_CHARS));
    }

    #[test]
    fn test_coverage_ratio_overrides() {
        let vars: HashMap<&str, &str> = [
            (env::COVERAGE_GOOD_RATIO, "0.5"),
            (env::COVERAGE_MODERATE_RATIO, " 0.2 "),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        assert_eq!(settings.classification.coverage_good_ratio, 0.3);
        assert_eq!(settings.classification.coverage_moderate_ratio, 0.1);
        settings
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.classification.coverage_good_ratio, 0.5);
        assert_eq!(settings.classification.coverage_moderate_ratio, 0.2);
        assert!(validate(&settings).is_ok());

        let err = settings
            .apply_overrides(|key| (key == env::COVERAGE_GOOD_RATIO).then(|| "high".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(env::COVERAGE_GOOD_RATIO));
    }

    #[test]
    fn test_validate_rejects_inverted_coverage_ratios() {
        let mut settings = Settings::default();
        settings.classification.coverage_moderate_ratio = 0.4;
        assert!(validate(&settings).is_err());

        let mut settings = Settings::default();
        settings.classification.coverage_good_ratio = 2.0;
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn test_validate_rejects_second_retry() {
        let mut settings = Settings::default();
        settings.services.retries = 2;
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_threshold_and_glob() {
        let mut settings = Settings::default();
        settings.classification.monolith_scc_share = 1.5;
        assert!(validate(&settings).is_err());

        let mut settings = Settings::default();
        settings.scan.exclude = vec!["[".to_string()];
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn test_yaml_roundtrip_of_defaults() {
        let yaml = Settings::default().to_yaml().unwrap();
        let parsed: Settings = serde_yaml::from_str(&yaml).unwrap();
        assert!(validate(&parsed).is_ok());
        assert_eq!(parsed.services.base_url, "http://localhost:11434");
    }
}
