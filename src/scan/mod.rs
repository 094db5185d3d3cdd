//! Repository scanner.
//!
//! Walks a repository root and builds the ordered file inventory that every
//! later stage reads. The walk itself is sequential and sorted so the
//! inventory order is stable. Hashing and chunk boundary detection run on a
//! bounded worker pool.

mod language;

pub use language::Language;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Settings;
use crate::index::chunk;
use crate::state::{Degraded, DegradedKind, Stage};
use crate::workers;

/// Bytes inspected when sniffing for binary content.
const BINARY_SNIFF_BYTES: usize = 8192;

/// Errors that abort a scan.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("repository root {path} is not readable: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One file in the inventory. Never mutated after the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    pub size: u64,
    pub language: Language,
    pub binary: bool,
    /// SHA-256 of the content. `None` for binary, oversized or unreadable files.
    pub content_hash: Option<String>,
    /// Non-blank lines.
    pub lines: usize,
    /// Byte ranges of the chunks the file splits into.
    pub chunks: Vec<Range<usize>>,
}

impl FileRecord {
    /// File name component of the path.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Whether the text content was read successfully.
    pub fn has_text(&self) -> bool {
        !self.binary && self.content_hash.is_some()
    }

    /// Whether this looks like a test file.
    pub fn is_test(&self) -> bool {
        self.language.is_source() && is_test_path(&self.path)
    }
}

/// Heuristic test-file detection by path.
///
/// A file counts when it sits under a test directory, or when its name has
/// a test stem (`test_x.py`, `x_test.go`, `XTest.java`) or a `.test.`/`.spec.`
/// infix (`x.spec.ts`).
pub fn is_test_path(path: &str) -> bool {
    let mut segments = path.split('/').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            return is_test_file_name(segment);
        }
        let dir = segment.to_ascii_lowercase();
        if matches!(dir.as_str(), "test" | "tests" | "__tests__" | "spec" | "specs") {
            return true;
        }
    }
    false
}

fn is_test_file_name(name: &str) -> bool {
    let mut parts = name.split('.');
    let stem = parts.next().unwrap_or(name);
    let rest: Vec<&str> = parts.collect();

    // Infixes only; the last part is the extension.
    if rest.len() > 1
        && rest[..rest.len() - 1]
            .iter()
            .any(|p| p.eq_ignore_ascii_case("test") || p.eq_ignore_ascii_case("spec"))
    {
        return true;
    }

    let lower = stem.to_ascii_lowercase();
    if matches!(lower.as_str(), "test" | "tests")
        || lower.starts_with("test_")
        || lower.ends_with("_test")
        || lower.ends_with("_tests")
    {
        return true;
    }

    // Java and Kotlin name test classes `FooTest` / `FooTests`.
    stem.len() > 4 && (stem.ends_with("Test") || stem.ends_with("Tests"))
}

/// The scanner's section of the analysis state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub files: Vec<FileRecord>,
    /// File count per detected language.
    pub languages: BTreeMap<Language, usize>,
    pub total_bytes: u64,
    /// True when the file limit cut the walk short.
    pub truncated: bool,
}

impl Inventory {
    pub fn new(files: Vec<FileRecord>, truncated: bool) -> Self {
        let mut languages = BTreeMap::new();
        let mut total_bytes = 0;
        for file in &files {
            *languages.entry(file.language).or_insert(0) += 1;
            total_bytes += file.size;
        }
        Self {
            files,
            languages,
            total_bytes,
            truncated,
        }
    }

    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.files
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.files[i])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Files whose name equals `name`, at any depth.
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FileRecord> + 'a {
        self.files.iter().filter(move |f| f.file_name() == name)
    }

    pub fn source_files(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.iter().filter(|f| f.language.is_source())
    }

    /// A repository holding at least one file in a programming language.
    pub fn is_code_repository(&self) -> bool {
        self.source_files().next().is_some()
    }
}

/// Scanner result: the inventory plus anything that went wrong on the way.
#[derive(Debug)]
pub struct ScanOutput {
    pub inventory: Inventory,
    pub degraded: Vec<Degraded>,
}

/// Scan a repository root.
///
/// Only an unreadable root is fatal; every other problem becomes a
/// [`Degraded`] record.
pub fn scan_repository(root: &Path, settings: &Settings) -> Result<ScanOutput, ScanError> {
    fs::read_dir(root).map_err(|source| ScanError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let scan = &settings.scan;
    let exclude = build_exclude_set(&scan.exclude);
    let mut degraded = Vec::new();
    let mut paths: Vec<(String, PathBuf)> = Vec::new();
    let mut truncated = false;

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !scan.skip_dirs.iter().any(|d| d == name.as_ref())
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let subject = err
                    .path()
                    .map(|p| relative_path(root, p))
                    .unwrap_or_else(|| ".".to_string());
                warn!(path = %subject, error = %err, "skipping unreadable path");
                degraded.push(Degraded::new(
                    Stage::Scan,
                    DegradedKind::Traversal,
                    subject,
                    err.to_string(),
                ));
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let rel = relative_path(root, entry.path());
        if exclude.as_ref().map(|set| set.is_match(&rel)).unwrap_or(false) {
            continue;
        }

        if paths.len() >= scan.max_files {
            truncated = true;
            break;
        }
        paths.push((rel, entry.into_path()));
    }

    if truncated {
        warn!(limit = scan.max_files, "file limit reached, inventory truncated");
        degraded.push(Degraded::new(
            Stage::Scan,
            DegradedKind::Truncation,
            ".",
            format!(
                "file limit of {} reached; remaining files were not scanned",
                scan.max_files
            ),
        ));
    }

    let chunk_chars = settings.index.chunk_chars;
    let max_size = scan.max_file_size_bytes;
    let inspected: Vec<(FileRecord, Option<Degraded>)> = workers::install(scan.workers, || {
        paths
            .par_iter()
            .map(|(rel, abs)| inspect_file(rel, abs, max_size, chunk_chars))
            .collect()
    });

    let mut files = Vec::with_capacity(inspected.len());
    for (record, problem) in inspected {
        files.push(record);
        degraded.extend(problem);
    }
    // Walk order is by file name per directory; the inventory is keyed by full path.
    files.sort_by(|a, b| a.path.cmp(&b.path));

    info!(files = files.len(), truncated, "scan complete");
    Ok(ScanOutput {
        inventory: Inventory::new(files, truncated),
        degraded,
    })
}

fn build_exclude_set(patterns: &[String]) -> Option<globset::GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = globset::GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = globset::Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().ok()
}

/// Convert an absolute path under `root` into a `/`-separated relative path.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn inspect_file(
    rel: &str,
    abs: &Path,
    max_size: u64,
    chunk_chars: usize,
) -> (FileRecord, Option<Degraded>) {
    let language = Language::detect(Path::new(rel));
    let mut record = FileRecord {
        path: rel.to_string(),
        size: 0,
        language,
        binary: false,
        content_hash: None,
        lines: 0,
        chunks: Vec::new(),
    };

    match fs::metadata(abs) {
        Ok(meta) => record.size = meta.len(),
        Err(e) => {
            return (
                record,
                Some(Degraded::new(Stage::Scan, DegradedKind::File, rel, e.to_string())),
            )
        }
    }

    if record.size > max_size {
        debug!(path = rel, size = record.size, "file exceeds size limit, not hashed");
        return (record, None);
    }

    let bytes = match fs::read(abs) {
        Ok(bytes) => bytes,
        Err(e) => {
            return (
                record,
                Some(Degraded::new(Stage::Scan, DegradedKind::File, rel, e.to_string())),
            )
        }
    };

    let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
    let text = match std::str::from_utf8(&bytes) {
        Ok(text) if !sniff.contains(&0) => text,
        _ => {
            record.binary = true;
            return (record, None);
        }
    };

    record.content_hash = Some(format!("{:x}", Sha256::digest(&bytes)));
    record.lines = text.lines().filter(|l| !l.trim().is_empty()).count();
    record.chunks = chunk::boundaries(text, chunk_chars);
    (record, None)
}
