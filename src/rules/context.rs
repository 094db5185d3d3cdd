//! Read-only inputs shared by every check.

use once_cell::sync::OnceCell;
use rayon::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::classify::ArchitectureReport;
use crate::config::Settings;
use crate::graph::DependencyGraph;
use crate::scan::{FileRecord, Inventory};
use crate::state::{Degraded, DegradedKind, Stage};
use crate::workers;

/// Text of every non-binary file, capped per file. Files over the scanner's
/// size limit are still read up to the cap.
#[derive(Debug, Default)]
struct TextCache {
    texts: BTreeMap<String, String>,
    failures: Vec<Degraded>,
}

/// What a check may look at.
pub struct RuleContext<'a> {
    pub root: &'a Path,
    pub inventory: &'a Inventory,
    pub graph: &'a DependencyGraph,
    pub architecture: &'a ArchitectureReport,
    pub settings: &'a Settings,
    cache: OnceCell<TextCache>,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        root: &'a Path,
        inventory: &'a Inventory,
        graph: &'a DependencyGraph,
        architecture: &'a ArchitectureReport,
        settings: &'a Settings,
    ) -> Self {
        Self {
            root,
            inventory,
            graph,
            architecture,
            settings,
            cache: OnceCell::new(),
        }
    }

    /// Loaded on first use; files are read in parallel.
    fn cache(&self) -> &TextCache {
        self.cache.get_or_init(|| {
            let limit = self.settings.rules.secret_scan_max_bytes;
            let readable: Vec<&FileRecord> =
                self.inventory.files.iter().filter(|f| !f.binary).collect();

            let loaded: Vec<(String, Result<Option<String>, String>)> =
                workers::install(self.settings.scan.workers, || {
                    readable
                        .par_iter()
                        .map(|file| {
                            let result = read_prefix(&self.root.join(&file.path), limit);
                            (file.path.clone(), result)
                        })
                        .collect()
                });

            let mut cache = TextCache::default();
            for (path, result) in loaded {
                match result {
                    Ok(Some(text)) => {
                        cache.texts.insert(path, text);
                    }
                    Ok(None) => {}
                    Err(message) => cache.failures.push(Degraded::new(
                        Stage::GapAnalysis,
                        DegradedKind::Rule,
                        path,
                        message,
                    )),
                }
            }
            cache
        })
    }

    /// The first `secret_scan_max_bytes` bytes of a file, if it was readable.
    pub fn text(&self, path: &str) -> Option<&str> {
        self.cache().texts.get(path).map(String::as_str)
    }

    /// Every readable text file, in path order.
    pub fn texts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cache()
            .texts
            .iter()
            .map(|(p, t)| (p.as_str(), t.as_str()))
    }

    /// Readable source files, in path order.
    pub fn source_texts(&self) -> Vec<(&str, &str)> {
        self.texts()
            .filter(|(path, _)| {
                self.inventory
                    .get(path)
                    .map(|f| f.language.is_source())
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Whether a file exists at `path`, or any file lives under `path/`.
    pub fn exists(&self, path: &str) -> bool {
        if self.inventory.contains(path) {
            return true;
        }
        let prefix = format!("{}/", path);
        self.inventory.files.iter().any(|f| f.path.starts_with(&prefix))
    }

    /// Files that could not be read, if the cache was ever loaded.
    pub fn take_failures(self) -> Vec<Degraded> {
        self.cache.into_inner().map(|c| c.failures).unwrap_or_default()
    }
}

/// First file among `files` whose text matches `pattern`.
pub fn first_match<'s, I>(files: I, pattern: &Regex) -> Option<&'s str>
where
    I: IntoIterator<Item = (&'s str, &'s str)>,
{
    files
        .into_iter()
        .find(|(_, text)| pattern.is_match(text))
        .map(|(path, _)| path)
}

/// `None` when the prefix holds a NUL byte. Oversized files never went
/// through the scanner's binary sniff, so the check is repeated here.
fn read_prefix(path: &Path, limit: usize) -> Result<Option<String>, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let mut bytes = Vec::new();
    file.take(limit as u64)
        .read_to_end(&mut bytes)
        .map_err(|e| e.to_string())?;
    if bytes.contains(&0) {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_prefix_caps_and_skips_binary() {
        let dir = TempDir::new().unwrap();
        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "abcdefgh").unwrap();
        assert_eq!(read_prefix(&text, 4).unwrap().as_deref(), Some("abcd"));

        let blob = dir.path().join("blob.bin");
        std::fs::write(&blob, [1u8, 0, 2, 3]).unwrap();
        assert_eq!(read_prefix(&blob, 16).unwrap(), None);
    }
}
