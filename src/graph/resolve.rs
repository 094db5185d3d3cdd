//! Path lookup used to resolve references to repository files.

use std::collections::{BTreeMap, BTreeSet};

/// Lookup tables over the graph's node paths.
#[derive(Debug, Default)]
pub struct PathIndex {
    files: BTreeSet<String>,
    by_dir: BTreeMap<String, Vec<String>>,
}

impl PathIndex {
    pub fn new<'a, I>(paths: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut index = PathIndex::default();
        for path in paths {
            index.files.insert(path.to_string());
            index
                .by_dir
                .entry(parent_dir(path).to_string())
                .or_default()
                .push(path.to_string());
        }
        for files in index.by_dir.values_mut() {
            files.sort();
        }
        index
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    /// Files directly inside `dir` (`""` is the root).
    pub fn files_in(&self, dir: &str) -> &[String] {
        self.by_dir.get(dir).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any file lives directly in `dir`.
    pub fn has_dir(&self, dir: &str) -> bool {
        self.by_dir.contains_key(dir)
    }

    /// First candidate that names a known file.
    pub fn first_existing<I>(&self, candidates: I) -> Option<String>
    where
        I: IntoIterator<Item = String>,
    {
        candidates.into_iter().find(|c| self.contains(c))
    }

    /// Files equal to `suffix` or ending in `/suffix`.
    pub fn with_suffix(&self, suffix: &str) -> Vec<String> {
        let slash = format!("/{}", suffix);
        self.files
            .iter()
            .filter(|p| p.as_str() == suffix || p.ends_with(&slash))
            .cloned()
            .collect()
    }

    /// Directories equal to `suffix` or ending in `/suffix`.
    pub fn dirs_with_suffix(&self, suffix: &str) -> Vec<&str> {
        let slash = format!("/{}", suffix);
        self.by_dir
            .keys()
            .filter(|d| d.as_str() == suffix || d.ends_with(&slash))
            .map(String::as_str)
            .collect()
    }

    /// The single file in `dir` whose stem is `stem`, if exactly one exists.
    pub fn unique_stem_in(&self, dir: &str, stem: &str) -> Option<String> {
        let mut matches = self.files_in(dir).iter().filter(|p| file_stem(p) == stem);
        let first = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some(first.clone())
    }
}

/// Directory part of a `/`-separated path (`""` for root-level files).
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

/// File name without its last extension.
pub fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(i) => &name[..i],
    }
}

/// Extension of the file name, without the dot.
pub fn extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(i) => Some(&name[i + 1..]),
    }
}

/// Join `rel` onto `dir`, normalising `.` and `..`.
///
/// Returns `None` if the result would escape the repository root.
pub fn join(dir: &str, rel: &str) -> Option<String> {
    let mut parts: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in rel.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_normalises() {
        assert_eq!(join("src/app", "./util.js").as_deref(), Some("src/app/util.js"));
        assert_eq!(join("src/app", "../lib/x").as_deref(), Some("src/lib/x"));
        assert_eq!(join("", "A").as_deref(), Some("A"));
        assert_eq!(join("src", "../../x"), None);
    }

    #[test]
    fn test_stems_and_dirs() {
        assert_eq!(parent_dir("a/b/c.py"), "a/b");
        assert_eq!(parent_dir("c.py"), "");
        assert_eq!(file_stem("a/b/c.test.ts"), "c.test");
        assert_eq!(file_stem(".env"), ".env");
        assert_eq!(extension("a/b.txt"), Some("txt"));
        assert_eq!(extension("Makefile"), None);
    }

    #[test]
    fn test_index_lookups() {
        let index = PathIndex::new(["A.txt", "B.txt", "src/com/acme/User.java", "pkg/db/db.go"]);
        assert_eq!(index.unique_stem_in("", "A").as_deref(), Some("A.txt"));
        assert_eq!(index.with_suffix("com/acme/User.java"), vec!["src/com/acme/User.java"]);
        assert_eq!(index.dirs_with_suffix("db"), vec!["pkg/db"]);
        assert!(index.has_dir("pkg/db"));
        assert_eq!(index.files_in("pkg/db"), ["pkg/db/db.go".to_string()]);
    }
}
