//! Built-in reference extractors.
//!
//! All of them are line-oriented regex scanners. They skip obvious comment
//! lines but make no attempt to parse the language.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

use super::extract::{RawReference, ReferenceExtractor};
use super::resolve::{extension, file_stem, join, parent_dir, PathIndex};
use crate::scan::Language;

/// Collects references, keeping the first occurrence of each target.
struct Collector {
    refs: Vec<RawReference>,
    seen: HashSet<String>,
}

impl Collector {
    fn new() -> Self {
        Self {
            refs: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn push(&mut self, target: &str, line: usize) {
        let target = target.trim();
        if !target.is_empty() && self.seen.insert(target.to_string()) {
            self.refs.push(RawReference::new(target, line));
        }
    }

    fn finish(self) -> Vec<RawReference> {
        self.refs
    }
}

fn is_comment(trimmed: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| trimmed.starts_with(m))
}

// =============================================================================
// Python
// =============================================================================

pub struct PythonExtractor;

impl ReferenceExtractor for PythonExtractor {
    fn name(&self) -> &'static str {
        "python"
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Python]
    }

    fn extract(&self, content: &str) -> Vec<RawReference> {
        lazy_static! {
            static ref IMPORT_RE: Regex = Regex::new(r"^\s*import\s+(.+)$").unwrap();
            static ref FROM_RE: Regex =
                Regex::new(r"^\s*from\s+(\.*[\w.]*)\s+import\s+\(?\s*([^)#]+)").unwrap();
        }

        let mut out = Collector::new();
        for (i, line) in content.lines().enumerate() {
            let trimmed = line.trim_start();
            if is_comment(trimmed, &["#"]) {
                continue;
            }

            if let Some(caps) = FROM_RE.captures(line) {
                let module = &caps[1];
                if module.chars().all(|c| c == '.') {
                    // from . import a, b
                    for name in caps[2].split(',') {
                        let name = name.split_whitespace().next().unwrap_or("");
                        if !name.is_empty() {
                            out.push(&format!("{}{}", module, name), i + 1);
                        }
                    }
                } else {
                    out.push(module, i + 1);
                }
            } else if let Some(caps) = IMPORT_RE.captures(line) {
                for part in caps[1].split(',') {
                    let module = part.split_whitespace().next().unwrap_or("");
                    if module.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
                        out.push(module, i + 1);
                    }
                }
            }
        }
        out.finish()
    }

    fn resolve(&self, from: &str, reference: &RawReference, index: &PathIndex) -> Vec<String> {
        let target = reference.target.as_str();
        let dots = target.chars().take_while(|c| *c == '.').count();
        let module_path = target[dots..].replace('.', "/");

        let mut bases: Vec<String> = Vec::new();
        if dots > 0 {
            let mut dir = parent_dir(from).to_string();
            for _ in 1..dots {
                dir = parent_dir(&dir).to_string();
            }
            bases.push(dir);
        } else {
            // Absolute imports may be rooted at any ancestor (src layouts, packages).
            let mut dir = parent_dir(from);
            loop {
                bases.push(dir.to_string());
                if dir.is_empty() {
                    break;
                }
                dir = parent_dir(dir);
            }
        }

        let candidates = bases.iter().flat_map(|base| {
            let stem = join(base, &module_path).unwrap_or_default();
            [format!("{}.py", stem), format!("{}/__init__.py", stem)]
        });
        index
            .first_existing(candidates.filter(|c| !c.starts_with('.') && c != "/__init__.py"))
            .into_iter()
            .collect()
    }
}

// =============================================================================
// JavaScript / TypeScript
// =============================================================================

const JS_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

pub struct JavaScriptExtractor;

impl ReferenceExtractor for JavaScriptExtractor {
    fn name(&self) -> &'static str {
        "javascript"
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::JavaScript, Language::TypeScript]
    }

    fn extract(&self, content: &str) -> Vec<RawReference> {
        lazy_static! {
            static ref MODULE_RE: Regex = Regex::new(
                r#"(?:\bfrom\s+|\bimport\s+|\brequire\s*\(\s*|\bimport\s*\(\s*)['"]([^'"]+)['"]"#
            )
            .unwrap();
        }

        let mut out = Collector::new();
        for (i, line) in content.lines().enumerate() {
            if is_comment(line.trim_start(), &["//", "*", "/*"]) {
                continue;
            }
            for caps in MODULE_RE.captures_iter(line) {
                out.push(&caps[1], i + 1);
            }
        }
        out.finish()
    }

    fn resolve(&self, from: &str, reference: &RawReference, index: &PathIndex) -> Vec<String> {
        let target = reference.target.as_str();
        let base = if target.starts_with("./") || target.starts_with("../") {
            join(parent_dir(from), target)
        } else if let Some(rest) = target.strip_prefix("@/") {
            join("src", rest)
        } else if let Some(rest) = target.strip_prefix('/') {
            join("", rest)
        } else {
            None
        };

        let Some(base) = base else {
            return Vec::new();
        };

        let mut candidates = vec![base.clone()];
        candidates.extend(JS_EXTENSIONS.iter().map(|ext| format!("{}.{}", base, ext)));
        candidates.extend(JS_EXTENSIONS.iter().map(|ext| format!("{}/index.{}", base, ext)));
        index.first_existing(candidates).into_iter().collect()
    }
}

// =============================================================================
// JVM (Java, Kotlin, Scala)
// =============================================================================

const JVM_EXTENSIONS: &[&str] = &["java", "kt", "scala"];

pub struct JvmExtractor;

impl ReferenceExtractor for JvmExtractor {
    fn name(&self) -> &'static str {
        "jvm"
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Java, Language::Kotlin, Language::Scala]
    }

    fn extract(&self, content: &str) -> Vec<RawReference> {
        lazy_static! {
            static ref IMPORT_RE: Regex =
                Regex::new(r"^\s*import\s+(?:static\s+)?([\w.]+?)(\.\*|\._)?\s*;?\s*$").unwrap();
        }

        let mut out = Collector::new();
        for (i, line) in content.lines().enumerate() {
            if let Some(caps) = IMPORT_RE.captures(line) {
                let wildcard = if caps.get(2).is_some() { ".*" } else { "" };
                out.push(&format!("{}{}", &caps[1], wildcard), i + 1);
            }
        }
        out.finish()
    }

    fn resolve(&self, _from: &str, reference: &RawReference, index: &PathIndex) -> Vec<String> {
        if let Some(package) = reference.target.strip_suffix(".*") {
            let dir = package.replace('.', "/");
            return index
                .dirs_with_suffix(&dir)
                .into_iter()
                .flat_map(|d| index.files_in(d).iter().cloned())
                .filter(|p| extension(p).map(|e| JVM_EXTENSIONS.contains(&e)).unwrap_or(false))
                .collect();
        }

        // Try the class itself, then the enclosing class for static/nested imports.
        let path = reference.target.replace('.', "/");
        let mut attempts = vec![path.as_str()];
        if let Some(i) = path.rfind('/') {
            attempts.push(&path[..i]);
        }

        for attempt in attempts {
            let found: Vec<String> = JVM_EXTENSIONS
                .iter()
                .flat_map(|ext| index.with_suffix(&format!("{}.{}", attempt, ext)))
                .collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }
}

// =============================================================================
// Go
// =============================================================================

pub struct GoExtractor;

impl ReferenceExtractor for GoExtractor {
    fn name(&self) -> &'static str {
        "go"
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Go]
    }

    fn extract(&self, content: &str) -> Vec<RawReference> {
        lazy_static! {
            static ref SINGLE_RE: Regex =
                Regex::new(r#"^\s*import\s+(?:[\w.]+\s+)?"([^"]+)""#).unwrap();
            static ref BLOCK_LINE_RE: Regex = Regex::new(r#"^\s*(?:[\w.]+\s+)?"([^"]+)""#).unwrap();
        }

        let mut out = Collector::new();
        let mut in_block = false;
        for (i, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if in_block {
                if trimmed.starts_with(')') {
                    in_block = false;
                } else if let Some(caps) = BLOCK_LINE_RE.captures(line) {
                    out.push(&caps[1], i + 1);
                }
                continue;
            }
            if trimmed.starts_with("import") && trimmed.ends_with('(') {
                in_block = true;
            } else if let Some(caps) = SINGLE_RE.captures(line) {
                out.push(&caps[1], i + 1);
            }
        }
        out.finish()
    }

    fn resolve(&self, _from: &str, reference: &RawReference, index: &PathIndex) -> Vec<String> {
        let segments: Vec<&str> = reference.target.split('/').collect();
        // Module prefixes are unknown without go.mod; match the longest
        // trailing path of at least two segments against package directories.
        let min_len = if segments.len() == 1 { 1 } else { 2 };
        for start in 0..=segments.len().saturating_sub(min_len) {
            let suffix = segments[start..].join("/");
            let dirs = index.dirs_with_suffix(&suffix);
            let files: Vec<String> = dirs
                .into_iter()
                .flat_map(|d| index.files_in(d).iter().cloned())
                .filter(|p| p.ends_with(".go") && !p.ends_with("_test.go"))
                .collect();
            if !files.is_empty() {
                return files;
            }
        }
        Vec::new()
    }
}

// =============================================================================
// Rust
// =============================================================================

pub struct RustExtractor;

impl ReferenceExtractor for RustExtractor {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Rust]
    }

    fn extract(&self, content: &str) -> Vec<RawReference> {
        lazy_static! {
            static ref MOD_RE: Regex =
                Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+(\w+)\s*;").unwrap();
            static ref USE_RE: Regex =
                Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+(?:::)?(\w+)(?:::(\w+))?").unwrap();
        }

        let mut out = Collector::new();
        for (i, line) in content.lines().enumerate() {
            if is_comment(line.trim_start(), &["//"]) {
                continue;
            }
            if let Some(caps) = MOD_RE.captures(line) {
                out.push(&format!("mod {}", &caps[1]), i + 1);
            } else if let Some(caps) = USE_RE.captures(line) {
                let root = &caps[1];
                match (root, caps.get(2)) {
                    ("crate" | "super" | "self", Some(seg)) => {
                        out.push(&format!("{}::{}", root, seg.as_str()), i + 1)
                    }
                    ("crate" | "super" | "self", None) => {}
                    _ => out.push(root, i + 1),
                }
            }
        }
        out.finish()
    }

    fn resolve(&self, from: &str, reference: &RawReference, index: &PathIndex) -> Vec<String> {
        let dir = parent_dir(from);
        let stem = file_stem(from);
        let is_root_like = matches!(stem, "mod" | "lib" | "main");
        // Directory holding the children of the current module.
        let module_dir = if is_root_like {
            dir.to_string()
        } else {
            join(dir, stem).unwrap_or_default()
        };

        let child = |base: &str, name: &str| {
            vec![
                join(base, &format!("{}.rs", name)).unwrap_or_default(),
                join(base, &format!("{}/mod.rs", name)).unwrap_or_default(),
            ]
        };

        let target = reference.target.as_str();
        let candidates = if let Some(name) = target.strip_prefix("mod ") {
            child(&module_dir, name)
        } else if let Some(name) = target.strip_prefix("self::") {
            child(&module_dir, name)
        } else if let Some(name) = target.strip_prefix("super::") {
            let parent = if is_root_like { parent_dir(dir) } else { dir };
            child(parent, name)
        } else if let Some(name) = target.strip_prefix("crate::") {
            match crate_root(dir, index) {
                Some(root) => child(&root, name),
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        index.first_existing(candidates).into_iter().collect()
    }
}

/// Nearest ancestor directory holding `lib.rs` or `main.rs`.
fn crate_root(start: &str, index: &PathIndex) -> Option<String> {
    let mut dir = start;
    loop {
        for root_file in ["lib.rs", "main.rs"] {
            let candidate = join(dir, root_file)?;
            if index.contains(&candidate) {
                return Some(dir.to_string());
            }
        }
        if dir.is_empty() {
            return None;
        }
        dir = parent_dir(dir);
    }
}

// =============================================================================
// C / C++
// =============================================================================

pub struct CFamilyExtractor;

impl ReferenceExtractor for CFamilyExtractor {
    fn name(&self) -> &'static str {
        "c-family"
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::C, Language::Cpp]
    }

    fn extract(&self, content: &str) -> Vec<RawReference> {
        lazy_static! {
            static ref INCLUDE_RE: Regex = Regex::new(r#"^\s*#\s*include\s*([<"])([^>"]+)[>"]"#).unwrap();
        }

        let mut out = Collector::new();
        for (i, line) in content.lines().enumerate() {
            if let Some(caps) = INCLUDE_RE.captures(line) {
                if &caps[1] == "<" {
                    out.push(&format!("<{}>", &caps[2]), i + 1);
                } else {
                    out.push(&caps[2], i + 1);
                }
            }
        }
        out.finish()
    }

    fn resolve(&self, from: &str, reference: &RawReference, index: &PathIndex) -> Vec<String> {
        let target = reference.target.as_str();
        if target.starts_with('<') {
            return Vec::new();
        }
        if let Some(local) = join(parent_dir(from), target).filter(|p| index.contains(p)) {
            return vec![local];
        }
        let matches = index.with_suffix(target);
        if matches.len() == 1 {
            return matches;
        }
        Vec::new()
    }
}

// =============================================================================
// Plain text
// =============================================================================

/// Generic `import X` / `include X` / `require X` lines in text files.
pub struct TextExtractor;

impl ReferenceExtractor for TextExtractor {
    fn name(&self) -> &'static str {
        "text"
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Text]
    }

    fn extract(&self, content: &str) -> Vec<RawReference> {
        lazy_static! {
            static ref DIRECTIVE_RE: Regex =
                Regex::new(r#"^\s*(?:import|include|require|@import)\s+["']?([\w./-]+)["']?"#).unwrap();
        }

        let mut out = Collector::new();
        for (i, line) in content.lines().enumerate() {
            if let Some(caps) = DIRECTIVE_RE.captures(line) {
                out.push(&caps[1], i + 1);
            }
        }
        out.finish()
    }

    fn resolve(&self, from: &str, reference: &RawReference, index: &PathIndex) -> Vec<String> {
        let dir = parent_dir(from);
        let target = reference.target.as_str();

        let mut candidates = Vec::new();
        if let Some(path) = join(dir, target) {
            candidates.push(path.clone());
            if let Some(ext) = extension(from) {
                candidates.push(format!("{}.{}", path, ext));
            }
        }
        if let Some(found) = index.first_existing(candidates) {
            return vec![found];
        }

        // Bare names resolve to the one sibling with that stem.
        if !target.contains('/') {
            if let Some(found) = index.unique_stem_in(dir, target) {
                return vec![found];
            }
        }
        Vec::new()
    }
}
