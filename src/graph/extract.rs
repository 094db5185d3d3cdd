//! Pluggable reference extractors.
//!
//! An extractor knows how to find import-like references in one family of
//! languages and how to turn each reference into candidate repository paths.
//! Extractors are looked up by [`Language`] in an [`ExtractorRegistry`]; a new
//! language only needs a new registration.

use std::collections::HashMap;
use std::sync::Arc;

use super::languages;
use super::resolve::PathIndex;
use crate::scan::Language;

/// A reference as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReference {
    pub target: String,
    /// 1-based line number.
    pub line: usize,
}

impl RawReference {
    pub fn new(target: impl Into<String>, line: usize) -> Self {
        Self {
            target: target.into(),
            line,
        }
    }
}

/// Finds and resolves references for a set of languages.
pub trait ReferenceExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn languages(&self) -> &'static [Language];

    /// References in file order, at most one per distinct target.
    fn extract(&self, content: &str) -> Vec<RawReference>;

    /// Repository files a reference from `from` points at. Empty means the
    /// reference is external or unresolved.
    fn resolve(&self, from: &str, reference: &RawReference, index: &PathIndex) -> Vec<String>;
}

/// Extractors keyed by language.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    by_language: HashMap<Language, Arc<dyn ReferenceExtractor>>,
}

impl ExtractorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in extractor.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(languages::PythonExtractor));
        registry.register(Arc::new(languages::JavaScriptExtractor));
        registry.register(Arc::new(languages::JvmExtractor));
        registry.register(Arc::new(languages::GoExtractor));
        registry.register(Arc::new(languages::RustExtractor));
        registry.register(Arc::new(languages::CFamilyExtractor));
        registry.register(Arc::new(languages::TextExtractor));
        registry
    }

    /// Register an extractor for all of its languages, replacing earlier ones.
    pub fn register(&mut self, extractor: Arc<dyn ReferenceExtractor>) {
        for lang in extractor.languages() {
            self.by_language.insert(*lang, Arc::clone(&extractor));
        }
    }

    pub fn for_language(&self, language: Language) -> Option<&dyn ReferenceExtractor> {
        self.by_language.get(&language).map(|e| e.as_ref())
    }

    pub fn supports(&self, language: Language) -> bool {
        self.by_language.contains_key(&language)
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self
            .by_language
            .iter()
            .map(|(lang, e)| format!("{}={}", lang, e.name()))
            .collect();
        names.sort();
        f.debug_struct("ExtractorRegistry")
            .field("extractors", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::resolve::{join, parent_dir};

    struct Markdown;

    impl ReferenceExtractor for Markdown {
        fn name(&self) -> &'static str {
            "markdown-links"
        }

        fn languages(&self) -> &'static [Language] {
            &[Language::Markdown]
        }

        fn extract(&self, content: &str) -> Vec<RawReference> {
            content
                .lines()
                .enumerate()
                .filter_map(|(i, line)| {
                    let start = line.find("](")? + 2;
                    let end = line[start..].find(')')? + start;
                    Some(RawReference::new(&line[start..end], i + 1))
                })
                .collect()
        }

        fn resolve(&self, from: &str, reference: &RawReference, index: &PathIndex) -> Vec<String> {
            join(parent_dir(from), &reference.target)
                .filter(|p| index.contains(p))
                .into_iter()
                .collect()
        }
    }

    #[test]
    fn test_defaults_cover_core_languages() {
        let registry = ExtractorRegistry::with_defaults();
        for lang in [
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Java,
            Language::Kotlin,
            Language::Go,
            Language::Rust,
            Language::Cpp,
            Language::Text,
        ] {
            assert!(registry.supports(lang), "missing extractor for {}", lang);
        }
        assert!(!registry.supports(Language::Markdown));
    }

    #[test]
    fn test_register_custom_extractor() {
        let mut registry = ExtractorRegistry::with_defaults();
        registry.register(Arc::new(Markdown));
        let extractor = registry.for_language(Language::Markdown).unwrap();
        assert_eq!(extractor.name(), "markdown-links");

        let refs = extractor.extract("See [guide](docs/guide.md).\n");
        assert_eq!(refs, vec![RawReference::new("docs/guide.md", 1)]);

        let index = PathIndex::new(["README.md", "docs/guide.md"]);
        assert_eq!(
            extractor.resolve("README.md", &refs[0], &index),
            vec!["docs/guide.md".to_string()]
        );
    }
}
