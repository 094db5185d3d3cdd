//! Language detection from file names and extensions.

use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Kotlin,
    Scala,
    Go,
    Rust,
    C,
    Cpp,
    CSharp,
    Ruby,
    Php,
    Swift,
    Shell,
    Sql,
    Html,
    Css,
    Markdown,
    Yaml,
    Json,
    Toml,
    Xml,
    GraphQL,
    Protobuf,
    Dockerfile,
    Text,
    Other,
}

static EXTENSIONS: phf::Map<&'static str, Language> = phf_map! {
    "py" => Language::Python,
    "pyi" => Language::Python,
    "js" => Language::JavaScript,
    "jsx" => Language::JavaScript,
    "mjs" => Language::JavaScript,
    "cjs" => Language::JavaScript,
    "ts" => Language::TypeScript,
    "tsx" => Language::TypeScript,
    "java" => Language::Java,
    "kt" => Language::Kotlin,
    "kts" => Language::Kotlin,
    "scala" => Language::Scala,
    "go" => Language::Go,
    "rs" => Language::Rust,
    "c" => Language::C,
    "h" => Language::C,
    "cc" => Language::Cpp,
    "cpp" => Language::Cpp,
    "cxx" => Language::Cpp,
    "hpp" => Language::Cpp,
    "hh" => Language::Cpp,
    "cs" => Language::CSharp,
    "rb" => Language::Ruby,
    "php" => Language::Php,
    "swift" => Language::Swift,
    "sh" => Language::Shell,
    "bash" => Language::Shell,
    "zsh" => Language::Shell,
    "sql" => Language::Sql,
    "html" => Language::Html,
    "htm" => Language::Html,
    "css" => Language::Css,
    "scss" => Language::Css,
    "md" => Language::Markdown,
    "markdown" => Language::Markdown,
    "rst" => Language::Markdown,
    "yaml" => Language::Yaml,
    "yml" => Language::Yaml,
    "json" => Language::Json,
    "toml" => Language::Toml,
    "xml" => Language::Xml,
    "graphql" => Language::GraphQL,
    "gql" => Language::GraphQL,
    "graphqls" => Language::GraphQL,
    "proto" => Language::Protobuf,
    "txt" => Language::Text,
    "text" => Language::Text,
    "cfg" => Language::Text,
    "ini" => Language::Text,
};

static FILE_NAMES: phf::Map<&'static str, Language> = phf_map! {
    "Dockerfile" => Language::Dockerfile,
    "Containerfile" => Language::Dockerfile,
    "Jenkinsfile" => Language::Other,
    "Makefile" => Language::Other,
    "Gemfile" => Language::Ruby,
    "Rakefile" => Language::Ruby,
    "Pipfile" => Language::Toml,
    ".gitignore" => Language::Text,
    ".env" => Language::Text,
};

impl Language {
    /// Detect the language of a path.
    pub fn detect(path: &Path) -> Language {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if let Some(lang) = FILE_NAMES.get(name) {
            return *lang;
        }
        if name.starts_with("Dockerfile.") {
            return Language::Dockerfile;
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        EXTENSIONS.get(ext.as_str()).copied().unwrap_or(Language::Other)
    }

    /// Whether this is a programming language (as opposed to markup, data or prose).
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            Language::Python
                | Language::JavaScript
                | Language::TypeScript
                | Language::Java
                | Language::Kotlin
                | Language::Scala
                | Language::Go
                | Language::Rust
                | Language::C
                | Language::Cpp
                | Language::CSharp
                | Language::Ruby
                | Language::Php
                | Language::Swift
                | Language::Shell
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::Scala => "scala",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Swift => "swift",
            Language::Shell => "shell",
            Language::Sql => "sql",
            Language::Html => "html",
            Language::Css => "css",
            Language::Markdown => "markdown",
            Language::Yaml => "yaml",
            Language::Json => "json",
            Language::Toml => "toml",
            Language::Xml => "xml",
            Language::GraphQL => "graphql",
            Language::Protobuf => "protobuf",
            Language::Dockerfile => "dockerfile",
            Language::Text => "text",
            Language::Other => "other",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
