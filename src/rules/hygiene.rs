//! Repository hygiene checks: CI, linting, tests, docs, containers, env files.

use globset::{Glob, GlobSetBuilder};
use lazy_static::lazy_static;
use regex::Regex;

use super::context::{first_match, RuleContext};
use super::types::{Finding, RuleId, RuleResult, Severity};
use crate::graph::PathIndex;

/// Paths whose presence means a CI pipeline is configured.
const CI_INDICATORS: &[&str] = &[
    ".github/workflows",
    ".gitlab-ci.yml",
    "Jenkinsfile",
    ".circleci",
    ".travis.yml",
    "azure-pipelines.yml",
    "bitbucket-pipelines.yml",
    ".drone.yml",
    ".buildkite",
];

/// Files that configure a linter or formatter by existing.
const LINT_FILES: &[&str] = &[
    ".flake8",
    ".pylintrc",
    "ruff.toml",
    ".ruff.toml",
    ".eslintrc",
    ".eslintrc.js",
    ".eslintrc.cjs",
    ".eslintrc.json",
    ".eslintrc.yml",
    ".eslintrc.yaml",
    "eslint.config.js",
    "eslint.config.mjs",
    ".prettierrc",
    ".prettierrc.json",
    "biome.json",
    "checkstyle.xml",
    ".golangci.yml",
    ".golangci.yaml",
    "rustfmt.toml",
    ".rustfmt.toml",
    "clippy.toml",
    ".rubocop.yml",
    ".php-cs-fixer.php",
    ".swiftlint.yml",
];

/// Shared config files that only count when they configure a linter.
const SHARED_CONFIG_FILES: &[&str] = &["pyproject.toml", "setup.cfg", "tox.ini", "package.json"];

const CONTAINER_FILES: &[&str] = &[
    "Dockerfile",
    "Containerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

const ENV_EXAMPLES: &[&str] = &[".env.example", ".env.sample", ".env.template", "env.example"];

/// README shorter than this is reported as too short.
const MIN_README_BYTES: u64 = 100;

pub fn check_ci(ctx: &RuleContext<'_>) -> RuleResult {
    let mut result = RuleResult::new();
    if !CI_INDICATORS.iter().any(|p| ctx.exists(p)) {
        result.add(
            Finding::new(RuleId::MissingCi, Severity::Warning, "no CI/CD pipeline configuration found")
                .recommend("Add a CI pipeline (GitHub Actions, GitLab CI) for automated testing and deployment."),
        );
    }
    result
}

pub fn check_lint_config(ctx: &RuleContext<'_>) -> RuleResult {
    lazy_static! {
        static ref LINTER_RE: Regex =
            Regex::new(r"\b(ruff|flake8|pylint|black|isort|mypy|eslint|prettier|biome)\b").unwrap();
    }

    let mut result = RuleResult::new();
    if !ctx.inventory.is_code_repository() {
        return result;
    }

    let dedicated = ctx
        .inventory
        .files
        .iter()
        .any(|f| LINT_FILES.contains(&f.file_name()));
    if dedicated {
        return result;
    }

    let shared = ctx
        .inventory
        .files
        .iter()
        .filter(|f| SHARED_CONFIG_FILES.contains(&f.file_name()))
        .filter_map(|f| ctx.text(&f.path).map(|t| (f.path.as_str(), t)));
    if first_match(shared, &LINTER_RE).is_some() {
        return result;
    }

    result.add(
        Finding::new(
            RuleId::MissingLintConfig,
            Severity::Warning,
            "no linting or formatting configuration detected",
        )
        .recommend("Add a linter (ruff, eslint, clippy) and a formatter (black, prettier, rustfmt)."),
    );
    result
}

pub fn check_tests(ctx: &RuleContext<'_>) -> RuleResult {
    lazy_static! {
        static ref TEST_RE: Regex = Regex::new(
            r"(?m)(^\s*(?:async\s+)?def test_|#\[(?:tokio::)?test\]|@Test\b|^func Test\w*\(|\b(?:describe|it|test)\(\s*['`])"
        )
        .unwrap();
    }

    let mut result = RuleResult::new();
    if !ctx.inventory.is_code_repository() {
        return result;
    }
    if ctx.inventory.files.iter().any(|f| f.is_test()) {
        return result;
    }
    if first_match(ctx.source_texts(), &TEST_RE).is_some() {
        return result;
    }

    result.add(
        Finding::new(RuleId::MissingTests, Severity::Warning, "no test files or test functions found")
            .recommend("Add unit tests (pytest, Jest, JUnit, cargo test) for the core logic."),
    );
    result
}

pub fn check_readme(ctx: &RuleContext<'_>) -> RuleResult {
    let mut result = RuleResult::new();
    if !ctx.inventory.is_code_repository() {
        return result;
    }

    let readme = ctx
        .inventory
        .files
        .iter()
        .filter(|f| !f.path.contains('/'))
        .find(|f| {
            let lower = f.path.to_ascii_lowercase();
            lower == "readme" || lower.starts_with("readme.")
        });

    match readme {
        None => result.add(
            Finding::new(RuleId::MissingReadme, Severity::Info, "no README found")
                .recommend("Add a README with a project description, setup and usage instructions."),
        ),
        Some(file) if file.size < MIN_README_BYTES => result.add(
            Finding::new(
                RuleId::MissingReadme,
                Severity::Info,
                format!("README is very short ({} bytes)", file.size),
            )
            .at(&file.path, None)
            .recommend("Expand the README with setup instructions, an architecture overview and examples."),
        ),
        Some(_) => {}
    }
    result
}

pub fn check_container_config(ctx: &RuleContext<'_>) -> RuleResult {
    let mut result = RuleResult::new();
    if !ctx.inventory.is_code_repository() {
        return result;
    }
    if !ctx
        .inventory
        .files
        .iter()
        .any(|f| CONTAINER_FILES.contains(&f.file_name()))
    {
        result.add(
            Finding::new(
                RuleId::MissingContainerConfig,
                Severity::Info,
                "no Dockerfile or compose file found",
            )
            .recommend("Consider adding container support for consistent deployments."),
        );
    }
    result
}

/// `.env` files that `.gitignore` does not cover, and `.env` files without a template.
pub fn check_env_files(ctx: &RuleContext<'_>) -> RuleResult {
    let mut result = RuleResult::new();
    let paths = PathIndex::new(ctx.inventory.files.iter().map(|f| f.path.as_str()));

    for env in ctx.inventory.named(".env") {
        if !is_ignored(ctx, &env.path) {
            result.add(
                Finding::new(
                    RuleId::CommittedEnvFile,
                    Severity::Critical,
                    ".env file is present and not covered by .gitignore",
                )
                .at(&env.path, None)
                .recommend("Add `.env` to .gitignore and rotate any secrets it contains."),
            );
        }

        let dir = parent(&env.path);
        let has_example = ENV_EXAMPLES
            .iter()
            .any(|name| paths.contains(&join(dir, name)));
        if !has_example {
            result.add(
                Finding::new(
                    RuleId::MissingEnvExample,
                    Severity::Info,
                    ".env exists but no .env.example template is provided",
                )
                .at(&env.path, None)
                .recommend("Commit a `.env.example` listing the required variables without values."),
            );
        }
    }
    result.sorted()
}

/// Whether any `.gitignore` between the root and `path` ignores it.
fn is_ignored(ctx: &RuleContext<'_>, path: &str) -> bool {
    for ignore in ctx.inventory.named(".gitignore") {
        let base = parent(&ignore.path);
        let relative = if base.is_empty() {
            path
        } else {
            match path.strip_prefix(base).and_then(|p| p.strip_prefix('/')) {
                Some(rest) => rest,
                None => continue,
            }
        };

        let Some(text) = ctx.text(&ignore.path) else {
            continue;
        };

        let mut builder = GlobSetBuilder::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let anchored = line.starts_with('/') || line.trim_end_matches('/').contains('/');
            let pattern = line.trim_start_matches('/').trim_end_matches('/');
            let candidates = if anchored {
                vec![pattern.to_string(), format!("{}/**", pattern)]
            } else {
                vec![
                    format!("**/{}", pattern),
                    format!("**/{}/**", pattern),
                ]
            };
            for candidate in candidates {
                if let Ok(glob) = Glob::new(&candidate) {
                    builder.add(glob);
                }
            }
        }
        if let Ok(set) = builder.build() {
            if set.is_match(relative) {
                return true;
            }
        }
    }
    false
}

fn parent(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}
