//! Framework-specific anti-patterns, keyed on detected technologies.

use lazy_static::lazy_static;
use regex::Regex;

use super::context::{first_match, RuleContext};
use super::types::{Finding, RuleId, RuleResult, Severity};

lazy_static! {
    static ref FASTAPI_APP_RE: Regex = Regex::new(r"\bFastAPI\(").unwrap();
    static ref FASTAPI_ERRORS_RE: Regex =
        Regex::new(r"@\w+\.exception_handler|\bHTTPException\b|add_exception_handler").unwrap();
    static ref FASTAPI_RESPONSE_MODEL_RE: Regex = Regex::new(r"response_model\s*=").unwrap();
    static ref EXPRESS_APP_RE: Regex = Regex::new(r#"require\(\s*['"]express['"]\s*\)|from\s+['"]express['"]"#).unwrap();
    static ref HELMET_RE: Regex = Regex::new(r"\bhelmet\b").unwrap();
    static ref FLASK_DEBUG_RE: Regex = Regex::new(r"\.run\(.*debug\s*=\s*True").unwrap();
    static ref DJANGO_DEBUG_RE: Regex = Regex::new(r"^\s*DEBUG\s*=\s*True\b").unwrap();
}

pub fn check_framework_anti_patterns(ctx: &RuleContext<'_>) -> RuleResult {
    let mut result = RuleResult::new();
    let sources = ctx.source_texts();
    result.scanned = sources.len();

    if ctx.architecture.has_technology("FastAPI") {
        let app = first_match(sources.iter().copied(), &FASTAPI_APP_RE);
        let anchor = |finding: Finding| match app {
            Some(path) => finding.at(path, None),
            None => finding,
        };

        if first_match(sources.iter().copied(), &FASTAPI_ERRORS_RE).is_none() {
            result.add(anchor(
                Finding::new(
                    RuleId::FrameworkAntiPattern,
                    Severity::Warning,
                    "FastAPI app defines no exception handlers or HTTPException responses",
                )
                .recommend("Register exception handlers so clients receive consistent error responses."),
            ));
        }
        if first_match(sources.iter().copied(), &FASTAPI_RESPONSE_MODEL_RE).is_none() {
            result.add(anchor(
                Finding::new(
                    RuleId::FrameworkAntiPattern,
                    Severity::Info,
                    "FastAPI endpoints declare no response_model",
                )
                .recommend("Declare response_model on endpoints to validate and document responses."),
            ));
        }
    }

    if ctx.architecture.has_technology("Express") {
        let app = first_match(sources.iter().copied(), &EXPRESS_APP_RE);
        let uses_helmet = first_match(ctx.texts(), &HELMET_RE).is_some();
        if !uses_helmet {
            let finding = Finding::new(
                RuleId::FrameworkAntiPattern,
                Severity::Warning,
                "Express app does not use helmet for security headers",
            )
            .recommend("Add the helmet middleware to set secure HTTP headers.");
            result.add(match app {
                Some(path) => finding.at(path, None),
                None => finding,
            });
        }
    }

    if ctx.architecture.has_technology("Flask") {
        per_line(
            &mut result,
            &sources,
            &FLASK_DEBUG_RE,
            "Flask app runs with debug=True",
            "Never enable the Flask debugger outside local development.",
        );
    }

    if ctx.architecture.has_technology("Django") {
        per_line(
            &mut result,
            &sources,
            &DJANGO_DEBUG_RE,
            "Django DEBUG is hardcoded to True",
            "Read DEBUG from the environment and default it to False.",
        );
    }

    result
}

fn per_line(
    result: &mut RuleResult,
    sources: &[(&str, &str)],
    pattern: &Regex,
    message: &str,
    recommendation: &str,
) {
    for (path, text) in sources {
        for (idx, line) in text.lines().enumerate() {
            if pattern.is_match(line) {
                result.add(
                    Finding::new(RuleId::FrameworkAntiPattern, Severity::Warning, message)
                        .at(*path, Some(idx + 1))
                        .recommend(recommendation),
                );
            }
        }
    }
}
