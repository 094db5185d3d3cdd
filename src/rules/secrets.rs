//! Hardcoded credential detection.

use lazy_static::lazy_static;
use regex::Regex;

use super::context::RuleContext;
use super::types::{Finding, RuleId, RuleResult, Severity};

lazy_static! {
    static ref SECRET_PATTERNS: Vec<(&'static str, Regex)> = vec![
        (
            "credential assigned a string literal",
            Regex::new(
                r#"(?i)(?:password|passwd|secret|api_key|apikey|access_token|auth_token|private_key|secret_key)\s*[=:]\s*['"][^'"\s]{8,}['"]"#
            )
            .unwrap(),
        ),
        ("AWS access key id", Regex::new(r"\bAKIA[0-9A-Z]{16}\b").unwrap()),
        (
            "private key block",
            Regex::new(r"-----BEGIN (?:RSA |EC |DSA |OPENSSH |PGP )?PRIVATE KEY-----").unwrap(),
        ),
    ];
}

/// One critical finding per line that looks like it embeds a credential.
pub fn check_hardcoded_secrets(ctx: &RuleContext<'_>) -> RuleResult {
    let mut result = RuleResult::new();

    for (path, text) in ctx.texts() {
        result.scanned += 1;
        for (idx, line) in text.lines().enumerate() {
            let Some((label, _)) = SECRET_PATTERNS.iter().find(|(_, re)| re.is_match(line)) else {
                continue;
            };
            result.add(
                Finding::new(
                    RuleId::HardcodedSecret,
                    Severity::Critical,
                    format!("possible hardcoded secret: {}", label),
                )
                .at(path, Some(idx + 1))
                .recommend("Load secrets from environment variables or a secret manager and rotate the exposed value."),
            );
        }
    }

    result.sorted()
}
