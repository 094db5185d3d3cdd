//! Web API security checks.
//!
//! CORS is checked per line wherever it appears. The remaining checks only
//! apply when classification found an HTTP-facing API, and pass as soon as
//! any source file shows the relevant signature.

use lazy_static::lazy_static;
use regex::Regex;

use super::context::{first_match, RuleContext};
use super::types::{Finding, RuleId, RuleResult, Severity};
use crate::classify::{TechCategory, SERVICE_MANIFESTS};

lazy_static! {
    static ref CORS_PATTERNS: Vec<Regex> = vec![
        Regex::new(r#"allow_origins\s*=\s*\[?\s*['"]\*['"]"#).unwrap(),
        Regex::new(r#"(?i)cors\(\s*\{?\s*origin\s*:\s*['"]\*['"]"#).unwrap(),
        Regex::new(r#"@CrossOrigin\(\s*(?:origins\s*=\s*)?\{?\s*"\*""#).unwrap(),
        Regex::new(r#"(?i)Access-Control-Allow-Origin['"]?\s*[,:=]\s*['"]\*['"]"#).unwrap(),
        Regex::new(r"CORS_(?:ORIGIN_ALLOW_ALL|ALLOW_ALL_ORIGINS)\s*=\s*True").unwrap(),
        Regex::new(r#"AllowOrigins:\s*\[\]string\{\s*"\*""#).unwrap(),
    ];
    static ref RATE_LIMIT_RE: Regex =
        Regex::new(r"(?i)\brate[-_ ]?limit|\bslowapi\b|\bthrottl|\bflask[-_]limiter\b|\blimiter\b|\bbucket4j\b|\bgovernor\b")
            .unwrap();
    static ref AUTH_RE: Regex = Regex::new(
        r"(?i)\bjwt\b|oauth|bearer|Depends\(.*auth|passport\.use|@PreAuthorize|SecurityContext|bcrypt|argon2|login_required|authenticate"
    )
    .unwrap();
    static ref VALIDATION_RE: Regex = Regex::new(
        r"(?i)pydantic|BaseModel|@validator|@field_validator|marshmallow|\bJoi\.|\byup\.|\bzod\b|class-validator|@Valid\b|@NotNull|validator::Validate|go-playground/validator"
    )
    .unwrap();
}

pub fn check_permissive_cors(ctx: &RuleContext<'_>) -> RuleResult {
    let mut result = RuleResult::new();

    for (path, text) in ctx.source_texts() {
        result.scanned += 1;
        for (idx, line) in text.lines().enumerate() {
            if CORS_PATTERNS.iter().any(|re| re.is_match(line)) {
                result.add(
                    Finding::new(
                        RuleId::PermissiveCors,
                        Severity::Warning,
                        "CORS allows requests from any origin",
                    )
                    .at(path, Some(idx + 1))
                    .recommend("Restrict allowed origins to the specific domains that need access."),
                );
            }
        }
    }

    result.sorted()
}

pub fn check_rate_limiting(ctx: &RuleContext<'_>) -> RuleResult {
    let mut result = RuleResult::new();
    if !ctx.architecture.exposes_http_api() {
        return result;
    }
    let manifests = ctx.texts().filter(|(path, _)| is_manifest(path));
    if first_match(ctx.source_texts().into_iter().chain(manifests), &RATE_LIMIT_RE).is_none() {
        result.add(
            Finding::new(
                RuleId::MissingRateLimiting,
                Severity::Warning,
                "no rate limiting detected on the API",
            )
            .recommend("Add rate-limiting middleware (slowapi, express-rate-limit) to prevent abuse."),
        );
    }
    result
}

pub fn check_authentication(ctx: &RuleContext<'_>) -> RuleResult {
    let mut result = RuleResult::new();
    if !ctx.architecture.exposes_http_api() {
        return result;
    }
    if ctx.architecture.technologies_in(TechCategory::Auth).next().is_some() {
        return result;
    }
    if first_match(ctx.source_texts(), &AUTH_RE).is_none() {
        result.add(
            Finding::new(
                RuleId::MissingAuthentication,
                Severity::Warning,
                "no authentication mechanism detected on the API",
            )
            .recommend("Protect endpoints with an authentication scheme such as OAuth2 or JWT bearer tokens."),
        );
    }
    result
}

pub fn check_input_validation(ctx: &RuleContext<'_>) -> RuleResult {
    let mut result = RuleResult::new();
    if !ctx.architecture.exposes_http_api() {
        return result;
    }
    if first_match(ctx.source_texts(), &VALIDATION_RE).is_none() {
        result.add(
            Finding::new(
                RuleId::MissingInputValidation,
                Severity::Warning,
                "no request validation library or schema detected",
            )
            .recommend("Validate request bodies with typed schemas (Pydantic, zod, Bean Validation)."),
        );
    }
    result
}

/// Dependency manifests are where limiter packages get declared.
fn is_manifest(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    SERVICE_MANIFESTS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cors(line: &str) -> bool {
        CORS_PATTERNS.iter().any(|re| re.is_match(line))
    }

    #[test]
    fn test_cors_patterns() {
        assert!(cors(r#"    allow_origins=["*"],"#));
        assert!(cors(r#"app.use(cors({ origin: '*' }))"#));
        assert!(cors(r#"@CrossOrigin("*")"#));
        assert!(cors(r#"@CrossOrigin(origins = "*")"#));
        assert!(cors(r#"res.setHeader("Access-Control-Allow-Origin", "*")"#));
        assert!(cors("CORS_ALLOW_ALL_ORIGINS = True"));
        assert!(!cors(r#"allow_origins=["https://shop.example.com"]"#));
    }

    #[test]
    fn test_manifest_names() {
        assert!(is_manifest("requirements.txt"));
        assert!(is_manifest("services/api/package.json"));
        assert!(!is_manifest("docs/NOTES.md"));
    }

    #[test]
    fn test_signature_patterns() {
        assert!(RATE_LIMIT_RE.is_match("from slowapi import Limiter"));
        assert!(RATE_LIMIT_RE.is_match("const rateLimit = require('express-rate-limit')"));
        assert!(RATE_LIMIT_RE.is_match("flask-limiter==3.5"));
        assert!(RATE_LIMIT_RE.is_match("governor = \"0.6\""));
        assert!(!RATE_LIMIT_RE.is_match("an accurate limit on page size"));
        assert!(AUTH_RE.is_match("user = Depends(get_current_auth_user)"));
        assert!(AUTH_RE.is_match("passport.use(new Strategy())"));
        assert!(!AUTH_RE.is_match("def get_order(order_id: int):"));
        assert!(VALIDATION_RE.is_match("from pydantic import BaseModel"));
        assert!(VALIDATION_RE.is_match("const schema = z.object({}) // zod"));
    }
}
