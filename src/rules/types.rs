//! Core types for gap findings.

use serde::{Deserialize, Serialize};

/// Severity levels for findings, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Highest first, for reports.
    pub const DESCENDING: [Severity; 3] = [Severity::Critical, Severity::Warning, Severity::Info];
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// Rule names, in battery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleId {
    #[serde(rename = "missing_ci")]
    MissingCi,
    #[serde(rename = "missing_lint_config")]
    MissingLintConfig,
    #[serde(rename = "missing_tests")]
    MissingTests,
    #[serde(rename = "missing_readme")]
    MissingReadme,
    #[serde(rename = "missing_container_config")]
    MissingContainerConfig,
    #[serde(rename = "hardcoded_secret")]
    HardcodedSecret,
    #[serde(rename = "committed_env_file")]
    CommittedEnvFile,
    #[serde(rename = "missing_env_example")]
    MissingEnvExample,
    #[serde(rename = "permissive_cors")]
    PermissiveCors,
    #[serde(rename = "missing_rate_limiting")]
    MissingRateLimiting,
    #[serde(rename = "missing_authentication")]
    MissingAuthentication,
    #[serde(rename = "missing_input_validation")]
    MissingInputValidation,
    #[serde(rename = "framework_anti_pattern")]
    FrameworkAntiPattern,
}

impl RuleId {
    pub const ALL: [RuleId; 13] = [
        RuleId::MissingCi,
        RuleId::MissingLintConfig,
        RuleId::MissingTests,
        RuleId::MissingReadme,
        RuleId::MissingContainerConfig,
        RuleId::HardcodedSecret,
        RuleId::CommittedEnvFile,
        RuleId::MissingEnvExample,
        RuleId::PermissiveCors,
        RuleId::MissingRateLimiting,
        RuleId::MissingAuthentication,
        RuleId::MissingInputValidation,
        RuleId::FrameworkAntiPattern,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::MissingCi => "missing_ci",
            RuleId::MissingLintConfig => "missing_lint_config",
            RuleId::MissingTests => "missing_tests",
            RuleId::MissingReadme => "missing_readme",
            RuleId::MissingContainerConfig => "missing_container_config",
            RuleId::HardcodedSecret => "hardcoded_secret",
            RuleId::CommittedEnvFile => "committed_env_file",
            RuleId::MissingEnvExample => "missing_env_example",
            RuleId::PermissiveCors => "permissive_cors",
            RuleId::MissingRateLimiting => "missing_rate_limiting",
            RuleId::MissingAuthentication => "missing_authentication",
            RuleId::MissingInputValidation => "missing_input_validation",
            RuleId::FrameworkAntiPattern => "framework_anti_pattern",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        RuleId::ALL.iter().copied().find(|r| r.as_str() == s)
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single gap. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub rule: RuleId,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl Finding {
    /// A repository-wide finding.
    pub fn new(rule: RuleId, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule,
            severity,
            message: message.into(),
            file: None,
            line: None,
            recommendation: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: Option<usize>) -> Self {
        self.file = Some(file.into());
        self.line = line;
        self
    }

    pub fn recommend(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    /// `file:line`, `file` or an empty string.
    pub fn location(&self) -> String {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => format!("{}:{}", file, line),
            (Some(file), None) => file.clone(),
            _ => String::new(),
        }
    }
}

/// Findings from one or more checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleResult {
    pub findings: Vec<Finding>,
    /// Files the check read.
    pub scanned: usize,
}

impl RuleResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Sort by (file, line) so a check's output does not depend on scan order.
    pub fn sorted(mut self) -> Self {
        self.findings
            .sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
        self
    }

    /// Merge another result into this one, after it.
    pub fn merge(&mut self, other: RuleResult) {
        self.findings.extend(other.findings);
        self.scanned += other.scanned;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_id_round_trips_through_serde_names() {
        for rule in RuleId::ALL {
            let json = serde_json::to_string(&rule).unwrap();
            assert_eq!(json, format!("\"{}\"", rule.as_str()));
            assert_eq!(RuleId::parse(rule.as_str()), Some(rule));
        }
        assert_eq!(RuleId::parse("nope"), None);
    }

    #[test]
    fn test_severity_parse_and_order() {
        assert_eq!("Critical".parse::<Severity>(), Ok(Severity::Critical));
        assert!("high".parse::<Severity>().is_err());
        assert!(Severity::Critical > Severity::Warning);
    }

    #[test]
    fn test_sorted_orders_by_location() {
        let mut result = RuleResult::new();
        result.add(Finding::new(RuleId::PermissiveCors, Severity::Warning, "b").at("b.py", Some(3)));
        result.add(Finding::new(RuleId::PermissiveCors, Severity::Warning, "a2").at("a.py", Some(9)));
        result.add(Finding::new(RuleId::PermissiveCors, Severity::Warning, "a1").at("a.py", Some(2)));
        let messages: Vec<String> = result.sorted().findings.into_iter().map(|f| f.message).collect();
        assert_eq!(messages, vec!["a1", "a2", "b"]);
    }
}
