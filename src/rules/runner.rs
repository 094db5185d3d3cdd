//! Runs the check battery in a fixed order.

use tracing::debug;

use super::context::RuleContext;
use super::frameworks::check_framework_anti_patterns;
use super::hygiene::{
    check_ci, check_container_config, check_env_files, check_lint_config, check_readme, check_tests,
};
use super::secrets::check_hardcoded_secrets;
use super::types::RuleResult;
use super::web::{check_authentication, check_input_validation, check_permissive_cors, check_rate_limiting};

type Check = fn(&RuleContext<'_>) -> RuleResult;

/// The battery. Findings keep this order, then (file, line) within a check.
const CHECKS: &[(&str, Check)] = &[
    ("ci", check_ci),
    ("lint_config", check_lint_config),
    ("tests", check_tests),
    ("readme", check_readme),
    ("container_config", check_container_config),
    ("hardcoded_secrets", check_hardcoded_secrets),
    ("env_files", check_env_files),
    ("permissive_cors", check_permissive_cors),
    ("rate_limiting", check_rate_limiting),
    ("authentication", check_authentication),
    ("input_validation", check_input_validation),
    ("framework_anti_patterns", check_framework_anti_patterns),
];

/// Executes every check against one context.
pub struct Runner {
    checks: &'static [(&'static str, Check)],
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self { checks: CHECKS }
    }

    pub fn run(&self, ctx: &RuleContext<'_>) -> RuleResult {
        let mut result = RuleResult::new();
        for (name, check) in self.checks {
            let found = check(ctx);
            debug!(check = *name, findings = found.findings.len(), "check finished");
            result.merge(found);
        }
        result
    }
}
