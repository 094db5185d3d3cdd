//! Maturity scoring and grading.
//!
//! The score starts at 100 and loses a fixed weight per finding:
//! `score = clamp(100 - Σ weight(severity), 0, 100)`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::SeverityWeights;
use crate::rules::{Finding, Severity};

/// Default point weight per severity.
pub mod weights {
    pub const CRITICAL: u32 = 15;
    pub const WARNING: u32 = 5;
    pub const INFO: u32 = 1;
}

/// Lowest score for each grade.
pub mod grades {
    pub const A_MIN: u8 = 90;
    pub const B_MIN: u8 = 75;
    pub const C_MIN: u8 = 50;
    pub const D_MIN: u8 = 25;
}

/// Findings per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::Warning => self.warning,
            Severity::Info => self.info,
        }
    }
}

/// The calculated maturity score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaturityScore {
    /// 0-100, higher is more mature
    pub score: u8,
    /// "A" (90+), "B" (75+), "C" (50+), "D" (25+), "F"
    pub grade: String,
    /// Total points deducted before clamping
    pub penalty: u32,
    /// Points deducted per rule
    pub breakdown: BTreeMap<String, u32>,
    pub counts: SeverityCounts,
}

impl MaturityScore {
    /// Points deducted for `rule`.
    pub fn points_for(&self, rule: &str) -> u32 {
        self.breakdown.get(rule).copied().unwrap_or(0)
    }
}

fn weight(severity: Severity, weights: &SeverityWeights) -> u32 {
    match severity {
        Severity::Critical => weights.critical,
        Severity::Warning => weights.warning,
        Severity::Info => weights.info,
    }
}

/// Determine the letter grade from a score.
fn calculate_grade(score: u8) -> String {
    match score {
        s if s >= grades::A_MIN => "A".to_string(),
        s if s >= grades::B_MIN => "B".to_string(),
        s if s >= grades::C_MIN => "C".to_string(),
        s if s >= grades::D_MIN => "D".to_string(),
        _ => "F".to_string(),
    }
}

/// Calculate the maturity score for a set of findings.
pub fn calculate(findings: &[Finding], weights: &SeverityWeights) -> MaturityScore {
    let mut breakdown: BTreeMap<String, u32> = BTreeMap::new();
    let mut counts = SeverityCounts::default();
    let mut penalty: u32 = 0;

    for finding in findings {
        let points = weight(finding.severity, weights);
        *breakdown.entry(finding.rule.as_str().to_string()).or_insert(0) += points;
        penalty = penalty.saturating_add(points);
        match finding.severity {
            Severity::Critical => counts.critical += 1,
            Severity::Warning => counts.warning += 1,
            Severity::Info => counts.info += 1,
        }
    }

    let score = 100u32.saturating_sub(penalty) as u8;
    MaturityScore {
        score,
        grade: calculate_grade(score),
        penalty,
        breakdown,
        counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleId;

    fn finding(rule: RuleId, severity: Severity) -> Finding {
        Finding::new(rule, severity, "test")
    }

    #[test]
    fn test_critical_plus_warning_is_80() {
        let findings = vec![
            finding(RuleId::MissingCi, Severity::Warning),
            finding(RuleId::HardcodedSecret, Severity::Critical),
        ];
        let score = calculate(&findings, &SeverityWeights::default());

        assert_eq!(score.score, 80);
        assert_eq!(score.grade, "B");
        assert_eq!(score.penalty, 20);
        assert_eq!(score.points_for("hardcoded_secret"), 15);
        assert_eq!(score.counts.get(Severity::Warning), 1);
    }

    #[test]
    fn test_score_clamped_at_zero() {
        let findings: Vec<Finding> = (0..10)
            .map(|_| finding(RuleId::HardcodedSecret, Severity::Critical))
            .collect();
        let score = calculate(&findings, &SeverityWeights::default());

        assert_eq!(score.score, 0);
        assert_eq!(score.grade, "F");
        assert_eq!(score.penalty, 150);
        assert_eq!(score.points_for("hardcoded_secret"), 150);
    }

    #[test]
    fn test_no_findings_is_perfect() {
        let score = calculate(&[], &SeverityWeights::default());
        assert_eq!(score.score, 100);
        assert_eq!(score.grade, "A");
        assert!(score.breakdown.is_empty());
    }

    #[test]
    fn test_custom_weights() {
        let weights = SeverityWeights {
            critical: 50,
            warning: 10,
            info: 0,
        };
        let findings = vec![
            finding(RuleId::HardcodedSecret, Severity::Critical),
            finding(RuleId::MissingReadme, Severity::Info),
        ];
        assert_eq!(calculate(&findings, &weights).score, 50);
    }

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(calculate_grade(100), "A");
        assert_eq!(calculate_grade(90), "A");
        assert_eq!(calculate_grade(89), "B");
        assert_eq!(calculate_grade(75), "B");
        assert_eq!(calculate_grade(74), "C");
        assert_eq!(calculate_grade(50), "C");
        assert_eq!(calculate_grade(49), "D");
        assert_eq!(calculate_grade(25), "D");
        assert_eq!(calculate_grade(24), "F");
        assert_eq!(calculate_grade(0), "F");
    }
}
