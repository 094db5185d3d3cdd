//! Size and test-coverage heuristics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ClassificationSettings;
use crate::scan::{Inventory, Language};

/// Coverage guess from the share of test files among source files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageLabel {
    Good,
    Moderate,
    Low,
    None,
}

impl CoverageLabel {
    /// Ratios strictly above `good_ratio` are good, above `moderate_ratio` moderate.
    pub fn from_ratio(
        test_files: usize,
        ratio: f64,
        settings: &ClassificationSettings,
    ) -> Self {
        if ratio > settings.coverage_good_ratio {
            CoverageLabel::Good
        } else if ratio > settings.coverage_moderate_ratio {
            CoverageLabel::Moderate
        } else if test_files > 0 {
            CoverageLabel::Low
        } else {
            CoverageLabel::None
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            CoverageLabel::Good => "good",
            CoverageLabel::Moderate => "moderate",
            CoverageLabel::Low => "low",
            CoverageLabel::None => "none detected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    /// Non-blank lines per programming language.
    pub loc_by_language: BTreeMap<Language, usize>,
    pub total_loc: usize,
    pub source_files: usize,
    pub test_files: usize,
    /// Test files over source files, rounded to 2 decimals.
    pub test_to_source_ratio: f64,
    pub coverage: CoverageLabel,
    pub service_count: usize,
}

pub(super) fn measure(
    inventory: &Inventory,
    service_count: usize,
    settings: &ClassificationSettings,
) -> ComplexityMetrics {
    let mut loc_by_language = BTreeMap::new();
    let mut source_files = 0;
    let mut test_files = 0;

    for file in inventory.source_files() {
        source_files += 1;
        if file.is_test() {
            test_files += 1;
        }
        *loc_by_language.entry(file.language).or_insert(0) += file.lines;
    }

    let ratio = if source_files == 0 {
        0.0
    } else {
        ((test_files as f64 / source_files as f64) * 100.0).round() / 100.0
    };

    ComplexityMetrics {
        total_loc: loc_by_language.values().sum(),
        loc_by_language,
        source_files,
        test_files,
        test_to_source_ratio: ratio,
        coverage: CoverageLabel::from_ratio(test_files, ratio, settings),
        service_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_thresholds() {
        let defaults = ClassificationSettings::default();
        assert_eq!(CoverageLabel::from_ratio(4, 0.4, &defaults), CoverageLabel::Good);
        assert_eq!(CoverageLabel::from_ratio(3, 0.3, &defaults), CoverageLabel::Moderate);
        assert_eq!(CoverageLabel::from_ratio(1, 0.05, &defaults), CoverageLabel::Low);
        assert_eq!(CoverageLabel::from_ratio(0, 0.0, &defaults), CoverageLabel::None);
    }

    #[test]
    fn test_coverage_thresholds_follow_settings() {
        let strict = ClassificationSettings {
            coverage_good_ratio: 0.5,
            coverage_moderate_ratio: 0.35,
            ..ClassificationSettings::default()
        };
        assert_eq!(CoverageLabel::from_ratio(4, 0.4, &strict), CoverageLabel::Moderate);
        assert_eq!(CoverageLabel::from_ratio(3, 0.3, &strict), CoverageLabel::Low);
        assert_eq!(CoverageLabel::from_ratio(6, 0.6, &strict), CoverageLabel::Good);
    }
}
