//! Probability → ordinal risk level. Each band includes its lower bound.

use crate::config::LevelBands;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_probability(probability: f64, bands: &LevelBands) -> Self {
        if probability >= bands.critical {
            RiskLevel::Critical
        } else if probability >= bands.high {
            RiskLevel::High
        } else if probability >= bands.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// High and critical assessments raise an alert.
    pub fn is_alerting(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;

    #[test]
    fn band_boundaries_are_inclusive_below() {
        let bands = ModelConfig::default().bands;
        let cases = [
            (0.75, RiskLevel::Critical),
            (0.749999, RiskLevel::High),
            (0.50, RiskLevel::High),
            (0.4999, RiskLevel::Medium),
            (0.25, RiskLevel::Medium),
            (0.2499, RiskLevel::Low),
            (0.0, RiskLevel::Low),
            (1.0, RiskLevel::Critical),
        ];
        for (p, expected) in cases {
            assert_eq!(RiskLevel::from_probability(p, &bands), expected, "p = {}", p);
        }
    }

    #[test]
    fn only_high_and_critical_alert() {
        assert!(!RiskLevel::Low.is_alerting());
        assert!(!RiskLevel::Medium.is_alerting());
        assert!(RiskLevel::High.is_alerting());
        assert!(RiskLevel::Critical.is_alerting());
    }
}
