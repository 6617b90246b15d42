//! Risk factor decomposition: which sub-scores breached their thresholds, by how much, and
//! in which direction they are moving.

use super::RiskModel;
use crate::config::TrendDeltas;
use crate::features::{FactorType, NormalizedSignals};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
    CriticalDecline,
}

impl Trend {
    /// Classify a change in sub-score, most severe decline first.
    pub fn from_delta(delta: f64, deltas: &TrendDeltas) -> Self {
        if delta < -deltas.critical_decline {
            Trend::CriticalDecline
        } else if delta < -deltas.declining {
            Trend::Declining
        } else if delta > deltas.improving {
            Trend::Improving
        } else {
            Trend::Stable
        }
    }
}

/// One breached sub-score. Contribution is on the probability scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub factor_type: FactorType,
    pub weight: f64,
    pub current_value: f64,
    pub threshold_value: f64,
    pub contribution: f64,
    pub severity: Severity,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    /// Largest contribution first
    pub factors: Vec<RiskFactor>,
    /// Direction of every sub-score against the previous assessment
    pub trends: BTreeMap<FactorType, Trend>,
}

pub struct RiskFactorDecomposer {
    model: Arc<RiskModel>,
}

impl RiskFactorDecomposer {
    pub fn new(model: Arc<RiskModel>) -> Self {
        Self { model }
    }

    pub fn severity(&self, value: f64, threshold: f64) -> Severity {
        let ratios = &self.model.config().severity;
        if value < threshold * ratios.critical {
            Severity::Critical
        } else if value < threshold * ratios.high {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    /// `previous` holds the signals of the same student's immediately preceding assessment.
    ///
    /// A sub-score that fell back to its neutral default was never observed, so it yields no
    /// factor and its trend is `Stable` whenever either side of the comparison is defaulted.
    /// Its deficit still counts toward the composite score.
    pub fn decompose(
        &self,
        current: &NormalizedSignals,
        previous: Option<&NormalizedSignals>,
    ) -> Decomposition {
        let cfg = self.model.config();
        let scores = &current.scores;

        let trends: BTreeMap<FactorType, Trend> = FactorType::ALL
            .iter()
            .map(|&factor| {
                let trend = previous
                    .filter(|prev| !current.is_defaulted(factor) && !prev.is_defaulted(factor))
                    .map(|prev| {
                        let delta = scores.scaled(factor) - prev.scores.scaled(factor);
                        Trend::from_delta(delta, &cfg.trend)
                    })
                    .unwrap_or(Trend::Stable);
                (factor, trend)
            })
            .collect();

        let mut factors: Vec<RiskFactor> = FactorType::ALL
            .iter()
            .filter(|&&factor| !current.is_defaulted(factor))
            .filter_map(|&factor| {
                let value = scores.scaled(factor);
                let threshold = cfg.thresholds.get(factor);
                if value >= threshold {
                    return None;
                }
                let weight = cfg.weights.get(factor);
                Some(RiskFactor {
                    factor_type: factor,
                    weight,
                    current_value: value,
                    threshold_value: threshold,
                    contribution: (weight * (threshold - value) / 100.0).max(0.0),
                    severity: self.severity(value, threshold),
                    trend: trends.get(&factor).copied().unwrap_or(Trend::Stable),
                })
            })
            .collect();

        // Ties keep the fixed factor order so output stays deterministic.
        factors.sort_by(|a, b| {
            b.contribution
                .total_cmp(&a.contribution)
                .then(a.factor_type.cmp(&b.factor_type))
        });

        Decomposition { factors, trends }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::features::SubScores;

    fn decomposer() -> RiskFactorDecomposer {
        RiskFactorDecomposer::new(Arc::new(RiskModel::new(ModelConfig::default()).unwrap()))
    }

    fn scores(e: f64, p: f64, a: f64, s: f64) -> NormalizedSignals {
        NormalizedSignals {
            scores: SubScores {
                engagement: e,
                performance: p,
                attendance: a,
                sentiment: s,
            },
            defaulted: Vec::new(),
        }
    }

    fn defaulted(mut signals: NormalizedSignals, factor: FactorType) -> NormalizedSignals {
        signals.defaulted.push(factor);
        signals
    }

    #[test]
    fn no_factors_above_threshold() {
        let d = decomposer().decompose(&scores(80.0, 85.0, 90.0, 0.5), None);
        assert!(d.factors.is_empty());
        assert!(d.trends.values().all(|t| *t == Trend::Stable));
    }

    #[test]
    fn single_attendance_factor() {
        let d = decomposer().decompose(&scores(80.0, 85.0, 50.0, 0.5), None);
        assert_eq!(d.factors.len(), 1);
        let f = &d.factors[0];
        assert_eq!(f.factor_type, FactorType::Attendance);
        assert!((f.contribution - 0.055).abs() < 1e-12);
        assert_eq!(f.threshold_value, 75.0);
        // 50 < 56.25
        assert_eq!(f.severity, Severity::High);
    }

    #[test]
    fn all_four_factors_ranked_by_contribution() {
        let d = decomposer().decompose(&scores(20.0, 30.0, 40.0, -0.8), None);
        let order: Vec<FactorType> = d.factors.iter().map(|f| f.factor_type).collect();
        // 0.14, 0.098, 0.077, 0.06
        assert_eq!(
            order,
            vec![
                FactorType::Engagement,
                FactorType::Academic,
                FactorType::Attendance,
                FactorType::Sentiment
            ]
        );
        assert!(d
            .factors
            .iter()
            .all(|f| matches!(f.severity, Severity::High | Severity::Critical)));
        assert_eq!(d.factors[2].severity, Severity::High);
        assert_eq!(d.factors[3].severity, Severity::Critical);
    }

    #[test]
    fn medium_severity_just_below_threshold() {
        let d = decomposer();
        assert_eq!(d.severity(59.0, 60.0), Severity::Medium);
        assert_eq!(d.severity(44.9, 60.0), Severity::High);
        assert_eq!(d.severity(29.9, 60.0), Severity::Critical);
        assert_eq!(d.severity(30.0, 60.0), Severity::High);
    }

    #[test]
    fn trends_compare_against_previous() {
        let prev = scores(20.0, 30.0, 40.0, -0.8);
        let current = scores(70.0, 28.0, 20.0, -0.85);
        let d = decomposer().decompose(&current, Some(&prev));
        assert_eq!(d.trends[&FactorType::Engagement], Trend::Improving);
        assert_eq!(d.trends[&FactorType::Academic], Trend::Stable);
        assert_eq!(d.trends[&FactorType::Attendance], Trend::CriticalDecline);
        // -0.05 polarity is -2.5 on the rescaled axis
        assert_eq!(d.trends[&FactorType::Sentiment], Trend::Stable);
        assert!(d
            .factors
            .iter()
            .all(|f| f.factor_type != FactorType::Engagement));
    }

    #[test]
    fn trend_bands() {
        let deltas = ModelConfig::default().trend;
        assert_eq!(Trend::from_delta(5.0, &deltas), Trend::Stable);
        assert_eq!(Trend::from_delta(5.1, &deltas), Trend::Improving);
        assert_eq!(Trend::from_delta(-5.0, &deltas), Trend::Stable);
        assert_eq!(Trend::from_delta(-6.0, &deltas), Trend::Declining);
        assert_eq!(Trend::from_delta(-15.0, &deltas), Trend::Declining);
        assert_eq!(Trend::from_delta(-15.5, &deltas), Trend::CriticalDecline);
    }

    #[test]
    fn defaulted_signal_yields_no_factor() {
        // unknown attendance normalizes to the neutral 50, below its threshold of 75
        let signals = defaulted(scores(80.0, 85.0, 50.0, 0.5), FactorType::Attendance);
        let d = decomposer().decompose(&signals, None);
        assert!(d.factors.is_empty());

        let signals = defaulted(scores(20.0, 30.0, 50.0, -0.8), FactorType::Attendance);
        let d = decomposer().decompose(&signals, None);
        assert_eq!(d.factors.len(), 3);
        assert!(d
            .factors
            .iter()
            .all(|f| f.factor_type != FactorType::Attendance));
    }

    #[test]
    fn trend_against_defaulted_value_is_stable() {
        // previous sentiment timed out (neutral 0.0 = 50), now measured at -0.5 = 25
        let prev = defaulted(scores(70.0, 70.0, 80.0, 0.0), FactorType::Sentiment);
        let current = scores(70.0, 70.0, 80.0, -0.5);
        let d = decomposer().decompose(&current, Some(&prev));
        assert_eq!(d.trends[&FactorType::Sentiment], Trend::Stable);
        // 25 < 50 is still a measured breach, only its direction is unknown
        assert_eq!(d.factors.len(), 1);
        assert_eq!(d.factors[0].factor_type, FactorType::Sentiment);
        assert_eq!(d.factors[0].trend, Trend::Stable);

        // and the other way round: measured before, defaulted now
        let prev = scores(70.0, 70.0, 95.0, 0.5);
        let current = defaulted(scores(70.0, 70.0, 50.0, 0.5), FactorType::Attendance);
        let d = decomposer().decompose(&current, Some(&prev));
        assert_eq!(d.trends[&FactorType::Attendance], Trend::Stable);
        assert_eq!(d.trends[&FactorType::Engagement], Trend::Stable);
    }
}
