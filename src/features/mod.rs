//! Raw student signals and their normalization into four bounded sub-scores.

mod normalizer;
mod signals;

pub use normalizer::FeatureNormalizer;
pub use signals::{AttendanceInputs, EngagementInputs, PerformanceInputs, ScoringRequest};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four signal families scored by the model. Also the `factor_type` of a risk factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorType {
    Engagement,
    Academic,
    Attendance,
    Sentiment,
}

impl FactorType {
    pub const ALL: [FactorType; 4] = [
        FactorType::Engagement,
        FactorType::Academic,
        FactorType::Attendance,
        FactorType::Sentiment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FactorType::Engagement => "engagement",
            FactorType::Academic => "academic",
            FactorType::Attendance => "attendance",
            FactorType::Sentiment => "sentiment",
        }
    }

    /// Name of the sub-score feeding this factor.
    pub fn sub_score_name(&self) -> &'static str {
        match self {
            FactorType::Academic => "performance",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for FactorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a sub-score came from a real measurement or a documented neutral default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Measured,
    Defaulted,
}

/// Map a [-1, 1] polarity onto the 0–100 sub-score scale.
pub fn rescale_polarity(polarity: f64) -> f64 {
    (polarity.clamp(-1.0, 1.0) + 1.0) * 50.0
}

/// The four sub-scores retained on every assessment. Engagement, performance and attendance
/// are in [0, 100]; sentiment is a polarity in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub engagement: f64,
    pub performance: f64,
    pub attendance: f64,
    pub sentiment: f64,
}

impl SubScores {
    /// Sub-score for `factor` on the common 0–100 scale.
    pub fn scaled(&self, factor: FactorType) -> f64 {
        match factor {
            FactorType::Engagement => self.engagement,
            FactorType::Academic => self.performance,
            FactorType::Attendance => self.attendance,
            FactorType::Sentiment => rescale_polarity(self.sentiment),
        }
    }
}

/// Normalizer output: sub-scores plus which of them fell back to a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSignals {
    pub scores: SubScores,
    pub defaulted: Vec<FactorType>,
}

impl NormalizedSignals {
    pub fn fallback_count(&self) -> usize {
        self.defaulted.len()
    }

    pub fn is_defaulted(&self, factor: FactorType) -> bool {
        self.defaulted.contains(&factor)
    }
}
