//! Engine configuration. Scoring parameters live in a versioned [`ModelConfig`] so that every
//! stored assessment can name the exact weights that produced it.

use crate::error::{Result, RiskError};
use crate::features::FactorType;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Data directory (assessment store)
    pub data_dir: PathBuf,
    /// Scoring model parameters
    pub model: ModelConfig,
    /// Raw signal normalization
    pub normalizer: NormalizerConfig,
    /// Outbound sentiment service
    pub sentiment: SentimentConfig,
    /// Cohort scoring fan-out
    pub batch: BatchConfig,
    /// HTTP API
    pub server: ServerConfig,
    /// Logging
    pub log: LogConfig,
}

/// Weight of each sub-score in the composite deficit. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub engagement: f64,
    pub performance: f64,
    pub attendance: f64,
    pub sentiment: f64,
}

/// Per-factor breach thresholds on the 0–100 scale (sentiment already rescaled).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorThresholds {
    pub engagement: f64,
    pub performance: f64,
    pub attendance: f64,
    pub sentiment: f64,
}

/// Lower bounds of the risk level bands on the probability scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelBands {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

/// Fractions of a factor's threshold below which severity escalates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityRatios {
    pub critical: f64,
    pub high: f64,
}

/// Sub-score deltas (0–100 scale) separating trend classes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendDeltas {
    pub improving: f64,
    pub declining: f64,
    pub critical_decline: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Human-readable version label recorded with each assessment
    pub version: String,
    pub weights: FactorWeights,
    pub thresholds: FactorThresholds,
    pub bands: LevelBands,
    pub severity: SeverityRatios,
    pub trend: TrendDeltas,
    /// Confidence points lost per defaulted sub-score
    pub fallback_penalty: f64,
    /// Confidence never drops below this
    pub confidence_floor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Logins per week that count as full engagement
    pub login_target_per_week: f64,
    /// Hours on platform per week that count as full engagement
    pub hours_target_per_week: f64,
    /// Relative weights of the engagement components
    pub login_weight: f64,
    pub time_weight: f64,
    pub submission_weight: f64,
    /// Sub-score used when the caller marks a signal group unknown
    pub neutral_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentConfig {
    /// Base URL of the sentiment service; none disables outbound calls
    pub endpoint: Option<String>,
    /// Per-attempt timeout (milliseconds)
    pub timeout_ms: u64,
    /// Attempts after the first one
    pub retries: u32,
    /// Concurrent requests allowed against the service
    pub max_in_flight: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Students scored concurrently in one batch
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".risk-engine"),
            model: ModelConfig::default(),
            normalizer: NormalizerConfig::default(),
            sentiment: SentimentConfig::default(),
            batch: BatchConfig::default(),
            server: ServerConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            version: "2024.1".to_string(),
            weights: FactorWeights {
                engagement: 0.35,
                performance: 0.28,
                attendance: 0.22,
                sentiment: 0.15,
            },
            thresholds: FactorThresholds {
                engagement: 60.0,
                performance: 65.0,
                attendance: 75.0,
                sentiment: 50.0,
            },
            bands: LevelBands {
                medium: 0.25,
                high: 0.50,
                critical: 0.75,
            },
            severity: SeverityRatios {
                critical: 0.5,
                high: 0.75,
            },
            trend: TrendDeltas {
                improving: 5.0,
                declining: 5.0,
                critical_decline: 15.0,
            },
            fallback_penalty: 15.0,
            confidence_floor: 50.0,
        }
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            login_target_per_week: 5.0,
            hours_target_per_week: 10.0,
            login_weight: 0.3,
            time_weight: 0.3,
            submission_weight: 0.4,
            neutral_score: 50.0,
        }
    }
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 2_000,
            retries: 1,
            max_in_flight: 4,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrency: 8 }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: ([127, 0, 0, 1], 8080).into(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl FactorWeights {
    pub fn get(&self, factor: FactorType) -> f64 {
        match factor {
            FactorType::Engagement => self.engagement,
            FactorType::Academic => self.performance,
            FactorType::Attendance => self.attendance,
            FactorType::Sentiment => self.sentiment,
        }
    }

    pub fn sum(&self) -> f64 {
        FactorType::ALL.iter().map(|f| self.get(*f)).sum()
    }
}

impl FactorThresholds {
    pub fn get(&self, factor: FactorType) -> f64 {
        match factor {
            FactorType::Engagement => self.engagement,
            FactorType::Academic => self.performance,
            FactorType::Attendance => self.attendance,
            FactorType::Sentiment => self.sentiment,
        }
    }
}

impl ModelConfig {
    /// Reject parameter sets the scorer cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(RiskError::Config("model.version must not be empty".into()));
        }
        for factor in FactorType::ALL {
            let w = self.weights.get(factor);
            if !w.is_finite() || w < 0.0 {
                return Err(RiskError::Config(format!(
                    "weight for {} must be a non-negative number, got {}",
                    factor, w
                )));
            }
            let t = self.thresholds.get(factor);
            if !t.is_finite() || t <= 0.0 || t > 100.0 {
                return Err(RiskError::Config(format!(
                    "threshold for {} must lie in (0, 100], got {}",
                    factor, t
                )));
            }
        }
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(RiskError::Config(format!(
                "model weights must sum to 1.0, got {}",
                sum
            )));
        }
        let b = &self.bands;
        if !(0.0 < b.medium && b.medium < b.high && b.high < b.critical && b.critical <= 1.0) {
            return Err(RiskError::Config(
                "level bands must satisfy 0 < medium < high < critical <= 1".into(),
            ));
        }
        let s = &self.severity;
        if !(0.0 < s.critical && s.critical < s.high && s.high <= 1.0) {
            return Err(RiskError::Config(
                "severity ratios must satisfy 0 < critical < high <= 1".into(),
            ));
        }
        let t = &self.trend;
        if !(t.improving >= 0.0 && t.declining >= 0.0 && t.critical_decline >= t.declining) {
            return Err(RiskError::Config(
                "trend deltas must be non-negative with critical_decline >= declining".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.confidence_floor) || self.fallback_penalty < 0.0 {
            return Err(RiskError::Config(
                "confidence_floor must lie in [0, 100] and fallback_penalty must be >= 0".into(),
            ));
        }
        Ok(())
    }
}

impl NormalizerConfig {
    /// Targets must be positive and the engagement weights must leave at least one component
    /// counting, otherwise present data could not be normalized.
    pub fn validate(&self) -> Result<()> {
        for (name, target) in [
            ("login_target_per_week", self.login_target_per_week),
            ("hours_target_per_week", self.hours_target_per_week),
        ] {
            if !target.is_finite() || target <= 0.0 {
                return Err(RiskError::Config(format!(
                    "normalizer.{} must be a positive number, got {}",
                    name, target
                )));
            }
        }
        let weights = [
            ("login_weight", self.login_weight),
            ("time_weight", self.time_weight),
            ("submission_weight", self.submission_weight),
        ];
        for (name, w) in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(RiskError::Config(format!(
                    "normalizer.{} must be a non-negative number, got {}",
                    name, w
                )));
            }
        }
        if weights.iter().map(|(_, w)| w).sum::<f64>() <= 0.0 {
            return Err(RiskError::Config(
                "normalizer engagement weights must not all be zero".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.neutral_score) {
            return Err(RiskError::Config(format!(
                "normalizer.neutral_score must lie in [0, 100], got {}",
                self.neutral_score
            )));
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Load from JSON file if present; otherwise return default. A file that exists but does
    /// not parse, or whose model or normalizer settings are invalid, is an error.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let config = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            serde_json::from_str::<EngineConfig>(&data)
                .map_err(|e| RiskError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            Self::default()
        };
        config.model.validate()?;
        config.normalizer.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let model = ModelConfig::default();
        assert!((model.weights.sum() - 1.0).abs() <= 1e-9);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let mut model = ModelConfig::default();
        model.weights.sentiment = 0.25;
        assert!(matches!(model.validate(), Err(RiskError::Config(_))));
    }

    #[test]
    fn rejects_unordered_bands() {
        let mut model = ModelConfig::default();
        model.bands.high = 0.8;
        assert!(model.validate().is_err());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"log": {"level": "debug", "json": false}}"#).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.sentiment.timeout_ms, 2_000);
        assert_eq!(config.model, ModelConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(EngineConfig::load(&path), Err(RiskError::Config(_))));
    }

    #[test]
    fn rejects_invalid_normalizer_settings() {
        assert!(NormalizerConfig::default().validate().is_ok());

        let cases = [
            NormalizerConfig {
                hours_target_per_week: -2.0,
                ..NormalizerConfig::default()
            },
            NormalizerConfig {
                login_weight: -0.3,
                ..NormalizerConfig::default()
            },
            NormalizerConfig {
                login_weight: 0.0,
                time_weight: 0.0,
                submission_weight: 0.0,
                ..NormalizerConfig::default()
            },
            NormalizerConfig {
                neutral_score: 150.0,
                ..NormalizerConfig::default()
            },
            NormalizerConfig {
                login_target_per_week: f64::NAN,
                ..NormalizerConfig::default()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(RiskError::Config(_))),
                "accepted {:?}",
                config
            );
        }
    }

    #[test]
    fn zero_login_target_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"normalizer": {
                "login_target_per_week": 0,
                "hours_target_per_week": 10,
                "login_weight": 0.3,
                "time_weight": 0.3,
                "submission_weight": 0.4,
                "neutral_score": 50
            }}"#,
        )
        .unwrap();
        let err = EngineConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("login_target_per_week"));
    }
}
