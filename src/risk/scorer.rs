//! Linear weighted-deficit model.
//!
//! `D = Σ wᵢ · (100 − sᵢ) / 100`, `dropout_probability = clamp(D, 0, 1)`. Each term is kept
//! as a [`DeficitComponent`] so the composite can be decomposed exactly.

use super::RiskModel;
use crate::features::{FactorType, NormalizedSignals};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeficitComponent {
    pub factor_type: FactorType,
    pub weight: f64,
    /// Sub-score on the 0–100 scale
    pub sub_score: f64,
    /// `weight * (100 - sub_score) / 100`
    pub deficit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub composite_deficit: f64,
    pub dropout_probability: f64,
    /// 0–100
    pub confidence: f64,
    pub components: Vec<DeficitComponent>,
}

pub struct RiskScorer {
    model: Arc<RiskModel>,
}

impl RiskScorer {
    pub fn new(model: Arc<RiskModel>) -> Self {
        Self { model }
    }

    pub fn score(&self, signals: &NormalizedSignals) -> ScoreOutcome {
        let cfg = self.model.config();
        let components: Vec<DeficitComponent> = FactorType::ALL
            .iter()
            .map(|&factor| {
                let weight = cfg.weights.get(factor);
                let sub_score = signals.scores.scaled(factor).clamp(0.0, 100.0);
                DeficitComponent {
                    factor_type: factor,
                    weight,
                    sub_score,
                    deficit: weight * (100.0 - sub_score) / 100.0,
                }
            })
            .collect();

        let composite_deficit: f64 = components.iter().map(|c| c.deficit).sum();
        ScoreOutcome {
            composite_deficit,
            dropout_probability: composite_deficit.clamp(0.0, 1.0),
            confidence: self.confidence(signals.fallback_count()),
            components,
        }
    }

    /// 100 minus the penalty per defaulted sub-score, floored.
    pub fn confidence(&self, fallbacks: usize) -> f64 {
        let cfg = self.model.config();
        (100.0 - cfg.fallback_penalty * fallbacks as f64).max(cfg.confidence_floor)
    }
}
