//! Scoring pipeline: normalize → score → classify → decompose → alert.
//!
//! [`RiskEngine::evaluate`] is synchronous and pure apart from the new assessment id; the
//! only I/O (the sentiment call) happens before it, in [`crate::sentiment`].

use super::{RiskAssessment, RiskFactorDecomposer, RiskLevel, RiskModel, RiskScorer};
use crate::alerts::AlertRecord;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::features::{FeatureNormalizer, ScoringRequest};
use crate::interventions::{InterventionProposal, InterventionRecommender};
use crate::sentiment::SentimentReading;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub struct RiskEngine {
    model: Arc<RiskModel>,
    normalizer: FeatureNormalizer,
    scorer: RiskScorer,
    decomposer: RiskFactorDecomposer,
    recommender: InterventionRecommender,
}

impl RiskEngine {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.normalizer.validate()?;
        let model = Arc::new(RiskModel::new(config.model.clone())?);
        Ok(Self {
            normalizer: FeatureNormalizer::new(config.normalizer.clone()),
            scorer: RiskScorer::new(model.clone()),
            decomposer: RiskFactorDecomposer::new(model.clone()),
            recommender: InterventionRecommender,
            model,
        })
    }

    pub fn model(&self) -> &RiskModel {
        &self.model
    }

    pub fn normalizer(&self) -> &FeatureNormalizer {
        &self.normalizer
    }

    pub fn classify(&self, probability: f64) -> RiskLevel {
        RiskLevel::from_probability(probability, &self.model.config().bands)
    }

    /// Score one request. `previous` must be the student's immediately preceding assessment.
    pub fn evaluate(
        &self,
        request: &ScoringRequest,
        sentiment: SentimentReading,
        previous: Option<&RiskAssessment>,
        created_at: DateTime<Utc>,
    ) -> Result<(RiskAssessment, AlertRecord)> {
        self.normalizer.validate(request)?;
        let signals = self.normalizer.normalize(request, sentiment)?;
        let outcome = self.scorer.score(&signals);
        let risk_level = self.classify(outcome.dropout_probability);
        let previous_signals = previous.map(RiskAssessment::signals);
        let decomposition = self
            .decomposer
            .decompose(&signals, previous_signals.as_ref());

        let assessment = RiskAssessment {
            id: Uuid::now_v7(),
            student_id: request.student_id.trim().to_string(),
            student_name: request.student_name.trim().to_string(),
            created_at,
            sub_scores: signals.scores,
            defaulted_signals: signals.defaulted,
            sentiment_fallback: sentiment.fallback,
            composite_deficit: outcome.composite_deficit,
            deficit_components: outcome.components,
            dropout_probability: outcome.dropout_probability,
            risk_level,
            confidence: outcome.confidence,
            alert_triggered: risk_level.is_alerting(),
            factors: decomposition.factors,
            trends: decomposition.trends,
            previous_assessment_id: previous.map(|p| p.id),
            model: self.model.snapshot(),
        };
        let alert = AlertRecord::open(assessment.id, risk_level);
        Ok((assessment, alert))
    }

    /// Advisory proposals for an assessment; empty unless its alert was triggered.
    pub fn recommend(&self, assessment: &RiskAssessment) -> Vec<InterventionProposal> {
        if !assessment.alert_triggered {
            return Vec::new();
        }
        self.recommender.recommend(&assessment.factors)
    }
}
