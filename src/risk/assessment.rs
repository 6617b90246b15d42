//! One scoring run for one student. Never mutated after creation: re-scoring produces a new
//! assessment, and the alert workflow lives in a separate [`AlertRecord`].

use super::{DeficitComponent, ModelSnapshot, RiskFactor, RiskLevel, Trend};
use crate::alerts::{AlertRecord, AlertState};
use crate::features::{FactorType, NormalizedSignals, SubScores};
use crate::sentiment::SentimentFallback;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Time-ordered (UUIDv7)
    pub id: Uuid,
    pub student_id: String,
    pub student_name: String,
    pub created_at: DateTime<Utc>,
    pub sub_scores: SubScores,
    /// Sub-scores that used a neutral default instead of a measurement
    pub defaulted_signals: Vec<FactorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment_fallback: Option<SentimentFallback>,
    pub composite_deficit: f64,
    pub deficit_components: Vec<DeficitComponent>,
    pub dropout_probability: f64,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub alert_triggered: bool,
    /// Ordered by descending contribution
    pub factors: Vec<RiskFactor>,
    pub trends: BTreeMap<FactorType, Trend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_assessment_id: Option<Uuid>,
    pub model: ModelSnapshot,
}

impl RiskAssessment {
    pub fn factor(&self, factor_type: FactorType) -> Option<&RiskFactor> {
        self.factors.iter().find(|f| f.factor_type == factor_type)
    }

    /// The normalized inputs this assessment was scored from.
    pub fn signals(&self) -> NormalizedSignals {
        NormalizedSignals {
            scores: self.sub_scores,
            defaulted: self.defaulted_signals.clone(),
        }
    }
}

/// An assessment together with the current state of its alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    #[serde(flatten)]
    pub assessment: RiskAssessment,
    pub alert_state: AlertState,
    pub alert_acknowledged: bool,
    pub alert: AlertRecord,
}

impl AssessmentRecord {
    pub fn new(assessment: RiskAssessment, alert: AlertRecord) -> Self {
        Self {
            alert_state: alert.state,
            alert_acknowledged: alert.is_acknowledged(),
            assessment,
            alert,
        }
    }
}
