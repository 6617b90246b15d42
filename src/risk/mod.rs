//! Dropout-risk scoring: model parameters, scorer, level classifier, factor decomposer and
//! the engine that ties them into an immutable [`RiskAssessment`].

mod assessment;
mod engine;
mod factors;
mod level;
mod model;
mod scorer;

pub use assessment::{AssessmentRecord, RiskAssessment};
pub use engine::RiskEngine;
pub use factors::{Decomposition, RiskFactor, RiskFactorDecomposer, Severity, Trend};
pub use level::RiskLevel;
pub use model::{ModelSnapshot, RiskModel};
pub use scorer::{DeficitComponent, RiskScorer, ScoreOutcome};
