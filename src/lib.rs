//! Student dropout-risk scoring and early-warning engine.
//!
//! Modular structure:
//! - [`features`]: Raw signal validation and normalization into sub-scores
//! - [`sentiment`]: Sentiment service capability with timeout and neutral fallback
//! - [`risk`]: Weighted scoring model, level classifier, factor decomposition
//! - [`alerts`]: Per-assessment alert lifecycle
//! - [`interventions`]: Intervention recommender and actions
//! - [`storage`]: Append-only encrypted assessment store
//! - [`service`]: Per-student serialized scoring and batch fan-out
//! - [`api`]: HTTP API
//! - [`logging`]: Structured JSON logging

pub mod config;
pub mod error;
pub mod features;
pub mod sentiment;
pub mod risk;
pub mod alerts;
pub mod interventions;
pub mod storage;
pub mod service;
pub mod api;
pub mod logging;

pub use config::EngineConfig;
pub use error::{Result, RiskError};
pub use features::{FactorType, ScoringRequest, SubScores};
pub use risk::{AssessmentRecord, RiskAssessment, RiskEngine, RiskFactor, RiskLevel};
pub use service::RiskService;
pub use storage::AssessmentStore;
pub use logging::StructuredLogger;
