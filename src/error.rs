//! Error types for the risk engine.
//!
//! Validation and missing-signal errors are fatal to a request and reach the caller.
//! Sentiment service failures are recovered inside the engine (see [`crate::sentiment`]).

use crate::alerts::AlertState;
use crate::features::FactorType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    /// Malformed identity or out-of-range raw metric
    #[error("Validation error: {0}")]
    Validation(String),

    /// Every input for a required sub-score was absent and no unknown marker was given
    #[error(
        "Missing signal: no inputs supplied for {} (send a value or mark it unknown)",
        .sub_score.sub_score_name()
    )]
    MissingSignal { sub_score: FactorType },

    /// Unknown assessment or intervention id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Workflow transition not allowed from the current state
    #[error("Invalid transition: cannot {action} an alert in state {from}")]
    InvalidTransition { from: AlertState, action: &'static str },

    /// Intervention status transition not allowed
    #[error("Invalid intervention transition: {0}")]
    InvalidStatus(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Encryption error: {0}")]
    Crypto(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal failure (poisoned lock, aborted task)
    #[error("{0}")]
    Internal(String),
}

impl RiskError {
    /// Short machine-readable kind, used in API error bodies and audit lines.
    pub fn kind(&self) -> &'static str {
        match self {
            RiskError::Validation(_) => "validation_error",
            RiskError::MissingSignal { .. } => "missing_signal_error",
            RiskError::NotFound(_) => "not_found_error",
            RiskError::InvalidTransition { .. } | RiskError::InvalidStatus(_) => {
                "invalid_transition_error"
            }
            RiskError::Config(_) => "config_error",
            RiskError::Storage(_) | RiskError::Crypto(_) => "storage_error",
            RiskError::Serialization(_) => "serialization_error",
            RiskError::Io(_) => "io_error",
            RiskError::Internal(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, RiskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_signal_names_the_sub_score() {
        let err = RiskError::MissingSignal {
            sub_score: FactorType::Academic,
        };
        assert!(err.to_string().contains("performance"));
        assert_eq!(err.kind(), "missing_signal_error");
    }

    #[test]
    fn invalid_transition_display() {
        let err = RiskError::InvalidTransition {
            from: AlertState::None,
            action: "acknowledge",
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition: cannot acknowledge an alert in state none"
        );
    }
}
