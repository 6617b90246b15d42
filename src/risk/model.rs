//! Validated, fingerprinted scoring parameters.

use crate::config::{FactorWeights, ModelConfig};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Immutable parameter set shared by the scorer, classifier and decomposer.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskModel {
    config: ModelConfig,
    fingerprint: String,
}

/// What an assessment keeps of the model that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub version: String,
    pub fingerprint: String,
    pub weights: FactorWeights,
}

impl RiskModel {
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        let canonical = serde_json::to_vec(&config)?;
        let digest = Sha256::digest(&canonical);
        let fingerprint = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Ok(Self {
            config,
            fingerprint,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Hex SHA-256 of the canonical JSON parameters.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            version: self.config.version.clone(),
            fingerprint: self.fingerprint.clone(),
            weights: self.config.weights,
        }
    }
}
