//! Sentiment capability: free text → polarity in [-1, 1].
//!
//! The scoring core only sees [`SentimentReading`]; which service produced it (or that none
//! did) is decided here. Calls are time-boxed, retried once by default, and throttled by a
//! semaphore so a cohort batch queues instead of flooding the service.

mod http;

pub use http::HttpSentimentAdapter;

use crate::config::SentimentConfig;
use crate::features::{ScoringRequest, SignalSource};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum SentimentError {
    #[error("sentiment service timed out after {0:?}")]
    Timeout(Duration),
    #[error("sentiment service not configured")]
    Unavailable,
    #[error("sentiment service request failed: {0}")]
    Http(String),
    #[error("sentiment service returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Service response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub polarity: f64,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[async_trait]
pub trait SentimentAdapter: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<SentimentScore, SentimentError>;
}

/// Adapter used when no service is configured: every call is unavailable.
pub struct NoSentimentService;

#[async_trait]
impl SentimentAdapter for NoSentimentService {
    async fn analyze(&self, _text: &str) -> Result<SentimentScore, SentimentError> {
        Err(SentimentError::Unavailable)
    }
}

/// Why the neutral polarity was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentFallback {
    /// Neither text nor polarity supplied
    NoInput,
    Timeout,
    Unavailable,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentReading {
    pub polarity: f64,
    pub source: SignalSource,
    pub fallback: Option<SentimentFallback>,
}

impl SentimentReading {
    pub const NEUTRAL_POLARITY: f64 = 0.0;

    pub fn measured(polarity: f64) -> Self {
        Self {
            polarity: polarity.clamp(-1.0, 1.0),
            source: SignalSource::Measured,
            fallback: None,
        }
    }

    pub fn neutral(reason: SentimentFallback) -> Self {
        Self {
            polarity: Self::NEUTRAL_POLARITY,
            source: SignalSource::Defaulted,
            fallback: Some(reason),
        }
    }
}

/// A polarity outside [-1, 1] breaks the adapter contract and is not clamped into range.
fn check_polarity(score: SentimentScore) -> Result<SentimentScore, SentimentError> {
    if score.polarity.is_finite() && (-1.0..=1.0).contains(&score.polarity) {
        Ok(score)
    } else {
        Err(SentimentError::InvalidResponse(format!(
            "polarity {} outside [-1, 1]",
            score.polarity
        )))
    }
}

/// Applies the precedence (polarity, text, neutral) and the timeout/retry/fallback policy.
pub struct SentimentResolver {
    adapter: Arc<dyn SentimentAdapter>,
    limiter: Arc<Semaphore>,
    timeout: Duration,
    retries: u32,
}

impl SentimentResolver {
    pub fn new(adapter: Arc<dyn SentimentAdapter>, config: &SentimentConfig) -> Self {
        Self {
            adapter,
            limiter: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
            timeout: Duration::from_millis(config.timeout_ms),
            retries: config.retries,
        }
    }

    /// Build from config: HTTP adapter when an endpoint is set, otherwise none.
    pub fn from_config(config: &SentimentConfig) -> Self {
        let adapter: Arc<dyn SentimentAdapter> = match HttpSentimentAdapter::new(config) {
            Some(http) => Arc::new(http),
            None => Arc::new(NoSentimentService),
        };
        Self::new(adapter, config)
    }

    pub async fn resolve(&self, request: &ScoringRequest) -> SentimentReading {
        if let Some(polarity) = request.sentiment_polarity {
            return SentimentReading::measured(polarity);
        }
        let Some(text) = request.sentiment_text() else {
            return SentimentReading::neutral(SentimentFallback::NoInput);
        };

        let _permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(_) => return SentimentReading::neutral(SentimentFallback::Unavailable),
        };

        let mut last = SentimentFallback::Failed;
        for attempt in 0..=self.retries {
            let outcome = tokio::time::timeout(self.timeout, self.adapter.analyze(text))
                .await
                .unwrap_or(Err(SentimentError::Timeout(self.timeout)))
                .and_then(check_polarity);
            match outcome {
                Ok(score) => {
                    debug!(attempt, polarity = score.polarity, "sentiment analyzed");
                    return SentimentReading::measured(score.polarity);
                }
                Err(SentimentError::Unavailable) => {
                    return SentimentReading::neutral(SentimentFallback::Unavailable);
                }
                Err(e) => {
                    warn!(
                        student_id = %request.student_id,
                        attempt,
                        error = %e,
                        "sentiment call failed"
                    );
                    last = match e {
                        SentimentError::Timeout(_) => SentimentFallback::Timeout,
                        _ => SentimentFallback::Failed,
                    };
                }
            }
        }
        warn!(student_id = %request.student_id, reason = ?last, "using neutral sentiment");
        SentimentReading::neutral(last)
    }
}
