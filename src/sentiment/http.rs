//! HTTP sentiment client: `POST {endpoint}/sentiment {text}` → `{polarity, confidence}`.

use super::{SentimentAdapter, SentimentError, SentimentScore};
use crate::config::SentimentConfig;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct SentimentPayload<'a> {
    text: &'a str,
}

pub struct HttpSentimentAdapter {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpSentimentAdapter {
    /// None when no endpoint is configured or the client cannot be built.
    pub fn new(config: &SentimentConfig) -> Option<Self> {
        let endpoint = config.endpoint.as_ref()?.trim_end_matches('/');
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .ok()?;
        Some(Self {
            client,
            url: format!("{}/sentiment", endpoint),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SentimentAdapter for HttpSentimentAdapter {
    async fn analyze(&self, text: &str) -> Result<SentimentScore, SentimentError> {
        let res = self
            .client
            .post(&self.url)
            .json(&SentimentPayload { text })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SentimentError::Timeout(self.timeout)
                } else {
                    SentimentError::Http(e.to_string())
                }
            })?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SentimentError::Http(format!("{} {}", status, body)));
        }
        res.json::<SentimentScore>().await.map_err(|e| {
            if e.is_timeout() {
                SentimentError::Timeout(self.timeout)
            } else {
                SentimentError::InvalidResponse(e.to_string())
            }
        })
    }
}
