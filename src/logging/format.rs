//! JSON log lines: one JSON object per line (ndjson) for ingestion and audit.

use crate::error::RiskError;
use crate::risk::AssessmentRecord;
use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Audit line for one scoring outcome.
#[derive(Debug, Serialize)]
pub struct AuditLine<'a> {
    pub ts: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropout_probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_triggered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factors: Option<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> AuditLine<'a> {
    pub fn assessed(record: &'a AssessmentRecord) -> Self {
        let a = &record.assessment;
        Self {
            ts: a.created_at.to_rfc3339(),
            student_id: Some(&a.student_id),
            assessment_id: Some(a.id.to_string()),
            dropout_probability: Some(a.dropout_probability),
            risk_level: Some(a.risk_level.as_str()),
            confidence: Some(a.confidence),
            alert_triggered: Some(a.alert_triggered),
            factors: Some(a.factors.iter().map(|f| f.factor_type.as_str()).collect()),
            error: None,
        }
    }

    pub fn rejected(student_id: &'a str, err: &RiskError) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339(),
            student_id: Some(student_id),
            assessment_id: None,
            dropout_probability: None,
            risk_level: None,
            confidence: None,
            alert_triggered: None,
            factors: None,
            error: Some(format!("{}: {}", err.kind(), err)),
        }
    }
}

/// Initialize tracing with JSON format (one JSON object per line)
pub struct StructuredLogger;

impl StructuredLogger {
    /// Install global subscriber: JSON lines to stderr, level from RUST_LOG or default.
    /// Stdout is left for command output.
    pub fn init(json: bool, default_level: &str) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry().with(filter).with(fmt).try_init();
        } else {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init();
        }
    }

    /// Emit a single structured line without going through tracing
    pub fn emit_json(event: &impl Serialize, w: &mut impl Write) {
        if let Ok(line) = serde_json::to_string(event) {
            let _ = writeln!(w, "{}", line);
        }
    }
}
