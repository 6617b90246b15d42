//! Feature normalizer: heterogeneous raw metrics → four bounded sub-scores.

use super::{
    AttendanceInputs, EngagementInputs, FactorType, NormalizedSignals, PerformanceInputs,
    ScoringRequest, SignalSource, SubScores,
};
use crate::config::NormalizerConfig;
use crate::error::{Result, RiskError};
use crate::sentiment::SentimentReading;

const MAX_ID_LEN: usize = 128;

fn check_count(name: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(RiskError::Validation(format!(
            "{} must be a non-negative number, got {}",
            name, v
        ))),
        _ => Ok(()),
    }
}

fn clip(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

pub struct FeatureNormalizer {
    config: NormalizerConfig,
}

impl FeatureNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Reject a request before any scoring work: identity, metric ranges, missing groups.
    pub fn validate(&self, request: &ScoringRequest) -> Result<()> {
        let id = request.student_id.trim();
        if id.is_empty() {
            return Err(RiskError::Validation("student_id is required".into()));
        }
        if id.len() > MAX_ID_LEN || id.chars().any(char::is_control) {
            return Err(RiskError::Validation(format!(
                "student_id must be at most {} printable characters",
                MAX_ID_LEN
            )));
        }
        if request.student_name.trim().is_empty() {
            return Err(RiskError::Validation("student_name is required".into()));
        }

        if let Some(e) = &request.engagement_inputs {
            check_count("login_frequency", e.login_frequency)?;
            check_count("time_on_platform_hours", e.time_on_platform_hours)?;
            check_count("submission_rate", e.submission_rate)?;
            if e.unknown && !e.is_empty() {
                return Err(RiskError::Validation(
                    "engagement_inputs cannot carry values and be marked unknown".into(),
                ));
            }
        }
        if let Some(p) = &request.performance_inputs {
            check_count("average_grade", p.average_grade)?;
            if p.unknown && p.average_grade.is_some() {
                return Err(RiskError::Validation(
                    "performance_inputs cannot carry a value and be marked unknown".into(),
                ));
            }
        }
        if let Some(a) = &request.attendance_inputs {
            check_count("attendance_rate", a.attendance_rate)?;
            if a.unknown && a.attendance_rate.is_some() {
                return Err(RiskError::Validation(
                    "attendance_inputs cannot carry a value and be marked unknown".into(),
                ));
            }
        }
        if let Some(p) = request.sentiment_polarity {
            if !p.is_finite() || !(-1.0..=1.0).contains(&p) {
                return Err(RiskError::Validation(format!(
                    "sentiment_polarity must lie in [-1, 1], got {}",
                    p
                )));
            }
        }

        self.engagement(request.engagement_inputs.as_ref())?;
        self.performance(request.performance_inputs.as_ref())?;
        self.attendance(request.attendance_inputs.as_ref())?;
        Ok(())
    }

    /// Weighted mean of the engagement components present, each saturating at its target.
    pub fn engagement(&self, inputs: Option<&EngagementInputs>) -> Result<(f64, SignalSource)> {
        let missing = RiskError::MissingSignal {
            sub_score: FactorType::Engagement,
        };
        let inputs = inputs.ok_or(missing)?;
        if inputs.unknown {
            return Ok((self.config.neutral_score, SignalSource::Defaulted));
        }

        let c = &self.config;
        let components = [
            inputs
                .login_frequency
                .map(|v| (c.login_weight, (v / c.login_target_per_week).min(1.0) * 100.0)),
            inputs
                .time_on_platform_hours
                .map(|v| (c.time_weight, (v / c.hours_target_per_week).min(1.0) * 100.0)),
            inputs
                .submission_rate
                .map(|v| (c.submission_weight, clip(v))),
        ];

        let (weight_total, weighted) = components
            .iter()
            .flatten()
            .fold((0.0, 0.0), |(w, s), (cw, cv)| (w + cw, s + cw * cv));
        if weight_total <= 0.0 {
            return Err(RiskError::MissingSignal {
                sub_score: FactorType::Engagement,
            });
        }
        Ok((clip(weighted / weight_total), SignalSource::Measured))
    }

    pub fn performance(&self, inputs: Option<&PerformanceInputs>) -> Result<(f64, SignalSource)> {
        match inputs {
            Some(p) if p.unknown => Ok((self.config.neutral_score, SignalSource::Defaulted)),
            Some(PerformanceInputs {
                average_grade: Some(grade),
                ..
            }) => Ok((clip(*grade), SignalSource::Measured)),
            _ => Err(RiskError::MissingSignal {
                sub_score: FactorType::Academic,
            }),
        }
    }

    pub fn attendance(&self, inputs: Option<&AttendanceInputs>) -> Result<(f64, SignalSource)> {
        match inputs {
            Some(a) if a.unknown => Ok((self.config.neutral_score, SignalSource::Defaulted)),
            Some(AttendanceInputs {
                attendance_rate: Some(rate),
                ..
            }) => Ok((clip(*rate), SignalSource::Measured)),
            _ => Err(RiskError::MissingSignal {
                sub_score: FactorType::Attendance,
            }),
        }
    }

    /// Combine the request's measured groups with an already-resolved sentiment reading.
    pub fn normalize(
        &self,
        request: &ScoringRequest,
        sentiment: SentimentReading,
    ) -> Result<NormalizedSignals> {
        let (engagement, e_src) = self.engagement(request.engagement_inputs.as_ref())?;
        let (performance, p_src) = self.performance(request.performance_inputs.as_ref())?;
        let (attendance, a_src) = self.attendance(request.attendance_inputs.as_ref())?;

        let defaulted = [
            (FactorType::Engagement, e_src),
            (FactorType::Academic, p_src),
            (FactorType::Attendance, a_src),
            (FactorType::Sentiment, sentiment.source),
        ]
        .into_iter()
        .filter(|(_, src)| *src == SignalSource::Defaulted)
        .map(|(f, _)| f)
        .collect();

        Ok(NormalizedSignals {
            scores: SubScores {
                engagement,
                performance,
                attendance,
                sentiment: sentiment.polarity.clamp(-1.0, 1.0),
            },
            defaulted,
        })
    }
}
