//! Scoring request as received from the dashboard layer.

use serde::{Deserialize, Serialize};

/// Engagement inputs. Any subset may be present; `unknown` says the caller has no data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementInputs {
    /// Logins per week
    pub login_frequency: Option<f64>,
    /// Hours on platform per week
    pub time_on_platform_hours: Option<f64>,
    /// Assignment submission rate (%)
    pub submission_rate: Option<f64>,
    pub unknown: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceInputs {
    /// Average grade (%)
    pub average_grade: Option<f64>,
    pub unknown: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceInputs {
    /// Attendance rate (%)
    pub attendance_rate: Option<f64>,
    pub unknown: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringRequest {
    pub student_id: String,
    pub student_name: String,
    pub engagement_inputs: Option<EngagementInputs>,
    pub performance_inputs: Option<PerformanceInputs>,
    pub attendance_inputs: Option<AttendanceInputs>,
    /// Free text routed to the sentiment service
    pub sentiment_text: Option<String>,
    /// Polarity already measured upstream; takes precedence over text
    pub sentiment_polarity: Option<f64>,
}

impl EngagementInputs {
    pub fn is_empty(&self) -> bool {
        self.login_frequency.is_none()
            && self.time_on_platform_hours.is_none()
            && self.submission_rate.is_none()
    }
}

impl ScoringRequest {
    /// Request built from already-normalized sub-scores, each treated as measured.
    pub fn from_sub_scores(
        student_id: impl Into<String>,
        student_name: impl Into<String>,
        engagement: f64,
        performance: f64,
        attendance: f64,
        sentiment_polarity: f64,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            student_name: student_name.into(),
            engagement_inputs: Some(EngagementInputs {
                submission_rate: Some(engagement),
                ..Default::default()
            }),
            performance_inputs: Some(PerformanceInputs {
                average_grade: Some(performance),
                unknown: false,
            }),
            attendance_inputs: Some(AttendanceInputs {
                attendance_rate: Some(attendance),
                unknown: false,
            }),
            sentiment_text: None,
            sentiment_polarity: Some(sentiment_polarity),
        }
    }

    /// Sentiment text worth sending out, if any.
    pub fn sentiment_text(&self) -> Option<&str> {
        self.sentiment_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}
