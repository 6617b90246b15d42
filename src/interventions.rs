//! Intervention recommender and intervention actions.
//!
//! The recommender is advisory: it maps each risk factor's `(factor_type, severity)` to
//! action templates and returns proposals. Nothing is scheduled or assigned until an
//! operator accepts a proposal or records a manual action.

use crate::error::{Result, RiskError};
use crate::features::FactorType;
use crate::risk::{RiskFactor, Severity};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl From<Severity> for InterventionPriority {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Low => InterventionPriority::Low,
            Severity::Medium => InterventionPriority::Medium,
            Severity::High => InterventionPriority::High,
            Severity::Critical => InterventionPriority::Urgent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionStatus {
    Proposed,
    Scheduled,
    Completed,
    Cancelled,
}

impl InterventionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionStatus::Proposed => "proposed",
            InterventionStatus::Scheduled => "scheduled",
            InterventionStatus::Completed => "completed",
            InterventionStatus::Cancelled => "cancelled",
        }
    }

    fn allows(&self, next: InterventionStatus) -> bool {
        use InterventionStatus::*;
        matches!(
            (self, next),
            (Proposed, Scheduled) | (Scheduled, Completed) | (Proposed | Scheduled, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionOrigin {
    Recommended,
    Manual,
}

/// A recommender suggestion awaiting an operator's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionProposal {
    pub factor_type: FactorType,
    pub severity: Severity,
    pub action_type: String,
    pub description: String,
    pub priority: InterventionPriority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionAction {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub action_type: String,
    pub description: String,
    pub priority: InterventionPriority,
    pub scheduled_date: Option<NaiveDate>,
    pub status: InterventionStatus,
    pub assignee: Option<String>,
    pub origin: InterventionOrigin,
    pub created_at: DateTime<Utc>,
}

/// Operator input for a new intervention: accept proposal `recommendation`, or describe one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewIntervention {
    pub recommendation: Option<usize>,
    pub action_type: Option<String>,
    pub description: Option<String>,
    pub priority: Option<InterventionPriority>,
    pub scheduled_date: Option<NaiveDate>,
    pub assignee: Option<String>,
}

impl InterventionAction {
    /// Build the action an operator asked for, given the assessment's current proposals.
    pub fn from_request(
        assessment_id: Uuid,
        request: NewIntervention,
        proposals: &[InterventionProposal],
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let status = if request.scheduled_date.is_some() {
            InterventionStatus::Scheduled
        } else {
            InterventionStatus::Proposed
        };

        let (action_type, description, priority, origin) = match request.recommendation {
            Some(index) => {
                let p = proposals.get(index).ok_or_else(|| {
                    RiskError::Validation(format!(
                        "recommendation {} does not exist ({} proposals)",
                        index,
                        proposals.len()
                    ))
                })?;
                (
                    p.action_type.clone(),
                    request.description.unwrap_or_else(|| p.description.clone()),
                    request.priority.unwrap_or(p.priority),
                    InterventionOrigin::Recommended,
                )
            }
            None => {
                let action_type = request
                    .action_type
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| RiskError::Validation("action_type is required".into()))?;
                let description = request
                    .description
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| RiskError::Validation("description is required".into()))?;
                (
                    action_type,
                    description,
                    request.priority.unwrap_or(InterventionPriority::Medium),
                    InterventionOrigin::Manual,
                )
            }
        };

        Ok(Self {
            id: Uuid::now_v7(),
            assessment_id,
            action_type,
            description,
            priority,
            scheduled_date: request.scheduled_date,
            status,
            assignee: request.assignee.filter(|s| !s.trim().is_empty()),
            origin,
            created_at: now,
        })
    }

    /// Apply a status change from the external workflow. `Ok(false)` when already there.
    pub fn transition(&mut self, next: InterventionStatus) -> Result<bool> {
        if self.status == next {
            return Ok(false);
        }
        if !self.status.allows(next) {
            return Err(RiskError::InvalidStatus(format!(
                "{} -> {}",
                self.status.as_str(),
                next.as_str()
            )));
        }
        self.status = next;
        Ok(true)
    }
}

struct ActionTemplate {
    factor_type: FactorType,
    severity: Severity,
    action_type: &'static str,
    description: &'static str,
}

const fn template(
    factor_type: FactorType,
    severity: Severity,
    action_type: &'static str,
    description: &'static str,
) -> ActionTemplate {
    ActionTemplate {
        factor_type,
        severity,
        action_type,
        description,
    }
}

const CATALOG: &[ActionTemplate] = &[
    template(
        FactorType::Engagement,
        Severity::Critical,
        "direct_check_in",
        "Schedule direct check-in within 48 hours",
    ),
    template(
        FactorType::Engagement,
        Severity::Critical,
        "learning_plan_review",
        "Review learning plan and workload with the student",
    ),
    template(
        FactorType::Engagement,
        Severity::High,
        "engagement_outreach",
        "Send a personalised re-engagement message from the trainer",
    ),
    template(
        FactorType::Engagement,
        Severity::Medium,
        "engagement_nudge",
        "Add student to the weekly engagement reminder list",
    ),
    template(
        FactorType::Academic,
        Severity::Critical,
        "academic_intervention_meeting",
        "Arrange an academic intervention meeting with trainer and student support",
    ),
    template(
        FactorType::Academic,
        Severity::Critical,
        "assessment_extension_review",
        "Review outstanding assessments and extension options",
    ),
    template(
        FactorType::Academic,
        Severity::High,
        "tutoring_referral",
        "Refer student to tutoring or study-skills support",
    ),
    template(
        FactorType::Academic,
        Severity::Medium,
        "progress_feedback",
        "Give targeted feedback on recent assessment results",
    ),
    template(
        FactorType::Attendance,
        Severity::Critical,
        "attendance_escalation",
        "Escalate absence pattern to student services within 48 hours",
    ),
    template(
        FactorType::Attendance,
        Severity::Critical,
        "welfare_call",
        "Make a welfare call to the student",
    ),
    template(
        FactorType::Attendance,
        Severity::High,
        "absence_contact",
        "Contact student regarding absence pattern",
    ),
    template(
        FactorType::Attendance,
        Severity::Medium,
        "attendance_reminder",
        "Send attendance reminder and confirm timetable",
    ),
    template(
        FactorType::Sentiment,
        Severity::Critical,
        "wellbeing_referral",
        "Refer student to wellbeing or counselling services within 48 hours",
    ),
    template(
        FactorType::Sentiment,
        Severity::High,
        "wellbeing_check_in",
        "Hold a wellbeing check-in conversation",
    ),
    template(
        FactorType::Sentiment,
        Severity::Medium,
        "sentiment_follow_up",
        "Follow up on recent feedback at the next contact",
    ),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct InterventionRecommender;

impl InterventionRecommender {
    /// Proposals for each factor in the order given (largest driver first).
    pub fn recommend(&self, factors: &[RiskFactor]) -> Vec<InterventionProposal> {
        factors
            .iter()
            .flat_map(|factor| {
                CATALOG
                    .iter()
                    .filter(move |t| {
                        t.factor_type == factor.factor_type && t.severity == factor.severity
                    })
                    .map(move |t| InterventionProposal {
                        factor_type: factor.factor_type,
                        severity: factor.severity,
                        action_type: t.action_type.to_string(),
                        description: t.description.to_string(),
                        priority: factor.severity.into(),
                    })
            })
            .collect()
    }
}
