//! Alert lifecycle per assessment: `none → triggered → acknowledged → resolved`.
//!
//! Triggering happens with assessment creation; the other two transitions are operator
//! actions. Repeating a transition that already happened is a no-op. Each assessment owns
//! its alert, so a newer assessment never touches an older one's state.

use crate::error::{Result, RiskError};
use crate::risk::RiskLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    None,
    Triggered,
    Acknowledged,
    Resolved,
}

impl AlertState {
    pub fn initial(level: RiskLevel) -> Self {
        if level.is_alerting() {
            AlertState::Triggered
        } else {
            AlertState::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertState::None => "none",
            AlertState::Triggered => "triggered",
            AlertState::Acknowledged => "acknowledged",
            AlertState::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub assessment_id: Uuid,
    pub state: AlertState,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
}

impl AlertRecord {
    /// Alert as it exists the moment its assessment is created.
    pub fn open(assessment_id: Uuid, level: RiskLevel) -> Self {
        Self {
            assessment_id,
            state: AlertState::initial(level),
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolution_note: None,
        }
    }

    pub fn is_acknowledged(&self) -> bool {
        matches!(self.state, AlertState::Acknowledged | AlertState::Resolved)
    }

    /// `None` when the alert is already acknowledged (or resolved) and nothing changes.
    pub fn acknowledge(&self, by: Option<String>, at: DateTime<Utc>) -> Result<Option<Self>> {
        match self.state {
            AlertState::Triggered => Ok(Some(Self {
                state: AlertState::Acknowledged,
                acknowledged_at: Some(at),
                acknowledged_by: by,
                ..self.clone()
            })),
            AlertState::Acknowledged | AlertState::Resolved => Ok(None),
            AlertState::None => Err(RiskError::InvalidTransition {
                from: self.state,
                action: "acknowledge",
            }),
        }
    }

    /// `None` when already resolved. Resolution requires a prior acknowledgement.
    pub fn resolve(&self, note: Option<String>, at: DateTime<Utc>) -> Result<Option<Self>> {
        match self.state {
            AlertState::Acknowledged => Ok(Some(Self {
                state: AlertState::Resolved,
                resolved_at: Some(at),
                resolution_note: note,
                ..self.clone()
            })),
            AlertState::Resolved => Ok(None),
            AlertState::None | AlertState::Triggered => Err(RiskError::InvalidTransition {
                from: self.state,
                action: "resolve",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_alerting_levels_trigger() {
        let id = Uuid::now_v7();
        assert_eq!(AlertRecord::open(id, RiskLevel::Medium).state, AlertState::None);
        assert_eq!(AlertRecord::open(id, RiskLevel::High).state, AlertState::Triggered);
        assert_eq!(
            AlertRecord::open(id, RiskLevel::Critical).state,
            AlertState::Triggered
        );
    }

    #[test]
    fn acknowledge_is_idempotent() {
        let alert = AlertRecord::open(Uuid::now_v7(), RiskLevel::High);
        let acked = alert
            .acknowledge(Some("trainer-7".into()), Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(acked.state, AlertState::Acknowledged);
        assert!(acked.is_acknowledged());
        assert_eq!(acked.acknowledge(None, Utc::now()).unwrap(), None);
    }

    #[test]
    fn full_lifecycle() {
        let alert = AlertRecord::open(Uuid::now_v7(), RiskLevel::Critical);
        assert!(matches!(
            alert.resolve(None, Utc::now()),
            Err(RiskError::InvalidTransition { .. })
        ));
        let acked = alert.acknowledge(None, Utc::now()).unwrap().unwrap();
        let resolved = acked
            .resolve(Some("follow-up shows improvement".into()), Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(resolved.state, AlertState::Resolved);
        assert!(resolved.is_acknowledged());
        assert_eq!(resolved.resolve(None, Utc::now()).unwrap(), None);
        assert_eq!(resolved.acknowledge(None, Utc::now()).unwrap(), None);
    }

    #[test]
    fn no_alert_cannot_be_acknowledged() {
        let alert = AlertRecord::open(Uuid::now_v7(), RiskLevel::Low);
        assert!(alert.acknowledge(None, Utc::now()).is_err());
    }
}
