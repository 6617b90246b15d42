//! Persistence for assessments, alerts and interventions.

mod store;

pub use store::{AssessmentFilter, AssessmentStore, CohortSummary};
