//! Request handling on top of the engine and the store.
//!
//! Scoring for one student is serialized: the previous assessment is read and the new one
//! written under that student's lock, so trends always compare against the immediately
//! preceding assessment. Different students score in parallel; batches fan out up to
//! `batch.max_concurrency` tasks.

use crate::config::EngineConfig;
use crate::error::{Result, RiskError};
use crate::features::ScoringRequest;
use crate::interventions::{
    InterventionAction, InterventionProposal, InterventionStatus, NewIntervention,
};
use crate::risk::{AssessmentRecord, RiskEngine};
use crate::sentiment::SentimentResolver;
use crate::storage::{AssessmentFilter, AssessmentStore, CohortSummary};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prune idle per-student locks once the map grows past this.
const LOCK_PRUNE_THRESHOLD: usize = 1024;

#[derive(Default)]
struct StudentLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl StudentLocks {
    async fn acquire(&self, student_id: &str) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| RiskError::Internal("student lock table poisoned".into()))?;
            if locks.len() > LOCK_PRUNE_THRESHOLD {
                locks.retain(|_, l| Arc::strong_count(l) > 1);
            }
            locks
                .entry(student_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        match lock.clone().try_lock_owned() {
            Ok(guard) => Ok(guard),
            Err(_) => {
                debug!(student_id, "waiting for concurrent assessment of same student");
                Ok(lock.lock_owned().await)
            }
        }
    }
}

pub struct RiskService {
    engine: RiskEngine,
    sentiment: SentimentResolver,
    store: Arc<AssessmentStore>,
    locks: StudentLocks,
    batch_limit: Arc<Semaphore>,
}

impl RiskService {
    pub fn new(config: &EngineConfig, store: Arc<AssessmentStore>) -> Result<Self> {
        Self::with_sentiment(config, store, SentimentResolver::from_config(&config.sentiment))
    }

    pub fn with_sentiment(
        config: &EngineConfig,
        store: Arc<AssessmentStore>,
        sentiment: SentimentResolver,
    ) -> Result<Self> {
        Ok(Self {
            engine: RiskEngine::new(config)?,
            sentiment,
            store,
            locks: StudentLocks::default(),
            batch_limit: Arc::new(Semaphore::new(config.batch.max_concurrency.max(1))),
        })
    }

    pub fn engine(&self) -> &RiskEngine {
        &self.engine
    }

    /// Validate, score and persist one assessment.
    pub async fn create_assessment(&self, request: ScoringRequest) -> Result<AssessmentRecord> {
        self.engine.normalizer().validate(&request)?;
        let sentiment = self.sentiment.resolve(&request).await;

        let student_id = request.student_id.trim().to_string();
        let _guard = self.locks.acquire(&student_id).await?;
        let previous = {
            let student_id = student_id.clone();
            self.with_store(move |store| store.latest_for_student(&student_id)).await?
        };
        let (assessment, alert) =
            self.engine
                .evaluate(&request, sentiment, previous.as_ref(), Utc::now())?;
        let (assessment, alert) = self
            .with_store(move |store| {
                store.insert_assessment(&assessment, &alert)?;
                Ok((assessment, alert))
            })
            .await?;

        info!(
            assessment_id = %assessment.id,
            student_id = %assessment.student_id,
            dropout_probability = assessment.dropout_probability,
            risk_level = %assessment.risk_level,
            confidence = assessment.confidence,
            factors = assessment.factors.len(),
            "risk assessment created"
        );
        if assessment.alert_triggered {
            warn!(
                assessment_id = %assessment.id,
                student_id = %assessment.student_id,
                risk_level = %assessment.risk_level,
                "dropout risk alert triggered"
            );
        }
        Ok(AssessmentRecord::new(assessment, alert))
    }

    /// Run a store call on the blocking pool; rusqlite calls never run on a runtime worker.
    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&AssessmentStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| RiskError::Internal(format!("store task failed: {}", e)))?
    }

    /// Score a cohort. Results line up with `requests`; one failure does not stop the rest.
    pub async fn score_batch(
        self: &Arc<Self>,
        requests: Vec<ScoringRequest>,
    ) -> Vec<Result<AssessmentRecord>> {
        let total = requests.len();
        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let service = Arc::clone(self);
                let limit = Arc::clone(&self.batch_limit);
                tokio::spawn(async move {
                    let _permit = limit
                        .acquire_owned()
                        .await
                        .map_err(|_| RiskError::Internal("batch limiter closed".into()))?;
                    service.create_assessment(request).await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(total);
        for handle in handles {
            results.push(handle.await.unwrap_or_else(|e| {
                Err(RiskError::Internal(format!("scoring task failed: {}", e)))
            }));
        }
        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(total, failed, "batch scoring finished");
        results
    }

    pub fn get(&self, id: &Uuid) -> Result<AssessmentRecord> {
        self.store
            .get(id)?
            .ok_or_else(|| RiskError::NotFound(format!("risk assessment {}", id)))
    }

    pub fn list(&self, filter: &AssessmentFilter) -> Result<Vec<AssessmentRecord>> {
        self.store.list(filter)
    }

    pub fn current_for_student(&self, student_id: &str) -> Result<AssessmentRecord> {
        let filter = AssessmentFilter {
            student_id: Some(student_id.to_string()),
            limit: Some(1),
            ..Default::default()
        };
        self.store
            .list(&filter)?
            .into_iter()
            .next()
            .ok_or_else(|| RiskError::NotFound(format!("no assessment for student {}", student_id)))
    }

    /// Idempotent: acknowledging twice returns the same record.
    pub fn acknowledge(&self, id: &Uuid, by: Option<String>) -> Result<AssessmentRecord> {
        let (record, changed) = self.store.acknowledge(id, by, Utc::now())?;
        if changed {
            info!(assessment_id = %id, "alert acknowledged");
        } else {
            debug!(assessment_id = %id, "alert already acknowledged");
        }
        Ok(record)
    }

    pub fn resolve(&self, id: &Uuid, note: Option<String>) -> Result<AssessmentRecord> {
        let (record, changed) = self.store.resolve(id, note, Utc::now())?;
        if changed {
            info!(assessment_id = %id, "alert resolved");
        }
        Ok(record)
    }

    pub fn recommendations(&self, id: &Uuid) -> Result<Vec<InterventionProposal>> {
        let record = self.get(id)?;
        Ok(self.engine.recommend(&record.assessment))
    }

    pub fn create_intervention(
        &self,
        assessment_id: &Uuid,
        request: NewIntervention,
    ) -> Result<InterventionAction> {
        let record = self.get(assessment_id)?;
        let proposals = self.engine.recommend(&record.assessment);
        let action =
            InterventionAction::from_request(*assessment_id, request, &proposals, Utc::now())?;
        self.store.insert_intervention(&action)?;
        info!(
            assessment_id = %assessment_id,
            intervention_id = %action.id,
            action_type = %action.action_type,
            "intervention recorded"
        );
        Ok(action)
    }

    pub fn interventions(&self, assessment_id: &Uuid) -> Result<Vec<InterventionAction>> {
        self.store.interventions_for(assessment_id)
    }

    pub fn update_intervention_status(
        &self,
        id: &Uuid,
        status: InterventionStatus,
    ) -> Result<InterventionAction> {
        self.store.update_intervention_status(id, status)
    }

    pub fn summary(&self) -> Result<CohortSummary> {
        self.store.summary()
    }
}
