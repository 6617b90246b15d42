//! HTTP surface for the dashboard layer.

use super::ApiError;
use crate::features::ScoringRequest;
use crate::interventions::{InterventionProposal, InterventionStatus, NewIntervention};
use crate::risk::AssessmentRecord;
use crate::service::RiskService;
use crate::storage::AssessmentFilter;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Clone)]
struct AppState {
    service: Arc<RiskService>,
}

/// Created assessment with the recommender's proposals (empty unless an alert fired).
#[derive(Serialize)]
struct CreatedAssessment {
    #[serde(flatten)]
    record: AssessmentRecord,
    recommendations: Vec<InterventionProposal>,
}

#[derive(Deserialize)]
struct BatchRequest {
    students: Vec<ScoringRequest>,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum BatchItem {
    Created { assessment: Box<AssessmentRecord> },
    Rejected { error: &'static str, message: String },
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AcknowledgeBody {
    acknowledged_by: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ResolveBody {
    note: Option<String>,
}

#[derive(Deserialize)]
struct StatusBody {
    status: InterventionStatus,
}

pub fn router(service: Arc<RiskService>) -> Router {
    Router::new()
        .route(
            "/risk-assessments",
            post(create_assessment).get(list_assessments),
        )
        .route("/risk-assessments/batch", post(score_batch))
        .route("/risk-assessments/summary", get(summary))
        .route("/risk-assessments/:id", get(get_assessment))
        .route("/risk-assessments/:id/acknowledge", post(acknowledge))
        .route("/risk-assessments/:id/resolve", post(resolve))
        .route("/risk-assessments/:id/recommendations", get(recommendations))
        .route(
            "/risk-assessments/:id/interventions",
            post(create_intervention).get(list_interventions),
        )
        .route("/interventions/:id/status", post(update_intervention_status))
        .route(
            "/students/:student_id/risk-assessments/current",
            get(current_for_student),
        )
        .route("/health", get(health))
        .with_state(AppState { service })
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` completes.
pub async fn serve<F>(
    service: Arc<RiskService>,
    addr: SocketAddr,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "risk API listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn create_assessment(
    State(state): State<AppState>,
    Json(request): Json<ScoringRequest>,
) -> ApiResult<impl IntoResponse> {
    let record = state.service.create_assessment(request).await?;
    let recommendations = state.service.engine().recommend(&record.assessment);
    Ok((
        StatusCode::CREATED,
        Json(CreatedAssessment {
            record,
            recommendations,
        }),
    ))
}

async fn list_assessments(
    State(state): State<AppState>,
    Query(filter): Query<AssessmentFilter>,
) -> ApiResult<Json<Vec<AssessmentRecord>>> {
    Ok(Json(state.service.list(&filter)?))
}

async fn score_batch(
    State(state): State<AppState>,
    Json(batch): Json<BatchRequest>,
) -> ApiResult<Json<Vec<BatchItem>>> {
    let results = state.service.score_batch(batch.students).await;
    let items = results
        .into_iter()
        .map(|r| match r {
            Ok(record) => BatchItem::Created {
                assessment: Box::new(record),
            },
            Err(e) => BatchItem::Rejected {
                error: e.kind(),
                message: e.to_string(),
            },
        })
        .collect();
    Ok(Json(items))
}

async fn summary(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.summary()?))
}

async fn get_assessment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AssessmentRecord>> {
    Ok(Json(state.service.get(&id)?))
}

async fn acknowledge(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<AcknowledgeBody>>,
) -> ApiResult<Json<AssessmentRecord>> {
    let Json(body) = body.unwrap_or_default();
    Ok(Json(state.service.acknowledge(&id, body.acknowledged_by)?))
}

async fn resolve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ResolveBody>>,
) -> ApiResult<Json<AssessmentRecord>> {
    let Json(body) = body.unwrap_or_default();
    Ok(Json(state.service.resolve(&id, body.note)?))
}

async fn recommendations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<InterventionProposal>>> {
    Ok(Json(state.service.recommendations(&id)?))
}

async fn create_intervention(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<NewIntervention>,
) -> ApiResult<impl IntoResponse> {
    let action = state.service.create_intervention(&id, request)?;
    Ok((StatusCode::CREATED, Json(action)))
}

async fn list_interventions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.interventions(&id)?))
}

async fn update_intervention_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusBody>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.update_intervention_status(&id, body.status)?))
}

async fn current_for_student(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult<Json<AssessmentRecord>> {
    Ok(Json(state.service.current_for_student(&student_id)?))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let model = state.service.engine().model();
    Json(serde_json::json!({
        "status": "ok",
        "model_version": model.config().version,
        "model_fingerprint": model.fingerprint(),
    }))
}
