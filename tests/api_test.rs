//! HTTP API tests against the in-process router.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use risk_engine::{api, config::EngineConfig, storage::AssessmentStore, RiskService};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let store = Arc::new(AssessmentStore::open_in_memory(b"api-secret").unwrap());
    let service = Arc::new(RiskService::new(&EngineConfig::default(), store).unwrap());
    api::router(service)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn student(id: &str, engagement: f64, grade: f64, attendance: f64, polarity: f64) -> Value {
    json!({
        "student_id": id,
        "student_name": "Sam Okafor",
        "engagement_inputs": { "submission_rate": engagement },
        "performance_inputs": { "average_grade": grade },
        "attendance_inputs": { "attendance_rate": attendance },
        "sentiment_polarity": polarity,
    })
}

#[tokio::test]
async fn create_returns_assessment_with_recommendations() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/risk-assessments",
        Some(student("s-1", 20.0, 30.0, 40.0, -0.8)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["risk_level"], "high");
    assert_eq!(body["alert_triggered"], true);
    assert_eq!(body["alert_state"], "triggered");
    assert_eq!(body["factors"].as_array().unwrap().len(), 4);
    assert_eq!(body["factors"][0]["factor_type"], "engagement");
    assert!(!body["recommendations"].as_array().unwrap().is_empty());

    let id = body["id"].as_str().unwrap();
    let (status, fetched) = send(&app, "GET", &format!("/risk-assessments/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["dropout_probability"], body["dropout_probability"]);
}

#[tokio::test]
async fn low_risk_has_no_recommendations() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/risk-assessments",
        Some(student("s-2", 80.0, 85.0, 90.0, 0.5)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["risk_level"], "low");
    assert_eq!(body["alert_state"], "none");
    assert!(body["recommendations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn validation_errors_are_400() {
    let app = app();
    let mut missing_name = student("s-3", 50.0, 50.0, 50.0, 0.0);
    missing_name["student_name"] = json!("  ");
    let (status, body) = send(&app, "POST", "/risk-assessments", Some(missing_name)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let mut no_attendance = student("s-3", 50.0, 50.0, 50.0, 0.0);
    no_attendance
        .as_object_mut()
        .unwrap()
        .remove("attendance_inputs");
    let (status, body) = send(&app, "POST", "/risk-assessments", Some(no_attendance)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_signal_error");

    let (_, list) = send(&app, "GET", "/risk-assessments", None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn acknowledge_is_idempotent_and_unknown_is_404() {
    let app = app();
    let (_, created) = send(
        &app,
        "POST",
        "/risk-assessments",
        Some(student("s-4", 10.0, 20.0, 30.0, -1.0)),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();
    let uri = format!("/risk-assessments/{}/acknowledge", id);

    let ack = json!({ "acknowledged_by": "trainer-1" });
    let (status, first) = send(&app, "POST", &uri, Some(ack)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["alert_acknowledged"], true);
    let (status, second) = send(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["alert"], first["alert"]);

    let unknown = uuid::Uuid::now_v7();
    let (status, body) = send(
        &app,
        "POST",
        &format!("/risk-assessments/{}/acknowledge", unknown),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found_error");
}

#[tokio::test]
async fn resolving_unacknowledged_or_quiet_alert_is_409() {
    let app = app();
    let (_, low) = send(
        &app,
        "POST",
        "/risk-assessments",
        Some(student("s-5", 80.0, 85.0, 90.0, 0.5)),
    )
    .await;
    let uri = format!("/risk-assessments/{}/acknowledge", low["id"].as_str().unwrap());
    let (status, body) = send(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition_error");

    let (_, high) = send(
        &app,
        "POST",
        "/risk-assessments",
        Some(student("s-6", 20.0, 30.0, 40.0, -0.8)),
    )
    .await;
    let uri = format!("/risk-assessments/{}/resolve", high["id"].as_str().unwrap());
    let (status, _) = send(&app, "POST", &uri, Some(json!({ "note": "too early" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn list_filters_and_current() {
    let app = app();
    for body in [
        student("s-7", 80.0, 85.0, 90.0, 0.5),
        student("s-8", 20.0, 30.0, 40.0, -0.8),
        student("s-8", 70.0, 30.0, 40.0, -0.8),
    ] {
        let (status, _) = send(&app, "POST", "/risk-assessments", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, s8) = send(&app, "GET", "/risk-assessments?student_id=s-8", None).await;
    assert_eq!(s8.as_array().unwrap().len(), 2);

    let (_, low) = send(&app, "GET", "/risk-assessments?risk_level=low", None).await;
    assert_eq!(low.as_array().unwrap().len(), 1);
    assert_eq!(low[0]["student_id"], "s-7");

    let current_uri = "/students/s-8/risk-assessments/current";
    let (status, current) = send(&app, "GET", current_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["trends"]["engagement"], "improving");
    assert_eq!(current["previous_assessment_id"], s8[1]["id"]);

    let nobody_uri = "/students/nobody/risk-assessments/current";
    let (status, _) = send(&app, "GET", nobody_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, summary) = send(&app, "GET", "/risk-assessments/summary", None).await;
    assert_eq!(summary["students"], 2);
}

#[tokio::test]
async fn batch_reports_each_student() {
    let app = app();
    let mut bad = student("s-10", 50.0, 50.0, 50.0, 0.0);
    bad["sentiment_polarity"] = json!(1.5);
    let (status, body) = send(
        &app,
        "POST",
        "/risk-assessments/batch",
        Some(json!({ "students": [student("s-9", 80.0, 85.0, 90.0, 0.5), bad] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["status"], "created");
    assert_eq!(items[0]["assessment"]["student_id"], "s-9");
    assert_eq!(items[1]["status"], "rejected");
    assert_eq!(items[1]["error"], "validation_error");
}

#[tokio::test]
async fn intervention_lifecycle_over_http() {
    let app = app();
    let (_, created) = send(
        &app,
        "POST",
        "/risk-assessments",
        Some(student("s-11", 20.0, 80.0, 40.0, 0.2)),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, action) = send(
        &app,
        "POST",
        &format!("/risk-assessments/{}/interventions", id),
        Some(json!({ "recommendation": 0, "scheduled_date": "2026-03-02" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(action["status"], "scheduled");
    assert_eq!(action["origin"], "recommended");

    let (status, bad) = send(
        &app,
        "POST",
        &format!("/risk-assessments/{}/interventions", id),
        Some(json!({ "recommendation": 99 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(bad["error"], "validation_error");

    let action_id = action["id"].as_str().unwrap();
    let (status, done) = send(
        &app,
        "POST",
        &format!("/interventions/{}/status", action_id),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["status"], "completed");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/interventions/{}/status", action_id),
        Some(json!({ "status": "proposed" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let list_uri = format!("/risk-assessments/{}/interventions", id);
    let (_, listed) = send(&app, "GET", &list_uri, None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn health_reports_model() {
    let (status, body) = send(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model_version"], "2024.1");
    assert_eq!(body["model_fingerprint"].as_str().unwrap().len(), 64);
}
