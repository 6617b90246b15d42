//! Assessment store benchmark: insert and read encrypted assessments.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use risk_engine::config::EngineConfig;
use risk_engine::features::ScoringRequest;
use risk_engine::sentiment::SentimentReading;
use risk_engine::storage::AssessmentStore;
use risk_engine::RiskEngine;
use tempfile::tempdir;

fn request() -> ScoringRequest {
    ScoringRequest::from_sub_scores("s-1", "Bench Student", 20.0, 30.0, 40.0, -0.8)
}

fn bench_insert_assessment(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let store = AssessmentStore::open(&dir.path().join("store.db"), b"bench-secret").unwrap();
    let engine = RiskEngine::new(&EngineConfig::default()).unwrap();
    let req = request();

    c.bench_function("storage_insert_assessment", |b| {
        b.iter(|| {
            let (assessment, alert) = engine
                .evaluate(&req, SentimentReading::measured(-0.8), None, Utc::now())
                .unwrap();
            black_box(store.insert_assessment(&assessment, &alert)).unwrap()
        })
    });
}

fn bench_get_assessment(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let store = AssessmentStore::open(&dir.path().join("store.db"), b"bench-secret").unwrap();
    let engine = RiskEngine::new(&EngineConfig::default()).unwrap();
    let (assessment, alert) = engine
        .evaluate(&request(), SentimentReading::measured(-0.8), None, Utc::now())
        .unwrap();
    store.insert_assessment(&assessment, &alert).unwrap();

    c.bench_function("storage_get_assessment", |b| {
        b.iter(|| black_box(store.get(&assessment.id)).unwrap())
    });
}

criterion_group!(benches, bench_insert_assessment, bench_get_assessment);
criterion_main!(benches);
