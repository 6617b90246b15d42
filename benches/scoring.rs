//! Scoring benchmark: one evaluation and a full cohort pass.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use risk_engine::config::EngineConfig;
use risk_engine::features::ScoringRequest;
use risk_engine::sentiment::SentimentReading;
use risk_engine::RiskEngine;

fn cohort(n: usize) -> Vec<ScoringRequest> {
    (0..n)
        .map(|i| {
            let x = (i % 100) as f64;
            ScoringRequest::from_sub_scores(
                format!("s-{}", i),
                "Bench Student",
                x,
                100.0 - x,
                (x * 7.0) % 100.0,
                (x / 50.0) - 1.0,
            )
        })
        .collect()
}

fn bench_evaluate_single(c: &mut Criterion) {
    let engine = RiskEngine::new(&EngineConfig::default()).unwrap();
    let req = ScoringRequest::from_sub_scores("s-1", "Bench Student", 20.0, 30.0, 40.0, -0.8);
    let sentiment = SentimentReading::measured(-0.8);

    c.bench_function("evaluate_single", |b| {
        b.iter(|| {
            black_box(engine.evaluate(black_box(&req), sentiment, None, Utc::now())).unwrap()
        })
    });
}

fn bench_evaluate_cohort(c: &mut Criterion) {
    let engine = RiskEngine::new(&EngineConfig::default()).unwrap();
    let requests = cohort(1_000);

    c.bench_function("evaluate_cohort_1000", |b| {
        b.iter(|| {
            for req in &requests {
                let sentiment = SentimentReading::measured(req.sentiment_polarity.unwrap_or(0.0));
                black_box(engine.evaluate(req, sentiment, None, Utc::now())).unwrap();
            }
        })
    });
}

criterion_group!(benches, bench_evaluate_single, bench_evaluate_cohort);
criterion_main!(benches);
