//! Risk engine entrypoint.
//!
//! `risk-engine` (or `risk-engine serve`) serves the HTTP API until Ctrl+C.
//! `risk-engine score <cohort.json>` scores a JSON array of requests once and prints one
//! NDJSON audit line per student.

use clap::{Parser, Subcommand};
use risk_engine::{
    api,
    config::EngineConfig,
    features::ScoringRequest,
    logging::{AuditLine, StructuredLogger},
    service::RiskService,
    storage::AssessmentStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "risk-engine", version)]
#[command(about = "Student dropout-risk scoring and early-warning engine", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON); defaults apply when it does not exist
    #[arg(long, env = "RISK_ENGINE_CONFIG_PATH", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Score a JSON array of requests and print NDJSON audit lines
    Score {
        /// Cohort file
        file: PathBuf,
    },
}

fn open_store(config: &EngineConfig) -> Result<Arc<AssessmentStore>, BoxError> {
    std::fs::create_dir_all(&config.data_dir)?;
    let store_path = config.data_dir.join("assessments.db");
    let secret = match std::env::var("RISK_ENGINE_STORE_SECRET") {
        Ok(s) if !s.is_empty() => s,
        _ => {
            warn!("RISK_ENGINE_STORE_SECRET not set; using development secret");
            "risk-engine-dev-secret".to_string()
        }
    };
    Ok(Arc::new(AssessmentStore::open(&store_path, secret.as_bytes())?))
}

async fn score_file(service: Arc<RiskService>, path: &Path) -> Result<(), BoxError> {
    let data = std::fs::read_to_string(path)?;
    let requests: Vec<ScoringRequest> = serde_json::from_str(&data)?;
    let student_ids: Vec<String> = requests.iter().map(|r| r.student_id.clone()).collect();
    info!(count = requests.len(), path = %path.display(), "scoring cohort file");

    let results = service.score_batch(requests).await;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (student_id, result) in student_ids.iter().zip(&results) {
        match result {
            Ok(record) => StructuredLogger::emit_json(&AuditLine::assessed(record), &mut out),
            Err(e) => StructuredLogger::emit_json(&AuditLine::rejected(student_id, e), &mut out),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let config = EngineConfig::load(&cli.config)?;

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(
        config_path = %cli.config.display(),
        data_dir = ?config.data_dir,
        model_version = %config.model.version,
        "risk engine starting"
    );

    let store = open_store(&config)?;
    let service = Arc::new(RiskService::new(&config, store)?);
    info!(
        model_fingerprint = %service.engine().model().fingerprint(),
        sentiment_endpoint = ?config.sentiment.endpoint,
        "scoring model loaded"
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::Score { file } => score_file(service, &file).await?,
        Command::Serve => {
            api::serve(service, config.server.addr, async {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutdown requested");
            })
            .await?;
            info!("risk engine stopped");
        }
    }

    Ok(())
}
