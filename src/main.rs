use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use api_shared::JwtKeys;
use spmr_core::{FileTriageStore, MemoryTriageStore, TriageConfig, TriageService, TriageStore};

const DEFAULT_REST_ADDR: &str = "0.0.0.0:8000";

/// Main entry point for the SPMR triage server
///
/// Loads `.env`, resolves configuration once from the environment, wires the store, classifier
/// and notification channels into a `TriageService`, and serves the REST API.
///
/// # Environment Variables
/// - `SPMR_REST_ADDR`: REST server address (default: "0.0.0.0:8000")
/// - `SPMR_DATA_DIR`: Directory for stored readings and alerts (default: "spmr_data")
/// - `JWT_SECRET_KEY`: HS256 secret for bearer tokens (required)
/// - `ML_SERVICE_URL`, Twilio and SMTP variables: optional collaborators
///
/// Passing `--ephemeral` keeps records in memory instead of `SPMR_DATA_DIR`.
///
/// # Errors
/// Returns an error if:
/// - the logging configuration cannot be initialised,
/// - the configuration is invalid or `JWT_SECRET_KEY` is unset,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spmr_run=info".parse()?)
                .add_directive("spmr_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = TriageConfig::from_lookup(|key| std::env::var(key).ok())?;

    let secret = std::env::var("JWT_SECRET_KEY")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("JWT_SECRET_KEY must be set"))?;

    let store: Arc<dyn TriageStore> = if std::env::args().any(|arg| arg == "--ephemeral") {
        tracing::warn!("-- Using in-memory storage; records are lost on exit");
        Arc::new(MemoryTriageStore::new())
    } else {
        tracing::info!("-- Storing records under {}", cfg.data_dir().display());
        Arc::new(FileTriageStore::new(cfg.data_dir()))
    };

    let state = AppState {
        triage: TriageService::from_config(&cfg, store)?,
        keys: JwtKeys::from_secret(secret.as_bytes()),
    };

    let addr = std::env::var("SPMR_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    tracing::info!("++ Starting SPMR REST on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
