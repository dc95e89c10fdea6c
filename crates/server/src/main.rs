use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use triage_compute::RealtimeScorer;
use triage_rules::TriageRules;
use triage_server::{build_router, AppState};

fn load_config() -> triage_core::Config {
    triage_core::config::load_dotenv();
    triage_core::Config::from_env()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let config = load_config();
    config.log_summary();

    let rules = TriageRules::load(&config.storage.rules_dir)
        .with_context(|| format!("failed to load rules from {}", config.storage.rules_dir.display()))?;
    let state = Arc::new(AppState::new(
        RealtimeScorer::new(&rules.scoring.realtime),
        config.profile_label(),
    ));
    let app = build_router(state, &config.server.cors_origin);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
