use std::sync::Arc;

use tracing::{info, warn};

use product_advisor::agent::OllamaAgentGateway;
use product_advisor::config::AdvisorConfig;
use product_advisor::db::snapshot_repository::{
    MemorySnapshotStore, SnapshotStore, SqliteSnapshotStore,
};
use product_advisor::routes::api_routes::router;
use product_advisor::service::activity::ProcessingIndicator;
use product_advisor::service::message_flow::MessageFlowController;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "product_advisor=debug,tower_http=debug".into()),
        )
        .init();

    let config = AdvisorConfig::from_env();

    // ── Persistence ──────────────────────────────────────────────────────────
    let persistence: Arc<dyn SnapshotStore> =
        match SqliteSnapshotStore::connect(&config.database_url, config.storage_slot.clone()).await {
            Ok(store) => {
                info!("Conversation snapshots stored in {}", config.database_url);
                Arc::new(store)
            }
            Err(e) => {
                warn!("Persistence unavailable, conversations will not survive restart: {e}");
                Arc::new(MemorySnapshotStore::new())
            }
        };

    // ── Dependency wiring ────────────────────────────────────────────────────
    let gateway = Arc::new(OllamaAgentGateway::new(&config.agent_base_url)?);
    let flow = MessageFlowController::new(
        gateway,
        Arc::new(ProcessingIndicator::new()),
        persistence,
        config.agent_id.clone(),
    );
    flow.load_persisted().await;
    if config.demo_mode {
        flow.set_demo_mode(true).await;
    }

    // ── Listen ───────────────────────────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/");

    axum::serve(listener, router(flow.clone()))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    flow.flush_persistence().await;
    info!("Shut down cleanly");
    Ok(())
}
