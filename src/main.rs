use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tender_ledger::api;
use tender_ledger::config::AppConfig;
use tender_ledger::TenderLedger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tender_ledger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tender ledger");

    let config = AppConfig::load()?;
    info!(
        "Configuration loaded (difficulty {}, max iterations {})",
        config.ledger.difficulty, config.ledger.max_mining_iterations
    );

    let ledger = Arc::new(TenderLedger::from_settings(&config.ledger)?);
    let stats = ledger.stats().await;
    info!(
        "Ledger ready: {} blocks, {} entities, integrity {}",
        stats.total_blocks, stats.total_entities, stats.chain_integrity
    );

    let app = api::router(ledger);

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
