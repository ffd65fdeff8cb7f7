use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fund_ledger::api;
use fund_ledger::config::AppConfig;
use fund_ledger::database::Database;
use fund_ledger::Ledger;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fund_ledger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting fund ledger");

    let config = AppConfig::load()?;
    info!(
        "Configuration loaded (difficulty {}, {} append retries)",
        config.ledger.difficulty, config.ledger.max_append_retries
    );

    let database = Database::new(&config.database_url).await?;
    info!("Database connected");

    database.run_migrations().await?;
    info!("Database migrations completed");

    let ledger = Ledger::new(database, config.ledger.clone())?;
    let genesis = ledger.initialize_ledger().await?;
    info!("Ledger ready, genesis {}", genesis.hash);

    let report = ledger.validate_chain().await?;
    if !report.valid {
        tracing::warn!("{}", report.summary());
    }

    let app = api::router(Arc::new(ledger));

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
