use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, Level};

use squadboard::config::Config;
use squadboard::dispatch::Dispatcher;
use squadboard::gateway::RestGateway;
use squadboard::ingest::{self, IngestState};
use squadboard::ratings::SqliteRatingStore;

/// How long a rater has to send a comment after the last score.
const COMMENT_WAIT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting squadboard");

    let config =
        Config::from_env().expect("Failed to load configuration from environment variables");

    let ratings = Arc::new(SqliteRatingStore::new(config.database_path())?);
    info!("Rating store ready at {}", config.database_path().display());

    let gateway = Arc::new(RestGateway::new(
        config.gateway_api_base.clone(),
        config.gateway_token.clone(),
    ));

    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(gateway, ratings, inbound_tx.clone(), COMMENT_WAIT);

    // All events, including fired comment timers, are handled by this one
    // worker, so sessions never race.
    tokio::spawn(async move {
        while let Some(inbound) = inbound_rx.recv().await {
            dispatcher.handle(inbound).await;
        }
    });

    let app = ingest::router(Arc::new(IngestState {
        signing_secret: config.gateway_signing_secret.clone(),
        inbound_tx,
    }));

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
