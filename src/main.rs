mod api;
mod classify;
mod config;
mod db;
mod error;
mod persist;
mod pipeline;
mod refresh;
mod source;
mod state;
mod summary;
mod sweep;
mod types;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::db::SqliteStore;
use crate::error::Result;
use crate::pipeline::ScrapePipeline;
use crate::refresh::{BatchRefresher, RefreshSettings};
use crate::source::CompSourceClient;
use crate::state::SummaryCache;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let store = SqliteStore::open(&cfg.db_path).await?;
    let tracked = store.list_players().await?.len();

    // --- Comp source + pipeline ---
    let client = CompSourceClient::new(&cfg)?;
    let pipeline = ScrapePipeline::new(client, store.clone(), cfg.summary_window);
    info!(
        source = %cfg.comp_source_url,
        qualifier = %cfg.product_qualifier,
        currency = %cfg.currency,
        timeout_secs = cfg.fetch_timeout.as_secs(),
        "Comp source configured",
    );

    // --- Shared state ---
    let cache = SummaryCache::new();
    let health = Arc::new(HealthState::new());

    // Batch refresher (background, every REFRESH_INTERVAL_SECS)
    let refresher = Arc::new(BatchRefresher::new(
        pipeline,
        Arc::clone(&cache),
        Arc::clone(&health),
        RefreshSettings {
            delay: cfg.batch_delay,
            budget: cfg.batch_budget,
            interval: cfg.refresh_interval,
        },
    ));
    info!(
        "Batch refresh every {}s over {} tracked players (delay={}ms, budget={})",
        cfg.refresh_interval.as_secs(),
        tracked,
        cfg.batch_delay.as_millis(),
        cfg.batch_budget
            .map(|b| format!("{}s", b.as_secs()))
            .unwrap_or_else(|| "none".to_string()),
    );
    tokio::spawn(Arc::clone(&refresher).run());

    // HTTP API server
    let api_state = ApiState {
        store: store.clone(),
        refresher,
        cache,
        health,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
