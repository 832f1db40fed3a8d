use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthState;
use crate::db::{SaleStore, SqliteStore};
use crate::error::AppError;
use crate::refresh::BatchRefresher;
use crate::source::CompSourceClient;
use crate::state::SummaryCache;
use crate::sweep::{sweep, SweepReport};
use crate::types::{player_key, BatchReport, MarketSummary, PipelineResult, PlayerTarget};

const DEFAULT_SALES_LIMIT: usize = 50;
const MAX_SALES_LIMIT: usize = 500;

#[derive(Clone)]
pub struct ApiState {
    pub store: SqliteStore,
    pub refresher: Arc<BatchRefresher<CompSourceClient>>,
    pub cache: Arc<SummaryCache>,
    pub health: Arc<HealthState>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/players", post(upsert_player))
        .route("/players/:name/refresh", post(refresh_player))
        .route("/players/:name/sales", get(get_player_sales))
        .route("/players/:name/summary", get(get_player_summary))
        .route("/refresh", post(refresh_batch))
        .route("/maintenance/sweep", post(run_sweep))
        .route("/health", get(get_health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct UpsertPlayerBody {
    pub name: String,
    pub release_year: Option<i32>,
    pub baseline_price: Option<f64>,
}

#[derive(Deserialize)]
pub struct RefreshQuery {
    pub year: Option<i32>,
}

#[derive(Deserialize, Default)]
pub struct BatchBody {
    /// Players to refresh; every tracked player when absent.
    pub players: Option<Vec<PlayerTarget>>,
    pub budget_secs: Option<u64>,
}

#[derive(Deserialize)]
pub struct SalesQuery {
    pub limit: Option<usize>,
    pub year: Option<i32>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct SaleResponse {
    pub id: i64,
    pub item_id: String,
    pub title: String,
    pub url: String,
    pub price: f64,
    pub sale_date: Option<String>,
    pub sale_type: String,
    pub release_year: Option<i64>,
    pub variant: String,
    pub ingested_at_ns: i64,
}

#[derive(Serialize)]
pub struct PlayerSummaryResponse {
    pub player_key: String,
    pub player: String,
    pub release_year: Option<i64>,
    pub baseline_price: Option<f64>,
    pub price_delta_pct: Option<f64>,
    pub summary: MarketSummary,
    pub source: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub batch_running: bool,
    pub last_batch_at_ns: Option<u64>,
    pub players_refreshed: u64,
    pub players_failed: u64,
    pub players_skipped: u64,
    pub cached_summaries: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn upsert_player(
    State(state): State<ApiState>,
    Json(body): Json<UpsertPlayerBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let key = player_key(&body.name);
    if key.is_empty() {
        return Err(AppError::Config("player name must not be empty".to_string()));
    }
    state
        .store
        .upsert_player(&key, body.name.trim(), body.release_year, body.baseline_price)
        .await?;
    Ok(Json(serde_json::json!({ "player_key": key })))
}

async fn refresh_player(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(params): Query<RefreshQuery>,
) -> Json<PipelineResult> {
    Json(state.refresher.refresh_player(&name, params.year).await)
}

async fn refresh_batch(
    State(state): State<ApiState>,
    body: Option<Json<BatchBody>>,
) -> Result<Json<BatchReport>, AppError> {
    let Json(body) = body.unwrap_or_default();
    let targets = match body.players {
        Some(players) => players,
        None => state.refresher.tracked_targets().await?,
    };
    let budget = body.budget_secs.map(Duration::from_secs);
    Ok(Json(state.refresher.refresh_batch(targets, budget).await))
}

async fn get_player_sales(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(params): Query<SalesQuery>,
) -> Result<Json<Vec<SaleResponse>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_SALES_LIMIT).clamp(1, MAX_SALES_LIMIT);
    let rows = state
        .store
        .recent_by_player(&player_key(&name), params.year, limit)
        .await?;

    let sales = rows
        .into_iter()
        .map(|r| SaleResponse {
            id: r.id,
            item_id: r.item_id,
            title: r.title,
            url: r.normalized_url,
            price: r.price,
            sale_date: r.sale_date,
            sale_type: r.sale_type,
            release_year: r.release_year,
            variant: r.variant,
            ingested_at_ns: r.ingested_at,
        })
        .collect();

    Ok(Json(sales))
}

/// In-memory cache first, then the summary last written to the players table.
async fn get_player_summary(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<PlayerSummaryResponse>, AppError> {
    let key = player_key(&name);
    let row = state.store.get_player(&key).await?;

    if let Some(cached) = state.cache.get(&key) {
        return Ok(Json(PlayerSummaryResponse {
            player_key: key,
            player: cached.display_name,
            release_year: cached.resolved_year.map(i64::from),
            baseline_price: row.and_then(|r| r.baseline_price),
            price_delta_pct: cached.price_delta_pct,
            summary: cached.summary,
            source: "cache",
        }));
    }

    let row = row.ok_or_else(|| AppError::NotFound(format!("player {name}")))?;
    let summary = match (row.avg_price, row.median_price, row.last_sale_price, row.sample_size) {
        (Some(average_price), Some(median_price), Some(last_sale_price), Some(n)) if n > 0 => MarketSummary {
            average_price,
            median_price,
            last_sale_price,
            last_sale_date: row.last_sale_date,
            sample_size: n as usize,
        },
        _ => return Err(AppError::NotFound(format!("no market data for {name}"))),
    };

    Ok(Json(PlayerSummaryResponse {
        player_key: row.player_key,
        player: row.display_name,
        release_year: row.release_year,
        baseline_price: row.baseline_price,
        price_delta_pct: row.price_delta_pct,
        summary,
        source: "store",
    }))
}

async fn run_sweep(State(state): State<ApiState>) -> Result<Json<SweepReport>, AppError> {
    let report = sweep(&state.store).await?;
    for key in &report.affected_players {
        state.refresher.resummarize(key).await?;
    }
    Ok(Json(report))
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let last = state.health.last_batch_at_ns();
    Json(HealthResponse {
        status: "ok",
        batch_running: state.health.batch_running(),
        last_batch_at_ns: (last > 0).then_some(last),
        players_refreshed: state.health.players_refreshed(),
        players_failed: state.health.players_failed(),
        players_skipped: state.health.players_skipped(),
        cached_summaries: state.cache.len(),
    })
}
