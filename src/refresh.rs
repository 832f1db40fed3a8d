use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::time::interval;
use tracing::{error, info, warn};

use crate::api::health::HealthState;
use crate::db::{BaselineProvider, SqliteStore};
use crate::error::Result;
use crate::pipeline::ScrapePipeline;
use crate::source::ListingSource;
use crate::state::{CachedSummary, SummaryCache};
use crate::summary::{price_delta_pct, summarize};
use crate::types::{player_key, BatchReport, MarketSummary, PipelineResult, PlayerTarget};

#[derive(Debug, Clone, Copy)]
pub struct RefreshSettings {
    /// Pause between consecutive players in a batch.
    pub delay: Duration,
    /// Default wall-clock budget for scheduled batches.
    pub budget: Option<Duration>,
    /// Scheduled batch interval.
    pub interval: Duration,
}

/// Runs the pipeline for one player or many, and caches each resulting summary.
///
/// Batches are strictly sequential with a fixed delay between players so the comp
/// source never sees parallel traffic from us. A budget stops new players from
/// starting; the player in flight always finishes.
pub struct BatchRefresher<S> {
    pipeline: ScrapePipeline<S, SqliteStore>,
    cache: Arc<SummaryCache>,
    health: Arc<HealthState>,
    settings: RefreshSettings,
}

impl<S: ListingSource> BatchRefresher<S> {
    pub fn new(
        pipeline: ScrapePipeline<S, SqliteStore>,
        cache: Arc<SummaryCache>,
        health: Arc<HealthState>,
        settings: RefreshSettings,
    ) -> Self {
        Self { pipeline, cache, health, settings }
    }

    fn store(&self) -> &SqliteStore {
        self.pipeline.store()
    }

    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.settings.interval);
        ticker.tick().await; // skip immediate first tick

        loop {
            ticker.tick().await;
            match self.tracked_targets().await {
                Ok(targets) => {
                    let report = self.refresh_batch(targets, self.settings.budget).await;
                    info!(
                        refreshed = report.refreshed,
                        failed = report.failed,
                        skipped = report.skipped,
                        elapsed_ms = report.elapsed_ms,
                        "[BATCH] scheduled refresh complete",
                    );
                }
                Err(e) => error!("[BATCH] could not load tracked players: {e}"),
            }
        }
    }

    /// Every registered player, with its baseline release year when known.
    pub async fn tracked_targets(&self) -> Result<Vec<PlayerTarget>> {
        let players = self.store().list_players().await?;
        Ok(players
            .into_iter()
            .map(|p| PlayerTarget {
                name: p.display_name,
                known_year: p.release_year.and_then(|y| i32::try_from(y).ok()),
            })
            .collect())
    }

    /// Refresh a single player. An explicit year wins; otherwise the baseline year
    /// on file (if any) pins the query.
    pub async fn refresh_player(&self, name: &str, year: Option<i32>) -> PipelineResult {
        let key = player_key(name);
        let year = match year {
            Some(y) => Some(y),
            None => self.store().known_year(&key).await.unwrap_or_else(|e| {
                warn!(player = %name, "baseline year lookup failed: {e}");
                None
            }),
        };

        let result = self.pipeline.run(name, year).await;
        self.health.record_player(result.success);

        if let Some(summary) = result.summary.clone() {
            self.cache_summary(&key, &result, summary).await;
        }
        result
    }

    async fn cache_summary(&self, key: &str, result: &PipelineResult, summary: MarketSummary) {
        let baseline = match self.store().get_player(key).await {
            Ok(row) => row.and_then(|r| r.baseline_price),
            Err(e) => {
                warn!(player = %result.player, "baseline price lookup failed: {e}");
                None
            }
        };
        let delta = price_delta_pct(summary.average_price, baseline);

        if let Err(e) = self.store().save_summary(key, &result.player, &summary, delta).await {
            warn!(player = %result.player, "summary write failed: {e}");
        }
        self.cache.insert(
            key,
            CachedSummary {
                display_name: result.player.clone(),
                resolved_year: result.resolved_year,
                summary,
                price_delta_pct: delta,
                refreshed_at_ns: now_ns(),
            },
        );
    }

    /// Recompute a player's stored and cached summary from the sales already on file,
    /// without querying the comp source. Used after maintenance deletes sales.
    pub async fn resummarize(&self, key: &str) -> Result<Option<MarketSummary>> {
        let Some(row) = self.store().get_player(key).await? else {
            self.cache.remove(key);
            return Ok(None);
        };
        let year = match self.cache.get(key) {
            Some(cached) => cached.resolved_year,
            None => row.release_year.and_then(|y| i32::try_from(y).ok()),
        };

        let summary = summarize(self.store(), key, year, self.pipeline.summary_window()).await?;
        match &summary {
            Some(s) => {
                let delta = price_delta_pct(s.average_price, row.baseline_price);
                self.store().save_summary(key, &row.display_name, s, delta).await?;
                self.cache.insert(
                    key,
                    CachedSummary {
                        display_name: row.display_name,
                        resolved_year: year,
                        summary: s.clone(),
                        price_delta_pct: delta,
                        refreshed_at_ns: now_ns(),
                    },
                );
            }
            None => {
                self.store().clear_summary(key).await?;
                self.cache.remove(key);
            }
        }
        info!(player_key = %key, sample = summary.as_ref().map_or(0, |s| s.sample_size), "[SWEEP] summary recomputed");
        Ok(summary)
    }

    /// Refresh `targets` one after another. Players not started before `budget`
    /// runs out are reported as skipped; a failing player never stops the batch.
    pub async fn refresh_batch(&self, targets: Vec<PlayerTarget>, budget: Option<Duration>) -> BatchReport {
        let started = Instant::now();
        let mut report = BatchReport::default();
        self.health.set_batch_running(true);

        info!(players = targets.len(), budget_secs = ?budget.map(|b| b.as_secs()), "[BATCH] starting");

        for (i, target) in targets.iter().enumerate() {
            // Budget is checked on both sides of the pause.
            let mut spent = budget_spent(started, budget);
            if !spent && i > 0 && !self.settings.delay.is_zero() {
                tokio::time::sleep(self.settings.delay).await;
                spent = budget_spent(started, budget);
            }
            if spent {
                report.skipped_players = targets[i..].iter().map(|t| t.name.clone()).collect();
                report.skipped = report.skipped_players.len();
                warn!(
                    skipped = report.skipped,
                    "[BATCH] budget exhausted after {} players, skipping the rest",
                    i,
                );
                break;
            }

            let result = self.refresh_player(&target.name, target.known_year).await;
            if result.success {
                report.refreshed += 1;
            } else {
                report.failed += 1;
            }
            report.results.push(result);
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        self.health.add_skipped(report.skipped as u64);
        self.health.set_last_batch_at_ns(now_ns());
        self.health.set_batch_running(false);

        info!(
            refreshed = report.refreshed,
            failed = report.failed,
            skipped = report.skipped,
            "[BATCH] done: {} refreshed, {} failed, {} skipped in {}ms",
            report.refreshed,
            report.failed,
            report.skipped,
            report.elapsed_ms,
        );
        report
    }
}

fn budget_spent(started: Instant, budget: Option<Duration>) -> bool {
    budget.is_some_and(|b| started.elapsed() >= b)
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
