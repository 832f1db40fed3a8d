//! Scrape-and-store for one player:
//! fetch → classify → name filter → resolve year → select variant set → persist → summarize.
//!
//! The run never returns an error. Every terminal state, success or failure, is a
//! [`PipelineResult`] carrying the counts gathered so far.

use std::time::Instant;

use tracing::{info, warn};

use crate::classify::{classify, resolve_year, title_names_player};
use crate::db::SaleStore;
use crate::error::AppError;
use crate::persist::persist;
use crate::source::ListingSource;
use crate::summary::summarize;
use crate::types::{
    player_key, ClassifiedListing, ErrorCode, PipelineError, PipelineResult, VariantClass,
};

pub struct ScrapePipeline<S, D> {
    source: S,
    store: D,
    summary_window: usize,
}

impl<S: ListingSource, D: SaleStore> ScrapePipeline<S, D> {
    pub fn new(source: S, store: D, summary_window: usize) -> Self {
        Self { source, store, summary_window: summary_window.max(1) }
    }

    #[cfg(test)]
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    pub fn summary_window(&self) -> usize {
        self.summary_window
    }

    pub async fn run(&self, player: &str, target_year: Option<i32>) -> PipelineResult {
        let started = Instant::now();
        let key = player_key(player);
        let mut result = PipelineResult {
            player: player.trim().to_string(),
            ..PipelineResult::default()
        };

        // FETCH
        let raw = match self.source.fetch_listings(player, target_year).await {
            Ok(listings) => listings,
            Err(e) => {
                warn!(player = %player, "[FETCH] {player}: {e}");
                return fail(result, started, ErrorCode::ScrapeError, e.to_string());
            }
        };
        result.total_fetched = raw.len();
        if raw.is_empty() {
            return fail(result, started, ErrorCode::NoResults, "comp source returned no listings".to_string());
        }

        // CLASSIFY_ALL, then drop listings that do not name the player before counting.
        let classified: Vec<ClassifiedListing> = raw.into_iter().map(classify).collect();
        let before = classified.len();
        let classified: Vec<ClassifiedListing> = classified
            .into_iter()
            .filter(|c| title_names_player(&c.listing.title, player))
            .collect();
        result.name_mismatched = before - classified.len();

        for c in &classified {
            match c.exclusion_reason() {
                Some(reason) => {
                    result.excluded_count += 1;
                    *result.excluded_by_reason.entry(reason.to_string()).or_insert(0) += 1;
                }
                None if c.is_base() => result.base_count += 1,
                None => result.fallback_count += 1,
            }
        }

        info!(
            player = %player,
            fetched = result.total_fetched,
            name_mismatched = result.name_mismatched,
            base = result.base_count,
            fallback = result.fallback_count,
            excluded = result.excluded_count,
            "[CLASSIFY] {player}: base={} fallback={} excluded={} mismatched={}",
            result.base_count,
            result.fallback_count,
            result.excluded_count,
            result.name_mismatched,
        );

        // INFER_OR_USE_YEAR
        let (year, year_source) = resolve_year(target_year, &classified);
        result.resolved_year = year;
        result.year_source = Some(year_source);

        // SELECT_VARIANT_SET
        let Some((variant, selected)) = select_variant_set(&classified, year) else {
            let msg = match year {
                Some(y) => format!("no admissible listings for release year {y}"),
                None => "no admissible listings".to_string(),
            };
            return fail(result, started, ErrorCode::NoValidSales, msg);
        };
        result.variant_class = Some(variant);

        // PERSIST
        match persist(&self.store, player, &selected, variant, year).await {
            Ok(outcome) => {
                result.inserted = outcome.inserted;
                result.duplicates = outcome.duplicates;
            }
            Err(e) => return fail_store(result, started, e),
        }

        // SUMMARIZE
        match summarize(&self.store, &key, year, self.summary_window).await {
            Ok(summary) => result.summary = summary,
            Err(e) => return fail_store(result, started, e),
        }
        match self.store.count_by_player(&key, year).await {
            Ok(n) => result.total_on_file = n,
            Err(e) => return fail_store(result, started, e),
        }

        result.success = true;
        result.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            player = %player,
            year = ?year,
            variant = %variant,
            inserted = result.inserted,
            duplicates = result.duplicates,
            on_file = result.total_on_file,
            "[PERSIST] {player}: +{} new, {} duplicate, {} on file",
            result.inserted,
            result.duplicates,
            result.total_on_file,
        );
        result
    }
}

/// Prefer base listings from the resolved year, then fallback listings from that
/// year. With no resolved year, any base listing, then any fallback listing.
pub fn select_variant_set(
    listings: &[ClassifiedListing],
    year: Option<i32>,
) -> Option<(VariantClass, Vec<ClassifiedListing>)> {
    [VariantClass::Base, VariantClass::Fallback]
        .into_iter()
        .map(|class| {
            let picked: Vec<ClassifiedListing> = listings
                .iter()
                .filter(|l| match class {
                    VariantClass::Base => l.is_base(),
                    VariantClass::Fallback => l.is_fallback(),
                })
                .filter(|l| year.map_or(true, |y| l.year() == Some(y)))
                .cloned()
                .collect();
            (class, picked)
        })
        .find(|(_, picked)| !picked.is_empty())
}

fn fail(mut result: PipelineResult, started: Instant, code: ErrorCode, message: String) -> PipelineResult {
    warn!(player = %result.player, code = %code, "[PIPELINE] {}: {code} ({message})", result.player);
    result.success = false;
    result.elapsed_ms = started.elapsed().as_millis() as u64;
    result.error = Some(PipelineError { code, message });
    result
}

fn fail_store(result: PipelineResult, started: Instant, e: AppError) -> PipelineResult {
    let code = if e.is_source_failure() {
        ErrorCode::ScrapeError
    } else {
        ErrorCode::StoreError
    };
    fail(result, started, code, e.to_string())
}
