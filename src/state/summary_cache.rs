use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::types::MarketSummary;

/// Latest summary per player, as handed back by the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct CachedSummary {
    pub display_name: String,
    pub resolved_year: Option<i32>,
    pub summary: MarketSummary,
    pub price_delta_pct: Option<f64>,
    /// Nanosecond UTC epoch of the refresh that produced this entry.
    pub refreshed_at_ns: u64,
}

/// In-memory read cache for the HTTP layer. The `players` table holds the durable copy.
pub struct SummaryCache {
    /// player_key → latest summary
    entries: DashMap<String, CachedSummary>,
}

impl SummaryCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { entries: DashMap::new() })
    }

    pub fn insert(&self, player_key: &str, entry: CachedSummary) {
        self.entries.insert(player_key.to_string(), entry);
    }

    pub fn get(&self, player_key: &str) -> Option<CachedSummary> {
        self.entries.get(player_key).map(|e| e.clone())
    }

    pub fn remove(&self, player_key: &str) {
        self.entries.remove(player_key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SummaryCache {
    fn default() -> Self {
        Self { entries: DashMap::new() }
    }
}
