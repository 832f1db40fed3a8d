use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::classify::rules::verdict_for;
use crate::classify::title_names_player;
use crate::db::SqliteStore;
use crate::error::Result;
use crate::types::Verdict;

const NAME_MISMATCH: &str = "name mismatch";

#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub removed_by_reason: BTreeMap<String, usize>,
    /// Keys of players that lost at least one sale; their cached summaries are stale.
    pub affected_players: BTreeSet<String>,
}

/// Re-check every stored sale against the current classifier and name guard and
/// delete the rows that would no longer be admitted. Run after tightening the rules.
pub async fn sweep(store: &SqliteStore) -> Result<SweepReport> {
    let mut report = SweepReport::default();

    for row in store.all_sales().await? {
        report.scanned += 1;

        let reason = if !title_names_player(&row.title, &row.player_name) {
            Some(NAME_MISMATCH.to_string())
        } else {
            match verdict_for(&row.title) {
                Verdict::Excluded(r) => Some(r.to_string()),
                Verdict::Base | Verdict::Fallback => None,
            }
        };

        let Some(reason) = reason else { continue };
        if store.delete_sale(row.id).await? {
            debug!(id = row.id, reason = %reason, title = %row.title, "[SWEEP] removed");
            report.removed += 1;
            *report.removed_by_reason.entry(reason).or_insert(0) += 1;
            report.affected_players.insert(row.player_key);
        }
    }

    info!(
        scanned = report.scanned,
        removed = report.removed,
        "[SWEEP] {} of {} stored sales removed",
        report.removed,
        report.scanned,
    );
    Ok(report)
}
