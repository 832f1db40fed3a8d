use crate::db::{SaleRow, SaleStore};
use crate::error::Result;
use crate::types::MarketSummary;

/// Summary over the `limit` most recent sales for a player, optionally pinned to
/// a release year. `None` means no market data yet, which is not a zero price.
pub async fn summarize<S: SaleStore>(
    store: &S,
    player_key: &str,
    resolved_year: Option<i32>,
    limit: usize,
) -> Result<Option<MarketSummary>> {
    let rows = store.recent_by_player(player_key, resolved_year, limit).await?;
    Ok(compute_summary(&rows))
}

/// `rows` must be ordered newest first.
pub fn compute_summary(rows: &[SaleRow]) -> Option<MarketSummary> {
    let last = rows.first()?;
    let prices: Vec<f64> = rows.iter().map(|r| r.price).collect();

    Some(MarketSummary {
        average_price: round2(mean(&prices)),
        median_price: round2(median(&prices)),
        last_sale_price: last.price,
        last_sale_date: last.sale_date.clone(),
        sample_size: rows.len(),
    })
}

/// Percentage change of the market average against the article baseline.
pub fn price_delta_pct(average: f64, baseline: Option<f64>) -> Option<f64> {
    let baseline = baseline.filter(|b| *b > 0.0)?;
    Some(round2((average - baseline) / baseline * 100.0))
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
