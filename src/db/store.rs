use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::db::models::{NewSale, PlayerRow, SaleRow};
use crate::error::Result;
use crate::types::MarketSummary;

/// Row operations the ingestion pipeline needs from durable storage.
///
/// Uniqueness of `normalized_url` is enforced by the store itself, so concurrent
/// runs racing on the same listing resolve to one row.
pub trait SaleStore: Send + Sync {
    /// Insert unless a sale with the same normalized URL exists. Returns whether a row was written.
    fn insert_if_absent(&self, sale: &NewSale) -> impl Future<Output = Result<bool>> + Send;

    /// Most recent sales for a player (newest first), optionally pinned to a release year.
    fn recent_by_player(
        &self,
        player_key: &str,
        year: Option<i32>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<SaleRow>>> + Send;

    fn count_by_player(
        &self,
        player_key: &str,
        year: Option<i32>,
    ) -> impl Future<Output = Result<i64>> + Send;
}

/// Source of release years already known from baseline data.
pub trait BaselineProvider: Send + Sync {
    fn known_year(&self, player_key: &str) -> impl Future<Output = Result<Option<i32>>> + Send;
}

/// SQLite-backed store. Constructed once at startup and cloned into every consumer;
/// the underlying pool is closed explicitly on shutdown.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database file and apply migrations.
    pub async fn open(path: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(opts).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database ready at {path}");
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // -- players ------------------------------------------------------------

    /// Register a tracked player or update its baseline data.
    pub async fn upsert_player(
        &self,
        player_key: &str,
        display_name: &str,
        release_year: Option<i32>,
        baseline_price: Option<f64>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO players (player_key, display_name, release_year, baseline_price)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(player_key) DO UPDATE SET
                display_name = excluded.display_name,
                release_year = COALESCE(excluded.release_year, players.release_year),
                baseline_price = COALESCE(excluded.baseline_price, players.baseline_price)
            "#,
        )
        .bind(player_key)
        .bind(display_name)
        .bind(release_year.map(i64::from))
        .bind(baseline_price)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_player(&self, player_key: &str) -> Result<Option<PlayerRow>> {
        let row = sqlx::query_as::<_, PlayerRow>("SELECT * FROM players WHERE player_key = ?")
            .bind(player_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_players(&self) -> Result<Vec<PlayerRow>> {
        let rows = sqlx::query_as::<_, PlayerRow>("SELECT * FROM players ORDER BY display_name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Cache the latest summary on the player row. Creates the row if the player
    /// was refreshed ad hoc without being registered.
    pub async fn save_summary(
        &self,
        player_key: &str,
        display_name: &str,
        summary: &MarketSummary,
        price_delta_pct: Option<f64>,
    ) -> Result<()> {
        let sample_size = summary.sample_size as i64;
        sqlx::query(
            r#"
            INSERT INTO players (
                player_key, display_name, avg_price, median_price,
                last_sale_price, last_sale_date, sample_size, price_delta_pct, last_refreshed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(player_key) DO UPDATE SET
                avg_price = excluded.avg_price,
                median_price = excluded.median_price,
                last_sale_price = excluded.last_sale_price,
                last_sale_date = excluded.last_sale_date,
                sample_size = excluded.sample_size,
                price_delta_pct = excluded.price_delta_pct,
                last_refreshed_at = excluded.last_refreshed_at
            "#,
        )
        .bind(player_key)
        .bind(display_name)
        .bind(summary.average_price)
        .bind(summary.median_price)
        .bind(summary.last_sale_price)
        .bind(summary.last_sale_date.as_deref())
        .bind(sample_size)
        .bind(price_delta_pct)
        .bind(now_ns() as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drop the cached summary for a player left with no qualifying sales.
    pub async fn clear_summary(&self, player_key: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE players SET
                avg_price = NULL,
                median_price = NULL,
                last_sale_price = NULL,
                last_sale_date = NULL,
                sample_size = NULL,
                price_delta_pct = NULL,
                last_refreshed_at = ?
            WHERE player_key = ?
            "#,
        )
        .bind(now_ns() as i64)
        .bind(player_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -- sales maintenance --------------------------------------------------

    pub async fn all_sales(&self) -> Result<Vec<SaleRow>> {
        let rows = sqlx::query_as::<_, SaleRow>("SELECT * FROM sales ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn delete_sale(&self, id: i64) -> Result<bool> {
        let done = sqlx::query("DELETE FROM sales WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

impl SaleStore for SqliteStore {
    async fn insert_if_absent(&self, sale: &NewSale) -> Result<bool> {
        let done = sqlx::query(
            r#"
            INSERT OR IGNORE INTO sales (
                player_name, player_key, normalized_url, item_id, title, price,
                sale_date, sale_type, release_year, variant, ingested_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&sale.player_name)
        .bind(&sale.player_key)
        .bind(&sale.normalized_url)
        .bind(&sale.item_id)
        .bind(&sale.title)
        .bind(sale.price)
        .bind(sale.sale_date.as_deref())
        .bind(&sale.sale_type)
        .bind(sale.release_year.map(i64::from))
        .bind(&sale.variant)
        .bind(now_ns() as i64)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn recent_by_player(
        &self,
        player_key: &str,
        year: Option<i32>,
        limit: usize,
    ) -> Result<Vec<SaleRow>> {
        let year = year.map(i64::from);
        let rows = sqlx::query_as::<_, SaleRow>(
            r#"
            SELECT * FROM sales
            WHERE player_key = ? AND (? IS NULL OR release_year = ?)
            ORDER BY sale_date DESC NULLS LAST, id DESC
            LIMIT ?
            "#,
        )
        .bind(player_key)
        .bind(year)
        .bind(year)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_by_player(&self, player_key: &str, year: Option<i32>) -> Result<i64> {
        let year = year.map(i64::from);
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sales WHERE player_key = ? AND (? IS NULL OR release_year = ?)",
        )
        .bind(player_key)
        .bind(year)
        .bind(year)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

impl BaselineProvider for SqliteStore {
    async fn known_year(&self, player_key: &str) -> Result<Option<i32>> {
        let year: Option<i64> =
            sqlx::query_scalar::<_, Option<i64>>("SELECT release_year FROM players WHERE player_key = ?")
                .bind(player_key)
                .fetch_optional(&self.pool)
                .await?
                .flatten();
        Ok(year.and_then(|y| i32::try_from(y).ok()))
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
pub async fn memory_store() -> SqliteStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrations apply");
    SqliteStore::new(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(url: &str, player: &str, price: f64, date: &str, year: Option<i32>) -> NewSale {
        NewSale {
            player_name: player.to_string(),
            player_key: crate::types::player_key(player),
            normalized_url: url.to_string(),
            item_id: url.rsplit('/').next().unwrap_or_default().to_string(),
            title: format!("{player} Bowman Chrome Auto"),
            price,
            sale_date: Some(date.to_string()),
            sale_type: "auction".to_string(),
            release_year: year,
            variant: "base".to_string(),
        }
    }

    #[tokio::test]
    async fn url_is_unique_across_players() {
        let store = memory_store().await;
        let a = sale("https://www.ebay.com/itm/1", "Jackson Holliday", 40.0, "2024-05-01 10:00:00", Some(2022));
        let mut b = a.clone();
        b.player_name = "Jackson Merrill".to_string();
        b.player_key = "jackson merrill".to_string();

        assert!(store.insert_if_absent(&a).await.unwrap());
        assert!(!store.insert_if_absent(&b).await.unwrap());
        assert!(!store.insert_if_absent(&a).await.unwrap());
        assert_eq!(store.count_by_player("jackson holliday", None).await.unwrap(), 1);
        assert_eq!(store.count_by_player("jackson merrill", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn recent_orders_newest_first_and_filters_year() {
        let store = memory_store().await;
        let p = "Jackson Holliday";
        for (i, (date, year)) in [
            ("2024-05-01 10:00:00", Some(2022)),
            ("2024-05-03 10:00:00", Some(2022)),
            ("2024-05-02 10:00:00", Some(2023)),
        ]
        .into_iter()
        .enumerate()
        {
            let s = sale(&format!("https://www.ebay.com/itm/{i}"), p, 10.0 * (i as f64 + 1.0), date, year);
            store.insert_if_absent(&s).await.unwrap();
        }

        let all = store.recent_by_player("jackson holliday", None, 5).await.unwrap();
        let dates: Vec<_> = all.iter().map(|r| r.sale_date.clone().unwrap()).collect();
        assert_eq!(dates, vec!["2024-05-03 10:00:00", "2024-05-02 10:00:00", "2024-05-01 10:00:00"]);

        let y2022 = store.recent_by_player("jackson holliday", Some(2022), 5).await.unwrap();
        assert_eq!(y2022.len(), 2);
        assert_eq!(store.count_by_player("jackson holliday", Some(2023)).await.unwrap(), 1);

        let limited = store.recent_by_player("jackson holliday", None, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].sale_date.as_deref(), Some("2024-05-03 10:00:00"));
    }

    #[tokio::test]
    async fn baseline_year_lookup() {
        let store = memory_store().await;
        assert_eq!(store.known_year("jackson holliday").await.unwrap(), None);
        store.upsert_player("jackson holliday", "Jackson Holliday", Some(2022), Some(120.0)).await.unwrap();
        assert_eq!(store.known_year("jackson holliday").await.unwrap(), Some(2022));

        // A later upsert without a year keeps the known one.
        store.upsert_player("jackson holliday", "Jackson Holliday", None, None).await.unwrap();
        let row = store.get_player("jackson holliday").await.unwrap().unwrap();
        assert_eq!(row.release_year, Some(2022));
        assert_eq!(row.baseline_price, Some(120.0));
    }

    #[tokio::test]
    async fn save_summary_creates_or_updates_player() {
        let store = memory_store().await;
        let summary = MarketSummary {
            average_price: 45.0,
            median_price: 45.0,
            last_sale_price: 50.0,
            last_sale_date: Some("2024-05-03 10:00:00".to_string()),
            sample_size: 3,
        };
        store.save_summary("player y", "Player Y", &summary, None).await.unwrap();
        let row = store.get_player("player y").await.unwrap().unwrap();
        assert_eq!(row.avg_price, Some(45.0));
        assert_eq!(row.sample_size, Some(3));
        assert!(row.last_refreshed_at.is_some());
    }
}
