/// Database row types for the `sales` and `players` tables.
/// Used by sqlx for typed queries.

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SaleRow {
    pub id: i64,
    pub player_name: String,
    pub player_key: String,
    pub normalized_url: String,
    pub item_id: String,
    pub title: String,
    pub price: f64,
    /// `YYYY-MM-DD HH:MM:SS`, sortable as text.
    pub sale_date: Option<String>,
    pub sale_type: String,
    pub release_year: Option<i64>,
    pub variant: String,
    pub ingested_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlayerRow {
    pub player_key: String,
    pub display_name: String,
    pub release_year: Option<i64>,
    pub baseline_price: Option<f64>,
    pub avg_price: Option<f64>,
    pub median_price: Option<f64>,
    pub last_sale_price: Option<f64>,
    pub last_sale_date: Option<String>,
    pub sample_size: Option<i64>,
    pub price_delta_pct: Option<f64>,
    pub last_refreshed_at: Option<i64>,
}

/// A sale ready to insert; `normalized_url` is the de-duplication key.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub player_name: String,
    pub player_key: String,
    pub normalized_url: String,
    pub item_id: String,
    pub title: String,
    pub price: f64,
    pub sale_date: Option<String>,
    pub sale_type: String,
    pub release_year: Option<i32>,
    pub variant: String,
}
