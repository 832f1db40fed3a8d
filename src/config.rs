use std::time::Duration;

use crate::error::{AppError, Result};

pub const COMP_SOURCE_URL: &str = "https://back.130point.com/sales/";

/// Product qualifier appended to every player query.
pub const PRODUCT_QUALIFIER: &str = "Bowman Chrome 1st Auto";

/// Only sales reported in this currency are kept; others are dropped at parse time.
pub const REPORTING_CURRENCY: &str = "USD";

/// Inclusive bounds for a title token to count as a release-year candidate.
pub const MIN_RELEASE_YEAR: i32 = 2010;
pub const MAX_RELEASE_YEAR: i32 = 2029;

/// Print run of the one numbered parallel accepted as a fallback variant
/// (the refractor /499). Any other serial-numbered listing is a parallel.
pub const FALLBACK_PRINT_RUN: u32 = 499;

/// Sales considered by the market summary (most recent first).
pub const SUMMARY_WINDOW: usize = 5;

/// Fetch timeout bounds (seconds). Values outside are clamped.
pub const FETCH_TIMEOUT_MIN_SECS: u64 = 10;
pub const FETCH_TIMEOUT_MAX_SECS: u64 = 30;

/// Pause between players during a batch refresh (milliseconds).
pub const BATCH_DELAY_MS: u64 = 1500;

/// Scheduled batch refresh interval (seconds).
pub const REFRESH_INTERVAL_SECS: u64 = 6 * 3600;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Comp source endpoint (COMP_SOURCE_URL)
    pub comp_source_url: String,
    /// Expected currency of reported sales (COMP_CURRENCY)
    pub currency: String,
    /// Terms added after the player name in every query (PRODUCT_QUALIFIER)
    pub product_qualifier: String,
    /// Upper bound on a single comp source call (FETCH_TIMEOUT_SECS, clamped 10–30)
    pub fetch_timeout: Duration,
    /// Number of recent sales the summary is computed over (SUMMARY_WINDOW)
    pub summary_window: usize,
    /// Fixed delay between players in a batch (BATCH_DELAY_MS)
    pub batch_delay: Duration,
    /// Wall-clock budget for a scheduled batch (BATCH_BUDGET_SECS). None = unbounded.
    pub batch_budget: Option<Duration>,
    /// How often the scheduled batch runs (REFRESH_INTERVAL_SECS)
    pub refresh_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let fetch_timeout_secs = std::env::var("FETCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "20".to_string())
            .parse::<u64>()
            .unwrap_or(20)
            .clamp(FETCH_TIMEOUT_MIN_SECS, FETCH_TIMEOUT_MAX_SECS);

        let batch_budget = match std::env::var("BATCH_BUDGET_SECS") {
            Ok(v) if !v.trim().is_empty() => Some(Duration::from_secs(
                v.trim().parse::<u64>().map_err(|_| {
                    AppError::Config("BATCH_BUDGET_SECS must be a whole number of seconds".to_string())
                })?,
            )),
            _ => None,
        };

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "tracker.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            comp_source_url: std::env::var("COMP_SOURCE_URL")
                .unwrap_or_else(|_| COMP_SOURCE_URL.to_string()),
            currency: std::env::var("COMP_CURRENCY")
                .unwrap_or_else(|_| REPORTING_CURRENCY.to_string())
                .to_uppercase(),
            product_qualifier: std::env::var("PRODUCT_QUALIFIER")
                .unwrap_or_else(|_| PRODUCT_QUALIFIER.to_string()),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            summary_window: std::env::var("SUMMARY_WINDOW")
                .unwrap_or_else(|_| SUMMARY_WINDOW.to_string())
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .unwrap_or(SUMMARY_WINDOW),
            batch_delay: Duration::from_millis(
                std::env::var("BATCH_DELAY_MS")
                    .unwrap_or_else(|_| BATCH_DELAY_MS.to_string())
                    .parse::<u64>()
                    .unwrap_or(BATCH_DELAY_MS),
            ),
            batch_budget,
            refresh_interval: Duration::from_secs(
                std::env::var("REFRESH_INTERVAL_SECS")
                    .unwrap_or_else(|_| REFRESH_INTERVAL_SECS.to_string())
                    .parse::<u64>()
                    .unwrap_or(REFRESH_INTERVAL_SECS)
                    .max(60),
            ),
        })
    }
}
