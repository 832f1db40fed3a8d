use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::source::parser::extract_year;
use crate::source::ListingSource;
use crate::types::{RawListing, SaleMechanism};

/// In-process listing source returning a fixed, replaceable response.
#[derive(Default)]
pub struct FixtureSource {
    listings: Mutex<Vec<RawListing>>,
    fail_with: Mutex<Option<String>>,
    calls: AtomicUsize,
    latency: Duration,
}

impl FixtureSource {
    pub fn new(listings: Vec<RawListing>) -> Self {
        Self {
            listings: Mutex::new(listings),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Mutex::new(Some(message.to_string())),
            ..Self::default()
        }
    }

    /// Every fetch takes at least `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_listings(&self, listings: Vec<RawListing>) {
        *self.listings.lock().unwrap() = listings;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl ListingSource for FixtureSource {
    async fn fetch_listings(&self, _player: &str, _target_year: Option<i32>) -> Result<Vec<RawListing>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(msg) = self.fail_with.lock().unwrap().clone() {
            return Err(AppError::SourceUnavailable(msg));
        }
        Ok(self.listings.lock().unwrap().clone())
    }
}

/// Build a listing the way the parser would; `day` orders sales (higher = newer).
pub fn listing(item_id: &str, title: &str, price: f64, day: u32) -> RawListing {
    RawListing {
        title: title.to_string(),
        item_id: item_id.to_string(),
        url: format!("https://www.ebay.com/itm/{item_id}?hash=item{item_id}"),
        price,
        sold_at: NaiveDate::from_ymd_opt(2024, 5, day).and_then(|d| d.and_hms_opt(12, 0, 0)),
        mechanism: SaleMechanism::Auction,
        year: extract_year(title),
    }
}
