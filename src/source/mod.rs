//! Comp source: where raw sale listings come from.
//!
//! The live implementation scrapes the comp site's sales markup; tests swap in
//! [`fixture::FixtureSource`] so classification and persistence run without a network.

pub mod client;
#[cfg(test)]
pub mod fixture;
pub mod parser;

use std::future::Future;

use crate::error::Result;
use crate::types::RawListing;

pub use client::CompSourceClient;

/// Anything that can answer "what sold recently for this player".
pub trait ListingSource: Send + Sync {
    /// Issue one query for `player` (optionally pinned to `target_year`) and return
    /// the parsed listings, already de-duplicated by item id.
    fn fetch_listings(
        &self,
        player: &str,
        target_year: Option<i32>,
    ) -> impl Future<Output = Result<Vec<RawListing>>> + Send;
}
