use tracing::debug;
use url::Url;

use crate::db::{NewSale, SaleStore};
use crate::error::Result;
use crate::types::{player_key, ClassifiedListing, VariantClass};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PersistOutcome {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Scheme, host and path only. The same listing shows up across calls with
/// different tracking parameters, so the query and fragment are dropped.
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => {
            let s = raw.trim();
            let end = s.find(['?', '#']).unwrap_or(s.len());
            s[..end].to_string()
        }
    }
}

/// Write every listing not already on file (by normalized URL, across all players).
/// Safe to re-run: a second pass over the same listings inserts nothing.
pub async fn persist<S: SaleStore>(
    store: &S,
    player: &str,
    listings: &[ClassifiedListing],
    variant: VariantClass,
    release_year: Option<i32>,
) -> Result<PersistOutcome> {
    let key = player_key(player);
    let mut outcome = PersistOutcome::default();

    for classified in listings {
        let l = &classified.listing;
        let sale = NewSale {
            player_name: player.trim().to_string(),
            player_key: key.clone(),
            normalized_url: normalize_url(&l.url),
            item_id: l.item_id.clone(),
            title: l.title.clone(),
            price: l.price,
            sale_date: l.sold_at.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
            sale_type: l.mechanism.to_string(),
            release_year,
            variant: variant.to_string(),
        };

        if store.insert_if_absent(&sale).await? {
            outcome.inserted += 1;
        } else {
            debug!(url = %sale.normalized_url, "[PERSIST] duplicate sale skipped");
            outcome.duplicates += 1;
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::db::store::memory_store;
    use crate::source::fixture::listing;

    #[test]
    fn query_and_fragment_are_stripped() {
        let a = normalize_url("https://www.ebay.com/itm/123456789?hash=item1&_trkparms=abc");
        let b = normalize_url("https://www.ebay.com/itm/123456789?_trksid=p2047675#desc");
        let c = normalize_url("https://www.ebay.com/itm/123456789");
        assert_eq!(a, "https://www.ebay.com/itm/123456789");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn unparsable_urls_still_lose_their_query() {
        assert_eq!(normalize_url("not a url?x=1"), "not a url");
    }

    #[tokio::test]
    async fn same_listing_with_different_tracking_params_is_one_sale() {
        let store = memory_store().await;
        let mut first = listing("123456789", "2023 Player Y Bowman Chrome Auto", 40.0, 1);
        first.url = "https://www.ebay.com/itm/123456789?hash=aaa".to_string();
        let mut second = first.clone();
        second.item_id = "123456789-b".to_string();
        second.url = "https://www.ebay.com/itm/123456789?hash=bbb&_trkparms=zzz".to_string();

        let batch = vec![classify(first), classify(second)];
        let out = persist(&store, "Player Y", &batch, VariantClass::Base, Some(2023)).await.unwrap();
        assert_eq!(out, PersistOutcome { inserted: 1, duplicates: 1 });
    }

    #[tokio::test]
    async fn rerun_inserts_nothing() {
        let store = memory_store().await;
        let batch: Vec<_> = (1..=3)
            .map(|i| classify(listing(&format!("50000000{i}"), "2023 Player Y Bowman Chrome Auto", 40.0, i)))
            .collect();

        let first = persist(&store, "Player Y", &batch, VariantClass::Base, Some(2023)).await.unwrap();
        assert_eq!(first, PersistOutcome { inserted: 3, duplicates: 0 });
        let second = persist(&store, "Player Y", &batch, VariantClass::Base, Some(2023)).await.unwrap();
        assert_eq!(second, PersistOutcome { inserted: 0, duplicates: 3 });
    }
}
