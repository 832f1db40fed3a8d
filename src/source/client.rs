use std::time::Duration;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::source::parser::parse_listings;
use crate::source::ListingSource;
use crate::types::RawListing;

/// HTTP client for the sales-comp site. One POST per query, no internal retry.
#[derive(Clone)]
pub struct CompSourceClient {
    http: reqwest::Client,
    base_url: String,
    currency: String,
    product_qualifier: String,
}

impl CompSourceClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        Self::with_settings(
            &cfg.comp_source_url,
            &cfg.currency,
            &cfg.product_qualifier,
            cfg.fetch_timeout,
        )
    }

    pub fn with_settings(
        base_url: &str,
        currency: &str,
        product_qualifier: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("comp-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
            currency: currency.to_uppercase(),
            product_qualifier: product_qualifier.to_string(),
        })
    }
}

/// `"<year> <player> <qualifier>"`, with the year omitted when unknown.
pub fn build_query(player: &str, qualifier: &str, target_year: Option<i32>) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(3);
    if let Some(year) = target_year {
        parts.push(year.to_string());
    }
    parts.push(player.trim().to_string());
    if !qualifier.trim().is_empty() {
        parts.push(qualifier.trim().to_string());
    }
    parts.join(" ")
}

impl ListingSource for CompSourceClient {
    async fn fetch_listings(&self, player: &str, target_year: Option<i32>) -> Result<Vec<RawListing>> {
        let query = build_query(player, &self.product_qualifier, target_year);
        debug!(query = %query, "[FETCH] querying comp source");

        let resp = self
            .http
            .post(&self.base_url)
            .form(&[("query", query.as_str()), ("sort", "date_desc")])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::SourceUnavailable(format!("timed out querying '{query}'"))
                } else {
                    AppError::Http(e)
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::SourceUnavailable(format!(
                "status {status} for query '{query}'"
            )));
        }

        let body = resp.text().await?;
        let (listings, stats) = parse_listings(&body, &self.base_url, &self.currency);

        info!(
            player = %player,
            rows = stats.rows_seen,
            kept = stats.kept,
            no_price = stats.rejected_no_price,
            no_item_id = stats.rejected_no_item_id,
            no_url = stats.rejected_no_url,
            currency = stats.rejected_currency,
            repeated = stats.repeated,
            "[FETCH] {player}: {} listings kept from {} rows",
            stats.kept,
            stats.rows_seen,
        );

        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SALES_PAGE: &str = r#"<html><body><table><tbody>
        <tr id="dRow" data-price="45.00" data-currency="USD" data-itemid="2351234567">
          <td><a id="titleText" href="https://www.ebay.com/itm/2351234567?hash=a">2022 Bowman Chrome Jackson Holliday 1st Auto</a></td>
          <td><span id="dateText">Date: Sat 14 Oct 2023 18:22:11 EDT</span></td>
          <td><span id="auctionLabel">Auction</span></td>
        </tr>
        <tr id="dRow" data-price="52.00" data-currency="USD" data-itemid="2351234568">
          <td><a id="titleText" href="https://www.ebay.com/itm/2351234568">2022 Bowman Chrome Jackson Holliday 1st Auto</a></td>
          <td><span id="dateText">Date: Fri 13 Oct 2023 09:00:00 EDT</span></td>
          <td><span id="auctionLabel">Best Offer Accepted</span></td>
        </tr>
    </tbody></table></body></html>"#;

    fn client_for(server: &MockServer, timeout: Duration) -> CompSourceClient {
        CompSourceClient::with_settings(
            &format!("{}/sales/", server.uri()),
            "USD",
            "Bowman Chrome 1st Auto",
            timeout,
        )
        .expect("client builds")
    }

    #[tokio::test]
    async fn ok_response_is_parsed_into_listings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sales/"))
            .and(body_string_contains("query=2022+Jackson+Holliday+Bowman+Chrome+1st+Auto"))
            .and(body_string_contains("sort=date_desc"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SALES_PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let listings = client_for(&server, Duration::from_secs(5))
            .fetch_listings("Jackson Holliday", Some(2022))
            .await
            .expect("listings");

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].item_id, "2351234567");
        assert!((listings[1].price - 52.0).abs() < 1e-9);
        assert_eq!(listings[1].mechanism, crate::types::SaleMechanism::BestOffer);
        assert_eq!(listings[0].year, Some(2022));
    }

    #[tokio::test]
    async fn error_status_is_source_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, Duration::from_secs(5))
            .fetch_listings("Jackson Holliday", None)
            .await
            .unwrap_err();

        match err {
            AppError::SourceUnavailable(msg) => assert!(msg.contains("503"), "{msg}"),
            other => panic!("expected SourceUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_source_times_out_as_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(SALES_PAGE)
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = client_for(&server, Duration::from_millis(200))
            .fetch_listings("Jackson Holliday", None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::SourceUnavailable(_)), "got {err:?}");
        assert!(err.is_source_failure());
    }

    #[tokio::test]
    async fn failed_call_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        assert!(client.fetch_listings("Jackson Holliday", None).await.is_err());

        let received = server.received_requests().await.expect("recording enabled");
        assert_eq!(received.len(), 1);
    }

    #[test]
    fn query_includes_year_when_known() {
        assert_eq!(
            build_query("Jackson Holliday", "Bowman Chrome 1st Auto", Some(2022)),
            "2022 Jackson Holliday Bowman Chrome 1st Auto"
        );
    }

    #[test]
    fn query_without_year() {
        assert_eq!(
            build_query(" Jackson Holliday ", "Bowman Chrome 1st Auto", None),
            "Jackson Holliday Bowman Chrome 1st Auto"
        );
    }

    #[test]
    fn empty_qualifier_is_skipped() {
        assert_eq!(build_query("Jackson Holliday", "  ", None), "Jackson Holliday");
    }
}
