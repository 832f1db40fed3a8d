//! Extraction of sale rows from the comp source's HTML response.
//!
//! Each sale is a table row carrying its price (and usually currency and item id)
//! as `data-*` attributes, with the title link, sale date and sale-type label
//! inside the cells:
//!
//! ```html
//! <tr id="dRow" data-price="45.00" data-currency="USD" data-itemid="2351234567">
//!   <td><a id="titleText" href="https://www.ebay.com/itm/2351234567?hash=x">2023 Bowman Chrome ...</a></td>
//!   <td><span id="dateText">Date: Sat 14 Oct 2023 18:22:11 EDT</span></td>
//!   <td><span id="auctionLabel">Auction</span></td>
//! </tr>
//! ```
//!
//! Rows missing a price, item id or resolvable URL are rejected, as are rows in a
//! currency other than the reporting one.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::{MAX_RELEASE_YEAR, MIN_RELEASE_YEAR};
use crate::types::{RawListing, SaleMechanism};

static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr[data-price], tr#dRow").expect("valid row selector"));
static TITLE_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a#titleText, a[href]").expect("valid title selector"));
static DATE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#dateText, .sale-date").expect("valid date selector"));
static SALE_LABEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#auctionLabel, .sale-type").expect("valid label selector"));
static PRICE_TEXT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".price, #priceText").expect("valid price selector"));

static RE_PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d,]+(?:\.\d{1,2})?)").expect("valid price regex"));
static RE_ITEM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/itm/(?:[^/?#]+/)?(\d{6,})").expect("valid item id regex"));
static RE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(20\d{2})\b").expect("valid year regex"));

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParseStats {
    pub rows_seen: usize,
    pub rejected_no_price: usize,
    pub rejected_no_item_id: usize,
    pub rejected_no_url: usize,
    pub rejected_currency: usize,
    /// Rows repeating an item id already seen in the same response.
    pub repeated: usize,
    pub kept: usize,
}

enum Rejection {
    NoPrice,
    NoItemId,
    NoUrl,
    Currency,
}

/// Parse every sale row in `body`. `base_url` resolves relative links;
/// `currency` is the reporting currency rows must match.
pub fn parse_listings(body: &str, base_url: &str, currency: &str) -> (Vec<RawListing>, ParseStats) {
    let document = Html::parse_document(body);
    let base = Url::parse(base_url).ok();

    let mut stats = ParseStats::default();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut listings = Vec::new();

    for row in document.select(&ROW) {
        stats.rows_seen += 1;
        match parse_row(row, base.as_ref(), currency) {
            Ok(listing) => {
                if !seen_ids.insert(listing.item_id.clone()) {
                    stats.repeated += 1;
                    continue;
                }
                listings.push(listing);
            }
            Err(Rejection::NoPrice) => stats.rejected_no_price += 1,
            Err(Rejection::NoItemId) => stats.rejected_no_item_id += 1,
            Err(Rejection::NoUrl) => stats.rejected_no_url += 1,
            Err(Rejection::Currency) => stats.rejected_currency += 1,
        }
    }

    stats.kept = listings.len();
    (listings, stats)
}

fn parse_row(row: ElementRef<'_>, base: Option<&Url>, currency: &str) -> Result<RawListing, Rejection> {
    let el = row.value();

    let price_text = row.select(&PRICE_TEXT).next().map(text_of);

    let price = el
        .attr("data-price")
        .and_then(parse_price)
        .or_else(|| price_text.as_deref().and_then(parse_price))
        .filter(|p| *p > 0.0)
        .ok_or(Rejection::NoPrice)?;

    let row_currency = el
        .attr("data-currency")
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .or_else(|| price_text.as_deref().and_then(currency_from_symbol));
    match row_currency {
        Some(ref c) if c.eq_ignore_ascii_case(currency) => {}
        _ => return Err(Rejection::Currency),
    }

    let link = row.select(&TITLE_LINK).next().ok_or(Rejection::NoUrl)?;
    let url = link
        .value()
        .attr("href")
        .and_then(|href| resolve_url(href, base))
        .ok_or(Rejection::NoUrl)?;

    let item_id = el
        .attr("data-itemid")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| item_id_from_url(&url))
        .ok_or(Rejection::NoItemId)?;

    let title = text_of(link);
    let sold_at = row
        .select(&DATE)
        .next()
        .and_then(|d| parse_sale_date(&text_of(d)));
    let mechanism = row
        .select(&SALE_LABEL)
        .next()
        .map(|l| SaleMechanism::from_label(&text_of(l)))
        .unwrap_or(SaleMechanism::Unknown);
    let year = extract_year(&title);

    Ok(RawListing {
        title,
        item_id,
        url,
        price,
        sold_at,
        mechanism,
        year,
    })
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `"$1,234.50"` → 1234.5
pub fn parse_price(s: &str) -> Option<f64> {
    let caps = RE_PRICE.captures(s)?;
    caps.get(1)?.as_str().replace(',', "").parse::<f64>().ok()
}

fn currency_from_symbol(s: &str) -> Option<String> {
    let s = s.trim();
    let code = if s.starts_with("C $") || s.starts_with("CA $") {
        "CAD"
    } else if s.starts_with("AU $") {
        "AUD"
    } else if s.starts_with('$') || s.starts_with("US $") {
        "USD"
    } else if s.starts_with('£') {
        "GBP"
    } else if s.starts_with('€') {
        "EUR"
    } else {
        return None;
    };
    Some(code.to_string())
}

fn resolve_url(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let url = match Url::parse(href) {
        Ok(u) => u,
        Err(_) => base?.join(href).ok()?,
    };
    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        _ => None,
    }
}

fn item_id_from_url(url: &str) -> Option<String> {
    RE_ITEM_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// First year-like token in `title` within the release-year bounds.
pub fn extract_year(title: &str) -> Option<i32> {
    RE_YEAR
        .captures_iter(title)
        .filter_map(|c| c.get(1)?.as_str().parse::<i32>().ok())
        .find(|y| (MIN_RELEASE_YEAR..=MAX_RELEASE_YEAR).contains(y))
}

/// Parse the source's sale date text, e.g. `"Date: Sat 14 Oct 2023 18:22:11 EDT"`.
/// A trailing timezone abbreviation is ignored.
pub fn parse_sale_date(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    let s = s.strip_prefix("Date:").unwrap_or(s).trim();
    let s = match s.rsplit_once(' ') {
        Some((head, tz)) if !tz.is_empty() && tz.chars().all(|c| c.is_ascii_uppercase()) => head,
        _ => s,
    };

    const DATETIME_FORMATS: &[&str] = &[
        "%a %d %b %Y %H:%M:%S",
        "%d %b %Y %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%b %d, %Y", "%a %d %b %Y", "%m/%d/%Y"];

    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://back.130point.com/sales/";

    fn row(price: &str, currency: &str, item_id: &str, href: &str, title: &str) -> String {
        format!(
            r#"<tr id="dRow" data-price="{price}" data-currency="{currency}" data-itemid="{item_id}">
                 <td><a id="titleText" href="{href}">{title}</a></td>
                 <td><span id="dateText">Date: Sat 14 Oct 2023 18:22:11 EDT</span></td>
                 <td><span id="auctionLabel">Auction</span></td>
               </tr>"#
        )
    }

    fn page(rows: &[String]) -> String {
        format!("<html><body><table><tbody>{}</tbody></table></body></html>", rows.join("\n"))
    }

    #[test]
    fn parses_complete_row() {
        let body = page(&[row(
            "45.00",
            "USD",
            "2351234567",
            "https://www.ebay.com/itm/2351234567?hash=abc",
            "2023 Bowman Chrome Jackson Holliday 1st Auto",
        )]);
        let (listings, stats) = parse_listings(&body, BASE, "USD");
        assert_eq!(stats.kept, 1);
        let l = &listings[0];
        assert_eq!(l.item_id, "2351234567");
        assert!((l.price - 45.0).abs() < 1e-9);
        assert_eq!(l.year, Some(2023));
        assert_eq!(l.mechanism, SaleMechanism::Auction);
        assert_eq!(l.title, "2023 Bowman Chrome Jackson Holliday 1st Auto");
        let sold = l.sold_at.expect("date parsed");
        assert_eq!(sold.format("%Y-%m-%d %H:%M:%S").to_string(), "2023-10-14 18:22:11");
    }

    #[test]
    fn drops_foreign_currency_rows() {
        let body = page(&[
            row("45.00", "GBP", "111111111", "https://www.ebay.com/itm/111111111", "2023 A"),
            row("50.00", "USD", "222222222", "https://www.ebay.com/itm/222222222", "2023 B"),
        ]);
        let (listings, stats) = parse_listings(&body, BASE, "USD");
        assert_eq!(listings.len(), 1);
        assert_eq!(stats.rejected_currency, 1);
        assert_eq!(listings[0].item_id, "222222222");
    }

    #[test]
    fn rejects_rows_without_price_or_url() {
        let body = page(&[
            row("", "USD", "111111111", "https://www.ebay.com/itm/111111111", "no price"),
            row("30", "USD", "222222222", "javascript:void(0)", "bad link"),
        ]);
        let (listings, stats) = parse_listings(&body, BASE, "USD");
        assert!(listings.is_empty());
        assert_eq!(stats.rejected_no_price, 1);
        assert_eq!(stats.rejected_no_url, 1);
    }

    #[test]
    fn item_id_falls_back_to_url() {
        let body = page(&[row(
            "30",
            "USD",
            "",
            "https://www.ebay.com/itm/some-title/334455667788?_trkparms=x",
            "2022 Bowman Chrome",
        )]);
        let (listings, _) = parse_listings(&body, BASE, "USD");
        assert_eq!(listings[0].item_id, "334455667788");
    }

    #[test]
    fn repeated_item_ids_are_collapsed() {
        let r = row("30", "USD", "555555555", "https://www.ebay.com/itm/555555555", "2022 A");
        let body = page(&[r.clone(), r]);
        let (listings, stats) = parse_listings(&body, BASE, "USD");
        assert_eq!(listings.len(), 1);
        assert_eq!(stats.repeated, 1);
    }

    #[test]
    fn relative_links_resolve_against_base() {
        let body = page(&[row("30", "USD", "777777777", "/itm/777777777", "2022 A")]);
        let (listings, _) = parse_listings(&body, BASE, "USD");
        assert_eq!(listings[0].url, "https://back.130point.com/itm/777777777");
    }

    #[test]
    fn currency_inferred_from_price_text() {
        let body = page(&[r#"<tr id="dRow" data-itemid="888888888">
                <td><a href="https://www.ebay.com/itm/888888888">2021 A</a></td>
                <td><span class="price">$1,204.50</span></td>
              </tr>"#
            .to_string()]);
        let (listings, _) = parse_listings(&body, BASE, "USD");
        assert_eq!(listings.len(), 1);
        assert!((listings[0].price - 1204.5).abs() < 1e-9);
    }

    #[test]
    fn year_extraction_respects_bounds() {
        assert_eq!(extract_year("1999 Bowman 2009 reprint 2021 Chrome"), Some(2021));
        assert_eq!(extract_year("Bowman Chrome Auto #BCPA-JH"), None);
        assert_eq!(extract_year("2035 future"), None);
    }

    #[test]
    fn sale_date_formats() {
        assert!(parse_sale_date("2024-03-01").is_some());
        assert!(parse_sale_date("Mar 01, 2024").is_some());
        assert!(parse_sale_date("Date: Fri 01 Mar 2024 09:00:00 PST").is_some());
        assert!(parse_sale_date("yesterday").is_none());
    }
}
