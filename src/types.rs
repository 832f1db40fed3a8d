use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Raw listings (comp source output)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleMechanism {
    Auction,
    FixedPrice,
    BestOffer,
    Unknown,
}

impl SaleMechanism {
    /// Map the source's free-text sale label onto a mechanism.
    pub fn from_label(label: &str) -> Self {
        let l = label.to_lowercase();
        if l.contains("best offer") {
            SaleMechanism::BestOffer
        } else if l.contains("auction") || l.contains("bid") {
            SaleMechanism::Auction
        } else if l.contains("fixed") || l.contains("buy it now") || l.contains("bin") {
            SaleMechanism::FixedPrice
        } else {
            SaleMechanism::Unknown
        }
    }
}

impl std::fmt::Display for SaleMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SaleMechanism::Auction => "auction",
            SaleMechanism::FixedPrice => "fixed_price",
            SaleMechanism::BestOffer => "best_offer",
            SaleMechanism::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// One sale as reported by the comp source for a query. Never persisted directly.
#[derive(Debug, Clone)]
pub struct RawListing {
    pub title: String,
    pub item_id: String,
    pub url: String,
    /// In the reporting currency; rows in any other currency never get this far.
    pub price: f64,
    pub sold_at: Option<NaiveDateTime>,
    pub mechanism: SaleMechanism,
    /// First year-like token (2010–2029) in the title.
    pub year: Option<i32>,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    Graded,
    Lot,
    WrongProduct,
    InPersonAuto,
    NumberedParallel,
    Parallel,
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExclusionReason::Graded => "graded",
            ExclusionReason::Lot => "lot",
            ExclusionReason::WrongProduct => "wrong product",
            ExclusionReason::InPersonAuto => "IP auto",
            ExclusionReason::NumberedParallel => "numbered parallel",
            ExclusionReason::Parallel => "parallel",
        };
        write!(f, "{s}")
    }
}

/// Exactly one outcome per listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Base,
    /// Numbered parallel accepted only when no base listings exist.
    Fallback,
    Excluded(ExclusionReason),
}

#[derive(Debug, Clone)]
pub struct ClassifiedListing {
    pub listing: RawListing,
    pub verdict: Verdict,
}

impl ClassifiedListing {
    pub fn is_base(&self) -> bool {
        self.verdict == Verdict::Base
    }

    pub fn is_fallback(&self) -> bool {
        self.verdict == Verdict::Fallback
    }

    pub fn exclusion_reason(&self) -> Option<ExclusionReason> {
        match self.verdict {
            Verdict::Excluded(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn year(&self) -> Option<i32> {
        self.listing.year
    }
}

/// Which admissible set a stored sale came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantClass {
    Base,
    Fallback,
}

impl std::fmt::Display for VariantClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariantClass::Base => write!(f, "base"),
            VariantClass::Fallback => write!(f, "fallback"),
        }
    }
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// Lowercased, whitespace-collapsed player key used for storage lookups.
pub fn player_key(name: &str) -> String {
    name.split_whitespace()
        .map(|t| t.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A player the batch job should refresh, with an optional known release year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerTarget {
    pub name: String,
    #[serde(default)]
    pub known_year: Option<i32>,
}

// ---------------------------------------------------------------------------
// Summary & pipeline results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub average_price: f64,
    pub median_price: f64,
    pub last_sale_price: f64,
    pub last_sale_date: Option<String>,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoResults,
    NoValidSales,
    ScrapeError,
    StoreError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::NoResults => "NO_RESULTS",
            ErrorCode::NoValidSales => "NO_VALID_SALES",
            ErrorCode::ScrapeError => "SCRAPE_ERROR",
            ErrorCode::StoreError => "STORE_ERROR",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineError {
    pub code: ErrorCode,
    pub message: String,
}

/// Where the resolved year came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YearSource {
    Known,
    Inferred,
    Unresolved,
}

/// Outcome of one scrape-and-store run. Every terminal state carries the
/// counts gathered up to that point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineResult {
    pub player: String,
    pub success: bool,
    pub total_fetched: usize,
    /// Listings dropped because the title did not name the player.
    pub name_mismatched: usize,
    pub base_count: usize,
    pub fallback_count: usize,
    pub excluded_count: usize,
    pub excluded_by_reason: std::collections::BTreeMap<String, usize>,
    pub resolved_year: Option<i32>,
    pub year_source: Option<YearSource>,
    pub variant_class: Option<VariantClass>,
    pub inserted: usize,
    pub duplicates: usize,
    pub total_on_file: i64,
    pub summary: Option<MarketSummary>,
    pub elapsed_ms: u64,
    pub error: Option<PipelineError>,
}

impl PipelineResult {
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<PipelineResult>,
    pub refreshed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub skipped_players: Vec<String>,
    pub elapsed_ms: u64,
}
