use std::sync::LazyLock;

use regex::Regex;

use crate::config::FALLBACK_PRINT_RUN;
use crate::types::{ClassifiedListing, ExclusionReason, RawListing, Verdict};

/// One exclusion rule. Rules are evaluated in table order and the first match wins,
/// so overlapping titles (a graded lot, say) report the earlier reason.
pub struct Rule {
    pub reason: ExclusionReason,
    pub matches: fn(&str) -> bool,
    /// Whether the sanctioned fallback signature turns a match into a fallback variant.
    pub fallback_eligible: bool,
}

/// Verdict for a title no rule matches. Anything not explicitly excluded is
/// trusted as the base product.
pub const DEFAULT_VERDICT: Verdict = Verdict::Base;

pub static RULES: &[Rule] = &[
    Rule { reason: ExclusionReason::Graded, matches: is_graded, fallback_eligible: false },
    Rule { reason: ExclusionReason::Lot, matches: is_lot, fallback_eligible: false },
    Rule { reason: ExclusionReason::WrongProduct, matches: is_wrong_product, fallback_eligible: false },
    Rule { reason: ExclusionReason::InPersonAuto, matches: is_in_person_auto, fallback_eligible: false },
    Rule { reason: ExclusionReason::NumberedParallel, matches: is_numbered, fallback_eligible: true },
    Rule { reason: ExclusionReason::Parallel, matches: is_colorway, fallback_eligible: true },
];

static RE_GRADED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(psa|bgs|sgc|cgc|csg|hga|ksa|gma|beckett|graded|slabbed|gem\s*mi?n?t|pristine)\b")
        .expect("valid graded regex")
});

static RE_LOT_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(lot|lots|bundle|set\s+of|and)\b|&|\+").expect("valid lot regex")
});

static RE_LOT_QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[(\[]\s*\d+\s*[)\]]|\bx\s?\d+\b|\b\d+\s?x\b|\b\d+\s*(cards|cts?)\b")
        .expect("valid lot quantity regex")
});

static RE_WRONG_PRODUCT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(",
        r"panini|donruss|prizm|optic|select|contenders|leaf|upper\s+deck|",
        r"topps\s+(chrome|series|update|heritage|finest|now)|",
        r"redemption|redemp|relic|patch|jersey|memorabilia|",
        r"digital|nft|bunt|",
        r"bowman\s+u|university|college|collegiate|ncaa|",
        r"bowman'?s\s+best|sterling|inception|platinum",
        r")\b",
    ))
    .expect("valid wrong product regex")
});

static RE_IP_AUTO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(in[\s-]?person|ip|ip\s+auto|signed\s+at|hand[\s-]?signed|convention|private\s+signing|jsa|coa)\b")
        .expect("valid in-person regex")
});

static RE_SERIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\s?\d{1,4}\b").expect("valid serial regex"));

static RE_COLORWAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(",
        r"refractors?|x-?fractor|superfractor|atomic|speckle|shimmer|wave|raywave|mojo|lava|",
        r"mini[\s-]?diamond|geometric|lunar|sapphire|sepia|padparadscha|",
        r"gold|orange|red|blue|green|purple|black|pink|yellow|aqua|teal|rose\s+gold|sky\s+blue",
        r")\b",
    ))
    .expect("valid colorway regex")
});

/// Club names that contain a colorway word. Masked before the colorway check.
static RE_TEAM_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(red\s+sox|white\s+sox|blue\s+jays)\b")
        .expect("valid team name regex")
});

static RE_FALLBACK_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\brefractor\b").expect("valid fallback regex"));

fn is_graded(title: &str) -> bool {
    RE_GRADED.is_match(title)
}

fn is_lot(title: &str) -> bool {
    RE_LOT_WORDS.is_match(title) || RE_LOT_QUANTITY.is_match(title)
}

fn is_wrong_product(title: &str) -> bool {
    RE_WRONG_PRODUCT.is_match(title)
}

fn is_in_person_auto(title: &str) -> bool {
    RE_IP_AUTO.is_match(title)
}

fn is_numbered(title: &str) -> bool {
    RE_SERIAL.is_match(title)
}

fn is_colorway(title: &str) -> bool {
    RE_COLORWAY.is_match(&RE_TEAM_NAME.replace_all(title, " "))
}

/// The single accepted parallel: a plain refractor numbered to the program's
/// fixed print run.
pub fn is_sanctioned_fallback(title: &str) -> bool {
    RE_FALLBACK_TOKEN.is_match(title) && serial_denominators(title).any(|d| d == FALLBACK_PRINT_RUN)
}

fn serial_denominators(title: &str) -> impl Iterator<Item = u32> + '_ {
    RE_SERIAL.find_iter(title).filter_map(|m| {
        m.as_str()
            .trim_start_matches('/')
            .trim()
            .parse::<u32>()
            .ok()
    })
}

/// Fold the title through the rule table.
pub fn verdict_for(title: &str) -> Verdict {
    RULES
        .iter()
        .find(|rule| (rule.matches)(title))
        .map(|rule| {
            if rule.fallback_eligible && is_sanctioned_fallback(title) {
                Verdict::Fallback
            } else {
                Verdict::Excluded(rule.reason)
            }
        })
        .unwrap_or(DEFAULT_VERDICT)
}

pub fn classify(listing: RawListing) -> ClassifiedListing {
    let verdict = verdict_for(&listing.title);
    ClassifiedListing { listing, verdict }
}
