use crate::types::{ClassifiedListing, YearSource};

/// Earliest release year among base listings, or among fallback listings when no
/// base listing carries a year. The first print year is the earliest appearance,
/// so frequency is irrelevant.
pub fn infer_year(listings: &[ClassifiedListing]) -> Option<i32> {
    let earliest = |pred: fn(&ClassifiedListing) -> bool| {
        listings.iter().filter(|l| pred(l)).filter_map(|l| l.year()).min()
    };
    earliest(ClassifiedListing::is_base).or_else(|| earliest(ClassifiedListing::is_fallback))
}

/// A caller-supplied year is authoritative and skips inference entirely.
pub fn resolve_year(known: Option<i32>, listings: &[ClassifiedListing]) -> (Option<i32>, YearSource) {
    if let Some(year) = known {
        return (Some(year), YearSource::Known);
    }
    match infer_year(listings) {
        Some(year) => (Some(year), YearSource::Inferred),
        None => (None, YearSource::Unresolved),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::rules::classify;
    use crate::source::fixture::listing;

    fn classified(titles: &[&str]) -> Vec<ClassifiedListing> {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| classify(listing(&format!("10000000{i}"), t, 10.0, 1)))
            .collect()
    }

    #[test]
    fn earliest_base_year_wins_over_frequency() {
        let ls = classified(&[
            "2023 Bowman Chrome Auto",
            "2023 Bowman Chrome Auto",
            "2022 Bowman Chrome Auto",
            "2024 Bowman Chrome Auto",
        ]);
        assert_eq!(infer_year(&ls), Some(2022));
    }

    #[test]
    fn fallback_years_used_only_without_base_years() {
        let ls = classified(&[
            "2021 Bowman Chrome Auto Refractor /499",
            "2023 Bowman Chrome Auto",
        ]);
        assert_eq!(infer_year(&ls), Some(2023));

        let ls = classified(&[
            "2021 Bowman Chrome Auto Refractor /499",
            "Bowman Chrome Auto",
            "2019 Bowman Chrome Auto PSA 10",
        ]);
        assert_eq!(infer_year(&ls), Some(2021));
    }

    #[test]
    fn no_years_resolves_to_none() {
        let ls = classified(&["Bowman Chrome Auto", "2020 Bowman Chrome Auto Lot"]);
        assert_eq!(infer_year(&ls), None);
        assert_eq!(resolve_year(None, &ls), (None, YearSource::Unresolved));
    }

    #[test]
    fn known_year_short_circuits() {
        let ls = classified(&["2022 Bowman Chrome Auto"]);
        assert_eq!(resolve_year(Some(2024), &ls), (Some(2024), YearSource::Known));
        assert_eq!(resolve_year(None, &ls), (Some(2022), YearSource::Inferred));
    }
}
