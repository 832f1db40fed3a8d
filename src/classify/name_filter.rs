/// Generational suffixes that titles routinely omit.
const NAME_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv"];

fn words(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '.' || c == '\''))
        .map(|w| w.chars().filter(|c| *c != '.' && *c != '\'').collect::<String>().to_lowercase())
        .filter(|w| !w.is_empty())
}

/// Name tokens a title must contain to be attributed to `player`: every word of the
/// name except generational suffixes and single-letter initials. Two-letter names
/// ("Bo", "CJ") are required too: dropping them lets "Bo University" match any
/// "Bowman University" title.
pub fn significant_tokens(player: &str) -> Vec<String> {
    words(player)
        .filter(|w| w.chars().count() > 1)
        .filter(|w| !NAME_SUFFIXES.contains(&w.as_str()))
        .collect()
}

/// True when every significant name token appears as a whole word in `title`.
/// The comp search is token-based, so a single shared word is not enough.
pub fn title_names_player(title: &str, player: &str) -> bool {
    let tokens = significant_tokens(player);
    if tokens.is_empty() {
        return false;
    }
    let title_words: Vec<String> = words(title).collect();
    tokens.iter().all(|t| title_words.iter().any(|w| w == t))
}
