//! Search box suggestions.

use strsim::{jaro_winkler, normalized_levenshtein};

/// Common medicines offered before the user has typed anything useful.
pub const SEARCH_SUGGESTIONS: [&str; 8] = [
    "Paracetamol",
    "Insulin",
    "Aspirin",
    "Ibuprofen",
    "Amoxicillin",
    "Cetirizine",
    "Omeprazole",
    "Metformin",
];

/// Minimum similarity for a fuzzy (typo-tolerant) suggestion.
const FUZZY_THRESHOLD: f64 = 0.75;

/// Suggestions for the text typed so far.
///
/// Blank input returns the full list. Otherwise prefix matches come first,
/// then substring matches, then close spellings, each group in list order.
pub fn suggestions(input: &str, limit: usize) -> Vec<&'static str> {
    let query = input.trim().to_lowercase();
    if query.is_empty() {
        return SEARCH_SUGGESTIONS.iter().copied().take(limit).collect();
    }

    let mut prefix = Vec::new();
    let mut contains = Vec::new();
    let mut fuzzy: Vec<(&'static str, f64)> = Vec::new();

    for name in SEARCH_SUGGESTIONS {
        let lower = name.to_lowercase();
        if lower.starts_with(&query) {
            prefix.push(name);
        } else if lower.contains(&query) {
            contains.push(name);
        } else {
            // Compare against the same-length head so partial input still scores.
            let head: String = lower.chars().take(query.chars().count().max(3)).collect();
            let score = similarity(&query, &head);
            if score >= FUZZY_THRESHOLD {
                fuzzy.push((name, score));
            }
        }
    }

    fuzzy.sort_by(|a, b| b.1.total_cmp(&a.1));

    prefix
        .into_iter()
        .chain(contains)
        .chain(fuzzy.into_iter().map(|(name, _)| name))
        .take(limit)
        .collect()
}

fn similarity(a: &str, b: &str) -> f64 {
    jaro_winkler(a, b) * 0.6 + normalized_levenshtein(a, b) * 0.4
}
