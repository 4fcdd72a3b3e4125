//! Fuzzy name similarity for spotting near-duplicate listings.

use crate::common::types::{str_field, Record};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarPair {
    pub first: String,
    pub second: String,
    pub score: u8,
}

fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
}

fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

fn joined(tokens: &[&str]) -> String {
    tokens.join(" ")
}

/// Token-set similarity on a 0-100 scale.
///
/// Both inputs are lowercased and stripped of punctuation, then split into
/// token sets. The sorted intersection is compared against the intersection
/// plus each side's leftovers, and the best of the three ratios wins, so word
/// order and repeated words do not matter.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let a = normalize(a);
    let b = normalize(b);
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0;
    }

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let diff_ab: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let diff_ba: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    let sect = joined(&intersection);
    let combined_ab = format!("{} {}", sect, joined(&diff_ab)).trim().to_string();
    let combined_ba = format!("{} {}", sect, joined(&diff_ba)).trim().to_string();

    let best = [
        ratio(&sect, &combined_ab),
        ratio(&sect, &combined_ba),
        ratio(&combined_ab, &combined_ba),
    ]
    .into_iter()
    .fold(0.0_f64, f64::max);

    (best * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Scores every unique pair of records that both carry a non-empty `field`
/// and returns the `n` highest. Ties keep pair order.
pub fn top_similar_pairs(records: &[Record], field: &str, n: usize) -> Vec<SimilarPair> {
    let names: Vec<&str> = records
        .iter()
        .filter_map(|r| str_field(r, field))
        .filter(|s| !s.is_empty())
        .collect();

    let mut pairs = Vec::new();
    for (i, first) in names.iter().enumerate() {
        for second in &names[i + 1..] {
            pairs.push(SimilarPair {
                first: first.to_string(),
                second: second.to_string(),
                score: token_set_ratio(first, second),
            });
        }
    }
    pairs.sort_by(|x, y| y.score.cmp(&x.score));
    pairs.truncate(n);
    pairs
}
