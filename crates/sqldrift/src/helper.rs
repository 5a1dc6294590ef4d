//! Helper utilities for name matching
//!
//! This module provides:
//! - Edit distance between identifiers
//! - Nearest-match selection for "did you mean" suggestions
//! - Order-preserving deduplication

use std::collections::HashSet;
use std::hash::Hash;

/// Largest edit distance at which a column suggestion is still offered
pub const SUGGESTION_MAX_DISTANCE: usize = 2;

/// Levenshtein distance between two strings, counted in chars.
///
/// # Example
///
/// ```
/// use sqldrift::helper::levenshtein;
///
/// assert_eq!(levenshtein("emale", "email"), 2);
/// assert_eq!(levenshtein("", "abc"), 3);
/// ```
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Two rolling rows instead of the full matrix
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Pick the candidate closest to `name`.
///
/// Comparison happens on lowercased text. A candidate qualifies when its
/// distance is at most `max_distance` and strictly smaller than the length of
/// `name` (so one- and two-letter names do not match everything). Ties go to
/// the lexicographically smallest candidate.
///
/// # Example
///
/// ```
/// use sqldrift::helper::closest_match;
///
/// let columns = ["id", "name", "email"];
/// assert_eq!(closest_match("emale", columns, 2), Some("email"));
/// assert_eq!(closest_match("zzz", columns, 2), None);
/// ```
pub fn closest_match<'a, I>(name: &str, candidates: I, max_distance: usize) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let wanted = name.to_lowercase();
    let limit = max_distance.min(wanted.chars().count().saturating_sub(1));

    let mut best: Option<(usize, String, &'a str)> = None;
    for candidate in candidates {
        let folded = candidate.to_lowercase();
        let distance = levenshtein(&wanted, &folded);
        if distance > limit {
            continue;
        }
        let better = match &best {
            None => true,
            Some((d, f, _)) => distance < *d || (distance == *d && folded < *f),
        };
        if better {
            best = Some((distance, folded, candidate));
        }
    }

    best.map(|(_, _, candidate)| candidate)
}

/// Remove duplicates while keeping the first occurrence of each item.
pub fn dedupe_ordered<T: Eq + Hash + Clone>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("naïve", "naive"), 1);
    }

    #[test]
    fn test_closest_match_threshold() {
        let columns = ["id", "name", "email"];
        assert_eq!(closest_match("nam", columns, SUGGESTION_MAX_DISTANCE), Some("name"));
        assert_eq!(closest_match("EMALE", columns, SUGGESTION_MAX_DISTANCE), Some("email"));
        assert_eq!(closest_match("address", columns, SUGGESTION_MAX_DISTANCE), None);
    }

    #[test]
    fn test_closest_match_short_names() {
        // distance must stay below the name length
        assert_eq!(closest_match("x", ["id"], SUGGESTION_MAX_DISTANCE), None);
        assert_eq!(closest_match("ix", ["id"], SUGGESTION_MAX_DISTANCE), Some("id"));
    }

    #[test]
    fn test_closest_match_tie_break() {
        assert_eq!(closest_match("cat", ["cot", "bat"], 2), Some("bat"));
        assert_eq!(closest_match("cat", ["bat", "cot"], 2), Some("bat"));
    }

    #[test]
    fn test_dedupe_ordered() {
        assert_eq!(dedupe_ordered(vec![3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }
}
