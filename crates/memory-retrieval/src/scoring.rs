//! Scoring helpers shared by the search strategies. Grounded on
//! `cortex-retrieval/src/ranking/scorer.rs`'s weighted-sum pattern,
//! narrowed from 8 factors down to the two that matter for each strategy
//! (cosine/lexical for `code_search`, semantic/edge-weight for the hybrid
//! strategy) plus the shared tie-break rule.

use std::cmp::Ordering;

use crate::result::SearchResult;

/// `code_search`'s lexical match signal: exact name/signature substring
/// presence, not a fuzzy edit-distance score. Yields one of `{0, 0.5, 1}`
/// based on name-substring and signature-substring presence.
pub fn lexical_match(query: &str, name: Option<&str>, signature: Option<&str>) -> f64 {
    if query.trim().is_empty() {
        return 0.0;
    }
    let query_lower = query.to_lowercase();
    let name_hits = name
        .map(|n| n.to_lowercase().contains(&query_lower))
        .unwrap_or(false);
    let signature_hits = signature
        .map(|s| s.to_lowercase().contains(&query_lower))
        .unwrap_or(false);
    if name_hits && signature_hits {
        1.0
    } else if name_hits || signature_hits {
        0.5
    } else {
        0.0
    }
}

/// `code_search`'s final blend: `α·cosine + (1-α)·lexical_match`.
pub fn blend(alpha: f64, cosine: f64, lexical: f64) -> f64 {
    alpha * cosine + (1.0 - alpha) * lexical
}

/// Tie-breaking: on equal scores, prefer higher `importance_score`, then
/// more recent `updated_at`. Used as the final sort comparator after every
/// strategy computes its raw score.
pub fn compare_results(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.memory
                .importance_score
                .partial_cmp(&a.memory.importance_score)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| b.memory.updated_at.cmp(&a.memory.updated_at))
}

pub fn sort_and_truncate(mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results.sort_by(compare_results);
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexical_match_scores_both_hits_highest() {
        assert_eq!(lexical_match("parse", Some("parse_config"), Some("parse_config(s)")), 1.0);
    }

    #[test]
    fn lexical_match_scores_single_hit_half() {
        assert_eq!(lexical_match("parse", Some("parse_config"), None), 0.5);
        assert_eq!(lexical_match("parse", None, Some("parse_config(s)")), 0.5);
    }

    #[test]
    fn lexical_match_scores_no_hit_zero() {
        assert_eq!(lexical_match("parse", Some("format_output"), Some("format_output(s)")), 0.0);
    }

    #[test]
    fn lexical_match_is_case_insensitive() {
        assert_eq!(lexical_match("Parse", Some("parse_config"), None), 0.5);
    }

    #[test]
    fn blend_weights_cosine_by_alpha() {
        assert!((blend(0.7, 1.0, 0.0) - 0.7).abs() < 1e-9);
        assert!((blend(0.7, 0.0, 1.0) - 0.3).abs() < 1e-9);
    }
}
