//! Token-order-independent string similarity on a 0-100 scale
//!
//! Text is lowercased and split into alphanumeric tokens. Two measures are
//! combined:
//!
//! - **token sort**: both token lists sorted and compared as whole strings,
//!   so "Team Liquid" and "Liquid Team" score 100
//! - **token alignment**: each query token is matched to its closest
//!   candidate token, averaged by query-token length, so a short misspelled
//!   query is not drowned out by a long candidate string
//!
//! The score is the larger of the two. A query with no tokens matches
//! nothing. Character-level comparison is the Indel measure from `rapidfuzz`.

use rapidfuzz::distance::indel;

/// Split text into lowercase alphanumeric tokens
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Indel similarity of two strings on a 0-100 scale
///
/// Equal to `200 * lcs / (len_a + len_b)`. Two empty strings are identical.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    100.0 * indel::normalized_similarity(a.chars(), b.chars())
}

/// Ratio of the two token lists after sorting each
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let sorted = |s: &str| {
        let mut tokens = tokenize(s);
        tokens.sort();
        tokens.join(" ")
    };
    ratio(&sorted(a), &sorted(b))
}

/// Length-weighted mean of each query token's best match among candidate tokens
pub fn token_alignment(query: &str, candidate: &str) -> f64 {
    let query_tokens = tokenize(query);
    let candidate_tokens = tokenize(candidate);
    if query_tokens.is_empty() || candidate_tokens.is_empty() {
        return 0.0;
    }

    let mut weighted = 0.0;
    let mut weight = 0usize;
    for q in &query_tokens {
        let best = candidate_tokens
            .iter()
            .map(|c| ratio(q, c))
            .fold(0.0_f64, f64::max);
        let len = q.chars().count();
        weighted += best * len as f64;
        weight += len;
    }
    weighted / weight as f64
}

/// Similarity of `query` to `candidate`, rounded to two decimals
pub fn score(query: &str, candidate: &str) -> f64 {
    if tokenize(query).is_empty() {
        return 0.0;
    }
    let raw = token_sort_ratio(query, candidate).max(token_alignment(query, candidate));
    (raw * 100.0).round() / 100.0
}

/// Whether `score` meets a 0-100 threshold
pub fn passes(score: f64, threshold: u8) -> bool {
    score >= f64::from(threshold)
}
