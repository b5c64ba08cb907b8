//! Order-preserving union with deduplication by identity
//!
//! `a` is walked before `b`; the first occurrence of each identity wins and
//! later duplicates are dropped. Nothing is re-ranked.

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

use super::response::SearchResult;

/// Merge two lists, keeping the first occurrence of each key
pub fn merge_by<T, K, F>(a: Vec<T>, b: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::with_capacity(a.len() + b.len());
    let mut merged = Vec::with_capacity(a.len() + b.len());
    for item in a.into_iter().chain(b) {
        if seen.insert(key(&item)) {
            merged.push(item);
        }
    }
    merged
}

/// Merge two result lists of one entity type by primary key
pub fn merge(a: Vec<SearchResult>, b: Vec<SearchResult>) -> Vec<SearchResult> {
    merge_by(a, b, |r| (r.entity_type.clone(), r.id))
}

/// Merge per-type result maps; each type's lists are merged independently
pub fn merge_maps(
    mut a: BTreeMap<String, Vec<SearchResult>>,
    b: BTreeMap<String, Vec<SearchResult>>,
) -> BTreeMap<String, Vec<SearchResult>> {
    for (entity_type, results) in b {
        let existing = a.remove(&entity_type).unwrap_or_default();
        a.insert(entity_type, merge(existing, results));
    }
    a
}
