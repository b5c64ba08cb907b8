//! Spelling suggestions
//!
//! The vocabulary is every distinct value and word (three characters or
//! more) found in the catalog's suggestion fields. Terms are ranked by
//! similarity to the query under a looser threshold than fuzzy search.

use sqlx::SqliteConnection;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::executor::scan_records;
use super::similarity;
use crate::catalog::{EntityCatalog, SearchableEntity};
use crate::error::Result;

const MIN_TERM_CHARS: usize = 3;

/// Distinct candidate terms, deduplicated case-insensitively
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    terms: Vec<String>,
    seen: HashSet<String>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field value and each of its words
    pub fn add_value(&mut self, value: &str) {
        let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
        if value.is_empty() {
            return;
        }
        let words: Vec<String> = value
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= MIN_TERM_CHARS)
            .map(str::to_string)
            .collect();
        self.add_term(value);
        for word in words {
            self.add_term(word);
        }
    }

    fn add_term(&mut self, term: String) {
        if self.seen.insert(term.to_lowercase()) {
            self.terms.push(term);
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Up to `limit` terms scoring at least `threshold`, best first
    pub fn suggest(&self, query: &str, threshold: u8, limit: usize) -> Vec<String> {
        let normalized_query = similarity::tokenize(query).join(" ");

        let mut scored: Vec<(f64, &String)> = self
            .terms
            .iter()
            .filter(|term| similarity::tokenize(term).join(" ") != normalized_query)
            .map(|term| (similarity::score(query, term), term))
            .filter(|(score, _)| similarity::passes(*score, threshold))
            .collect();

        scored.sort_by(|(sa, ta), (sb, tb)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| ta.len().cmp(&tb.len()))
                .then_with(|| ta.cmp(tb))
        });

        scored
            .into_iter()
            .take(limit)
            .map(|(_, term)| term.clone())
            .collect()
    }
}

/// Build the vocabulary from every entity's suggestion fields
///
/// An entity whose table cannot be read is skipped with a warning.
pub async fn build_vocabulary(
    conn: &mut SqliteConnection,
    catalog: &EntityCatalog,
) -> Result<Vocabulary> {
    let mut vocabulary = Vocabulary::new();

    for entity in catalog.iter() {
        let fields = entity.suggestion_fields();
        if fields.is_empty() {
            continue;
        }
        let records = match scan_records(conn, entity, None).await {
            Ok(records) => records,
            Err(e) => {
                warn!(entity = %entity.name(), error = %e, "Skipping entity in suggestion vocabulary");
                continue;
            }
        };
        for (_, record) in &records {
            for field in fields {
                if let Some(text) = entity.field_text(record, field) {
                    vocabulary.add_value(&text);
                }
            }
        }
    }

    debug!(terms = vocabulary.len(), "Built suggestion vocabulary");
    Ok(vocabulary)
}
