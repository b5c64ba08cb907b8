//! Approximate (fuzzy) executor
//!
//! Scans every record of the entity, scores its searchable text against the
//! query and keeps records at or above the threshold. Linear in the size of
//! the table; only reached as a fallback or in fuzzy/hybrid mode.

use async_trait::async_trait;
use sqlx::SqliteConnection;
use std::cmp::Ordering;
use tracing::debug;

use super::executor::{ExecutorOutput, ExecutorRequest, SearchExecutor, scan_records};
use super::response::SearchResult;
use super::similarity;
use crate::catalog::SearchableEntity;
use crate::error::Result;

/// Similarity-scan executor
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyExecutor;

impl FuzzyExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SearchExecutor for FuzzyExecutor {
    fn name(&self) -> &'static str {
        "fuzzy"
    }

    async fn execute(
        &self,
        conn: &mut SqliteConnection,
        entity: &dyn SearchableEntity,
        request: &ExecutorRequest,
    ) -> Result<ExecutorOutput> {
        if similarity::tokenize(&request.query).is_empty() {
            debug!(entity = %entity.name(), query = %request.query, "Query has no searchable tokens");
            return Ok(ExecutorOutput::empty());
        }

        let records = scan_records(conn, entity, request.filter.as_ref()).await?;
        let scanned = records.len();

        let mut matched: Vec<SearchResult> = records
            .into_iter()
            .filter_map(|(id, record)| {
                let text = entity.searchable_text(&record);
                let score = similarity::score(&request.query, &text);
                similarity::passes(score, request.threshold)
                    .then(|| SearchResult::new(id, record).with_score(score))
            })
            .collect();

        // Highest score first; equal scores by ascending id for stable pages
        matched.sort_by(|a, b| {
            let (sa, sb) = (a.similarity_score.unwrap_or(0.0), b.similarity_score.unwrap_or(0.0));
            sb.partial_cmp(&sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = matched.len() as u64;
        let results = request.window(matched);

        debug!(
            entity = %entity.name(),
            query = %request.query,
            threshold = request.threshold,
            scanned,
            total,
            returned = results.len(),
            "Fuzzy search"
        );
        Ok(ExecutorOutput::new(results, total))
    }
}
