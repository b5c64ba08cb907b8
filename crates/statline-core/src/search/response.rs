//! Search results and the response envelope

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::request::SearchMode;
use crate::pagination::PaginationEnvelope;
use crate::storage::rows::RowMap;

/// One matched record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Primary key; identity for deduplication
    #[serde(skip)]
    pub id: i64,
    #[serde(flatten)]
    pub fields: RowMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
    /// Source entity type, set for global searches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
}

impl SearchResult {
    pub fn new(id: i64, fields: RowMap) -> Self {
        Self {
            id,
            fields,
            similarity_score: None,
            entity_type: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.similarity_score = Some(score);
        self
    }

    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }
}

/// Results for one entity type, or grouped by type for a global search
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchResults {
    Single(Vec<SearchResult>),
    Grouped(BTreeMap<String, Vec<SearchResult>>),
}

impl SearchResults {
    /// Number of results on this page across all groups
    pub fn len(&self) -> usize {
        match self {
            Self::Single(results) => results.len(),
            Self::Grouped(groups) => groups.values().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate every result regardless of grouping
    pub fn iter(&self) -> Box<dyn Iterator<Item = &SearchResult> + '_> {
        match self {
            Self::Single(results) => Box::new(results.iter()),
            Self::Grouped(groups) => Box::new(groups.values().flatten()),
        }
    }
}

/// Which executor output a response carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Exact,
    Fuzzy,
    Hybrid,
    /// Global auto search where types settled on different strategies
    Mixed,
}

impl SearchType {
    /// Combine the strategies of two entity types
    pub fn combine(self, other: SearchType) -> SearchType {
        if self == other { self } else { SearchType::Mixed }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::Hybrid => "hybrid",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope returned by every orchestrated search
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: SearchMode,
    pub entity_type: Option<String>,
    pub results: SearchResults,
    pub pagination: PaginationEnvelope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    /// Wall-clock seconds
    pub execution_time: f64,
    pub search_type: SearchType,
    /// Per-type failures that were absorbed into empty results
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

impl SearchResponse {
    /// Results for a single-type search, or one type's slice of a global one
    pub fn results_for(&self, entity_type: &str) -> &[SearchResult] {
        match &self.results {
            SearchResults::Single(results) => results,
            SearchResults::Grouped(groups) => groups
                .get(entity_type)
                .map(Vec::as_slice)
                .unwrap_or_default(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty()
    }
}
