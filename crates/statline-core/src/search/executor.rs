//! The executor seam shared by exact and fuzzy search

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqliteConnection;
use tracing::warn;

use super::request::Filter;
use super::response::SearchResult;
use crate::catalog::SearchableEntity;
use crate::error::Result;
use crate::storage::rows::{RowMap, SqlValue, bind_all, row_to_map};

/// The slice of matches an executor is asked for
#[derive(Debug, Clone)]
pub struct ExecutorRequest {
    pub query: String,
    pub offset: u64,
    pub limit: u32,
    pub filter: Option<Filter>,
    /// Minimum similarity (fuzzy only)
    pub threshold: u8,
}

impl ExecutorRequest {
    pub fn new(query: impl Into<String>, offset: u64, limit: u32) -> Self {
        Self {
            query: query.into(),
            offset,
            limit,
            filter: None,
            threshold: 0,
        }
    }

    pub fn with_filter(mut self, filter: Option<Filter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    /// Apply this request's offset and limit to a fully matched list
    pub fn window<T>(&self, matched: Vec<T>) -> Vec<T> {
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        matched
            .into_iter()
            .skip(offset)
            .take(self.limit as usize)
            .collect()
    }
}

/// A page of matches plus the size of the whole matched set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutorOutput {
    pub results: Vec<SearchResult>,
    pub total: u64,
}

impl ExecutorOutput {
    pub fn new(results: Vec<SearchResult>, total: u64) -> Self {
        Self { results, total }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// A search strategy over any catalog entity
#[async_trait]
pub trait SearchExecutor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn execute(
        &self,
        conn: &mut SqliteConnection,
        entity: &dyn SearchableEntity,
        request: &ExecutorRequest,
    ) -> Result<ExecutorOutput>;
}

/// Load and hydrate every record of an entity, in its default order
///
/// Row-backed filters are pushed into SQL; document-backed filters are
/// applied to the hydrated document. Documents that fail to parse are
/// skipped with a warning so one bad blob cannot hide the rest.
pub(crate) async fn scan_records(
    conn: &mut SqliteConnection,
    entity: &dyn SearchableEntity,
    filter: Option<&Filter>,
) -> Result<Vec<(i64, RowMap)>> {
    let sort = entity.default_sort();
    let dir = sort.direction.as_sql();
    let pk = entity.primary_key();

    let (where_sql, params) = match filter {
        Some(filter) if !entity.is_document_backed() => (
            format!(" WHERE {} = ?", filter.field.as_str()),
            vec![SqlValue::from(filter.value.as_str())],
        ),
        _ => (String::new(), Vec::new()),
    };

    let sql = format!(
        "SELECT * FROM {}{} ORDER BY {} {}, {} {}",
        entity.table(),
        where_sql,
        sort.field,
        dir,
        pk,
        dir
    );
    let rows = bind_all(sqlx::query(&sql), &params)
        .fetch_all(&mut *conn)
        .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        let raw = row_to_map(row)?;
        let record = match entity.hydrate(raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(entity = %entity.name(), error = %e, "Skipping malformed document");
                continue;
            }
        };
        let Some(id) = entity.record_id(&record) else {
            warn!(entity = %entity.name(), "Skipping record without a primary key");
            continue;
        };
        if entity.is_document_backed() {
            if let Some(filter) = filter {
                if !document_filter_matches(entity, &record, filter) {
                    continue;
                }
            }
        }
        records.push((id, record));
    }
    Ok(records)
}

fn document_filter_matches(entity: &dyn SearchableEntity, record: &RowMap, filter: &Filter) -> bool {
    match filter.field.resolve_in(record) {
        Some(Value::Array(items)) => items.iter().any(|item| {
            crate::catalog::path::value_text(item)
                .is_some_and(|text| text.eq_ignore_ascii_case(&filter.value))
        }),
        Some(_) => entity
            .field_text(record, &filter.field)
            .is_some_and(|text| text.trim().eq_ignore_ascii_case(filter.value.trim())),
        None => false,
    }
}
