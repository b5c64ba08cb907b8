//! Search telemetry
//!
//! One append-only `search_logs` row per orchestrated search. Recording never
//! fails the search: errors are reported through `tracing` and dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use super::request::SearchMode;
use crate::error::Result;

/// A completed search as recorded
#[derive(Debug, Clone, Serialize)]
pub struct SearchLogEntry {
    pub id: Uuid,
    pub query: String,
    pub mode: SearchMode,
    pub entity_type: Option<String>,
    pub execution_time_ms: f64,
    pub result_count: u64,
    pub page: u32,
    pub per_page: u32,
    pub filter_field: Option<String>,
    pub filter_value: Option<String>,
    pub caller: Option<String>,
    /// Absorbed failures, joined
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SearchLogEntry {
    pub fn new(query: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            mode,
            entity_type: None,
            execution_time_ms: 0.0,
            result_count: 0,
            page: 1,
            per_page: 0,
            filter_field: None,
            filter_value: None,
            caller: None,
            error: None,
            created_at: Utc::now(),
        }
    }
}

/// Writes search log entries
#[derive(Debug, Clone)]
pub struct SearchLogger {
    pool: SqlitePool,
}

impl SearchLogger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record an entry, swallowing any storage failure
    pub async fn record(&self, entry: &SearchLogEntry) {
        info!(
            search_id = %entry.id,
            query = %entry.query,
            mode = %entry.mode,
            entity_type = entry.entity_type.as_deref().unwrap_or("all"),
            execution_time_ms = entry.execution_time_ms,
            result_count = entry.result_count,
            page = entry.page,
            per_page = entry.per_page,
            caller = entry.caller.as_deref().unwrap_or("-"),
            degraded = entry.error.is_some(),
            "Search completed"
        );

        if let Err(e) = self.try_record(entry).await {
            warn!(search_id = %entry.id, error = %e, "Failed to record search log entry");
        }
    }

    /// Record an entry in its own transaction
    pub async fn try_record(&self, entry: &SearchLogEntry) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO search_logs (
                id, query, mode, entity_type, execution_time_ms, result_count,
                page, per_page, filter_field, filter_value, caller, error, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(&entry.query)
        .bind(entry.mode.as_str())
        .bind(&entry.entity_type)
        .bind(entry.execution_time_ms)
        .bind(i64::try_from(entry.result_count).unwrap_or(i64::MAX))
        .bind(i64::from(entry.page))
        .bind(i64::from(entry.per_page))
        .bind(&entry.filter_field)
        .bind(&entry.filter_value)
        .bind(&entry.caller)
        .bind(&entry.error)
        .bind(entry.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[tokio::test]
    async fn test_record_inserts_row() {
        let db = Database::in_memory().await.unwrap();
        let logger = SearchLogger::new(db.pool().clone());

        let mut entry = SearchLogEntry::new("dota", SearchMode::Auto);
        entry.entity_type = Some("games".to_string());
        entry.result_count = 4;
        entry.per_page = 20;
        entry.caller = Some("cli".to_string());
        logger.record(&entry).await;

        let row: (String, String, Option<String>, i64, i64, Option<String>) = sqlx::query_as(
            "SELECT id, mode, entity_type, result_count, per_page, caller FROM search_logs",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(row.0, entry.id.to_string());
        assert_eq!(row.1, "auto");
        assert_eq!(row.2.as_deref(), Some("games"));
        assert_eq!((row.3, row.4), (4, 20));
        assert_eq!(row.5.as_deref(), Some("cli"));
    }

    #[tokio::test]
    async fn test_record_failure_is_swallowed() {
        let db = Database::in_memory().await.unwrap();
        sqlx::query("DROP TABLE search_logs")
            .execute(db.pool())
            .await
            .unwrap();
        let logger = SearchLogger::new(db.pool().clone());

        let entry = SearchLogEntry::new("dota", SearchMode::Exact);
        assert!(logger.try_record(&entry).await.is_err());
        // Must not panic or propagate
        logger.record(&entry).await;
    }
}
