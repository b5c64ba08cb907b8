//! Exact-match executor
//!
//! Row-backed entities are answered from their FTS5 index, ranked by
//! `bm25()` and joined back to the base row. Document-backed entities have
//! no index, so their records are scanned and the exact-match field paths
//! tested with a case-insensitive substring match.

use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::debug;

use super::executor::{ExecutorOutput, ExecutorRequest, SearchExecutor, scan_records};
use super::request::Filter;
use super::response::SearchResult;
use super::similarity::tokenize;
use crate::catalog::SearchableEntity;
use crate::error::{Error, Result};
use crate::pagination::offset_param;
use crate::storage::rows::{SqlValue, bind_all, row_to_map};

const RANK_COLUMN: &str = "__rank";

/// Full-text / substring executor
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactExecutor;

impl ExactExecutor {
    pub fn new() -> Self {
        Self
    }

    async fn search_index(
        &self,
        conn: &mut SqliteConnection,
        entity: &dyn SearchableEntity,
        request: &ExecutorRequest,
    ) -> Result<ExecutorOutput> {
        let Some(expression) = match_expression(&request.query) else {
            return Ok(ExecutorOutput::empty());
        };
        let fts = entity
            .fts_table()
            .ok_or_else(|| Error::Other(format!("'{}' has no full-text index", entity.name())))?;
        let table = entity.table();
        let pk = entity.primary_key();

        let mut params = vec![SqlValue::Text(expression)];
        let filter_sql = filter_clause(request.filter.as_ref(), &mut params);

        let from = format!(
            "FROM {fts} JOIN {table} t ON t.{pk} = {fts}.rowid WHERE {fts} MATCH ?{filter_sql}"
        );

        let total: i64 = {
            let count_sql = format!("SELECT COUNT(*) AS n {from}");
            let row = bind_all(sqlx::query(&count_sql), &params)
                .fetch_one(&mut *conn)
                .await?;
            sqlx::Row::try_get(&row, "n")?
        };

        let select = format!(
            "SELECT t.*, bm25({fts}) AS {RANK_COLUMN} {from} \
             ORDER BY {RANK_COLUMN}, t.{pk} LIMIT ? OFFSET ?"
        );
        let rows = bind_all(sqlx::query(&select), &params)
            .bind(i64::from(request.limit))
            .bind(offset_param(request.offset))
            .fetch_all(&mut *conn)
            .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut fields = row_to_map(row)?;
            fields.remove(RANK_COLUMN);
            if let Some(id) = entity.record_id(&fields) {
                results.push(SearchResult::new(id, fields));
            }
        }

        Ok(ExecutorOutput::new(results, total.max(0) as u64))
    }

    async fn search_documents(
        &self,
        conn: &mut SqliteConnection,
        entity: &dyn SearchableEntity,
        request: &ExecutorRequest,
    ) -> Result<ExecutorOutput> {
        let needle = request.query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(ExecutorOutput::empty());
        }

        let records = scan_records(conn, entity, request.filter.as_ref()).await?;
        let matched: Vec<SearchResult> = records
            .into_iter()
            .filter(|(_, record)| {
                entity.exact_match_fields().iter().any(|field| {
                    entity
                        .field_text(record, field)
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
                })
            })
            .map(|(id, record)| SearchResult::new(id, record))
            .collect();

        let total = matched.len() as u64;
        Ok(ExecutorOutput::new(request.window(matched), total))
    }
}

#[async_trait]
impl SearchExecutor for ExactExecutor {
    fn name(&self) -> &'static str {
        "exact"
    }

    async fn execute(
        &self,
        conn: &mut SqliteConnection,
        entity: &dyn SearchableEntity,
        request: &ExecutorRequest,
    ) -> Result<ExecutorOutput> {
        let output = if entity.is_document_backed() {
            self.search_documents(conn, entity, request).await?
        } else {
            self.search_index(conn, entity, request).await?
        };

        debug!(
            entity = %entity.name(),
            query = %request.query,
            offset = request.offset,
            returned = output.results.len(),
            total = output.total,
            "Exact search"
        );
        Ok(output)
    }
}

/// FTS5 expression requiring every query token as a prefix
///
/// Each token is quoted so FTS5 operators in user input stay literal.
fn match_expression(query: &str) -> Option<String> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return None;
    }
    Some(
        tokens
            .iter()
            .map(|t| format!("\"{}\"*", t))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

fn filter_clause(filter: Option<&Filter>, params: &mut Vec<SqlValue>) -> String {
    match filter {
        Some(filter) => {
            params.push(SqlValue::from(filter.value.as_str()));
            format!(" AND t.{} = ?", filter.field.as_str())
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityCatalog, FieldPath};
    use crate::storage::Database;

    async fn seed_games(db: &Database) {
        for (name, genre, publisher) in [
            ("Dota 2", "MOBA", "Valve"),
            ("Counter-Strike 2", "FPS", "Valve"),
            ("League of Legends", "MOBA", "Riot Games"),
            ("Valorant", "FPS", "Riot Games"),
        ] {
            sqlx::query("INSERT INTO games (game_name, genre, publisher) VALUES (?, ?, ?)")
                .bind(name)
                .bind(genre)
                .bind(publisher)
                .execute(db.pool())
                .await
                .unwrap();
        }
    }

    #[test]
    fn test_match_expression_quotes_tokens() {
        assert_eq!(match_expression("Dota 2").as_deref(), Some("\"dota\"* \"2\"*"));
        assert_eq!(
            match_expression("NEAR(a b) OR c").as_deref(),
            Some("\"near\"* \"a\"* \"b\"* \"or\"* \"c\"*")
        );
        assert_eq!(match_expression("--"), None);
    }

    #[tokio::test]
    async fn test_exact_row_backed() {
        let db = Database::in_memory().await.unwrap();
        seed_games(&db).await;
        let catalog = EntityCatalog::builtin();
        let games = catalog.get("games").unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let output = ExactExecutor::new()
            .execute(&mut conn, games, &ExecutorRequest::new("Dota", 0, 10))
            .await
            .unwrap();
        assert_eq!(output.total, 1);
        assert_eq!(output.results[0].fields["game_name"], "Dota 2");
        assert!(!output.results[0].fields.contains_key(RANK_COLUMN));

        let output = ExactExecutor::new()
            .execute(&mut conn, games, &ExecutorRequest::new("valve", 0, 1))
            .await
            .unwrap();
        assert_eq!(output.total, 2);
        assert_eq!(output.results.len(), 1);
    }

    #[tokio::test]
    async fn test_exact_row_backed_filter() {
        let db = Database::in_memory().await.unwrap();
        seed_games(&db).await;
        let catalog = EntityCatalog::builtin();
        let games = catalog.get("games").unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let filter = Filter {
            field: FieldPath::parse("genre").unwrap(),
            value: "FPS".to_string(),
        };
        let request = ExecutorRequest::new("riot", 0, 10).with_filter(Some(filter));
        let output = ExactExecutor::new()
            .execute(&mut conn, games, &request)
            .await
            .unwrap();
        assert_eq!(output.total, 1);
        assert_eq!(output.results[0].fields["game_name"], "Valorant");
    }

    #[tokio::test]
    async fn test_exact_document_backed_uses_designated_fields() {
        let db = Database::in_memory().await.unwrap();
        for data in [
            r#"{"Player_Information": {"ID": "Faker", "Romanized Name": "Lee Sang-hyeok", "Team": "T1"}}"#,
            r#"{"Player_Information": {"ID": "Zeus", "Romanized Name": "Choi Woo-je", "Team": "T1"}}"#,
            r#"{"Player_Information": {"ID": "Chovy", "Romanized Name": "Jeong Ji-hoon", "Team": "Gen.G"}}"#,
        ] {
            sqlx::query("INSERT INTO players (data) VALUES (?)")
                .bind(data)
                .execute(db.pool())
                .await
                .unwrap();
        }
        let catalog = EntityCatalog::builtin();
        let players = catalog.get("players").unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let exact = ExactExecutor::new();

        let output = exact
            .execute(&mut conn, players, &ExecutorRequest::new("sang-hyeok", 0, 10))
            .await
            .unwrap();
        assert_eq!(output.total, 1);
        assert_eq!(output.results[0].id, 1);

        // Team is searchable but not an exact-match field
        let output = exact
            .execute(&mut conn, players, &ExecutorRequest::new("T1", 0, 10))
            .await
            .unwrap();
        assert_eq!(output.total, 0);

        let output = exact
            .execute(&mut conn, players, &ExecutorRequest::new("o", 1, 1))
            .await
            .unwrap();
        assert_eq!(output.total, 3);
        assert_eq!(output.results.len(), 1);
        assert_eq!(output.results[0].id, 2);
    }
}
