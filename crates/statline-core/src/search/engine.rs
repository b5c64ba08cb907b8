//! Search orchestrator
//!
//! `SearchEngine` is the public entry point. A search validates its input,
//! acquires one pooled connection for every read it makes, dispatches on the
//! requested mode, optionally gathers suggestions, releases the connection,
//! and finally records a telemetry row.
//!
//! Mode dispatch:
//!
//! - `exact`: exact executor only
//! - `fuzzy`: fuzzy executor only, then suggestions
//! - `hybrid`: both executors' leading candidates merged, then suggestions
//! - `auto`: exact executor; below the liveness threshold the fuzzy executor
//!   also runs and the larger total wins (ties keep exact), then suggestions
//!
//! Executor errors and panics never escape: the affected slice is empty and
//! the message is reported in the response's `errors` map.

use futures_util::FutureExt;
use sqlx::SqliteConnection;
use sqlx::SqlitePool;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::exact::ExactExecutor;
use super::executor::{ExecutorOutput, ExecutorRequest, SearchExecutor};
use super::fuzzy::FuzzyExecutor;
use super::merge::{merge, merge_maps};
use super::request::{QueryValidator, SearchMode, SearchParams, SearchRequest};
use super::response::{SearchResponse, SearchResult, SearchResults, SearchType};
use super::suggest::build_vocabulary;
use super::telemetry::{SearchLogEntry, SearchLogger};
use crate::catalog::{EntityCatalog, SearchableEntity, SortDirection};
use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::pagination::{
    self, CursorPage, CursorToken, OffsetWindow, PageResult, PaginationEnvelope, TableQuery,
};

/// Upper bound for a standalone suggestion lookup
const MAX_SUGGESTIONS: usize = 20;

/// Error-map key for failures not tied to one entity type
const SEARCH_ERROR_KEY: &str = "search";

/// Public entry point of the search and pagination engine
///
/// Cheap to clone; holds no mutable state besides the connection pool.
#[derive(Clone)]
pub struct SearchEngine {
    pool: SqlitePool,
    catalog: Arc<EntityCatalog>,
    config: Arc<SearchConfig>,
    validator: Arc<QueryValidator>,
    exact: Arc<dyn SearchExecutor>,
    fuzzy: Arc<dyn SearchExecutor>,
    logger: SearchLogger,
}

impl fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchEngine")
            .field("entities", &self.catalog.names())
            .field("exact", &self.exact.name())
            .field("fuzzy", &self.fuzzy.name())
            .finish_non_exhaustive()
    }
}

/// What one entity type contributed to a search
#[derive(Debug, Default)]
struct TypeOutcome {
    results: Vec<SearchResult>,
    total: u64,
    search_type: Option<SearchType>,
    fallback_ran: bool,
    errors: Vec<String>,
}

impl TypeOutcome {
    fn from_executor(output: ExecutorOutput, search_type: SearchType) -> Self {
        Self {
            results: output.results,
            total: output.total,
            search_type: Some(search_type),
            ..Default::default()
        }
    }

    /// Page out of a merged candidate list
    fn from_merged(merged: Vec<SearchResult>, window: &OffsetWindow, errors: Vec<String>) -> Self {
        Self {
            total: merged.len() as u64,
            results: window.slice(&merged),
            search_type: Some(SearchType::Hybrid),
            fallback_ran: false,
            errors,
        }
    }
}

/// Everything a response needs besides timing
struct Outcome {
    results: SearchResults,
    total: u64,
    has_next: bool,
    search_type: SearchType,
    wants_suggestions: bool,
    suggestions: Option<Vec<String>>,
    errors: BTreeMap<String, String>,
}

impl Outcome {
    /// Empty outcome carrying a single failure
    fn failed(catalog: &EntityCatalog, request: &SearchRequest, message: String) -> Self {
        let (results, key) = match request.entity_type() {
            Some(name) => (SearchResults::Single(Vec::new()), name.to_string()),
            None => (
                SearchResults::Grouped(
                    catalog
                        .names()
                        .into_iter()
                        .map(|name| (name.to_string(), Vec::new()))
                        .collect(),
                ),
                SEARCH_ERROR_KEY.to_string(),
            ),
        };
        Self {
            results,
            total: 0,
            has_next: false,
            search_type: requested_type(request.mode()),
            wants_suggestions: false,
            suggestions: None,
            errors: BTreeMap::from([(key, message)]),
        }
    }
}

fn requested_type(mode: SearchMode) -> SearchType {
    match mode {
        SearchMode::Exact | SearchMode::Auto => SearchType::Exact,
        SearchMode::Fuzzy => SearchType::Fuzzy,
        SearchMode::Hybrid => SearchType::Hybrid,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("executor panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("executor panicked: {}", s)
    } else {
        "executor panicked".to_string()
    }
}

impl SearchEngine {
    /// Create an engine with the exact and fuzzy executors
    pub fn new(pool: SqlitePool, catalog: EntityCatalog, config: SearchConfig) -> Result<Self> {
        let validator = QueryValidator::new(&config)?;
        Ok(Self {
            logger: SearchLogger::new(pool.clone()),
            pool,
            catalog: Arc::new(catalog),
            config: Arc::new(config),
            validator: Arc::new(validator),
            exact: Arc::new(ExactExecutor::new()),
            fuzzy: Arc::new(FuzzyExecutor::new()),
        })
    }

    /// Replace the executors (instrumentation, alternative strategies)
    pub fn with_executors(
        mut self,
        exact: Arc<dyn SearchExecutor>,
        fuzzy: Arc<dyn SearchExecutor>,
    ) -> Self {
        self.exact = exact;
        self.fuzzy = fuzzy;
        self
    }

    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn validator(&self) -> &QueryValidator {
        &self.validator
    }

    /// Run a search
    ///
    /// Only validation failures are returned as errors. Storage and executor
    /// failures, and an expired deadline, yield empty results with the cause
    /// in `errors`.
    pub async fn search(&self, params: &SearchParams) -> Result<SearchResponse> {
        let started = Instant::now();
        let request = self.validator.validate(params, &self.catalog)?;
        if request.cursor_rejected() {
            debug!(query = %request.query(), "Cursor did not decode; serving the first page");
        }

        let outcome = match self.config.timeout() {
            Some(deadline) => match tokio::time::timeout(deadline, self.execute(&request)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let ms = deadline.as_millis() as u64;
                    warn!(query = %request.query(), timeout_ms = ms, "Search timed out");
                    Outcome::failed(&self.catalog, &request, Error::SearchTimeout(ms).to_string())
                }
            },
            None => self.execute(&request).await,
        };

        let elapsed = started.elapsed();
        let response = self.respond(&request, outcome, elapsed);
        self.logger.record(&self.log_entry(&request, &response, elapsed)).await;
        Ok(response)
    }

    /// Standalone suggestion lookup; `limit` of 0 uses the configured default
    pub async fn suggest(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let query = self.validator.clean_query(query)?;
        let limit = match limit {
            0 => self.config.suggestion_limit,
            n => n.min(MAX_SUGGESTIONS),
        };

        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "Could not acquire a connection for suggestions");
                return Ok(Vec::new());
            }
        };
        Ok(self
            .ranked_suggestions(&mut conn, &query, limit)
            .await
            .unwrap_or_default())
    }

    /// Offset-paginated table read without search modes
    ///
    /// Bad identifiers or where clauses are `InvalidInput`; storage failures
    /// yield an empty page.
    pub async fn paginate_table(
        &self,
        query: &TableQuery,
        page: i64,
        per_page: i64,
    ) -> Result<PageResult> {
        let window = OffsetWindow::from_page(page, per_page, &self.config);
        let empty = || PageResult {
            items: Vec::new(),
            pagination: PaginationEnvelope::empty(&window),
        };

        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(table = %query.table, error = %e, "Could not acquire a connection");
                return Ok(empty());
            }
        };
        match pagination::paginate_table(&mut conn, query, page, per_page, &self.config).await {
            Err(Error::DatabaseError(e)) => {
                warn!(table = %query.table, error = %e, "Table pagination failed");
                Ok(empty())
            }
            other => other,
        }
    }

    /// Cursor-paginated table read; undecodable cursors restart from the top
    pub async fn paginate_by_cursor(
        &self,
        table: &str,
        order_by: &str,
        direction: SortDirection,
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<CursorPage> {
        let empty = || CursorPage {
            items: Vec::new(),
            limit: limit.clamp(1, i64::from(self.config.max_per_page.max(1))) as u32,
            has_next: false,
            next_cursor: None,
        };

        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(table = %table, error = %e, "Could not acquire a connection");
                return Ok(empty());
            }
        };
        match pagination::paginate_by_cursor(
            &mut conn,
            table,
            order_by,
            direction,
            cursor,
            limit,
            &self.config,
        )
        .await
        {
            Err(Error::DatabaseError(e)) => {
                warn!(table = %table, error = %e, "Cursor pagination failed");
                Ok(empty())
            }
            other => other,
        }
    }

    /// Everything that needs the connection; it is released on return
    async fn execute(&self, request: &SearchRequest) -> Outcome {
        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "Could not acquire a connection for search");
                return Outcome::failed(&self.catalog, request, e.to_string());
            }
        };

        let mut outcome = match request.entity_type() {
            Some(name) => match self.catalog.get(name) {
                Some(entity) => self.search_single(&mut conn, entity, request).await,
                None => Outcome::failed(
                    &self.catalog,
                    request,
                    format!("Unknown entity type '{}'", name),
                ),
            },
            None => self.search_global(&mut conn, request).await,
        };

        if outcome.wants_suggestions {
            let suggestions = self
                .ranked_suggestions(&mut conn, request.query(), self.config.suggestion_limit)
                .await;
            outcome.suggestions = suggestions.filter(|s| !s.is_empty());
        }
        outcome
    }

    async fn search_single(
        &self,
        conn: &mut SqliteConnection,
        entity: &dyn SearchableEntity,
        request: &SearchRequest,
    ) -> Outcome {
        let window = request.window();
        let typed = match request.mode() {
            SearchMode::Hybrid => {
                let (exact, fuzzy, errors) = self.hybrid_candidates(conn, entity, request).await;
                TypeOutcome::from_merged(merge(exact, fuzzy), window, errors)
            }
            _ => self.search_type(conn, entity, request).await,
        };

        let has_next = window.has_next_within(typed.total);
        let mut errors = BTreeMap::new();
        if !typed.errors.is_empty() {
            errors.insert(entity.name().to_string(), typed.errors.join("; "));
        }

        Outcome {
            results: SearchResults::Single(typed.results),
            total: typed.total,
            has_next,
            search_type: typed
                .search_type
                .unwrap_or_else(|| requested_type(request.mode())),
            wants_suggestions: self.wants_suggestions(request.mode(), typed.fallback_ran),
            suggestions: None,
            errors,
        }
    }

    async fn search_global(&self, conn: &mut SqliteConnection, request: &SearchRequest) -> Outcome {
        let window = request.window();
        let mut per_type: BTreeMap<String, TypeOutcome> = BTreeMap::new();

        if request.mode() == SearchMode::Hybrid {
            let mut exact_map = BTreeMap::new();
            let mut fuzzy_map = BTreeMap::new();
            let mut errors_by_type = BTreeMap::new();
            for entity in self.catalog.iter() {
                let (exact, fuzzy, errors) = self.hybrid_candidates(conn, entity, request).await;
                exact_map.insert(entity.name().to_string(), exact);
                fuzzy_map.insert(entity.name().to_string(), fuzzy);
                errors_by_type.insert(entity.name().to_string(), errors);
            }
            for (name, merged) in merge_maps(exact_map, fuzzy_map) {
                let errors = errors_by_type.remove(&name).unwrap_or_default();
                per_type.insert(name, TypeOutcome::from_merged(merged, window, errors));
            }
        } else {
            for entity in self.catalog.iter() {
                let typed = self.search_type(conn, entity, request).await;
                per_type.insert(entity.name().to_string(), typed);
            }
        }

        let mut groups = BTreeMap::new();
        let mut errors = BTreeMap::new();
        let mut total = 0;
        let mut has_next = false;
        let mut fallback_ran = false;
        let mut search_type: Option<SearchType> = None;

        for (name, typed) in per_type {
            total += typed.total;
            has_next |= window.has_next_within(typed.total);
            fallback_ran |= typed.fallback_ran;
            if let Some(t) = typed.search_type {
                search_type = Some(search_type.map_or(t, |s| s.combine(t)));
            }
            if !typed.errors.is_empty() {
                errors.insert(name.clone(), typed.errors.join("; "));
            }
            let tagged = typed
                .results
                .into_iter()
                .map(|r| r.with_entity_type(name.clone()))
                .collect();
            groups.insert(name, tagged);
        }

        Outcome {
            results: SearchResults::Grouped(groups),
            total,
            has_next,
            search_type: search_type.unwrap_or_else(|| requested_type(request.mode())),
            wants_suggestions: self.wants_suggestions(request.mode(), fallback_ran),
            suggestions: None,
            errors,
        }
    }

    /// Exact, fuzzy or auto search of one entity type over the request window
    async fn search_type(
        &self,
        conn: &mut SqliteConnection,
        entity: &dyn SearchableEntity,
        request: &SearchRequest,
    ) -> TypeOutcome {
        let window = request.window();
        let exec_request = self.executor_request(request, window.offset(), window.per_page());

        match request.mode() {
            SearchMode::Exact | SearchMode::Hybrid => {
                self.run_one(self.exact.as_ref(), conn, entity, &exec_request, SearchType::Exact)
                    .await
            }
            SearchMode::Fuzzy => {
                self.run_one(self.fuzzy.as_ref(), conn, entity, &exec_request, SearchType::Fuzzy)
                    .await
            }
            SearchMode::Auto => {
                let mut errors = Vec::new();
                let exact = self
                    .run_executor(self.exact.as_ref(), conn, entity, &exec_request)
                    .await
                    .unwrap_or_else(|e| {
                        errors.push(e);
                        ExecutorOutput::empty()
                    });

                if exact.total >= self.config.liveness_threshold {
                    let mut typed = TypeOutcome::from_executor(exact, SearchType::Exact);
                    typed.errors = errors;
                    return typed;
                }

                debug!(
                    entity = %entity.name(),
                    exact_total = exact.total,
                    "Exact results below liveness threshold; running fuzzy fallback"
                );
                let fuzzy = self
                    .run_executor(self.fuzzy.as_ref(), conn, entity, &exec_request)
                    .await
                    .unwrap_or_else(|e| {
                        errors.push(e);
                        ExecutorOutput::empty()
                    });

                let mut typed = if fuzzy.total > exact.total {
                    TypeOutcome::from_executor(fuzzy, SearchType::Fuzzy)
                } else {
                    TypeOutcome::from_executor(exact, SearchType::Exact)
                };
                typed.fallback_ran = true;
                typed.errors = errors;
                typed
            }
        }
    }

    async fn run_one(
        &self,
        executor: &dyn SearchExecutor,
        conn: &mut SqliteConnection,
        entity: &dyn SearchableEntity,
        request: &ExecutorRequest,
        search_type: SearchType,
    ) -> TypeOutcome {
        match self.run_executor(executor, conn, entity, request).await {
            Ok(output) => TypeOutcome::from_executor(output, search_type),
            Err(e) => TypeOutcome {
                search_type: Some(search_type),
                errors: vec![e],
                ..Default::default()
            },
        }
    }

    /// Leading candidates from both executors, for merging
    async fn hybrid_candidates(
        &self,
        conn: &mut SqliteConnection,
        entity: &dyn SearchableEntity,
        request: &SearchRequest,
    ) -> (Vec<SearchResult>, Vec<SearchResult>, Vec<String>) {
        let candidates = self.executor_request(request, 0, self.config.hybrid_candidate_limit);
        let mut errors = Vec::new();

        let exact = match self
            .run_executor(self.exact.as_ref(), conn, entity, &candidates)
            .await
        {
            Ok(output) => output.results,
            Err(e) => {
                errors.push(e);
                Vec::new()
            }
        };
        let fuzzy = match self
            .run_executor(self.fuzzy.as_ref(), conn, entity, &candidates)
            .await
        {
            Ok(output) => output.results,
            Err(e) => {
                errors.push(e);
                Vec::new()
            }
        };
        (exact, fuzzy, errors)
    }

    /// Run an executor, converting errors and panics into a message
    async fn run_executor(
        &self,
        executor: &dyn SearchExecutor,
        conn: &mut SqliteConnection,
        entity: &dyn SearchableEntity,
        request: &ExecutorRequest,
    ) -> std::result::Result<ExecutorOutput, String> {
        let run = AssertUnwindSafe(executor.execute(conn, entity, request));
        match run.catch_unwind().await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => {
                warn!(
                    executor = executor.name(),
                    entity = %entity.name(),
                    error = %e,
                    "Search executor failed"
                );
                Err(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload);
                warn!(
                    executor = executor.name(),
                    entity = %entity.name(),
                    error = %message,
                    "Search executor panicked"
                );
                Err(message)
            }
        }
    }

    fn executor_request(&self, request: &SearchRequest, offset: u64, limit: u32) -> ExecutorRequest {
        ExecutorRequest::new(request.query(), offset, limit)
            .with_filter(request.filter().cloned())
            .with_threshold(request.threshold())
    }

    fn wants_suggestions(&self, mode: SearchMode, fallback_ran: bool) -> bool {
        match mode {
            SearchMode::Exact => false,
            SearchMode::Fuzzy | SearchMode::Hybrid => true,
            SearchMode::Auto => fallback_ran,
        }
    }

    /// Ranked suggestions, or `None` if the vocabulary could not be built
    async fn ranked_suggestions(
        &self,
        conn: &mut SqliteConnection,
        query: &str,
        limit: usize,
    ) -> Option<Vec<String>> {
        match build_vocabulary(conn, &self.catalog).await {
            Ok(vocabulary) => Some(vocabulary.suggest(
                query,
                self.config.suggestion_threshold,
                limit,
            )),
            Err(e) => {
                warn!(error = %e, "Could not build suggestion vocabulary");
                None
            }
        }
    }

    fn respond(&self, request: &SearchRequest, outcome: Outcome, elapsed: Duration) -> SearchResponse {
        let window = request.window();
        let next_cursor = outcome
            .has_next
            .then(|| CursorToken::rank(window.next_offset()).encode());

        SearchResponse {
            query: request.query().to_string(),
            mode: request.mode(),
            entity_type: request.entity_type().map(str::to_string),
            results: outcome.results,
            pagination: PaginationEnvelope::new(window, Some(outcome.total), outcome.has_next)
                .with_next_cursor(next_cursor),
            suggestions: outcome.suggestions,
            execution_time: elapsed.as_secs_f64(),
            search_type: outcome.search_type,
            errors: outcome.errors,
        }
    }

    fn log_entry(
        &self,
        request: &SearchRequest,
        response: &SearchResponse,
        elapsed: Duration,
    ) -> SearchLogEntry {
        let mut entry = SearchLogEntry::new(request.query(), request.mode());
        entry.entity_type = request.entity_type().map(str::to_string);
        entry.execution_time_ms = elapsed.as_secs_f64() * 1000.0;
        entry.result_count = response.pagination.total.unwrap_or(0);
        entry.page = response.pagination.page;
        entry.per_page = response.pagination.per_page;
        entry.filter_field = request.filter().map(|f| f.field.as_str().to_string());
        entry.filter_value = request.filter().map(|f| f.value.clone());
        entry.caller = request.caller().map(str::to_string);
        entry.error = response.is_degraded().then(|| {
            response
                .errors
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("; ")
        });
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use async_trait::async_trait;

    struct PanickingExecutor;

    #[async_trait]
    impl SearchExecutor for PanickingExecutor {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn execute(
            &self,
            _conn: &mut SqliteConnection,
            _entity: &dyn SearchableEntity,
            _request: &ExecutorRequest,
        ) -> Result<ExecutorOutput> {
            panic!("index corrupted");
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl SearchExecutor for FailingExecutor {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn execute(
            &self,
            _conn: &mut SqliteConnection,
            _entity: &dyn SearchableEntity,
            _request: &ExecutorRequest,
        ) -> Result<ExecutorOutput> {
            Err(Error::Other("disk on fire".to_string()))
        }
    }

    async fn engine_with_games() -> (Database, SearchEngine) {
        let db = Database::in_memory().await.unwrap();
        for name in ["Dota 2", "Dota Underlords", "Valorant"] {
            sqlx::query("INSERT INTO games (game_name) VALUES (?)")
                .bind(name)
                .execute(db.pool())
                .await
                .unwrap();
        }
        let engine = SearchEngine::new(
            db.pool().clone(),
            EntityCatalog::builtin(),
            SearchConfig::default(),
        )
        .unwrap();
        (db, engine)
    }

    #[tokio::test]
    async fn test_exact_search_envelope() {
        let (_db, engine) = engine_with_games().await;
        let response = engine
            .search(&SearchParams::new("dota").entity_type("games").mode("exact"))
            .await
            .unwrap();

        assert_eq!(response.pagination.total, Some(2));
        assert!(!response.pagination.has_next);
        assert_eq!(response.pagination.next_cursor, None);
        assert_eq!(response.search_type, SearchType::Exact);
        assert!(response.suggestions.is_none());
        assert!(!response.is_degraded());
        assert!(response.execution_time >= 0.0);
    }

    #[tokio::test]
    async fn test_validation_error_is_returned() {
        let (_db, engine) = engine_with_games().await;
        let err = engine.search(&SearchParams::new("d")).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_panicking_executor_is_contained() {
        let (_db, engine) = engine_with_games().await;
        let engine = engine.with_executors(Arc::new(PanickingExecutor), Arc::new(FuzzyExecutor));

        let response = engine
            .search(&SearchParams::new("dota").entity_type("games").mode("exact"))
            .await
            .unwrap();
        assert!(response.results.is_empty());
        assert_eq!(response.pagination.total, Some(0));
        assert!(response.is_degraded());
        assert!(response.errors["games"].contains("index corrupted"));

        let logged: (Option<String>,) = sqlx::query_as("SELECT error FROM search_logs")
            .fetch_one(engine.pool())
            .await
            .unwrap();
        assert!(logged.0.unwrap().contains("index corrupted"));
    }

    #[tokio::test]
    async fn test_global_partial_failure() {
        let (_db, engine) = engine_with_games().await;
        let engine = engine.with_executors(Arc::new(ExactExecutor), Arc::new(FailingExecutor));

        // No type reaches 3 exact hits, so each one tries the failing fallback
        let response = engine.search(&SearchParams::new("dota")).await.unwrap();
        assert_eq!(response.results_for("games").len(), 2);
        assert_eq!(response.pagination.total, Some(2));
        assert!(response.errors["games"].contains("disk on fire"));
        assert!(response
            .results_for("games")
            .iter()
            .all(|r| r.entity_type.as_deref() == Some("games")));
    }

    #[tokio::test]
    async fn test_connection_is_released_after_search() {
        let (db, engine) = engine_with_games().await;
        for _ in 0..3 {
            engine
                .search(&SearchParams::new("dota").entity_type("games"))
                .await
                .unwrap();
        }
        // The single in-memory connection must be free again
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM search_logs")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 3);
    }

    #[tokio::test]
    async fn test_standalone_suggest() {
        let (_db, engine) = engine_with_games().await;
        let suggestions = engine.suggest("Valorent", 0).await.unwrap();
        assert_eq!(suggestions.first().map(String::as_str), Some("Valorant"));

        assert!(engine.suggest("x", 5).await.is_err());
    }

    #[tokio::test]
    async fn test_paginate_missing_table_is_empty() {
        let (_db, engine) = engine_with_games().await;
        let page = engine
            .paginate_table(&TableQuery::new("no_such_table", "id"), 1, 10)
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.pagination.total, Some(0));

        let err = engine
            .paginate_table(&TableQuery::new("games;", "id"), 1, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
