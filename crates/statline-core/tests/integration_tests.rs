//! Statline Core Integration Tests
//!
//! End-to-end searches and pagination through `SearchEngine` against a
//! freshly migrated database.

use async_trait::async_trait;
use sqlx::SqliteConnection;
use statline_core::{
    Error, Result,
    catalog::{EntityCatalog, SearchableEntity, SortDirection},
    config::SearchConfig,
    pagination::{CursorToken, TableQuery},
    search::{
        ExecutorOutput, ExecutorRequest, ExactExecutor, FuzzyExecutor, SearchEngine,
        SearchExecutor, SearchParams, SearchResults, SearchType, ValidationError,
    },
    storage::{Database, DatabaseConfig, SqlValue},
};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Fuzzy executor that counts its invocations
#[derive(Default)]
struct CountingFuzzy {
    calls: AtomicUsize,
}

#[async_trait]
impl SearchExecutor for CountingFuzzy {
    fn name(&self) -> &'static str {
        "counting-fuzzy"
    }

    async fn execute(
        &self,
        conn: &mut SqliteConnection,
        entity: &dyn SearchableEntity,
        request: &ExecutorRequest,
    ) -> Result<ExecutorOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        FuzzyExecutor.execute(conn, entity, request).await
    }
}

/// Executor that never finishes within a short deadline
struct SlowExecutor;

#[async_trait]
impl SearchExecutor for SlowExecutor {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn execute(
        &self,
        _conn: &mut SqliteConnection,
        _entity: &dyn SearchableEntity,
        _request: &ExecutorRequest,
    ) -> Result<ExecutorOutput> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(ExecutorOutput {
            results: Vec::new(),
            total: 0,
        })
    }
}

async fn insert_games(db: &Database, names: &[&str]) {
    for name in names {
        sqlx::query("INSERT INTO games (game_name) VALUES (?)")
            .bind(name)
            .execute(db.pool())
            .await
            .unwrap();
    }
}

/// 45 teams named "Team 01".."Team 45", all in region EU
async fn insert_teams(db: &Database) {
    for i in 1..=45 {
        sqlx::query("INSERT INTO teams (team_name, region) VALUES (?, 'EU')")
            .bind(format!("Team {:02}", i))
            .execute(db.pool())
            .await
            .unwrap();
    }
}

fn engine(db: &Database) -> SearchEngine {
    engine_with_config(db, SearchConfig::default())
}

fn engine_with_config(db: &Database, config: SearchConfig) -> SearchEngine {
    SearchEngine::new(db.pool().clone(), EntityCatalog::builtin(), config).unwrap()
}

fn result_ids(results: &SearchResults) -> Vec<i64> {
    results.iter().map(|r| r.id).collect()
}

#[tokio::test]
async fn test_exact_search_finds_single_game() {
    let db = Database::in_memory().await.unwrap();
    insert_games(&db, &["Dota 2", "League of Legends", "Valorant"]).await;

    let response = engine(&db)
        .search(&SearchParams::new("Dota").entity_type("games").mode("exact"))
        .await
        .unwrap();

    assert_eq!(response.pagination.total, Some(1));
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.search_type, SearchType::Exact);
    let hit = response.results.iter().next().unwrap();
    assert_eq!(hit.fields["game_name"], "Dota 2");
    assert_eq!(hit.similarity_score, None);
}

#[tokio::test]
async fn test_fuzzy_search_respects_threshold() {
    let db = Database::in_memory().await.unwrap();
    insert_games(&db, &["Dota 2", "League of Legends", "Valorant"]).await;
    let engine = engine(&db);

    let response = engine
        .search(
            &SearchParams::new("Dot2")
                .entity_type("games")
                .mode("fuzzy")
                .threshold(70),
        )
        .await
        .unwrap();
    assert_eq!(response.results.len(), 1);
    let hit = response.results.iter().next().unwrap();
    assert_eq!(hit.fields["game_name"], "Dota 2");
    assert_eq!(hit.similarity_score, Some(75.0));
    assert_eq!(response.search_type, SearchType::Fuzzy);

    let strict = engine
        .search(
            &SearchParams::new("Dot2")
                .entity_type("games")
                .mode("fuzzy")
                .threshold(95),
        )
        .await
        .unwrap();
    assert!(strict.results.is_empty());
    assert_eq!(strict.pagination.total, Some(0));
}

#[tokio::test]
async fn test_unknown_filter_field_is_rejected() {
    let db = Database::in_memory().await.unwrap();
    insert_games(&db, &["Dota 2"]).await;

    let err = engine(&db)
        .search(
            &SearchParams::new("dota")
                .entity_type("games")
                .filter("founded_year", "2011"),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::InvalidFilterField { .. })
    ));

    // Nothing is logged for a rejected request
    let logged: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM search_logs")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(logged.0, 0);
}

#[tokio::test]
async fn test_filter_narrows_exact_results() {
    let db = Database::in_memory().await.unwrap();
    for (name, genre) in [("Dota 2", "MOBA"), ("Dota Auto Chess", "Strategy")] {
        sqlx::query("INSERT INTO games (game_name, genre) VALUES (?, ?)")
            .bind(name)
            .bind(genre)
            .execute(db.pool())
            .await
            .unwrap();
    }

    let response = engine(&db)
        .search(
            &SearchParams::new("dota")
                .entity_type("games")
                .mode("exact")
                .filter("genre", "MOBA"),
        )
        .await
        .unwrap();
    assert_eq!(response.pagination.total, Some(1));
    assert_eq!(response.results.iter().next().unwrap().fields["genre"], "MOBA");
}

#[tokio::test]
async fn test_page_beyond_results_is_empty() {
    let db = Database::in_memory().await.unwrap();
    insert_teams(&db).await;

    let response = engine(&db)
        .search(
            &SearchParams::new("team")
                .entity_type("teams")
                .mode("exact")
                .page(50)
                .per_page(10),
        )
        .await
        .unwrap();

    assert!(response.results.is_empty());
    assert!(!response.pagination.has_next);
    assert_eq!(response.pagination.page, 50);
    assert_eq!(response.pagination.per_page, 10);
    assert_eq!(response.pagination.total, Some(45));
    assert_eq!(response.pagination.next_cursor, None);
}

#[tokio::test]
async fn test_offset_pages_visit_every_row_once() {
    let db = Database::in_memory().await.unwrap();
    insert_teams(&db).await;
    let engine = engine(&db);

    let mut seen = Vec::new();
    for page in 1..=5 {
        let response = engine
            .search(
                &SearchParams::new("team")
                    .entity_type("teams")
                    .mode("exact")
                    .page(page)
                    .per_page(10),
            )
            .await
            .unwrap();
        assert_eq!(response.pagination.total, Some(45));
        assert_eq!(response.pagination.has_next, page < 5);
        seen.extend(result_ids(&response.results));
    }

    assert_eq!(seen.len(), 45);
    assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 45);
}

#[tokio::test]
async fn test_search_cursor_walks_all_pages() {
    let db = Database::in_memory().await.unwrap();
    insert_teams(&db).await;
    let engine = engine(&db);

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0;
    loop {
        let mut params = SearchParams::new("team")
            .entity_type("teams")
            .mode("exact")
            .per_page(20);
        if let Some(token) = cursor.take() {
            params = params.cursor(token);
        }
        let response = engine.search(&params).await.unwrap();
        seen.extend(result_ids(&response.results));
        pages += 1;

        match response.pagination.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
        assert!(pages < 10, "cursor did not terminate");
    }

    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 45);
    assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 45);
}

#[tokio::test]
async fn test_bad_search_cursor_restarts_from_first_page() {
    let db = Database::in_memory().await.unwrap();
    insert_teams(&db).await;

    let response = engine(&db)
        .search(
            &SearchParams::new("team")
                .entity_type("teams")
                .mode("exact")
                .per_page(10)
                .cursor("not-a-cursor"),
        )
        .await
        .unwrap();
    assert_eq!(response.pagination.page, 1);
    assert_eq!(response.results.len(), 10);
}

#[tokio::test]
async fn test_forged_rank_cursor_stays_within_page_limit() {
    let db = Database::in_memory().await.unwrap();
    insert_teams(&db).await;
    let engine = engine(&db);
    let max_page = SearchConfig::default().max_page_number;

    for offset in [u64::MAX, u64::MAX - 5, 5_000_000] {
        let response = engine
            .search(
                &SearchParams::new("team")
                    .entity_type("teams")
                    .mode("exact")
                    .per_page(10)
                    .cursor(CursorToken::rank(offset).encode()),
            )
            .await
            .unwrap();
        assert_eq!(response.pagination.page, max_page, "offset {offset}");
        assert!(response.results.is_empty());
        assert!(!response.pagination.has_next);
        assert_eq!(response.pagination.next_cursor, None);
    }
}

#[tokio::test]
async fn test_punctuation_query_does_not_match_empty_documents() {
    let db = Database::in_memory().await.unwrap();
    sqlx::query("INSERT INTO players (data) VALUES ('{}')")
        .execute(db.pool())
        .await
        .unwrap();

    let response = engine(&db)
        .search(
            &SearchParams::new("!!")
                .entity_type("players")
                .mode("fuzzy")
                .threshold(95),
        )
        .await
        .unwrap();
    assert!(response.results.is_empty());
    assert_eq!(response.pagination.total, Some(0));
}

#[tokio::test]
async fn test_auto_mode_skips_fuzzy_when_exact_is_enough() {
    let db = Database::in_memory().await.unwrap();
    insert_teams(&db).await;
    let fuzzy = Arc::new(CountingFuzzy::default());
    let engine = engine(&db).with_executors(Arc::new(ExactExecutor), fuzzy.clone());

    let response = engine
        .search(&SearchParams::new("team").entity_type("teams"))
        .await
        .unwrap();
    assert_eq!(response.pagination.total, Some(45));
    assert_eq!(response.search_type, SearchType::Exact);
    assert_eq!(fuzzy.calls.load(Ordering::SeqCst), 0);

    // No exact hit for the misspelling, so the fallback runs
    let response = engine
        .search(&SearchParams::new("Teem").entity_type("teams"))
        .await
        .unwrap();
    assert_eq!(fuzzy.calls.load(Ordering::SeqCst), 1);
    assert_eq!(response.search_type, SearchType::Fuzzy);
    assert!(!response.results.is_empty());
}

#[tokio::test]
async fn test_suggestions_when_nothing_matches() {
    let db = Database::in_memory().await.unwrap();
    insert_games(&db, &["Dota 2", "League of Legends", "Valorant"]).await;

    let response = engine(&db)
        .search(
            &SearchParams::new("Valorent")
                .entity_type("games")
                .threshold(95),
        )
        .await
        .unwrap();

    assert!(response.results.is_empty());
    let suggestions = response.suggestions.expect("suggestions expected");
    assert_eq!(suggestions.first().map(String::as_str), Some("Valorant"));
}

#[tokio::test]
async fn test_search_is_logged() {
    let db = Database::in_memory().await.unwrap();
    insert_games(&db, &["Dota 2", "League of Legends"]).await;

    engine(&db)
        .search(
            &SearchParams::new("dota")
                .entity_type("games")
                .mode("exact")
                .caller("integration"),
        )
        .await
        .unwrap();

    let row: (String, String, Option<String>, i64, i64, Option<String>, Option<String>) =
        sqlx::query_as(
            "SELECT query, mode, entity_type, result_count, page, caller, error FROM search_logs",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(row.0, "dota");
    assert_eq!(row.1, "exact");
    assert_eq!(row.2.as_deref(), Some("games"));
    assert_eq!(row.3, 1);
    assert_eq!(row.4, 1);
    assert_eq!(row.5.as_deref(), Some("integration"));
    assert_eq!(row.6, None);
}

#[tokio::test]
async fn test_slow_search_times_out() {
    let db = Database::in_memory().await.unwrap();
    insert_games(&db, &["Dota 2"]).await;
    let config = SearchConfig {
        timeout_ms: 50,
        ..SearchConfig::default()
    };
    let engine = engine_with_config(&db, config)
        .with_executors(Arc::new(SlowExecutor), Arc::new(SlowExecutor));

    let response = engine
        .search(&SearchParams::new("dota").entity_type("games"))
        .await
        .unwrap();

    assert!(response.results.is_empty());
    assert_eq!(response.pagination.total, Some(0));
    assert!(response.errors["games"].contains("timed out"));

    let error: (Option<String>,) = sqlx::query_as("SELECT error FROM search_logs")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert!(error.0.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_global_hybrid_search() {
    let db = Database::in_memory().await.unwrap();
    insert_games(&db, &["Dota 2", "Valorant"]).await;
    sqlx::query("INSERT INTO teams (team_name, region, game) VALUES ('Team Secret', 'EU', 'Dota 2')")
        .execute(db.pool())
        .await
        .unwrap();

    let response = engine(&db)
        .search(&SearchParams::new("dota").mode("hybrid"))
        .await
        .unwrap();

    assert_eq!(response.entity_type, None);
    assert_eq!(response.search_type, SearchType::Hybrid);
    let SearchResults::Grouped(groups) = &response.results else {
        panic!("global search must group results by type");
    };
    assert_eq!(groups.len(), EntityCatalog::builtin().len());

    // Found by both executors, kept once
    let games = response.results_for("games");
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].fields["game_name"], "Dota 2");
    assert_eq!(games[0].entity_type.as_deref(), Some("games"));

    let teams = response.results_for("teams");
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0].fields["team_name"], "Team Secret");
    assert!(response.results_for("news").is_empty());
}

#[tokio::test]
async fn test_player_documents_search_and_filter() {
    let db = Database::in_memory().await.unwrap();
    for doc in [
        r#"{"Player_Information": {"ID": "Faker", "Romanized Name": "Lee Sang-hyeok", "Team": "T1", "Country": "South Korea"}}"#,
        r#"{"Player_Information": {"ID": "Fakeout", "Romanized Name": "Kim Min-jun", "Team": "Gen.G", "Country": "South Korea"}}"#,
        r#"{"Player_Information": {"ID": "Caps", "Romanized Name": "Rasmus Winther", "Team": "G2 Esports", "Country": "Denmark"}}"#,
    ] {
        sqlx::query("INSERT INTO players (data) VALUES (?)")
            .bind(doc)
            .execute(db.pool())
            .await
            .unwrap();
    }
    let engine = engine(&db);

    let response = engine
        .search(&SearchParams::new("fake").entity_type("players").mode("exact"))
        .await
        .unwrap();
    assert_eq!(response.pagination.total, Some(2));

    let filtered = engine
        .search(
            &SearchParams::new("fake")
                .entity_type("players")
                .mode("exact")
                .filter("Player_Information.Team", "t1"),
        )
        .await
        .unwrap();
    assert_eq!(filtered.results.len(), 1);
    let hit = filtered.results.iter().next().unwrap();
    assert_eq!(hit.fields["Player_Information"]["ID"], "Faker");
}

#[tokio::test]
async fn test_table_pagination_with_filter() {
    let db = Database::in_memory().await.unwrap();
    insert_teams(&db).await;
    sqlx::query("UPDATE teams SET region = 'NA' WHERE id % 3 = 0")
        .execute(db.pool())
        .await
        .unwrap();
    let engine = engine(&db);

    let query = TableQuery::new("teams", "team_name")
        .filter("region = ?", vec![SqlValue::Text("NA".to_string())])
        .direction(SortDirection::Desc);
    let page = engine.paginate_table(&query, 1, 10).await.unwrap();

    assert_eq!(page.pagination.total, Some(15));
    assert!(page.pagination.has_next);
    assert_eq!(page.items.len(), 10);
    assert_eq!(page.items[0]["team_name"], "Team 45");
    assert!(page.items.iter().all(|row| row["region"] == "NA"));

    let last = engine.paginate_table(&query, 2, 10).await.unwrap();
    assert_eq!(last.items.len(), 5);
    assert!(!last.pagination.has_next);
}

#[tokio::test]
async fn test_table_cursor_over_duplicate_keys() {
    let db = Database::in_memory().await.unwrap();
    insert_teams(&db).await;
    let engine = engine(&db);

    // Every row shares the same region, so only the row identity breaks ties
    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = engine
            .paginate_by_cursor("teams", "region", SortDirection::Asc, cursor.as_deref(), 7)
            .await
            .unwrap();
        seen.extend(page.items.iter().map(|row| row["id"].as_i64().unwrap()));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
        assert!(seen.len() <= 45, "cursor revisited rows");
    }

    assert_eq!(seen, (1..=45).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_file_backed_database_persists_between_opens() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("statline.db");

    {
        let db = Database::new(DatabaseConfig::with_path(&path)).await.unwrap();
        insert_games(&db, &["Dota 2"]).await;
        db.close().await;
    }

    let db = Database::new(DatabaseConfig::with_path(&path)).await.unwrap();
    let status = db.migration_status().await.unwrap();
    assert!(!status.needs_migration);

    let response = engine(&db)
        .search(&SearchParams::new("dota").entity_type("games").mode("exact"))
        .await
        .unwrap();
    assert_eq!(response.pagination.total, Some(1));
}
