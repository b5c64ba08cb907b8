//! Database migrations
//!
//! This module manages SQLite schema migrations for statline.
//! Migrations are versioned and applied automatically on database connection.
//! The ingestion side owns the data; these tables and full-text indexes are
//! the shape the search engine expects to read.

use sqlx::SqlitePool;

/// Current schema version
pub const CURRENT_VERSION: i32 = 3;

/// SQL for creating the migrations tracking table
const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: Row-backed entity tables with their full-text indexes
const MIGRATION_V1: &str = r#"
    CREATE TABLE IF NOT EXISTS games (
        id INTEGER PRIMARY KEY NOT NULL,
        game_name TEXT NOT NULL,
        genre TEXT,
        publisher TEXT,
        release_year INTEGER,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_games_genre ON games(genre);
    CREATE INDEX IF NOT EXISTS idx_games_name ON games(game_name);

    CREATE TABLE IF NOT EXISTS teams (
        id INTEGER PRIMARY KEY NOT NULL,
        team_name TEXT NOT NULL,
        region TEXT,
        game TEXT,
        founded_year INTEGER,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_teams_region ON teams(region);
    CREATE INDEX IF NOT EXISTS idx_teams_game ON teams(game);

    CREATE TABLE IF NOT EXISTS tournaments (
        id INTEGER PRIMARY KEY NOT NULL,
        tournament_name TEXT NOT NULL,
        game TEXT,
        location TEXT,
        tier TEXT,
        prize_pool REAL,
        start_date TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_tournaments_game ON tournaments(game);
    CREATE INDEX IF NOT EXISTS idx_tournaments_start_date ON tournaments(start_date);

    CREATE TABLE IF NOT EXISTS news (
        id INTEGER PRIMARY KEY NOT NULL,
        title TEXT NOT NULL,
        summary TEXT,
        author TEXT,
        game TEXT,
        url TEXT,
        published_at TIMESTAMP,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_news_published_at ON news(published_at);
    CREATE INDEX IF NOT EXISTS idx_news_game ON news(game);

    CREATE VIRTUAL TABLE IF NOT EXISTS games_fts USING fts5(
        game_name, genre, publisher,
        content='games',
        content_rowid='id'
    );

    CREATE TRIGGER IF NOT EXISTS games_ai AFTER INSERT ON games BEGIN
        INSERT INTO games_fts(rowid, game_name, genre, publisher)
        VALUES (NEW.id, NEW.game_name, NEW.genre, NEW.publisher);
    END;

    CREATE TRIGGER IF NOT EXISTS games_ad AFTER DELETE ON games BEGIN
        INSERT INTO games_fts(games_fts, rowid, game_name, genre, publisher)
        VALUES ('delete', OLD.id, OLD.game_name, OLD.genre, OLD.publisher);
    END;

    CREATE TRIGGER IF NOT EXISTS games_au AFTER UPDATE ON games BEGIN
        INSERT INTO games_fts(games_fts, rowid, game_name, genre, publisher)
        VALUES ('delete', OLD.id, OLD.game_name, OLD.genre, OLD.publisher);
        INSERT INTO games_fts(rowid, game_name, genre, publisher)
        VALUES (NEW.id, NEW.game_name, NEW.genre, NEW.publisher);
    END;

    CREATE VIRTUAL TABLE IF NOT EXISTS teams_fts USING fts5(
        team_name, region, game,
        content='teams',
        content_rowid='id'
    );

    CREATE TRIGGER IF NOT EXISTS teams_ai AFTER INSERT ON teams BEGIN
        INSERT INTO teams_fts(rowid, team_name, region, game)
        VALUES (NEW.id, NEW.team_name, NEW.region, NEW.game);
    END;

    CREATE TRIGGER IF NOT EXISTS teams_ad AFTER DELETE ON teams BEGIN
        INSERT INTO teams_fts(teams_fts, rowid, team_name, region, game)
        VALUES ('delete', OLD.id, OLD.team_name, OLD.region, OLD.game);
    END;

    CREATE TRIGGER IF NOT EXISTS teams_au AFTER UPDATE ON teams BEGIN
        INSERT INTO teams_fts(teams_fts, rowid, team_name, region, game)
        VALUES ('delete', OLD.id, OLD.team_name, OLD.region, OLD.game);
        INSERT INTO teams_fts(rowid, team_name, region, game)
        VALUES (NEW.id, NEW.team_name, NEW.region, NEW.game);
    END;

    CREATE VIRTUAL TABLE IF NOT EXISTS tournaments_fts USING fts5(
        tournament_name, game, location,
        content='tournaments',
        content_rowid='id'
    );

    CREATE TRIGGER IF NOT EXISTS tournaments_ai AFTER INSERT ON tournaments BEGIN
        INSERT INTO tournaments_fts(rowid, tournament_name, game, location)
        VALUES (NEW.id, NEW.tournament_name, NEW.game, NEW.location);
    END;

    CREATE TRIGGER IF NOT EXISTS tournaments_ad AFTER DELETE ON tournaments BEGIN
        INSERT INTO tournaments_fts(tournaments_fts, rowid, tournament_name, game, location)
        VALUES ('delete', OLD.id, OLD.tournament_name, OLD.game, OLD.location);
    END;

    CREATE TRIGGER IF NOT EXISTS tournaments_au AFTER UPDATE ON tournaments BEGIN
        INSERT INTO tournaments_fts(tournaments_fts, rowid, tournament_name, game, location)
        VALUES ('delete', OLD.id, OLD.tournament_name, OLD.game, OLD.location);
        INSERT INTO tournaments_fts(rowid, tournament_name, game, location)
        VALUES (NEW.id, NEW.tournament_name, NEW.game, NEW.location);
    END;

    CREATE VIRTUAL TABLE IF NOT EXISTS news_fts USING fts5(
        title, summary, author,
        content='news',
        content_rowid='id'
    );

    CREATE TRIGGER IF NOT EXISTS news_ai AFTER INSERT ON news BEGIN
        INSERT INTO news_fts(rowid, title, summary, author)
        VALUES (NEW.id, NEW.title, NEW.summary, NEW.author);
    END;

    CREATE TRIGGER IF NOT EXISTS news_ad AFTER DELETE ON news BEGIN
        INSERT INTO news_fts(news_fts, rowid, title, summary, author)
        VALUES ('delete', OLD.id, OLD.title, OLD.summary, OLD.author);
    END;

    CREATE TRIGGER IF NOT EXISTS news_au AFTER UPDATE ON news BEGIN
        INSERT INTO news_fts(news_fts, rowid, title, summary, author)
        VALUES ('delete', OLD.id, OLD.title, OLD.summary, OLD.author);
        INSERT INTO news_fts(rowid, title, summary, author)
        VALUES (NEW.id, NEW.title, NEW.summary, NEW.author);
    END;
"#;

/// Migration 2: Document-backed entity tables
///
/// Scraped player and match pages are stored as one JSON blob per record.
/// No inverted index exists for these; the executors evaluate field paths.
const MIGRATION_V2: &str = r#"
    CREATE TABLE IF NOT EXISTS players (
        id INTEGER PRIMARY KEY NOT NULL,
        data TEXT NOT NULL,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_players_updated_at ON players(updated_at);

    CREATE TABLE IF NOT EXISTS matches (
        id INTEGER PRIMARY KEY NOT NULL,
        data TEXT NOT NULL,
        match_date TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_matches_match_date ON matches(match_date);
"#;

/// Migration 3: Search telemetry
const MIGRATION_V3: &str = r#"
    CREATE TABLE IF NOT EXISTS search_logs (
        id TEXT PRIMARY KEY NOT NULL,
        query TEXT NOT NULL,
        mode TEXT NOT NULL CHECK (mode IN ('exact', 'fuzzy', 'auto', 'hybrid')),
        entity_type TEXT,
        execution_time_ms REAL NOT NULL,
        result_count INTEGER NOT NULL DEFAULT 0,
        page INTEGER NOT NULL DEFAULT 1,
        per_page INTEGER NOT NULL,
        filter_field TEXT,
        filter_value TEXT,
        caller TEXT,
        error TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_search_logs_created_at ON search_logs(created_at);
    CREATE INDEX IF NOT EXISTS idx_search_logs_entity_type ON search_logs(entity_type);
"#;

/// Get the current schema version from the database
async fn get_current_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    // MAX over an empty table yields a single NULL row
    let row: Option<(Option<i32>,)> = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_optional(pool)
        .await?;

    Ok(row.and_then(|(v,)| v).unwrap_or(0))
}

/// Record that a migration was applied
async fn record_migration(pool: &SqlitePool, version: i32) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let current_version = get_current_version(pool).await?;

    tracing::info!(
        current_version = current_version,
        target_version = CURRENT_VERSION,
        "Checking database migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!("Database is up to date");
        return Ok(());
    }

    if current_version < 1 {
        tracing::info!("Applying migration v1: Row-backed entities and full-text indexes");
        sqlx::raw_sql(MIGRATION_V1).execute(pool).await?;
        record_migration(pool, 1).await?;
    }

    if current_version < 2 {
        tracing::info!("Applying migration v2: Document-backed entities");
        sqlx::raw_sql(MIGRATION_V2).execute(pool).await?;
        record_migration(pool, 2).await?;
    }

    if current_version < 3 {
        tracing::info!("Applying migration v3: Search telemetry");
        sqlx::raw_sql(MIGRATION_V3).execute(pool).await?;
        record_migration(pool, 3).await?;
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Check if the database needs migrations
pub async fn needs_migration(pool: &SqlitePool) -> anyhow::Result<bool> {
    let current_version = get_current_version(pool).await?;
    Ok(current_version < CURRENT_VERSION)
}

/// Get migration status information
pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let current_version = get_current_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Current schema version in the database
    pub current_version: i32,
    /// Target schema version (latest)
    pub target_version: i32,
    /// Whether migrations need to be run
    pub needs_migration: bool,
}
