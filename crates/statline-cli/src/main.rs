//! Statline CLI - search and page through esports statistics

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use statline_core::catalog::{EntityCatalog, SearchableEntity, SortDirection};
use statline_core::config::Config;
use statline_core::pagination::TableQuery;
use statline_core::search::{SearchEngine, SearchParams, SearchResponse, SearchResult};
use statline_core::storage::rows::SqlValue;
use statline_core::storage::{Database, DatabaseConfig};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "statline")]
#[command(author, version, about = "Search esports statistics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file (overrides database.path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Search one entity type, or all of them
    Search {
        /// Free-text query
        query: String,
        /// Entity type (omit for a global search)
        #[arg(short = 't', long = "type")]
        entity_type: Option<String>,
        /// Search mode: exact, fuzzy, auto or hybrid
        #[arg(short, long)]
        mode: Option<String>,
        /// Page number (1-based)
        #[arg(short, long)]
        page: Option<String>,
        /// Results per page
        #[arg(long)]
        per_page: Option<String>,
        /// Resume from a `next_cursor` of a previous search
        #[arg(long)]
        cursor: Option<String>,
        /// Fuzzy similarity threshold (0-100)
        #[arg(long)]
        threshold: Option<String>,
        /// Filter as FIELD=VALUE
        #[arg(long)]
        filter: Option<String>,
        /// Caller identity recorded in the search log
        #[arg(long, default_value = "cli")]
        caller: String,
    },

    /// Suggest spelling corrections for a query
    Suggest {
        query: String,
        /// Maximum number of suggestions (0 = configured default)
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },

    /// Page through a table by offset
    Page {
        table: String,
        /// Ordering column
        #[arg(long, default_value = "id")]
        order_by: String,
        /// Descending order
        #[arg(long)]
        desc: bool,
        /// SQL condition with `?` placeholders
        #[arg(long = "where")]
        where_clause: Option<String>,
        /// Placeholder value (repeatable, in order)
        #[arg(long = "param")]
        params: Vec<String>,
        #[arg(short, long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 20)]
        per_page: i64,
    },

    /// Page through a table by cursor
    Cursor {
        table: String,
        /// Ordering column
        #[arg(long, default_value = "id")]
        order_by: String,
        /// Descending order
        #[arg(long)]
        desc: bool,
        /// Token from a previous page's next_cursor
        #[arg(long)]
        cursor: Option<String>,
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },

    /// Show searchable entity types
    Catalog {
        /// Show one entity type in detail
        #[arg(short = 't', long = "type")]
        entity_type: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Database maintenance
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

#[derive(Subcommand)]
enum DbAction {
    /// Apply pending schema migrations
    Migrate,
    /// Show schema version
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    // RUST_LOG wins over the configured level; logs go to stderr so JSON
    // output stays parseable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        EnvFilter::new(format!("statline={level},statline_core={level},warn"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = App {
        config,
        db_override: cli.db.clone(),
        format: cli.format,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Search {
            query,
            entity_type,
            mode,
            page,
            per_page,
            cursor,
            threshold,
            filter,
            caller,
        } => {
            let mut params = SearchParams::new(query).caller(caller);
            params.entity_type = entity_type;
            params.mode = mode;
            params.page = page;
            params.per_page = per_page;
            params.cursor = cursor;
            params.threshold = threshold;
            if let Some(filter) = filter {
                let (field, value) = filter
                    .split_once('=')
                    .ok_or_else(|| anyhow!("--filter expects FIELD=VALUE, got '{}'", filter))?;
                params = params.filter(field.trim(), value.trim());
            }
            cmd_search(&ctx, params).await
        }

        Commands::Suggest { query, limit } => cmd_suggest(&ctx, &query, limit).await,

        Commands::Page {
            table,
            order_by,
            desc,
            where_clause,
            params,
            page,
            per_page,
        } => {
            let mut query = TableQuery::new(table, order_by).direction(direction(desc));
            if let Some(clause) = where_clause {
                query = query.filter(clause, params.iter().map(|p| parse_param(p)).collect());
            }
            cmd_page(&ctx, &query, page, per_page).await
        }

        Commands::Cursor {
            table,
            order_by,
            desc,
            cursor,
            limit,
        } => cmd_cursor(&ctx, &table, &order_by, direction(desc), cursor.as_deref(), limit).await,

        Commands::Catalog { entity_type } => cmd_catalog(&ctx, entity_type.as_deref()),

        Commands::Config { action } => cmd_config(&ctx, action),

        Commands::Db { action } => cmd_db(&ctx, action).await,
    }
}

/// Shared command state
struct App {
    config: Config,
    db_override: Option<PathBuf>,
    format: OutputFormat,
    quiet: bool,
}

impl App {
    fn database_config(&self) -> DatabaseConfig {
        let mut settings = self.config.database.clone();
        if let Some(path) = &self.db_override {
            settings.path = path.clone();
        }
        DatabaseConfig::from(&settings)
    }

    async fn open_database(&self) -> anyhow::Result<Database> {
        let db_config = self.database_config();
        debug!(path = %db_config.path.display(), "Opening database");
        Database::new(db_config).await
    }

    async fn engine(&self) -> anyhow::Result<SearchEngine> {
        let db = self.open_database().await?;
        SearchEngine::new(
            db.pool().clone(),
            EntityCatalog::builtin(),
            self.config.search.clone(),
        )
        .map_err(describe)
    }

    fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

fn direction(desc: bool) -> SortDirection {
    if desc {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    }
}

/// Integers and reals bind as numbers, anything else as text
fn parse_param(raw: &str) -> SqlValue {
    if let Ok(i) = raw.parse::<i64>() {
        SqlValue::Integer(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        SqlValue::Real(f)
    } else {
        SqlValue::Text(raw.to_string())
    }
}

/// Render a core error with its code and, when known, a follow-up command
fn describe(err: statline_core::Error) -> anyhow::Error {
    let code = match &err {
        statline_core::Error::Validation(v) => format!("{} {}", err.code(), v.code()),
        _ => err.code().to_string(),
    };
    match err.suggestion() {
        Some(hint) => anyhow!("[{}] {}\n  Try: {}", code, err, hint),
        None => anyhow!("[{}] {}", code, err),
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_search(ctx: &App, params: SearchParams) -> anyhow::Result<()> {
    let engine = ctx.engine().await?;
    let response = engine.search(&params).await.map_err(describe)?;

    if ctx.is_json() {
        return print_json(&response);
    }

    print_search_summary(&response, ctx.quiet);
    for result in response.results.iter() {
        println!("  {}", result_line(engine.catalog(), result, response.entity_type.as_deref()));
    }
    if !ctx.quiet {
        if let Some(suggestions) = &response.suggestions {
            println!("Did you mean: {}", suggestions.join(", "));
        }
        if let Some(cursor) = &response.pagination.next_cursor {
            println!("Next page: --cursor {}", cursor);
        }
        for (entity_type, error) in &response.errors {
            println!("[!!] {}: {}", entity_type, error);
        }
    }
    Ok(())
}

fn print_search_summary(response: &SearchResponse, quiet: bool) {
    if quiet {
        return;
    }
    let p = &response.pagination;
    let total = p
        .total
        .map(|t| t.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!(
        "{} result(s) for '{}' ({} search, total {}, page {}, {} per page, {:.1} ms)",
        response.results.len(),
        response.query,
        response.search_type,
        total,
        p.page,
        p.per_page,
        response.execution_time * 1000.0
    );
}

fn result_line(catalog: &EntityCatalog, result: &SearchResult, requested: Option<&str>) -> String {
    let entity_type = result.entity_type.as_deref().or(requested).unwrap_or("?");
    let title = catalog
        .get(entity_type)
        .and_then(|entity| {
            entity
                .title_field()
                .and_then(|field| entity.field_text(&result.fields, field))
        })
        .unwrap_or_else(|| "(untitled)".to_string());
    match result.similarity_score {
        Some(score) => format!("[{}] #{} {} ({:.0})", entity_type, result.id, title, score),
        None => format!("[{}] #{} {}", entity_type, result.id, title),
    }
}

async fn cmd_suggest(ctx: &App, query: &str, limit: usize) -> anyhow::Result<()> {
    let engine = ctx.engine().await?;
    let suggestions = engine.suggest(query, limit).await.map_err(describe)?;

    if ctx.is_json() {
        return print_json(&json!({ "query": query, "suggestions": suggestions }));
    }
    if suggestions.is_empty() {
        if !ctx.quiet {
            println!("No suggestions for '{}'", query);
        }
    } else {
        for suggestion in suggestions {
            println!("{}", suggestion);
        }
    }
    Ok(())
}

async fn cmd_page(ctx: &App, query: &TableQuery, page: i64, per_page: i64) -> anyhow::Result<()> {
    let engine = ctx.engine().await?;
    let result = engine
        .paginate_table(query, page, per_page)
        .await
        .map_err(describe)?;

    if ctx.is_json() {
        return print_json(&result);
    }
    for item in &result.items {
        println!("{}", Value::Object(item.clone()));
    }
    if !ctx.quiet {
        let p = &result.pagination;
        let total = p
            .total
            .map(|t| t.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "-- page {} ({} per page), total {}, has next: {}",
            p.page, p.per_page, total, p.has_next
        );
    }
    Ok(())
}

async fn cmd_cursor(
    ctx: &App,
    table: &str,
    order_by: &str,
    direction: SortDirection,
    cursor: Option<&str>,
    limit: i64,
) -> anyhow::Result<()> {
    let engine = ctx.engine().await?;
    let page = engine
        .paginate_by_cursor(table, order_by, direction, cursor, limit)
        .await
        .map_err(describe)?;

    if ctx.is_json() {
        return print_json(&page);
    }
    for item in &page.items {
        println!("{}", Value::Object(item.clone()));
    }
    if !ctx.quiet {
        match &page.next_cursor {
            Some(next) => println!("-- next: --cursor {}", next),
            None => println!("-- end"),
        }
    }
    Ok(())
}

fn cmd_catalog(ctx: &App, entity_type: Option<&str>) -> anyhow::Result<()> {
    let catalog = EntityCatalog::builtin();

    let summaries = match entity_type {
        Some(name) => {
            let entity = catalog.get(name).ok_or_else(|| {
                anyhow!(
                    "Unknown entity type '{}'. Known types: {}",
                    name,
                    catalog.names().join(", ")
                )
            })?;
            vec![statline_core::catalog::EntitySummary::from(entity)]
        }
        None => catalog.summaries(),
    };

    if ctx.is_json() {
        return print_json(&summaries);
    }
    for summary in summaries {
        let storage = match &summary.storage {
            statline_core::catalog::StorageKind::RowBacked => "rows".to_string(),
            statline_core::catalog::StorageKind::DocumentBacked { column } => {
                format!("documents in '{}'", column)
            }
        };
        println!("{} ({}, table '{}')", summary.name, storage, summary.table);
        if entity_type.is_some() || !ctx.quiet {
            println!("  searchable: {}", summary.searchable_fields.join(", "));
            println!("  filterable: {}", summary.filterable_fields.join(", "));
            println!("  sort:       {}", summary.default_sort);
        }
    }
    Ok(())
}

fn cmd_config(ctx: &App, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let value = ctx.config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = ctx.config.clone();
            config.set(&key, &value)?;
            config.save()?;
            if !ctx.quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let items = ctx.config.list()?;
            if ctx.is_json() {
                let map: serde_json::Map<String, Value> = items
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect();
                return print_json(&map);
            }
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_db(ctx: &App, action: DbAction) -> anyhow::Result<()> {
    let db = Database::new(ctx.database_config().no_migrate()).await?;

    match action {
        DbAction::Migrate => {
            db.migrate().await?;
            if !ctx.quiet {
                println!("Database at {} is up to date.", db.path().display());
            }
        }
        DbAction::Status => {
            let status = db.migration_status().await?;
            if ctx.is_json() {
                return print_json(&json!({
                    "path": db.path().display().to_string(),
                    "current_version": status.current_version,
                    "target_version": status.target_version,
                    "needs_migration": status.needs_migration,
                }));
            }
            println!("Database: {}", db.path().display());
            println!(
                "Schema version: {} (latest {})",
                status.current_version, status.target_version
            );
            if status.needs_migration {
                println!("[!!] Migrations pending; run `statline db migrate`");
            }
        }
    }
    db.close().await;
    Ok(())
}
