//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Statline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseSettings,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Tunables for the search and pagination engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub min_query_length: usize,
    pub max_query_length: usize,
    pub default_per_page: u32,
    pub max_per_page: u32,
    pub max_page_number: u32,
    /// Offsets at or beyond this skip the total-count query (page 1 always counts)
    pub count_offset_threshold: u64,
    pub fuzzy_threshold: u8,
    /// Exact totals below this trigger the fuzzy fallback in auto mode
    pub liveness_threshold: u64,
    pub suggestion_threshold: u8,
    pub suggestion_limit: usize,
    pub hybrid_candidate_limit: u32,
    /// Overall search deadline; 0 disables it
    pub timeout_ms: u64,
    /// Case-insensitive patterns stripped from queries before execution
    pub denylist: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: crate::storage::database::default_database_path(),
            max_connections: 5,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_query_length: 2,
            max_query_length: 500,
            default_per_page: 20,
            max_per_page: 100,
            max_page_number: 1000,
            count_offset_threshold: 1000,
            fuzzy_threshold: 70,
            liveness_threshold: 3,
            suggestion_threshold: 60,
            suggestion_limit: 5,
            hybrid_candidate_limit: 1000,
            timeout_ms: 10_000,
            denylist: default_denylist(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Default sanitizer patterns: SQL keyword runs, comment markers, boolean
/// tautologies, script and event-handler markers, angle brackets and quotes.
pub fn default_denylist() -> Vec<String> {
    [
        r"\b(union\s+(all\s+)?select|select\s+[\w\*,\s]+?\s+from|insert\s+into|delete\s+from|drop\s+(table|database)|alter\s+table|truncate\s+table|update\s+\w+\s+set|exec(ute)?\s+\w+)\b",
        r"--",
        r"/\*|\*/",
        r";",
        r#"\b(or|and)\s+(\d+|'[^']*'|"[^"]*")\s*=\s*(\d+|'[^']*'|"[^"]*")"#,
        r"<\s*/?\s*script[^>]*>",
        r"javascript\s*:",
        r"\bon[a-z]+\s*=",
        r"[<>]",
        r#"['"`]"#,
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

impl SearchConfig {
    /// The configured deadline, if any
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Validate bounds and patterns
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_query_length == 0 {
            return Err(anyhow!("search.min_query_length must be at least 1"));
        }
        if self.min_query_length > self.max_query_length {
            return Err(anyhow!(
                "search.min_query_length ({}) exceeds search.max_query_length ({})",
                self.min_query_length,
                self.max_query_length
            ));
        }
        if self.max_per_page == 0 || self.max_page_number == 0 {
            return Err(anyhow!("search.max_per_page and search.max_page_number must be positive"));
        }
        if self.default_per_page == 0 || self.default_per_page > self.max_per_page {
            return Err(anyhow!(
                "search.default_per_page must be between 1 and {}",
                self.max_per_page
            ));
        }
        if self.fuzzy_threshold > 100 || self.suggestion_threshold > 100 {
            return Err(anyhow!("Similarity thresholds must be between 0 and 100"));
        }
        if self.hybrid_candidate_limit == 0 {
            return Err(anyhow!("search.hybrid_candidate_limit must be positive"));
        }
        for pattern in &self.denylist {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("Invalid denylist pattern: {}", pattern))?;
        }
        Ok(())
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("STATLINE_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("statline")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or fall back to defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.max_connections == 0 {
            return Err(anyhow!("database.max_connections must be positive"));
        }
        self.search.validate()
    }

    /// All keys understood by `get` and `set`
    pub fn keys() -> &'static [&'static str] {
        &[
            "database.path",
            "database.max_connections",
            "search.min_query_length",
            "search.max_query_length",
            "search.default_per_page",
            "search.max_per_page",
            "search.max_page_number",
            "search.count_offset_threshold",
            "search.fuzzy_threshold",
            "search.liveness_threshold",
            "search.suggestion_threshold",
            "search.suggestion_limit",
            "search.hybrid_candidate_limit",
            "search.timeout_ms",
            "logging.level",
        ]
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        let s = &self.search;
        match key {
            "database.path" => Ok(self.database.path.display().to_string()),
            "database.max_connections" => Ok(self.database.max_connections.to_string()),
            "search.min_query_length" => Ok(s.min_query_length.to_string()),
            "search.max_query_length" => Ok(s.max_query_length.to_string()),
            "search.default_per_page" => Ok(s.default_per_page.to_string()),
            "search.max_per_page" => Ok(s.max_per_page.to_string()),
            "search.max_page_number" => Ok(s.max_page_number.to_string()),
            "search.count_offset_threshold" => Ok(s.count_offset_threshold.to_string()),
            "search.fuzzy_threshold" => Ok(s.fuzzy_threshold.to_string()),
            "search.liveness_threshold" => Ok(s.liveness_threshold.to_string()),
            "search.suggestion_threshold" => Ok(s.suggestion_threshold.to_string()),
            "search.suggestion_limit" => Ok(s.suggestion_limit.to_string()),
            "search.hybrid_candidate_limit" => Ok(s.hybrid_candidate_limit.to_string()),
            "search.timeout_ms" => Ok(s.timeout_ms.to_string()),
            "logging.level" => Ok(self.logging.level.clone()),
            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `statline config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T>
        where
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            value
                .parse()
                .with_context(|| format!("Invalid {} value: {}", key, value))
        }

        let mut next = self.clone();
        let s = &mut next.search;
        match key {
            "database.path" => next.database.path = PathBuf::from(value),
            "database.max_connections" => next.database.max_connections = parse(key, value)?,
            "search.min_query_length" => s.min_query_length = parse(key, value)?,
            "search.max_query_length" => s.max_query_length = parse(key, value)?,
            "search.default_per_page" => s.default_per_page = parse(key, value)?,
            "search.max_per_page" => s.max_per_page = parse(key, value)?,
            "search.max_page_number" => s.max_page_number = parse(key, value)?,
            "search.count_offset_threshold" => s.count_offset_threshold = parse(key, value)?,
            "search.fuzzy_threshold" => s.fuzzy_threshold = parse(key, value)?,
            "search.liveness_threshold" => s.liveness_threshold = parse(key, value)?,
            "search.suggestion_threshold" => s.suggestion_threshold = parse(key, value)?,
            "search.suggestion_limit" => s.suggestion_limit = parse(key, value)?,
            "search.hybrid_candidate_limit" => s.hybrid_candidate_limit = parse(key, value)?,
            "search.timeout_ms" => s.timeout_ms = parse(key, value)?,
            "logging.level" => {
                let valid = ["trace", "debug", "info", "warn", "error"];
                if !valid.contains(&value) {
                    return Err(anyhow!(
                        "Invalid log level: {}. Valid options: {}",
                        value,
                        valid.join(", ")
                    ));
                }
                next.logging.level = value.to_string();
            }
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `statline config list` to see available keys.",
                    key
                ));
            }
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        Self::keys()
            .iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }
}
