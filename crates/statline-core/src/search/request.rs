//! Search requests and the query validator/sanitizer
//!
//! Raw caller input arrives as [`SearchParams`] (strings, as received at the
//! edge). [`QueryValidator::validate`] turns it into an immutable
//! [`SearchRequest`] or a typed [`ValidationError`] without touching storage.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::catalog::{EntityCatalog, FieldPath, SearchableEntity};
use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::pagination::{CursorState, CursorToken, OffsetWindow};

/// Typed rejection of a search request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unknown entity type '{0}'")]
    InvalidEntityType(String),

    #[error("Query must be at least {min} characters")]
    QueryTooShort { min: usize },

    #[error("Query must be at most {max} characters")]
    QueryTooLong { max: usize },

    #[error("Page must be an integer, got '{0}'")]
    InvalidPage(String),

    #[error("Page size must be an integer, got '{0}'")]
    InvalidPageSize(String),

    #[error("Unknown search mode '{0}' (expected exact, fuzzy, auto or hybrid)")]
    InvalidSearchMode(String),

    #[error("Threshold must be an integer between 0 and 100, got '{0}'")]
    InvalidThreshold(String),

    #[error("Field '{field}' is not filterable for '{entity_type}'")]
    InvalidFilterField { entity_type: String, field: String },
}

impl ValidationError {
    /// Machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidEntityType(_) => "INVALID_ENTITY_TYPE",
            Self::QueryTooShort { .. } => "QUERY_TOO_SHORT",
            Self::QueryTooLong { .. } => "QUERY_TOO_LONG",
            Self::InvalidPage(_) => "INVALID_PAGE",
            Self::InvalidPageSize(_) => "INVALID_PAGE_SIZE",
            Self::InvalidSearchMode(_) => "INVALID_SEARCH_MODE",
            Self::InvalidThreshold(_) => "INVALID_THRESHOLD",
            Self::InvalidFilterField { .. } => "INVALID_FILTER_FIELD",
        }
    }

    /// HTTP status an edge layer should answer with
    pub fn http_status(&self) -> u16 {
        400
    }
}

/// Search strategy selected by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Exact,
    Fuzzy,
    #[default]
    Auto,
    Hybrid,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::Auto => "auto",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "fuzzy" => Ok(Self::Fuzzy),
            "auto" | "" => Ok(Self::Auto),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(ValidationError::InvalidSearchMode(s.to_string())),
        }
    }
}

/// Raw, unvalidated search input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub query: String,
    pub entity_type: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub cursor: Option<String>,
    pub mode: Option<String>,
    pub threshold: Option<String>,
    pub filter_field: Option<String>,
    pub filter_value: Option<String>,
    pub caller: Option<String>,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn page(mut self, page: impl ToString) -> Self {
        self.page = Some(page.to_string());
        self
    }

    pub fn per_page(mut self, per_page: impl ToString) -> Self {
        self.per_page = Some(per_page.to_string());
        self
    }

    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn mode(mut self, mode: impl ToString) -> Self {
        self.mode = Some(mode.to_string());
        self
    }

    pub fn threshold(mut self, threshold: impl ToString) -> Self {
        self.threshold = Some(threshold.to_string());
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter_field = Some(field.into());
        self.filter_value = Some(value.into());
        self
    }

    pub fn caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }
}

/// A single field/value filter, checked against the entity's filterable fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: FieldPath,
    pub value: String,
}

/// A validated, normalized search request
#[derive(Debug, Clone)]
pub struct SearchRequest {
    query: String,
    entity_type: Option<String>,
    window: OffsetWindow,
    mode: SearchMode,
    threshold: u8,
    filter: Option<Filter>,
    cursor_rejected: bool,
    caller: Option<String>,
}

impl SearchRequest {
    /// Sanitized query text
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Canonical entity-type name, `None` for a global search
    pub fn entity_type(&self) -> Option<&str> {
        self.entity_type.as_deref()
    }

    pub fn window(&self) -> &OffsetWindow {
        &self.window
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Whether a supplied cursor failed to decode and paging restarted
    pub fn cursor_rejected(&self) -> bool {
        self.cursor_rejected
    }

    pub fn caller(&self) -> Option<&str> {
        self.caller.as_deref()
    }
}

/// Validates and sanitizes raw search input
#[derive(Debug, Clone)]
pub struct QueryValidator {
    denylist: Vec<Regex>,
    config: SearchConfig,
}

impl QueryValidator {
    /// Compile the configured denylist
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let denylist = config
            .denylist
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| Error::ConfigError(format!("Invalid denylist pattern: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            denylist,
            config: config.clone(),
        })
    }

    /// Strip denylisted substrings and collapse whitespace
    pub fn sanitize(&self, raw: &str) -> String {
        let mut text = raw.to_string();
        for pattern in &self.denylist {
            if pattern.is_match(&text) {
                text = pattern.replace_all(&text, " ").into_owned();
            }
        }
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Check length bounds and sanitize a bare query
    pub fn clean_query(&self, raw: &str) -> std::result::Result<String, ValidationError> {
        if raw.chars().count() > self.config.max_query_length {
            return Err(ValidationError::QueryTooLong {
                max: self.config.max_query_length,
            });
        }
        let query = self.sanitize(raw);
        if query.chars().count() < self.config.min_query_length {
            return Err(ValidationError::QueryTooShort {
                min: self.config.min_query_length,
            });
        }
        Ok(query)
    }

    /// Validate raw input against the catalog; performs no storage access
    pub fn validate(
        &self,
        params: &SearchParams,
        catalog: &EntityCatalog,
    ) -> std::result::Result<SearchRequest, ValidationError> {
        let query = self.clean_query(&params.query)?;

        let entity = match non_empty(&params.entity_type) {
            Some(name) => Some(
                catalog
                    .get(name)
                    .ok_or_else(|| ValidationError::InvalidEntityType(name.to_string()))?,
            ),
            None => None,
        };

        let mode = match non_empty(&params.mode) {
            Some(mode) => mode.parse::<SearchMode>()?,
            None => SearchMode::default(),
        };

        let per_page = match non_empty(&params.per_page) {
            Some(raw) => parse_int(raw).ok_or_else(|| ValidationError::InvalidPageSize(raw.to_string()))?,
            None => i64::from(self.config.default_per_page),
        };

        let page = match non_empty(&params.page) {
            Some(raw) => parse_int(raw).ok_or_else(|| ValidationError::InvalidPage(raw.to_string()))?,
            None => 1,
        };

        let threshold = match non_empty(&params.threshold) {
            Some(raw) => parse_int(raw)
                .ok_or_else(|| ValidationError::InvalidThreshold(raw.to_string()))?
                .clamp(0, 100) as u8,
            None => self.config.fuzzy_threshold,
        };

        let filter = match non_empty(&params.filter_field) {
            Some(field) => {
                let Some(entity) = entity else {
                    return Err(ValidationError::InvalidFilterField {
                        entity_type: "all".to_string(),
                        field: field.to_string(),
                    });
                };
                let path = entity.filter_field(field).ok_or_else(|| {
                    ValidationError::InvalidFilterField {
                        entity_type: entity.name().to_string(),
                        field: field.to_string(),
                    }
                })?;
                non_empty(&params.filter_value).map(|value| Filter {
                    field: path.clone(),
                    value: value.to_string(),
                })
            }
            None => None,
        };

        let cursor = CursorToken::decode(params.cursor.as_deref());
        let cursor_rejected = cursor.is_invalid();
        let window = match cursor {
            CursorState::Valid(token) => match token.rank_offset() {
                Some(offset) => OffsetWindow::at_offset(offset, per_page, &self.config),
                None => OffsetWindow::from_page(1, per_page, &self.config),
            },
            CursorState::Invalid => OffsetWindow::from_page(1, per_page, &self.config),
            CursorState::NoCursor => OffsetWindow::from_page(page, per_page, &self.config),
        };

        Ok(SearchRequest {
            query,
            entity_type: entity.map(|e| e.name().to_string()),
            window,
            mode,
            threshold,
            filter,
            cursor_rejected,
            caller: non_empty(&params.caller).map(str::to_string),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parse an integer, saturating values too large for i64
fn parse_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(if raw.starts_with('-') { i64::MIN } else { i64::MAX })
}
