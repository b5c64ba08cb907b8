//! Pagination engine
//!
//! Two strategies over a strictly ordered key:
//!
//! - **Offset**: fetch `per_page + 1` rows at an offset; the extra row only
//!   signals `has_next`. Totals are counted on page 1 and below the
//!   configured offset threshold, and reported as unknown beyond it.
//! - **Cursor**: see [`cursor`]; an opaque token carries the last ordering
//!   key so the next page is a range predicate rather than an offset.

pub mod cursor;

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::catalog::SortDirection;
use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::storage::rows::{RowMap, SqlValue, bind_all, checked_identifier, row_to_map};

pub use cursor::{CursorPage, CursorState, CursorToken, paginate_by_cursor};

/// A clamped slice of an ordered result sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetWindow {
    offset: u64,
    per_page: u32,
}

impl OffsetWindow {
    /// Window for a 1-based page, clamping both values into the configured bounds
    pub fn from_page(page: i64, per_page: i64, limits: &SearchConfig) -> Self {
        let per_page = clamp_per_page(per_page, limits);
        let page = page.clamp(1, i64::from(limits.max_page_number.max(1))) as u64;
        Self {
            offset: (page - 1) * u64::from(per_page),
            per_page,
        }
    }

    /// Window starting at an arbitrary offset, as resumed from a search cursor
    ///
    /// The offset is capped so the window never starts beyond the last
    /// allowed page.
    pub fn at_offset(offset: u64, per_page: i64, limits: &SearchConfig) -> Self {
        let per_page = clamp_per_page(per_page, limits);
        let last_page_offset =
            u64::from(limits.max_page_number.max(1) - 1) * u64::from(per_page);
        Self {
            offset: offset.min(last_page_offset),
            per_page,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// 1-based page containing the window's first row
    pub fn page(&self) -> u32 {
        let page = self.offset / u64::from(self.per_page) + 1;
        u32::try_from(page).unwrap_or(u32::MAX)
    }

    /// Rows to fetch: one more than the page so `has_next` needs no count
    pub fn fetch_limit(&self) -> u32 {
        self.per_page.saturating_add(1)
    }

    /// Offset of the window that follows this one
    pub fn next_offset(&self) -> u64 {
        self.offset.saturating_add(u64::from(self.per_page))
    }

    /// Whether a total count is affordable at this depth
    pub fn counts_total(&self, count_offset_threshold: u64) -> bool {
        self.page() == 1 || self.offset < count_offset_threshold
    }

    /// Cut this window out of an already fully materialized list
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let start = usize::try_from(self.offset).unwrap_or(usize::MAX).min(items.len());
        let end = start.saturating_add(self.per_page as usize).min(items.len());
        items[start..end].to_vec()
    }

    /// Whether more rows exist after this window in a list of `total` rows
    pub fn has_next_within(&self, total: u64) -> bool {
        self.next_offset() < total
    }
}

fn clamp_per_page(per_page: i64, limits: &SearchConfig) -> u32 {
    per_page.clamp(1, i64::from(limits.max_per_page.max(1))) as u32
}

/// Pagination metadata returned with every page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationEnvelope {
    /// `None` when counting would have been too expensive
    pub total: Option<u64>,
    pub page: u32,
    pub per_page: u32,
    pub has_next: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl PaginationEnvelope {
    pub fn new(window: &OffsetWindow, total: Option<u64>, has_next: bool) -> Self {
        Self {
            total,
            page: window.page(),
            per_page: window.per_page(),
            has_next,
            next_cursor: None,
        }
    }

    /// Envelope for a window with no rows
    pub fn empty(window: &OffsetWindow) -> Self {
        Self::new(window, Some(0), false)
    }

    pub fn with_next_cursor(mut self, cursor: Option<String>) -> Self {
        self.next_cursor = cursor;
        self
    }
}

/// Input for a direct offset-paginated table read
#[derive(Debug, Clone)]
pub struct TableQuery {
    pub table: String,
    /// SQL condition using `?` placeholders; values go in `params`
    pub where_clause: Option<String>,
    pub params: Vec<SqlValue>,
    pub order_by: String,
    pub direction: SortDirection,
}

impl TableQuery {
    pub fn new(table: impl Into<String>, order_by: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            where_clause: None,
            params: Vec::new(),
            order_by: order_by.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn filter(mut self, clause: impl Into<String>, params: Vec<SqlValue>) -> Self {
        self.where_clause = Some(clause.into());
        self.params = params;
        self
    }

    pub fn direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    fn where_sql(&self) -> Result<String> {
        let Some(clause) = self.where_clause.as_deref().map(str::trim) else {
            return Ok(String::new());
        };
        if clause.is_empty() {
            return Ok(String::new());
        }
        if clause.contains(';') || clause.contains("--") || clause.contains("/*") {
            return Err(Error::InvalidInput(
                "Where clause may not contain statement separators or comments".to_string(),
            ));
        }
        let placeholders = count_placeholders(clause)?;
        if placeholders != self.params.len() {
            return Err(Error::InvalidInput(format!(
                "Where clause has {} placeholders but {} parameters were given",
                placeholders,
                self.params.len()
            )));
        }
        Ok(format!(" WHERE {}", clause))
    }
}

/// Bare `?` placeholders outside quoted literals
///
/// Numbered placeholders (`?1`) are rejected; parameters bind positionally.
fn count_placeholders(clause: &str) -> Result<usize> {
    let mut count = 0;
    let mut quote: Option<char> = None;
    let mut chars = clause.chars().peekable();
    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '?') => {
                if chars.peek().is_some_and(|next| next.is_ascii_digit()) {
                    return Err(Error::InvalidInput(
                        "Numbered placeholders are not supported; use bare `?`".to_string(),
                    ));
                }
                count += 1;
            }
            (None, _) => {}
        }
    }
    Ok(count)
}

/// One page of rows plus its envelope
#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    pub items: Vec<RowMap>,
    pub pagination: PaginationEnvelope,
}

/// Offset-paginated read of a table without any search machinery
pub async fn paginate_table(
    conn: &mut SqliteConnection,
    query: &TableQuery,
    page: i64,
    per_page: i64,
    limits: &SearchConfig,
) -> Result<PageResult> {
    let table = checked_identifier(&query.table, "table")?;
    let order_by = checked_identifier(&query.order_by, "column")?;
    let where_sql = query.where_sql()?;
    let window = OffsetWindow::from_page(page, per_page, limits);
    let dir = query.direction.as_sql();

    let select = format!(
        "SELECT * FROM {table}{where_sql} ORDER BY {order_by} {dir}, rowid {dir} LIMIT ? OFFSET ?"
    );
    let mut rows = bind_all(sqlx::query(&select), &query.params)
        .bind(i64::from(window.fetch_limit()))
        .bind(offset_param(window.offset()))
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(row_to_map)
        .collect::<Result<Vec<_>>>()?;

    let has_next = rows.len() > window.per_page() as usize;
    rows.truncate(window.per_page() as usize);

    let total = if window.counts_total(limits.count_offset_threshold) {
        let count_sql = format!("SELECT COUNT(*) FROM {table}{where_sql}");
        let count: i64 = bind_scalar(&count_sql, &query.params)
            .fetch_one(&mut *conn)
            .await?;
        Some(count.max(0) as u64)
    } else {
        None
    };

    debug!(
        table = %table,
        page = window.page(),
        per_page = window.per_page(),
        returned = rows.len(),
        has_next,
        counted = total.is_some(),
        "Paginated table"
    );

    Ok(PageResult {
        items: rows,
        pagination: PaginationEnvelope::new(&window, total, has_next),
    })
}

pub(crate) fn offset_param(offset: u64) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

fn bind_scalar<'q>(
    sql: &'q str,
    params: &[SqlValue],
) -> sqlx::query::QueryScalar<'q, sqlx::Sqlite, i64, sqlx::sqlite::SqliteArguments<'q>> {
    let mut query = sqlx::query_scalar(sql);
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(Option::<String>::None),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Real(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
        };
    }
    query
}
