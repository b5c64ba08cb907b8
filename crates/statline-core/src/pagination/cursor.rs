//! Cursor tokens and cursor-based pagination
//!
//! A cursor is a versioned JSON value (ordering field, last value, last row
//! id, direction) encoded as URL-safe base64. Callers treat it as opaque.
//! Decoding never fails outward: a bad token is `CursorState::Invalid` and
//! paging restarts from the beginning.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqliteConnection;
use tracing::debug;

use super::offset_param;
use crate::catalog::SortDirection;
use crate::config::SearchConfig;
use crate::error::Result;
use crate::storage::rows::{RowMap, SqlValue, bind_all, checked_identifier, row_to_map};

const CURSOR_VERSION: u8 = 1;

/// Ordering field name used by search-result cursors
pub const RANK_FIELD: &str = "__rank";

const ROWID_ALIAS: &str = "__cursor_rowid";
const KEY_ALIAS: &str = "__cursor_key";

/// Decoded cursor contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorToken {
    pub v: u8,
    pub field: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_id: Option<i64>,
    pub direction: SortDirection,
}

/// Outcome of decoding a caller-supplied cursor
#[derive(Debug, Clone, PartialEq)]
pub enum CursorState {
    NoCursor,
    Invalid,
    Valid(CursorToken),
}

impl CursorToken {
    pub fn new(
        field: impl Into<String>,
        value: Value,
        last_id: Option<i64>,
        direction: SortDirection,
    ) -> Self {
        Self {
            v: CURSOR_VERSION,
            field: field.into(),
            value,
            last_id,
            direction,
        }
    }

    /// Cursor resuming a ranked search result list at `offset`
    pub fn rank(offset: u64) -> Self {
        Self::new(RANK_FIELD, Value::from(offset), None, SortDirection::Asc)
    }

    /// The resume offset if this is a search-result cursor
    pub fn rank_offset(&self) -> Option<u64> {
        (self.field == RANK_FIELD).then(|| self.value.as_u64()).flatten()
    }

    pub fn encode(&self) -> String {
        // Serializing a struct of plain fields cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode an optional token, failing closed
    pub fn decode(token: Option<&str>) -> CursorState {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return CursorState::NoCursor;
        };

        let Ok(bytes) = URL_SAFE_NO_PAD.decode(token) else {
            debug!("Cursor is not valid base64");
            return CursorState::Invalid;
        };
        match serde_json::from_slice::<CursorToken>(&bytes) {
            Ok(cursor) if cursor.v == CURSOR_VERSION => CursorState::Valid(cursor),
            Ok(cursor) => {
                debug!(version = cursor.v, "Unsupported cursor version");
                CursorState::Invalid
            }
            Err(e) => {
                debug!(error = %e, "Cursor payload did not decode");
                CursorState::Invalid
            }
        }
    }
}

impl CursorState {
    /// The token, if it is valid for this ordering
    pub fn for_ordering(self, field: &str, direction: SortDirection) -> Option<CursorToken> {
        match self {
            CursorState::Valid(token)
                if token.field.eq_ignore_ascii_case(field) && token.direction == direction =>
            {
                Some(token)
            }
            CursorState::Valid(token) => {
                debug!(
                    cursor_field = %token.field,
                    requested_field = %field,
                    "Cursor belongs to a different ordering; starting over"
                );
                None
            }
            CursorState::NoCursor | CursorState::Invalid => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, CursorState::Invalid)
    }
}

/// One cursor-paginated page
#[derive(Debug, Clone, Serialize)]
pub struct CursorPage {
    pub items: Vec<RowMap>,
    pub limit: u32,
    pub has_next: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Range predicate selecting rows strictly after the cursor position
///
/// Rows are ordered by `(key, rowid)` in one direction. NULL keys sort first
/// ascending and last descending.
fn after_predicate(key: &str, token: &CursorToken) -> (String, Vec<SqlValue>) {
    let unique = key.eq_ignore_ascii_case("rowid");
    let op = token.direction.after_operator();
    let last = token.last_id.unwrap_or(i64::MIN);

    match (&token.value, unique) {
        (Value::Null, _) => match token.direction {
            SortDirection::Asc => (
                format!("(({key} IS NULL AND rowid {op} ?) OR {key} IS NOT NULL)"),
                vec![SqlValue::Integer(last)],
            ),
            SortDirection::Desc => (
                format!("({key} IS NULL AND rowid {op} ?)"),
                vec![SqlValue::Integer(last)],
            ),
        },
        (value, true) => (format!("{key} {op} ?"), vec![SqlValue::from_json(value)]),
        (value, false) => {
            let v = SqlValue::from_json(value);
            let trailing_nulls = match token.direction {
                SortDirection::Asc => String::new(),
                SortDirection::Desc => format!(" OR {key} IS NULL"),
            };
            (
                format!("({key} {op} ? OR ({key} = ? AND rowid {op} ?){trailing_nulls})"),
                vec![v.clone(), v, SqlValue::Integer(last)],
            )
        }
    }
}

/// Cursor-paginated read of a table ordered by `order_by`
///
/// The page is fetched with a range predicate on `(order_by, rowid)` and
/// `LIMIT limit + 1`; the extra row signals `has_next` and the last returned
/// row becomes the next cursor.
pub async fn paginate_by_cursor(
    conn: &mut SqliteConnection,
    table: &str,
    order_by: &str,
    direction: SortDirection,
    cursor: Option<&str>,
    limit: i64,
    limits: &SearchConfig,
) -> Result<CursorPage> {
    let table = checked_identifier(table, "table")?;
    let key = checked_identifier(order_by, "column")?;
    let limit = limit.clamp(1, i64::from(limits.max_per_page.max(1))) as u32;
    let dir = direction.as_sql();

    let state = CursorToken::decode(cursor);
    let resume = state.for_ordering(key, direction);

    let (where_sql, params) = match &resume {
        Some(token) => {
            let (predicate, params) = after_predicate(key, token);
            (format!(" WHERE {predicate}"), params)
        }
        None => (String::new(), Vec::new()),
    };

    let sql = format!(
        "SELECT *, {key} AS {KEY_ALIAS}, rowid AS {ROWID_ALIAS} FROM {table}{where_sql} \
         ORDER BY {key} {dir}, rowid {dir} LIMIT ?"
    );
    let mut rows = bind_all(sqlx::query(&sql), &params)
        .bind(offset_param(u64::from(limit) + 1))
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(row_to_map)
        .collect::<Result<Vec<_>>>()?;

    let has_next = rows.len() > limit as usize;
    rows.truncate(limit as usize);

    let mut next_cursor = None;
    if has_next {
        if let Some(last) = rows.last() {
            let last_id = last.get(ROWID_ALIAS).and_then(Value::as_i64);
            // Read through the alias: the caller's spelling of the column
            // may differ in case from the row's own column name
            let value = last.get(KEY_ALIAS).cloned().unwrap_or(Value::Null);
            next_cursor = Some(CursorToken::new(key, value, last_id, direction).encode());
        }
    }
    for row in &mut rows {
        row.remove(KEY_ALIAS);
        row.remove(ROWID_ALIAS);
    }

    debug!(
        table = %table,
        order_by = %key,
        resumed = resume.is_some(),
        returned = rows.len(),
        has_next,
        "Paginated by cursor"
    );

    Ok(CursorPage {
        items: rows,
        limit,
        has_next,
        next_cursor,
    })
}
