//! Generic row handling
//!
//! Tables are addressed by name at runtime, so rows come back as JSON maps
//! keyed by column name rather than through per-table `FromRow` structs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Number, Value};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};

use crate::error::{Error, Result};

/// A single column-name to value mapping
pub type RowMap = Map<String, Value>;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// A value that can be bound as a positional SQL parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    /// Convert a JSON scalar into a bindable value
    ///
    /// Arrays and objects are bound as their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Integer(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Real(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    /// Bind this value onto a query
    pub fn bind_to<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        match self {
            Self::Null => query.bind(Option::<String>::None),
            Self::Integer(i) => query.bind(*i),
            Self::Real(f) => query.bind(*f),
            Self::Text(s) => query.bind(s.clone()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

/// Bind every value in order
pub fn bind_all<'q>(mut query: SqliteQuery<'q>, params: &[SqlValue]) -> SqliteQuery<'q> {
    for param in params {
        query = param.bind_to(query);
    }
    query
}

/// Convert a row into a column-name keyed map using each value's storage class
pub fn row_to_map(row: &SqliteRow) -> Result<RowMap> {
    let mut map = Map::with_capacity(row.columns().len());

    for column in row.columns() {
        let ordinal = column.ordinal();
        let storage_class = {
            let raw = row.try_get_raw(ordinal).map_err(Error::DatabaseError)?;
            if raw.is_null() {
                None
            } else {
                Some(raw.type_info().name().to_string())
            }
        };

        let value = match storage_class.as_deref() {
            None => Value::Null,
            Some("INTEGER") => Value::from(row.try_get::<i64, _>(ordinal)?),
            Some("REAL") => {
                let f: f64 = row.try_get(ordinal)?;
                Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
            }
            Some("BLOB") => {
                let bytes: Vec<u8> = row.try_get(ordinal)?;
                Value::String(BASE64.encode(bytes))
            }
            Some(_) => Value::String(row.try_get::<String, _>(ordinal)?),
        };

        map.insert(column.name().to_string(), value);
    }

    Ok(map)
}

/// Check that a caller-supplied table or column name is a plain identifier
///
/// Identifiers cannot be bound as parameters, so anything interpolated into
/// SQL text must pass this first.
pub fn is_safe_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Return the identifier or an `InvalidInput` error naming what it was for
pub fn checked_identifier<'a>(name: &'a str, what: &str) -> Result<&'a str> {
    if is_safe_identifier(name) {
        Ok(name)
    } else {
        Err(Error::InvalidInput(format!("Invalid {} name: {:?}", what, name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn test_safe_identifiers() {
        assert!(is_safe_identifier("games"));
        assert!(is_safe_identifier("_private"));
        assert!(is_safe_identifier("release_year2"));
        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier("2fast"));
        assert!(!is_safe_identifier("games; DROP TABLE games"));
        assert!(!is_safe_identifier("a.b"));
        assert!(checked_identifier("x y", "column").is_err());
    }

    #[test]
    fn test_sql_value_from_json() {
        assert_eq!(SqlValue::from_json(&Value::Null), SqlValue::Null);
        assert_eq!(SqlValue::from_json(&serde_json::json!(5)), SqlValue::Integer(5));
        assert_eq!(SqlValue::from_json(&serde_json::json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(SqlValue::from_json(&serde_json::json!(true)), SqlValue::Integer(1));
        assert_eq!(
            SqlValue::from_json(&serde_json::json!("NA")),
            SqlValue::Text("NA".to_string())
        );
    }

    #[tokio::test]
    async fn test_row_to_map_storage_classes() {
        let db = Database::in_memory().await.unwrap();

        let row = sqlx::query("SELECT 7 AS i, 2.5 AS r, 'text' AS t, NULL AS n, x'0102' AS b")
            .fetch_one(db.pool())
            .await
            .unwrap();
        let map = row_to_map(&row).unwrap();

        assert_eq!(map["i"], serde_json::json!(7));
        assert_eq!(map["r"], serde_json::json!(2.5));
        assert_eq!(map["t"], serde_json::json!("text"));
        assert_eq!(map["n"], Value::Null);
        assert_eq!(map["b"], serde_json::json!("AQI="));
    }

    #[tokio::test]
    async fn test_bind_all_positional() {
        let db = Database::in_memory().await.unwrap();

        let params = vec![SqlValue::from(3_i64), SqlValue::from("x"), SqlValue::Null];
        let row = bind_all(sqlx::query("SELECT ? + 1 AS a, ? AS b, ? IS NULL AS c"), &params)
            .fetch_one(db.pool())
            .await
            .unwrap();
        let map = row_to_map(&row).unwrap();

        assert_eq!(map["a"], serde_json::json!(4));
        assert_eq!(map["b"], serde_json::json!("x"));
        assert_eq!(map["c"], serde_json::json!(1));
    }
}
