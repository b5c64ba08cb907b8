//! Field paths into structured documents
//!
//! A path such as `Player_Information.Romanized Name` is parsed once into
//! segments and evaluated against a parsed `serde_json::Value` tree. A plain
//! column name is a single-segment path, so row-backed and document-backed
//! records resolve fields the same way.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// One step of a field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object member lookup
    Key(String),
    /// Array element lookup
    Index(usize),
}

/// A parsed, dot-separated path into a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<PathSegment>,
}

/// Error returned for paths with empty segments
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid field path: {0:?}")]
pub struct InvalidFieldPath(pub String);

impl FieldPath {
    /// Parse a dotted path. Purely numeric segments index into arrays.
    pub fn parse(raw: &str) -> Result<Self, InvalidFieldPath> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidFieldPath(raw.to_string()));
        }

        let mut segments = Vec::new();
        for part in trimmed.split('.') {
            let part = part.trim();
            if part.is_empty() {
                return Err(InvalidFieldPath(raw.to_string()));
            }
            match part.parse::<usize>() {
                Ok(index) => segments.push(PathSegment::Index(index)),
                Err(_) => segments.push(PathSegment::Key(part.to_string())),
            }
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// The path as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed segments
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Whether this is a bare top-level name (a plain column)
    pub fn is_simple(&self) -> bool {
        matches!(self.segments.as_slice(), [PathSegment::Key(_)])
    }

    /// Walk the document, returning the addressed node if every step exists
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |node, segment| step(node, segment))
    }

    /// Like `resolve`, starting from a record's top-level field map
    pub fn resolve_in<'a>(&self, record: &'a Map<String, Value>) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        let head = match first {
            PathSegment::Key(key) => record.get(key)?,
            PathSegment::Index(index) => record.get(&index.to_string())?,
        };
        rest.iter().try_fold(head, |node, segment| step(node, segment))
    }

    /// Resolve and render the addressed node as searchable text
    pub fn text(&self, root: &Value) -> Option<String> {
        self.resolve(root).and_then(value_text)
    }

    /// Resolve against a record map and render as searchable text
    pub fn text_in(&self, record: &Map<String, Value>) -> Option<String> {
        self.resolve_in(record).and_then(value_text)
    }
}

impl FromStr for FieldPath {
    type Err = InvalidFieldPath;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn step<'a>(node: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match (segment, node) {
        (PathSegment::Key(key), Value::Object(map)) => map.get(key),
        (PathSegment::Index(index), Value::Array(items)) => items.get(*index),
        // Numeric-looking keys on objects ("2024")
        (PathSegment::Index(index), Value::Object(map)) => map.get(&index.to_string()),
        _ => None,
    }
}

/// Render a JSON node as text; arrays join their scalar members with spaces
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_text).collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_segments() {
        let path = FieldPath::parse("Player_Information.Romanized Name").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("Player_Information".to_string()),
                PathSegment::Key("Romanized Name".to_string())
            ]
        );
        assert!(!path.is_simple());
        assert!(FieldPath::parse("game_name").unwrap().is_simple());
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("a..b").is_err());
        assert!(FieldPath::parse(".a").is_err());
    }

    #[test]
    fn test_resolve_nested_and_indexed() {
        let doc = json!({
            "Player_Information": {
                "Romanized Name": "Lee Sang-hyeok",
                "ID": "Faker",
                "Teams": ["T1", "SKT"]
            }
        });

        let name = FieldPath::parse("Player_Information.Romanized Name").unwrap();
        assert_eq!(name.text(&doc).as_deref(), Some("Lee Sang-hyeok"));

        let first_team = FieldPath::parse("Player_Information.Teams.0").unwrap();
        assert_eq!(first_team.text(&doc).as_deref(), Some("T1"));

        let all_teams = FieldPath::parse("Player_Information.Teams").unwrap();
        assert_eq!(all_teams.text(&doc).as_deref(), Some("T1 SKT"));

        let missing = FieldPath::parse("Player_Information.Birthday").unwrap();
        assert_eq!(missing.text(&doc), None);

        let through_scalar = FieldPath::parse("Player_Information.ID.deep").unwrap();
        assert_eq!(through_scalar.resolve(&doc), None);
    }

    #[test]
    fn test_resolve_in_record_map() {
        let record = json!({"id": 3, "Match_Information": {"Team 1": "G2"}});
        let map = record.as_object().unwrap();

        let team = FieldPath::parse("Match_Information.Team 1").unwrap();
        assert_eq!(team.text_in(map).as_deref(), Some("G2"));
        assert_eq!(FieldPath::parse("id").unwrap().text_in(map).as_deref(), Some("3"));
    }

    #[test]
    fn test_value_text_scalars() {
        assert_eq!(value_text(&json!(42)).as_deref(), Some("42"));
        assert_eq!(value_text(&json!(true)).as_deref(), Some("true"));
        assert_eq!(value_text(&json!("  ")), None);
        assert_eq!(value_text(&json!({"a": 1})), None);
    }
}
