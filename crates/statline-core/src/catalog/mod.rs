//! Entity catalog
//!
//! A read-only registry mapping entity-type names ("games", "players", ...)
//! to how their records are stored and which fields are searchable,
//! filterable and used for suggestions.
//!
//! # Architecture
//!
//! - **Descriptors**: `EntityDescriptor` describes one entity type
//! - **Capability**: `SearchableEntity` is what the executors program against,
//!   so row-backed and document-backed types share one code path
//! - **Paths**: `FieldPath` addresses fields inside document blobs

pub mod path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, Result};
use crate::storage::rows::{RowMap, is_safe_identifier};

pub use path::{FieldPath, InvalidFieldPath, PathSegment};

/// How an entity's records are stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StorageKind {
    /// Individual columns, indexed by an FTS5 table named `<table>_fts`
    RowBacked,
    /// One JSON blob per record held in `column`
    DocumentBacked { column: String },
}

/// Sort direction for ordered reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// SQL keyword
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Comparison operator selecting rows after a cursor in this direction
    pub fn after_operator(&self) -> &'static str {
        match self {
            Self::Asc => ">",
            Self::Desc => "<",
        }
    }

    /// Parse "asc"/"desc" (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A default ordering: column plus direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.direction)
    }
}

/// Capability interface the executors use to search any entity type
pub trait SearchableEntity: Send + Sync {
    /// Entity-type name used in requests
    fn name(&self) -> &str;

    /// Backing table
    fn table(&self) -> &str;

    /// Primary key column; identity for deduplication
    fn primary_key(&self) -> &str;

    fn storage(&self) -> &StorageKind;

    /// Fields concatenated for fuzzy matching, heaviest boost first
    fn searchable_fields(&self) -> &[FieldPath];

    fn filterable_fields(&self) -> &[FieldPath];

    /// Fields the exact executor tests on document-backed types
    fn exact_match_fields(&self) -> &[FieldPath];

    /// Fields feeding the suggestion vocabulary
    fn suggestion_fields(&self) -> &[FieldPath];

    fn default_sort(&self) -> &SortSpec;

    /// Relevance weight for a field (1.0 when unset)
    fn boost(&self, field: &FieldPath) -> f32;

    fn is_document_backed(&self) -> bool {
        matches!(self.storage(), StorageKind::DocumentBacked { .. })
    }

    /// Full-text index table for row-backed types
    fn fts_table(&self) -> Option<String> {
        match self.storage() {
            StorageKind::RowBacked => Some(format!("{}_fts", self.table())),
            StorageKind::DocumentBacked { .. } => None,
        }
    }

    /// Look up a filterable field by its name as written
    fn filter_field(&self, name: &str) -> Option<&FieldPath> {
        self.filterable_fields().iter().find(|f| f.as_str() == name)
    }

    /// Turn a raw table row into a record: document blobs are parsed and
    /// their top-level members lifted next to the row's other columns
    fn hydrate(&self, mut row: RowMap) -> Result<RowMap> {
        let StorageKind::DocumentBacked { column } = self.storage() else {
            return Ok(row);
        };

        let document = match row.remove(column) {
            Some(Value::String(text)) => serde_json::from_str::<Value>(&text)?,
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(other) => other,
        };

        match document {
            Value::Object(members) => {
                for (key, value) in members {
                    row.entry(key).or_insert(value);
                }
            }
            other => {
                row.insert(column.clone(), other);
            }
        }
        Ok(row)
    }

    /// Primary key value of a hydrated record
    fn record_id(&self, record: &RowMap) -> Option<i64> {
        match record.get(self.primary_key())? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Text of one field of a hydrated record
    fn field_text(&self, record: &RowMap, field: &FieldPath) -> Option<String> {
        field.text_in(record)
    }

    /// All searchable fields joined with spaces, heaviest boost first
    fn searchable_text(&self, record: &RowMap) -> String {
        let mut fields: Vec<&FieldPath> = self.searchable_fields().iter().collect();
        fields.sort_by(|a, b| {
            self.boost(b)
                .partial_cmp(&self.boost(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        fields
            .into_iter()
            .filter_map(|f| self.field_text(record, f))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Catalog entry for one entity type
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    name: String,
    table: String,
    primary_key: String,
    storage: StorageKind,
    searchable: Vec<FieldPath>,
    filterable: Vec<FieldPath>,
    exact_match: Option<Vec<FieldPath>>,
    suggestion: Vec<FieldPath>,
    default_sort: SortSpec,
    boosts: Vec<(String, f32)>,
    invalid_paths: Vec<String>,
}

impl EntityDescriptor {
    /// Start a row-backed descriptor; columns are searched through `<table>_fts`
    pub fn row_backed(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self::with_storage(name.into(), table.into(), StorageKind::RowBacked)
    }

    /// Start a document-backed descriptor whose JSON lives in `column`
    pub fn document_backed(
        name: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self::with_storage(
            name.into(),
            table.into(),
            StorageKind::DocumentBacked {
                column: column.into(),
            },
        )
    }

    fn with_storage(name: String, table: String, storage: StorageKind) -> Self {
        Self {
            name,
            table,
            primary_key: "id".to_string(),
            storage,
            searchable: Vec::new(),
            filterable: Vec::new(),
            exact_match: None,
            suggestion: Vec::new(),
            default_sort: SortSpec::new("id", SortDirection::Asc),
            boosts: Vec::new(),
            invalid_paths: Vec::new(),
        }
    }

    fn parse_paths(&mut self, fields: &[&str]) -> Vec<FieldPath> {
        let mut parsed = Vec::with_capacity(fields.len());
        for field in fields {
            match FieldPath::parse(field) {
                Ok(path) => parsed.push(path),
                Err(_) => self.invalid_paths.push(field.to_string()),
            }
        }
        parsed
    }

    /// Set the searchable fields (column names or document paths)
    pub fn searchable(mut self, fields: &[&str]) -> Self {
        self.searchable = self.parse_paths(fields);
        self
    }

    /// Set the fields accepted as a search filter
    pub fn filterable(mut self, fields: &[&str]) -> Self {
        self.filterable = self.parse_paths(fields);
        self
    }

    /// Restrict the exact executor to these fields (document-backed only)
    pub fn exact_match_on(mut self, fields: &[&str]) -> Self {
        self.exact_match = Some(self.parse_paths(fields));
        self
    }

    /// Set the fields that feed spelling suggestions
    pub fn suggest_from(mut self, fields: &[&str]) -> Self {
        self.suggestion = self.parse_paths(fields);
        self
    }

    /// Set the default ordering
    pub fn sorted_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.default_sort = SortSpec::new(field, direction);
        self
    }

    /// Set a field's relevance weight
    pub fn boost_field(mut self, field: impl Into<String>, weight: f32) -> Self {
        let field = field.into();
        self.boosts.retain(|(f, _)| *f != field);
        self.boosts.push((field, weight));
        self
    }

    /// Override the primary key column
    pub fn primary_key_column(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// The highest-weighted searchable field, used as a record's display title
    pub fn title_field(&self) -> Option<&FieldPath> {
        self.searchable.iter().max_by(|a, b| {
            self.boost(a)
                .partial_cmp(&self.boost(b))
                .unwrap_or(std::cmp::Ordering::Equal)
                // max_by keeps the last maximum; prefer the earliest declared
                .then(std::cmp::Ordering::Greater)
        })
    }

    fn check(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::ConfigError(format!("Entity '{}': {}", self.name, msg)));

        if self.name.trim().is_empty() {
            return Err(Error::ConfigError("Entity name cannot be empty".to_string()));
        }
        if !self.invalid_paths.is_empty() {
            return fail(format!("invalid field paths {:?}", self.invalid_paths));
        }
        for (what, ident) in [
            ("table", self.table.as_str()),
            ("primary key", self.primary_key.as_str()),
            ("sort field", self.default_sort.field.as_str()),
        ] {
            if !is_safe_identifier(ident) {
                return fail(format!("{} {:?} is not a plain identifier", what, ident));
            }
        }
        if self.searchable.is_empty() {
            return fail("no searchable fields".to_string());
        }

        match &self.storage {
            StorageKind::RowBacked => {
                let columns = self
                    .searchable
                    .iter()
                    .chain(&self.filterable)
                    .chain(&self.suggestion);
                for field in columns {
                    if !field.is_simple() || !is_safe_identifier(field.as_str()) {
                        return fail(format!(
                            "row-backed field {:?} must be a plain column",
                            field.as_str()
                        ));
                    }
                }
                if self.exact_match.is_some() {
                    return fail("exact-match field override applies to documents only".to_string());
                }
            }
            StorageKind::DocumentBacked { column } => {
                if !is_safe_identifier(column) {
                    return fail(format!("document column {:?} is not a plain identifier", column));
                }
            }
        }
        Ok(())
    }
}

impl SearchableEntity for EntityDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn table(&self) -> &str {
        &self.table
    }

    fn primary_key(&self) -> &str {
        &self.primary_key
    }

    fn storage(&self) -> &StorageKind {
        &self.storage
    }

    fn searchable_fields(&self) -> &[FieldPath] {
        &self.searchable
    }

    fn filterable_fields(&self) -> &[FieldPath] {
        &self.filterable
    }

    fn exact_match_fields(&self) -> &[FieldPath] {
        self.exact_match.as_deref().unwrap_or(&self.searchable)
    }

    fn suggestion_fields(&self) -> &[FieldPath] {
        &self.suggestion
    }

    fn default_sort(&self) -> &SortSpec {
        &self.default_sort
    }

    fn boost(&self, field: &FieldPath) -> f32 {
        self.boosts
            .iter()
            .find(|(f, _)| f == field.as_str())
            .map(|(_, w)| *w)
            .unwrap_or(1.0)
    }
}

/// Summary of a descriptor for display and serialization
#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub name: String,
    pub table: String,
    pub storage: StorageKind,
    pub searchable_fields: Vec<String>,
    pub filterable_fields: Vec<String>,
    pub default_sort: String,
}

impl From<&EntityDescriptor> for EntitySummary {
    fn from(d: &EntityDescriptor) -> Self {
        let names = |paths: &[FieldPath]| paths.iter().map(|p| p.as_str().to_string()).collect();
        Self {
            name: d.name.clone(),
            table: d.table.clone(),
            storage: d.storage.clone(),
            searchable_fields: names(&d.searchable),
            filterable_fields: names(&d.filterable),
            default_sort: d.default_sort.to_string(),
        }
    }
}

/// Registry of all searchable entity types, in declaration order
#[derive(Debug, Clone)]
pub struct EntityCatalog {
    entities: Vec<EntityDescriptor>,
}

impl EntityCatalog {
    /// Build a catalog, rejecting duplicate names and unsafe identifiers
    pub fn new(entities: Vec<EntityDescriptor>) -> Result<Self> {
        for (i, entity) in entities.iter().enumerate() {
            entity.check()?;
            if entities[..i]
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(&entity.name))
            {
                return Err(Error::ConfigError(format!(
                    "Duplicate entity type '{}'",
                    entity.name
                )));
            }
        }
        Ok(Self { entities })
    }

    /// The esports catalog matching the bundled schema
    pub fn builtin() -> Self {
        Self {
            entities: builtin_entities(),
        }
    }

    /// Find an entity type by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&EntityDescriptor> {
        let name = name.trim();
        self.entities
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn summaries(&self) -> Vec<EntitySummary> {
        self.entities.iter().map(EntitySummary::from).collect()
    }
}

impl Default for EntityCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_entities() -> Vec<EntityDescriptor> {
    vec![
        EntityDescriptor::row_backed("games", "games")
            .searchable(&["game_name", "genre", "publisher"])
            .filterable(&["genre", "publisher", "release_year"])
            .suggest_from(&["game_name"])
            .sorted_by("game_name", SortDirection::Asc)
            .boost_field("game_name", 3.0),
        EntityDescriptor::row_backed("teams", "teams")
            .searchable(&["team_name", "region", "game"])
            .filterable(&["region", "game"])
            .suggest_from(&["team_name"])
            .sorted_by("team_name", SortDirection::Asc)
            .boost_field("team_name", 3.0)
            .boost_field("game", 1.5),
        EntityDescriptor::row_backed("tournaments", "tournaments")
            .searchable(&["tournament_name", "game", "location"])
            .filterable(&["game", "tier", "location"])
            .suggest_from(&["tournament_name"])
            .sorted_by("start_date", SortDirection::Desc)
            .boost_field("tournament_name", 3.0)
            .boost_field("game", 1.5),
        EntityDescriptor::row_backed("news", "news")
            .searchable(&["title", "summary", "author"])
            .filterable(&["author", "game"])
            .sorted_by("published_at", SortDirection::Desc)
            .boost_field("title", 3.0)
            .boost_field("summary", 1.5),
        EntityDescriptor::document_backed("players", "players", "data")
            .searchable(&[
                "Player_Information.ID",
                "Player_Information.Romanized Name",
                "Player_Information.Name",
                "Player_Information.Team",
                "Player_Information.Country",
            ])
            .exact_match_on(&["Player_Information.ID", "Player_Information.Romanized Name"])
            .filterable(&[
                "Player_Information.Team",
                "Player_Information.Country",
                "Player_Information.Role",
            ])
            .suggest_from(&["Player_Information.ID", "Player_Information.Romanized Name"])
            .sorted_by("id", SortDirection::Asc)
            .boost_field("Player_Information.ID", 3.0)
            .boost_field("Player_Information.Romanized Name", 2.5),
        EntityDescriptor::document_backed("matches", "matches", "data")
            .searchable(&[
                "Match_Information.Team 1",
                "Match_Information.Team 2",
                "Match_Information.Tournament",
                "Match_Information.Game",
            ])
            .filterable(&["Match_Information.Game", "Match_Information.Tournament"])
            .sorted_by("match_date", SortDirection::Desc)
            .boost_field("Match_Information.Team 1", 2.0)
            .boost_field("Match_Information.Team 2", 2.0),
    ]
}
