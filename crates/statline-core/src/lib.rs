//! Statline Core Library
//!
//! The search and pagination engine of the statline esports data service:
//! - Entity catalog (row-backed tables and document-backed JSON blobs)
//! - Exact (FTS5) and fuzzy (similarity scan) search executors
//! - Hybrid merge, spelling suggestions and search telemetry
//! - Offset and cursor pagination
//! - Storage (SQLite) and configuration

pub mod catalog;
pub mod config;
pub mod error;
pub mod pagination;
pub mod search;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::{EntityCatalog, SearchableEntity, SortDirection};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::pagination::{CursorPage, PageResult, PaginationEnvelope, TableQuery};
    pub use crate::search::{SearchEngine, SearchMode, SearchParams, SearchResponse};
    pub use crate::storage::Database;
}
