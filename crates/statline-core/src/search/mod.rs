//! Multi-modal search
//!
//! Answers free-text queries against every catalog entity, degrading from
//! exact to approximate matching.
//!
//! # Architecture
//!
//! - **Request**: `SearchParams` validated into a `SearchRequest` by `QueryValidator`
//! - **Executors**: `ExactExecutor` (FTS5 / substring) and `FuzzyExecutor`
//!   (similarity scan) behind the `SearchExecutor` trait
//! - **Merge**: order-preserving deduplication for hybrid mode
//! - **Suggestions**: spelling corrections from the catalog's suggestion fields
//! - **Telemetry**: one `search_logs` row per search
//! - **Engine**: `SearchEngine` ties it together and owns mode dispatch
//!
//! # Example
//!
//! ```ignore
//! use statline_core::search::{SearchEngine, SearchParams};
//!
//! let engine = SearchEngine::new(db.pool().clone(), EntityCatalog::builtin(), config.search)?;
//! let response = engine
//!     .search(&SearchParams::new("Dota").entity_type("games").mode("exact"))
//!     .await?;
//! println!("{} results", response.pagination.total.unwrap_or(0));
//! ```

pub mod engine;
pub mod exact;
pub mod executor;
pub mod fuzzy;
pub mod merge;
pub mod request;
pub mod response;
pub mod similarity;
pub mod suggest;
pub mod telemetry;

pub use engine::SearchEngine;
pub use exact::ExactExecutor;
pub use executor::{ExecutorOutput, ExecutorRequest, SearchExecutor};
pub use fuzzy::FuzzyExecutor;
pub use merge::{merge, merge_by, merge_maps};
pub use request::{
    Filter, QueryValidator, SearchMode, SearchParams, SearchRequest, ValidationError,
};
pub use response::{SearchResponse, SearchResult, SearchResults, SearchType};
pub use suggest::Vocabulary;
pub use telemetry::{SearchLogEntry, SearchLogger};
