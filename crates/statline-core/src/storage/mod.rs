//! Storage layer - SQLite
//!
//! Provides database management, migrations and generic row access for statline.
//!
//! # Architecture
//!
//! - `database`: Connection pool management and initialization
//! - `migrations`: Schema versioning and automatic migration
//! - `rows`: Column-name keyed row maps and bindable parameter values
//!
//! # Usage
//!
//! ```ignore
//! use statline_core::storage::Database;
//!
//! // Create an in-memory database for testing
//! let db = Database::in_memory().await?;
//! ```

pub mod database;
pub mod migrations;
pub mod rows;

// Re-export commonly used types
pub use database::{Database, DatabaseConfig};
pub use migrations::{CURRENT_VERSION, MigrationStatus, migration_status, run_migrations};
pub use rows::{RowMap, SqlValue, row_to_map};
