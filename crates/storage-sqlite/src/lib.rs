//! SQLite storage implementation for EMAflow.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the store traits defined in `emaflow-core` and contains:
//! - Database connection pooling and the single writer actor
//! - Diesel migrations
//! - Repository implementations for bars, watermarks and EMA tables
//! - Database-specific model types (with Diesel derives)
//!
//! # Architecture
//!
//! This crate is the only place in the workspace where Diesel dependencies exist.
//! `core` is database-agnostic and works with traits.
//!
//! ```text
//!      core (domain)
//!            │
//!            ▼
//!  storage-sqlite (this crate)
//!            │
//!            ▼
//!        SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;
pub mod utils;

// Repository implementations
pub mod bars;
pub mod ema;
pub mod refresh_state;
pub mod sessions;
pub mod timeframes;
pub mod unified;
pub mod validation;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, open, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

pub use bars::BarRepository;
pub use ema::EmaRepository;
pub use refresh_state::RefreshStateRepository;
pub use sessions::SessionRepository;
pub use timeframes::TimeframeRepository;
pub use unified::UnifiedEmaRepository;
pub use validation::ValidationAuditRepository;

// Re-export from emaflow-core for convenience
pub use emaflow_core::errors::{DatabaseError, Error, Result};
