//! EMAflow Core - Domain entities, services, and traits.
//!
//! This crate contains the EMA alignment and incremental refresh logic.
//! It is database-agnostic and defines store traits that are implemented
//! by the `storage-sqlite` crate (and by [`memory::InMemoryStore`]).

pub mod alerts;
pub mod bars;
pub mod constants;
pub mod ema;
pub mod errors;
pub mod memory;
pub mod pipeline;
pub mod refresh_state;
pub mod sessions;
pub mod timeframes;
pub mod unified;
pub mod utils;
pub mod validation;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
