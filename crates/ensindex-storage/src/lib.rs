//! ensindex-storage — persistence backends for the ENS indexer.
//!
//! Backends:
//! - [`memory`] — in-memory (tests, ephemeral runs; no persistence)
//! - [`postgres`] — PostgreSQL via `sqlx` (production)

pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::{PostgresOptions, PostgresStorage};
