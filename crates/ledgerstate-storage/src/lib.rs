//! ledgerstate-storage — pluggable claimable-balance stores.
//!
//! Backends:
//! - [`memory`] — in-memory (dev/testing, no persistence)
//! - `sqlite` — SQLite via `sqlx` (feature `sqlite`)
//! - `postgres` — PostgreSQL via `sqlx` (feature `postgres`)

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryStore;
