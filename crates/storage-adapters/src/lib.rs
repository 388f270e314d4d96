//! crates/storage-adapters/src/lib.rs
//!
//! Concrete implementations of the persistence ports defined in
//! `domains`. The in-memory adapter is always available; the SQLite
//! adapter sits behind the `db-sqlite` feature.

pub mod memory;

#[cfg(feature = "db-sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;

#[cfg(feature = "db-sqlite")]
pub use sqlite::SqliteStore;
