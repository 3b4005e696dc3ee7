//! # Leadflow Store
//!
//! Backends for the header-addressed record store:
//! - `MemoryStore`: shared in-process tables for tests and dry runs
//! - `SqliteStore`: one row per cell in SQLite, survives restarts

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
