//! # Andro memory
//!
//! Where the durable record lives between sessions. Every store saves the
//! whole object (last writer wins) and loads forgivingly: a missing or
//! unreadable record yields defaults instead of an error.

pub mod json;
pub mod sqlite;
pub mod store;

pub use json::JsonFileStore;
pub use sqlite::SqliteStateStore;
pub use store::{open_store, MemoryStore, StateStore, StoreError};
