//! bizdir adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `store`: SQLite and in-memory directory stores

mod store_memory;
mod store_sqlite;

/// Re-exports for store adapters
pub mod store {
    pub use crate::store_memory::InMemoryDirectoryStore;
    pub use crate::store_sqlite::{SqliteDirectoryStore, StoreStats};
}
