pub mod memory;
pub mod sqlite;

pub use memory::{MemoryGraphStore, MemoryRunStore};
pub use sqlite::SqliteStore;
