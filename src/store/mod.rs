//! Persistence layer — per-user stages, profiles, history, subscriptions.

pub mod libsql_backend;
pub mod memory;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;
pub use traits::{HistoryMessage, ProfileFields, ProfileStore};
