//! Cache storage.

pub mod storage;

// Re-export main types
pub use storage::{Entry, EntryInfo, Stats, Storage, StorageError};
