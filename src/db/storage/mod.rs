//! Fixed-capacity LRU cache with expiry, guarded by a single lock.

pub mod lru;
pub mod storage;


// Re-export main types
pub use lru::LRUList;
pub use storage::{truncate_key, Entry, EntryInfo, Stats, Storage, StorageError};
