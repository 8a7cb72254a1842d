//! Cache module for storing API responses
//!
//! This module provides an expiring key-value cache on top of a pluggable
//! storage backend. Entries carry their own TTL; expired entries are treated
//! as absent and cleaned up lazily on read or in bulk when storage fills up.

mod manager;
mod storage;

pub use manager::{make_key, CacheManager, CACHE_PREFIX, DEFAULT_TTL};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
