//! Sharded store implementation
//!
//! HashMap shards, each behind a parking_lot RwLock.

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;

use bytes::Bytes;
use parking_lot::RwLock;

use super::Entry;

/// Default number of shards
pub const DEFAULT_SHARDS: usize = 16;

/// In-memory key-value store
///
/// ## Concurrency Model
///
/// - `set` takes the write lock of the key's shard, so an entry's value and
///   creation time are replaced in one step
/// - `get` takes the read lock of the key's shard; readers of a shard run
///   concurrently
/// - A `get` that starts after a `set` returned sees that write
pub struct Store {
    shards: Vec<RwLock<HashMap<Bytes, Entry>>>,
    hasher: RandomState,
}

impl Store {
    /// Create a new empty store with the default shard count
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// Create a new empty store with `count` shards (at least one)
    pub fn with_shards(count: usize) -> Self {
        let count = count.max(1);
        let shards = (0..count).map(|_| RwLock::new(HashMap::new())).collect();

        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    fn shard(&self, key: &[u8]) -> &RwLock<HashMap<Bytes, Entry>> {
        let index = self.hasher.hash_one(key) as usize % self.shards.len();
        &self.shards[index]
    }

    /// Insert or overwrite a key (write lock on its shard)
    pub fn set(&self, key: Bytes, value: Bytes) {
        let entry = Entry::new(value);
        self.shard(&key).write().insert(key, entry);
    }

    /// Get a value by key (read lock on its shard)
    ///
    /// Returns `None` when the key was never set.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.shard(key).read().get(key).map(|entry| entry.value.clone())
    }

    /// Get the full entry, including its creation time
    pub fn get_entry(&self, key: &[u8]) -> Option<Entry> {
        self.shard(key).read().get(key).cloned()
    }

    /// Get entry count
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
