//! Store Module
//!
//! Process-wide, in-memory key-value map shared by every connection.
//!
//! ## Responsibilities
//! - Unconditional upsert (`set`) and lookup (`get`)
//! - Record when each entry was written
//! - Safe concurrent access from many connection threads
//!
//! ## Data Structure Choice
//! The keyspace is split into shards, each a HashMap behind its own RwLock:
//! - A key always lives in the same shard (chosen by hash)
//! - Writers on different shards never contend
//! - A reader never sees a half-written entry

mod sharded;

use std::time::SystemTime;

use bytes::Bytes;

pub use sharded::Store;

/// Entry stored in the Store
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// The stored value
    pub value: Bytes,

    /// Wall-clock time of the `set` that wrote this entry
    pub created_at: SystemTime,
}

impl Entry {
    pub fn new(value: Bytes) -> Self {
        Self {
            value,
            created_at: SystemTime::now(),
        }
    }
}
