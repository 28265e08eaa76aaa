//! Key-value store abstraction.

mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::error::StoreError;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Introspection counters reported by a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreInfo {
    pub used_memory_human: String,
    pub keyspace_hits: u64,
    pub keyspace_misses: u64,
    pub key_count: u64,
}

/// A remote (or in-process) key-value store with string values and string sets.
///
/// Keys passed to a store are already namespaced; the store never rewrites
/// them.
///
/// # Implementors
///
/// - `RedisStore` - A Redis server reached through a reconnecting connection manager
/// - `MemoryStore` - An in-process moka cache, for development and tests
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Checks that the store answers.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Order-preserving multi-get.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Writes several entries in a single pipelined round trip.
    async fn set_many_ex(&self, entries: &[(String, String, Duration)]) -> Result<(), StoreError>;

    /// Sets `key` only if it does not exist. Returns whether the write happened.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Deletes keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Adds `member` to every set in `sets`.
    async fn add_to_sets(&self, sets: &[String], member: &str) -> Result<(), StoreError>;

    /// Writes `key` and adds it to every set in `sets`.
    ///
    /// Either both happen or `key` is left absent, so a cached value is never
    /// outside its tag sets. The default rolls the value back when tagging
    /// fails; `RedisStore` sends both inside one `MULTI`/`EXEC`.
    async fn set_ex_tagged(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        sets: &[String],
    ) -> Result<(), StoreError> {
        self.set_ex(key, value, ttl).await?;
        if sets.is_empty() {
            return Ok(());
        }

        if let Err(err) = self.add_to_sets(sets, key).await {
            if let Err(rollback) = self.delete(&[key.to_string()]).await {
                warn!(key = %key, error = %rollback, "Failed to roll back untagged entry");
            }
            return Err(err);
        }
        Ok(())
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>, StoreError>;

    /// Deletes `members` together with `set`. Returns how many member keys
    /// existed.
    ///
    /// `RedisStore` runs both deletions inside one `MULTI`/`EXEC`. `MemoryStore`
    /// cannot, so it drops the set before the members: a member tagged
    /// concurrently lands in a fresh set and stays reachable.
    async fn delete_set_with_members(&self, set: &str, members: &[String]) -> Result<u64, StoreError>;

    /// Deletes `key` only if its current value equals `expected`.
    ///
    /// The comparison and the deletion must not be separable by a concurrent writer.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// Deletes every key starting with `prefix`.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StoreError>;

    async fn info(&self) -> Result<StoreInfo, StoreError>;

    /// Returns the name of this store, for logging.
    fn name(&self) -> &str;
}

/// Formats a byte count the way Redis reports `used_memory_human`.
pub(crate) fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["K", "M", "G", "T"];

    if bytes < 1024 {
        return format!("{bytes}B");
    }

    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.2}{unit}")
}

/// Seconds for an `EX` argument; stores reject a zero expiry.
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
