//! In-process store using Moka.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use tracing::debug;

use super::{KvStore, StoreInfo, human_bytes, ttl_secs};
use crate::error::StoreError;

#[derive(Debug, Clone)]
enum Slot {
    Text(String),
    Members(HashSet<String>),
}

#[derive(Debug, Clone)]
struct StoredEntry {
    slot: Slot,
    /// `None` keeps the entry until it is deleted or evicted.
    ttl: Option<Duration>,
}

impl StoredEntry {
    /// TTLs are rounded to whole seconds, like an `EX` argument.
    fn text(value: &str, ttl: Duration) -> Self {
        Self {
            slot: Slot::Text(value.to_string()),
            ttl: Some(Duration::from_secs(ttl_secs(ttl))),
        }
    }

    fn approx_bytes(&self) -> u64 {
        match &self.slot {
            Slot::Text(value) => value.len() as u64,
            Slot::Members(members) => members.iter().map(|m| m.len() as u64).sum(),
        }
    }
}

/// Per-entry expiry: every write resets the clock to the entry's own TTL.
struct EntryTtl;

impl Expiry<String, StoredEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// A store living inside this process.
///
/// Behaves like the Redis store for every operation the cache client uses,
/// including per-key TTLs and an atomic compare-and-delete, so the client can
/// run without a Redis server. It can also be switched to "unavailable" to
/// exercise the degraded paths.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use pulse_cache::{CacheClient, CacheConfig, MemoryStore};
///
/// # #[tokio::main]
/// # async fn main() {
/// let cache = CacheClient::new(Arc::new(MemoryStore::new(1_000)), CacheConfig::default());
/// cache.connect().await.unwrap();
/// assert!(cache.is_connected());
/// # }
/// ```
pub struct MemoryStore {
    cache: Cache<String, StoredEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    available: AtomicBool,
}

impl MemoryStore {
    /// Creates a store holding at most `max_capacity` keys.
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryTtl)
            .build();

        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates the store going down (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        }
    }

    async fn text(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.cache.get(key).await {
            Some(StoredEntry {
                slot: Slot::Text(value),
                ..
            }) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            },
            Some(_) => Err(StoreError::command("GET", format!("WRONGTYPE {key} holds a set"))),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            },
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(100_000)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        self.text(key).await
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        self.check()?;
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            // MGET answers nil for keys holding another type
            values.push(self.text(key).await.unwrap_or(None));
        }
        Ok(values)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.check()?;
        self.cache
            .insert(key.to_string(), StoredEntry::text(value, ttl))
            .await;
        Ok(())
    }

    async fn set_many_ex(&self, entries: &[(String, String, Duration)]) -> Result<(), StoreError> {
        self.check()?;
        for (key, value, ttl) in entries {
            self.cache
                .insert(key.clone(), StoredEntry::text(value, *ttl))
                .await;
        }
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.check()?;
        let entry = self
            .cache
            .entry(key.to_string())
            .or_insert_with(async { StoredEntry::text(value, ttl) })
            .await;
        Ok(entry.is_fresh())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        self.check()?;
        let mut removed = 0;
        for key in keys {
            if self.cache.remove(key).await.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self.cache.get(key).await.is_some())
    }

    async fn add_to_sets(&self, sets: &[String], member: &str) -> Result<(), StoreError> {
        self.check()?;
        for set in sets {
            self.cache
                .entry(set.clone())
                .and_compute_with(|existing| {
                    let mut members = match existing.map(|e| e.into_value().slot) {
                        Some(Slot::Members(members)) => members,
                        _ => HashSet::new(),
                    };
                    members.insert(member.to_string());
                    std::future::ready(Op::Put(StoredEntry {
                        slot: Slot::Members(members),
                        ttl: None,
                    }))
                })
                .await;
        }
        Ok(())
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>, StoreError> {
        self.check()?;
        match self.cache.get(set).await {
            Some(StoredEntry {
                slot: Slot::Members(members),
                ..
            }) => {
                let mut members: Vec<String> = members.into_iter().collect();
                members.sort();
                Ok(members)
            },
            Some(_) => Err(StoreError::command(
                "SMEMBERS",
                format!("WRONGTYPE {set} holds a string"),
            )),
            None => Ok(Vec::new()),
        }
    }

    async fn delete_set_with_members(&self, set: &str, members: &[String]) -> Result<u64, StoreError> {
        self.check()?;
        // el set primero: un SADD concurrente crea un set nuevo y su key sigue indexada
        self.cache.remove(set).await;
        self.delete(members).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.check()?;
        let result = self
            .cache
            .entry(key.to_string())
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(entry) if matches!(&entry.value().slot, Slot::Text(v) if v == expected) => {
                        Op::Remove
                    },
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        Ok(matches!(result, CompResult::Removed(_)))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        self.check()?;
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.to_string())
            .collect();

        let removed = self.delete(&keys).await?;
        debug!(prefix = %prefix, removed, "Deleted keys by prefix");
        Ok(removed)
    }

    async fn info(&self) -> Result<StoreInfo, StoreError> {
        self.check()?;
        self.cache.run_pending_tasks().await;

        let used: u64 = self.cache.iter().map(|(_, entry)| entry.approx_bytes()).sum();

        Ok(StoreInfo {
            used_memory_human: human_bytes(used),
            keyspace_hits: self.hits.load(Ordering::Relaxed),
            keyspace_misses: self.misses.load(Ordering::Relaxed),
            key_count: self.cache.entry_count(),
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
