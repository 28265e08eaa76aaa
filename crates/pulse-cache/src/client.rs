//! Namespaced cache client over a [`KvStore`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::keys::KeySpace;
use crate::metrics::CacheMetrics;
use crate::store::KvStore;

/// Configuracion del cliente de cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Prefijo de todas las keys (default: "finance:")
    pub namespace: String,
    /// TTL usado cuando el caller no indica uno (default: 3600 = 1 hora)
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "finance:".to_string(),
            default_ttl: Duration::from_secs(3600),
        }
    }
}

/// Per-write options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Falls back to the client's default TTL.
    pub ttl: Option<Duration>,
    /// Tags to index the key under, for [`CacheClient::invalidate_by_tags`].
    pub tags: Vec<String>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// One entry of a [`CacheClient::batch_set`] call.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: String,
    pub value: T,
    pub ttl: Option<Duration>,
}

impl<T> CacheEntry<T> {
    pub fn new(key: impl Into<String>, value: T) -> Self {
        Self {
            key: key.into(),
            value,
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Store-level statistics as reported by the store's own counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub memory_used_human: String,
    pub key_count: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self {
            memory_used_human: "0B".to_string(),
            key_count: 0,
            hits: 0,
            misses: 0,
            hit_rate_percent: 0.0,
        }
    }
}

pub(crate) struct Inner {
    pub(crate) store: Arc<dyn KvStore>,
    pub(crate) keys: KeySpace,
    pub(crate) default_ttl: Duration,
    pub(crate) connected: AtomicBool,
    pub(crate) metrics: CacheMetrics,
}

/// Cliente de cache sobre un store remoto.
///
/// Every operation is best effort: store failures are logged and degrade to
/// a miss, `false`, `0` or a default value, so a cache outage never becomes
/// an application outage. Cloning is cheap and shares the same connection
/// state.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use pulse_cache::{CacheClient, CacheConfig, RedisStore, SetOptions};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), pulse_cache::StoreError> {
/// let store = RedisStore::connect("redis://127.0.0.1:6379").await?;
/// let cache = CacheClient::new(Arc::new(store), CacheConfig::default());
/// cache.connect().await?;
///
/// cache.set("user:42", &"alice", &SetOptions::new().with_tags(["users"])).await;
/// let name: Option<String> = cache.get("user:42").await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CacheClient {
    pub(crate) inner: Arc<Inner>,
}

impl CacheClient {
    /// Crea un cliente desconectado; llamar a [`connect`](Self::connect) antes de usarlo.
    pub fn new(store: Arc<dyn KvStore>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                keys: KeySpace::new(config.namespace),
                default_ttl: config.default_ttl,
                connected: AtomicBool::new(false),
                metrics: CacheMetrics::new(),
            }),
        }
    }

    /// Pings the store and marks the client connected.
    pub async fn connect(&self) -> Result<(), StoreError> {
        match self.inner.store.ping().await {
            Ok(()) => {
                self.inner.connected.store(true, Ordering::SeqCst);
                info!(store = self.inner.store.name(), "Cache client connected");
                Ok(())
            },
            Err(e) => {
                self.inner.connected.store(false, Ordering::SeqCst);
                error!(store = self.inner.store.name(), error = %e, "Failed to connect cache client");
                Err(e)
            },
        }
    }

    /// Marks the client disconnected; later operations short-circuit.
    pub fn disconnect(&self) {
        if self.inner.connected.swap(false, Ordering::SeqCst) {
            info!(store = self.inner.store.name(), "Cache client disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> &KeySpace {
        &self.inner.keys
    }

    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    /// Retorna las metricas locales del cliente.
    pub fn metrics(&self) -> &CacheMetrics {
        &self.inner.metrics
    }

    /// Obtiene un valor del cache. Absent on miss, decode failure or store failure.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.is_connected() {
            return None;
        }

        let start = Instant::now();
        let full_key = self.inner.keys.data(key);

        let result = match self.inner.store.get(&full_key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    self.inner.metrics.record_hit();
                    Some(value)
                },
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                    self.inner.metrics.record_miss();
                    None
                },
            },
            Ok(None) => {
                self.inner.metrics.record_miss();
                None
            },
            Err(e) => {
                self.transport_failure("get", key, &e);
                None
            },
        };

        self.inner
            .metrics
            .record_operation_duration("get", start.elapsed());
        result
    }

    /// Serializa y escribe un valor; indexa la key bajo cada tag indicado.
    pub async fn set<T>(&self, key: &str, value: &T, options: &SetOptions) -> bool
    where
        T: Serialize + ?Sized,
    {
        if !self.is_connected() {
            return false;
        }

        let start = Instant::now();
        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize cache value");
                return false;
            },
        };

        let full_key = self.inner.keys.data(key);
        let ttl = options.ttl.unwrap_or(self.inner.default_ttl);

        let tag_sets: Vec<String> = options.tags.iter().map(|t| self.inner.keys.tag(t)).collect();

        if let Err(e) = self
            .inner
            .store
            .set_ex_tagged(&full_key, &serialized, ttl, &tag_sets)
            .await
        {
            self.transport_failure("set", key, &e);
            return false;
        }

        self.inner
            .metrics
            .record_operation_duration("set", start.elapsed());
        true
    }

    /// Returns true iff a key was actually removed.
    pub async fn delete(&self, key: &str) -> bool {
        if !self.is_connected() {
            return false;
        }

        match self.inner.store.delete(&[self.inner.keys.data(key)]).await {
            Ok(removed) => removed > 0,
            Err(e) => {
                self.transport_failure("delete", key, &e);
                false
            },
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        if !self.is_connected() {
            return false;
        }

        match self.inner.store.exists(&self.inner.keys.data(key)).await {
            Ok(found) => found,
            Err(e) => {
                self.transport_failure("exists", key, &e);
                false
            },
        }
    }

    /// Order-preserving multi-get. A store failure turns the whole batch absent.
    pub async fn batch_get<T, K>(&self, keys: &[K]) -> Vec<Option<T>>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        let absent = || keys.iter().map(|_| None).collect();

        if !self.is_connected() || keys.is_empty() {
            return absent();
        }

        let start = Instant::now();
        let full_keys: Vec<String> = keys.iter().map(|k| self.inner.keys.data(k.as_ref())).collect();

        let raw = match self.inner.store.get_many(&full_keys).await {
            Ok(values) if values.len() == keys.len() => values,
            Ok(values) => {
                warn!(
                    expected = keys.len(),
                    received = values.len(),
                    "Store answered a multi-get with the wrong arity"
                );
                return absent();
            },
            Err(e) => {
                self.transport_failure("batch_get", "<batch>", &e);
                return absent();
            },
        };

        let values = raw
            .into_iter()
            .map(|value| {
                let decoded = value.and_then(|v| serde_json::from_str(&v).ok());
                if decoded.is_some() {
                    self.inner.metrics.record_hit();
                } else {
                    self.inner.metrics.record_miss();
                }
                decoded
            })
            .collect();

        self.inner
            .metrics
            .record_operation_duration("batch_get", start.elapsed());
        values
    }

    /// Writes all entries in one pipelined call.
    pub async fn batch_set<T: Serialize>(&self, entries: &[CacheEntry<T>]) -> bool {
        if !self.is_connected() {
            return false;
        }

        let start = Instant::now();
        let mut encoded = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::to_string(&entry.value) {
                Ok(value) => encoded.push((
                    self.inner.keys.data(&entry.key),
                    value,
                    entry.ttl.unwrap_or(self.inner.default_ttl),
                )),
                Err(e) => {
                    warn!(key = %entry.key, error = %e, "Failed to serialize cache value");
                    return false;
                },
            }
        }

        if let Err(e) = self.inner.store.set_many_ex(&encoded).await {
            self.transport_failure("batch_set", "<batch>", &e);
            return false;
        }

        self.inner
            .metrics
            .record_operation_duration("batch_set", start.elapsed());
        true
    }

    /// Reads the store's introspection counters. Zeroed stats on failure.
    pub async fn stats(&self) -> CacheStats {
        if !self.is_connected() {
            return CacheStats::default();
        }

        match self.inner.store.info().await {
            Ok(info) => {
                let total = info.keyspace_hits + info.keyspace_misses;
                let hit_rate = if total == 0 {
                    0.0
                } else {
                    info.keyspace_hits as f64 / total as f64 * 100.0
                };

                CacheStats {
                    memory_used_human: info.used_memory_human,
                    key_count: info.key_count,
                    hits: info.keyspace_hits,
                    misses: info.keyspace_misses,
                    hit_rate_percent: (hit_rate * 100.0).round() / 100.0,
                }
            },
            Err(e) => {
                self.transport_failure("stats", "<info>", &e);
                CacheStats::default()
            },
        }
    }

    pub(crate) fn transport_failure(&self, operation: &str, key: &str, err: &StoreError) {
        self.inner.metrics.record_error(operation);
        if err.is_transport() {
            error!(operation, key = %key, error = %err, "Cache store unreachable");
        } else {
            warn!(operation, key = %key, error = %err, "Cache operation failed");
        }
        debug!(store = self.inner.store.name(), "Degrading cache operation to default");
    }
}
