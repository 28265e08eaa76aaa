//! Namespaced cache client for Pulse.
//!
//! [`CacheClient`] wraps a remote key-value store ([`KvStore`]) and adds key
//! namespacing, tag-based bulk invalidation and a lease lock with
//! owner-checked release. Store failures never reach the caller: they are
//! logged, counted and degraded to a miss, `false`, `0` or a default value.
//!
//! Two stores ship with the crate:
//!
//! - [`RedisStore`] for production, over a reconnecting connection manager.
//! - [`MemoryStore`], an in-process store for development and tests.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pulse_cache::{CacheClient, CacheConfig, MemoryStore, SetOptions};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache = CacheClient::new(Arc::new(MemoryStore::default()), CacheConfig::default());
//! cache.connect().await.unwrap();
//!
//! cache.set("user:42", &"alice", &SetOptions::new().with_tags(["users"])).await;
//! assert_eq!(cache.get::<String>("user:42").await.as_deref(), Some("alice"));
//!
//! cache.invalidate_by_tags(&["users"]).await;
//! assert_eq!(cache.get::<String>("user:42").await, None);
//! # }
//! ```

mod client;
mod combinators;
mod error;
mod invalidation;
mod keys;
mod lock;
mod metrics;
pub mod store;

pub use client::{CacheClient, CacheConfig, CacheEntry, CacheStats, SetOptions};
pub use combinators::{CachedFuture, cacheable, evicting};
pub use error::StoreError;
pub use invalidation::InvalidationResult;
pub use keys::KeySpace;
pub use lock::{DEFAULT_LOCK_TTL, LockToken};
pub use metrics::{CacheMetrics, register_cache_metrics};
pub use store::{KvStore, MemoryStore, RedisStore, StoreInfo};
