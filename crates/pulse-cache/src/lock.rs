//! Lease-based distributed lock.
//!
//! A lock is a namespaced key holding a random owner token with a TTL. The
//! lease expires on its own if the holder dies; release deletes the key only
//! while it still holds the caller's token. There is no automatic renewal.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::client::CacheClient;

/// Lease used when the caller does not pick one.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// Opaque proof of ownership returned by [`CacheClient::acquire_lock`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LockToken(String);

impl LockToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for LockToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl CacheClient {
    /// Tries to take the lock `name` for `ttl`.
    ///
    /// Returns `None` when another holder owns it (or the store is down);
    /// contention is not an error and the caller decides whether to retry.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use std::time::Duration;
    /// # use pulse_cache::{CacheClient, CacheConfig, MemoryStore};
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let cache = CacheClient::new(Arc::new(MemoryStore::default()), CacheConfig::default());
    /// # cache.connect().await.unwrap();
    /// if let Some(token) = cache.acquire_lock("monthly-report", Duration::from_secs(30)).await {
    ///     // critical section
    ///     cache.release_lock("monthly-report", &token).await;
    /// }
    /// # }
    /// ```
    pub async fn acquire_lock(&self, name: &str, ttl: Duration) -> Option<LockToken> {
        if !self.is_connected() {
            return None;
        }

        let token = LockToken::generate();
        let key = self.inner.keys.lock(name);

        match self.inner.store.set_nx_ex(&key, token.as_str(), ttl).await {
            Ok(true) => {
                debug!(lock = %name, ttl_secs = ttl.as_secs(), "Lock acquired");
                Some(token)
            },
            Ok(false) => {
                debug!(lock = %name, "Lock held by another owner");
                None
            },
            Err(e) => {
                self.transport_failure("acquire_lock", name, &e);
                None
            },
        }
    }

    /// [`acquire_lock`](Self::acquire_lock) with [`DEFAULT_LOCK_TTL`].
    pub async fn acquire_lock_default(&self, name: &str) -> Option<LockToken> {
        self.acquire_lock(name, DEFAULT_LOCK_TTL).await
    }

    /// Releases the lock only if `token` still owns it.
    ///
    /// Returns false when the token does not match, the lease already
    /// expired, or the store is down.
    pub async fn release_lock(&self, name: &str, token: &LockToken) -> bool {
        if !self.is_connected() {
            return false;
        }

        let key = self.inner.keys.lock(name);
        match self
            .inner
            .store
            .compare_and_delete(&key, token.as_str())
            .await
        {
            Ok(released) => {
                debug!(lock = %name, released, "Lock release attempted");
                released
            },
            Err(e) => {
                self.transport_failure("release_lock", name, &e);
                false
            },
        }
    }
}
