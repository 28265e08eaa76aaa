//! Cache invalidation by tag and by namespace.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::client::CacheClient;

/// Resultado de una operación de invalidación.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvalidationResult {
    /// Número de keys eliminadas.
    pub count: u64,
    /// Tags procesados.
    pub tags: Vec<String>,
}

impl CacheClient {
    /// Invalida todas las keys indexadas bajo cualquiera de los tags dados.
    ///
    /// For each tag the member keys and then the tag set itself are removed
    /// in one atomic store call. Tags without members are a no-op. Returns
    /// the total number of keys removed; a store failure stops the walk and
    /// returns what was removed so far.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use pulse_cache::{CacheClient, CacheConfig, MemoryStore, SetOptions};
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let cache = CacheClient::new(Arc::new(MemoryStore::default()), CacheConfig::default());
    /// # cache.connect().await.unwrap();
    /// cache.set("user:1", &"alice", &SetOptions::new().with_tags(["users"])).await;
    /// let removed = cache.invalidate_by_tags(&["users"]).await;
    /// assert_eq!(removed, 1);
    /// # }
    /// ```
    pub async fn invalidate_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> u64 {
        self.invalidate_tags(tags).await.count
    }

    /// Same as [`invalidate_by_tags`](Self::invalidate_by_tags), reporting the tags processed.
    pub async fn invalidate_tags<S: AsRef<str>>(&self, tags: &[S]) -> InvalidationResult {
        let mut result = InvalidationResult::default();
        if !self.is_connected() {
            return result;
        }

        let start = Instant::now();
        let store = &self.inner.store;

        for tag in tags {
            let tag = tag.as_ref();
            let tag_key = self.inner.keys.tag(tag);

            let members = match store.set_members(&tag_key).await {
                Ok(members) => members,
                Err(e) => {
                    self.transport_failure("invalidate", tag, &e);
                    break;
                },
            };

            if members.is_empty() {
                debug!(tag = %tag, "Tag has no members");
                result.tags.push(tag.to_string());
                continue;
            }

            match store.delete_set_with_members(&tag_key, &members).await {
                Ok(removed) => {
                    result.count += removed;
                    result.tags.push(tag.to_string());
                },
                Err(e) => {
                    self.transport_failure("invalidate", tag, &e);
                    break;
                },
            }
        }

        self.inner.metrics.record_invalidated(result.count);
        self.inner
            .metrics
            .record_operation_duration("invalidate", start.elapsed());

        info!(
            tags = ?result.tags,
            count = result.count,
            "Cache entries invalidated by tag"
        );

        result
    }

    /// Elimina todas las keys bajo el namespace de este cliente.
    ///
    /// Keys of other tenants sharing the store are never touched.
    pub async fn flush_namespace(&self) -> u64 {
        if !self.is_connected() {
            return 0;
        }

        let prefix = self.inner.keys.prefix().to_string();
        match self.inner.store.delete_prefix(&prefix).await {
            Ok(removed) => {
                info!(namespace = %prefix, count = removed, "Cache namespace flushed");
                removed
            },
            Err(e) => {
                self.transport_failure("flush", &prefix, &e);
                0
            },
        }
    }
}
