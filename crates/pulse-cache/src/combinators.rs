//! Wrapping combinators for cache-aside reads and write-side eviction.
//!
//! Both take an async function and return a cloneable callable with the same
//! shape, so business code keeps calling `load(args).await` and the caching
//! concern stays at the composition site.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::{CacheClient, SetOptions};

/// Boxed future returned by the wrapped callables.
pub type CachedFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// Wraps `f` with cache-aside reads under the key derived by `key_fn`.
///
/// On a hit the cached value is returned and `f` is not called. On a miss `f`
/// runs; an `Ok` value is written back with `options` and returned. Errors
/// are passed through and never cached.
///
/// # Examples
///
/// ```
/// # use std::sync::Arc;
/// # use pulse_cache::{cacheable, CacheClient, CacheConfig, MemoryStore, SetOptions};
/// # #[tokio::main]
/// # async fn main() {
/// # let cache = CacheClient::new(Arc::new(MemoryStore::default()), CacheConfig::default());
/// # cache.connect().await.unwrap();
/// let balance = cacheable(
///     cache.clone(),
///     |account: &u32| format!("balance:{account}"),
///     SetOptions::new().with_tags(["balances"]),
///     |account: u32| async move { Ok::<_, std::io::Error>(account as f64 * 10.0) },
/// );
///
/// assert_eq!(balance(7).await.unwrap(), 70.0);
/// assert_eq!(cache.get::<f64>("balance:7").await, Some(70.0));
/// # }
/// ```
pub fn cacheable<A, T, E, K, F, Fut>(
    cache: CacheClient,
    key_fn: K,
    options: SetOptions,
    f: F,
) -> impl Fn(A) -> CachedFuture<T, E> + Clone
where
    A: Send + 'static,
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    E: Send + 'static,
    K: Fn(&A) -> String + Send + Sync + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let key_fn = Arc::new(key_fn);
    let f = Arc::new(f);
    let options = Arc::new(options);

    move |args: A| {
        let cache = cache.clone();
        let key_fn = Arc::clone(&key_fn);
        let f = Arc::clone(&f);
        let options = Arc::clone(&options);

        let fut: CachedFuture<T, E> = Box::pin(async move {
            let key = (*key_fn)(&args);
            if let Some(hit) = cache.get::<T>(&key).await {
                debug!(key = %key, "Served from cache");
                return Ok(hit);
            }

            let value = (*f)(args).await?;
            cache.set(&key, &value, &options).await;
            Ok(value)
        });
        fut
    }
}

/// Wraps a mutating `f` so its success evicts cached reads.
///
/// The keys are derived from the arguments before `f` runs. After `f`
/// succeeds every derived key is deleted and every tag invalidated; on
/// error nothing is evicted.
pub fn evicting<A, T, E, K, F, Fut>(
    cache: CacheClient,
    keys_fn: K,
    tags: Vec<String>,
    f: F,
) -> impl Fn(A) -> CachedFuture<T, E> + Clone
where
    A: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    K: Fn(&A) -> Vec<String> + Send + Sync + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let keys_fn = Arc::new(keys_fn);
    let f = Arc::new(f);
    let tags = Arc::new(tags);

    move |args: A| {
        let cache = cache.clone();
        let keys_fn = Arc::clone(&keys_fn);
        let f = Arc::clone(&f);
        let tags = Arc::clone(&tags);

        let fut: CachedFuture<T, E> = Box::pin(async move {
            let keys = (*keys_fn)(&args);
            let value = (*f)(args).await?;

            for key in &keys {
                cache.delete(key).await;
            }
            if !tags.is_empty() {
                cache.invalidate_by_tags(tags.as_slice()).await;
            }
            Ok(value)
        });
        fut
    }
}
