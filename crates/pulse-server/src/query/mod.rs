//! Query instrumentation.
//!
//! Samples every executed query into a bounded ring per signature, flags
//! slow ones, and offers cache-aside helpers that time what they compute.

mod analysis;
mod events;

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use pulse_cache::{CacheClient, CacheEntry, SetOptions};
use pulse_core::{QuerySample, QuerySignature, Ring, cutoff, mean, normalize_query, round2};

pub use analysis::{FrequentQuery, IndexSuggestion, IndexType, QueryCategory, QueryPatterns};
pub use events::QueryEvent;

/// Signatures listed in pattern analysis and considered for index hints.
const TOP_QUERIES: usize = 10;

/// Registra las metricas de queries.
pub fn register_query_metrics() {
    metrics::describe_histogram!(
        "pulse_query_duration_seconds",
        "Duration of instrumented queries in seconds"
    );
    metrics::describe_counter!(
        "pulse_slow_queries_total",
        "Queries slower than the slow-query threshold"
    );
    metrics::describe_counter!(
        "pulse_query_samples_evicted_total",
        "Query samples dropped to stay under the global sample cap"
    );
}

/// Configuracion de la instrumentacion de queries.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Umbral de query lenta en ms (default: 1000)
    pub slow_query_ms: u64,
    /// Muestras por signature (default: 1000)
    pub ring_capacity: usize,
    /// Promedio minimo para sugerir un indice (default: 500 ms)
    pub suggestion_min_avg_ms: f64,
    /// Muestras en total, sumando todas las signatures (default: 50000)
    pub max_total_samples: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            slow_query_ms: 1000,
            ring_capacity: 1000,
            suggestion_min_avg_ms: 500.0,
            max_total_samples: 50_000,
        }
    }
}

/// Totals over every retained sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStats {
    pub total_unique_queries: usize,
    pub total_executions: usize,
    pub average_execution_time: f64,
    pub slow_query_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPerformanceReport {
    pub total_queries: usize,
    pub average_execution_time: f64,
    pub slow_queries: Vec<QuerySample>,
    pub index_suggestions: Vec<IndexSuggestion>,
    pub cache_hit_rate: f64,
    pub timestamp: DateTime<Utc>,
}

/// What a page computation returns and what gets cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageData<T> {
    pub data: Vec<T>,
    pub total: u64,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    fn from_data(data: PageData<T>, page: u32, limit: u32) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            data.total.div_ceil(u64::from(limit))
        };
        Self {
            data: data.data,
            total: data.total,
            page,
            total_pages,
        }
    }
}

/// A sample tagged with its arrival order across all signatures.
struct Tracked {
    seq: u64,
    sample: QuerySample,
}

struct SignatureHistory {
    normalized: String,
    samples: Ring<Tracked>,
}

/// Every retained sample, grouped by signature.
#[derive(Default)]
struct History {
    by_signature: HashMap<QuerySignature, SignatureHistory>,
    /// Oldest retained `seq` of each signature, so the globally oldest sample
    /// is always the first entry.
    heads: BTreeMap<u64, QuerySignature>,
    next_seq: u64,
    total: usize,
}

impl History {
    fn push(&mut self, sample: QuerySample, ring_capacity: usize) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let signature = sample.signature.clone();

        let history = self
            .by_signature
            .entry(signature.clone())
            .or_insert_with(|| SignatureHistory {
                normalized: normalize_query(&sample.raw_text),
                samples: Ring::new(ring_capacity),
            });

        let was_empty = history.samples.is_empty();
        match history.samples.push(Tracked { seq, sample }) {
            Some(evicted) => {
                self.heads.remove(&evicted.seq);
                if let Some(head) = history.samples.oldest() {
                    self.heads.insert(head.seq, signature);
                }
            },
            None => {
                self.total += 1;
                if was_empty {
                    self.heads.insert(seq, signature);
                }
            },
        }
    }

    /// Drops the oldest sample of all, and its signature if nothing is left.
    fn evict_oldest(&mut self) -> bool {
        let Some((_, signature)) = self.heads.pop_first() else {
            return false;
        };
        let Some(history) = self.by_signature.get_mut(&signature) else {
            return false;
        };

        history.samples.pop_oldest();
        self.total = self.total.saturating_sub(1);

        let next_head = history.samples.oldest().map(|t| t.seq);
        match next_head {
            Some(seq) => {
                self.heads.insert(seq, signature);
            },
            None => {
                self.by_signature.remove(&signature);
            },
        }
        true
    }

    fn rebuild_heads(&mut self) {
        self.heads = self
            .by_signature
            .iter()
            .filter_map(|(signature, h)| h.samples.oldest().map(|t| (t.seq, signature.clone())))
            .collect();
        self.total = self.by_signature.values().map(|h| h.samples.len()).sum();
    }

    fn samples(&self) -> impl Iterator<Item = &QuerySample> {
        self.by_signature
            .values()
            .flat_map(|h| h.samples.iter().map(|t| &t.sample))
    }
}

/// Per-signature query history with slow-query detection.
///
/// Each signature keeps at most `ring_capacity` samples, and all of them
/// together at most `max_total_samples`; past that the oldest sample of any
/// signature goes first.
pub struct QueryInstrumentation {
    cache: CacheClient,
    history: Mutex<History>,
    slow_query_ms: AtomicU64,
    ring_capacity: usize,
    max_total_samples: usize,
    suggestion_min_avg_ms: f64,
}

impl QueryInstrumentation {
    pub fn new(cache: CacheClient, config: QueryConfig) -> Self {
        Self {
            cache,
            history: Mutex::new(History::default()),
            slow_query_ms: AtomicU64::new(config.slow_query_ms),
            ring_capacity: config.ring_capacity,
            max_total_samples: config.max_total_samples.max(1),
            suggestion_min_avg_ms: config.suggestion_min_avg_ms,
        }
    }

    pub fn slow_query_threshold_ms(&self) -> u64 {
        self.slow_query_ms.load(Ordering::Relaxed)
    }

    /// Changes the slow-query threshold for every later sample and query.
    pub fn set_slow_query_threshold(&self, ms: u64) {
        self.slow_query_ms.store(ms, Ordering::Relaxed);
        debug!(threshold_ms = ms, "Slow query threshold updated");
    }

    fn is_slow(&self, duration_ms: f64) -> bool {
        duration_ms > self.slow_query_threshold_ms() as f64
    }

    /// Records one executed query and returns its signature.
    pub fn record_query(
        &self,
        raw_text: &str,
        duration_ms: f64,
        rows_affected: u64,
        user_id: Option<&str>,
    ) -> QuerySignature {
        let mut sample = QuerySample::new(raw_text, duration_ms, rows_affected);
        if let Some(user_id) = user_id {
            sample = sample.with_user(user_id);
        }
        self.record_sample(sample)
    }

    /// Appends a pre-built sample to its signature's ring.
    pub fn record_sample(&self, sample: QuerySample) -> QuerySignature {
        let signature = sample.signature.clone();
        let duration_ms = sample.duration_ms;

        histogram!("pulse_query_duration_seconds").record(duration_ms / 1000.0);
        if self.is_slow(duration_ms) {
            counter!("pulse_slow_queries_total").increment(1);
            warn!(
                query = %sample.raw_text,
                duration_ms,
                signature = %signature,
                "Slow query detected"
            );
        }

        let mut history = self.history.lock();
        history.push(sample, self.ring_capacity);

        let mut evicted = 0u64;
        while history.total > self.max_total_samples && history.evict_oldest() {
            evicted += 1;
        }
        drop(history);

        if evicted > 0 {
            counter!("pulse_query_samples_evicted_total").increment(evicted);
        }
        signature
    }

    /// Cache-aside read of a single value.
    ///
    /// A hit returns the cached value and records nothing. A miss times
    /// `compute`, records the duration under `key`, caches the value for
    /// `ttl` and returns it. Errors from `compute` are returned as-is and
    /// leave the cache untouched.
    pub async fn find_with_cache<T, E, F, Fut>(
        &self,
        key: &str,
        compute: F,
        ttl: Duration,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.cache.get::<T>(key).await {
            return Ok(cached);
        }

        let start = Instant::now();
        let value = compute().await?;
        let elapsed = elapsed_ms(start);

        self.record_query(key, elapsed, rows_in(&value), None);
        self.cache
            .set(key, &value, &SetOptions::new().with_ttl(ttl))
            .await;

        Ok(value)
    }

    /// Cache-aside read of many values with a single computation for the misses.
    ///
    /// Keys already cached are served from the cache; every other item is
    /// passed to one `batch_compute` call, whose results must line up with
    /// its input. One sample covers the whole batch, and fresh results are
    /// written back in one pipelined call.
    pub async fn batch_find<I, T, E, K, F, Fut>(
        &self,
        items: Vec<I>,
        key_fn: K,
        batch_compute: F,
        ttl: Duration,
    ) -> Result<HashMap<String, T>, E>
    where
        T: Serialize + DeserializeOwned,
        K: Fn(&I) -> String,
        F: FnOnce(Vec<I>) -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        let keys: Vec<String> = items.iter().map(&key_fn).collect();
        let cached: Vec<Option<T>> = self.cache.batch_get(&keys).await;

        let mut found = HashMap::with_capacity(keys.len());
        let mut missing_items = Vec::new();
        let mut missing_keys = Vec::new();

        for ((item, key), hit) in items.into_iter().zip(keys).zip(cached) {
            match hit {
                Some(value) => {
                    found.insert(key, value);
                },
                None => {
                    missing_items.push(item);
                    missing_keys.push(key);
                },
            }
        }

        if missing_items.is_empty() {
            return Ok(found);
        }

        let count = missing_items.len();
        let start = Instant::now();
        let computed = batch_compute(missing_items).await?;
        let elapsed = elapsed_ms(start);

        if computed.len() != count {
            warn!(
                requested = count,
                returned = computed.len(),
                "Batch computation returned a different number of results"
            );
        }

        self.record_query(
            &format!("Batch query for {count} items"),
            elapsed,
            computed.len() as u64,
            None,
        );

        let entries: Vec<CacheEntry<&T>> = missing_keys
            .iter()
            .zip(computed.iter())
            .map(|(key, value)| CacheEntry::new(key.clone(), value).with_ttl(ttl))
            .collect();
        self.cache.batch_set(&entries).await;
        drop(entries);

        found.extend(missing_keys.into_iter().zip(computed));
        Ok(found)
    }

    /// Cache-aside read of one page.
    ///
    /// The cache key carries both page and limit. `totalPages` is always
    /// derived from the cached total and the current `limit`.
    pub async fn paginated_find<T, E, F, Fut>(
        &self,
        base_key: &str,
        page: u32,
        limit: u32,
        compute_page: F,
        ttl: Duration,
    ) -> Result<Page<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(u64, u32) -> Fut,
        Fut: Future<Output = Result<PageData<T>, E>>,
    {
        let cache_key = format!("{base_key}:page:{page}:limit:{limit}");

        if let Some(cached) = self.cache.get::<PageData<T>>(&cache_key).await {
            return Ok(Page::from_data(cached, page, limit));
        }

        let offset = u64::from(page.saturating_sub(1)) * u64::from(limit);
        let start = Instant::now();
        let data = compute_page(offset, limit).await?;
        let elapsed = elapsed_ms(start);

        self.record_query(
            &format!("Paginated query: {base_key}"),
            elapsed,
            data.data.len() as u64,
            None,
        );
        self.cache
            .set(&cache_key, &data, &SetOptions::new().with_ttl(ttl))
            .await;

        Ok(Page::from_data(data, page, limit))
    }

    /// Slowest samples above the current threshold, slowest first.
    pub fn slow_queries(&self, limit: usize) -> Vec<QuerySample> {
        let history = self.history.lock();
        let mut slow: Vec<QuerySample> = history
            .samples()
            .filter(|s| self.is_slow(s.duration_ms))
            .cloned()
            .collect();
        drop(history);

        slow.sort_by(|a, b| b.duration_ms.total_cmp(&a.duration_ms));
        slow.truncate(limit);
        slow
    }

    /// Top signatures by count plus executions per category.
    pub fn analyze_query_patterns(&self) -> QueryPatterns {
        let history = self.history.lock();
        let mut all: Vec<FrequentQuery> = history
            .by_signature
            .iter()
            .filter(|(_, h)| !h.samples.is_empty())
            .map(|(signature, h)| {
                let durations: Vec<f64> = h.samples.iter().map(|t| t.sample.duration_ms).collect();
                FrequentQuery {
                    signature: signature.clone(),
                    query: h.normalized.clone(),
                    count: durations.len(),
                    avg_duration_ms: mean(&durations),
                    category: QueryCategory::classify(&h.normalized),
                }
            })
            .collect();
        drop(history);

        let mut patterns = QueryPatterns::default();
        for query in &all {
            *patterns.query_distribution.entry(query.category).or_insert(0) += query.count;
        }

        all.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.signature.cmp(&b.signature))
        });
        all.truncate(TOP_QUERIES);
        patterns.most_frequent_queries = all;
        patterns
    }

    /// Index hints for frequent signatures whose average is above the floor.
    pub fn index_suggestions(&self) -> Vec<IndexSuggestion> {
        self.analyze_query_patterns()
            .most_frequent_queries
            .iter()
            .filter(|q| q.avg_duration_ms > self.suggestion_min_avg_ms)
            .filter_map(IndexSuggestion::for_query)
            .collect()
    }

    pub fn query_stats(&self) -> QueryStats {
        let history = self.history.lock();
        let durations: Vec<f64> = history.samples().map(|s| s.duration_ms).collect();

        QueryStats {
            total_unique_queries: history.by_signature.len(),
            total_executions: durations.len(),
            average_execution_time: mean(&durations),
            slow_query_count: durations.iter().filter(|d| self.is_slow(**d)).count(),
        }
    }

    /// Query report for dashboards, including the cache hit rate.
    pub async fn performance_report(&self) -> QueryPerformanceReport {
        let stats = self.query_stats();
        let slow_queries = self.slow_queries(TOP_QUERIES);
        let index_suggestions = self.index_suggestions();
        let cache_stats = self.cache.stats().await;

        QueryPerformanceReport {
            total_queries: stats.total_executions,
            average_execution_time: round2(stats.average_execution_time),
            slow_queries,
            index_suggestions,
            cache_hit_rate: cache_stats.hit_rate_percent,
            timestamp: Utc::now(),
        }
    }

    /// Drops samples older than `max_age`, and signatures left empty.
    ///
    /// Returns how many samples were dropped.
    pub fn cleanup_old_metrics(&self, max_age: Duration) -> usize {
        let limit = cutoff(Utc::now(), max_age);
        let mut history = self.history.lock();

        let mut dropped = 0;
        history.by_signature.retain(|_, h| {
            dropped += h.samples.retain(|t| t.sample.timestamp > limit);
            !h.samples.is_empty()
        });

        if dropped > 0 {
            history.rebuild_heads();
            debug!(
                dropped,
                remaining = history.by_signature.len(),
                "Pruned old query samples"
            );
        }
        dropped
    }

    /// Samples currently kept for `signature`, oldest first.
    pub fn samples(&self, signature: &QuerySignature) -> Vec<QuerySample> {
        self.history
            .lock()
            .by_signature
            .get(signature)
            .map(|h| h.samples.iter().map(|t| t.sample.clone()).collect())
            .unwrap_or_default()
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Element count of a value that serializes to a list, otherwise one.
fn rows_in<T: Serialize>(value: &T) -> u64 {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Array(items)) => items.len() as u64,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use chrono::TimeDelta;
    use pulse_cache::{CacheConfig, MemoryStore};

    use super::*;

    async fn instrumentation() -> QueryInstrumentation {
        let cache = CacheClient::new(Arc::new(MemoryStore::default()), CacheConfig::default());
        cache.connect().await.unwrap();
        QueryInstrumentation::new(cache, QueryConfig::default())
    }

    fn offline() -> QueryInstrumentation {
        offline_with(QueryConfig::default())
    }

    fn offline_with(config: QueryConfig) -> QueryInstrumentation {
        let cache = CacheClient::new(Arc::new(MemoryStore::default()), CacheConfig::default());
        QueryInstrumentation::new(cache, config)
    }

    #[test]
    fn test_placeholders_share_a_signature() {
        let queries = offline();

        let a = queries.record_query("SELECT * FROM users WHERE id = $1", 5.0, 1, None);
        let b = queries.record_query("SELECT * FROM users WHERE id = $42", 7.0, 1, None);
        let c = queries.record_query("SELECT * FROM users WHERE name = $1", 7.0, 1, None);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(queries.samples(&a).len(), 2);
    }

    #[test]
    fn test_ring_keeps_newest_thousand() {
        let queries = offline();
        let mut signature = None;

        for i in 0..1001 {
            signature = Some(queries.record_query("SELECT 1", i as f64, 0, None));
        }

        let samples = queries.samples(&signature.unwrap());
        assert_eq!(samples.len(), 1000);
        assert_eq!(samples[0].duration_ms, 1.0);
        assert_eq!(samples[999].duration_ms, 1000.0);
    }

    #[test]
    fn test_global_cap_bounds_per_user_signatures() {
        let queries = offline_with(QueryConfig {
            max_total_samples: 100,
            ..QueryConfig::default()
        });

        for _ in 0..3 {
            for user in 0..300 {
                queries.record_query(&format!("user:{user}:transactions"), 5.0, 1, None);
            }
        }

        let stats = queries.query_stats();
        assert_eq!(stats.total_executions, 100);
        assert_eq!(stats.total_unique_queries, 100);
        assert!(queries.samples(&QuerySignature::of("user:0:transactions")).is_empty());
        assert!(queries.samples(&QuerySignature::of("user:199:transactions")).is_empty());
        assert_eq!(queries.samples(&QuerySignature::of("user:200:transactions")).len(), 1);
        assert_eq!(queries.samples(&QuerySignature::of("user:299:transactions")).len(), 1);
    }

    #[test]
    fn test_global_cap_evicts_oldest_across_signatures() {
        let queries = offline_with(QueryConfig {
            ring_capacity: 2,
            max_total_samples: 5,
            ..QueryConfig::default()
        });

        for ms in 1..=4 {
            queries.record_query("SELECT hot", ms as f64, 0, None);
        }
        let hot = QuerySignature::of("SELECT hot");
        queries.record_query("SELECT a", 10.0, 0, None);
        queries.record_query("SELECT b", 10.0, 0, None);
        queries.record_query("SELECT c", 10.0, 0, None);
        assert_eq!(queries.query_stats().total_executions, 5);

        // the ring already dropped 1.0 and 2.0; 3.0 is now the oldest overall
        queries.record_query("SELECT d", 10.0, 0, None);

        let durations: Vec<f64> = queries.samples(&hot).iter().map(|s| s.duration_ms).collect();
        assert_eq!(durations, vec![4.0]);
        assert_eq!(queries.query_stats().total_executions, 5);
        assert_eq!(queries.query_stats().total_unique_queries, 5);
    }

    #[test]
    fn test_global_cap_holds_after_cleanup() {
        let queries = offline_with(QueryConfig {
            max_total_samples: 3,
            ..QueryConfig::default()
        });
        let old = Utc::now() - TimeDelta::hours(30);
        queries.record_sample(QuerySample::new("SELECT old", 5.0, 0).at(old));
        queries.record_query("SELECT x", 5.0, 0, None);

        assert_eq!(queries.cleanup_old_metrics(Duration::from_secs(86_400)), 1);

        queries.record_query("SELECT y", 5.0, 0, None);
        queries.record_query("SELECT z", 5.0, 0, None);
        queries.record_query("SELECT w", 5.0, 0, None);

        assert_eq!(queries.query_stats().total_executions, 3);
        assert!(queries.samples(&QuerySignature::of("SELECT x")).is_empty());
        assert_eq!(queries.samples(&QuerySignature::of("SELECT w")).len(), 1);
    }

    #[test]
    fn test_slow_queries_sorted_and_limited() {
        let queries = offline();
        queries.record_query("SELECT a", 1500.0, 0, None);
        queries.record_query("SELECT b", 3000.0, 0, None);
        queries.record_query("SELECT c", 999.0, 0, None);
        queries.record_query("SELECT d", 2000.0, 0, None);

        let slow = queries.slow_queries(2);
        let durations: Vec<f64> = slow.iter().map(|s| s.duration_ms).collect();
        assert_eq!(durations, vec![3000.0, 2000.0]);
    }

    #[test]
    fn test_threshold_is_runtime_mutable() {
        let queries = offline();
        queries.record_query("SELECT a", 300.0, 0, None);
        assert!(queries.slow_queries(10).is_empty());

        queries.set_slow_query_threshold(200);
        assert_eq!(queries.slow_queries(10).len(), 1);
        assert_eq!(queries.query_stats().slow_query_count, 1);
    }

    #[test]
    fn test_patterns_count_and_categorize() {
        let queries = offline();
        for _ in 0..3 {
            queries.record_query(r#"SELECT * FROM "Transaction" WHERE "userId" = $1"#, 600.0, 5, None);
        }
        queries.record_query("SELECT * FROM accounts", 10.0, 1, None);

        let patterns = queries.analyze_query_patterns();
        assert_eq!(patterns.most_frequent_queries[0].count, 3);
        assert_eq!(patterns.most_frequent_queries[0].avg_duration_ms, 600.0);
        assert_eq!(patterns.query_distribution[&QueryCategory::Transaction], 3);
        assert_eq!(patterns.query_distribution[&QueryCategory::Account], 1);
    }

    #[test]
    fn test_suggestions_need_slow_average() {
        let queries = offline();
        queries.record_query("SELECT * FROM users WHERE email = $1", 400.0, 1, None);
        assert!(queries.index_suggestions().is_empty());

        queries.record_query("SELECT * FROM users WHERE email = $1", 800.0, 1, None);
        let suggestions = queries.index_suggestions();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].table, "User");
    }

    #[test]
    fn test_empty_history_reports_zeroes() {
        let queries = offline();
        assert_eq!(queries.query_stats(), QueryStats::default());
        assert!(queries.analyze_query_patterns().most_frequent_queries.is_empty());
    }

    #[test]
    fn test_cleanup_drops_old_samples_and_empty_signatures() {
        let queries = offline();
        let old = Utc::now() - TimeDelta::hours(30);
        let old_sig = queries.record_sample(QuerySample::new("SELECT old", 5.0, 0).at(old));
        let fresh_sig = queries.record_query("SELECT fresh", 5.0, 0, None);

        assert_eq!(queries.cleanup_old_metrics(Duration::from_secs(86_400)), 1);
        assert!(queries.samples(&old_sig).is_empty());
        assert_eq!(queries.samples(&fresh_sig).len(), 1);
        assert_eq!(queries.query_stats().total_unique_queries, 1);

        // nothing new in between: second run changes nothing
        assert_eq!(queries.cleanup_old_metrics(Duration::from_secs(86_400)), 0);
        assert_eq!(queries.query_stats().total_executions, 1);
    }

    #[tokio::test]
    async fn test_find_with_cache_records_only_on_miss() {
        let queries = instrumentation().await;
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Vec<u32> = queries
                .find_with_cache(
                    "user:1:transactions",
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, String>(vec![1, 2, 3])
                    },
                    Duration::from_secs(60),
                )
                .await
                .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let samples = queries.samples(&QuerySignature::of("user:1:transactions"));
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].rows_affected, 3);
    }

    #[tokio::test]
    async fn test_find_with_cache_errors_are_not_cached() {
        let queries = instrumentation().await;

        let result: Result<u32, &str> = queries
            .find_with_cache("k", || async { Err("db down") }, Duration::from_secs(60))
            .await;

        assert_eq!(result, Err("db down"));
        assert_eq!(queries.query_stats().total_executions, 0);
    }

    #[tokio::test]
    async fn test_batch_find_computes_only_misses_once() {
        let queries = instrumentation().await;
        queries
            .cache
            .set("account:1", &"cached-1", &SetOptions::new())
            .await;

        let calls = AtomicUsize::new(0);
        let result = queries
            .batch_find(
                vec![1u32, 2, 3],
                |id| format!("account:{id}"),
                |ids: Vec<u32>| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        assert_eq!(ids, vec![2, 3]);
                        Ok::<_, String>(ids.iter().map(|id| format!("fresh-{id}")).collect())
                    }
                },
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.len(), 3);
        assert_eq!(result["account:1"], "cached-1");
        assert_eq!(result["account:3"], "fresh-3");

        let samples = queries.samples(&QuerySignature::of("Batch query for 2 items"));
        assert_eq!(samples.len(), 1);
        assert_eq!(queries.query_stats().total_executions, 1);

        // now everything is cached
        let again = queries
            .batch_find(
                vec![1u32, 2, 3],
                |id| format!("account:{id}"),
                |_: Vec<u32>| async { Err::<Vec<String>, _>("should not run".to_string()) },
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        assert_eq!(again, result);
    }

    #[tokio::test]
    async fn test_paginated_find_recomputes_total_pages() {
        let queries = instrumentation().await;

        let page = queries
            .paginated_find(
                "transactions:user:1",
                2,
                10,
                |offset, limit| async move {
                    assert_eq!((offset, limit), (10, 10));
                    Ok::<_, String>(PageData {
                        data: vec![11u32, 12],
                        total: 25,
                    })
                },
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 2);

        let cached = queries
            .paginated_find(
                "transactions:user:1",
                2,
                10,
                |_, _| async { Err::<PageData<u32>, _>("should not run".to_string()) },
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        assert_eq!(cached, page);
        assert_eq!(
            queries
                .samples(&QuerySignature::of("Paginated query: transactions:user:1"))
                .len(),
            1
        );
    }

    #[test]
    fn test_zero_limit_has_no_pages() {
        let page = Page::from_data(PageData::<u32> { data: vec![], total: 5 }, 1, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn test_report_rounds_average() {
        let queries = instrumentation().await;
        queries.record_query("SELECT a", 1.0, 0, None);
        queries.record_query("SELECT b", 2.0, 0, None);
        queries.record_query("SELECT c", 2.0, 0, None);

        let report = queries.performance_report().await;
        assert_eq!(report.total_queries, 3);
        assert_eq!(report.average_execution_time, 1.67);
        assert!(report.slow_queries.is_empty());
    }
}
