//! Redis-backed store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::{debug, info};

use super::{KvStore, StoreInfo, ttl_secs};
use crate::error::StoreError;

/// Deletes KEYS[1] only while it still holds ARGV[1].
const COMPARE_AND_DELETE: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

const SCAN_BATCH: usize = 200;

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::command(err.code().unwrap_or("redis"), err.to_string())
        }
    }
}

/// A Redis server reached through a [`ConnectionManager`], which reconnects
/// on its own after transport failures.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    compare_and_delete: Script,
    url: String,
}

impl RedisStore {
    /// Opens a managed connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| StoreError::connection(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::connection(e.to_string()))?;

        info!(url = %url, "Redis store connected");

        Ok(Self {
            manager,
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
            url: url.to_string(),
        })
    }

    /// Returns the URL this store connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn();
        let values: Vec<Option<String>> = redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        Ok(values)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_many_ex(&self, entries: &[(String, String, Duration)]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for (key, value, ttl) in entries {
            pipe.cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(ttl_secs(*ttl))
                .ignore();
        }

        let mut conn = self.conn();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        // SET NX answers nil when the key already exists
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        let removed: u64 = redis::cmd("DEL").arg(keys).query_async(&mut conn).await?;
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let count: u64 = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(count > 0)
    }

    async fn add_to_sets(&self, sets: &[String], member: &str) -> Result<(), StoreError> {
        if sets.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for set in sets {
            pipe.cmd("SADD").arg(set).arg(member).ignore();
        }

        let mut conn = self.conn();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn set_ex_tagged(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        sets: &[String],
    ) -> Result<(), StoreError> {
        if sets.is_empty() {
            return self.set_ex(key, value, ttl).await;
        }

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .ignore();
        for set in sets {
            pipe.cmd("SADD").arg(set).arg(key).ignore();
        }

        let mut conn = self.conn();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        let members: Vec<String> = redis::cmd("SMEMBERS").arg(set).query_async(&mut conn).await?;
        Ok(members)
    }

    async fn delete_set_with_members(&self, set: &str, members: &[String]) -> Result<u64, StoreError> {
        let mut conn = self.conn();

        if members.is_empty() {
            let _: u64 = redis::cmd("DEL").arg(set).query_async(&mut conn).await?;
            return Ok(0);
        }

        // MULTI/EXEC so no reader sees the members gone while the set survives
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("DEL")
            .arg(members)
            .cmd("DEL")
            .arg(set)
            .ignore();

        let (removed,): (u64,) = pipe.query_async(&mut conn).await?;
        Ok(removed)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let removed: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed == 1)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn();
        let pattern = format!("{prefix}*");
        let mut cursor: u64 = 0;
        let mut total = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let removed: u64 = redis::cmd("DEL").arg(&keys).query_async(&mut conn).await?;
                total += removed;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        debug!(prefix = %prefix, removed = total, "Deleted keys by prefix");
        Ok(total)
    }

    async fn info(&self) -> Result<StoreInfo, StoreError> {
        let mut conn = self.conn();

        let memory: String = redis::cmd("INFO").arg("memory").query_async(&mut conn).await?;
        let stats: String = redis::cmd("INFO").arg("stats").query_async(&mut conn).await?;
        let key_count: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;

        Ok(StoreInfo {
            used_memory_human: info_field(&memory, "used_memory_human")
                .unwrap_or("0B")
                .to_string(),
            keyspace_hits: info_field(&stats, "keyspace_hits")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            keyspace_misses: info_field(&stats, "keyspace_misses")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            key_count,
        })
    }

    fn name(&self) -> &str {
        "redis"
    }
}

/// Extracts `field` from an `INFO` section body (`field:value` lines).
fn info_field<'a>(info: &'a str, field: &str) -> Option<&'a str> {
    info.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        (name == field).then(|| value.trim())
    })
}
