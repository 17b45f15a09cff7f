//! Redis cache backing.
//!
//! Values are JSON strings written with `SET key value EX ttl`, so Redis owns
//! expiry. Keys are already namespaced (`f1dash:...`) by the caller; the
//! optional prefix here only matters when sharing an instance.
//!
//! There is no retry on any command: a failed cache call falls through to
//! the next tier, which is cheaper than waiting on a sick Redis.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use super::traits::{CacheStore, StorageError};

/// Keys examined per `SCAN` round-trip.
const SCAN_COUNT: usize = 200;

pub struct RedisStore {
    connection: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    /// Connect once and confirm with `PING`, giving up after `timeout`.
    pub async fn connect(connection_string: &str, timeout: Duration) -> Result<Self, StorageError> {
        Self::connect_with_prefix(connection_string, None, timeout).await
    }

    pub async fn connect_with_prefix(
        connection_string: &str,
        prefix: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let client = Client::open(connection_string)?;

        let connect = async {
            let mut connection = ConnectionManager::new(client).await?;
            let _: String = redis::cmd("PING").query_async(&mut connection).await?;
            Ok::<_, redis::RedisError>(connection)
        };

        let connection = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| StorageError::Backend(format!("Redis connect timed out after {:?}", timeout)))??;

        Ok(Self {
            connection,
            prefix: prefix.unwrap_or("").to_string(),
        })
    }

    #[inline]
    fn prefixed_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}", self.prefix, key)
        }
    }

    /// Escape glob metacharacters so a key prefix matches literally.
    fn match_pattern(&self, prefix: &str) -> String {
        let mut pattern = String::with_capacity(prefix.len() + self.prefix.len() + 1);
        for c in self.prefix.chars().chain(prefix.chars()) {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('*');
        pattern
    }

    /// Cursor through every key matching `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut conn = self.connection.clone();
        let pattern = self.match_pattern(prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(keys)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(self.prefixed_key(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        let mut conn = self.connection.clone();
        // EX 0 is rejected by Redis; clamp to one second.
        let secs = ttl.as_secs().max(1);
        let _: () = conn.set_ex(self.prefixed_key(key), value, secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let mut conn = self.connection.clone();
        let removed: usize = conn.del(self.prefixed_key(key)).await?;
        Ok(removed > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let keys = self.scan_prefix(prefix).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        let removed: usize = conn.del(&keys).await?;
        Ok(removed)
    }

    async fn count_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        Ok(self.scan_prefix(prefix).await?.len())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
