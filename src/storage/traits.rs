//! Storage contracts for the cache tier and the persistence tier.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{EventRef, Schedule, SessionKey, SessionRecord, TelemetryRecord};

#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Failed to (de)serialize stored payload for '{id}': {reason}")]
    Serialization { id: String, reason: String },
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

impl From<redis::RedisError> for StorageError {
    fn from(e: redis::RedisError) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Raw key/value cache with per-entry TTL.
///
/// Values are opaque strings (JSON documents). Implementations must treat
/// expired entries as absent.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError>;
    /// Whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Delete every key starting with `prefix`. Returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StorageError>;

    /// Number of live entries under `prefix`.
    async fn count_prefix(&self, prefix: &str) -> Result<usize, StorageError>;

    /// Connectivity check.
    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Row counts and file size, for the dashboard's status line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub sessions: u64,
    pub telemetry: u64,
    pub events: u64,
    /// (season, stored sessions), newest season first
    pub sessions_by_season: Vec<(i32, u64)>,
    pub db_size_bytes: u64,
}

/// Durable store for sessions, telemetry and schedules.
///
/// `put_*` are upserts: the latest write for a key replaces the previous row.
#[async_trait]
pub trait PersistStore: Send + Sync {
    async fn get_session(&self, key: &SessionKey) -> Result<Option<SessionRecord>, StorageError>;
    async fn put_session(&self, record: &SessionRecord) -> Result<(), StorageError>;

    async fn get_telemetry(
        &self,
        key: &SessionKey,
        driver: &str,
    ) -> Result<Option<TelemetryRecord>, StorageError>;
    async fn put_telemetry(&self, record: &TelemetryRecord) -> Result<(), StorageError>;

    async fn get_schedule(&self, season: i32) -> Result<Option<Schedule>, StorageError>;
    async fn put_schedule(&self, schedule: &Schedule) -> Result<(), StorageError>;

    /// Session ids stored for one event.
    async fn sessions_for_event(&self, season: i32, event: &EventRef) -> Result<Vec<String>, StorageError>;

    /// Seasons with a stored schedule or session, newest first.
    async fn seasons(&self) -> Result<Vec<i32>, StorageError>;

    async fn stats(&self) -> Result<StoreStats, StorageError> {
        Ok(StoreStats::default())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
