// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Tiered retrieval coordinator.
//!
//! The [`DataCoordinator`] answers every read from the cheapest tier that
//! has the data:
//!
//! ```text
//! get_session(key)
//!   │
//!   ├─► cache ─────────── hit ──► return
//!   │     miss
//!   ├─► persistence ───── hit ──► repopulate cache ──► return
//!   │     miss
//!   └─► remote ── ok ──► persistence ──► cache ──► return
//!                 err ─► RemoteError (nothing written)
//! ```
//!
//! Everything below the cache runs once per key at a time: concurrent misses
//! for the same key share one persistence read and at most one remote call.
//!
//! # Example
//!
//! ```rust,no_run
//! use f1_dash::{DashConfig, DataCoordinator, SessionKey, SessionType};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = DataCoordinator::from_config(&DashConfig::from_env()?).await?;
//!
//! let key = SessionKey::new(2023, "Monza", SessionType::Race);
//! let record = coordinator.get_session(&key).await?;
//! println!("{} drivers", record.drivers.len());
//! # Ok(())
//! # }
//! ```

mod api;
mod generation;
mod inflight;
mod types;

pub use types::{DashStats, HealthCheck, Tier};

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::DashConfig;
use crate::error::DashError;
use crate::model::{Schedule, SessionKey, SessionRecord, TelemetryRecord};
use crate::remote::{OpenF1Source, RemoteSource};
use crate::storage::{PersistStore, SessionCache, SqlStore, StorageError};

use generation::Generations;
use inflight::InFlight;

/// Schedules change rarely; they stay cached this many times longer than
/// sessions.
const SCHEDULE_TTL_FACTOR: u32 = 24;

/// The three tier handles. Cloned into each spawned fetch.
#[derive(Clone)]
pub(crate) struct Tiers {
    pub(crate) cache: SessionCache,
    pub(crate) store: Arc<dyn PersistStore>,
    pub(crate) remote: Arc<dyn RemoteSource>,
    pub(crate) generations: Arc<Generations>,
}

/// Cache-aside coordinator over cache, persistence and remote.
///
/// Handles are long-lived and injected at construction. The coordinator is
/// `Send + Sync`; share it behind an `Arc`.
pub struct DataCoordinator {
    pub(super) tiers: Tiers,
    pub(super) sessions: Arc<InFlight<(SessionRecord, Tier)>>,
    pub(super) telemetry: Arc<InFlight<(TelemetryRecord, Tier)>>,
    pub(super) schedules: Arc<InFlight<(Schedule, Tier)>>,
    /// Separate from `sessions` so a refresh never joins a plain read
    pub(super) refreshes: Arc<InFlight<SessionRecord>>,
    pub(super) telemetry_refreshes: Arc<InFlight<TelemetryRecord>>,
}

impl DataCoordinator {
    pub fn new(cache: SessionCache, store: Arc<dyn PersistStore>, remote: Arc<dyn RemoteSource>) -> Self {
        Self {
            tiers: Tiers {
                cache,
                store,
                remote,
                generations: Arc::new(Generations::new()),
            },
            sessions: Arc::new(InFlight::new("session")),
            telemetry: Arc::new(InFlight::new("telemetry")),
            schedules: Arc::new(InFlight::new("schedule")),
            refreshes: Arc::new(InFlight::new("refresh")),
            telemetry_refreshes: Arc::new(InFlight::new("telemetry_refresh")),
        }
    }

    /// Open the database, ping the cache once and build the OpenF1 client.
    pub async fn from_config(config: &DashConfig) -> Result<Self, DashError> {
        let start = Instant::now();

        let store = SqlStore::open(&config.db_path).await?;
        info!(path = %config.db_path, "Opened session database");

        let cache = SessionCache::connect(
            config.cache_url.as_deref(),
            config.cache_ttl(),
            config.cache_connect_timeout(),
        )
        .await;

        let remote = OpenF1Source::new(&config.api_url, config.api_timeout())?;

        info!(
            cache = %cache.backend(),
            ttl_secs = config.cache_ttl_secs,
            api = %config.api_url,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Data coordinator ready"
        );
        Ok(Self::new(cache, Arc::new(store), Arc::new(remote)))
    }

    #[must_use]
    pub fn cache(&self) -> &SessionCache {
        &self.tiers.cache
    }

    fn schedule_ttl(&self) -> Duration {
        self.tiers.cache.default_ttl() * SCHEDULE_TTL_FACTOR
    }

    // --- Sessions ---

    /// Session data for `key`, from the cheapest tier that has it.
    ///
    /// An empty record (no drivers, `complete == false`) means the upstream
    /// has nothing for the key. It is stored and cached like any other.
    #[tracing::instrument(skip(self, key), fields(key = %key, tier))]
    pub async fn get_session(&self, key: &SessionKey) -> Result<SessionRecord, DashError> {
        let start = Instant::now();
        let cache_key = key.cache_key();

        if let Some(record) = self.tiers.cache.get::<SessionRecord>(&cache_key).await {
            debug!("Cache hit");
            return Ok(served(record, Tier::Cache, "session", start));
        }
        crate::metrics::record_tier_lookup(Tier::Cache.as_str(), "session", false);

        let tiers = self.tiers.clone();
        let key = key.clone();
        let (record, tier) = self
            .sessions
            .run(cache_key, move || async move { tiers.load_session(key).await })
            .await?;
        Ok(served(record, tier, "session", start))
    }

    /// Fetch `key` from the remote regardless of what the cache or database
    /// hold, then write it back to both.
    #[tracing::instrument(skip(self, key), fields(key = %key))]
    pub async fn refresh(&self, key: &SessionKey) -> Result<SessionRecord, DashError> {
        let start = Instant::now();
        let tiers = self.tiers.clone();
        let owned = key.clone();
        let record = self
            .refreshes
            .run(key.cache_key(), move || async move { tiers.fetch_session(owned, None).await })
            .await?;
        info!(drivers = record.drivers.len(), "Session refreshed");
        crate::metrics::record_latency(Tier::Remote.as_str(), "session", start.elapsed());
        Ok(record)
    }

    // --- Telemetry ---

    /// One driver's telemetry for `key`. Never loads the session itself.
    #[tracing::instrument(skip(self, key), fields(key = %key, tier))]
    pub async fn get_telemetry(&self, key: &SessionKey, driver: &str) -> Result<TelemetryRecord, DashError> {
        let start = Instant::now();
        let cache_key = key.telemetry_cache_key(driver);

        if let Some(record) = self.tiers.cache.get::<TelemetryRecord>(&cache_key).await {
            debug!("Cache hit");
            return Ok(served(record, Tier::Cache, "telemetry", start));
        }
        crate::metrics::record_tier_lookup(Tier::Cache.as_str(), "telemetry", false);

        let tiers = self.tiers.clone();
        let key = key.clone();
        let driver = driver.to_string();
        let (record, tier) = self
            .telemetry
            .run(cache_key, move || async move { tiers.load_telemetry(key, driver).await })
            .await?;
        Ok(served(record, tier, "telemetry", start))
    }

    #[tracing::instrument(skip(self, key), fields(key = %key))]
    pub async fn refresh_telemetry(&self, key: &SessionKey, driver: &str) -> Result<TelemetryRecord, DashError> {
        let tiers = self.tiers.clone();
        let owned = key.clone();
        let driver_owned = driver.to_string();
        self.telemetry_refreshes
            .run(key.telemetry_cache_key(driver), move || async move {
                tiers.fetch_telemetry(owned, driver_owned, None).await
            })
            .await
    }
}

/// Record where a read was served from.
fn served<T>(value: T, tier: Tier, kind: &str, start: Instant) -> T {
    tracing::Span::current().record("tier", tier.as_str());
    if tier == Tier::Cache {
        crate::metrics::record_tier_lookup(tier.as_str(), kind, true);
    }
    crate::metrics::record_latency(tier.as_str(), kind, start.elapsed());
    value
}

impl Tiers {
    /// Everything below the cache. Runs once per key at a time.
    async fn load_session(self, key: SessionKey) -> Result<(SessionRecord, Tier), DashError> {
        let cache_key = key.cache_key();
        let seen = self.generations.current(&cache_key);

        if let Some(record) = self.read_persisted("get_session", self.store.get_session(&key).await)? {
            crate::metrics::record_tier_lookup(Tier::Persistence.as_str(), "session", true);
            self.cache_if_current(&cache_key, &record, seen).await;
            return Ok((record, Tier::Persistence));
        }
        crate::metrics::record_tier_lookup(Tier::Persistence.as_str(), "session", false);

        let record = self.fetch_session(key, Some(seen)).await?;
        Ok((record, Tier::Remote))
    }

    /// Remote fetch plus write-back: persistence first, then cache.
    ///
    /// `seen` is the generation a plain read started from; `None` marks a
    /// refresh, which always writes and then bumps the generation.
    async fn fetch_session(self, key: SessionKey, seen: Option<u64>) -> Result<SessionRecord, DashError> {
        let record = self.remote.fetch_session(&key).await.map_err(|e| {
            warn!(key = %key, error = %e, "Remote session fetch failed");
            crate::metrics::record_error(Tier::Remote.as_str(), "fetch_session", "fetch");
            e
        })?;

        let cache_key = key.cache_key();
        if let Some(seen) = seen {
            if !self.generations.is_current(&cache_key, seen) {
                debug!(key = %key, "Refreshed while fetching, leaving tiers to the refresh");
                return Ok(record);
            }
        }

        if let Err(e) = self.store.put_session(&record).await {
            error!(key = %key, error = %e, "Failed to persist session, cache not written");
            crate::metrics::record_error(Tier::Persistence.as_str(), "put_session", "write");
            return Err(e.into());
        }
        self.write_back(&cache_key, &record, seen).await;

        debug!(key = %key, complete = record.complete, "Session fetched and stored");
        Ok(record)
    }

    async fn load_telemetry(self, key: SessionKey, driver: String) -> Result<(TelemetryRecord, Tier), DashError> {
        let cache_key = key.telemetry_cache_key(&driver);
        let seen = self.generations.current(&cache_key);

        let stored = self.store.get_telemetry(&key, &driver).await;
        if let Some(record) = self.read_persisted("get_telemetry", stored)? {
            crate::metrics::record_tier_lookup(Tier::Persistence.as_str(), "telemetry", true);
            self.cache_if_current(&cache_key, &record, seen).await;
            return Ok((record, Tier::Persistence));
        }
        crate::metrics::record_tier_lookup(Tier::Persistence.as_str(), "telemetry", false);

        let record = self.fetch_telemetry(key, driver, Some(seen)).await?;
        Ok((record, Tier::Remote))
    }

    async fn fetch_telemetry(
        self,
        key: SessionKey,
        driver: String,
        seen: Option<u64>,
    ) -> Result<TelemetryRecord, DashError> {
        let record = self.remote.fetch_telemetry(&key, &driver).await.map_err(|e| {
            warn!(key = %key, driver = %driver, error = %e, "Remote telemetry fetch failed");
            crate::metrics::record_error(Tier::Remote.as_str(), "fetch_telemetry", "fetch");
            e
        })?;

        let cache_key = key.telemetry_cache_key(&driver);
        if let Some(seen) = seen {
            if !self.generations.is_current(&cache_key, seen) {
                debug!(key = %key, driver = %driver, "Refreshed while fetching, leaving tiers to the refresh");
                return Ok(record);
            }
        }

        if let Err(e) = self.store.put_telemetry(&record).await {
            error!(key = %key, driver = %driver, error = %e, "Failed to persist telemetry, cache not written");
            crate::metrics::record_error(Tier::Persistence.as_str(), "put_telemetry", "write");
            return Err(e.into());
        }
        self.write_back(&cache_key, &record, seen).await;
        Ok(record)
    }

    /// Cache write after a successful persist. A refresh bumps the generation
    /// between the two so reads that started earlier stop writing the cache.
    async fn write_back<T: Serialize>(&self, cache_key: &str, value: &T, seen: Option<u64>) {
        match seen {
            Some(seen) => self.cache_if_current(cache_key, value, seen).await,
            None => {
                self.generations.bump(cache_key);
                self.cache.put(cache_key, value).await;
            }
        }
    }

    /// Write the cache only if no refresh landed since generation `seen`.
    async fn cache_if_current<T: Serialize>(&self, cache_key: &str, value: &T, seen: u64) {
        if !self.generations.is_current(cache_key, seen) {
            debug!(key = cache_key, "Refreshed meanwhile, skipping cache write-back");
            return;
        }
        self.cache.put(cache_key, value).await;

        // A refresh may have bumped between the check and the write; its own
        // cache write can come before ours, so drop ours and let the next
        // read go to persistence.
        if !self.generations.is_current(cache_key, seen) {
            self.cache.invalidate(cache_key).await;
        }
    }

    async fn load_schedule(self, season: i32, ttl: Duration) -> Result<(Schedule, Tier), DashError> {
        let cache_key = crate::model::key::schedule_cache_key(season);

        let stored = self.store.get_schedule(season).await;
        if let Some(schedule) = self.read_persisted("get_schedule", stored)? {
            crate::metrics::record_tier_lookup(Tier::Persistence.as_str(), "schedule", true);
            self.cache.set(&cache_key, &schedule, ttl).await;
            return Ok((schedule, Tier::Persistence));
        }
        crate::metrics::record_tier_lookup(Tier::Persistence.as_str(), "schedule", false);

        let schedule = self.remote.fetch_schedule(season).await.map_err(|e| {
            warn!(season, error = %e, "Remote schedule fetch failed");
            crate::metrics::record_error(Tier::Remote.as_str(), "fetch_schedule", "fetch");
            e
        })?;

        // An empty season has no rows to store; only the cache remembers it.
        if !schedule.is_empty() {
            if let Err(e) = self.store.put_schedule(&schedule).await {
                error!(season, error = %e, "Failed to persist schedule, cache not written");
                crate::metrics::record_error(Tier::Persistence.as_str(), "put_schedule", "write");
                return Err(e.into());
            }
        }
        self.cache.set(&cache_key, &schedule, ttl).await;
        Ok((schedule, Tier::Remote))
    }

    /// A stored payload that no longer decodes is treated as absent, so the
    /// remote fetch that follows overwrites it. Backend errors surface.
    fn read_persisted<T>(&self, op: &str, result: Result<Option<T>, StorageError>) -> Result<Option<T>, DashError> {
        match result {
            Ok(found) => Ok(found),
            Err(StorageError::Serialization { id, reason }) => {
                warn!(id = %id, reason = %reason, "Stored payload is unreadable, refetching");
                crate::metrics::record_error(Tier::Persistence.as_str(), op, "decode");
                Ok(None)
            }
            Err(e) => {
                error!(error = %e, op, "Persistence read failed");
                crate::metrics::record_error(Tier::Persistence.as_str(), op, "backend");
                Err(e.into())
            }
        }
    }
}
