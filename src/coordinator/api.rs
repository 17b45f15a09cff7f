//! Schedules, invalidation and diagnostics.
//!
//! Invalidation only ever touches the cache. The database keeps every record
//! it has, so the next read after an invalidation is served from persistence
//! and never reaches the network.

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::DashError;
use crate::model::key::{event_cache_prefixes, schedule_cache_key};
use crate::model::{EventRef, Schedule, SessionKey};
use crate::storage::CacheBackend;

use super::{served, DashStats, DataCoordinator, HealthCheck, Tier};

impl DataCoordinator {
    // ═══════════════════════════════════════════════════════════════════════════
    // API: Schedules
    // ═══════════════════════════════════════════════════════════════════════════

    /// A season's events, with statuses computed against the current time.
    ///
    /// Cached for 24 times the session TTL.
    #[tracing::instrument(skip(self), fields(tier))]
    pub async fn get_schedule(&self, season: i32) -> Result<Schedule, DashError> {
        let start = Instant::now();
        let cache_key = schedule_cache_key(season);

        let mut schedule = match self.tiers.cache.get::<Schedule>(&cache_key).await {
            Some(schedule) => served(schedule, Tier::Cache, "schedule", start),
            None => {
                crate::metrics::record_tier_lookup(Tier::Cache.as_str(), "schedule", false);
                let tiers = self.tiers.clone();
                let ttl = self.schedule_ttl();
                let (schedule, tier) = self
                    .schedules
                    .run(cache_key, move || async move { tiers.load_schedule(season, ttl).await })
                    .await?;
                served(schedule, tier, "schedule", start)
            }
        };

        schedule.reclassify(Utc::now());
        Ok(schedule)
    }

    /// Seasons with anything stored locally, newest first. Reads the
    /// database only; nothing is fetched.
    pub async fn stored_seasons(&self) -> Result<Vec<i32>, DashError> {
        self.tiers.store.seasons().await.map_err(|e| {
            warn!(error = %e, "Failed to list stored seasons");
            crate::metrics::record_error(Tier::Persistence.as_str(), "seasons", "backend");
            DashError::from(e)
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // API: Cache invalidation
    // ═══════════════════════════════════════════════════════════════════════════

    /// Drop the cached session and every cached telemetry series for it.
    /// Returns the number of cache entries removed.
    pub async fn invalidate_session(&self, key: &SessionKey) -> usize {
        let cache = &self.tiers.cache;
        let mut removed = cache.invalidate_prefixes(&[key.telemetry_cache_prefix()]).await;
        if cache.invalidate(&key.cache_key()).await {
            removed += 1;
        }
        crate::metrics::record_invalidation("session", removed);
        debug!(key = %key, removed, "Invalidated cached session");
        removed
    }

    /// Drop every cached session and telemetry entry of one event.
    ///
    /// Entries are matched on the event reference as given: invalidating
    /// `"Monza"` leaves entries cached under `Round(14)` in place.
    pub async fn invalidate_event(&self, season: i32, event: &EventRef) -> usize {
        let removed = self
            .tiers
            .cache
            .invalidate_prefixes(&event_cache_prefixes(season, event))
            .await;
        crate::metrics::record_invalidation("event", removed);
        info!(season, event = %event, removed, "Invalidated cached event");
        removed
    }

    /// Drop everything this application has cached.
    pub async fn clear_cache(&self) -> usize {
        let removed = self.tiers.cache.clear().await;
        crate::metrics::record_invalidation("all", removed);
        info!(removed, "Cleared cache");
        removed
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // API: Diagnostics
    // ═══════════════════════════════════════════════════════════════════════════

    /// Probe the cache (Redis PING) and the database (`SELECT 1`).
    ///
    /// Never fails: unreachable backends are reported as such.
    pub async fn health_check(&self) -> HealthCheck {
        let cache_backend = self.tiers.cache.backend();

        let (cache_check, store_check) = tokio::join!(
            async {
                if cache_backend == CacheBackend::Memory {
                    return (None, None);
                }
                let start = Instant::now();
                match self.tiers.cache.ping().await {
                    Ok(()) => (Some(true), Some(start.elapsed().as_millis() as u64)),
                    Err(_) => (Some(false), None),
                }
            },
            async {
                let start = Instant::now();
                match self.tiers.store.ping().await {
                    Ok(()) => (true, Some(start.elapsed().as_millis() as u64)),
                    Err(_) => (false, None),
                }
            }
        );

        let (cache_connected, cache_latency_ms) = cache_check;
        let (persistence_connected, persistence_latency_ms) = store_check;

        if let Some(connected) = cache_connected {
            crate::metrics::set_backend_healthy("redis", connected);
        }
        crate::metrics::set_backend_healthy("sqlite", persistence_connected);

        HealthCheck {
            cache_backend,
            cache_connected,
            cache_latency_ms,
            persistence_connected,
            persistence_latency_ms,
            inflight: self.inflight(),
            healthy: persistence_connected && cache_connected != Some(false),
        }
    }

    /// Fetches currently pending across all namespaces.
    #[must_use]
    pub fn inflight(&self) -> usize {
        self.sessions.len()
            + self.telemetry.len()
            + self.schedules.len()
            + self.refreshes.len()
            + self.telemetry_refreshes.len()
    }

    pub async fn stats(&self) -> DashStats {
        let cache = self.tiers.cache.stats().await;
        let store = match self.tiers.store.stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(error = %e, "Failed to read database stats");
                None
            }
        };

        DashStats {
            cache,
            store,
            inflight_sessions: self.sessions.len() + self.refreshes.len(),
            inflight_telemetry: self.telemetry.len() + self.telemetry_refreshes.len(),
            inflight_schedules: self.schedules.len(),
        }
    }
}
