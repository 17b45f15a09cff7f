//! Public types for the retrieval coordinator.

use crate::storage::{CacheBackend, CacheStats, StoreStats};

/// The tier that answered a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Cache,
    Persistence,
    Remote,
}

impl Tier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Persistence => "persistence",
            Self::Remote => "remote",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot from [`super::DataCoordinator::health_check()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    pub cache_backend: CacheBackend,
    /// `None` when running on the memory cache (nothing to check)
    pub cache_connected: Option<bool>,
    pub cache_latency_ms: Option<u64>,
    pub persistence_connected: bool,
    pub persistence_latency_ms: Option<u64>,
    /// Fetches currently pending across all namespaces
    pub inflight: usize,
    /// Persistence reachable and, if Redis is in use, Redis reachable
    pub healthy: bool,
}

/// Cache and database statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashStats {
    pub cache: CacheStats,
    /// `None` if the database could not be queried
    pub store: Option<StoreStats>,
    pub inflight_sessions: usize,
    pub inflight_telemetry: usize,
    pub inflight_schedules: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_display() {
        assert_eq!(format!("{}", Tier::Cache), "cache");
        assert_eq!(format!("{}", Tier::Persistence), "persistence");
        assert_eq!(Tier::Remote.to_string(), "remote");
    }
}
