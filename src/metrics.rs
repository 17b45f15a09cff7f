// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the retrieval layer.
//!
//! Uses the `metrics` crate for backend-agnostic collection. Nothing is
//! exported unless the embedding application installs a recorder.
//!
//! # Metric Naming Convention
//! - `f1dash_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `tier`: cache, persistence, remote
//! - `kind`: session, telemetry, schedule
//! - `outcome`: hit, miss, success, error, rate_limited

use metrics::{counter, gauge, histogram};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════
// READ PATH - Which tier answered
// ═══════════════════════════════════════════════════════════════════════════

/// Record a lookup against one tier
pub fn record_tier_lookup(tier: &str, kind: &str, hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    counter!(
        "f1dash_tier_lookups_total",
        "tier" => tier.to_string(),
        "kind" => kind.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record end-to-end latency of a request served by `tier`
pub fn record_latency(tier: &str, kind: &str, duration: Duration) {
    histogram!(
        "f1dash_request_seconds",
        "tier" => tier.to_string(),
        "kind" => kind.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a caller that attached to an in-flight fetch instead of starting one
pub fn record_coalesced(kind: &str) {
    counter!(
        "f1dash_coalesced_requests_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Set the number of fetches currently in flight
pub fn set_inflight(kind: &str, count: usize) {
    gauge!(
        "f1dash_inflight_requests",
        "kind" => kind.to_string()
    )
    .set(count as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// REMOTE - Upstream API calls
// ═══════════════════════════════════════════════════════════════════════════

/// Record an upstream call outcome
pub fn record_remote_fetch(endpoint: &str, outcome: &str) {
    counter!(
        "f1dash_remote_fetches_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// CACHE - Degraded behaviour that is never surfaced to callers
// ═══════════════════════════════════════════════════════════════════════════

/// Record a cache write that failed and was swallowed
pub fn record_cache_write_failure(backend: &str) {
    counter!(
        "f1dash_cache_write_failures_total",
        "backend" => backend.to_string()
    )
    .increment(1);
}

/// Record the switch to the in-memory cache at startup
pub fn record_cache_fallback() {
    counter!("f1dash_cache_fallbacks_total").increment(1);
}

/// Record cache entries dropped by invalidation
pub fn record_invalidation(scope: &str, removed: usize) {
    counter!(
        "f1dash_cache_invalidated_total",
        "scope" => scope.to_string()
    )
    .increment(removed as u64);
}

// ═══════════════════════════════════════════════════════════════════════════
// ERROR TRACKING - Categorized error counters for alerting
// ═══════════════════════════════════════════════════════════════════════════

/// Record an error with category for alerting
pub fn record_error(tier: &str, operation: &str, error_type: &str) {
    counter!(
        "f1dash_errors_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// BACKEND HEALTH - Connection status
// ═══════════════════════════════════════════════════════════════════════════

/// Set backend health status (1 = healthy, 0 = unhealthy)
pub fn set_backend_healthy(backend: &str, healthy: bool) {
    gauge!(
        "f1dash_backend_healthy",
        "backend" => backend.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}
