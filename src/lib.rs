//! # f1-dash
//!
//! Tiered data access for a terminal Formula 1 dashboard.
//!
//! ## Architecture
//!
//! Every read for a (season, event, session) key is answered by the cheapest
//! tier that has it:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Presentation / UI loop                  │
//! │  • Calls the coordinator directly or via the Dispatcher    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Cache: Redis or memory                   │
//! │  • JSON values with TTL (SET EX / lazy expiry)             │
//! │  • Chosen once at startup, failures never surface          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ miss
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Persistence: SQLite file                  │
//! │  • Survives restarts, upsert per key                       │
//! │  • A hit repopulates the cache                             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ miss
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Remote: OpenF1 API                      │
//! │  • One fetch per key in flight                             │
//! │  • Written to persistence, then cache                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use f1_dash::{DashConfig, DataCoordinator, SessionKey, SessionType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DashConfig {
//!         cache_url: None, // memory cache
//!         ..Default::default()
//!     };
//!     let coordinator = DataCoordinator::from_config(&config).await?;
//!
//!     let key = SessionKey::new(2023, "Monza", SessionType::Qualifying);
//!     let record = coordinator.get_session(&key).await?;
//!     for row in record.table() {
//!         println!("{}", row.join("  "));
//!     }
//!
//!     // Telemetry is fetched separately, per driver
//!     let telemetry = coordinator.get_telemetry(&key, "LEC").await?;
//!     if let Some(summary) = telemetry.summary() {
//!         println!("max speed {:.0} km/h", summary.max_speed);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: the [`DataCoordinator`] read path and write-back
//! - [`storage`]: cache adapter (Redis, memory) and SQLite store
//! - [`remote`]: upstream API client
//! - [`dispatch`]: async bridge for a single-threaded UI loop
//! - [`model`]: keys and records
//! - [`resilience`]: retry for database statements
//! - [`metrics`]: counters and histograms

pub mod config;
pub mod model;
pub mod storage;
pub mod remote;
pub mod resilience;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod metrics;

pub use config::{ConfigError, DashConfig};
pub use coordinator::{DataCoordinator, DashStats, HealthCheck, Tier};
pub use dispatch::{Dispatcher, Outcome, Request, RetrievalEvent};
pub use error::DashError;
pub use model::{
    DriverEntry, EventRef, EventStatus, EventSummary, KeyParseError, ResultRow, Schedule, SessionKey,
    SessionRecord, SessionType, TelemetryRecord, TelemetrySample, TelemetrySummary,
};
pub use remote::{OpenF1Source, RemoteError, RemoteSource};
pub use resilience::retry::RetryConfig;
pub use storage::{
    CacheBackend, CacheStore, PersistStore, RedisStore, SessionCache, SqlStore, StorageError, StoreStats,
};
