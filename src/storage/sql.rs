// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQLite persistence for sessions, telemetry and schedules.
//!
//! Payloads are stored as JSON text next to the key columns the dashboard
//! filters on:
//!
//! ```sql
//! CREATE TABLE session_results (
//!   session_id   TEXT PRIMARY KEY,   -- 2023_monza_R
//!   event_id     TEXT NOT NULL,      -- 2023_monza
//!   season       INTEGER NOT NULL,
//!   event        TEXT NOT NULL,
//!   session_type TEXT NOT NULL,
//!   session_name TEXT,
//!   payload      TEXT NOT NULL,      -- SessionRecord as JSON
//!   complete     INTEGER NOT NULL,
//!   fetched_at   INTEGER NOT NULL,   -- epoch millis
//!   updated_at   INTEGER NOT NULL
//! )
//!
//! CREATE TABLE telemetry (
//!   session_id, driver, season, event, session_type, payload, fetched_at,
//!   PRIMARY KEY (session_id, driver)
//! )
//!
//! CREATE TABLE events (
//!   event_id TEXT PRIMARY KEY, season, round, name, country, location,
//!   event_date, status, updated_at
//! )
//! ```
//!
//! Every write is a single-statement upsert (`ON CONFLICT DO UPDATE`), so a
//! key always holds either the previous record or the new one.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use sqlx::Row;

use super::traits::{PersistStore, StorageError, StoreStats};
use crate::model::key::{event_id, normalize_driver};
use crate::model::{EventRef, EventStatus, EventSummary, Schedule, SessionKey, SessionRecord, TelemetryRecord};
use crate::resilience::{retry, retry_if, RetryConfig};

/// SQLITE_BUSY and SQLITE_LOCKED primary result codes.
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";

pub struct SqlStore {
    pool: SqlitePool,
    path: PathBuf,
}

fn is_transient(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some(SQLITE_BUSY) | Some(SQLITE_LOCKED)),
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn encode<T: Serialize>(id: &str, value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(id: &str, payload: &str) -> Result<T, StorageError> {
    serde_json::from_str(payload).map_err(|e| StorageError::Serialization {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

impl SqlStore {
    /// Open (creating if needed) the database file and its schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        // One connection: the dashboard is the only writer and never issues
        // overlapping statements.
        let pool = retry("sql_connect", &RetryConfig::startup(), || {
            let options = options.clone();
            async move {
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .acquire_timeout(Duration::from_secs(10))
                    .connect_with(options)
                    .await
            }
        })
        .await?;

        let store = Self { pool, path };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        const SCHEMA: [&str; 6] = [
            r#"
            CREATE TABLE IF NOT EXISTS session_results (
                session_id TEXT PRIMARY KEY,
                event_id TEXT NOT NULL,
                season INTEGER NOT NULL,
                event TEXT NOT NULL,
                session_type TEXT NOT NULL,
                session_name TEXT,
                payload TEXT NOT NULL,
                complete INTEGER NOT NULL DEFAULT 0,
                fetched_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS telemetry (
                session_id TEXT NOT NULL,
                driver TEXT NOT NULL,
                season INTEGER NOT NULL,
                event TEXT NOT NULL,
                session_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                fetched_at INTEGER NOT NULL,
                PRIMARY KEY (session_id, driver)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS events (
                event_id TEXT PRIMARY KEY,
                season INTEGER NOT NULL,
                round INTEGER NOT NULL,
                name TEXT NOT NULL,
                country TEXT,
                location TEXT,
                event_date TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'upcoming',
                updated_at INTEGER NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_sessions_event ON session_results(event_id)",
            "CREATE INDEX IF NOT EXISTS idx_sessions_season ON session_results(season)",
            "CREATE INDEX IF NOT EXISTS idx_events_season ON events(season)",
        ];

        retry("sql_init_schema", &RetryConfig::startup(), || async {
            for statement in SCHEMA {
                sqlx::query(statement).execute(&self.pool).await?;
            }
            Ok::<_, sqlx::Error>(())
        })
        .await?;

        Ok(())
    }

    /// True when a session row exists, without decoding its payload.
    pub async fn session_exists(&self, key: &SessionKey) -> Result<bool, StorageError> {
        let id = key.storage_id();
        let row = retry_if(
            "sql_session_exists",
            &RetryConfig::query(),
            || sqlx::query("SELECT 1 FROM session_results WHERE session_id = ? LIMIT 1")
                .bind(&id)
                .fetch_optional(&self.pool),
            is_transient,
        )
        .await?;
        Ok(row.is_some())
    }

    /// Delete sessions and telemetry fetched more than `max_age` ago.
    /// Returns the number of rows removed.
    pub async fn prune_sessions(&self, max_age: Duration) -> Result<u64, StorageError> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| StorageError::Backend(format!("Invalid retention: {}", e)))?;
        let cutoff = (Utc::now() - max_age).timestamp_millis();

        let mut tx = self.pool.begin().await?;
        let sessions = sqlx::query("DELETE FROM session_results WHERE fetched_at < ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let telemetry = sqlx::query("DELETE FROM telemetry WHERE fetched_at < ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        tracing::info!(sessions, telemetry, "Pruned stale rows");
        Ok(sessions + telemetry)
    }

    fn parse_event_row(row: &sqlx::sqlite::SqliteRow) -> Result<EventSummary, StorageError> {
        let event_id: String = row.try_get("event_id")?;
        let date_str: String = row.try_get("event_date")?;
        let date = DateTime::parse_from_rfc3339(&date_str)
            .map_err(|e| StorageError::Serialization {
                id: event_id.clone(),
                reason: e.to_string(),
            })?
            .with_timezone(&Utc);
        let status_str: String = row.try_get("status")?;
        let status = EventStatus::from_str(&status_str).map_err(|reason| StorageError::Serialization {
            id: event_id.clone(),
            reason,
        })?;
        let season: i64 = row.try_get("season")?;
        let round: i64 = row.try_get("round")?;

        Ok(EventSummary {
            season: season as i32,
            round: round as u32,
            name: row.try_get("name")?,
            country: row.try_get::<Option<String>, _>("country")?.unwrap_or_default(),
            location: row.try_get::<Option<String>, _>("location")?.unwrap_or_default(),
            date,
            status,
        })
    }
}

#[async_trait]
impl PersistStore for SqlStore {
    async fn get_session(&self, key: &SessionKey) -> Result<Option<SessionRecord>, StorageError> {
        let id = key.storage_id();
        let row = retry_if(
            "sql_get_session",
            &RetryConfig::query(),
            || sqlx::query("SELECT payload FROM session_results WHERE session_id = ?")
                .bind(&id)
                .fetch_optional(&self.pool),
            is_transient,
        )
        .await?;

        match row {
            Some(row) => {
                let payload: String = row.try_get("payload")?;
                decode(&id, &payload).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn put_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let key = &record.key;
        let id = key.storage_id();
        let payload = encode(&id, record)?;
        let event_id = key.event_id();
        let event = key.event.slug();
        let session_type = key.session.code();
        let fetched_at = record.fetched_at.timestamp_millis();

        retry_if(
            "sql_put_session",
            &RetryConfig::query(),
            || sqlx::query(
                "INSERT INTO session_results
                    (session_id, event_id, season, event, session_type, session_name, payload, complete, fetched_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(session_id) DO UPDATE SET
                    session_name = excluded.session_name,
                    payload = excluded.payload,
                    complete = excluded.complete,
                    fetched_at = excluded.fetched_at,
                    updated_at = excluded.updated_at",
            )
            .bind(&id)
            .bind(&event_id)
            .bind(key.season)
            .bind(&event)
            .bind(session_type)
            .bind(&record.session_name)
            .bind(&payload)
            .bind(record.complete)
            .bind(fetched_at)
            .bind(now_millis())
            .execute(&self.pool),
            is_transient,
        )
        .await?;

        Ok(())
    }

    async fn get_telemetry(&self, key: &SessionKey, driver: &str) -> Result<Option<TelemetryRecord>, StorageError> {
        let id = key.storage_id();
        let driver = normalize_driver(driver);
        let row = retry_if(
            "sql_get_telemetry",
            &RetryConfig::query(),
            || sqlx::query("SELECT payload FROM telemetry WHERE session_id = ? AND driver = ?")
                .bind(&id)
                .bind(&driver)
                .fetch_optional(&self.pool),
            is_transient,
        )
        .await?;

        match row {
            Some(row) => {
                let payload: String = row.try_get("payload")?;
                decode(&format!("{}/{}", id, driver), &payload).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn put_telemetry(&self, record: &TelemetryRecord) -> Result<(), StorageError> {
        let key = &record.key;
        let id = key.storage_id();
        let driver = normalize_driver(&record.driver);
        let payload = encode(&format!("{}/{}", id, driver), record)?;
        let event = key.event.slug();

        retry_if(
            "sql_put_telemetry",
            &RetryConfig::query(),
            || sqlx::query(
                "INSERT INTO telemetry (session_id, driver, season, event, session_type, payload, fetched_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(session_id, driver) DO UPDATE SET
                    payload = excluded.payload,
                    fetched_at = excluded.fetched_at",
            )
            .bind(&id)
            .bind(&driver)
            .bind(key.season)
            .bind(&event)
            .bind(key.session.code())
            .bind(&payload)
            .bind(record.fetched_at.timestamp_millis())
            .execute(&self.pool),
            is_transient,
        )
        .await?;

        Ok(())
    }

    async fn get_schedule(&self, season: i32) -> Result<Option<Schedule>, StorageError> {
        let rows = retry_if(
            "sql_get_schedule",
            &RetryConfig::query(),
            || sqlx::query(
                "SELECT event_id, season, round, name, country, location, event_date, status, updated_at
                 FROM events WHERE season = ? ORDER BY round",
            )
            .bind(season)
            .fetch_all(&self.pool),
            is_transient,
        )
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut events = Vec::with_capacity(rows.len());
        let mut updated_at = 0i64;
        for row in &rows {
            events.push(Self::parse_event_row(row)?);
            updated_at = updated_at.max(row.try_get("updated_at")?);
        }

        Ok(Some(Schedule {
            season,
            events,
            fetched_at: DateTime::from_timestamp_millis(updated_at).unwrap_or_else(Utc::now),
        }))
    }

    async fn put_schedule(&self, schedule: &Schedule) -> Result<(), StorageError> {
        let updated_at = schedule.fetched_at.timestamp_millis();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM events WHERE season = ?")
            .bind(schedule.season)
            .execute(&mut *tx)
            .await?;

        for event in &schedule.events {
            sqlx::query(
                "INSERT INTO events (event_id, season, round, name, country, location, event_date, status, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(event_id) DO UPDATE SET
                    name = excluded.name,
                    country = excluded.country,
                    location = excluded.location,
                    event_date = excluded.event_date,
                    status = excluded.status,
                    updated_at = excluded.updated_at",
            )
            .bind(event.event_id())
            .bind(event.season)
            .bind(event.round as i64)
            .bind(&event.name)
            .bind(&event.country)
            .bind(&event.location)
            .bind(event.date.to_rfc3339())
            .bind(event.status.as_str())
            .bind(updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn sessions_for_event(&self, season: i32, event: &EventRef) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query("SELECT session_id FROM session_results WHERE event_id = ? ORDER BY session_id")
            .bind(event_id(season, event))
            .fetch_all(&self.pool)
            .await?;

        let mut ids: Vec<String> = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.try_get("session_id")?);
        }
        Ok(ids)
    }

    async fn seasons(&self) -> Result<Vec<i32>, StorageError> {
        let rows = sqlx::query(
            "SELECT season FROM events UNION SELECT season FROM session_results ORDER BY season DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut seasons: Vec<i32> = Vec::with_capacity(rows.len());
        for row in rows {
            let season: i64 = row.try_get("season")?;
            seasons.push(season as i32);
        }
        Ok(seasons)
    }

    async fn stats(&self) -> Result<StoreStats, StorageError> {
        let count = |table: &'static str| {
            let sql = format!("SELECT COUNT(*) AS cnt FROM {}", table);
            let pool = self.pool.clone();
            async move {
                let row = sqlx::query(&sql).fetch_one(&pool).await?;
                let cnt: i64 = row.try_get("cnt")?;
                Ok::<u64, sqlx::Error>(cnt as u64)
            }
        };

        let sessions = count("session_results").await?;
        let telemetry = count("telemetry").await?;
        let events = count("events").await?;

        let rows = sqlx::query(
            "SELECT season, COUNT(*) AS cnt FROM session_results GROUP BY season ORDER BY season DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut sessions_by_season = Vec::with_capacity(rows.len());
        for row in rows {
            let season: i64 = row.try_get("season")?;
            let cnt: i64 = row.try_get("cnt")?;
            sessions_by_season.push((season as i32, cnt as u64));
        }

        let db_size_bytes = tokio::fs::metadata(&self.path).await.map(|m| m.len()).unwrap_or(0);

        Ok(StoreStats {
            sessions,
            telemetry,
            events,
            sessions_by_season,
            db_size_bytes,
        })
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResultRow, SessionType, TelemetrySample};
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn temp_store() -> (SqlStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqlStore::open(dir.path().join("f1_data.db")).await.unwrap();
        (store, dir)
    }

    fn monza_race() -> SessionKey {
        SessionKey::new(2023, "Monza", SessionType::Race)
    }

    fn race_record(winner: &str) -> SessionRecord {
        let mut record = SessionRecord::empty(monza_race());
        record.results.push(ResultRow {
            position: 1,
            driver: winner.to_string(),
            team: "Red Bull Racing".to_string(),
            best_lap_secs: None,
            last_lap_secs: Some(85.1),
            laps: 51,
            points: 25.0,
        });
        record.complete = true;
        record
    }

    #[tokio::test]
    async fn test_open_creates_file_and_schema() {
        let (store, dir) = temp_store().await;
        assert!(dir.path().join("f1_data.db").exists());
        store.ping().await.unwrap();
        assert_eq!(store.stats().await.unwrap().sessions, 0);
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let (store, _dir) = temp_store().await;
        let record = race_record("VER");

        assert!(store.get_session(&monza_race()).await.unwrap().is_none());
        store.put_session(&record).await.unwrap();

        let loaded = store.get_session(&monza_race()).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(store.session_exists(&monza_race()).await.unwrap());
    }

    #[tokio::test]
    async fn test_event_name_lookup_is_case_insensitive() {
        let (store, _dir) = temp_store().await;
        store.put_session(&race_record("VER")).await.unwrap();

        let shouted = SessionKey::new(2023, "  MONZA ", SessionType::Race);
        assert!(store.get_session(&shouted).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_put_session_is_last_write_wins() {
        let (store, _dir) = temp_store().await;
        store.put_session(&race_record("VER")).await.unwrap();
        store.put_session(&race_record("LEC")).await.unwrap();

        let loaded = store.get_session(&monza_race()).await.unwrap().unwrap();
        assert_eq!(loaded.results[0].driver, "LEC");
        assert_eq!(store.stats().await.unwrap().sessions, 1);
    }

    #[tokio::test]
    async fn test_telemetry_keyed_by_driver() {
        let (store, _dir) = temp_store().await;
        let mut ver = TelemetryRecord::empty(monza_race(), "VER");
        ver.samples.push(TelemetrySample { t: 0.0, speed: 320.5, throttle: 100.0, brake: 0.0, gear: 8, rpm: 11800, distance: 0.0 });
        store.put_telemetry(&ver).await.unwrap();

        let loaded = store.get_telemetry(&monza_race(), "ver").await.unwrap().unwrap();
        assert_eq!(loaded, ver);
        assert!(store.get_telemetry(&monza_race(), "HAM").await.unwrap().is_none());
        // Telemetry rows never stand in for a session row
        assert!(store.get_session(&monza_race()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_schedule_replaces_season() {
        let (store, _dir) = temp_store().await;
        let date = Utc.with_ymd_and_hms(2023, 9, 3, 13, 0, 0).unwrap();
        let event = |round: u32, name: &str| EventSummary {
            season: 2023,
            round,
            name: name.to_string(),
            country: "Italy".to_string(),
            location: "Monza".to_string(),
            date,
            status: EventStatus::Completed,
        };

        let first = Schedule { season: 2023, events: vec![event(14, "Italian Grand Prix"), event(15, "Old Name")], fetched_at: date };
        store.put_schedule(&first).await.unwrap();
        let second = Schedule { season: 2023, events: vec![event(14, "Italian Grand Prix")], fetched_at: date };
        store.put_schedule(&second).await.unwrap();

        let loaded = store.get_schedule(2023).await.unwrap().unwrap();
        assert_eq!(loaded.events, second.events);
        assert_eq!(loaded.fetched_at, date);
        assert!(store.get_schedule(2022).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sessions_for_event() {
        let (store, _dir) = temp_store().await;
        store.put_session(&race_record("VER")).await.unwrap();
        store.put_session(&SessionRecord::empty(SessionKey::new(2023, "monza", SessionType::Qualifying))).await.unwrap();
        store.put_session(&SessionRecord::empty(SessionKey::new(2023, "Spa", SessionType::Race))).await.unwrap();

        let ids = store.sessions_for_event(2023, &EventRef::Name("Monza".into())).await.unwrap();
        assert_eq!(ids, vec!["2023_monza_Q".to_string(), "2023_monza_R".to_string()]);
    }

    #[tokio::test]
    async fn test_seasons_cover_schedules_and_sessions() {
        let (store, _dir) = temp_store().await;
        assert!(store.seasons().await.unwrap().is_empty());

        store.put_session(&race_record("VER")).await.unwrap();
        store.put_session(&SessionRecord::empty(SessionKey::new(2023, "Spa", SessionType::Race))).await.unwrap();
        store.put_session(&SessionRecord::empty(SessionKey::new(2021, "Spa", SessionType::Race))).await.unwrap();

        let date = Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, 0).unwrap();
        let schedule = Schedule {
            season: 2024,
            events: vec![EventSummary {
                season: 2024,
                round: 1,
                name: "Bahrain Grand Prix".into(),
                country: "Bahrain".into(),
                location: "Sakhir".into(),
                date,
                status: EventStatus::Completed,
            }],
            fetched_at: Utc::now(),
        };
        store.put_schedule(&schedule).await.unwrap();

        assert_eq!(store.seasons().await.unwrap(), vec![2024, 2023, 2021]);
    }

    #[tokio::test]
    async fn test_prune_removes_only_old_rows() {
        let (store, _dir) = temp_store().await;
        let mut old = race_record("VER");
        old.fetched_at = Utc::now() - chrono::Duration::days(60);
        store.put_session(&old).await.unwrap();
        store.put_session(&SessionRecord::empty(SessionKey::new(2024, "Monza", SessionType::Race))).await.unwrap();

        let removed = store.prune_sessions(Duration::from_secs(30 * 24 * 3600)).await.unwrap();
        assert_eq!(removed, 1);
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.sessions, 1);
        assert_eq!(stats.sessions_by_season, vec![(2024, 1)]);
        assert!(stats.db_size_bytes > 0);
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_serialization_error() {
        let (store, _dir) = temp_store().await;
        store.put_session(&race_record("VER")).await.unwrap();
        sqlx::query("UPDATE session_results SET payload = 'not json'")
            .execute(&store.pool)
            .await
            .unwrap();

        let err = store.get_session(&monza_race()).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization { .. }));
    }
}
