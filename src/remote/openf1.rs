// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! [OpenF1](https://openf1.org) REST client.
//!
//! Every endpoint returns a JSON array filtered by query parameters. Keys map
//! onto it in two hops:
//!
//! ```text
//! (season, event)  ── /meetings?year=Y ──────────────► meeting_key
//! (meeting, type)  ── /sessions?meeting_key=M&... ───► session_key
//! session_key      ── /drivers /laps /position /session_result ─► SessionRecord
//! session_key, D   ── /car_data?driver_number=D ─────► TelemetryRecord
//! ```
//!
//! Pre-season testing meetings are skipped and the rest are numbered by start
//! date, so round numbers line up with the championship calendar.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{RemoteError, RemoteSource};
use crate::model::key::normalize_driver;
use crate::model::{
    DriverEntry, EventRef, EventStatus, EventSummary, PositionSample, ResultRow, Schedule, SessionKey,
    SessionRecord, SessionType, TelemetryRecord, TelemetrySample,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openf1.org/v1";

/// Characters of an error body kept in [`RemoteError::Api`].
const MAX_ERROR_BODY: usize = 200;

// ═══════════════════════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
struct ApiMeeting {
    meeting_key: u64,
    #[serde(default)]
    meeting_name: String,
    #[serde(default)]
    country_name: String,
    #[serde(default)]
    location: String,
    date_start: DateTime<Utc>,
}

impl ApiMeeting {
    fn is_testing(&self) -> bool {
        self.meeting_name.to_ascii_lowercase().contains("testing")
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ApiSession {
    session_key: u64,
    #[serde(default)]
    session_name: String,
    meeting_key: u64,
    #[serde(default)]
    date_start: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiDriver {
    driver_number: u32,
    #[serde(default)]
    name_acronym: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    team_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiLap {
    driver_number: u32,
    lap_number: u32,
    #[serde(default)]
    lap_duration: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiPosition {
    date: DateTime<Utc>,
    driver_number: u32,
    position: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiResult {
    driver_number: u32,
    #[serde(default)]
    position: Option<u32>,
    #[serde(default)]
    number_of_laps: Option<u32>,
    #[serde(default)]
    points: Option<f64>,
    /// Best lap (practice), `[Q1, Q2, Q3]` (qualifying) or total time (race)
    #[serde(default)]
    duration: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiCarData {
    date: DateTime<Utc>,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    throttle: Option<f64>,
    #[serde(default)]
    brake: Option<f64>,
    #[serde(default)]
    n_gear: Option<u8>,
    #[serde(default)]
    rpm: Option<u32>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Client
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct OpenF1Source {
    base_url: String,
    http: Client,
}

impl OpenF1Source {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("f1-dash/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET an endpoint that answers with a JSON array. 404 is an empty list.
    async fn get_list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, RemoteError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self.http.get(&url).query(query).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            crate::metrics::record_remote_fetch(endpoint, "rate_limited");
            return Err(RemoteError::RateLimited);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            crate::metrics::record_remote_fetch(endpoint, "error");
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message: excerpt(&body),
            });
        }

        let body = response.bytes().await?;
        let items: Vec<T> = serde_json::from_slice(&body)
            .map_err(|e| RemoteError::Decode(format!("{}: {}", endpoint, e)))?;
        debug!(endpoint, count = items.len(), "Fetched upstream rows");
        Ok(items)
    }

    /// Championship meetings for a season, numbered by start date.
    async fn rounds(&self, season: i32) -> Result<Vec<(u32, ApiMeeting)>, RemoteError> {
        let meetings: Vec<ApiMeeting> = self.get_list("meetings", &[("year", season.to_string())]).await?;
        Ok(number_rounds(meetings))
    }

    async fn resolve_meeting(&self, season: i32, event: &EventRef) -> Result<Option<u64>, RemoteError> {
        let rounds = self.rounds(season).await?;
        let now = Utc::now();
        Ok(rounds
            .iter()
            .find(|(round, m)| summarize(season, *round, m, m.date_start, now).matches(event))
            .map(|(_, m)| m.meeting_key))
    }

    async fn resolve_session(&self, meeting_key: u64, session: SessionType) -> Result<Option<ApiSession>, RemoteError> {
        let mut names = vec![session.upstream_name()];
        if session == SessionType::SprintQualifying {
            // 2023 name for the same session
            names.push("Sprint Shootout");
        }

        for name in names {
            let found: Vec<ApiSession> = self
                .get_list(
                    "sessions",
                    &[("meeting_key", meeting_key.to_string()), ("session_name", name.to_string())],
                )
                .await?;
            if let Some(s) = found.into_iter().next() {
                return Ok(Some(s));
            }
        }
        Ok(None)
    }

    async fn resolve_driver_number(&self, session_key: u64, driver: &str) -> Result<Option<u32>, RemoteError> {
        if let Ok(number) = driver.trim().parse::<u32>() {
            return Ok(Some(number));
        }
        let drivers: Vec<ApiDriver> = self.get_list("drivers", &[("session_key", session_key.to_string())]).await?;
        let code = normalize_driver(driver);
        Ok(drivers
            .into_iter()
            .find(|d| d.name_acronym.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(&code)))
            .map(|d| d.driver_number))
    }

    async fn locate(&self, key: &SessionKey) -> Result<Option<ApiSession>, RemoteError> {
        let Some(meeting_key) = self.resolve_meeting(key.season, &key.event).await? else {
            debug!(key = %key, "No upstream meeting for event");
            return Ok(None);
        };
        let session = self.resolve_session(meeting_key, key.session).await?;
        if session.is_none() {
            debug!(key = %key, meeting_key, "No upstream session for meeting");
        }
        Ok(session)
    }
}

#[async_trait]
impl RemoteSource for OpenF1Source {
    #[instrument(skip(self, key), fields(key = %key))]
    async fn fetch_session(&self, key: &SessionKey) -> Result<SessionRecord, RemoteError> {
        let Some(session) = self.locate(key).await? else {
            return Ok(SessionRecord::empty(key.clone()));
        };

        let q = [("session_key", session.session_key.to_string())];
        let (drivers, laps, positions, results) = tokio::try_join!(
            self.get_list::<ApiDriver>("drivers", &q),
            self.get_list::<ApiLap>("laps", &q),
            self.get_list::<ApiPosition>("position", &q),
            self.get_list::<ApiResult>("session_result", &q),
        )?;

        crate::metrics::record_remote_fetch("session", "success");
        Ok(build_session_record(key.clone(), session.session_name, drivers, laps, positions, results))
    }

    #[instrument(skip(self, key), fields(key = %key))]
    async fn fetch_telemetry(&self, key: &SessionKey, driver: &str) -> Result<TelemetryRecord, RemoteError> {
        let empty = || TelemetryRecord::empty(key.clone(), normalize_driver(driver));

        let Some(session) = self.locate(key).await? else {
            return Ok(empty());
        };
        let Some(number) = self.resolve_driver_number(session.session_key, driver).await? else {
            debug!(driver, "Driver not found in session");
            return Ok(empty());
        };

        let samples: Vec<ApiCarData> = self
            .get_list(
                "car_data",
                &[
                    ("session_key", session.session_key.to_string()),
                    ("driver_number", number.to_string()),
                ],
            )
            .await?;

        crate::metrics::record_remote_fetch("telemetry", "success");
        Ok(build_telemetry(key.clone(), normalize_driver(driver), samples))
    }

    #[instrument(skip(self))]
    async fn fetch_schedule(&self, season: i32) -> Result<Schedule, RemoteError> {
        let rounds = self.rounds(season).await?;
        let sessions: Vec<ApiSession> = self.get_list("sessions", &[("year", season.to_string())]).await?;

        crate::metrics::record_remote_fetch("schedule", "success");
        Ok(build_schedule(season, rounds, &sessions, Utc::now()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Mapping
// ═══════════════════════════════════════════════════════════════════════════

/// Leading part of an upstream error body, cut on a character boundary.
fn excerpt(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

fn number_rounds(mut meetings: Vec<ApiMeeting>) -> Vec<(u32, ApiMeeting)> {
    meetings.retain(|m| !m.is_testing());
    meetings.sort_by_key(|m| m.date_start);
    meetings.into_iter().enumerate().map(|(i, m)| (i as u32 + 1, m)).collect()
}

fn summarize(season: i32, round: u32, meeting: &ApiMeeting, date: DateTime<Utc>, now: DateTime<Utc>) -> EventSummary {
    EventSummary {
        season,
        round,
        name: meeting.meeting_name.clone(),
        country: meeting.country_name.clone(),
        location: meeting.location.clone(),
        date,
        status: EventStatus::classify(date, now),
    }
}

/// The event date is the start of the meeting's last session (race day).
fn build_schedule(season: i32, rounds: Vec<(u32, ApiMeeting)>, sessions: &[ApiSession], now: DateTime<Utc>) -> Schedule {
    let mut last_session: HashMap<u64, DateTime<Utc>> = HashMap::new();
    for s in sessions {
        if let Some(start) = s.date_start {
            let entry = last_session.entry(s.meeting_key).or_insert(start);
            if start > *entry {
                *entry = start;
            }
        }
    }

    let events = rounds
        .iter()
        .map(|(round, m)| {
            let date = last_session.get(&m.meeting_key).copied().unwrap_or(m.date_start);
            summarize(season, *round, m, date, now)
        })
        .collect();

    Schedule {
        season,
        events,
        fetched_at: now,
    }
}

#[derive(Debug, Default)]
struct LapStats {
    best: Option<f64>,
    last: Option<f64>,
    last_number: u32,
}

fn lap_stats(laps: &[ApiLap]) -> HashMap<u32, LapStats> {
    let mut stats: HashMap<u32, LapStats> = HashMap::new();
    for lap in laps {
        let entry = stats.entry(lap.driver_number).or_default();
        if let Some(d) = lap.lap_duration {
            entry.best = Some(entry.best.map_or(d, |b| b.min(d)));
        }
        if lap.lap_number >= entry.last_number {
            entry.last_number = lap.lap_number;
            if lap.lap_duration.is_some() {
                entry.last = lap.lap_duration;
            }
        }
    }
    stats
}

/// Smallest time in a `duration` field that may be a number or an array.
fn best_duration(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::Array(items) => items.iter().filter_map(serde_json::Value::as_f64).reduce(f64::min),
        _ => None,
    }
}

fn build_session_record(
    key: SessionKey,
    session_name: String,
    drivers: Vec<ApiDriver>,
    laps: Vec<ApiLap>,
    positions: Vec<ApiPosition>,
    results: Vec<ApiResult>,
) -> SessionRecord {
    let mut record = SessionRecord::empty(key);
    if !session_name.is_empty() {
        record.session_name = session_name;
    }

    let mut seen = std::collections::HashSet::new();
    record.drivers = drivers
        .into_iter()
        .filter(|d| seen.insert(d.driver_number))
        .map(|d| DriverEntry {
            number: d.driver_number,
            code: d.name_acronym.unwrap_or_else(|| d.driver_number.to_string()),
            full_name: d.full_name.unwrap_or_default(),
            team: d.team_name.unwrap_or_default(),
        })
        .collect();

    let mut samples: Vec<PositionSample> = positions
        .into_iter()
        .map(|p| PositionSample {
            at: p.date,
            driver_number: p.driver_number,
            position: p.position,
        })
        .collect();
    samples.sort_by_key(|s| s.at);

    let by_number: HashMap<u32, &DriverEntry> = record.drivers.iter().map(|d| (d.number, d)).collect();
    let laps = lap_stats(&laps);
    let race_like = record.key.session.is_race_like();

    // Classification order: official results when published, else the
    // last reported position of each car.
    let mut order: Vec<(u32, u32, Option<&ApiResult>)> = if results.is_empty() {
        let mut last: HashMap<u32, u32> = HashMap::new();
        for s in &samples {
            last.insert(s.driver_number, s.position);
        }
        last.into_iter().map(|(number, pos)| (pos, number, None)).collect()
    } else {
        let mut ranked: Vec<&ApiResult> = results.iter().collect();
        ranked.sort_by_key(|r| r.position.unwrap_or(u32::MAX));
        ranked
            .into_iter()
            .enumerate()
            .map(|(i, r)| (r.position.unwrap_or(i as u32 + 1), r.driver_number, Some(r)))
            .collect()
    };
    order.sort_by_key(|(pos, number, _)| (*pos, *number));

    record.results = order
        .into_iter()
        .map(|(position, number, result)| {
            let driver = by_number.get(&number);
            let stats = laps.get(&number);
            let best_from_result = result
                .filter(|_| !race_like)
                .and_then(|r| r.duration.as_ref())
                .and_then(best_duration);
            ResultRow {
                position,
                driver: driver.map_or_else(|| number.to_string(), |d| d.code.clone()),
                team: driver.map(|d| d.team.clone()).unwrap_or_default(),
                best_lap_secs: stats.and_then(|s| s.best).or(best_from_result),
                last_lap_secs: stats.and_then(|s| s.last),
                laps: result
                    .and_then(|r| r.number_of_laps)
                    .or_else(|| stats.map(|s| s.last_number))
                    .unwrap_or(0),
                points: result.and_then(|r| r.points).unwrap_or(0.0),
            }
        })
        .collect();

    record.positions = samples;
    record.complete = !record.drivers.is_empty() && !record.results.is_empty();
    record
}

/// Distance is integrated from speed (trapezoidal) since the feed has none.
fn build_telemetry(key: SessionKey, driver: String, mut rows: Vec<ApiCarData>) -> TelemetryRecord {
    rows.sort_by_key(|r| r.date);
    let mut record = TelemetryRecord::empty(key, driver);
    let Some(start) = rows.first().map(|r| r.date) else {
        return record;
    };

    let mut distance = 0.0;
    let mut prev: Option<(f64, f64)> = None;
    record.samples = rows
        .into_iter()
        .map(|r| {
            let t = (r.date - start).num_milliseconds() as f64 / 1000.0;
            let speed = r.speed.unwrap_or(0.0);
            if let Some((prev_t, prev_speed)) = prev {
                distance += (prev_speed + speed) / 2.0 / 3.6 * (t - prev_t);
            }
            prev = Some((t, speed));
            TelemetrySample {
                t,
                speed,
                throttle: r.throttle.unwrap_or(0.0),
                brake: r.brake.unwrap_or(0.0),
                gear: r.n_gear.unwrap_or(0),
                rpm: r.rpm.unwrap_or(0),
                distance,
            }
        })
        .collect();
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn meetings() -> Vec<ApiMeeting> {
        serde_json::from_str(
            r#"[
                {"meeting_key": 1219, "meeting_name": "Italian Grand Prix", "country_name": "Italy", "location": "Monza", "date_start": "2023-09-01T11:30:00+00:00"},
                {"meeting_key": 1140, "meeting_name": "Pre-Season Testing", "country_name": "Bahrain", "location": "Sakhir", "date_start": "2023-02-23T07:00:00+00:00"},
                {"meeting_key": 1141, "meeting_name": "Bahrain Grand Prix", "country_name": "Bahrain", "location": "Sakhir", "date_start": "2023-03-03T11:30:00+00:00"}
            ]"#,
        )
        .unwrap()
    }

    fn monza_race() -> SessionKey {
        SessionKey::new(2023, "Monza", SessionType::Race)
    }

    #[test]
    fn test_rounds_skip_testing_and_follow_dates() {
        let rounds = number_rounds(meetings());
        let names: Vec<(u32, &str)> = rounds.iter().map(|(r, m)| (*r, m.meeting_name.as_str())).collect();
        assert_eq!(names, vec![(1, "Bahrain Grand Prix"), (2, "Italian Grand Prix")]);
    }

    #[test]
    fn test_schedule_uses_last_session_as_event_date() {
        let sessions: Vec<ApiSession> = serde_json::from_str(
            r#"[
                {"session_key": 9157, "session_name": "Race", "meeting_key": 1219, "date_start": "2023-09-03T13:00:00+00:00"},
                {"session_key": 9153, "session_name": "Practice 1", "meeting_key": 1219, "date_start": "2023-09-01T11:30:00+00:00"}
            ]"#,
        )
        .unwrap();
        let now = Utc.with_ymd_and_hms(2023, 9, 5, 0, 0, 0).unwrap();
        let schedule = build_schedule(2023, number_rounds(meetings()), &sessions, now);

        assert_eq!(schedule.events.len(), 2);
        let monza = schedule.find(&EventRef::Name("monza".into())).unwrap();
        assert_eq!(monza.round, 2);
        assert_eq!(monza.date, Utc.with_ymd_and_hms(2023, 9, 3, 13, 0, 0).unwrap());
        assert_eq!(monza.status, EventStatus::Current);
        // No sessions listed: falls back to the meeting start
        assert_eq!(schedule.events[0].status, EventStatus::Completed);
    }

    #[test]
    fn test_session_record_from_results() {
        let drivers: Vec<ApiDriver> = serde_json::from_str(
            r#"[
                {"driver_number": 1, "name_acronym": "VER", "full_name": "Max VERSTAPPEN", "team_name": "Red Bull Racing"},
                {"driver_number": 11, "name_acronym": "PER", "full_name": "Sergio PEREZ", "team_name": "Red Bull Racing"},
                {"driver_number": 1, "name_acronym": "VER", "full_name": "Max VERSTAPPEN", "team_name": "Red Bull Racing"}
            ]"#,
        )
        .unwrap();
        let laps: Vec<ApiLap> = serde_json::from_str(
            r#"[
                {"driver_number": 1, "lap_number": 1, "lap_duration": null},
                {"driver_number": 1, "lap_number": 2, "lap_duration": 85.5},
                {"driver_number": 1, "lap_number": 3, "lap_duration": 86.0},
                {"driver_number": 11, "lap_number": 2, "lap_duration": 85.2}
            ]"#,
        )
        .unwrap();
        let results: Vec<ApiResult> = serde_json::from_str(
            r#"[
                {"driver_number": 11, "position": 2, "number_of_laps": 51, "points": 18},
                {"driver_number": 1, "position": 1, "number_of_laps": 51, "points": 25}
            ]"#,
        )
        .unwrap();

        let record = build_session_record(monza_race(), "Race".into(), drivers, laps, Vec::new(), results);
        assert!(record.complete);
        assert_eq!(record.drivers.len(), 2);
        assert_eq!(record.results[0].driver, "VER");
        assert_eq!(record.results[0].points, 25.0);
        assert_eq!(record.results[0].last_lap_secs, Some(86.0));
        assert_eq!(record.results[0].best_lap_secs, Some(85.5));
        assert_eq!(record.results[1].driver, "PER");
        assert_eq!(record.results[1].laps, 51);
    }

    #[test]
    fn test_session_record_from_positions_when_no_results() {
        let positions: Vec<ApiPosition> = serde_json::from_str(
            r#"[
                {"date": "2023-09-02T14:00:00+00:00", "driver_number": 55, "position": 1},
                {"date": "2023-09-02T14:00:00+00:00", "driver_number": 1, "position": 2},
                {"date": "2023-09-02T15:00:00+00:00", "driver_number": 1, "position": 1},
                {"date": "2023-09-02T15:00:00+00:00", "driver_number": 55, "position": 2}
            ]"#,
        )
        .unwrap();
        let key = SessionKey::new(2023, "Monza", SessionType::Qualifying);
        let record = build_session_record(key, String::new(), Vec::new(), Vec::new(), positions, Vec::new());

        assert_eq!(record.session_name, "Qualifying");
        assert_eq!(record.positions.len(), 4);
        let order: Vec<&str> = record.results.iter().map(|r| r.driver.as_str()).collect();
        assert_eq!(order, vec!["1", "55"]);
        // No driver list: not a complete record
        assert!(!record.complete);
    }

    #[test]
    fn test_qualifying_best_time_from_duration_array() {
        let results: Vec<ApiResult> = serde_json::from_str(
            r#"[{"driver_number": 16, "position": 1, "duration": [81.9, 81.2, null]}]"#,
        )
        .unwrap();
        let key = SessionKey::new(2023, "Monza", SessionType::Qualifying);
        let record = build_session_record(key, "Qualifying".into(), Vec::new(), Vec::new(), Vec::new(), results);
        assert_eq!(record.results[0].best_lap_secs, Some(81.2));
    }

    #[test]
    fn test_nothing_published_is_empty_record() {
        let record = build_session_record(monza_race(), String::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new());
        assert!(record.is_empty());
        assert!(!record.complete);
    }

    #[test]
    fn test_telemetry_integrates_distance() {
        let rows: Vec<ApiCarData> = serde_json::from_str(
            r#"[
                {"date": "2023-09-03T13:00:02+00:00", "speed": 360, "throttle": 100, "brake": 0, "n_gear": 8, "rpm": 12000},
                {"date": "2023-09-03T13:00:00+00:00", "speed": 360, "throttle": 100, "brake": 0, "n_gear": 8, "rpm": 11900},
                {"date": "2023-09-03T13:00:01+00:00", "speed": 360, "throttle": 99, "brake": 0, "n_gear": 8, "rpm": 11950}
            ]"#,
        )
        .unwrap();
        let record = build_telemetry(monza_race(), "VER".into(), rows);

        assert_eq!(record.samples.len(), 3);
        assert_eq!(record.samples[0].t, 0.0);
        assert_eq!(record.samples[0].rpm, 11900);
        // 360 km/h = 100 m/s for two seconds
        assert!((record.samples[2].distance - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_car_data() {
        let record = build_telemetry(monza_race(), "VER".into(), Vec::new());
        assert!(record.is_empty());
    }

    #[test]
    fn test_error_body_excerpt_respects_char_boundaries() {
        let body = format!("{}é more", "x".repeat(MAX_ERROR_BODY - 1));
        assert_eq!(excerpt(&body), format!("{}é", "x".repeat(MAX_ERROR_BODY - 1)));
        assert_eq!(excerpt("short"), "short");
        assert_eq!(excerpt(&"ü".repeat(500)).chars().count(), MAX_ERROR_BODY);
    }

    /// One-shot HTTP server answering every request with `status` and `body`.
    async fn serve_once(status: &'static str, body: String) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: text/plain; charset=utf-8\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_non_ascii_error_body_becomes_api_error() {
        let body = format!("{}é more", "x".repeat(MAX_ERROR_BODY - 1));
        let url = serve_once("500 Internal Server Error", body).await;
        let source = OpenF1Source::new(&url, Duration::from_secs(5)).unwrap();

        match source.fetch_schedule(2023).await {
            Err(RemoteError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, format!("{}é", "x".repeat(MAX_ERROR_BODY - 1)));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_api_is_network_error() {
        let source = OpenF1Source::new("http://127.0.0.1:1/", Duration::from_secs(2)).unwrap();
        assert_eq!(source.base_url(), "http://127.0.0.1:1");
        let err = source.fetch_schedule(2023).await.unwrap_err();
        assert!(matches!(err, RemoteError::Network(_)));
    }
}
