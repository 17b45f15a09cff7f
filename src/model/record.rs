// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Session and telemetry payloads.
//!
//! Records are immutable once built. Tiers replace them wholesale; nothing
//! patches a record in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::SessionKey;

/// A driver taking part in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverEntry {
    pub number: u32,
    /// Three-letter abbreviation, e.g. "VER"
    pub code: String,
    pub full_name: String,
    pub team: String,
}

/// One line of the classification table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub position: u32,
    pub driver: String,
    pub team: String,
    /// Best lap in seconds (practice / qualifying)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_lap_secs: Option<f64>,
    /// Last completed lap in seconds (race-like sessions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_lap_secs: Option<f64>,
    #[serde(default)]
    pub laps: u32,
    #[serde(default)]
    pub points: f64,
}

impl ResultRow {
    /// Render the row under [`super::SessionType::columns`] for the given session kind.
    #[must_use]
    pub fn cells(&self, race_like: bool) -> Vec<String> {
        let mut cells = vec![self.position.to_string(), self.driver.clone(), self.team.clone()];
        if race_like {
            cells.push(self.last_lap_secs.map_or_else(|| "N/A".to_string(), format_lap_time));
            cells.push(if self.laps > 0 { self.laps.to_string() } else { "N/A".to_string() });
            cells.push(format_points(self.points));
        } else {
            cells.push(self.best_lap_secs.map_or_else(|| "No Time".to_string(), format_lap_time));
        }
        cells
    }
}

/// Position of one car at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub at: DateTime<Utc>,
    pub driver_number: u32,
    pub position: u32,
}

/// Everything the positions view needs for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub key: SessionKey,
    pub session_name: String,
    pub drivers: Vec<DriverEntry>,
    pub results: Vec<ResultRow>,
    pub positions: Vec<PositionSample>,
    pub columns: Vec<String>,
    pub fetched_at: DateTime<Utc>,
    /// False when the upstream had no (or only partial) data
    pub complete: bool,
}

impl SessionRecord {
    /// The valid "no data for this key" result.
    #[must_use]
    pub fn empty(key: SessionKey) -> Self {
        Self {
            session_name: key.session.upstream_name().to_string(),
            columns: key.session.columns(),
            key,
            drivers: Vec::new(),
            results: Vec::new(),
            positions: Vec::new(),
            fetched_at: Utc::now(),
            complete: false,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty() && self.results.is_empty() && self.positions.is_empty()
    }

    /// Look a driver up by code or car number.
    #[must_use]
    pub fn driver(&self, id: &str) -> Option<&DriverEntry> {
        let id = id.trim();
        self.drivers
            .iter()
            .find(|d| d.code.eq_ignore_ascii_case(id) || d.number.to_string() == id)
    }

    /// Classification as display rows, in position order.
    #[must_use]
    pub fn table(&self) -> Vec<Vec<String>> {
        let race_like = self.key.session.is_race_like();
        let mut rows: Vec<&ResultRow> = self.results.iter().collect();
        rows.sort_by_key(|r| r.position);
        rows.into_iter().map(|r| r.cells(race_like)).collect()
    }
}

/// One telemetry reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Seconds since the first sample of the series
    pub t: f64,
    /// km/h
    pub speed: f64,
    /// 0-100
    pub throttle: f64,
    /// 0-100 (some feeds only report 0 / 100)
    pub brake: f64,
    pub gear: u8,
    pub rpm: u32,
    /// Metres since the first sample
    pub distance: f64,
}

/// Per-driver telemetry for one session. Never loaded with the session itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub key: SessionKey,
    pub driver: String,
    pub samples: Vec<TelemetrySample>,
    pub fetched_at: DateTime<Utc>,
}

/// Headline numbers shown in the telemetry panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySummary {
    pub max_speed: f64,
    pub avg_speed: f64,
    pub max_throttle: f64,
    pub max_brake: f64,
    pub distance: f64,
    pub samples: usize,
}

impl TelemetryRecord {
    #[must_use]
    pub fn empty(key: SessionKey, driver: impl Into<String>) -> Self {
        Self {
            key,
            driver: driver.into(),
            samples: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `None` for an empty series.
    #[must_use]
    pub fn summary(&self) -> Option<TelemetrySummary> {
        if self.samples.is_empty() {
            return None;
        }
        let fold_max = |f: fn(&TelemetrySample) -> f64| {
            self.samples.iter().map(f).fold(f64::MIN, f64::max)
        };
        let total_speed: f64 = self.samples.iter().map(|s| s.speed).sum();
        Some(TelemetrySummary {
            max_speed: fold_max(|s| s.speed),
            avg_speed: total_speed / self.samples.len() as f64,
            max_throttle: fold_max(|s| s.throttle),
            max_brake: fold_max(|s| s.brake),
            distance: self.samples.last().map_or(0.0, |s| s.distance),
            samples: self.samples.len(),
        })
    }
}

/// `83.456` → `"1:23.456"`.
#[must_use]
pub fn format_lap_time(secs: f64) -> String {
    let millis = (secs * 1000.0).round() as u64;
    let minutes = millis / 60_000;
    let rem = millis % 60_000;
    format!("{}:{:02}.{:03}", minutes, rem / 1000, rem % 1000)
}

fn format_points(points: f64) -> String {
    if points.fract() == 0.0 {
        format!("{}", points as i64)
    } else {
        format!("{:.1}", points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionType;

    fn sample(t: f64, speed: f64, throttle: f64, brake: f64, distance: f64) -> TelemetrySample {
        TelemetrySample { t, speed, throttle, brake, gear: 7, rpm: 11_000, distance }
    }

    #[test]
    fn test_format_lap_time() {
        assert_eq!(format_lap_time(83.456), "1:23.456");
        assert_eq!(format_lap_time(59.9999), "1:00.000");
        assert_eq!(format_lap_time(7.05), "0:07.050");
    }

    #[test]
    fn test_empty_record_has_session_columns() {
        let record = SessionRecord::empty(SessionKey::new(2023, 5u32, SessionType::Race));
        assert!(record.is_empty());
        assert!(!record.complete);
        assert_eq!(record.columns, SessionType::Race.columns());
        assert_eq!(record.session_name, "Race");
    }

    #[test]
    fn test_table_sorted_by_position() {
        let mut record = SessionRecord::empty(SessionKey::new(2023, "Monza", SessionType::Qualifying));
        record.results = vec![
            ResultRow { position: 2, driver: "SAI".into(), team: "Ferrari".into(), best_lap_secs: Some(80.3), last_lap_secs: None, laps: 0, points: 0.0 },
            ResultRow { position: 1, driver: "VER".into(), team: "Red Bull".into(), best_lap_secs: None, last_lap_secs: None, laps: 0, points: 0.0 },
        ];
        let table = record.table();
        assert_eq!(table[0], vec!["1", "VER", "Red Bull", "No Time"]);
        assert_eq!(table[1], vec!["2", "SAI", "Ferrari", "1:20.300"]);
    }

    #[test]
    fn test_race_cells() {
        let row = ResultRow { position: 3, driver: "NOR".into(), team: "McLaren".into(), best_lap_secs: None, last_lap_secs: Some(91.0), laps: 51, points: 15.0 };
        assert_eq!(row.cells(true), vec!["3", "NOR", "McLaren", "1:31.000", "51", "15"]);
        let half = ResultRow { points: 0.5, ..row };
        assert_eq!(half.cells(true)[5], "0.5");
    }

    #[test]
    fn test_driver_lookup_by_code_or_number() {
        let mut record = SessionRecord::empty(SessionKey::new(2024, 1u32, SessionType::Race));
        record.drivers.push(DriverEntry { number: 44, code: "HAM".into(), full_name: "Lewis Hamilton".into(), team: "Mercedes".into() });
        assert_eq!(record.driver("ham").map(|d| d.number), Some(44));
        assert_eq!(record.driver(" 44 ").map(|d| d.code.as_str()), Some("HAM"));
        assert!(record.driver("VER").is_none());
    }

    #[test]
    fn test_telemetry_summary() {
        let key = SessionKey::new(2023, "Monza", SessionType::Race);
        let mut record = TelemetryRecord::empty(key, "VER");
        assert!(record.summary().is_none());

        record.samples = vec![
            sample(0.0, 100.0, 50.0, 0.0, 0.0),
            sample(1.0, 300.0, 100.0, 0.0, 55.0),
            sample(2.0, 200.0, 0.0, 100.0, 125.0),
        ];
        let summary = record.summary().unwrap();
        assert_eq!(summary.max_speed, 300.0);
        assert_eq!(summary.avg_speed, 200.0);
        assert_eq!(summary.max_throttle, 100.0);
        assert_eq!(summary.max_brake, 100.0);
        assert_eq!(summary.distance, 125.0);
        assert_eq!(summary.samples, 3);
    }

    #[test]
    fn test_record_json_roundtrip_preserves_key() {
        let record = SessionRecord::empty(SessionKey::new(2022, "Spa", SessionType::Sprint));
        let json = serde_json::to_string(&record).unwrap();
        let back: SessionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
