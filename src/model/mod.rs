// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Domain types: keys, session and telemetry records, schedules.

pub mod key;
pub mod record;
pub mod schedule;

pub use key::{EventRef, KeyParseError, SessionKey, SessionType};
pub use record::{
    format_lap_time, DriverEntry, PositionSample, ResultRow, SessionRecord, TelemetryRecord,
    TelemetrySample, TelemetrySummary,
};
pub use schedule::{EventStatus, EventSummary, Schedule};
