// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Session identifiers shared by every tier.
//!
//! A [`SessionKey`] renders to three string forms:
//!
//! ```text
//! cache_key()   f1dash:session:2023:monza:R     (Redis / memory cache)
//! storage_id()  2023_monza_R                    (SQLite primary key)
//! event_id()    2023_monza                      (SQLite event grouping)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Namespace prepended to every cache key.
pub const CACHE_NAMESPACE: &str = "f1dash";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("unknown session type '{0}' (expected FP1, FP2, FP3, SQ, S, Q or R)")]
    SessionType(String),
    #[error("event reference must not be empty")]
    EmptyEvent,
}

/// The segment of a race weekend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SessionType {
    #[serde(rename = "FP1")]
    Practice1,
    #[serde(rename = "FP2")]
    Practice2,
    #[serde(rename = "FP3")]
    Practice3,
    /// Also published as "Sprint Shootout" (2023).
    #[serde(rename = "SQ")]
    SprintQualifying,
    #[serde(rename = "S")]
    Sprint,
    #[serde(rename = "Q")]
    Qualifying,
    #[serde(rename = "R")]
    Race,
}

impl SessionType {
    pub const ALL: [SessionType; 7] = [
        Self::Practice1,
        Self::Practice2,
        Self::Practice3,
        Self::SprintQualifying,
        Self::Sprint,
        Self::Qualifying,
        Self::Race,
    ];

    /// Short code used in keys and on screen.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Practice1 => "FP1",
            Self::Practice2 => "FP2",
            Self::Practice3 => "FP3",
            Self::SprintQualifying => "SQ",
            Self::Sprint => "S",
            Self::Qualifying => "Q",
            Self::Race => "R",
        }
    }

    /// Name the upstream API files the session under.
    #[must_use]
    pub fn upstream_name(self) -> &'static str {
        match self {
            Self::Practice1 => "Practice 1",
            Self::Practice2 => "Practice 2",
            Self::Practice3 => "Practice 3",
            Self::SprintQualifying => "Sprint Qualifying",
            Self::Sprint => "Sprint",
            Self::Qualifying => "Qualifying",
            Self::Race => "Race",
        }
    }

    /// Race-like sessions are classified by finishing order and score points.
    #[must_use]
    pub fn is_race_like(self) -> bool {
        matches!(self, Self::Sprint | Self::Race)
    }

    /// Column headers the dashboard shows for this session's classification.
    #[must_use]
    pub fn columns(self) -> Vec<String> {
        let cols: &[&str] = if self.is_race_like() {
            &["Pos", "Driver", "Team", "Last Lap", "Lap #", "Points"]
        } else {
            &["Pos", "Driver", "Team", "Best Time"]
        };
        cols.iter().map(|c| (*c).to_string()).collect()
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for SessionType {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        let parsed = match normalized.as_str() {
            "fp1" | "practice 1" => Self::Practice1,
            "fp2" | "practice 2" => Self::Practice2,
            "fp3" | "practice 3" => Self::Practice3,
            "sq" | "ss" | "sprint qualifying" | "sprint shootout" => Self::SprintQualifying,
            "s" | "sprint" => Self::Sprint,
            "q" | "qualifying" => Self::Qualifying,
            "r" | "race" => Self::Race,
            _ => return Err(KeyParseError::SessionType(s.to_string())),
        };
        Ok(parsed)
    }
}

/// An event addressed either by championship round or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventRef {
    Round(u32),
    Name(String),
}

impl EventRef {
    /// Stable token for keys. Names are case- and whitespace-insensitive.
    #[must_use]
    pub fn slug(&self) -> String {
        match self {
            Self::Round(round) => round.to_string(),
            Self::Name(name) => name
                .split_whitespace()
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
                .join("_"),
        }
    }
}

impl fmt::Display for EventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Round(round) => write!(f, "Round {}", round),
            Self::Name(name) => f.write_str(name.trim()),
        }
    }
}

impl FromStr for EventRef {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(KeyParseError::EmptyEvent);
        }
        Ok(match trimmed.parse::<u32>() {
            Ok(round) => Self::Round(round),
            Err(_) => Self::Name(trimmed.to_string()),
        })
    }
}

impl From<u32> for EventRef {
    fn from(round: u32) -> Self {
        Self::Round(round)
    }
}

impl From<&str> for EventRef {
    fn from(name: &str) -> Self {
        let trimmed = name.trim();
        match trimmed.parse::<u32>() {
            Ok(round) => Self::Round(round),
            Err(_) => Self::Name(trimmed.to_string()),
        }
    }
}

/// Composite identifier for one session: (season, event, session type).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub season: i32,
    pub event: EventRef,
    pub session: SessionType,
}

impl SessionKey {
    pub fn new(season: i32, event: impl Into<EventRef>, session: SessionType) -> Self {
        Self {
            season,
            event: event.into(),
            session,
        }
    }

    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "{}:session:{}:{}:{}",
            CACHE_NAMESPACE,
            self.season,
            self.event.slug(),
            self.session.code()
        )
    }

    #[must_use]
    pub fn telemetry_cache_key(&self, driver: &str) -> String {
        format!(
            "{}:telemetry:{}:{}:{}:{}",
            CACHE_NAMESPACE,
            self.season,
            self.event.slug(),
            self.session.code(),
            normalize_driver(driver)
        )
    }

    /// Prefix shared by every driver's telemetry key for this session.
    #[must_use]
    pub fn telemetry_cache_prefix(&self) -> String {
        format!(
            "{}:telemetry:{}:{}:{}:",
            CACHE_NAMESPACE,
            self.season,
            self.event.slug(),
            self.session.code()
        )
    }

    #[must_use]
    pub fn storage_id(&self) -> String {
        format!("{}_{}_{}", self.season, self.event.slug(), self.session.code())
    }

    #[must_use]
    pub fn event_id(&self) -> String {
        event_id(self.season, &self.event)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.season, self.event, self.session)
    }
}

/// Prefix covering every cached session and telemetry entry of one event.
#[must_use]
pub fn event_cache_prefixes(season: i32, event: &EventRef) -> [String; 2] {
    let slug = event.slug();
    [
        format!("{}:session:{}:{}:", CACHE_NAMESPACE, season, slug),
        format!("{}:telemetry:{}:{}:", CACHE_NAMESPACE, season, slug),
    ]
}

#[must_use]
pub fn schedule_cache_key(season: i32) -> String {
    format!("{}:schedule:{}", CACHE_NAMESPACE, season)
}

#[must_use]
pub fn event_id(season: i32, event: &EventRef) -> String {
    format!("{}_{}", season, event.slug())
}

/// Driver ids are upper-cased codes ("VER") or car numbers ("1").
#[must_use]
pub fn normalize_driver(driver: &str) -> String {
    driver.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_type_parses_codes_and_names() {
        assert_eq!("FP1".parse::<SessionType>().unwrap(), SessionType::Practice1);
        assert_eq!("practice 2".parse::<SessionType>().unwrap(), SessionType::Practice2);
        assert_eq!("Sprint_Shootout".parse::<SessionType>().unwrap(), SessionType::SprintQualifying);
        assert_eq!("ss".parse::<SessionType>().unwrap(), SessionType::SprintQualifying);
        assert_eq!(" r ".parse::<SessionType>().unwrap(), SessionType::Race);
        assert_eq!("Qualifying".parse::<SessionType>().unwrap(), SessionType::Qualifying);
    }

    #[test]
    fn test_session_type_rejects_unknown() {
        let err = "FP4".parse::<SessionType>().unwrap_err();
        assert_eq!(err, KeyParseError::SessionType("FP4".into()));
    }

    #[test]
    fn test_session_type_display_is_code() {
        for session in SessionType::ALL {
            assert_eq!(session.to_string().parse::<SessionType>().unwrap(), session);
        }
    }

    #[test]
    fn test_columns_depend_on_session_kind() {
        assert_eq!(SessionType::Race.columns().len(), 6);
        assert_eq!(SessionType::Sprint.columns().last().unwrap(), "Points");
        assert_eq!(SessionType::Qualifying.columns(), vec!["Pos", "Driver", "Team", "Best Time"]);
    }

    #[test]
    fn test_event_ref_parsing() {
        assert_eq!("5".parse::<EventRef>().unwrap(), EventRef::Round(5));
        assert_eq!("Monza".parse::<EventRef>().unwrap(), EventRef::Name("Monza".into()));
        assert_eq!("   ".parse::<EventRef>().unwrap_err(), KeyParseError::EmptyEvent);
    }

    #[test]
    fn test_event_slug_is_case_and_space_insensitive() {
        let a = EventRef::Name("Abu Dhabi".into());
        let b = EventRef::Name("  abu   DHABI ".into());
        assert_eq!(a.slug(), "abu_dhabi");
        assert_eq!(a.slug(), b.slug());
    }

    #[test]
    fn test_key_forms() {
        let key = SessionKey::new(2023, "Monza", SessionType::Race);
        assert_eq!(key.cache_key(), "f1dash:session:2023:monza:R");
        assert_eq!(key.storage_id(), "2023_monza_R");
        assert_eq!(key.event_id(), "2023_monza");
        assert_eq!(key.telemetry_cache_key(" ver"), "f1dash:telemetry:2023:monza:R:VER");
        assert_eq!(key.to_string(), "2023 Monza R");
    }

    #[test]
    fn test_event_prefixes_cover_session_keys() {
        let key = SessionKey::new(2024, 7u32, SessionType::Qualifying);
        let [sessions, telemetry] = event_cache_prefixes(2024, &key.event);
        assert!(key.cache_key().starts_with(&sessions));
        assert!(key.telemetry_cache_key("44").starts_with(&telemetry));
        assert!(key.telemetry_cache_key("44").starts_with(&key.telemetry_cache_prefix()));
        assert!(key.telemetry_cache_prefix().starts_with(&telemetry));
    }
}
