// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Season schedules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::{event_id, EventRef};

/// Where an event sits relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Completed,
    Current,
    Upcoming,
}

impl EventStatus {
    /// More than four days past the event date is completed; from one day
    /// before to four days after is the current weekend.
    #[must_use]
    pub fn classify(event_date: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let days = (now - event_date).num_days();
        if days > 4 {
            Self::Completed
        } else if days >= -1 {
            Self::Current
        } else {
            Self::Upcoming
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Current => "current",
            Self::Upcoming => "upcoming",
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "current" => Ok(Self::Current),
            "upcoming" => Ok(Self::Upcoming),
            other => Err(format!("unknown event status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub season: i32,
    pub round: u32,
    pub name: String,
    pub country: String,
    pub location: String,
    pub date: DateTime<Utc>,
    pub status: EventStatus,
}

impl EventSummary {
    #[must_use]
    pub fn event_id(&self) -> String {
        event_id(self.season, &EventRef::Round(self.round))
    }

    /// Case-insensitive match on round, name, country or location.
    #[must_use]
    pub fn matches(&self, event: &EventRef) -> bool {
        match event {
            EventRef::Round(round) => self.round == *round,
            EventRef::Name(_) => {
                let wanted = event.slug();
                [&self.name, &self.country, &self.location]
                    .iter()
                    .any(|field| EventRef::Name((*field).clone()).slug() == wanted)
            }
        }
    }
}

/// A season's events in round order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub season: i32,
    pub events: Vec<EventSummary>,
    pub fetched_at: DateTime<Utc>,
}

impl Schedule {
    #[must_use]
    pub fn empty(season: i32) -> Self {
        Self { season, events: Vec::new(), fetched_at: Utc::now() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn find(&self, event: &EventRef) -> Option<&EventSummary> {
        self.events.iter().find(|e| e.matches(event))
    }

    /// Re-derive every event's status against `now`.
    pub fn reclassify(&mut self, now: DateTime<Utc>) {
        for event in &mut self.events {
            event.status = EventStatus::classify(event.date, now);
        }
    }

    /// The ongoing weekend, else the most recent past event, else the next one.
    #[must_use]
    pub fn latest_event(&self, now: DateTime<Utc>) -> Option<&EventSummary> {
        let status = |e: &&EventSummary| EventStatus::classify(e.date, now);
        self.events
            .iter()
            .find(|e| status(e) == EventStatus::Current)
            .or_else(|| self.events.iter().filter(|e| e.date < now).max_by_key(|e| e.date))
            .or_else(|| self.events.iter().filter(|e| e.date >= now).min_by_key(|e| e.date))
    }
}
