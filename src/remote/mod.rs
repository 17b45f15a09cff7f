// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Upstream motorsport data.
//!
//! The remote is the slowest and least reliable tier. Implementations make
//! one attempt per call; the coordinator never retries a failure on its own.
//! "Nothing published for this key" is a successful, empty record.

mod openf1;

pub use openf1::{OpenF1Source, DEFAULT_BASE_URL};

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Schedule, SessionKey, SessionRecord, TelemetryRecord};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Rate limited by upstream API")]
    RateLimited,
    #[error("Upstream API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Failed to decode upstream response: {0}")]
    Decode(String),
    /// The fetch task ended without producing a result.
    #[error("Fetch aborted: {0}")]
    Aborted(String),
}

impl RemoteError {
    /// Whether trying the same request again later could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::RateLimited | Self::Aborted(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch_session(&self, key: &SessionKey) -> Result<SessionRecord, RemoteError>;

    /// `driver` is a car number ("1") or three-letter code ("VER").
    async fn fetch_telemetry(&self, key: &SessionKey, driver: &str) -> Result<TelemetryRecord, RemoteError>;

    async fn fetch_schedule(&self, season: i32) -> Result<Schedule, RemoteError>;
}
