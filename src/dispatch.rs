// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bridge between a single-threaded UI loop and the async coordinator.
//!
//! The UI submits a [`Request`] and gets an id back immediately. The request
//! runs on the tokio runtime and its [`RetrievalEvent`] arrives later on the
//! channel returned by [`Dispatcher::new`]. If the UI has gone away by then
//! the event is dropped; the fetch and its writes still complete.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::coordinator::DataCoordinator;
use crate::error::DashError;
use crate::model::{Schedule, SessionKey, SessionRecord, TelemetryRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Session(SessionKey),
    Refresh(SessionKey),
    Telemetry { key: SessionKey, driver: String },
    Schedule(i32),
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Session(Result<SessionRecord, DashError>),
    Telemetry(Result<TelemetryRecord, DashError>),
    Schedule(Result<Schedule, DashError>),
}

impl Outcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        match self {
            Self::Session(r) => r.is_ok(),
            Self::Telemetry(r) => r.is_ok(),
            Self::Schedule(r) => r.is_ok(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalEvent {
    pub request_id: u64,
    pub outcome: Outcome,
}

pub struct Dispatcher {
    coordinator: Arc<DataCoordinator>,
    next_id: AtomicU64,
    events: mpsc::UnboundedSender<RetrievalEvent>,
}

impl Dispatcher {
    pub fn new(coordinator: Arc<DataCoordinator>) -> (Self, mpsc::UnboundedReceiver<RetrievalEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            coordinator,
            next_id: AtomicU64::new(1),
            events,
        };
        (dispatcher, rx)
    }

    /// Start `request` in the background. Must be called within a tokio
    /// runtime.
    pub fn submit(&self, request: Request) -> u64 {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let coordinator = Arc::clone(&self.coordinator);
        let events = self.events.clone();

        tokio::spawn(async move {
            let outcome = match request {
                Request::Session(key) => Outcome::Session(coordinator.get_session(&key).await),
                Request::Refresh(key) => Outcome::Session(coordinator.refresh(&key).await),
                Request::Telemetry { key, driver } => {
                    Outcome::Telemetry(coordinator.get_telemetry(&key, &driver).await)
                }
                Request::Schedule(season) => Outcome::Schedule(coordinator.get_schedule(season).await),
            };

            if events.send(RetrievalEvent { request_id, outcome }).is_err() {
                debug!(request_id, "UI loop gone, dropping result");
            }
        });

        request_id
    }

    #[must_use]
    pub fn coordinator(&self) -> &Arc<DataCoordinator> {
        &self.coordinator
    }
}
