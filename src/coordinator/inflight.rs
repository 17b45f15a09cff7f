// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! One fetch per key.
//!
//! The first caller for a key becomes the leader: it registers a
//! `watch` receiver under the key and spawns the fetch. Later callers for the
//! same key clone that receiver and wait on it. The spawned task publishes
//! the result and then removes the entry, so the fetch (and its write-back)
//! completes even when every caller has gone away.

use std::future::Future;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use crate::error::DashError;
use crate::remote::RemoteError;

type Slot<T> = watch::Receiver<Option<Result<T, DashError>>>;

pub(crate) struct InFlight<T> {
    kind: &'static str,
    pending: DashMap<String, Slot<T>>,
}

/// Removes the entry when the fetch task finishes, including by panic.
struct Settle<T: Clone + Send + Sync + 'static> {
    owner: Arc<InFlight<T>>,
    key: String,
}

impl<T: Clone + Send + Sync + 'static> Drop for Settle<T> {
    fn drop(&mut self) {
        self.owner.pending.remove(&self.key);
        crate::metrics::set_inflight(self.owner.kind, self.owner.pending.len());
    }
}

impl<T: Clone + Send + Sync + 'static> InFlight<T> {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            pending: DashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    /// Run `make()` for `key` unless a fetch for it is already pending, in
    /// which case wait for that one. `make` is only called by the leader.
    pub(crate) async fn run<F, Fut>(self: &Arc<Self>, key: String, make: F) -> Result<T, DashError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DashError>> + Send + 'static,
    {
        // The entry guard must be gone before spawning: the task removes the
        // same key when it settles.
        let (mut rx, leader) = match self.pending.entry(key.clone()) {
            Entry::Occupied(e) => (e.get().clone(), None),
            Entry::Vacant(e) => {
                let (tx, rx) = watch::channel(None);
                e.insert(rx.clone());
                (rx, Some(tx))
            }
        };

        match leader {
            Some(tx) => {
                crate::metrics::set_inflight(self.kind, self.pending.len());
                let settle = Settle {
                    owner: Arc::clone(self),
                    key,
                };
                let fetch = make();
                tokio::spawn(async move {
                    let result = fetch.await;
                    tx.send_replace(Some(result));
                    drop(settle);
                });
            }
            None => {
                drop(make);
                debug!(kind = self.kind, key = %key, "Joining in-flight fetch");
                crate::metrics::record_coalesced(self.kind);
            }
        }

        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(settled) => match settled.as_ref() {
                Some(result) => result.clone(),
                None => Err(aborted()),
            },
            Err(_) => Err(aborted()),
        };
        outcome
    }
}

fn aborted() -> DashError {
    RemoteError::Aborted("fetch task ended without a result".into()).into()
}
