// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Errors surfaced by the retrieval coordinator.
//!
//! Cache problems never appear here: they are logged and absorbed inside
//! [`crate::storage::SessionCache`].

use thiserror::Error;

use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Failure of a coordinator call.
///
/// `Clone` because every caller coalesced onto one in-flight fetch receives
/// the same result.
#[derive(Error, Debug, Clone)]
pub enum DashError {
    #[error("Remote fetch failed: {0}")]
    Remote(#[from] RemoteError),
    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),
}

impl DashError {
    /// Whether the UI should offer to try again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(e) => e.is_transient(),
            Self::Persistence(StorageError::Backend(_)) => true,
            Self::Persistence(StorageError::Serialization { .. }) => false,
        }
    }

    /// Short label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Remote(RemoteError::RateLimited) => "rate_limited",
            Self::Remote(_) => "remote",
            Self::Persistence(_) => "persistence",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(DashError::from(RemoteError::RateLimited).is_retryable());
        assert!(!DashError::from(RemoteError::Decode("bad".into())).is_retryable());
        assert!(DashError::from(StorageError::Backend("database is locked".into())).is_retryable());
        let corrupt = StorageError::Serialization { id: "2023_monza_R".into(), reason: "eof".into() };
        assert!(!DashError::from(corrupt).is_retryable());
    }

    #[test]
    fn test_display_names_the_tier() {
        let err = DashError::from(RemoteError::Network("connection refused".into()));
        assert_eq!(err.to_string(), "Remote fetch failed: Network error: connection refused");
        assert_eq!(err.kind(), "remote");
    }
}
