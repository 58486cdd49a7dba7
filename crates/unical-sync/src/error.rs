//! Sync error types.

use thiserror::Error;
use unical_core::Provider;

/// Reasons a single-provider sync cannot start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("no adapter registered for {0}")]
    AdapterUnavailable(Provider),

    #[error("{0} adapter is not authenticated")]
    NotAuthenticated(Provider),
}

impl SyncError {
    pub fn provider(&self) -> Provider {
        match self {
            Self::AdapterUnavailable(p) | Self::NotAuthenticated(p) => *p,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
