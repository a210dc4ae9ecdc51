//! Error types for the sync engine.

use thiserror::Error;

/// Errors that can occur while synchronizing client state.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network request rejected or timed out.
    #[error("network failure: {0}")]
    Network(String),

    /// Server rejected the payload (e.g. quantity exceeds stock).
    #[error("validation failure: {0}")]
    Validation(String),

    /// Push transport reported expired or invalid credentials.
    #[error("authentication failure: {0}")]
    Auth(String),

    /// An event or reconcile response refers to an entity no longer
    /// tracked locally. Swallowed by callers, logged for diagnostics.
    #[error("stale entity: {entity}")]
    Stale { entity: String },

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket transport error.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SyncError {
    /// Whether this error is recovered locally via rollback.
    ///
    /// Network and validation failures roll back to the pre-mutation
    /// snapshot; auth failures force a disconnect instead and are
    /// surfaced for the UI to re-authenticate.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SyncError::Network(_) | SyncError::Validation(_))
    }
}
