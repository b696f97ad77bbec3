use crate::entity::{EntityId, EntityKind};
use thiserror::Error;

/// Failures the sync engine distinguishes.
///
/// Transport and malformed-item errors are recovered locally (the tick or the
/// item is dropped). A duplicate entity means the reconciler itself is broken.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetch of {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("malformed {kind} item: {reason}")]
    MalformedItem { kind: EntityKind, reason: String },

    #[error("entity {kind}/{id} is already present")]
    DuplicateEntity { kind: EntityKind, id: EntityId },

    #[error("unknown layer '{0}'")]
    UnknownLayer(String),
}

impl SyncError {
    pub fn transport(endpoint: &str, message: impl std::fmt::Display) -> Self {
        SyncError::Transport {
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        }
    }
}
