//! Error taxonomy shared by every layer.
//!
//! | Kind | Raised by | Meaning |
//! |------|-----------|---------|
//! | `MalformedFeed` | parser | payload is not XML, or a required id/link is missing |
//! | `UnsupportedKind` | parser | root element does not match the expected kind |
//! | `AuthFailure` | session | the server rejected the credentials (401/403) |
//! | `Unreachable` | session / client | connect or transport-level failure |
//! | `CapabilityMismatch` | session | unsupported CMIS version or no root collection |
//! | `NotFound` | client | 404 from the server |
//! | `Timeout` | client | the transport gave up waiting |
//! | `UnexpectedStatus` | client | any other non-2xx status |
//! | `InvalidServer` | session | server configuration unusable at connect time |
//! | `StorageFailure` | favorite store | persistence layer unavailable or failed |
//! | `Interrupted` | task orchestrator | a run ended without producing a result |
//!
//! Callers match on [`ErrorKind`] to pick a user-facing message; the core
//! never renders one itself.

use serde::Serialize;

use crate::feed::FeedKind;

/// Failures produced by the feed parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("malformed feed: {0}")]
    MalformedFeed(String),

    #[error("unsupported payload: expected {expected}, found <{found}>")]
    UnsupportedKind { expected: FeedKind, found: String },
}

/// Failures produced by the favorite store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("favorite storage failure: {0}")]
    StorageFailure(String),
}

/// Classified failure of a repository operation.
///
/// Cloneable so a single negotiation or fetch outcome can be shared between
/// every caller that was coalesced onto it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CmisError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("authentication rejected by server '{server_id}'")]
    AuthFailure { server_id: String },

    #[error("server unreachable: {0}")]
    Unreachable(String),

    #[error("capability mismatch: {0}")]
    CapabilityMismatch(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("unexpected HTTP status {status} for {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid server configuration: {0}")]
    InvalidServer(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("task '{0}' ended without a result")]
    Interrupted(String),
}

/// Flat discriminant of [`CmisError`], for mapping failures to messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedFeed,
    UnsupportedKind,
    AuthFailure,
    Unreachable,
    CapabilityMismatch,
    NotFound,
    Timeout,
    UnexpectedStatus,
    InvalidServer,
    StorageFailure,
    Interrupted,
}

impl CmisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CmisError::Feed(FeedError::MalformedFeed(_)) => ErrorKind::MalformedFeed,
            CmisError::Feed(FeedError::UnsupportedKind { .. }) => ErrorKind::UnsupportedKind,
            CmisError::AuthFailure { .. } => ErrorKind::AuthFailure,
            CmisError::Unreachable(_) => ErrorKind::Unreachable,
            CmisError::CapabilityMismatch(_) => ErrorKind::CapabilityMismatch,
            CmisError::NotFound(_) => ErrorKind::NotFound,
            CmisError::Timeout(_) => ErrorKind::Timeout,
            CmisError::UnexpectedStatus { .. } => ErrorKind::UnexpectedStatus,
            CmisError::InvalidServer(_) => ErrorKind::InvalidServer,
            CmisError::Store(StoreError::StorageFailure(_)) => ErrorKind::StorageFailure,
            CmisError::Interrupted(_) => ErrorKind::Interrupted,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, CmisError::AuthFailure { .. })
    }
}
