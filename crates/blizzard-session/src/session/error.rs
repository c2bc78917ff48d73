//! Session error type

// Layer 1: Standard library imports
// (None)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::correlation::CallError;

/// Errors surfaced by the session facade
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport failed
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O failure
        #[from]
        source: std::io::Error,
    },

    /// A payload could not be serialized
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serde failure
        #[from]
        source: serde_json::Error,
    },

    /// The session is closing or closed; no new frames are accepted
    #[error("session is closed")]
    Closed,

    /// The pending-request table is at capacity
    #[error("too many pending requests (limit {limit})")]
    TooManyPendingRequests {
        /// The configured limit
        limit: usize,
    },

    /// `reply` was called with the notification id
    #[error("replies require a non-zero id")]
    ReplyToNotification,

    /// A call resolved unsuccessfully
    #[error(transparent)]
    Call(#[from] CallError),
}

/// Convenient result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
