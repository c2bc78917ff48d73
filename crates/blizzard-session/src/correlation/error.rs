//! Error types for request correlation
//!
//! [`CallError`] is how a pending call resolves unsuccessfully;
//! [`PendingLimitExceeded`] is the table's capacity guard.

use thiserror::Error;

/// Why a call did not produce a reply value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The peer answered with an error object
    #[error("remote error {code}: {message}")]
    Remote {
        /// Error code from the peer
        code: i32,
        /// Error message from the peer
        message: String,
    },

    /// The session closed before a reply arrived
    #[error("session closed before a reply arrived")]
    SessionClosed,
}

/// Result type for call resolution
pub type CallResult<T> = Result<T, CallError>;

/// The pending-request table is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("maximum pending requests exceeded ({limit})")]
pub struct PendingLimitExceeded {
    /// The configured limit that was hit
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let remote = CallError::Remote {
            code: -32601,
            message: "Method nope not found.".to_string(),
        };
        let display = format!("{remote}");
        assert!(display.contains("-32601"));
        assert!(display.contains("nope"));
    }
}
