//! Frame Codec Errors
//!
//! Failures raised while encoding or decoding a single frame envelope.
//! These are local decoding errors, distinct from the on-wire failure
//! codes in [`crate::protocol::constants::error_codes`]: a `FrameError`
//! never leaves the process.

// Layer 1: Standard library imports
// (None)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use super::constants::HEADER_LEN;

/// Errors produced by the frame codec
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The first byte of the buffer is not the protocol magic
    #[error("invalid magic byte {0:#04x}")]
    BadMagic(u8),

    /// The type byte does not name a known frame type
    #[error("unknown frame type {0:#04x}")]
    UnknownType(u8),

    /// The buffer is too short to hold a header plus the declared payload
    #[error("truncated frame: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required by the header (at least [`HEADER_LEN`])
        needed: usize,
        /// Bytes actually available
        available: usize,
    },
}

impl FrameError {
    pub(crate) fn short_header(available: usize) -> Self {
        Self::Truncated {
            needed: HEADER_LEN,
            available,
        }
    }
}
