//! Protocol Layer - Wire Format and Message Grammar
//!
//! Everything that defines bytes on the wire lives here: the framing
//! constants, the frame codec, the JSON payload grammar, and the codec
//! error types. Nothing in this module does I/O; the streaming side is
//! [`crate::parser`] and the stateful side is [`crate::session`].
//!
//! ## Module Organization
//!
//! - `constants`: magic byte, id space, error codes
//! - `frame`: frame header and envelope codec
//! - `message`: inbound classification and outbound bodies
//! - `errors`: codec failure types

// Module declarations (declarations only in mod.rs)
pub mod constants;
pub mod errors;
pub mod frame;
pub mod message;

// Public re-exports (clean API surface)
pub use constants::{error_codes, HEADER_LEN, MAGIC, MAX_ID};
pub use errors::FrameError;
pub use frame::{Frame, FrameHeader, FrameType};
pub use message::{
    ErrorBody, Incoming, MessageError, Reply, RequestBody, ResultBody, WireError,
};
