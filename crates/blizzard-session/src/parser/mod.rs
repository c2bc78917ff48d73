//! Parser Layer - Streaming Frame Decoder
//!
//! Turns the inbound byte stream into typed [`FrameEvent`]s. The parser
//! owns no session state; id sync, reassembly, and dispatch happen in
//! [`crate::session`].

// Module declarations (declarations only in mod.rs)
pub mod event;
pub mod stream;

// Public re-exports
pub use event::FrameEvent;
pub use stream::{FrameParser, ParserError};
