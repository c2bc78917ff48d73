//! Blizzard - Framed JSON-RPC Session Protocol
//!
//! This crate implements the Blizzard session protocol: a bidirectional,
//! framed JSON-RPC-over-TCP protocol that multiplexes structured JSON
//! calls/replies and opaque binary payload replies over one socket. Each
//! side of a session can act as a caller (issuing requests that expect a
//! correlated reply) and as a callee (exposing named methods).
//!
//! # Architecture
//!
//! The crate is organized in layers:
//!
//! - **Protocol Layer** (`protocol`): the wire format — framing
//!   constants, the frame codec, and the JSON payload grammar with
//!   validation at the parse boundary
//! - **Parser Layer** (`parser`): the streaming decoder turning inbound
//!   bytes into typed frame events
//! - **Correlation Layer** (`correlation`): parity-disciplined id
//!   allocation and the table of in-flight requests
//! - **Session Layer** (`session`): dispatch, binary reassembly,
//!   lifecycle, and the public [`Session`] facade
//!
//! # Wire format
//!
//! A frame is a ten-byte big-endian header followed by `length` payload
//! bytes:
//!
//! ```text
//! offset  size  field
//! 0       1     magic = 0x59
//! 1       1     type  (0 = handshake, 1 = json, 3 = buffer response)
//! 2       4     id    (0 = no reply expected)
//! 6       4     length
//! 10      N     payload
//! ```
//!
//! JSON payloads carry `{method, params?}`, `{result}`, or
//! `{error: {code, message}}`; binary replies travel as buffer-response
//! chunks closed by a zero-length terminator.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use blizzard_session::{
//!     MethodHandler, Responder, Session, SessionConfig, SessionRole,
//! };
//! use serde_json::{json, Value};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl MethodHandler for Echo {
//!     async fn handle(&self, params: Value, responder: Responder) {
//!         responder.ok(params).await;
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let socket = tokio::net::TcpStream::connect("127.0.0.1:9000").await?;
//! let session = Session::start(socket, SessionRole::Instigator, SessionConfig::default());
//! session.expose("echo", Echo);
//!
//! session.ready().await?;
//! let reply = session.call("echo", Some(json!(["hello"]))).await?;
//! assert_eq!(reply.as_json(), Some(&json!(["hello"])));
//! # Ok(())
//! # }
//! ```

// Correlation layer modules
pub mod correlation;

// Parser layer modules
pub mod parser;

// Protocol layer modules
pub mod protocol;

// Session layer modules
pub mod session;

// Re-export commonly used types for convenience
pub use correlation::{CallError, CallResult, SequenceGenerator, SessionRole};
pub use parser::{FrameEvent, FrameParser, ParserError};
pub use protocol::{
    error_codes, Frame, FrameError, FrameHeader, FrameType, Incoming, MessageError, Reply,
    WireError, MAGIC, MAX_ID,
};
pub use session::{
    MethodHandler, PendingReply, Responder, Session, SessionConfig, SessionError, SessionEvent,
    SessionResult, SessionState,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the crate version as a string
pub fn version() -> &'static str {
    VERSION
}
