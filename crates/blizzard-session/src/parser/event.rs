//! Typed frame events yielded by the streaming parser

use bytes::Bytes;

/// One decoded frame, classified for dispatch
///
/// The parser never interprets JSON and never touches session state; it
/// reduces the byte stream to these events and the session does the
/// rest. Protocol violations the parser can detect (bad magic, unknown
/// types, illegal sentinels) surface as [`FrameEvent::ProtocolFail`]
/// rather than errors, because most of them are answered on the wire at
/// the offending id instead of tearing the session down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A zero-length handshake frame; the session becomes ready
    Handshake,
    /// A JSON payload at `id` (0 = notification space)
    Json {
        /// Frame correlation id
        id: u32,
        /// Raw payload bytes, not yet parsed as JSON
        payload: Bytes,
    },
    /// One chunk of an in-progress binary reply
    BufferChunk {
        /// Frame correlation id
        id: u32,
        /// Chunk bytes
        bytes: Bytes,
    },
    /// Zero-length terminator closing the binary reply at `id`
    BufferEnd {
        /// Frame correlation id
        id: u32,
    },
    /// A framing violation attributable to `id` (0 when unattributable)
    ProtocolFail {
        /// Frame correlation id, or 0
        id: u32,
        /// Failure code from [`crate::protocol::error_codes`]
        code: i32,
        /// Failure text
        message: String,
    },
}

impl FrameEvent {
    /// The id parsed from the frame header, where one exists.
    ///
    /// Used by the session for defensive sequence sync; handshake frames
    /// are specified at id 0 and carry nothing worth syncing on.
    pub fn frame_id(&self) -> Option<u32> {
        match self {
            FrameEvent::Handshake => None,
            FrameEvent::Json { id, .. }
            | FrameEvent::BufferChunk { id, .. }
            | FrameEvent::BufferEnd { id }
            | FrameEvent::ProtocolFail { id, .. } => Some(*id),
        }
    }
}
