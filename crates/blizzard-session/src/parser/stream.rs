//! Streaming Frame Decoder
//!
//! Consumes the inbound byte stream as an endless sequence of frames.
//! The decoder is incremental: it reads the fixed ten-byte header, then
//! exactly `length` payload bytes, so a frame never has to fit in the
//! read buffer and a slow peer never blocks dispatch of frames already
//! decoded.
//!
//! A wrong magic byte yields a [`FrameEvent::ProtocolFail`] and the
//! decoder resumes at the very next byte as if it were a frame boundary.
//! There is no scan-ahead for the next magic byte; a genuinely desynced
//! peer keeps producing failures until the stream realigns or the host
//! gives up. This matches the wire behavior peers already rely on.

// Layer 1: Standard library imports
// (None)

// Layer 2: Third-party crate imports
use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{trace, warn};

// Layer 3: Internal module imports
use crate::protocol::constants::{error_codes, HEADER_LEN, MAGIC};
use crate::protocol::frame::FrameType;

use super::event::FrameEvent;

/// Errors that end the read loop
///
/// Unlike the violations reported through [`FrameEvent::ProtocolFail`],
/// these are not answerable on the wire: the stream is broken or the
/// peer is asking for more memory than policy allows.
#[derive(Debug, Error)]
pub enum ParserError {
    /// The transport failed or ended mid-frame
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame declared a payload larger than the configured cap
    #[error("frame payload of {length} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// Declared payload length
        length: u32,
        /// Configured cap
        limit: usize,
    },
}

/// Incremental frame decoder over an async byte stream
///
/// # Examples
///
/// ```rust
/// use blizzard_session::parser::{FrameEvent, FrameParser};
/// use blizzard_session::protocol::{Frame, FrameType};
///
/// # tokio_test::block_on(async {
/// let bytes = Frame::with_payload(FrameType::Json, 2, &b"{\"result\":3}"[..]).encode();
/// let mut parser = FrameParser::new(&bytes[..], 1024);
///
/// let event = parser.next_event().await.unwrap();
/// assert!(matches!(event, Some(FrameEvent::Json { id: 2, .. })));
/// assert!(parser.next_event().await.unwrap().is_none());
/// # });
/// ```
#[derive(Debug)]
pub struct FrameParser<R> {
    reader: R,
    max_payload: usize,
}

impl<R: AsyncRead + Unpin> FrameParser<R> {
    /// Create a parser reading from `reader`.
    ///
    /// `max_payload` caps the declared payload length of a single frame;
    /// 0 means unlimited. The cap is resource policy, not protocol: a
    /// frame over the limit is a hard [`ParserError::PayloadTooLarge`],
    /// never an on-wire error reply, because honouring the header long
    /// enough to skip the payload is exactly the exhaustion the cap
    /// exists to prevent.
    pub fn new(reader: R, max_payload: usize) -> Self {
        Self {
            reader,
            max_payload,
        }
    }

    /// Decode the next frame event.
    ///
    /// Returns `Ok(None)` on a clean end of stream at a frame boundary;
    /// an end of stream inside a frame is an I/O error.
    pub async fn next_event(&mut self) -> Result<Option<FrameEvent>, ParserError> {
        let mut magic = [0u8; 1];
        if self.reader.read(&mut magic).await? == 0 {
            trace!("stream ended at a frame boundary");
            return Ok(None);
        }

        if magic[0] != MAGIC {
            warn!(byte = magic[0], "unexpected magic byte, restarting at next byte");
            return Ok(Some(FrameEvent::ProtocolFail {
                id: 0,
                code: error_codes::INVALID,
                message: "Unexpected magic".to_string(),
            }));
        }

        let mut header = [0u8; HEADER_LEN - 1];
        self.reader.read_exact(&mut header).await?;
        let type_byte = header[0];
        let id = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
        let length = u32::from_be_bytes([header[5], header[6], header[7], header[8]]);

        if length == 0 {
            return Ok(Some(match FrameType::try_from(type_byte) {
                Ok(FrameType::BufferResponse) => FrameEvent::BufferEnd { id },
                Ok(FrameType::Handshake) => FrameEvent::Handshake,
                _ => FrameEvent::ProtocolFail {
                    id,
                    code: error_codes::INVALID,
                    message: "Unexpected 0-length header".to_string(),
                },
            }));
        }

        if self.max_payload > 0 && length as usize > self.max_payload {
            return Err(ParserError::PayloadTooLarge {
                length,
                limit: self.max_payload,
            });
        }

        let mut payload = vec![0u8; length as usize];
        self.reader.read_exact(&mut payload).await?;
        let payload = Bytes::from(payload);

        Ok(Some(match FrameType::try_from(type_byte) {
            Ok(FrameType::Json) => FrameEvent::Json { id, payload },
            Ok(FrameType::BufferResponse) => FrameEvent::BufferChunk { id, bytes: payload },
            _ => FrameEvent::ProtocolFail {
                id,
                code: error_codes::INVALID,
                message: "Unknown packet type".to_string(),
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::Frame;

    async fn collect(bytes: Vec<u8>) -> Vec<FrameEvent> {
        let mut parser = FrameParser::new(&bytes[..], 0);
        let mut events = Vec::new();
        while let Some(event) = parser.next_event().await.unwrap() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn decodes_a_json_frame() {
        let bytes = Frame::with_payload(FrameType::Json, 7, &b"{}"[..]).encode();
        let events = collect(bytes.to_vec()).await;
        assert_eq!(
            events,
            vec![FrameEvent::Json {
                id: 7,
                payload: Bytes::from_static(b"{}"),
            }]
        );
    }

    #[tokio::test]
    async fn zero_length_sentinels() {
        let mut bytes = Frame::empty(FrameType::Handshake, 0).encode().to_vec();
        bytes.extend_from_slice(&Frame::empty(FrameType::BufferResponse, 9).encode());
        bytes.extend_from_slice(&Frame::empty(FrameType::Json, 4).encode());

        let events = collect(bytes).await;
        assert_eq!(events[0], FrameEvent::Handshake);
        assert_eq!(events[1], FrameEvent::BufferEnd { id: 9 });
        assert_eq!(
            events[2],
            FrameEvent::ProtocolFail {
                id: 4,
                code: error_codes::INVALID,
                message: "Unexpected 0-length header".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn stray_byte_fails_then_realigns() {
        // A stray byte before an otherwise valid frame: exactly one
        // failure, then the aligned frame parses normally.
        let mut bytes = vec![0xFF];
        bytes.extend_from_slice(&Frame::with_payload(FrameType::Json, 2, &b"{}"[..]).encode());

        let events = collect(bytes).await;
        assert_eq!(
            events[0],
            FrameEvent::ProtocolFail {
                id: 0,
                code: error_codes::INVALID,
                message: "Unexpected magic".to_string(),
            }
        );
        assert!(matches!(events[1], FrameEvent::Json { id: 2, .. }));
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn unknown_type_with_payload_fails_at_its_id() {
        let mut bytes = Frame::with_payload(FrameType::Json, 5, &b"xx"[..])
            .encode()
            .to_vec();
        bytes[1] = 2; // reserved type

        let events = collect(bytes).await;
        assert_eq!(
            events,
            vec![FrameEvent::ProtocolFail {
                id: 5,
                code: error_codes::INVALID,
                message: "Unknown packet type".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn payload_over_the_cap_is_a_hard_error() {
        let bytes = Frame::with_payload(FrameType::Json, 1, vec![0u8; 64]).encode();
        let mut parser = FrameParser::new(&bytes[..], 16);
        let err = parser.next_event().await.unwrap_err();
        assert!(matches!(
            err,
            ParserError::PayloadTooLarge { length: 64, limit: 16 }
        ));
    }

    #[tokio::test]
    async fn eof_inside_a_frame_is_an_error() {
        let bytes = Frame::with_payload(FrameType::Json, 1, &b"{\"a\":1}"[..]).encode();
        let mut parser = FrameParser::new(&bytes[..bytes.len() - 2], 0);
        assert!(parser.next_event().await.is_err());
    }
}
