//! Frame Codec
//!
//! Encodes and decodes the Blizzard frame envelope: a ten-byte header
//! followed by `length` payload bytes, all integers big-endian.
//!
//! ```text
//! offset  size  field
//! 0       1     magic = 0x59
//! 1       1     type  (0 = handshake, 1 = json, 3 = buffer response)
//! 2       4     id    (u32 BE, 0 = no reply expected)
//! 6       4     length (u32 BE, payload byte count)
//! 10      N     payload
//! ```
//!
//! [`Frame::encode`] produces one contiguous buffer so a frame is always
//! a single atomic write to the transport.
//!
//! # Examples
//!
//! ```rust
//! use blizzard_session::protocol::{Frame, FrameType};
//!
//! let frame = Frame::with_payload(FrameType::Json, 2, &b"{\"result\":3}"[..]);
//! let bytes = frame.encode();
//!
//! let decoded = Frame::decode(&bytes).unwrap();
//! assert_eq!(decoded, frame);
//! ```

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use bytes::{BufMut, Bytes, BytesMut};

// Layer 3: Internal module imports
use super::constants::{HEADER_LEN, MAGIC};
use super::errors::FrameError;

/// The three frame types that may appear on the wire
///
/// The discriminants are the wire bytes. Value 2 is reserved and
/// deliberately absent; [`FrameType::try_from`] rejects it along with
/// every other unassigned byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Zero-length session greeting; receipt makes the session ready
    Handshake = 0,
    /// UTF-8 JSON payload carrying a request, reply, or notification
    Json = 1,
    /// One chunk of a binary reply, or (zero-length) its terminator
    BufferResponse = 3,
}

impl TryFrom<u8> for FrameType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, FrameError> {
        match value {
            0 => Ok(FrameType::Handshake),
            1 => Ok(FrameType::Json),
            3 => Ok(FrameType::BufferResponse),
            other => Err(FrameError::UnknownType(other)),
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameType::Handshake => write!(f, "handshake"),
            FrameType::Json => write!(f, "json"),
            FrameType::BufferResponse => write!(f, "buffer-response"),
        }
    }
}

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Frame type byte
    pub frame_type: FrameType,
    /// Correlation id; 0 means no reply is expected
    pub id: u32,
    /// Payload byte count; 0 marks a sentinel frame
    pub length: u32,
}

impl FrameHeader {
    /// Decode a header from the first [`HEADER_LEN`] bytes of `bytes`.
    ///
    /// Validates the magic byte and the frame type. Used by the codec
    /// round-trip path and by tests; the streaming parser reads the raw
    /// fields itself because it must report failures for unknown types
    /// at the offending id rather than abort.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < HEADER_LEN {
            return Err(FrameError::short_header(bytes.len()));
        }
        if bytes[0] != MAGIC {
            return Err(FrameError::BadMagic(bytes[0]));
        }
        let frame_type = FrameType::try_from(bytes[1])?;
        let id = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        let length = u32::from_be_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
        Ok(FrameHeader {
            frame_type,
            id,
            length,
        })
    }
}

/// One complete frame: header plus owned payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The frame header; `header.length` always equals `payload.len()`
    pub header: FrameHeader,
    /// Payload bytes; empty iff `header.length == 0`
    pub payload: Bytes,
}

impl Frame {
    /// Create a zero-length sentinel frame (handshake, buffer terminator).
    ///
    /// Encodes to exactly [`HEADER_LEN`] bytes.
    pub fn empty(frame_type: FrameType, id: u32) -> Self {
        Self {
            header: FrameHeader {
                frame_type,
                id,
                length: 0,
            },
            payload: Bytes::new(),
        }
    }

    /// Create a payload-bearing frame.
    pub fn with_payload(frame_type: FrameType, id: u32, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            header: FrameHeader {
                frame_type,
                id,
                length: payload.len() as u32,
            },
            payload,
        }
    }

    /// Encode header and payload into a single contiguous buffer.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u8(MAGIC);
        buf.put_u8(self.header.frame_type as u8);
        buf.put_u32(self.header.id);
        buf.put_u32(self.header.length);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Decode one frame from the start of `bytes`.
    ///
    /// Fails if the buffer is shorter than the header plus the declared
    /// payload length. Trailing bytes beyond the frame are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let header = FrameHeader::decode(bytes)?;
        let end = HEADER_LEN + header.length as usize;
        if bytes.len() < end {
            return Err(FrameError::Truncated {
                needed: end,
                available: bytes.len(),
            });
        }
        Ok(Frame {
            header,
            payload: Bytes::copy_from_slice(&bytes[HEADER_LEN..end]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_frame_is_exactly_ten_bytes() {
        let bytes = Frame::empty(FrameType::Handshake, 0).encode();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(&bytes[..], &[0x59, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn payload_frame_layout() {
        let frame =
            Frame::with_payload(FrameType::BufferResponse, 9, Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF]));
        let bytes = frame.encode();
        assert_eq!(bytes.len(), 14);
        assert_eq!(bytes[0], MAGIC);
        assert_eq!(bytes[1], 3);
        assert_eq!(&bytes[2..6], &[0, 0, 0, 9]);
        assert_eq!(&bytes[6..10], &[0, 0, 0, 4]);
        assert_eq!(&bytes[10..], &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn reserved_type_is_rejected() {
        assert_eq!(FrameType::try_from(2), Err(FrameError::UnknownType(2)));
        assert_eq!(FrameType::try_from(0xFF), Err(FrameError::UnknownType(0xFF)));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = Frame::empty(FrameType::Json, 1).encode().to_vec();
        bytes[0] = 0xFF;
        assert_eq!(Frame::decode(&bytes), Err(FrameError::BadMagic(0xFF)));
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let bytes = Frame::with_payload(FrameType::Json, 1, &b"{}"[..]).encode();
        let err = Frame::decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(
            err,
            FrameError::Truncated {
                needed: 12,
                available: 11
            }
        );
    }

    proptest! {
        #[test]
        fn round_trip_framing(type_byte in prop_oneof![Just(0u8), Just(1u8), Just(3u8)],
                              id in any::<u32>(),
                              payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            let frame_type = FrameType::try_from(type_byte).unwrap();
            let frame = Frame::with_payload(frame_type, id, payload);
            let decoded = Frame::decode(&frame.encode()).unwrap();
            prop_assert_eq!(decoded, frame);
        }
    }
}
