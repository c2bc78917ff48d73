//! Binary Reply Reassembly
//!
//! Accumulates `BufferResponse` chunks per id until the zero-length
//! terminator, at which point the concatenated bytes are handed to
//! dispatch as a single binary reply. An entry exists only between the
//! first chunk and its terminator.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tracing::trace;

/// A stream outgrew the configured cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("buffer stream exceeds maximum size of {limit} bytes")]
pub struct StreamOverflow {
    /// The configured cap that was exceeded
    pub limit: usize,
}

/// Per-id accumulation buffers for in-progress binary replies
#[derive(Debug)]
pub struct StreamBuffers {
    buffers: HashMap<u32, BytesMut>,
    max_stream_size: usize,
}

impl StreamBuffers {
    /// Create the buffer set; `max_stream_size` of 0 means unlimited.
    pub fn new(max_stream_size: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            max_stream_size,
        }
    }

    /// Append a chunk to the stream at `id`, creating it on first arrival.
    ///
    /// On overflow the whole stream is discarded: a capped stream can
    /// never be delivered, so holding its prefix would only prolong the
    /// exhaustion the cap exists to stop.
    pub fn append(&mut self, id: u32, bytes: &[u8]) -> Result<(), StreamOverflow> {
        let limit = self.max_stream_size;
        if limit > 0 {
            let buffered = self.buffers.get(&id).map_or(0, BytesMut::len);
            if buffered + bytes.len() > limit {
                self.buffers.remove(&id);
                return Err(StreamOverflow { limit });
            }
        }
        let buffer = self.buffers.entry(id).or_default();
        buffer.extend_from_slice(bytes);
        trace!(id, chunk = bytes.len(), total = buffer.len(), "buffered stream chunk");
        Ok(())
    }

    /// Close the stream at `id`, returning the reassembled bytes.
    ///
    /// Returns `None` when no stream is open at that id (a terminator
    /// for an unknown stream).
    pub fn complete(&mut self, id: u32) -> Option<Bytes> {
        self.buffers.remove(&id).map(BytesMut::freeze)
    }

    /// Number of streams currently being reassembled.
    pub fn open_streams(&self) -> usize {
        self.buffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_concatenate_in_order() {
        let mut streams = StreamBuffers::new(0);
        streams.append(9, &[0xDE, 0xAD]).unwrap();
        streams.append(9, &[0xBE, 0xEF]).unwrap();
        assert_eq!(streams.open_streams(), 1);

        let bytes = streams.complete(9).unwrap();
        assert_eq!(&bytes[..], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(streams.open_streams(), 0);
    }

    #[test]
    fn terminator_without_a_stream_returns_none() {
        let mut streams = StreamBuffers::new(0);
        assert!(streams.complete(5).is_none());
    }

    #[test]
    fn streams_are_independent_per_id() {
        let mut streams = StreamBuffers::new(0);
        streams.append(1, b"one").unwrap();
        streams.append(3, b"three").unwrap();

        assert_eq!(&streams.complete(3).unwrap()[..], b"three");
        assert_eq!(&streams.complete(1).unwrap()[..], b"one");
    }

    #[test]
    fn overflow_drops_the_stream() {
        let mut streams = StreamBuffers::new(4);
        streams.append(7, &[1, 2, 3]).unwrap();
        let err = streams.append(7, &[4, 5]).unwrap_err();
        assert_eq!(err, StreamOverflow { limit: 4 });

        // The partial stream is gone; a terminator now reports unknown.
        assert!(streams.complete(7).is_none());
    }
}
