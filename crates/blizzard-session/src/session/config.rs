//! Session configuration

/// Policy knobs for a session
///
/// Everything here is resource policy layered on top of the protocol;
/// none of it changes what legal peers see on the wire.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum in-flight requests this side may have (0 = unlimited)
    pub max_pending_requests: usize,

    /// Maximum declared payload length of a single frame (0 = unlimited).
    /// A frame over the cap is a fatal session error, not an error reply.
    pub max_frame_payload: usize,

    /// Maximum reassembled size of one binary reply stream
    /// (0 = unlimited). Overflow drops the stream and answers with an
    /// error reply at its id.
    pub max_stream_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_pending_requests: 1000,
            max_frame_payload: 16 * 1024 * 1024, // 16MB
            max_stream_size: 64 * 1024 * 1024,   // 64MB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_bounded() {
        let config = SessionConfig::default();
        assert!(config.max_pending_requests > 0);
        assert!(config.max_frame_payload > 0);
        assert!(config.max_stream_size > 0);
    }
}
