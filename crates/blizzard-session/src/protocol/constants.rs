//! Protocol Constants
//!
//! Wire-level constants for the Blizzard framing layer and the
//! JSON-RPC 2.0 aligned error codes carried in error replies.

/// Every frame on the wire begins with this byte. It doubles as the
/// protocol version tag: a peer speaking anything else fails the very
/// first read.
pub const MAGIC: u8 = 0x59;

/// Highest usable correlation id; the sequence wraps to 0 past this.
pub const MAX_ID: u32 = u32::MAX;

/// Fixed size of the frame header (magic + type + id + length).
pub const HEADER_LEN: usize = 10;

/// Error codes carried in `{error: {code, message}}` replies
pub mod error_codes {
    /// Parse error - the JSON payload could not be decoded
    pub const PARSE: i32 = -32700;

    /// Invalid request - schema or framing violation
    pub const INVALID: i32 = -32600;

    /// Method not found - no handler registered under that name
    pub const METHOD_NOT_FOUND: i32 = -32601;

    /// Internal error - a reply arrived for an id nobody is waiting on
    pub const INTERNAL: i32 = -32603;

    /// User error - a method handler signalled failure
    pub const USER: i32 = -32000;
}
