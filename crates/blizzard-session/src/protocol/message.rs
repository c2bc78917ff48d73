//! JSON Payload Model
//!
//! The logical messages carried inside [`FrameType::Json`] frames, with
//! validation done once at the parse boundary rather than on every field
//! access.
//!
//! A payload is UTF-8 JSON whose top-level value must be an object with
//! exactly one of three field sets:
//!
//! - Request / notification: `{method: string, params?: any}`
//! - Success reply: `{result: any}`
//! - Error reply: `{error: {code: int, message: string}}`
//!
//! Whether a `method`-bearing payload is a request or a notification is
//! decided by the frame id: id 0 means no reply is expected or permitted.
//!
//! # Examples
//!
//! ```rust
//! use blizzard_session::protocol::Incoming;
//! use serde_json::json;
//!
//! let incoming = Incoming::parse(2, br#"{"method":"add","params":[1,2]}"#).unwrap();
//! assert_eq!(
//!     incoming,
//!     Incoming::Request { method: "add".to_string(), params: json!([1, 2]) }
//! );
//! ```

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

// Layer 3: Internal module imports
use super::constants::error_codes;

#[allow(unused_imports)] // referenced by doc comments
use super::frame::FrameType;

/// The error object carried in `{error: {...}}` replies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    /// Numeric error code, JSON-RPC 2.0 aligned
    pub code: i32,
    /// Human-readable description
    pub message: String,
}

/// A fully classified inbound JSON payload
///
/// Classification and validation happen in [`Incoming::parse`]; by the
/// time a value of this type exists, the payload is known to be legal
/// for its frame id.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// `{method, params?}` at a non-zero id; a reply is expected
    Request {
        /// Name of the method to invoke
        method: String,
        /// Parameters; defaults to `[]` when omitted on the wire
        params: Value,
    },
    /// `{method, params?}` at id 0; no reply is expected or permitted
    Notification {
        /// Name of the method to invoke
        method: String,
        /// Parameters; defaults to `[]` when omitted on the wire
        params: Value,
    },
    /// `{result}` at a non-zero id
    Success {
        /// The result value, verbatim
        result: Value,
    },
    /// `{error: {code, message}}` at a non-zero id
    Failure {
        /// Error code from the peer
        code: i32,
        /// Error message from the peer
        message: String,
    },
}

/// A payload that violated the message grammar
///
/// Carries the on-wire failure code and text; the session funnels it
/// through its failure path (sent as an error reply when the id is
/// non-zero, dropped otherwise).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("protocol violation ({code}): {message}")]
pub struct MessageError {
    /// Failure code from [`error_codes`]
    pub code: i32,
    /// Failure text
    pub message: String,
}

impl MessageError {
    fn parse(err: &serde_json::Error) -> Self {
        Self {
            code: error_codes::PARSE,
            message: err.to_string(),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            code: error_codes::INVALID,
            message: message.into(),
        }
    }
}

impl Incoming {
    /// Parse and validate one JSON frame payload.
    ///
    /// The frame `id` participates in classification: `method`-bearing
    /// payloads become [`Incoming::Request`] or [`Incoming::Notification`]
    /// by id, and the mandatory-field rules differ between id-bearing and
    /// id-less payloads.
    ///
    /// Top-level arrays are rejected outright. So is an object whose
    /// `length` member is a non-zero number: the upstream protocol used a
    /// truthy length check to spot arrays, which also catches such
    /// objects, and peers depend on the strictness.
    pub fn parse(id: u32, payload: &[u8]) -> Result<Self, MessageError> {
        let value: Value = serde_json::from_slice(payload).map_err(|e| MessageError::parse(&e))?;

        if looks_like_array(&value) {
            return Err(MessageError::invalid("Messages must not be arrays"));
        }

        if let Some(method) = value.get("method").and_then(Value::as_str) {
            let method = method.to_string();
            let params = value.get("params").cloned().unwrap_or_else(|| json!([]));
            return Ok(if id == 0 {
                Incoming::Notification { method, params }
            } else {
                Incoming::Request { method, params }
            });
        }

        if id == 0 {
            return Err(MessageError::invalid(
                "Messages without IDs must contain method",
            ));
        }

        if let Some(error) = value.get("error") {
            let error: WireError = serde_json::from_value(error.clone())
                .map_err(|_| MessageError::invalid("Malformed error object"))?;
            return Ok(Incoming::Failure {
                code: error.code,
                message: error.message,
            });
        }

        if let Some(result) = value.get("result") {
            return Ok(Incoming::Success {
                result: result.clone(),
            });
        }

        Err(MessageError::invalid(
            "Messages with IDs must contain method, error, or result",
        ))
    }
}

/// Truthy-length check: arrays, and objects that masquerade as them.
fn looks_like_array(value: &Value) -> bool {
    match value {
        Value::Array(_) => true,
        Value::Object(map) => matches!(
            map.get("length"),
            Some(Value::Number(n)) if n.as_f64() != Some(0.0)
        ),
        _ => false,
    }
}

/// Outbound `{method, params?}` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    /// Name of the method to invoke on the peer
    pub method: String,
    /// Parameters; omitted from the wire when `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RequestBody {
    /// Create a request body.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// Outbound `{result}` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBody {
    /// The successful result value
    pub result: Value,
}

impl ResultBody {
    /// Create a success body.
    pub fn new(result: Value) -> Self {
        Self { result }
    }
}

/// Outbound `{error: {code, message}}` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// The error object
    pub error: WireError,
}

impl ErrorBody {
    /// Create an error body.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            error: WireError {
                code,
                message: message.into(),
            },
        }
    }
}

/// A reply payload, as delivered to completions and accepted by
/// [`crate::session::Session::reply`]
///
/// JSON replies travel in one [`FrameType::Json`] frame; binary replies
/// travel as [`FrameType::BufferResponse`] chunks closed by a zero-length
/// terminator and arrive reassembled.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A JSON result value
    Json(Value),
    /// An opaque binary payload
    Binary(Bytes),
}

impl Reply {
    /// The JSON value, if this is a JSON reply.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Reply::Json(value) => Some(value),
            Reply::Binary(_) => None,
        }
    }

    /// The binary payload, if this is a binary reply.
    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            Reply::Binary(bytes) => Some(bytes),
            Reply::Json(_) => None,
        }
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Json(value)
    }
}

impl From<Bytes> for Reply {
    fn from(bytes: Bytes) -> Self {
        Reply::Binary(bytes)
    }
}

impl From<Vec<u8>> for Reply {
    fn from(bytes: Vec<u8>) -> Self {
        Reply::Binary(Bytes::from(bytes))
    }
}

impl From<&[u8]> for Reply {
    fn from(bytes: &[u8]) -> Self {
        Reply::Binary(Bytes::copy_from_slice(bytes))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Json(value) => write!(f, "json reply: {value}"),
            Reply::Binary(bytes) => write!(f, "binary reply: {} bytes", bytes.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_with_params() {
        let incoming = Incoming::parse(2, br#"{"method":"add","params":[1,2]}"#).unwrap();
        assert_eq!(
            incoming,
            Incoming::Request {
                method: "add".to_string(),
                params: json!([1, 2]),
            }
        );
    }

    #[test]
    fn request_params_default_to_empty_array() {
        let incoming = Incoming::parse(7, br#"{"method":"nope"}"#).unwrap();
        assert_eq!(
            incoming,
            Incoming::Request {
                method: "nope".to_string(),
                params: json!([]),
            }
        );
    }

    #[test]
    fn method_at_id_zero_is_a_notification() {
        let incoming = Incoming::parse(0, br#"{"method":"tick"}"#).unwrap();
        assert!(matches!(incoming, Incoming::Notification { .. }));
    }

    #[test]
    fn success_and_failure_replies() {
        assert_eq!(
            Incoming::parse(2, br#"{"result":3}"#).unwrap(),
            Incoming::Success { result: json!(3) }
        );
        assert_eq!(
            Incoming::parse(2, br#"{"error":{"code":-32601,"message":"no"}}"#).unwrap(),
            Incoming::Failure {
                code: -32601,
                message: "no".to_string(),
            }
        );
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = Incoming::parse(1, b"{nope").unwrap_err();
        assert_eq!(err.code, error_codes::PARSE);
    }

    #[test]
    fn top_level_arrays_are_rejected() {
        let err = Incoming::parse(1, br#"[1,2,3]"#).unwrap_err();
        assert_eq!(err.code, error_codes::INVALID);
    }

    #[test]
    fn objects_with_numeric_length_are_rejected() {
        // Mirrors the upstream truthy length check.
        let err = Incoming::parse(1, br#"{"method":"x","length":4}"#).unwrap_err();
        assert_eq!(err.code, error_codes::INVALID);

        // A zero length is falsy upstream and passes.
        let ok = Incoming::parse(1, br#"{"method":"x","length":0}"#);
        assert!(ok.is_ok());
    }

    #[test]
    fn id_bearing_message_needs_method_error_or_result() {
        let err = Incoming::parse(5, br#"{"something":"else"}"#).unwrap_err();
        assert_eq!(err.code, error_codes::INVALID);
        assert_eq!(
            err.message,
            "Messages with IDs must contain method, error, or result"
        );
    }

    #[test]
    fn id_less_message_needs_method() {
        let err = Incoming::parse(0, br#"{"result":1}"#).unwrap_err();
        assert_eq!(err.code, error_codes::INVALID);
        assert_eq!(err.message, "Messages without IDs must contain method");
    }

    #[test]
    fn outbound_bodies_serialize_to_the_wire_grammar() {
        let request = RequestBody::new("add", Some(json!([1, 2])));
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"method":"add","params":[1,2]}"#
        );

        let bare = RequestBody::new("ping", None);
        assert_eq!(serde_json::to_string(&bare).unwrap(), r#"{"method":"ping"}"#);

        let result = ResultBody::new(json!(3));
        assert_eq!(serde_json::to_string(&result).unwrap(), r#"{"result":3}"#);

        let error = ErrorBody::new(-32601, "Method nope not found.");
        assert_eq!(
            serde_json::to_string(&error).unwrap(),
            r#"{"error":{"code":-32601,"message":"Method nope not found."}}"#
        );
    }
}
