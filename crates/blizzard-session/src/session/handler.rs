//! Method Handlers and the One-Shot Responder
//!
//! Methods exposed through [`crate::session::Session::expose`] implement
//! [`MethodHandler`]. A handler receives the request parameters and a
//! [`Responder`]; the responder is the completion callback, and because
//! [`Responder::ok`] and [`Responder::err`] consume it, invoking the
//! completion twice is unrepresentable.

// Layer 1: Standard library imports
// (None)

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::Value;
use tracing::{trace, warn};

// Layer 3: Internal module imports
use crate::protocol::constants::error_codes;
use crate::protocol::message::Reply;

use super::Session;

/// An exposed method
///
/// Handlers run as their own tasks in frame-arrival order and may
/// suspend freely; the dispatcher never waits on them. A handler that
/// drops its responder without calling either method leaves the caller
/// waiting, exactly as a callee that never answers would on the wire —
/// timeouts are the caller's policy, not the session's.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use blizzard_session::session::{MethodHandler, Responder};
/// use serde_json::{json, Value};
///
/// struct Add;
///
/// #[async_trait]
/// impl MethodHandler for Add {
///     async fn handle(&self, params: Value, responder: Responder) {
///         let sum: i64 = params
///             .as_array()
///             .map(|values| values.iter().filter_map(Value::as_i64).sum())
///             .unwrap_or(0);
///         responder.ok(json!(sum)).await;
///     }
/// }
/// ```
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Handle one invocation.
    ///
    /// `params` is the request's `params` value, `[]` when the peer
    /// omitted it.
    async fn handle(&self, params: Value, responder: Responder);
}

/// One-shot completion for a method invocation
///
/// Holds the id the reply must go to. For notifications (id 0) a
/// successful reply is discarded and an error is logged and dropped;
/// the peer asked for silence.
#[derive(Debug)]
pub struct Responder {
    session: Session,
    id: u32,
}

impl Responder {
    pub(super) fn new(session: Session, id: u32) -> Self {
        Self { session, id }
    }

    /// The id this responder answers, 0 for a notification.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Whether this invocation was a notification (no reply permitted).
    pub fn is_notification(&self) -> bool {
        self.id == 0
    }

    /// Complete successfully.
    ///
    /// JSON replies go out as a `{result: ...}` frame; binary replies as
    /// a buffer chunk plus terminator. On a notification the reply is
    /// discarded.
    pub async fn ok(self, reply: impl Into<Reply> + Send) {
        if self.is_notification() {
            trace!("discarding reply to a notification");
            return;
        }
        let reply = reply.into();
        if let Err(err) = self.session.reply(self.id, reply).await {
            warn!(id = self.id, %err, "failed to send method reply");
        }
    }

    /// Complete with an error.
    ///
    /// Funnels into the session's failure path as a user error; at a
    /// non-zero id the peer receives `{error: {code: -32000, ...}}`.
    pub async fn err(self, message: impl Into<String> + Send) {
        self.session
            .inner
            .fail(self.id, error_codes::USER, message.into())
            .await;
    }
}
