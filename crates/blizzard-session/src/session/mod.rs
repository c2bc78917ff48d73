//! Session Layer - Facade, Dispatch, and Lifecycle
//!
//! A [`Session`] multiplexes JSON calls/replies and binary buffer
//! replies over one exclusively-owned byte channel. Either side can act
//! as caller (issue requests, await correlated replies) and callee
//! (expose named methods).
//!
//! # Architecture
//!
//! ```text
//! transport bytes -> FrameParser -> FrameEvent -> dispatch
//!     -> method handler task -> Responder -> frame writer -> transport
//!     -> pending-call completion (caller side)
//! ```
//!
//! The drive task owns the read half and drains parser events; handlers
//! run as their own tasks and reach shared state through the same
//! concurrent structures (`DashMap`, atomics, async mutexes), so the
//! sections between suspension points stay atomic.
//!
//! # Lifecycle
//!
//! `Opening -> Ready -> Closing -> Closed`. The instigator writes a
//! handshake frame the moment the session starts; the acceptor answers
//! with its own. Both sides become ready on *receiving* a handshake.
//!
//! # Examples
//!
//! ```rust,no_run
//! use blizzard_session::session::{Session, SessionConfig};
//! use blizzard_session::SessionRole;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let socket = tokio::net::TcpStream::connect("127.0.0.1:9000").await?;
//! let session = Session::start(socket, SessionRole::Instigator, SessionConfig::default());
//!
//! session.ready().await?;
//! let reply = session.call("add", Some(json!([1, 2]))).await?;
//! println!("sum: {:?}", reply.as_json());
//!
//! session.end().await?;
//! # Ok(())
//! # }
//! ```

// Module declarations (declarations only in mod.rs)
pub mod config;
pub mod error;
pub mod handler;
pub mod streams;

// Public re-exports
pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use handler::{MethodHandler, Responder};
pub use streams::{StreamBuffers, StreamOverflow};

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{debug, error, trace, warn};

// Layer 3: Internal module imports
use crate::correlation::{
    CallError, CallResult, PendingCall, RequestTable, SequenceGenerator, SessionRole,
};
use crate::parser::{FrameEvent, FrameParser};
use crate::protocol::constants::error_codes;
use crate::protocol::frame::{Frame, FrameType};
use crate::protocol::message::{ErrorBody, Incoming, Reply, RequestBody, ResultBody};

/// Lifecycle states of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SessionState {
    /// Connected; waiting for the peer's handshake
    Opening = 0,
    /// Handshake received; normal dispatch
    Ready = 1,
    /// Local `end()` or remote close seen; no new requests accepted
    Closing = 2,
    /// The transport is gone
    Closed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Opening,
            1 => SessionState::Ready,
            2 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

/// Lifecycle events a session emits
///
/// Delivered through the broadcast channel returned by
/// [`Session::events`]. Protocol failures that can be answered on the
/// wire are not events; only what the host must act on surfaces here.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The peer's handshake arrived; requests will now be answered
    Ready,
    /// The session is over; the transport is closed
    End,
    /// A fatal failure the peer could not be told about
    Error {
        /// Description of the failure
        message: String,
    },
}

/// A request awaiting its reply, held by the caller
///
/// Dropping it abandons the call: the table entry stays until a
/// matching reply arrives and is then discarded silently.
#[derive(Debug)]
pub struct PendingReply {
    id: u32,
    receiver: oneshot::Receiver<CallResult<Reply>>,
}

impl PendingReply {
    /// The correlation id the reply will arrive under.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Wait for the reply.
    ///
    /// Resolves at most once; a session that closes first yields
    /// [`CallError::SessionClosed`].
    pub async fn wait(self) -> CallResult<Reply> {
        match self.receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(CallError::SessionClosed),
        }
    }
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One bidirectional Blizzard session over an owned byte channel
///
/// Cheap to clone; clones share the same underlying session. See the
/// [module docs](self) for the lifecycle and an example.
#[derive(Debug, Clone)]
pub struct Session {
    pub(super) inner: Arc<SessionInner>,
}

pub(super) struct SessionInner {
    config: SessionConfig,
    state: AtomicU8,
    sequence: SequenceGenerator,
    requests: RequestTable,
    methods: DashMap<String, Arc<dyn MethodHandler>>,
    streams: Mutex<StreamBuffers>,
    writer: Mutex<Option<BoxedWriter>>,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for SessionInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInner")
            .field("role", &self.sequence.role())
            .field("state", &SessionState::from_u8(self.state.load(Ordering::SeqCst)))
            .field("pending_requests", &self.requests.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start a session over `io` and spawn its drive task.
    ///
    /// The instigator's handshake frame is the first thing written. The
    /// returned handle is immediately usable: requests issued before the
    /// peer's handshake arrives are sent and correlated normally.
    pub fn start<T>(io: T, role: SessionRole, config: SessionConfig) -> Session
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(io);
        let (events, _) = broadcast::channel(32);

        let inner = Arc::new(SessionInner {
            sequence: SequenceGenerator::new(role),
            requests: RequestTable::new(config.max_pending_requests),
            methods: DashMap::new(),
            streams: Mutex::new(StreamBuffers::new(config.max_stream_size)),
            writer: Mutex::new(Some(Box::new(write_half) as BoxedWriter)),
            state: AtomicU8::new(SessionState::Opening as u8),
            events,
            config,
        });

        tokio::spawn(SessionInner::drive(Arc::clone(&inner), read_half));

        Session { inner }
    }

    /// Register a method handler under `name`.
    ///
    /// Exposing a name twice replaces the previous handler. Mutating the
    /// table while a dispatch for the same name is in flight is not
    /// something this layer defines an order for.
    pub fn expose(&self, name: impl Into<String>, handler: impl MethodHandler + 'static) {
        let name = name.into();
        debug!(method = %name, "exposed method");
        self.inner.methods.insert(name, Arc::new(handler));
    }

    /// Send a request and register a completion for its reply.
    pub async fn request(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> SessionResult<PendingReply> {
        let method = method.into();
        self.inner.ensure_open()?;

        // The sequence legally yields 0 right after a wrap, but 0 on the
        // wire means "no reply expected" and must never enter the table.
        let mut id = self.inner.sequence.next();
        if id == 0 {
            id = self.inner.sequence.next();
        }

        let body = serde_json::to_vec(&RequestBody::new(method.clone(), params))?;
        let (tx, rx) = oneshot::channel();
        self.inner
            .requests
            .insert(id, PendingCall::new(tx, method))
            .map_err(|e| SessionError::TooManyPendingRequests { limit: e.limit })?;

        if let Err(err) = self
            .inner
            .send_frame(Frame::with_payload(FrameType::Json, id, body))
            .await
        {
            // Never sent; the completion must not dangle.
            self.inner.requests.take(id);
            return Err(err);
        }

        Ok(PendingReply { id, receiver: rx })
    }

    /// Send a notification: a request at id 0, expecting no reply.
    ///
    /// Nothing is registered in the request table.
    pub async fn notify(&self, method: impl Into<String>, params: Option<Value>) -> SessionResult<()> {
        self.inner.ensure_open()?;
        let body = serde_json::to_vec(&RequestBody::new(method, params))?;
        self.inner
            .send_frame(Frame::with_payload(FrameType::Json, 0, body))
            .await
    }

    /// Send a request and wait for its reply.
    pub async fn call(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> SessionResult<Reply> {
        let pending = self.request(method, params).await?;
        Ok(pending.wait().await?)
    }

    /// Send a reply at `id`.
    ///
    /// Normally driven by the dispatcher through [`Responder`]; exposed
    /// for hosts that route replies themselves. Binary payloads go out
    /// as one buffer frame immediately followed by its terminator.
    pub async fn reply(&self, id: u32, payload: impl Into<Reply>) -> SessionResult<()> {
        if id == 0 {
            return Err(SessionError::ReplyToNotification);
        }
        self.inner.send_reply(id, payload.into()).await
    }

    /// Close the session.
    ///
    /// Moves to `Closing`, refuses new requests, and shuts the write
    /// half down. `Closed` follows once the read side drains. Pending
    /// completions are not synthetically failed; their callers observe
    /// [`CallError::SessionClosed`] when the channels drop.
    pub async fn end(&self) -> SessionResult<()> {
        if self.state() >= SessionState::Closing {
            return Ok(());
        }
        self.inner.set_state(SessionState::Closing);
        debug!("session closing");
        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        Ok(())
    }

    /// Subscribe to lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until the peer's handshake has arrived.
    pub async fn ready(&self) -> SessionResult<()> {
        let mut events = self.events();
        match self.state() {
            SessionState::Ready => return Ok(()),
            SessionState::Closing | SessionState::Closed => return Err(SessionError::Closed),
            SessionState::Opening => {}
        }
        loop {
            match events.recv().await {
                Ok(SessionEvent::Ready) => return Ok(()),
                Ok(SessionEvent::End) => return Err(SessionError::Closed),
                Ok(SessionEvent::Error { .. }) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    if self.state() >= SessionState::Ready {
                        return Ok(());
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return Err(SessionError::Closed),
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// Which side of the connection this session is.
    pub fn role(&self) -> SessionRole {
        self.inner.sequence.role()
    }

    /// Number of requests currently awaiting replies.
    pub fn pending_requests(&self) -> usize {
        self.inner.requests.len()
    }
}

impl SessionInner {
    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.state() >= SessionState::Closing {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; events are advisory.
        let _ = self.events.send(event);
    }

    /// Read-loop task: drain parser events into dispatch until the
    /// stream ends or breaks.
    async fn drive<R>(inner: Arc<SessionInner>, reader: R)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        if inner.sequence.role() == SessionRole::Instigator {
            if let Err(err) = inner.send_frame(Frame::empty(FrameType::Handshake, 0)).await {
                error!(%err, "failed to send handshake");
                inner.emit(SessionEvent::Error {
                    message: format!("failed to send handshake: {err}"),
                });
                inner.finish().await;
                return;
            }
        }

        let mut parser = FrameParser::new(
            BufReader::new(reader),
            inner.config.max_frame_payload,
        );

        loop {
            match parser.next_event().await {
                Ok(Some(event)) => {
                    if let Some(id) = event.frame_id() {
                        inner.sequence.observe(id);
                    }
                    Self::handle_event(&inner, event).await;
                }
                Ok(None) => {
                    debug!("peer ended the stream");
                    break;
                }
                Err(err) => {
                    warn!(%err, "session read failed");
                    inner.emit(SessionEvent::Error {
                        message: err.to_string(),
                    });
                    break;
                }
            }
        }

        inner.finish().await;
    }

    async fn finish(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.set_state(SessionState::Closed);
        if self.requests.is_empty() {
            debug!("session closed");
        } else {
            // Their callers see the channels drop as SessionClosed.
            debug!(abandoned = self.requests.len(), "session closed with requests in flight");
        }
        self.emit(SessionEvent::End);
    }

    async fn handle_event(inner: &Arc<Self>, event: FrameEvent) {
        match event {
            FrameEvent::Handshake => inner.handle_handshake().await,
            FrameEvent::Json { id, payload } => Self::handle_json(inner, id, &payload).await,
            FrameEvent::BufferChunk { id, bytes } => inner.handle_chunk(id, &bytes).await,
            FrameEvent::BufferEnd { id } => inner.handle_terminator(id).await,
            FrameEvent::ProtocolFail { id, code, message } => inner.fail(id, code, message).await,
        }
    }

    async fn handle_handshake(&self) {
        if self.state() != SessionState::Opening {
            trace!("handshake after ready, ignoring");
            return;
        }
        if self.sequence.role() == SessionRole::Acceptor {
            if let Err(err) = self.send_frame(Frame::empty(FrameType::Handshake, 0)).await {
                error!(%err, "failed to answer handshake");
                self.emit(SessionEvent::Error {
                    message: format!("failed to answer handshake: {err}"),
                });
                return;
            }
        }
        self.set_state(SessionState::Ready);
        debug!(role = ?self.sequence.role(), "session ready");
        self.emit(SessionEvent::Ready);
    }

    async fn handle_json(inner: &Arc<Self>, id: u32, payload: &[u8]) {
        match Incoming::parse(id, payload) {
            Ok(Incoming::Request { method, params }) => {
                Self::dispatch_request(inner, id, method, params).await;
            }
            Ok(Incoming::Notification { method, params }) => {
                Self::dispatch_request(inner, 0, method, params).await;
            }
            Ok(Incoming::Success { result }) => {
                inner.complete(id, Ok(Reply::Json(result))).await;
            }
            Ok(Incoming::Failure { code, message }) => {
                inner.complete(id, Err(CallError::Remote { code, message })).await;
            }
            Err(violation) => {
                inner.fail(id, violation.code, violation.message).await;
            }
        }
    }

    async fn dispatch_request(inner: &Arc<Self>, id: u32, method: String, params: Value) {
        let handler = inner.methods.get(&method).map(|entry| Arc::clone(entry.value()));
        match handler {
            Some(handler) => {
                trace!(id, method = %method, "dispatching request");
                let responder = Responder::new(
                    Session {
                        inner: Arc::clone(inner),
                    },
                    id,
                );
                tokio::spawn(async move {
                    handler.handle(params, responder).await;
                });
            }
            None => {
                inner
                    .fail(
                        id,
                        error_codes::METHOD_NOT_FOUND,
                        format!("Method {method} not found."),
                    )
                    .await;
            }
        }
    }

    async fn handle_chunk(&self, id: u32, bytes: &[u8]) {
        let appended = self.streams.lock().await.append(id, bytes);
        if let Err(overflow) = appended {
            self.fail(id, error_codes::INVALID, overflow.to_string()).await;
        }
    }

    async fn handle_terminator(&self, id: u32) {
        let reassembled = self.streams.lock().await.complete(id);
        match reassembled {
            Some(bytes) => self.complete(id, Ok(Reply::Binary(bytes))).await,
            None => {
                self.fail(
                    id,
                    error_codes::INVALID,
                    "Final packet for unknown stream".to_string(),
                )
                .await;
            }
        }
    }

    /// Deliver a reply outcome to the pending call at `id`.
    ///
    /// A success for an unknown id means the two sides disagree about
    /// what is in flight, which the peer must hear about. An *error* for
    /// an unknown id is dropped without a sound: answering it would start
    /// an error loop between two already-desynced peers.
    async fn complete(&self, id: u32, outcome: CallResult<Reply>) {
        match self.requests.take(id) {
            Some(pending) => {
                let waited = Utc::now().signed_duration_since(pending.created_at);
                debug!(
                    id,
                    method = %pending.method,
                    waited_ms = waited.num_milliseconds(),
                    "correlating reply"
                );
                if !pending.resolve(outcome) {
                    trace!(id, "caller abandoned the completion");
                }
            }
            None => match outcome {
                Ok(_) => {
                    self.fail(
                        id,
                        error_codes::INTERNAL,
                        "No callback for id".to_string(),
                    )
                    .await;
                }
                Err(err) => {
                    trace!(id, %err, "dropping error reply for unknown id");
                }
            },
        }
    }

    /// The failure funnel.
    ///
    /// With a reply id the failure goes out on the wire as an error
    /// reply. Without one there is nobody to tell: internal failures
    /// escalate to the host as fatal, anything else is noise and is
    /// swallowed. If sending the error reply itself fails we only log;
    /// failing on failure is how error loops start.
    pub(super) async fn fail(&self, id: u32, code: i32, message: String) {
        if id == 0 {
            if code == error_codes::INTERNAL {
                error!(%message, "fatal session failure");
                self.emit(SessionEvent::Error { message });
            } else {
                trace!(code, %message, "swallowing failure without a reply id");
            }
            return;
        }

        warn!(id, code, %message, "sending error reply");
        let body = ErrorBody::new(code, message);
        match serde_json::to_vec(&body) {
            Ok(json) => {
                if let Err(err) = self
                    .send_frame(Frame::with_payload(FrameType::Json, id, json))
                    .await
                {
                    warn!(id, %err, "failed to send error reply");
                }
            }
            Err(err) => {
                warn!(id, %err, "failed to encode error reply");
            }
        }
    }

    async fn send_reply(&self, id: u32, payload: Reply) -> SessionResult<()> {
        match payload {
            Reply::Json(value) => {
                let body = serde_json::to_vec(&ResultBody::new(value))?;
                self.send_frame(Frame::with_payload(FrameType::Json, id, body))
                    .await
            }
            Reply::Binary(bytes) => {
                // TODO: stream binary replies chunk by chunk instead of
                // buffering; the wire format already supports it.
                self.send_frames([
                    Frame::with_payload(FrameType::BufferResponse, id, bytes),
                    Frame::empty(FrameType::BufferResponse, id),
                ])
                .await
            }
        }
    }

    async fn send_frame(&self, frame: Frame) -> SessionResult<()> {
        self.send_frames([frame]).await
    }

    /// Write frames back to back under one writer lock.
    ///
    /// A reply and its buffer terminator must be adjacent and ordered on
    /// the wire; taking the lock once per batch is what guarantees it.
    async fn send_frames(&self, frames: impl IntoIterator<Item = Frame>) -> SessionResult<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SessionError::Closed)?;
        for frame in frames {
            let encoded = frame.encode();
            trace!(
                frame_type = %frame.header.frame_type,
                id = frame.header.id,
                len = frame.header.length,
                "writing frame"
            );
            writer.write_all(&encoded).await?;
        }
        writer.flush().await?;
        Ok(())
    }
}
