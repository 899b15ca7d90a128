//! Per-connection state and the liveness state machine (§3, §4.1).

mod socket_id;

pub use socket_id::SocketId;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use fastwebsockets::{Frame, OpCode, WebSocketWrite};
use hyper_util::rt::TokioIo;
use tokio::io::WriteHalf;
use tokio::sync::Mutex;
use tracing::debug;

use crate::app::App;
use crate::protocol::PusherMessage;

type SplitSink = WebSocketWrite<WriteHalf<TokioIo<hyper::upgrade::Upgraded>>>;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the Unix epoch")
        .as_secs()
}

/// The three liveness states from §3, derived from `last_seen_at` /
/// `has_been_pinged` rather than stored directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessState {
    Active,
    Inactive,
    Stale,
}

/// The write half plus the atomics the sweep task and the reader task both
/// touch. Split out from `WebSocket` so it can be cheaply cloned into the
/// namespace's subscriber maps without cloning the socket itself (§4.2:
/// concurrent broadcast reads alongside subscribe/unsubscribe writes).
pub struct ConnectionState {
    pub socket_id: SocketId,
    pub app: Arc<App>,
    pub origin: String,
    last_seen_at: AtomicU64,
    has_been_pinged: AtomicBool,
    uses_control_frames: bool,
    violations: std::sync::atomic::AtomicU32,
}

impl ConnectionState {
    pub fn new(socket_id: SocketId, app: Arc<App>, origin: String, uses_control_frames: bool) -> Self {
        Self {
            socket_id,
            app,
            origin,
            last_seen_at: AtomicU64::new(now_secs()),
            has_been_pinged: AtomicBool::new(false),
            uses_control_frames,
            violations: std::sync::atomic::AtomicU32::new(0),
        }
    }

    /// Records a protocol violation (oversize or malformed frame) and
    /// returns the running count for this connection. Repeated violations
    /// terminate the connection (§7: "Protocol violation... repeated
    /// violations within one connection terminate the connection").
    pub fn record_violation(&self) -> u32 {
        self.violations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Marks the connection active and clears the ping flag (§4.1). Called
    /// on every inbound frame, including `pusher:pong`.
    pub fn touch(&self) {
        self.last_seen_at.store(now_secs(), Ordering::Release);
        self.has_been_pinged.store(false, Ordering::Release);
    }

    /// Records that a ping was sent without marking the connection as seen.
    pub fn mark_pinged(&self) {
        self.has_been_pinged.store(true, Ordering::Release);
    }

    pub fn has_been_pinged(&self) -> bool {
        self.has_been_pinged.load(Ordering::Acquire)
    }

    pub fn last_seen_at(&self) -> u64 {
        self.last_seen_at.load(Ordering::Acquire)
    }

    pub fn liveness(&self) -> LivenessState {
        let elapsed = now_secs().saturating_sub(self.last_seen_at());
        if elapsed < self.app.ping_interval {
            LivenessState::Active
        } else if !self.has_been_pinged() {
            LivenessState::Inactive
        } else {
            LivenessState::Stale
        }
    }

    pub fn is_active(&self) -> bool {
        self.liveness() == LivenessState::Active
    }

    pub fn is_inactive(&self) -> bool {
        self.liveness() == LivenessState::Inactive
    }

    pub fn is_stale(&self) -> bool {
        self.liveness() == LivenessState::Stale
    }
}

/// Wraps one live socket: the raw split-sink plus shared liveness state.
/// Sends are serialized behind a `Mutex` since `fastwebsockets`' write half
/// is not `Sync` for concurrent frame writes (mirrors the teacher's
/// `Arc<Mutex<WebSocketWrite<...>>>` pattern for the connection's sink).
pub struct WebSocket {
    pub state: Arc<ConnectionState>,
    sink: Mutex<SplitSink>,
}

impl WebSocket {
    pub fn new(state: Arc<ConnectionState>, sink: SplitSink) -> Self {
        Self {
            state,
            sink: Mutex::new(sink),
        }
    }

    pub fn socket_id(&self) -> &SocketId {
        &self.state.socket_id
    }

    /// Sends a message. A send on an already-closed socket is logged and
    /// swallowed (§4.1: never propagates as an error to callers).
    pub async fn send(&self, message: &PusherMessage) {
        let bytes = match message.to_bytes() {
            Ok(b) => b,
            Err(e) => {
                debug!(error = %e, "failed to encode outbound message");
                return;
            }
        };
        self.send_raw(bytes).await;
    }

    pub async fn send_raw(&self, bytes: Vec<u8>) {
        let frame = Frame::text(Bytes::from(bytes).into());
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.write_frame(frame).await {
            debug!(socket_id = %self.state.socket_id, error = %e, "send on closed or broken connection");
        }
    }

    pub async fn ping(&self) {
        self.state.mark_pinged();
        if self.state.uses_control_frames {
            let mut sink = self.sink.lock().await;
            let _ = sink.write_frame(Frame::new(true, OpCode::Ping, None, Vec::new().into())).await;
        } else {
            self.send(&PusherMessage::ping()).await;
        }
    }

    /// Idempotent: closing a closed socket is a no-op.
    pub async fn terminate(&self) {
        let mut sink = self.sink.lock().await;
        let _ = sink.write_frame(Frame::close(1000, b"")).await;
    }
}

/// A cheaply-cloneable handle to a live connection, stored in the
/// namespace's subscriber maps.
pub type WebSocketRef = Arc<WebSocket>;
