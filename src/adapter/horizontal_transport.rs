//! The pub/sub bus contract (§4.7): connect/disconnect, subscribe to the
//! broker's single bus channel, publish, and an inbound callback. Kept
//! generic so Redis is a plug-in rather than baked into the adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// A fan-out broadcast relayed across nodes (§4.6 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastMessage {
    pub app_id: String,
    pub event: String,
    pub channel: String,
    pub data: String,
    pub except: Option<String>,
    pub origin: Uuid,
}

/// A cross-node metrics query (§4.8's aggregation for multi-node
/// deployments).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    pub request_id: Uuid,
    pub app_id: String,
    pub origin: Uuid,
    pub kind: RequestKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum RequestKind {
    ConnectionCount,
    ChannelSocketCount { channel: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseBody {
    pub request_id: Uuid,
    pub origin: Uuid,
    pub count: usize,
}

/// A command broadcast to every node, e.g. terminate-user-connections
/// (§4.8's `terminate_connections`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminateCommand {
    pub app_id: String,
    pub user_id: String,
    pub origin: Uuid,
}

/// Every message shape that can cross the bus, tagged so a single
/// subscriber loop can dispatch on receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BusMessage {
    Broadcast(BroadcastMessage),
    Request(RequestBody),
    Response(ResponseBody),
    Terminate(TerminateCommand),
}

#[async_trait]
pub trait HorizontalTransport: Send + Sync {
    /// Connects (or reconnects) and starts the subscriber loop, invoking
    /// `on_message` for each inbound `BusMessage`. Reconnection policy is
    /// the transport's own responsibility (§4.7). `on_fatal` is invoked if
    /// the transport gives up reconnecting within its configured deadline
    /// (§7's Fatal kind) — it never returns an `Err` for that condition
    /// since by the time it happens `connect()` itself has long since
    /// returned `Ok`.
    async fn connect(
        &self,
        on_message: Box<dyn Fn(BusMessage) + Send + Sync>,
        on_fatal: Box<dyn Fn() + Send + Sync>,
    ) -> Result<()>;

    async fn publish(&self, message: BusMessage) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;
}

/// Bus-level configuration (§6.6's `scaling` block).
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub channel: String,
    pub request_timeout: std::time::Duration,
    pub reconnect_timeout: std::time::Duration,
    pub publish_queue_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            channel: "wavecast".to_string(),
            request_timeout: std::time::Duration::from_millis(500),
            reconnect_timeout: std::time::Duration::from_secs(60),
            publish_queue_capacity: 10_000,
        }
    }
}
