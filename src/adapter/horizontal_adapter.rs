//! Adds a pub/sub bus on top of `LocalAdapter`: local broadcasts are
//! published with an origin tag so other nodes can apply them, and incoming
//! broadcasts tagged with this node's id are dropped (§4.6, §4.7, §9).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tracing::{info, warn};
use uuid::Uuid;

use crate::channel::manager::ChannelManager;
use crate::error::Result;
use crate::namespace::Namespace;
use crate::protocol::PusherMessage;

use super::horizontal_transport::{
    BroadcastMessage, BusMessage, HorizontalTransport, RequestBody, RequestKind, ResponseBody, TerminateCommand,
    TransportConfig,
};
use super::local_adapter::LocalAdapter;
use super::ConnectionManager;

struct PendingRequest {
    responses: Mutex<Vec<ResponseBody>>,
    notify: Notify,
}

/// Wraps `LocalAdapter` with a bus connection. Generic over the transport
/// so Redis is one implementation among possible others (§4.7).
pub struct HorizontalAdapter<T: HorizontalTransport> {
    local: LocalAdapter,
    transport: Arc<T>,
    config: TransportConfig,
    node_id: Uuid,
    pending: dashmap::DashMap<Uuid, Arc<PendingRequest>>,
}

impl<T: HorizontalTransport + 'static> HorizontalAdapter<T> {
    pub fn new(transport: Arc<T>, config: TransportConfig) -> Self {
        Self {
            local: LocalAdapter::new(),
            transport,
            config,
            node_id: Uuid::new_v4(),
            pending: dashmap::DashMap::new(),
        }
    }

    pub fn node_id(&self) -> Uuid {
        self.node_id
    }

    pub fn transport(&self) -> Arc<T> {
        self.transport.clone()
    }

    /// Publishes a broadcast already applied locally, tagged with this
    /// node's id (§4.6 step 3).
    pub async fn publish_broadcast(&self, msg: BroadcastMessage) -> Result<()> {
        self.transport.publish(BusMessage::Broadcast(msg)).await
    }

    pub async fn publish_terminate(&self, app_id: String, user_id: String) -> Result<()> {
        self.transport
            .publish(BusMessage::Terminate(TerminateCommand {
                app_id,
                user_id,
                origin: self.node_id,
            }))
            .await
    }

    /// Aggregates a count across every node that replies within the
    /// configured deadline (§4.8: "Timeout for metrics aggregation: 500
    /// ms; missing replies are counted as zero but logged").
    pub async fn aggregate_count(&self, app_id: &str, kind: RequestKind, local_count: usize) -> usize {
        let request_id = Uuid::new_v4();
        let pending = Arc::new(PendingRequest {
            responses: Mutex::new(Vec::new()),
            notify: Notify::new(),
        });
        self.pending.insert(request_id, pending.clone());

        let request = RequestBody {
            request_id,
            app_id: app_id.to_string(),
            origin: self.node_id,
            kind,
        };
        if let Err(e) = self.transport.publish(BusMessage::Request(request)).await {
            warn!(error = %e, "failed to publish metrics request, returning local count only");
            self.pending.remove(&request_id);
            return local_count;
        }

        // Wait out the full deadline rather than returning on the first
        // reply: with more than one remote node, later responses arriving
        // within the same window would otherwise be dropped on the floor.
        let deadline = tokio::time::Instant::now() + self.config.request_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            if tokio::time::timeout(remaining, pending.notify.notified()).await.is_err() {
                break;
            }
        }
        self.pending.remove(&request_id);

        let responses = pending.responses.lock().await;
        let remote_total: usize = responses.iter().map(|r| r.count).sum();
        info!(
            request_id = %request_id,
            replies = responses.len(),
            "aggregated metrics request across nodes"
        );
        local_count + remote_total
    }

    /// Callback invoked by the transport for every inbound bus message.
    fn handle_bus_message(self: &Arc<Self>, message: BusMessage) {
        let this = self.clone();
        tokio::spawn(async move {
            match message {
                BusMessage::Broadcast(b) => {
                    if b.origin == this.node_id {
                        return;
                    }
                    let namespace = this.namespace(&b.app_id);
                    let manager = ChannelManager::new(namespace);
                    let except = b.except.map(crate::websocket::SocketId::from);
                    manager
                        .broadcast_external(
                            &b.channel,
                            &PusherMessage::event(b.event, b.channel.clone(), b.data),
                            except.as_ref(),
                        )
                        .await;
                }
                BusMessage::Request(r) => {
                    if r.origin == this.node_id {
                        return;
                    }
                    let namespace = this.namespace(&r.app_id);
                    let count = match r.kind {
                        RequestKind::ConnectionCount => namespace.connection_count(),
                        RequestKind::ChannelSocketCount { channel } => namespace
                            .find_channel(&channel)
                            .map(|c| c.subscription_count())
                            .unwrap_or(0),
                    };
                    let response = ResponseBody {
                        request_id: r.request_id,
                        origin: this.node_id,
                        count,
                    };
                    if let Err(e) = this.transport.publish(BusMessage::Response(response)).await {
                        warn!(error = %e, "failed to publish metrics response");
                    }
                }
                BusMessage::Response(resp) => {
                    if let Some(pending) = this.pending.get(&resp.request_id) {
                        pending.responses.lock().await.push(resp);
                        pending.notify.notify_one();
                    }
                }
                BusMessage::Terminate(cmd) => {
                    if cmd.origin == this.node_id {
                        return;
                    }
                    let namespace = this.namespace(&cmd.app_id);
                    for channel in namespace.channels() {
                        if !channel.channel_type.is_presence() {
                            continue;
                        }
                        for socket_id in channel.socket_ids() {
                            if let Some(ws) = namespace.get_socket(&socket_id) {
                                ws.terminate().await;
                            }
                        }
                    }
                }
            }
        });
    }

    /// Connects the bus. `on_fatal` is invoked if the transport exhausts its
    /// reconnect deadline (§4.7, §7's Fatal kind), so the broker can drain
    /// and exit rather than keep running with a dead bus.
    pub async fn start(self: Arc<Self>, on_fatal: Box<dyn Fn() + Send + Sync>) -> Result<()> {
        let callback_adapter = self.clone();
        self.transport
            .connect(Box::new(move |msg| callback_adapter.handle_bus_message(msg)), on_fatal)
            .await
    }
}

#[async_trait]
impl<T: HorizontalTransport + 'static> ConnectionManager for HorizontalAdapter<T> {
    fn namespace(&self, app_id: &str) -> Arc<Namespace> {
        self.local.namespace(app_id)
    }

    fn namespaces(&self) -> Vec<Arc<Namespace>> {
        self.local.namespaces()
    }

    async fn init(&self) -> Result<()> {
        info!(node_id = %self.node_id, "horizontal adapter registered (call start() to connect the bus)");
        Ok(())
    }
}
