//! The event dispatcher (§4.6): normalizes a channel/channels payload,
//! broadcasts locally on every matching channel, and publishes to the bus
//! so other nodes do the same.

use std::sync::Arc;

use uuid::Uuid;

use crate::adapter::horizontal_transport::{BroadcastMessage, BusMessage, HorizontalTransport, TerminateCommand};
use crate::adapter::ConnectionManager;
use crate::channel::manager::ChannelManager;
use crate::error::Result;
use crate::protocol::PusherMessage;
use crate::websocket::SocketId;

/// A normalized fan-out request (§4.6 step 1).
pub struct DispatchRequest {
    pub app_id: String,
    pub event: String,
    pub channels: Vec<String>,
    pub data: String,
    pub except: Option<SocketId>,
}

pub struct EventDispatcher {
    connections: Arc<dyn ConnectionManager>,
    bus: Option<(Arc<dyn HorizontalTransport>, Uuid)>,
}

impl EventDispatcher {
    pub fn new(connections: Arc<dyn ConnectionManager>) -> Self {
        Self { connections, bus: None }
    }

    pub fn with_bus(connections: Arc<dyn ConnectionManager>, transport: Arc<dyn HorizontalTransport>, node_id: Uuid) -> Self {
        Self {
            connections,
            bus: Some((transport, node_id)),
        }
    }

    fn channel_manager_for(&self, app_id: &str) -> ChannelManager {
        ChannelManager::new(self.connections.namespace(app_id))
    }

    /// Broadcasts locally and, if a bus is configured, publishes for other
    /// nodes (§4.6).
    pub async fn dispatch(&self, request: DispatchRequest) -> Result<()> {
        self.dispatch_synchronously(&request).await;

        if let Some((transport, node_id)) = &self.bus {
            for channel in &request.channels {
                let msg = BroadcastMessage {
                    app_id: request.app_id.clone(),
                    event: request.event.clone(),
                    channel: channel.clone(),
                    data: request.data.clone(),
                    except: request.except.as_ref().map(|s| s.as_str().to_string()),
                    origin: *node_id,
                };
                transport.publish(BusMessage::Broadcast(msg)).await?;
            }
        }
        Ok(())
    }

    /// Publishes a terminate-user-connections command so peer nodes close
    /// their own local connections for this user (§4.8).
    pub async fn publish_terminate(&self, app_id: &str, user_id: &str) -> Result<()> {
        if let Some((transport, node_id)) = &self.bus {
            transport
                .publish(BusMessage::Terminate(TerminateCommand {
                    app_id: app_id.to_string(),
                    user_id: user_id.to_string(),
                    origin: *node_id,
                }))
                .await?;
        }
        Ok(())
    }

    /// Local-only fan-out. Used directly by the incoming bus handler to
    /// avoid re-publishing what it just received (§4.7).
    pub async fn dispatch_synchronously(&self, request: &DispatchRequest) {
        let manager = self.channel_manager_for(&request.app_id);
        for channel in &request.channels {
            let message = PusherMessage::event(request.event.clone(), channel.clone(), request.data.clone());
            manager
                .broadcast_external(channel, &message, request.except.as_ref())
                .await;
        }
    }
}
