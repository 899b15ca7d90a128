//! Wires together the app table, connection manager, dispatcher and
//! metrics into the single object the WebSocket and HTTP layers drive.

pub mod authentication;
pub mod events;
pub mod timeout_management;

use std::sync::Arc;

use crate::app::manager::AppManager;
use crate::channel::manager::ChannelManager;
use crate::dispatcher::EventDispatcher;
use crate::metrics::SharedMetrics;
use crate::adapter::ConnectionManager;

pub struct ConnectionHandler {
    pub apps: Arc<dyn AppManager + Send + Sync>,
    pub connections: Arc<dyn ConnectionManager>,
    pub dispatcher: Arc<EventDispatcher>,
    pub metrics: SharedMetrics,
}

impl ConnectionHandler {
    pub fn new(
        apps: Arc<dyn AppManager + Send + Sync>,
        connections: Arc<dyn ConnectionManager>,
        dispatcher: Arc<EventDispatcher>,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            apps,
            connections,
            dispatcher,
            metrics,
        }
    }

    pub fn channel_manager_for(&self, app_id: &str) -> ChannelManager {
        ChannelManager::new(self.connections.namespace(app_id))
    }
}
