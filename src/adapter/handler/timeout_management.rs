//! The periodic liveness sweep (§5), replacing a per-connection timer task
//! with one scheduler per app: cheaper at scale and the only way to keep
//! `lastSeenAt`/`hasBeenPinged` as plain atomics instead of needing a timer
//! handle per connection.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::app::App;
use crate::channel::manager::ChannelManager;

use super::ConnectionHandler;

impl ConnectionHandler {
    /// Spawns the sweep loop for one app. Each tick pings every `Inactive`
    /// connection and terminates every `Stale` one — a connection that
    /// doesn't reply to a ping is therefore pruned within the following
    /// tick, satisfying "terminated within one sweep cycle" (§8, S1).
    pub fn spawn_sweep_task(self: &Arc<Self>, app: Arc<App>) -> tokio::task::JoinHandle<()> {
        let handler = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(app.ping_interval.max(1)));
            loop {
                interval.tick().await;
                handler.sweep_once(&app).await;
            }
        })
    }

    async fn sweep_once(&self, app: &App) {
        let namespace = self.connections.namespace(&app.app_id);
        let manager = ChannelManager::new(namespace.clone());

        for ws in namespace.all_sockets() {
            if ws.state.is_stale() {
                info!(socket_id = %ws.socket_id(), app_id = %app.app_id, "pruning stale connection");
                manager.unsubscribe_all(ws.socket_id()).await;
                ws.terminate().await;
                namespace.remove_socket(ws.socket_id());
                self.metrics.mark_disconnection(&app.app_id);
            } else if ws.state.is_inactive() {
                debug!(socket_id = %ws.socket_id(), "pinging inactive connection");
                ws.ping().await;
            }
        }
    }
}
