//! Per-app registry of connections and channel subscription data (§3, §4.2).
//!
//! Presence membership is deliberately not stored as its own map: it is
//! derived on demand from the per-channel subscription records, which is the
//! only way to guarantee the view can never drift from the subscriptions
//! that back it (§3's "PresenceMembership: derived view").

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::channel::ChannelType;
use crate::websocket::{SocketId, WebSocketRef};

/// A single subscription binding a connection to a channel (§3's
/// `ChannelConnection`).
#[derive(Debug, Clone)]
pub struct ChannelConnection {
    pub socket_id: SocketId,
    pub user_id: Option<String>,
    pub user_info: Option<Value>,
}

/// One channel's live subscriber set. Destroyed by the owning `Namespace`
/// once its last subscription is removed (§3).
pub struct ChannelState {
    pub name: String,
    pub channel_type: ChannelType,
    connections: DashMap<SocketId, ChannelConnection>,
}

impl ChannelState {
    fn new(name: String) -> Self {
        let channel_type = ChannelType::from_name(&name);
        Self {
            name,
            channel_type,
            connections: DashMap::new(),
        }
    }

    pub fn add(&self, conn: ChannelConnection) {
        self.connections.insert(conn.socket_id.clone(), conn);
    }

    pub fn remove(&self, socket_id: &SocketId) -> Option<ChannelConnection> {
        self.connections.remove(socket_id).map(|(_, v)| v)
    }

    pub fn contains(&self, socket_id: &SocketId) -> bool {
        self.connections.contains_key(socket_id)
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn subscription_count(&self) -> usize {
        self.connections.len()
    }

    pub fn socket_ids(&self) -> Vec<SocketId> {
        self.connections.iter().map(|e| e.key().clone()).collect()
    }

    pub fn user_id_for(&self, socket_id: &SocketId) -> Option<String> {
        self.connections.get(socket_id).and_then(|e| e.value().user_id.clone())
    }

    /// Derived presence view (§3, §4.4). Uniqueness by `user_id`; a
    /// connection without `user_id` is an invariant violation — it is
    /// logged and excluded (§9's "Open questions" adopts the "surface an
    /// empty view defensively" reading for the degenerate all-anonymous
    /// case, but a single bad subscription merely drops out here, which is
    /// the behavior that makes partial corruption visible rather than
    /// hidden).
    pub fn presence_members(&self) -> Vec<(String, Option<Value>)> {
        let mut seen = std::collections::HashSet::new();
        let mut members = Vec::new();
        for entry in self.connections.iter() {
            match &entry.value().user_id {
                Some(user_id) => {
                    if seen.insert(user_id.clone()) {
                        members.push((user_id.clone(), entry.value().user_info.clone()));
                    }
                }
                None => {
                    warn!(channel = %self.name, socket_id = %entry.key(), "presence subscription missing user_id");
                }
            }
        }
        members
    }

    /// Whether `user_id` is represented by any subscription other than
    /// `excluding` (used to decide whether a join is the user's first
    /// connection to this channel, §4.4 step 1).
    pub fn user_represented(&self, user_id: &str, excluding: Option<&SocketId>) -> bool {
        self.connections.iter().any(|e| {
            Some(e.key()) != excluding && e.value().user_id.as_deref() == Some(user_id)
        })
    }
}

/// The payload most recently broadcast externally on a cache channel
/// (§3's `CachePayload`). `data` is already the stringified JSON the
/// broker will replay verbatim.
#[derive(Debug, Clone)]
pub struct CachedPayload {
    pub event: String,
    pub data: String,
}

/// One application's live state: connected sockets and channel subscription
/// data. One `Namespace` per `App`, held for the lifetime of the process.
pub struct Namespace {
    sockets: DashMap<SocketId, WebSocketRef>,
    channels: DashMap<String, Arc<ChannelState>>,
    cache: moka::future::Cache<String, CachedPayload>,
}

impl Namespace {
    pub fn new() -> Self {
        Self {
            sockets: DashMap::new(),
            channels: DashMap::new(),
            cache: moka::future::Cache::builder()
                .time_to_live(Duration::from_secs(30 * 60))
                .max_capacity(10_000)
                .build(),
        }
    }

    pub fn add_socket(&self, ws: WebSocketRef) {
        self.sockets.insert(ws.socket_id().clone(), ws);
    }

    pub fn remove_socket(&self, socket_id: &SocketId) -> Option<WebSocketRef> {
        self.sockets.remove(socket_id).map(|(_, v)| v)
    }

    pub fn get_socket(&self, socket_id: &SocketId) -> Option<WebSocketRef> {
        self.sockets.get(socket_id).map(|e| e.value().clone())
    }

    pub fn connection_count(&self) -> usize {
        self.sockets.len()
    }

    pub fn all_sockets(&self) -> Vec<WebSocketRef> {
        self.sockets.iter().map(|e| e.value().clone()).collect()
    }

    pub fn find_channel(&self, name: &str) -> Option<Arc<ChannelState>> {
        self.channels.get(name).map(|e| e.value().clone())
    }

    /// Finds the channel or creates it (§4.5.1 step 2). Creation emits
    /// `ChannelCreated` (§4.3) as a structured log — there is no separate
    /// event bus for this domain event, just the same tracing pipeline
    /// everything else in the broker logs through.
    pub fn find_or_create_channel(&self, name: &str) -> Arc<ChannelState> {
        self.channels
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(channel = %name, "ChannelCreated");
                Arc::new(ChannelState::new(name.to_string()))
            })
            .clone()
    }

    /// Removes the channel from the registry if it is empty, emitting
    /// `ChannelRemoved` (§4.3). Idempotent, and safe to call speculatively
    /// after any unsubscribe (§3, §4.3).
    pub fn remove_channel_if_empty(&self, name: &str) {
        if let Some(channel) = self.channels.get(name) {
            if channel.is_empty() {
                drop(channel);
                if self.channels.remove(name).is_some() {
                    debug!(channel = %name, "ChannelRemoved");
                }
            }
        }
    }

    pub fn channels(&self) -> Vec<Arc<ChannelState>> {
        self.channels.iter().map(|e| e.value().clone()).collect()
    }

    pub fn channel_names_with_prefix(&self, prefix: Option<&str>) -> Vec<String> {
        self.channels
            .iter()
            .filter(|e| prefix.is_none_or(|p| e.key().starts_with(p)))
            .map(|e| e.key().clone())
            .collect()
    }

    pub async fn cached_payload(&self, channel: &str) -> Option<CachedPayload> {
        self.cache.get(channel).await
    }

    /// Overwritten on each external broadcast; never touched for internal
    /// broadcasts such as presence member events (§3, §4.4).
    pub async fn store_cached_payload(&self, channel: &str, payload: CachedPayload) {
        self.cache.insert(channel.to_string(), payload).await;
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn socket(n: u32) -> SocketId {
        SocketId::from(format!("{n}.{n}"))
    }

    #[test]
    fn presence_members_are_unique_by_user_id() {
        let channel = ChannelState::new("presence-room".to_string());
        channel.add(ChannelConnection {
            socket_id: socket(1),
            user_id: Some("u1".to_string()),
            user_info: Some(json!({"name": "Alice"})),
        });
        // A second connection for the same user (multi-device) must still
        // count once (§8, invariant 2).
        channel.add(ChannelConnection {
            socket_id: socket(2),
            user_id: Some("u1".to_string()),
            user_info: Some(json!({"name": "Alice"})),
        });
        channel.add(ChannelConnection {
            socket_id: socket(3),
            user_id: Some("u2".to_string()),
            user_info: Some(json!({"name": "Bob"})),
        });

        let members = channel.presence_members();
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn anonymous_presence_subscription_is_excluded_and_logged() {
        let channel = ChannelState::new("presence-room".to_string());
        channel.add(ChannelConnection {
            socket_id: socket(1),
            user_id: None,
            user_info: None,
        });
        assert!(channel.presence_members().is_empty());
    }

    #[test]
    fn user_represented_excludes_the_given_socket() {
        let channel = ChannelState::new("presence-room".to_string());
        channel.add(ChannelConnection {
            socket_id: socket(1),
            user_id: Some("u1".to_string()),
            user_info: None,
        });
        assert!(!channel.user_represented("u1", Some(&socket(1))));
        assert!(channel.user_represented("u1", Some(&socket(2))));
        assert!(channel.user_represented("u1", None));
    }

    #[test]
    fn channel_removed_from_registry_once_empty() {
        let namespace = Namespace::new();
        let channel = namespace.find_or_create_channel("chat");
        channel.add(ChannelConnection {
            socket_id: socket(1),
            user_id: None,
            user_info: None,
        });
        namespace.remove_channel_if_empty("chat");
        assert!(namespace.find_channel("chat").is_some());

        channel.remove(&socket(1));
        namespace.remove_channel_if_empty("chat");
        assert!(namespace.find_channel("chat").is_none());
    }

    #[tokio::test]
    async fn external_broadcast_updates_cache_but_internal_does_not() {
        let namespace = Namespace::new();
        namespace
            .store_cached_payload(
                "cache-weather",
                CachedPayload {
                    event: "weather-update".to_string(),
                    data: r#"{"temp":70}"#.to_string(),
                },
            )
            .await;
        let cached = namespace.cached_payload("cache-weather").await.unwrap();
        assert_eq!(cached.data, r#"{"temp":70}"#);
    }
}
