//! Subscribe/unsubscribe orchestration and broadcast fan-out (§4.3, §4.4).

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use crate::app::App;
use crate::error::{Error, Result};
use crate::namespace::{CachedPayload, ChannelConnection, ChannelState, Namespace};
use crate::protocol::{error_codes, PusherMessage};
use crate::token::Token;
use crate::websocket::{SocketId, WebSocketRef};

use super::ChannelType;

/// Outcome of a subscribe attempt, used by the event handler (§4.5.1) to
/// decide whether to send cached-payload/cache-miss follow-ups.
pub struct SubscribeOutcome {
    pub channel_type: ChannelType,
}

pub struct ChannelManager {
    namespace: Arc<Namespace>,
}

impl ChannelManager {
    pub fn new(namespace: Arc<Namespace>) -> Self {
        Self { namespace }
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// Builds the HMAC signature string for a subscribe/auth check:
    /// `"{socket_id}:{channel}[:{channel_data}]"` (§4.4).
    fn signature_string(socket_id: &SocketId, channel: &str, channel_data: Option<&str>) -> String {
        match channel_data {
            Some(data) => format!("{socket_id}:{channel}:{data}"),
            None => format!("{socket_id}:{channel}"),
        }
    }

    /// Sends the 4009 wire error for a failed subscription auth check,
    /// routed through `Error::protocol_error_code` so that mapping has a
    /// real caller instead of sitting unused (§4.4).
    async fn send_unauthorized(&self, ws: &WebSocketRef, channel_name: &str) {
        let code = Error::Auth("subscription unauthorized".to_string())
            .protocol_error_code()
            .unwrap_or(error_codes::UNAUTHORIZED);
        ws.send(&PusherMessage::error(
            code,
            "Connection unauthorized".to_string(),
            Some(channel_name.to_string()),
        ))
        .await;
    }

    /// §4.5.1 + §4.4. On authorization failure, sends `pusher:error` 4009
    /// itself and returns `Ok(None)` (the caller should not also log/act —
    /// abort is silent past this point, per §4.4's "no membership
    /// recorded"). Malformed shape is a protocol violation (4007),
    /// returned the same way.
    pub async fn subscribe(
        &self,
        ws: &WebSocketRef,
        app: &App,
        channel_name: &str,
        auth: Option<&str>,
        channel_data_raw: Option<&str>,
    ) -> Result<Option<SubscribeOutcome>> {
        let channel_type = ChannelType::from_name(channel_name);
        let socket_id = ws.socket_id().clone();

        let mut user_id = None;
        let mut user_info = None;

        if channel_type.requires_auth() {
            let auth = match auth {
                Some(a) => a,
                None => {
                    self.send_unauthorized(ws, channel_name).await;
                    return Ok(None);
                }
            };
            let token = Token::new(app.key.clone(), app.secret.clone());
            let expected_signature_input = Self::signature_string(&socket_id, channel_name, channel_data_raw);
            let provided_signature = auth.split_once(':').map(|(_, sig)| sig).unwrap_or(auth);
            if !token.verify(&expected_signature_input, provided_signature) {
                self.send_unauthorized(ws, channel_name).await;
                return Ok(None);
            }
        }

        if channel_type.is_presence() {
            let data = channel_data_raw.ok_or_else(|| {
                Error::InvalidMessageFormat("presence subscribe missing channel_data".to_string())
            })?;
            let parsed: Value = serde_json::from_str(data)
                .map_err(|e| Error::InvalidMessageFormat(format!("channel_data is not valid JSON: {e}")))?;
            let id = parsed
                .get("user_id")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::InvalidMessageFormat("channel_data missing user_id".to_string()))?;
            user_id = Some(id.to_string());
            user_info = parsed.get("user_info").cloned();
        } else if let Some(data) = channel_data_raw {
            serde_json::from_str::<Value>(data)
                .map_err(|e| Error::InvalidMessageFormat(format!("channel_data is not valid JSON: {e}")))?;
        }

        let channel = self.namespace.find_or_create_channel(channel_name);

        let is_new_user = user_id
            .as_deref()
            .map(|id| !channel.user_represented(id, Some(&socket_id)))
            .unwrap_or(false);

        channel.add(ChannelConnection {
            socket_id: socket_id.clone(),
            user_id: user_id.clone(),
            user_info: user_info.clone(),
        });

        ws.send(&PusherMessage::subscription_succeeded(
            channel_name.to_string(),
            &Self::channel_data(&channel),
        ))
        .await;

        if channel_type.is_presence() {
            if let (true, Some(id)) = (is_new_user, user_id.as_deref()) {
                self.broadcast_internal(
                    channel_name,
                    &PusherMessage::member_added(channel_name.to_string(), id, user_info.as_ref().unwrap_or(&Value::Null)),
                    Some(&socket_id),
                )
                .await;
            }
        }

        Ok(Some(SubscribeOutcome { channel_type }))
    }

    pub async fn unsubscribe(&self, socket_id: &SocketId, channel_name: &str) {
        let Some(channel) = self.namespace.find_channel(channel_name) else {
            return;
        };
        let removed = channel.remove(socket_id);

        if channel.channel_type.is_presence() {
            if let Some(ChannelConnection { user_id: Some(user_id), .. }) = removed {
                if !channel.user_represented(&user_id, None) {
                    self.broadcast_internal(
                        channel_name,
                        &PusherMessage::member_removed(channel_name.to_string(), &user_id),
                        None,
                    )
                    .await;
                }
            }
        }

        self.namespace.remove_channel_if_empty(channel_name);
    }

    /// Removes `socket_id` from every channel it subscribed to (connection
    /// close, §3's "Ownership").
    pub async fn unsubscribe_all(&self, socket_id: &SocketId) {
        let names: Vec<String> = self
            .namespace
            .channels()
            .iter()
            .filter(|c| c.contains(socket_id))
            .map(|c| c.name.clone())
            .collect();
        for name in names {
            self.unsubscribe(socket_id, &name).await;
        }
    }

    /// An externally-originated broadcast (admin API or a client event):
    /// fans out, then — for cache channels only — stores the payload
    /// (§4.4's "Cache channels" invariant).
    pub async fn broadcast_external(&self, channel_name: &str, message: &PusherMessage, except: Option<&SocketId>) {
        self.fan_out(channel_name, message, except).await;

        let channel_type = ChannelType::from_name(channel_name);
        if channel_type.is_cache() {
            if let Some(data) = &message.data {
                self.namespace
                    .store_cached_payload(
                        channel_name,
                        CachedPayload {
                            event: message.event.clone(),
                            data: data.clone(),
                        },
                    )
                    .await;
            }
        }
    }

    /// Internal broadcasts (presence member events) MUST NOT update the
    /// cache (§3, §9's "member_removed... must use internal broadcast").
    pub async fn broadcast_internal(&self, channel_name: &str, message: &PusherMessage, except: Option<&SocketId>) {
        self.fan_out(channel_name, message, except).await;
    }

    async fn fan_out(&self, channel_name: &str, message: &PusherMessage, except: Option<&SocketId>) {
        let Some(channel) = self.namespace.find_channel(channel_name) else {
            return;
        };
        for socket_id in channel.socket_ids() {
            if Some(&socket_id) == except {
                continue;
            }
            if let Some(ws) = self.namespace.get_socket(&socket_id) {
                ws.send(message).await;
            } else {
                warn!(channel = channel_name, %socket_id, "dangling subscription for disconnected socket");
            }
        }
    }

    /// Channel-type-specific subscription-success payload (§4.3's `data()`).
    fn channel_data(channel: &ChannelState) -> Value {
        if channel.channel_type.is_presence() {
            let members = channel.presence_members();
            let ids: Vec<&str> = members.iter().map(|(id, _)| id.as_str()).collect();
            let hash: serde_json::Map<String, Value> = members
                .iter()
                .map(|(id, info)| (id.clone(), info.clone().unwrap_or(Value::Null)))
                .collect();
            json!({ "presence": { "count": members.len(), "ids": ids, "hash": hash } })
        } else {
            json!({})
        }
    }
}
