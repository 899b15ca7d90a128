//! Inbound frame dispatch (§4.5).

use serde_json::Value;

use crate::app::App;
use crate::dispatcher::DispatchRequest;
use crate::error::{Error, Result};
use crate::protocol::{error_codes, events, InboundMessage, PusherMessage};
use crate::websocket::WebSocketRef;

use super::ConnectionHandler;

impl ConnectionHandler {
    /// The single entry point from the WebSocket read loop (§4.5).
    pub async fn handle(&self, ws: &WebSocketRef, app: &App, inbound: InboundMessage) -> Result<()> {
        ws.state.touch();

        match inbound.event.as_str() {
            events::SUBSCRIBE => self.handle_subscribe(ws, app, inbound).await,
            events::UNSUBSCRIBE => self.handle_unsubscribe(ws, app, inbound).await,
            events::PING => {
                ws.send(&PusherMessage::pong()).await;
                Ok(())
            }
            events::PONG => Ok(()),
            other if other.starts_with("client-") => self.handle_client_event(ws, app, inbound).await,
            _ => {
                ws.send(&PusherMessage::error(
                    error_codes::UNKNOWN_EVENT,
                    "Unknown event".to_string(),
                    None,
                ))
                .await;
                Ok(())
            }
        }
    }

    async fn handle_subscribe(&self, ws: &WebSocketRef, app: &App, inbound: InboundMessage) -> Result<()> {
        let data = match inbound.data.map(|d| d.into_value()).transpose() {
            Ok(v) => v,
            Err(_) => {
                self.send_invalid_payload(ws).await;
                return Ok(());
            }
        };
        let Some(Value::Object(fields)) = data else {
            self.send_invalid_payload(ws).await;
            return Ok(());
        };

        let Some(channel) = fields.get("channel").and_then(Value::as_str) else {
            self.send_invalid_payload(ws).await;
            return Ok(());
        };
        if channel.is_empty() {
            self.send_invalid_payload(ws).await;
            return Ok(());
        }

        // A field present but of the wrong type is a shape violation (4007),
        // distinct from the field being absent — collapsing both into `None`
        // via `and_then` would turn this into a spurious 4009 for channels
        // that require auth (§4.5.1 step 1).
        let auth = match fields.get("auth") {
            None => None,
            Some(Value::String(s)) => Some(s.as_str()),
            Some(_) => {
                self.send_invalid_payload(ws).await;
                return Ok(());
            }
        };
        let channel_data = match fields.get("channel_data") {
            None => None,
            Some(Value::String(s)) => Some(s.as_str()),
            Some(_) => {
                self.send_invalid_payload(ws).await;
                return Ok(());
            }
        };

        let manager = self.channel_manager_for(&app.app_id);
        match manager.subscribe(ws, app, channel, auth, channel_data).await {
            Ok(Some(outcome)) => {
                self.metrics.mark_subscribe(&app.app_id);
                if outcome.channel_type.is_cache() {
                    match manager.namespace().cached_payload(channel).await {
                        Some(cached) => {
                            ws.send(&PusherMessage::cached_payload(channel.to_string(), cached.event, cached.data))
                                .await;
                        }
                        None => ws.send(&PusherMessage::cache_miss(channel.to_string())).await,
                    }
                }
            }
            Ok(None) => {}
            Err(Error::InvalidMessageFormat(_)) => self.send_invalid_payload(ws).await,
            Err(e) => return Err(e),
        }
        Ok(())
    }

    async fn handle_unsubscribe(&self, ws: &WebSocketRef, app: &App, inbound: InboundMessage) -> Result<()> {
        let channel = inbound
            .data
            .and_then(|d| d.into_value().ok())
            .and_then(|v| v.get("channel").and_then(Value::as_str).map(str::to_string));
        if let Some(channel) = channel {
            let manager = self.channel_manager_for(&app.app_id);
            manager.unsubscribe(ws.socket_id(), &channel).await;
            self.metrics.mark_unsubscribe(&app.app_id);
        }
        Ok(())
    }

    /// §4.5.2. Silently dropped when the channel doesn't allow client
    /// events — this is normal client behavior, not a protocol violation.
    async fn handle_client_event(&self, ws: &WebSocketRef, app: &App, inbound: InboundMessage) -> Result<()> {
        let Some(channel) = &inbound.channel else {
            return Ok(());
        };
        if channel.is_empty() {
            return Ok(());
        }
        let channel_type = crate::channel::ChannelType::from_name(channel);
        if !channel_type.allows_client_events() {
            return Ok(());
        }
        let manager = self.channel_manager_for(&app.app_id);
        let Some(chan) = manager.namespace().find_channel(channel) else {
            return Ok(());
        };
        if !chan.contains(ws.socket_id()) {
            return Ok(());
        }

        let Some(data) = inbound.data else {
            return Ok(());
        };
        let raw_data = match &data {
            crate::protocol::MessageData::String(s) => s.clone(),
            crate::protocol::MessageData::Json(v) => v.to_string(),
        };

        self.dispatcher
            .dispatch(DispatchRequest {
                app_id: app.app_id.clone(),
                event: inbound.event,
                channels: vec![channel.clone()],
                data: raw_data,
                except: Some(ws.socket_id().clone()),
            })
            .await?;
        Ok(())
    }

    async fn send_invalid_payload(&self, ws: &WebSocketRef) {
        let code = Error::InvalidMessageFormat("malformed frame".to_string())
            .protocol_error_code()
            .unwrap_or(error_codes::INVALID_PAYLOAD);
        ws.send(&PusherMessage::error(code, "Invalid payload".to_string(), None)).await;
    }
}
