//! The Pusher wire envelope (§6.2, §6.3). Inbound frames may carry `data` as
//! either a JSON object/array or a JSON-encoded string (§6.2); outbound
//! frames always carry `data` as a JSON-encoded string, or omit it entirely
//! for `ping`/`pong` (§6.3). These are deliberately two different types —
//! collapsing them into one "smart" dynamic type is the kind of dynamic-JSON
//! shortcut §9 calls out as something to not "clean up".

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::constants::events;
use crate::error::{Error, Result};

/// `data` on an inbound frame: either already-parsed JSON, or a JSON string
/// the sender encoded by hand (§6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageData {
    Json(Value),
    String(String),
}

impl MessageData {
    /// Parses to a `Value` regardless of which wire form was used.
    pub fn into_value(self) -> Result<Value> {
        match self {
            MessageData::Json(v) => Ok(v),
            MessageData::String(s) => serde_json::from_str(&s)
                .map_err(|e| Error::InvalidMessageFormat(format!("data is not valid JSON: {e}"))),
        }
    }

    pub fn as_value(&self) -> Result<Value> {
        match self {
            MessageData::Json(v) => Ok(v.clone()),
            MessageData::String(s) => serde_json::from_str(s)
                .map_err(|e| Error::InvalidMessageFormat(format!("data is not valid JSON: {e}"))),
        }
    }
}

/// An inbound client frame (§6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<MessageData>,
}

/// A frame the broker sends to a client (§6.3). `data`, when present, is
/// always the JSON-encoded string of the logical payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PusherMessage {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl PusherMessage {
    fn with_data(event: &str, channel: Option<String>, data: &Value) -> Self {
        Self {
            event: event.to_string(),
            channel,
            data: Some(data.to_string()),
        }
    }

    fn without_data(event: &str, channel: Option<String>) -> Self {
        Self {
            event: event.to_string(),
            channel,
            data: None,
        }
    }

    pub fn connection_established(socket_id: String, activity_timeout: u64) -> Self {
        Self::with_data(
            events::CONNECTION_ESTABLISHED,
            None,
            &serde_json::json!({ "socket_id": socket_id, "activity_timeout": activity_timeout }),
        )
    }

    pub fn ping() -> Self {
        Self::without_data(events::PING, None)
    }

    pub fn pong() -> Self {
        Self::without_data(events::PONG, None)
    }

    pub fn error(code: u16, message: String, channel: Option<String>) -> Self {
        Self::with_data(
            events::ERROR,
            channel,
            &serde_json::json!({ "code": code, "message": message }),
        )
    }

    pub fn cache_miss(channel: String) -> Self {
        Self::without_data(events::CACHE_MISS, Some(channel))
    }

    pub fn subscription_succeeded(channel: String, data: &Value) -> Self {
        Self::with_data(events::SUBSCRIPTION_SUCCEEDED, Some(channel), data)
    }

    pub fn member_added(channel: String, user_id: &str, user_info: &Value) -> Self {
        Self::with_data(
            events::MEMBER_ADDED,
            Some(channel),
            &serde_json::json!({ "user_id": user_id, "user_info": user_info }),
        )
    }

    pub fn member_removed(channel: String, user_id: &str) -> Self {
        Self::with_data(
            events::MEMBER_REMOVED,
            Some(channel),
            &serde_json::json!({ "user_id": user_id }),
        )
    }

    /// A cache channel's stored payload, replayed verbatim to a new
    /// subscriber (§4.5.1 step 5). `raw_data` is already the exact
    /// JSON-encoded string that was cached, so it is not re-encoded here.
    pub fn cached_payload(channel: String, event: String, raw_data: String) -> Self {
        Self {
            event,
            channel: Some(channel),
            data: Some(raw_data),
        }
    }

    /// A user/client event relayed verbatim (already wire-shaped `data`).
    pub fn event(event: String, channel: String, raw_data: String) -> Self {
        Self {
            event,
            channel: Some(channel),
            data: Some(raw_data),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Error::from)
    }
}
