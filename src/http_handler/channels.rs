//! `GET /apps/{appId}/channels...` and `POST .../terminate_connections`
//! (§4.8).

use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::App;
use crate::channel::manager::ChannelManager;

use super::{AppError, AppState};

#[derive(Debug, Deserialize, Default)]
pub struct ChannelsQuery {
    pub filter_by_prefix: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
}

pub(crate) fn channel_info(channel: &crate::namespace::ChannelState, requested: &[&str]) -> Value {
    let mut info = serde_json::Map::new();
    info.insert("occupied".to_string(), json!(!channel.is_empty()));
    for field in requested {
        match *field {
            "subscription_count" if !channel.channel_type.is_presence() => {
                info.insert("subscription_count".to_string(), json!(channel.subscription_count()));
            }
            "user_count" if channel.channel_type.is_presence() => {
                info.insert("user_count".to_string(), json!(channel.presence_members().len()));
            }
            "cache" if channel.channel_type.is_cache() => {
                info.insert("cache".to_string(), json!(true));
            }
            _ => {}
        }
    }
    Value::Object(info)
}

pub async fn get_channels(
    State(state): State<AppState>,
    Path(_app_id): Path<String>,
    Extension(app): Extension<Arc<App>>,
    Query(query): Query<ChannelsQuery>,
) -> Result<Json<Value>, AppError> {
    let requested: Vec<&str> = query.info.as_deref().map(|s| s.split(',').collect()).unwrap_or_default();
    let namespace = state.connections.namespace(&app.app_id);
    let mut channels = serde_json::Map::new();
    for channel in namespace.channel_names_with_prefix(query.filter_by_prefix.as_deref()) {
        if let Some(chan) = namespace.find_channel(&channel) {
            channels.insert(channel, channel_info(&chan, &requested));
        }
    }
    Ok(Json(json!({ "channels": channels })))
}

pub async fn get_channel(
    State(state): State<AppState>,
    Path((_app_id, channel)): Path<(String, String)>,
    Extension(app): Extension<Arc<App>>,
) -> Result<Json<Value>, AppError> {
    let namespace = state.connections.namespace(&app.app_id);
    match namespace.find_channel(&channel) {
        Some(chan) => Ok(Json(channel_info(
            &chan,
            &["subscription_count", "user_count", "cache"],
        ))),
        None => Ok(Json(json!({ "occupied": false }))),
    }
}

pub async fn get_channel_users(
    State(state): State<AppState>,
    Path((_app_id, channel)): Path<(String, String)>,
    Extension(app): Extension<Arc<App>>,
) -> Result<Response, AppError> {
    let namespace = state.connections.namespace(&app.app_id);
    let Some(chan) = namespace.find_channel(&channel) else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Channel not found" })),
        )
            .into_response());
    };
    if !chan.channel_type.is_presence() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Channel is not a presence channel" })),
        )
            .into_response());
    }
    let users: Vec<Value> = chan
        .presence_members()
        .into_iter()
        .map(|(id, _)| json!({ "id": id }))
        .collect();
    Ok(Json(json!({ "users": users })).into_response())
}

pub async fn get_connections(
    State(state): State<AppState>,
    Path(_app_id): Path<String>,
    Extension(app): Extension<Arc<App>>,
) -> Result<Json<Value>, AppError> {
    let count = state.connections.namespace(&app.app_id).connection_count();
    Ok(Json(json!({ "connections": count })))
}

pub async fn terminate_connections(
    State(state): State<AppState>,
    Path((_app_id, user_id)): Path<(String, String)>,
    Extension(app): Extension<Arc<App>>,
) -> Result<Json<Value>, AppError> {
    let namespace = state.connections.namespace(&app.app_id);
    let manager = ChannelManager::new(namespace.clone());

    for channel in namespace.channels() {
        if !channel.channel_type.is_presence() {
            continue;
        }
        let targets: Vec<_> = channel
            .socket_ids()
            .into_iter()
            .filter(|id| channel.user_id_for(id).as_deref() == Some(user_id.as_str()))
            .collect();
        for socket_id in targets {
            if let Some(ws) = namespace.get_socket(&socket_id) {
                manager.unsubscribe_all(&socket_id).await;
                ws.terminate().await;
                namespace.remove_socket(&socket_id);
            }
        }
    }

    state.dispatcher.publish_terminate(&app.app_id, &user_id).await.map_err(AppError)?;
    Ok(Json(json!({})))
}
