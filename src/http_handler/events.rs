//! `POST /apps/{appId}/events` and `/batch_events` (§4.8).

use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::App;
use crate::dispatcher::DispatchRequest;
use crate::websocket::SocketId;

use super::{AppError, AppState};

const MAX_BATCH_SIZE: usize = 10;

#[derive(Debug, Deserialize)]
pub struct EventBody {
    pub name: String,
    pub data: String,
    #[serde(default)]
    pub channels: Option<Vec<String>>,
    pub channel: Option<String>,
    pub socket_id: Option<String>,
    pub info: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchEventsBody {
    pub batch: Vec<EventBody>,
}

impl EventBody {
    fn channel_list(&self) -> Vec<String> {
        match (&self.channels, &self.channel) {
            (Some(channels), _) => channels.clone(),
            (None, Some(channel)) => vec![channel.clone()],
            (None, None) => Vec::new(),
        }
    }
}

fn validation_error(field: &str, message: &str) -> AppError {
    AppError(crate::error::Error::InvalidMessageFormat(format!("{field}: {message}")))
}

async fn dispatch_one(state: &AppState, app: &App, body: &EventBody) -> Result<Option<Value>, AppError> {
    let channels = body.channel_list();
    if channels.is_empty() {
        return Err(validation_error("channel", "at least one channel is required"));
    }

    let except = body.socket_id.as_ref().map(|s| SocketId::from(s.clone()));
    state
        .dispatcher
        .dispatch(DispatchRequest {
            app_id: app.app_id.clone(),
            event: body.name.clone(),
            channels: channels.clone(),
            data: body.data.clone(),
            except,
        })
        .await
        .map_err(AppError)?;

    if let Some(fields) = &body.info {
        let requested: Vec<&str> = fields.split(',').collect();
        let namespace = state.connections.namespace(&app.app_id);
        let mut info = serde_json::Map::new();
        for channel in &channels {
            let value = match namespace.find_channel(channel) {
                Some(chan) => super::channels::channel_info(&chan, &requested),
                None => json!({ "occupied": false }),
            };
            info.insert(channel.clone(), value);
        }
        Ok(Some(Value::Object(info)))
    } else {
        Ok(None)
    }
}

pub async fn post_event(
    State(state): State<AppState>,
    Path(_app_id): Path<String>,
    Extension(app): Extension<Arc<App>>,
    Json(body): Json<EventBody>,
) -> Result<Json<Value>, AppError> {
    match dispatch_one(&state, &app, &body).await? {
        Some(info) => Ok(Json(info)),
        None => Ok(Json(json!({}))),
    }
}

pub async fn post_batch_events(
    State(state): State<AppState>,
    Path(_app_id): Path<String>,
    Extension(app): Extension<Arc<App>>,
    Json(body): Json<BatchEventsBody>,
) -> Result<Response, AppError> {
    if body.batch.len() > MAX_BATCH_SIZE {
        let body = json!({
            "message": "Validation failed",
            "errors": { "batch": ["The batch may not contain more than 10 events."] }
        });
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response());
    }

    let mut infos: Vec<Value> = Vec::new();
    let mut any_info = false;
    for item in &body.batch {
        match dispatch_one(&state, &app, item).await? {
            Some(info) => {
                any_info = true;
                infos.push(info);
            }
            None => infos.push(json!({})),
        }
    }

    if any_info {
        Ok(Json(json!({ "batch": infos })).into_response())
    } else {
        Ok(Json(json!({ "batch": Value::Object(serde_json::Map::<String, Value>::new()) })).into_response())
    }
}
