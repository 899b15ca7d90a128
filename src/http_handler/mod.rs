//! The admin HTTP API (§4.8) plus the unauthenticated `/up` and `/metrics`
//! endpoints (§4.9, §6.4).

pub mod channels;
pub mod events;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower::timeout::TimeoutLayer;
use tower_http::cors::CorsLayer;

use crate::adapter::ConnectionManager;
use crate::app::manager::AppManager;
use crate::dispatcher::EventDispatcher;
use crate::error::Error;
use crate::metrics::SharedMetrics;
use crate::middleware::pusher_api_auth_middleware;

#[derive(Clone)]
pub struct AppState {
    pub apps: Arc<dyn AppManager + Send + Sync>,
    pub connections: Arc<dyn ConnectionManager>,
    pub dispatcher: Arc<EventDispatcher>,
    pub metrics: SharedMetrics,
}

/// Converts an internal `Error` to the HTTP shape from §7: `{message,
/// errors?}` with the status matching its kind.
pub struct AppError(pub Error);

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::InvalidMessageFormat(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
            Error::Auth(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            Error::Channel(m) => (StatusCode::NOT_FOUND, m.clone()),
            Error::Application(m) => (StatusCode::NOT_FOUND, m.clone()),
            Error::PubSubUnavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

async fn up() -> impl IntoResponse {
    Json(json!({ "health": "OK" }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [("content-type", "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Builds the full admin router. `/up` and `/metrics` are intentionally
/// outside the signed-route group (§4.8, §4.9).
pub fn router(state: AppState) -> Router {
    let signed = Router::new()
        .route("/apps/{app_id}/events", post(events::post_event))
        .route("/apps/{app_id}/batch_events", post(events::post_batch_events))
        .route("/apps/{app_id}/channels", get(channels::get_channels))
        .route("/apps/{app_id}/channels/{channel}", get(channels::get_channel))
        .route("/apps/{app_id}/channels/{channel}/users", get(channels::get_channel_users))
        .route("/apps/{app_id}/connections", get(channels::get_connections))
        .route(
            "/apps/{app_id}/users/{user_id}/terminate_connections",
            post(channels::terminate_connections),
        )
        .layer(middleware::from_fn_with_state(state.clone(), pusher_api_auth_middleware))
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(5)));

    Router::new()
        .route("/up", get(up))
        .route("/metrics", get(metrics))
        .merge(signed)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
