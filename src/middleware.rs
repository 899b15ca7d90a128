//! Admin HTTP API signature verification (§4.8).

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::app::App;
use crate::http_handler::AppState;
use crate::token::Token;

const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Verifies `auth_signature` over `"{METHOD}\n{PATH}\n{sorted query}"`, with
/// `body_md5` appended as a query param when the body is non-empty (§4.8).
/// Buffers the body to compute `body_md5` and puts it back on the request
/// for the downstream handler, matching the teacher's middleware shape of
/// reconstructing the request after reading it once.
pub async fn pusher_api_auth_middleware(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(app) = state.apps.find_by_id(&app_id).await.ok().flatten() else {
        return unauthorized_response(StatusCode::NOT_FOUND, "App not found");
    };

    let (mut parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_SIZE).await {
        Ok(b) => b,
        Err(_) => return unauthorized_response(StatusCode::PAYLOAD_TOO_LARGE, "Body too large"),
    };

    let query = parts.uri.query().unwrap_or("");
    let mut pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap_or_default();
    let auth_signature = pairs
        .iter()
        .find(|(k, _)| k == "auth_signature")
        .map(|(_, v)| v.clone());
    pairs.retain(|(k, _)| k != "auth_signature" && k != "body_md5");

    if !bytes.is_empty() {
        let digest = md5::compute(&bytes);
        pairs.push(("body_md5".to_string(), format!("{digest:x}")));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let query_string = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let Some(provided) = auth_signature else {
        return unauthorized_response(StatusCode::UNAUTHORIZED, "Missing auth_signature");
    };

    let message = format!("{}\n{}\n{}", parts.method.as_str(), parts.uri.path(), query_string);
    let token = Token::new(app.key.clone(), app.secret.clone());
    if !token.verify(&message, &provided) {
        return unauthorized_response(StatusCode::UNAUTHORIZED, "Invalid signature");
    }

    parts.extensions.insert(Arc::new(app));
    let req = Request::from_parts(parts, Body::from(bytes));
    next.run(req).await
}

fn unauthorized_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}
