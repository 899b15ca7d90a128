//! Admin HTTP API surface tests: unauthenticated `/up`, batch size limit,
//! and channel info shape (§4.8, §8 scenario S6).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use wavecast::adapter::local_adapter::LocalAdapter;
use wavecast::adapter::ConnectionManager;
use wavecast::app::memory_app_manager::MemoryAppManager;
use wavecast::app::{App, manager::AppManager};
use wavecast::dispatcher::EventDispatcher;
use wavecast::http_handler::{router, AppState};
use wavecast::metrics::NoopMetrics;

fn test_app() -> App {
    App {
        app_id: "1".to_string(),
        key: "testkey".to_string(),
        secret: "testsecret".to_string(),
        allowed_origins: Vec::new(),
        ping_interval: 120,
        activity_timeout: 60,
        max_connections: None,
        max_message_size: None,
    }
}

async fn test_state() -> AppState {
    let apps = Arc::new(MemoryAppManager::new(vec![test_app()]));
    apps.init().await.unwrap();
    let connections: Arc<dyn ConnectionManager> = Arc::new(LocalAdapter::new());
    let dispatcher = Arc::new(EventDispatcher::new(connections.clone()));
    AppState {
        apps,
        connections,
        dispatcher,
        metrics: Arc::new(NoopMetrics),
    }
}

#[tokio::test]
async fn up_endpoint_is_unauthenticated_and_returns_ok() {
    let app = router(test_state().await);
    let response = app
        .oneshot(Request::builder().uri("/up").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["health"], "OK");
}

#[tokio::test]
async fn batch_events_over_limit_returns_422_with_validation_shape() {
    let app = router(test_state().await);

    let mut items = Vec::new();
    for i in 0..11 {
        items.push(serde_json::json!({
            "name": "msg",
            "channel": format!("chat-{i}"),
            "data": "{}",
        }));
    }
    let body = serde_json::json!({ "batch": items }).to_string();

    let signed_uri = sign_request("POST", "/apps/1/batch_events", &body);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(signed_uri)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["message"], "Validation failed");
    assert!(json["errors"]["batch"][0].as_str().unwrap().contains("10 events"));
}

fn sign_request(method: &str, path: &str, body: &str) -> String {
    let token = wavecast::token::Token::new("testkey".to_string(), "testsecret".to_string());
    let digest = md5::compute(body.as_bytes());
    let query = format!("body_md5={digest:x}");
    let message = format!("{method}\n{path}\n{query}");
    let signature = token.sign(&message);
    format!("{path}?{query}&auth_signature={signature}")
}
