//! The WebSocket upgrade endpoint, `/app/{appKey}` (§6.1).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use fastwebsockets::{upgrade, Frame, OpCode, WebSocketWrite};
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use tokio::io::WriteHalf;
use tracing::{debug, info, warn};

use crate::adapter::handler::authentication::{check_accept, AcceptDecision};
use crate::adapter::handler::ConnectionHandler;
use crate::error::Error;
use crate::protocol::{error_codes, InboundMessage, PusherMessage};
use crate::websocket::{ConnectionState, SocketId, WebSocket};

type RawSink = WebSocketWrite<WriteHalf<TokioIo<Upgraded>>>;

#[derive(Clone)]
pub struct WsState {
    pub handler: Arc<ConnectionHandler>,
}

fn origin_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub async fn ws_upgrade(
    Path(app_key): Path<String>,
    State(state): State<WsState>,
    headers: HeaderMap,
    ws: upgrade::IncomingUpgrade,
) -> Response {
    let origin = origin_header(&headers);

    // The app lookup runs after the handshake completes, not before: an
    // unknown app key still needs a live socket to send `pusher:error` 4001
    // on, rather than bailing out with a bare HTTP 404 (§6.3).
    let (response, fut) = match ws.upgrade() {
        Ok(pair) => pair,
        Err(e) => {
            warn!(error = %e, "failed to complete websocket upgrade");
            return (StatusCode::BAD_REQUEST, "invalid upgrade").into_response();
        }
    };

    tokio::spawn(async move {
        match fut.await {
            Ok(ws) => {
                serve_connection(ws, app_key, state.handler, origin).await;
            }
            Err(e) => debug!(error = %e, "websocket upgrade future failed"),
        }
    });

    response
}

/// Sends one error frame followed by a close frame on a raw sink that has
/// no `ConnectionState` yet (used for app-key lookup failures, which can
/// only be reported once the handshake itself has succeeded).
async fn reject_before_registration(write: &mut RawSink, code: u16, message: &str) {
    if let Ok(bytes) = PusherMessage::error(code, message.to_string(), None).to_bytes() {
        let _ = write.write_frame(Frame::text(Bytes::from(bytes).into())).await;
    }
    let _ = write.write_frame(Frame::close(1000, b"")).await;
}

async fn send_invalid_payload(ws: &WebSocket) {
    let code = Error::InvalidMessageFormat("malformed frame".to_string())
        .protocol_error_code()
        .unwrap_or(error_codes::INVALID_PAYLOAD);
    ws.send(&PusherMessage::error(code, "Invalid payload".to_string(), None)).await;
}

async fn serve_connection(
    raw: fastwebsockets::WebSocket<hyper_util::rt::TokioIo<hyper::upgrade::Upgraded>>,
    app_key: String,
    handler: Arc<ConnectionHandler>,
    origin: Option<String>,
) {
    let (mut read, mut write) = raw.split(tokio::io::split);

    let app = match handler.apps.find_by_key(&app_key).await {
        Ok(Some(app)) => Arc::new(app),
        Ok(None) => {
            reject_before_registration(&mut write, error_codes::APP_DISABLED, "App does not exist").await;
            return;
        }
        Err(e) => {
            warn!(error = %e, "app lookup failed during websocket upgrade");
            reject_before_registration(&mut write, error_codes::APP_DISABLED, "App does not exist").await;
            return;
        }
    };

    let current = handler.connections.connection_count(&app.app_id);
    let decision = check_accept(&app, origin.as_deref(), current);

    let socket_id = SocketId::generate();
    let state = Arc::new(ConnectionState::new(
        socket_id.clone(),
        app.clone(),
        origin.unwrap_or_default(),
        false,
    ));
    let ws = Arc::new(WebSocket::new(state, write));

    if let AcceptDecision::Reject { code, message } = decision {
        ws.send(&PusherMessage::error(code, message.to_string(), None)).await;
        ws.terminate().await;
        return;
    }

    handler.connections.namespace(&app.app_id).add_socket(ws.clone());
    handler.metrics.mark_connection(&app.app_id);
    ws.send(&PusherMessage::connection_established(
        socket_id.to_string(),
        app.activity_timeout,
    ))
    .await;
    info!(%socket_id, app_id = %app.app_id, "connection established");

    loop {
        let frame = match read.read_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                debug!(%socket_id, error = %e, "read_frame failed, closing connection");
                break;
            }
        };

        match frame.opcode {
            OpCode::Close => break,
            OpCode::Ping => {
                ws.state.touch();
            }
            OpCode::Pong => {
                ws.state.touch();
            }
            OpCode::Text | OpCode::Binary => {
                handler.metrics.mark_ws_message_received(&app.app_id, frame.payload.len());
                if frame.payload.len() > app.max_message_size_bytes() {
                    send_invalid_payload(&ws).await;
                    if ws.state.record_violation() >= crate::protocol::constants::MAX_PROTOCOL_VIOLATIONS {
                        warn!(%socket_id, "too many protocol violations, terminating connection");
                        break;
                    }
                    continue;
                }
                match serde_json::from_slice::<InboundMessage>(&frame.payload) {
                    Ok(inbound) => {
                        if let Err(e) = handler.handle(&ws, &app, inbound).await {
                            warn!(%socket_id, error = %e, "error handling inbound frame");
                        }
                    }
                    Err(e) => {
                        debug!(%socket_id, error = %e, "malformed frame");
                        send_invalid_payload(&ws).await;
                        if ws.state.record_violation() >= crate::protocol::constants::MAX_PROTOCOL_VIOLATIONS {
                            warn!(%socket_id, "too many protocol violations, terminating connection");
                            break;
                        }
                    }
                }
            }
            _ => {}
        }
    }

    ws.terminate().await;

    let manager = handler.channel_manager_for(&app.app_id);
    manager.unsubscribe_all(&socket_id).await;
    handler.connections.namespace(&app.app_id).remove_socket(&socket_id);
    handler.metrics.mark_disconnection(&app.app_id);
    info!(%socket_id, app_id = %app.app_id, "connection closed");
}
