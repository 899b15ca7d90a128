//! A real-time WebSocket broker speaking the Pusher protocol.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod adapter;
pub mod app;
pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod http_handler;
pub mod metrics;
pub mod middleware;
pub mod namespace;
pub mod options;
pub mod protocol;
pub mod shutdown;
pub mod token;
pub mod websocket;
pub mod ws_server;

pub use error::{Error, Result};
