use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wavecast::adapter::handler::ConnectionHandler;
use wavecast::adapter::local_adapter::LocalAdapter;
use wavecast::adapter::ConnectionManager;
use wavecast::app::factory::AppManagerFactory;
use wavecast::channel::manager::ChannelManager;
use wavecast::dispatcher::EventDispatcher;
use wavecast::http_handler::{self, AppState};
use wavecast::metrics::{MetricsInterface, PrometheusMetrics};
use wavecast::options::RootConfig;
use wavecast::protocol::{error_codes, PusherMessage};
use wavecast::shutdown::Shutdown;
use wavecast::ws_server::{ws_upgrade, WsState};

#[derive(Parser, Debug)]
#[command(name = "wavecast", about = "A real-time WebSocket broker speaking the Pusher protocol")]
struct Cli {
    /// Path to the JSON configuration file (§6.6).
    #[arg(long, default_value = "config.json")]
    config: String,

    /// Server profile name; defaults to `config.default`.
    #[arg(long)]
    server: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
}

async fn run() -> wavecast::Result<()> {
    let cli = Cli::parse();

    let config = RootConfig::from_file(&cli.config)?;
    let profile = config.server(cli.server.as_deref())?;

    let apps = AppManagerFactory::create(&config.apps).await?;
    let metrics: Arc<dyn MetricsInterface> = Arc::new(PrometheusMetrics::new());
    let shutdown = Arc::new(Shutdown::new());

    #[cfg(feature = "redis")]
    let mut bus: Option<(Arc<dyn wavecast::adapter::horizontal_transport::HorizontalTransport>, uuid::Uuid)> = None;
    let mut bus_transport: Option<Arc<dyn wavecast::adapter::horizontal_transport::HorizontalTransport>> = None;

    let connections: Arc<dyn ConnectionManager> = if profile.scaling.enabled {
        #[cfg(feature = "redis")]
        {
            use wavecast::adapter::horizontal_adapter::HorizontalAdapter;
            use wavecast::adapter::horizontal_transport::TransportConfig;
            use wavecast::adapter::redis_transport::RedisTransport;

            let transport_config = TransportConfig {
                channel: profile.scaling.channel.clone(),
                request_timeout: std::time::Duration::from_millis(profile.scaling.request_timeout_ms),
                reconnect_timeout: std::time::Duration::from_secs(profile.scaling.reconnect_timeout_sec),
                publish_queue_capacity: profile.scaling.publish_queue_capacity,
            };
            let transport = Arc::new(RedisTransport::new(&profile.scaling.server, transport_config.clone())?);
            let adapter = Arc::new(HorizontalAdapter::new(transport.clone(), transport_config));
            let fatal_shutdown = shutdown.clone();
            adapter
                .clone()
                .start(Box::new(move || fatal_shutdown.trigger(true)))
                .await?;
            bus_transport = Some(transport.clone());
            bus = Some((transport, adapter.node_id()));
            adapter as Arc<dyn ConnectionManager>
        }
        #[cfg(not(feature = "redis"))]
        {
            tracing::warn!("scaling.enabled is true but the redis feature is not compiled in; running local-only");
            Arc::new(LocalAdapter::new())
        }
    } else {
        Arc::new(LocalAdapter::new())
    };

    #[cfg(feature = "redis")]
    let dispatcher = Arc::new(match bus {
        Some((transport, node_id)) => EventDispatcher::with_bus(connections.clone(), transport, node_id),
        None => EventDispatcher::new(connections.clone()),
    });
    #[cfg(not(feature = "redis"))]
    let dispatcher = Arc::new(EventDispatcher::new(connections.clone()));

    let handler = Arc::new(ConnectionHandler::new(apps.clone(), connections.clone(), dispatcher.clone(), metrics.clone()));

    for app in apps.get_apps().await? {
        handler.spawn_sweep_task(Arc::new(app));
    }

    let drain_connections = connections.clone();

    let admin_state = AppState {
        apps,
        connections,
        dispatcher,
        metrics,
    };

    let app_router = Router::new()
        .route("/app/{app_key}", get(ws_upgrade))
        .with_state(WsState { handler })
        .merge(http_handler::router(admin_state));

    let addr = format!("{}:{}", profile.host, profile.port);
    tracing::info!(%addr, "starting wavecast broker");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| wavecast::Error::Config(format!("failed to bind {addr}: {e}")))?;

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        signal_shutdown.trigger(false);
    });

    axum::serve(listener, app_router.into_make_service())
        .with_graceful_shutdown(wait_and_drain(shutdown.clone(), drain_connections, bus_transport))
        .await
        .map_err(|e| wavecast::Error::Other(format!("server error: {e}")))?;

    if shutdown.is_fatal() {
        std::process::exit(1);
    }

    Ok(())
}

/// Graceful shutdown (§5): stop accepting new sockets (handled by
/// `axum::serve` itself once this future resolves), send `pusher:error` 4200
/// to every connection, unsubscribe each from every channel, close the
/// sockets, then stop the bus subscriber. Also the trigger point for §7's
/// Fatal kind: a bus that gives up reconnecting calls `shutdown.trigger(true)`,
/// which resolves this same future and drains exactly as a Ctrl-C would.
async fn wait_and_drain(
    shutdown: Arc<Shutdown>,
    connections: Arc<dyn ConnectionManager>,
    bus_transport: Option<Arc<dyn wavecast::adapter::horizontal_transport::HorizontalTransport>>,
) {
    shutdown.recv().await;
    tracing::info!(fatal = shutdown.is_fatal(), "shutdown signal received, draining connections");

    for namespace in connections.namespaces() {
        for ws in namespace.all_sockets() {
            ws.send(&PusherMessage::error(
                error_codes::SERVER_SHUTTING_DOWN,
                "Server shutting down".to_string(),
                None,
            ))
            .await;
            ChannelManager::new(namespace.clone()).unsubscribe_all(ws.socket_id()).await;
            ws.terminate().await;
            namespace.remove_socket(ws.socket_id());
        }
    }

    if let Some(transport) = bus_transport {
        if let Err(e) = transport.disconnect().await {
            tracing::warn!(error = %e, "error stopping bus subscriber during shutdown");
        }
    }
}
