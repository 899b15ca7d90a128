//! Startup configuration (§6.6). Config file parsing itself is intentionally
//! thin — a single `serde_json` deserialize — since schema validation and
//! CLI ergonomics are an external collaborator's concern per §1.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::app::config::App;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: String::new(),
            key_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisServerConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: Option<i64>,
    pub tls: bool,
    pub timeout_sec: u64,
}

impl Default for RedisServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "127.0.0.1".to_string(),
            port: 6379,
            username: None,
            password: None,
            db: None,
            tls: false,
            timeout_sec: 5,
        }
    }
}

impl RedisServerConfig {
    /// Builds a `redis://` connection string, preferring an explicit `url`.
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let scheme = if self.tls { "rediss" } else { "redis" };
        let auth = match (&self.username, &self.password) {
            (Some(u), Some(p)) => format!("{u}:{p}@"),
            (None, Some(p)) => format!(":{p}@"),
            _ => String::new(),
        };
        let db = self.db.unwrap_or(0);
        format!(
            "{scheme}://{auth}{host}:{port}/{db}",
            host = self.host,
            port = self.port
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub enabled: bool,
    pub channel: String,
    pub server: RedisServerConfig,
    /// How long (ms) the event dispatcher waits for bus replies when
    /// aggregating cross-node metrics (§4.8, §5).
    pub request_timeout_ms: u64,
    /// How long (seconds) to keep retrying a dropped bus connection before
    /// treating it as Fatal (§4.7).
    pub reconnect_timeout_sec: u64,
    /// Capacity of the queue that buffers publishes issued while the bus
    /// connection is down (§4.7).
    pub publish_queue_capacity: usize,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channel: "wavecast".to_string(),
            server: RedisServerConfig::default(),
            request_timeout_ms: 500,
            reconnect_timeout_sec: 60,
            publish_queue_capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerProfile {
    pub host: String,
    pub port: u16,
    pub path: Option<String>,
    pub hostname: Option<String>,
    pub max_request_size: usize,
    pub scaling: ScalingConfig,
    pub tls: Option<TlsConfig>,
}

impl Default for ServerProfile {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 6001,
            path: None,
            hostname: None,
            max_request_size: 10 * 1024 * 1024,
            scaling: ScalingConfig::default(),
            tls: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppManagerConfig {
    pub provider: AppManagerProvider,
    pub apps: Vec<App>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppManagerProvider {
    #[default]
    Config,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RootConfig {
    pub default: String,
    pub servers: HashMap<String, ServerProfile>,
    pub apps: AppManagerConfig,
}

impl RootConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {path:?}: {e}")))?;
        let config: RootConfig = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("failed to parse config file {path:?}: {e}")))?;
        Ok(config)
    }

    /// Resolves a named server profile, falling back to `self.default`.
    pub fn server(&self, name: Option<&str>) -> Result<ServerProfile> {
        let name = name.unwrap_or(&self.default);
        self.servers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Config(format!("no server profile named {name:?}")))
    }
}
