use serde::{Deserialize, Serialize};

/// Immutable application descriptor (§3). Loaded once at startup from
/// `apps.apps[]` and never mutated at runtime — there is no HTTP surface to
/// create/update/delete apps, since alternative app-storage backends are a
/// Non-goal and the config-provided table is the only source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct App {
    pub app_id: String,
    pub key: String,
    pub secret: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    pub ping_interval: u64,
    pub activity_timeout: u64,
    pub max_connections: Option<u64>,
    pub max_message_size: Option<usize>,
}

impl Default for App {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            key: String::new(),
            secret: String::new(),
            allowed_origins: Vec::new(),
            ping_interval: 120,
            activity_timeout: 60,
            max_connections: None,
            max_message_size: Some(10 * 1024),
        }
    }
}

impl App {
    pub fn max_message_size_bytes(&self) -> usize {
        self.max_message_size.unwrap_or(10 * 1024)
    }

    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*") {
            return true;
        }
        match origin {
            Some(origin) => self.allowed_origins.iter().any(|o| o == origin),
            None => false,
        }
    }
}
