use std::sync::Arc;

use super::manager::AppManager;
use super::memory_app_manager::MemoryAppManager;
use crate::error::Result;
use crate::options::AppManagerConfig;
use tracing::info;

/// Explicit construction point for the app table (§9's "global/static
/// factory → explicit construction graph"). Config is the only provider this
/// spec ships; alternative backends are a Non-goal, but keeping a factory
/// here (rather than inlining `MemoryAppManager::new` at the call site)
/// matches the teacher's `AppManagerFactory` shape and leaves room for one.
pub struct AppManagerFactory;

impl AppManagerFactory {
    pub async fn create(config: &AppManagerConfig) -> Result<Arc<dyn AppManager + Send + Sync>> {
        info!(apps = config.apps.len(), "initializing config app manager");
        let manager = MemoryAppManager::new(config.apps.clone());
        manager.init().await?;
        Ok(Arc::new(manager))
    }
}
