use async_trait::async_trait;

use super::config::App;
use crate::error::Result;

/// Looks up applications by id or public key. Kept trait-shaped (rather than
/// hard-coding the in-memory table everywhere) the way the teacher keeps
/// `AppManager` behind a trait object, so a future storage backend could
/// implement it without touching callers — even though this spec only ships
/// the config-backed implementation.
#[async_trait]
pub trait AppManager: Send + Sync {
    async fn init(&self) -> Result<()>;
    async fn find_by_id(&self, app_id: &str) -> Result<Option<App>>;
    async fn find_by_key(&self, key: &str) -> Result<Option<App>>;
    async fn get_apps(&self) -> Result<Vec<App>>;
    async fn check_health(&self) -> Result<()>;
}
