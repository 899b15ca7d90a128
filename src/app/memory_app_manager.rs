use async_trait::async_trait;
use dashmap::DashMap;

use super::config::App;
use super::manager::AppManager;
use crate::error::Result;

/// Config-backed app table (§6.6: `apps.provider = "config"`). Built once at
/// startup from `apps.apps[]` and indexed by both `app_id` and `key`, per §3.
pub struct MemoryAppManager {
    by_id: DashMap<String, App>,
    by_key: DashMap<String, String>,
}

impl MemoryAppManager {
    pub fn new(apps: Vec<App>) -> Self {
        let by_id = DashMap::new();
        let by_key = DashMap::new();
        for app in apps {
            by_key.insert(app.key.clone(), app.app_id.clone());
            by_id.insert(app.app_id.clone(), app);
        }
        Self { by_id, by_key }
    }
}

#[async_trait]
impl AppManager for MemoryAppManager {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn find_by_id(&self, app_id: &str) -> Result<Option<App>> {
        Ok(self.by_id.get(app_id).map(|e| e.value().clone()))
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<App>> {
        let Some(app_id) = self.by_key.get(key).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        self.find_by_id(&app_id).await
    }

    async fn get_apps(&self) -> Result<Vec<App>> {
        Ok(self.by_id.iter().map(|e| e.value().clone()).collect())
    }

    async fn check_health(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_app(id: &str) -> App {
        App {
            app_id: id.to_string(),
            key: format!("{id}_key"),
            secret: format!("{id}_secret"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn finds_app_by_id_and_key() {
        let manager = MemoryAppManager::new(vec![sample_app("app1")]);
        assert_eq!(
            manager.find_by_id("app1").await.unwrap().unwrap().key,
            "app1_key"
        );
        assert_eq!(
            manager.find_by_key("app1_key").await.unwrap().unwrap().app_id,
            "app1"
        );
        assert!(manager.find_by_id("missing").await.unwrap().is_none());
    }
}
