use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::namespace::Namespace;

use super::ConnectionManager;

/// Single-node connection manager: one `Namespace` per app, no bus (§6.5:
/// "None. All state is in memory per broker node").
#[derive(Default)]
pub struct LocalAdapter {
    namespaces: DashMap<String, Arc<Namespace>>,
}

impl LocalAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionManager for LocalAdapter {
    fn namespace(&self, app_id: &str) -> Arc<Namespace> {
        self.namespaces
            .entry(app_id.to_string())
            .or_insert_with(|| Arc::new(Namespace::new()))
            .clone()
    }

    fn namespaces(&self) -> Vec<Arc<Namespace>> {
        self.namespaces.iter().map(|e| e.value().clone()).collect()
    }
}
