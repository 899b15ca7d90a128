//! The connection-manager abstraction: a single-node view (`LocalAdapter`)
//! and an optional horizontal layer that adds a pub/sub bus on top of it
//! (§4.7). Generalizes the teacher's adapter trait to this spec's
//! namespace/channel model.

pub mod horizontal_adapter;
pub mod horizontal_transport;
pub mod local_adapter;
#[cfg(feature = "redis")]
pub mod redis_transport;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::namespace::Namespace;

/// Owns one `Namespace` per app and, optionally, bridges broadcasts across
/// nodes. `LocalAdapter` is the base case; `HorizontalAdapter` wraps it.
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Returns the namespace for `app_id`, creating it on first use.
    fn namespace(&self, app_id: &str) -> Arc<Namespace>;

    /// Every namespace created so far, for broker-wide sweeps such as
    /// graceful shutdown (§5). Default empty so adapters that don't track
    /// more than the requested app (none currently) aren't forced to.
    fn namespaces(&self) -> Vec<Arc<Namespace>> {
        Vec::new()
    }

    fn connection_count(&self, app_id: &str) -> usize {
        self.namespace(app_id).connection_count()
    }

    /// Starts any background tasks (bus subscriber loop, reconnect logic).
    /// A no-op for the local-only adapter.
    async fn init(&self) -> Result<()> {
        Ok(())
    }
}
