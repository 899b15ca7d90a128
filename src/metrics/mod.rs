//! Metrics surface (§4.9): a trait so unit tests can swap in a no-op
//! implementation, and a `prometheus`-backed implementation mirroring the
//! teacher's metrics module.

mod prometheus_metrics;

pub use prometheus_metrics::PrometheusMetrics;

use std::sync::Arc;

/// Read/write surface the rest of the broker touches on the hot path. Kept
/// deliberately small: everything here is a counter or histogram observed
/// inline, never a blocking call.
pub trait MetricsInterface: Send + Sync {
    fn mark_connection(&self, app_id: &str);
    fn mark_disconnection(&self, app_id: &str);
    fn mark_subscribe(&self, app_id: &str);
    fn mark_unsubscribe(&self, app_id: &str);
    fn mark_ws_message_received(&self, app_id: &str, bytes: usize);
    fn mark_ws_message_sent(&self, app_id: &str, bytes: usize);
    fn observe_horizontal_rtt(&self, millis: f64);

    /// Renders the Prometheus text exposition format for `/metrics` (§4.9,
    /// §6.4). The no-op implementation returns an empty body.
    fn render(&self) -> String;
}

/// Used wherever metrics are wired but not exercised, e.g. unit tests
/// (§4.9).
#[derive(Default)]
pub struct NoopMetrics;

impl MetricsInterface for NoopMetrics {
    fn mark_connection(&self, _app_id: &str) {}
    fn mark_disconnection(&self, _app_id: &str) {}
    fn mark_subscribe(&self, _app_id: &str) {}
    fn mark_unsubscribe(&self, _app_id: &str) {}
    fn mark_ws_message_received(&self, _app_id: &str, _bytes: usize) {}
    fn mark_ws_message_sent(&self, _app_id: &str, _bytes: usize) {}
    fn observe_horizontal_rtt(&self, _millis: f64) {}
    fn render(&self) -> String {
        String::new()
    }
}

pub type SharedMetrics = Arc<dyn MetricsInterface>;
