use prometheus::{Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder};

use super::MetricsInterface;

pub struct PrometheusMetrics {
    registry: Registry,
    connections: IntCounterVec,
    disconnections: IntCounterVec,
    subscribes: IntCounterVec,
    unsubscribes: IntCounterVec,
    bytes_received: IntCounterVec,
    bytes_sent: IntCounterVec,
    horizontal_rtt: HistogramVec,
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let connections = IntCounterVec::new(
            prometheus::Opts::new("wavecast_connections_total", "WebSocket connections accepted"),
            &["app_id"],
        )
        .expect("valid metric definition");
        let disconnections = IntCounterVec::new(
            prometheus::Opts::new("wavecast_disconnections_total", "WebSocket connections closed"),
            &["app_id"],
        )
        .expect("valid metric definition");
        let subscribes = IntCounterVec::new(
            prometheus::Opts::new("wavecast_subscribes_total", "Channel subscriptions"),
            &["app_id"],
        )
        .expect("valid metric definition");
        let unsubscribes = IntCounterVec::new(
            prometheus::Opts::new("wavecast_unsubscribes_total", "Channel unsubscriptions"),
            &["app_id"],
        )
        .expect("valid metric definition");
        let bytes_received = IntCounterVec::new(
            prometheus::Opts::new("wavecast_ws_bytes_received_total", "Bytes read from clients"),
            &["app_id"],
        )
        .expect("valid metric definition");
        let bytes_sent = IntCounterVec::new(
            prometheus::Opts::new("wavecast_ws_bytes_sent_total", "Bytes written to clients"),
            &["app_id"],
        )
        .expect("valid metric definition");
        let horizontal_rtt = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "wavecast_horizontal_rtt_seconds",
                "Round-trip time for cross-node metrics aggregation",
            ),
            &[],
        )
        .expect("valid metric definition");

        for collector in [
            Box::new(connections.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(disconnections.clone()),
            Box::new(subscribes.clone()),
            Box::new(unsubscribes.clone()),
            Box::new(bytes_received.clone()),
            Box::new(bytes_sent.clone()),
            Box::new(horizontal_rtt.clone()),
        ] {
            registry
                .register(collector)
                .expect("metric names are unique within this registry");
        }

        Self {
            registry,
            connections,
            disconnections,
            subscribes,
            unsubscribes,
            bytes_received,
            bytes_sent,
            horizontal_rtt,
        }
    }
}

impl Default for PrometheusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsInterface for PrometheusMetrics {
    fn mark_connection(&self, app_id: &str) {
        self.connections.with_label_values(&[app_id]).inc();
    }

    fn mark_disconnection(&self, app_id: &str) {
        self.disconnections.with_label_values(&[app_id]).inc();
    }

    fn mark_subscribe(&self, app_id: &str) {
        self.subscribes.with_label_values(&[app_id]).inc();
    }

    fn mark_unsubscribe(&self, app_id: &str) {
        self.unsubscribes.with_label_values(&[app_id]).inc();
    }

    fn mark_ws_message_received(&self, app_id: &str, bytes: usize) {
        self.bytes_received.with_label_values(&[app_id]).inc_by(bytes as u64);
    }

    fn mark_ws_message_sent(&self, app_id: &str, bytes: usize) {
        self.bytes_sent.with_label_values(&[app_id]).inc_by(bytes as u64);
    }

    fn observe_horizontal_rtt(&self, millis: f64) {
        self.horizontal_rtt.with_label_values(&[]).observe(millis / 1000.0);
    }

    fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
