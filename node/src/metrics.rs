//! # Prometheus Metrics
//!
//! Operational counters for one exchange node, scraped at `/metrics` on
//! the metrics port. Everything lives in a dedicated
//! [`prometheus::Registry`] prefixed `swan_`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use std::sync::Arc;

use swan_protocol::exchange::FanoutReport;

/// Metric handles for the node. Cloning shares the underlying counters.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Transactions this node extended and answered.
    pub transactions_processed_total: IntCounter,
    /// Transactions refused (malformed, bad offer, misconfiguration).
    pub transactions_rejected_total: IntCounter,
    /// Auctions this node started as publisher.
    pub auctions_opened_total: IntCounter,
    /// Auctions whose winner path ended on a Bid.
    pub winners_resolved_total: IntCounter,
    /// Individual supplier calls.
    pub supplier_dispatches_total: IntCounter,
    /// Supplier calls that ended as a `Failed` node.
    pub supplier_failures_total: IntCounter,
    /// Wall time of a whole fan-out, dispatch to merge.
    pub fanout_latency_seconds: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let c = IntCounter::new(name, help).expect("metric creation");
    registry
        .register(Box::new(c.clone()))
        .expect("metric registration");
    c
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("swan".into()), None)
            .expect("failed to create prometheus registry");

        let fanout_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "fanout_latency_seconds",
                "Time from first supplier dispatch to merged children, in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(fanout_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            transactions_processed_total: counter(
                &registry,
                "transactions_processed_total",
                "Transactions extended and answered by this node",
            ),
            transactions_rejected_total: counter(
                &registry,
                "transactions_rejected_total",
                "Transactions refused by this node",
            ),
            auctions_opened_total: counter(
                &registry,
                "auctions_opened_total",
                "Auctions started by this node as publisher",
            ),
            winners_resolved_total: counter(
                &registry,
                "winners_resolved_total",
                "Auctions whose winner path ended on a bid",
            ),
            supplier_dispatches_total: counter(
                &registry,
                "supplier_dispatches_total",
                "Calls made to downstream suppliers",
            ),
            supplier_failures_total: counter(
                &registry,
                "supplier_failures_total",
                "Supplier calls recorded as Failed nodes",
            ),
            fanout_latency_seconds,
            registry,
        }
    }

    /// Folds one fan-out into the counters.
    pub fn record_fanout(&self, report: &FanoutReport) {
        self.supplier_dispatches_total.inc_by(report.dispatched() as u64);
        self.supplier_failures_total.inc_by(report.failures() as u64);
        self.fanout_latency_seconds
            .observe(report.elapsed.as_secs_f64());
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
