use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Issuer metrics
    pub issuer_fetch_requests: IntCounterVec,
    pub issuer_fetch_failures: IntCounterVec,
    pub issuer_fetch_duration: HistogramVec,

    // Store metrics
    pub store_persist_failures: IntCounterVec,

    // Scheduler metrics
    pub scheduled_workers: IntGauge,
    pub orphaned_tokens: IntCounter,
    pub token_expiry_unix: IntGaugeVec,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("tokenrotator".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Issuer
            issuer_fetch_requests: IntCounterVec::new(Opts::new("issuer_fetch_requests_total", "Total fetch attempts by service"), &["service"]).unwrap(),
            issuer_fetch_failures: IntCounterVec::new(Opts::new("issuer_fetch_failures_total", "Fetch failures by reason"), &["service", "reason"]).unwrap(),
            issuer_fetch_duration: HistogramVec::new(HistogramOpts::new("issuer_fetch_duration_seconds", "Fetch duration seconds").buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0]), &["service"]).unwrap(),

            // Store
            store_persist_failures: IntCounterVec::new(Opts::new("store_persist_failures_total", "Token persistence failures by reason"), &["reason"]).unwrap(),

            // Scheduler
            scheduled_workers: IntGauge::new("scheduled_workers", "Refresh workers currently running").unwrap(),
            orphaned_tokens: IntCounter::new("orphaned_tokens_total", "Stored tokens not matching any configured credential").unwrap(),
            token_expiry_unix: IntGaugeVec::new(Opts::new("token_expiry_unix_seconds", "Expiry of the latest token"), &["owner", "service"]).unwrap(),

            // Config/runtime
            config_validation_errors: IntCounter::new("config_validation_errors_total", "Validation errors during startup").unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.issuer_fetch_requests.clone())).unwrap();
        reg.register(Box::new(metrics.issuer_fetch_failures.clone())).unwrap();
        reg.register(Box::new(metrics.issuer_fetch_duration.clone())).unwrap();
        reg.register(Box::new(metrics.store_persist_failures.clone())).unwrap();
        reg.register(Box::new(metrics.scheduled_workers.clone())).unwrap();
        reg.register(Box::new(metrics.orphaned_tokens.clone())).unwrap();
        reg.register(Box::new(metrics.token_expiry_unix.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
