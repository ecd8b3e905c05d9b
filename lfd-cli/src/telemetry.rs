//! A deliberately small slice of the teacher's
//! `huginn-proxy-lib/src/telemetry/metrics.rs` stack: this is a batch
//! evaluator, not a long-lived service, so there is no HTTP metrics
//! endpoint — just a `prometheus::Registry` rendered to text once the run
//! finishes, per `SPEC_FULL.md` §4.11.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

pub struct EvalMetrics {
    registry: Registry,
    pub packets_processed_total: IntCounter,
    pub flows_convicted_total: IntCounterVec,
}

impl EvalMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let packets_processed_total =
            IntCounter::new("packets_processed_total", "total packets processed across all detectors")
                .expect("metric name and help are static and valid");
        registry
            .register(Box::new(packets_processed_total.clone()))
            .expect("metric registered exactly once");

        let flows_convicted_total = IntCounterVec::new(
            Opts::new("flows_convicted_total", "total flows convicted, labeled by detector"),
            &["detector"],
        )
        .expect("metric name, help, and labels are static and valid");
        registry
            .register(Box::new(flows_convicted_total.clone()))
            .expect("metric registered exactly once");

        Self { registry, packets_processed_total, flows_convicted_total }
    }

    /// Prometheus text exposition format, printed at the end of a run when
    /// `telemetry.metrics_enabled` is set.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        encoder
            .encode_to_string(&families)
            .unwrap_or_else(|e| format!("# failed to encode metrics: {e}\n"))
    }
}

impl Default for EvalMetrics {
    fn default() -> Self {
        Self::new()
    }
}
