// src/metrics/collector.rs
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        buffer
    }
}

pub struct MetricsCollector {
    // Sampler metrics
    pub health_checks_total: IntCounterVec,
    pub health_check_duration_seconds: Histogram,
    pub store_healthy: IntGauge,

    // Facade metrics
    pub http_requests_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let health_checks_total = IntCounterVec::new(
            Opts::new("health_checks_total", "Completed health checks by result"),
            &["result"],
        )?;
        registry.register(Box::new(health_checks_total.clone()))?;

        let health_check_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "health_check_duration_seconds",
            "Duration of store health checks",
        ))?;
        registry.register(Box::new(health_check_duration_seconds.clone()))?;

        let store_healthy = IntGauge::new(
            "store_healthy",
            "Whether the last health check found the store up (1) or down (0)",
        )?;
        registry.register(Box::new(store_healthy.clone()))?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by path and status"),
            &["path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        Ok(Self {
            health_checks_total,
            health_check_duration_seconds,
            store_healthy,
            http_requests_total,
        })
    }

    pub fn record_health_check(&self, healthy: bool, elapsed: Duration) {
        let result = if healthy { "up" } else { "down" };
        self.health_checks_total.with_label_values(&[result]).inc();
        self.health_check_duration_seconds
            .observe(elapsed.as_secs_f64());
        self.store_healthy.set(if healthy { 1 } else { 0 });
    }

    pub fn record_http_request(&self, path: &str, status: u16) {
        self.http_requests_total
            .with_label_values(&[path, &status.to_string()])
            .inc();
    }
}
