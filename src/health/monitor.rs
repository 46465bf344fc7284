// src/health/monitor.rs
use crate::health::HealthStatus;
use crate::metrics::MetricsCollector;
use anyhow::Result;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval_at, Duration, MissedTickBehavior};
use tracing::{debug, info};

type CheckFn = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Periodically samples a boolean health check and caches the latest result.
///
/// One sampling step runs at a time; a slow check delays the next tick rather
/// than stacking up overlapping checks. The latest status is readable through
/// [`HealthMonitor::current_status`] (pull) or [`HealthMonitor::subscribe`]
/// (push, newest-wins, never applies back-pressure on the sampler).
pub struct HealthMonitor {
    check: CheckFn,
    interval: Duration,
    last_status: RwLock<Option<HealthStatus>>,
    update_tx: watch::Sender<Option<HealthStatus>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl HealthMonitor {
    /// Pure in-memory construction; no I/O happens until [`start`](Self::start).
    pub fn new<F, Fut>(check: F, interval: Duration) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let check: CheckFn = Arc::new(move || -> BoxFuture<'static, bool> { Box::pin(check()) });
        let (update_tx, _) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            check,
            interval,
            last_status: RwLock::new(None),
            update_tx,
            shutdown_tx,
            shutdown_rx,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run the sampling loop until [`shutdown`](Self::shutdown) is signalled.
    ///
    /// The first sample fires one full interval after start. Cancellation is
    /// checked before each tick and wins when both are ready; it is a normal
    /// termination path, not an error. An in-flight check is never interrupted,
    /// and no timeout is imposed on it: a check that hangs stalls sampling.
    pub async fn start(self: Arc<Self>) -> Result<()> {
        let mut ticker = interval_at(
            tokio::time::Instant::now() + self.interval,
            self.interval,
        );
        // Ticks missed while a check runs are coalesced, not queued.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut shutdown_rx = self.shutdown_rx.clone();

        info!("Starting health monitor with interval: {:?}", self.interval);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Health monitor shutting down");
                        return Ok(());
                    }
                }
                _ = ticker.tick() => {
                    self.sample().await;
                }
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// One sampling step: run the check, cache the timestamped result, publish.
    async fn sample(&self) {
        let started = Instant::now();
        let healthy = (self.check)().await;
        let status = HealthStatus::observe(healthy);

        {
            let mut last = self.last_status.write().await;
            *last = Some(status);
        }

        // Newest snapshot replaces any unconsumed older one; the send never
        // blocks the sampler.
        self.update_tx.send_replace(Some(status));

        if let Some(metrics) = &self.metrics {
            metrics.record_health_check(healthy, started.elapsed());
        }

        debug!(healthy, "Recorded health sample");
    }

    /// Latest completed sample, `None` before the first tick finishes.
    ///
    /// Readers share the lock with each other but not with the sampler's
    /// update, so a snapshot is never observed half-written.
    pub async fn current_status(&self) -> Option<HealthStatus> {
        *self.last_status.read().await
    }

    /// Push-style consumer hook. The channel holds at most one unconsumed
    /// status; a read after several unconsumed ticks yields the newest.
    pub fn subscribe(&self) -> watch::Receiver<Option<HealthStatus>> {
        self.update_tx.subscribe()
    }
}
