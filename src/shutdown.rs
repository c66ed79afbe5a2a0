use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::{info, warn};

/// Counts background deliveries still running so shutdown can wait for them.
#[derive(Debug, Default)]
pub struct DeliveryTracker {
    in_flight: AtomicUsize,
    idle: Notify,
}

impl DeliveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(self: &Arc<Self>) -> DeliveryGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        DeliveryGuard {
            tracker: self.clone(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until no delivery is running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

pub struct DeliveryGuard {
    tracker: Arc<DeliveryTracker>,
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        if self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tracker.idle.notify_waiters();
        }
    }
}

/// Graceful shutdown for the pipeline process
pub struct ShutdownCoordinator {
    deliveries: Arc<DeliveryTracker>,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(deliveries: Arc<DeliveryTracker>, drain_timeout: Duration) -> Self {
        Self {
            deliveries,
            drain_timeout,
        }
    }

    /// Wait for Ctrl-C, then drain
    pub async fn wait_for_shutdown(self) -> Result<()> {
        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");
        self.shutdown().await
    }

    /// Let in-flight notification deliveries finish, bounded by the drain timeout
    pub async fn shutdown(self) -> Result<()> {
        let pending = self.deliveries.in_flight();
        info!(pending_deliveries = pending, "Draining notification deliveries");

        if timeout(self.drain_timeout, self.deliveries.wait_idle())
            .await
            .is_err()
        {
            warn!(
                abandoned = self.deliveries.in_flight(),
                timeout_secs = self.drain_timeout.as_secs(),
                "Timed out waiting for notification deliveries"
            );
        }

        crate::observability::pipeline_metrics().log_stats();
        info!("Graceful shutdown completed");
        Ok(())
    }
}
