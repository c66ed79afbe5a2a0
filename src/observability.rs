use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Process-wide counters for pipeline activity
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub transitions: AtomicU64,
    pub retries: AtomicU64,
    pub failures: AtomicU64,
    pub escalations: AtomicU64,
    pub approvals: AtomicU64,
    pub rejections: AtomicU64,
    pub revisions: AtomicU64,
    pub notifications_delivered: AtomicU64,
    pub notifications_failed: AtomicU64,
    pub stats_cache_hits: AtomicU64,
    pub stats_cache_misses: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_escalation(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_approval(&self) {
        self.approvals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_revision(&self) {
        self.revisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery(&self, delivered: bool) {
        if delivered {
            self.notifications_delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.notifications_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_stats_cache(&self, hit: bool) {
        if hit {
            self.stats_cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats_cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            transitions: self.transitions.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            escalations: self.escalations.load(Ordering::Relaxed),
            approvals: self.approvals.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            revisions: self.revisions.load(Ordering::Relaxed),
            notifications_delivered: self.notifications_delivered.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
            stats_cache_hits: self.stats_cache_hits.load(Ordering::Relaxed),
            stats_cache_misses: self.stats_cache_misses.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            transitions = stats.transitions,
            retries = stats.retries,
            failures = stats.failures,
            escalations = stats.escalations,
            approvals = stats.approvals,
            rejections = stats.rejections,
            revisions = stats.revisions,
            notifications_delivered = stats.notifications_delivered,
            notifications_failed = stats.notifications_failed,
            "Pipeline metrics"
        );
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineStats {
    pub transitions: u64,
    pub retries: u64,
    pub failures: u64,
    pub escalations: u64,
    pub approvals: u64,
    pub rejections: u64,
    pub revisions: u64,
    pub notifications_delivered: u64,
    pub notifications_failed: u64,
    pub stats_cache_hits: u64,
    pub stats_cache_misses: u64,
}

static PIPELINE_METRICS: std::sync::LazyLock<PipelineMetrics> =
    std::sync::LazyLock::new(PipelineMetrics::new);

pub fn pipeline_metrics() -> &'static PipelineMetrics {
    &PIPELINE_METRICS
}

/// Time an operation and log its duration when finished
pub struct OperationTimer {
    operation: &'static str,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}
