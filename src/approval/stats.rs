use super::types::{ApprovalQueueItem, ApprovalStatus, EditorPerformance, QueueStats, ReviewDecision, ReviewRecord};
use crate::config::QueueConfig;
use crate::observability::pipeline_metrics;
use crate::workflow::types::EditorId;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// TTL cache for queue statistics.
///
/// Entries are keyed by a generation counter that every queue mutation
/// bumps, so a stale snapshot is never served after a change even if the
/// TTL has not expired.
pub struct QueueStatsCache {
    cache: Cache<u64, QueueStats>,
    generation: AtomicU64,
}

impl QueueStatsCache {
    pub fn new(config: &QueueConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.stats_cache_capacity.max(1))
            .time_to_live(config.stats_cache_ttl())
            .build();
        Self {
            cache,
            generation: AtomicU64::new(0),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub async fn get(&self) -> Option<QueueStats> {
        let cached = self.cache.get(&self.generation()).await;
        pipeline_metrics().record_stats_cache(cached.is_some());
        cached
    }

    /// Store stats computed while `generation` was current. Dropped if the
    /// queue changed in the meantime.
    pub async fn put(&self, generation: u64, stats: QueueStats) {
        if generation == self.generation() {
            self.cache.insert(generation, stats).await;
        }
    }

    pub fn invalidate(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.cache.invalidate_all();
        debug!(generation, "Queue stats cache invalidated");
    }
}

pub fn compute_queue_stats(
    items: &[ApprovalQueueItem],
    records: &[ReviewRecord],
    now: DateTime<Utc>,
) -> QueueStats {
    let mut stats = QueueStats {
        total: items.len(),
        computed_at: now,
        ..QueueStats::default()
    };

    let mut wait_total_ms = 0i64;
    for item in items {
        *stats.by_status.entry(item.status).or_insert(0) += 1;
        *stats.by_priority.entry(item.priority).or_insert(0) += 1;
        *stats.by_content_type.entry(item.content_type).or_insert(0) += 1;
        stats.estimated_backlog_minutes += item.estimated_review_minutes;
        stats.priority_pressure += item.priority.weight();

        if item.status == ApprovalStatus::Pending {
            stats.pending += 1;
            let age_ms = (now - item.submitted_at).num_milliseconds().max(0);
            wait_total_ms += age_ms;
            stats.oldest_pending_age_ms = Some(stats.oldest_pending_age_ms.map_or(age_ms, |oldest| oldest.max(age_ms)));
        } else {
            stats.in_review += 1;
        }
    }

    if stats.pending > 0 {
        stats.average_wait_time_ms = wait_total_ms as f64 / stats.pending as f64;
    }
    if !records.is_empty() {
        let review_total: i64 = records.iter().map(ReviewRecord::review_time_ms).sum();
        stats.average_review_time_ms = review_total as f64 / records.len() as f64;
    }
    stats
}

/// Aggregate review records. `editor_id` only labels the result; callers
/// filter the records.
pub fn compute_editor_performance(
    editor_id: Option<EditorId>,
    records: &[ReviewRecord],
    window_days: u32,
) -> EditorPerformance {
    let mut performance = EditorPerformance {
        editor_id,
        window_days,
        total_reviews: records.len(),
        ..EditorPerformance::default()
    };
    if records.is_empty() {
        return performance;
    }

    for record in records {
        match record.decision {
            ReviewDecision::Approved => performance.approvals += 1,
            ReviewDecision::Rejected => performance.rejections += 1,
            ReviewDecision::RevisionRequested => performance.revisions_requested += 1,
        }
    }

    let total = records.len() as f64;
    performance.approval_rate = performance.approvals as f64 / total * 100.0;
    performance.revision_rate = performance.revisions_requested as f64 / total * 100.0;
    performance.average_review_time_ms =
        records.iter().map(ReviewRecord::review_time_ms).sum::<i64>() as f64 / total;
    performance.throughput_per_day = total / f64::from(window_days.max(1));

    let scores: Vec<f64> = records
        .iter()
        .filter_map(|record| record.quality_override.or(record.ai_confidence_score))
        .collect();
    if !scores.is_empty() {
        performance.average_quality_score = Some(scores.iter().sum::<f64>() / scores.len() as f64);
    }
    performance
}
