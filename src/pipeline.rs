use crate::approval::{ApprovalQueue, EditorRegistry, QueueStatsCache};
use crate::config::PipelineConfig;
use crate::notifications::channel::NotificationChannel;
use crate::notifications::NotificationHub;
use crate::shutdown::ShutdownCoordinator;
use crate::store::{InMemoryStore, WorkflowStore};
use crate::workflow::WorkflowEngine;
use std::sync::Arc;

/// An engine and approval queue wired to a shared store and notification hub.
pub struct Pipeline {
    pub config: PipelineConfig,
    pub store: Arc<dyn WorkflowStore>,
    pub editors: Arc<EditorRegistry>,
    pub hub: Arc<NotificationHub>,
    pub engine: Arc<WorkflowEngine>,
    pub queue: Arc<ApprovalQueue>,
}

impl Pipeline {
    pub fn in_memory(config: PipelineConfig) -> Self {
        Self::with_store(config, Arc::new(InMemoryStore::new()))
    }

    pub fn with_store(config: PipelineConfig, store: Arc<dyn WorkflowStore>) -> Self {
        let editors = Arc::new(EditorRegistry::new());
        let hub = Arc::new(NotificationHub::new(
            &config.notifications,
            store.clone(),
            editors.clone(),
        ));
        let stats_cache = Arc::new(QueueStatsCache::new(&config.queue));
        let engine = Arc::new(WorkflowEngine::new(
            store.clone(),
            hub.clone(),
            stats_cache.clone(),
            editors.clone(),
            config.engine.clone(),
        ));
        let queue = Arc::new(ApprovalQueue::new(
            engine.clone(),
            editors.clone(),
            hub.clone(),
            stats_cache,
            config.queue.clone(),
        ));

        Self {
            config,
            store,
            editors,
            hub,
            engine,
            queue,
        }
    }

    pub async fn register_channel(&self, channel: Arc<dyn NotificationChannel>) {
        self.hub.register_channel(channel).await;
    }

    /// Coordinator that drains in-flight notification deliveries
    pub fn shutdown_coordinator(&self) -> ShutdownCoordinator {
        ShutdownCoordinator::new(self.hub.deliveries(), self.config.shutdown.drain_timeout())
    }
}
