//! Notification fan-out shared by the engine and the approval queue.
//!
//! Each event kind has its own broadcast topic. Recipient-addressed
//! notifications are persisted and pushed to the registered channels from
//! a spawned task, so publishing never waits on delivery.

pub mod channel;
pub mod events;

use crate::config::NotificationConfig;
use crate::observability::pipeline_metrics;
use crate::shutdown::{DeliveryGuard, DeliveryTracker};
use crate::store::WorkflowStore;
use crate::workflow::types::{ContentType, EditorId, TransitionType, WorkflowState};
use async_trait::async_trait;
use channel::NotificationChannel;
use chrono::Utc;
use events::{
    EditorAssigned, Notification, NotificationKind, PipelineEvent, QueueChange, QueueUpdated,
    WorkflowStateChanged,
};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

/// Resolves which editors should hear about content waiting for review
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn reviewers_for(&self, content_type: ContentType, language_code: &str) -> Vec<EditorId>;
}

#[derive(Clone)]
struct Dispatcher {
    store: Arc<dyn WorkflowStore>,
    directory: Arc<dyn RecipientDirectory>,
    channels: Arc<RwLock<Vec<Arc<dyn NotificationChannel>>>>,
    notification_tx: broadcast::Sender<Notification>,
    operations_recipient: String,
}

impl Dispatcher {
    async fn run(self, event: PipelineEvent, _guard: DeliveryGuard) {
        let notifications = match event {
            PipelineEvent::StateChanged(change) => self.derive(&change).await,
            PipelineEvent::Notification(notification) => vec![notification],
            PipelineEvent::QueueUpdated(_) | PipelineEvent::EditorAssigned(_) => Vec::new(),
        };

        for notification in notifications {
            self.deliver(notification).await;
        }
    }

    async fn derive(&self, change: &WorkflowStateChanged) -> Vec<Notification> {
        if change.entered(WorkflowState::HumanApproval)
            && change.transition_type != TransitionType::Resume
        {
            return self
                .directory
                .reviewers_for(change.content_type, &change.language_code)
                .await
                .into_iter()
                .map(|editor| {
                    Notification::new(
                        editor.as_str(),
                        change.workflow_id,
                        NotificationKind::ReviewRequired,
                        &change.title,
                        change.priority,
                    )
                })
                .collect();
        }

        if change.to_state == WorkflowState::Failed {
            let mut notification = Notification::new(
                self.operations_recipient.as_str(),
                change.workflow_id,
                NotificationKind::WorkflowFailed,
                &change.title,
                change.priority,
            );
            if let Some(reason) = &change.reason {
                notification.message = format!("{} ({})", notification.message, reason);
            }
            return vec![notification];
        }

        Vec::new()
    }

    async fn deliver(&self, notification: Notification) {
        if let Err(e) = self.store.append_notification(&notification).await {
            warn!(
                notification_id = %notification.id,
                recipient = %notification.recipient_id,
                error = %e,
                "Failed to persist notification"
            );
        }

        let _ = self.notification_tx.send(notification.clone());

        let channels = self.channels.read().await.clone();
        for channel in channels {
            match channel.deliver(&notification).await {
                Ok(()) => {
                    pipeline_metrics().record_delivery(true);
                    debug!(
                        notification_id = %notification.id,
                        channel = ?channel.kind(),
                        "Notification delivered"
                    );
                }
                Err(e) => {
                    pipeline_metrics().record_delivery(false);
                    warn!(
                        notification_id = %notification.id,
                        recipient = %notification.recipient_id,
                        channel = ?channel.kind(),
                        error = %e,
                        "Notification delivery failed"
                    );
                }
            }
        }
    }
}

pub struct NotificationHub {
    state_tx: broadcast::Sender<WorkflowStateChanged>,
    queue_tx: broadcast::Sender<QueueUpdated>,
    editor_tx: broadcast::Sender<EditorAssigned>,
    dispatcher: Dispatcher,
    deliveries: Arc<DeliveryTracker>,
    enabled: bool,
}

impl NotificationHub {
    pub fn new(
        config: &NotificationConfig,
        store: Arc<dyn WorkflowStore>,
        directory: Arc<dyn RecipientDirectory>,
    ) -> Self {
        let capacity = config.channel_capacity.max(1);
        let (state_tx, _) = broadcast::channel(capacity);
        let (queue_tx, _) = broadcast::channel(capacity);
        let (editor_tx, _) = broadcast::channel(capacity);
        let (notification_tx, _) = broadcast::channel(capacity);

        Self {
            state_tx,
            queue_tx,
            editor_tx,
            dispatcher: Dispatcher {
                store,
                directory,
                channels: Arc::new(RwLock::new(Vec::new())),
                notification_tx,
                operations_recipient: config.operations_recipient.clone(),
            },
            deliveries: Arc::new(DeliveryTracker::new()),
            enabled: config.enabled,
        }
    }

    pub async fn register_channel(&self, channel: Arc<dyn NotificationChannel>) {
        self.dispatcher.channels.write().await.push(channel);
    }

    pub fn subscribe_state_changes(&self) -> broadcast::Receiver<WorkflowStateChanged> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_queue_updates(&self) -> broadcast::Receiver<QueueUpdated> {
        self.queue_tx.subscribe()
    }

    pub fn subscribe_editor_assignments(&self) -> broadcast::Receiver<EditorAssigned> {
        self.editor_tx.subscribe()
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.dispatcher.notification_tx.subscribe()
    }

    pub fn subscribe_recipient(&self, recipient_id: impl Into<String>) -> RecipientSubscription {
        RecipientSubscription {
            recipient_id: recipient_id.into(),
            receiver: self.subscribe_notifications(),
        }
    }

    pub fn deliveries(&self) -> Arc<DeliveryTracker> {
        self.deliveries.clone()
    }

    /// Announce a change that has already been committed.
    ///
    /// Topic sends happen inline; notification delivery runs on a spawned
    /// task whose failures are only logged.
    pub fn publish(&self, event: PipelineEvent) {
        match &event {
            PipelineEvent::StateChanged(change) => {
                let _ = self.state_tx.send(change.clone());
                let queue_change = if change.entered(WorkflowState::HumanApproval) {
                    Some(QueueChange::Entered)
                } else if change.left(WorkflowState::HumanApproval) {
                    Some(QueueChange::Left)
                } else {
                    None
                };
                if let Some(queue_change) = queue_change {
                    let _ = self.queue_tx.send(QueueUpdated {
                        workflow_id: change.workflow_id,
                        change: queue_change,
                        occurred_at: Utc::now(),
                    });
                }
            }
            PipelineEvent::QueueUpdated(update) => {
                let _ = self.queue_tx.send(update.clone());
            }
            PipelineEvent::EditorAssigned(assignment) => {
                let _ = self.editor_tx.send(assignment.clone());
            }
            PipelineEvent::Notification(_) => {}
        }

        if !self.enabled {
            return;
        }
        if matches!(
            event,
            PipelineEvent::QueueUpdated(_) | PipelineEvent::EditorAssigned(_)
        ) {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(
                    workflow_id = %event.workflow_id(),
                    "No async runtime available, dropping notification delivery"
                );
                return;
            }
        };

        let guard = self.deliveries.track();
        runtime.spawn(self.dispatcher.clone().run(event, guard));
    }
}

/// Notifications for a single recipient
pub struct RecipientSubscription {
    recipient_id: String,
    receiver: broadcast::Receiver<Notification>,
}

impl RecipientSubscription {
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.recv().await {
                Ok(notification) if notification.recipient_id == self.recipient_id => {
                    return Some(notification)
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        recipient = %self.recipient_id,
                        skipped,
                        "Notification subscriber lagged"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
