use crate::priority::Priority;
use crate::workflow::types::{
    Actor, ArticleId, ContentType, EditorId, Transition, TransitionType, Workflow, WorkflowId,
    WorkflowState,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A workflow moved between states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStateChanged {
    pub workflow_id: WorkflowId,
    pub article_id: ArticleId,
    pub title: String,
    pub content_type: ContentType,
    pub language_code: String,
    pub priority: Priority,
    pub from_state: Option<WorkflowState>,
    pub to_state: WorkflowState,
    pub transition_type: TransitionType,
    pub triggered_by: Actor,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl WorkflowStateChanged {
    pub fn from_transition(workflow: &Workflow, transition: &Transition) -> Self {
        Self {
            workflow_id: workflow.id,
            article_id: workflow.article_id.clone(),
            title: workflow.display_title(),
            content_type: workflow.content_type(),
            language_code: workflow.metadata.language_code.clone(),
            priority: workflow.priority,
            from_state: transition.from_state,
            to_state: transition.to_state,
            transition_type: transition.transition_type,
            triggered_by: transition.triggered_by.clone(),
            reason: transition.reason.clone(),
            occurred_at: transition.created_at,
        }
    }

    pub fn entered(&self, state: WorkflowState) -> bool {
        self.to_state == state && self.from_state != Some(state)
    }

    pub fn left(&self, state: WorkflowState) -> bool {
        self.from_state == Some(state) && self.to_state != state
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueChange {
    Entered,
    Left,
    Assigned,
    Decided,
}

/// The approval queue's visible contents changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueUpdated {
    pub workflow_id: WorkflowId,
    pub change: QueueChange,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorAssigned {
    pub workflow_id: WorkflowId,
    pub editor_id: EditorId,
    pub previous_editor_id: Option<EditorId>,
    pub manual: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    ReviewRequired,
    Assigned,
    Approved,
    Rejected,
    RevisionRequested,
    WorkflowFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelKind {
    InApp,
    Email,
    Slack,
    Sms,
}

/// A message addressed to a single recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: String,
    pub workflow_id: WorkflowId,
    pub kind: NotificationKind,
    pub channel: ChannelKind,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient_id: impl Into<String>,
        workflow_id: WorkflowId,
        kind: NotificationKind,
        content_title: &str,
        priority: Priority,
    ) -> Self {
        let (title, message) = match kind {
            NotificationKind::ReviewRequired => (
                "Review required".to_string(),
                format!("Content is waiting for human approval: {}", content_title),
            ),
            NotificationKind::Assigned => (
                "New review assignment".to_string(),
                format!("You have been assigned to review: {}", content_title),
            ),
            NotificationKind::Approved => (
                "Content approved".to_string(),
                format!("Content approved: {}", content_title),
            ),
            NotificationKind::Rejected => (
                "Content rejected".to_string(),
                format!("Content rejected: {}", content_title),
            ),
            NotificationKind::RevisionRequested => (
                "Revision requested".to_string(),
                format!("Revision requested for: {}", content_title),
            ),
            NotificationKind::WorkflowFailed => (
                "Workflow failed".to_string(),
                format!("Workflow failed for: {}", content_title),
            ),
        };

        Self {
            id: Uuid::new_v4(),
            recipient_id: recipient_id.into(),
            workflow_id,
            kind,
            channel: ChannelKind::InApp,
            title,
            message,
            priority,
            created_at: Utc::now(),
        }
    }
}

/// Everything the fan-out can publish, one variant per topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineEvent {
    StateChanged(WorkflowStateChanged),
    QueueUpdated(QueueUpdated),
    EditorAssigned(EditorAssigned),
    Notification(Notification),
}

impl PipelineEvent {
    pub fn workflow_id(&self) -> WorkflowId {
        match self {
            PipelineEvent::StateChanged(event) => event.workflow_id,
            PipelineEvent::QueueUpdated(event) => event.workflow_id,
            PipelineEvent::EditorAssigned(event) => event.workflow_id,
            PipelineEvent::Notification(notification) => notification.workflow_id,
        }
    }
}
