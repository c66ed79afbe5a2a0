// Shared fixtures for integration tests
#![allow(dead_code)]

use content_workflow::approval::{ChangePriority, EditorProfile, IssueType, RequestedChange};
use content_workflow::notifications::channel::{DeliveryError, NotificationChannel};
use content_workflow::notifications::events::{ChannelKind, Notification};
use content_workflow::store::InMemoryStore;
use content_workflow::workflow::{AdvanceRequest, Workflow, WorkflowId};
use content_workflow::{
    NewWorkflow, Pipeline, PipelineConfig, Priority, WorkflowMetadata, WorkflowState, WorkflowType,
};
use std::sync::Arc;
use tokio::sync::Mutex;

pub fn pipeline() -> Pipeline {
    Pipeline::in_memory(PipelineConfig::default())
}

pub fn pipeline_with_store() -> (Pipeline, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::with_store(PipelineConfig::default(), store.clone());
    (pipeline, store)
}

pub fn passing() -> AdvanceRequest {
    AdvanceRequest::system().with_score(0.9)
}

pub fn failing() -> AdvanceRequest {
    AdvanceRequest::system().with_score(0.4)
}

pub async fn create(pipeline: &Pipeline, article: &str, priority: Priority) -> Workflow {
    pipeline
        .engine
        .create_workflow(
            NewWorkflow::new(article, WorkflowType::ArticlePublishing)
                .with_priority(priority)
                .with_metadata(
                    WorkflowMetadata::titled(format!("Title of {}", article)).with_author("author-1"),
                ),
        )
        .await
        .unwrap()
}

/// Advance with passing scores until the workflow reaches `target`
pub async fn advance_until(pipeline: &Pipeline, id: WorkflowId, target: WorkflowState) -> Workflow {
    let mut workflow = pipeline.engine.get_workflow(id).await.unwrap();
    while workflow.current_state != target {
        workflow = pipeline.engine.advance(id, passing()).await.unwrap().workflow;
    }
    workflow
}

pub async fn in_human_approval(pipeline: &Pipeline, article: &str, priority: Priority) -> Workflow {
    let workflow = create(pipeline, article, priority).await;
    advance_until(pipeline, workflow.id, WorkflowState::HumanApproval).await
}

pub async fn register_editor(pipeline: &Pipeline, id: &str, max_workload: u32) {
    pipeline
        .editors
        .register(EditorProfile::new(id, id.to_uppercase()).with_max_workload(max_workload))
        .await;
}

pub fn must_fix(section: &str) -> RequestedChange {
    RequestedChange {
        section: section.to_string(),
        issue_type: IssueType::Accuracy,
        priority: ChangePriority::MustFix,
        description: Some("figures do not match the source".to_string()),
        suggestion: Some("cite the 2024 report".to_string()),
    }
}

/// Channel that keeps everything it is asked to deliver
#[derive(Default)]
pub struct RecordingChannel {
    pub delivered: Mutex<Vec<Notification>>,
    pub fail: bool,
}

impl RecordingChannel {
    pub fn failing() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub async fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl NotificationChannel for RecordingChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        if self.fail {
            return Err(DeliveryError::Rejected {
                channel: ChannelKind::Email,
                reason: "mailbox full".to_string(),
            });
        }
        self.delivered.lock().await.push(notification.clone());
        Ok(())
    }
}
