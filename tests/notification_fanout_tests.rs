// Notification fan-out: who hears about what, and failure isolation

mod common;

use common::*;
use content_workflow::notifications::events::{NotificationKind, QueueChange};
use content_workflow::store::WorkflowStore;
use content_workflow::workflow::{Actor, EditorId, NewWorkflow, WorkflowState, WorkflowType};
use content_workflow::{Pipeline, PipelineConfig, Priority, WorkflowMetadata};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

async fn drain(pipeline: &Pipeline) {
    pipeline.shutdown_coordinator().shutdown().await.unwrap();
}

#[tokio::test]
async fn test_entering_human_approval_notifies_eligible_editors() {
    let pipeline = pipeline();
    register_editor(&pipeline, "ed-1", 5).await;
    register_editor(&pipeline, "ed-2", 5).await;
    pipeline
        .editors
        .register(
            content_workflow::EditorProfile::new("ed-sw", "Swahili desk").with_languages(&["sw"]),
        )
        .await;
    pipeline.editors.set_availability(&EditorId::new("ed-2"), false).await;

    let mut inbox = pipeline.hub.subscribe_recipient("ed-1");
    let workflow = in_human_approval(&pipeline, "article-1", Priority::High).await;

    let notification = timeout(Duration::from_secs(2), inbox.recv())
        .await
        .expect("notification within timeout")
        .expect("hub still open");
    assert_eq!(notification.kind, NotificationKind::ReviewRequired);
    assert_eq!(notification.workflow_id, workflow.id);
    assert_eq!(notification.priority, Priority::High);
    assert!(notification.message.contains("Title of article-1"));

    drain(&pipeline).await;
    assert_eq!(pipeline.store.notifications_for("ed-1").await.unwrap().len(), 1);
    assert!(pipeline.store.notifications_for("ed-2").await.unwrap().is_empty());
    assert!(pipeline.store.notifications_for("ed-sw").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_assignment_and_decision_reach_editor_and_author() {
    let pipeline = pipeline();
    let channel = Arc::new(RecordingChannel::default());
    pipeline.register_channel(channel.clone()).await;
    register_editor(&pipeline, "ed-1", 5).await;

    let workflow = in_human_approval(&pipeline, "article-2", Priority::Normal).await;
    pipeline
        .queue
        .assign_editor(workflow.id, Some(EditorId::new("ed-1")))
        .await
        .unwrap();
    pipeline
        .queue
        .approve(workflow.id, &EditorId::new("ed-1"), None, None)
        .await
        .unwrap();
    drain(&pipeline).await;

    let delivered = channel.delivered().await;
    let kinds_for = |recipient: &str| {
        delivered
            .iter()
            .filter(|n| n.recipient_id == recipient)
            .map(|n| n.kind)
            .collect::<Vec<_>>()
    };
    let editor_kinds = kinds_for("ed-1");
    assert!(editor_kinds.contains(&NotificationKind::ReviewRequired));
    assert!(editor_kinds.contains(&NotificationKind::Assigned));
    assert_eq!(kinds_for("author-1"), vec![NotificationKind::Approved]);
}

#[tokio::test]
async fn test_failed_workflow_alerts_operations() {
    let pipeline = pipeline();
    let channel = Arc::new(RecordingChannel::default());
    pipeline.register_channel(channel.clone()).await;

    let workflow = pipeline
        .engine
        .create_workflow(
            NewWorkflow::new("article-3", WorkflowType::BreakingNews)
                .with_metadata(WorkflowMetadata::titled("Flood warning"))
                .with_max_retries(1),
        )
        .await
        .unwrap();
    pipeline.engine.advance(workflow.id, failing()).await.unwrap();
    drain(&pipeline).await;

    let delivered = channel.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].recipient_id, "operations");
    assert_eq!(delivered[0].kind, NotificationKind::WorkflowFailed);
    assert!(delivered[0].message.contains("Flood warning"));
    assert!(delivered[0]
        .message
        .contains("quality threshold not met after 1 retries"));
}

#[tokio::test]
async fn test_channel_failure_does_not_affect_workflow() {
    let pipeline = pipeline();
    let failing_channel = Arc::new(RecordingChannel::failing());
    let working_channel = Arc::new(RecordingChannel::default());
    pipeline.register_channel(failing_channel.clone()).await;
    pipeline.register_channel(working_channel.clone()).await;
    register_editor(&pipeline, "ed-1", 5).await;

    let workflow = in_human_approval(&pipeline, "article-4", Priority::Normal).await;
    drain(&pipeline).await;

    assert_eq!(
        pipeline.engine.get_workflow(workflow.id).await.unwrap().current_state,
        WorkflowState::HumanApproval
    );
    assert!(failing_channel.delivered().await.is_empty());
    assert_eq!(working_channel.delivered().await.len(), 1);
    assert_eq!(pipeline.store.notifications_for("ed-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_queue_updates_follow_the_review_lifecycle() {
    let pipeline = pipeline();
    register_editor(&pipeline, "ed-1", 5).await;
    let mut updates = pipeline.hub.subscribe_queue_updates();
    let mut assignments = pipeline.hub.subscribe_editor_assignments();

    let workflow = in_human_approval(&pipeline, "article-5", Priority::Normal).await;
    pipeline.queue.assign_editor(workflow.id, None).await.unwrap();
    pipeline
        .queue
        .reject(workflow.id, &EditorId::new("ed-1"), "duplicate story")
        .await
        .unwrap();

    let mut changes = Vec::new();
    while let Ok(update) = updates.try_recv() {
        assert_eq!(update.workflow_id, workflow.id);
        changes.push(update.change);
    }
    assert_eq!(
        changes,
        vec![
            QueueChange::Entered,
            QueueChange::Assigned,
            QueueChange::Left,
            QueueChange::Decided
        ]
    );

    let assignment = assignments.try_recv().unwrap();
    assert_eq!(assignment.editor_id, EditorId::new("ed-1"));
    assert!(!assignment.manual);
}

#[tokio::test]
async fn test_resume_into_review_does_not_renotify_editors() {
    let pipeline = pipeline();
    let channel = Arc::new(RecordingChannel::default());
    pipeline.register_channel(channel.clone()).await;
    register_editor(&pipeline, "ed-1", 5).await;

    let workflow = in_human_approval(&pipeline, "article-6", Priority::Normal).await;
    pipeline
        .engine
        .pause(workflow.id, "legal review", Actor::System)
        .await
        .unwrap();
    let resumed = pipeline.engine.resume(workflow.id, Actor::System).await.unwrap();
    assert_eq!(resumed.current_state, WorkflowState::HumanApproval);
    drain(&pipeline).await;

    let review_requests = channel
        .delivered()
        .await
        .into_iter()
        .filter(|n| n.kind == NotificationKind::ReviewRequired)
        .count();
    assert_eq!(review_requests, 1);
}

#[tokio::test]
async fn test_disabled_notifications_still_publish_topics() {
    let mut config = PipelineConfig::default();
    config.notifications.enabled = false;
    let pipeline = Pipeline::in_memory(config);
    let channel = Arc::new(RecordingChannel::default());
    pipeline.register_channel(channel.clone()).await;
    register_editor(&pipeline, "ed-1", 5).await;
    let mut changes = pipeline.hub.subscribe_state_changes();

    in_human_approval(&pipeline, "article-7", Priority::Normal).await;
    drain(&pipeline).await;

    assert!(channel.delivered().await.is_empty());
    assert!(changes.try_recv().is_ok());
}
