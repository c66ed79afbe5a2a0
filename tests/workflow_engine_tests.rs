// Workflow engine behaviour through the public API with the in-memory store

mod common;

use common::*;
use content_workflow::config::PipelineConfig;
use content_workflow::executor::{PipelineRunner, SimulatedExecutor};
use content_workflow::workflow::stages::ReviewBand;
use content_workflow::workflow::{
    Actor, AdvanceOutcome, AdvanceRequest, NewWorkflow, StageOutcome, StageReport, StepId,
    StepStatus, TransitionType, WorkflowError, WorkflowState, WorkflowType,
};
use content_workflow::{Pipeline, Priority, WorkflowMetadata};
use std::sync::Arc;

#[tokio::test]
async fn test_passing_research_score_advances_to_research_review() {
    let pipeline = pipeline();
    let workflow = create(&pipeline, "article-1", Priority::High).await;
    assert_eq!(workflow.current_state, WorkflowState::Research);
    assert_eq!(workflow.completion_percentage, 0.0);
    assert_eq!(workflow.retry_count, 0);

    let result = pipeline.engine.advance(workflow.id, passing()).await.unwrap();

    assert_eq!(
        result.outcome,
        AdvanceOutcome::Advanced {
            from: WorkflowState::Research,
            to: WorkflowState::ResearchReview
        }
    );
    assert_eq!(result.workflow.current_state, WorkflowState::ResearchReview);
    assert!((result.workflow.completion_percentage - 100.0 / 7.0).abs() < 0.01);

    let transitions = pipeline.engine.transitions(workflow.id).await.unwrap();
    assert_eq!(transitions.len(), 2);
    assert_eq!(transitions[0].transition_type, TransitionType::Created);
    assert_eq!(transitions[1].transition_type, TransitionType::Advance);

    let steps = pipeline.engine.steps(workflow.id).await.unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].status, StepStatus::Completed);
    assert!(steps[0].quality_score.as_ref().unwrap().passed);
    assert_eq!(steps[1].stage, WorkflowState::ResearchReview);
    assert_eq!(steps[1].status, StepStatus::Pending);
}

#[tokio::test]
async fn test_failing_scores_retry_then_fail() {
    let pipeline = pipeline();
    let workflow = pipeline
        .engine
        .create_workflow(
            NewWorkflow::new("article-2", WorkflowType::BreakingNews)
                .with_priority(Priority::High)
                .with_max_retries(2),
        )
        .await
        .unwrap();

    let first = pipeline.engine.advance(workflow.id, failing()).await.unwrap();
    assert_eq!(
        first.outcome,
        AdvanceOutcome::Retrying {
            stage: WorkflowState::Research,
            retry_count: 1
        }
    );
    assert_eq!(first.workflow.current_state, WorkflowState::Research);
    assert_eq!(first.workflow.retry_count, 1);

    let second = pipeline.engine.advance(workflow.id, failing()).await.unwrap();
    assert_eq!(second.workflow.current_state, WorkflowState::Failed);
    assert_eq!(second.workflow.retry_count, 2);
    assert_eq!(
        second.workflow.error_message.as_deref(),
        Some("quality threshold not met after 2 retries")
    );

    let third = pipeline.engine.advance(workflow.id, failing()).await;
    assert!(matches!(third, Err(WorkflowError::InvalidState { .. })));

    // Every attempt is its own step; history is never rewritten
    let steps = pipeline.engine.steps(workflow.id).await.unwrap();
    assert_eq!(steps.len(), 2);
    assert!(steps.iter().all(|step| step.status == StepStatus::Failed));
    assert_eq!(steps[0].attempt, 1);
    assert_eq!(steps[1].attempt, 2);
}

#[tokio::test]
async fn test_rollback_then_passing_advance_round_trips() {
    let pipeline = pipeline();
    let workflow = create(&pipeline, "article-3", Priority::Normal).await;
    advance_until(&pipeline, workflow.id, WorkflowState::ContentGeneration).await;

    let rolled_back = pipeline
        .engine
        .rollback(workflow.id, "sources were thin", Actor::System)
        .await
        .unwrap();
    assert_eq!(rolled_back.current_state, WorkflowState::ResearchReview);
    assert_eq!(rolled_back.previous_state, Some(WorkflowState::ContentGeneration));

    let result = pipeline.engine.advance(workflow.id, passing()).await.unwrap();
    assert_eq!(result.workflow.current_state, WorkflowState::ContentGeneration);
}

#[tokio::test]
async fn test_rollback_without_history_fails() {
    let pipeline = pipeline();
    let workflow = create(&pipeline, "article-4", Priority::Low).await;

    let result = pipeline.engine.rollback(workflow.id, "nothing to undo", Actor::System).await;
    assert!(matches!(result, Err(WorkflowError::NoPriorState { .. })));
}

#[tokio::test]
async fn test_pause_and_resume_restore_the_stage() {
    let pipeline = pipeline();
    let workflow = create(&pipeline, "article-5", Priority::Normal).await;
    advance_until(&pipeline, workflow.id, WorkflowState::ContentGeneration).await;

    let paused = pipeline
        .engine
        .pause(workflow.id, "legal hold", Actor::System)
        .await
        .unwrap();
    assert_eq!(paused.current_state, WorkflowState::Paused);
    assert_eq!(paused.previous_state, Some(WorkflowState::ContentGeneration));

    assert!(matches!(
        pipeline.engine.pause(workflow.id, "again", Actor::System).await,
        Err(WorkflowError::NotPausable { .. })
    ));
    assert!(matches!(
        pipeline.engine.advance(workflow.id, passing()).await,
        Err(WorkflowError::InvalidState { .. })
    ));

    let resumed = pipeline.engine.resume(workflow.id, Actor::System).await.unwrap();
    assert_eq!(resumed.current_state, WorkflowState::ContentGeneration);
    assert_eq!(resumed.previous_state, None);
    assert_eq!(resumed.completion_percentage, paused.completion_percentage);

    assert!(matches!(
        pipeline.engine.resume(workflow.id, Actor::System).await,
        Err(WorkflowError::NotPaused { .. })
    ));
}

#[tokio::test]
async fn test_cancel_is_idempotent_and_terminal() {
    let pipeline = pipeline();
    let workflow = create(&pipeline, "article-6", Priority::Normal).await;

    let cancelled = pipeline
        .engine
        .cancel(workflow.id, "story killed", Actor::System)
        .await
        .unwrap();
    assert_eq!(cancelled.current_state, WorkflowState::Cancelled);

    let again = pipeline
        .engine
        .cancel(workflow.id, "story killed", Actor::System)
        .await
        .unwrap();
    assert_eq!(again, cancelled);

    let cancels = pipeline
        .engine
        .transitions(workflow.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.transition_type == TransitionType::Cancel)
        .count();
    assert_eq!(cancels, 1);

    assert!(matches!(
        pipeline.engine.pause(workflow.id, "late", Actor::System).await,
        Err(WorkflowError::NotPausable { .. })
    ));
}

#[tokio::test]
async fn test_cancel_of_finished_workflow_is_rejected() {
    let pipeline = pipeline();
    let workflow = pipeline
        .engine
        .create_workflow(NewWorkflow::new("article-7", WorkflowType::Tutorial).with_max_retries(1))
        .await
        .unwrap();
    let failed = pipeline.engine.advance(workflow.id, failing()).await.unwrap();
    assert_eq!(failed.workflow.current_state, WorkflowState::Failed);

    let result = pipeline.engine.cancel(workflow.id, "cleanup", Actor::System).await;
    assert!(matches!(
        result,
        Err(WorkflowError::InvalidState {
            state: WorkflowState::Failed,
            ..
        })
    ));
}

#[tokio::test]
async fn test_one_active_workflow_per_article() {
    let pipeline = pipeline();
    let first = create(&pipeline, "article-8", Priority::Normal).await;

    let duplicate = pipeline
        .engine
        .create_workflow(NewWorkflow::new("article-8", WorkflowType::ArticlePublishing))
        .await;
    match duplicate {
        Err(WorkflowError::DuplicateWorkflow { existing, .. }) => assert_eq!(existing, first.id),
        other => panic!("expected DuplicateWorkflow, got {:?}", other),
    }

    pipeline
        .engine
        .cancel(first.id, "restart", Actor::System)
        .await
        .unwrap();
    let second = create(&pipeline, "article-8", Priority::Normal).await;
    assert_ne!(second.id, first.id);
}

#[tokio::test]
async fn test_store_failure_leaves_workflow_untouched() {
    let (pipeline, store) = pipeline_with_store();
    let workflow = create(&pipeline, "article-9", Priority::Normal).await;

    store.set_unavailable(true);
    let result = pipeline.engine.advance(workflow.id, passing()).await;
    assert!(matches!(result, Err(WorkflowError::Persistence(_))));
    store.set_unavailable(false);

    let reloaded = pipeline.engine.get_workflow(workflow.id).await.unwrap();
    assert_eq!(reloaded, workflow);
    assert_eq!(pipeline.engine.transitions(workflow.id).await.unwrap().len(), 1);

    let retried = pipeline.engine.advance(workflow.id, passing()).await.unwrap();
    assert_eq!(retried.workflow.current_state, WorkflowState::ResearchReview);
}

#[tokio::test]
async fn test_manual_escalation_to_human_review() {
    let pipeline = pipeline();
    let workflow = create(&pipeline, "article-10", Priority::Critical).await;
    advance_until(&pipeline, workflow.id, WorkflowState::ContentGeneration).await;

    let escalated = pipeline
        .engine
        .submit_for_human_review(workflow.id, None, Actor::System)
        .await
        .unwrap();
    assert_eq!(escalated.current_state, WorkflowState::HumanApproval);

    let last = pipeline.engine.transitions(workflow.id).await.unwrap().pop().unwrap();
    assert_eq!(last.transition_type, TransitionType::HumanReview);
    assert_eq!(last.from_state, Some(WorkflowState::ContentGeneration));

    let paused = create(&pipeline, "article-11", Priority::Normal).await;
    pipeline.engine.pause(paused.id, "hold", Actor::System).await.unwrap();
    assert!(matches!(
        pipeline
            .engine
            .submit_for_human_review(paused.id, None, Actor::System)
            .await,
        Err(WorkflowError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_only_editors_move_work_out_of_human_approval() {
    let pipeline = pipeline();
    let workflow = in_human_approval(&pipeline, "article-12", Priority::Normal).await;

    let result = pipeline.engine.advance(workflow.id, passing()).await;
    assert!(matches!(result, Err(WorkflowError::InvalidState { .. })));
}

#[tokio::test]
async fn test_scores_in_review_band_escalate() {
    let mut config = PipelineConfig::default();
    config.engine.review_band = Some(ReviewBand { min: 0.7, max: 0.8 });
    let pipeline = Pipeline::in_memory(config);
    let workflow = create(&pipeline, "article-13", Priority::Normal).await;

    let result = pipeline
        .engine
        .advance(workflow.id, AdvanceRequest::system().with_score(0.75))
        .await
        .unwrap();
    assert_eq!(
        result.outcome,
        AdvanceOutcome::Escalated {
            from: WorkflowState::Research
        }
    );
    assert_eq!(result.workflow.current_state, WorkflowState::HumanApproval);
}

#[tokio::test]
async fn test_rollback_from_escalated_review_round_trips() {
    let mut config = PipelineConfig::default();
    config.engine.review_band = Some(ReviewBand { min: 0.7, max: 0.8 });
    let pipeline = Pipeline::in_memory(config);
    let workflow = create(&pipeline, "article-13b", Priority::Normal).await;

    pipeline
        .engine
        .advance(workflow.id, AdvanceRequest::system().with_score(0.75))
        .await
        .unwrap();
    let rolled_back = pipeline
        .engine
        .rollback(workflow.id, "research needs another pass", Actor::System)
        .await
        .unwrap();
    assert_eq!(rolled_back.current_state, WorkflowState::Research);

    let result = pipeline.engine.advance(workflow.id, passing()).await.unwrap();
    assert_eq!(result.workflow.current_state, WorkflowState::HumanApproval);
    assert_eq!(
        result.outcome,
        AdvanceOutcome::Escalated {
            from: WorkflowState::Research
        }
    );

    // Manual escalation round-trips the same way
    let manual = create(&pipeline, "article-13c", Priority::Normal).await;
    pipeline
        .engine
        .submit_for_human_review(manual.id, None, Actor::System)
        .await
        .unwrap();
    pipeline
        .engine
        .rollback(manual.id, "not ready", Actor::System)
        .await
        .unwrap();
    let result = pipeline.engine.advance(manual.id, passing()).await.unwrap();
    assert_eq!(result.workflow.current_state, WorkflowState::HumanApproval);
}

#[tokio::test]
async fn test_out_of_range_score_is_rejected() {
    let pipeline = pipeline();
    let workflow = create(&pipeline, "article-14", Priority::Normal).await;

    let result = pipeline
        .engine
        .advance(workflow.id, AdvanceRequest::system().with_score(1.5))
        .await;
    assert!(matches!(result, Err(WorkflowError::InvalidScore { .. })));
    assert_eq!(pipeline.engine.get_workflow(workflow.id).await.unwrap(), workflow);
}

#[tokio::test]
async fn test_executor_reports() {
    let pipeline = pipeline();
    let workflow = create(&pipeline, "article-15", Priority::Normal).await;

    let stale = pipeline
        .engine
        .report_stage_result(StageReport {
            workflow_id: workflow.id,
            step_id: StepId::new(),
            executor: "research-agent".to_string(),
            output: None,
            outcome: StageOutcome::Scored {
                score: 0.9,
                metrics: None,
                feedback: None,
            },
        })
        .await;
    assert!(matches!(stale, Err(WorkflowError::StaleStep { .. })));

    let step = pipeline.engine.open_step(workflow.id).await.unwrap().unwrap();
    let started = pipeline
        .engine
        .start_step(workflow.id, step.id, "research-agent")
        .await
        .unwrap();
    assert_eq!(started.status, StepStatus::Running);

    let result = pipeline
        .engine
        .report_stage_result(StageReport {
            workflow_id: workflow.id,
            step_id: step.id,
            executor: "research-agent".to_string(),
            output: None,
            outcome: StageOutcome::Failed {
                error: "upstream timeout".to_string(),
            },
        })
        .await
        .unwrap();
    assert_eq!(
        result.outcome,
        AdvanceOutcome::Retrying {
            stage: WorkflowState::Research,
            retry_count: 1
        }
    );
    assert!(result
        .workflow
        .error_message
        .unwrap()
        .contains("upstream timeout"));
}

#[tokio::test]
async fn test_runner_drives_to_human_approval() {
    let pipeline = pipeline();
    let workflow = pipeline
        .engine
        .create_workflow(
            NewWorkflow::new("article-16", WorkflowType::MarketAnalysis)
                .with_metadata(WorkflowMetadata::titled("Markets").with_language("sw")),
        )
        .await
        .unwrap();

    let runner = PipelineRunner::new(
        pipeline.engine.clone(),
        Arc::new(SimulatedExecutor::new(3).with_pass_rate(1.0).with_crash_rate(0.0)),
    );
    let finished = runner.drive(workflow.id).await.unwrap();

    assert_eq!(finished.current_state, WorkflowState::HumanApproval);
    assert!((finished.completion_percentage - 600.0 / 7.0).abs() < 0.01);
    let steps = pipeline.engine.steps(workflow.id).await.unwrap();
    assert_eq!(steps.len(), 7);
    assert!(steps[..6].iter().all(|step| step.output.is_some()));
}

#[tokio::test]
async fn test_state_changes_are_published() {
    let pipeline = pipeline();
    let mut changes = pipeline.hub.subscribe_state_changes();
    let workflow = create(&pipeline, "article-17", Priority::High).await;
    pipeline.engine.advance(workflow.id, passing()).await.unwrap();

    let created = changes.recv().await.unwrap();
    assert_eq!(created.to_state, WorkflowState::Research);
    assert_eq!(created.transition_type, TransitionType::Created);

    let advanced = changes.recv().await.unwrap();
    assert_eq!(advanced.from_state, Some(WorkflowState::Research));
    assert_eq!(advanced.to_state, WorkflowState::ResearchReview);
    assert_eq!(advanced.priority, Priority::High);
}

#[tokio::test]
async fn test_workflow_analytics() {
    let pipeline = pipeline();
    let active = create(&pipeline, "article-18", Priority::Normal).await;
    let cancelled = create(&pipeline, "article-19", Priority::Normal).await;
    pipeline
        .engine
        .cancel(cancelled.id, "dropped", Actor::System)
        .await
        .unwrap();

    let analytics = pipeline.engine.workflow_analytics().await.unwrap();
    assert_eq!(analytics.total, 2);
    assert_eq!(analytics.active, 1);
    assert_eq!(analytics.cancelled, 1);
    assert_eq!(analytics.success_rate, 0.0);
    assert_eq!(analytics.state_distribution.get(&active.current_state), Some(&1));
    assert_eq!(analytics.average_completion_ms, None);
}
