use super::errors::WorkflowError;
use super::history;
use super::locks::LockRegistry;
use super::stages::stage_config;
use super::types::{
    Actor, ArticleId, EditorId, QualityMetrics, QualityScore, StageOutput, Step, StepId,
    StepStatus, Transition, TransitionType, Workflow, WorkflowId, WorkflowMetadata, WorkflowState,
    WorkflowType,
};
use crate::approval::stats::QueueStatsCache;
use crate::approval::types::{Revision, ReviewRecord};
use crate::config::EngineConfig;
use crate::notifications::events::{
    EditorAssigned, Notification, NotificationKind, PipelineEvent, QueueChange, QueueUpdated,
    WorkflowStateChanged,
};
use crate::notifications::NotificationHub;
use crate::observability::pipeline_metrics;
use crate::priority::Priority;
use crate::store::{WorkflowCommit, WorkflowStore};
use crate::telemetry::create_workflow_span;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn, Instrument};

/// Input for [`WorkflowEngine::create_workflow`]
#[derive(Debug, Clone)]
pub struct NewWorkflow {
    pub article_id: ArticleId,
    pub workflow_type: WorkflowType,
    pub priority: Priority,
    pub metadata: WorkflowMetadata,
    pub max_retries: Option<u32>,
}

impl NewWorkflow {
    pub fn new(article_id: impl Into<String>, workflow_type: WorkflowType) -> Self {
        Self {
            article_id: ArticleId::new(article_id),
            workflow_type,
            priority: Priority::Normal,
            metadata: WorkflowMetadata::default(),
            max_retries: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_metadata(mut self, metadata: WorkflowMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Input for [`WorkflowEngine::advance`]
#[derive(Debug, Clone)]
pub struct AdvanceRequest {
    pub triggered_by: Actor,
    pub score: Option<f64>,
    pub metrics: Option<QualityMetrics>,
    pub feedback: Option<String>,
    pub output: Option<StageOutput>,
    /// Editor score recorded for audit; never gates
    pub quality_override: Option<f64>,
}

impl AdvanceRequest {
    pub fn new(triggered_by: Actor) -> Self {
        Self {
            triggered_by,
            score: None,
            metrics: None,
            feedback: None,
            output: None,
            quality_override: None,
        }
    }

    pub fn system() -> Self {
        Self::new(Actor::System)
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_metrics(mut self, metrics: QualityMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    pub fn with_output(mut self, output: StageOutput) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_quality_override(mut self, score: Option<f64>) -> Self {
        self.quality_override = score;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageOutcome {
    Scored {
        score: f64,
        metrics: Option<QualityMetrics>,
        feedback: Option<String>,
    },
    Failed {
        error: String,
    },
}

/// Terminal result of one stage attempt, reported by an executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub workflow_id: WorkflowId,
    pub step_id: StepId,
    pub executor: String,
    pub output: Option<StageOutput>,
    pub outcome: StageOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    /// Moved to the nominal next state
    Advanced {
        from: WorkflowState,
        to: WorkflowState,
    },
    /// Sent to HUMAN_APPROVAL ahead of the nominal order
    Escalated { from: WorkflowState },
    /// Gate failed; a new attempt of the same stage was queued
    Retrying {
        stage: WorkflowState,
        retry_count: u32,
    },
    /// Gate failed and retries are exhausted
    Failed {
        stage: WorkflowState,
        retry_count: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceResult {
    pub workflow: Workflow,
    pub outcome: AdvanceOutcome,
}

/// Records committed together with a decision-driven transition
#[derive(Debug, Clone, Default)]
pub struct DecisionRecords {
    pub review: Option<ReviewRecord>,
    pub revision: Option<Revision>,
}

/// Editor capacity kept in step with reviewer changes made by the engine.
///
/// Queue assignment reserves its own slots; the engine claims a slot when a
/// reviewer is named on escalation and frees it whenever a workflow leaves
/// HUMAN_APPROVAL for good.
#[async_trait]
pub trait ReviewerWorkload: Send + Sync {
    /// Take a slot regardless of capacity. `None` if the editor is unknown.
    async fn claim(&self, editor_id: &EditorId) -> Option<u32>;

    async fn release(&self, editor_id: &EditorId);
}

/// Proof that the caller holds a workflow's mutual-exclusion lock
pub struct WorkflowLock {
    workflow_id: WorkflowId,
    _guard: OwnedMutexGuard<()>,
}

impl WorkflowLock {
    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowAnalytics {
    pub total: usize,
    pub active: usize,
    pub published: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Published share of finished workflows, in percent
    pub success_rate: f64,
    pub state_distribution: BTreeMap<WorkflowState, usize>,
    pub average_completion_ms: Option<f64>,
}

/// Owns every workflow state change.
///
/// All mutating operations on one workflow run under that workflow's lock;
/// different workflows proceed in parallel.
pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    hub: Arc<NotificationHub>,
    stats_cache: Arc<QueueStatsCache>,
    reviewers: Arc<dyn ReviewerWorkload>,
    config: EngineConfig,
    workflow_locks: LockRegistry<WorkflowId>,
    article_locks: LockRegistry<ArticleId>,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        hub: Arc<NotificationHub>,
        stats_cache: Arc<QueueStatsCache>,
        reviewers: Arc<dyn ReviewerWorkload>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            hub,
            stats_cache,
            reviewers,
            config,
            workflow_locks: LockRegistry::new(),
            article_locks: LockRegistry::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    pub async fn lock_workflow(&self, workflow_id: WorkflowId) -> WorkflowLock {
        WorkflowLock {
            workflow_id,
            _guard: self.workflow_locks.acquire(&workflow_id).await,
        }
    }

    /// Release a lock and forget it if the workflow has finished
    pub async fn release_lock(&self, lock: WorkflowLock, workflow: &Workflow) {
        let workflow_id = lock.workflow_id;
        drop(lock);
        if workflow.is_terminal() {
            self.workflow_locks.release_idle(&workflow_id).await;
        }
    }

    pub async fn create_workflow(&self, request: NewWorkflow) -> Result<Workflow, WorkflowError> {
        let span = create_workflow_span("create_workflow", None, None);
        async {
            let article_guard = self.article_locks.acquire(&request.article_id).await;
            let created = self.insert_new_workflow(&request).await;
            drop(article_guard);
            self.article_locks.release_idle(&request.article_id).await;

            let (workflow, transition) = created?;
            info!(
                workflow_id = %workflow.id,
                article_id = %workflow.article_id,
                workflow_type = %workflow.workflow_type,
                priority = %workflow.priority,
                "Workflow created"
            );
            self.after_commit(&workflow, Some(&transition));
            Ok(workflow)
        }
        .instrument(span)
        .await
    }

    /// Insert a fresh workflow; the caller holds the article lock
    async fn insert_new_workflow(
        &self,
        request: &NewWorkflow,
    ) -> Result<(Workflow, Transition), WorkflowError> {
        if let Some(existing) = self.store.find_active_by_article(&request.article_id).await? {
            return Err(WorkflowError::DuplicateWorkflow {
                article_id: request.article_id.clone(),
                existing: existing.id,
            });
        }

        let now = Utc::now();
        let id = WorkflowId::new();
        let workflow = Workflow {
            id,
            article_id: request.article_id.clone(),
            workflow_type: request.workflow_type,
            current_state: WorkflowState::Research,
            previous_state: None,
            priority: request.priority,
            assigned_reviewer_id: None,
            review_assigned_at: None,
            completion_percentage: 0.0,
            error_message: None,
            retry_count: 0,
            max_retries: request
                .max_retries
                .unwrap_or(self.config.default_max_retries)
                .max(1),
            revision_count: 0,
            metadata: request.metadata.clone(),
            created_at: now,
            updated_at: now,
            version: 1,
        };

        let transition = Transition::record(
            id,
            None,
            WorkflowState::Research,
            TransitionType::Created,
            Actor::System,
            None,
        );
        let mut commit = WorkflowCommit::new(workflow.clone(), 0);
        commit.transition = Some(transition.clone());
        commit.steps.push(Step::pending(id, WorkflowState::Research, 1, 1));
        self.store.insert_workflow(commit).await?;
        Ok((workflow, transition))
    }

    pub async fn get_workflow(&self, workflow_id: WorkflowId) -> Result<Workflow, WorkflowError> {
        self.store
            .get_workflow(workflow_id)
            .await?
            .ok_or(WorkflowError::NotFound { workflow_id })
    }

    pub async fn list_workflows(&self) -> Result<Vec<Workflow>, WorkflowError> {
        Ok(self.store.list_workflows().await?)
    }

    pub async fn steps(&self, workflow_id: WorkflowId) -> Result<Vec<Step>, WorkflowError> {
        Ok(self.store.steps_for(workflow_id).await?)
    }

    pub async fn transitions(&self, workflow_id: WorkflowId) -> Result<Vec<Transition>, WorkflowError> {
        Ok(self.store.transitions_for(workflow_id).await?)
    }

    /// The pending or running attempt of the workflow's current stage
    pub async fn open_step(&self, workflow_id: WorkflowId) -> Result<Option<Step>, WorkflowError> {
        let workflow = self.get_workflow(workflow_id).await?;
        let steps = self.store.steps_for(workflow_id).await?;
        Ok(open_step(&steps, workflow.current_state))
    }

    /// Mark the open step as claimed by an executor
    pub async fn start_step(
        &self,
        workflow_id: WorkflowId,
        step_id: StepId,
        assignee: &str,
    ) -> Result<Step, WorkflowError> {
        let lock = self.lock_workflow(workflow_id).await;
        let workflow = self.get_workflow(lock.workflow_id()).await?;
        ensure_active(&workflow, "start step")?;

        let steps = self.store.steps_for(workflow_id).await?;
        let mut step = match open_step(&steps, workflow.current_state) {
            Some(step) if step.id == step_id => step,
            _ => return Err(WorkflowError::StaleStep { workflow_id, step_id }),
        };

        step.status = StepStatus::Running;
        step.assignee_id = Some(assignee.to_string());
        step.started_at = Some(Utc::now());
        self.store.update_step(&step).await?;
        Ok(step)
    }

    pub async fn advance(
        &self,
        workflow_id: WorkflowId,
        request: AdvanceRequest,
    ) -> Result<AdvanceResult, WorkflowError> {
        let span = create_workflow_span("advance", Some(&workflow_id.to_string()), None);
        async {
            let lock = self.lock_workflow(workflow_id).await;
            let result = self
                .advance_inner(&lock, request, None, DecisionRecords::default())
                .await;
            if let Ok(result) = &result {
                self.release_lock(lock, &result.workflow).await;
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Advance while the caller already holds the workflow lock
    pub async fn advance_locked(
        &self,
        lock: &WorkflowLock,
        request: AdvanceRequest,
        records: DecisionRecords,
    ) -> Result<AdvanceResult, WorkflowError> {
        self.advance_inner(lock, request, None, records).await
    }

    /// Executor callback: a scored result advances, an error counts as a failing attempt.
    pub async fn report_stage_result(&self, report: StageReport) -> Result<AdvanceResult, WorkflowError> {
        let span = create_workflow_span(
            "report_stage_result",
            Some(&report.workflow_id.to_string()),
            None,
        );
        async {
            let lock = self.lock_workflow(report.workflow_id).await;
            let workflow = self.get_workflow(report.workflow_id).await?;
            ensure_active(&workflow, "report stage result for")?;

            let steps = self.store.steps_for(report.workflow_id).await?;
            match open_step(&steps, workflow.current_state) {
                Some(step) if step.id == report.step_id => {}
                _ => {
                    return Err(WorkflowError::StaleStep {
                        workflow_id: report.workflow_id,
                        step_id: report.step_id,
                    })
                }
            }

            let mut request = AdvanceRequest::new(Actor::Executor(report.executor));
            request.output = report.output;

            let result = match report.outcome {
                StageOutcome::Scored {
                    score,
                    metrics,
                    feedback,
                } => {
                    request.score = Some(score);
                    request.metrics = metrics;
                    request.feedback = feedback;
                    self.advance_inner(&lock, request, None, DecisionRecords::default())
                        .await?
                }
                StageOutcome::Failed { error } => {
                    self.advance_inner(&lock, request, Some(error), DecisionRecords::default())
                        .await?
                }
            };

            self.release_lock(lock, &result.workflow).await;
            Ok(result)
        }
        .instrument(span)
        .await
    }

    async fn advance_inner(
        &self,
        lock: &WorkflowLock,
        request: AdvanceRequest,
        stage_error: Option<String>,
        records: DecisionRecords,
    ) -> Result<AdvanceResult, WorkflowError> {
        let workflow_id = lock.workflow_id();
        let mut workflow = self.get_workflow(workflow_id).await?;
        ensure_active(&workflow, "advance")?;
        let before = workflow.clone();

        let stage = workflow.current_state;
        let config = stage_config(stage).ok_or(WorkflowError::InvalidState {
            workflow_id,
            state: stage,
            operation: "advance",
        })?;

        if !config.auto_advance_on_pass && request.triggered_by.editor().is_none() {
            return Err(WorkflowError::InvalidState {
                workflow_id,
                state: stage,
                operation: "auto-advance",
            });
        }
        for score in request.score.iter().chain(request.quality_override.iter()) {
            validate_score(*score)?;
        }

        let steps = self.store.steps_for(workflow_id).await?;
        let mut next_order = steps.iter().map(|step| step.order).max().unwrap_or(0) + 1;
        let mut step = match open_step(&steps, stage) {
            Some(step) => step,
            None => {
                let step = Step::pending(workflow_id, stage, next_order, 1);
                next_order += 1;
                step
            }
        };

        let now = Utc::now();
        let actor = request.triggered_by.clone();
        let quality = request.score.map(|score| {
            let mut quality =
                QualityScore::evaluate(stage, score, config.quality_threshold, actor.clone());
            quality.metrics = request.metrics.clone();
            quality.feedback = request.feedback.clone();
            quality
        });
        if request.output.is_some() {
            step.output = request.output.clone();
        }

        let failure = match (&stage_error, &quality) {
            (Some(error), _) => Some(format!("{} failed: {}", stage, error)),
            (None, Some(quality)) if config.auto_advance_on_pass && !quality.passed => Some(format!(
                "quality score {:.2} below threshold {:.2} at {}",
                quality.score, config.quality_threshold, stage
            )),
            _ => None,
        };

        let expected_version = workflow.version;
        let mut commit_steps = Vec::new();
        let mut transition = None;

        let outcome = if let Some(reason) = failure {
            workflow.retry_count += 1;
            let attempt = step.attempt;
            step.status = StepStatus::Failed;
            step.quality_score = quality;
            step.error_message = Some(reason.clone());
            step.completed_at = Some(now);
            commit_steps.push(step);

            if workflow.retry_count >= workflow.max_retries {
                let message = if stage_error.is_some() {
                    format!("stage execution failed after {} retries", workflow.retry_count)
                } else {
                    format!("quality threshold not met after {} retries", workflow.retry_count)
                };
                workflow.current_state = WorkflowState::Failed;
                workflow.error_message = Some(message.clone());
                transition = Some(Transition::record(
                    workflow_id,
                    Some(stage),
                    WorkflowState::Failed,
                    TransitionType::Advance,
                    actor,
                    Some(message),
                ));
                AdvanceOutcome::Failed {
                    stage,
                    retry_count: workflow.retry_count,
                }
            } else {
                workflow.error_message = Some(reason);
                commit_steps.push(Step::pending(workflow_id, stage, next_order, attempt + 1));
                AdvanceOutcome::Retrying {
                    stage,
                    retry_count: workflow.retry_count,
                }
            }
        } else {
            step.status = StepStatus::Completed;
            step.completed_at = Some(now);
            if let Some(editor) = actor.editor() {
                step.assignee_id = Some(editor.to_string());
                step.human_feedback = request.feedback.clone();
            }
            step.quality_score = match request.quality_override {
                Some(score) => {
                    let mut audit =
                        QualityScore::evaluate(stage, score, config.quality_threshold, actor.clone());
                    audit.feedback = request.feedback.clone();
                    Some(audit)
                }
                None => quality.clone(),
            };
            commit_steps.push(step);

            let in_band = match (&quality, &self.config.review_band) {
                (Some(quality), Some(band)) => band.contains(quality.score),
                _ => false,
            };
            let transitions = self.store.transitions_for(workflow_id).await?;
            let back_to_review = history::rolled_back_from(&transitions, stage)
                == Some(WorkflowState::HumanApproval);
            let escalate = stage != WorkflowState::HumanApproval
                && (config.requires_human_review || in_band || back_to_review);

            let to = if escalate {
                WorkflowState::HumanApproval
            } else {
                stage.next().ok_or(WorkflowError::InvalidState {
                    workflow_id,
                    state: stage,
                    operation: "advance",
                })?
            };

            workflow.current_state = to;
            workflow.error_message = None;
            if let Some(percentage) = to.completion_percentage() {
                workflow.completion_percentage = percentage;
            }
            if !to.is_terminal() {
                commit_steps.push(Step::pending(workflow_id, to, next_order, 1));
            }
            transition = Some(Transition::record(
                workflow_id,
                Some(stage),
                to,
                TransitionType::Advance,
                actor,
                if in_band {
                    Some("score within human review band".to_string())
                } else if escalate && back_to_review {
                    Some("returning to human approval after rollback".to_string())
                } else {
                    None
                },
            ));

            if escalate {
                AdvanceOutcome::Escalated { from: stage }
            } else {
                AdvanceOutcome::Advanced { from: stage, to }
            }
        };

        workflow.updated_at = now;
        workflow.version += 1;
        let mut commit = WorkflowCommit::new(workflow.clone(), expected_version);
        commit.transition = transition.clone();
        commit.steps = commit_steps;
        commit.review = records.review;
        commit.revision = records.revision;
        self.store.commit(commit).await?;

        match outcome {
            AdvanceOutcome::Advanced { from, to } => {
                info!(workflow_id = %workflow_id, from = %from, to = %to, "Workflow advanced");
            }
            AdvanceOutcome::Escalated { from } => {
                pipeline_metrics().record_escalation();
                info!(workflow_id = %workflow_id, from = %from, "Workflow escalated to human approval");
            }
            AdvanceOutcome::Retrying { stage, retry_count } => {
                pipeline_metrics().record_retry();
                warn!(
                    workflow_id = %workflow_id,
                    stage = %stage,
                    retry_count,
                    max_retries = workflow.max_retries,
                    "Quality gate failed, retrying stage"
                );
            }
            AdvanceOutcome::Failed { stage, retry_count } => {
                pipeline_metrics().record_failure();
                error!(
                    workflow_id = %workflow_id,
                    stage = %stage,
                    retry_count,
                    "Workflow failed after exhausting retries"
                );
            }
        }

        self.release_departing_reviewer(&before, &workflow).await;
        self.after_commit(&workflow, transition.as_ref());
        Ok(AdvanceResult { workflow, outcome })
    }

    pub async fn rollback(
        &self,
        workflow_id: WorkflowId,
        reason: &str,
        triggered_by: Actor,
    ) -> Result<Workflow, WorkflowError> {
        let lock = self.lock_workflow(workflow_id).await;
        self.rollback_locked(&lock, reason, triggered_by).await
    }

    pub async fn rollback_locked(
        &self,
        lock: &WorkflowLock,
        reason: &str,
        triggered_by: Actor,
    ) -> Result<Workflow, WorkflowError> {
        let workflow_id = lock.workflow_id();
        let workflow = self.get_workflow(workflow_id).await?;
        ensure_active(&workflow, "roll back")?;

        let transitions = self.store.transitions_for(workflow_id).await?;
        let target = history::rollback_target(&transitions)
            .ok_or(WorkflowError::NoPriorState { workflow_id })?;

        self.move_back(workflow, target, reason, triggered_by, DecisionRecords::default())
            .await
    }

    /// Send a workflow in HUMAN_APPROVAL back to the stage that produced its content
    pub async fn rollback_for_revision_locked(
        &self,
        lock: &WorkflowLock,
        reason: &str,
        triggered_by: Actor,
        records: DecisionRecords,
    ) -> Result<Workflow, WorkflowError> {
        let workflow_id = lock.workflow_id();
        let workflow = self.get_workflow(workflow_id).await?;
        if workflow.current_state != WorkflowState::HumanApproval {
            return Err(WorkflowError::InvalidState {
                workflow_id,
                state: workflow.current_state,
                operation: "request revision for",
            });
        }

        let transitions = self.store.transitions_for(workflow_id).await?;
        let target = history::revision_target(&transitions)
            .ok_or(WorkflowError::NoPriorState { workflow_id })?;

        self.move_back(workflow, target, reason, triggered_by, records).await
    }

    async fn move_back(
        &self,
        mut workflow: Workflow,
        target: WorkflowState,
        reason: &str,
        triggered_by: Actor,
        records: DecisionRecords,
    ) -> Result<Workflow, WorkflowError> {
        let workflow_id = workflow.id;
        let from = workflow.current_state;
        let before = workflow.clone();
        let now = Utc::now();

        let steps = self.store.steps_for(workflow_id).await?;
        let next_order = steps.iter().map(|step| step.order).max().unwrap_or(0) + 1;
        let mut commit_steps = Vec::new();
        if let Some(mut open) = open_step(&steps, from) {
            open.status = StepStatus::Failed;
            open.error_message = Some(format!("rolled back: {}", reason));
            open.completed_at = Some(now);
            if let Some(editor) = triggered_by.editor() {
                open.assignee_id = Some(editor.to_string());
                open.human_feedback = Some(reason.to_string());
            }
            commit_steps.push(open);
        }
        commit_steps.push(Step::pending(workflow_id, target, next_order, 1));

        let expected_version = workflow.version;
        workflow.previous_state = Some(from);
        workflow.current_state = target;
        if let Some(percentage) = target.completion_percentage() {
            workflow.completion_percentage = percentage;
        }
        if from == WorkflowState::HumanApproval {
            workflow.assigned_reviewer_id = None;
            workflow.review_assigned_at = None;
        }
        if records.revision.is_some() {
            workflow.revision_count += 1;
        }
        workflow.updated_at = now;
        workflow.version += 1;

        let transition = Transition::record(
            workflow_id,
            Some(from),
            target,
            TransitionType::Rollback,
            triggered_by,
            Some(reason.to_string()),
        );
        let mut commit = WorkflowCommit::new(workflow.clone(), expected_version);
        commit.transition = Some(transition.clone());
        commit.steps = commit_steps;
        commit.review = records.review;
        commit.revision = records.revision;
        self.store.commit(commit).await?;

        info!(workflow_id = %workflow_id, from = %from, to = %target, reason, "Workflow rolled back");
        self.release_departing_reviewer(&before, &workflow).await;
        self.after_commit(&workflow, Some(&transition));
        Ok(workflow)
    }

    pub async fn pause(
        &self,
        workflow_id: WorkflowId,
        reason: &str,
        triggered_by: Actor,
    ) -> Result<Workflow, WorkflowError> {
        let _lock = self.lock_workflow(workflow_id).await;
        let mut workflow = self.get_workflow(workflow_id).await?;
        let from = workflow.current_state;
        if from.is_terminal() || from == WorkflowState::Paused {
            return Err(WorkflowError::NotPausable {
                workflow_id,
                state: from,
            });
        }

        let expected_version = workflow.version;
        workflow.previous_state = Some(from);
        workflow.current_state = WorkflowState::Paused;
        workflow.updated_at = Utc::now();
        workflow.version += 1;

        let transition = Transition::record(
            workflow_id,
            Some(from),
            WorkflowState::Paused,
            TransitionType::Pause,
            triggered_by,
            Some(reason.to_string()),
        );
        let mut commit = WorkflowCommit::new(workflow.clone(), expected_version);
        commit.transition = Some(transition.clone());
        self.store.commit(commit).await?;

        info!(workflow_id = %workflow_id, from = %from, reason, "Workflow paused");
        self.after_commit(&workflow, Some(&transition));
        Ok(workflow)
    }

    pub async fn resume(&self, workflow_id: WorkflowId, triggered_by: Actor) -> Result<Workflow, WorkflowError> {
        let _lock = self.lock_workflow(workflow_id).await;
        let mut workflow = self.get_workflow(workflow_id).await?;
        if workflow.current_state != WorkflowState::Paused {
            return Err(WorkflowError::NotPaused {
                workflow_id,
                state: workflow.current_state,
            });
        }
        let target = workflow.previous_state.ok_or(WorkflowError::InvalidState {
            workflow_id,
            state: WorkflowState::Paused,
            operation: "resume",
        })?;

        let expected_version = workflow.version;
        workflow.current_state = target;
        workflow.previous_state = None;
        workflow.updated_at = Utc::now();
        workflow.version += 1;

        let transition = Transition::record(
            workflow_id,
            Some(WorkflowState::Paused),
            target,
            TransitionType::Resume,
            triggered_by,
            None,
        );
        let mut commit = WorkflowCommit::new(workflow.clone(), expected_version);
        commit.transition = Some(transition.clone());
        self.store.commit(commit).await?;

        info!(workflow_id = %workflow_id, to = %target, "Workflow resumed");
        self.after_commit(&workflow, Some(&transition));
        Ok(workflow)
    }

    /// Manual escalation to HUMAN_APPROVAL from any active stage
    pub async fn submit_for_human_review(
        &self,
        workflow_id: WorkflowId,
        reviewer_id: Option<EditorId>,
        triggered_by: Actor,
    ) -> Result<Workflow, WorkflowError> {
        let lock = self.lock_workflow(workflow_id).await;
        self.submit_for_human_review_locked(&lock, reviewer_id, triggered_by)
            .await
    }

    pub async fn submit_for_human_review_locked(
        &self,
        lock: &WorkflowLock,
        reviewer_id: Option<EditorId>,
        triggered_by: Actor,
    ) -> Result<Workflow, WorkflowError> {
        let workflow_id = lock.workflow_id();
        let mut workflow = self.get_workflow(workflow_id).await?;
        ensure_active(&workflow, "submit for human review")?;

        let from = workflow.current_state;
        if from == WorkflowState::HumanApproval {
            return match reviewer_id {
                Some(reviewer_id) => self.hand_to_reviewer_locked(lock, workflow, reviewer_id).await,
                None => Ok(workflow),
            };
        }

        let now = Utc::now();
        let steps = self.store.steps_for(workflow_id).await?;
        let next_order = steps.iter().map(|step| step.order).max().unwrap_or(0) + 1;
        let mut commit_steps = Vec::new();
        if let Some(mut open) = open_step(&steps, from) {
            open.status = StepStatus::Completed;
            open.completed_at = Some(now);
            commit_steps.push(open);
        }
        let mut approval_step = Step::pending(workflow_id, WorkflowState::HumanApproval, next_order, 1);
        approval_step.assignee_id = reviewer_id.as_ref().map(|id| id.to_string());
        commit_steps.push(approval_step);

        let expected_version = workflow.version;
        workflow.current_state = WorkflowState::HumanApproval;
        if let Some(percentage) = WorkflowState::HumanApproval.completion_percentage() {
            workflow.completion_percentage = percentage;
        }
        workflow.review_assigned_at = reviewer_id.as_ref().map(|_| now);
        workflow.assigned_reviewer_id = reviewer_id;
        workflow.updated_at = now;
        workflow.version += 1;

        let transition = Transition::record(
            workflow_id,
            Some(from),
            WorkflowState::HumanApproval,
            TransitionType::HumanReview,
            triggered_by,
            Some("manual escalation".to_string()),
        );
        let mut commit = WorkflowCommit::new(workflow.clone(), expected_version);
        commit.transition = Some(transition.clone());
        commit.steps = commit_steps;

        if let Some(reviewer_id) = &workflow.assigned_reviewer_id {
            self.claim_reviewer(workflow_id, reviewer_id).await?;
        }
        if let Err(e) = self.store.commit(commit).await {
            if let Some(reviewer_id) = &workflow.assigned_reviewer_id {
                self.reviewers.release(reviewer_id).await;
            }
            return Err(e.into());
        }

        pipeline_metrics().record_escalation();
        info!(
            workflow_id = %workflow_id,
            from = %from,
            reviewer_id = ?workflow.assigned_reviewer_id,
            "Workflow submitted for human review"
        );
        self.after_commit(&workflow, Some(&transition));
        if workflow.assigned_reviewer_id.is_some() {
            self.announce_reviewer(&workflow, None);
        }
        Ok(workflow)
    }

    /// Name a reviewer for a workflow already waiting in HUMAN_APPROVAL
    async fn hand_to_reviewer_locked(
        &self,
        lock: &WorkflowLock,
        workflow: Workflow,
        reviewer_id: EditorId,
    ) -> Result<Workflow, WorkflowError> {
        let previous = workflow.assigned_reviewer_id.clone();
        if previous.as_ref() == Some(&reviewer_id) {
            return Ok(workflow);
        }

        self.claim_reviewer(workflow.id, &reviewer_id).await?;
        let updated = match self.set_reviewer_locked(lock, Some(reviewer_id.clone())).await {
            Ok(updated) => updated,
            Err(e) => {
                self.reviewers.release(&reviewer_id).await;
                return Err(e);
            }
        };
        if let Some(previous) = &previous {
            self.reviewers.release(previous).await;
        }

        info!(
            workflow_id = %updated.id,
            reviewer_id = %reviewer_id,
            previous_reviewer_id = ?previous,
            "Reviewer named on escalation"
        );
        self.announce_reviewer(&updated, previous);
        Ok(updated)
    }

    async fn claim_reviewer(&self, workflow_id: WorkflowId, editor_id: &EditorId) -> Result<u32, WorkflowError> {
        let workload = self
            .reviewers
            .claim(editor_id)
            .await
            .ok_or_else(|| WorkflowError::UnknownReviewer {
                workflow_id,
                editor_id: editor_id.clone(),
            })?;
        debug!(workflow_id = %workflow_id, editor_id = %editor_id, workload, "Reviewer slot claimed");
        Ok(workload)
    }

    /// Free the reviewer's slot once a committed change ends their review cycle
    async fn release_departing_reviewer(&self, before: &Workflow, after: &Workflow) {
        let reviewing = before.current_state == WorkflowState::HumanApproval
            || (before.current_state == WorkflowState::Paused
                && before.previous_state == Some(WorkflowState::HumanApproval));
        let still_reviewing = matches!(
            after.current_state,
            WorkflowState::HumanApproval | WorkflowState::Paused
        );
        if !reviewing || still_reviewing {
            return;
        }

        if let Some(reviewer_id) = &before.assigned_reviewer_id {
            self.reviewers.release(reviewer_id).await;
            debug!(
                workflow_id = %after.id,
                editor_id = %reviewer_id,
                to = %after.current_state,
                "Reviewer slot released"
            );
        }
    }

    fn announce_reviewer(&self, workflow: &Workflow, previous: Option<EditorId>) {
        let Some(reviewer_id) = workflow.assigned_reviewer_id.clone() else {
            return;
        };
        let now = Utc::now();
        self.hub.publish(PipelineEvent::EditorAssigned(EditorAssigned {
            workflow_id: workflow.id,
            editor_id: reviewer_id.clone(),
            previous_editor_id: previous,
            manual: true,
            occurred_at: now,
        }));
        self.hub.publish(PipelineEvent::Notification(Notification::new(
            reviewer_id.as_str(),
            workflow.id,
            NotificationKind::Assigned,
            &workflow.display_title(),
            workflow.priority,
        )));
        self.hub.publish(PipelineEvent::QueueUpdated(QueueUpdated {
            workflow_id: workflow.id,
            change: QueueChange::Assigned,
            occurred_at: now,
        }));
    }

    /// Cancel from any non-terminal state; cancelling twice is a no-op.
    pub async fn cancel(
        &self,
        workflow_id: WorkflowId,
        reason: &str,
        triggered_by: Actor,
    ) -> Result<Workflow, WorkflowError> {
        let lock = self.lock_workflow(workflow_id).await;
        let workflow = self
            .cancel_locked(&lock, reason, triggered_by, DecisionRecords::default())
            .await?;
        self.release_lock(lock, &workflow).await;
        Ok(workflow)
    }

    pub async fn cancel_locked(
        &self,
        lock: &WorkflowLock,
        reason: &str,
        triggered_by: Actor,
        records: DecisionRecords,
    ) -> Result<Workflow, WorkflowError> {
        let workflow_id = lock.workflow_id();
        let mut workflow = self.get_workflow(workflow_id).await?;
        let before = workflow.clone();
        let from = workflow.current_state;
        match from {
            WorkflowState::Cancelled => return Ok(workflow),
            WorkflowState::Published | WorkflowState::Failed => {
                return Err(WorkflowError::InvalidState {
                    workflow_id,
                    state: from,
                    operation: "cancel",
                })
            }
            _ => {}
        }

        let now = Utc::now();
        let open_stage = if from == WorkflowState::Paused {
            workflow.previous_state.unwrap_or(from)
        } else {
            from
        };
        let steps = self.store.steps_for(workflow_id).await?;
        let mut commit_steps = Vec::new();
        if let Some(mut open) = open_step(&steps, open_stage) {
            open.status = StepStatus::Failed;
            open.error_message = Some(format!("cancelled: {}", reason));
            open.completed_at = Some(now);
            if let Some(editor) = triggered_by.editor() {
                open.assignee_id = Some(editor.to_string());
                open.human_feedback = Some(reason.to_string());
            }
            commit_steps.push(open);
        }

        let expected_version = workflow.version;
        workflow.current_state = WorkflowState::Cancelled;
        workflow.updated_at = now;
        workflow.version += 1;

        let transition = Transition::record(
            workflow_id,
            Some(from),
            WorkflowState::Cancelled,
            TransitionType::Cancel,
            triggered_by,
            Some(reason.to_string()),
        );
        let mut commit = WorkflowCommit::new(workflow.clone(), expected_version);
        commit.transition = Some(transition.clone());
        commit.steps = commit_steps;
        commit.review = records.review;
        commit.revision = records.revision;
        self.store.commit(commit).await?;

        info!(workflow_id = %workflow_id, from = %from, reason, "Workflow cancelled");
        self.release_departing_reviewer(&before, &workflow).await;
        self.after_commit(&workflow, Some(&transition));
        Ok(workflow)
    }

    /// Record the reviewer of a workflow waiting in HUMAN_APPROVAL. Editor
    /// workload is the caller's to adjust.
    pub async fn set_reviewer_locked(
        &self,
        lock: &WorkflowLock,
        reviewer_id: Option<EditorId>,
    ) -> Result<Workflow, WorkflowError> {
        let workflow_id = lock.workflow_id();
        let mut workflow = self.get_workflow(workflow_id).await?;
        if workflow.current_state != WorkflowState::HumanApproval {
            return Err(WorkflowError::InvalidState {
                workflow_id,
                state: workflow.current_state,
                operation: "assign a reviewer to",
            });
        }

        let now = Utc::now();
        let steps = self.store.steps_for(workflow_id).await?;
        let expected_version = workflow.version;
        workflow.review_assigned_at = reviewer_id.as_ref().map(|_| now);
        workflow.assigned_reviewer_id = reviewer_id;
        workflow.updated_at = now;
        workflow.version += 1;

        let mut commit = WorkflowCommit::new(workflow.clone(), expected_version);
        if let Some(mut open) = open_step(&steps, WorkflowState::HumanApproval) {
            open.assignee_id = workflow.assigned_reviewer_id.as_ref().map(|id| id.to_string());
            commit.steps.push(open);
        }
        self.store.commit(commit).await?;
        self.stats_cache.invalidate();
        Ok(workflow)
    }

    pub async fn workflow_analytics(&self) -> Result<WorkflowAnalytics, WorkflowError> {
        let workflows = self.store.list_workflows().await?;
        let mut analytics = WorkflowAnalytics {
            total: workflows.len(),
            ..WorkflowAnalytics::default()
        };

        let mut completion_total_ms = 0f64;
        for workflow in &workflows {
            *analytics
                .state_distribution
                .entry(workflow.current_state)
                .or_insert(0) += 1;
            match workflow.current_state {
                WorkflowState::Published => {
                    analytics.published += 1;
                    completion_total_ms +=
                        (workflow.updated_at - workflow.created_at).num_milliseconds() as f64;
                }
                WorkflowState::Failed => analytics.failed += 1,
                WorkflowState::Cancelled => analytics.cancelled += 1,
                _ => analytics.active += 1,
            }
        }

        let finished = analytics.published + analytics.failed + analytics.cancelled;
        if finished > 0 {
            analytics.success_rate = analytics.published as f64 / finished as f64 * 100.0;
        }
        if analytics.published > 0 {
            analytics.average_completion_ms = Some(completion_total_ms / analytics.published as f64);
        }
        Ok(analytics)
    }

    fn after_commit(&self, workflow: &Workflow, transition: Option<&Transition>) {
        let Some(transition) = transition else {
            return;
        };
        pipeline_metrics().record_transition();

        let touches_queue = transition.to_state == WorkflowState::HumanApproval
            || transition.from_state == Some(WorkflowState::HumanApproval);
        if touches_queue {
            self.stats_cache.invalidate();
        }

        self.hub.publish(PipelineEvent::StateChanged(
            WorkflowStateChanged::from_transition(workflow, transition),
        ));
    }
}

fn ensure_active(workflow: &Workflow, operation: &'static str) -> Result<(), WorkflowError> {
    if workflow.is_terminal() || workflow.current_state == WorkflowState::Paused {
        return Err(WorkflowError::InvalidState {
            workflow_id: workflow.id,
            state: workflow.current_state,
            operation,
        });
    }
    Ok(())
}

fn validate_score(score: f64) -> Result<(), WorkflowError> {
    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
        return Err(WorkflowError::InvalidScore { score });
    }
    Ok(())
}

/// Latest attempt of `stage` if it has not finished yet
fn open_step(steps: &[Step], stage: WorkflowState) -> Option<Step> {
    steps
        .iter()
        .filter(|step| step.stage == stage)
        .max_by_key(|step| step.order)
        .filter(|step| step.status.is_open())
        .cloned()
}
