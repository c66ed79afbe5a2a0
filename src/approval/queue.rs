use super::editors::{Editor, EditorRegistry};
use super::errors::ApprovalError;
use super::stats::{compute_editor_performance, compute_queue_stats, QueueStatsCache};
use super::types::{
    ApprovalQueueItem, Assignment, BatchItemError, BatchOperation, BatchResult, EditorPerformance,
    QueueFilters, QueuePage, QueueStats, RequestedChange, ReviewDecision, ReviewDetails,
    ReviewRecord, Revision, Pagination,
};
use crate::config::QueueConfig;
use crate::notifications::events::{
    EditorAssigned, Notification, NotificationKind, PipelineEvent, QueueChange, QueueUpdated,
};
use crate::notifications::NotificationHub;
use crate::observability::{pipeline_metrics, OperationTimer};
use crate::store::WorkflowStore;
use crate::workflow::engine::{AdvanceRequest, DecisionRecords, WorkflowEngine, WorkflowLock};
use crate::workflow::errors::WorkflowError;
use crate::workflow::history;
use crate::workflow::types::{language_name, Actor, EditorId, Workflow, WorkflowId, WorkflowState};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Human approval queue over workflows waiting in HUMAN_APPROVAL.
///
/// The queue never writes workflow state itself. Decisions are validated
/// here and then applied through the engine while holding the workflow's
/// lock, so an editor decision cannot interleave with an automatic advance.
pub struct ApprovalQueue {
    engine: Arc<WorkflowEngine>,
    store: Arc<dyn WorkflowStore>,
    editors: Arc<EditorRegistry>,
    hub: Arc<NotificationHub>,
    stats_cache: Arc<QueueStatsCache>,
    config: QueueConfig,
}

impl ApprovalQueue {
    pub fn new(
        engine: Arc<WorkflowEngine>,
        editors: Arc<EditorRegistry>,
        hub: Arc<NotificationHub>,
        stats_cache: Arc<QueueStatsCache>,
        config: QueueConfig,
    ) -> Self {
        Self {
            store: engine.store().clone(),
            engine,
            editors,
            hub,
            stats_cache,
            config,
        }
    }

    pub fn editors(&self) -> &Arc<EditorRegistry> {
        &self.editors
    }

    /// Filtered, prioritized page of the queue
    pub async fn list_queue(
        &self,
        filters: &QueueFilters,
        pagination: Pagination,
    ) -> Result<QueuePage<ApprovalQueueItem>, ApprovalError> {
        let mut items: Vec<ApprovalQueueItem> = self
            .queue_items()
            .await?
            .into_iter()
            .filter(|item| filters.matches(item))
            .collect();
        items.sort_by(queue_order);

        let limit = pagination
            .limit
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size.max(1));
        let page = pagination.page.max(1);
        let total = items.len();
        let total_pages = total.div_ceil(limit as usize) as u32;

        let items = items
            .into_iter()
            .skip((page as usize - 1) * limit as usize)
            .take(limit as usize)
            .collect();

        Ok(QueuePage {
            items,
            total,
            page,
            total_pages,
        })
    }

    /// Assign a reviewer. Without `editor_id` the least-loaded eligible
    /// editor is chosen and capacity is enforced; a named editor is always
    /// assigned, even past capacity.
    pub async fn assign_editor(
        &self,
        workflow_id: WorkflowId,
        editor_id: Option<EditorId>,
    ) -> Result<Assignment, ApprovalError> {
        let lock = self.engine.lock_workflow(workflow_id).await;
        let workflow = self.engine.get_workflow(workflow_id).await?;
        require_human_approval(&workflow, "assign an editor to")?;
        let previous_editor_id = workflow.assigned_reviewer_id.clone();

        let manual = editor_id.is_some();
        let (editor, workload) = match editor_id {
            Some(editor_id) => {
                let editor = self
                    .editors
                    .get(&editor_id)
                    .await
                    .ok_or(ApprovalError::UnknownEditor { editor_id })?;
                if previous_editor_id.as_ref() == Some(&editor.id) {
                    return Ok(Assignment {
                        workflow_id,
                        editor_id: editor.id.clone(),
                        previous_editor_id,
                        manual,
                        workload: editor.workload(),
                        max_workload: editor.max_workload,
                    });
                }
                let workload = editor.force_reserve();
                if workload > editor.max_workload {
                    warn!(
                        workflow_id = %workflow_id,
                        editor_id = %editor.id,
                        workload,
                        max_workload = editor.max_workload,
                        "Manual assignment exceeds editor capacity"
                    );
                }
                (editor, workload)
            }
            None => self.reserve_best_editor(&workflow).await?,
        };

        if let Err(e) = self
            .engine
            .set_reviewer_locked(&lock, Some(editor.id.clone()))
            .await
        {
            editor.release();
            return Err(e.into());
        }
        drop(lock);

        if let Some(previous) = &previous_editor_id {
            if let Some(previous_editor) = self.editors.get(previous).await {
                previous_editor.release();
            }
        }

        info!(
            workflow_id = %workflow_id,
            editor_id = %editor.id,
            previous_editor_id = ?previous_editor_id,
            manual,
            workload,
            "Editor assigned"
        );

        let now = Utc::now();
        self.hub.publish(PipelineEvent::EditorAssigned(EditorAssigned {
            workflow_id,
            editor_id: editor.id.clone(),
            previous_editor_id: previous_editor_id.clone(),
            manual,
            occurred_at: now,
        }));
        self.hub.publish(PipelineEvent::Notification(Notification::new(
            editor.id.as_str(),
            workflow_id,
            NotificationKind::Assigned,
            &workflow.display_title(),
            workflow.priority,
        )));
        self.hub.publish(PipelineEvent::QueueUpdated(QueueUpdated {
            workflow_id,
            change: QueueChange::Assigned,
            occurred_at: now,
        }));

        Ok(Assignment {
            workflow_id,
            editor_id: editor.id.clone(),
            previous_editor_id,
            manual,
            workload,
            max_workload: editor.max_workload,
        })
    }

    async fn reserve_best_editor(&self, workflow: &Workflow) -> Result<(Arc<Editor>, u32), ApprovalError> {
        let content_type = workflow.content_type();
        let language_code = workflow.metadata.language_code.as_str();

        let mut candidates: Vec<Arc<Editor>> = self
            .editors
            .eligible(content_type, language_code)
            .await
            .into_iter()
            .filter(|editor| workflow.assigned_reviewer_id.as_ref() != Some(&editor.id))
            .collect();

        if !candidates.is_empty() {
            let rates = self.approval_rates().await?;
            let rate = |editor: &Editor| rates.get(&editor.id).copied().unwrap_or(0.0);
            candidates.sort_by(|a, b| {
                a.workload()
                    .cmp(&b.workload())
                    .then_with(|| rate(b).partial_cmp(&rate(a)).unwrap_or(Ordering::Equal))
                    .then_with(|| a.id.cmp(&b.id))
            });
        }

        // Workloads may have moved since the snapshot; the CAS decides.
        for editor in candidates {
            if let Some(workload) = editor.try_reserve() {
                return Ok((editor, workload));
            }
            debug!(editor_id = %editor.id, "Editor filled up during assignment, trying next");
        }

        Err(ApprovalError::NoEligibleEditor {
            workflow_id: workflow.id,
            content_type,
            language_code: language_code.to_string(),
        })
    }

    async fn approval_rates(&self) -> Result<HashMap<EditorId, f64>, ApprovalError> {
        let records = self.store.review_records(self.window_start()).await?;
        let mut by_editor: HashMap<EditorId, Vec<ReviewRecord>> = HashMap::new();
        for record in records {
            by_editor.entry(record.editor_id.clone()).or_default().push(record);
        }
        Ok(by_editor
            .into_iter()
            .map(|(editor_id, records)| {
                let performance = compute_editor_performance(None, &records, self.config.metrics_window_days);
                (editor_id, performance.approval_rate)
            })
            .collect())
    }

    pub async fn approve(
        &self,
        workflow_id: WorkflowId,
        editor_id: &EditorId,
        feedback: Option<String>,
        quality_override: Option<f64>,
    ) -> Result<Workflow, ApprovalError> {
        let timer = OperationTimer::new("approve");
        let lock = self.engine.lock_workflow(workflow_id).await;
        let workflow = self.engine.get_workflow(workflow_id).await?;
        require_human_approval(&workflow, "approve")?;
        self.authorize(&workflow, editor_id).await?;

        let mut record = self
            .review_record(&workflow, editor_id, ReviewDecision::Approved)
            .await?;
        record.quality_override = quality_override;

        let mut request = AdvanceRequest::new(Actor::Editor(editor_id.clone()))
            .with_quality_override(quality_override);
        request.feedback = feedback;

        let result = self
            .engine
            .advance_locked(
                &lock,
                request,
                DecisionRecords {
                    review: Some(record),
                    revision: None,
                },
            )
            .await?;

        pipeline_metrics().record_approval();
        info!(
            workflow_id = %workflow_id,
            editor_id = %editor_id,
            to = %result.workflow.current_state,
            "Content approved"
        );
        self.finish_decision(lock, &workflow, &result.workflow, NotificationKind::Approved)
            .await;
        timer.finish();
        Ok(result.workflow)
    }

    pub async fn reject(
        &self,
        workflow_id: WorkflowId,
        editor_id: &EditorId,
        feedback: &str,
    ) -> Result<Workflow, ApprovalError> {
        if feedback.trim().is_empty() {
            return Err(ApprovalError::FeedbackRequired { workflow_id });
        }

        let lock = self.engine.lock_workflow(workflow_id).await;
        let workflow = self.engine.get_workflow(workflow_id).await?;
        require_human_approval(&workflow, "reject")?;
        self.authorize(&workflow, editor_id).await?;

        let record = self
            .review_record(&workflow, editor_id, ReviewDecision::Rejected)
            .await?;
        let cancelled = self
            .engine
            .cancel_locked(
                &lock,
                feedback,
                Actor::Editor(editor_id.clone()),
                DecisionRecords {
                    review: Some(record),
                    revision: None,
                },
            )
            .await?;

        pipeline_metrics().record_rejection();
        info!(workflow_id = %workflow_id, editor_id = %editor_id, "Content rejected");
        self.finish_decision(lock, &workflow, &cancelled, NotificationKind::Rejected)
            .await;
        Ok(cancelled)
    }

    pub async fn request_revision(
        &self,
        workflow_id: WorkflowId,
        editor_id: &EditorId,
        feedback: &str,
        requested_changes: Vec<RequestedChange>,
    ) -> Result<Workflow, ApprovalError> {
        if requested_changes.is_empty() {
            return Err(ApprovalError::EmptyRequestedChanges { workflow_id });
        }

        let lock = self.engine.lock_workflow(workflow_id).await;
        let workflow = self.engine.get_workflow(workflow_id).await?;
        require_human_approval(&workflow, "request revision for")?;
        self.authorize(&workflow, editor_id).await?;

        let record = self
            .review_record(&workflow, editor_id, ReviewDecision::RevisionRequested)
            .await?;
        let revision = Revision {
            workflow_id,
            revision_number: workflow.revision_count + 1,
            requested_by: editor_id.clone(),
            requested_at: record.decided_at,
            feedback: feedback.to_string(),
            requested_changes,
            completed_at: None,
        };
        let revision_number = revision.revision_number;

        let reason = if feedback.trim().is_empty() {
            format!("revision {} requested", revision_number)
        } else {
            feedback.to_string()
        };
        let rolled_back = self
            .engine
            .rollback_for_revision_locked(
                &lock,
                &reason,
                Actor::Editor(editor_id.clone()),
                DecisionRecords {
                    review: Some(record),
                    revision: Some(revision),
                },
            )
            .await?;

        pipeline_metrics().record_revision();
        info!(
            workflow_id = %workflow_id,
            editor_id = %editor_id,
            revision_number,
            to = %rolled_back.current_state,
            "Revision requested"
        );
        self.finish_decision(lock, &workflow, &rolled_back, NotificationKind::RevisionRequested)
            .await;
        Ok(rolled_back)
    }

    /// Apply one operation to many workflows. Items are independent: a
    /// failure is recorded and the batch moves on.
    pub async fn process_batch(&self, workflow_ids: &[WorkflowId], operation: &BatchOperation) -> BatchResult {
        let mut result = BatchResult::default();

        for &workflow_id in workflow_ids {
            let outcome = match operation {
                BatchOperation::Approve {
                    editor_id,
                    feedback,
                    quality_override,
                } => self
                    .approve(workflow_id, editor_id, feedback.clone(), *quality_override)
                    .await
                    .map(|_| ()),
                BatchOperation::Reject { editor_id, feedback } => {
                    self.reject(workflow_id, editor_id, feedback).await.map(|_| ())
                }
                BatchOperation::Assign { editor_id } => self
                    .assign_editor(workflow_id, editor_id.clone())
                    .await
                    .map(|_| ()),
                BatchOperation::RequestRevision {
                    editor_id,
                    feedback,
                    requested_changes,
                } => self
                    .request_revision(workflow_id, editor_id, feedback, requested_changes.clone())
                    .await
                    .map(|_| ()),
            };

            match outcome {
                Ok(()) => result.success_count += 1,
                Err(e) => {
                    debug!(workflow_id = %workflow_id, error = %e, "Batch item failed");
                    result.failed_count += 1;
                    result.errors.push(BatchItemError {
                        workflow_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            total = workflow_ids.len(),
            succeeded = result.success_count,
            failed = result.failed_count,
            "Batch processed"
        );
        result
    }

    /// Performance over the configured rolling window; `None` aggregates all editors
    pub async fn editor_performance_metrics(
        &self,
        editor_id: Option<&EditorId>,
    ) -> Result<EditorPerformance, ApprovalError> {
        if let Some(editor_id) = editor_id {
            if self.editors.get(editor_id).await.is_none() {
                return Err(ApprovalError::UnknownEditor {
                    editor_id: editor_id.clone(),
                });
            }
        }

        let records: Vec<ReviewRecord> = self
            .store
            .review_records(self.window_start())
            .await?
            .into_iter()
            .filter(|record| editor_id.map_or(true, |id| &record.editor_id == id))
            .collect();

        Ok(compute_editor_performance(
            editor_id.cloned(),
            &records,
            self.config.metrics_window_days,
        ))
    }

    pub async fn queue_stats(&self) -> Result<QueueStats, ApprovalError> {
        if let Some(stats) = self.stats_cache.get().await {
            return Ok(stats);
        }

        let generation = self.stats_cache.generation();
        let items = self.queue_items().await?;
        let records = self.store.review_records(self.window_start()).await?;
        let stats = compute_queue_stats(&items, &records, Utc::now());
        self.stats_cache.put(generation, stats.clone()).await;
        Ok(stats)
    }

    pub async fn review_details(&self, workflow_id: WorkflowId) -> Result<ReviewDetails, ApprovalError> {
        let workflow = self.engine.get_workflow(workflow_id).await?;
        let steps = self.store.steps_for(workflow_id).await?;
        let transitions = self.store.transitions_for(workflow_id).await?;
        let revisions = self.revision_history(workflow_id).await?;
        let queue_item = ApprovalQueueItem::project(&workflow, &steps, &transitions);
        let language_name = language_name(&workflow.metadata.language_code).map(str::to_string);

        Ok(ReviewDetails {
            workflow,
            queue_item,
            steps,
            transitions,
            revisions,
            language_name,
        })
    }

    /// Revisions in request order. A revision is complete once the workflow
    /// re-entered human approval after it was requested.
    pub async fn revision_history(&self, workflow_id: WorkflowId) -> Result<Vec<Revision>, ApprovalError> {
        let mut revisions = self.store.revisions_for(workflow_id).await?;
        let transitions = self.store.transitions_for(workflow_id).await?;

        for revision in &mut revisions {
            revision.completed_at = transitions
                .iter()
                .filter(|t| t.to_state == WorkflowState::HumanApproval && t.created_at > revision.requested_at)
                .map(|t| t.created_at)
                .min();
        }
        revisions.sort_by_key(|revision| revision.revision_number);
        Ok(revisions)
    }

    async fn queue_items(&self) -> Result<Vec<ApprovalQueueItem>, ApprovalError> {
        let workflows = self.store.list_in_state(WorkflowState::HumanApproval).await?;
        let mut items = Vec::with_capacity(workflows.len());
        for workflow in workflows {
            let steps = self.store.steps_for(workflow.id).await?;
            let transitions = self.store.transitions_for(workflow.id).await?;
            if let Some(item) = ApprovalQueueItem::project(&workflow, &steps, &transitions) {
                items.push(item);
            }
        }
        Ok(items)
    }

    async fn authorize(&self, workflow: &Workflow, editor_id: &EditorId) -> Result<(), ApprovalError> {
        let editor = self
            .editors
            .get(editor_id)
            .await
            .ok_or_else(|| ApprovalError::UnknownEditor {
                editor_id: editor_id.clone(),
            })?;

        if workflow.assigned_reviewer_id.as_ref() == Some(editor_id) || editor.can_override {
            return Ok(());
        }
        Err(ApprovalError::NotAssignedReviewer {
            workflow_id: workflow.id,
            editor_id: editor_id.clone(),
        })
    }

    async fn review_record(
        &self,
        workflow: &Workflow,
        editor_id: &EditorId,
        decision: ReviewDecision,
    ) -> Result<ReviewRecord, ApprovalError> {
        let steps = self.store.steps_for(workflow.id).await?;
        let transitions = self.store.transitions_for(workflow.id).await?;
        let submitted_at = history::last_entered(&transitions, WorkflowState::HumanApproval)
            .unwrap_or(workflow.updated_at);
        let ai_confidence_score = ApprovalQueueItem::project(workflow, &steps, &transitions)
            .and_then(|item| item.ai_confidence_score);

        Ok(ReviewRecord {
            id: Uuid::new_v4(),
            workflow_id: workflow.id,
            editor_id: editor_id.clone(),
            content_type: workflow.content_type(),
            decision,
            review_started_at: workflow.review_assigned_at.unwrap_or(submitted_at),
            decided_at: Utc::now(),
            ai_confidence_score,
            quality_override: None,
        })
    }

    /// Bookkeeping after a decision commit: tell the author and announce the
    /// queue change. The engine has already freed the reviewer's slot.
    async fn finish_decision(
        &self,
        lock: WorkflowLock,
        before: &Workflow,
        after: &Workflow,
        kind: NotificationKind,
    ) {
        self.engine.release_lock(lock, after).await;

        if let Some(author_id) = &before.metadata.author_id {
            self.hub.publish(PipelineEvent::Notification(Notification::new(
                author_id.as_str(),
                before.id,
                kind,
                &before.display_title(),
                before.priority,
            )));
        }

        self.hub.publish(PipelineEvent::QueueUpdated(QueueUpdated {
            workflow_id: before.id,
            change: QueueChange::Decided,
            occurred_at: Utc::now(),
        }));
        self.stats_cache.invalidate();
    }

    fn window_start(&self) -> DateTime<Utc> {
        Utc::now() - self.config.metrics_window()
    }
}

/// Priority descending, then oldest submission first
fn queue_order(a: &ApprovalQueueItem, b: &ApprovalQueueItem) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.submitted_at.cmp(&b.submitted_at))
}

fn require_human_approval(workflow: &Workflow, operation: &'static str) -> Result<(), ApprovalError> {
    if workflow.current_state != WorkflowState::HumanApproval {
        return Err(WorkflowError::InvalidState {
            workflow_id: workflow.id,
            state: workflow.current_state,
            operation,
        }
        .into());
    }
    Ok(())
}
