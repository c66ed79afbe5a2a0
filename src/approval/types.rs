use crate::priority::Priority;
use crate::workflow::types::{
    ArticleId, ContentType, EditorId, Step, Transition, Workflow, WorkflowId, WorkflowState,
    WorkflowType,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// Waiting for an editor to be assigned
    Pending,
    /// Assigned and under review
    InReview,
}

/// Queue row derived from a workflow in HUMAN_APPROVAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalQueueItem {
    pub workflow_id: WorkflowId,
    pub article_id: ArticleId,
    pub title: String,
    pub workflow_type: WorkflowType,
    pub content_type: ContentType,
    pub status: ApprovalStatus,
    pub priority: Priority,
    pub assigned_editor_id: Option<EditorId>,
    pub review_assigned_at: Option<DateTime<Utc>>,
    pub language_code: String,
    pub ai_confidence_score: Option<f64>,
    pub submitted_at: DateTime<Utc>,
    pub revision_count: u32,
    pub estimated_review_minutes: u32,
}

impl ApprovalQueueItem {
    /// Build the queue view of a workflow. Returns `None` unless the
    /// workflow is currently waiting for human approval.
    pub fn project(
        workflow: &Workflow,
        steps: &[Step],
        transitions: &[Transition],
    ) -> Option<Self> {
        if workflow.current_state != WorkflowState::HumanApproval {
            return None;
        }

        let submitted_at = crate::workflow::history::last_entered(
            transitions,
            WorkflowState::HumanApproval,
        )
        .unwrap_or(workflow.updated_at);

        let ai_confidence_score = steps
            .iter()
            .rev()
            .filter(|step| step.stage != WorkflowState::HumanApproval)
            .find_map(|step| step.quality_score.as_ref().map(|score| score.score));

        let status = if workflow.assigned_reviewer_id.is_some() {
            ApprovalStatus::InReview
        } else {
            ApprovalStatus::Pending
        };

        Some(Self {
            workflow_id: workflow.id,
            article_id: workflow.article_id.clone(),
            title: workflow.display_title(),
            workflow_type: workflow.workflow_type,
            content_type: workflow.content_type(),
            status,
            priority: workflow.priority,
            assigned_editor_id: workflow.assigned_reviewer_id.clone(),
            review_assigned_at: workflow.review_assigned_at,
            language_code: workflow.metadata.language_code.clone(),
            ai_confidence_score,
            submitted_at,
            revision_count: workflow.revision_count,
            estimated_review_minutes: workflow.content_type().estimated_review_minutes(),
        })
    }
}

/// Queue filters; empty sets and `None` bounds match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueFilters {
    pub statuses: Vec<ApprovalStatus>,
    pub priorities: Vec<Priority>,
    pub content_types: Vec<ContentType>,
    pub assigned_editor_id: Option<EditorId>,
    pub language_code: Option<String>,
    pub submitted_after: Option<DateTime<Utc>>,
    pub submitted_before: Option<DateTime<Utc>>,
    pub min_confidence: Option<f64>,
    pub max_confidence: Option<f64>,
}

impl QueueFilters {
    pub fn matches(&self, item: &ApprovalQueueItem) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&item.status) {
            return false;
        }
        if !self.priorities.is_empty() && !self.priorities.contains(&item.priority) {
            return false;
        }
        if !self.content_types.is_empty() && !self.content_types.contains(&item.content_type) {
            return false;
        }
        if let Some(editor) = &self.assigned_editor_id {
            if item.assigned_editor_id.as_ref() != Some(editor) {
                return false;
            }
        }
        if let Some(language) = &self.language_code {
            if !item.language_code.eq_ignore_ascii_case(language) {
                return false;
            }
        }
        if let Some(after) = self.submitted_after {
            if item.submitted_at < after {
                return false;
            }
        }
        if let Some(before) = self.submitted_before {
            if item.submitted_at > before {
                return false;
            }
        }
        if self.min_confidence.is_some() || self.max_confidence.is_some() {
            let Some(score) = item.ai_confidence_score else {
                return false;
            };
            if self.min_confidence.is_some_and(|min| score < min) {
                return false;
            }
            if self.max_confidence.is_some_and(|max| score > max) {
                return false;
            }
        }
        true
    }
}

/// 1-indexed page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: Option<u32>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: None }
    }
}

impl Pagination {
    pub fn page(page: u32, limit: u32) -> Self {
        Self {
            page,
            limit: Some(limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuePage<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Accuracy,
    Clarity,
    Style,
    Grammar,
    Seo,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangePriority {
    MustFix,
    ShouldFix,
    NiceToHave,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestedChange {
    pub section: String,
    pub issue_type: IssueType,
    pub priority: ChangePriority,
    pub description: Option<String>,
    pub suggestion: Option<String>,
}

/// One revision request; appended, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub workflow_id: WorkflowId,
    pub revision_number: u32,
    pub requested_by: EditorId,
    pub requested_at: DateTime<Utc>,
    pub feedback: String,
    pub requested_changes: Vec<RequestedChange>,
    /// Filled on read once the workflow returns to human approval
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Approved,
    Rejected,
    RevisionRequested,
}

/// An editor's decision with the timing used for performance metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: Uuid,
    pub workflow_id: WorkflowId,
    pub editor_id: EditorId,
    pub content_type: ContentType,
    pub decision: ReviewDecision,
    pub review_started_at: DateTime<Utc>,
    pub decided_at: DateTime<Utc>,
    pub ai_confidence_score: Option<f64>,
    pub quality_override: Option<f64>,
}

impl ReviewRecord {
    pub fn review_time_ms(&self) -> i64 {
        (self.decided_at - self.review_started_at)
            .num_milliseconds()
            .max(0)
    }
}

/// Operation applied by `process_batch`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum BatchOperation {
    Approve {
        editor_id: EditorId,
        feedback: Option<String>,
        quality_override: Option<f64>,
    },
    Reject {
        editor_id: EditorId,
        feedback: String,
    },
    Assign {
        editor_id: Option<EditorId>,
    },
    RequestRevision {
        editor_id: EditorId,
        feedback: String,
        requested_changes: Vec<RequestedChange>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemError {
    pub workflow_id: WorkflowId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub success_count: usize,
    pub failed_count: usize,
    pub errors: Vec<BatchItemError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub workflow_id: WorkflowId,
    pub editor_id: EditorId,
    pub previous_editor_id: Option<EditorId>,
    pub manual: bool,
    /// Editor workload after the assignment
    pub workload: u32,
    pub max_workload: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorPerformance {
    pub editor_id: Option<EditorId>,
    pub window_days: u32,
    pub total_reviews: usize,
    pub approvals: usize,
    pub rejections: usize,
    pub revisions_requested: usize,
    /// Percentage of reviews that were approvals
    pub approval_rate: f64,
    /// Percentage of reviews that requested a revision
    pub revision_rate: f64,
    pub average_review_time_ms: f64,
    pub throughput_per_day: f64,
    /// Mean of override scores, falling back to the AI score per review
    pub average_quality_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub in_review: usize,
    pub by_status: BTreeMap<ApprovalStatus, usize>,
    pub by_priority: BTreeMap<Priority, usize>,
    pub by_content_type: BTreeMap<ContentType, usize>,
    /// Mean of now - submitted_at over unassigned items
    pub average_wait_time_ms: f64,
    pub average_review_time_ms: f64,
    pub oldest_pending_age_ms: Option<i64>,
    pub estimated_backlog_minutes: u32,
    /// Sum of priority weights over the queue
    pub priority_pressure: u32,
    pub computed_at: DateTime<Utc>,
}

/// Everything an editor needs to decide on one workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDetails {
    pub workflow: Workflow,
    pub queue_item: Option<ApprovalQueueItem>,
    pub steps: Vec<Step>,
    pub transitions: Vec<Transition>,
    pub revisions: Vec<Revision>,
    pub language_name: Option<String>,
}
