//! Persistence contract for workflows and their audit records.
//!
//! Transitions, revisions, review records and notifications are append-only.
//! Workflow updates go through [`WorkflowCommit`], which writes the workflow,
//! its transition and any step or decision records as one unit.

mod memory;

pub use memory::InMemoryStore;

use crate::approval::types::{Revision, ReviewRecord};
use crate::notifications::events::Notification;
use crate::workflow::types::{ArticleId, Step, Transition, Workflow, WorkflowId, WorkflowState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Workflow {workflow_id} already exists")]
    AlreadyExists { workflow_id: WorkflowId },

    #[error("Version conflict on workflow {workflow_id}: expected {expected}, found {found}")]
    VersionConflict {
        workflow_id: WorkflowId,
        expected: u64,
        found: u64,
    },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Everything a single engine operation writes.
#[derive(Debug, Clone)]
pub struct WorkflowCommit {
    /// New workflow row; its `version` must be `expected_version + 1`
    pub workflow: Workflow,
    pub expected_version: u64,
    pub transition: Option<Transition>,
    /// Inserted, or replaced when a step with the same id exists
    pub steps: Vec<Step>,
    pub revision: Option<Revision>,
    pub review: Option<ReviewRecord>,
}

impl WorkflowCommit {
    pub fn new(workflow: Workflow, expected_version: u64) -> Self {
        Self {
            workflow,
            expected_version,
            transition: None,
            steps: Vec::new(),
            revision: None,
            review: None,
        }
    }
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Persist a freshly created workflow with its initial transition and step
    async fn insert_workflow(&self, commit: WorkflowCommit) -> Result<(), StoreError>;

    /// Apply a commit if the stored version still matches
    async fn commit(&self, commit: WorkflowCommit) -> Result<(), StoreError>;

    async fn get_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, StoreError>;

    async fn find_active_by_article(&self, article_id: &ArticleId) -> Result<Option<Workflow>, StoreError>;

    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError>;

    async fn list_in_state(&self, state: WorkflowState) -> Result<Vec<Workflow>, StoreError>;

    async fn steps_for(&self, id: WorkflowId) -> Result<Vec<Step>, StoreError>;

    async fn update_step(&self, step: &Step) -> Result<(), StoreError>;

    async fn transitions_for(&self, id: WorkflowId) -> Result<Vec<Transition>, StoreError>;

    async fn revisions_for(&self, id: WorkflowId) -> Result<Vec<Revision>, StoreError>;

    async fn review_records(&self, since: DateTime<Utc>) -> Result<Vec<ReviewRecord>, StoreError>;

    async fn append_notification(&self, notification: &Notification) -> Result<(), StoreError>;

    async fn notifications_for(&self, recipient_id: &str) -> Result<Vec<Notification>, StoreError>;
}
