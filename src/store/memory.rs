use super::{StoreError, WorkflowCommit, WorkflowStore};
use crate::approval::types::{Revision, ReviewRecord};
use crate::notifications::events::Notification;
use crate::workflow::types::{ArticleId, Step, Transition, Workflow, WorkflowId, WorkflowState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    workflows: HashMap<WorkflowId, Workflow>,
    steps: HashMap<WorkflowId, Vec<Step>>,
    transitions: HashMap<WorkflowId, Vec<Transition>>,
    revisions: HashMap<WorkflowId, Vec<Revision>>,
    reviews: Vec<ReviewRecord>,
    notifications: Vec<Notification>,
}

impl Tables {
    fn apply(&mut self, commit: WorkflowCommit) {
        let id = commit.workflow.id;

        if let Some(transition) = commit.transition {
            self.transitions.entry(id).or_default().push(transition);
        }

        let steps = self.steps.entry(id).or_default();
        for step in commit.steps {
            match steps.iter_mut().find(|existing| existing.id == step.id) {
                Some(existing) => *existing = step,
                None => steps.push(step),
            }
        }

        if let Some(revision) = commit.revision {
            self.revisions.entry(id).or_default().push(revision);
        }
        if let Some(review) = commit.review {
            self.reviews.push(review);
        }

        self.workflows.insert(id, commit.workflow);
    }
}

/// Process-local store used by the CLI and the test suite.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail with [`StoreError::Unavailable`] until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "in-memory store switched off".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn insert_workflow(&self, commit: WorkflowCommit) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let id = commit.workflow.id;
        if tables.workflows.contains_key(&id) {
            return Err(StoreError::AlreadyExists { workflow_id: id });
        }
        tables.apply(commit);
        Ok(())
    }

    async fn commit(&self, commit: WorkflowCommit) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let id = commit.workflow.id;
        let stored = tables
            .workflows
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("workflow {}", id)))?;

        if stored.version != commit.expected_version {
            return Err(StoreError::VersionConflict {
                workflow_id: id,
                expected: commit.expected_version,
                found: stored.version,
            });
        }

        tables.apply(commit);
        Ok(())
    }

    async fn get_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, StoreError> {
        Ok(self.tables.read().await.workflows.get(&id).cloned())
    }

    async fn find_active_by_article(&self, article_id: &ArticleId) -> Result<Option<Workflow>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .workflows
            .values()
            .find(|workflow| &workflow.article_id == article_id && !workflow.is_terminal())
            .cloned())
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
        let tables = self.tables.read().await;
        let mut workflows: Vec<Workflow> = tables.workflows.values().cloned().collect();
        workflows.sort_by_key(|workflow| workflow.created_at);
        Ok(workflows)
    }

    async fn list_in_state(&self, state: WorkflowState) -> Result<Vec<Workflow>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .workflows
            .values()
            .filter(|workflow| workflow.current_state == state)
            .cloned()
            .collect())
    }

    async fn steps_for(&self, id: WorkflowId) -> Result<Vec<Step>, StoreError> {
        let tables = self.tables.read().await;
        let mut steps = tables.steps.get(&id).cloned().unwrap_or_default();
        steps.sort_by_key(|step| step.order);
        Ok(steps)
    }

    async fn update_step(&self, step: &Step) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let existing = tables
            .steps
            .get_mut(&step.workflow_id)
            .and_then(|steps| steps.iter_mut().find(|existing| existing.id == step.id))
            .ok_or_else(|| StoreError::NotFound(format!("step {}", step.id)))?;
        *existing = step.clone();
        Ok(())
    }

    async fn transitions_for(&self, id: WorkflowId) -> Result<Vec<Transition>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .transitions
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn revisions_for(&self, id: WorkflowId) -> Result<Vec<Revision>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .revisions
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn review_records(&self, since: DateTime<Utc>) -> Result<Vec<ReviewRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .reviews
            .iter()
            .filter(|record| record.decided_at >= since)
            .cloned()
            .collect())
    }

    async fn append_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        self.check_writable()?;
        self.tables
            .write()
            .await
            .notifications
            .push(notification.clone());
        Ok(())
    }

    async fn notifications_for(&self, recipient_id: &str) -> Result<Vec<Notification>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .iter()
            .filter(|notification| notification.recipient_id == recipient_id)
            .cloned()
            .collect())
    }
}
