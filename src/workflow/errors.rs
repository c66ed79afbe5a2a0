use super::types::{ArticleId, EditorId, StepId, WorkflowId, WorkflowState};
use crate::store::StoreError;
use thiserror::Error;

/// Errors returned by workflow engine operations
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Workflow {workflow_id} not found")]
    NotFound { workflow_id: WorkflowId },

    #[error("Cannot {operation} workflow {workflow_id} while in state {state}")]
    InvalidState {
        workflow_id: WorkflowId,
        state: WorkflowState,
        operation: &'static str,
    },

    #[error("Article {article_id} already has active workflow {existing}")]
    DuplicateWorkflow {
        article_id: ArticleId,
        existing: WorkflowId,
    },

    #[error("Workflow {workflow_id} has no prior state to roll back to")]
    NoPriorState { workflow_id: WorkflowId },

    #[error("Workflow {workflow_id} cannot be paused from state {state}")]
    NotPausable {
        workflow_id: WorkflowId,
        state: WorkflowState,
    },

    #[error("Workflow {workflow_id} is not paused (state {state})")]
    NotPaused {
        workflow_id: WorkflowId,
        state: WorkflowState,
    },

    #[error("Step {step_id} is not the open step of workflow {workflow_id}")]
    StaleStep {
        workflow_id: WorkflowId,
        step_id: StepId,
    },

    #[error("Cannot name unknown editor {editor_id} as reviewer of workflow {workflow_id}")]
    UnknownReviewer {
        workflow_id: WorkflowId,
        editor_id: EditorId,
    },

    #[error("Quality score {score} is outside [0, 1]")]
    InvalidScore { score: f64 },

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl WorkflowError {
    /// Errors a caller can resolve by issuing a different command
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, WorkflowError::Persistence(_))
    }
}
