use crate::store::StoreError;
use crate::workflow::errors::WorkflowError;
use crate::workflow::types::{ContentType, EditorId, WorkflowId};
use thiserror::Error;

/// Errors returned by approval queue operations
#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("Rejecting workflow {workflow_id} requires feedback")]
    FeedbackRequired { workflow_id: WorkflowId },

    #[error("Revision request for workflow {workflow_id} lists no changes")]
    EmptyRequestedChanges { workflow_id: WorkflowId },

    #[error("No available editor handles {content_type} in '{language_code}' for workflow {workflow_id}")]
    NoEligibleEditor {
        workflow_id: WorkflowId,
        content_type: ContentType,
        language_code: String,
    },

    #[error("Editor {editor_id} is not the reviewer of workflow {workflow_id}")]
    NotAssignedReviewer {
        workflow_id: WorkflowId,
        editor_id: EditorId,
    },

    #[error("Unknown editor {editor_id}")]
    UnknownEditor { editor_id: EditorId },

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}
