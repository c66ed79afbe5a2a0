//! Per-article content workflow state machine.

pub mod engine;
pub mod errors;
pub mod history;
pub mod locks;
pub mod stages;
pub mod types;

pub use engine::{
    AdvanceOutcome, AdvanceRequest, AdvanceResult, DecisionRecords, NewWorkflow, StageOutcome,
    ReviewerWorkload, StageReport, WorkflowAnalytics, WorkflowEngine, WorkflowLock,
};
pub use errors::WorkflowError;
pub use types::{
    Actor, ArticleId, ContentType, EditorId, QualityMetrics, QualityScore, StageOutput, Step,
    StepId, StepStatus, Transition, TransitionType, Workflow, WorkflowId, WorkflowMetadata,
    WorkflowState, WorkflowType,
};
