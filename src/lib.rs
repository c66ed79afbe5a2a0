// Content Workflow Library - content pipeline state machine and approval queue
// This exposes the core components for testing and integration

pub mod approval;
pub mod config;
pub mod executor;
pub mod notifications;
pub mod observability;
pub mod pipeline;
pub mod priority;
pub mod shutdown;
pub mod store;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use approval::{
    ApprovalError, ApprovalQueue, ApprovalQueueItem, ApprovalStatus, BatchOperation, BatchResult,
    EditorProfile, EditorRegistry, Pagination, QueueFilters, QueuePage, QueueStats,
    RequestedChange,
};
pub use config::{config, PipelineConfig};
pub use executor::{ExecutorError, PipelineRunner, SimulatedExecutor, StageExecutor};
pub use notifications::events::{Notification, NotificationKind, PipelineEvent};
pub use notifications::{NotificationHub, RecipientDirectory};
pub use observability::{pipeline_metrics, OperationTimer, PipelineMetrics};
pub use pipeline::Pipeline;
pub use priority::Priority;
pub use shutdown::{DeliveryTracker, ShutdownCoordinator};
pub use store::{InMemoryStore, StoreError, WorkflowCommit, WorkflowStore};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use workflow::{
    Actor, AdvanceOutcome, AdvanceRequest, AdvanceResult, NewWorkflow, Workflow, WorkflowEngine,
    WorkflowError, WorkflowId, WorkflowMetadata, WorkflowState, WorkflowType,
};
