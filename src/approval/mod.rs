//! Human approval queue: projection of workflows waiting in
//! HUMAN_APPROVAL, editor assignment and review decisions.

pub mod editors;
pub mod errors;
pub mod queue;
pub mod stats;
pub mod types;

pub use editors::{Editor, EditorProfile, EditorRegistry, EditorSnapshot};
pub use errors::ApprovalError;
pub use queue::ApprovalQueue;
pub use stats::QueueStatsCache;
pub use types::{
    ApprovalQueueItem, ApprovalStatus, Assignment, BatchOperation, BatchResult, ChangePriority,
    EditorPerformance, IssueType, Pagination, QueueFilters, QueuePage, QueueStats,
    RequestedChange, ReviewDecision, ReviewDetails, ReviewRecord, Revision,
};
