use crate::priority::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a workflow (one per article in production)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(Uuid);

impl WorkflowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WorkflowId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifier of a single stage attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(Uuid);

impl StepId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StepId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ArticleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditorId(String);

impl EditorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EditorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EditorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Every state a workflow can occupy.
///
/// The first seven variants form the linear production path. `Published`,
/// `Failed` and `Cancelled` are terminal; `Paused` suspends any non-terminal
/// state and remembers it in `previous_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Research,
    ResearchReview,
    ContentGeneration,
    ContentReview,
    Translation,
    TranslationReview,
    HumanApproval,
    Published,
    Failed,
    Paused,
    Cancelled,
}

impl WorkflowState {
    /// The ordered production states; progress is measured against these only.
    pub const PRODUCTION: [WorkflowState; 7] = [
        WorkflowState::Research,
        WorkflowState::ResearchReview,
        WorkflowState::ContentGeneration,
        WorkflowState::ContentReview,
        WorkflowState::Translation,
        WorkflowState::TranslationReview,
        WorkflowState::HumanApproval,
    ];

    pub const ALL: [WorkflowState; 11] = [
        WorkflowState::Research,
        WorkflowState::ResearchReview,
        WorkflowState::ContentGeneration,
        WorkflowState::ContentReview,
        WorkflowState::Translation,
        WorkflowState::TranslationReview,
        WorkflowState::HumanApproval,
        WorkflowState::Published,
        WorkflowState::Failed,
        WorkflowState::Paused,
        WorkflowState::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowState::Published | WorkflowState::Failed | WorkflowState::Cancelled
        )
    }

    pub fn production_index(self) -> Option<usize> {
        Self::PRODUCTION.iter().position(|state| *state == self)
    }

    /// Nominal successor on the production path
    pub fn next(self) -> Option<WorkflowState> {
        match self {
            WorkflowState::HumanApproval => Some(WorkflowState::Published),
            other => other
                .production_index()
                .and_then(|index| Self::PRODUCTION.get(index + 1).copied()),
        }
    }

    /// Progress for states on the production path. HUMAN_APPROVAL counts as
    /// reached (6/7); side states have no value of their own.
    pub fn completion_percentage(self) -> Option<f64> {
        if self == WorkflowState::Published {
            return Some(100.0);
        }
        self.production_index()
            .map(|index| index as f64 / Self::PRODUCTION.len() as f64 * 100.0)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowState::Research => "RESEARCH",
            WorkflowState::ResearchReview => "RESEARCH_REVIEW",
            WorkflowState::ContentGeneration => "CONTENT_GENERATION",
            WorkflowState::ContentReview => "CONTENT_REVIEW",
            WorkflowState::Translation => "TRANSLATION",
            WorkflowState::TranslationReview => "TRANSLATION_REVIEW",
            WorkflowState::HumanApproval => "HUMAN_APPROVAL",
            WorkflowState::Published => "PUBLISHED",
            WorkflowState::Failed => "FAILED",
            WorkflowState::Paused => "PAUSED",
            WorkflowState::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowType {
    ArticlePublishing,
    BreakingNews,
    MarketAnalysis,
    Tutorial,
}

impl WorkflowType {
    pub const ALL: [WorkflowType; 4] = [
        WorkflowType::ArticlePublishing,
        WorkflowType::BreakingNews,
        WorkflowType::MarketAnalysis,
        WorkflowType::Tutorial,
    ];

    pub fn content_type(self) -> ContentType {
        match self {
            WorkflowType::ArticlePublishing => ContentType::Article,
            WorkflowType::BreakingNews => ContentType::BreakingNews,
            WorkflowType::MarketAnalysis => ContentType::MarketAnalysis,
            WorkflowType::Tutorial => ContentType::Tutorial,
        }
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkflowType::ArticlePublishing => "ARTICLE_PUBLISHING",
            WorkflowType::BreakingNews => "BREAKING_NEWS",
            WorkflowType::MarketAnalysis => "MARKET_ANALYSIS",
            WorkflowType::Tutorial => "TUTORIAL",
        };
        f.write_str(label)
    }
}

/// Kind of content as seen by editors; drives eligibility and review estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    Article,
    BreakingNews,
    MarketAnalysis,
    Tutorial,
}

impl ContentType {
    pub const ALL: [ContentType; 4] = [
        ContentType::Article,
        ContentType::BreakingNews,
        ContentType::MarketAnalysis,
        ContentType::Tutorial,
    ];

    /// Typical minutes an editor spends reviewing this kind of content
    pub fn estimated_review_minutes(self) -> u32 {
        match self {
            ContentType::Article => 15,
            ContentType::BreakingNews => 5,
            ContentType::MarketAnalysis => 10,
            ContentType::Tutorial => 20,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ContentType::Article => "ARTICLE",
            ContentType::BreakingNews => "BREAKING_NEWS",
            ContentType::MarketAnalysis => "MARKET_ANALYSIS",
            ContentType::Tutorial => "TUTORIAL",
        };
        f.write_str(label)
    }
}

/// Display name for the language codes the platform publishes in
pub fn language_name(code: &str) -> Option<&'static str> {
    let name = match code {
        "en" => "English",
        "sw" => "Swahili",
        "ha" => "Hausa",
        "yo" => "Yoruba",
        "ig" => "Igbo",
        "am" => "Amharic",
        "zu" => "Zulu",
        "xh" => "Xhosa",
        "st" => "Sesotho",
        "sn" => "Shona",
        "rw" => "Kinyarwanda",
        "lg" => "Luganda",
        "ny" => "Chichewa",
        "so" => "Somali",
        "ti" => "Tigrinya",
        _ => return None,
    };
    Some(name)
}

/// Who caused a transition or decision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    System,
    Executor(String),
    Editor(EditorId),
}

impl Actor {
    pub fn editor(&self) -> Option<&EditorId> {
        match self {
            Actor::Editor(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::System => f.write_str("system"),
            Actor::Executor(name) => write!(f, "executor:{}", name),
            Actor::Editor(id) => write!(f, "editor:{}", id),
        }
    }
}

/// Typed metadata carried by a workflow. Anything without a dedicated
/// field goes into `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub title: Option<String>,
    pub author_id: Option<String>,
    pub language_code: String,
    #[serde(default)]
    pub target_languages: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Default for WorkflowMetadata {
    fn default() -> Self {
        Self {
            title: None,
            author_id: None,
            language_code: "en".to_string(),
            target_languages: Vec::new(),
            tags: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }
}

impl WorkflowMetadata {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_language(mut self, code: impl Into<String>) -> Self {
        self.language_code = code.into().to_ascii_lowercase();
        self
    }

    pub fn with_author(mut self, author_id: impl Into<String>) -> Self {
        self.author_id = Some(author_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub article_id: ArticleId,
    pub workflow_type: WorkflowType,
    pub current_state: WorkflowState,
    pub previous_state: Option<WorkflowState>,
    pub priority: Priority,
    pub assigned_reviewer_id: Option<EditorId>,
    pub review_assigned_at: Option<DateTime<Utc>>,
    pub completion_percentage: f64,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub revision_count: u32,
    pub metadata: WorkflowMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented on every committed change; guards store writes
    pub version: u64,
}

impl Workflow {
    pub fn is_terminal(&self) -> bool {
        self.current_state.is_terminal()
    }

    pub fn content_type(&self) -> ContentType {
        self.workflow_type.content_type()
    }

    pub fn display_title(&self) -> String {
        self.metadata
            .title
            .clone()
            .unwrap_or_else(|| format!("article {}", self.article_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn is_open(self) -> bool {
        matches!(self, StepStatus::Pending | StepStatus::Running)
    }
}

/// What a stage produced. Each stage family has its own shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageOutput {
    Research { summary: String, sources: Vec<String> },
    Draft { title: String, word_count: u32 },
    Translation { languages: Vec<String> },
    Review { notes: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub accuracy: f64,
    pub readability: f64,
    pub seo: f64,
    pub factuality: f64,
    pub translation_quality: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub stage: WorkflowState,
    pub score: f64,
    pub passed: bool,
    pub metrics: Option<QualityMetrics>,
    pub feedback: Option<String>,
    pub reviewed_by: Actor,
    pub reviewed_at: DateTime<Utc>,
}

impl QualityScore {
    pub fn evaluate(stage: WorkflowState, score: f64, threshold: f64, reviewed_by: Actor) -> Self {
        Self {
            stage,
            score,
            passed: score >= threshold,
            metrics: None,
            feedback: None,
            reviewed_by,
            reviewed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub workflow_id: WorkflowId,
    pub stage: WorkflowState,
    pub order: u32,
    pub attempt: u32,
    pub status: StepStatus,
    pub assignee_id: Option<String>,
    pub output: Option<StageOutput>,
    pub quality_score: Option<QualityScore>,
    pub human_feedback: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Step {
    pub fn pending(workflow_id: WorkflowId, stage: WorkflowState, order: u32, attempt: u32) -> Self {
        Self {
            id: StepId::new(),
            workflow_id,
            stage,
            order,
            attempt,
            status: StepStatus::Pending,
            assignee_id: None,
            output: None,
            quality_score: None,
            human_feedback: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    Created,
    Advance,
    Rollback,
    Pause,
    Resume,
    HumanReview,
    Cancel,
}

/// Immutable audit entry for a state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: Uuid,
    pub workflow_id: WorkflowId,
    pub from_state: Option<WorkflowState>,
    pub to_state: WorkflowState,
    pub transition_type: TransitionType,
    pub triggered_by: Actor,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transition {
    pub fn record(
        workflow_id: WorkflowId,
        from_state: Option<WorkflowState>,
        to_state: WorkflowState,
        transition_type: TransitionType,
        triggered_by: Actor,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            from_state,
            to_state,
            transition_type,
            triggered_by,
            reason,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<_> = WorkflowState::ALL
            .iter()
            .filter(|state| state.is_terminal())
            .collect();
        assert_eq!(
            terminal,
            vec![
                &WorkflowState::Published,
                &WorkflowState::Failed,
                &WorkflowState::Cancelled
            ]
        );
    }

    #[test]
    fn test_next_follows_production_path() {
        let mut state = WorkflowState::Research;
        let mut visited = vec![state];
        while let Some(next) = state.next() {
            visited.push(next);
            state = next;
        }
        assert_eq!(visited.len(), 8);
        assert_eq!(visited.last(), Some(&WorkflowState::Published));
        assert_eq!(WorkflowState::Paused.next(), None);
        assert_eq!(WorkflowState::Failed.next(), None);
    }

    #[test]
    fn test_completion_percentage_counts_production_states_only() {
        assert_eq!(WorkflowState::Research.completion_percentage(), Some(0.0));
        let review = WorkflowState::ResearchReview.completion_percentage().unwrap();
        assert!((review - 14.2857).abs() < 0.01);
        let approval = WorkflowState::HumanApproval.completion_percentage().unwrap();
        assert!((approval - 85.714).abs() < 0.01);
        assert_eq!(WorkflowState::Published.completion_percentage(), Some(100.0));
        assert_eq!(WorkflowState::Paused.completion_percentage(), None);
        assert_eq!(WorkflowState::Cancelled.completion_percentage(), None);
    }

    #[test]
    fn test_state_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&WorkflowState::HumanApproval).unwrap();
        assert_eq!(json, "\"HUMAN_APPROVAL\"");
        assert_eq!(WorkflowState::ContentReview.to_string(), "CONTENT_REVIEW");
    }

    #[test]
    fn test_workflow_type_maps_to_content_type() {
        assert_eq!(
            WorkflowType::ArticlePublishing.content_type(),
            ContentType::Article
        );
        assert_eq!(
            WorkflowType::BreakingNews.content_type().estimated_review_minutes(),
            5
        );
    }

    #[test]
    fn test_language_names() {
        assert_eq!(language_name("sw"), Some("Swahili"));
        assert_eq!(language_name("ti"), Some("Tigrinya"));
        assert_eq!(language_name("fr"), None);
    }

    #[test]
    fn test_actor_display() {
        assert_eq!(Actor::System.to_string(), "system");
        assert_eq!(Actor::Editor(EditorId::new("e1")).to_string(), "editor:e1");
    }
}
