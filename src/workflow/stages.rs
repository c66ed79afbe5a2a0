use super::types::WorkflowState;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Role a stage plays in the production path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Produces content (research notes, drafts, translations)
    Producer,
    /// Automated quality review of the preceding producer
    AutomatedReview,
    /// Waits for an editor decision
    HumanReview,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageConfig {
    pub stage: WorkflowState,
    pub kind: StageKind,
    pub quality_threshold: f64,
    pub requires_human_review: bool,
    pub auto_advance_on_pass: bool,
    pub estimated_duration: Duration,
}

const STAGE_TABLE: [StageConfig; 7] = [
    StageConfig {
        stage: WorkflowState::Research,
        kind: StageKind::Producer,
        quality_threshold: 0.7,
        requires_human_review: false,
        auto_advance_on_pass: true,
        estimated_duration: Duration::from_secs(120),
    },
    StageConfig {
        stage: WorkflowState::ResearchReview,
        kind: StageKind::AutomatedReview,
        quality_threshold: 0.7,
        requires_human_review: false,
        auto_advance_on_pass: true,
        estimated_duration: Duration::from_secs(60),
    },
    StageConfig {
        stage: WorkflowState::ContentGeneration,
        kind: StageKind::Producer,
        quality_threshold: 0.75,
        requires_human_review: false,
        auto_advance_on_pass: true,
        estimated_duration: Duration::from_secs(180),
    },
    StageConfig {
        stage: WorkflowState::ContentReview,
        kind: StageKind::AutomatedReview,
        quality_threshold: 0.75,
        requires_human_review: false,
        auto_advance_on_pass: true,
        estimated_duration: Duration::from_secs(90),
    },
    StageConfig {
        stage: WorkflowState::Translation,
        kind: StageKind::Producer,
        quality_threshold: 0.7,
        requires_human_review: false,
        auto_advance_on_pass: true,
        estimated_duration: Duration::from_secs(300),
    },
    StageConfig {
        stage: WorkflowState::TranslationReview,
        kind: StageKind::AutomatedReview,
        quality_threshold: 0.7,
        requires_human_review: false,
        auto_advance_on_pass: true,
        estimated_duration: Duration::from_secs(120),
    },
    StageConfig {
        stage: WorkflowState::HumanApproval,
        kind: StageKind::HumanReview,
        quality_threshold: 0.8,
        requires_human_review: true,
        auto_advance_on_pass: false,
        estimated_duration: Duration::from_secs(600),
    },
];

/// Configuration for a production stage; side states have none.
pub fn stage_config(stage: WorkflowState) -> Option<&'static StageConfig> {
    stage
        .production_index()
        .and_then(|index| STAGE_TABLE.get(index))
}

/// Sum of the estimated durations of `stage` and every production stage after it
pub fn estimated_remaining(stage: WorkflowState) -> Duration {
    match stage.production_index() {
        Some(index) => STAGE_TABLE[index..]
            .iter()
            .map(|config| config.estimated_duration)
            .sum(),
        None => Duration::ZERO,
    }
}

/// Scores inside `[min, max)` pass the gate but still go to an editor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewBand {
    pub min: f64,
    pub max: f64,
}

impl ReviewBand {
    pub fn contains(&self, score: f64) -> bool {
        score >= self.min && score < self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_production_state_has_config() {
        for state in WorkflowState::PRODUCTION {
            let config = stage_config(state).expect("production stage config");
            assert_eq!(config.stage, state);
        }
        assert!(stage_config(WorkflowState::Paused).is_none());
        assert!(stage_config(WorkflowState::Published).is_none());
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(stage_config(WorkflowState::Research).unwrap().quality_threshold, 0.7);
        assert_eq!(
            stage_config(WorkflowState::ContentGeneration).unwrap().quality_threshold,
            0.75
        );
        assert_eq!(
            stage_config(WorkflowState::HumanApproval).unwrap().quality_threshold,
            0.8
        );
    }

    #[test]
    fn test_only_human_approval_waits_for_editor() {
        for state in WorkflowState::PRODUCTION {
            let config = stage_config(state).unwrap();
            let human = state == WorkflowState::HumanApproval;
            assert_eq!(config.requires_human_review, human);
            assert_eq!(config.auto_advance_on_pass, !human);
        }
    }

    #[test]
    fn test_estimated_remaining() {
        assert_eq!(estimated_remaining(WorkflowState::HumanApproval), Duration::from_secs(600));
        assert_eq!(estimated_remaining(WorkflowState::Research), Duration::from_secs(1470));
        assert_eq!(estimated_remaining(WorkflowState::Failed), Duration::ZERO);
    }

    #[test]
    fn test_review_band_is_half_open() {
        let band = ReviewBand { min: 0.7, max: 0.85 };
        assert!(band.contains(0.7));
        assert!(band.contains(0.84));
        assert!(!band.contains(0.85));
        assert!(!band.contains(0.5));
    }
}
