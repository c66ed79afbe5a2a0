use anyhow::Result;
use content_workflow::approval::{
    ApprovalError, ChangePriority, EditorProfile, IssueType, QueueStats, RequestedChange,
};
use content_workflow::notifications::channel::LogChannel;
use content_workflow::observability::PipelineStats;
use content_workflow::workflow::{WorkflowAnalytics, WorkflowId};
use content_workflow::{
    pipeline_metrics, NewWorkflow, Pipeline, PipelineConfig, PipelineRunner, Priority,
    SimulatedExecutor, WorkflowMetadata, WorkflowState, WorkflowType,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

const LANGUAGES: [&str; 4] = ["en", "sw", "yo", "ha"];
const EDITOR_LANGUAGES: [&str; 3] = ["en", "sw", "yo"];

#[derive(Debug, Clone, Copy)]
pub struct SimulationOptions {
    pub workflows: u32,
    pub editors: u32,
    pub seed: u64,
    pub auto_review: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct DecisionCounts {
    pub approved: usize,
    pub rejected: usize,
    pub revisions: usize,
    pub unassigned: usize,
}

#[derive(Debug, Serialize)]
pub struct SimulationSummary {
    pub workflows: u32,
    pub editors: u32,
    pub seed: u64,
    pub decisions: DecisionCounts,
    pub analytics: WorkflowAnalytics,
    pub queue: QueueStats,
    pub metrics: PipelineStats,
}

/// Build an in-memory pipeline, register editors and run seeded workflows
/// through the automated stages. Returns the pipeline for further inspection.
pub async fn run_simulation(config: PipelineConfig, options: SimulationOptions) -> Result<(Pipeline, SimulationSummary)> {
    let pipeline = Pipeline::in_memory(config);
    pipeline.register_channel(Arc::new(LogChannel)).await;

    for n in 1..=options.editors {
        let mut profile = EditorProfile::new(format!("editor-{}", n), format!("Editor {}", n))
            .with_languages(&EDITOR_LANGUAGES)
            .with_max_workload(5);
        if n == 1 {
            profile = profile.with_override();
        }
        pipeline.editors.register(profile).await;
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut ids = Vec::with_capacity(options.workflows as usize);
    for n in 1..=options.workflows {
        let workflow_type = WorkflowType::ALL[rng.random_range(0..WorkflowType::ALL.len())];
        let priority = Priority::ALL[rng.random_range(0..Priority::ALL.len())];
        let language = LANGUAGES[rng.random_range(0..LANGUAGES.len())];
        let metadata = WorkflowMetadata::titled(format!("Story #{}", n))
            .with_language(language)
            .with_author(format!("author-{}", n % 4 + 1));

        let workflow = pipeline
            .engine
            .create_workflow(
                NewWorkflow::new(format!("article-{}", n), workflow_type)
                    .with_priority(priority)
                    .with_metadata(metadata),
            )
            .await?;
        ids.push(workflow.id);
    }

    let runner = Arc::new(PipelineRunner::new(
        pipeline.engine.clone(),
        Arc::new(SimulatedExecutor::new(options.seed)),
    ));
    drive_all(&runner, &ids).await?;

    let mut decisions = DecisionCounts::default();
    assign_waiting(&pipeline, &ids, &mut decisions).await?;

    if options.auto_review {
        for round in 0..3 {
            let revised = review_round(&pipeline, &ids, &mut rng, &mut decisions, round).await?;
            if revised.is_empty() {
                break;
            }
            drive_all(&runner, &revised).await?;
            assign_waiting(&pipeline, &revised, &mut decisions).await?;
        }
    }

    let summary = SimulationSummary {
        workflows: options.workflows,
        editors: options.editors,
        seed: options.seed,
        decisions,
        analytics: pipeline.engine.workflow_analytics().await?,
        queue: pipeline.queue.queue_stats().await?,
        metrics: pipeline_metrics().get_stats(),
    };
    Ok((pipeline, summary))
}

async fn drive_all(runner: &Arc<PipelineRunner>, ids: &[WorkflowId]) -> Result<()> {
    let mut tasks = JoinSet::new();
    for &id in ids {
        let runner = runner.clone();
        tasks.spawn(async move { runner.drive(id).await });
    }
    while let Some(joined) = tasks.join_next().await {
        let workflow = joined??;
        info!(
            workflow_id = %workflow.id,
            state = %workflow.current_state,
            "Automated stages finished"
        );
    }
    Ok(())
}

async fn assign_waiting(pipeline: &Pipeline, ids: &[WorkflowId], decisions: &mut DecisionCounts) -> Result<()> {
    for &id in ids {
        let workflow = pipeline.engine.get_workflow(id).await?;
        if workflow.current_state != WorkflowState::HumanApproval || workflow.assigned_reviewer_id.is_some() {
            continue;
        }
        match pipeline.queue.assign_editor(id, None).await {
            Ok(_) => {}
            Err(ApprovalError::NoEligibleEditor { language_code, .. }) => {
                warn!(workflow_id = %id, language_code, "No editor available, left unassigned");
                decisions.unassigned += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// One pass of editor decisions. Returns the workflows sent back for revision.
async fn review_round(
    pipeline: &Pipeline,
    ids: &[WorkflowId],
    rng: &mut StdRng,
    decisions: &mut DecisionCounts,
    round: u32,
) -> Result<Vec<WorkflowId>> {
    let mut revised = Vec::new();
    for &id in ids {
        let workflow = pipeline.engine.get_workflow(id).await?;
        let Some(editor_id) = workflow.assigned_reviewer_id.clone() else {
            continue;
        };
        if workflow.current_state != WorkflowState::HumanApproval {
            continue;
        }

        let roll: f64 = rng.random_range(0.0..1.0);
        if roll < 0.15 && round < 2 {
            let change = RequestedChange {
                section: "introduction".to_string(),
                issue_type: IssueType::Clarity,
                priority: ChangePriority::MustFix,
                description: Some("Opening paragraph buries the lead".to_string()),
                suggestion: None,
            };
            pipeline
                .queue
                .request_revision(id, &editor_id, "tighten the introduction", vec![change])
                .await?;
            decisions.revisions += 1;
            revised.push(id);
        } else if roll < 0.25 {
            pipeline
                .queue
                .reject(id, &editor_id, "does not meet editorial standards")
                .await?;
            decisions.rejected += 1;
        } else {
            let quality_override = rng.random_bool(0.3).then(|| rng.random_range(0.8..=1.0));
            pipeline
                .queue
                .approve(id, &editor_id, None, quality_override)
                .await?;
            decisions.approved += 1;
        }
    }
    Ok(revised)
}

pub struct SimulateCommand {
    pub config: PipelineConfig,
    pub options: SimulationOptions,
    pub json: bool,
}

impl SimulateCommand {
    pub fn new(config: PipelineConfig, options: SimulationOptions) -> Self {
        Self {
            config,
            options,
            json: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub async fn execute(&self) -> Result<()> {
        let (pipeline, summary) = run_simulation(self.config.clone(), self.options).await?;
        pipeline.shutdown_coordinator().shutdown().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            return Ok(());
        }

        println!(
            "Simulated {} workflows with {} editors (seed {})",
            summary.workflows, summary.editors, summary.seed
        );
        println!();
        println!("Workflows:");
        println!("  published  {}", summary.analytics.published);
        println!("  failed     {}", summary.analytics.failed);
        println!("  cancelled  {}", summary.analytics.cancelled);
        println!("  active     {}", summary.analytics.active);
        println!("  success    {:.1}%", summary.analytics.success_rate);
        for (state, count) in &summary.analytics.state_distribution {
            println!("    {:<20} {}", state, count);
        }
        println!();
        println!("Decisions:");
        println!("  approved   {}", summary.decisions.approved);
        println!("  rejected   {}", summary.decisions.rejected);
        println!("  revisions  {}", summary.decisions.revisions);
        println!("  unassigned {}", summary.decisions.unassigned);
        println!();
        println!("Approval queue:");
        println!("  waiting    {} ({} pending, {} in review)", summary.queue.total, summary.queue.pending, summary.queue.in_review);
        println!("  backlog    ~{} min", summary.queue.estimated_backlog_minutes);
        if let Some(age) = summary.queue.oldest_pending_age_ms {
            println!("  oldest     {} ms", age);
        }
        println!();
        println!("Editors:");
        for editor in pipeline.editors.list().await {
            println!(
                "  {:<10} {}/{}{}",
                editor.id,
                editor.current_workload,
                editor.max_workload,
                if editor.can_override { " (override)" } else { "" }
            );
        }
        println!();
        println!(
            "Metrics: {} transitions, {} retries, {} failures, {} escalations",
            summary.metrics.transitions, summary.metrics.retries, summary.metrics.failures, summary.metrics.escalations
        );
        Ok(())
    }
}
