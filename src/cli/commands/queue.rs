use super::simulate::{run_simulation, SimulationOptions};
use anyhow::{bail, Result};
use content_workflow::approval::{ApprovalStatus, Pagination, QueueFilters};
use content_workflow::{PipelineConfig, Priority};

pub struct QueueCommand {
    pub config: PipelineConfig,
    pub options: SimulationOptions,
    pub priorities: Vec<String>,
    pub unassigned: bool,
    pub page: u32,
    pub limit: Option<u32>,
    pub json: bool,
}

impl QueueCommand {
    fn filters(&self) -> Result<QueueFilters> {
        let mut filters = QueueFilters::default();
        for label in &self.priorities {
            match Priority::from_label(label) {
                Some(priority) => filters.priorities.push(priority),
                None => bail!("Unknown priority '{}' (expected LOW, NORMAL, HIGH or CRITICAL)", label),
            }
        }
        if self.unassigned {
            filters.statuses.push(ApprovalStatus::Pending);
        }
        Ok(filters)
    }

    pub async fn execute(&self) -> Result<()> {
        let filters = self.filters()?;
        let (pipeline, _) = run_simulation(self.config.clone(), self.options).await?;
        let page = pipeline
            .queue
            .list_queue(
                &filters,
                Pagination {
                    page: self.page,
                    limit: self.limit,
                },
            )
            .await?;
        pipeline.shutdown_coordinator().shutdown().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&page)?);
            return Ok(());
        }

        println!(
            "Approval queue: {} items (page {}/{})",
            page.total,
            page.page,
            page.total_pages.max(1)
        );
        println!();
        if page.items.is_empty() {
            println!("Nothing is waiting for review");
            return Ok(());
        }
        for item in &page.items {
            let editor = item
                .assigned_editor_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            let confidence = item
                .ai_confidence_score
                .map(|score| format!("{:.2}", score))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  [{:<8}] {:<14} {:<16} {:<3} conf {:<5} editor {:<10} {}",
                item.priority.to_string(),
                item.content_type.to_string(),
                format!("{:?}", item.status),
                item.language_code,
                confidence,
                editor,
                item.title
            );
        }
        Ok(())
    }
}
