use anyhow::Result;

pub mod config;
pub mod queue;
pub mod simulate;

pub async fn show_getting_started() -> Result<()> {
    println!("Content Workflow - pipeline state machine and approval queue");
    println!();
    println!("To get started:");
    println!("  content-workflow simulate --workflows 20 --editors 3 --auto-review");
    println!("  content-workflow queue --priority HIGH --unassigned");
    println!("  content-workflow config show");
    println!();
    println!("Configuration is read from content-workflow.toml, .content-workflow-rc,");
    println!("--config <path> and CONTENT_WORKFLOW__* environment variables.");
    Ok(())
}
