use anyhow::Result;
use clap::Parser;
use content_workflow::{init_telemetry, PipelineConfig};

mod cli;

use cli::commands::config::ConfigCommand;
use cli::commands::queue::QueueCommand;
use cli::commands::show_getting_started;
use cli::commands::simulate::{SimulateCommand, SimulationOptions};
use cli::{Cli, Commands, ConfigAction};

fn main() -> Result<()> {
    let cli = Cli::parse();

    PipelineConfig::load_env_file()?;
    let config = PipelineConfig::load_from(cli.config.as_deref())?;
    init_telemetry(&config.observability)?;

    match cli.command {
        // No subcommand: explain what the tool does
        None => tokio::runtime::Runtime::new()?.block_on(async { show_getting_started().await }),
        Some(Commands::Simulate {
            workflows,
            editors,
            seed,
            auto_review,
            json,
        }) => {
            let options = SimulationOptions {
                workflows,
                editors,
                seed,
                auto_review,
            };
            tokio::runtime::Runtime::new()?.block_on(async {
                SimulateCommand::new(config, options)
                    .with_json(json)
                    .execute()
                    .await
            })
        }
        Some(Commands::Queue {
            workflows,
            editors,
            seed,
            priorities,
            unassigned,
            page,
            limit,
            json,
        }) => {
            let command = QueueCommand {
                config,
                options: SimulationOptions {
                    workflows,
                    editors,
                    seed,
                    auto_review: false,
                },
                priorities,
                unassigned,
                page,
                limit,
                json,
            };
            tokio::runtime::Runtime::new()?.block_on(async { command.execute().await })
        }
        Some(Commands::Config { action }) => {
            let command = match action {
                ConfigAction::Show => ConfigCommand::show(config),
                ConfigAction::Save { path } => ConfigCommand::save(config, path),
            };
            tokio::runtime::Runtime::new()?.block_on(async { command.execute().await })
        }
    }
}
