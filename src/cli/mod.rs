use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "content-workflow")]
#[command(about = "Content pipeline workflow engine and human approval queue")]
#[command(long_about = "Runs articles through research, generation and translation stages with \
                       quality gates, then routes them to editors for approval. Start with \
                       'content-workflow simulate' to run a seeded in-memory pipeline.")]
pub struct Cli {
    /// Extra configuration file layered over the defaults
    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run simulated workflows through the engine and approval queue
    Simulate {
        /// Number of workflows to create
        #[arg(long, default_value = "10", help = "Number of workflows to push through the pipeline")]
        workflows: u32,
        /// Number of editors to register
        #[arg(long, default_value = "3", help = "Number of editors available for review")]
        editors: u32,
        /// Seed for scores and workflow attributes
        #[arg(long, default_value = "42", help = "Random seed; equal seeds give equal runs")]
        seed: u64,
        /// Let editors decide on assigned items
        #[arg(long, help = "Simulate editor approve/reject/revision decisions")]
        auto_review: bool,
        /// Print the summary as JSON
        #[arg(long, help = "Emit a machine-readable JSON summary on stdout")]
        json: bool,
    },
    /// Simulate a pipeline, then list its approval queue
    Queue {
        #[arg(long, default_value = "10", help = "Number of workflows to push through the pipeline")]
        workflows: u32,
        #[arg(long, default_value = "3", help = "Number of editors available for review")]
        editors: u32,
        #[arg(long, default_value = "42", help = "Random seed; equal seeds give equal runs")]
        seed: u64,
        /// Only show these priorities
        #[arg(long = "priority", help = "Filter by priority (LOW, NORMAL, HIGH, CRITICAL); repeatable")]
        priorities: Vec<String>,
        /// Only show items without an editor
        #[arg(long, help = "Only list items still waiting for an editor")]
        unassigned: bool,
        #[arg(long, default_value = "1", help = "1-indexed page number")]
        page: u32,
        #[arg(long, help = "Page size (defaults to queue.default_page_size)")]
        limit: Option<u32>,
        #[arg(long, help = "Emit the page as JSON on stdout")]
        json: bool,
    },
    /// Inspect or write configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write the effective configuration to a file
    Save {
        /// Destination file
        path: PathBuf,
    },
}
