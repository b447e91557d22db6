//! Command-line surface of the flow runner.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "weft", about = "Configuration-driven workflow orchestrator", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute a pipeline
    Run(RunArgs),
    /// Export the dependency graph
    Graph(GraphArgs),
    /// Print registry and component counts
    Status,
    /// List registered methods per component
    Engines,
    /// Print last-run metrics
    Metrics(MetricsArgs),
    /// Cache inspection and management
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Configuration file
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,
    /// Execute only these steps (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,
    /// Exclude these steps (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,
    /// Resume from failure snapshots
    #[arg(long)]
    pub resume: bool,
    /// Bypass the cache
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct GraphArgs {
    /// Configuration file
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,
    /// Output format: mermaid | graphviz | text
    #[arg(long, default_value = "text")]
    pub format: String,
    /// Write to a file instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Print a shape summary instead of the full graph
    #[arg(long)]
    pub summary: bool,
}

#[derive(Debug, Args)]
pub struct MetricsArgs {
    /// Configuration file
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,
    /// Output format: json | markdown
    #[arg(long, default_value = "json")]
    pub format: String,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Report which steps would hit the cache
    Plan {
        #[arg(short = 'c', long = "config")]
        config: PathBuf,
    },
    /// Execute the pipeline to populate the cache
    Warm {
        #[arg(short = 'c', long = "config")]
        config: PathBuf,
    },
    /// Evict cached signatures, optionally for specific steps
    Clear {
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        #[arg(long, value_delimiter = ',')]
        steps: Vec<String>,
    },
}
