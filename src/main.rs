use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use events2chart_config::RuntimeConfig;

#[derive(Parser)]
#[command(
    name = "events2chart",
    about = "Durable event queue and cache-refresh pipeline feeding live charts"
)]
struct Cli {
    /// Path to a TOML config file (overrides the standard lookup chain)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the queue worker, claim reaper, and cache pollers
    Pipeline,
    /// Run a self-contained demo against the in-memory backend
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    events2chart::init_tracing();

    let config = match &cli.config {
        Some(path) => RuntimeConfig::load_from_file_path(path)?,
        None => RuntimeConfig::load()?,
    };

    match cli.command {
        Command::Pipeline => events2chart::run_pipeline(config).await,
        Command::Demo => events2chart::run_demo(config).await,
    }
}
