//! Grid Ingest CLI
//!
//! Provides commands for:
//! - `run`: Refresh the recent window of a dataset
//! - `backfill`: Resume from the latest stored period, or fill explicit dates
//! - `db`: Database operations
//! - `datasets`: List the known datasets

use anyhow::{anyhow, Result};
use clap::Parser;

use grid_common::logging::{init_logging, LogConfig};
use grid_ingest::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env();
    if cli.debug {
        log_config = log_config.with_default_level("debug");
    }
    init_logging(log_config).map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    // Execute command
    let code = match cli.command {
        Commands::Run(args) => grid_ingest::cli::run::execute_run(args).await?,
        Commands::Backfill(args) => grid_ingest::cli::run::execute_backfill(args).await?,
        Commands::Db(cmd) => grid_ingest::cli::db::execute(cmd).await?,
        Commands::Datasets => grid_ingest::cli::datasets::execute(),
    };

    std::process::exit(code)
}
