//! Command-line interface
//!
//! Exit codes: `0` when every chunk succeeded or a partial backfill failure
//! was logged, `1` when nothing succeeded, `2` on bad arguments or
//! configuration.

pub mod datasets;
pub mod db;
pub mod run;

use clap::{Parser, Subcommand};

/// Grid ingestion CLI
#[derive(Parser)]
#[command(name = "grid-ingest")]
#[command(about = "Electricity market data ingestion onto the 15-minute trade period grid")]
#[command(version)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, global = true)]
    pub debug: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Refresh the recent window of a dataset
    Run(run::RunArgs),
    /// Backfill a dataset from the latest stored period, or over explicit dates
    Backfill(run::BackfillArgs),
    /// Database operations
    #[command(subcommand)]
    Db(db::DbCommands),
    /// List the known datasets
    Datasets,
}
