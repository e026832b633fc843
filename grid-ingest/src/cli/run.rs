//! `run` and `backfill` commands

use anyhow::{Context, Result};
use clap::Args;
use tracing::{error, info};

use grid_common::error::ConfigurationError;

use crate::backfill::{BackfillExecutor, RunSummary};
use crate::config::Settings;
use crate::dataset::Dataset;
use crate::provider::HttpFetcher;
use crate::scheduler::RunMode;
use crate::storage::{MemoryStore, PostgresStore, Store};

const EXIT_USAGE: i32 = 2;

/// Arguments for run command
#[derive(Args)]
pub struct RunArgs {
    /// Dataset to ingest (see `grid-ingest datasets`)
    pub dataset: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for backfill command
#[derive(Args)]
pub struct BackfillArgs {
    /// Dataset to ingest (see `grid-ingest datasets`)
    pub dataset: String,

    /// Optional START END (YYYY-MM-DD, local dates, END exclusive).
    /// Without them the window resumes after the latest stored period.
    #[arg(num_args = 0..=2, value_name = "DATE")]
    pub dates: Vec<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Output options shared by run and backfill
#[derive(Args)]
pub struct OutputArgs {
    /// Fetch and parse, but write into an in-memory store
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute run command
pub async fn execute_run(args: RunArgs) -> Result<i32> {
    execute(&args.dataset, Ok(RunMode::Normal), &args.output).await
}

/// Execute backfill command
pub async fn execute_backfill(args: BackfillArgs) -> Result<i32> {
    let mode = RunMode::from_positionals(args.dates.as_slice());
    execute(&args.dataset, mode, &args.output).await
}

async fn execute(
    name: &str,
    mode: Result<RunMode, ConfigurationError>,
    output: &OutputArgs,
) -> Result<i32> {
    let dataset: Dataset = match name.parse() {
        Ok(dataset) => dataset,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            return Ok(EXIT_USAGE);
        }
    };
    let mode = match mode {
        Ok(mode) => mode,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            return Ok(EXIT_USAGE);
        }
    };

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load settings: {}", e);
            eprintln!("Error: failed to load settings: {}", e);
            return Ok(EXIT_USAGE);
        }
    };
    if let Err(e) = settings.validate(Some(dataset)) {
        error!("Invalid configuration: {}", e);
        eprintln!("Error: {}", e);
        return Ok(EXIT_USAGE);
    }

    let calendar = settings.calendar()?;
    let areas = settings.area_table()?;
    let fetcher = HttpFetcher::from_settings(&settings.provider, calendar.timezone())
        .context("Failed to build HTTP clients")?;

    let store: Box<dyn Store> = if output.dry_run {
        info!("Dry run: rows go to an in-memory store");
        Box::new(MemoryStore::permissive())
    } else {
        let store = PostgresStore::connect(&settings.database, settings.storage.batch_size)
            .await
            .context("Failed to connect to database")?;
        Box::new(store)
    };

    let executor = BackfillExecutor::new(fetcher, store, calendar, areas, settings.scheduler.clone());
    let summary = executor.run(dataset, mode).await;
    print_summary(&summary, output.json)?;

    Ok(summary.exit_code())
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", summary.to_json()?);
    } else {
        print!("{}", summary);
    }
    Ok(())
}
