//! Database management commands

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use crate::config::Settings;
use crate::dataset::Dataset;
use crate::storage::{areas_ddl, table_ddl, PostgresStore, TableTarget};

/// Database subcommands
#[derive(Subcommand)]
pub enum DbCommands {
    /// Create reference and dataset tables with their partitions
    Migrate(MigrateArgs),
}

/// Arguments for migrate command
#[derive(Args)]
pub struct MigrateArgs {
    /// Print the DDL instead of executing it
    #[arg(long)]
    pub print: bool,
}

/// Execute database command
pub async fn execute(cmd: DbCommands) -> Result<i32> {
    match cmd {
        DbCommands::Migrate(args) => migrate(args).await,
    }
}

async fn migrate(args: MigrateArgs) -> Result<i32> {
    let settings = Settings::load().context("Failed to load settings")?;
    settings.validate(None)?;

    let areas = settings.area_table()?;
    let years = settings.storage.partition_years();
    let targets: Vec<TableTarget> = Dataset::ALL
        .iter()
        .flat_map(|dataset| dataset.targets(&areas))
        .collect();

    if args.print {
        for statement in areas_ddl(&areas) {
            println!("{};", statement);
        }
        for target in &targets {
            for statement in table_ddl(target, years.clone()) {
                println!("{};", statement);
            }
        }
        return Ok(0);
    }

    info!("Connecting to database...");
    let store = PostgresStore::connect(&settings.database, settings.storage.batch_size)
        .await
        .context("Failed to connect to database")?;

    store.run_migrations(&targets, &areas, years).await?;
    info!("Migrations completed successfully");
    println!("Migrated {} tables", targets.len());

    Ok(0)
}
