//! Backfill driver
//!
//! Runs a dataset over a window chunk by chunk: fetch, parse, prepare and
//! upsert. A failed chunk is logged and skipped; configuration defects end
//! the run.
//!
//! ## Usage
//!
//! ```ignore
//! use grid_ingest::backfill::BackfillExecutor;
//! use grid_ingest::scheduler::RunMode;
//!
//! let executor = BackfillExecutor::new(fetcher, store, calendar, areas, settings.scheduler);
//! let summary = executor.run(Dataset::EntsoeLoad, RunMode::Auto).await;
//! std::process::exit(summary.exit_code());
//! ```

mod executor;
mod summary;

pub use executor::BackfillExecutor;
pub use summary::{ChunkReport, RunStatus, RunSummary};
