//! # Grid Ingest
//!
//! Electricity market data ingestion onto the canonical 15-minute trade
//! period grid of the Czech market.
//!
//! ## Features
//!
//! - **Providers**: ENTSO-E transparency REST, CEPS SOAP, OTE day-ahead workbooks
//! - **Period calendar**: DST-aware `(trade_date, period)` keys in Europe/Prague
//! - **Normalization**: series combining and per-minute to 15-minute aggregation
//! - **Idempotent storage**: partitioned upserts keyed by trade period
//! - **Backfill**: chunked runs that survive individual chunk failures
//!
//! ## Architecture
//!
//! A run resolves a window, splits it into chunks and drives each chunk
//! through fetch, parse, prepare and write. Fetching and storage sit behind
//! the [`Fetcher`] and [`Store`] traits so runs can be exercised without
//! network or database.

pub mod aggregate;
pub mod backfill;
pub mod calendar;
pub mod cli;
pub mod combine;
pub mod config;
pub mod dataset;
pub mod error;
pub mod parser;
pub mod provider;
pub mod reference;
pub mod scheduler;
pub mod schema;
pub mod storage;

// Re-export commonly used types
pub use backfill::{BackfillExecutor, RunStatus, RunSummary};
pub use calendar::{PeriodCalendar, PeriodKey};
pub use config::Settings;
pub use dataset::Dataset;
pub use error::{IngestError, IngestResult};
pub use provider::{Fetcher, HttpFetcher, MockFetcher};
pub use storage::{MemoryStore, PostgresStore, Store};
