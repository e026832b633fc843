//! Storage layer
//!
//! The writer upserts [`Batch`]es into partitioned tables keyed by trade
//! period. Writes are idempotent: replaying a batch leaves stored values
//! and timestamps unchanged. A batch is all-or-nothing per target table.

mod memory;
mod migrations;
mod postgres;
mod target;

pub use memory::*;
pub use migrations::*;
pub use postgres::*;
pub use target::*;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use grid_common::error::{DatabaseError, ErrorCategory, ErrorClassification};

/// Storage errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    #[error("No partition of '{table}' for {key}")]
    UnroutablePartition { table: String, key: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Schema mismatch for '{table}': {reason}")]
    SchemaMismatch { table: String, reason: String },
}

impl StoreError {
    pub(crate) fn from_sqlx(table: &str, err: sqlx::Error) -> Self {
        let err = DatabaseError::from(err);
        if err.is_missing_partition() {
            return StoreError::UnroutablePartition {
                table: table.to_string(),
                key: err.to_string(),
            };
        }
        StoreError::Database(err)
    }
}

impl ErrorClassification for StoreError {
    fn category(&self) -> ErrorCategory {
        match self {
            StoreError::UnroutablePartition { .. } => ErrorCategory::Permanent,
            StoreError::Database(e) => e.category(),
            StoreError::SchemaMismatch { .. } => ErrorCategory::Internal,
        }
    }

    fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            StoreError::Database(e) => e.suggested_retry_delay(),
            _ => None,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable, partitioned row store
#[async_trait]
pub trait Store: Send + Sync {
    /// Upsert a batch on its conflict key.
    ///
    /// Returns the number of rows inserted or changed; replayed identical
    /// rows are not counted.
    async fn upsert(&self, batch: &Batch) -> StoreResult<usize>;

    /// Latest `(trade_date, period)` stored in a target
    async fn latest_period(&self, target: &TableTarget) -> StoreResult<Option<(NaiveDate, u32)>>;
}

#[async_trait]
impl<T: Store + ?Sized> Store for Arc<T> {
    async fn upsert(&self, batch: &Batch) -> StoreResult<usize> {
        (**self).upsert(batch).await
    }

    async fn latest_period(&self, target: &TableTarget) -> StoreResult<Option<(NaiveDate, u32)>> {
        (**self).latest_period(target).await
    }
}

#[async_trait]
impl<T: Store + ?Sized> Store for Box<T> {
    async fn upsert(&self, batch: &Batch) -> StoreResult<usize> {
        (**self).upsert(batch).await
    }

    async fn latest_period(&self, target: &TableTarget) -> StoreResult<Option<(NaiveDate, u32)>> {
        (**self).latest_period(target).await
    }
}
