//! In-process store
//!
//! Honours the same contract as the PostgreSQL writer: partitions must
//! exist before rows route to them, batches apply all-or-nothing,
//! `created_at` is set once and `updated_at` moves only on a real change.
//! Used for `--dry-run` and by tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::ops::RangeInclusive;
use tracing::debug;

use super::{Batch, Cell, PartitionKey, Partitioning, Store, StoreError, StoreResult, TableTarget};

/// A stored row with its bookkeeping timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub values: Vec<Cell>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Table {
    columns: Vec<String>,
    rows: HashMap<Vec<Cell>, StoredRow>,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, Table>,
    partitions: HashMap<String, BTreeSet<PartitionKey>>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    permissive: bool,
}

impl MemoryStore {
    /// Strict store: partitioned tables accept rows only for created partitions
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that accepts every partition
    pub fn permissive() -> Self {
        Self {
            state: RwLock::default(),
            permissive: true,
        }
    }

    pub fn create_partition(&self, table: &str, key: PartitionKey) {
        self.state
            .write()
            .partitions
            .entry(table.to_string())
            .or_default()
            .insert(key);
    }

    /// Create the partitions `db migrate` would create for a target
    pub fn provision(&self, target: &TableTarget, years: RangeInclusive<i32>) {
        match &target.partitioning {
            Partitioning::None => {}
            Partitioning::List { values, .. } => {
                for value in values {
                    self.create_partition(&target.table, PartitionKey::Value(value.clone()));
                }
            }
            Partitioning::YearRange { .. } => {
                for year in years {
                    self.create_partition(&target.table, PartitionKey::Year(year));
                }
            }
        }
    }

    /// All rows of a table in key order
    pub fn rows(&self, table: &str) -> Vec<StoredRow> {
        let state = self.state.read();
        let Some(table) = state.tables.get(table) else {
            return Vec::new();
        };
        let mut rows: Vec<StoredRow> = table.rows.values().cloned().collect();
        rows.sort_by_key(|r| r.values.iter().map(|c| c.to_string()).collect::<Vec<_>>());
        rows
    }

    pub fn row(&self, table: &str, key: &[Cell]) -> Option<StoredRow> {
        self.state.read().tables.get(table)?.rows.get(key).cloned()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.state.read().tables.get(table).map_or(0, |t| t.rows.len())
    }

    /// Value of a named column in a stored row
    pub fn value(&self, table: &str, key: &[Cell], column: &str) -> Option<Cell> {
        let state = self.state.read();
        let table = state.tables.get(table)?;
        let index = table.columns.iter().position(|c| c == column)?;
        table.rows.get(key).map(|r| r.values[index].clone())
    }

    fn check_routes(&self, state: &State, batch: &Batch) -> StoreResult<()> {
        if self.permissive {
            return Ok(());
        }
        let created = state.partitions.get(batch.table());
        for row in &batch.rows {
            if let Some(key) = batch.target.partition_of(row)? {
                if !created.is_some_and(|p| p.contains(&key)) {
                    return Err(StoreError::UnroutablePartition {
                        table: batch.table().to_string(),
                        key: key.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert(&self, batch: &Batch) -> StoreResult<usize> {
        let mut state = self.state.write();
        self.check_routes(&state, batch)?;

        let now = Utc::now();
        let table = state.tables.entry(batch.table().to_string()).or_default();
        table.columns = batch.target.columns.iter().map(|c| c.name.clone()).collect();

        let mut written = 0;
        for row in &batch.rows {
            let key = batch.target.key_of(row);
            match table.rows.get_mut(&key) {
                Some(stored) if stored.values == *row => {}
                Some(stored) => {
                    stored.values = row.clone();
                    stored.updated_at = now;
                    written += 1;
                }
                None => {
                    table.rows.insert(
                        key,
                        StoredRow {
                            values: row.clone(),
                            created_at: now,
                            updated_at: now,
                        },
                    );
                    written += 1;
                }
            }
        }

        debug!("Upserted {} of {} rows into {} (memory)", written, batch.len(), batch.table());
        Ok(written)
    }

    async fn latest_period(&self, target: &TableTarget) -> StoreResult<Option<(NaiveDate, u32)>> {
        let (Some(date_col), Some(period_col)) =
            (target.column_index("trade_date"), target.column_index("period"))
        else {
            return Err(StoreError::SchemaMismatch {
                table: target.table.clone(),
                reason: "no trade_date/period columns".into(),
            });
        };

        let state = self.state.read();
        let latest = state.tables.get(&target.table).and_then(|table| {
            table
                .rows
                .values()
                .filter_map(|row| match (&row.values[date_col], &row.values[period_col]) {
                    (Cell::Date(d), Cell::Int(p)) => Some((*d, *p as u32)),
                    _ => None,
                })
                .max()
        });
        Ok(latest)
    }
}
