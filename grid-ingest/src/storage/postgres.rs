//! PostgreSQL writer

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use std::time::Duration;
use tracing::debug;

use grid_common::error::DatabaseError;

use super::{Batch, Cell, Store, StoreError, StoreResult, TableTarget};
use crate::config::DatabaseSettings;

/// Store backed by partitioned PostgreSQL tables
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    batch_size: usize,
}

impl PostgresStore {
    /// Create a store over an existing pool
    pub fn new(pool: PgPool, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
        }
    }

    /// Connect using database settings
    pub async fn connect(settings: &DatabaseSettings, batch_size: usize) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .connect(&settings.url)
            .await
            .map_err(DatabaseError::from)?;

        Ok(Self::new(pool, batch_size))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// `INSERT .. ON CONFLICT DO UPDATE` for `rows` rows.
///
/// The update only fires when a value column differs, so `updated_at`
/// stays put on replays; `created_at` is never part of the SET list.
pub fn upsert_sql(target: &TableTarget, rows: usize) -> String {
    let columns: Vec<&str> = target.columns.iter().map(|c| c.name.as_str()).collect();
    let width = columns.len();

    let values: Vec<String> = (0..rows)
        .map(|r| {
            let params: Vec<String> = (1..=width).map(|c| format!("${}", r * width + c)).collect();
            format!("({})", params.join(", "))
        })
        .collect();

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({})",
        target.table,
        columns.join(", "),
        values.join(", "),
        target.conflict_columns.join(", ")
    );

    let updates: Vec<&str> = target.value_columns().map(|c| c.name.as_str()).collect();
    if updates.is_empty() {
        sql.push_str(" DO NOTHING");
        return sql;
    }

    let set: Vec<String> = updates.iter().map(|c| format!("{c} = EXCLUDED.{c}")).collect();
    let current: Vec<String> = updates.iter().map(|c| format!("{}.{}", target.table, c)).collect();
    let incoming: Vec<String> = updates.iter().map(|c| format!("EXCLUDED.{}", c)).collect();
    sql.push_str(&format!(
        " DO UPDATE SET {}, updated_at = NOW() WHERE ({}) IS DISTINCT FROM ({})",
        set.join(", "),
        current.join(", "),
        incoming.join(", ")
    ));
    sql
}

fn bind_cell<'q>(query: Query<'q, Postgres, PgArguments>, cell: &'q Cell) -> Query<'q, Postgres, PgArguments> {
    match cell {
        Cell::Date(d) => query.bind(*d),
        Cell::Int(i) => query.bind(*i),
        Cell::Text(s) => query.bind(s.as_deref()),
        Cell::Number(n) => query.bind(*n),
        Cell::Flag(b) => query.bind(*b),
        Cell::Timestamp(t) => query.bind(*t),
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn upsert(&self, batch: &Batch) -> StoreResult<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let table = batch.table();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::from_sqlx(table, e))?;

        let mut written = 0usize;
        for chunk in batch.rows.chunks(self.batch_size) {
            let sql = upsert_sql(&batch.target, chunk.len());
            let mut query = sqlx::query(&sql);
            for row in chunk {
                for cell in row {
                    query = bind_cell(query, cell);
                }
            }

            // Dropping the transaction on error rolls every chunk back.
            let result = query
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::from_sqlx(table, e))?;
            written += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(|e| StoreError::from_sqlx(table, e))?;
        debug!("Upserted {} of {} rows into {}", written, batch.len(), table);
        Ok(written)
    }

    async fn latest_period(&self, target: &TableTarget) -> StoreResult<Option<(NaiveDate, u32)>> {
        if !target.has_column("period") {
            return Err(StoreError::SchemaMismatch {
                table: target.table.clone(),
                reason: "no period column".into(),
            });
        }

        let sql = format!(
            "SELECT trade_date, period FROM {} ORDER BY trade_date DESC, period DESC LIMIT 1",
            target.table
        );
        let row = sqlx::query(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(&target.table, e))?;

        match row {
            Some(row) => {
                let date: NaiveDate = row
                    .try_get("trade_date")
                    .map_err(|e| StoreError::from_sqlx(&target.table, e))?;
                let period: i32 = row
                    .try_get("period")
                    .map_err(|e| StoreError::from_sqlx(&target.table, e))?;
                Ok(Some((date, period as u32)))
            }
            None => Ok(None),
        }
    }
}
