//! Schema creation
//!
//! DDL is derived from the same [`TableTarget`]s the writer uses. Every
//! statement is idempotent, so `db migrate` can run on every deploy.

use std::ops::RangeInclusive;
use tracing::info;

use super::{Partitioning, PostgresStore, StoreError, StoreResult, TableTarget};
use crate::reference::AreaTable;

/// Reference table of areas
pub const AREAS_TABLE: &str = "entsoe_areas";

/// `CREATE TABLE` plus partitions for one target
pub fn table_ddl(target: &TableTarget, years: RangeInclusive<i32>) -> Vec<String> {
    let mut lines: Vec<String> = target
        .columns
        .iter()
        .map(|c| {
            let not_null = if target.is_key(&c.name) { " NOT NULL" } else { "" };
            format!("    {} {}{}", c.name, c.ty.sql(), not_null)
        })
        .collect();
    lines.push("    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()".into());
    lines.push("    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()".into());
    lines.push(format!("    PRIMARY KEY ({})", target.conflict_columns.join(", ")));

    let partition_clause = match &target.partitioning {
        Partitioning::None => String::new(),
        Partitioning::List { column, .. } => format!(" PARTITION BY LIST ({})", column),
        Partitioning::YearRange { column } => format!(" PARTITION BY RANGE ({})", column),
    };

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n){}",
        target.table,
        lines.join(",\n"),
        partition_clause
    )];

    match &target.partitioning {
        Partitioning::None => {}
        Partitioning::List { values, .. } => {
            for value in values {
                statements.push(format!(
                    "CREATE TABLE IF NOT EXISTS {t}_{suffix} PARTITION OF {t} FOR VALUES IN ('{v}')",
                    t = target.table,
                    suffix = value.to_lowercase(),
                    v = value
                ));
            }
        }
        Partitioning::YearRange { .. } => {
            for year in years {
                statements.push(format!(
                    "CREATE TABLE IF NOT EXISTS {t}_{y} PARTITION OF {t} \
                     FOR VALUES FROM ('{y}-01-01') TO ('{next}-01-01')",
                    t = target.table,
                    y = year,
                    next = year + 1
                ));
            }
        }
    }

    statements
}

/// Area reference table and its seed rows
pub fn areas_ddl(areas: &AreaTable) -> Vec<String> {
    let create = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n\
         \x20   id INTEGER PRIMARY KEY,\n\
         \x20   code VARCHAR(20) NOT NULL UNIQUE,\n\
         \x20   country_name VARCHAR(100) NOT NULL,\n\
         \x20   country_code VARCHAR(5) NOT NULL,\n\
         \x20   is_active BOOLEAN NOT NULL DEFAULT TRUE\n\
         )",
        AREAS_TABLE
    );

    let rows: Vec<String> = areas
        .all()
        .iter()
        .map(|a| {
            format!(
                "({}, '{}', '{}', '{}', {})",
                a.id,
                a.code,
                a.name.replace('\'', "''"),
                a.country_code,
                a.active
            )
        })
        .collect();
    let seed = format!(
        "INSERT INTO {} (id, code, country_name, country_code, is_active) VALUES {} \
         ON CONFLICT (id) DO NOTHING",
        AREAS_TABLE,
        rows.join(", ")
    );

    vec![create, seed]
}

impl PostgresStore {
    /// Create reference data, every target table and its partitions
    pub async fn run_migrations(
        &self,
        targets: &[TableTarget],
        areas: &AreaTable,
        years: RangeInclusive<i32>,
    ) -> StoreResult<()> {
        info!("Running migrations for {} tables...", targets.len());

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| StoreError::from_sqlx(AREAS_TABLE, e))?;

        for statement in areas_ddl(areas) {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::from_sqlx(AREAS_TABLE, e))?;
        }

        for target in targets {
            target.validate()?;
            for statement in table_ddl(target, years.clone()) {
                sqlx::query(&statement)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StoreError::from_sqlx(&target.table, e))?;
            }
            info!("Table {} ready", target.table);
        }

        tx.commit().await.map_err(|e| StoreError::from_sqlx(AREAS_TABLE, e))?;
        info!("Migrations complete");
        Ok(())
    }
}
