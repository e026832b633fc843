//! Table targets, rows and batches

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;

use super::{StoreError, StoreResult};

/// SQL type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Date,
    Integer,
    Text,
    Numeric,
    Boolean,
    Timestamp,
}

impl ColumnType {
    pub fn sql(self) -> &'static str {
        match self {
            ColumnType::Date => "DATE",
            ColumnType::Integer => "INTEGER",
            ColumnType::Text => "TEXT",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Timestamp => "TIMESTAMPTZ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// One typed cell of a row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cell {
    Date(NaiveDate),
    Int(i32),
    Text(Option<String>),
    Number(Option<Decimal>),
    Flag(Option<bool>),
    Timestamp(DateTime<Utc>),
}

impl Cell {
    fn matches(&self, ty: ColumnType) -> bool {
        matches!(
            (self, ty),
            (Cell::Date(_), ColumnType::Date)
                | (Cell::Int(_), ColumnType::Integer)
                | (Cell::Text(_), ColumnType::Text)
                | (Cell::Number(_), ColumnType::Numeric)
                | (Cell::Flag(_), ColumnType::Boolean)
                | (Cell::Timestamp(_), ColumnType::Timestamp)
        )
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Date(d) => write!(f, "{}", d),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Text(Some(s)) => write!(f, "{}", s),
            Cell::Number(Some(n)) => write!(f, "{}", n),
            Cell::Flag(Some(b)) => write!(f, "{}", b),
            Cell::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Cell::Text(None) | Cell::Number(None) | Cell::Flag(None) => write!(f, "NULL"),
        }
    }
}

pub type Row = Vec<Cell>;

/// Physical partitioning of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partitioning {
    None,
    /// `PARTITION BY LIST (column)`, one partition per value
    List { column: String, values: Vec<String> },
    /// `PARTITION BY RANGE (column)` over calendar years of a date column
    YearRange { column: String },
}

/// Partition a row routes to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartitionKey {
    Value(String),
    Year(i32),
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionKey::Value(v) => write!(f, "'{}'", v),
            PartitionKey::Year(y) => write!(f, "year {}", y),
        }
    }
}

/// A physical table the writer can target.
///
/// The same declaration drives the DDL, so the conflict key always equals
/// the table's primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    pub table: String,
    pub columns: Vec<Column>,
    pub conflict_columns: Vec<String>,
    pub partitioning: Partitioning,
}

impl TableTarget {
    pub fn new(table: impl Into<String>, columns: Vec<Column>, conflict_columns: &[&str]) -> Self {
        Self {
            table: table.into(),
            columns,
            conflict_columns: conflict_columns.iter().map(|c| c.to_string()).collect(),
            partitioning: Partitioning::None,
        }
    }

    pub fn partitioned(mut self, partitioning: Partitioning) -> Self {
        self.partitioning = partitioning;
        self
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn is_key(&self, name: &str) -> bool {
        self.conflict_columns.iter().any(|c| c == name)
    }

    /// Columns outside the conflict key
    pub fn value_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(move |c| !self.is_key(&c.name))
    }

    fn key_indices(&self) -> Vec<usize> {
        self.conflict_columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect()
    }

    /// Conflict-key cells of a row
    pub fn key_of(&self, row: &[Cell]) -> Vec<Cell> {
        self.key_indices().into_iter().map(|i| row[i].clone()).collect()
    }

    /// Partition a row routes to; `None` for unpartitioned tables
    pub fn partition_of(&self, row: &[Cell]) -> StoreResult<Option<PartitionKey>> {
        let (column, by_year) = match &self.partitioning {
            Partitioning::None => return Ok(None),
            Partitioning::List { column, .. } => (column, false),
            Partitioning::YearRange { column } => (column, true),
        };
        let cell = self.column_index(column).and_then(|i| row.get(i));

        match (cell, by_year) {
            (Some(Cell::Date(d)), true) => Ok(Some(PartitionKey::Year(d.year()))),
            (Some(Cell::Text(Some(v))), false) => Ok(Some(PartitionKey::Value(v.clone()))),
            _ => Err(StoreError::SchemaMismatch {
                table: self.table.clone(),
                reason: format!("partition column '{}' has no usable value", column),
            }),
        }
    }

    /// Check that conflict and partition columns are declared
    pub fn validate(&self) -> StoreResult<()> {
        let mismatch = |reason: String| StoreError::SchemaMismatch {
            table: self.table.clone(),
            reason,
        };

        if self.conflict_columns.is_empty() {
            return Err(mismatch("no conflict key".into()));
        }
        for key in &self.conflict_columns {
            if !self.has_column(key) {
                return Err(mismatch(format!("conflict column '{}' not declared", key)));
            }
        }
        match &self.partitioning {
            Partitioning::List { column, .. } | Partitioning::YearRange { column } => {
                if !self.is_key(column) {
                    return Err(mismatch(format!("partition column '{}' is not in the key", column)));
                }
            }
            Partitioning::None => {}
        }
        Ok(())
    }
}

/// Rows destined for one table, deduplicated on the conflict key.
///
/// When a key repeats, the later row wins and takes the earlier position.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub target: TableTarget,
    pub rows: Vec<Row>,
}

impl Batch {
    pub fn new(target: TableTarget, rows: Vec<Row>) -> StoreResult<Self> {
        target.validate()?;

        let mut positions: HashMap<Vec<Cell>, usize> = HashMap::new();
        let mut unique: Vec<Row> = Vec::with_capacity(rows.len());

        for row in rows {
            if row.len() != target.columns.len() {
                return Err(StoreError::SchemaMismatch {
                    table: target.table.clone(),
                    reason: format!("row has {} cells, table has {} columns", row.len(), target.columns.len()),
                });
            }
            if let Some(column) = target.columns.iter().zip(&row).find(|(c, cell)| !cell.matches(c.ty)) {
                return Err(StoreError::SchemaMismatch {
                    table: target.table.clone(),
                    reason: format!("cell for '{}' is not {}", column.0.name, column.0.ty.sql()),
                });
            }

            let key = target.key_of(&row);
            match positions.get(&key) {
                Some(&index) => unique[index] = row,
                None => {
                    positions.insert(key, unique.len());
                    unique.push(row);
                }
            }
        }

        Ok(Self {
            target,
            rows: unique,
        })
    }

    pub fn table(&self) -> &str {
        &self.target.table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
