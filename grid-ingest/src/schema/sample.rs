//! Parser output types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::parser::SourceVariant;

/// A single sample value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(Decimal),
    Text(String),
    Flag(bool),
}

impl Value {
    /// Numeric view of the value, if it is a number
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Value::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<Decimal> for Value {
    fn from(n: Decimal) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Flag(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Flag(b) => write!(f, "{}", b),
        }
    }
}

/// One typed point extracted from a provider document.
///
/// Transient: samples are merged or aggregated and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub source: SourceVariant,
    pub field: &'static str,
    pub instant: DateTime<Utc>,
    pub value: Value,
}

impl RawSample {
    pub fn new(
        source: SourceVariant,
        field: &'static str,
        instant: DateTime<Utc>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            source,
            field,
            instant,
            value: value.into(),
        }
    }
}

/// A point the parser could not use (no timestamp, non-numeric value)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSample {
    pub origin: SourceVariant,
    pub field: Option<&'static str>,
    pub reason: String,
    pub raw: String,
}

impl fmt::Display for InvalidSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(field) => write!(f, "{} {}: {} ('{}')", self.origin, field, self.reason, self.raw),
            None => write!(f, "{}: {} ('{}')", self.origin, self.reason, self.raw),
        }
    }
}

/// Everything a parser extracted from one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub samples: Vec<RawSample>,
    pub rejected: Vec<InvalidSample>,
}

impl ParsedDocument {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn push(&mut self, sample: RawSample) {
        self.samples.push(sample);
    }

    /// Record a dropped point
    pub fn reject(
        &mut self,
        origin: SourceVariant,
        field: Option<&'static str>,
        reason: impl Into<String>,
        raw: impl Into<String>,
    ) {
        let invalid = InvalidSample {
            origin,
            field,
            reason: reason.into(),
            raw: raw.into(),
        };
        tracing::debug!("Dropped sample: {}", invalid);
        self.rejected.push(invalid);
    }

    /// Append another document's output
    pub fn extend(&mut self, other: ParsedDocument) {
        self.samples.extend(other.samples);
        self.rejected.extend(other.rejected);
    }
}
