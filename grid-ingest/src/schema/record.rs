//! Period-keyed records

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use super::Value;
use crate::calendar::PeriodKey;

/// Field values of one record; `None` is an explicit null
pub type FieldMap = BTreeMap<&'static str, Option<Value>>;

/// One merged row for a trade period and area
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub key: PeriodKey,
    pub area_id: i32,
    pub country_code: String,
    pub fields: FieldMap,
}

impl NormalizedRecord {
    /// Value of a field, flattening "absent" and "null"
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).and_then(|v| v.as_ref())
    }

    pub fn number(&self, field: &str) -> Option<Decimal> {
        self.get(field).and_then(Value::as_number)
    }
}

/// Window statistics of one quantity. All three are null for an empty window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WindowStats {
    pub mean: Option<Decimal>,
    pub median: Option<Decimal>,
    pub last: Option<Decimal>,
}

impl WindowStats {
    pub fn is_null(&self) -> bool {
        self.mean.is_none() && self.median.is_none() && self.last.is_none()
    }
}

/// 15-minute statistics for one period and area
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRecord {
    pub key: PeriodKey,
    pub area_id: i32,
    pub fields: BTreeMap<&'static str, WindowStats>,
}

impl AggregatedRecord {
    pub fn stats(&self, field: &str) -> Option<&WindowStats> {
        self.fields.get(field)
    }
}
