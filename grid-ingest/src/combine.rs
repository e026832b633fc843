//! Series combiner
//!
//! Outer-merges independently parsed series that share a period grid into
//! one [`NormalizedRecord`] per period key. Absent fields take the default
//! declared for them; the combiner never invents values.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::calendar::{PeriodCalendar, PeriodKey};
use crate::reference::AreaReference;
use crate::schema::{FieldMap, NormalizedRecord, RawSample, Value};

/// Value used when no series supplied a field for a period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    /// Unknown
    Null,
    /// Absence is meaningful, e.g. no generation of a fuel type
    Zero,
    Text(&'static str),
    Flag(bool),
}

impl FieldDefault {
    fn value(self) -> Option<Value> {
        match self {
            FieldDefault::Null => None,
            FieldDefault::Zero => Some(Value::Number(Decimal::ZERO)),
            FieldDefault::Text(s) => Some(Value::from(s)),
            FieldDefault::Flag(b) => Some(Value::Flag(b)),
        }
    }
}

/// How several samples for one field and period combine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// Last sample in input order wins
    Replace,
    /// Numeric samples add up
    Sum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub default: FieldDefault,
    pub merge: MergeRule,
}

impl FieldSpec {
    pub const fn nullable(name: &'static str) -> Self {
        Self {
            name,
            default: FieldDefault::Null,
            merge: MergeRule::Replace,
        }
    }

    pub const fn zero(name: &'static str) -> Self {
        Self {
            name,
            default: FieldDefault::Zero,
            merge: MergeRule::Replace,
        }
    }

    pub const fn summed(name: &'static str) -> Self {
        Self {
            name,
            default: FieldDefault::Null,
            merge: MergeRule::Sum,
        }
    }
}

/// Outer merge over a fixed field set
#[derive(Debug, Clone)]
pub struct Combiner {
    fields: Vec<FieldSpec>,
}

impl Combiner {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Declared fields in column order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Merge samples from any number of series into records for one area.
    ///
    /// Output holds one record per key in the union of the input keys, in
    /// ascending key order.
    pub fn combine<'a, I>(
        &self,
        calendar: &PeriodCalendar,
        area: &AreaReference,
        samples: I,
    ) -> Vec<NormalizedRecord>
    where
        I: IntoIterator<Item = &'a RawSample>,
    {
        let mut periods: BTreeMap<PeriodKey, HashMap<&'static str, Value>> = BTreeMap::new();
        let mut ignored = 0usize;

        for sample in samples {
            let Some(spec) = self.spec(sample.field) else {
                ignored += 1;
                continue;
            };
            let values = periods.entry(calendar.period_key(sample.instant)).or_default();

            let merged = match (spec.merge, values.get(spec.name), &sample.value) {
                (MergeRule::Sum, Some(Value::Number(total)), Value::Number(n)) => Value::Number(*total + *n),
                _ => sample.value.clone(),
            };
            values.insert(spec.name, merged);
        }

        if ignored > 0 {
            debug!("Combiner ignored {} samples for undeclared fields", ignored);
        }

        periods
            .into_iter()
            .map(|(key, mut values)| {
                let fields: FieldMap = self
                    .fields
                    .iter()
                    .map(|spec| {
                        let value = values.remove(spec.name).or_else(|| spec.default.value());
                        (spec.name, value)
                    })
                    .collect();
                NormalizedRecord {
                    key,
                    area_id: area.id,
                    country_code: area.country_code.to_string(),
                    fields,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SourceVariant;
    use crate::reference::AreaTable;
    use chrono::{DateTime, Duration, Utc};
    use rust_decimal_macros::dec;

    fn day_start() -> DateTime<Utc> {
        PeriodCalendar::prague().day_start(chrono::NaiveDate::from_ymd_opt(2025, 11, 10).unwrap())
    }

    fn sample(source: SourceVariant, field: &'static str, period: i64, value: Decimal) -> RawSample {
        RawSample::new(source, field, day_start() + Duration::minutes((period - 1) * 15), value)
    }

    #[test]
    fn test_outer_merge_is_union_of_periods() {
        let calendar = PeriodCalendar::prague();
        let areas = AreaTable::standard();
        let combiner = Combiner::new(vec![
            FieldSpec::nullable("actual_load_mw"),
            FieldSpec::nullable("forecast_load_mw"),
        ]);

        let first: Vec<RawSample> = [1, 2, 3, 4]
            .into_iter()
            .map(|p| sample(SourceVariant::EntsoeActualLoad, "actual_load_mw", p, dec!(100)))
            .collect();
        let second: Vec<RawSample> = [2, 3, 5]
            .into_iter()
            .map(|p| sample(SourceVariant::EntsoeLoadForecast, "forecast_load_mw", p, dec!(90)))
            .collect();

        let records = combiner.combine(&calendar, areas.home(), first.iter().chain(second.iter()));
        let periods: Vec<u32> = records.iter().map(|r| r.key.period).collect();
        assert_eq!(periods, vec![1, 2, 3, 4, 5]);

        assert_eq!(records[0].fields["forecast_load_mw"], None);
        assert_eq!(records[0].number("actual_load_mw"), Some(dec!(100)));
        assert_eq!(records[1].number("forecast_load_mw"), Some(dec!(90)));
        assert_eq!(records[4].fields["actual_load_mw"], None);
        assert_eq!(records[4].number("forecast_load_mw"), Some(dec!(90)));
        assert!(records.iter().all(|r| r.area_id == 1 && r.country_code == "CZ"));
    }

    #[test]
    fn test_defaults_are_applied_per_field() {
        let calendar = PeriodCalendar::prague();
        let areas = AreaTable::standard();
        let combiner = Combiner::new(vec![
            FieldSpec::zero("gen_solar_mw"),
            FieldSpec::nullable("gen_wind_mw"),
            FieldSpec {
                name: "is_15min",
                default: FieldDefault::Flag(true),
                merge: MergeRule::Replace,
            },
        ]);

        let samples = vec![sample(SourceVariant::EntsoeGeneration, "gen_wind_mw", 1, dec!(12))];
        let records = combiner.combine(&calendar, areas.home(), &samples);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].number("gen_solar_mw"), Some(Decimal::ZERO));
        assert_eq!(records[0].number("gen_wind_mw"), Some(dec!(12)));
        assert_eq!(records[0].get("is_15min"), Some(&Value::Flag(true)));
    }

    #[test]
    fn test_merge_rules() {
        let calendar = PeriodCalendar::prague();
        let areas = AreaTable::standard();
        let combiner = Combiner::new(vec![FieldSpec::summed("flow_de_mw"), FieldSpec::nullable("x")]);

        let samples = vec![
            sample(SourceVariant::EntsoeActualLoad, "flow_de_mw", 1, dec!(500)),
            sample(SourceVariant::EntsoeActualLoad, "flow_de_mw", 1, dec!(-120)),
            sample(SourceVariant::EntsoeActualLoad, "x", 1, dec!(1)),
            sample(SourceVariant::EntsoeActualLoad, "x", 1, dec!(2)),
            sample(SourceVariant::EntsoeActualLoad, "undeclared", 7, dec!(9)),
        ];
        let records = combiner.combine(&calendar, areas.home(), &samples);

        // The undeclared field does not create a period of its own.
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].number("flow_de_mw"), Some(dec!(380)));
        assert_eq!(records[0].number("x"), Some(dec!(2)));
    }

    #[test]
    fn test_empty_input() {
        let combiner = Combiner::new(vec![FieldSpec::nullable("x")]);
        let records = combiner.combine(&PeriodCalendar::prague(), AreaTable::standard().home(), &[]);
        assert!(records.is_empty());
    }
}
