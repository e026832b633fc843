//! Interval aggregator
//!
//! Downsamples sub-period samples (CEPS publishes per minute) into one
//! record per 15-minute window with mean, median and last value.
//! Windows are half-open `[start, start + 15min)`.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::calendar::{PeriodCalendar, PERIOD_MINUTES};
use crate::schema::{AggregatedRecord, RawSample, WindowStats};

/// Statistics of one window's samples, given in chronological order.
///
/// `None` values are skipped by mean and median but still count for last.
pub fn window_stats(values: &[Option<Decimal>]) -> WindowStats {
    let mut numbers: Vec<Decimal> = values.iter().flatten().copied().collect();
    if values.is_empty() {
        return WindowStats::default();
    }

    let last = values.last().copied().flatten();
    if numbers.is_empty() {
        return WindowStats {
            mean: None,
            median: None,
            last,
        };
    }

    let count = Decimal::from(numbers.len());
    let mean = numbers.iter().copied().sum::<Decimal>() / count;

    numbers.sort();
    let mid = numbers.len() / 2;
    let median = if numbers.len() % 2 == 1 {
        numbers[mid]
    } else {
        (numbers[mid - 1] + numbers[mid]) / Decimal::TWO
    };

    WindowStats {
        mean: Some(mean),
        median: Some(median),
        last,
    }
}

/// Aggregates samples of a fixed field set onto the period grid
#[derive(Debug, Clone, Copy)]
pub struct IntervalAggregator<'a> {
    calendar: &'a PeriodCalendar,
    fields: &'a [&'static str],
}

impl<'a> IntervalAggregator<'a> {
    pub fn new(calendar: &'a PeriodCalendar, fields: &'a [&'static str]) -> Self {
        Self { calendar, fields }
    }

    /// One record per window in `[start, end)`, including empty windows.
    ///
    /// `start` is floored to its period; samples outside the span are ignored.
    pub fn aggregate(
        &self,
        area_id: i32,
        samples: &[RawSample],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<AggregatedRecord> {
        let span_start = self.calendar.slot_start(start);
        let window = Duration::minutes(PERIOD_MINUTES);

        // Stable: equal instants keep arrival order.
        let mut ordered: Vec<&RawSample> = samples
            .iter()
            .filter(|s| s.instant >= span_start && s.instant < end)
            .collect();
        ordered.sort_by_key(|s| s.instant);

        let mut buckets: BTreeMap<(i64, &'static str), Vec<Option<Decimal>>> = BTreeMap::new();
        for sample in ordered {
            if !self.fields.contains(&sample.field) {
                continue;
            }
            let index = (sample.instant - span_start).num_seconds() / window.num_seconds();
            buckets
                .entry((index, sample.field))
                .or_default()
                .push(sample.value.as_number());
        }

        let mut records = Vec::new();
        let mut index = 0i64;
        loop {
            let slot = span_start + window * index as i32;
            if slot >= end {
                break;
            }

            let fields = self
                .fields
                .iter()
                .map(|&field| {
                    let stats = buckets
                        .get(&(index, field))
                        .map(|values| window_stats(values))
                        .unwrap_or_default();
                    (field, stats)
                })
                .collect();

            records.push(AggregatedRecord {
                key: self.calendar.period_key(slot),
                area_id,
                fields,
            });
            index += 1;
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{CepsDataset, SourceVariant};
    use crate::schema::Value;
    use rust_decimal_macros::dec;

    const SOURCE: SourceVariant = SourceVariant::Ceps(CepsDataset::Imbalance);

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn minute(s: &str, value: Decimal) -> RawSample {
        RawSample::new(SOURCE, "load_mw", at(s), value)
    }

    #[test]
    fn test_window_stats() {
        assert!(window_stats(&[]).is_null());

        let single = window_stats(&[Some(dec!(4.2))]);
        assert_eq!(single.mean, Some(dec!(4.2)));
        assert_eq!(single.median, Some(dec!(4.2)));
        assert_eq!(single.last, Some(dec!(4.2)));

        let even = window_stats(&[Some(dec!(5)), Some(dec!(1)), Some(dec!(2)), Some(dec!(10))]);
        assert_eq!(even.mean, Some(dec!(4.5)));
        assert_eq!(even.median, Some(dec!(3.5)));
        assert_eq!(even.last, Some(dec!(10)));

        let trailing_null = window_stats(&[Some(dec!(1)), None]);
        assert_eq!(trailing_null.mean, Some(dec!(1)));
        assert_eq!(trailing_null.last, None);
    }

    #[test]
    fn test_half_open_windows() {
        let calendar = PeriodCalendar::prague();
        let fields = ["load_mw"];
        let aggregator = IntervalAggregator::new(&calendar, &fields);

        let samples = vec![
            minute("2025-11-10T08:00:00+01:00", dec!(10)),
            minute("2025-11-10T08:14:00+01:00", dec!(20)),
            minute("2025-11-10T08:15:00+01:00", dec!(30)),
        ];
        let records = aggregator.aggregate(
            1,
            &samples,
            at("2025-11-10T08:00:00+01:00"),
            at("2025-11-10T08:30:00+01:00"),
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key.period, 33);
        let first = records[0].stats("load_mw").unwrap();
        assert_eq!(first.mean, Some(dec!(15)));
        assert_eq!(first.last, Some(dec!(20)));

        let second = records[1].stats("load_mw").unwrap();
        assert_eq!(second.mean, Some(dec!(30)));
        assert_eq!(second.median, Some(dec!(30)));
        assert_eq!(second.last, Some(dec!(30)));
    }

    #[test]
    fn test_empty_window_emits_null_record() {
        let calendar = PeriodCalendar::prague();
        let fields = ["load_mw", "other_mw"];
        let aggregator = IntervalAggregator::new(&calendar, &fields);

        let samples = vec![minute("2025-11-10T08:31:00+01:00", dec!(7))];
        let records = aggregator.aggregate(
            1,
            &samples,
            at("2025-11-10T08:00:00+01:00"),
            at("2025-11-10T08:45:00+01:00"),
        );

        assert_eq!(records.len(), 3);
        assert!(records[0].stats("load_mw").unwrap().is_null());
        assert!(records[1].stats("load_mw").unwrap().is_null());
        assert_eq!(records[2].stats("load_mw").unwrap().last, Some(dec!(7)));
        assert!(records[2].stats("other_mw").unwrap().is_null());
    }

    #[test]
    fn test_last_prefers_latest_instant_then_arrival() {
        let calendar = PeriodCalendar::prague();
        let fields = ["load_mw"];
        let aggregator = IntervalAggregator::new(&calendar, &fields);

        let samples = vec![
            minute("2025-11-10T08:05:00+01:00", dec!(1)),
            minute("2025-11-10T08:10:00+01:00", dec!(2)),
            minute("2025-11-10T08:10:00+01:00", dec!(3)),
            minute("2025-11-10T08:01:00+01:00", dec!(4)),
        ];
        let records = aggregator.aggregate(
            1,
            &samples,
            at("2025-11-10T08:00:00+01:00"),
            at("2025-11-10T08:15:00+01:00"),
        );
        assert_eq!(records[0].stats("load_mw").unwrap().last, Some(dec!(3)));
    }

    #[test]
    fn test_non_numeric_values_are_excluded_from_mean() {
        let calendar = PeriodCalendar::prague();
        let fields = ["load_mw"];
        let aggregator = IntervalAggregator::new(&calendar, &fields);

        let mut flagged = minute("2025-11-10T08:02:00+01:00", dec!(0));
        flagged.value = Value::Flag(true);
        let samples = vec![minute("2025-11-10T08:01:00+01:00", dec!(6)), flagged];
        let records = aggregator.aggregate(
            1,
            &samples,
            at("2025-11-10T08:00:00+01:00"),
            at("2025-11-10T08:15:00+01:00"),
        );
        let stats = records[0].stats("load_mw").unwrap();
        assert_eq!(stats.mean, Some(dec!(6)));
        assert_eq!(stats.last, None);
    }

    #[test]
    fn test_fall_back_day_windows_follow_calendar() {
        let calendar = PeriodCalendar::prague();
        let fields = ["load_mw"];
        let aggregator = IntervalAggregator::new(&calendar, &fields);
        let day = chrono::NaiveDate::from_ymd_opt(2025, 10, 26).unwrap();
        let next = day.succ_opt().unwrap();

        let records = aggregator.aggregate(1, &[], calendar.day_start(day), calendar.day_start(next));
        assert_eq!(records.len(), 100);
        assert_eq!(records[99].key.period, 100);
    }
}
