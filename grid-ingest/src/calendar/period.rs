//! Trade period grid

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use grid_common::error::{ErrorCategory, ErrorClassification};

/// Length of one trade period in minutes
pub const PERIOD_MINUTES: i64 = 15;

/// Calendar errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CalendarError {
    #[error("Malformed timestamp '{input}': {reason}")]
    MalformedTimestamp { input: String, reason: String },

    #[error("Period {period} does not exist on {trade_date} ({periods} periods that day)")]
    PeriodOutOfRange {
        trade_date: NaiveDate,
        period: u32,
        periods: u32,
    },
}

impl CalendarError {
    /// Create a MalformedTimestamp error
    pub fn malformed(input: impl Into<String>, reason: impl Into<String>) -> Self {
        CalendarError::MalformedTimestamp {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

impl ErrorClassification for CalendarError {
    fn category(&self) -> ErrorCategory {
        match self {
            // A timestamp format we cannot read means the source contract changed.
            CalendarError::MalformedTimestamp { .. } => ErrorCategory::Configuration,
            CalendarError::PeriodOutOfRange { .. } => ErrorCategory::Permanent,
        }
    }
}

pub type CalendarResult<T> = Result<T, CalendarError>;

/// Canonical key of one trade period.
///
/// Ordering is chronological: by trade date, then period number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PeriodKey {
    pub trade_date: NaiveDate,
    pub period: u32,
    /// Local wall-clock boundaries, `"HH:MM-HH:MM"`
    pub time_interval: String,
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{} ({})", self.trade_date, self.period, self.time_interval)
    }
}

/// The 15-minute period grid of one reference time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodCalendar {
    tz: Tz,
}

impl Default for PeriodCalendar {
    fn default() -> Self {
        Self::prague()
    }
}

impl PeriodCalendar {
    /// Create a calendar for the given zone
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Calendar of the Czech market (Europe/Prague)
    pub fn prague() -> Self {
        Self::new(chrono_tz::Europe::Prague)
    }

    /// Reference time zone
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// First instant of a local calendar day.
    ///
    /// When local midnight falls into a DST gap the first existing
    /// quarter-hour after it is used.
    pub fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(chrono::NaiveTime::MIN);
        for step in 0..=8 {
            let wall = midnight + Duration::minutes(step * PERIOD_MINUTES);
            if let Some(local) = self.tz.from_local_datetime(&wall).earliest() {
                return local.with_timezone(&Utc);
            }
        }
        midnight.and_utc()
    }

    /// Number of periods on a local calendar day (96, 92 or 100 in Prague)
    pub fn periods_in_day(&self, date: NaiveDate) -> u32 {
        let next = date.succ_opt().unwrap_or(date);
        let minutes = (self.day_start(next) - self.day_start(date)).num_minutes();
        (minutes / PERIOD_MINUTES) as u32
    }

    /// Local calendar date of an instant
    pub fn trade_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// Map an instant to its period key.
    ///
    /// The period is counted from elapsed time since local midnight, so the
    /// repeated hour of the fall-back day gets its own consecutive periods.
    pub fn period_key(&self, instant: DateTime<Utc>) -> PeriodKey {
        let trade_date = self.trade_date(instant);
        let day_start = self.day_start(trade_date);
        let index = ((instant - day_start).num_minutes() / PERIOD_MINUTES).max(0);
        let slot_start = day_start + Duration::minutes(index * PERIOD_MINUTES);

        PeriodKey {
            trade_date,
            period: index as u32 + 1,
            time_interval: self.render_interval(slot_start),
        }
    }

    /// Start instant of the period containing `instant`
    pub fn slot_start(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let day_start = self.day_start(self.trade_date(instant));
        let index = ((instant - day_start).num_minutes() / PERIOD_MINUTES).max(0);
        day_start + Duration::minutes(index * PERIOD_MINUTES)
    }

    /// Start instant of a numbered period on a trade date
    pub fn period_start(&self, trade_date: NaiveDate, period: u32) -> CalendarResult<DateTime<Utc>> {
        let periods = self.periods_in_day(trade_date);
        if period == 0 || period > periods {
            return Err(CalendarError::PeriodOutOfRange {
                trade_date,
                period,
                periods,
            });
        }
        Ok(self.day_start(trade_date) + Duration::minutes((period as i64 - 1) * PERIOD_MINUTES))
    }

    /// Render `"HH:MM-HH:MM"` for the slot starting at `slot_start`.
    ///
    /// The end is the latest wall-clock reading of the boundary instant, so
    /// the last summer-time slot of the fall-back day reads `02:45-03:00`.
    fn render_interval(&self, slot_start: DateTime<Utc>) -> String {
        let start = slot_start.with_timezone(&self.tz).naive_local();
        let end = self.latest_reading(slot_start + Duration::minutes(PERIOD_MINUTES));
        format!("{}-{}", start.format("%H:%M"), end.format("%H:%M"))
    }

    fn latest_reading(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        let utc = instant.naive_utc();
        let before = self
            .tz
            .offset_from_utc_datetime(&(utc - Duration::seconds(1)))
            .fix()
            .local_minus_utc();
        let after = self.tz.offset_from_utc_datetime(&utc).fix().local_minus_utc();
        utc + Duration::seconds(before.max(after) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_winter_morning_period() {
        let key = PeriodCalendar::prague().period_key(at("2025-11-10T08:00:00+01:00"));
        assert_eq!(key.trade_date, date("2025-11-10"));
        assert_eq!(key.period, 33);
        assert_eq!(key.time_interval, "08:00-08:15");
    }

    #[test]
    fn test_ordinary_day_interval_matches_period_number() {
        let calendar = PeriodCalendar::prague();
        let day = date("2025-06-17");
        assert_eq!(calendar.periods_in_day(day), 96);

        for period in 1..=96u32 {
            let start = calendar.period_start(day, period).unwrap();
            // Any instant inside the slot maps to the same key.
            let key = calendar.period_key(start + Duration::minutes(14));
            let from = (period - 1) * 15;
            let to = (period * 15) % (24 * 60);
            let expected = format!(
                "{:02}:{:02}-{:02}:{:02}",
                from / 60,
                from % 60,
                to / 60,
                to % 60
            );
            assert_eq!(key.trade_date, day);
            assert_eq!(key.period, period);
            assert_eq!(key.time_interval, expected);
        }
    }

    #[test]
    fn test_transition_day_period_counts() {
        let calendar = PeriodCalendar::prague();
        assert_eq!(calendar.periods_in_day(date("2025-03-30")), 92);
        assert_eq!(calendar.periods_in_day(date("2025-10-26")), 100);
        assert_eq!(calendar.periods_in_day(date("2025-10-27")), 96);
    }

    #[test]
    fn test_fall_back_repeated_hour_gets_distinct_periods() {
        let calendar = PeriodCalendar::prague();
        let first = calendar.period_key(at("2025-10-26T02:30:00+02:00"));
        let second = calendar.period_key(at("2025-10-26T02:30:00+01:00"));

        assert_eq!(first.trade_date, date("2025-10-26"));
        assert_eq!(second.trade_date, date("2025-10-26"));
        assert_ne!(first, second);
        assert!(first < second);
        assert_eq!(first.period, 11);
        assert_eq!(second.period, 15);
        assert_eq!(first.time_interval, "02:30-02:45");
        assert_eq!(second.time_interval, "02:30-02:45");
    }

    #[test]
    fn test_fall_back_boundary_rendering() {
        let calendar = PeriodCalendar::prague();
        let day = date("2025-10-26");
        let last_summer = calendar.period_key(calendar.period_start(day, 12).unwrap());
        let first_winter = calendar.period_key(calendar.period_start(day, 13).unwrap());
        assert_eq!(last_summer.time_interval, "02:45-03:00");
        assert_eq!(first_winter.time_interval, "02:00-02:15");

        let last = calendar.period_key(calendar.period_start(day, 100).unwrap());
        assert_eq!(last.time_interval, "23:45-00:00");
        assert_eq!(last.trade_date, day);
    }

    #[test]
    fn test_spring_forward_skips_missing_hour() {
        let calendar = PeriodCalendar::prague();
        let day = date("2025-03-30");
        let before_gap = calendar.period_key(calendar.period_start(day, 8).unwrap());
        let after_gap = calendar.period_key(calendar.period_start(day, 9).unwrap());
        assert_eq!(before_gap.time_interval, "01:45-03:00");
        assert_eq!(after_gap.time_interval, "03:00-03:15");

        let key = calendar.period_key(at("2025-03-30T03:00:00+02:00"));
        assert_eq!(key.period, 9);
    }

    #[test]
    fn test_period_out_of_range() {
        let calendar = PeriodCalendar::prague();
        let err = calendar.period_start(date("2025-03-30"), 93).unwrap_err();
        assert!(matches!(err, CalendarError::PeriodOutOfRange { periods: 92, .. }));
        assert!(calendar.period_start(date("2025-10-26"), 100).is_ok());
        assert!(calendar.period_start(date("2025-10-26"), 0).is_err());
    }

    #[test]
    fn test_slot_start_floors_to_period() {
        let calendar = PeriodCalendar::prague();
        let slot = calendar.slot_start(at("2025-11-10T08:07:31+01:00"));
        assert_eq!(slot, at("2025-11-10T08:00:00+01:00"));
    }
}
