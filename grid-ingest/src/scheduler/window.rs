//! Run modes and window resolution

use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;

use grid_common::error::ConfigurationError;

use crate::calendar::{CalendarResult, PeriodCalendar, PERIOD_MINUTES};
use crate::dataset::Dataset;

/// How the run window is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Fixed lookback ending now
    Normal,
    /// Resume after the latest stored period, through yesterday
    Auto,
    /// Local dates `[start, end)`
    Explicit { start: NaiveDate, end: NaiveDate },
}

impl RunMode {
    /// Mode of a backfill from its positional arguments.
    ///
    /// No arguments is auto mode, two dates an explicit window; anything
    /// else is rejected.
    pub fn from_positionals<S: AsRef<str>>(args: &[S]) -> Result<Self, ConfigurationError> {
        match args {
            [] => Ok(RunMode::Auto),
            [start, end] => {
                let start = parse_date("START", start.as_ref())?;
                let end = parse_date("END", end.as_ref())?;
                if start >= end {
                    return Err(ConfigurationError::invalid(
                        "START",
                        format!("{} is not before END {}", start, end),
                    ));
                }
                Ok(RunMode::Explicit { start, end })
            }
            other => Err(ConfigurationError::invalid(
                "arguments",
                format!("expected no dates or START END, got {} values", other.len()),
            )),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Normal => write!(f, "normal"),
            RunMode::Auto => write!(f, "auto"),
            RunMode::Explicit { start, end } => write!(f, "explicit {}..{}", start, end),
        }
    }
}

fn parse_date(field: &str, text: &str) -> Result<NaiveDate, ConfigurationError> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| ConfigurationError::invalid(field, format!("'{}' is not YYYY-MM-DD: {}", text, e)))
}

/// Half-open instant range a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl RunWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for RunWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%dT%H:%MZ"),
            self.end.format("%Y-%m-%dT%H:%MZ")
        )
    }
}

/// Start of the 15-minute slot holding `instant`.
///
/// Prague offsets are whole hours, so flooring in UTC lands on the grid.
pub fn floor_to_period(instant: DateTime<Utc>) -> DateTime<Utc> {
    let secs = instant.timestamp();
    let floored = secs - secs.rem_euclid(PERIOD_MINUTES * 60);
    DateTime::from_timestamp(floored, 0).unwrap_or(instant)
}

/// Window of a normal run: the lookback, or today and tomorrow for daily data
pub fn normal_window(
    dataset: Dataset,
    calendar: &PeriodCalendar,
    now: DateTime<Utc>,
    lookback_hours: u32,
) -> RunWindow {
    if dataset.is_daily() {
        let today = calendar.trade_date(now);
        let end = today.checked_add_days(Days::new(2)).unwrap_or(today);
        return RunWindow::new(calendar.day_start(today), calendar.day_start(end));
    }

    RunWindow::new(
        floor_to_period(now - Duration::hours(i64::from(lookback_hours))),
        floor_to_period(now),
    )
}

pub fn explicit_window(calendar: &PeriodCalendar, start: NaiveDate, end: NaiveDate) -> RunWindow {
    RunWindow::new(calendar.day_start(start), calendar.day_start(end))
}

/// Window of an auto run.
///
/// Starts after `latest`, the last stored (trade_date, period), or at
/// `earliest` on an empty table. Ends at local midnight today; the window
/// is empty when there is nothing left to fetch.
pub fn auto_window(
    calendar: &PeriodCalendar,
    latest: Option<(NaiveDate, u32)>,
    earliest: NaiveDate,
    now: DateTime<Utc>,
) -> CalendarResult<RunWindow> {
    let start = match latest {
        Some((date, period)) => calendar.period_start(date, period)? + Duration::minutes(PERIOD_MINUTES),
        None => calendar.day_start(earliest),
    };
    let end = calendar.day_start(calendar.trade_date(now));

    Ok(RunWindow::new(start, end.max(start)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::CepsDataset;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_positionals() {
        let none: [&str; 0] = [];
        assert_eq!(RunMode::from_positionals(&none).unwrap(), RunMode::Auto);
        assert_eq!(
            RunMode::from_positionals(&["2025-01-01", "2025-02-01"]).unwrap(),
            RunMode::Explicit {
                start: date(2025, 1, 1),
                end: date(2025, 2, 1)
            }
        );
        assert!(RunMode::from_positionals(&["2025-01-01"]).is_err());
        assert!(RunMode::from_positionals(&["2025-02-01", "2025-01-01"]).is_err());
        assert!(RunMode::from_positionals(&["2025-01-01", "2025-01-01"]).is_err());
        assert!(RunMode::from_positionals(&["yesterday", "today"]).is_err());
    }

    #[test]
    fn test_normal_window_is_floored_lookback() {
        let calendar = PeriodCalendar::prague();
        let now = Utc.with_ymd_and_hms(2025, 11, 10, 10, 7, 31).unwrap();

        let window = normal_window(Dataset::Ceps(CepsDataset::Imbalance), &calendar, now, 3);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2025, 11, 10, 7, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2025, 11, 10, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_normal_window_for_daily_data() {
        let calendar = PeriodCalendar::prague();
        let now = Utc.with_ymd_and_hms(2025, 11, 10, 23, 30, 0).unwrap();

        // 00:30 local on the 11th
        let window = normal_window(Dataset::OteDayAhead, &calendar, now, 3);
        assert_eq!(window.start, calendar.day_start(date(2025, 11, 11)));
        assert_eq!(window.end, calendar.day_start(date(2025, 11, 13)));
    }

    #[test]
    fn test_explicit_window_uses_local_midnight() {
        let calendar = PeriodCalendar::prague();
        let window = explicit_window(&calendar, date(2025, 7, 1), date(2025, 7, 2));
        assert_eq!(window.start, Utc.with_ymd_and_hms(2025, 6, 30, 22, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2025, 7, 1, 22, 0, 0).unwrap());
    }

    #[test]
    fn test_auto_window_resumes_after_latest_period() {
        let calendar = PeriodCalendar::prague();
        let now = Utc.with_ymd_and_hms(2025, 11, 12, 9, 0, 0).unwrap();

        let window = auto_window(&calendar, Some((date(2025, 11, 10), 96)), date(2024, 1, 1), now).unwrap();
        assert_eq!(window.start, calendar.day_start(date(2025, 11, 11)));
        assert_eq!(window.end, calendar.day_start(date(2025, 11, 12)));

        let window = auto_window(&calendar, None, date(2025, 11, 1), now).unwrap();
        assert_eq!(window.start, calendar.day_start(date(2025, 11, 1)));
    }

    #[test]
    fn test_auto_window_up_to_date_is_empty() {
        let calendar = PeriodCalendar::prague();
        let now = Utc.with_ymd_and_hms(2025, 11, 12, 9, 0, 0).unwrap();

        let window = auto_window(&calendar, Some((date(2025, 11, 11), 96)), date(2024, 1, 1), now).unwrap();
        assert!(window.is_empty());

        // Data already beyond yesterday
        let window = auto_window(&calendar, Some((date(2025, 11, 12), 40)), date(2024, 1, 1), now).unwrap();
        assert!(window.is_empty());
    }
}
