//! Chunk planning

use chrono::{DateTime, Days, Duration, Utc};
use serde::Serialize;
use std::fmt;

use super::RunWindow;
use crate::calendar::PeriodCalendar;

/// One bounded slice of a run window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// 1-based position in the run
    pub index: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk {} [{}, {})",
            self.index,
            self.start.format("%Y-%m-%dT%H:%MZ"),
            self.end.format("%Y-%m-%dT%H:%MZ")
        )
    }
}

/// Split a window into contiguous chunks of at most `days` days.
///
/// A chunk starting at local midnight ends at local midnight `days` later,
/// so daily chunks line up with trade dates across DST changes.
pub fn plan_chunks(calendar: &PeriodCalendar, window: &RunWindow, days: u32) -> Vec<Chunk> {
    let days = days.max(1);
    let mut chunks = Vec::new();
    let mut start = window.start;

    while start < window.end {
        let date = calendar.trade_date(start);
        let next = if calendar.day_start(date) == start {
            date.checked_add_days(Days::new(u64::from(days)))
                .map(|d| calendar.day_start(d))
                .unwrap_or(window.end)
        } else {
            start + Duration::days(i64::from(days))
        };
        let end = next.min(window.end);

        chunks.push(Chunk {
            index: chunks.len() + 1,
            start,
            end,
        });
        start = end;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_chunks_are_contiguous_and_bounded() {
        let calendar = PeriodCalendar::prague();
        let window = RunWindow::new(
            calendar.day_start(date(2025, 1, 1)),
            calendar.day_start(date(2025, 3, 12)),
        );

        let chunks = plan_chunks(&calendar, &window, 7);
        assert_eq!(chunks.len(), 10);
        assert_eq!(chunks[0].start, window.start);
        assert_eq!(chunks[9].end, window.end);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(chunks[3].index, 4);
    }

    #[test]
    fn test_last_chunk_is_clipped() {
        let calendar = PeriodCalendar::prague();
        let window = RunWindow::new(
            calendar.day_start(date(2025, 1, 1)),
            calendar.day_start(date(2025, 1, 10)),
        );

        let chunks = plan_chunks(&calendar, &window, 7);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].start, calendar.day_start(date(2025, 1, 8)));
        assert_eq!(chunks[1].end, window.end);
    }

    #[test]
    fn test_daily_chunks_follow_trade_dates_over_fall_back() {
        let calendar = PeriodCalendar::prague();
        let window = RunWindow::new(
            calendar.day_start(date(2025, 10, 25)),
            calendar.day_start(date(2025, 10, 28)),
        );

        let chunks = plan_chunks(&calendar, &window, 1);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].end - chunks[1].start, Duration::hours(25));
        assert_eq!(chunks[2].start, calendar.day_start(date(2025, 10, 27)));
    }

    #[test]
    fn test_unaligned_window_uses_plain_days() {
        let calendar = PeriodCalendar::prague();
        let start = Utc.with_ymd_and_hms(2025, 11, 10, 7, 0, 0).unwrap();
        let window = RunWindow::new(start, start + Duration::hours(3));

        let chunks = plan_chunks(&calendar, &window, 7);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].end, window.end);
    }

    #[test]
    fn test_empty_window_has_no_chunks() {
        let calendar = PeriodCalendar::prague();
        let start = Utc.with_ymd_and_hms(2025, 11, 10, 0, 0, 0).unwrap();
        assert!(plan_chunks(&calendar, &RunWindow::new(start, start), 7).is_empty());
    }
}
