//! Instant parsing for provider timestamps
//!
//! Offset-qualified text (`2025-10-25T22:00Z`, `2025-11-01T00:00:00+01:00`)
//! is unambiguous. Naive provider-local text is resolved against the
//! reference zone; inside the repeated fall-back hour the reading is
//! disambiguated by the order in which samples arrive.

use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use super::{CalendarError, CalendarResult};

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M%:z", "%Y-%m-%d %H:%M:%S%:z"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an offset-qualified timestamp. A trailing `Z` means UTC.
pub fn parse_offset_instant(text: &str) -> CalendarResult<DateTime<Utc>> {
    try_offset(text.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| CalendarError::malformed(text, "expected an ISO-8601 timestamp with offset"))
}

fn try_offset(text: &str) -> Option<DateTime<FixedOffset>> {
    let normalized = match text.strip_suffix('Z') {
        Some(head) => format!("{}+00:00", head),
        None => text.to_string(),
    };

    DateTime::parse_from_rfc3339(&normalized).ok().or_else(|| {
        OFFSET_FORMATS
            .iter()
            .find_map(|fmt| DateTime::parse_from_str(&normalized, fmt).ok())
    })
}

fn try_naive(text: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

/// Stateful parser accepting both offset and provider-local timestamps.
///
/// Keep one parser per document so that naive readings in the repeated
/// fall-back hour resolve in document order.
#[derive(Debug, Clone)]
pub struct InstantParser {
    tz: Tz,
    last: Option<DateTime<Utc>>,
}

impl InstantParser {
    /// Create a parser resolving naive readings in `tz`
    pub fn new(tz: Tz) -> Self {
        Self { tz, last: None }
    }

    /// Parse one timestamp.
    ///
    /// # Errors
    ///
    /// `MalformedTimestamp` when the text matches no known form, or when a
    /// naive reading does not exist in the reference zone (spring gap).
    pub fn parse(&mut self, text: &str) -> CalendarResult<DateTime<Utc>> {
        let text = text.trim();
        let instant = match try_offset(text) {
            Some(dt) => dt.with_timezone(&Utc),
            None => {
                let naive = try_naive(text).ok_or_else(|| {
                    CalendarError::malformed(text, "matches neither offset nor local form")
                })?;
                self.resolve_local(text, naive)?
            }
        };
        self.last = Some(instant);
        Ok(instant)
    }

    fn resolve_local(&self, text: &str, naive: NaiveDateTime) -> CalendarResult<DateTime<Utc>> {
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earlier, later) => {
                let earlier = earlier.with_timezone(&Utc);
                // Once the sequence has passed the earlier reading we are in the repeat.
                match self.last {
                    Some(last) if last >= earlier => Ok(later.with_timezone(&Utc)),
                    _ => Ok(earlier),
                }
            }
            LocalResult::None => Err(CalendarError::malformed(
                text,
                format!("local time does not exist in {}", self.tz.name()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_minute_precision_utc() {
        assert_eq!(
            parse_offset_instant("2025-10-25T22:00Z").unwrap(),
            utc("2025-10-25T22:00:00Z")
        );
        assert_eq!(
            parse_offset_instant("2025-11-01T00:00:00+01:00").unwrap(),
            utc("2025-10-31T23:00:00Z")
        );
    }

    #[test]
    fn test_offset_parser_rejects_naive_text() {
        let err = parse_offset_instant("2025-11-01T00:00:00").unwrap_err();
        assert!(matches!(err, CalendarError::MalformedTimestamp { .. }));
        assert!(parse_offset_instant("yesterday").is_err());
    }

    #[test]
    fn test_naive_reading_uses_reference_zone() {
        let mut parser = InstantParser::new(chrono_tz::Europe::Prague);
        assert_eq!(
            parser.parse("2025-11-10 08:00:00").unwrap(),
            utc("2025-11-10T07:00:00Z")
        );
        assert_eq!(
            parser.parse("2025-07-10T08:00").unwrap(),
            utc("2025-07-10T06:00:00Z")
        );
    }

    #[test]
    fn test_naive_repeated_hour_follows_document_order() {
        let mut parser = InstantParser::new(chrono_tz::Europe::Prague);
        let first = parser.parse("2025-10-26T02:30:00").unwrap();
        let mid = parser.parse("2025-10-26T02:59:00").unwrap();
        let repeat = parser.parse("2025-10-26T02:30:00").unwrap();

        assert_eq!(first, utc("2025-10-26T00:30:00Z"));
        assert_eq!(mid, utc("2025-10-26T00:59:00Z"));
        assert_eq!(repeat, utc("2025-10-26T01:30:00Z"));
    }

    #[test]
    fn test_naive_time_in_spring_gap_is_malformed() {
        let mut parser = InstantParser::new(chrono_tz::Europe::Prague);
        let err = parser.parse("2025-03-30T02:30:00").unwrap_err();
        assert!(matches!(err, CalendarError::MalformedTimestamp { .. }));
    }
}
