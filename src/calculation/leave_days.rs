//! Leave day arithmetic on a fixed UTC+9 civil calendar.
//!
//! Instants are projected onto civil days in UTC+9 regardless of the offset
//! they carry, so a request means the same days for every caller.

use chrono::{DateTime, TimeZone};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Offset of the civil calendar leave days are counted in.
pub const CIVIL_OFFSET_SECONDS: i64 = 9 * 3600;

const SECONDS_PER_DAY: i64 = 86_400;

/// Days since the Unix epoch of the UTC+9 calendar day containing `instant`.
///
/// # Example
///
/// ```
/// use chrono::DateTime;
/// use timepay_engine::calculation::civil_day_index;
///
/// // 23:30 UTC on March 2nd is already March 3rd in UTC+9.
/// let late = DateTime::parse_from_rfc3339("2026-03-02T23:30:00Z").unwrap();
/// let next = DateTime::parse_from_rfc3339("2026-03-03T08:00:00+09:00").unwrap();
/// assert_eq!(civil_day_index(&late), civil_day_index(&next));
/// ```
pub fn civil_day_index<Tz: TimeZone>(instant: &DateTime<Tz>) -> i64 {
    (instant.timestamp() + CIVIL_OFFSET_SECONDS).div_euclid(SECONDS_PER_DAY)
}

/// Number of civil days covered by `start..=end`, counting both ends.
///
/// Fails with a validation error when `end` is before `start`.
///
/// # Example
///
/// ```
/// use chrono::DateTime;
/// use timepay_engine::calculation::calculate_leave_days;
///
/// let start = DateTime::parse_from_rfc3339("2026-03-03T00:00:00+09:00").unwrap();
/// let end = DateTime::parse_from_rfc3339("2026-03-04T00:00:00+09:00").unwrap();
/// assert_eq!(calculate_leave_days(&start, &end).unwrap(), 2);
/// ```
pub fn calculate_leave_days<Tz: TimeZone>(
    start: &DateTime<Tz>,
    end: &DateTime<Tz>,
) -> EngineResult<i64> {
    if end < start {
        return Err(EngineError::validation(
            "endDate must be same or after startDate",
        ));
    }
    let days = civil_day_index(end) - civil_day_index(start) + 1;
    if days <= 0 {
        return Err(EngineError::validation("leave days must be positive"));
    }
    debug!(days, "calculated leave days");
    Ok(days)
}

/// An inclusive span of civil day indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilDayRange {
    /// First day.
    pub first: i64,
    /// Last day, inclusive.
    pub last: i64,
}

impl CivilDayRange {
    /// The civil days touched by `start..=end`.
    pub fn from_instants<Tz: TimeZone>(start: &DateTime<Tz>, end: &DateTime<Tz>) -> Self {
        Self {
            first: civil_day_index(start),
            last: civil_day_index(end),
        }
    }

    /// Whether the two ranges share at least one day.
    pub fn overlaps(&self, other: &CivilDayRange) -> bool {
        self.first <= other.last && other.first <= self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_two_day_request() {
        let days = calculate_leave_days(
            &at("2026-03-03T00:00:00+09:00"),
            &at("2026-03-04T00:00:00+09:00"),
        )
        .unwrap();
        assert_eq!(days, 2);
    }

    #[test]
    fn test_same_day_is_one_day() {
        let days = calculate_leave_days(
            &at("2026-03-03T09:00:00+09:00"),
            &at("2026-03-03T18:00:00+09:00"),
        )
        .unwrap();
        assert_eq!(days, 1);
    }

    #[test]
    fn test_days_follow_civil_calendar_not_input_offset() {
        // 2026-03-02T15:00Z is 2026-03-03T00:00 in UTC+9.
        let days = calculate_leave_days(
            &at("2026-03-02T15:00:00Z"),
            &at("2026-03-04T14:59:59Z"),
        )
        .unwrap();
        assert_eq!(days, 2);
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let err = calculate_leave_days(
            &at("2026-03-04T00:00:00+09:00"),
            &at("2026-03-03T00:00:00+09:00"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::validation("endDate must be same or after startDate")
        );
    }

    #[test]
    fn test_day_index_before_epoch_rounds_down() {
        assert_eq!(civil_day_index(&at("1969-12-31T14:59:59Z")), -1);
        assert_eq!(civil_day_index(&at("1969-12-31T15:00:00Z")), 0);
    }

    #[test]
    fn test_range_overlap() {
        let march_3_4 = CivilDayRange::from_instants(
            &at("2026-03-03T00:00:00+09:00"),
            &at("2026-03-04T00:00:00+09:00"),
        );
        let march_4_5 = CivilDayRange::from_instants(
            &at("2026-03-04T12:00:00+09:00"),
            &at("2026-03-05T00:00:00+09:00"),
        );
        let march_5 = CivilDayRange::from_instants(
            &at("2026-03-05T00:00:00+09:00"),
            &at("2026-03-05T00:00:00+09:00"),
        );
        assert!(march_3_4.overlaps(&march_4_5));
        assert!(march_4_5.overlaps(&march_3_4));
        assert!(!march_3_4.overlaps(&march_5));
    }
}
