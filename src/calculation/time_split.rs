//! Worked-time classification.
//!
//! This module splits a worked interval into regular, overtime, night and
//! holiday minute buckets. Minutes are whole minutes throughout: the total is
//! floor-divided from the elapsed milliseconds, and the night window is
//! counted by scanning the interval minute by minute.

use chrono::{DateTime, Duration, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minutes of work per day paid at the regular (or holiday) base rate.
pub const DAILY_REGULAR_LIMIT_MINUTES: i64 = 480;

/// First wall-clock hour of the night window (inclusive).
pub const NIGHT_WINDOW_START_HOUR: u32 = 0;

/// Last wall-clock hour of the night window (exclusive).
pub const NIGHT_WINDOW_END_HOUR: u32 = 4;

/// Upper bound on the number of minutes inspected by the night-window scan.
pub const MAX_NIGHT_SCAN_MINUTES: i64 = 1_440;

/// Classified worked minutes.
///
/// Produced fresh per calculation. `regular + overtime + night + holiday`
/// always equals the worked minutes of the interval: night minutes are carved
/// out of the regular budget rather than added on top of it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayableMinutes {
    /// Minutes paid at the regular multiplier.
    pub regular: i64,
    /// Minutes beyond the daily limit.
    pub overtime: i64,
    /// Minutes inside the night window, within the daily limit.
    pub night: i64,
    /// Minutes worked on a holiday, within the daily limit.
    pub holiday: i64,
}

impl PayableMinutes {
    /// Returns the sum of all buckets.
    pub fn total(&self) -> i64 {
        self.regular + self.overtime + self.night + self.holiday
    }
}

impl std::ops::Add for PayableMinutes {
    type Output = PayableMinutes;

    fn add(self, other: PayableMinutes) -> PayableMinutes {
        PayableMinutes {
            regular: self.regular + other.regular,
            overtime: self.overtime + other.overtime,
            night: self.night + other.night,
            holiday: self.holiday + other.holiday,
        }
    }
}

/// A worked interval as recorded on an attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkInterval {
    /// Check-in instant. Its offset defines the wall clock used for the night window.
    pub check_in_at: DateTime<FixedOffset>,
    /// Check-out instant.
    pub check_out_at: DateTime<FixedOffset>,
    /// Unpaid break minutes. Negative values count as zero.
    pub break_minutes: i64,
    /// Whether the interval falls on a holiday.
    pub is_holiday: bool,
}

impl WorkInterval {
    /// Classifies this interval. See [`split_payable_minutes`].
    pub fn split(&self) -> PayableMinutes {
        split_payable_minutes(
            self.check_in_at,
            self.check_out_at,
            self.break_minutes,
            self.is_holiday,
        )
    }
}

/// Returns the worked minutes of an interval.
///
/// `max(0, floor(elapsed / 1 min) - max(0, break_minutes))`. A zero or
/// negative duration yields zero.
///
/// # Examples
///
/// ```
/// use timepay_engine::calculation::worked_minutes;
/// use chrono::DateTime;
///
/// let check_in = DateTime::parse_from_rfc3339("2026-02-10T09:00:00+09:00").unwrap();
/// let check_out = DateTime::parse_from_rfc3339("2026-02-10T19:30:00+09:00").unwrap();
/// assert_eq!(worked_minutes(check_in, check_out, 60), 570);
/// ```
pub fn worked_minutes(
    check_in_at: DateTime<FixedOffset>,
    check_out_at: DateTime<FixedOffset>,
    break_minutes: i64,
) -> i64 {
    let elapsed_ms = (check_out_at - check_in_at).num_milliseconds();
    if elapsed_ms <= 0 {
        return 0;
    }
    let total = elapsed_ms.div_euclid(60_000) - break_minutes.max(0);
    total.max(0)
}

/// Counts whole minutes of the interval whose wall-clock hour lies in the
/// night window `[00:00, 04:00)` of the check-in offset.
///
/// The scan starts at the check-in minute and stops before any minute that
/// would end after check-out, so a trailing partial minute is never counted.
/// At most [`MAX_NIGHT_SCAN_MINUTES`] minutes are inspected.
pub fn count_night_minutes(
    check_in_at: DateTime<FixedOffset>,
    check_out_at: DateTime<FixedOffset>,
) -> i64 {
    let step = Duration::minutes(1);
    let mut cursor = check_in_at;
    let mut night = 0;

    for _ in 0..MAX_NIGHT_SCAN_MINUTES {
        let next = cursor + step;
        if next > check_out_at {
            break;
        }
        if (NIGHT_WINDOW_START_HOUR..NIGHT_WINDOW_END_HOUR).contains(&cursor.hour()) {
            night += 1;
        }
        cursor = next;
    }

    night
}

/// Splits a worked interval into payable minute buckets.
///
/// - Holiday: the first 480 worked minutes are `holiday`, the rest `overtime`.
/// - Otherwise: the first 480 worked minutes form the regular budget. Night
///   minutes are taken out of that budget (never more than it holds) and the
///   remainder is `regular`. Minutes beyond 480 are `overtime`.
///
/// # Examples
///
/// ```
/// use timepay_engine::calculation::{split_payable_minutes, PayableMinutes};
/// use chrono::DateTime;
///
/// let check_in = DateTime::parse_from_rfc3339("2026-02-03T22:00:00+09:00").unwrap();
/// let check_out = DateTime::parse_from_rfc3339("2026-02-04T06:00:00+09:00").unwrap();
/// let minutes = split_payable_minutes(check_in, check_out, 60, false);
///
/// assert_eq!(
///     minutes,
///     PayableMinutes { regular: 180, overtime: 0, night: 240, holiday: 0 }
/// );
/// ```
pub fn split_payable_minutes(
    check_in_at: DateTime<FixedOffset>,
    check_out_at: DateTime<FixedOffset>,
    break_minutes: i64,
    is_holiday: bool,
) -> PayableMinutes {
    let worked = worked_minutes(check_in_at, check_out_at, break_minutes);
    if worked <= 0 {
        return PayableMinutes::default();
    }

    let overtime = (worked - DAILY_REGULAR_LIMIT_MINUTES).max(0);

    if is_holiday {
        return PayableMinutes {
            regular: 0,
            overtime,
            night: 0,
            holiday: worked.min(DAILY_REGULAR_LIMIT_MINUTES),
        };
    }

    let raw_night = count_night_minutes(check_in_at, check_out_at);
    let base_regular = worked.min(DAILY_REGULAR_LIMIT_MINUTES);
    let night = raw_night.min(base_regular);

    debug!(
        worked,
        raw_night, night, overtime, "classified worked interval"
    );

    PayableMinutes {
        regular: base_regular - night,
        overtime,
        night,
        holiday: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(value: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(value).unwrap()
    }

    // ==========================================================================
    // TS-001: day shift with 90 minutes of overtime
    // ==========================================================================
    #[test]
    fn test_ts_001_day_shift_with_overtime() {
        let minutes = split_payable_minutes(
            at("2026-02-10T09:00:00+09:00"),
            at("2026-02-10T19:30:00+09:00"),
            60,
            false,
        );

        assert_eq!(
            minutes,
            PayableMinutes {
                regular: 480,
                overtime: 90,
                night: 0,
                holiday: 0
            }
        );
    }

    // ==========================================================================
    // TS-002: overnight shift, 22:00-06:00 with the full night window inside
    // ==========================================================================
    #[test]
    fn test_ts_002_overnight_shift_carves_night_from_regular() {
        let minutes = split_payable_minutes(
            at("2026-02-03T22:00:00+09:00"),
            at("2026-02-04T06:00:00+09:00"),
            60,
            false,
        );

        assert_eq!(
            minutes,
            PayableMinutes {
                regular: 180,
                overtime: 0,
                night: 240,
                holiday: 0
            }
        );
    }

    // ==========================================================================
    // TS-003: holiday shift, 09:00-20:00
    // ==========================================================================
    #[test]
    fn test_ts_003_holiday_shift() {
        let minutes = split_payable_minutes(
            at("2026-02-09T09:00:00+09:00"),
            at("2026-02-09T20:00:00+09:00"),
            60,
            true,
        );

        assert_eq!(
            minutes,
            PayableMinutes {
                regular: 0,
                overtime: 120,
                night: 0,
                holiday: 480
            }
        );
    }

    #[test]
    fn test_zero_and_negative_durations_yield_nothing() {
        let same = at("2026-02-10T09:00:00+09:00");
        assert_eq!(
            split_payable_minutes(same, same, 0, false),
            PayableMinutes::default()
        );
        assert_eq!(
            split_payable_minutes(at("2026-02-10T10:00:00+09:00"), same, 0, true),
            PayableMinutes::default()
        );
    }

    #[test]
    fn test_break_longer_than_shift_yields_nothing() {
        let minutes = split_payable_minutes(
            at("2026-02-10T01:00:00+09:00"),
            at("2026-02-10T02:00:00+09:00"),
            90,
            false,
        );
        assert_eq!(minutes, PayableMinutes::default());
    }

    #[test]
    fn test_negative_break_counts_as_zero() {
        assert_eq!(
            worked_minutes(
                at("2026-02-10T09:00:00+09:00"),
                at("2026-02-10T10:00:00+09:00"),
                -30
            ),
            60
        );
    }

    #[test]
    fn test_partial_final_minute_counts_for_worked_but_not_night() {
        // 90 seconds: one whole minute worked, one scan minute completes.
        let check_in = at("2026-02-10T00:00:30+09:00");
        let check_out = at("2026-02-10T00:02:00+09:00");
        assert_eq!(worked_minutes(check_in, check_out, 0), 1);
        assert_eq!(count_night_minutes(check_in, check_out), 1);

        // 59 seconds: nothing worked, no scan minute completes.
        let check_in = at("2026-02-10T03:59:30+09:00");
        let check_out = at("2026-02-10T04:00:29+09:00");
        assert_eq!(worked_minutes(check_in, check_out, 0), 0);
        assert_eq!(count_night_minutes(check_in, check_out), 0);
    }

    #[test]
    fn test_night_window_boundaries() {
        // 23:59 -> 00:01: only the 00:00 minute is inside the window.
        assert_eq!(
            count_night_minutes(
                at("2026-02-10T23:59:00+09:00"),
                at("2026-02-11T00:01:00+09:00")
            ),
            1
        );
        // 03:59 -> 04:01: only the 03:59 minute is inside the window.
        assert_eq!(
            count_night_minutes(
                at("2026-02-11T03:59:00+09:00"),
                at("2026-02-11T04:01:00+09:00")
            ),
            1
        );
    }

    #[test]
    fn test_night_window_uses_the_interval_offset() {
        // 15:00Z is 00:00 in +09:00 but 15:00 in +00:00.
        let seoul = count_night_minutes(
            at("2026-02-11T00:00:00+09:00"),
            at("2026-02-11T01:00:00+09:00"),
        );
        let utc = count_night_minutes(
            at("2026-02-10T15:00:00+00:00"),
            at("2026-02-10T16:00:00+00:00"),
        );
        assert_eq!(seoul, 60);
        assert_eq!(utc, 0);
    }

    #[test]
    fn test_night_capped_by_regular_budget() {
        // 00:00 -> 10:00 with no break: 600 worked, 240 raw night.
        let minutes = split_payable_minutes(
            at("2026-02-11T00:00:00+09:00"),
            at("2026-02-11T10:00:00+09:00"),
            0,
            false,
        );
        assert_eq!(minutes.night, 240);
        assert_eq!(minutes.regular, 240);
        assert_eq!(minutes.overtime, 120);

        // 00:00 -> 04:00 with a 200 minute break: 40 worked, 240 raw night.
        let minutes = split_payable_minutes(
            at("2026-02-11T00:00:00+09:00"),
            at("2026-02-11T04:00:00+09:00"),
            200,
            false,
        );
        assert_eq!(minutes.night, 40);
        assert_eq!(minutes.regular, 0);
    }

    #[test]
    fn test_night_scan_is_bounded() {
        // Three days long: the scan stops after one day's worth of minutes.
        let night = count_night_minutes(
            at("2026-02-11T00:00:00+09:00"),
            at("2026-02-14T00:00:00+09:00"),
        );
        assert_eq!(night, 240);
    }

    #[test]
    fn test_payable_minutes_add() {
        let a = PayableMinutes {
            regular: 1,
            overtime: 2,
            night: 3,
            holiday: 4,
        };
        assert_eq!((a + a).total(), 20);
    }

    fn interval_strategy() -> impl Strategy<Value = (i64, i64, i64, bool)> {
        (0i64..10_080, 1i64..1_200, 0i64..300, any::<bool>())
    }

    proptest! {
        #[test]
        fn prop_buckets_sum_to_worked_minutes((offset, duration, brk, holiday) in interval_strategy()) {
            let check_in = at("2026-02-01T00:00:00+09:00") + Duration::minutes(offset);
            let check_out = check_in + Duration::minutes(duration);
            let minutes = split_payable_minutes(check_in, check_out, brk, holiday);

            prop_assert_eq!(minutes.total(), worked_minutes(check_in, check_out, brk));
            prop_assert!(minutes.night <= count_night_minutes(check_in, check_out).min(DAILY_REGULAR_LIMIT_MINUTES));
            prop_assert!(minutes.regular >= 0 && minutes.overtime >= 0);
        }

        #[test]
        fn prop_split_is_idempotent((offset, duration, brk, holiday) in interval_strategy()) {
            let check_in = at("2026-02-01T00:00:00+09:00") + Duration::minutes(offset);
            let check_out = check_in + Duration::minutes(duration);

            prop_assert_eq!(
                split_payable_minutes(check_in, check_out, brk, holiday),
                split_payable_minutes(check_in, check_out, brk, holiday)
            );
        }
    }
}
