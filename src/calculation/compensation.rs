//! Gross pay calculation.
//!
//! Converts classified minutes, an hourly rate and a set of multipliers into
//! gross pay. Bucket amounts are kept as unrounded [`Decimal`] values and the
//! total is rounded exactly once, at the end.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

use super::time_split::PayableMinutes;

/// Night minutes paid at the plain night multiplier before the combined
/// night + overtime premium applies.
pub const NIGHT_BASE_LIMIT_MINUTES: i64 = 180;

const MINUTES_PER_HOUR: Decimal = Decimal::from_parts(60, 0, 0, false, 0);

/// Per-bucket multipliers applied to the base hourly rate.
///
/// # Example
///
/// ```
/// use timepay_engine::calculation::Multipliers;
/// use rust_decimal::Decimal;
///
/// let defaults = Multipliers::default();
/// assert_eq!(defaults.regular, Decimal::ONE);
/// assert_eq!(defaults.overtime, Decimal::new(15, 1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multipliers {
    /// Regular-time multiplier.
    pub regular: Decimal,
    /// Overtime multiplier.
    pub overtime: Decimal,
    /// Night multiplier.
    pub night: Decimal,
    /// Holiday multiplier.
    pub holiday: Decimal,
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            regular: Decimal::ONE,
            overtime: Decimal::new(15, 1),
            night: Decimal::new(15, 1),
            holiday: Decimal::new(15, 1),
        }
    }
}

impl Multipliers {
    /// Checks that every multiplier is strictly positive.
    pub fn validate(&self) -> EngineResult<()> {
        let all_positive = [self.regular, self.overtime, self.night, self.holiday]
            .iter()
            .all(|m| *m > Decimal::ZERO);
        if all_positive {
            Ok(())
        } else {
            Err(EngineError::validation("multipliers must be positive"))
        }
    }
}

/// Unrounded per-bucket amounts and the rounded total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrossPayBreakdown {
    /// Pay for regular minutes.
    pub regular: Decimal,
    /// Pay for overtime minutes. Zero whenever holiday minutes are present.
    pub overtime: Decimal,
    /// Pay for night minutes, including the combined premium past the base limit.
    pub night: Decimal,
    /// Pay for holiday minutes, including holiday overtime.
    pub holiday: Decimal,
    /// The rounded total in KRW.
    pub gross_pay_krw: i64,
}

/// Rounds a KRW amount to a whole won, half away from zero.
///
/// Saturates at the `i64` range.
pub fn round_krw(amount: Decimal) -> i64 {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    rounded.to_i64().unwrap_or(if rounded.is_sign_negative() {
        i64::MIN
    } else {
        i64::MAX
    })
}

fn bucket_pay(minutes: i64, hourly_rate: Decimal, multiplier: Decimal) -> Decimal {
    Decimal::from(minutes) * hourly_rate * multiplier / MINUTES_PER_HOUR
}

/// Calculates gross pay with a per-bucket breakdown.
///
/// - Regular: `regular/60 × rate × m.regular`.
/// - Overtime: `overtime/60 × rate × m.overtime`, unless holiday minutes are
///   present; holiday supersedes and the two premiums never stack.
/// - Night: the first 180 minutes at `m.night`, the rest at
///   `m.night + m.overtime - 1` (additive premium).
/// - Holiday: holiday minutes at `m.holiday`, and when holiday minutes are
///   present the overtime minutes at `m.holiday × m.overtime`
///   (multiplicative premium).
///
/// # Examples
///
/// ```
/// use timepay_engine::calculation::{calculate_gross_pay_breakdown, Multipliers, PayableMinutes};
///
/// let minutes = PayableMinutes { regular: 180, overtime: 0, night: 240, holiday: 0 };
/// let breakdown = calculate_gross_pay_breakdown(&minutes, 13_000, &Multipliers::default());
/// assert_eq!(breakdown.gross_pay_krw, 123_500);
/// ```
pub fn calculate_gross_pay_breakdown(
    minutes: &PayableMinutes,
    hourly_rate_krw: i64,
    multipliers: &Multipliers,
) -> GrossPayBreakdown {
    let rate = Decimal::from(hourly_rate_krw);
    let is_holiday_case = minutes.holiday > 0;

    let regular = bucket_pay(minutes.regular, rate, multipliers.regular);

    let overtime = if is_holiday_case {
        Decimal::ZERO
    } else {
        bucket_pay(minutes.overtime, rate, multipliers.overtime)
    };

    let night_base = minutes.night.min(NIGHT_BASE_LIMIT_MINUTES);
    let night_overtime = (minutes.night - NIGHT_BASE_LIMIT_MINUTES).max(0);
    let night = bucket_pay(night_base, rate, multipliers.night)
        + bucket_pay(
            night_overtime,
            rate,
            multipliers.night + multipliers.overtime - Decimal::ONE,
        );

    let holiday_overtime = if is_holiday_case { minutes.overtime } else { 0 };
    let holiday = bucket_pay(minutes.holiday, rate, multipliers.holiday)
        + bucket_pay(
            holiday_overtime,
            rate,
            multipliers.holiday * multipliers.overtime,
        );

    let gross_pay_krw = round_krw(regular + overtime + night + holiday);

    debug!(
        regular = %regular,
        overtime = %overtime,
        night = %night,
        holiday = %holiday,
        gross_pay_krw,
        "calculated gross pay"
    );

    GrossPayBreakdown {
        regular,
        overtime,
        night,
        holiday,
        gross_pay_krw,
    }
}

/// Calculates gross pay in whole KRW. See [`calculate_gross_pay_breakdown`].
pub fn calculate_gross_pay(
    minutes: &PayableMinutes,
    hourly_rate_krw: i64,
    multipliers: &Multipliers,
) -> i64 {
    calculate_gross_pay_breakdown(minutes, hourly_rate_krw, multipliers).gross_pay_krw
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn minutes(regular: i64, overtime: i64, night: i64, holiday: i64) -> PayableMinutes {
        PayableMinutes {
            regular,
            overtime,
            night,
            holiday,
        }
    }

    // ==========================================================================
    // GP-001: 480 regular + 90 overtime at 12,500 KRW/h
    // Expected: 8h × 12,500 + 1.5h × 12,500 × 1.5 = 100,000 + 28,125
    // ==========================================================================
    #[test]
    fn test_gp_001_regular_with_overtime() {
        let gross = calculate_gross_pay(&minutes(480, 90, 0, 0), 12_500, &Multipliers::default());
        assert_eq!(gross, 128_125);
    }

    // ==========================================================================
    // GP-002: 180 regular + 240 night at 13,000 KRW/h
    // Expected: 3h × 13,000 + 3h × 13,000 × 1.5 + 1h × 13,000 × 2.0
    //         = 39,000 + 58,500 + 26,000
    // ==========================================================================
    #[test]
    fn test_gp_002_night_beyond_three_hours_gets_additive_premium() {
        let breakdown =
            calculate_gross_pay_breakdown(&minutes(180, 0, 240, 0), 13_000, &Multipliers::default());
        assert_eq!(breakdown.regular, dec("39000"));
        assert_eq!(breakdown.night, dec("84500"));
        assert_eq!(breakdown.gross_pay_krw, 123_500);
    }

    // ==========================================================================
    // GP-003: 480 holiday + 120 overtime at 14,000 KRW/h
    // Expected: 8h × 14,000 × 1.5 + 2h × 14,000 × 2.25 = 168,000 + 63,000
    // ==========================================================================
    #[test]
    fn test_gp_003_holiday_overtime_gets_multiplicative_premium() {
        let breakdown =
            calculate_gross_pay_breakdown(&minutes(0, 120, 0, 480), 14_000, &Multipliers::default());
        assert_eq!(breakdown.overtime, Decimal::ZERO);
        assert_eq!(breakdown.holiday, dec("231000"));
        assert_eq!(breakdown.gross_pay_krw, 231_000);
    }

    #[test]
    fn test_custom_multipliers_are_applied() {
        let multipliers = Multipliers {
            regular: dec("1.0"),
            overtime: dec("2.0"),
            night: dec("1.2"),
            holiday: dec("2.0"),
        };
        // 60 regular + 60 overtime at 10,000: 10,000 + 20,000
        assert_eq!(
            calculate_gross_pay(&minutes(60, 60, 0, 0), 10_000, &multipliers),
            30_000
        );
        // 240 night: 3h × 1.2 + 1h × (1.2 + 2.0 - 1) = 36,000 + 22,000
        assert_eq!(
            calculate_gross_pay(&minutes(0, 0, 240, 0), 10_000, &multipliers),
            58_000
        );
    }

    #[test]
    fn test_rounding_happens_once_at_the_end() {
        // 1 regular minute at 10,001 KRW/h = 166.683..., 1 overtime minute at
        // 1.5 = 250.025. Rounding each bucket first would give 167 + 250.
        let gross = calculate_gross_pay(&minutes(1, 1, 0, 0), 10_001, &Multipliers::default());
        assert_eq!(gross, 417);
    }

    #[test]
    fn test_round_krw_half_away_from_zero() {
        assert_eq!(round_krw(dec("0.5")), 1);
        assert_eq!(round_krw(dec("1.49")), 1);
        assert_eq!(round_krw(dec("-0.5")), -1);
    }

    #[test]
    fn test_empty_minutes_pay_nothing() {
        assert_eq!(
            calculate_gross_pay(&PayableMinutes::default(), 12_500, &Multipliers::default()),
            0
        );
    }

    #[test]
    fn test_calculation_is_idempotent() {
        let m = minutes(300, 45, 120, 0);
        let first = calculate_gross_pay_breakdown(&m, 11_111, &Multipliers::default());
        let second = calculate_gross_pay_breakdown(&m, 11_111, &Multipliers::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_multipliers_validation() {
        assert!(Multipliers::default().validate().is_ok());
        let invalid = Multipliers {
            night: Decimal::ZERO,
            ..Multipliers::default()
        };
        assert_eq!(
            invalid.validate(),
            Err(EngineError::validation("multipliers must be positive"))
        );
    }

    #[test]
    fn test_multipliers_deserialize_from_strings_and_numbers() {
        let json = r#"{"regular": "1.0", "overtime": 1.5, "night": "1.5", "holiday": "2"}"#;
        let multipliers: Multipliers = serde_json::from_str(json).unwrap();
        assert_eq!(multipliers.overtime, dec("1.5"));
        assert_eq!(multipliers.holiday, dec("2"));
    }
}
