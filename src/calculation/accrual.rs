//! Leave balance ledger transitions.
//!
//! Both transitions take the current ledger by reference and return the next
//! one. The store applies them under its write lock so the read and the write
//! are a single step.

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use crate::models::LeaveBalance;

/// Days granted to a ledger created before its first settlement.
pub const DEFAULT_GRANTED_DAYS: i64 = 15;

/// Days granted per settled year when the caller does not override it.
pub const DEFAULT_ANNUAL_GRANT_DAYS: i64 = 15;

/// Most days carried into a new year when the caller does not override it.
pub const DEFAULT_CARRY_OVER_CAP_DAYS: i64 = 5;

const MIN_ACCRUAL_YEAR: i32 = 2000;
const MAX_ACCRUAL_YEAR: i32 = 9999;

/// A validated annual settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualSettlement {
    /// Year being settled.
    pub year: i32,
    /// Days granted for the new year, before carry-over.
    pub annual_grant_days: i64,
    /// Most days carried over from the previous balance.
    pub carry_over_cap_days: i64,
}

impl AccrualSettlement {
    /// Validates the settlement parameters.
    ///
    /// `year` must be a four-digit year, the grant positive and the cap
    /// non-negative.
    pub fn new(year: i32, annual_grant_days: i64, carry_over_cap_days: i64) -> EngineResult<Self> {
        if !(MIN_ACCRUAL_YEAR..=MAX_ACCRUAL_YEAR).contains(&year) {
            return Err(EngineError::validation("year must be a valid 4-digit year"));
        }
        if annual_grant_days <= 0 {
            return Err(EngineError::validation(
                "annualGrantDays must be a positive integer",
            ));
        }
        if carry_over_cap_days < 0 {
            return Err(EngineError::validation(
                "carryOverCapDays must be a non-negative integer",
            ));
        }
        Ok(Self {
            year,
            annual_grant_days,
            carry_over_cap_days,
        })
    }
}

/// Records `days` of approved leave against the ledger.
///
/// The result may have negative `remaining_days`; approvals are never
/// clamped against the balance.
pub fn apply_usage(balance: &LeaveBalance, days: i64) -> LeaveBalance {
    let used_days = balance.used_days + days;
    debug!(
        employee_id = %balance.employee_id,
        days,
        used_days,
        "applied leave usage"
    );
    LeaveBalance {
        used_days,
        remaining_days: balance.granted_days - used_days,
        updated_at: Utc::now(),
        ..balance.clone()
    }
}

/// Settles a year on the ledger.
///
/// Carry-over is the previous remaining balance clamped to
/// `0..=carry_over_cap_days`. The new grant is the annual grant plus
/// carry-over, and usage resets. A ledger already settled for the same or a
/// later year is a conflict.
///
/// # Example
///
/// ```
/// use timepay_engine::calculation::{settle_accrual, AccrualSettlement};
/// use timepay_engine::models::LeaveBalance;
///
/// let mut balance = LeaveBalance::new("emp-001", None, 15);
/// balance.used_days = 7;
/// balance.remaining_days = 8;
///
/// let settlement = AccrualSettlement::new(2027, 15, 5).unwrap();
/// let settled = settle_accrual(&balance, &settlement).unwrap();
/// assert_eq!(settled.carry_over_days, 5);
/// assert_eq!(settled.granted_days, 20);
/// assert_eq!(settled.remaining_days, 20);
/// assert!(settle_accrual(&settled, &settlement).is_err());
/// ```
pub fn settle_accrual(
    balance: &LeaveBalance,
    settlement: &AccrualSettlement,
) -> EngineResult<LeaveBalance> {
    if let Some(last) = balance.last_accrual_year {
        if last >= settlement.year {
            warn!(
                employee_id = %balance.employee_id,
                year = settlement.year,
                last_accrual_year = last,
                "leave accrual already settled"
            );
            return Err(EngineError::conflict(
                "leave accrual already settled for the same or newer year",
            ));
        }
    }

    let carry_over_days = balance
        .remaining_days
        .max(0)
        .min(settlement.carry_over_cap_days);
    let granted_days = settlement.annual_grant_days + carry_over_days;

    Ok(LeaveBalance {
        granted_days,
        used_days: 0,
        remaining_days: granted_days,
        carry_over_days,
        last_accrual_year: Some(settlement.year),
        updated_at: Utc::now(),
        ..balance.clone()
    })
}
