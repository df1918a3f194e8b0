//! Calculation logic for the time-accounting engine.
//!
//! This module contains the pure calculators the services compose:
//! classifying a worked interval into payable minute buckets, converting
//! buckets into gross pay, resolving deductions from manual amounts or a
//! versioned profile, counting leave days on the UTC+9 civil calendar, and
//! the leave balance ledger transitions (usage and annual settlement).
//!
//! None of these functions hold state or perform I/O.

mod accrual;
mod compensation;
mod deductions;
mod leave_days;
mod time_split;

pub use accrual::{
    AccrualSettlement, DEFAULT_ANNUAL_GRANT_DAYS, DEFAULT_CARRY_OVER_CAP_DAYS,
    DEFAULT_GRANTED_DAYS, apply_usage, settle_accrual,
};
pub use compensation::{
    GrossPayBreakdown, Multipliers, NIGHT_BASE_LIMIT_MINUTES, calculate_gross_pay,
    calculate_gross_pay_breakdown, round_krw,
};
pub use deductions::{DeductionRequest, DeductionSummary, ManualDeductions, resolve_deductions};
pub use leave_days::{CIVIL_OFFSET_SECONDS, CivilDayRange, calculate_leave_days, civil_day_index};
pub use time_split::{
    DAILY_REGULAR_LIMIT_MINUTES, MAX_NIGHT_SCAN_MINUTES, NIGHT_WINDOW_END_HOUR,
    NIGHT_WINDOW_START_HOUR, PayableMinutes, WorkInterval, count_night_minutes,
    split_payable_minutes, worked_minutes,
};
