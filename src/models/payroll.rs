//! Payroll run and deduction profile models.

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculation::{DeductionSummary, PayableMinutes};

/// How a deduction profile is meant to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeductionMode {
    /// Amounts are supplied by the operator for each run.
    Manual,
    /// Amounts are derived from the profile's rates.
    Profile,
}

/// A named, versioned deduction configuration owned by a tenant.
///
/// `version` starts at 1 and increases by one on every upsert. Payroll
/// previews pin the version they expect so a profile edited in between is
/// never applied silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionProfile {
    /// Unique identifier, chosen by the caller.
    pub id: String,
    /// Owning organization.
    pub organization_id: Option<String>,
    /// Display name.
    pub name: String,
    /// Application mode.
    pub mode: DeductionMode,
    /// Withholding tax rate in `0..=1`.
    pub withholding_rate: Option<Decimal>,
    /// Social insurance rate in `0..=1`.
    pub social_insurance_rate: Option<Decimal>,
    /// Flat amount deducted per run.
    pub fixed_other_deduction_krw: i64,
    /// Whether the profile may be used.
    pub active: bool,
    /// Monotonic version.
    pub version: i64,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
    /// When the profile was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Payroll run lifecycle. `Previewed -> Confirmed` is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayrollState {
    /// Computed but not yet final.
    Previewed,
    /// Final.
    Confirmed,
}

/// A computed payroll run over a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollRun {
    /// Unique identifier for the run.
    pub id: String,
    /// Owning organization (the tenant scope the preview ran under).
    pub organization_id: Option<String>,
    /// The employee the run was restricted to, if any.
    pub employee_id: Option<String>,
    /// Period start.
    pub period_start: DateTime<FixedOffset>,
    /// Period end.
    pub period_end: DateTime<FixedOffset>,
    /// Current state.
    pub state: PayrollState,
    /// Minute buckets summed over the source records.
    pub totals: PayableMinutes,
    /// Gross pay in KRW.
    pub gross_pay_krw: i64,
    /// Deductions applied, for runs previewed with deductions.
    pub deductions: Option<DeductionSummary>,
    /// Gross minus deductions. May be negative.
    pub net_pay_krw: Option<i64>,
    /// Number of approved attendance records the run was computed from.
    pub source_record_count: usize,
    /// When the run was confirmed.
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Who confirmed the run.
    pub confirmed_by: Option<String>,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
    /// When the run was last updated.
    pub updated_at: DateTime<Utc>,
}
