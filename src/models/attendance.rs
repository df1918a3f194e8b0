//! Attendance record model.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::calculation::WorkInterval;

/// Lifecycle state of an attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceState {
    /// Awaiting a decision. The only editable state.
    Pending,
    /// Approved, counts towards payroll.
    Approved,
    /// Rejected, final.
    Rejected,
}

/// A single check-in/check-out record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Unique identifier for the record.
    pub id: String,
    /// The employee the record belongs to.
    pub employee_id: String,
    /// Owning organization, copied from the employee at creation.
    pub organization_id: Option<String>,
    /// Check-in instant, in the wall-clock offset it was recorded with.
    pub check_in_at: DateTime<FixedOffset>,
    /// Check-out instant. Open records are skipped by payroll.
    pub check_out_at: Option<DateTime<FixedOffset>>,
    /// Unpaid break minutes.
    pub break_minutes: i64,
    /// Whether the day is a holiday.
    pub is_holiday: bool,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Current state.
    pub state: AttendanceState,
    /// When the record was approved.
    pub approved_at: Option<DateTime<Utc>>,
    /// Who approved the record.
    pub approved_by: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Returns the worked interval, or `None` while the record is still open.
    pub fn work_interval(&self) -> Option<WorkInterval> {
        self.check_out_at.map(|check_out_at| WorkInterval {
            check_in_at: self.check_in_at,
            check_out_at,
            break_minutes: self.break_minutes,
            is_holiday: self.is_holiday,
        })
    }
}
