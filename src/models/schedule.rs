//! Work schedule model.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::calculation::WorkInterval;

/// A planned shift assigned to an employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSchedule {
    /// Unique identifier for the schedule.
    pub id: String,
    /// The employee the shift is assigned to.
    pub employee_id: String,
    /// Owning organization, copied from the employee at assignment.
    pub organization_id: Option<String>,
    /// Planned start.
    pub start_at: DateTime<FixedOffset>,
    /// Planned end, after the start.
    pub end_at: DateTime<FixedOffset>,
    /// Planned unpaid break minutes.
    pub break_minutes: i64,
    /// Whether the shift falls on a holiday.
    pub is_holiday: bool,
    /// Free-form notes.
    pub notes: Option<String>,
    /// When the schedule was assigned.
    pub created_at: DateTime<Utc>,
}

impl WorkSchedule {
    /// The planned shift as a work interval.
    pub fn work_interval(&self) -> WorkInterval {
        WorkInterval {
            check_in_at: self.start_at,
            check_out_at: self.end_at,
            break_minutes: self.break_minutes,
            is_holiday: self.is_holiday,
        }
    }

    /// Whether the two half-open spans `[start_at, end_at)` intersect.
    /// Back-to-back shifts do not overlap.
    pub fn overlaps(&self, start_at: &DateTime<FixedOffset>, end_at: &DateTime<FixedOffset>) -> bool {
        self.start_at < *end_at && self.end_at > *start_at
    }
}
