//! Leave request and leave balance models.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

/// The kind of leave requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveType {
    /// Paid annual leave.
    #[default]
    Annual,
    /// Sick leave.
    Sick,
    /// Unpaid leave.
    Unpaid,
}

/// Lifecycle state of a leave request.
///
/// `Pending` is the only mutable state; the other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveState {
    /// Awaiting a decision.
    Pending,
    /// Approved. Its days were charged to the balance.
    Approved,
    /// Rejected by an approver.
    Rejected,
    /// Withdrawn before a decision.
    Canceled,
}

impl LeaveState {
    /// Returns true for states that block overlapping requests.
    pub fn is_active(&self) -> bool {
        matches!(self, LeaveState::Pending | LeaveState::Approved)
    }
}

/// A leave request for a contiguous span of civil days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    /// Unique identifier for the request.
    pub id: String,
    /// The employee taking leave.
    pub employee_id: String,
    /// Owning organization, copied from the employee at creation.
    pub organization_id: Option<String>,
    /// Kind of leave.
    pub leave_type: LeaveType,
    /// First day of leave.
    pub start_date: DateTime<FixedOffset>,
    /// Last day of leave (inclusive).
    pub end_date: DateTime<FixedOffset>,
    /// Number of civil days covered, always at least one.
    pub days: i64,
    /// Reason given by the requester.
    pub reason: Option<String>,
    /// Current state.
    pub state: LeaveState,
    /// Reason attached to the final decision.
    pub decision_reason: Option<String>,
    /// Who made the final decision.
    pub decided_by: Option<String>,
    /// When the final decision was made.
    pub decided_at: Option<DateTime<Utc>>,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// When the request was last updated.
    pub updated_at: DateTime<Utc>,
}

/// The transition recorded in the decision log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveDecisionAction {
    /// Request approved.
    Approved,
    /// Request rejected.
    Rejected,
    /// Request canceled.
    Canceled,
}

impl LeaveDecisionAction {
    /// The state a request ends up in after this decision.
    pub fn resulting_state(&self) -> LeaveState {
        match self {
            LeaveDecisionAction::Approved => LeaveState::Approved,
            LeaveDecisionAction::Rejected => LeaveState::Rejected,
            LeaveDecisionAction::Canceled => LeaveState::Canceled,
        }
    }
}

/// An immutable entry in a request's decision log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveDecision {
    /// The request the decision applies to.
    pub request_id: String,
    /// The transition taken.
    pub action: LeaveDecisionAction,
    /// Who took it.
    pub actor_id: String,
    /// With which role.
    pub actor_role: Role,
    /// Optional reason.
    pub reason: Option<String>,
    /// When it was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Per-employee leave ledger.
///
/// `remaining_days` is always `granted_days - used_days`. Approvals are not
/// clamped: an approval larger than the remaining balance drives
/// `remaining_days` negative and is reconciled at the next settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveBalance {
    /// The employee owning the ledger.
    pub employee_id: String,
    /// Owning organization.
    pub organization_id: Option<String>,
    /// Days granted for the current accrual year, including carry-over.
    pub granted_days: i64,
    /// Days consumed by approved requests.
    pub used_days: i64,
    /// `granted_days - used_days`.
    pub remaining_days: i64,
    /// Days carried over by the last settlement.
    pub carry_over_days: i64,
    /// Last year that was settled, if any.
    pub last_accrual_year: Option<i32>,
    /// When the ledger last changed.
    pub updated_at: DateTime<Utc>,
}

impl LeaveBalance {
    /// Creates a fresh ledger with `granted_days` and nothing used.
    pub fn new(
        employee_id: impl Into<String>,
        organization_id: Option<String>,
        granted_days: i64,
    ) -> Self {
        Self {
            employee_id: employee_id.into(),
            organization_id,
            granted_days,
            used_days: 0,
            remaining_days: granted_days,
            carry_over_days: 0,
            last_accrual_year: None,
            updated_at: Utc::now(),
        }
    }
}
