//! Audit entries and domain events emitted by service operations.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

/// A record appended to the audit sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Dotted action name, e.g. `leave.approved`.
    pub action: String,
    /// Entity type the action touched.
    pub entity_type: String,
    /// Entity identifier, when there is one.
    pub entity_id: Option<String>,
    /// Owning organization of the entity, when known.
    pub organization_id: Option<String>,
    /// Role of the acting principal.
    pub actor_role: Role,
    /// Identifier of the acting principal.
    pub actor_id: String,
    /// Action-specific details.
    pub payload: Option<serde_json::Value>,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Names of the domain events this engine publishes.
///
/// The wire names are part of the output contract for downstream consumers
/// and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    /// `attendance.recorded.v1`
    AttendanceRecorded,
    /// `attendance.corrected.v1`
    AttendanceCorrected,
    /// `attendance.approved.v1`
    AttendanceApproved,
    /// `attendance.rejected.v1`
    AttendanceRejected,
    /// `payroll.calculated.v1`
    PayrollCalculated,
    /// `payroll.deductions.calculated.v1`
    PayrollDeductionsCalculated,
    /// `payroll.confirmed.v1`
    PayrollConfirmed,
    /// `payroll.deduction_profile.updated.v1`
    DeductionProfileUpdated,
    /// `leave.requested.v1`
    LeaveRequested,
    /// `leave.approved.v1`
    LeaveApproved,
    /// `leave.rejected.v1`
    LeaveRejected,
    /// `leave.canceled.v1`
    LeaveCanceled,
    /// `leave.accrual.settled.v1`
    LeaveAccrualSettled,
    /// `organization.created.v1`
    OrganizationCreated,
    /// `employee.created.v1`
    EmployeeCreated,
    /// `employee.profile.updated.v1`
    EmployeeProfileUpdated,
    /// `scheduling.schedule.assigned.v1`
    ScheduleAssigned,
}

impl EventName {
    /// Returns the versioned wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::AttendanceRecorded => "attendance.recorded.v1",
            EventName::AttendanceCorrected => "attendance.corrected.v1",
            EventName::AttendanceApproved => "attendance.approved.v1",
            EventName::AttendanceRejected => "attendance.rejected.v1",
            EventName::PayrollCalculated => "payroll.calculated.v1",
            EventName::PayrollDeductionsCalculated => "payroll.deductions.calculated.v1",
            EventName::PayrollConfirmed => "payroll.confirmed.v1",
            EventName::DeductionProfileUpdated => "payroll.deduction_profile.updated.v1",
            EventName::LeaveRequested => "leave.requested.v1",
            EventName::LeaveApproved => "leave.approved.v1",
            EventName::LeaveRejected => "leave.rejected.v1",
            EventName::LeaveCanceled => "leave.canceled.v1",
            EventName::LeaveAccrualSettled => "leave.accrual.settled.v1",
            EventName::OrganizationCreated => "organization.created.v1",
            EventName::EmployeeCreated => "employee.created.v1",
            EventName::EmployeeProfileUpdated => "employee.profile.updated.v1",
            EventName::ScheduleAssigned => "scheduling.schedule.assigned.v1",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A domain event handed to the event publisher.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Versioned event name.
    pub name: EventName,
    /// When the underlying change happened.
    pub occurred_at: DateTime<Utc>,
    /// Entity type the event is about.
    pub entity_type: String,
    /// Entity identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Role of the acting principal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_role: Option<Role>,
    /// Identifier of the acting principal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    /// Event-specific details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_verbatim() {
        assert_eq!(EventName::LeaveApproved.as_str(), "leave.approved.v1");
        assert_eq!(
            EventName::PayrollDeductionsCalculated.as_str(),
            "payroll.deductions.calculated.v1"
        );
        assert_eq!(
            EventName::LeaveAccrualSettled.to_string(),
            "leave.accrual.settled.v1"
        );
    }

    #[test]
    fn test_domain_event_serializes_name_as_wire_string() {
        let event = DomainEvent {
            name: EventName::PayrollConfirmed,
            occurred_at: Utc::now(),
            entity_type: "PayrollRun".to_string(),
            entity_id: Some("PR-1".to_string()),
            actor_role: Some(Role::PayrollOperator),
            actor_id: Some("op-1".to_string()),
            payload: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["name"], "payroll.confirmed.v1");
        assert_eq!(json["entityType"], "PayrollRun");
        assert_eq!(json["actorRole"], "payroll_operator");
        assert!(json.get("payload").is_none());
    }
}
