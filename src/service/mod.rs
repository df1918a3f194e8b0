//! Service operations.
//!
//! Every operation follows the same sequence: resolve the tenant scope,
//! check the actor's permission, load entities through the scope (entities
//! of another tenant are reported as missing), run the calculators, persist,
//! then append the audit entry and publish the domain event. Both the audit
//! append and the publish are awaited before the operation returns.

mod attendance;
mod leave;
mod payroll;
mod people;
mod scheduling;

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;

use crate::access::{TenantScope, require_actor};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{Actor, AuditEntry, DomainEvent, Employee, EventName};
use crate::store::DataAccess;

pub use attendance::{
    AttendanceAggregate, AttendanceListQuery, CreateAttendanceInput, UpdateAttendanceInput,
    approve_attendance_record, create_attendance_record, list_attendance_aggregates,
    list_attendance_records, reject_attendance_record, update_attendance_record,
};
pub use leave::{
    CreateLeaveInput, LeaveListQuery, SettleAccrualInput, UpdateLeaveInput, approve_leave_request,
    cancel_leave_request, create_leave_request, list_leave_decisions, list_leave_requests,
    read_leave_balance, reject_leave_request, settle_leave_accrual, update_leave_request,
};
pub use payroll::{
    PayrollPreview, PayrollPreviewInput, UpsertDeductionProfileInput, confirm_payroll_run,
    list_payroll_runs, preview_payroll, preview_payroll_with_deductions, read_deduction_profile,
    upsert_deduction_profile,
};
pub use people::{
    CreateEmployeeInput, UpdateEmployeeInput, create_employee, create_organization, get_employee,
    get_organization, list_employees, list_organizations, update_employee,
};
pub use scheduling::{CreateScheduleInput, ScheduleListQuery, create_work_schedule, list_work_schedules};

const MAX_BREAK_MINUTES: i64 = 300;
const MAX_NOTES_CHARS: usize = 1000;

/// Everything an operation runs with: the acting principal, the ports and
/// the configuration. Built per request.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    /// The authenticated principal, if any.
    pub actor: Option<Actor>,
    /// Repository ports, audit sink and event publisher.
    pub data: DataAccess,
    /// Engine configuration.
    pub config: EngineConfig,
}

impl ServiceContext {
    /// Creates a context without an actor.
    pub fn new(data: DataAccess, config: EngineConfig) -> Self {
        Self {
            actor: None,
            data,
            config,
        }
    }

    /// Returns a copy of the context acting as `actor`.
    pub fn as_actor(&self, actor: Actor) -> Self {
        Self {
            actor: Some(actor),
            ..self.clone()
        }
    }

    /// Resolves the tenant scope, then requires an actor.
    pub(crate) fn authorize(&self) -> EngineResult<(&Actor, TenantScope)> {
        let scope = TenantScope::resolve(self.actor.as_ref(), self.config.features.tenancy)?;
        let actor = require_actor(self.actor.as_ref())?;
        Ok((actor, scope))
    }

    /// Loads an employee through the tenant scope.
    pub(crate) async fn require_employee(
        &self,
        scope: &TenantScope,
        employee_id: &str,
    ) -> EngineResult<Employee> {
        let employee = self.data.employees.find(employee_id).await?;
        scope.visible(employee, "employee not found")
    }

    /// Appends the audit entry and, when the activity names one, publishes
    /// the matching domain event with the same payload.
    pub(crate) async fn record(&self, actor: &Actor, activity: Activity) -> EngineResult<()> {
        let now = Utc::now();
        self.data
            .audit
            .append(AuditEntry {
                action: activity.action.to_string(),
                entity_type: activity.entity_type.to_string(),
                entity_id: activity.entity_id.clone(),
                organization_id: activity.organization_id.clone(),
                actor_role: actor.role,
                actor_id: actor.id.clone(),
                payload: activity.payload.clone(),
                recorded_at: now,
            })
            .await?;

        if let Some(name) = activity.event {
            self.data
                .events
                .publish(DomainEvent {
                    name,
                    occurred_at: now,
                    entity_type: activity.entity_type.to_string(),
                    entity_id: activity.entity_id,
                    actor_role: Some(actor.role),
                    actor_id: Some(actor.id.clone()),
                    payload: activity.payload,
                })
                .await?;
        }
        Ok(())
    }
}

/// One audited activity and its optional domain event.
#[derive(Debug, Clone)]
pub(crate) struct Activity {
    pub action: &'static str,
    pub event: Option<EventName>,
    pub entity_type: &'static str,
    pub entity_id: Option<String>,
    pub organization_id: Option<String>,
    pub payload: Option<Value>,
}

impl Activity {
    pub fn new(action: &'static str, entity_type: &'static str, entity_id: impl Into<String>) -> Self {
        Self {
            action,
            event: None,
            entity_type,
            entity_id: Some(entity_id.into()),
            organization_id: None,
            payload: None,
        }
    }

    /// An activity not tied to one persisted entity, e.g. a failed preview.
    pub fn untargeted(action: &'static str, entity_type: &'static str) -> Self {
        Self {
            entity_id: None,
            ..Self::new(action, entity_type, String::new())
        }
    }

    pub fn event(mut self, name: EventName) -> Self {
        self.event = Some(name);
        self
    }

    pub fn organization(mut self, organization_id: Option<String>) -> Self {
        self.organization_id = organization_id;
        self
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Rejects empty or reversed periods.
pub(crate) fn ensure_valid_period(
    period_start: &DateTime<FixedOffset>,
    period_end: &DateTime<FixedOffset>,
) -> EngineResult<()> {
    if period_end <= period_start {
        return Err(EngineError::validation("periodEnd must be after periodStart"));
    }
    Ok(())
}

/// Shared bounds of recorded and planned intervals.
pub(crate) fn validate_break_and_notes(break_minutes: i64, notes: Option<&str>) -> EngineResult<()> {
    if !(0..=MAX_BREAK_MINUTES).contains(&break_minutes) {
        return Err(EngineError::validation(
            "breakMinutes must be between 0 and 300",
        ));
    }
    if notes.is_some_and(|n| n.chars().count() > MAX_NOTES_CHARS) {
        return Err(EngineError::validation("notes must be at most 1000 characters"));
    }
    Ok(())
}
