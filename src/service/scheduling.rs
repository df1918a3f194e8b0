//! Work schedule assignment and listing.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::access::{ListPermissions, Permission, require_permission, resolve_list_filter};
use crate::error::{EngineError, EngineResult};
use crate::models::{EventName, WorkSchedule};
use crate::store::{PeriodQuery, new_id};

use super::{Activity, ServiceContext, ensure_valid_period, validate_break_and_notes};

const ENTITY: &str = "WorkSchedule";

/// Input for [`create_work_schedule`].
#[derive(Debug, Clone, Deserialize)]
pub struct CreateScheduleInput {
    /// The employee the shift is assigned to.
    pub employee_id: String,
    /// Planned start.
    pub start_at: DateTime<FixedOffset>,
    /// Planned end, after the start.
    pub end_at: DateTime<FixedOffset>,
    /// Planned unpaid break, 0 to 300 minutes.
    #[serde(default)]
    pub break_minutes: i64,
    /// Whether the shift falls on a holiday.
    #[serde(default)]
    pub is_holiday: bool,
    /// Free-form notes, at most 1000 characters.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Input for [`list_work_schedules`].
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleListQuery {
    /// Period start.
    pub period_start: DateTime<FixedOffset>,
    /// Period end, after the start.
    pub period_end: DateTime<FixedOffset>,
    /// Restrict to one employee. Required for managers.
    #[serde(default)]
    pub employee_id: Option<String>,
}

/// Assigns a planned shift to an employee.
///
/// Shifts of one employee may not overlap; back-to-back shifts are allowed.
pub async fn create_work_schedule(
    ctx: &ServiceContext,
    input: CreateScheduleInput,
) -> EngineResult<WorkSchedule> {
    let (actor, scope) = ctx.authorize()?;
    require_permission(
        actor,
        Permission::SchedulingScheduleWriteAny,
        "schedule assignment requires permission",
    )?;
    if input.end_at <= input.start_at {
        return Err(EngineError::validation("endAt must be after startAt"));
    }
    validate_break_and_notes(input.break_minutes, input.notes.as_deref())?;

    let employee = ctx.require_employee(&scope, &input.employee_id).await?;
    let overlapping = ctx
        .data
        .schedules
        .find_overlapping(&employee.id, input.start_at, input.end_at)
        .await?;
    if !overlapping.is_empty() {
        let ids: Vec<&str> = overlapping.iter().map(|s| s.id.as_str()).collect();
        warn!(
            employee_id = %employee.id,
            overlap_count = overlapping.len(),
            overlapping_schedule_ids = ?ids,
            "overlapping schedule"
        );
        return Err(EngineError::conflict("overlapping schedule exists"));
    }

    let schedule = ctx
        .data
        .schedules
        .insert(WorkSchedule {
            id: new_id("WS"),
            employee_id: employee.id,
            organization_id: employee.organization_id,
            start_at: input.start_at,
            end_at: input.end_at,
            break_minutes: input.break_minutes,
            is_holiday: input.is_holiday,
            notes: input.notes,
            created_at: Utc::now(),
        })
        .await?;
    let planned = schedule.work_interval().split();
    info!(
        schedule_id = %schedule.id,
        employee_id = %schedule.employee_id,
        actor_id = %actor.id,
        planned_minutes = planned.total(),
        "schedule assigned"
    );

    ctx.record(
        actor,
        Activity::new("scheduling.schedule.assigned", ENTITY, &schedule.id)
            .event(EventName::ScheduleAssigned)
            .organization(schedule.organization_id.clone())
            .payload(json!({
                "employeeId": schedule.employee_id,
                "startAt": schedule.start_at,
                "endAt": schedule.end_at,
                "breakMinutes": schedule.break_minutes,
                "isHoliday": schedule.is_holiday,
                "notes": schedule.notes,
                "plannedMinutes": planned,
            })),
    )
    .await?;
    Ok(schedule)
}

/// Lists schedules intersecting the period.
///
/// Employees see their own, managers must name an employee, payroll
/// operators and admins may list everyone. A named employee outside the
/// caller's tenant is not found.
pub async fn list_work_schedules(
    ctx: &ServiceContext,
    query: ScheduleListQuery,
) -> EngineResult<Vec<WorkSchedule>> {
    let (actor, scope) = ctx.authorize()?;
    ensure_valid_period(&query.period_start, &query.period_end)?;
    if let Some(employee_id) = query.employee_id.as_deref() {
        if !scope.is_unscoped() {
            ctx.require_employee(&scope, employee_id).await?;
        }
    }
    let employee_id = resolve_list_filter(
        actor,
        ListPermissions::WORK_SCHEDULES,
        query.employee_id.as_deref(),
    )?;

    let period = PeriodQuery {
        organization_id: scope.organization_id().map(str::to_string),
        employee_id,
        period_start: query.period_start,
        period_end: query.period_end,
    };
    ctx.data.schedules.list(&period).await
}
