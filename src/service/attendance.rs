//! Attendance record operations.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::access::{
    ListPermissions, OwnOrAny, Permission, TenantScope, require_any_permission,
    require_own_or_any, require_permission, resolve_list_filter,
};
use crate::calculation::PayableMinutes;
use crate::error::{EngineError, EngineResult};
use crate::models::{AttendanceRecord, AttendanceState, EventName};
use crate::store::{PeriodQuery, new_id};

use super::{Activity, ServiceContext, ensure_valid_period, validate_break_and_notes};

const ENTITY: &str = "AttendanceRecord";
const NOT_FOUND: &str = "attendance record not found";

/// Input for [`create_attendance_record`].
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAttendanceInput {
    /// The employee the record belongs to.
    pub employee_id: String,
    /// Check-in instant.
    pub check_in_at: DateTime<FixedOffset>,
    /// Check-out instant, if the shift has ended.
    #[serde(default)]
    pub check_out_at: Option<DateTime<FixedOffset>>,
    /// Unpaid break minutes, `0..=300`.
    #[serde(default)]
    pub break_minutes: i64,
    /// Whether the day is a holiday.
    #[serde(default)]
    pub is_holiday: bool,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Corrections for [`update_attendance_record`]. Absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateAttendanceInput {
    /// New check-in instant.
    pub check_in_at: Option<DateTime<FixedOffset>>,
    /// New check-out instant.
    pub check_out_at: Option<DateTime<FixedOffset>>,
    /// New break minutes.
    pub break_minutes: Option<i64>,
    /// New holiday flag.
    pub is_holiday: Option<bool>,
    /// New notes.
    pub notes: Option<String>,
}

/// Input for [`list_attendance_records`].
#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceListQuery {
    /// Period start.
    pub period_start: DateTime<FixedOffset>,
    /// Period end, after the start.
    pub period_end: DateTime<FixedOffset>,
    /// Restrict to one employee. Required for managers.
    #[serde(default)]
    pub employee_id: Option<String>,
    /// Restrict to one state.
    #[serde(default)]
    pub state: Option<AttendanceState>,
}

/// Classified minutes of one employee's approved records over a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceAggregate {
    /// The employee.
    pub employee_id: String,
    /// Approved, closed records counted.
    pub record_count: usize,
    /// Sum of the records' minute buckets.
    pub totals: PayableMinutes,
}

fn validate_record(record: &AttendanceRecord) -> EngineResult<()> {
    if let Some(check_out_at) = record.check_out_at {
        if check_out_at <= record.check_in_at {
            return Err(EngineError::validation("checkOutAt must be after checkInAt"));
        }
    }
    validate_break_and_notes(record.break_minutes, record.notes.as_deref())
}

fn write_guard(employee_id: &str) -> OwnOrAny<'_> {
    OwnOrAny {
        own: Permission::AttendanceRecordWriteOwn,
        any: Permission::AttendanceRecordWriteAny,
        employee_id,
    }
}

async fn require_pending(
    ctx: &ServiceContext,
    scope: &TenantScope,
    record_id: &str,
    message: &str,
) -> EngineResult<AttendanceRecord> {
    let record = scope.visible(ctx.data.attendance.find(record_id).await?, NOT_FOUND)?;
    if record.state != AttendanceState::Pending {
        return Err(EngineError::conflict(message));
    }
    Ok(record)
}

/// Records a check-in (and optionally check-out) for an employee.
pub async fn create_attendance_record(
    ctx: &ServiceContext,
    input: CreateAttendanceInput,
) -> EngineResult<AttendanceRecord> {
    let (actor, scope) = ctx.authorize()?;
    require_any_permission(
        actor,
        &write_guard(&input.employee_id).tokens(),
        "insufficient permissions",
    )?;

    let now = Utc::now();
    let mut record = AttendanceRecord {
        id: new_id("AR"),
        employee_id: input.employee_id,
        organization_id: None,
        check_in_at: input.check_in_at,
        check_out_at: input.check_out_at,
        break_minutes: input.break_minutes,
        is_holiday: input.is_holiday,
        notes: input.notes,
        state: AttendanceState::Pending,
        approved_at: None,
        approved_by: None,
        created_at: now,
        updated_at: now,
    };
    validate_record(&record)?;

    let employee = ctx.require_employee(&scope, &record.employee_id).await?;
    require_own_or_any(actor, write_guard(&employee.id), "insufficient permissions")?;
    record.organization_id = employee.organization_id;

    let record = ctx.data.attendance.insert(record).await?;
    info!(record_id = %record.id, employee_id = %record.employee_id, actor_id = %actor.id, "attendance recorded");

    ctx.record(
        actor,
        Activity::new("attendance.recorded", ENTITY, &record.id)
            .event(EventName::AttendanceRecorded)
            .organization(record.organization_id.clone())
            .payload(json!({ "employeeId": record.employee_id })),
    )
    .await?;
    Ok(record)
}

/// Corrects a pending record.
pub async fn update_attendance_record(
    ctx: &ServiceContext,
    record_id: &str,
    input: UpdateAttendanceInput,
) -> EngineResult<AttendanceRecord> {
    let (actor, scope) = ctx.authorize()?;
    require_any_permission(
        actor,
        &[
            Permission::AttendanceRecordWriteOwn,
            Permission::AttendanceRecordWriteAny,
        ],
        "insufficient permissions",
    )?;

    let existing = scope.visible(ctx.data.attendance.find(record_id).await?, NOT_FOUND)?;
    require_own_or_any(actor, write_guard(&existing.employee_id), "insufficient permissions")?;
    if existing.state != AttendanceState::Pending {
        return Err(EngineError::conflict("only pending attendance can be edited"));
    }

    let payload = json!({
        "checkInAt": input.check_in_at,
        "checkOutAt": input.check_out_at,
        "breakMinutes": input.break_minutes,
        "isHoliday": input.is_holiday,
        "notes": input.notes,
    });

    let updated = AttendanceRecord {
        check_in_at: input.check_in_at.unwrap_or(existing.check_in_at),
        check_out_at: input.check_out_at.or(existing.check_out_at),
        break_minutes: input.break_minutes.unwrap_or(existing.break_minutes),
        is_holiday: input.is_holiday.unwrap_or(existing.is_holiday),
        notes: input.notes.or(existing.notes.clone()),
        updated_at: Utc::now(),
        ..existing
    };
    validate_record(&updated)?;

    let record = ctx.data.attendance.update_pending(updated).await?;
    info!(record_id = %record.id, actor_id = %actor.id, "attendance corrected");

    ctx.record(
        actor,
        Activity::new("attendance.corrected", ENTITY, &record.id)
            .event(EventName::AttendanceCorrected)
            .organization(record.organization_id.clone())
            .payload(payload),
    )
    .await?;
    Ok(record)
}

/// Approves a pending record so it counts towards payroll.
pub async fn approve_attendance_record(
    ctx: &ServiceContext,
    record_id: &str,
) -> EngineResult<AttendanceRecord> {
    let (actor, scope) = ctx.authorize()?;
    require_permission(
        actor,
        Permission::AttendanceRecordApprove,
        "approval requires admin or manager role",
    )?;

    let existing =
        require_pending(ctx, &scope, record_id, "only pending attendance can be approved").await?;
    let now = Utc::now();
    let approved = AttendanceRecord {
        state: AttendanceState::Approved,
        approved_at: Some(now),
        approved_by: Some(actor.id.clone()),
        updated_at: now,
        ..existing
    };

    let record = ctx.data.attendance.update_pending(approved).await?;
    info!(record_id = %record.id, actor_id = %actor.id, "attendance approved");

    ctx.record(
        actor,
        Activity::new("attendance.approved", ENTITY, &record.id)
            .event(EventName::AttendanceApproved)
            .organization(record.organization_id.clone())
            .payload(json!({
                "employeeId": record.employee_id,
                "approvedAt": record.approved_at,
            })),
    )
    .await?;
    Ok(record)
}

/// Rejects a pending record.
pub async fn reject_attendance_record(
    ctx: &ServiceContext,
    record_id: &str,
    reason: Option<String>,
) -> EngineResult<AttendanceRecord> {
    let (actor, scope) = ctx.authorize()?;
    require_permission(
        actor,
        Permission::AttendanceRecordReject,
        "rejection requires admin or manager role",
    )?;

    let existing =
        require_pending(ctx, &scope, record_id, "only pending attendance can be rejected").await?;
    let rejected = AttendanceRecord {
        state: AttendanceState::Rejected,
        approved_at: None,
        approved_by: None,
        updated_at: Utc::now(),
        ..existing
    };

    let record = ctx.data.attendance.update_pending(rejected).await?;
    info!(record_id = %record.id, actor_id = %actor.id, "attendance rejected");

    ctx.record(
        actor,
        Activity::new("attendance.rejected", ENTITY, &record.id)
            .event(EventName::AttendanceRejected)
            .organization(record.organization_id.clone())
            .payload(json!({ "employeeId": record.employee_id, "reason": reason })),
    )
    .await?;
    Ok(record)
}

/// Lists records whose check-in falls in the period.
///
/// Employees see only their own records, managers must name an employee,
/// and payroll operators and admins may list everyone in their tenant.
pub async fn list_attendance_records(
    ctx: &ServiceContext,
    query: AttendanceListQuery,
) -> EngineResult<Vec<AttendanceRecord>> {
    let (actor, scope) = ctx.authorize()?;
    ensure_valid_period(&query.period_start, &query.period_end)?;
    let employee_id = resolve_list_filter(
        actor,
        ListPermissions::ATTENDANCE_RECORDS,
        query.employee_id.as_deref(),
    )?;

    let period = PeriodQuery {
        organization_id: scope.organization_id().map(str::to_string),
        employee_id,
        period_start: query.period_start,
        period_end: query.period_end,
    };
    ctx.data.attendance.list(&period, query.state).await
}

/// Sums the classified minutes of approved, closed records per employee,
/// ordered by employee id.
pub async fn list_attendance_aggregates(
    ctx: &ServiceContext,
    query: AttendanceListQuery,
) -> EngineResult<Vec<AttendanceAggregate>> {
    let (actor, scope) = ctx.authorize()?;
    ensure_valid_period(&query.period_start, &query.period_end)?;
    let employee_id = resolve_list_filter(
        actor,
        ListPermissions::ATTENDANCE_AGGREGATES,
        query.employee_id.as_deref(),
    )?;

    let period = PeriodQuery {
        organization_id: scope.organization_id().map(str::to_string),
        employee_id,
        period_start: query.period_start,
        period_end: query.period_end,
    };
    let records = ctx
        .data
        .attendance
        .list(&period, Some(AttendanceState::Approved))
        .await?;

    let mut by_employee: BTreeMap<String, AttendanceAggregate> = BTreeMap::new();
    for record in &records {
        let Some(interval) = record.work_interval() else {
            continue;
        };
        let aggregate = by_employee
            .entry(record.employee_id.clone())
            .or_insert_with(|| AttendanceAggregate {
                employee_id: record.employee_id.clone(),
                record_count: 0,
                totals: PayableMinutes::default(),
            });
        aggregate.record_count += 1;
        aggregate.totals = aggregate.totals + interval.split();
    }
    Ok(by_employee.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(break_minutes: i64, check_out: Option<&str>) -> AttendanceRecord {
        let now = Utc::now();
        AttendanceRecord {
            id: "AR-1".to_string(),
            employee_id: "emp-001".to_string(),
            organization_id: None,
            check_in_at: DateTime::parse_from_rfc3339("2026-02-10T09:00:00+09:00").unwrap(),
            check_out_at: check_out.map(|s| DateTime::parse_from_rfc3339(s).unwrap()),
            break_minutes,
            is_holiday: false,
            notes: None,
            state: AttendanceState::Pending,
            approved_at: None,
            approved_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_break_minutes_bounds() {
        assert!(validate_record(&record(0, None)).is_ok());
        assert!(validate_record(&record(300, None)).is_ok());
        assert!(validate_record(&record(301, None)).is_err());
        assert!(validate_record(&record(-1, None)).is_err());
    }

    #[test]
    fn test_check_out_must_follow_check_in() {
        assert!(validate_record(&record(0, Some("2026-02-10T18:00:00+09:00"))).is_ok());
        assert_eq!(
            validate_record(&record(0, Some("2026-02-10T09:00:00+09:00"))).unwrap_err(),
            EngineError::validation("checkOutAt must be after checkInAt")
        );
    }
}
