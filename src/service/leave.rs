//! Leave request and leave balance operations.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::access::{
    ListPermissions, OwnOrAny, Permission, TenantScope, require_any_permission,
    require_own_or_any, require_permission, resolve_list_filter,
};
use crate::calculation::{AccrualSettlement, CivilDayRange, calculate_leave_days};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Actor, EventName, LeaveBalance, LeaveDecision, LeaveDecisionAction, LeaveRequest, LeaveState,
    LeaveType,
};
use crate::store::{PeriodQuery, new_id};

use super::{Activity, ServiceContext, ensure_valid_period};

const REQUEST_ENTITY: &str = "LeaveRequest";
const BALANCE_ENTITY: &str = "LeaveBalanceProjection";
const NOT_FOUND: &str = "leave request not found";

/// Input for [`create_leave_request`].
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLeaveInput {
    /// The employee taking leave.
    pub employee_id: String,
    /// Kind of leave.
    #[serde(default)]
    pub leave_type: LeaveType,
    /// First day.
    pub start_date: DateTime<FixedOffset>,
    /// Last day, inclusive.
    pub end_date: DateTime<FixedOffset>,
    /// Reason given by the requester.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Changes for [`update_leave_request`]. Absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateLeaveInput {
    /// New kind of leave.
    pub leave_type: Option<LeaveType>,
    /// New first day.
    pub start_date: Option<DateTime<FixedOffset>>,
    /// New last day.
    pub end_date: Option<DateTime<FixedOffset>>,
    /// New reason.
    pub reason: Option<String>,
}

/// Input for [`list_leave_requests`].
#[derive(Debug, Clone, Deserialize)]
pub struct LeaveListQuery {
    /// Period start.
    pub period_start: DateTime<FixedOffset>,
    /// Period end, after the start.
    pub period_end: DateTime<FixedOffset>,
    /// Restrict to one employee. Required for managers.
    #[serde(default)]
    pub employee_id: Option<String>,
    /// Restrict to one state.
    #[serde(default)]
    pub state: Option<LeaveState>,
}

/// Input for [`settle_leave_accrual`].
#[derive(Debug, Clone, Deserialize)]
pub struct SettleAccrualInput {
    /// The employee whose ledger is settled.
    pub employee_id: String,
    /// Year being settled.
    pub year: i32,
    /// Overrides the configured annual grant.
    #[serde(default)]
    pub annual_grant_days: Option<i64>,
    /// Overrides the configured carry-over cap.
    #[serde(default)]
    pub carry_over_cap_days: Option<i64>,
}

fn write_guard(employee_id: &str) -> OwnOrAny<'_> {
    OwnOrAny {
        own: Permission::LeaveRequestWriteOwn,
        any: Permission::LeaveRequestWriteAny,
        employee_id,
    }
}

fn require_write_access(actor: &Actor) -> EngineResult<()> {
    require_any_permission(
        actor,
        &[
            Permission::LeaveRequestWriteOwn,
            Permission::LeaveRequestWriteAny,
        ],
        "insufficient permissions",
    )
}

async fn ensure_no_overlap(
    ctx: &ServiceContext,
    employee_id: &str,
    start_date: &DateTime<FixedOffset>,
    end_date: &DateTime<FixedOffset>,
    exclude_id: Option<&str>,
) -> EngineResult<()> {
    let days = CivilDayRange::from_instants(start_date, end_date);
    let overlapping = ctx
        .data
        .leave
        .find_overlapping_active(employee_id, days, exclude_id)
        .await?;
    if let Some(existing) = overlapping.first() {
        warn!(
            employee_id,
            existing_request_id = %existing.id,
            "overlapping leave request"
        );
        return Err(EngineError::conflict("overlapping leave request exists"));
    }
    Ok(())
}

async fn find_visible(
    ctx: &ServiceContext,
    scope: &TenantScope,
    request_id: &str,
) -> EngineResult<LeaveRequest> {
    scope.visible(ctx.data.leave.find(request_id).await?, NOT_FOUND)
}

fn ensure_pending(request: &LeaveRequest) -> EngineResult<()> {
    if request.state != LeaveState::Pending {
        return Err(EngineError::conflict(
            "only pending leave request can be changed",
        ));
    }
    Ok(())
}

/// The decided form of a pending request and its decision log entry.
fn decide(
    actor: &Actor,
    request: LeaveRequest,
    action: LeaveDecisionAction,
    reason: Option<String>,
) -> (LeaveRequest, LeaveDecision) {
    let now = Utc::now();
    let decision = LeaveDecision {
        request_id: request.id.clone(),
        action,
        actor_id: actor.id.clone(),
        actor_role: actor.role,
        reason: reason.clone(),
        recorded_at: now,
    };
    let decided = LeaveRequest {
        state: action.resulting_state(),
        decision_reason: reason,
        decided_by: Some(actor.id.clone()),
        decided_at: Some(now),
        updated_at: now,
        ..request
    };
    (decided, decision)
}

/// Files a pending leave request.
///
/// The span is counted in civil days (UTC+9) and must not overlap another
/// pending or approved request of the same employee.
pub async fn create_leave_request(
    ctx: &ServiceContext,
    input: CreateLeaveInput,
) -> EngineResult<LeaveRequest> {
    let (actor, scope) = ctx.authorize()?;
    require_write_access(actor)?;

    let days = calculate_leave_days(&input.start_date, &input.end_date)?;
    let employee = ctx.require_employee(&scope, &input.employee_id).await?;
    require_own_or_any(actor, write_guard(&employee.id), "insufficient permissions")?;
    ensure_no_overlap(ctx, &employee.id, &input.start_date, &input.end_date, None).await?;

    let now = Utc::now();
    let request = ctx
        .data
        .leave
        .insert(LeaveRequest {
            id: new_id("LR"),
            employee_id: employee.id,
            organization_id: employee.organization_id,
            leave_type: input.leave_type,
            start_date: input.start_date,
            end_date: input.end_date,
            days,
            reason: input.reason,
            state: LeaveState::Pending,
            decision_reason: None,
            decided_by: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        })
        .await?;
    info!(request_id = %request.id, employee_id = %request.employee_id, days, "leave requested");

    let payload = json!({
        "employeeId": request.employee_id,
        "leaveType": request.leave_type,
        "startDate": request.start_date,
        "endDate": request.end_date,
        "days": days,
    });
    ctx.record(
        actor,
        Activity::new("leave.requested", REQUEST_ENTITY, &request.id)
            .event(EventName::LeaveRequested)
            .organization(request.organization_id.clone())
            .payload(payload),
    )
    .await?;
    Ok(request)
}

/// Edits a pending request, recounting its days and re-checking overlap
/// against every other active request.
pub async fn update_leave_request(
    ctx: &ServiceContext,
    request_id: &str,
    input: UpdateLeaveInput,
) -> EngineResult<LeaveRequest> {
    let (actor, scope) = ctx.authorize()?;
    require_write_access(actor)?;

    let existing = find_visible(ctx, &scope, request_id).await?;
    ensure_pending(&existing)?;
    require_own_or_any(actor, write_guard(&existing.employee_id), "insufficient permissions")?;

    let start_date = input.start_date.unwrap_or(existing.start_date);
    let end_date = input.end_date.unwrap_or(existing.end_date);
    let days = calculate_leave_days(&start_date, &end_date)?;
    ensure_no_overlap(
        ctx,
        &existing.employee_id,
        &start_date,
        &end_date,
        Some(&existing.id),
    )
    .await?;

    let updated = LeaveRequest {
        leave_type: input.leave_type.unwrap_or(existing.leave_type),
        start_date,
        end_date,
        days,
        reason: input.reason.or(existing.reason.clone()),
        updated_at: Utc::now(),
        ..existing
    };
    let request = ctx.data.leave.update_pending(updated).await?;
    info!(request_id = %request.id, days, "leave request updated");

    ctx.record(
        actor,
        Activity::new("leave.updated", REQUEST_ENTITY, &request.id)
            .organization(request.organization_id.clone())
            .payload(json!({
                "leaveType": request.leave_type,
                "startDate": request.start_date,
                "endDate": request.end_date,
                "days": request.days,
            })),
    )
    .await?;
    Ok(request)
}

/// Approves a pending request and charges its days to the employee's
/// ledger, creating the ledger on first use.
///
/// Approvals are not checked against the remaining balance; the ledger may
/// go negative.
pub async fn approve_leave_request(
    ctx: &ServiceContext,
    request_id: &str,
) -> EngineResult<(LeaveRequest, LeaveBalance)> {
    let (actor, scope) = ctx.authorize()?;
    require_permission(
        actor,
        Permission::LeaveRequestApprove,
        "approval requires admin or manager role",
    )?;

    let existing = find_visible(ctx, &scope, request_id).await?;
    ensure_pending(&existing)?;

    let (decided, decision) = decide(actor, existing, LeaveDecisionAction::Approved, None);
    let (request, balance) = ctx
        .data
        .leave
        .approve_with_usage(decided, decision, ctx.config.leave.default_granted_days)
        .await?;
    info!(
        request_id = %request.id,
        employee_id = %request.employee_id,
        days = request.days,
        remaining_days = balance.remaining_days,
        "leave approved"
    );
    if balance.remaining_days < 0 {
        warn!(
            employee_id = %balance.employee_id,
            remaining_days = balance.remaining_days,
            "leave balance is negative after approval"
        );
    }

    ctx.record(
        actor,
        Activity::new("leave.approved", REQUEST_ENTITY, &request.id)
            .event(EventName::LeaveApproved)
            .organization(request.organization_id.clone())
            .payload(json!({
                "employeeId": request.employee_id,
                "leaveType": request.leave_type,
                "days": request.days,
                "remainingDays": balance.remaining_days,
            })),
    )
    .await?;
    Ok((request, balance))
}

/// Rejects a pending request. A non-blank reason is required.
pub async fn reject_leave_request(
    ctx: &ServiceContext,
    request_id: &str,
    reason: &str,
) -> EngineResult<LeaveRequest> {
    let (actor, scope) = ctx.authorize()?;
    require_permission(
        actor,
        Permission::LeaveRequestReject,
        "rejection requires admin or manager role",
    )?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(EngineError::validation("reason is required"));
    }

    let existing = find_visible(ctx, &scope, request_id).await?;
    ensure_pending(&existing)?;

    let (decided, decision) = decide(
        actor,
        existing,
        LeaveDecisionAction::Rejected,
        Some(reason.to_string()),
    );
    let request = ctx.data.leave.record_decision(decided, decision).await?;
    info!(request_id = %request.id, actor_id = %actor.id, "leave rejected");

    ctx.record(
        actor,
        Activity::new("leave.rejected", REQUEST_ENTITY, &request.id)
            .event(EventName::LeaveRejected)
            .organization(request.organization_id.clone())
            .payload(json!({ "employeeId": request.employee_id, "reason": reason })),
    )
    .await?;
    Ok(request)
}

/// Withdraws a pending request.
pub async fn cancel_leave_request(
    ctx: &ServiceContext,
    request_id: &str,
    reason: Option<String>,
) -> EngineResult<LeaveRequest> {
    let (actor, scope) = ctx.authorize()?;
    require_write_access(actor)?;

    let existing = find_visible(ctx, &scope, request_id).await?;
    ensure_pending(&existing)?;
    require_own_or_any(actor, write_guard(&existing.employee_id), "insufficient permissions")?;

    let (decided, decision) = decide(actor, existing, LeaveDecisionAction::Canceled, reason.clone());
    let request = ctx.data.leave.record_decision(decided, decision).await?;
    info!(request_id = %request.id, actor_id = %actor.id, "leave canceled");

    ctx.record(
        actor,
        Activity::new("leave.canceled", REQUEST_ENTITY, &request.id)
            .event(EventName::LeaveCanceled)
            .organization(request.organization_id.clone())
            .payload(json!({ "employeeId": request.employee_id, "reason": reason })),
    )
    .await?;
    Ok(request)
}

/// Lists requests intersecting the period.
pub async fn list_leave_requests(
    ctx: &ServiceContext,
    query: LeaveListQuery,
) -> EngineResult<Vec<LeaveRequest>> {
    let (actor, scope) = ctx.authorize()?;
    ensure_valid_period(&query.period_start, &query.period_end)?;
    let employee_id = resolve_list_filter(
        actor,
        ListPermissions::LEAVE_REQUESTS,
        query.employee_id.as_deref(),
    )?;

    let period = PeriodQuery {
        organization_id: scope.organization_id().map(str::to_string),
        employee_id,
        period_start: query.period_start,
        period_end: query.period_end,
    };
    ctx.data.leave.list(&period, query.state).await
}

/// Returns the decision log of one request.
///
/// Visible to anyone who may list the requester's leave.
pub async fn list_leave_decisions(
    ctx: &ServiceContext,
    request_id: &str,
) -> EngineResult<Vec<LeaveDecision>> {
    let (actor, scope) = ctx.authorize()?;
    let permissions = ListPermissions::LEAVE_REQUESTS;
    require_any_permission(actor, &permissions.tokens(), "insufficient permissions")?;

    let request = find_visible(ctx, &scope, request_id).await?;
    resolve_list_filter(actor, permissions, Some(request.employee_id.as_str()))?;
    ctx.data.leave.list_decisions(&request.id).await
}

/// Reads an employee's ledger, creating it on first use.
pub async fn read_leave_balance(
    ctx: &ServiceContext,
    employee_id: &str,
) -> EngineResult<LeaveBalance> {
    let (actor, scope) = ctx.authorize()?;
    let guard = OwnOrAny {
        own: Permission::LeaveBalanceReadOwn,
        any: Permission::LeaveBalanceReadAny,
        employee_id,
    };
    require_any_permission(actor, &guard.tokens(), "insufficient permissions")?;

    let employee = ctx.require_employee(&scope, employee_id).await?;
    require_own_or_any(actor, guard, "insufficient permissions")?;
    let balance = ctx
        .data
        .leave_balances
        .ensure(
            &employee.id,
            employee.organization_id.as_deref(),
            ctx.config.leave.default_granted_days,
        )
        .await?;

    ctx.record(
        actor,
        Activity::new("leave.balance_read", BALANCE_ENTITY, &employee.id)
            .organization(employee.organization_id.clone()),
    )
    .await?;
    Ok(balance)
}

/// Settles a year on an employee's ledger.
///
/// Each year can be settled once; settling the same or an earlier year
/// again is a conflict.
pub async fn settle_leave_accrual(
    ctx: &ServiceContext,
    input: SettleAccrualInput,
) -> EngineResult<LeaveBalance> {
    let (actor, scope) = ctx.authorize()?;
    require_permission(
        actor,
        Permission::LeaveAccrualSettle,
        "leave accrual settle requires admin or payroll_operator role",
    )?;

    let defaults = ctx.config.leave;
    let settlement = AccrualSettlement::new(
        input.year,
        input.annual_grant_days.unwrap_or(defaults.annual_grant_days),
        input
            .carry_over_cap_days
            .unwrap_or(defaults.carry_over_cap_days),
    )?;

    let employee = ctx.require_employee(&scope, &input.employee_id).await?;
    let balance = ctx
        .data
        .leave_balances
        .settle_accrual(
            &employee.id,
            employee.organization_id.as_deref(),
            &settlement,
            defaults.default_granted_days,
        )
        .await?;
    info!(
        employee_id = %employee.id,
        year = settlement.year,
        carry_over_days = balance.carry_over_days,
        granted_days = balance.granted_days,
        "leave accrual settled"
    );

    ctx.record(
        actor,
        Activity::new("leave.accrual_settled", BALANCE_ENTITY, &employee.id)
            .event(EventName::LeaveAccrualSettled)
            .organization(employee.organization_id.clone())
            .payload(json!({
                "employeeId": employee.id,
                "year": settlement.year,
                "annualGrantDays": settlement.annual_grant_days,
                "carryOverCapDays": settlement.carry_over_cap_days,
                "carryOverAppliedDays": balance.carry_over_days,
                "grantedDays": balance.granted_days,
                "remainingDays": balance.remaining_days,
            })),
    )
    .await?;
    Ok(balance)
}
