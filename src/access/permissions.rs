//! Role-based permission resolution.
//!
//! Each role maps to a fixed set of permission tokens. The table is static;
//! `admin` and `system` hold every token. List and write operations come in
//! "own", "by employee" and "any" flavours so a single check can express
//! "employees may only touch their own records".

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{EngineError, EngineResult};
use crate::models::{Actor, Role};

/// A capability token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Create and look up organizations.
    PeopleOrganizationsManage,
    /// Create, read and update employees.
    PeopleEmployeesManage,
    /// Record or correct attendance for any employee.
    AttendanceRecordWriteAny,
    /// Record or correct one's own attendance.
    AttendanceRecordWriteOwn,
    /// Approve attendance records.
    AttendanceRecordApprove,
    /// Reject attendance records.
    AttendanceRecordReject,
    /// List attendance for everyone.
    AttendanceRecordListAny,
    /// List attendance for one named employee.
    AttendanceRecordListByEmployee,
    /// List one's own attendance.
    AttendanceRecordListOwn,
    /// Aggregate attendance for everyone.
    AttendanceAggregateListAny,
    /// Aggregate attendance for one named employee.
    AttendanceAggregateListByEmployee,
    /// Aggregate one's own attendance.
    AttendanceAggregateListOwn,
    /// Create, edit or cancel leave for any employee.
    LeaveRequestWriteAny,
    /// Create, edit or cancel one's own leave.
    LeaveRequestWriteOwn,
    /// Approve leave requests.
    LeaveRequestApprove,
    /// Reject leave requests.
    LeaveRequestReject,
    /// List leave for everyone.
    LeaveRequestListAny,
    /// List leave for one named employee.
    LeaveRequestListByEmployee,
    /// List one's own leave.
    LeaveRequestListOwn,
    /// Read any leave balance.
    LeaveBalanceReadAny,
    /// Read one's own leave balance.
    LeaveBalanceReadOwn,
    /// Run the annual leave settlement.
    LeaveAccrualSettle,
    /// Preview payroll runs.
    PayrollRunPreview,
    /// Confirm payroll runs.
    PayrollRunConfirm,
    /// List payroll runs.
    PayrollRunList,
    /// Read deduction profiles.
    PayrollDeductionProfileRead,
    /// Create and update deduction profiles.
    PayrollDeductionProfileWrite,
    /// Assign work schedules to any employee.
    SchedulingScheduleWriteAny,
    /// List schedules for everyone.
    SchedulingScheduleListAny,
    /// List schedules for one named employee.
    SchedulingScheduleListByEmployee,
    /// List one's own schedules.
    SchedulingScheduleListOwn,
}

use Permission::*;

impl Permission {
    /// Every token, in declaration order.
    pub const ALL: &'static [Permission] = &[
        PeopleOrganizationsManage,
        PeopleEmployeesManage,
        AttendanceRecordWriteAny,
        AttendanceRecordWriteOwn,
        AttendanceRecordApprove,
        AttendanceRecordReject,
        AttendanceRecordListAny,
        AttendanceRecordListByEmployee,
        AttendanceRecordListOwn,
        AttendanceAggregateListAny,
        AttendanceAggregateListByEmployee,
        AttendanceAggregateListOwn,
        LeaveRequestWriteAny,
        LeaveRequestWriteOwn,
        LeaveRequestApprove,
        LeaveRequestReject,
        LeaveRequestListAny,
        LeaveRequestListByEmployee,
        LeaveRequestListOwn,
        LeaveBalanceReadAny,
        LeaveBalanceReadOwn,
        LeaveAccrualSettle,
        PayrollRunPreview,
        PayrollRunConfirm,
        PayrollRunList,
        PayrollDeductionProfileRead,
        PayrollDeductionProfileWrite,
        SchedulingScheduleWriteAny,
        SchedulingScheduleListAny,
        SchedulingScheduleListByEmployee,
        SchedulingScheduleListOwn,
    ];

    /// The dotted token name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PeopleOrganizationsManage => "people.organizations.manage",
            PeopleEmployeesManage => "people.employees.manage",
            AttendanceRecordWriteAny => "attendance.record.write.any",
            AttendanceRecordWriteOwn => "attendance.record.write.own",
            AttendanceRecordApprove => "attendance.record.approve",
            AttendanceRecordReject => "attendance.record.reject",
            AttendanceRecordListAny => "attendance.record.list.any",
            AttendanceRecordListByEmployee => "attendance.record.list.by_employee",
            AttendanceRecordListOwn => "attendance.record.list.own",
            AttendanceAggregateListAny => "attendance.aggregate.list.any",
            AttendanceAggregateListByEmployee => "attendance.aggregate.list.by_employee",
            AttendanceAggregateListOwn => "attendance.aggregate.list.own",
            LeaveRequestWriteAny => "leave.request.write.any",
            LeaveRequestWriteOwn => "leave.request.write.own",
            LeaveRequestApprove => "leave.request.approve",
            LeaveRequestReject => "leave.request.reject",
            LeaveRequestListAny => "leave.request.list.any",
            LeaveRequestListByEmployee => "leave.request.list.by_employee",
            LeaveRequestListOwn => "leave.request.list.own",
            LeaveBalanceReadAny => "leave.balance.read.any",
            LeaveBalanceReadOwn => "leave.balance.read.own",
            LeaveAccrualSettle => "leave.accrual.settle",
            PayrollRunPreview => "payroll.run.preview",
            PayrollRunConfirm => "payroll.run.confirm",
            PayrollRunList => "payroll.run.list",
            PayrollDeductionProfileRead => "payroll.deduction_profile.read",
            PayrollDeductionProfileWrite => "payroll.deduction_profile.write",
            SchedulingScheduleWriteAny => "scheduling.schedule.write.any",
            SchedulingScheduleListAny => "scheduling.schedule.list.any",
            SchedulingScheduleListByEmployee => "scheduling.schedule.list.by_employee",
            SchedulingScheduleListOwn => "scheduling.schedule.list.own",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

const MANAGER: &[Permission] = &[
    AttendanceRecordWriteAny,
    AttendanceRecordApprove,
    AttendanceRecordReject,
    AttendanceRecordListByEmployee,
    AttendanceAggregateListByEmployee,
    LeaveRequestWriteAny,
    LeaveRequestApprove,
    LeaveRequestReject,
    LeaveRequestListByEmployee,
    LeaveBalanceReadAny,
    SchedulingScheduleWriteAny,
    SchedulingScheduleListByEmployee,
];

const PAYROLL_OPERATOR: &[Permission] = &[
    AttendanceRecordListAny,
    AttendanceAggregateListAny,
    LeaveRequestListAny,
    LeaveBalanceReadAny,
    LeaveAccrualSettle,
    PayrollRunPreview,
    PayrollRunConfirm,
    PayrollRunList,
    PayrollDeductionProfileRead,
    PayrollDeductionProfileWrite,
    SchedulingScheduleListAny,
];

const EMPLOYEE: &[Permission] = &[
    AttendanceRecordWriteOwn,
    AttendanceRecordListOwn,
    AttendanceAggregateListOwn,
    LeaveRequestWriteOwn,
    LeaveRequestListOwn,
    LeaveBalanceReadOwn,
    SchedulingScheduleListOwn,
];

/// The tokens granted to `role`.
pub fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::Admin | Role::System => Permission::ALL,
        Role::Manager => MANAGER,
        Role::PayrollOperator => PAYROLL_OPERATOR,
        Role::Employee => EMPLOYEE,
    }
}

/// Whether the actor's role grants `permission`.
pub fn has_permission(actor: &Actor, permission: Permission) -> bool {
    permissions_for(actor.role).contains(&permission)
}

/// Returns the actor, or `Unauthenticated` when there is none.
pub fn require_actor(actor: Option<&Actor>) -> EngineResult<&Actor> {
    actor.ok_or_else(|| EngineError::unauthenticated("missing or invalid actor context"))
}

/// Requires at least one of `allowed`.
pub fn require_any_permission(
    actor: &Actor,
    allowed: &[Permission],
    message: &str,
) -> EngineResult<()> {
    if allowed.iter().any(|p| has_permission(actor, *p)) {
        Ok(())
    } else {
        Err(EngineError::forbidden(message))
    }
}

/// Requires `permission`.
pub fn require_permission(actor: &Actor, permission: Permission, message: &str) -> EngineResult<()> {
    require_any_permission(actor, &[permission], message)
}

/// An "own or any" pair of tokens guarding access to one employee's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnOrAny<'a> {
    /// Token that grants access to the actor's own data.
    pub own: Permission,
    /// Token that grants access to anyone's data.
    pub any: Permission,
    /// The employee whose data is addressed.
    pub employee_id: &'a str,
}

impl OwnOrAny<'_> {
    /// Both tokens, for checks made before the addressed employee is known
    /// to exist.
    pub fn tokens(&self) -> [Permission; 2] {
        [self.own, self.any]
    }
}

/// Grants if the actor holds the "any" token, or holds the "own" token and
/// is the addressed employee.
///
/// # Example
///
/// ```
/// use timepay_engine::access::{require_own_or_any, OwnOrAny, Permission};
/// use timepay_engine::models::{Actor, Role};
///
/// let employee = Actor::new("emp-001", Role::Employee);
/// let guard = |employee_id| OwnOrAny {
///     own: Permission::LeaveBalanceReadOwn,
///     any: Permission::LeaveBalanceReadAny,
///     employee_id,
/// };
/// assert!(require_own_or_any(&employee, guard("emp-001"), "insufficient permissions").is_ok());
/// assert!(require_own_or_any(&employee, guard("emp-002"), "insufficient permissions").is_err());
/// ```
pub fn require_own_or_any(actor: &Actor, guard: OwnOrAny<'_>, message: &str) -> EngineResult<()> {
    if has_permission(actor, guard.any) {
        return Ok(());
    }
    if has_permission(actor, guard.own) && actor.id == guard.employee_id {
        return Ok(());
    }
    Err(EngineError::forbidden(message))
}

/// The three flavours of a list permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListPermissions {
    /// Lists only the actor's own entries.
    pub own: Permission,
    /// Lists one explicitly named employee.
    pub by_employee: Permission,
    /// Lists anything.
    pub any: Permission,
}

impl ListPermissions {
    /// Attendance record listing.
    pub const ATTENDANCE_RECORDS: ListPermissions = ListPermissions {
        own: AttendanceRecordListOwn,
        by_employee: AttendanceRecordListByEmployee,
        any: AttendanceRecordListAny,
    };

    /// Per-employee attendance totals.
    pub const ATTENDANCE_AGGREGATES: ListPermissions = ListPermissions {
        own: AttendanceAggregateListOwn,
        by_employee: AttendanceAggregateListByEmployee,
        any: AttendanceAggregateListAny,
    };

    /// Leave request listing.
    pub const LEAVE_REQUESTS: ListPermissions = ListPermissions {
        own: LeaveRequestListOwn,
        by_employee: LeaveRequestListByEmployee,
        any: LeaveRequestListAny,
    };

    /// Work schedule listing.
    pub const WORK_SCHEDULES: ListPermissions = ListPermissions {
        own: SchedulingScheduleListOwn,
        by_employee: SchedulingScheduleListByEmployee,
        any: SchedulingScheduleListAny,
    };

    /// All three tokens.
    pub fn tokens(&self) -> [Permission; 3] {
        [self.own, self.by_employee, self.any]
    }
}

/// Resolves the employee filter a list query runs with.
///
/// - "any": the requested filter, which may be `None` for everyone.
/// - "own": the actor's own id; requesting someone else is forbidden.
/// - "by employee": the requested id, which must be present (validation
///   error otherwise).
///
/// Actors with none of the three are forbidden.
pub fn resolve_list_filter(
    actor: &Actor,
    permissions: ListPermissions,
    requested_employee_id: Option<&str>,
) -> EngineResult<Option<String>> {
    if has_permission(actor, permissions.any) {
        return Ok(requested_employee_id.map(str::to_string));
    }
    if has_permission(actor, permissions.own) {
        let employee_id = requested_employee_id.unwrap_or(&actor.id);
        if employee_id != actor.id {
            return Err(EngineError::forbidden("employee can only list own records"));
        }
        return Ok(Some(actor.id.clone()));
    }
    if has_permission(actor, permissions.by_employee) {
        return match requested_employee_id {
            Some(employee_id) if !employee_id.trim().is_empty() => Ok(Some(employee_id.to_string())),
            _ => Err(EngineError::validation(
                "employeeId is required for manager list queries",
            )),
        };
    }
    Err(EngineError::forbidden("insufficient permissions"))
}
