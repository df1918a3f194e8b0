//! Repository ports and adapters.
//!
//! Services reach persisted state only through these traits. Every list
//! query takes an optional organization filter, which services fill from the
//! resolved [`TenantScope`](crate::access::TenantScope). State transitions are
//! compare-and-swap on the expected current state, and ledger/profile updates
//! are read-modify-write inside the adapter, so concurrent callers cannot
//! lose each other's writes.

mod in_memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::access::TenantScope;
use crate::calculation::{AccrualSettlement, CivilDayRange};
use crate::error::EngineResult;
use crate::models::{
    AttendanceRecord, AttendanceState, AuditEntry, DeductionMode, DeductionProfile, DomainEvent,
    Employee, LeaveBalance, LeaveDecision, LeaveRequest, LeaveState, Organization, PayrollRun,
    PayrollState, WorkSchedule,
};

pub use in_memory::InMemoryStore;

/// Generates a fresh entity id, e.g. `LR-6f1c...`.
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

/// A period-bounded list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodQuery {
    /// Only entities owned by this organization.
    pub organization_id: Option<String>,
    /// Only entities of this employee.
    pub employee_id: Option<String>,
    /// Period start (inclusive).
    pub period_start: DateTime<FixedOffset>,
    /// Period end.
    pub period_end: DateTime<FixedOffset>,
}

/// Attendance record persistence.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Stores a new record.
    async fn insert(&self, record: AttendanceRecord) -> EngineResult<AttendanceRecord>;

    /// Looks up a record by id.
    async fn find(&self, id: &str) -> EngineResult<Option<AttendanceRecord>>;

    /// Replaces a record that is still `Pending`. A record that is missing
    /// or no longer pending is a conflict.
    async fn update_pending(&self, record: AttendanceRecord) -> EngineResult<AttendanceRecord>;

    /// Records whose check-in falls inside `[period_start, period_end]`,
    /// ordered by check-in, optionally restricted to one state.
    async fn list(
        &self,
        query: &PeriodQuery,
        state: Option<AttendanceState>,
    ) -> EngineResult<Vec<AttendanceRecord>>;
}

/// Leave request persistence, including the decision log.
#[async_trait]
pub trait LeaveStore: Send + Sync {
    /// Stores a new request.
    async fn insert(&self, request: LeaveRequest) -> EngineResult<LeaveRequest>;

    /// Looks up a request by id.
    async fn find(&self, id: &str) -> EngineResult<Option<LeaveRequest>>;

    /// Replaces a request that is still `Pending`. A request that is missing
    /// or no longer pending is a conflict.
    async fn update_pending(&self, request: LeaveRequest) -> EngineResult<LeaveRequest>;

    /// Active requests of `employee_id` whose civil days intersect `days`,
    /// skipping `exclude_id`.
    async fn find_overlapping_active(
        &self,
        employee_id: &str,
        days: CivilDayRange,
        exclude_id: Option<&str>,
    ) -> EngineResult<Vec<LeaveRequest>>;

    /// Requests intersecting the query period, ordered by start date.
    async fn list(
        &self,
        query: &PeriodQuery,
        state: Option<LeaveState>,
    ) -> EngineResult<Vec<LeaveRequest>>;

    /// Replaces a request that is still `Pending` with its decided form and
    /// appends `decision` to the log, as one step.
    async fn record_decision(
        &self,
        request: LeaveRequest,
        decision: LeaveDecision,
    ) -> EngineResult<LeaveRequest>;

    /// Like [`record_decision`](Self::record_decision), and in the same
    /// step charges the request's days to the employee's ledger, creating
    /// the ledger with `default_granted_days` if absent.
    async fn approve_with_usage(
        &self,
        request: LeaveRequest,
        decision: LeaveDecision,
        default_granted_days: i64,
    ) -> EngineResult<(LeaveRequest, LeaveBalance)>;

    /// Decision log of one request, oldest first.
    async fn list_decisions(&self, request_id: &str) -> EngineResult<Vec<LeaveDecision>>;
}

/// Per-employee leave ledger persistence.
///
/// Mutations run the ledger transition and the write as one step.
#[async_trait]
pub trait LeaveBalanceStore: Send + Sync {
    /// Returns the ledger, creating it with `default_granted_days` if absent.
    async fn ensure(
        &self,
        employee_id: &str,
        organization_id: Option<&str>,
        default_granted_days: i64,
    ) -> EngineResult<LeaveBalance>;

    /// Settles a year on the ledger, creating it first if absent. A year
    /// already settled is a conflict.
    async fn settle_accrual(
        &self,
        employee_id: &str,
        organization_id: Option<&str>,
        settlement: &AccrualSettlement,
        default_granted_days: i64,
    ) -> EngineResult<LeaveBalance>;
}

/// The writable fields of a deduction profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeductionProfileDraft {
    /// Profile id.
    pub id: String,
    /// Owner of a newly created profile. An existing profile keeps its own.
    pub organization_id: Option<String>,
    /// Display name.
    pub name: String,
    /// Application mode.
    pub mode: DeductionMode,
    /// Withholding tax rate.
    pub withholding_rate: Option<Decimal>,
    /// Social insurance rate.
    pub social_insurance_rate: Option<Decimal>,
    /// Flat amount per run.
    pub fixed_other_deduction_krw: i64,
    /// Whether the profile may be used.
    pub active: bool,
}

/// Deduction profile persistence.
#[async_trait]
pub trait DeductionProfileStore: Send + Sync {
    /// Looks up a profile by id.
    async fn find(&self, id: &str) -> EngineResult<Option<DeductionProfile>>;

    /// Creates the profile at version 1, or overwrites it and bumps the
    /// version by one. An existing profile keeps its owner, and one that
    /// `scope` cannot see is reported as not found; the ownership check and
    /// the write happen as one step.
    async fn upsert(
        &self,
        scope: &TenantScope,
        draft: DeductionProfileDraft,
    ) -> EngineResult<DeductionProfile>;
}

/// Work schedule persistence.
#[async_trait]
pub trait WorkScheduleStore: Send + Sync {
    /// Stores a new schedule. A schedule of the same employee overlapping
    /// it, checked in the same step, is a conflict.
    async fn insert(&self, schedule: WorkSchedule) -> EngineResult<WorkSchedule>;

    /// Schedules of `employee_id` whose half-open span intersects
    /// `[start_at, end_at)`, ordered by start.
    async fn find_overlapping(
        &self,
        employee_id: &str,
        start_at: DateTime<FixedOffset>,
        end_at: DateTime<FixedOffset>,
    ) -> EngineResult<Vec<WorkSchedule>>;

    /// Schedules intersecting the query period, ordered by start.
    async fn list(&self, query: &PeriodQuery) -> EngineResult<Vec<WorkSchedule>>;
}

/// Payroll run persistence.
#[async_trait]
pub trait PayrollStore: Send + Sync {
    /// Stores a new run.
    async fn insert(&self, run: PayrollRun) -> EngineResult<PayrollRun>;

    /// Looks up a run by id.
    async fn find(&self, id: &str) -> EngineResult<Option<PayrollRun>>;

    /// Moves a `Previewed` run to `Confirmed`. A run that is missing or
    /// already confirmed is a conflict.
    async fn confirm(
        &self,
        id: &str,
        confirmed_by: &str,
        confirmed_at: DateTime<Utc>,
    ) -> EngineResult<PayrollRun>;

    /// Runs, newest first, optionally restricted to one organization,
    /// employee and state.
    async fn list(
        &self,
        organization_id: Option<&str>,
        employee_id: Option<&str>,
        state: Option<PayrollState>,
    ) -> EngineResult<Vec<PayrollRun>>;
}

/// Employee persistence.
#[async_trait]
pub trait EmployeeStore: Send + Sync {
    /// Stores a new employee. A duplicate id is a conflict.
    async fn insert(&self, employee: Employee) -> EngineResult<Employee>;

    /// Looks up an employee by id.
    async fn find(&self, id: &str) -> EngineResult<Option<Employee>>;

    /// Replaces an existing employee.
    async fn update(&self, employee: Employee) -> EngineResult<Employee>;

    /// Employees ordered by id, optionally restricted to one organization.
    async fn list(&self, organization_id: Option<&str>) -> EngineResult<Vec<Employee>>;
}

/// Organization persistence.
#[async_trait]
pub trait OrganizationStore: Send + Sync {
    /// Stores a new organization.
    async fn insert(&self, organization: Organization) -> EngineResult<Organization>;

    /// Looks up an organization by id.
    async fn find(&self, id: &str) -> EngineResult<Option<Organization>>;

    /// Organizations ordered by creation, optionally only `organization_id`.
    async fn list(&self, organization_id: Option<&str>) -> EngineResult<Vec<Organization>>;
}

/// Destination of audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Appends one entry.
    async fn append(&self, entry: AuditEntry) -> EngineResult<()>;
}

/// Destination of domain events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes one event.
    async fn publish(&self, event: DomainEvent) -> EngineResult<()>;
}

/// Every port a service needs, bundled for cheap cloning.
#[derive(Clone)]
pub struct DataAccess {
    /// Attendance records.
    pub attendance: Arc<dyn AttendanceStore>,
    /// Leave requests and decisions.
    pub leave: Arc<dyn LeaveStore>,
    /// Leave ledgers.
    pub leave_balances: Arc<dyn LeaveBalanceStore>,
    /// Work schedules.
    pub schedules: Arc<dyn WorkScheduleStore>,
    /// Deduction profiles.
    pub deduction_profiles: Arc<dyn DeductionProfileStore>,
    /// Payroll runs.
    pub payroll: Arc<dyn PayrollStore>,
    /// Employees.
    pub employees: Arc<dyn EmployeeStore>,
    /// Organizations.
    pub organizations: Arc<dyn OrganizationStore>,
    /// Audit sink.
    pub audit: Arc<dyn AuditSink>,
    /// Event publisher.
    pub events: Arc<dyn EventPublisher>,
}

impl DataAccess {
    /// Wires every port to the same in-memory store.
    pub fn in_memory(store: &InMemoryStore) -> Self {
        let shared = Arc::new(store.clone());
        Self {
            attendance: shared.clone(),
            leave: shared.clone(),
            leave_balances: shared.clone(),
            schedules: shared.clone(),
            deduction_profiles: shared.clone(),
            payroll: shared.clone(),
            employees: shared.clone(),
            organizations: shared.clone(),
            audit: shared.clone(),
            events: shared,
        }
    }
}

impl std::fmt::Debug for DataAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataAccess").finish_non_exhaustive()
    }
}
