//! In-memory adapter implementing every repository port.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::access::TenantScope;
use crate::calculation::{self, AccrualSettlement, CivilDayRange};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AttendanceRecord, AttendanceState, AuditEntry, DeductionProfile, DomainEvent, Employee,
    LeaveBalance, LeaveDecision, LeaveRequest, LeaveState, Organization, PayrollRun, PayrollState,
    WorkSchedule,
};

use super::{
    AttendanceStore, AuditSink, DeductionProfileDraft, DeductionProfileStore, EmployeeStore,
    EventPublisher, LeaveBalanceStore, LeaveStore, OrganizationStore, PayrollStore, PeriodQuery,
    WorkScheduleStore,
};

#[derive(Debug, Default)]
struct State {
    attendance: HashMap<String, AttendanceRecord>,
    leave_requests: HashMap<String, LeaveRequest>,
    leave_decisions: Vec<LeaveDecision>,
    leave_balances: HashMap<String, LeaveBalance>,
    schedules: HashMap<String, WorkSchedule>,
    deduction_profiles: HashMap<String, DeductionProfile>,
    payroll: HashMap<String, PayrollRun>,
    employees: HashMap<String, Employee>,
    organizations: HashMap<String, Organization>,
    audit: Vec<AuditEntry>,
    events: Vec<DomainEvent>,
}

impl State {
    fn decide_pending(
        &mut self,
        request: LeaveRequest,
        decision: LeaveDecision,
    ) -> EngineResult<LeaveRequest> {
        match self.leave_requests.get_mut(&request.id) {
            Some(stored) if stored.state == LeaveState::Pending => {
                *stored = request.clone();
                self.leave_decisions.push(decision);
                Ok(request)
            }
            _ => Err(EngineError::conflict(
                "only pending leave request can be changed",
            )),
        }
    }

    fn overlapping_schedules(
        &self,
        employee_id: &str,
        start_at: &DateTime<FixedOffset>,
        end_at: &DateTime<FixedOffset>,
    ) -> Vec<WorkSchedule> {
        let mut rows: Vec<WorkSchedule> = self
            .schedules
            .values()
            .filter(|s| s.employee_id == employee_id && s.overlaps(start_at, end_at))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.start_at.cmp(&b.start_at).then(a.id.cmp(&b.id)));
        rows
    }

    fn balance_entry(
        &mut self,
        employee_id: &str,
        organization_id: Option<&str>,
        default_granted_days: i64,
    ) -> &mut LeaveBalance {
        self.leave_balances
            .entry(employee_id.to_string())
            .or_insert_with(|| {
                LeaveBalance::new(
                    employee_id,
                    organization_id.map(str::to_string),
                    default_granted_days,
                )
            })
    }
}

/// A thread-safe in-memory store.
///
/// Uses one `Arc<RwLock<_>>` over all collections, so every read-modify-write
/// happens under a single write guard. Clones share the same state. Audit
/// entries and events are kept in order for inspection.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every audit entry appended so far, oldest first.
    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.read().await.audit.clone()
    }

    /// Every event published so far, oldest first.
    pub async fn events(&self) -> Vec<DomainEvent> {
        self.state.read().await.events.clone()
    }
}

fn in_period(instant: &DateTime<FixedOffset>, query: &PeriodQuery) -> bool {
    *instant >= query.period_start && *instant <= query.period_end
}

fn matches_owner(
    organization_id: Option<&str>,
    employee_id: &str,
    query: &PeriodQuery,
) -> bool {
    let org_ok = query
        .organization_id
        .as_deref()
        .is_none_or(|org| organization_id == Some(org));
    let employee_ok = query
        .employee_id
        .as_deref()
        .is_none_or(|id| id == employee_id);
    org_ok && employee_ok
}

#[async_trait]
impl AttendanceStore for InMemoryStore {
    async fn insert(&self, record: AttendanceRecord) -> EngineResult<AttendanceRecord> {
        let mut state = self.state.write().await;
        state.attendance.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn find(&self, id: &str) -> EngineResult<Option<AttendanceRecord>> {
        Ok(self.state.read().await.attendance.get(id).cloned())
    }

    async fn update_pending(&self, record: AttendanceRecord) -> EngineResult<AttendanceRecord> {
        let mut state = self.state.write().await;
        match state.attendance.get_mut(&record.id) {
            Some(stored) if stored.state == AttendanceState::Pending => {
                *stored = record.clone();
                Ok(record)
            }
            _ => Err(EngineError::conflict(
                "only pending attendance record can be changed",
            )),
        }
    }

    async fn list(
        &self,
        query: &PeriodQuery,
        state_filter: Option<AttendanceState>,
    ) -> EngineResult<Vec<AttendanceRecord>> {
        let state = self.state.read().await;
        let mut rows: Vec<AttendanceRecord> = state
            .attendance
            .values()
            .filter(|r| state_filter.is_none_or(|s| r.state == s))
            .filter(|r| in_period(&r.check_in_at, query))
            .filter(|r| matches_owner(r.organization_id.as_deref(), &r.employee_id, query))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.check_in_at.cmp(&b.check_in_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }
}

#[async_trait]
impl LeaveStore for InMemoryStore {
    async fn insert(&self, request: LeaveRequest) -> EngineResult<LeaveRequest> {
        let mut state = self.state.write().await;
        state.leave_requests.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    async fn find(&self, id: &str) -> EngineResult<Option<LeaveRequest>> {
        Ok(self.state.read().await.leave_requests.get(id).cloned())
    }

    async fn update_pending(&self, request: LeaveRequest) -> EngineResult<LeaveRequest> {
        let mut state = self.state.write().await;
        match state.leave_requests.get_mut(&request.id) {
            Some(stored) if stored.state == LeaveState::Pending => {
                *stored = request.clone();
                Ok(request)
            }
            _ => Err(EngineError::conflict(
                "only pending leave request can be changed",
            )),
        }
    }

    async fn find_overlapping_active(
        &self,
        employee_id: &str,
        days: CivilDayRange,
        exclude_id: Option<&str>,
    ) -> EngineResult<Vec<LeaveRequest>> {
        let state = self.state.read().await;
        let mut rows: Vec<LeaveRequest> = state
            .leave_requests
            .values()
            .filter(|r| r.employee_id == employee_id && r.state.is_active())
            .filter(|r| exclude_id != Some(r.id.as_str()))
            .filter(|r| CivilDayRange::from_instants(&r.start_date, &r.end_date).overlaps(&days))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.start_date.cmp(&b.start_date));
        Ok(rows)
    }

    async fn list(
        &self,
        query: &PeriodQuery,
        state_filter: Option<LeaveState>,
    ) -> EngineResult<Vec<LeaveRequest>> {
        let state = self.state.read().await;
        let mut rows: Vec<LeaveRequest> = state
            .leave_requests
            .values()
            .filter(|r| state_filter.is_none_or(|s| r.state == s))
            .filter(|r| r.start_date <= query.period_end && r.end_date >= query.period_start)
            .filter(|r| matches_owner(r.organization_id.as_deref(), &r.employee_id, query))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn record_decision(
        &self,
        request: LeaveRequest,
        decision: LeaveDecision,
    ) -> EngineResult<LeaveRequest> {
        self.state.write().await.decide_pending(request, decision)
    }

    async fn approve_with_usage(
        &self,
        request: LeaveRequest,
        decision: LeaveDecision,
        default_granted_days: i64,
    ) -> EngineResult<(LeaveRequest, LeaveBalance)> {
        let mut state = self.state.write().await;
        let request = state.decide_pending(request, decision)?;
        let balance = state.balance_entry(
            &request.employee_id,
            request.organization_id.as_deref(),
            default_granted_days,
        );
        *balance = calculation::apply_usage(balance, request.days);
        let balance = balance.clone();
        Ok((request, balance))
    }

    async fn list_decisions(&self, request_id: &str) -> EngineResult<Vec<LeaveDecision>> {
        let state = self.state.read().await;
        Ok(state
            .leave_decisions
            .iter()
            .filter(|d| d.request_id == request_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LeaveBalanceStore for InMemoryStore {
    async fn ensure(
        &self,
        employee_id: &str,
        organization_id: Option<&str>,
        default_granted_days: i64,
    ) -> EngineResult<LeaveBalance> {
        let mut state = self.state.write().await;
        Ok(state
            .balance_entry(employee_id, organization_id, default_granted_days)
            .clone())
    }

    async fn settle_accrual(
        &self,
        employee_id: &str,
        organization_id: Option<&str>,
        settlement: &AccrualSettlement,
        default_granted_days: i64,
    ) -> EngineResult<LeaveBalance> {
        let mut state = self.state.write().await;
        let balance = state.balance_entry(employee_id, organization_id, default_granted_days);
        *balance = calculation::settle_accrual(balance, settlement)?;
        Ok(balance.clone())
    }
}

#[async_trait]
impl DeductionProfileStore for InMemoryStore {
    async fn find(&self, id: &str) -> EngineResult<Option<DeductionProfile>> {
        Ok(self.state.read().await.deduction_profiles.get(id).cloned())
    }

    async fn upsert(
        &self,
        scope: &TenantScope,
        draft: DeductionProfileDraft,
    ) -> EngineResult<DeductionProfile> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let (version, created_at, organization_id) = match state.deduction_profiles.get(&draft.id) {
            Some(existing) => {
                scope.ensure_match(
                    existing.organization_id.as_deref(),
                    "deduction profile not found",
                )?;
                (
                    existing.version + 1,
                    existing.created_at,
                    existing.organization_id.clone(),
                )
            }
            None => (1, now, draft.organization_id),
        };
        let profile = DeductionProfile {
            id: draft.id,
            organization_id,
            name: draft.name,
            mode: draft.mode,
            withholding_rate: draft.withholding_rate,
            social_insurance_rate: draft.social_insurance_rate,
            fixed_other_deduction_krw: draft.fixed_other_deduction_krw,
            active: draft.active,
            version,
            created_at,
            updated_at: now,
        };
        debug!(profile_id = %profile.id, version, "stored deduction profile");
        state
            .deduction_profiles
            .insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }
}

#[async_trait]
impl WorkScheduleStore for InMemoryStore {
    async fn insert(&self, schedule: WorkSchedule) -> EngineResult<WorkSchedule> {
        let mut state = self.state.write().await;
        let overlapping =
            state.overlapping_schedules(&schedule.employee_id, &schedule.start_at, &schedule.end_at);
        if !overlapping.is_empty() {
            return Err(EngineError::conflict("overlapping schedule exists"));
        }
        state.schedules.insert(schedule.id.clone(), schedule.clone());
        Ok(schedule)
    }

    async fn find_overlapping(
        &self,
        employee_id: &str,
        start_at: DateTime<FixedOffset>,
        end_at: DateTime<FixedOffset>,
    ) -> EngineResult<Vec<WorkSchedule>> {
        let state = self.state.read().await;
        Ok(state.overlapping_schedules(employee_id, &start_at, &end_at))
    }

    async fn list(&self, query: &PeriodQuery) -> EngineResult<Vec<WorkSchedule>> {
        let state = self.state.read().await;
        let mut rows: Vec<WorkSchedule> = state
            .schedules
            .values()
            .filter(|s| s.start_at <= query.period_end && s.end_at >= query.period_start)
            .filter(|s| matches_owner(s.organization_id.as_deref(), &s.employee_id, query))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.start_at.cmp(&b.start_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }
}

#[async_trait]
impl PayrollStore for InMemoryStore {
    async fn insert(&self, run: PayrollRun) -> EngineResult<PayrollRun> {
        let mut state = self.state.write().await;
        state.payroll.insert(run.id.clone(), run.clone());
        Ok(run)
    }

    async fn find(&self, id: &str) -> EngineResult<Option<PayrollRun>> {
        Ok(self.state.read().await.payroll.get(id).cloned())
    }

    async fn confirm(
        &self,
        id: &str,
        confirmed_by: &str,
        confirmed_at: DateTime<Utc>,
    ) -> EngineResult<PayrollRun> {
        let mut state = self.state.write().await;
        match state.payroll.get_mut(id) {
            Some(run) if run.state == PayrollState::Previewed => {
                run.state = PayrollState::Confirmed;
                run.confirmed_at = Some(confirmed_at);
                run.confirmed_by = Some(confirmed_by.to_string());
                run.updated_at = confirmed_at;
                Ok(run.clone())
            }
            Some(_) => Err(EngineError::conflict("payroll run already confirmed")),
            None => Err(EngineError::conflict("payroll run no longer exists")),
        }
    }

    async fn list(
        &self,
        organization_id: Option<&str>,
        employee_id: Option<&str>,
        state_filter: Option<PayrollState>,
    ) -> EngineResult<Vec<PayrollRun>> {
        let state = self.state.read().await;
        let mut rows: Vec<PayrollRun> = state
            .payroll
            .values()
            .filter(|r| organization_id.is_none_or(|org| r.organization_id.as_deref() == Some(org)))
            .filter(|r| employee_id.is_none_or(|id| r.employee_id.as_deref() == Some(id)))
            .filter(|r| state_filter.is_none_or(|s| r.state == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }
}

#[async_trait]
impl EmployeeStore for InMemoryStore {
    async fn insert(&self, employee: Employee) -> EngineResult<Employee> {
        let mut state = self.state.write().await;
        if state.employees.contains_key(&employee.id) {
            return Err(EngineError::conflict("employee already exists"));
        }
        state.employees.insert(employee.id.clone(), employee.clone());
        Ok(employee)
    }

    async fn find(&self, id: &str) -> EngineResult<Option<Employee>> {
        Ok(self.state.read().await.employees.get(id).cloned())
    }

    async fn update(&self, employee: Employee) -> EngineResult<Employee> {
        let mut state = self.state.write().await;
        match state.employees.get_mut(&employee.id) {
            Some(stored) => {
                *stored = employee.clone();
                Ok(employee)
            }
            None => Err(EngineError::not_found("employee not found")),
        }
    }

    async fn list(&self, organization_id: Option<&str>) -> EngineResult<Vec<Employee>> {
        let state = self.state.read().await;
        let mut rows: Vec<Employee> = state
            .employees
            .values()
            .filter(|e| organization_id.is_none_or(|org| e.organization_id.as_deref() == Some(org)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }
}

#[async_trait]
impl OrganizationStore for InMemoryStore {
    async fn insert(&self, organization: Organization) -> EngineResult<Organization> {
        let mut state = self.state.write().await;
        if state.organizations.contains_key(&organization.id) {
            return Err(EngineError::conflict("organization already exists"));
        }
        state
            .organizations
            .insert(organization.id.clone(), organization.clone());
        Ok(organization)
    }

    async fn find(&self, id: &str) -> EngineResult<Option<Organization>> {
        Ok(self.state.read().await.organizations.get(id).cloned())
    }

    async fn list(&self, organization_id: Option<&str>) -> EngineResult<Vec<Organization>> {
        let state = self.state.read().await;
        let mut rows: Vec<Organization> = state
            .organizations
            .values()
            .filter(|o| organization_id.is_none_or(|org| o.id == org))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }
}

#[async_trait]
impl AuditSink for InMemoryStore {
    async fn append(&self, entry: AuditEntry) -> EngineResult<()> {
        self.state.write().await.audit.push(entry);
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for InMemoryStore {
    async fn publish(&self, event: DomainEvent) -> EngineResult<()> {
        self.state.write().await.events.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::PayableMinutes;
    use crate::models::{DeductionMode, LeaveDecisionAction, LeaveType, Role};
    use chrono::FixedOffset;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn leave(id: &str, start: &str, end: &str, state: LeaveState) -> LeaveRequest {
        let now = Utc::now();
        LeaveRequest {
            id: id.to_string(),
            employee_id: "emp-001".to_string(),
            organization_id: Some("ORG-A".to_string()),
            leave_type: LeaveType::Annual,
            start_date: at(start),
            end_date: at(end),
            days: 1,
            reason: None,
            state,
            decision_reason: None,
            decided_by: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn draft(id: &str) -> DeductionProfileDraft {
        DeductionProfileDraft {
            id: id.to_string(),
            organization_id: Some("ORG-A".to_string()),
            name: "Standard".to_string(),
            mode: DeductionMode::Profile,
            withholding_rate: None,
            social_insurance_rate: None,
            fixed_other_deduction_krw: 0,
            active: true,
        }
    }

    fn org(id: &str) -> TenantScope {
        TenantScope::Organization(id.to_string())
    }

    fn decision(request: &LeaveRequest, action: LeaveDecisionAction) -> LeaveDecision {
        LeaveDecision {
            request_id: request.id.clone(),
            action,
            actor_id: "mgr-1".to_string(),
            actor_role: Role::Manager,
            reason: None,
            recorded_at: Utc::now(),
        }
    }

    fn decided(request: &LeaveRequest, state: LeaveState) -> LeaveRequest {
        LeaveRequest {
            state,
            ..request.clone()
        }
    }

    #[tokio::test]
    async fn test_profile_upsert_bumps_version() {
        let store = InMemoryStore::new();
        let first = store.upsert(&org("ORG-A"), draft("standard")).await.unwrap();
        let second = store.upsert(&org("ORG-A"), draft("standard")).await.unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(second.created_at, first.created_at);
    }

    #[tokio::test]
    async fn test_profile_upsert_keeps_owner_across_tenants() {
        let store = InMemoryStore::new();
        store.upsert(&org("ORG-A"), draft("p1")).await.unwrap();

        let foreign = DeductionProfileDraft {
            organization_id: Some("ORG-B".to_string()),
            ..draft("p1")
        };
        let err = store.upsert(&org("ORG-B"), foreign).await.unwrap_err();
        assert_eq!(err, EngineError::not_found("deduction profile not found"));

        let stored = DeductionProfileStore::find(&store, "p1").await.unwrap().unwrap();
        assert_eq!(stored.organization_id.as_deref(), Some("ORG-A"));
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_upserts_leave_one_owner() {
        let store = InMemoryStore::new();
        let mut handles = Vec::new();
        for tenant in ["ORG-A", "ORG-B"] {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let draft = DeductionProfileDraft {
                    organization_id: Some(tenant.to_string()),
                    ..draft("p1")
                };
                store.upsert(&org(tenant), draft).await
            }));
        }
        let mut winners = Vec::new();
        for handle in handles {
            if let Ok(profile) = handle.await.unwrap() {
                winners.push(profile.organization_id);
            }
        }
        assert_eq!(winners.len(), 1);
        let stored = DeductionProfileStore::find(&store, "p1").await.unwrap().unwrap();
        assert_eq!(stored.organization_id, winners[0]);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_overlap_ignores_inactive_and_excluded() {
        let store = InMemoryStore::new();
        for request in [
            leave("LR-1", "2026-03-03T00:00:00+09:00", "2026-03-04T00:00:00+09:00", LeaveState::Pending),
            leave("LR-2", "2026-03-04T00:00:00+09:00", "2026-03-04T00:00:00+09:00", LeaveState::Rejected),
        ] {
            LeaveStore::insert(&store, request).await.unwrap();
        }
        let days = CivilDayRange::from_instants(
            &at("2026-03-04T00:00:00+09:00"),
            &at("2026-03-05T00:00:00+09:00"),
        );
        let found = store.find_overlapping_active("emp-001", days, None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "LR-1");

        let excluded = store
            .find_overlapping_active("emp-001", days, Some("LR-1"))
            .await
            .unwrap();
        assert!(excluded.is_empty());
    }

    #[tokio::test]
    async fn test_update_pending_is_compare_and_swap() {
        let store = InMemoryStore::new();
        let request = leave(
            "LR-1",
            "2026-03-03T00:00:00+09:00",
            "2026-03-03T00:00:00+09:00",
            LeaveState::Pending,
        );
        LeaveStore::insert(&store, request.clone()).await.unwrap();

        let mut edited = request.clone();
        edited.days = 2;
        LeaveStore::update_pending(&store, edited).await.unwrap();

        let rejected = decided(&request, LeaveState::Rejected);
        store
            .record_decision(rejected, decision(&request, LeaveDecisionAction::Rejected))
            .await
            .unwrap();

        let canceled = decided(&request, LeaveState::Canceled);
        let err = store
            .record_decision(canceled, decision(&request, LeaveDecisionAction::Canceled))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let log = store.list_decisions("LR-1").await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, LeaveDecisionAction::Rejected);
    }

    #[tokio::test]
    async fn test_approval_and_usage_land_together() {
        let store = InMemoryStore::new();
        let request = leave(
            "LR-1",
            "2026-03-03T00:00:00+09:00",
            "2026-03-03T00:00:00+09:00",
            LeaveState::Pending,
        );
        LeaveStore::insert(&store, request.clone()).await.unwrap();

        let approved = decided(&request, LeaveState::Approved);
        let (stored, balance) = store
            .approve_with_usage(approved.clone(), decision(&request, LeaveDecisionAction::Approved), 15)
            .await
            .unwrap();
        assert_eq!(stored.state, LeaveState::Approved);
        assert_eq!(balance.used_days, 1);

        let err = store
            .approve_with_usage(approved, decision(&request, LeaveDecisionAction::Approved), 15)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        let balance = store.ensure("emp-001", None, 15).await.unwrap();
        assert_eq!(balance.used_days, 1);
        assert_eq!(store.list_decisions("LR-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_usage_is_not_lost() {
        let store = InMemoryStore::new();
        let mut handles = Vec::new();
        for day in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let request = leave(
                    &format!("LR-{day}"),
                    "2026-03-03T00:00:00+09:00",
                    "2026-03-03T00:00:00+09:00",
                    LeaveState::Pending,
                );
                LeaveStore::insert(&store, request.clone()).await.unwrap();
                let approved = decided(&request, LeaveState::Approved);
                store
                    .approve_with_usage(approved, decision(&request, LeaveDecisionAction::Approved), 15)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let balance = store.ensure("emp-001", Some("ORG-A"), 15).await.unwrap();
        assert_eq!(balance.used_days, 10);
        assert_eq!(balance.remaining_days, 5);
    }

    #[tokio::test]
    async fn test_settlement_rechecks_year_under_lock() {
        let store = InMemoryStore::new();
        let settlement = AccrualSettlement::new(2027, 15, 5).unwrap();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.settle_accrual("emp-001", None, &settlement, 15).await
            }));
        }
        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_payroll_confirm_only_once() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let run = PayrollRun {
            id: "PR-1".to_string(),
            organization_id: None,
            employee_id: None,
            period_start: at("2026-02-01T00:00:00+09:00"),
            period_end: at("2026-03-01T00:00:00+09:00"),
            state: PayrollState::Previewed,
            totals: PayableMinutes::default(),
            gross_pay_krw: 0,
            deductions: None,
            net_pay_krw: None,
            source_record_count: 0,
            confirmed_at: None,
            confirmed_by: None,
            created_at: now,
            updated_at: now,
        };
        PayrollStore::insert(&store, run).await.unwrap();
        let confirmed = store.confirm("PR-1", "op-1", now).await.unwrap();
        assert_eq!(confirmed.state, PayrollState::Confirmed);
        assert!(store.confirm("PR-1", "op-1", now).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_duplicate_employee_conflicts() {
        let store = InMemoryStore::new();
        EmployeeStore::insert(&store, Employee::new("emp-001", None)).await.unwrap();
        let err = EmployeeStore::insert(&store, Employee::new("emp-001", None))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::conflict("employee already exists"));
    }

    fn schedule(id: &str, start: &str, end: &str) -> WorkSchedule {
        WorkSchedule {
            id: id.to_string(),
            employee_id: "emp-001".to_string(),
            organization_id: Some("ORG-A".to_string()),
            start_at: at(start),
            end_at: at(end),
            break_minutes: 0,
            is_holiday: false,
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_schedule_insert_rejects_overlap_under_lock() {
        let store = InMemoryStore::new();
        WorkScheduleStore::insert(
            &store,
            schedule("WS-1", "2026-02-10T09:00:00+09:00", "2026-02-10T18:00:00+09:00"),
        )
        .await
        .unwrap();

        let err = WorkScheduleStore::insert(
            &store,
            schedule("WS-2", "2026-02-10T17:00:00+09:00", "2026-02-10T22:00:00+09:00"),
        )
        .await
        .unwrap_err();
        assert_eq!(err, EngineError::conflict("overlapping schedule exists"));

        WorkScheduleStore::insert(
            &store,
            schedule("WS-3", "2026-02-10T18:00:00+09:00", "2026-02-10T22:00:00+09:00"),
        )
        .await
        .unwrap();
        let found = store
            .find_overlapping(
                "emp-001",
                at("2026-02-10T12:00:00+09:00"),
                at("2026-02-10T19:00:00+09:00"),
            )
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["WS-1", "WS-3"]);
    }
}
