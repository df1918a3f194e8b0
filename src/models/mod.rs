//! Core data models for the engine.
//!
//! These are plain values: the repository owns every persisted entity and the
//! engine only ever receives copies and returns new values.

mod activity;
mod actor;
mod attendance;
mod leave;
mod payroll;
mod people;
mod schedule;

pub use activity::{AuditEntry, DomainEvent, EventName};
pub use actor::{Actor, Role};
pub use attendance::{AttendanceRecord, AttendanceState};
pub use leave::{
    LeaveBalance, LeaveDecision, LeaveDecisionAction, LeaveRequest, LeaveState, LeaveType,
};
pub use payroll::{DeductionMode, DeductionProfile, PayrollRun, PayrollState};
pub use people::{Employee, Organization};
pub use schedule::WorkSchedule;
