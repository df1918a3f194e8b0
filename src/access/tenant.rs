//! Tenant scope resolution.
//!
//! A scope is resolved once per operation and passed explicitly into every
//! lookup. Entities outside the scope are reported as missing, never as
//! forbidden, so their existence does not leak across tenants.

use crate::error::{EngineError, EngineResult};
use crate::models::{
    Actor, AttendanceRecord, DeductionProfile, Employee, LeaveBalance, LeaveRequest, Organization,
    PayrollRun,
};

/// The organization boundary an operation runs inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantScope {
    /// No boundary: tenancy is off, or the actor is a platform actor.
    Unscoped,
    /// Confined to one organization.
    Organization(String),
}

impl TenantScope {
    /// Resolves the scope for `actor`.
    ///
    /// - Tenancy disabled: `Unscoped`.
    /// - No actor: `Unauthenticated`.
    /// - `system` role: `Unscoped`.
    /// - Any other actor must carry an organization (`Unauthenticated`
    ///   "missing tenant context" otherwise) and is confined to it.
    ///
    /// # Example
    ///
    /// ```
    /// use timepay_engine::access::TenantScope;
    /// use timepay_engine::models::{Actor, Role};
    ///
    /// let manager = Actor::new("mgr-1", Role::Manager).in_organization("ORG-A");
    /// let scope = TenantScope::resolve(Some(&manager), true).unwrap();
    /// assert_eq!(scope.organization_id(), Some("ORG-A"));
    ///
    /// let system = Actor::new("svc", Role::System);
    /// assert!(TenantScope::resolve(Some(&system), true).unwrap().is_unscoped());
    /// ```
    pub fn resolve(actor: Option<&Actor>, tenancy_enabled: bool) -> EngineResult<Self> {
        if !tenancy_enabled {
            return Ok(TenantScope::Unscoped);
        }
        let actor =
            actor.ok_or_else(|| EngineError::unauthenticated("missing or invalid actor context"))?;
        if actor.is_platform() {
            return Ok(TenantScope::Unscoped);
        }
        match actor.organization_id.as_deref() {
            Some(org) if !org.trim().is_empty() => Ok(TenantScope::Organization(org.to_string())),
            _ => Err(EngineError::unauthenticated("missing tenant context")),
        }
    }

    /// The organization the scope is confined to, if any. Doubles as the
    /// repository list filter.
    pub fn organization_id(&self) -> Option<&str> {
        match self {
            TenantScope::Unscoped => None,
            TenantScope::Organization(org) => Some(org),
        }
    }

    /// Whether the scope is unbounded.
    pub fn is_unscoped(&self) -> bool {
        matches!(self, TenantScope::Unscoped)
    }

    /// Whether an entity owned by `organization_id` is visible in this scope.
    pub fn permits(&self, organization_id: Option<&str>) -> bool {
        match self {
            TenantScope::Unscoped => true,
            TenantScope::Organization(org) => organization_id == Some(org.as_str()),
        }
    }

    /// Fails with `NotFound` unless an entity owned by `organization_id` is
    /// visible.
    pub fn ensure_match(
        &self,
        organization_id: Option<&str>,
        not_found_message: &str,
    ) -> EngineResult<()> {
        if self.permits(organization_id) {
            Ok(())
        } else {
            Err(EngineError::not_found(not_found_message))
        }
    }

    /// Unwraps a looked-up entity, treating an absent one and one outside
    /// the scope the same way.
    pub fn visible<T: TenantOwned>(
        &self,
        entity: Option<T>,
        not_found_message: &str,
    ) -> EngineResult<T> {
        match entity {
            Some(entity) if self.permits(entity.organization_id()) => Ok(entity),
            _ => Err(EngineError::not_found(not_found_message)),
        }
    }
}

/// An entity that belongs to an organization.
pub trait TenantOwned {
    /// The owning organization, when known.
    fn organization_id(&self) -> Option<&str>;
}

macro_rules! tenant_owned {
    ($($ty:ty),* $(,)?) => {
        $(
            impl TenantOwned for $ty {
                fn organization_id(&self) -> Option<&str> {
                    self.organization_id.as_deref()
                }
            }
        )*
    };
}

tenant_owned!(
    AttendanceRecord,
    DeductionProfile,
    Employee,
    LeaveBalance,
    LeaveRequest,
    PayrollRun,
);

impl TenantOwned for Organization {
    fn organization_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_tenancy_disabled_is_unscoped_even_without_actor() {
        assert_eq!(TenantScope::resolve(None, false).unwrap(), TenantScope::Unscoped);
        let employee = Actor::new("emp-001", Role::Employee);
        assert!(TenantScope::resolve(Some(&employee), false)
            .unwrap()
            .is_unscoped());
    }

    #[test]
    fn test_missing_actor_is_unauthenticated() {
        let err = TenantScope::resolve(None, true).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_non_system_actor_without_organization_is_rejected() {
        for role in [Role::Admin, Role::Manager, Role::Employee, Role::PayrollOperator] {
            let actor = Actor::new("someone", role);
            assert_eq!(
                TenantScope::resolve(Some(&actor), true).unwrap_err(),
                EngineError::unauthenticated("missing tenant context")
            );
        }
    }

    #[test]
    fn test_system_bypasses_even_with_organization() {
        let system = Actor::new("svc", Role::System).in_organization("ORG-A");
        assert!(TenantScope::resolve(Some(&system), true)
            .unwrap()
            .is_unscoped());
    }

    #[test]
    fn test_cross_tenant_entity_is_not_found() {
        let scope = TenantScope::Organization("ORG-A".to_string());
        let other = Employee::new("emp-b", Some("ORG-B".to_string()));
        let err = scope.visible(Some(other), "employee not found").unwrap_err();
        assert_eq!(err, EngineError::not_found("employee not found"));

        let own = Employee::new("emp-a", Some("ORG-A".to_string()));
        assert!(scope.visible(Some(own), "employee not found").is_ok());
    }

    #[test]
    fn test_unowned_entity_is_hidden_from_scoped_actor() {
        let scope = TenantScope::Organization("ORG-A".to_string());
        assert!(!scope.permits(None));
        assert!(TenantScope::Unscoped.permits(None));
        assert!(scope.ensure_match(None, "leave request not found").is_err());
    }
}
