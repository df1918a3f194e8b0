//! Actor model.
//!
//! An [`Actor`] is the already-authenticated principal a service operation
//! runs on behalf of. The engine never authenticates; it only consumes the
//! resolved actor.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The role an actor holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Organization administrator, holds every permission.
    Admin,
    /// Line manager, acts on employees it names explicitly.
    Manager,
    /// Regular employee, acts on its own records.
    Employee,
    /// Payroll operator, runs payroll and accrual settlement.
    PayrollOperator,
    /// Platform actor. Holds every permission and bypasses tenant scoping.
    System,
}

impl Role {
    /// Returns the wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Employee => "employee",
            Role::PayrollOperator => "payroll_operator",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The principal a request is executed for.
///
/// # Example
///
/// ```
/// use timepay_engine::models::{Actor, Role};
///
/// let actor = Actor::new("emp-001", Role::Employee).in_organization("org-a");
/// assert_eq!(actor.organization_id.as_deref(), Some("org-a"));
/// assert!(!actor.is_platform());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor identifier. For employees this is also their employee id.
    pub id: String,
    /// The role the actor holds.
    pub role: Role,
    /// The organization the actor belongs to, if any.
    #[serde(default)]
    pub organization_id: Option<String>,
}

impl Actor {
    /// Creates an actor without an organization.
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            organization_id: None,
        }
    }

    /// Returns the actor bound to the given organization.
    pub fn in_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Returns true for the platform-bypass role.
    pub fn is_platform(&self) -> bool {
        self.role == Role::System
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&Role::PayrollOperator).unwrap(),
            "\"payroll_operator\""
        );
        let role: Role = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(role, Role::System);
    }

    #[test]
    fn test_actor_deserializes_without_organization() {
        let actor: Actor = serde_json::from_str(r#"{"id": "mgr-1", "role": "manager"}"#).unwrap();
        assert_eq!(actor.role, Role::Manager);
        assert!(actor.organization_id.is_none());
    }

    #[test]
    fn test_only_system_is_platform() {
        assert!(Actor::new("sys", Role::System).is_platform());
        assert!(!Actor::new("adm", Role::Admin).is_platform());
    }
}
