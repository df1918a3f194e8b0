//! Employee and organization models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tenant boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Unique identifier for the organization.
    pub id: String,
    /// Display name.
    pub name: String,
    /// When the organization was created.
    pub created_at: DateTime<Utc>,
}

/// An employee whose time, leave and pay records are managed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique identifier for the employee.
    pub id: String,
    /// The organization owning this employee, when tenancy is in use.
    pub organization_id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Contact email.
    pub email: Option<String>,
    /// Whether the employee is currently active.
    pub active: bool,
    /// When the employee was created.
    pub created_at: DateTime<Utc>,
    /// When the employee was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    /// Creates an active employee record stamped with the current time.
    pub fn new(id: impl Into<String>, organization_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            organization_id,
            name: None,
            email: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
