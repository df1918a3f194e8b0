//! Organization and employee directory operations.

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::access::{Permission, TenantScope, require_permission};
use crate::error::{EngineError, EngineResult};
use crate::models::{Actor, Employee, EventName, Organization};
use crate::store::new_id;

use super::{Activity, ServiceContext};

const EMPLOYEE_ENTITY: &str = "Employee";
const ORGANIZATION_ENTITY: &str = "Organization";
const ORGANIZATION_NOT_FOUND: &str = "organization not found";

/// Input for [`create_employee`].
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEmployeeInput {
    /// Employee id, chosen by the caller.
    pub id: String,
    /// Owning organization. Tenant-scoped callers default to their own.
    #[serde(default)]
    pub organization_id: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Defaults to true.
    #[serde(default)]
    pub active: Option<bool>,
}

/// Changes for [`update_employee`]. Absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateEmployeeInput {
    /// Move the employee to another organization.
    pub organization_id: Option<String>,
    /// New display name.
    pub name: Option<String>,
    /// New contact email.
    pub email: Option<String>,
    /// New active flag.
    pub active: Option<bool>,
}

fn require_people_admin<'a>(
    ctx: &'a ServiceContext,
    permission: Permission,
    action: &str,
) -> EngineResult<(&'a Actor, TenantScope)> {
    let (actor, scope) = ctx.authorize()?;
    require_permission(actor, permission, &format!("people {action} requires admin role"))?;
    Ok((actor, scope))
}

/// Resolves the organization an employee is placed in. The organization
/// must exist and be visible to the caller.
async fn placement(
    ctx: &ServiceContext,
    scope: &TenantScope,
    requested: Option<String>,
) -> EngineResult<Option<String>> {
    let organization_id = requested.or_else(|| scope.organization_id().map(str::to_string));
    match organization_id {
        Some(id) => {
            let organization = ctx.data.organizations.find(&id).await?;
            Ok(Some(scope.visible(organization, ORGANIZATION_NOT_FOUND)?.id))
        }
        None => Ok(None),
    }
}

fn employee_snapshot(employee: &Employee) -> serde_json::Value {
    json!({
        "organizationId": employee.organization_id,
        "name": employee.name,
        "email": employee.email,
        "active": employee.active,
    })
}

/// Creates an organization. Only unscoped callers (platform actors, or any
/// admin when tenancy is off) may create one.
pub async fn create_organization(ctx: &ServiceContext, name: &str) -> EngineResult<Organization> {
    let (actor, scope) = require_people_admin(
        ctx,
        Permission::PeopleOrganizationsManage,
        "create organization",
    )?;
    if !scope.is_unscoped() {
        return Err(EngineError::forbidden(
            "people create organization requires platform scope",
        ));
    }
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::validation("name is required"));
    }

    let organization = ctx
        .data
        .organizations
        .insert(Organization {
            id: new_id("ORG"),
            name: name.to_string(),
            created_at: Utc::now(),
        })
        .await?;
    info!(organization_id = %organization.id, actor_id = %actor.id, "organization created");

    ctx.record(
        actor,
        Activity::new("organization.created", ORGANIZATION_ENTITY, &organization.id)
            .event(EventName::OrganizationCreated)
            .organization(Some(organization.id.clone()))
            .payload(json!({ "name": organization.name })),
    )
    .await?;
    Ok(organization)
}

/// Lists organizations. Tenant-scoped callers see only their own.
pub async fn list_organizations(ctx: &ServiceContext) -> EngineResult<Vec<Organization>> {
    let (_, scope) = require_people_admin(
        ctx,
        Permission::PeopleOrganizationsManage,
        "list organizations",
    )?;
    ctx.data.organizations.list(scope.organization_id()).await
}

/// Looks up one organization.
pub async fn get_organization(
    ctx: &ServiceContext,
    organization_id: &str,
) -> EngineResult<Organization> {
    let (_, scope) = require_people_admin(
        ctx,
        Permission::PeopleOrganizationsManage,
        "get organization",
    )?;
    let organization = ctx.data.organizations.find(organization_id).await?;
    scope.visible(organization, ORGANIZATION_NOT_FOUND)
}

/// Registers an employee. A duplicate id is a conflict.
pub async fn create_employee(
    ctx: &ServiceContext,
    input: CreateEmployeeInput,
) -> EngineResult<Employee> {
    let (actor, scope) =
        require_people_admin(ctx, Permission::PeopleEmployeesManage, "create employee")?;
    let id = input.id.trim();
    if id.is_empty() {
        return Err(EngineError::validation("id is required"));
    }

    let organization_id = placement(ctx, &scope, input.organization_id).await?;
    let employee = Employee {
        name: input.name,
        email: input.email,
        active: input.active.unwrap_or(true),
        ..Employee::new(id, organization_id)
    };
    let employee = ctx.data.employees.insert(employee).await?;
    info!(employee_id = %employee.id, actor_id = %actor.id, "employee created");

    ctx.record(
        actor,
        Activity::new("employee.created", EMPLOYEE_ENTITY, &employee.id)
            .event(EventName::EmployeeCreated)
            .organization(employee.organization_id.clone())
            .payload(employee_snapshot(&employee)),
    )
    .await?;
    Ok(employee)
}

/// Lists employees of the caller's tenant, optionally only active or
/// inactive ones.
pub async fn list_employees(
    ctx: &ServiceContext,
    active: Option<bool>,
) -> EngineResult<Vec<Employee>> {
    let (_, scope) =
        require_people_admin(ctx, Permission::PeopleEmployeesManage, "list employees")?;
    let employees = ctx.data.employees.list(scope.organization_id()).await?;
    Ok(employees
        .into_iter()
        .filter(|e| active.is_none_or(|a| e.active == a))
        .collect())
}

/// Looks up one employee.
pub async fn get_employee(ctx: &ServiceContext, employee_id: &str) -> EngineResult<Employee> {
    let (_, scope) = require_people_admin(ctx, Permission::PeopleEmployeesManage, "get employee")?;
    ctx.require_employee(&scope, employee_id).await
}

/// Updates an employee's profile. The audit entry keeps both the before and
/// after snapshots.
pub async fn update_employee(
    ctx: &ServiceContext,
    employee_id: &str,
    input: UpdateEmployeeInput,
) -> EngineResult<Employee> {
    let (actor, scope) =
        require_people_admin(ctx, Permission::PeopleEmployeesManage, "update employee")?;
    let existing = ctx.require_employee(&scope, employee_id).await?;

    let organization_id = match input.organization_id {
        Some(requested) => placement(ctx, &scope, Some(requested)).await?,
        None => existing.organization_id.clone(),
    };
    let updated = Employee {
        organization_id,
        name: input.name.or(existing.name.clone()),
        email: input.email.or(existing.email.clone()),
        active: input.active.unwrap_or(existing.active),
        updated_at: Utc::now(),
        ..existing.clone()
    };
    let employee = ctx.data.employees.update(updated).await?;
    info!(employee_id = %employee.id, actor_id = %actor.id, "employee profile updated");

    ctx.record(
        actor,
        Activity::new("employee.profile.updated", EMPLOYEE_ENTITY, &employee.id)
            .event(EventName::EmployeeProfileUpdated)
            .organization(employee.organization_id.clone())
            .payload(json!({
                "before": employee_snapshot(&existing),
                "after": employee_snapshot(&employee),
            })),
    )
    .await?;
    Ok(employee)
}
