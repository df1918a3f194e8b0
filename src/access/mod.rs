//! Authorization for service operations.
//!
//! Two resolvers gate every operation: [`TenantScope`] decides which
//! organization an actor is confined to, and the permission table decides
//! what the actor's role may do inside it.

mod permissions;
mod tenant;

pub use permissions::{
    ListPermissions, OwnOrAny, Permission, has_permission, permissions_for,
    require_actor, require_any_permission, require_own_or_any, require_permission,
    resolve_list_filter,
};
pub use tenant::{TenantOwned, TenantScope};
