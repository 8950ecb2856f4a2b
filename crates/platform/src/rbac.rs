//! Role-based access control over the role ↔ permission join table.

use reportflow_core::types::{Permission, Role, RoleWithPermissions, User};
use reportflow_core::{ReportFlowError, ReportFlowResult};
use reportflow_core::requests::CreatePermissionRequest;
use reportflow_storage::RepositoryFactory;
use tracing::{debug, info};

/// `(resource, action, description)` for every built-in permission.
pub const PERMISSION_CATALOGUE: &[(&str, &str, &str)] = &[
    ("*", "*", "Unrestricted access to every resource"),
    ("admin", "access", "Use the administration console"),
    ("organization", "read", "View the caller's organization"),
    ("organization", "write", "Manage organizations"),
    ("users", "read", "View users"),
    ("users", "write", "Manage users"),
    ("roles", "read", "View roles and their permissions"),
    ("roles", "write", "Manage roles and their permissions"),
    ("reports", "read", "View reports"),
    ("reports", "write", "Create, edit and delete reports"),
    ("subscriptions", "read", "View subscriptions"),
    ("subscriptions", "write", "Manage subscriptions"),
    ("settings", "read", "View system settings"),
    ("settings", "write", "Change system settings"),
    ("audit", "read", "View the audit log"),
];

pub const ADMIN_ROLE: &str = "admin";
pub const MEMBER_ROLE: &str = "member";
pub const VIEWER_ROLE: &str = "viewer";

/// Built-in roles and the `resource:action` keys they hold. `admin` also
/// receives the whole catalogue.
const SYSTEM_ROLES: &[(&str, &str, &[&str])] = &[
    (ADMIN_ROLE, "Full system administrator", &["*:*"]),
    (
        MEMBER_ROLE,
        "Organization member who authors reports",
        &["reports:read", "reports:write", "organization:read"],
    ),
    (
        VIEWER_ROLE,
        "Read-only organization member",
        &["reports:read", "organization:read"],
    ),
];

#[derive(Clone)]
pub struct RbacService {
    repos: RepositoryFactory,
}

impl RbacService {
    pub fn new(repos: RepositoryFactory) -> Self {
        Self { repos }
    }

    /// Permissions the user holds through their role. Users without a
    /// role, or disabled users, hold none.
    pub async fn permissions_for(&self, user: &User) -> ReportFlowResult<Vec<Permission>> {
        if user.role_id.is_none() || !user.is_active() {
            return Ok(Vec::new());
        }
        self.repos.permissions.for_user(&user.id).await
    }

    pub async fn user_has_permission(
        &self,
        user: &User,
        resource: &str,
        action: &str,
    ) -> ReportFlowResult<bool> {
        let granted = self
            .permissions_for(user)
            .await?
            .iter()
            .any(|p| p.grants(resource, action));
        debug!(user_id = %user.id, resource, action, granted, "Permission check");
        Ok(granted)
    }

    /// `Forbidden` unless the user holds `resource:action`.
    pub async fn require(&self, user: &User, resource: &str, action: &str) -> ReportFlowResult<()> {
        if self.user_has_permission(user, resource, action).await? {
            Ok(())
        } else {
            Err(ReportFlowError::Forbidden(format!(
                "missing permission {resource}:{action}"
            )))
        }
    }

    pub async fn role_with_permissions(
        &self,
        role_id: &str,
    ) -> ReportFlowResult<RoleWithPermissions> {
        let role = self
            .repos
            .roles
            .get(role_id)
            .await?
            .ok_or_else(|| ReportFlowError::not_found("role", role_id))?;
        let permissions = self.repos.roles.permissions_of(role_id).await?;
        Ok(RoleWithPermissions { role, permissions })
    }

    /// Delete a custom role. System roles are refused with `Conflict`.
    pub async fn delete_role(&self, role_id: &str) -> ReportFlowResult<Role> {
        let role = self
            .repos
            .roles
            .get(role_id)
            .await?
            .ok_or_else(|| ReportFlowError::not_found("role", role_id))?;
        if role.is_system {
            return Err(ReportFlowError::Conflict(format!(
                "system role '{}' cannot be deleted",
                role.name
            )));
        }
        self.repos.roles.delete(role_id).await?;
        info!(role_id = %role_id, role_name = %role.name, "Role deleted");
        Ok(role)
    }

    /// Replace a role's permission set. The `admin` system role must keep
    /// `*:*` so that administration stays reachable.
    pub async fn set_role_permissions(
        &self,
        role_id: &str,
        permission_ids: &[String],
    ) -> ReportFlowResult<Vec<Permission>> {
        if let Some(wildcard) = self.protected_wildcard(role_id).await? {
            if !permission_ids.contains(&wildcard.id) {
                return Err(admin_lockout());
            }
        }
        self.repos.roles.set_permissions(role_id, permission_ids).await?;
        self.repos.roles.permissions_of(role_id).await
    }

    /// Revoke one grant. Returns `false` when the role did not hold it.
    pub async fn revoke_role_permission(
        &self,
        role_id: &str,
        permission_id: &str,
    ) -> ReportFlowResult<bool> {
        if let Some(wildcard) = self.protected_wildcard(role_id).await? {
            if wildcard.id == permission_id {
                return Err(admin_lockout());
            }
        }
        self.repos.roles.revoke_permission(role_id, permission_id).await
    }

    /// Delete a permission and its grants. `*:*` is refused with `Conflict`.
    pub async fn delete_permission(&self, permission_id: &str) -> ReportFlowResult<bool> {
        let Some(permission) = self.repos.permissions.get(permission_id).await? else {
            return Ok(false);
        };
        let wildcard = Permission::WILDCARD;
        if permission.resource == wildcard && permission.action == wildcard {
            return Err(ReportFlowError::Conflict("the *:* permission cannot be deleted".into()));
        }
        self.repos.permissions.delete(permission_id).await
    }

    /// The `*:*` permission when `role_id` is the `admin` system role.
    async fn protected_wildcard(&self, role_id: &str) -> ReportFlowResult<Option<Permission>> {
        match self.repos.roles.get(role_id).await? {
            Some(role) if role.is_system && role.name == ADMIN_ROLE => {
                self.repos
                    .permissions
                    .find(Permission::WILDCARD, Permission::WILDCARD)
                    .await
            }
            _ => Ok(None),
        }
    }

    /// Create any missing catalogue permissions and system roles, and make
    /// sure each system role holds its default grants. Safe to run on every
    /// start.
    pub async fn seed_defaults(&self) -> ReportFlowResult<()> {
        let mut catalogue = Vec::with_capacity(PERMISSION_CATALOGUE.len());
        for (resource, action, description) in PERMISSION_CATALOGUE {
            let permission = match self.repos.permissions.find(resource, action).await? {
                Some(existing) => existing,
                None => {
                    self.repos
                        .permissions
                        .create(&CreatePermissionRequest {
                            resource: resource.to_string(),
                            action: action.to_string(),
                            description: description.to_string(),
                        })
                        .await?
                }
            };
            catalogue.push(permission);
        }

        for (name, description, grants) in SYSTEM_ROLES {
            let role = match self.repos.roles.find_by_name(name).await? {
                Some(existing) => existing,
                None => self.repos.roles.create(name, description, true).await?,
            };
            let wanted = catalogue
                .iter()
                .filter(|p| *name == ADMIN_ROLE || grants.contains(&p.key().as_str()));
            for permission in wanted {
                self.repos
                    .roles
                    .assign_permission(&role.id, &permission.id)
                    .await?;
            }
        }
        info!(
            permissions = catalogue.len(),
            roles = SYSTEM_ROLES.len(),
            "RBAC defaults seeded"
        );
        Ok(())
    }
}

fn admin_lockout() -> ReportFlowError {
    ReportFlowError::Conflict("the admin role must keep the *:* permission".into())
}
