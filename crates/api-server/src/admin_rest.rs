//! Administration console endpoints. Every route requires `admin:access`
//! and every mutation is written to the audit log.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use reportflow_core::requests::*;
use reportflow_core::types::*;
use reportflow_core::ReportFlowError;
use reportflow_platform::AuditEntry;
use serde::Serialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::extract::{client_ip, AdminUser};
use crate::state::AppState;

async fn audit(
    state: &AppState,
    admin: &AdminUser,
    headers: &HeaderMap,
    action: &str,
    resource_type: &str,
    resource_id: &str,
    details: Value,
) {
    let entry = AuditEntry::new(action, resource_type, resource_id).details(details);
    record(state, admin, headers, entry).await;
}

/// Attribute `entry` to the calling admin. An organization already set on
/// the entry takes precedence over the admin's own.
async fn record(state: &AppState, admin: &AdminUser, headers: &HeaderMap, entry: AuditEntry) {
    state
        .audit
        .record(entry.actor(&admin.0.user).ip(client_ip(headers)))
        .await;
}

// ─── Stats ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminStats {
    pub organizations: i64,
    pub users: i64,
    pub roles: i64,
    pub permissions: i64,
    pub reports: i64,
    pub subscriptions: i64,
    pub audit_logs: i64,
    pub active_sessions: usize,
}

/// GET /api/admin/stats — Entity counts.
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    tag = "Admin",
    responses(
        (status = 200, description = "Entity counts", body = AdminStats),
        (status = 401, description = "Not logged in", body = crate::error::ErrorResponse),
        (status = 403, description = "Missing admin:access", body = crate::error::ErrorResponse)
    )
)]
pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<AdminStats>> {
    let repos = &state.repos;
    Ok(Json(AdminStats {
        organizations: repos.organizations.count().await?,
        users: repos.users.count().await?,
        roles: repos.roles.count().await?,
        permissions: repos.permissions.count().await?,
        reports: repos.reports.count().await?,
        subscriptions: repos.subscriptions.count().await?,
        audit_logs: repos.audit_logs.count().await?,
        active_sessions: state.sessions.active_count(),
    }))
}

// ─── Organizations ─────────────────────────────────────────────────────────

/// GET /api/admin/organizations
#[utoipa::path(
    get,
    path = "/api/admin/organizations",
    tag = "Admin",
    params(
        ("limit" = Option<i64>, Query, description = "Page size (default 50, max 200)"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses((status = 200, description = "Organizations", body = [Organization]))
)]
pub async fn list_organizations(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Organization>>> {
    Ok(Json(state.repos.organizations.list(page).await?))
}

/// POST /api/admin/organizations
#[utoipa::path(
    post,
    path = "/api/admin/organizations",
    tag = "Admin",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 201, description = "Organization created", body = Organization),
        (status = 409, description = "Slug already taken", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Json(req): Json<CreateOrganizationRequest>,
) -> ApiResult<(StatusCode, Json<Organization>)> {
    req.validate()?;
    let org = state.repos.organizations.create(&req).await?;
    let entry = AuditEntry::new("organization.create", "organization", &org.id)
        .organization(Some(org.id.as_str()))
        .details(json!({ "slug": org.slug, "plan": org.plan }));
    record(&state, &admin, &headers, entry).await;
    metrics::counter!("admin.organizations.created").increment(1);
    Ok((StatusCode::CREATED, Json(org)))
}

/// GET /api/admin/organizations/:id
#[utoipa::path(
    get,
    path = "/api/admin/organizations/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Organization id")),
    responses(
        (status = 200, description = "Organization", body = Organization),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_organization(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Organization>> {
    let org = state
        .repos
        .organizations
        .get(&id)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("organization", id))?;
    Ok(Json(org))
}

/// PUT /api/admin/organizations/:id
#[utoipa::path(
    put,
    path = "/api/admin/organizations/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Organization id")),
    request_body = UpdateOrganizationRequest,
    responses(
        (status = 200, description = "Updated organization", body = Organization),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Slug already taken", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrganizationRequest>,
) -> ApiResult<Json<Organization>> {
    req.validate()?;
    let org = state
        .repos
        .organizations
        .update(&id, &req)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("organization", id.clone()))?;
    let entry = AuditEntry::new("organization.update", "organization", &id)
        .organization(Some(org.id.as_str()))
        .details(json!({ "slug": org.slug, "plan": org.plan, "status": org.status }));
    record(&state, &admin, &headers, entry).await;
    Ok(Json(org))
}

/// DELETE /api/admin/organizations/:id — Refused while users belong to it.
#[utoipa::path(
    delete,
    path = "/api/admin/organizations/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Organization id")),
    responses(
        (status = 204, description = "Organization deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Organization still has users", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !state.repos.organizations.delete(&id).await? {
        return Err(ReportFlowError::not_found("organization", id).into());
    }
    let entry =
        AuditEntry::new("organization.delete", "organization", &id).organization(Some(id.as_str()));
    record(&state, &admin, &headers, entry).await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/organizations/:id/users
#[utoipa::path(
    get,
    path = "/api/admin/organizations/{id}/users",
    tag = "Admin",
    params(
        ("id" = String, Path, description = "Organization id"),
        ("limit" = Option<i64>, Query, description = "Page size (default 50, max 200)"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses(
        (status = 200, description = "Members", body = [User]),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_organization_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<User>>> {
    if state.repos.organizations.get(&id).await?.is_none() {
        return Err(ReportFlowError::not_found("organization", id).into());
    }
    Ok(Json(state.repos.users.list_by_organization(&id, page).await?))
}

// ─── Users ─────────────────────────────────────────────────────────────────

/// GET /api/admin/users
#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "Admin",
    params(
        ("limit" = Option<i64>, Query, description = "Page size (default 50, max 200)"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses((status = 200, description = "Users", body = [User]))
)]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.repos.users.list(page).await?))
}

/// POST /api/admin/users
#[utoipa::path(
    post,
    path = "/api/admin/users",
    tag = "Admin",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Email taken or unknown organization/role", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.accounts.create_user(&req).await?;
    let entry = AuditEntry::new("user.create", "user", &user.id)
        .organization(user.organization_id.as_deref())
        .details(json!({
            "email": user.email,
            "organization_id": user.organization_id,
            "role_id": user.role_id,
        }));
    record(&state, &admin, &headers, entry).await;
    metrics::counter!("admin.users.created").increment(1);
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/admin/users/:id
#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    let user = state
        .repos
        .users
        .get(&id)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("user", id))?;
    Ok(Json(user))
}

/// PUT /api/admin/users/:id — Disabling a user ends their sessions. A
/// `null` organization or role detaches it. Admins cannot disable
/// themselves or change their own role.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Email taken, unknown reference, or self-lockout", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    let caller = &admin.0.user;
    if id == caller.id {
        if req.status == Some(UserStatus::Disabled) {
            let msg = "you cannot disable your own account";
            return Err(ReportFlowError::Conflict(msg.into()).into());
        }
        if req.role_id.as_ref().is_some_and(|r| *r != caller.role_id) {
            return Err(ReportFlowError::Conflict("you cannot change your own role".into()).into());
        }
    }
    let before = state
        .repos
        .users
        .get(&id)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("user", id.clone()))?;
    let user = state.accounts.update_user(&id, &req).await?;
    if !user.is_active() || req.password.is_some() {
        state.sessions.revoke_user(&user.id);
    }
    let changed: Vec<&str> = [
        ("email", req.email.is_some()),
        ("name", req.name.is_some()),
        ("password", req.password.is_some()),
        ("organization_id", req.organization_id.is_some()),
        ("role_id", req.role_id.is_some()),
        ("status", req.status.is_some()),
    ]
    .into_iter()
    .filter_map(|(field, set)| set.then_some(field))
    .collect();
    // A user moved out of an organization is still logged against it.
    let organization = before.organization_id.as_deref().or(user.organization_id.as_deref());
    let entry = AuditEntry::new("user.update", "user", &id)
        .organization(organization)
        .details(json!({ "fields": changed }));
    record(&state, &admin, &headers, entry).await;
    Ok(Json(user))
}

/// DELETE /api/admin/users/:id
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Cannot delete yourself", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if id == admin.0.user.id {
        return Err(ReportFlowError::Conflict("you cannot delete your own account".into()).into());
    }
    let target = state
        .repos
        .users
        .get(&id)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("user", id.clone()))?;
    if !state.repos.users.delete(&id).await? {
        return Err(ReportFlowError::not_found("user", id).into());
    }
    state.sessions.revoke_user(&id);
    let entry = AuditEntry::new("user.delete", "user", &id)
        .organization(target.organization_id.as_deref())
        .details(json!({ "email": target.email }));
    record(&state, &admin, &headers, entry).await;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Roles ─────────────────────────────────────────────────────────────────

/// GET /api/admin/roles
#[utoipa::path(
    get,
    path = "/api/admin/roles",
    tag = "Admin",
    params(
        ("limit" = Option<i64>, Query, description = "Page size (default 50, max 200)"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses((status = 200, description = "Roles", body = [Role]))
)]
pub async fn list_roles(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Role>>> {
    Ok(Json(state.repos.roles.list(page).await?))
}

/// POST /api/admin/roles — Create a custom role, optionally with permissions.
#[utoipa::path(
    post,
    path = "/api/admin/roles",
    tag = "Admin",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = RoleWithPermissions),
        (status = 409, description = "Name taken or unknown permission", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Json(req): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleWithPermissions>)> {
    req.validate()?;
    let role = state
        .repos
        .roles
        .create(req.name.trim(), &req.description, false)
        .await?;
    if !req.permission_ids.is_empty() {
        if let Err(err) = state.repos.roles.set_permissions(&role.id, &req.permission_ids).await {
            state.repos.roles.delete(&role.id).await?;
            return Err(err.into());
        }
    }
    audit(
        &state,
        &admin,
        &headers,
        "role.create",
        "role",
        &role.id,
        json!({ "name": role.name, "permission_ids": req.permission_ids }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(state.rbac.role_with_permissions(&role.id).await?)))
}

/// GET /api/admin/roles/:id — Role with its permissions.
#[utoipa::path(
    get,
    path = "/api/admin/roles/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role", body = RoleWithPermissions),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_role(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<RoleWithPermissions>> {
    Ok(Json(state.rbac.role_with_permissions(&id).await?))
}

/// PUT /api/admin/roles/:id — System roles keep their name.
#[utoipa::path(
    put,
    path = "/api/admin/roles/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Role id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated role", body = Role),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Name taken or system role rename", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<Role>> {
    req.validate()?;
    let existing = state
        .repos
        .roles
        .get(&id)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("role", id.clone()))?;
    if existing.is_system && req.name.as_deref().is_some_and(|n| n.trim() != existing.name) {
        return Err(ReportFlowError::Conflict(format!(
            "system role '{}' cannot be renamed",
            existing.name
        ))
        .into());
    }
    let role = state
        .repos
        .roles
        .update(&id, &req)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("role", id.clone()))?;
    audit(&state, &admin, &headers, "role.update", "role", &id, json!({ "name": role.name })).await;
    Ok(Json(role))
}

/// DELETE /api/admin/roles/:id — System roles cannot be deleted.
#[utoipa::path(
    delete,
    path = "/api/admin/roles/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "System role", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let role = state.rbac.delete_role(&id).await?;
    audit(&state, &admin, &headers, "role.delete", "role", &id, json!({ "name": role.name })).await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/roles/:id/permissions
#[utoipa::path(
    get,
    path = "/api/admin/roles/{id}/permissions",
    tag = "Admin",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 200, description = "Permissions held by the role", body = [Permission]),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_role_permissions(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Permission>>> {
    Ok(Json(state.rbac.role_with_permissions(&id).await?.permissions))
}

/// PUT /api/admin/roles/:id/permissions — Replace the whole set.
#[utoipa::path(
    put,
    path = "/api/admin/roles/{id}/permissions",
    tag = "Admin",
    params(("id" = String, Path, description = "Role id")),
    request_body = SetRolePermissionsRequest,
    responses(
        (status = 200, description = "New permission set", body = [Permission]),
        (status = 404, description = "Role not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Unknown permission id, or admin role losing *:*", body = crate::error::ErrorResponse)
    )
)]
pub async fn set_role_permissions(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<SetRolePermissionsRequest>,
) -> ApiResult<Json<Vec<Permission>>> {
    let permissions = state.rbac.set_role_permissions(&id, &req.permission_ids).await?;
    audit(
        &state,
        &admin,
        &headers,
        "role.permissions.set",
        "role",
        &id,
        json!({ "permission_ids": req.permission_ids }),
    )
    .await;
    Ok(Json(permissions))
}

/// POST /api/admin/roles/:id/permissions/:permission_id — Grant one permission.
#[utoipa::path(
    post,
    path = "/api/admin/roles/{id}/permissions/{permission_id}",
    tag = "Admin",
    params(
        ("id" = String, Path, description = "Role id"),
        ("permission_id" = String, Path, description = "Permission id")
    ),
    responses(
        (status = 200, description = "Role with its permissions", body = RoleWithPermissions),
        (status = 404, description = "Role or permission not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn assign_role_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Path((id, permission_id)): Path<(String, String)>,
) -> ApiResult<Json<RoleWithPermissions>> {
    if state.repos.roles.get(&id).await?.is_none() {
        return Err(ReportFlowError::not_found("role", id).into());
    }
    if state.repos.permissions.get(&permission_id).await?.is_none() {
        return Err(ReportFlowError::not_found("permission", permission_id).into());
    }
    if state.repos.roles.assign_permission(&id, &permission_id).await? {
        audit(
            &state,
            &admin,
            &headers,
            "role.permission.assign",
            "role",
            &id,
            json!({ "permission_id": permission_id }),
        )
        .await;
    }
    Ok(Json(state.rbac.role_with_permissions(&id).await?))
}

/// DELETE /api/admin/roles/:id/permissions/:permission_id — Revoke one permission.
#[utoipa::path(
    delete,
    path = "/api/admin/roles/{id}/permissions/{permission_id}",
    tag = "Admin",
    params(
        ("id" = String, Path, description = "Role id"),
        ("permission_id" = String, Path, description = "Permission id")
    ),
    responses(
        (status = 204, description = "Permission revoked"),
        (status = 404, description = "Role does not hold the permission", body = crate::error::ErrorResponse),
        (status = 409, description = "Admin role losing *:*", body = crate::error::ErrorResponse)
    )
)]
pub async fn revoke_role_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Path((id, permission_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    if !state.rbac.revoke_role_permission(&id, &permission_id).await? {
        let key = format!("{id}/{permission_id}");
        return Err(ReportFlowError::not_found("role permission", key).into());
    }
    audit(
        &state,
        &admin,
        &headers,
        "role.permission.revoke",
        "role",
        &id,
        json!({ "permission_id": permission_id }),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Permissions ───────────────────────────────────────────────────────────

/// GET /api/admin/permissions
#[utoipa::path(
    get,
    path = "/api/admin/permissions",
    tag = "Admin",
    params(
        ("limit" = Option<i64>, Query, description = "Page size (default 50, max 200)"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses((status = 200, description = "Permissions", body = [Permission]))
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Permission>>> {
    Ok(Json(state.repos.permissions.list(page).await?))
}

/// POST /api/admin/permissions
#[utoipa::path(
    post,
    path = "/api/admin/permissions",
    tag = "Admin",
    request_body = CreatePermissionRequest,
    responses(
        (status = 201, description = "Permission created", body = Permission),
        (status = 409, description = "Resource/action pair exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Json(req): Json<CreatePermissionRequest>,
) -> ApiResult<(StatusCode, Json<Permission>)> {
    req.validate()?;
    let permission = state.repos.permissions.create(&req).await?;
    audit(
        &state,
        &admin,
        &headers,
        "permission.create",
        "permission",
        &permission.id,
        json!({ "key": permission.key() }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(permission)))
}

/// GET /api/admin/permissions/:id
#[utoipa::path(
    get,
    path = "/api/admin/permissions/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Permission id")),
    responses(
        (status = 200, description = "Permission", body = Permission),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_permission(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Permission>> {
    let permission = state
        .repos
        .permissions
        .get(&id)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("permission", id))?;
    Ok(Json(permission))
}

/// PUT /api/admin/permissions/:id — Only the description is mutable.
#[utoipa::path(
    put,
    path = "/api/admin/permissions/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Permission id")),
    request_body = UpdatePermissionRequest,
    responses(
        (status = 200, description = "Updated permission", body = Permission),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdatePermissionRequest>,
) -> ApiResult<Json<Permission>> {
    let permission = state
        .repos
        .permissions
        .update_description(&id, &req.description)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("permission", id.clone()))?;
    audit(&state, &admin, &headers, "permission.update", "permission", &id, json!({})).await;
    Ok(Json(permission))
}

/// DELETE /api/admin/permissions/:id — Also removes it from every role.
/// `*:*` cannot be deleted.
#[utoipa::path(
    delete,
    path = "/api/admin/permissions/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Permission id")),
    responses(
        (status = 204, description = "Permission deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Wildcard permission", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !state.rbac.delete_permission(&id).await? {
        return Err(ReportFlowError::not_found("permission", id).into());
    }
    audit(&state, &admin, &headers, "permission.delete", "permission", &id, json!({})).await;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Subscriptions ─────────────────────────────────────────────────────────

/// GET /api/admin/subscriptions
#[utoipa::path(
    get,
    path = "/api/admin/subscriptions",
    tag = "Admin",
    params(
        ("limit" = Option<i64>, Query, description = "Page size (default 50, max 200)"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses((status = 200, description = "Subscriptions", body = [Subscription]))
)]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Subscription>>> {
    Ok(Json(state.repos.subscriptions.list(page).await?))
}

/// POST /api/admin/subscriptions
#[utoipa::path(
    post,
    path = "/api/admin/subscriptions",
    tag = "Admin",
    request_body = CreateSubscriptionRequest,
    responses(
        (status = 201, description = "Subscription created", body = Subscription),
        (status = 409, description = "Unknown organization", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Json(req): Json<CreateSubscriptionRequest>,
) -> ApiResult<(StatusCode, Json<Subscription>)> {
    req.validate()?;
    let subscription = state.repos.subscriptions.create(&req).await?;
    let entry = AuditEntry::new("subscription.create", "subscription", &subscription.id)
        .organization(Some(subscription.organization_id.as_str()))
        .details(json!({ "plan": subscription.plan }));
    record(&state, &admin, &headers, entry).await;
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// GET /api/admin/subscriptions/:id
#[utoipa::path(
    get,
    path = "/api/admin/subscriptions/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Subscription", body = Subscription),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_subscription(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Subscription>> {
    let subscription = state
        .repos
        .subscriptions
        .get(&id)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("subscription", id))?;
    Ok(Json(subscription))
}

/// PUT /api/admin/subscriptions/:id
#[utoipa::path(
    put,
    path = "/api/admin/subscriptions/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Subscription id")),
    request_body = UpdateSubscriptionRequest,
    responses(
        (status = 200, description = "Updated subscription", body = Subscription),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateSubscriptionRequest>,
) -> ApiResult<Json<Subscription>> {
    req.validate()?;
    let subscription = state
        .repos
        .subscriptions
        .update(&id, &req)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("subscription", id.clone()))?;
    let entry = AuditEntry::new("subscription.update", "subscription", &id)
        .organization(Some(subscription.organization_id.as_str()))
        .details(json!({
            "plan": subscription.plan,
            "status": subscription.status,
            "seats": subscription.seats,
        }));
    record(&state, &admin, &headers, entry).await;
    Ok(Json(subscription))
}

/// DELETE /api/admin/subscriptions/:id
#[utoipa::path(
    delete,
    path = "/api/admin/subscriptions/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Subscription id")),
    responses(
        (status = 204, description = "Subscription deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let subscription = state
        .repos
        .subscriptions
        .get(&id)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("subscription", id.clone()))?;
    if !state.repos.subscriptions.delete(&id).await? {
        return Err(ReportFlowError::not_found("subscription", id).into());
    }
    let entry = AuditEntry::new("subscription.delete", "subscription", &id)
        .organization(Some(subscription.organization_id.as_str()));
    record(&state, &admin, &headers, entry).await;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Settings ──────────────────────────────────────────────────────────────

/// GET /api/admin/settings
#[utoipa::path(
    get,
    path = "/api/admin/settings",
    tag = "Admin",
    responses((status = 200, description = "All settings", body = [Setting]))
)]
pub async fn list_settings(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<Setting>>> {
    Ok(Json(state.repos.settings.list().await?))
}

/// GET /api/admin/settings/:key
#[utoipa::path(
    get,
    path = "/api/admin/settings/{key}",
    tag = "Admin",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 200, description = "Setting", body = Setting),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_setting(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(key): Path<String>,
) -> ApiResult<Json<Setting>> {
    let setting = state
        .repos
        .settings
        .get(&key)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("setting", key))?;
    Ok(Json(setting))
}

/// PUT /api/admin/settings/:key — Create or overwrite.
#[utoipa::path(
    put,
    path = "/api/admin/settings/{key}",
    tag = "Admin",
    params(("key" = String, Path, description = "Setting key")),
    request_body = PutSettingRequest,
    responses(
        (status = 200, description = "Stored setting", body = Setting),
        (status = 400, description = "Invalid key or value", body = crate::error::ErrorResponse)
    )
)]
pub async fn put_setting(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Path(key): Path<String>,
    Json(req): Json<PutSettingRequest>,
) -> ApiResult<Json<Setting>> {
    validate_setting_key(&key)?;
    req.validate()?;
    let setting = state
        .repos
        .settings
        .upsert(&key, &req.value, req.description.as_deref())
        .await?;
    audit(
        &state,
        &admin,
        &headers,
        "setting.update",
        "setting",
        &key,
        json!({ "value": setting.value }),
    )
    .await;
    Ok(Json(setting))
}

/// DELETE /api/admin/settings/:key
#[utoipa::path(
    delete,
    path = "/api/admin/settings/{key}",
    tag = "Admin",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 204, description = "Setting deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_setting(
    State(state): State<AppState>,
    headers: HeaderMap,
    admin: AdminUser,
    Path(key): Path<String>,
) -> ApiResult<StatusCode> {
    if !state.repos.settings.delete(&key).await? {
        return Err(ReportFlowError::not_found("setting", key).into());
    }
    audit(&state, &admin, &headers, "setting.delete", "setting", &key, json!({})).await;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Audit log ─────────────────────────────────────────────────────────────

/// GET /api/admin/audit-logs — Newest first, filterable.
#[utoipa::path(
    get,
    path = "/api/admin/audit-logs",
    tag = "Admin",
    params(
        ("organization_id" = Option<String>, Query, description = "Only this organization"),
        ("user_id" = Option<String>, Query, description = "Only this actor"),
        ("resource_type" = Option<String>, Query, description = "e.g. report, user"),
        ("action" = Option<String>, Query, description = "e.g. auth.login"),
        ("limit" = Option<i64>, Query, description = "Page size (default 50, max 200)"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses((status = 200, description = "Audit entries", body = [AuditLog]))
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditLog>>> {
    Ok(Json(state.repos.audit_logs.query(&filter).await?))
}
