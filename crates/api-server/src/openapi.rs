//! OpenAPI document for the REST surface, served as JSON.

use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ReportFlow API",
        version = "0.1.0",
        description = "Multi-tenant reporting console.\n\nCookie-session authentication, organization-scoped reports, and an RBAC-guarded administration API.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Operations", description = "Health, readiness, and liveness probes"),
        (name = "Auth", description = "Signup, login, logout, current user"),
        (name = "Tenant", description = "The caller's organization, members, and subscription"),
        (name = "Reports", description = "Organization-scoped reports"),
        (name = "Admin", description = "Platform administration, requires admin:access"),
    ),
    paths(
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
        // Auth
        crate::auth_rest::register,
        crate::auth_rest::login,
        crate::auth_rest::logout,
        crate::auth_rest::me,
        // Tenant
        crate::tenant_rest::dashboard,
        crate::tenant_rest::get_organization,
        crate::tenant_rest::list_members,
        crate::tenant_rest::get_subscription,
        crate::tenant_rest::list_reports,
        crate::tenant_rest::create_report,
        crate::tenant_rest::get_report,
        crate::tenant_rest::update_report,
        crate::tenant_rest::delete_report,
        // Admin
        crate::admin_rest::stats,
        crate::admin_rest::list_organizations,
        crate::admin_rest::create_organization,
        crate::admin_rest::get_organization,
        crate::admin_rest::update_organization,
        crate::admin_rest::delete_organization,
        crate::admin_rest::list_organization_users,
        crate::admin_rest::list_users,
        crate::admin_rest::create_user,
        crate::admin_rest::get_user,
        crate::admin_rest::update_user,
        crate::admin_rest::delete_user,
        crate::admin_rest::list_roles,
        crate::admin_rest::create_role,
        crate::admin_rest::get_role,
        crate::admin_rest::update_role,
        crate::admin_rest::delete_role,
        crate::admin_rest::list_role_permissions,
        crate::admin_rest::set_role_permissions,
        crate::admin_rest::assign_role_permission,
        crate::admin_rest::revoke_role_permission,
        crate::admin_rest::list_permissions,
        crate::admin_rest::create_permission,
        crate::admin_rest::get_permission,
        crate::admin_rest::update_permission,
        crate::admin_rest::delete_permission,
        crate::admin_rest::list_subscriptions,
        crate::admin_rest::create_subscription,
        crate::admin_rest::get_subscription,
        crate::admin_rest::update_subscription,
        crate::admin_rest::delete_subscription,
        crate::admin_rest::list_settings,
        crate::admin_rest::get_setting,
        crate::admin_rest::put_setting,
        crate::admin_rest::delete_setting,
        crate::admin_rest::list_audit_logs,
    ),
    components(schemas(
        // Entities
        reportflow_core::types::Plan,
        reportflow_core::types::OrganizationStatus,
        reportflow_core::types::UserStatus,
        reportflow_core::types::ReportStatus,
        reportflow_core::types::SubscriptionStatus,
        reportflow_core::types::Organization,
        reportflow_core::types::User,
        reportflow_core::types::Role,
        reportflow_core::types::Permission,
        reportflow_core::types::RoleWithPermissions,
        reportflow_core::types::Report,
        reportflow_core::types::Subscription,
        reportflow_core::types::Setting,
        reportflow_core::types::AuditLog,
        // Requests
        reportflow_core::requests::RegisterRequest,
        reportflow_core::requests::LoginRequest,
        reportflow_core::requests::CreateOrganizationRequest,
        reportflow_core::requests::UpdateOrganizationRequest,
        reportflow_core::requests::CreateUserRequest,
        reportflow_core::requests::UpdateUserRequest,
        reportflow_core::requests::CreateRoleRequest,
        reportflow_core::requests::UpdateRoleRequest,
        reportflow_core::requests::SetRolePermissionsRequest,
        reportflow_core::requests::CreatePermissionRequest,
        reportflow_core::requests::UpdatePermissionRequest,
        reportflow_core::requests::CreateReportRequest,
        reportflow_core::requests::UpdateReportRequest,
        reportflow_core::requests::CreateSubscriptionRequest,
        reportflow_core::requests::UpdateSubscriptionRequest,
        reportflow_core::requests::PutSettingRequest,
        // Responses
        crate::error::ErrorResponse,
        crate::rest::HealthResponse,
        crate::auth_rest::MeResponse,
        crate::tenant_rest::StatusCount,
        crate::tenant_rest::DashboardResponse,
        crate::admin_rest::AdminStats,
    ))
)]
pub struct ApiDoc;

/// GET /api-docs/openapi.json
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_surface() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/health"));
        assert!(paths.contains_key("/api/v1/auth/login"));
        assert!(paths.contains_key("/api/v1/reports/{id}"));
        assert!(paths.contains_key("/api/admin/roles/{id}/permissions/{permission_id}"));
        assert!(paths.contains_key("/api/admin/audit-logs"));
    }
}
