//! Organization-scoped endpoints for signed-in users. Every query is
//! filtered by the caller's own organization.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use reportflow_core::requests::{CreateReportRequest, UpdateReportRequest};
use reportflow_core::types::{Organization, Page, Report, ReportStatus, Subscription, User};
use reportflow_core::ReportFlowError;
use reportflow_platform::AuditEntry;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::extract::{client_ip, CurrentUser};
use crate::state::AppState;

const RECENT_REPORTS: i64 = 5;

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusCount {
    pub status: ReportStatus,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub organization: Organization,
    pub subscription: Option<Subscription>,
    pub member_count: i64,
    pub reports_by_status: Vec<StatusCount>,
    pub recent_reports: Vec<Report>,
}

async fn load_organization(state: &AppState, current: &CurrentUser) -> ApiResult<Organization> {
    let org_id = current.organization_id()?;
    state
        .repos
        .organizations
        .get(org_id)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("organization", org_id).into())
}

/// GET /api/v1/dashboard — Organization overview.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    tag = "Tenant",
    responses(
        (status = 200, description = "Dashboard summary", body = DashboardResponse),
        (status = 401, description = "Not logged in", body = crate::error::ErrorResponse),
        (status = 404, description = "Caller has no organization", body = crate::error::ErrorResponse)
    )
)]
pub async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<DashboardResponse>> {
    state.rbac.require(&current.user, "organization", "read").await?;
    let organization = load_organization(&state, &current).await?;
    let subscription = state
        .repos
        .subscriptions
        .current_for_organization(&organization.id)
        .await?;
    let member_count = state
        .repos
        .users
        .count_by_organization(&organization.id)
        .await?;

    let can_read_reports = state
        .rbac
        .user_has_permission(&current.user, "reports", "read")
        .await?;
    let reports_by_status = if can_read_reports {
        state
            .repos
            .reports
            .count_by_status(&organization.id)
            .await?
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect()
    } else {
        Vec::new()
    };
    let recent_reports = if reports_by_status.is_empty() {
        Vec::new()
    } else {
        state
            .repos
            .reports
            .list_for_organization(&organization.id, Page::new(RECENT_REPORTS, 0))
            .await?
    };

    Ok(Json(DashboardResponse {
        organization,
        subscription,
        member_count,
        reports_by_status,
        recent_reports,
    }))
}

/// GET /api/v1/organization — The caller's organization.
#[utoipa::path(
    get,
    path = "/api/v1/organization",
    tag = "Tenant",
    responses(
        (status = 200, description = "Organization", body = Organization),
        (status = 404, description = "Caller has no organization", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_organization(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Organization>> {
    state.rbac.require(&current.user, "organization", "read").await?;
    Ok(Json(load_organization(&state, &current).await?))
}

/// GET /api/v1/organization/members — Users in the caller's organization.
#[utoipa::path(
    get,
    path = "/api/v1/organization/members",
    tag = "Tenant",
    params(
        ("limit" = Option<i64>, Query, description = "Page size (default 50, max 200)"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses(
        (status = 200, description = "Members", body = [User]),
        (status = 404, description = "Caller has no organization", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_members(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<User>>> {
    state.rbac.require(&current.user, "organization", "read").await?;
    let org_id = current.organization_id()?;
    Ok(Json(state.repos.users.list_by_organization(org_id, page).await?))
}

/// GET /api/v1/subscription — The organization's current subscription.
#[utoipa::path(
    get,
    path = "/api/v1/subscription",
    tag = "Tenant",
    responses(
        (status = 200, description = "Current subscription", body = Subscription),
        (status = 404, description = "No organization or no subscription", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_subscription(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Subscription>> {
    state.rbac.require(&current.user, "organization", "read").await?;
    let org_id = current.organization_id()?;
    let subscription = state
        .repos
        .subscriptions
        .current_for_organization(org_id)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("subscription", org_id))?;
    Ok(Json(subscription))
}

// ─── Reports ───────────────────────────────────────────────────────────────

/// GET /api/v1/reports — Reports of the caller's organization, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/reports",
    tag = "Reports",
    params(
        ("limit" = Option<i64>, Query, description = "Page size (default 50, max 200)"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses(
        (status = 200, description = "Reports", body = [Report]),
        (status = 403, description = "Missing reports:read", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_reports(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Report>>> {
    state.rbac.require(&current.user, "reports", "read").await?;
    let org_id = current.organization_id()?;
    Ok(Json(state.repos.reports.list_for_organization(org_id, page).await?))
}

/// POST /api/v1/reports — Create a report.
#[utoipa::path(
    post,
    path = "/api/v1/reports",
    tag = "Reports",
    request_body = CreateReportRequest,
    responses(
        (status = 201, description = "Report created", body = Report),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Missing reports:write", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    current: CurrentUser,
    Json(req): Json<CreateReportRequest>,
) -> ApiResult<(StatusCode, Json<Report>)> {
    state.rbac.require(&current.user, "reports", "write").await?;
    let org_id = current.organization_id()?;
    req.validate()?;
    let report = state
        .repos
        .reports
        .create(org_id, Some(&current.user.id), &req)
        .await?;
    state
        .audit
        .record(
            AuditEntry::new("report.create", "report", report.id.clone())
                .actor(&current.user)
                .details(json!({ "title": report.title }))
                .ip(client_ip(&headers)),
        )
        .await;
    metrics::counter!("api.reports.created").increment(1);
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/v1/reports/:id — One report.
#[utoipa::path(
    get,
    path = "/api/v1/reports/{id}",
    tag = "Reports",
    params(("id" = String, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report", body = Report),
        (status = 404, description = "No such report in the caller's organization", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_report(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Report>> {
    state.rbac.require(&current.user, "reports", "read").await?;
    let org_id = current.organization_id()?;
    let report = state
        .repos
        .reports
        .get_for_organization(org_id, &id)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("report", id))?;
    Ok(Json(report))
}

/// PUT /api/v1/reports/:id — Partial update.
#[utoipa::path(
    put,
    path = "/api/v1/reports/{id}",
    tag = "Reports",
    params(("id" = String, Path, description = "Report id")),
    request_body = UpdateReportRequest,
    responses(
        (status = 200, description = "Updated report", body = Report),
        (status = 404, description = "No such report in the caller's organization", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateReportRequest>,
) -> ApiResult<Json<Report>> {
    state.rbac.require(&current.user, "reports", "write").await?;
    let org_id = current.organization_id()?;
    req.validate()?;
    let report = state
        .repos
        .reports
        .update(org_id, &id, &req)
        .await?
        .ok_or_else(|| ReportFlowError::not_found("report", id.clone()))?;
    state
        .audit
        .record(
            AuditEntry::new("report.update", "report", id)
                .actor(&current.user)
                .ip(client_ip(&headers)),
        )
        .await;
    Ok(Json(report))
}

/// DELETE /api/v1/reports/:id
#[utoipa::path(
    delete,
    path = "/api/v1/reports/{id}",
    tag = "Reports",
    params(("id" = String, Path, description = "Report id")),
    responses(
        (status = 204, description = "Report deleted"),
        (status = 404, description = "No such report in the caller's organization", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.rbac.require(&current.user, "reports", "write").await?;
    let org_id = current.organization_id()?;
    if !state.repos.reports.delete(org_id, &id).await? {
        return Err(ReportFlowError::not_found("report", id).into());
    }
    state
        .audit
        .record(
            AuditEntry::new("report.delete", "report", id)
                .actor(&current.user)
                .ip(client_ip(&headers)),
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}
