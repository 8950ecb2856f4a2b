//! Signup, login, logout, and the current-user endpoint.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use reportflow_core::requests::{LoginRequest, RegisterRequest};
use reportflow_core::types::{Organization, User};
use reportflow_platform::AuditEntry;
use serde::Serialize;
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::extract::{client_ip, user_agent, CurrentUser};
use crate::state::AppState;

/// The signed-in user with their organization and effective permissions.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: User,
    pub organization: Option<Organization>,
    /// `resource:action` keys.
    pub permissions: Vec<String>,
}

async fn me_response(state: &AppState, user: User) -> ApiResult<MeResponse> {
    let organization = match &user.organization_id {
        Some(id) => state.repos.organizations.get(id).await?,
        None => None,
    };
    let permissions = state
        .rbac
        .permissions_for(&user)
        .await?
        .iter()
        .map(|p| p.key())
        .collect();
    Ok(MeResponse {
        user,
        organization,
        permissions,
    })
}

/// POST /api/v1/auth/register — Create an account.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Signup disabled", body = crate::error::ErrorResponse),
        (status = 409, description = "Email or organization already taken", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let registration = state.accounts.register(&req).await?;
    let user = registration.user;

    let mut entry = AuditEntry::new("auth.register", "user", user.id.clone())
        .actor(&user)
        .ip(client_ip(&headers));
    if let Some(org) = &registration.organization {
        entry = entry.details(json!({ "organization_id": org.id, "organization_slug": org.slug }));
    }
    state.audit.record(entry).await;

    metrics::counter!("api.auth.registrations").increment(1);
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/v1/auth/login — Exchange credentials for a session cookie.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; session cookie set", body = MeResponse),
        (status = 401, description = "Bad credentials or disabled account", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    let user = match state.accounts.authenticate(&req).await {
        Ok(user) => user,
        Err(err) => {
            metrics::counter!("api.auth.login_failures").increment(1);
            return Err(err.into());
        }
    };
    let ip = client_ip(&headers);
    let session = state.sessions.create(
        &user.id,
        user.organization_id.clone(),
        ip.clone(),
        user_agent(&headers),
    );
    state
        .audit
        .record(AuditEntry::new("auth.login", "user", user.id.clone()).actor(&user).ip(ip))
        .await;
    metrics::counter!("api.auth.logins").increment(1);
    info!(user_id = %user.id, "User logged in");

    let cookie = state.sessions.session_cookie(&session.token);
    let body = me_response(&state, user).await?;
    Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}

/// POST /api/v1/auth/logout — End the current session.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "Auth",
    responses(
        (status = 204, description = "Session ended; cookie cleared"),
        (status = 401, description = "Not logged in", body = crate::error::ErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    current: CurrentUser,
) -> Response {
    state.sessions.revoke(&current.session.token);
    state
        .audit
        .record(
            AuditEntry::new("auth.logout", "user", current.user.id.clone())
                .actor(&current.user)
                .ip(client_ip(&headers)),
        )
        .await;
    (
        StatusCode::NO_CONTENT,
        [(SET_COOKIE, state.sessions.clear_cookie())],
    )
        .into_response()
}

/// GET /api/v1/auth/me — The signed-in user.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Not logged in", body = crate::error::ErrorResponse)
    )
)]
pub async fn me(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<MeResponse>> {
    Ok(Json(me_response(&state, current.user).await?))
}
