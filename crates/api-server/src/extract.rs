//! Request extractors for the session cookie and admin gate.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, USER_AGENT};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use reportflow_core::types::User;
use reportflow_core::ReportFlowError;
use reportflow_platform::Session;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller. Rejects with 401 when the cookie is missing,
/// unknown, expired, or belongs to a user who no longer exists or is disabled.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session: Session,
}

impl CurrentUser {
    /// The caller's organization, or 404 when they belong to none.
    pub fn organization_id(&self) -> Result<&str, ApiError> {
        self.user
            .organization_id
            .as_deref()
            .ok_or_else(|| ReportFlowError::not_found("organization", "none").into())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let unauthorized = || ApiError(ReportFlowError::Unauthorized("login required".into()));

        let token = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|header| state.sessions.token_from_header(header))
            .ok_or_else(unauthorized)?;
        let session = state.sessions.validate(&token).ok_or_else(unauthorized)?;

        let user = match state.repos.users.get(&session.user_id).await? {
            Some(user) if user.is_active() => user,
            _ => {
                state.sessions.revoke(&token);
                return Err(unauthorized());
            }
        };
        Ok(Self { user, session })
    }
}

/// A caller holding `admin:access`. 401 without a session, 403 without
/// the permission.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        state.rbac.require(&current.user, "admin", "access").await?;
        Ok(Self(current))
    }
}

/// Best-effort client address from proxy headers.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        assert!(client_ip(&headers).is_none());
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.2"));
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }
}
