//! HTTP mapping of the shared error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reportflow_core::ReportFlowError;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable code, e.g. `not_found`.
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError(pub ReportFlowError);

pub type ApiResult<T> = Result<T, ApiError>;

impl<E> From<E> for ApiError
where
    E: Into<ReportFlowError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ReportFlowError::Validation(_) => StatusCode::BAD_REQUEST,
            ReportFlowError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ReportFlowError::Forbidden(_) => StatusCode::FORBIDDEN,
            ReportFlowError::NotFound { .. } => StatusCode::NOT_FOUND,
            ReportFlowError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self.0, "Request failed");
            metrics::counter!("api.errors").increment(1);
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };
        let body = ErrorResponse {
            error: self.0.code().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
