//! `ApiError` — maps `SupervisorError::kind()` (and this crate's own
//! request-parsing failures) onto HTTP status codes (§7). Reconstructed from
//! route call-site usage the same way `msm_supervisor::error` was, since the
//! teacher's own `crates/server/src/error.rs` was not present in the
//! retrieved pack.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use msm_supervisor::{ErrorKind, SupervisorError};
use msm_utils::response::ApiResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Supervisor(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Resource => StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::Integrity => StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::Security => StatusCode::FORBIDDEN,
            },
            ApiError::Database(_) | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            // §7 places an unauthenticated mutation with keys configured under
            // Security refusals alongside path-traversal and elevated-principal
            // refusals, which this taxonomy maps to 403, not 401.
            ApiError::Forbidden => StatusCode::FORBIDDEN,
        };

        if !matches!(status, StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::warn!(error = %self, %status, "request failed");
        } else {
            tracing::error!(error = %self, "request failed");
        }

        (status, Json(ApiResponse::<()>::error(self.to_string()))).into_response()
    }
}
