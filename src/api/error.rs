//! HTTP mapping for [`AuthError`].
//!
//! Every failure becomes `(status, {"kind", "message"})`. Upstream failures are
//! logged with their cause and reported with a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::auth::AuthError;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    /// Stable, machine-readable failure kind.
    pub kind: String,
    pub message: String,
}

#[must_use]
pub fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::Validation(_) | AuthError::SamePassword => StatusCode::BAD_REQUEST,
        AuthError::Conflict(_) => StatusCode::CONFLICT,
        AuthError::NotFound(_) => StatusCode::NOT_FOUND,
        AuthError::BadCredentials
        | AuthError::Unauthorized(_)
        | AuthError::InvalidRefreshToken
        | AuthError::ExpiredOrReusedRefresh => StatusCode::UNAUTHORIZED,
        AuthError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let message = match &self {
            AuthError::Upstream(cause) => {
                error!("Request failed: {cause:#}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            kind: self.kind().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
