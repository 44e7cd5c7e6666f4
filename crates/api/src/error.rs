//! Mapping from [`CaseworkError`] to HTTP responses.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use casework::CaseworkError;
use serde::Serialize;

/// A failed request. Carries no partial data.
#[derive(Debug)]
pub struct ApiError(pub CaseworkError);

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: u16,
    message: String,
    kind: &'a str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CaseworkError::Validation { .. } => StatusCode::BAD_REQUEST,
            CaseworkError::Unauthenticated => StatusCode::UNAUTHORIZED,
            CaseworkError::NotFound { .. } => StatusCode::NOT_FOUND,
            CaseworkError::InvalidTransition { .. } | CaseworkError::Conflict { .. } => {
                StatusCode::CONFLICT
            }
            CaseworkError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            CaseworkError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<CaseworkError> for ApiError {
    fn from(err: CaseworkError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(CaseworkError::validation(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self(CaseworkError::validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(CaseworkError::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, kind = self.0.kind(), "Request failed");
        } else {
            tracing::debug!(error = %self.0, kind = self.0.kind(), "Request rejected");
        }

        let body = Json(ErrorBody {
            status: status.as_u16(),
            message: self.0.to_string(),
            kind: self.0.kind(),
        });
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
