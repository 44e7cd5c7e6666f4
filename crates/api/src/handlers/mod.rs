//! Request handlers, grouped by resource.

pub mod cases;
pub mod providers;
pub mod shifts;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use casework::CaseworkError;
use serde::Serialize;

#[derive(Serialize)]
struct Envelope<'a, T> {
    status: u16,
    message: &'a str,
    data: T,
}

/// Success body: status code, message, and the affected record(s).
pub(crate) fn respond<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    let body = Envelope {
        status: status.as_u16(),
        message,
        data,
    };
    (status, Json(body)).into_response()
}

/// Trims `value` and rejects it when blank.
pub(crate) fn required(field: &str, value: String) -> Result<String, CaseworkError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CaseworkError::validation(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

/// Trims `value`, treating a blank string as absent.
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) async fn health() -> Response {
    respond(StatusCode::OK, "ok", serde_json::json!({ "healthy": true }))
}
