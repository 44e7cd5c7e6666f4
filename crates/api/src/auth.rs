//! Bearer authentication and per-route permission checks.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use casework::{Caller, CaseworkError, PermissionName};

use crate::{ApiError, AppState};

/// Permission names checked by the routes. Grants are configured per role.
pub mod permissions {
    pub const CASES_CREATE: &str = "cases.create";
    pub const CASES_READ: &str = "cases.read";
    pub const CASES_ASSIGN: &str = "cases.assign";
    pub const CASES_ACCEPT: &str = "cases.accept";
    pub const CASES_AGREEMENT: &str = "cases.agreement";
    pub const CASES_CONCLUDE: &str = "cases.conclude";
    pub const CASES_TRANSFER: &str = "cases.transfer";
    pub const CASES_CANCEL: &str = "cases.cancel";
    pub const CASES_BLOCK: &str = "cases.block";
    pub const CASES_CLEAR: &str = "cases.clear";
    pub const CASES_CLOSE: &str = "cases.close";
    pub const CASES_UNBLOCK: &str = "cases.unblock";
    pub const CASES_PATIENT_CANCEL: &str = "cases.patient_cancel";
    pub const CASES_DECLINE: &str = "cases.decline";
    pub const SHIFTS_CREATE: &str = "shifts.create";
    pub const SHIFTS_READ: &str = "shifts.read";
    pub const SHIFTS_APPROVE: &str = "shifts.approve";
    pub const SHIFTS_DELETE: &str = "shifts.delete";
    pub const PROVIDERS_ON_CALL: &str = "providers.on_call";
}

/// Resolves the bearer token and stores the [`Caller`] in the request
/// extensions. Requests without a valid token stop here with 401.
pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(|t| t.trim().to_string());

    let Some(token) = token else {
        return ApiError(CaseworkError::Unauthenticated).into_response();
    };

    match state.auth.verify(&token).await {
        Ok(caller) => {
            req.extensions_mut().insert(caller);
            next.run(req).await
        }
        Err(err) => ApiError(err).into_response(),
    }
}

/// Fails with [`CaseworkError::PermissionDenied`] unless `caller`'s role is
/// granted `permission`.
pub async fn authorize(
    state: &AppState,
    caller: &Caller,
    permission: &str,
) -> Result<(), ApiError> {
    let permission = PermissionName::new(permission)
        .ok_or_else(|| CaseworkError::validation("permission name must not be blank"))?;

    if state.auth.has_permission(caller.role_id, &permission).await? {
        return Ok(());
    }

    tracing::debug!(
        user_id = %caller.user_id,
        role_id = %caller.role_id,
        permission = %permission,
        "Permission denied"
    );
    Err(ApiError(CaseworkError::PermissionDenied { permission }))
}
