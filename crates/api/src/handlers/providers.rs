//! `/providers` handlers.

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Extension;
use casework::{Caller, PhysicianId, RegionName};
use serde::Deserialize;

use super::respond;
use crate::auth::{authorize, permissions};
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct OnCallQuery {
    pub region: Option<String>,
}

/// Resolves every physician of `?region=` (all physicians when absent or
/// blank) and splits them into on-call and unscheduled.
pub async fn on_call_sweep(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<OnCallQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::PROVIDERS_ON_CALL).await?;
    let Query(query) = query?;
    let region = query.region.and_then(|r| RegionName::new(r.trim()));
    let sweep = state.on_call.sweep(region.as_ref()).await?;
    Ok(respond(StatusCode::OK, "On-call status resolved", sweep))
}

/// Resolves one physician and records the result.
pub async fn on_call_one(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: Result<Path<PhysicianId>, PathRejection>,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::PROVIDERS_ON_CALL).await?;
    let Path(id) = id?;
    let record = state.on_call.resolve(id).await?;
    Ok(respond(StatusCode::OK, "On-call status resolved", record))
}
