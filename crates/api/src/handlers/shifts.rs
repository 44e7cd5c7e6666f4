//! `/shifts` handlers.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::{Extension, Json};
use casework::{
    Caller, CaseworkError, PhysicianId, Recurrence, RegionName, ShiftDefinition, ShiftId,
    ShiftWindow, WeekdayFlags, MAX_REPEAT_WEEKS,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use super::respond;
use crate::auth::{authorize, permissions};
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShiftRequest {
    pub physician_id: PhysicianId,
    pub shift_date: NaiveDate,
    pub region: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub is_repeat: bool,
    #[serde(flatten)]
    pub weekdays: WeekdayFlags,
    #[serde(default)]
    pub repeat_upto: u32,
}

impl CreateShiftRequest {
    fn into_definition(self) -> Result<ShiftDefinition, CaseworkError> {
        let region = RegionName::new(self.region.trim())
            .ok_or_else(|| CaseworkError::validation("region must not be blank"))?;
        let window = ShiftWindow::new(self.start_time, self.end_time).ok_or_else(|| {
            CaseworkError::validation(format!(
                "startTime {} must be before endTime {}",
                self.start_time, self.end_time
            ))
        })?;

        // Weekday flags on a one-off shift are ignored.
        let recurrence = if self.is_repeat {
            if self.weekdays.is_empty() {
                return Err(CaseworkError::validation(
                    "a repeating shift needs at least one weekday",
                ));
            }
            if self.repeat_upto > MAX_REPEAT_WEEKS {
                return Err(CaseworkError::validation(format!(
                    "repeatUpto must be at most {MAX_REPEAT_WEEKS} weeks"
                )));
            }
            Some(Recurrence {
                weekdays: self.weekdays,
                repeat_upto: self.repeat_upto,
            })
        } else {
            None
        };

        Ok(ShiftDefinition {
            physician_id: self.physician_id,
            shift_date: self.shift_date,
            region,
            window,
            recurrence,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftBatchRequest {
    pub shift_ids: Vec<ShiftId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    pub physician_id: PhysicianId,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// `POST /shifts`: expands the definition and stores every occurrence.
pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<CreateShiftRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::SHIFTS_CREATE).await?;
    let Json(request) = body?;
    let occurrences = state.shifts.create(request.into_definition()?).await?;
    Ok(respond(StatusCode::CREATED, "Shift created", occurrences))
}

/// `PATCH /shifts/approve`: all-or-nothing.
pub async fn approve(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<ShiftBatchRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::SHIFTS_APPROVE).await?;
    let Json(request) = body?;
    let approved = state.shifts.approve_many(&request.shift_ids).await?;
    Ok(respond(StatusCode::OK, "Shifts approved", approved))
}

/// `PATCH /shifts/delete`: all-or-nothing soft delete.
pub async fn delete(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<ShiftBatchRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::SHIFTS_DELETE).await?;
    let Json(request) = body?;
    let deleted = state.shifts.delete_many(&request.shift_ids).await?;
    Ok(respond(StatusCode::OK, "Shifts deleted", deleted))
}

/// `GET /shifts?physicianId=&from=&to=`.
pub async fn schedule(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<ScheduleQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::SHIFTS_READ).await?;
    let Query(query) = query?;
    let occurrences = state
        .shifts
        .schedule(query.physician_id, query.from, query.to)
        .await?;
    Ok(respond(StatusCode::OK, "Shift schedule", occurrences))
}
