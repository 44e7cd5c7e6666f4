//! `/cases` handlers.

use std::collections::BTreeMap;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::{Extension, Json};
use casework::{
    Caller, CaseId, CaseIntake, CaseworkError, IntakeChannel, PatientDetails, PersonName,
    PhysicianId, RegionName,
};
use chrono::NaiveDate;
use serde::Deserialize;

use super::{optional, required, respond};
use crate::auth::{authorize, permissions};
use crate::{ApiError, AppState};

type CasePath = Result<Path<CaseId>, PathRejection>;
type Body<T> = Result<Json<T>, JsonRejection>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCaseRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub region: String,
    pub symptoms: Option<String>,
    pub channel: Option<IntakeChannel>,
}

impl CreateCaseRequest {
    fn into_intake(self) -> Result<CaseIntake, CaseworkError> {
        let name = PersonName::new(self.first_name, self.last_name)
            .ok_or_else(|| CaseworkError::validation("firstName and lastName must not be blank"))?;
        let region = RegionName::new(self.region.trim())
            .ok_or_else(|| CaseworkError::validation("region must not be blank"))?;

        Ok(CaseIntake {
            patient: PatientDetails {
                name,
                email: optional(self.email),
                phone: optional(self.phone),
                date_of_birth: self.date_of_birth,
                address: optional(self.address),
            },
            region,
            symptoms: optional(self.symptoms),
            channel: self.channel.unwrap_or(IntakeChannel::Patient),
        })
    }
}

/// Body of `assign` and `transfer`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicianRequest {
    pub physician_id: PhysicianId,
    pub transfer_note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcludeRequest {
    pub physician_notes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub reason: String,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclineRequest {
    pub note: Option<String>,
}

// ---------------------------------------------------------------------------
// Creation and reads
// ---------------------------------------------------------------------------

/// `POST /cases`: registers a new case in `(New, Unassigned)`.
pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Body<CreateCaseRequest>,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::CASES_CREATE).await?;
    let Json(request) = body?;
    let case = state.cases.create(request.into_intake()?).await?;
    Ok(respond(StatusCode::CREATED, "Case created", case))
}

/// `GET /cases/:id`.
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: CasePath,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::CASES_READ).await?;
    let Path(id) = id?;
    let case = state.cases.get(id).await?;
    Ok(respond(StatusCode::OK, "Case found", case))
}

/// `GET /cases/counts`: case count per tag.
pub async fn counts(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::CASES_READ).await?;
    let counts: BTreeMap<&str, u64> = state
        .cases
        .counts()
        .await?
        .into_iter()
        .map(|(tag, count)| (tag.as_str(), count))
        .collect();
    Ok(respond(StatusCode::OK, "Case counts", counts))
}

// ---------------------------------------------------------------------------
// Lifecycle actions
// ---------------------------------------------------------------------------

/// `PATCH /cases/:id/assign`.
pub async fn assign(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: CasePath,
    body: Body<PhysicianRequest>,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::CASES_ASSIGN).await?;
    let Path(id) = id?;
    let Json(request) = body?;
    let case = state
        .cases
        .assign(id, request.physician_id, optional(request.transfer_note))
        .await?;
    Ok(respond(StatusCode::OK, "Case assigned", case))
}

/// `PATCH /cases/:id/accept`.
pub async fn accept(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: CasePath,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::CASES_ACCEPT).await?;
    let Path(id) = id?;
    let case = state.cases.accept(id).await?;
    Ok(respond(StatusCode::OK, "Case accepted", case))
}

/// `PATCH /cases/:id/agreement/accept`.
pub async fn accept_agreement(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: CasePath,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::CASES_AGREEMENT).await?;
    let Path(id) = id?;
    let case = state.cases.accept_agreement(id).await?;
    Ok(respond(StatusCode::OK, "Agreement accepted", case))
}

/// `PATCH /cases/:id/agreement/cancel`.
pub async fn cancel_agreement(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: CasePath,
    body: Body<ReasonRequest>,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::CASES_AGREEMENT).await?;
    let Path(id) = id?;
    let Json(request) = body?;
    let case = state
        .cases
        .cancel_agreement(id, required("reason", request.reason)?)
        .await?;
    Ok(respond(StatusCode::OK, "Agreement cancelled", case))
}

/// `PATCH /cases/:id/conclude`.
pub async fn conclude(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: CasePath,
    body: Body<ConcludeRequest>,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::CASES_CONCLUDE).await?;
    let Path(id) = id?;
    let Json(request) = body?;
    let case = state
        .cases
        .conclude(id, required("physicianNotes", request.physician_notes)?)
        .await?;
    Ok(respond(StatusCode::OK, "Case concluded", case))
}

/// `POST /cases/:id/transfer`: moves the case to another physician.
pub async fn transfer(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: CasePath,
    body: Body<PhysicianRequest>,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::CASES_TRANSFER).await?;
    let Path(id) = id?;
    let Json(request) = body?;
    let case = state
        .cases
        .transfer(id, request.physician_id, optional(request.transfer_note))
        .await?;
    Ok(respond(StatusCode::OK, "Case transferred", case))
}

/// `PATCH /cases/:id/cancel`.
pub async fn cancel_by_admin(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: CasePath,
    body: Body<CancelRequest>,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::CASES_CANCEL).await?;
    let Path(id) = id?;
    let Json(request) = body?;
    let case = state
        .cases
        .cancel_by_admin(id, required("reason", request.reason)?, optional(request.admin_notes))
        .await?;
    Ok(respond(StatusCode::OK, "Case cancelled", case))
}

/// `PATCH /cases/:id/block`.
pub async fn block(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: CasePath,
    body: Body<ReasonRequest>,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::CASES_BLOCK).await?;
    let Path(id) = id?;
    let Json(request) = body?;
    let case = state.cases.block(id, required("reason", request.reason)?).await?;
    Ok(respond(StatusCode::OK, "Case blocked", case))
}

/// `POST /cases/:id/clear`.
pub async fn clear(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: CasePath,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::CASES_CLEAR).await?;
    let Path(id) = id?;
    let case = state.cases.clear(id).await?;
    Ok(respond(StatusCode::OK, "Case cleared", case))
}

/// `PATCH /cases/:id/close`.
pub async fn close(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: CasePath,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::CASES_CLOSE).await?;
    let Path(id) = id?;
    let case = state.cases.close(id).await?;
    Ok(respond(StatusCode::OK, "Case closed", case))
}

/// `PATCH /cases/:id/unblock`.
pub async fn unblock(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: CasePath,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::CASES_UNBLOCK).await?;
    let Path(id) = id?;
    let case = state.cases.unblock(id).await?;
    Ok(respond(StatusCode::OK, "Case unblocked", case))
}

/// `PATCH /cases/:id/patient-cancel`.
pub async fn cancel_by_patient(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: CasePath,
    body: Body<ReasonRequest>,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::CASES_PATIENT_CANCEL).await?;
    let Path(id) = id?;
    let Json(request) = body?;
    let case = state
        .cases
        .cancel_by_patient(id, required("reason", request.reason)?)
        .await?;
    Ok(respond(StatusCode::OK, "Case cancelled by patient", case))
}

/// `PATCH /cases/:id/decline`.
pub async fn decline_by_provider(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: CasePath,
    body: Body<DeclineRequest>,
) -> Result<Response, ApiError> {
    authorize(&state, &caller, permissions::CASES_DECLINE).await?;
    let Path(id) = id?;
    let Json(request) = body?;
    let case = state.cases.decline_by_provider(id, optional(request.note)).await?;
    Ok(respond(StatusCode::OK, "Case declined", case))
}
