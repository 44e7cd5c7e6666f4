//! HTTP surface of the house-call service.
//!
//! Builds an [`axum::Router`] over the [`workflow`] services. Every route
//! except `/health` requires a bearer token, which the configured
//! [`casework::AuthGateway`] resolves to a caller; each handler then checks the
//! one permission its action needs.
//!
//! Successful responses carry `{ status, message, data }`. Failures carry
//! `{ status, message, kind }` and no partial data; see [`ApiError`].
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Request parsing, input validation, authentication, and
//! status-code mapping live here. Services receive typed, validated values.

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;
use casework::AuthGateway;
use tower_http::trace::TraceLayer;
use workflow::{CaseService, OnCallService, ShiftService};

pub use error::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub cases: CaseService,
    pub shifts: ShiftService,
    pub on_call: OnCallService,
    pub auth: Arc<dyn AuthGateway>,
}

/// Builds the full router with authentication and request tracing.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/cases", post(handlers::cases::create))
        .route("/cases/counts", get(handlers::cases::counts))
        .route("/cases/:id", get(handlers::cases::get))
        .route("/cases/:id/assign", patch(handlers::cases::assign))
        .route("/cases/:id/accept", patch(handlers::cases::accept))
        .route("/cases/:id/agreement/accept", patch(handlers::cases::accept_agreement))
        .route("/cases/:id/agreement/cancel", patch(handlers::cases::cancel_agreement))
        .route("/cases/:id/conclude", patch(handlers::cases::conclude))
        .route("/cases/:id/transfer", post(handlers::cases::transfer))
        .route("/cases/:id/cancel", patch(handlers::cases::cancel_by_admin))
        .route("/cases/:id/block", patch(handlers::cases::block))
        .route("/cases/:id/clear", post(handlers::cases::clear))
        .route("/cases/:id/close", patch(handlers::cases::close))
        .route("/cases/:id/unblock", patch(handlers::cases::unblock))
        .route("/cases/:id/patient-cancel", patch(handlers::cases::cancel_by_patient))
        .route("/cases/:id/decline", patch(handlers::cases::decline_by_provider))
        .route("/shifts", post(handlers::shifts::create).get(handlers::shifts::schedule))
        .route("/shifts/approve", patch(handlers::shifts::approve))
        .route("/shifts/delete", patch(handlers::shifts::delete))
        .route("/providers/onCall", get(handlers::providers::on_call_sweep))
        .route("/providers/:id/onCall", get(handlers::providers::on_call_one))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::authenticate));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use casework::{
        Caller, FixedClock, LocalInstant, PermissionName, PersonName, Physician, PhysicianId,
        RegionName, RoleId, UserId,
    };
    use chrono::{FixedOffset, TimeZone};
    use serde_json::{json, Value};
    use storage::InMemoryStore;
    use tower::ServiceExt;
    use workflow::{NoticeDispatcher, WorkflowSettings};

    use super::*;
    use crate::auth::permissions;

    const ADMIN: &str = "admin-token";
    const VIEWER: &str = "viewer-token";

    fn physician(id: u64) -> Physician {
        Physician {
            id: PhysicianId::new(id),
            name: PersonName::new("Gregory", "House").unwrap(),
            email: None,
            phone: None,
            regions: vec![RegionName::new("Maryland").unwrap()],
            on_call: None,
        }
    }

    fn app() -> Router {
        let store = Arc::new(InMemoryStore::seeded(
            vec![(RegionName::new("Maryland").unwrap(), "MD".to_string())],
            vec![physician(1), physician(2)],
        ));
        let offset = FixedOffset::east_opt(0).unwrap();
        let clock = Arc::new(FixedClock::new(LocalInstant::new(
            offset.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap(),
        )));
        let settings = WorkflowSettings::default();
        let dispatcher = NoticeDispatcher::new(Arc::new(notify::LogNotifier));

        let all: Vec<PermissionName> = [
            permissions::CASES_CREATE,
            permissions::CASES_READ,
            permissions::CASES_ASSIGN,
            permissions::CASES_ACCEPT,
            permissions::CASES_AGREEMENT,
            permissions::CASES_CONCLUDE,
            permissions::CASES_TRANSFER,
            permissions::CASES_CANCEL,
            permissions::CASES_BLOCK,
            permissions::CASES_CLEAR,
            permissions::CASES_CLOSE,
            permissions::CASES_UNBLOCK,
            permissions::CASES_PATIENT_CANCEL,
            permissions::CASES_DECLINE,
            permissions::SHIFTS_CREATE,
            permissions::SHIFTS_READ,
            permissions::SHIFTS_APPROVE,
            permissions::SHIFTS_DELETE,
            permissions::PROVIDERS_ON_CALL,
        ]
        .into_iter()
        .map(|p| PermissionName::new(p).unwrap())
        .collect();
        let auth = access::StaticAuthGateway::new(
            [
                (
                    ADMIN.to_string(),
                    Caller {
                        user_id: UserId::new(1),
                        role_id: RoleId::new(1),
                    },
                ),
                (
                    VIEWER.to_string(),
                    Caller {
                        user_id: UserId::new(2),
                        role_id: RoleId::new(2),
                    },
                ),
            ],
            [
                (RoleId::new(1), all),
                (RoleId::new(2), vec![PermissionName::new(permissions::CASES_READ).unwrap()]),
            ],
        );

        router(AppState {
            cases: CaseService::new(
                store.clone(),
                store.clone(),
                store.clone(),
                clock.clone(),
                dispatcher,
                settings,
            ),
            shifts: ShiftService::new(store.clone(), store.clone(), clock.clone(), settings),
            on_call: OnCallService::new(store.clone(), store, clock, settings),
            auth: Arc::new(auth),
        })
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn new_case() -> Value {
        json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "region": "Maryland",
            "symptoms": "fever"
        })
    }

    async fn create_case(app: &Router) -> u64 {
        let (status, body) = call(app, Method::POST, "/cases", Some(ADMIN), Some(new_case())).await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["id"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let app = app();

        let (status, body) = call(&app, Method::GET, "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["healthy"], true);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthenticated() {
        let app = app();

        let (status, body) = call(&app, Method::GET, "/cases/1", None, None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "unauthenticated");
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthenticated() {
        let app = app();

        let (status, _) = call(&app, Method::GET, "/cases/1", Some("forged"), None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_permission_is_forbidden() {
        let app = app();

        let (status, body) =
            call(&app, Method::POST, "/cases", Some(VIEWER), Some(new_case())).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["kind"], "permission_denied");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_create_returns_case_with_confirmation_number() {
        let app = app();

        let (status, body) =
            call(&app, Method::POST, "/cases", Some(ADMIN), Some(new_case())).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], 201);
        assert_eq!(body["data"]["confirmationNumber"], "MD0306LOAD0001");
        assert_eq!(body["data"]["tag"], "New");
        assert_eq!(body["data"]["status"], "Unassigned");
    }

    #[tokio::test]
    async fn test_blank_name_is_validation_error() {
        let app = app();
        let mut request = new_case();
        request["firstName"] = json!("  ");

        let (status, body) = call(&app, Method::POST, "/cases", Some(ADMIN), Some(request)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");
    }

    #[tokio::test]
    async fn test_malformed_body_is_validation_error() {
        let app = app();
        let id = create_case(&app).await;

        let (status, body) = call(
            &app,
            Method::PATCH,
            &format!("/cases/{id}/assign"),
            Some(ADMIN),
            Some(json!({ "physicianId": "not-a-number" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");
    }

    #[tokio::test]
    async fn test_lifecycle_over_http() {
        let app = app();
        let id = create_case(&app).await;

        let (status, body) = call(
            &app,
            Method::PATCH,
            &format!("/cases/{id}/assign"),
            Some(ADMIN),
            Some(json!({ "physicianId": 1, "transferNote": "nearest" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["physicianId"], 1);

        let (status, _) =
            call(&app, Method::PATCH, &format!("/cases/{id}/accept"), Some(ADMIN), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app,
            Method::PATCH,
            &format!("/cases/{id}/agreement/accept"),
            Some(ADMIN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "MDOnRoute");

        let (status, body) = call(
            &app,
            Method::PATCH,
            &format!("/cases/{id}/assign"),
            Some(ADMIN),
            Some(json!({ "physicianId": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "invalid_transition");

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/cases/{id}/transfer"),
            Some(ADMIN),
            Some(json!({ "physicianId": 2, "transferNote": "closer" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["physicianId"], 2);

        let (status, body) = call(
            &app,
            Method::PATCH,
            &format!("/cases/{id}/conclude"),
            Some(ADMIN),
            Some(json!({ "physicianNotes": "recovered" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["tag"], "Conclude");

        let (status, body) =
            call(&app, Method::GET, &format!("/cases/{id}"), Some(VIEWER), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["physicianNotes"], "recovered");
    }

    #[tokio::test]
    async fn test_cancel_then_close() {
        let app = app();
        let id = create_case(&app).await;

        let (status, body) = call(
            &app,
            Method::PATCH,
            &format!("/cases/{id}/cancel"),
            Some(ADMIN),
            Some(json!({ "reason": "duplicate", "adminNotes": "merged into another case" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "CancelledByAdmin");
        assert_eq!(body["data"]["archival"]["state"], "archived");

        let (status, body) =
            call(&app, Method::PATCH, &format!("/cases/{id}/close"), Some(ADMIN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["tag"], "UnPaid");
        assert_eq!(body["data"]["status"], "Closed");
    }

    #[tokio::test]
    async fn test_unknown_case_is_not_found() {
        let app = app();

        let (status, body) =
            call(&app, Method::PATCH, "/cases/999/accept", Some(ADMIN), None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_counts_by_tag() {
        let app = app();
        create_case(&app).await;
        create_case(&app).await;

        let (status, body) = call(&app, Method::GET, "/cases/counts", Some(VIEWER), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["New"], 2);
        assert_eq!(body["data"]["Pending"], 0);
    }

    #[tokio::test]
    async fn test_shift_creation_and_batch_approval() {
        let app = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/shifts",
            Some(ADMIN),
            Some(json!({
                "physicianId": 1,
                "shiftDate": "2024-06-03",
                "region": "Maryland",
                "startTime": "09:00:00",
                "endTime": "17:00:00",
                "isRepeat": true,
                "wednesday": true,
                "repeatUpto": 2
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let created = body["data"].as_array().unwrap();
        let dates: Vec<_> = created.iter().map(|o| o["shiftDate"].as_str().unwrap()).collect();
        assert_eq!(dates, ["2024-06-03", "2024-06-05", "2024-06-12"]);
        let mut ids: Vec<u64> = created.iter().map(|o| o["id"].as_u64().unwrap()).collect();

        ids.push(9_999);
        let (status, _) = call(
            &app,
            Method::PATCH,
            "/shifts/approve",
            Some(ADMIN),
            Some(json!({ "shiftIds": ids })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(
            &app,
            Method::GET,
            "/shifts?physicianId=1&from=2024-06-01&to=2024-06-30",
            Some(ADMIN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let listed = body["data"].as_array().unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed.iter().all(|o| o["isApproved"] == false));
    }

    #[tokio::test]
    async fn test_inverted_shift_window_is_rejected() {
        let app = app();

        let (status, body) = call(
            &app,
            Method::POST,
            "/shifts",
            Some(ADMIN),
            Some(json!({
                "physicianId": 1,
                "shiftDate": "2024-06-03",
                "region": "Maryland",
                "startTime": "17:00:00",
                "endTime": "09:00:00"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");
    }

    fn repeating_shift(weeks: u64) -> Value {
        json!({
            "physicianId": 1,
            "shiftDate": "2024-06-03",
            "region": "Maryland",
            "startTime": "09:00:00",
            "endTime": "17:00:00",
            "isRepeat": true,
            "monday": true,
            "repeatUpto": weeks
        })
    }

    #[tokio::test]
    async fn test_repeat_limit_is_enforced() {
        let app = app();
        let weeks = u64::from(casework::MAX_REPEAT_WEEKS);

        for weeks in [weeks + 1, 20_000_000] {
            let shift = repeating_shift(weeks);
            let (status, body) =
                call(&app, Method::POST, "/shifts", Some(ADMIN), Some(shift)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["kind"], "validation");
        }
    }

    #[tokio::test]
    async fn test_repeat_of_zero_weeks_stores_anchor_only() {
        let app = app();

        let (status, body) =
            call(&app, Method::POST, "/shifts", Some(ADMIN), Some(repeating_shift(0))).await;

        assert_eq!(status, StatusCode::CREATED);
        let created = body["data"].as_array().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0]["shiftDate"], "2024-06-03");
    }

    #[tokio::test]
    async fn test_on_call_sweep_by_region() {
        let app = app();
        call(
            &app,
            Method::POST,
            "/shifts",
            Some(ADMIN),
            Some(json!({
                "physicianId": 2,
                "shiftDate": "2024-06-03",
                "region": "Maryland",
                "startTime": "09:00:00",
                "endTime": "17:00:00"
            })),
        )
        .await;

        let (status, body) =
            call(&app, Method::GET, "/providers/onCall?region=Maryland", Some(ADMIN), None).await;

        assert_eq!(status, StatusCode::OK);
        let on_call: Vec<_> = body["data"]["onCall"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_u64().unwrap())
            .collect();
        assert_eq!(on_call, [2]);
        assert_eq!(body["data"]["unscheduled"].as_array().unwrap().len(), 1);

        let (status, body) =
            call(&app, Method::GET, "/providers/1/onCall", Some(ADMIN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "UnScheduled");
    }
}
