use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;

use super::blood_type::{compatible_donor_types, compatible_recipient_types, BloodType};
use super::dates::{deserialize_date, deserialize_optional_date};
use super::domain::{
    AccountId, CancellationReason, DonationId, RequestDraft, RequestId, ScheduleDraft, UserRole,
};
use super::repository::{DonationRepository, Notifier, RepositoryError};
use super::service::{DonationService, DonationServiceError};
use super::DonationRuleViolation;

/// Router builder exposing the donation workflow over JSON.
pub fn donation_router<R, N>(service: Arc<DonationService<R, N>>) -> Router
where
    R: DonationRepository + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/blood-types/:blood_type/donors",
            get(blood_type_handler),
        )
        .route(
            "/api/v1/registrations/check",
            post(registration_handler::<R, N>),
        )
        .route(
            "/api/v1/donors/:donor_id/eligibility",
            get(eligibility_handler::<R, N>),
        )
        .route(
            "/api/v1/donors/:donor_id/requests",
            get(open_requests_handler::<R, N>),
        )
        .route("/api/v1/requests", post(create_request_handler::<R, N>))
        .route(
            "/api/v1/requests/:request_id/compatible-donors",
            get(compatible_donors_handler::<R, N>),
        )
        .route(
            "/api/v1/requests/:request_id/responses",
            post(respond_handler::<R, N>),
        )
        .route(
            "/api/v1/requests/:request_id/cancel",
            post(cancel_request_handler::<R, N>),
        )
        .route("/api/v1/donations", post(schedule_handler::<R, N>))
        .route(
            "/api/v1/donations/:donation_id/complete",
            post(complete_handler::<R, N>),
        )
        .route(
            "/api/v1/donations/:donation_id/cancel",
            post(cancel_donation_handler::<R, N>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TodayQuery {
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegistrationCheckBody {
    #[serde(rename = "rol")]
    pub(crate) role: UserRole,
    #[serde(rename = "fecha_nacimiento", deserialize_with = "deserialize_date")]
    pub(crate) birth_date: NaiveDate,
    #[serde(rename = "peso", default)]
    pub(crate) weight_kg: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateRequestBody {
    #[serde(rename = "usuario_solicitante_id")]
    pub(crate) requester_id: AccountId,
    #[serde(flatten)]
    pub(crate) draft: RequestDraft,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RespondBody {
    #[serde(rename = "donante_id")]
    pub(crate) donor_id: AccountId,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScheduleBody {
    #[serde(rename = "donante_id")]
    pub(crate) donor_id: AccountId,
    #[serde(flatten)]
    pub(crate) draft: ScheduleDraft,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CancelDonationBody {
    #[serde(rename = "motivo")]
    pub(crate) reason: CancellationReason,
}

fn resolve_today(today: Option<NaiveDate>) -> NaiveDate {
    today.unwrap_or_else(|| Local::now().date_naive())
}

/// HTTP status for a service failure.
pub fn status_for(error: &DonationServiceError) -> StatusCode {
    match error {
        DonationServiceError::Rule(violation) => match violation {
            DonationRuleViolation::UnknownBloodType(_) => StatusCode::BAD_REQUEST,
            DonationRuleViolation::RequestNotPending { .. }
            | DonationRuleViolation::NotProgramada { .. }
            | DonationRuleViolation::AlreadyCompleted
            | DonationRuleViolation::RequestClosed { .. } => StatusCode::CONFLICT,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        },
        DonationServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        DonationServiceError::Repository(
            RepositoryError::Conflict
            | RepositoryError::StaleRequest { .. }
            | RepositoryError::StaleDonation { .. }
            | RepositoryError::StaleProfile,
        ) => StatusCode::CONFLICT,
        DonationServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub(crate) fn error_response(error: DonationServiceError) -> Response {
    let status = status_for(&error);
    let payload = match &error {
        DonationServiceError::Rule(violation) => json!({
            "error": violation.to_string(),
            "code": violation.code(),
            "days_until_eligible": violation.days_until_eligible(),
        }),
        DonationServiceError::Repository(other) => json!({
            "error": other.to_string(),
        }),
    };
    (status, Json(payload)).into_response()
}

pub(crate) async fn blood_type_handler(Path(blood_type): Path<String>) -> Response {
    match blood_type.parse::<BloodType>() {
        Ok(recipient) => {
            let payload = json!({
                "tipo_sangre": recipient,
                "donantes_compatibles": compatible_donor_types(recipient),
                "receptores_compatibles": compatible_recipient_types(recipient),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(violation) => error_response(violation.into()),
    }
}

pub(crate) async fn registration_handler<R, N>(
    State(service): State<Arc<DonationService<R, N>>>,
    Json(body): Json<RegistrationCheckBody>,
) -> Response
where
    R: DonationRepository + 'static,
    N: Notifier + 'static,
{
    let today = resolve_today(body.today);
    match service.check_registration(body.role, body.birth_date, body.weight_kg, today) {
        Ok(()) => (StatusCode::OK, Json(json!({ "accepted": true }))).into_response(),
        Err(rejection) => {
            let payload = json!({
                "accepted": false,
                "error": rejection.to_string(),
                "rejection": rejection,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn eligibility_handler<R, N>(
    State(service): State<Arc<DonationService<R, N>>>,
    Path(donor_id): Path<String>,
    Query(query): Query<TodayQuery>,
) -> Response
where
    R: DonationRepository + 'static,
    N: Notifier + 'static,
{
    let today = resolve_today(query.today);
    match service.eligibility(&AccountId(donor_id), today) {
        Ok(decision) => {
            let payload = json!({
                "eligible": decision.eligible,
                "reason": decision.reason,
                "days_until_eligible": decision.days_until_eligible,
                "summary": decision.summary(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn open_requests_handler<R, N>(
    State(service): State<Arc<DonationService<R, N>>>,
    Path(donor_id): Path<String>,
) -> Response
where
    R: DonationRepository + 'static,
    N: Notifier + 'static,
{
    match service.open_requests_for(&AccountId(donor_id)) {
        Ok(requests) => (StatusCode::OK, Json(requests)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_request_handler<R, N>(
    State(service): State<Arc<DonationService<R, N>>>,
    Json(body): Json<CreateRequestBody>,
) -> Response
where
    R: DonationRepository + 'static,
    N: Notifier + 'static,
{
    let today = resolve_today(body.today);
    match service.create_request(body.requester_id, body.draft, today) {
        Ok(request) => (StatusCode::CREATED, Json(request)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn compatible_donors_handler<R, N>(
    State(service): State<Arc<DonationService<R, N>>>,
    Path(request_id): Path<String>,
    Query(query): Query<TodayQuery>,
) -> Response
where
    R: DonationRepository + 'static,
    N: Notifier + 'static,
{
    let today = resolve_today(query.today);
    let request_id = RequestId(request_id);
    match service.compatible_donors(&request_id, today) {
        Ok(donors) => {
            let payload = json!({
                "solicitud_id": request_id,
                "donantes": donors,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn respond_handler<R, N>(
    State(service): State<Arc<DonationService<R, N>>>,
    Path(request_id): Path<String>,
    Json(body): Json<RespondBody>,
) -> Response
where
    R: DonationRepository + 'static,
    N: Notifier + 'static,
{
    let today = resolve_today(body.today);
    match service.respond_to_request(&RequestId(request_id), &body.donor_id, today) {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cancel_request_handler<R, N>(
    State(service): State<Arc<DonationService<R, N>>>,
    Path(request_id): Path<String>,
) -> Response
where
    R: DonationRepository + 'static,
    N: Notifier + 'static,
{
    match service.cancel_request(&RequestId(request_id)) {
        Ok(request) => (StatusCode::OK, Json(request)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn schedule_handler<R, N>(
    State(service): State<Arc<DonationService<R, N>>>,
    Json(body): Json<ScheduleBody>,
) -> Response
where
    R: DonationRepository + 'static,
    N: Notifier + 'static,
{
    let today = resolve_today(body.today);
    match service.schedule_donation(&body.donor_id, body.draft, today) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn complete_handler<R, N>(
    State(service): State<Arc<DonationService<R, N>>>,
    Path(donation_id): Path<String>,
) -> Response
where
    R: DonationRepository + 'static,
    N: Notifier + 'static,
{
    match service.complete_donation(&DonationId(donation_id)) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cancel_donation_handler<R, N>(
    State(service): State<Arc<DonationService<R, N>>>,
    Path(donation_id): Path<String>,
    Json(body): Json<CancelDonationBody>,
) -> Response
where
    R: DonationRepository + 'static,
    N: Notifier + 'static,
{
    match service.cancel_donation(&DonationId(donation_id), body.reason) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}
