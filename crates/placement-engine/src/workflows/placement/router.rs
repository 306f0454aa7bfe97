use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::coordinator::SelectionDecision;
use super::domain::{
    Actor, ActorRole, ApplicationId, ApplicationStatus, CompanyId, DriveId, DriveStatus, StudentId,
};
use super::error::{ErrorKind, PlacementError};
use super::ledger::ApplyRequest;
use super::ports::ProfileStoreError;
use super::registry::DriveDraft;
use super::repository::{ApplicationRepository, DriveRepository, RepositoryError};
use super::service::PlacementService;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Router builder exposing drive, application, and reporting endpoints.
pub fn placement_router<D, R>(service: Arc<PlacementService<D, R>>) -> Router
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/drives",
            post(create_drive_handler::<D, R>).get(list_drives_handler::<D, R>),
        )
        .route("/api/v1/drives/:drive_id", get(drive_handler::<D, R>))
        .route(
            "/api/v1/drives/:drive_id/publish",
            put(publish_handler::<D, R>),
        )
        .route("/api/v1/drives/:drive_id/lock", put(lock_handler::<D, R>))
        .route("/api/v1/drives/:drive_id/close", put(close_handler::<D, R>))
        .route(
            "/api/v1/drives/:drive_id/applicants",
            get(applicants_handler::<D, R>),
        )
        .route(
            "/api/v1/drives/:drive_id/shortlist",
            post(shortlist_handler::<D, R>),
        )
        .route(
            "/api/v1/drives/:drive_id/select",
            post(selection_handler::<D, R>),
        )
        .route(
            "/api/v1/companies/:company_id/drives",
            get(company_drives_handler::<D, R>),
        )
        .route(
            "/api/v1/students/:student_id/eligible-drives",
            get(eligible_drives_handler::<D, R>),
        )
        .route(
            "/api/v1/students/:student_id/applications",
            get(student_applications_handler::<D, R>),
        )
        .route("/api/v1/applications", post(apply_handler::<D, R>))
        .route(
            "/api/v1/applications/:application_id",
            get(application_handler::<D, R>),
        )
        .route(
            "/api/v1/applications/:application_id/status",
            put(status_handler::<D, R>),
        )
        .route(
            "/api/v1/applications/:application_id/accept-offer",
            put(accept_offer_handler::<D, R>),
        )
        .route(
            "/api/v1/applications/:application_id/reject-offer",
            put(decline_offer_handler::<D, R>),
        )
        .route(
            "/api/v1/applications/:application_id/withdraw",
            put(withdraw_handler::<D, R>),
        )
        .route(
            "/api/v1/admin/statistics",
            get(statistics_handler::<D, R>),
        )
        .with_state(service)
}

/// Caller identity taken from the `x-actor-id` / `x-actor-role` headers.
#[derive(Debug, Clone)]
pub struct ActorHeaders(pub Actor);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ActorHeaders
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_value(parts, ACTOR_ID_HEADER)?;
        let raw_role = header_value(parts, ACTOR_ROLE_HEADER)?;

        let role = match ActorRole::parse(&raw_role) {
            Some(ActorRole::System) | None => {
                return Err(error_body(
                    StatusCode::BAD_REQUEST,
                    format!("unsupported actor role `{raw_role}`"),
                ))
            }
            Some(role) => role,
        };

        Ok(ActorHeaders(Actor { id, role }))
    }
}

fn header_value(parts: &Parts, name: &str) -> Result<String, Response> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| error_body(StatusCode::UNAUTHORIZED, format!("missing {name} header")))
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl IntoResponse for PlacementError {
    fn into_response(self) -> Response {
        let status = match (&self, self.kind()) {
            (PlacementError::Forbidden { .. }, _) => StatusCode::FORBIDDEN,
            (PlacementError::Ineligible { reasons }, _) => {
                let payload = json!({
                    "error": "student is not eligible for this drive",
                    "reasons": reasons,
                });
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
            }
            (
                PlacementError::Repository(RepositoryError::Unavailable(_))
                | PlacementError::Profile(ProfileStoreError::Unavailable(_)),
                _,
            ) => StatusCode::SERVICE_UNAVAILABLE,
            (_, ErrorKind::Validation) => StatusCode::BAD_REQUEST,
            (_, ErrorKind::Conflict) => StatusCode::CONFLICT,
            (_, ErrorKind::NotFound) => StatusCode::NOT_FOUND,
            (_, ErrorKind::Policy) => StatusCode::FORBIDDEN,
            (_, ErrorKind::Store) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "placement request failed");
        }
        error_body(status, self.to_string())
    }
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, PlacementError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct DriveFilter {
    pub status: Option<DriveStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ApplicantFilter {
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ShortlistRequest {
    pub student_ids: Vec<StudentId>,
}

#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    pub selections: Vec<SelectionDecision>,
}

/// Apply body; `student_id` defaults to the calling student.
#[derive(Debug, Deserialize)]
pub struct ApplyBody {
    #[serde(default)]
    pub student_id: Option<StudentId>,
    pub drive_id: DriveId,
    #[serde(default)]
    pub resume_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: ApplicationStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WithdrawRequest {
    #[serde(default)]
    pub note: Option<String>,
}

pub(crate) async fn create_drive_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
    Json(draft): Json<DriveDraft>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    respond(StatusCode::CREATED, service.create_drive(&actor, draft))
}

pub(crate) async fn list_drives_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    Query(filter): Query<DriveFilter>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    respond(StatusCode::OK, service.drives(filter.status))
}

pub(crate) async fn drive_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    Path(drive_id): Path<String>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    respond(StatusCode::OK, service.drive(&DriveId(drive_id)))
}

pub(crate) async fn publish_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
    Path(drive_id): Path<String>,
    Json(request): Json<PublishRequest>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    let result = service.publish_drive(
        &actor,
        &DriveId(drive_id),
        request.opens_at,
        request.closes_at,
    );
    respond(StatusCode::OK, result)
}

pub(crate) async fn lock_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
    Path(drive_id): Path<String>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    respond(StatusCode::OK, service.lock_drive(&actor, &DriveId(drive_id)))
}

pub(crate) async fn close_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
    Path(drive_id): Path<String>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    respond(StatusCode::OK, service.close_drive(&actor, &DriveId(drive_id)))
}

pub(crate) async fn applicants_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
    Path(drive_id): Path<String>,
    Query(filter): Query<ApplicantFilter>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    respond(
        StatusCode::OK,
        service.applicants(&actor, &DriveId(drive_id), filter.status),
    )
}

pub(crate) async fn shortlist_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
    Path(drive_id): Path<String>,
    Json(request): Json<ShortlistRequest>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    respond(
        StatusCode::OK,
        service.submit_shortlist(&actor, &DriveId(drive_id), request.student_ids),
    )
}

pub(crate) async fn selection_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
    Path(drive_id): Path<String>,
    Json(request): Json<SelectionRequest>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    respond(
        StatusCode::OK,
        service.submit_final_selection(&actor, &DriveId(drive_id), request.selections),
    )
}

pub(crate) async fn company_drives_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
    Path(company_id): Path<String>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    respond(
        StatusCode::OK,
        service.company_drives(&actor, &CompanyId(company_id)),
    )
}

pub(crate) async fn eligible_drives_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
    Path(student_id): Path<String>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    respond(
        StatusCode::OK,
        service.eligible_drives(&actor, &StudentId(student_id)),
    )
}

pub(crate) async fn student_applications_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
    Path(student_id): Path<String>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    respond(
        StatusCode::OK,
        service.student_applications(&actor, &StudentId(student_id)),
    )
}

pub(crate) async fn apply_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
    Json(body): Json<ApplyBody>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    let request = ApplyRequest {
        student_id: body.student_id.unwrap_or_else(|| StudentId(actor.id.clone())),
        drive_id: body.drive_id,
        resume_ref: body.resume_ref,
    };
    respond(StatusCode::CREATED, service.apply(&actor, request))
}

pub(crate) async fn application_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
    Path(application_id): Path<String>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    respond(
        StatusCode::OK,
        service.application_for(&actor, &ApplicationId(application_id)),
    )
}

pub(crate) async fn status_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
    Path(application_id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    let result = service.transition(
        &actor,
        &ApplicationId(application_id),
        update.status,
        update.note,
    );
    respond(StatusCode::OK, result)
}

pub(crate) async fn accept_offer_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
    Path(application_id): Path<String>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    respond(
        StatusCode::OK,
        service.accept_offer(&actor, &ApplicationId(application_id)),
    )
}

pub(crate) async fn decline_offer_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
    Path(application_id): Path<String>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    respond(
        StatusCode::OK,
        service.decline_offer(&actor, &ApplicationId(application_id)),
    )
}

pub(crate) async fn withdraw_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
    Path(application_id): Path<String>,
    body: Option<Json<WithdrawRequest>>,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    let note = body.and_then(|Json(request)| request.note);
    respond(
        StatusCode::OK,
        service.withdraw(&actor, &ApplicationId(application_id), note),
    )
}

pub(crate) async fn statistics_handler<D, R>(
    State(service): State<Arc<PlacementService<D, R>>>,
    ActorHeaders(actor): ActorHeaders,
) -> Response
where
    D: DriveRepository + 'static,
    R: ApplicationRepository + 'static,
{
    respond(StatusCode::OK, service.statistics(&actor))
}
