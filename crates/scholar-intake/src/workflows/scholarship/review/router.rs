use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::workflows::scholarship::payload::SubmissionPayload;

use super::domain::{ApplicationId, ApplicationStatus, ApplicationView};
use super::repository::{ApplicationRepository, RepositoryError};
use super::service::{ApplicationService, ApplicationServiceError};
use super::storage::ObjectStorage;

/// Submissions carry base64 images and certificate files inline.
pub const MAX_SUBMISSION_BYTES: usize = 25 * 1024 * 1024;
const DEFAULT_LIST_LIMIT: usize = 50;

/// Router builder exposing HTTP endpoints for submission and review.
pub fn application_router<R, S>(service: Arc<ApplicationService<R, S>>) -> Router
where
    R: ApplicationRepository + 'static,
    S: ObjectStorage + 'static,
{
    Router::new()
        .route(
            "/api/v1/scholarship/applications",
            get(list_handler::<R, S>).post(submit_handler::<R, S>),
        )
        .route(
            "/api/v1/scholarship/applications/:application_id",
            get(detail_handler::<R, S>).patch(transition_handler::<R, S>),
        )
        .route(
            "/api/v1/scholarship/applications/:application_id/documents",
            get(documents_handler::<R, S>),
        )
        .layer(DefaultBodyLimit::max(MAX_SUBMISSION_BYTES))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    status: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransitionRequest {
    status: String,
}

pub(crate) async fn submit_handler<R, S>(
    State(service): State<Arc<ApplicationService<R, S>>>,
    axum::Json(payload): axum::Json<SubmissionPayload>,
) -> Response
where
    R: ApplicationRepository + 'static,
    S: ObjectStorage + 'static,
{
    match service.submit(payload) {
        Ok(record) => {
            let body = json!({ "applicationId": record.id });
            (StatusCode::CREATED, axum::Json(body)).into_response()
        }
        Err(ApplicationServiceError::Validation(error)) => {
            let payload = json!({
                "error": error.to_string(),
                "unmet": error.unmet,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(ApplicationServiceError::Repository(RepositoryError::Conflict)) => {
            error_response(StatusCode::CONFLICT, "application already exists")
        }
        Err(other) => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

pub(crate) async fn detail_handler<R, S>(
    State(service): State<Arc<ApplicationService<R, S>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    S: ObjectStorage + 'static,
{
    let id = match parse_id(&application_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match service.get(&id) {
        Ok(record) => (StatusCode::OK, axum::Json(record.view())).into_response(),
        Err(err) => service_error_response(&id, err),
    }
}

pub(crate) async fn list_handler<R, S>(
    State(service): State<Arc<ApplicationService<R, S>>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: ApplicationRepository + 'static,
    S: ObjectStorage + 'static,
{
    let status = match query.status.as_deref() {
        None => ApplicationStatus::Pending,
        Some(raw) => match ApplicationStatus::from_label(raw) {
            Some(status) => status,
            None => return unknown_status(raw),
        },
    };

    match service.list(status, query.limit.unwrap_or(DEFAULT_LIST_LIMIT)) {
        Ok(records) => {
            let views: Vec<ApplicationView> = records.iter().map(|record| record.view()).collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(other) => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

pub(crate) async fn transition_handler<R, S>(
    State(service): State<Arc<ApplicationService<R, S>>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<TransitionRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    S: ObjectStorage + 'static,
{
    let id = match parse_id(&application_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let Some(next) = ApplicationStatus::from_label(&request.status) else {
        return unknown_status(&request.status);
    };

    match service.transition(&id, next) {
        Ok(record) => (StatusCode::OK, axum::Json(record.view())).into_response(),
        Err(ApplicationServiceError::Transition(illegal)) => {
            let payload = json!({
                "error": illegal.to_string(),
                "status": illegal.from.label(),
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(err) => service_error_response(&id, err),
    }
}

pub(crate) async fn documents_handler<R, S>(
    State(service): State<Arc<ApplicationService<R, S>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    S: ObjectStorage + 'static,
{
    let id = match parse_id(&application_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match service.documents(&id) {
        Ok(documents) => (StatusCode::OK, axum::Json(documents)).into_response(),
        Err(err) => service_error_response(&id, err),
    }
}

fn parse_id(raw: &str) -> Result<ApplicationId, Response> {
    raw.parse::<ApplicationId>().map_err(|_| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("'{raw}' is not a valid application id"),
        )
    })
}

fn unknown_status(raw: &str) -> Response {
    let payload = json!({
        "error": format!("unknown application status '{raw}'"),
        "allowed": ApplicationStatus::ordered().map(|status| status.label()),
    });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}

fn service_error_response(id: &ApplicationId, err: ApplicationServiceError) -> Response {
    match err {
        ApplicationServiceError::Repository(RepositoryError::NotFound) => {
            let payload = json!({
                "error": "application not found",
                "applicationId": id,
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({
        "error": message.into(),
    });
    (status, axum::Json(payload)).into_response()
}
