use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::scholarship::review::domain::ApplicationStatus;
use crate::workflows::scholarship::review::service::ApplicationService;

fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn submit_route_returns_created_with_application_id() {
    let (service, repository, _) = build_service();
    let router = application_router_with_service(service);
    let payload = serde_json::to_value(submission()).expect("payload json");

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/scholarship/applications",
            &payload,
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    let id = body["applicationId"].as_str().expect("application id");
    assert!(repository
        .records
        .lock()
        .expect("records")
        .keys()
        .any(|key| key.to_string() == id));
}

#[tokio::test]
async fn submit_handler_returns_unprocessable_for_incomplete_payload() {
    let (service, _, _) = build_service();
    let mut payload = submission();
    payload.face_match.is_match = false;

    let response = crate::workflows::scholarship::review::router::submit_handler::<
        MemoryRepository,
        MemoryStorage,
    >(State(Arc::new(service)), axum::Json(payload))
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["unmet"][0]["requirement"], "face_match");
}

#[tokio::test]
async fn submit_handler_returns_internal_error_on_repository_failure() {
    let service = Arc::new(ApplicationService::new(
        Arc::new(UnavailableRepository),
        Arc::new(MemoryStorage::default()),
    ));

    let response = crate::workflows::scholarship::review::router::submit_handler::<
        UnavailableRepository,
        MemoryStorage,
    >(State(service), axum::Json(submission()))
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn patch_route_applies_legal_transition_and_refuses_terminal_ones() {
    let (service, _, _) = build_service();
    let record = service.submit(submission()).expect("seeded");
    let router = application_router_with_service(service);
    let uri = format!("/api/v1/scholarship/applications/{}", record.id);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &uri,
            &json!({ "status": "APPROVED" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "APPROVED");

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &uri,
            &json!({ "status": "UNDER_REVIEW" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "APPROVED");

    let response = router
        .oneshot(get_request(&uri))
        .await
        .expect("router responds");
    let body = read_json_body(response).await;
    assert_eq!(body["status"], ApplicationStatus::Approved.label());
}

#[tokio::test]
async fn patch_route_rejects_unknown_status_and_unknown_ids() {
    let (service, _, _) = build_service();
    let record = service.submit(submission()).expect("seeded");
    let router = application_router_with_service(service);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/api/v1/scholarship/applications/{}", record.id),
            &json!({ "status": "ARCHIVED" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!(
                "/api/v1/scholarship/applications/{}",
                uuid::Uuid::new_v4()
            ),
            &json!({ "status": "APPROVED" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .oneshot(get_request("/api/v1/scholarship/applications/not-a-uuid"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_route_defaults_to_pending_and_validates_status() {
    let (service, _, _) = build_service();
    let first = service.submit(submission()).expect("first");
    service.submit(submission()).expect("second");
    service
        .transition(&first.id, ApplicationStatus::UnderReview)
        .expect("reviewing");
    let router = application_router_with_service(service);

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/scholarship/applications"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let response = router
        .clone()
        .oneshot(get_request(
            "/api/v1/scholarship/applications?status=under_review&limit=5",
        ))
        .await
        .expect("router responds");
    let body = read_json_body(response).await;
    assert_eq!(body[0]["applicationId"], first.id.to_string());
    assert_eq!(body[0]["fullName"], "Juan Dela Cruz");

    let response = router
        .oneshot(get_request("/api/v1/scholarship/applications?status=LOST"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn documents_route_returns_ocr_and_certificates() {
    let (service, _, _) = build_service();
    let record = service.submit(submission()).expect("seeded");
    let router = application_router_with_service(service);

    let response = router
        .oneshot(get_request(&format!(
            "/api/v1/scholarship/applications/{}/documents",
            record.id
        )))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["ocrRecords"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["grades"]["gwa"], 1.75);
    assert_eq!(body["registration"], Value::Null);
}
