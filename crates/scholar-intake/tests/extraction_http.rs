//! The extraction client against live HTTP endpoints: signed requests, the
//! transport-level timeout, and status mapping.

mod common {
    use std::time::Duration;

    use scholar_intake::config::ExtractionConfig;

    pub(super) const SECRET: &str = "integration-secret";

    /// Serve `app` on an ephemeral local port and return its base URL.
    pub(super) async fn serve(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind local listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        format!("http://{addr}")
    }

    pub(super) fn config(base: &str, timeout: Duration) -> ExtractionConfig {
        ExtractionConfig {
            id_url: format!("{base}/id"),
            grades_url: format!("{base}/cog"),
            registration_url: format!("{base}/cor"),
            shared_secret: SECRET.to_string(),
            timeout,
        }
    }
}

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use common::*;
use scholar_intake::workflows::scholarship::intake::extraction::{
    ExtractionTransport, HttpExtractionTransport,
};
use scholar_intake::workflows::scholarship::intake::{
    ExtractionChannel, ExtractionError, SharedSecretSigner, StructuredExtractor,
    StructuredExtractorClient,
};

async fn id_channel(headers: HeaderMap, body: Bytes) -> (StatusCode, Json<Value>) {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    let signer = SharedSecretSigner::new(SECRET).expect("secret");
    let verified = token.is_some_and(|token| signer.verify(token, &body, Utc::now()).is_ok());
    if !verified {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad token" })));
    }

    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let first_name = if request["ocrText"].as_str().unwrap_or_default().contains("JUAN") {
        json!("Juan")
    } else {
        Value::Null
    };
    (
        StatusCode::OK,
        Json(json!({
            "first_name": { "value": first_name, "accuracy": 0.92 },
            "last_name": { "value": "Dela Cruz", "accuracy": 0.88 },
        })),
    )
}

#[tokio::test]
async fn configured_client_signs_requests_and_normalizes_fields() {
    let base = serve(axum::Router::new().route("/id", post(id_channel))).await;
    let client = StructuredExtractorClient::from_config(&config(&base, Duration::from_secs(5)))
        .expect("client builds");

    let fields = client
        .extract(ExtractionChannel::Id, "REPUBLIC JUAN DELA CRUZ", None, Some("user-7"))
        .await
        .expect("extracted")
        .expect("has data");

    assert_eq!(fields.text("first_name").as_deref(), Some("Juan"));
    assert_eq!(fields.text("last_name").as_deref(), Some("Dela Cruz"));
    let mean = fields.mean_accuracy().expect("accuracy recorded");
    assert!((mean - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn slow_channel_is_aborted_as_a_timeout() {
    let app = axum::Router::new().route(
        "/cog",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({}))
        }),
    );
    let base = serve(app).await;
    let transport = HttpExtractionTransport::new(Duration::from_millis(200)).expect("transport");

    let err = transport
        .post(&format!("{base}/cog"), "token", b"{}".to_vec())
        .await
        .expect_err("times out");

    assert!(matches!(err, ExtractionError::Timeout { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn channel_statuses_map_to_error_categories() {
    let app = axum::Router::new()
        .route(
            "/cog",
            post(|| async {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "error": "model warming up" })),
                )
            }),
        )
        .route(
            "/cor",
            post(|| async { (StatusCode::FORBIDDEN, Json(json!({ "error": "denied" }))) }),
        );
    let base = serve(app).await;
    let client = StructuredExtractorClient::from_config(&config(&base, Duration::from_secs(5)))
        .expect("client builds");

    let grades = client
        .extract(ExtractionChannel::Grades, "GWA 1.75", None, None)
        .await
        .expect_err("unavailable");
    assert!(matches!(
        grades,
        ExtractionError::ServiceUnavailable { status: 503, .. }
    ));
    assert!(grades.is_transient());

    let registration = client
        .extract(ExtractionChannel::Registration, "REGISTRATION", None, None)
        .await
        .expect_err("forbidden");
    assert!(matches!(registration, ExtractionError::AuthFailure(_)));
    assert!(!registration.is_transient());
}
