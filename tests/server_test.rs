//! Relay endpoints exercised through the router without a socket.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tokio::sync::Notify;
use tower::ServiceExt;

use tollgate::engine::test::Harness;
use tollgate::health::MemberStoreCheck;
use tollgate::server::{
    self, AppState, HmacSha256Verifier, NoVerification, RelayVerifier, SIGNATURE_HEADER,
};
use tollgate::HealthChecker;

const SECRET: &str = "relay-secret";

fn app(h: &Harness, verifier: Arc<dyn RelayVerifier>, fatal: Arc<Notify>) -> Router {
    let health = HealthChecker::new().with_check(Arc::new(MemberStoreCheck::new(h.engine.clone())));
    server::router(AppState {
        engine: h.engine.clone(),
        verifier,
        health: Arc::new(health),
        fatal,
    })
}

fn signed(uri: &str, body: &str) -> Request<Body> {
    let signature = HmacSha256Verifier::new(SECRET).sign(body.as_bytes()).unwrap();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, format!("sha256={}", signature))
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_signed_button_press_returns_replies() {
    let h = Harness::new();
    let app = app(&h, Arc::new(HmacSha256Verifier::new(SECRET)), Arc::new(Notify::new()));

    let response = app
        .oneshot(signed(
            "/relay/interaction",
            r#"{"userId":"42","customId":"1m"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let reply = &body["replies"][0];
    assert_eq!(reply["ephemeral"], true);
    assert_eq!(reply["buttons"][0]["customId"], "pay_VN");
    assert!(h.engine.record("42").await.is_some());
}

#[tokio::test]
async fn test_unsigned_request_is_rejected() {
    let h = Harness::new();
    let app = app(&h, Arc::new(HmacSha256Verifier::new(SECRET)), Arc::new(Notify::new()));

    let request = Request::builder()
        .method("POST")
        .uri("/relay/interaction")
        .body(Body::from(r#"{"userId":"42","customId":"1m"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(h.engine.record("42").await.is_none());
}

#[tokio::test]
async fn test_tampered_body_is_rejected() {
    let h = Harness::new();
    let app = app(&h, Arc::new(HmacSha256Verifier::new(SECRET)), Arc::new(Notify::new()));

    let mut request = signed("/relay/interaction", r#"{"userId":"42","customId":"1m"}"#);
    *request.body_mut() = Body::from(r#"{"userId":"42","customId":"1y"}"#);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let h = Harness::new();
    let app = app(&h, Arc::new(NoVerification), Arc::new(Notify::new()));

    let response = app
        .oneshot(signed("/relay/message", r#"{"attachments":[]}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bill_message_without_plan_gets_public_reply() {
    let h = Harness::new();
    let app = app(&h, Arc::new(NoVerification), Arc::new(Notify::new()));

    let body = r#"{
        "authorId": "42",
        "attachments": [
            {"url": "https://cdn.example/bill.png", "fileName": "bill.png", "contentType": "image/png"}
        ]
    }"#;
    let response = app.oneshot(signed("/relay/message", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["replies"][0]["ephemeral"], false);
    assert!(h.attachments.stored_paths().is_empty());
}

#[tokio::test]
async fn test_fatal_error_notifies_shutdown() {
    let h = Harness::new();
    let fatal = Arc::new(Notify::new());
    let app = app(&h, Arc::new(NoVerification), fatal.clone());
    h.snapshot.fail_writes(true);

    let response = app
        .oneshot(signed(
            "/relay/interaction",
            r#"{"userId":"42","customId":"1m"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    // notify_one stores a permit, so this resolves immediately
    tokio::time::timeout(std::time::Duration::from_secs(1), fatal.notified())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_health_reports_member_count() {
    let h = Harness::new();
    h.press("42", "1m", 1_000).await;
    let app = app(&h, Arc::new(NoVerification), Arc::new(Notify::new()));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"][0]["message"], "1 members loaded");
}
