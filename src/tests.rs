// HTTP tests for the account API
// Runs the full router over in-memory collaborators; no database required

use super::*;
use crate::auth::{
    models::UserId,
    repository::RepositoryError,
    token::{TokenManager, TokenTtl},
};
use crate::test_support::{CountingHasher, InMemoryUserRepository};
use axum::{
    body::Bytes,
    http::{HeaderName, StatusCode},
};
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use std::time::Duration;

const SIGNING_KEY: &str = "http-test-signing-key";

// ============================================================================
// Test Helpers
// ============================================================================

fn create_test_app_with(
    users: InMemoryUserRepository,
    timeout: Duration,
) -> (TestServer, Arc<InMemoryUserRepository>) {
    let users = Arc::new(users);
    let tokens = JwtManager::new(SIGNING_KEY, TokenTtl::default()).unwrap();
    let auth = AuthService::new(
        users.clone(),
        Arc::new(CountingHasher::default()),
        Arc::new(tokens),
        timeout,
    );
    let app = create_router(AppState {
        auth: Arc::new(auth),
        app_name: "account-api".to_string(),
    });

    (TestServer::new(app).unwrap(), users)
}

fn create_test_app() -> TestServer {
    create_test_app_with(InMemoryUserRepository::new(), Duration::from_secs(2)).0
}

fn alice() -> Value {
    json!({
        "name": "alice",
        "email": "a@x.com",
        "password": "secret1"
    })
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

fn error_body(response: &TestResponse) -> (u16, String, Value) {
    let body: Value = response.json();
    (
        body["status"].as_u64().unwrap() as u16,
        body["error"].as_str().unwrap().to_string(),
        body["data"]["message"].clone(),
    )
}

async fn register_alice(server: &TestServer) -> TokenPair {
    let response = server.post("/api/v1/auth/register").json(&alice()).await;
    response.assert_status(StatusCode::CREATED);
    response.json::<TokenPair>()
}

// ============================================================================
// Registration (POST /api/v1/auth/register)
// ============================================================================

#[tokio::test]
async fn test_register_returns_token_pair() {
    let server = create_test_app();

    let pair = register_alice(&server).await;

    assert!(!pair.access_token.is_empty());
    assert!(!pair.refresh_token.is_empty());
}

#[tokio::test]
async fn test_register_same_user_twice_is_duplicate_identity() {
    let server = create_test_app();
    register_alice(&server).await;

    let response = server.post("/api/v1/auth/register").json(&alice()).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({
        "status": 400,
        "error": "DUPLICATE_IDENTITY",
        "data": { "message": "username or email already exists" }
    }));
}

#[tokio::test]
async fn test_register_same_email_different_case_is_duplicate() {
    let server = create_test_app();
    register_alice(&server).await;

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({ "name": "alice2", "email": "A@X.COM", "password": "secret1" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_body(&response).1, "DUPLICATE_IDENTITY");
}

#[tokio::test]
async fn test_register_race_is_duplicate_identity() {
    // pre-check misses the existing row; the unique constraint catches it
    let (server, users) = create_test_app_with(
        InMemoryUserRepository::new().with_blind_precheck(),
        Duration::from_secs(2),
    );
    register_alice(&server).await;

    let response = server.post("/api/v1/auth/register").json(&alice()).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_body(&response).1, "DUPLICATE_IDENTITY");
    assert_eq!(users.len(), 1);
}

#[tokio::test]
async fn test_register_short_password_is_bad_request() {
    let server = create_test_app();

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({ "name": "alice", "email": "a@x.com", "password": "123" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let (status, code, message) = error_body(&response);
    assert_eq!(status, 400);
    assert_eq!(code, "BAD_REQUEST");
    assert_eq!(message, json!("invalid password, min length 6"));
}

#[tokio::test]
async fn test_register_name_with_at_sign_is_bad_request() {
    let server = create_test_app();

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({ "name": "b@x.com", "email": "a@x.com", "password": "secret1" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let (_, code, message) = error_body(&response);
    assert_eq!(code, "BAD_REQUEST");
    assert_eq!(message, json!("invalid name, must not contain '@'"));
}

#[tokio::test]
async fn test_register_invalid_email_is_bad_request() {
    let server = create_test_app();

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({ "name": "alice", "email": "not-an-email", "password": "secret1" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_body(&response).2, json!("invalid email"));
}

#[tokio::test]
async fn test_register_malformed_json_is_bad_request() {
    let server = create_test_app();

    let response = server
        .post("/api/v1/auth/register")
        .content_type("application/json")
        .bytes(Bytes::from_static(b"{\"name\": \"alice\", "))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let (_, code, message) = error_body(&response);
    assert_eq!(code, "BAD_REQUEST");
    assert_eq!(message, json!("invalid request body"));
}

#[tokio::test]
async fn test_register_storage_failure_is_redacted() {
    let (server, _) = create_test_app_with(
        InMemoryUserRepository::new()
            .failing_with(RepositoryError::Driver("password column missing".to_string())),
        Duration::from_secs(2),
    );

    let response = server.post("/api/v1/auth/register").json(&alice()).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.assert_json(&json!({
        "status": 500,
        "error": "INTERNAL_FAILURE",
        "data": { "message": "internal server error" }
    }));
}

#[tokio::test]
async fn test_register_slow_storage_is_request_timeout() {
    let (server, _) = create_test_app_with(
        InMemoryUserRepository::new().with_latency(Duration::from_millis(200)),
        Duration::from_millis(20),
    );

    let response = server.post("/api/v1/auth/register").json(&alice()).await;

    response.assert_status(StatusCode::REQUEST_TIMEOUT);
    assert_eq!(error_body(&response).1, "REQUEST_TIMEOUT");
}

// ============================================================================
// Login and refresh
// ============================================================================

#[tokio::test]
async fn test_login_by_name_or_email() {
    let server = create_test_app();
    register_alice(&server).await;

    for login in ["alice", "a@x.com"] {
        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({ "login": login, "password": "secret1" }))
            .await;
        response.assert_status_ok();
        assert!(!response.json::<TokenPair>().access_token.is_empty());
    }
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let server = create_test_app();
    register_alice(&server).await;

    let wrong_password = server
        .post("/api/v1/auth/login")
        .json(&json!({ "login": "alice", "password": "wrong-password" }))
        .await;
    let unknown_user = server
        .post("/api/v1/auth/login")
        .json(&json!({ "login": "mallory", "password": "secret1" }))
        .await;

    wrong_password.assert_status(StatusCode::UNAUTHORIZED);
    unknown_user.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.text(), unknown_user.text());
}

#[tokio::test]
async fn test_login_empty_password_is_required_message() {
    let server = create_test_app();

    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "login": "alice", "password": "" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_body(&response).2, json!("password is required"));
}

#[tokio::test]
async fn test_refresh_rotates_tokens() {
    let server = create_test_app();
    let pair = register_alice(&server).await;

    let response = server
        .post("/api/v1/auth/refresh")
        .json(&json!({ "refresh_token": pair.refresh_token }))
        .await;

    response.assert_status_ok();
    let rotated = response.json::<TokenPair>();
    let tokens = JwtManager::new(SIGNING_KEY, TokenTtl::default()).unwrap();
    assert_eq!(
        tokens.parse(&rotated.access_token).unwrap(),
        tokens.parse(&pair.access_token).unwrap()
    );
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let server = create_test_app();
    let pair = register_alice(&server).await;

    let response = server
        .post("/api/v1/auth/refresh")
        .json(&json!({ "refresh_token": pair.access_token }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(error_body(&response).1, "UNAUTHORIZED");
}

// ============================================================================
// Protected endpoints
// ============================================================================

#[tokio::test]
async fn test_me_returns_profile_without_hash() {
    let server = create_test_app();
    let pair = register_alice(&server).await;

    let response = server
        .get("/api/v1/auth/me")
        .add_header(header::AUTHORIZATION, bearer(&pair.access_token))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["name"], "alice");
    assert_eq!(body["email"], "a@x.com");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_me_without_token_is_unauthorized() {
    let server = create_test_app();

    let response = server.get("/api/v1/auth/me").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(error_body(&response).0, 401);
}

#[tokio::test]
async fn test_token_signed_with_other_key_is_unauthorized() {
    let server = create_test_app();
    register_alice(&server).await;
    let forged = JwtManager::new("some-other-key", TokenTtl::default())
        .unwrap()
        .issue_access_token(UserId::new(1))
        .unwrap();

    let response = server
        .get("/api/v1/auth/me")
        .add_header(header::AUTHORIZATION, bearer(&forged))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_user_by_id() {
    let server = create_test_app();
    let pair = register_alice(&server).await;

    let found = server
        .get("/api/v1/users/1")
        .add_header(header::AUTHORIZATION, bearer(&pair.access_token))
        .await;
    found.assert_status_ok();
    assert_eq!(found.json::<Value>()["name"], "alice");

    let missing = server
        .get("/api/v1/users/999")
        .add_header(header::AUTHORIZATION, bearer(&pair.access_token))
        .await;
    missing.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(error_body(&missing).1, "NOT_FOUND");
}

#[tokio::test]
async fn test_get_user_malformed_id_echoes_message() {
    let server = create_test_app();
    let pair = register_alice(&server).await;

    let response = server
        .get("/api/v1/users/abc")
        .add_header(header::AUTHORIZATION, bearer(&pair.access_token))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        error_body(&response).2,
        json!("invalid user id 'abc': expected a positive integer")
    );
}

// ============================================================================
// Service surface
// ============================================================================

#[tokio::test]
async fn test_index_banner_and_headers() {
    let server = create_test_app();

    let response = server.get("/").await;

    response.assert_status_ok();
    response.assert_json(&json!({ "status": 200, "message": "account-api API v1" }));
    let headers = response.headers();
    assert_eq!(headers.get(header::SERVER).unwrap(), "account-api");
    assert!(headers
        .get(HeaderName::from_static("x-request-id"))
        .is_some());
}

#[tokio::test]
async fn test_openapi_document_lists_auth_paths() {
    let server = create_test_app();

    let response = server.get("/api-docs/openapi.json").await;

    response.assert_status_ok();
    let doc: Value = response.json();
    for path in [
        "/api/v1/auth/register",
        "/api/v1/auth/login",
        "/api/v1/auth/refresh",
        "/api/v1/auth/me",
        "/api/v1/users/{id}",
    ] {
        assert!(doc["paths"].get(path).is_some(), "missing path {}", path);
    }
    assert!(doc["components"]["securitySchemes"].get("bearer_auth").is_some());
}
