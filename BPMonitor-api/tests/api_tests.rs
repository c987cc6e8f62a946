use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Duration;
use serde_json::{json, Value};
use std::sync::Once;
use tower::ServiceExt;

use bp_monitor_api::api::{create_application, AppState};
use bp_monitor_data::Database;
use bp_monitor_domain::auth::oauth::GoogleOAuthConfig;
use bp_monitor_domain::auth::{AuthConfig, SignerKind, TokenConfig};
use bp_monitor_domain::sms::Notifier;

static INIT: Once = Once::new();

fn initialize() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

fn test_app(kind: SignerKind) -> Router {
    initialize();

    let db = Database::in_memory().expect("in-memory database");
    let tokens = TokenConfig {
        secret: "integration-test-secret".to_string(),
        expiry: Duration::hours(1),
        kind,
    };
    let google = GoogleOAuthConfig {
        client_id: String::new(),
        client_secret: String::new(),
        redirect_uri: "http://localhost:3000/api/v1/auth/google/callback".to_string(),
        userinfo_url: "http://localhost/userinfo".to_string(),
    };

    create_application(AppState::new(db, tokens, AuthConfig::default(), Notifier::log_only(), google))
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Registers `alice` and returns the login response body
async fn register_and_login(app: &Router) -> Value {
    let response = send(
        app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "correct-horse"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(
        app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn create_profile(app: &Router, token: &str, name: &str) -> Response {
    send(
        app,
        Method::POST,
        "/api/v1/profiles",
        Some(token),
        Some(json!({ "name": name, "gender": "Male", "age": 40 })),
    )
    .await
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app(SignerKind::Jwt);

    let response = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["components"]["database"]["status"], "ok");
    assert_eq!(body["components"]["api"]["status"], "ok");
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = test_app(SignerKind::Jwt);
    let login = register_and_login(&app).await;

    assert_eq!(login["token_type"], "Bearer");
    assert_eq!(login["user"]["username"], "alice");
    assert_eq!(login["user"]["is_email_verified"], false);

    // Both tokens authenticate
    for token_field in ["session_token", "access_token"] {
        let token = login[token_field].as_str().unwrap();
        let response = send(&app, Method::GET, "/api/v1/auth/me", Some(token), None).await;
        assert_eq!(response.status(), StatusCode::OK, "{} rejected", token_field);
        let me = body_json(response).await;
        assert_eq!(me["email"], "alice@example.com");
    }
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = test_app(SignerKind::Jwt);
    register_and_login(&app).await;

    let response = send(
        &app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({
            "username": "alice",
            "email": "other@example.com",
            "password": "correct-horse"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = body_json(response).await;
    assert_eq!(body["error"], "conflict");
    assert_eq!(body["message"], "Username already exists");
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = test_app(SignerKind::Jwt);
    register_and_login(&app).await;

    let response = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = test_app(SignerKind::Jwt);

    let response = send(&app, Method::GET, "/api/v1/profiles", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(body["message"], "Missing Authorization header");

    let response = send(&app, Method::GET, "/api/v1/profiles", Some("not-a-token"), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_public_education_routes() {
    let app = test_app(SignerKind::Jwt);

    let response = send(&app, Method::GET, "/api/v1/categories", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let categories = body_json(response).await;
    assert_eq!(categories.as_array().unwrap().len(), 5);

    let response = send(&app, Method::GET, "/api/v1/education", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_profile_limit() {
    let app = test_app(SignerKind::Jwt);
    let login = register_and_login(&app).await;
    let token = login["session_token"].as_str().unwrap();

    for i in 0..5 {
        let response = create_profile(&app, token, &format!("Person {}", i)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = create_profile(&app, token, "One too many").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"], "limit_reached");

    let response = send(&app, Method::GET, "/api/v1/profiles", Some(token), None).await;
    let profiles = body_json(response).await;
    assert_eq!(profiles.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_readings_statistics_and_export() {
    let app = test_app(SignerKind::Jwt);
    let login = register_and_login(&app).await;
    let token = login["access_token"].as_str().unwrap();

    let profile = body_json(create_profile(&app, token, "Sam").await).await;
    let profile_id = profile["id"].as_i64().unwrap();
    let readings_uri = format!("/api/v1/profiles/{}/readings", profile_id);

    // No readings yet
    let response = send(&app, Method::GET, &format!("{}/latest", readings_uri), Some(token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        Method::GET,
        &format!("/api/v1/analytics/statistics?profile_id={}", profile_id),
        Some(token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["statistics"].is_null());

    let response = send(
        &app,
        Method::POST,
        &readings_uri,
        Some(token),
        Some(json!({
            "systolic": 118,
            "diastolic": 76,
            "heart_rate": 64,
            "date": "2024-03-01",
            "time": "08:30"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let reading = body_json(response).await;
    assert_eq!(reading["category"], "Normal");
    assert_eq!(reading["profile_name"], "Sam");
    assert_eq!(reading["time"], "08:30");

    let response = send(
        &app,
        Method::POST,
        &readings_uri,
        Some(token),
        Some(json!({ "systolic": 142, "diastolic": 92, "date": "2024-03-02", "time": "09:00" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["category"], "Hypertension Stage 2");

    // Out of range values are rejected
    let response = send(
        &app,
        Method::POST,
        &readings_uri,
        Some(token),
        Some(json!({ "systolic": 300, "diastolic": 80 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "validation_error");

    let response = send(&app, Method::GET, &format!("{}/latest", readings_uri), Some(token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["systolic"], 142);

    let response = send(&app, Method::GET, "/api/v1/readings", Some(token), None).await;
    let all = body_json(response).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let response = send(
        &app,
        Method::GET,
        &format!("/api/v1/analytics/statistics?profile_id={}&range=all", profile_id),
        Some(token),
        None,
    )
    .await;
    let stats = body_json(response).await;
    assert_eq!(stats["range"], "all");
    assert_eq!(stats["statistics"]["count"], 2);
    assert_eq!(stats["statistics"]["max_systolic"], 142);
    assert_eq!(stats["statistics"]["min_diastolic"], 76);

    let response = send(&app, Method::GET, "/api/v1/analytics/charts", Some(token), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, Method::GET, "/api/v1/export/csv", Some(token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename="));
    assert!(disposition.ends_with(".csv\""));

    let csv = body_text(response).await;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Date,Time,Systolic"));
}

#[tokio::test]
async fn test_export_follows_profile_and_range() {
    let app = test_app(SignerKind::Jwt);
    let login = register_and_login(&app).await;
    let token = login["session_token"].as_str().unwrap();

    let mut ids = Vec::new();
    for name in ["Ana", "Ben"] {
        let profile = body_json(create_profile(&app, token, name).await).await;
        let id = profile["id"].as_i64().unwrap();
        let response = send(
            &app,
            Method::POST,
            &format!("/api/v1/profiles/{}/readings", id),
            Some(token),
            Some(json!({ "systolic": 120, "diastolic": 80, "date": "2024-03-01", "time": "08:00" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        ids.push(id);
    }

    let response = send(&app, Method::GET, "/api/v1/export/csv", Some(token), None).await;
    assert_eq!(body_text(response).await.lines().count(), 3);

    let uri = format!("/api/v1/export/csv?profile_id={}", ids[1]);
    let response = send(&app, Method::GET, &uri, Some(token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let csv = body_text(response).await;
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].contains("Ben"));

    // Readings dated 2024 fall outside the last week
    let uri = format!("/api/v1/export/csv?profile_id={}&range=7d", ids[0]);
    let response = send(&app, Method::GET, &uri, Some(token), None).await;
    assert_eq!(body_text(response).await.lines().count(), 1);

    let response = send(&app, Method::GET, "/api/v1/export/csv?profile_id=999", Some(token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_input_gets_json_errors() {
    let app = test_app(SignerKind::Jwt);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{bad"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let body = body_json(response).await;
    assert_eq!(body["error"], "validation_error");
    assert!(!body["message"].as_str().unwrap().is_empty());

    let login = register_and_login(&app).await;
    let token = login["session_token"].as_str().unwrap();

    let response = send(&app, Method::GET, "/api/v1/analytics/statistics?range=fortnight", Some(token), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "validation_error");

    let response = send(&app, Method::GET, "/api/v1/profiles/abc", Some(token), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "validation_error");

    // Well-formed JSON with a missing field
    let response = send(&app, Method::POST, "/api/v1/profiles", Some(token), Some(json!({ "name": "No age" }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "validation_error");
}

#[tokio::test]
async fn test_unknown_profile_and_reading() {
    let app = test_app(SignerKind::Jwt);
    let login = register_and_login(&app).await;
    let token = login["session_token"].as_str().unwrap();

    let response = send(&app, Method::GET, "/api/v1/profiles/999", Some(token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");

    let response = send(&app, Method::DELETE, "/api/v1/readings/999", Some(token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_alert_without_sms_gateway() {
    let app = test_app(SignerKind::Jwt);
    let login = register_and_login(&app).await;
    let token = login["session_token"].as_str().unwrap();

    let profile = body_json(create_profile(&app, token, "Sam").await).await;
    let reading = body_json(
        send(
            &app,
            Method::POST,
            &format!("/api/v1/profiles/{}/readings", profile["id"]),
            Some(token),
            Some(json!({ "systolic": 185, "diastolic": 121 })),
        )
        .await,
    )
    .await;
    let alert_uri = format!("/api/v1/readings/{}/alert", reading["id"]);

    // alice has no mobile number on file
    let response = send(&app, Method::POST, &alert_uri, Some(token), Some(json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        Method::POST,
        &alert_uri,
        Some(token),
        Some(json!({ "mobile": "5551234567" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"], "service_unavailable");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = test_app(SignerKind::Jwt);
    let login = register_and_login(&app).await;
    let token = login["session_token"].as_str().unwrap();

    let response = send(&app, Method::POST, "/api/v1/auth/logout", Some(token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Logged out successfully");

    let response = send(&app, Method::GET, "/api/v1/auth/me", Some(token), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_signed_token() {
    for kind in [SignerKind::Jwt, SignerKind::Fallback] {
        let app = test_app(kind);
        let login = register_and_login(&app).await;
        let token = login["access_token"].as_str().unwrap();

        let response = send(&app, Method::POST, "/api/v1/auth/logout", Some(token), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, Method::GET, "/api/v1/auth/me", Some(token), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{:?} token still accepted", kind);

        // The session issued at the same login is untouched
        let session = login["session_token"].as_str().unwrap();
        let response = send(&app, Method::GET, "/api/v1/auth/me", Some(session), None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_google_login_unconfigured() {
    let app = test_app(SignerKind::Jwt);

    let response = send(&app, Method::GET, "/api/v1/auth/google/login", None, None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_login_history_lists_sessions() {
    let app = test_app(SignerKind::Jwt);
    let login = register_and_login(&app).await;
    let token = login["session_token"].as_str().unwrap();

    let response = send(&app, Method::GET, "/api/v1/auth/history?limit=5", Some(token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let history = body_json(response).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}
