use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use classroom_api::models::user::UserRole;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{send, InMemorySink, InMemoryStore};

async fn app() -> axum::Router {
    common::create_test_app(
        Arc::new(InMemoryStore::default()),
        Arc::new(InMemorySink::default()),
    )
    .await
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = app().await;

    for uri in [
        "/api/v1/auth/me",
        "/api/v1/teacher/classes",
        "/api/v1/student/classes",
        "/api/v1/quizzes/some-quiz",
    ] {
        let (status, _) = send(&app, "GET", uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
    }

    let (status, _) = send(
        &app,
        "GET",
        "/api/v1/teacher/classes",
        Some("not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tokens_signed_with_another_secret_are_rejected() {
    let app = app().await;
    let forged = classroom_api::middlewares::auth::JwtService::new("some-other-secret")
        .generate_token(&classroom_api::middlewares::auth::JwtClaims::new(
            "teacher-1",
            UserRole::Teacher,
            3600,
        ))
        .unwrap();

    let (status, _) = send(&app, "GET", "/api/v1/teacher/classes", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_guards() {
    let app = app().await;
    let teacher = common::token("teacher-1", UserRole::Teacher);
    let student = common::token("student-1", UserRole::Student);

    let (status, _) = send(&app, "GET", "/api/v1/student/classes", Some(&teacher), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "GET", "/api/v1/teacher/classes", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/assessments",
        Some(&teacher),
        Some(json!({ "assignment_id": "a1" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_register_and_login_validate_input() {
    let app = app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({
            "email": "not-an-email",
            "password": "secret-password",
            "name": "Ada",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["message"].as_str().unwrap().contains("Validation error"));

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({
            "email": "ada@example.com",
            "password": "short",
            "name": "Ada",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "ada@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Failed to parse JSON request body"));
}

#[tokio::test]
#[serial_test::serial]
async fn test_metrics_require_basic_auth() {
    std::env::set_var("METRICS_AUTH", "scraper:s3cret");
    let app = app().await;

    let (status, _) = send(&app, "GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let credentials = general_purpose::STANDARD.encode("scraper:s3cret");
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header("authorization", format!("Basic {}", credentials))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-trace-id"));

    std::env::remove_var("METRICS_AUTH");
}
