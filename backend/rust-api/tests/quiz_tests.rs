use std::sync::Arc;

use axum::{http::StatusCode, Router};
use classroom_api::models::{user::UserRole, DifficultyTier};
use serde_json::json;

mod common;
use common::{question, send, wait_for_phase, InMemorySink, InMemoryStore};

fn tiered_store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::with_plan(common::plan(
        "a1",
        vec![
            question("low-1", DifficultyTier::Low),
            question("low-2", DifficultyTier::Low),
            question("mid-1", DifficultyTier::Medium),
            question("mid-2", DifficultyTier::Medium),
            question("high-1", DifficultyTier::High),
            question("high-2", DifficultyTier::High),
        ],
        Vec::new(),
    )))
}

async fn start_quiz(app: &Router, token: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/quizzes",
        Some(token),
        Some(json!({ "assignment_id": "a1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["phase"], "presenting");
    assert_eq!(body["number"], 1);
    assert_eq!(body["total"], 5);
    assert_eq!(body["tier"], "low");
    assert_eq!(body["question"]["id"], "low-1");
    body["quiz_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_correct_streak_climbs_tiers_and_logs_every_attempt() {
    let sink = Arc::new(InMemorySink::default());
    let app = common::create_test_app(tiered_store(), sink.clone()).await;
    let student = common::token("student-1", UserRole::Student);

    let quiz_id = start_quiz(&app, &student).await;
    let quiz_uri = format!("/api/v1/quizzes/{}", quiz_id);

    let expected_tiers = ["medium", "high", "high", "high"];
    for number in 1..=5 {
        let (status, body) = send(
            &app,
            "POST",
            &format!("{}/answers", quiz_uri),
            Some(&student),
            Some(json!({ "answer": "right", "confidence": "high" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["phase"], "feedback");
        assert_eq!(body["feedback"]["correct"], true);
        assert_eq!(body["score"], number);

        if number < 5 {
            let view = wait_for_phase(&app, &quiz_uri, &student, "presenting").await;
            assert_eq!(view["number"], number + 1);
            assert_eq!(view["tier"], expected_tiers[number - 1]);
            assert_eq!(view["question"]["difficulty"], expected_tiers[number - 1]);
        }
    }

    let view = wait_for_phase(&app, &quiz_uri, &student, "finished").await;
    assert_eq!(view["score"], 5);
    assert!(view.get("question").is_none());

    let (_, health) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(health["active_quizzes"], 0);
    let (status, _) = send(
        &app,
        "POST",
        &format!("{}/answers", quiz_uri),
        Some(&student),
        Some(json!({ "answer": "right" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let attempts = sink.attempts.lock().unwrap();
    assert_eq!(attempts.len(), 5);
    assert_eq!(
        attempts
            .iter()
            .map(|a| a.question_difficulty)
            .collect::<Vec<_>>(),
        vec![0, 1, 2, 2, 2]
    );
    assert!(attempts.iter().all(|a| a.correctness == 1));
    assert!(attempts.iter().all(|a| a.student_confidence == 2));
    assert!(attempts.iter().all(|a| a.quiz_id == quiz_id));
    assert!(attempts.iter().all(|a| a.student_id == "student-1"));
}

#[tokio::test]
async fn test_wrong_answer_at_lowest_tier_stays_low() {
    let sink = Arc::new(InMemorySink::default());
    let app = common::create_test_app(tiered_store(), sink.clone()).await;
    let student = common::token("student-1", UserRole::Student);

    let quiz_id = start_quiz(&app, &student).await;
    let quiz_uri = format!("/api/v1/quizzes/{}", quiz_id);

    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/answers", quiz_uri),
        Some(&student),
        Some(json!({ "answer": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feedback"]["correct"], false);
    assert_eq!(body["score"], 0);

    let view = wait_for_phase(&app, &quiz_uri, &student, "presenting").await;
    assert_eq!(view["tier"], "low");

    let attempts = sink.attempts.lock().unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].correctness, 0);
    // Confidence defaults to medium
    assert_eq!(attempts[0].student_confidence, 1);
}

#[tokio::test]
async fn test_empty_answer_is_ignored_and_feedback_blocks_answers() {
    let sink = Arc::new(InMemorySink::default());
    let mut config = common::test_config();
    config.flow.quiz_feedback_delay_ms = 5_000;
    let app = common::create_test_app_with_config(config, tiered_store(), sink.clone()).await;
    let student = common::token("student-1", UserRole::Student);

    let quiz_id = start_quiz(&app, &student).await;
    let answers_uri = format!("/api/v1/quizzes/{}/answers", quiz_id);

    let (status, body) = send(&app, "POST", &answers_uri, Some(&student), Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "presenting");
    assert_eq!(body["number"], 1);
    assert!(sink.attempts.lock().unwrap().is_empty());

    let (status, _) = send(
        &app,
        "POST",
        &answers_uri,
        Some(&student),
        Some(json!({ "answer": "right" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        &answers_uri,
        Some(&student),
        Some(json!({ "answer": "right" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);
}

#[tokio::test]
async fn test_mastery_needs_attempt_history() {
    let app =
        common::create_test_app(tiered_store(), Arc::new(InMemorySink::default())).await;
    let student = common::token("student-1", UserRole::Student);

    let quiz_id = start_quiz(&app, &student).await;
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/quizzes/{}/mastery", quiz_id),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_quiz_without_low_tier_cannot_start() {
    let store = Arc::new(InMemoryStore::with_plan(common::plan(
        "a1",
        vec![question("mid-1", DifficultyTier::Medium)],
        Vec::new(),
    )));
    let app = common::create_test_app(store, Arc::new(InMemorySink::default())).await;
    let student = common::token("student-1", UserRole::Student);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/quizzes",
        Some(&student),
        Some(json!({ "assignment_id": "a1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().unwrap().contains("low"));
}

#[tokio::test]
async fn test_closed_quiz_is_gone() {
    let app =
        common::create_test_app(tiered_store(), Arc::new(InMemorySink::default())).await;
    let student = common::token("student-1", UserRole::Student);

    let quiz_id = start_quiz(&app, &student).await;
    let quiz_uri = format!("/api/v1/quizzes/{}", quiz_id);

    let (status, _) = send(&app, "DELETE", &quiz_uri, Some(&student), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &quiz_uri, Some(&student), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
