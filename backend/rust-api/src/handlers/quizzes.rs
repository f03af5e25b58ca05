use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    errors::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::assessment::{QuizAnswerRequest, StartQuizRequest},
    services::AppState,
};

/// POST /api/v1/quizzes
pub async fn start_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<StartQuizRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .quizzes
        .start(&claims.sub, &req.assignment_id)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.quizzes.view(&quiz_id, &claims.sub).await?;
    Ok(Json(view))
}

/// POST /api/v1/quizzes/{id}/answers
pub async fn answer_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
    AppJson(req): AppJson<QuizAnswerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.quizzes.answer(&quiz_id, &claims.sub, req).await?;
    Ok(Json(view))
}

/// GET /api/v1/quizzes/{id}/mastery
pub async fn quiz_mastery(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let forecast = state
        .quizzes
        .mastery(&quiz_id, &claims.sub, &state.kt)
        .await?;
    Ok(Json(forecast))
}

pub async fn close_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.quizzes.abandon(&quiz_id, &claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}
