use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    errors::ApiError,
    extractors::ValidJson,
    middlewares::auth::JwtClaims,
    models::question::{CreateQuestionRequest, QuestionFilter, UpdateQuestionRequest},
    services::{question_service::QuestionService, AppState},
};

pub async fn create_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidJson(req): ValidJson<CreateQuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let question = QuestionService::new(state.mongo.clone())
        .create(&claims.sub, req)
        .await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// GET /api/v1/teacher/questions?search=&difficulty=&tags=a,b
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<QuestionFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let questions = QuestionService::new(state.mongo.clone())
        .list(&filter)
        .await?;
    Ok(Json(questions))
}

pub async fn get_question(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let question = QuestionService::new(state.mongo.clone())
        .get(&question_id)
        .await?;
    Ok(Json(question))
}

pub async fn update_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(question_id): Path<String>,
    ValidJson(req): ValidJson<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let question = QuestionService::new(state.mongo.clone())
        .update(&question_id, &claims.sub, req)
        .await?;
    Ok(Json(question))
}

pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(question_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    QuestionService::new(state.mongo.clone())
        .delete(&question_id, &claims.sub)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
