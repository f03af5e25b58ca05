use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use std::sync::Arc;

use crate::{
    errors::ApiError,
    extractors::ValidJson,
    middlewares::auth::JwtClaims,
    models::class::{CreateClassRequest, JoinClassRequest},
    services::{class_service::ClassService, AppState},
};

/// POST /api/v1/teacher/classes
pub async fn create_class(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidJson(req): ValidJson<CreateClassRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let class = ClassService::new(state.mongo.clone())
        .create(&claims.sub, req)
        .await?;
    Ok((StatusCode::CREATED, Json(class)))
}

/// GET /api/v1/teacher/classes
pub async fn list_teacher_classes(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let classes = ClassService::new(state.mongo.clone())
        .list_for_teacher(&claims.sub)
        .await?;
    Ok(Json(classes))
}

/// GET /api/v1/student/classes
pub async fn list_student_classes(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let classes = ClassService::new(state.mongo.clone())
        .list_for_student(&claims.sub)
        .await?;
    Ok(Json(classes))
}

/// POST /api/v1/student/classes/join
pub async fn join_class(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidJson(req): ValidJson<JoinClassRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let class = ClassService::new(state.mongo.clone())
        .join(&claims.sub, req)
        .await?;
    Ok(Json(class))
}
