use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    errors::ApiError,
    extractors::ValidJson,
    middlewares::auth::JwtClaims,
    models::assignment::CreateAssignmentRequest,
    services::{assignment_service::AssignmentService, AppState},
};

/// POST /api/v1/teacher/classes/{class_id}/assignments
pub async fn create_assignment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(class_id): Path<String>,
    ValidJson(req): ValidJson<CreateAssignmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let assignment = AssignmentService::new(state.mongo.clone())
        .create(&claims.sub, &class_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn list_assignments(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(class_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let assignments = AssignmentService::new(state.mongo.clone())
        .list(&claims.sub, &class_id)
        .await?;
    Ok(Json(assignments))
}

pub async fn delete_assignment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(assignment_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    AssignmentService::new(state.mongo.clone())
        .delete(&claims.sub, &assignment_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/student/classes/{class_id}/assignments
pub async fn student_assignments(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(class_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let assignments = AssignmentService::new(state.mongo.clone())
        .for_student(&claims.sub, &class_id)
        .await?;
    Ok(Json(assignments))
}
