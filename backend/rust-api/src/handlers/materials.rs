use axum::{
    body::Bytes,
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
    models::material::{MaterialQuery, UploadQuery, UpsertMaterialRequest},
    services::{material_service::MaterialService, AppState},
};

fn material_service(state: &AppState) -> MaterialService {
    MaterialService::new(state.mongo.clone(), state.storage.clone())
}

/// PUT /api/v1/teacher/classes/{class_id}/materials/{topic_node_id}
pub async fn upsert_material(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((class_id, topic_node_id)): Path<(String, String)>,
    ValidJson(req): ValidJson<UpsertMaterialRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let material = material_service(&state)
        .upsert(&claims.sub, &class_id, &topic_node_id, req)
        .await?;
    Ok(Json(material))
}

/// GET /api/v1/teacher/classes/{class_id}/materials?tab=
pub async fn list_teacher_materials(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(class_id): Path<String>,
    Query(query): Query<MaterialQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let materials = material_service(&state)
        .list_for_teacher(&claims.sub, &class_id, query.tab)
        .await?;
    Ok(Json(materials))
}

/// GET /api/v1/student/classes/{class_id}/materials?tab=notes|videos|animations
pub async fn list_student_materials(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(class_id): Path<String>,
    Query(query): Query<MaterialQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let materials = material_service(&state)
        .list_for_student(&claims.sub, &class_id, query.tab)
        .await?;
    Ok(Json(materials))
}

/// POST /api/v1/teacher/classes/{class_id}/materials/{topic_node_id}/pdf?filename=
/// Тело запроса содержит сам файл.
pub async fn upload_material_pdf(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((class_id, topic_node_id)): Path<(String, String)>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Upload body is empty".to_string()));
    }

    let uploaded = material_service(&state)
        .upload_document(
            &claims.sub,
            &class_id,
            &topic_node_id,
            &query.filename,
            body.to_vec(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(uploaded)))
}

/// POST /api/v1/teacher/uploads/question-image?filename=
pub async fn upload_question_image(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Upload body is empty".to_string()));
    }

    let uploaded = material_service(&state)
        .upload_question_image(&claims.sub, &query.filename, body.to_vec())
        .await?;
    Ok((StatusCode::CREATED, Json(uploaded)))
}
