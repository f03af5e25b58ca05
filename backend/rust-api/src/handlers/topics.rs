use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    errors::ApiError,
    extractors::{AppJson, ValidJson},
    middlewares::auth::JwtClaims,
    models::topic::{
        CreateTopicRequest, PlaceTopicRequest, SaveGraphRequest, SaveTimelineRequest,
        TopicSearchQuery,
    },
    services::{topic_service::TopicService, AppState},
};

/// GET /api/v1/teacher/topics?search=
pub async fn list_topics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopicSearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let topics = TopicService::new(state.mongo.clone())
        .list_topics(query.search.as_deref())
        .await?;
    Ok(Json(topics))
}

pub async fn create_topic(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<CreateTopicRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let topic = TopicService::new(state.mongo.clone())
        .create_topic(req)
        .await?;
    Ok((StatusCode::CREATED, Json(topic)))
}

pub async fn get_timeline(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(class_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let timeline = TopicService::new(state.mongo.clone())
        .timeline(&claims.sub, &class_id)
        .await?;
    Ok(Json(timeline))
}

/// POST /api/v1/teacher/classes/{class_id}/timeline/topics
pub async fn place_topic(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(class_id): Path<String>,
    ValidJson(req): ValidJson<PlaceTopicRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let timeline = TopicService::new(state.mongo.clone())
        .place(&claims.sub, &class_id, req)
        .await?;
    Ok(Json(timeline))
}

/// DELETE /api/v1/teacher/classes/{class_id}/timeline/weeks/{week}/{index}
pub async fn remove_topic(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((class_id, week, index)): Path<(String, u32, usize)>,
) -> Result<impl IntoResponse, ApiError> {
    let timeline = TopicService::new(state.mongo.clone())
        .remove(&claims.sub, &class_id, week, index)
        .await?;
    Ok(Json(timeline))
}

pub async fn save_timeline(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(class_id): Path<String>,
    AppJson(req): AppJson<SaveTimelineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let timeline = TopicService::new(state.mongo.clone())
        .save_timeline(&claims.sub, &class_id, req)
        .await?;
    Ok(Json(timeline))
}

pub async fn get_graph(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(class_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let graph = TopicService::new(state.mongo.clone())
        .graph(&claims.sub, &class_id)
        .await?;
    Ok(Json(graph))
}

/// PUT /api/v1/teacher/classes/{class_id}/graph (replace-all)
pub async fn save_graph(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(class_id): Path<String>,
    AppJson(req): AppJson<SaveGraphRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let graph = TopicService::new(state.mongo.clone())
        .save_graph(&claims.sub, &class_id, req)
        .await?;
    Ok(Json(graph))
}
