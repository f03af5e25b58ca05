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
    models::assessment::{FlowActionRequest, OpenFlowRequest},
    services::AppState,
};

/// POST /api/v1/assessments - открыть задание в режиме flow
pub async fn open_flow(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<OpenFlowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .assessments
        .open(&claims.sub, &req.assignment_id)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/assessments/{id}
///
/// Clients poll this while the flow sits in feedback.
pub async fn get_flow(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(flow_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.assessments.view(&flow_id, &claims.sub).await?;
    Ok(Json(view))
}

/// POST /api/v1/assessments/{id}/actions
pub async fn flow_action(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(flow_id): Path<String>,
    AppJson(action): AppJson<FlowActionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .assessments
        .act(&flow_id, &claims.sub, action)
        .await?;
    Ok(Json(view))
}

/// DELETE /api/v1/assessments/{id}
pub async fn close_flow(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(flow_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.assessments.abandon(&flow_id, &claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}
