use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::flow::{FlowError, QuizError};
use crate::services::assessment_store::PlanError;

/// Domain failures raised inside services and carried through `anyhow`
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Upstream(String),
}

impl ServiceError {
    pub fn not_found(message: impl Into<String>) -> anyhow::Error {
        ServiceError::NotFound(message.into()).into()
    }

    pub fn forbidden(message: impl Into<String>) -> anyhow::Error {
        ServiceError::Forbidden(message.into()).into()
    }

    pub fn conflict(message: impl Into<String>) -> anyhow::Error {
        ServiceError::Conflict(message.into()).into()
    }

    pub fn invalid(message: impl Into<String>) -> anyhow::Error {
        ServiceError::Invalid(message.into()).into()
    }

    pub fn upstream(message: impl Into<String>) -> anyhow::Error {
        ServiceError::Upstream(message.into()).into()
    }
}

/// Error returned by every handler, rendered as `{"message", "status"}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadGateway(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "message": self.to_string(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::InvalidEvent { .. } => ApiError::Conflict(err.to_string()),
            FlowError::UnknownOption(_) | FlowError::EmptyDefaultSet => {
                ApiError::BadRequest(err.to_string())
            }
        }
    }
}

impl From<QuizError> for ApiError {
    fn from(err: QuizError) -> Self {
        ApiError::Conflict(err.to_string())
    }
}

impl From<PlanError> for ApiError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AssignmentNotFound(_) => ApiError::NotFound(err.to_string()),
            PlanError::NotEnrolled => ApiError::Forbidden(err.to_string()),
            PlanError::Store(inner) => internal(inner),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(service) = err.downcast_ref::<ServiceError>() {
            return match service {
                ServiceError::Unauthorized(msg) => ApiError::Unauthorized(msg.clone()),
                ServiceError::NotFound(msg) => ApiError::NotFound(msg.clone()),
                ServiceError::Forbidden(msg) => ApiError::Forbidden(msg.clone()),
                ServiceError::Conflict(msg) => ApiError::Conflict(msg.clone()),
                ServiceError::Invalid(msg) => ApiError::BadRequest(msg.clone()),
                ServiceError::Upstream(msg) => {
                    tracing::error!("Upstream failure: {:#}", err);
                    ApiError::BadGateway(msg.clone())
                }
            };
        }

        let err = match err.downcast::<FlowError>() {
            Ok(flow) => return flow.into(),
            Err(err) => err,
        };
        let err = match err.downcast::<QuizError>() {
            Ok(quiz) => return quiz.into(),
            Err(err) => err,
        };
        match err.downcast::<PlanError>() {
            Ok(plan) => plan.into(),
            Err(err) => internal(err),
        }
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    tracing::error!("Request failed: {:#}", err);
    ApiError::Internal("Internal server error".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_service_errors_keep_their_status_through_anyhow() {
        let err: anyhow::Error = ServiceError::not_found("Class not found");
        let api: ApiError = err.into();
        assert_eq!(api.status(), StatusCode::NOT_FOUND);
        assert_eq!(api.to_string(), "Class not found");

        let err = Err::<(), _>(ServiceError::forbidden("Not your class"))
            .context("Failed to update class")
            .unwrap_err();
        assert_eq!(ApiError::from(err).status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_flow_errors_map_to_conflict_or_bad_request() {
        let api: ApiError = FlowError::InvalidEvent {
            event: "continue",
            phase: "presenting",
        }
        .into();
        assert_eq!(api.status(), StatusCode::CONFLICT);

        let api: ApiError = anyhow::Error::from(FlowError::UnknownOption("x".into())).into();
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unknown_errors_are_internal() {
        let api: ApiError = anyhow::anyhow!("connection reset").into();
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.to_string(), "Internal server error");
    }
}
