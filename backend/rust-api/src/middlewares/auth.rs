use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::models::user::UserRole;
use crate::services::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String,    // user_id
    pub role: UserRole, // teacher | student
    pub exp: usize,     // expiration timestamp
    pub iat: usize,     // issued at timestamp
}

impl JwtClaims {
    pub fn new(user_id: impl Into<String>, role: UserRole, ttl_seconds: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.into(),
            role,
            exp: (now + ttl_seconds).max(0) as usize,
            iat: now.max(0) as usize,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    ExpiredToken,
    #[error("Invalid token signature")]
    InvalidSignature,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|_| AuthError::InvalidToken)
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let validation = Validation::default();

        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken,
            })
    }
}

/// Middleware для проверки JWT токена
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = state.jwt.validate_token(token).map_err(|e| {
        tracing::warn!("JWT validation failed: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    tracing::debug!(
        "Authenticated user: {} (role: {})",
        claims.sub,
        claims.role.as_str()
    );

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

fn require_role(request: &Request, role: UserRole) -> Result<(), StatusCode> {
    match request.extensions().get::<JwtClaims>() {
        Some(claims) if claims.role == role => Ok(()),
        Some(claims) => {
            tracing::warn!(
                user_id = %claims.sub,
                "Access denied: {} role required",
                role.as_str()
            );
            Err(StatusCode::FORBIDDEN)
        }
        None => Err(StatusCode::UNAUTHORIZED),
    }
}

pub async fn teacher_guard_middleware(
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    require_role(&request, UserRole::Teacher)?;
    Ok(next.run(request).await)
}

pub async fn student_guard_middleware(
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    require_role(&request, UserRole::Student)?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_generation_and_validation() {
        let service = JwtService::new("test-secret");
        let claims = JwtClaims::new("user123", UserRole::Teacher, 3600);

        let token = service.generate_token(&claims).unwrap();
        let validated = service.validate_token(&token).unwrap();

        assert_eq!(validated.sub, claims.sub);
        assert_eq!(validated.role, UserRole::Teacher);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let issuer = JwtService::new("secret-a");
        let verifier = JwtService::new("secret-b");
        let token = issuer
            .generate_token(&JwtClaims::new("user123", UserRole::Student, 3600))
            .unwrap();

        assert!(matches!(
            verifier.validate_token(&token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = JwtService::new("test-secret");
        let token = service
            .generate_token(&JwtClaims::new("user123", UserRole::Student, -3600))
            .unwrap();

        assert!(matches!(
            service.validate_token(&token),
            Err(AuthError::ExpiredToken)
        ));
    }
}
