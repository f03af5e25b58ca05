use crate::errors::ServiceError;
use crate::middlewares::auth::{JwtClaims, JwtService};
use crate::models::new_id;
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest, User, UserProfile};
use anyhow::{anyhow, Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use mongodb::bson::doc;
use mongodb::Database;

pub struct AuthService {
    mongo: Database,
    jwt_service: JwtService,
    access_token_ttl_seconds: i64,
}

impl AuthService {
    pub fn new(mongo: Database, jwt_service: JwtService, access_token_ttl_seconds: i64) -> Self {
        Self {
            mongo,
            jwt_service,
            access_token_ttl_seconds,
        }
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        hash(password, DEFAULT_COST).context("Failed to hash password")
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        verify(password, hash).context("Failed to verify password")
    }

    /// Регистрация учителя или ученика
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse> {
        let users = self.mongo.collection::<User>("users");
        let email = req.email.trim().to_lowercase();

        let existing = users
            .find_one(doc! { "email": &email })
            .await
            .context("Failed to check existing user")?;
        if existing.is_some() {
            return Err(ServiceError::conflict("User with this email already exists"));
        }

        let user = User {
            id: new_id(),
            email,
            password_hash: self.hash_password(&req.password)?,
            name: req.name,
            role: req.role.unwrap_or_default(),
            created_at: Utc::now(),
        };

        users
            .insert_one(&user)
            .await
            .context("Failed to insert user")?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), "User registered");
        self.issue(user)
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse> {
        let email = req.email.trim().to_lowercase();
        let user = self
            .mongo
            .collection::<User>("users")
            .find_one(doc! { "email": &email })
            .await
            .context("Failed to query user")?;

        let Some(user) = user else {
            tracing::warn!(email = %email, "Failed login attempt: unknown email");
            return Err(invalid_credentials());
        };

        if !self.verify_password(&req.password, &user.password_hash)? {
            tracing::warn!(email = %email, "Failed login attempt: invalid password");
            return Err(invalid_credentials());
        }

        tracing::info!(user_id = %user.id, "Successful login");
        self.issue(user)
    }

    pub async fn profile(&self, user_id: &str) -> Result<UserProfile> {
        self.mongo
            .collection::<User>("users")
            .find_one(doc! { "_id": user_id })
            .await
            .context("Failed to query user")?
            .map(UserProfile::from)
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    fn issue(&self, user: User) -> Result<AuthResponse> {
        let claims = JwtClaims::new(user.id.clone(), user.role, self.access_token_ttl_seconds);
        let access_token = self
            .jwt_service
            .generate_token(&claims)
            .map_err(|e| anyhow!("Failed to generate token: {}", e))?;

        Ok(AuthResponse {
            access_token,
            token_type: "Bearer",
            expires_in: self.access_token_ttl_seconds,
            user: UserProfile::from(user),
        })
    }
}

fn invalid_credentials() -> anyhow::Error {
    ServiceError::Unauthorized("Invalid email or password".to_string()).into()
}
