use argon2::{self, password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString}};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use sqlx::PgPool;
use thiserror::Error;

use crate::{
    models::user::{AuthResponse, LoginRequest, RegisterRequest},
    repositories::{user_repository::UserRepository, StoreError},
    utils::Claims,
};

const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User already exists")]
    UserExists,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => AuthError::UserExists,
            other => AuthError::Internal(other.into()),
        }
    }
}

/// Admin accounts for the HR dashboard.
pub struct AuthService {
    user_repository: UserRepository,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(pool: PgPool, jwt_secret: String) -> Self {
        Self {
            user_repository: UserRepository::new(pool),
            jwt_secret,
        }
    }

    /// True until the first admin account exists.
    pub async fn is_bootstrap(&self) -> Result<bool, AuthError> {
        Ok(self.user_repository.count_admins().await? == 0)
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        if self.user_repository.find_admin_by_email(&request.email).await?.is_some() {
            return Err(AuthError::UserExists);
        }

        let start = std::time::Instant::now();
        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
        let password_hash = argon2::Argon2::default()
            .hash_password(request.password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
        log::debug!("Password hash took: {:?}", start.elapsed());

        let user = self
            .user_repository
            .insert_admin(&request.name, &request.email, &password_hash.to_string())
            .await?;
        log::info!("Admin user {} registered", user.id);

        self.generate_token(user.id)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let user = self
            .user_repository
            .find_admin_by_email(&request.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash: {}", e))?;
        if argon2::Argon2::default()
            .verify_password(request.password.as_bytes(), &parsed_hash)
            .is_err()
        {
            return Err(AuthError::InvalidCredentials);
        }

        self.generate_token(user.id)
    }

    fn generate_token(&self, user_id: i32) -> Result<AuthResponse, AuthError> {
        let expiration = Utc::now() + Duration::hours(TOKEN_TTL_HOURS);
        let claims = Claims {
            sub: user_id,
            exp: expiration.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(anyhow::Error::from)?;

        Ok(AuthResponse {
            token,
            expired_at: expiration,
        })
    }
}
