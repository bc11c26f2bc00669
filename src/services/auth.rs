//! Authentication service: sign-in, sign-up and the bootstrap super user

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{RoleName, SignUpRequest, TokenResponse, User, UserClaims},
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Authenticate by username and password and issue a JWT
    pub async fn sign_in(&self, username: &str, password: &str) -> AppResult<TokenResponse> {
        let user = self
            .repository
            .users
            .get_by_username(username)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

        if !verify_password(&user, password)? {
            tracing::debug!("Rejected sign-in for {}", username);
            return Err(AppError::Authentication("Invalid username or password".to_string()));
        }

        let now = Utc::now().timestamp();
        let expires_in = self.config.token_lifetime_secs();
        let claims = UserClaims {
            sub: user.username.clone(),
            user_id: user.id,
            role: user.role,
            exp: now + expires_in,
            iat: now,
        };

        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok(TokenResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in,
        })
    }

    /// Register a new NORMAL_USER account
    pub async fn sign_up(&self, request: SignUpRequest) -> AppResult<User> {
        if self.repository.users.username_exists(&request.username).await? {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }

        let hash = hash_password(&request.password)?;
        let user = self
            .repository
            .users
            .create(&request.username, &request.email, &hash, RoleName::NormalUser)
            .await?;

        tracing::info!("User {} signed up with id {}", user.username, user.id);
        Ok(user)
    }

    pub async fn get_user(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Create the configured super user unless that username is taken
    pub async fn ensure_super_user(&self) -> AppResult<()> {
        let (Some(username), Some(password)) = (
            self.config.admin_username.as_deref(),
            self.config.admin_password.as_deref(),
        ) else {
            return Ok(());
        };

        if self.repository.users.username_exists(username).await? {
            return Ok(());
        }

        let email = self
            .config
            .admin_email
            .clone()
            .unwrap_or_else(|| format!("{}@libris.local", username));
        let hash = hash_password(password)?;
        let user = self
            .repository
            .users
            .create(username, &email, &hash, RoleName::SuperUser)
            .await?;

        tracing::info!("Created super user {} (id {})", user.username, user.id);
        Ok(())
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(user: &User, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
