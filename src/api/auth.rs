//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::{
    error::AppResult,
    models::user::{SignInRequest, SignUpRequest, TokenResponse, UserView},
};

use super::AuthenticatedUser;

/// Sign in with username and password
#[utoipa::path(
    post,
    path = "/auth/sign-in",
    tag = "auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn sign_in(
    State(state): State<crate::AppState>,
    Json(request): Json<SignInRequest>,
) -> AppResult<Json<TokenResponse>> {
    request.validate()?;

    let token = state
        .services
        .auth
        .sign_in(&request.username, &request.password)
        .await?;
    Ok(Json(token))
}

/// Register a new normal user
#[utoipa::path(
    post,
    path = "/auth/sign-up",
    tag = "auth",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "User created", body = UserView),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Username already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn sign_up(
    State(state): State<crate::AppState>,
    Json(request): Json<SignUpRequest>,
) -> AppResult<(StatusCode, Json<UserView>)> {
    request.validate()?;

    let user = state.services.auth.sign_up(request).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Get the current user
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserView),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UserView>> {
    let user = state.services.auth.get_user(claims.user_id).await?;
    Ok(Json(user.into()))
}
