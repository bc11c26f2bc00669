//! User endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{error::AppResult, models::user::UserView};

use super::AuthenticatedUser;

/// Get user details by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User details", body = UserView),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<UserView>> {
    let user = state.services.auth.get_user(id).await?;
    Ok(Json(user.into()))
}
