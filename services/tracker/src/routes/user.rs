//! Profile of the logged-in user

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection, rejection::PathRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use super::message;
use crate::{
    error::{ApiError, ApiResult},
    middleware::Principal,
    models::{UpdateUser, UserProfile},
    state::AppState,
    validation::{validate_display_name, validate_password, validate_username},
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchUserRequest {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub profile_photo: Option<String>,
    pub password: Option<String>,
}

/// `GET /api/user`
pub async fn get_user(
    State(state): State<AppState>,
    Extension(Principal(username)): Extension<Principal>,
) -> ApiResult<Json<UserProfile>> {
    let user = state
        .repositories
        .users
        .find_by_username(&username)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(UserProfile::from(user)))
}

/// `PATCH /api/user/:username`
///
/// Plain fields are written first. A new username is applied last, so a
/// taken name leaves the other changes in place and answers 409.
pub async fn patch_user(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<PatchUserRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(username) = path?;
    let Json(payload) = payload?;

    if username != principal {
        return Err(ApiError::Forbidden);
    }

    if let Some(new_username) = &payload.username {
        validate_username(new_username).map_err(ApiError::Validation)?;
    }
    if let Some(display_name) = &payload.display_name {
        validate_display_name(display_name).map_err(ApiError::Validation)?;
    }
    if let Some(password) = &payload.password {
        validate_password(password).map_err(ApiError::Validation)?;
    }

    let password_hash = match &payload.password {
        Some(password) => Some(state.credentials.hash(password).await?),
        None => None,
    };
    let changes = UpdateUser {
        display_name: payload.display_name,
        profile_photo: payload.profile_photo,
        password_hash,
    };
    if !changes.is_empty() && !state.repositories.users.update(&username, &changes).await? {
        return Err(ApiError::NotFound("user"));
    }

    if let Some(new_username) = payload.username.filter(|name| *name != username) {
        match state.repositories.users.rename(&username, &new_username).await {
            Ok(true) => info!("User {} renamed to {}", username, new_username),
            Ok(false) => return Err(ApiError::NotFound("user")),
            Err(e) if e.is_conflict() => {
                return Err(ApiError::Conflict(
                    "Username already taken, other fields successfully modified".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(message(StatusCode::OK, "User updated"))
}
