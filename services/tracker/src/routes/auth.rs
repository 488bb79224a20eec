//! Login, signup and logout

use axum::{
    Json,
    extract::{Request, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{info, warn};

use super::message;
use crate::{
    error::{ApiError, ApiResult},
    middleware::session_token,
    models::NewUser,
    session::{clear_session_cookie, session_cookie},
    state::AppState,
    validation::{validate_display_name, validate_password, validate_username},
};

const BAD_CREDENTIALS: &str = "Incorrect username or password";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub display_name: String,
}

fn cookie_headers(state: &AppState, token: &str) -> ApiResult<HeaderMap> {
    let cookie = session_cookie(token, state.sessions.ttl(), state.settings.secure_cookies);
    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        cookie
            .parse::<HeaderValue>()
            .map_err(|_| ApiError::Internal("session cookie is not a valid header".to_string()))?,
    );
    Ok(headers)
}

/// `POST /login`
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;

    if !state.login_throttle.is_allowed(&payload.username).await {
        warn!("Login throttled for {}", payload.username);
        return Err(ApiError::Validation(BAD_CREDENTIALS.to_string()));
    }

    if !state
        .credentials
        .verify(&payload.username, &payload.password)
        .await?
    {
        state.login_throttle.record_failure(&payload.username).await;
        return Err(ApiError::Validation(BAD_CREDENTIALS.to_string()));
    }
    state.login_throttle.reset(&payload.username).await;

    let token = state.sessions.create_session(&payload.username).await?;
    info!("User {} logged in", payload.username);

    Ok((
        cookie_headers(&state, &token)?,
        message(StatusCode::OK, "Logged in"),
    ))
}

/// `POST /signup`
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;

    validate_username(&payload.username).map_err(ApiError::Validation)?;
    validate_password(&payload.password).map_err(ApiError::Validation)?;
    validate_display_name(&payload.display_name).map_err(ApiError::Validation)?;

    let password_hash = state.credentials.hash(&payload.password).await?;
    let new_user = NewUser {
        username: payload.username,
        display_name: payload.display_name,
        password_hash,
    };
    let user = state
        .repositories
        .users
        .create(&new_user)
        .await
        .map_err(|e| {
            if e.is_conflict() {
                ApiError::Validation("User already exists".to_string())
            } else {
                ApiError::from(e)
            }
        })?;

    let token = state.sessions.create_session(&user.username).await?;
    info!("User {} signed up", user.username);

    Ok((
        StatusCode::CREATED,
        cookie_headers(&state, &token)?,
        message(StatusCode::CREATED, "Account created"),
    ))
}

/// `POST /logout`: always succeeds and clears the cookie
pub async fn logout(State(state): State<AppState>, req: Request) -> impl IntoResponse {
    if let Some(token) = session_token(&req) {
        if let Err(e) = state.sessions.revoke_session(&token).await {
            warn!("Failed to revoke session on logout: {}", e);
        }
    }

    let mut headers = HeaderMap::new();
    if let Ok(value) = clear_session_cookie(state.settings.secure_cookies).parse::<HeaderValue>() {
        headers.insert(SET_COOKIE, value);
    }

    (headers, message(StatusCode::OK, "Logged out"))
}
