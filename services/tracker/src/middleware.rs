//! Session cookie authentication

use axum::{
    extract::{Request, State},
    http::header::COOKIE,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::{error::ApiError, session::token_from_cookie_header, state::AppState};

/// The authenticated username, resolved once per request
#[derive(Debug, Clone)]
pub struct Principal(pub String);

/// Session token from the request's `Cookie` headers, if any
pub fn session_token(req: &Request) -> Option<String> {
    req.headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(token_from_cookie_header)
        .map(str::to_string)
}

/// Reject requests without a live session; otherwise attach the [`Principal`]
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(&req);
    let username = state
        .sessions
        .validate_session(token.as_deref())
        .await
        .inspect_err(|e| debug!("Rejected request to {}: {}", req.uri().path(), e))?;

    req.extensions_mut().insert(Principal(username));

    Ok(next.run(req).await)
}
