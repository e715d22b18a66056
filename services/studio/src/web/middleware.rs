//! services/studio/src/web/middleware.rs
//!
//! Authentication middleware for the admin routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::web::{auth::cookie_value, state::AppState};

/// Lets the request through only with a valid `session` cookie; otherwise 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_session_id = cookie_value(req.headers(), "session").ok_or(StatusCode::UNAUTHORIZED)?;

    if !state.auth_sessions.validate(auth_session_id).await {
        debug!("Rejected request with an unknown or expired session");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}
