//! services/studio/src/web/auth.rs
//!
//! Admin login and logout. There is a single admin account whose password is
//! checked against the argon2 hash from the configuration.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::web::state::AppState;

const SESSION_DAYS: i64 = 30;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub username: String,
    pub authenticated: bool,
}

//=========================================================================================
// Cookie helpers
//=========================================================================================

/// Reads the value of cookie `name` from the request headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| {
            let (key, value) = c.trim().split_once('=')?;
            (key == name && !value.is_empty()).then_some(value)
        })
}

fn session_cookie(id: &str, max_age: i64) -> String {
    format!("session={id}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={max_age}")
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/login - Log in as the admin
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let invalid = || (StatusCode::UNAUTHORIZED, "Invalid username or password".to_string());

    let parsed_hash = PasswordHash::new(&state.config.admin_password_hash).map_err(|e| {
        error!("Failed to parse admin password hash: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
    })?;
    let password_ok = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if req.username != state.config.admin_username || !password_ok {
        warn!("Rejected login attempt for '{}'", req.username);
        return Err(invalid());
    }

    let auth_session_id = state
        .auth_sessions
        .create(Duration::days(SESSION_DAYS))
        .await;
    state.workspace.set_session(true).await;
    info!("Admin '{}' logged in", req.username);

    let cookie = session_cookie(&auth_session_id, Duration::days(SESSION_DAYS).num_seconds());
    let response = AuthResponse {
        username: req.username,
        authenticated: true,
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Log out and invalidate the session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let auth_session_id = cookie_value(&headers, "session")
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    let others_open = state.auth_sessions.revoke(auth_session_id).await;
    if !others_open {
        state.workspace.set_session(false).await;
    }
    info!("Admin logged out");

    Ok((StatusCode::OK, [(header::SET_COOKIE, session_cookie("", 0))]))
}
