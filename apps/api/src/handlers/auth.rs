//! Login and current-user endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Extension;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::state::AppState;
use dukan_core::User;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until the token expires.
    pub expires_in: i64,
    pub user: User,
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    if req.username.trim().is_empty() {
        return Err(ApiError::field("username", "username is required"));
    }

    let Some(user) = state.db.users().authenticate(&req.username, &req.password).await? else {
        warn!(username = %req.username, "Login failed");
        return Err(ApiError::unauthorized("Invalid username or password"));
    };

    let access_token = state.jwt.generate_access_token(&user)?;
    info!(username = %user.username, role = ?user.role, "User logged in");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.jwt.access_lifetime_secs(),
        user,
    }))
}

/// `GET /auth/me`
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<User>> {
    let user = state
        .db
        .users()
        .get_by_id(&current.id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::unauthorized("Account no longer active"))?;
    Ok(Json(user))
}
