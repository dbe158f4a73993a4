//! Health probe and login
//!
//! Login compares the submitted password with the stored one as plain text.

use axum::{extract::State, routing::{get, post}, Json, Router};
use chrono::Utc;

use crate::api::middleware::{ApiError, AppState};
use crate::remote::wire::{Credentials, HealthResponse, UserEnvelope};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/login", post(login))
}

/// GET /api/health - fails when the database does not answer
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.pool.ping().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
    }))
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<UserEnvelope>, ApiError> {
    if credentials.username.trim().is_empty() || credentials.password.is_empty() {
        return Err(ApiError::validation(vec![
            "Username and password are required".to_string(),
        ]));
    }

    let mut user = state
        .users
        .find_by_credentials(credentials.username.trim(), &credentials.password, credentials.role)
        .await?
        .ok_or_else(|| {
            tracing::info!(username = %credentials.username, "Login failed");
            ApiError::unauthorized("Invalid credentials")
        })?;

    let now = Utc::now();
    state.users.touch_login(user.id, now).await?;
    user.last_login = Some(now);

    tracing::info!(user_id = user.id, role = %user.role, "Login");
    Ok(Json(UserEnvelope {
        success: true,
        user: user.without_password(),
    }))
}
