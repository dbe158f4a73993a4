//! User administration endpoints
//!
//! - GET /api/users
//! - POST /api/users
//! - PUT /api/users/{id}/status
//! - PUT /api/users/{id}/password
//!
//! Passwords are never part of a response.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::api::middleware::{ActorHeaders, ApiError, AppState};
use crate::models::{NewUser, User};
use crate::remote::wire::{ActiveRequest, PasswordRequest, UserEnvelope, UsersEnvelope};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}/status", put(set_status))
        .route("/users/{id}/password", put(reset_password))
}

fn user_envelope(user: User) -> Json<UserEnvelope> {
    Json(UserEnvelope {
        success: true,
        user: user.without_password(),
    })
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<UsersEnvelope>, ApiError> {
    let users = state.users.list().await?;
    Ok(Json(UsersEnvelope {
        success: true,
        users: users.iter().map(User::without_password).collect(),
    }))
}

/// POST /api/users
///
/// Admin rights are checked by the client only. A non-admin request is
/// logged and still served.
pub async fn create_user(
    State(state): State<AppState>,
    actor: ActorHeaders,
    Json(input): Json<NewUser>,
) -> Result<(StatusCode, Json<UserEnvelope>), ApiError> {
    if !actor.is_admin() {
        tracing::warn!(
            "User creation by non-admin requester (id {:?}, role {:?})",
            actor.id,
            actor.role
        );
    }

    let mut errors = input.violations();
    if errors.is_empty() && state.users.exists_by_username(input.username.trim()).await? {
        errors.push("Username already exists".to_string());
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let user = state.users.create(&input).await?;
    tracing::info!(user_id = user.id, role = %user.role, "User created");
    Ok((StatusCode::CREATED, user_envelope(user)))
}

/// PUT /api/users/{id}/status
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ActiveRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let user = state
        .users
        .set_active(id, body.active)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    tracing::info!(user_id = id, active = body.active, "User status changed");
    Ok(user_envelope(user))
}

/// PUT /api/users/{id}/password
pub async fn reset_password(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<PasswordRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    if body.password.is_empty() {
        return Err(ApiError::validation(vec!["Password cannot be empty".to_string()]));
    }
    let user = state
        .users
        .set_password(id, &body.password)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    tracing::info!(user_id = id, "Password reset");
    Ok(user_envelope(user))
}
