//! Notification endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::NewNotification;
use crate::remote::wire::{
    NotificationEnvelope, NotificationQuery, NotificationsEnvelope, SuccessEnvelope,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications).post(create_notification))
        .route("/notifications/{id}/read", put(mark_read))
        .route("/notifications/{id}", delete(delete_notification))
}

/// GET /api/notifications?user_id= - newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<NotificationsEnvelope>, ApiError> {
    let notifications = state.notifications.list_by_user(query.user_id).await?;
    Ok(Json(NotificationsEnvelope {
        success: true,
        notifications,
    }))
}

pub async fn create_notification(
    State(state): State<AppState>,
    Json(input): Json<NewNotification>,
) -> Result<(StatusCode, Json<NotificationEnvelope>), ApiError> {
    if state.users.get_by_id(input.user_id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }
    let notification = state.notifications.create(&input).await?;
    tracing::debug!(
        user_id = input.user_id,
        notification_id = notification.id,
        "Notification created"
    );
    Ok((
        StatusCode::CREATED,
        Json(NotificationEnvelope {
            success: true,
            notification,
        }),
    ))
}

/// PUT /api/notifications/{id}/read - repeating it is harmless
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<NotificationEnvelope>, ApiError> {
    let notification = state
        .notifications
        .mark_read(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;
    Ok(Json(NotificationEnvelope {
        success: true,
        notification,
    }))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessEnvelope>, ApiError> {
    if !state.notifications.delete(id).await? {
        return Err(ApiError::not_found("Notification not found"));
    }
    Ok(Json(SuccessEnvelope { success: true }))
}
