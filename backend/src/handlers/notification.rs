//! HTTP handlers for notification endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::notification::{
    CreateNotificationInput, Notificacion, NotificationQuery, NotificationService, UnreadCount,
};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResponse {
    pub marcadas: u64,
}

/// Notifications addressed to the user or broadcast
pub async fn list_notifications(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<Vec<Notificacion>>> {
    let service = NotificationService::new(state.db, state.hub);
    let notifications = service.list(current_user.0.user_id, &query).await?;
    Ok(Json(notifications))
}

pub async fn unread_count(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<UnreadCount>> {
    let service = NotificationService::new(state.db, state.hub);
    Ok(Json(service.unread_count(current_user.0.user_id).await?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(notification_id): Path<Uuid>,
) -> AppResult<Json<Notificacion>> {
    let service = NotificationService::new(state.db, state.hub);
    let notification = service
        .mark_read(current_user.0.user_id, notification_id)
        .await?;
    Ok(Json(notification))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<MarkAllReadResponse>> {
    let service = NotificationService::new(state.db, state.hub);
    let marcadas = service.mark_all_read(current_user.0.user_id).await?;
    Ok(Json(MarkAllReadResponse { marcadas }))
}

/// Manual notification, administrators only
pub async fn create_notification(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateNotificationInput>,
) -> AppResult<(StatusCode, Json<Notificacion>)> {
    if !current_user.0.is_admin() {
        return Err(AppError::InsufficientPermissions);
    }
    let service = NotificationService::new(state.db, state.hub);
    let notification = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}
