use crate::{
    error::{AppError, Result},
    state::AppState,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use super::notification_dto::{
    CreateNotificationRequest, ListNotificationsQuery, MarkAllReadRequest, MarkReadRequest,
};
use super::notification_models::Notification;

/// List notifications for a recipient, newest first
#[utoipa::path(
    get,
    path = "/api/notifications",
    params(
        ("recipient" = String, Query, description = "Recipient identifier"),
        ("after" = Option<String>, Query, description = "RFC 3339 cursor: only records changed at or after this instant")
    ),
    responses(
        (status = 200, description = "Notifications for the recipient", body = Vec<Notification>),
        (status = 400, description = "Missing recipient")
    ),
    tag = "notifications"
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Vec<Notification>>> {
    if query.recipient.is_empty() {
        return Err(AppError::BadRequest("recipient is required".to_string()));
    }

    let notifications = state
        .notification_repository
        .find_by_recipient(&query.recipient, query.after);

    Ok(Json(notifications))
}

/// Create a notification (server-side producers only)
#[utoipa::path(
    post,
    path = "/api/notifications",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification created", body = Notification),
        (status = 400, description = "Invalid payload")
    ),
    tag = "notifications"
)]
pub async fn create_notification(
    State(state): State<AppState>,
    Json(payload): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<Notification>)> {
    payload.validate()?;

    let notification = state.notification_repository.create(
        &payload.recipient,
        payload.kind,
        payload.title,
        &payload.message,
        payload.metadata,
    );

    Ok((StatusCode::CREATED, Json(notification)))
}

/// Mark specific notifications as read (idempotent)
#[utoipa::path(
    patch,
    path = "/api/notifications/mark-read",
    request_body = MarkReadRequest,
    responses(
        (status = 204, description = "Acknowledged"),
        (status = 400, description = "Missing recipient")
    ),
    tag = "notifications"
)]
pub async fn mark_read(
    State(state): State<AppState>,
    Json(payload): Json<MarkReadRequest>,
) -> Result<StatusCode> {
    if payload.recipient.is_empty() {
        return Err(AppError::BadRequest("recipient is required".to_string()));
    }

    let affected = state
        .notification_repository
        .mark_read(&payload.recipient, &payload.ids);
    tracing::debug!(
        "marked {} of {} notifications read for {}",
        affected,
        payload.ids.len(),
        payload.recipient
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Mark every notification of a recipient as read (idempotent)
#[utoipa::path(
    patch,
    path = "/api/notifications/mark-all-read",
    request_body = MarkAllReadRequest,
    responses(
        (status = 204, description = "Acknowledged"),
        (status = 400, description = "Missing recipient")
    ),
    tag = "notifications"
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    Json(payload): Json<MarkAllReadRequest>,
) -> Result<StatusCode> {
    if payload.recipient.is_empty() {
        return Err(AppError::BadRequest("recipient is required".to_string()));
    }

    let affected = state
        .notification_repository
        .mark_all_read(&payload.recipient);
    tracing::debug!(
        "marked all ({}) notifications read for {}",
        affected,
        payload.recipient
    );

    Ok(StatusCode::NO_CONTENT)
}
