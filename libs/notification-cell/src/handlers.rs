// libs/notification-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{CreateNotificationRequest, NotificationError, NovuWebhookEvent};
use crate::services::dispatch::NotificationDispatchService;

const DEFAULT_USER_LIST_LIMIT: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct UserNotificationsQuery {
    pub limit: Option<i64>,
}

fn to_app_error(e: NotificationError) -> AppError {
    match e {
        NotificationError::DatabaseError(msg) => AppError::Database(msg),
        NotificationError::SerializationError(msg) => AppError::Internal(msg),
    }
}

#[axum::debug_handler]
pub async fn create_notification(
    State(service): State<Arc<NotificationDispatchService>>,
    Json(request): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let notification = service
        .create_and_send(request)
        .await
        .map_err(to_app_error)?;

    Ok((StatusCode::CREATED, Json(json!(notification))))
}

#[axum::debug_handler]
pub async fn get_notification(
    State(service): State<Arc<NotificationDispatchService>>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let notification = service
        .get_by_id(notification_id)
        .await
        .map_err(to_app_error)?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

    Ok(Json(json!(notification)))
}

#[axum::debug_handler]
pub async fn get_user_notifications(
    State(service): State<Arc<NotificationDispatchService>>,
    Path(user_id): Path<String>,
    Query(query): Query<UserNotificationsQuery>,
) -> Result<Json<Value>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_USER_LIST_LIMIT).max(1);

    let notifications = service
        .get_by_user(&user_id, limit)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "notifications": notifications,
        "total": notifications.len()
    })))
}

/// Novu delivery webhook. Unknown transaction ids are acknowledged with 200
/// so the provider does not keep retrying a callback we can never correlate.
#[axum::debug_handler]
pub async fn handle_novu_webhook(
    State(service): State<Arc<NotificationDispatchService>>,
    Json(event): Json<NovuWebhookEvent>,
) -> Result<Json<Value>, AppError> {
    let Some(transaction_id) = event.transaction_id.as_deref().filter(|id| !id.is_empty()) else {
        return Err(AppError::BadRequest("transaction_id is required".to_string()));
    };

    let status = event.status.as_deref().unwrap_or_default();

    let updated = service
        .apply_delivery_update(transaction_id, status)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "updated": updated.is_some()
    })))
}
