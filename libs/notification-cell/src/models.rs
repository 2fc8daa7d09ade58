// libs/notification-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE NOTIFICATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Time-ordered UUIDv7 assigned at creation; listing by id follows
    /// creation order without a separate sort key.
    pub id: Uuid,
    pub user_id: String,
    pub event_type: String,
    pub locale: Option<String>,
    pub brand: Option<String>,
    pub channels: Vec<NotificationChannel>,
    pub status: NotificationStatus,
    pub novu_transaction_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    Delivered,
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationStatus::Pending => write!(f, "pending"),
            NotificationStatus::Sent => write!(f, "sent"),
            NotificationStatus::Failed => write!(f, "failed"),
            NotificationStatus::Delivered => write!(f, "delivered"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
    InApp,
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationChannel::Email => write!(f, "email"),
            NotificationChannel::Sms => write!(f, "sms"),
            NotificationChannel::Push => write!(f, "push"),
            NotificationChannel::InApp => write!(f, "in_app"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotificationRequest {
    pub user_id: String,
    pub event_type: String,
    pub locale: Option<String>,
    pub brand: Option<String>,
    #[serde(default)]
    pub channels: Vec<NotificationChannel>,
    #[serde(default)]
    pub payload: Value,
    pub idempotency_key: Option<String>,
}

/// Inbound bus message that maps 1:1 onto a create request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub user_id: String,
    pub event_type: String,
    pub locale: Option<String>,
    pub brand: Option<String>,
    #[serde(default)]
    pub channels: Vec<NotificationChannel>,
    #[serde(default)]
    pub payload: Value,
    pub idempotency_key: Option<String>,
}

impl From<NotificationEvent> for CreateNotificationRequest {
    fn from(event: NotificationEvent) -> Self {
        Self {
            user_id: event.user_id,
            event_type: event.event_type,
            locale: event.locale,
            brand: event.brand,
            channels: event.channels,
            payload: event.payload,
            idempotency_key: event.idempotency_key,
        }
    }
}

/// Provider delivery callback payload correlated by transaction id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovuWebhookEvent {
    pub transaction_id: Option<String>,
    pub status: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}
