// libs/scheduling-cell/src/services/publisher.rs
use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use thiserror::Error;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::events::AppointmentEvent;

const APPOINTMENT_EVENTS_KEY: &str = "appointment_events";

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Redis connection error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Queue operation failed: {0}")]
    QueueError(String),
}

/// Narrow fire-and-forget publish seam for appointment lifecycle events.
///
/// Callers treat failures as best-effort: a publish error never aborts the
/// triggering operation.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &AppointmentEvent) -> Result<(), PublishError>;
}

pub struct RedisEventPublisher {
    pool: Pool,
}

impl RedisEventPublisher {
    /// Build a publisher from configuration; `None` when messaging is not
    /// configured, so the caller can fall back to a no-op publisher.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let redis_url = config.redis_url.clone()?;

        match Config::from_url(redis_url).create_pool(Some(Runtime::Tokio1)) {
            Ok(pool) => Some(Self { pool }),
            Err(e) => {
                warn!("Failed to create Redis pool for event publishing: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, event: &AppointmentEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| PublishError::QueueError(e.to_string()))?;

        let _: () = conn.lpush(APPOINTMENT_EVENTS_KEY, payload).await?;

        debug!(
            "Published event {} for appointment {}",
            event.kind(),
            event.appointment_id()
        );
        Ok(())
    }
}

/// Publisher used when no message broker is configured.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(&self, event: &AppointmentEvent) -> Result<(), PublishError> {
        debug!(
            "Event publishing disabled, dropping {} for appointment {}",
            event.kind(),
            event.appointment_id()
        );
        Ok(())
    }
}
