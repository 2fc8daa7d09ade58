// libs/notification-cell/src/services/consumer.rs
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::models::NotificationEvent;
use crate::services::dispatch::NotificationDispatchService;

const NOTIFICATION_EVENTS_KEY: &str = "notification_events";
const POP_TIMEOUT_SECONDS: f64 = 1.0;

/// Consumes inbound notification trigger events from the bus and feeds them
/// into the dispatch service.
///
/// Malformed payloads and failed dispatches are logged and skipped; the loop
/// never dies because of a bad message. Redelivery of a failed message is the
/// producer's concern, not handled here.
pub struct NotificationEventConsumer {
    pool: Pool,
    dispatch_service: Arc<NotificationDispatchService>,
    is_running: tokio::sync::RwLock<bool>,
}

impl NotificationEventConsumer {
    /// `None` when messaging is not configured.
    pub fn from_config(
        config: &AppConfig,
        dispatch_service: Arc<NotificationDispatchService>,
    ) -> Option<Self> {
        let redis_url = config.redis_url.clone()?;

        match Config::from_url(redis_url).create_pool(Some(Runtime::Tokio1)) {
            Ok(pool) => Some(Self {
                pool,
                dispatch_service,
                is_running: tokio::sync::RwLock::new(false),
            }),
            Err(e) => {
                warn!("Failed to create Redis pool for notification consumer: {}", e);
                None
            }
        }
    }

    pub async fn start(&self) {
        {
            let mut running = self.is_running.write().await;
            if *running {
                warn!("Notification consumer is already running");
                return;
            }
            *running = true;
        }

        info!("Starting notification event consumer");

        loop {
            if !*self.is_running.read().await {
                info!("Notification consumer stopping");
                break;
            }

            match self.poll_once().await {
                Ok(Some(())) => {}
                Ok(None) => {
                    // Queue empty within the poll timeout, loop again.
                }
                Err(e) => {
                    error!("Notification consumer poll failed: {}", e);
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                }
            }
        }
    }

    pub async fn shutdown(&self) {
        let mut running = self.is_running.write().await;
        *running = false;
    }

    /// Pop and process a single event; `Ok(None)` when the queue was empty.
    async fn poll_once(&self) -> Result<Option<()>, redis::RedisError> {
        let mut conn = self.pool.get().await.map_err(|e| {
            redis::RedisError::from((
                redis::ErrorKind::IoError,
                "Failed to get Redis connection",
                e.to_string(),
            ))
        })?;

        let popped: Option<(String, String)> = conn
            .brpop(NOTIFICATION_EVENTS_KEY, POP_TIMEOUT_SECONDS)
            .await?;

        let Some((_, raw)) = popped else {
            return Ok(None);
        };

        match serde_json::from_str::<NotificationEvent>(&raw) {
            Ok(event) => {
                debug!(
                    "Consuming notification event {} for user {}",
                    event.event_type, event.user_id
                );
                if let Err(e) = self.dispatch_service.create_and_send(event.into()).await {
                    error!("Failed to process notification event from bus: {}", e);
                }
            }
            Err(e) => {
                error!("Discarding malformed notification event: {} ({})", e, raw);
            }
        }

        Ok(Some(()))
    }
}
