// libs/notification-cell/src/services/dispatch.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{StoreError, SupabaseClient};

use crate::models::{
    CreateNotificationRequest, Notification, NotificationChannel, NotificationError,
    NotificationStatus,
};
use crate::services::novu::{NovuClient, NovuRecipient, NovuTriggerRequest};

pub struct NotificationDispatchService {
    supabase: Arc<SupabaseClient>,
    novu: NovuClient,
    workflow_overrides: HashMap<String, String>,
}

impl NotificationDispatchService {
    pub fn new(config: &AppConfig, supabase: Arc<SupabaseClient>) -> Self {
        Self {
            novu: NovuClient::new(config),
            workflow_overrides: config.novu_workflow_overrides.clone(),
            supabase,
        }
    }

    /// Create a notification record and hand it to the delivery provider.
    ///
    /// Phase 1 commits the record before dispatch, so a crash in between
    /// leaves a recoverable PENDING row. Phase 2 never fails the call: a
    /// provider rejection or transport error is absorbed into the record's
    /// status, and the caller still receives the record.
    pub async fn create_and_send(
        &self,
        request: CreateNotificationRequest,
    ) -> Result<Notification, NotificationError> {
        let (mut notification, newly_created) = self.create_notification_record(request).await?;

        if newly_created {
            self.send_to_novu_and_update(&mut notification).await?;
        }

        Ok(notification)
    }

    /// Phase 1: at-most-once record creation keyed on the idempotency key.
    async fn create_notification_record(
        &self,
        request: CreateNotificationRequest,
    ) -> Result<(Notification, bool), NotificationError> {
        if let Some(key) = request
            .idempotency_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
        {
            if let Some(existing) = self.find_by_idempotency_key(key).await? {
                info!(
                    "Idempotent hit for key {}, returning existing notification {}",
                    key, existing.id
                );
                return Ok((existing, false));
            }
        }

        let channels = if request.channels.is_empty() {
            vec![NotificationChannel::Email]
        } else {
            request.channels.clone()
        };

        let now = Utc::now();
        let row = json!({
            "id": Uuid::now_v7(),
            "user_id": request.user_id,
            "event_type": request.event_type,
            "locale": request.locale,
            "brand": request.brand,
            "channels": channels,
            "status": NotificationStatus::Pending,
            "idempotency_key": request.idempotency_key,
            "payload": request.payload,
            "created_at": now,
            "updated_at": now,
        });

        match self.supabase.insert_one::<Notification>("notifications", row).await {
            Ok(notification) => Ok((notification, true)),
            // Unique constraint on idempotency_key: a concurrent create won
            // the race, its record is the canonical one.
            Err(StoreError::Conflict(body)) => {
                let key = request.idempotency_key.as_deref().unwrap_or_default();
                warn!(
                    "Concurrent notification create for idempotency key {}: {}",
                    key, body
                );
                match self.find_by_idempotency_key(key).await? {
                    Some(existing) => Ok((existing, false)),
                    None => Err(NotificationError::DatabaseError(
                        "notification insert conflicted but no existing record found".to_string(),
                    )),
                }
            }
            Err(e) => Err(NotificationError::DatabaseError(e.to_string())),
        }
    }

    /// Phase 2: single dispatch attempt, outcome recorded on the row.
    async fn send_to_novu_and_update(
        &self,
        notification: &mut Notification,
    ) -> Result<(), NotificationError> {
        let workflow_name =
            self.resolve_workflow_name(&notification.event_type, notification.brand.as_deref());
        let transaction_id = notification.id.to_string();

        let trigger_request = NovuTriggerRequest {
            name: workflow_name,
            transaction_id: transaction_id.clone(),
            to: vec![NovuRecipient {
                subscriber_id: notification.user_id.clone(),
                email: None,
                phone: None,
            }],
            payload: json!({
                "eventType": notification.event_type,
                "userId": notification.user_id,
                "locale": notification.locale,
                "brand": notification.brand,
                "data": notification.payload,
            }),
        };

        let (status, novu_transaction_id) = match self.novu.trigger_event(&trigger_request).await {
            Ok(response) => {
                info!(
                    "Novu response: acknowledged={}; status={:?}; tx={:?}; errors={:?}",
                    response.acknowledged,
                    response.status,
                    response.transaction_id,
                    response.errors
                );

                let status = if response.acknowledged {
                    NotificationStatus::Sent
                } else {
                    NotificationStatus::Failed
                };
                let tx = response.transaction_id.unwrap_or(transaction_id);
                (status, Some(tx))
            }
            Err(e) => {
                // Delivery hiccups never fail the enclosing operation.
                error!("Failed to send notification to Novu: {}", e);
                (NotificationStatus::Failed, None)
            }
        };

        let updated = self
            .supabase
            .update_one::<Notification>(
                "notifications",
                &format!("id=eq.{}", notification.id),
                json!({
                    "status": status,
                    "novu_transaction_id": novu_transaction_id,
                    "updated_at": Utc::now(),
                }),
            )
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        *notification = updated;
        Ok(())
    }

    /// Apply an asynchronous delivery callback correlated by transaction id.
    ///
    /// Unknown transaction ids are a no-op so replayed webhooks stay
    /// harmless. Known records are overwritten last-write-wins.
    pub async fn apply_delivery_update(
        &self,
        transaction_id: &str,
        provider_status: &str,
    ) -> Result<Option<Notification>, NotificationError> {
        let path = format!(
            "/rest/v1/notifications?novu_transaction_id=eq.{}&limit=1",
            urlencoding::encode(transaction_id)
        );
        let rows: Vec<Notification> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        let Some(existing) = rows.into_iter().next() else {
            warn!(
                "Received delivery update for unknown transactionId {}",
                transaction_id
            );
            return Ok(None);
        };

        let new_status = match provider_status.to_lowercase().as_str() {
            "delivered" => NotificationStatus::Delivered,
            "failed" | "bounced" => NotificationStatus::Failed,
            other => {
                debug!(
                    "Ignoring unmapped delivery status {} for notification {}",
                    other, existing.id
                );
                return Ok(Some(existing));
            }
        };

        let updated = self
            .supabase
            .update_one::<Notification>(
                "notifications",
                &format!("id=eq.{}", existing.id),
                json!({
                    "status": new_status,
                    "updated_at": Utc::now(),
                }),
            )
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        Ok(Some(updated))
    }

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Notification>, NotificationError> {
        let path = format!(
            "/rest/v1/notifications?idempotency_key=eq.{}&limit=1",
            urlencoding::encode(key)
        );
        let rows: Vec<Notification> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Notification>, NotificationError> {
        let path = format!("/rest/v1/notifications?id=eq.{}&limit=1", id);
        let rows: Vec<Notification> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    pub async fn get_by_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Notification>, NotificationError> {
        let path = format!(
            "/rest/v1/notifications?user_id=eq.{}&order=created_at.desc&limit={}",
            urlencoding::encode(user_id),
            limit
        );
        self.supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))
    }

    fn resolve_workflow_name(&self, event_type: &str, _brand: Option<&str>) -> String {
        if let Some(workflow) = self.workflow_overrides.get(event_type) {
            return workflow.clone();
        }
        // Default heuristic: "appointment.confirmed" -> "appointment-confirmed".
        event_type.replace('.', "-")
    }
}
