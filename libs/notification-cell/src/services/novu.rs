// libs/notification-cell/src/services/novu.rs
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

#[derive(Error, Debug)]
pub enum NovuError {
    #[error("Novu transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Novu API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse Novu response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NovuTriggerRequest {
    /// Workflow trigger identifier.
    pub name: String,
    pub transaction_id: String,
    pub to: Vec<NovuRecipient>,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NovuRecipient {
    pub subscriber_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Normalized trigger outcome, regardless of response envelope shape.
#[derive(Debug, Clone)]
pub struct NovuTriggerResponse {
    pub acknowledged: bool,
    pub status: Option<String>,
    pub transaction_id: Option<String>,
    pub errors: Vec<String>,
}

/// The trigger endpoint answers either flat or wrapped in a `data` object
/// depending on the API version; both shapes must parse.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTriggerResponse {
    acknowledged: Option<bool>,
    status: Option<String>,
    transaction_id: Option<String>,
    error: Option<Vec<String>>,
    data: Option<RawTriggerData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTriggerData {
    acknowledged: Option<bool>,
    status: Option<String>,
    transaction_id: Option<String>,
    error: Option<Vec<String>>,
}

impl RawTriggerResponse {
    fn normalize(self) -> NovuTriggerResponse {
        let data = self.data;
        // Top-level fields win; the nested object only fills gaps.
        let acknowledged = self
            .acknowledged
            .or_else(|| data.as_ref().and_then(|d| d.acknowledged))
            .unwrap_or(false);
        let status = self
            .status
            .or_else(|| data.as_ref().and_then(|d| d.status.clone()));
        let transaction_id = self
            .transaction_id
            .or_else(|| data.as_ref().and_then(|d| d.transaction_id.clone()));
        let errors = self
            .error
            .or_else(|| data.and_then(|d| d.error))
            .unwrap_or_default();

        NovuTriggerResponse {
            acknowledged,
            status,
            transaction_id,
            errors,
        }
    }
}

/// Client for the Novu event trigger API.
pub struct NovuClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl NovuClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.novu_api_url.clone(),
            api_key: config.novu_api_key.clone(),
        }
    }

    /// Trigger a workflow event.
    /// POST /v1/events/trigger
    pub async fn trigger_event(
        &self,
        request: &NovuTriggerRequest,
    ) -> Result<NovuTriggerResponse, NovuError> {
        let url = format!("{}/v1/events/trigger", self.base_url);

        debug!(
            "Triggering Novu workflow {} (transaction {})",
            request.name, request.transaction_id
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("ApiKey {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        debug!("Novu trigger response: {} - {}", status, response_text);

        if !status.is_success() {
            error!("Novu trigger failed: {} - {}", status, response_text);
            return Err(NovuError::Api {
                status: status.as_u16(),
                body: response_text,
            });
        }

        let raw: RawTriggerResponse = serde_json::from_str(&response_text)
            .map_err(|e| NovuError::Decode(e.to_string()))?;

        Ok(raw.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_trigger_response() {
        let raw: RawTriggerResponse = serde_json::from_str(
            r#"{"acknowledged": true, "status": "processed", "transactionId": "tx-1"}"#,
        )
        .unwrap();
        let resp = raw.normalize();
        assert!(resp.acknowledged);
        assert_eq!(resp.status.as_deref(), Some("processed"));
        assert_eq!(resp.transaction_id.as_deref(), Some("tx-1"));
        assert!(resp.errors.is_empty());
    }

    #[test]
    fn parses_nested_trigger_response() {
        let raw: RawTriggerResponse = serde_json::from_str(
            r#"{"data": {"acknowledged": true, "status": "processed", "transactionId": "tx-2"}}"#,
        )
        .unwrap();
        let resp = raw.normalize();
        assert!(resp.acknowledged);
        assert_eq!(resp.transaction_id.as_deref(), Some("tx-2"));
    }

    #[test]
    fn missing_acknowledged_defaults_to_false() {
        let raw: RawTriggerResponse =
            serde_json::from_str(r#"{"status": "error", "error": ["workflow not found"]}"#)
                .unwrap();
        let resp = raw.normalize();
        assert!(!resp.acknowledged);
        assert_eq!(resp.errors, vec!["workflow not found".to_string()]);
    }
}
