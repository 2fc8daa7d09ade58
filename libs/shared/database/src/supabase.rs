use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Errors surfaced by the PostgREST storage layer.
///
/// `Conflict` carries constraint violations (unique keys, exclusion
/// constraints on overlapping ranges) so callers can translate them into
/// their own domain conflicts instead of a generic failure.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage conflict: {0}")]
    Conflict(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("storage request failed ({status}): {body}")]
    Request { status: u16, body: String },

    #[error("storage transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode storage response: {0}")]
    Decode(String),
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self, prefer: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.service_key).unwrap());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.service_key)).unwrap(),
        );

        if let Some(prefer_value) = prefer {
            headers.insert("Prefer", HeaderValue::from_str(prefer_value).unwrap());
        }

        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        self.request_with_prefer(method, path, body, None).await
    }

    async fn request_with_prefer<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        prefer: Option<&str>,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut req = self
            .client
            .request(method, &url)
            .headers(self.get_headers(prefer));

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Storage API error ({}): {}", status, error_text);

            return Err(match status {
                StatusCode::CONFLICT => StoreError::Conflict(error_text),
                StatusCode::NOT_FOUND => StoreError::NotFound(error_text),
                _ => StoreError::Request {
                    status: status.as_u16(),
                    body: error_text,
                },
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    /// Insert a single row and return the stored representation.
    ///
    /// PostgREST answers inserts with an array; the caller gets the one row
    /// back. Constraint violations surface as `StoreError::Conflict`.
    pub async fn insert_one<T>(&self, table: &str, row: Value) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/{}", table);
        let rows: Vec<T> = self
            .request_with_prefer(Method::POST, &path, Some(row), Some("return=representation"))
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no rows".to_string()))
    }

    /// Apply a partial update to the rows matched by `filter` and return the
    /// first updated row.
    pub async fn update_one<T>(
        &self,
        table: &str,
        filter: &str,
        patch: Value,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/{}?{}", table, filter);
        let rows: Vec<T> = self
            .request_with_prefer(
                Method::PATCH,
                &path,
                Some(patch),
                Some("return=representation"),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("{}?{}", table, filter)))
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
