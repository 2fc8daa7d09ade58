use std::collections::HashMap;
use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub novu_api_url: String,
    pub novu_api_key: String,
    pub novu_workflow_overrides: HashMap<String, String>,
    pub redis_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            novu_api_url: env::var("NOVU_API_URL")
                .unwrap_or_else(|_| {
                    warn!("NOVU_API_URL not set, using default");
                    "https://api.novu.co".to_string()
                }),
            novu_api_key: env::var("NOVU_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("NOVU_API_KEY not set, using empty value");
                    String::new()
                }),
            novu_workflow_overrides: env::var("NOVU_WORKFLOW_MAP")
                .map(|raw| Self::parse_workflow_map(&raw))
                .unwrap_or_default(),
            redis_url: env::var("REDIS_URL").ok(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// Parse NOVU_WORKFLOW_MAP entries of the form
    /// "appointment.confirmed=appt-confirmed,order.shipped=order-shipped".
    fn parse_workflow_map(raw: &str) -> HashMap<String, String> {
        raw.split(',')
            .filter_map(|pair| {
                let mut parts = pair.splitn(2, '=');
                match (parts.next(), parts.next()) {
                    (Some(event), Some(workflow))
                        if !event.trim().is_empty() && !workflow.trim().is_empty() =>
                    {
                        Some((event.trim().to_string(), workflow.trim().to_string()))
                    }
                    _ => {
                        warn!("Ignoring malformed NOVU_WORKFLOW_MAP entry: {}", pair);
                        None
                    }
                }
            })
            .collect()
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }

    pub fn is_novu_configured(&self) -> bool {
        !self.novu_api_url.is_empty() && !self.novu_api_key.is_empty()
    }

    pub fn is_messaging_configured(&self) -> bool {
        self.redis_url.is_some()
    }
}
