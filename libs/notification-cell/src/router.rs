// libs/notification-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::handlers;
use crate::services::dispatch::NotificationDispatchService;

pub fn notification_routes(config: Arc<AppConfig>) -> Router {
    let supabase = Arc::new(SupabaseClient::new(&config));
    let service = Arc::new(NotificationDispatchService::new(&config, supabase));

    notification_routes_with_service(service)
}

/// Router over an already-built dispatch service, shared with the event
/// consumer wiring in the api binary.
pub fn notification_routes_with_service(service: Arc<NotificationDispatchService>) -> Router {
    Router::new()
        .route("/", post(handlers::create_notification))
        .route("/{notification_id}", get(handlers::get_notification))
        .route("/users/{user_id}", get(handlers::get_user_notifications))
        .route("/callbacks/novu", post(handlers::handle_novu_webhook))
        .with_state(service)
}
