use std::sync::Arc;

use axum::{routing::get, Router};

use notification_cell::router::notification_routes_with_service;
use notification_cell::services::dispatch::NotificationDispatchService;
use scheduling_cell::router::scheduling_routes;
use shared_config::AppConfig;

pub fn create_router(
    config: Arc<AppConfig>,
    dispatch_service: Arc<NotificationDispatchService>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "CareBridge API is running!" }))
        .nest("/appointments", scheduling_routes(config))
        .nest("/notifications", notification_routes_with_service(dispatch_service))
}
