use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use notification_cell::services::consumer::NotificationEventConsumer;
use notification_cell::services::dispatch::NotificationDispatchService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CareBridge API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    // Dispatch service is shared between the REST surface and the bus consumer
    let supabase = Arc::new(SupabaseClient::new(&config));
    let dispatch_service = Arc::new(NotificationDispatchService::new(&config, supabase));

    // Consume notification trigger events from the bus when messaging is configured
    if let Some(consumer) =
        NotificationEventConsumer::from_config(&config, Arc::clone(&dispatch_service))
    {
        let consumer = Arc::new(consumer);
        tokio::spawn(async move {
            consumer.start().await;
        });
    } else {
        info!("Notification event consumer disabled (no Redis configured)");
    }

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(config, dispatch_service)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .await
        .unwrap();
}
