pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::{notification_routes, notification_routes_with_service};
pub use services::consumer::NotificationEventConsumer;
pub use services::dispatch::NotificationDispatchService;
pub use services::novu::{NovuClient, NovuError, NovuRecipient, NovuTriggerRequest, NovuTriggerResponse};
