pub mod events;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use events::AppointmentEvent;
pub use models::*;
pub use router::scheduling_routes;
pub use services::booking::AppointmentSchedulingService;
pub use services::conflict::ConflictDetectionService;
pub use services::lifecycle::AppointmentLifecycleService;
pub use services::publisher::{EventPublisher, NoopEventPublisher, PublishError, RedisEventPublisher};
