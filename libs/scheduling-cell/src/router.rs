// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use tracing::info;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::handlers;
use crate::services::booking::AppointmentSchedulingService;
use crate::services::publisher::{EventPublisher, NoopEventPublisher, RedisEventPublisher};

pub fn scheduling_routes(config: Arc<AppConfig>) -> Router {
    let supabase = Arc::new(SupabaseClient::new(&config));

    let event_publisher: Arc<dyn EventPublisher> = match RedisEventPublisher::from_config(&config) {
        Some(publisher) => Arc::new(publisher),
        None => {
            info!("Appointment event publishing disabled (no Redis configured)");
            Arc::new(NoopEventPublisher)
        }
    };

    let service = Arc::new(AppointmentSchedulingService::new(supabase, event_publisher));

    Router::new()
        .route("/", post(handlers::create_appointment))
        .route("/upcoming", get(handlers::get_upcoming_appointments))
        .route("/search", get(handlers::search_appointments))
        .route("/availability", get(handlers::check_doctor_availability))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/confirm", post(handlers::confirm_appointment))
        .route("/{appointment_id}/check-in", post(handlers::check_in_appointment))
        .route("/{appointment_id}/start", post(handlers::start_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/no-show", post(handlers::mark_no_show))
        .route("/patients/{patient_id}", get(handlers::get_patient_appointments))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_appointments))
        .route("/status/{status}", get(handlers::get_appointments_by_status))
        .with_state(service)
}
