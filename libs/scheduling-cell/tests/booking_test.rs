use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::events::AppointmentEvent;
use scheduling_cell::models::{
    AppointmentStatus, CreateAppointmentRequest, AppointmentType, RescheduleAppointmentRequest,
    SchedulingError,
};
use scheduling_cell::services::booking::AppointmentSchedulingService;
use scheduling_cell::services::publisher::{EventPublisher, PublishError};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

// ==============================================================================
// TEST HELPERS
// ==============================================================================

fn test_config(supabase_url: &str) -> AppConfig {
    AppConfig {
        supabase_url: supabase_url.to_string(),
        supabase_service_key: "test-service-key".to_string(),
        novu_api_url: "http://localhost:9999".to_string(),
        novu_api_key: "test-novu-key".to_string(),
        novu_workflow_overrides: Default::default(),
        redis_url: None,
    }
}

/// Captures published events so tests can assert on the fan-out.
#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<AppointmentEvent>>,
}

impl RecordingPublisher {
    fn recorded(&self) -> Vec<AppointmentEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &AppointmentEvent) -> Result<(), PublishError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

fn make_service(
    mock_server: &MockServer,
) -> (AppointmentSchedulingService, Arc<RecordingPublisher>) {
    let config = test_config(&mock_server.uri());
    let supabase = Arc::new(SupabaseClient::new(&config));
    let publisher = Arc::new(RecordingPublisher::default());
    let service =
        AppointmentSchedulingService::new(supabase, publisher.clone() as Arc<dyn EventPublisher>);
    (service, publisher)
}

fn appointment_row(
    id: Uuid,
    patient_id: Uuid,
    doctor_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: &str,
) -> serde_json::Value {
    json!({
        "id": id,
        "patient_id": patient_id,
        "doctor_id": doctor_id,
        "start_time": start_time,
        "end_time": end_time,
        "status": status,
        "appointment_type": "consultation",
        "reason": "Annual checkup",
        "notes": null,
        "created_at": Utc::now(),
        "updated_at": Utc::now(),
        "checked_in_at": null,
        "completed_at": null,
        "cancelled_at": null,
        "cancellation_reason": null,
        "reminder_sent": false,
        "confirmation_sent": false,
    })
}

fn create_request(doctor_id: Uuid, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        patient_id: Uuid::new_v4(),
        doctor_id,
        start_time,
        end_time,
        appointment_type: AppointmentType::Consultation,
        reason: Some("Annual checkup".to_string()),
        notes: None,
    }
}

async fn mock_conflict_query(mock_server: &MockServer, doctor_id: Uuid, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("status", "not.in.(cancelled,completed)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(mock_server)
        .await;
}

async fn mock_get_by_id(mock_server: &MockServer, id: Uuid, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(mock_server)
        .await;
}

// ==============================================================================
// CREATE
// ==============================================================================

#[tokio::test]
async fn create_appointment_succeeds_and_publishes_event() {
    let mock_server = MockServer::start().await;
    let (service, publisher) = make_service(&mock_server);

    let doctor_id = Uuid::new_v4();
    let start = Utc::now() + Duration::hours(2);
    let end = start + Duration::hours(1);
    let request = create_request(doctor_id, start, end);

    mock_conflict_query(&mock_server, doctor_id, json!([])).await;

    let stored = appointment_row(Uuid::new_v4(), request.patient_id, doctor_id, start, end, "scheduled");
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([stored])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let appointment = service.create_appointment(request).await.unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    assert_eq!(appointment.doctor_id, doctor_id);

    let events = publisher.recorded();
    assert_eq!(events.len(), 1);
    assert_matches!(events[0], AppointmentEvent::AppointmentCreated { .. });
}

#[tokio::test]
async fn create_appointment_rejects_overlapping_booking() {
    let mock_server = MockServer::start().await;
    let (service, publisher) = make_service(&mock_server);

    let doctor_id = Uuid::new_v4();
    let start = Utc::now() + Duration::hours(2);
    let end = start + Duration::hours(1);

    // Existing booking from start+30m to end+30m overlaps the request.
    let existing = appointment_row(
        Uuid::new_v4(),
        Uuid::new_v4(),
        doctor_id,
        start + Duration::minutes(30),
        end + Duration::minutes(30),
        "scheduled",
    );
    mock_conflict_query(&mock_server, doctor_id, json!([existing])).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = service.create_appointment(create_request(doctor_id, start, end)).await;

    assert_matches!(result, Err(SchedulingError::ConflictDetected));
    assert!(publisher.recorded().is_empty());
}

#[tokio::test]
async fn create_appointment_allows_back_to_back_slots() {
    let mock_server = MockServer::start().await;
    let (service, _publisher) = make_service(&mock_server);

    let doctor_id = Uuid::new_v4();
    let start = Utc::now() + Duration::hours(2);
    let end = start + Duration::hours(1);

    // Existing booking ends exactly when the new one starts: not a conflict
    // under half-open semantics.
    let touching = appointment_row(
        Uuid::new_v4(),
        Uuid::new_v4(),
        doctor_id,
        start - Duration::hours(1),
        start,
        "confirmed",
    );
    mock_conflict_query(&mock_server, doctor_id, json!([touching])).await;

    let stored = appointment_row(Uuid::new_v4(), Uuid::new_v4(), doctor_id, start, end, "scheduled");
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([stored])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let appointment = service
        .create_appointment(create_request(doctor_id, start, end))
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn create_appointment_rejects_past_start_time() {
    let mock_server = MockServer::start().await;
    let (service, publisher) = make_service(&mock_server);

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let start = Utc::now() - Duration::hours(1);
    let result = service
        .create_appointment(create_request(Uuid::new_v4(), start, start + Duration::hours(1)))
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidTime(_)));
    assert!(publisher.recorded().is_empty());
}

#[tokio::test]
async fn create_appointment_rejects_end_before_start() {
    let mock_server = MockServer::start().await;
    let (service, _publisher) = make_service(&mock_server);

    let start = Utc::now() + Duration::hours(2);
    let result = service
        .create_appointment(create_request(Uuid::new_v4(), start, start - Duration::minutes(30)))
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidTime(_)));
}

#[tokio::test]
async fn create_appointment_maps_storage_conflict_to_conflict_error() {
    let mock_server = MockServer::start().await;
    let (service, publisher) = make_service(&mock_server);

    let doctor_id = Uuid::new_v4();
    let start = Utc::now() + Duration::hours(2);

    // The availability pre-check passes, then the storage exclusion
    // constraint rejects the racing insert.
    mock_conflict_query(&mock_server, doctor_id, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23P01",
            "message": "conflicting key value violates exclusion constraint \"appointments_doctor_slot_excl\""
        })))
        .mount(&mock_server)
        .await;

    let result = service
        .create_appointment(create_request(doctor_id, start, start + Duration::hours(1)))
        .await;

    assert_matches!(result, Err(SchedulingError::ConflictDetected));
    assert!(publisher.recorded().is_empty());
}

// ==============================================================================
// STATUS TRANSITIONS
// ==============================================================================

#[tokio::test]
async fn confirm_appointment_rejected_from_completed() {
    let mock_server = MockServer::start().await;
    let (service, _publisher) = make_service(&mock_server);

    let id = Uuid::new_v4();
    let start = Utc::now() - Duration::hours(3);
    let row = appointment_row(id, Uuid::new_v4(), Uuid::new_v4(), start, start + Duration::hours(1), "completed");
    mock_get_by_id(&mock_server, id, json!([row])).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = service.confirm_appointment(id).await;
    assert_matches!(
        result,
        Err(SchedulingError::InvalidStatusTransition(AppointmentStatus::Completed))
    );
}

#[tokio::test]
async fn confirm_appointment_succeeds_from_scheduled() {
    let mock_server = MockServer::start().await;
    let (service, publisher) = make_service(&mock_server);

    let id = Uuid::new_v4();
    let start = Utc::now() + Duration::hours(4);
    let row = appointment_row(id, Uuid::new_v4(), Uuid::new_v4(), start, start + Duration::hours(1), "scheduled");
    mock_get_by_id(&mock_server, id, json!([row.clone()])).await;

    let mut confirmed = row;
    confirmed["status"] = json!("confirmed");
    confirmed["confirmation_sent"] = json!(true);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([confirmed])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let appointment = service.confirm_appointment(id).await.unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Confirmed);
    assert!(appointment.confirmation_sent);

    let events = publisher.recorded();
    assert_eq!(events.len(), 1);
    assert_matches!(events[0], AppointmentEvent::AppointmentConfirmed { .. });
}

#[tokio::test]
async fn cancel_appointment_records_reason_and_publishes_event() {
    let mock_server = MockServer::start().await;
    let (service, publisher) = make_service(&mock_server);

    let id = Uuid::new_v4();
    let start = Utc::now() + Duration::hours(4);
    let row = appointment_row(id, Uuid::new_v4(), Uuid::new_v4(), start, start + Duration::hours(1), "confirmed");
    mock_get_by_id(&mock_server, id, json!([row.clone()])).await;

    let mut cancelled = row;
    cancelled["status"] = json!("cancelled");
    cancelled["cancelled_at"] = json!(Utc::now());
    cancelled["cancellation_reason"] = json!("Patient request");
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let appointment = service
        .cancel_appointment(id, "Patient request".to_string())
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Cancelled);
    assert_eq!(appointment.cancellation_reason.as_deref(), Some("Patient request"));

    let events = publisher.recorded();
    assert_eq!(events.len(), 1);
    assert_matches!(events[0], AppointmentEvent::AppointmentCancelled { .. });
}

// ==============================================================================
// RESCHEDULE
// ==============================================================================

#[tokio::test]
async fn reschedule_to_own_slot_excludes_itself_from_conflict_check() {
    let mock_server = MockServer::start().await;
    let (service, _publisher) = make_service(&mock_server);

    let id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    let start = Utc::now() + Duration::hours(4);
    let end = start + Duration::hours(1);
    let row = appointment_row(id, Uuid::new_v4(), doctor_id, start, end, "scheduled");
    mock_get_by_id(&mock_server, id, json!([row.clone()])).await;

    // The overlap query must carry id=neq.<self>; the store then sees no
    // other blocking rows.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("id", format!("neq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = RescheduleAppointmentRequest {
        new_start_time: start,
        new_end_time: end,
    };
    let appointment = service.reschedule_appointment(id, request).await.unwrap();
    assert_eq!(appointment.start_time, start);
}

#[tokio::test]
async fn reschedule_rejected_for_cancelled_appointment() {
    let mock_server = MockServer::start().await;
    let (service, _publisher) = make_service(&mock_server);

    let id = Uuid::new_v4();
    let start = Utc::now() + Duration::hours(4);
    let row = appointment_row(id, Uuid::new_v4(), Uuid::new_v4(), start, start + Duration::hours(1), "cancelled");
    mock_get_by_id(&mock_server, id, json!([row])).await;

    let request = RescheduleAppointmentRequest {
        new_start_time: start + Duration::hours(1),
        new_end_time: start + Duration::hours(2),
    };
    let result = service.reschedule_appointment(id, request).await;
    assert_matches!(
        result,
        Err(SchedulingError::InvalidStatusTransition(AppointmentStatus::Cancelled))
    );
}

#[tokio::test]
async fn reschedule_rejects_past_start_time() {
    let mock_server = MockServer::start().await;
    let (service, _publisher) = make_service(&mock_server);

    let id = Uuid::new_v4();
    let start = Utc::now() + Duration::hours(4);
    let row = appointment_row(id, Uuid::new_v4(), Uuid::new_v4(), start, start + Duration::hours(1), "scheduled");
    mock_get_by_id(&mock_server, id, json!([row])).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let request = RescheduleAppointmentRequest {
        new_start_time: Utc::now() - Duration::hours(1),
        new_end_time: Utc::now() + Duration::hours(1),
    };
    let result = service.reschedule_appointment(id, request).await;
    assert_matches!(result, Err(SchedulingError::InvalidTime(_)));
}

// ==============================================================================
// READS
// ==============================================================================

#[tokio::test]
async fn get_appointment_returns_not_found_for_unknown_id() {
    let mock_server = MockServer::start().await;
    let (service, _publisher) = make_service(&mock_server);

    let id = Uuid::new_v4();
    mock_get_by_id(&mock_server, id, json!([])).await;

    let result = service.get_appointment(id).await;
    assert_matches!(result, Err(SchedulingError::NotFound));
}
