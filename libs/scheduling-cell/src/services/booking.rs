// libs/scheduling-cell/src/services/booking.rs
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use shared_database::supabase::{StoreError, SupabaseClient};

use crate::events::AppointmentEvent;
use crate::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatus, CreateAppointmentRequest,
    RescheduleAppointmentRequest, SchedulingError, SchedulingRules,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::publisher::EventPublisher;

pub struct AppointmentSchedulingService {
    supabase: Arc<SupabaseClient>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    event_publisher: Arc<dyn EventPublisher>,
}

impl AppointmentSchedulingService {
    pub fn new(supabase: Arc<SupabaseClient>, event_publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            conflict_service: ConflictDetectionService::new(Arc::clone(&supabase)),
            lifecycle_service: AppointmentLifecycleService::new(),
            supabase,
            event_publisher,
        }
    }

    pub fn with_rules(
        supabase: Arc<SupabaseClient>,
        event_publisher: Arc<dyn EventPublisher>,
        rules: SchedulingRules,
    ) -> Self {
        Self {
            conflict_service: ConflictDetectionService::new(Arc::clone(&supabase)),
            lifecycle_service: AppointmentLifecycleService::with_rules(rules),
            supabase,
            event_publisher,
        }
    }

    /// Book a new appointment for a doctor/patient pair.
    ///
    /// The availability pre-check gives a friendly rejection for the common
    /// case; the storage exclusion constraint on (doctor_id, time range)
    /// remains the backstop for two creates racing past the check, surfacing
    /// here as a 409 mapped to `ConflictDetected`.
    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        info!(
            "Booking appointment for patient {} with doctor {}",
            request.patient_id, request.doctor_id
        );

        self.validate_appointment_times(request.start_time, request.end_time)?;

        let available = self
            .conflict_service
            .is_doctor_available(request.doctor_id, request.start_time, request.end_time, None)
            .await?;
        if !available {
            return Err(SchedulingError::ConflictDetected);
        }

        let now = Utc::now();
        let row = json!({
            "id": Uuid::new_v4(),
            "patient_id": request.patient_id,
            "doctor_id": request.doctor_id,
            "start_time": request.start_time,
            "end_time": request.end_time,
            "status": AppointmentStatus::Scheduled,
            "appointment_type": request.appointment_type,
            "reason": request.reason,
            "notes": request.notes,
            "created_at": now,
            "updated_at": now,
            "reminder_sent": false,
            "confirmation_sent": false,
        });

        let appointment: Appointment = self
            .supabase
            .insert_one("appointments", row)
            .await
            .map_err(Self::map_write_error)?;

        self.publish_event(AppointmentEvent::AppointmentCreated {
            event_id: Uuid::new_v4(),
            timestamp: now,
            appointment_id: appointment.id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            start_time: appointment.start_time,
            end_time: appointment.end_time,
            appointment_type: appointment.appointment_type,
            reason: appointment.reason.clone(),
        })
        .await;

        info!("Appointment {} booked with doctor {}", appointment.id, appointment.doctor_id);
        Ok(appointment)
    }

    /// Move an existing appointment to a new time slot, keeping its status.
    pub async fn reschedule_appointment(
        &self,
        id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.get_appointment(id).await?;

        if !self.lifecycle_service.can_reschedule(&appointment.status) {
            return Err(SchedulingError::InvalidStatusTransition(appointment.status));
        }

        self.validate_appointment_times(request.new_start_time, request.new_end_time)?;

        // The appointment's own slot must not count against it.
        let available = self
            .conflict_service
            .is_doctor_available(
                appointment.doctor_id,
                request.new_start_time,
                request.new_end_time,
                Some(id),
            )
            .await?;
        if !available {
            return Err(SchedulingError::ConflictDetected);
        }

        let updated = self
            .patch_appointment(
                id,
                json!({
                    "start_time": request.new_start_time,
                    "end_time": request.new_end_time,
                    "updated_at": Utc::now(),
                }),
            )
            .await?;

        self.publish_event(AppointmentEvent::AppointmentRescheduled {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            appointment_id: updated.id,
            patient_id: updated.patient_id,
            doctor_id: updated.doctor_id,
            old_start_time: appointment.start_time,
            old_end_time: appointment.end_time,
            new_start_time: updated.start_time,
            new_end_time: updated.end_time,
        })
        .await;

        Ok(updated)
    }

    pub async fn cancel_appointment(
        &self,
        id: Uuid,
        reason: String,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.get_appointment(id).await?;

        self.lifecycle_service
            .validate_status_transition(&appointment.status, &AppointmentStatus::Cancelled)?;

        let cancelled_at = Utc::now();
        let updated = self
            .patch_appointment(
                id,
                json!({
                    "status": AppointmentStatus::Cancelled,
                    "cancelled_at": cancelled_at,
                    "cancellation_reason": reason,
                    "updated_at": cancelled_at,
                }),
            )
            .await?;

        self.publish_event(AppointmentEvent::AppointmentCancelled {
            event_id: Uuid::new_v4(),
            timestamp: cancelled_at,
            appointment_id: updated.id,
            patient_id: updated.patient_id,
            doctor_id: updated.doctor_id,
            cancelled_at,
            cancellation_reason: updated.cancellation_reason.clone().unwrap_or_default(),
            original_start_time: appointment.start_time,
        })
        .await;

        Ok(updated)
    }

    pub async fn confirm_appointment(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        let appointment = self.get_appointment(id).await?;

        self.lifecycle_service
            .validate_status_transition(&appointment.status, &AppointmentStatus::Confirmed)?;

        let confirmed_at = Utc::now();
        let updated = self
            .patch_appointment(
                id,
                json!({
                    "status": AppointmentStatus::Confirmed,
                    "confirmation_sent": true,
                    "updated_at": confirmed_at,
                }),
            )
            .await?;

        self.publish_event(AppointmentEvent::AppointmentConfirmed {
            event_id: Uuid::new_v4(),
            timestamp: confirmed_at,
            appointment_id: updated.id,
            patient_id: updated.patient_id,
            doctor_id: updated.doctor_id,
            confirmed_at,
            start_time: updated.start_time,
        })
        .await;

        Ok(updated)
    }

    pub async fn check_in_appointment(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        let appointment = self.get_appointment(id).await?;

        self.lifecycle_service
            .validate_status_transition(&appointment.status, &AppointmentStatus::CheckedIn)?;

        let checked_in_at = Utc::now();
        // Check-in has no event consumer downstream, status change only.
        self.patch_appointment(
            id,
            json!({
                "status": AppointmentStatus::CheckedIn,
                "checked_in_at": checked_in_at,
                "updated_at": checked_in_at,
            }),
        )
        .await
    }

    pub async fn start_appointment(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        let appointment = self.get_appointment(id).await?;

        self.lifecycle_service
            .validate_status_transition(&appointment.status, &AppointmentStatus::InProgress)?;

        self.patch_appointment(
            id,
            json!({
                "status": AppointmentStatus::InProgress,
                "updated_at": Utc::now(),
            }),
        )
        .await
    }

    pub async fn complete_appointment(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        let appointment = self.get_appointment(id).await?;

        self.lifecycle_service
            .validate_status_transition(&appointment.status, &AppointmentStatus::Completed)?;

        let completed_at = Utc::now();
        let updated = self
            .patch_appointment(
                id,
                json!({
                    "status": AppointmentStatus::Completed,
                    "completed_at": completed_at,
                    "updated_at": completed_at,
                }),
            )
            .await?;

        self.publish_event(AppointmentEvent::AppointmentCompleted {
            event_id: Uuid::new_v4(),
            timestamp: completed_at,
            appointment_id: updated.id,
            patient_id: updated.patient_id,
            doctor_id: updated.doctor_id,
            completed_at,
            start_time: updated.start_time,
            duration_minutes: Some(updated.duration_minutes()),
        })
        .await;

        Ok(updated)
    }

    pub async fn mark_no_show(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        let appointment = self.get_appointment(id).await?;

        self.lifecycle_service
            .validate_status_transition(&appointment.status, &AppointmentStatus::NoShow)?;

        self.patch_appointment(
            id,
            json!({
                "status": AppointmentStatus::NoShow,
                "updated_at": Utc::now(),
            }),
        )
        .await
    }

    pub async fn is_doctor_available(
        &self,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool, SchedulingError> {
        self.conflict_service
            .is_doctor_available(doctor_id, start_time, end_time, exclude_appointment_id)
            .await
    }

    // ==============================================================================
    // READ OPERATIONS
    // ==============================================================================

    pub async fn get_appointment(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&limit=1", id);
        let rows = self.list_appointments(&path).await?;
        rows.into_iter().next().ok_or(SchedulingError::NotFound)
    }

    pub async fn get_patient_appointments(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=start_time.asc",
            patient_id
        );
        self.list_appointments(&path).await
    }

    pub async fn get_doctor_appointments(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&order=start_time.asc",
            doctor_id
        );
        self.list_appointments(&path).await
    }

    pub async fn get_appointments_by_status(
        &self,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!("/rest/v1/appointments?status=eq.{}&order=start_time.asc", status);
        self.list_appointments(&path).await
    }

    /// Future appointments still awaiting the visit (scheduled or confirmed),
    /// soonest first.
    pub async fn get_upcoming_appointments(&self) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?start_time=gte.{}&status=in.(scheduled,confirmed)&order=start_time.asc",
            Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
        );
        self.list_appointments(&path).await
    }

    pub async fn search_appointments(
        &self,
        query: AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut query_parts = Vec::new();

        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(doctor_id) = query.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from_date) = query.from_date {
            query_parts.push(format!(
                "start_time=gte.{}",
                from_date.to_rfc3339_opts(SecondsFormat::Micros, true)
            ));
        }
        if let Some(to_date) = query.to_date {
            query_parts.push(format!(
                "start_time=lte.{}",
                to_date.to_rfc3339_opts(SecondsFormat::Micros, true)
            ));
        }

        query_parts.push("order=start_time.asc".to_string());

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        self.list_appointments(&path).await
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    fn validate_appointment_times(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<(), SchedulingError> {
        if end_time <= start_time {
            return Err(SchedulingError::InvalidTime(
                "End time must be after start time".to_string(),
            ));
        }
        if start_time <= Utc::now() {
            return Err(SchedulingError::InvalidTime(
                "Start time must be in the future".to_string(),
            ));
        }
        Ok(())
    }

    async fn list_appointments(&self, path: &str) -> Result<Vec<Appointment>, SchedulingError> {
        self.supabase
            .request::<Vec<Appointment>>(Method::GET, path, None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))
    }

    async fn patch_appointment(
        &self,
        id: Uuid,
        patch: serde_json::Value,
    ) -> Result<Appointment, SchedulingError> {
        self.supabase
            .update_one("appointments", &format!("id=eq.{}", id), patch)
            .await
            .map_err(Self::map_write_error)
    }

    fn map_write_error(e: StoreError) -> SchedulingError {
        match e {
            StoreError::Conflict(_) => SchedulingError::ConflictDetected,
            StoreError::NotFound(_) => SchedulingError::NotFound,
            other => SchedulingError::DatabaseError(other.to_string()),
        }
    }

    async fn publish_event(&self, event: AppointmentEvent) {
        debug!(
            "Publishing event {} for appointment {}",
            event.kind(),
            event.appointment_id()
        );
        // Best-effort: a broken event bus must not fail the booking flow.
        if let Err(e) = self.event_publisher.publish(&event).await {
            error!(
                "Failed to publish {} event for appointment {}: {}",
                event.kind(),
                event.appointment_id(),
                e
            );
        }
    }
}
