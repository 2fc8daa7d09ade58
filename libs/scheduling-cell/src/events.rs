// libs/scheduling-cell/src/events.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AppointmentType;

/// Lifecycle events emitted by the scheduling cell.
///
/// Serialized with an `event_type` discriminator so downstream consumers
/// (analytics ingestion, notification triggers) can route on the tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentEvent {
    AppointmentCreated {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        appointment_type: AppointmentType,
        reason: Option<String>,
    },
    AppointmentConfirmed {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        confirmed_at: DateTime<Utc>,
        start_time: DateTime<Utc>,
    },
    AppointmentRescheduled {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        old_start_time: DateTime<Utc>,
        old_end_time: DateTime<Utc>,
        new_start_time: DateTime<Utc>,
        new_end_time: DateTime<Utc>,
    },
    AppointmentCancelled {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        cancelled_at: DateTime<Utc>,
        cancellation_reason: String,
        original_start_time: DateTime<Utc>,
    },
    AppointmentCompleted {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        completed_at: DateTime<Utc>,
        start_time: DateTime<Utc>,
        duration_minutes: Option<i64>,
    },
}

impl AppointmentEvent {
    /// The appointment this event belongs to; used as the publish key.
    pub fn appointment_id(&self) -> Uuid {
        match self {
            AppointmentEvent::AppointmentCreated { appointment_id, .. }
            | AppointmentEvent::AppointmentConfirmed { appointment_id, .. }
            | AppointmentEvent::AppointmentRescheduled { appointment_id, .. }
            | AppointmentEvent::AppointmentCancelled { appointment_id, .. }
            | AppointmentEvent::AppointmentCompleted { appointment_id, .. } => *appointment_id,
        }
    }

    pub fn event_id(&self) -> Uuid {
        match self {
            AppointmentEvent::AppointmentCreated { event_id, .. }
            | AppointmentEvent::AppointmentConfirmed { event_id, .. }
            | AppointmentEvent::AppointmentRescheduled { event_id, .. }
            | AppointmentEvent::AppointmentCancelled { event_id, .. }
            | AppointmentEvent::AppointmentCompleted { event_id, .. } => *event_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppointmentEvent::AppointmentCreated { .. } => "APPOINTMENT_CREATED",
            AppointmentEvent::AppointmentConfirmed { .. } => "APPOINTMENT_CONFIRMED",
            AppointmentEvent::AppointmentRescheduled { .. } => "APPOINTMENT_RESCHEDULED",
            AppointmentEvent::AppointmentCancelled { .. } => "APPOINTMENT_CANCELLED",
            AppointmentEvent::AppointmentCompleted { .. } => "APPOINTMENT_COMPLETED",
        }
    }
}
