use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, ConflictCheckResponse, SchedulingError};

pub struct ConflictDetectionService {
    supabase: Arc<SupabaseClient>,
}

impl ConflictDetectionService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Check for booking conflicts for a doctor at a specific time.
    ///
    /// An existing appointment conflicts when it still blocks the calendar
    /// (status outside cancelled/completed) and its half-open interval
    /// intersects the requested one. Back-to-back bookings do not conflict.
    pub async fn check_conflicts(
        &self,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ConflictCheckResponse, SchedulingError> {
        debug!(
            "Checking conflicts for doctor {} from {} to {}",
            doctor_id, start_time, end_time
        );

        let candidates = self
            .get_blocking_appointments_in_range(doctor_id, start_time, end_time, exclude_appointment_id)
            .await?;

        let conflicting_appointments: Vec<Appointment> = candidates
            .into_iter()
            .filter(|appointment| {
                appointment.status.blocks_calendar()
                    && Self::intervals_overlap(
                        start_time,
                        end_time,
                        appointment.start_time,
                        appointment.end_time,
                    )
            })
            .collect();

        let has_conflict = !conflicting_appointments.is_empty();

        if has_conflict {
            warn!(
                "Conflict detected for doctor {} - {} conflicting appointments",
                doctor_id,
                conflicting_appointments.len()
            );
        }

        Ok(ConflictCheckResponse {
            has_conflict,
            conflicting_appointments,
        })
    }

    /// True iff the doctor has no blocking appointment overlapping the slot.
    pub async fn is_doctor_available(
        &self,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool, SchedulingError> {
        let response = self
            .check_conflicts(doctor_id, start_time, end_time, exclude_appointment_id)
            .await?;
        Ok(!response.has_conflict)
    }

    async fn get_blocking_appointments_in_range(
        &self,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut query_parts = vec![
            format!("doctor_id=eq.{}", doctor_id),
            // "Z" form: a "+00:00" offset would decode as a space in the query
            format!(
                "start_time=lt.{}",
                end_time.to_rfc3339_opts(SecondsFormat::Micros, true)
            ),
            format!(
                "end_time=gt.{}",
                start_time.to_rfc3339_opts(SecondsFormat::Micros, true)
            ),
            "status=not.in.(cancelled,completed)".to_string(),
        ];

        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!(
            "/rest/v1/appointments?{}&order=start_time.asc",
            query_parts.join("&")
        );

        self.supabase
            .request::<Vec<Appointment>>(Method::GET, &path, None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))
    }

    /// Half-open interval test: [a, b) and [c, d) intersect iff a < d && c < b.
    fn intervals_overlap(
        start1: DateTime<Utc>,
        end1: DateTime<Utc>,
        start2: DateTime<Utc>,
        end2: DateTime<Utc>,
    ) -> bool {
        start1 < end2 && start2 < end1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_900_000_000, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn overlapping_intervals_conflict() {
        assert!(ConflictDetectionService::intervals_overlap(
            at(0),
            at(60),
            at(30),
            at(90)
        ));
        assert!(ConflictDetectionService::intervals_overlap(
            at(30),
            at(90),
            at(0),
            at(60)
        ));
        // containment
        assert!(ConflictDetectionService::intervals_overlap(
            at(0),
            at(90),
            at(30),
            at(60)
        ));
    }

    #[test]
    fn back_to_back_intervals_do_not_conflict() {
        assert!(!ConflictDetectionService::intervals_overlap(
            at(0),
            at(60),
            at(60),
            at(120)
        ));
        assert!(!ConflictDetectionService::intervals_overlap(
            at(60),
            at(120),
            at(0),
            at(60)
        ));
    }
}
