// libs/appointment-cell/src/services/conflict.rs
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppointmentError;
use crate::models::{AppointmentQuery, AppointmentStatus, ConflictCheckResponse};
use crate::ports::AppointmentStore;

/// Detects doctor double-booking inside a buffered window around a slot.
pub struct ConflictDetectionService {
    store: Arc<dyn AppointmentStore>,
    window_minutes: i64,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn AppointmentStore>, window_minutes: i64) -> Self {
        Self {
            store,
            window_minutes,
        }
    }

    /// Matches active appointments of the same doctor whose scheduled instant
    /// lies within the inclusive window around `scheduled_at`, optionally
    /// leaving out one appointment id (a reschedule checked against itself).
    pub async fn detect(
        &self,
        doctor_id: Uuid,
        scheduled_at: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        debug!(
            "Checking conflicts for doctor {} around {}",
            doctor_id, scheduled_at
        );

        let window = Duration::minutes(self.window_minutes);
        let query = AppointmentQuery {
            doctor_id: Some(doctor_id),
            statuses: Some(AppointmentStatus::ACTIVE.to_vec()),
            scheduled_from: Some(scheduled_at - window),
            scheduled_to: Some(scheduled_at + window),
            exclude_id: exclude_appointment_id,
            ..Default::default()
        };

        let conflicting = self
            .store
            .find_many(&query)
            .await
            .map_err(AppointmentError::store)?;

        let has_conflict = !conflicting.is_empty();
        if has_conflict {
            warn!(
                "Conflict detected for doctor {} - {} overlapping appointments",
                doctor_id,
                conflicting.len()
            );
        }

        Ok(ConflictCheckResponse {
            has_conflict,
            conflicting,
        })
    }
}
