// libs/appointment-cell/src/services/validation.rs
use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppointmentError;
use crate::models::{SchedulingRules, ValidationOutcome};
use crate::ports::{Clock, DoctorDirectory};

/// Checks a proposed slot against every booking rule and reports all
/// violations at once, so a caller sees every problem in one round trip.
pub struct BookingValidationService {
    doctors: Arc<dyn DoctorDirectory>,
    clock: Arc<dyn Clock>,
    rules: SchedulingRules,
}

impl BookingValidationService {
    pub fn new(
        doctors: Arc<dyn DoctorDirectory>,
        clock: Arc<dyn Clock>,
        rules: SchedulingRules,
    ) -> Self {
        Self {
            doctors,
            clock,
            rules,
        }
    }

    /// Rules are never short-circuited, with one exception: when the doctor
    /// is not found, the eligibility rules are skipped since they are only
    /// meaningful for a doctor that exists.
    pub async fn validate(
        &self,
        doctor_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<ValidationOutcome, AppointmentError> {
        debug!("Validating booking for doctor {} at {}", doctor_id, scheduled_at);

        let mut errors = Vec::new();

        match self
            .doctors
            .find_by_id(doctor_id)
            .await
            .map_err(AppointmentError::external)?
        {
            None => errors.push("Doctor not found".to_string()),
            Some(doctor) => {
                if !doctor.accepting_new_patients {
                    errors.push("Doctor is not accepting new patients".to_string());
                }
                if !doctor.license_verified {
                    errors.push("Doctor's license has not been verified".to_string());
                }
            }
        }

        let now = self.clock.now();
        let lead = scheduled_at - now;

        if lead < Duration::hours(self.rules.min_booking_lead_hours) {
            errors.push(format!(
                "Appointment must be booked at least {} hours in advance",
                self.rules.min_booking_lead_hours
            ));
        }
        if lead > Duration::hours(self.rules.max_booking_lead_hours) {
            errors.push(format!(
                "Appointment cannot be booked more than {} hours in advance",
                self.rules.max_booking_lead_hours
            ));
        }
        if scheduled_at <= now {
            errors.push("Appointment must be scheduled for a future time".to_string());
        }

        let hour = scheduled_at.hour();
        if hour < self.rules.clinic_opening_hour || hour >= self.rules.clinic_closing_hour {
            errors.push(format!(
                "Appointments must be scheduled between {} and {}",
                hour_label(self.rules.clinic_opening_hour),
                hour_label(self.rules.clinic_closing_hour)
            ));
        }

        if matches!(scheduled_at.weekday(), Weekday::Sat | Weekday::Sun) {
            errors.push("Appointments cannot be scheduled on weekends".to_string());
        }

        Ok(ValidationOutcome::from_errors(errors))
    }
}

fn hour_label(hour: u32) -> String {
    match hour {
        0 | 24 => "12 AM".to_string(),
        h if h < 12 => format!("{} AM", h),
        12 => "12 PM".to_string(),
        h => format!("{} PM", h - 12),
    }
}
