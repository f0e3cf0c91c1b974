use std::env;
use tracing::warn;

/// Scheduling policy knobs, resolved once at process start and handed to the
/// composition root. Every value falls back to the clinic's standard policy
/// when the environment does not override it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Minimum lead time for a new booking or reschedule, in hours.
    pub min_booking_lead_hours: i64,
    /// Maximum lead time for a new booking or reschedule, in hours.
    pub max_booking_lead_hours: i64,
    /// First bookable hour of the day (inclusive).
    pub clinic_opening_hour: u32,
    /// First non-bookable hour of the day (exclusive upper bound).
    pub clinic_closing_hour: u32,
    /// Half-width of the double-booking window around a slot, in minutes.
    pub conflict_window_minutes: i64,
    /// Notice a patient must give before cancelling, in hours.
    pub patient_cancellation_notice_hours: i64,
    /// Upper bound on any single collaborator call (payments, meetings,
    /// notifications, reminders), in seconds.
    pub collaborator_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            min_booking_lead_hours: 24,
            max_booking_lead_hours: 48,
            clinic_opening_hour: 9,
            clinic_closing_hour: 18,
            conflict_window_minutes: 30,
            patient_cancellation_notice_hours: 24,
            collaborator_timeout_secs: 5,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            min_booking_lead_hours: env_i64("MIN_BOOKING_LEAD_HOURS", defaults.min_booking_lead_hours),
            max_booking_lead_hours: env_i64("MAX_BOOKING_LEAD_HOURS", defaults.max_booking_lead_hours),
            clinic_opening_hour: env_u32("CLINIC_OPENING_HOUR", defaults.clinic_opening_hour),
            clinic_closing_hour: env_u32("CLINIC_CLOSING_HOUR", defaults.clinic_closing_hour),
            conflict_window_minutes: env_i64("CONFLICT_WINDOW_MINUTES", defaults.conflict_window_minutes),
            patient_cancellation_notice_hours: env_i64(
                "PATIENT_CANCELLATION_NOTICE_HOURS",
                defaults.patient_cancellation_notice_hours,
            ),
            collaborator_timeout_secs: env_u64(
                "COLLABORATOR_TIMEOUT_SECS",
                defaults.collaborator_timeout_secs,
            ),
        };

        if !config.is_coherent() {
            warn!("Scheduling configuration is incoherent - falling back to defaults");
            return defaults;
        }

        config
    }

    pub fn is_coherent(&self) -> bool {
        self.min_booking_lead_hours >= 0
            && self.max_booking_lead_hours >= self.min_booking_lead_hours
            && self.clinic_opening_hour < self.clinic_closing_hour
            && self.clinic_closing_hour <= 24
            && self.conflict_window_minutes > 0
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} is not a valid integer, using default {}", name, default);
            default
        }),
        Err(_) => default,
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} is not a valid hour, using default {}", name, default);
            default
        }),
        Err(_) => default,
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} is not a valid number of seconds, using default {}", name, default);
            default
        }),
        Err(_) => default,
    }
}
