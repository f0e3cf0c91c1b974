// libs/appointment-cell/src/error.rs
use thiserror::Error;

use crate::models::AppointmentStatus;

#[derive(Debug, Error)]
pub enum AppointmentError {
    /// Every violated booking rule, accumulated so one round trip reveals
    /// all problems.
    #[error("Validation failed: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error("Doctor is not available at the requested time")]
    Conflict,

    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("No profile found for the requesting user")]
    ProfileNotFound,

    #[error("{0}")]
    Authorization(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    /// Mutation attempted on an appointment in a terminal state.
    #[error("{0}")]
    TerminalState(String),

    /// Patient cancelling inside the notice window.
    #[error("{0}")]
    TimingPolicy(String),

    #[error("Storage error: {0}")]
    Store(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    /// The cancellation committed but the refund did not go through.
    #[error("Refund failed: {0}")]
    Refund(String),
}

impl AppointmentError {
    pub fn store(err: anyhow::Error) -> Self {
        AppointmentError::Store(err.to_string())
    }

    pub fn external(err: anyhow::Error) -> Self {
        AppointmentError::ExternalService(err.to_string())
    }

    pub fn not_owner() -> Self {
        AppointmentError::Authorization(
            "Not authorized to act on this appointment".to_string(),
        )
    }
}
