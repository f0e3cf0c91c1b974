// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{PageRequest, SortOrder};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub mode: ConsultationMode,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub meeting: Option<MeetingRef>,
    pub payment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Whether this appointment still occupies the doctor's calendar.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    AwaitingAcceptance,
    Rejected,
    PaymentPending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::AwaitingAcceptance,
        AppointmentStatus::Rejected,
        AppointmentStatus::PaymentPending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    /// Statuses that occupy doctor availability and participate in conflict
    /// detection.
    pub const ACTIVE: [AppointmentStatus; 3] = [
        AppointmentStatus::AwaitingAcceptance,
        AppointmentStatus::PaymentPending,
        AppointmentStatus::Confirmed,
    ];

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::AwaitingAcceptance
                | AppointmentStatus::PaymentPending
                | AppointmentStatus::Confirmed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Rejected
                | AppointmentStatus::Completed
                | AppointmentStatus::Cancelled
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::AwaitingAcceptance => write!(f, "AwaitingAcceptance"),
            AppointmentStatus::Rejected => write!(f, "Rejected"),
            AppointmentStatus::PaymentPending => write!(f, "PaymentPending"),
            AppointmentStatus::Confirmed => write!(f, "Confirmed"),
            AppointmentStatus::Completed => write!(f, "Completed"),
            AppointmentStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationMode {
    Online,
    Physical,
}

impl fmt::Display for ConsultationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsultationMode::Online => write!(f, "online"),
            ConsultationMode::Physical => write!(f, "physical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// Reference to a provisioned online consultation room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRef {
    pub id: String,
    pub join_url: String,
}

// ==============================================================================
// EXTERNAL PROJECTIONS
// ==============================================================================

/// Read-only view of a doctor, owned by the doctor directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub full_name: String,
    pub accepting_new_patients: bool,
    pub license_verified: bool,
    pub consultation_fee: f64,
    pub specializations: Vec<String>,
    pub clinic_name: Option<String>,
    pub clinic_address: Option<String>,
}

/// Read-only view of a payment, owned by the payment collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub amount: f64,
    pub status: PaymentStatus,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_reason: Option<String>,
}

/// An appointment together with the related projections the store can join.
#[derive(Debug, Clone)]
pub struct AppointmentRecord {
    pub appointment: Appointment,
    pub payment: Option<PaymentRecord>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub mode: ConsultationMode,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
    #[serde(default)]
    pub refund_requested: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_scheduled_at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListAppointmentsRequest {
    pub status: Option<AppointmentStatus>,
    pub mode: Option<ConsultationMode>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<SortField>,
    pub order: Option<SortOrder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    ScheduledAt,
    CreatedAt,
    Status,
}

impl Default for SortField {
    fn default() -> Self {
        SortField::ScheduledAt
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ordering {
    pub field: SortField,
    pub direction: SortOrder,
}

// ==============================================================================
// STORE QUERY MODEL
// ==============================================================================

/// Filter handed to the appointment store. Date bounds are inclusive on both
/// ends; `exclude_id` drops one appointment from the match set (used when a
/// reschedule is checked against the doctor's calendar).
#[derive(Debug, Clone, Default)]
pub struct AppointmentQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub statuses: Option<Vec<AppointmentStatus>>,
    pub mode: Option<ConsultationMode>,
    pub scheduled_from: Option<DateTime<Utc>>,
    pub scheduled_to: Option<DateTime<Utc>>,
    pub exclude_id: Option<Uuid>,
    pub order: Ordering,
    pub page: Option<PageRequest>,
}

impl AppointmentQuery {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        if let Some(patient_id) = self.patient_id {
            if appointment.patient_id != patient_id {
                return false;
            }
        }
        if let Some(doctor_id) = self.doctor_id {
            if appointment.doctor_id != doctor_id {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&appointment.status) {
                return false;
            }
        }
        if let Some(mode) = self.mode {
            if appointment.mode != mode {
                return false;
            }
        }
        if let Some(from) = self.scheduled_from {
            if appointment.scheduled_at < from {
                return false;
            }
        }
        if let Some(to) = self.scheduled_to {
            if appointment.scheduled_at > to {
                return false;
            }
        }
        if let Some(excluded) = self.exclude_id {
            if appointment.id == excluded {
                return false;
            }
        }
        true
    }
}

/// Partial update applied by the store in a single write.
#[derive(Debug, Clone)]
pub struct AppointmentPatch {
    pub status: Option<AppointmentStatus>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub meeting: Option<MeetingRef>,
    pub payment_status: Option<PaymentStatus>,
    pub updated_at: DateTime<Utc>,
}

impl AppointmentPatch {
    pub fn at(updated_at: DateTime<Utc>) -> Self {
        Self {
            status: None,
            scheduled_at: None,
            notes: None,
            meeting: None,
            payment_status: None,
            updated_at,
        }
    }
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicting: Vec<Appointment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentStats {
    pub total: u64,
    pub by_status: Vec<(AppointmentStatus, u64)>,
    pub by_mode: Vec<(ConsultationMode, u64)>,
    pub upcoming_active: u64,
    pub completed: u64,
}

// ==============================================================================
// SCHEDULING RULES
// ==============================================================================

/// Temporal booking policy. Defaults carry the clinic's standard rules; a
/// deployment can tighten them through `AppConfig`.
#[derive(Debug, Clone)]
pub struct SchedulingRules {
    pub min_booking_lead_hours: i64,
    pub max_booking_lead_hours: i64,
    pub clinic_opening_hour: u32,
    pub clinic_closing_hour: u32,
    pub conflict_window_minutes: i64,
    pub patient_cancellation_notice_hours: i64,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            min_booking_lead_hours: 24,
            max_booking_lead_hours: 48,
            clinic_opening_hour: 9,
            clinic_closing_hour: 18,
            conflict_window_minutes: 30,
            patient_cancellation_notice_hours: 24,
        }
    }
}

impl From<&AppConfig> for SchedulingRules {
    fn from(config: &AppConfig) -> Self {
        Self {
            min_booking_lead_hours: config.min_booking_lead_hours,
            max_booking_lead_hours: config.max_booking_lead_hours,
            clinic_opening_hour: config.clinic_opening_hour,
            clinic_closing_hour: config.clinic_closing_hour,
            conflict_window_minutes: config.conflict_window_minutes,
            patient_cancellation_notice_hours: config.patient_cancellation_notice_hours,
        }
    }
}
