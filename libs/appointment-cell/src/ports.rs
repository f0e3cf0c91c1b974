// libs/appointment-cell/src/ports.rs
//
// Narrow collaborator interfaces supplied at the composition root. Keeping
// these seams acyclic by construction removes any need for runtime-conditional
// service loading.
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

use crate::models::{
    Appointment, AppointmentPatch, AppointmentQuery, AppointmentRecord, AppointmentStatus,
    ConsultationMode, DoctorProfile, MeetingRef, PaymentRecord,
};

/// Persistence seam for appointments.
///
/// The conflict check and the subsequent write are not performed under one
/// transaction, so two concurrent bookings for the same doctor and window can
/// both pass the check. Implementations MUST close that race themselves, e.g.
/// with a uniqueness constraint over doctor + time bucket + active status, or
/// a serializable/conditional write. This is a correctness requirement under
/// concurrent booking load, not an optimization.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn create(&self, appointment: Appointment) -> Result<Appointment>;
    async fn update(&self, id: Uuid, patch: AppointmentPatch) -> Result<Appointment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<AppointmentRecord>>;
    async fn find_many(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>>;
    async fn count(&self, query: &AppointmentQuery) -> Result<u64>;
    async fn count_by_status(&self, query: &AppointmentQuery)
        -> Result<Vec<(AppointmentStatus, u64)>>;
    async fn count_by_mode(&self, query: &AppointmentQuery)
        -> Result<Vec<(ConsultationMode, u64)>>;
}

/// Read-only doctor directory.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn find_by_id(&self, doctor_id: Uuid) -> Result<Option<DoctorProfile>>;
}

/// Maps authenticated user ids to patient/doctor profile ids and back, for
/// authorization checks and notification routing.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn patient_for_user(&self, user_id: Uuid) -> Result<Option<Uuid>>;
    async fn doctor_for_user(&self, user_id: Uuid) -> Result<Option<Uuid>>;
    async fn user_for_patient(&self, patient_id: Uuid) -> Result<Option<Uuid>>;
    async fn user_for_doctor(&self, doctor_id: Uuid) -> Result<Option<Uuid>>;
}

/// Payment collaborator. A refund marks the payment Refunded with a timestamp
/// and the caller-supplied reason.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn refund(&self, payment_id: Uuid, reason: &str) -> Result<PaymentRecord>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMeetingRequest {
    pub appointment_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
}

/// Provisions online consultation rooms.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MeetingProvider: Send + Sync {
    async fn create_meeting(&self, request: CreateMeetingRequest) -> Result<MeetingRef>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AppointmentRequested,
    AppointmentRejected,
    PaymentRequired,
    AppointmentConfirmed,
    AppointmentCancelled,
    AppointmentRescheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    InApp,
    Email,
    Sms,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: Value,
    pub channels: Vec<NotificationChannel>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<()>;
}

/// Schedules and tears down pre-appointment reminders.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReminderScheduler: Send + Sync {
    async fn schedule_reminders(&self, appointment_id: Uuid) -> Result<()>;
    async fn cancel_reminders(&self, appointment_id: Uuid) -> Result<()>;
}

/// Time source, injected so temporal rules stay testable.
#[cfg_attr(test, automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
