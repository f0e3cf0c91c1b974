// libs/appointment-cell/src/services/side_effects.rs
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppointmentError;
use crate::models::{Appointment, AppointmentStatus, MeetingRef, PaymentRecord};
use crate::ports::{
    CreateMeetingRequest, MeetingProvider, Notification, NotificationChannel, NotificationKind,
    NotificationSender, PaymentGateway, ProfileDirectory, ReminderScheduler,
};

/// Coordinates the work that surrounds a committed transition: notifications,
/// reminder (de)scheduling, meeting provisioning, and refunds.
///
/// Everything here is best-effort - failures are captured, logged, and never
/// surfaced - except `refund`, whose failure the caller must see. Each
/// collaborator call runs under a bounded timeout so a slow collaborator can
/// never stall the primary operation indefinitely.
pub struct SideEffectCoordinator {
    profiles: Arc<dyn ProfileDirectory>,
    payments: Arc<dyn PaymentGateway>,
    meetings: Arc<dyn MeetingProvider>,
    notifier: Arc<dyn NotificationSender>,
    reminders: Arc<dyn ReminderScheduler>,
    call_timeout: Duration,
}

impl SideEffectCoordinator {
    pub fn new(
        profiles: Arc<dyn ProfileDirectory>,
        payments: Arc<dyn PaymentGateway>,
        meetings: Arc<dyn MeetingProvider>,
        notifier: Arc<dyn NotificationSender>,
        reminders: Arc<dyn ReminderScheduler>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            profiles,
            payments,
            meetings,
            notifier,
            reminders,
            call_timeout,
        }
    }

    /// Attempts to provision an online consultation room. Runs before the
    /// transition is persisted; a failure is logged and the transition
    /// proceeds without a meeting.
    pub async fn provision_meeting(&self, appointment: &Appointment) -> Option<MeetingRef> {
        let request = CreateMeetingRequest {
            appointment_id: appointment.id,
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            scheduled_at: appointment.scheduled_at,
        };

        match self
            .bounded(self.meetings.create_meeting(request))
            .await
        {
            Some(Ok(meeting)) => {
                debug!(
                    "Meeting {} provisioned for appointment {}",
                    meeting.id, appointment.id
                );
                Some(meeting)
            }
            Some(Err(e)) => {
                warn!(
                    "Meeting provisioning failed for appointment {}: {}",
                    appointment.id, e
                );
                None
            }
            None => {
                warn!(
                    "Meeting provisioning timed out for appointment {}",
                    appointment.id
                );
                None
            }
        }
    }

    /// Issues a refund through the payment collaborator. The single side
    /// effect whose failure propagates to the caller.
    pub async fn refund(
        &self,
        payment: &PaymentRecord,
        reason: &str,
    ) -> Result<PaymentRecord, AppointmentError> {
        match self.bounded(self.payments.refund(payment.id, reason)).await {
            Some(Ok(refunded)) => Ok(refunded),
            Some(Err(e)) => Err(AppointmentError::Refund(e.to_string())),
            None => Err(AppointmentError::Refund(format!(
                "refund of payment {} timed out",
                payment.id
            ))),
        }
    }

    /// Dispatches the side effects owed after a persisted booking.
    pub async fn after_creation(&self, appointment: &Appointment) {
        let when = format_slot(appointment);
        futures::join!(
            self.notify_doctor(
                appointment,
                NotificationKind::AppointmentRequested,
                "New appointment request",
                format!("A new {} consultation has been requested for {}", appointment.mode, when),
            ),
            self.notify_patient(
                appointment,
                NotificationKind::AppointmentRequested,
                "Appointment request received",
                format!("Your appointment request for {} is awaiting the doctor's acceptance", when),
            ),
        );
    }

    /// Dispatches the side effects owed after a persisted status transition,
    /// keyed by the new status.
    pub async fn after_status_change(&self, appointment: &Appointment) {
        let when = format_slot(appointment);
        match appointment.status {
            AppointmentStatus::Rejected => {
                self.notify_patient(
                    appointment,
                    NotificationKind::AppointmentRejected,
                    "Appointment rejected",
                    format!("Your appointment request for {} was declined by the doctor", when),
                )
                .await;
            }
            AppointmentStatus::PaymentPending => {
                self.notify_patient(
                    appointment,
                    NotificationKind::PaymentRequired,
                    "Payment required",
                    format!(
                        "Your appointment for {} has been accepted - complete the payment to confirm it",
                        when
                    ),
                )
                .await;
            }
            AppointmentStatus::Confirmed => {
                futures::join!(
                    self.notify_patient(
                        appointment,
                        NotificationKind::AppointmentConfirmed,
                        "Appointment confirmed",
                        format!("Your appointment for {} is confirmed", when),
                    ),
                    self.notify_doctor(
                        appointment,
                        NotificationKind::AppointmentConfirmed,
                        "Appointment confirmed",
                        format!("The appointment on {} is confirmed", when),
                    ),
                );
                self.schedule_reminders(appointment.id).await;
            }
            AppointmentStatus::Cancelled => {
                futures::join!(
                    self.notify_patient(
                        appointment,
                        NotificationKind::AppointmentCancelled,
                        "Appointment cancelled",
                        format!("The appointment scheduled for {} has been cancelled", when),
                    ),
                    self.notify_doctor(
                        appointment,
                        NotificationKind::AppointmentCancelled,
                        "Appointment cancelled",
                        format!("The appointment scheduled for {} has been cancelled", when),
                    ),
                );
                self.cancel_reminders(appointment.id).await;
            }
            AppointmentStatus::AwaitingAcceptance | AppointmentStatus::Completed => {}
        }
    }

    /// Dispatches the side effects owed after a persisted reschedule: both
    /// parties learn the new time, and reminders for a confirmed appointment
    /// are rebuilt against it.
    pub async fn after_reschedule(&self, appointment: &Appointment) {
        let when = format_slot(appointment);
        futures::join!(
            self.notify_patient(
                appointment,
                NotificationKind::AppointmentRescheduled,
                "Appointment rescheduled",
                format!("Your appointment has been moved to {}", when),
            ),
            self.notify_doctor(
                appointment,
                NotificationKind::AppointmentRescheduled,
                "Appointment rescheduled",
                format!("The appointment has been moved to {}", when),
            ),
        );

        if appointment.status == AppointmentStatus::Confirmed {
            self.cancel_reminders(appointment.id).await;
            self.schedule_reminders(appointment.id).await;
        }
    }

    async fn schedule_reminders(&self, appointment_id: Uuid) {
        match self
            .bounded(self.reminders.schedule_reminders(appointment_id))
            .await
        {
            Some(Ok(())) => debug!("Reminders scheduled for appointment {}", appointment_id),
            Some(Err(e)) => warn!(
                "Failed to schedule reminders for appointment {}: {}",
                appointment_id, e
            ),
            None => warn!(
                "Reminder scheduling timed out for appointment {}",
                appointment_id
            ),
        }
    }

    async fn cancel_reminders(&self, appointment_id: Uuid) {
        match self
            .bounded(self.reminders.cancel_reminders(appointment_id))
            .await
        {
            Some(Ok(())) => debug!("Reminders cancelled for appointment {}", appointment_id),
            Some(Err(e)) => warn!(
                "Failed to cancel reminders for appointment {}: {}",
                appointment_id, e
            ),
            None => warn!(
                "Reminder cancellation timed out for appointment {}",
                appointment_id
            ),
        }
    }

    async fn notify_patient(
        &self,
        appointment: &Appointment,
        kind: NotificationKind,
        title: &str,
        message: String,
    ) {
        let user = self
            .bounded(self.profiles.user_for_patient(appointment.patient_id))
            .await;
        self.dispatch(user, appointment, kind, title, message).await;
    }

    async fn notify_doctor(
        &self,
        appointment: &Appointment,
        kind: NotificationKind,
        title: &str,
        message: String,
    ) {
        let user = self
            .bounded(self.profiles.user_for_doctor(appointment.doctor_id))
            .await;
        self.dispatch(user, appointment, kind, title, message).await;
    }

    async fn dispatch(
        &self,
        user: Option<anyhow::Result<Option<Uuid>>>,
        appointment: &Appointment,
        kind: NotificationKind,
        title: &str,
        message: String,
    ) {
        let user_id = match user {
            Some(Ok(Some(user_id))) => user_id,
            Some(Ok(None)) => {
                warn!(
                    "No recipient profile for appointment {} notification",
                    appointment.id
                );
                return;
            }
            Some(Err(e)) => {
                warn!(
                    "Recipient lookup failed for appointment {} notification: {}",
                    appointment.id, e
                );
                return;
            }
            None => {
                warn!(
                    "Recipient lookup timed out for appointment {} notification",
                    appointment.id
                );
                return;
            }
        };

        let notification = Notification {
            user_id,
            kind,
            title: title.to_string(),
            message,
            data: json!({
                "appointment_id": appointment.id,
                "scheduled_at": appointment.scheduled_at,
                "status": appointment.status,
            }),
            channels: vec![NotificationChannel::InApp, NotificationChannel::Email],
        };

        match self.bounded(self.notifier.send(notification)).await {
            Some(Ok(())) => {}
            Some(Err(e)) => warn!(
                "Notification send failed for appointment {}: {}",
                appointment.id, e
            ),
            None => warn!(
                "Notification send timed out for appointment {}",
                appointment.id
            ),
        }
    }

    /// Runs a collaborator call under the configured timeout. `None` means
    /// the deadline elapsed.
    async fn bounded<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        tokio::time::timeout(self.call_timeout, fut).await.ok()
    }
}

fn format_slot(appointment: &Appointment) -> String {
    appointment.scheduled_at.format("%Y-%m-%d %H:%M").to_string()
}
