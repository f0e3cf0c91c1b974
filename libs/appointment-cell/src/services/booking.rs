// libs/appointment-cell/src/services/booking.rs
use chrono::Duration;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::{Actor, ActorRole, PageRequest};

use crate::error::AppointmentError;
use crate::models::{
    Appointment, AppointmentPatch, AppointmentQuery, AppointmentRecord, AppointmentStats,
    AppointmentStatus, BookAppointmentRequest, CancelAppointmentRequest, ConsultationMode,
    ListAppointmentsRequest, Ordering, PaymentStatus, RescheduleAppointmentRequest,
    SchedulingRules,
};
use crate::ports::{
    AppointmentStore, Clock, DoctorDirectory, MeetingProvider, NotificationSender, PaymentGateway,
    ProfileDirectory, ReminderScheduler,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::side_effects::SideEffectCoordinator;
use crate::services::validation::BookingValidationService;

/// Collaborator bundle assembled once at the composition root and injected
/// into the engine. Every seam is a trait object, so the dependency graph is
/// acyclic by construction.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn AppointmentStore>,
    pub doctors: Arc<dyn DoctorDirectory>,
    pub profiles: Arc<dyn ProfileDirectory>,
    pub payments: Arc<dyn PaymentGateway>,
    pub meetings: Arc<dyn MeetingProvider>,
    pub notifier: Arc<dyn NotificationSender>,
    pub reminders: Arc<dyn ReminderScheduler>,
    pub clock: Arc<dyn Clock>,
}

/// Facade over the appointment lifecycle: booking, status transitions,
/// cancellation, rescheduling, and the role-scoped read operations.
///
/// Ordering within one call is fixed: validation and conflict detection
/// strictly precede the persistence write, and side effects strictly follow
/// it. Best-effort side effects never undo a committed write; only a refund
/// failure during cancellation surfaces after the commit.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    profiles: Arc<dyn ProfileDirectory>,
    clock: Arc<dyn Clock>,
    rules: SchedulingRules,
    validation: BookingValidationService,
    conflicts: ConflictDetectionService,
    lifecycle: AppointmentLifecycleService,
    effects: SideEffectCoordinator,
}

impl AppointmentBookingService {
    pub fn new(collaborators: Collaborators, rules: SchedulingRules) -> Self {
        Self::with_timeout(collaborators, rules, StdDuration::from_secs(5))
    }

    pub fn with_timeout(
        collaborators: Collaborators,
        rules: SchedulingRules,
        collaborator_timeout: StdDuration,
    ) -> Self {
        let validation = BookingValidationService::new(
            Arc::clone(&collaborators.doctors),
            Arc::clone(&collaborators.clock),
            rules.clone(),
        );
        let conflicts = ConflictDetectionService::new(
            Arc::clone(&collaborators.store),
            rules.conflict_window_minutes,
        );
        let effects = SideEffectCoordinator::new(
            Arc::clone(&collaborators.profiles),
            Arc::clone(&collaborators.payments),
            Arc::clone(&collaborators.meetings),
            Arc::clone(&collaborators.notifier),
            Arc::clone(&collaborators.reminders),
            collaborator_timeout,
        );

        Self {
            store: collaborators.store,
            profiles: collaborators.profiles,
            clock: collaborators.clock,
            rules,
            validation,
            conflicts,
            lifecycle: AppointmentLifecycleService::new(),
            effects,
        }
    }

    // ==========================================================================
    // WRITE OPERATIONS
    // ==========================================================================

    /// Books a new appointment. The appointment starts in AwaitingAcceptance
    /// with payment Pending; nothing is written when validation or conflict
    /// detection fails.
    pub async fn create(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment for patient {} with doctor {}",
            request.patient_id, request.doctor_id
        );

        let outcome = self
            .validation
            .validate(request.doctor_id, request.scheduled_at)
            .await?;
        if !outcome.is_valid {
            return Err(AppointmentError::Validation {
                errors: outcome.errors,
            });
        }

        let conflict = self
            .conflicts
            .detect(request.doctor_id, request.scheduled_at, None)
            .await?;
        if conflict.has_conflict {
            return Err(AppointmentError::Conflict);
        }

        let now = self.clock.now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            scheduled_at: request.scheduled_at,
            mode: request.mode,
            status: AppointmentStatus::AwaitingAcceptance,
            payment_status: PaymentStatus::Pending,
            notes: request.notes,
            meeting: None,
            payment_id: None,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .store
            .create(appointment)
            .await
            .map_err(AppointmentError::store)?;

        self.effects.after_creation(&created).await;

        info!("Appointment {} booked successfully", created.id);
        Ok(created)
    }

    /// Applies a role-gated status transition. An online confirmation
    /// provisions the meeting before the write; the transition proceeds even
    /// when provisioning fails.
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        debug!(
            "Updating appointment {} to {} as {}",
            appointment_id, new_status, actor.role
        );

        let record = self.load(appointment_id).await?;
        let appointment = record.appointment;

        self.authorize(actor, &appointment).await?;
        self.lifecycle
            .validate_transition(appointment.status, new_status, actor.role)?;

        let mut patch = AppointmentPatch::at(self.clock.now());
        patch.status = Some(new_status);

        if new_status == AppointmentStatus::Confirmed
            && appointment.mode == ConsultationMode::Online
            && appointment.meeting.is_none()
        {
            patch.meeting = self.effects.provision_meeting(&appointment).await;
        }

        let updated = self
            .store
            .update(appointment_id, patch)
            .await
            .map_err(AppointmentError::store)?;

        self.effects.after_status_change(&updated).await;

        info!(
            "Appointment {} moved to {} by {}",
            appointment_id, new_status, actor.role
        );
        Ok(updated)
    }

    /// Cancels an appointment and, when explicitly requested against a
    /// completed payment, refunds it. The refund is the one side effect whose
    /// failure the caller sees, even though the cancellation has already
    /// committed by then.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
        request: CancelAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment {} as {}", appointment_id, actor.role);

        let record = self.load(appointment_id).await?;
        let appointment = record.appointment;

        self.authorize(actor, &appointment).await?;

        match appointment.status {
            AppointmentStatus::Completed => {
                return Err(AppointmentError::TerminalState(
                    "cannot cancel a completed appointment".to_string(),
                ));
            }
            AppointmentStatus::Cancelled => {
                return Err(AppointmentError::TerminalState(
                    "already cancelled".to_string(),
                ));
            }
            _ => {}
        }

        let now = self.clock.now();
        if actor.role == ActorRole::Patient {
            let notice = Duration::hours(self.rules.patient_cancellation_notice_hours);
            if appointment.scheduled_at - now < notice {
                return Err(AppointmentError::TimingPolicy(format!(
                    "Appointments can only be cancelled at least {} hours in advance",
                    self.rules.patient_cancellation_notice_hours
                )));
            }
        }

        let mut patch = AppointmentPatch::at(now);
        patch.status = Some(AppointmentStatus::Cancelled);
        patch.notes = Some(format!("Cancelled: {}", request.reason));

        let cancelled = self
            .store
            .update(appointment_id, patch)
            .await
            .map_err(AppointmentError::store)?;

        self.effects.after_status_change(&cancelled).await;

        let cancelled = match record.payment {
            Some(payment)
                if request.refund_requested && payment.status == PaymentStatus::Completed =>
            {
                let refunded = self.effects.refund(&payment, &request.reason).await?;
                info!(
                    "Payment {} refunded for cancelled appointment {}",
                    refunded.id, appointment_id
                );

                let mut payment_patch = AppointmentPatch::at(self.clock.now());
                payment_patch.payment_status = Some(PaymentStatus::Refunded);
                self.store
                    .update(appointment_id, payment_patch)
                    .await
                    .map_err(AppointmentError::store)?
            }
            _ => cancelled,
        };

        info!("Appointment {} cancelled", appointment_id);
        Ok(cancelled)
    }

    /// Moves an appointment to a new instant. The full booking validation and
    /// conflict detection re-run against the new instant, the appointment's
    /// own slot excluded; the status is left untouched.
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!(
            "Rescheduling appointment {} to {} as {}",
            appointment_id, request.new_scheduled_at, actor.role
        );

        let record = self.load(appointment_id).await?;
        let appointment = record.appointment;

        self.authorize(actor, &appointment).await?;

        match appointment.status {
            AppointmentStatus::Completed => {
                return Err(AppointmentError::TerminalState(
                    "cannot reschedule a completed appointment".to_string(),
                ));
            }
            AppointmentStatus::Cancelled => {
                return Err(AppointmentError::TerminalState(
                    "cannot reschedule a cancelled appointment".to_string(),
                ));
            }
            _ => {}
        }

        let outcome = self
            .validation
            .validate(appointment.doctor_id, request.new_scheduled_at)
            .await?;
        if !outcome.is_valid {
            return Err(AppointmentError::Validation {
                errors: outcome.errors,
            });
        }

        let conflict = self
            .conflicts
            .detect(
                appointment.doctor_id,
                request.new_scheduled_at,
                Some(appointment_id),
            )
            .await?;
        if conflict.has_conflict {
            warn!(
                "Reschedule of appointment {} conflicts with {} existing appointments",
                appointment_id,
                conflict.conflicting.len()
            );
            return Err(AppointmentError::Conflict);
        }

        let mut patch = AppointmentPatch::at(self.clock.now());
        patch.scheduled_at = Some(request.new_scheduled_at);
        patch.notes = request
            .reason
            .as_ref()
            .map(|reason| format!("Rescheduled: {}", reason));

        let updated = self
            .store
            .update(appointment_id, patch)
            .await
            .map_err(AppointmentError::store)?;

        self.effects.after_reschedule(&updated).await;

        info!(
            "Appointment {} rescheduled to {}",
            appointment_id, request.new_scheduled_at
        );
        Ok(updated)
    }

    // ==========================================================================
    // READ OPERATIONS
    // ==========================================================================

    pub async fn get_by_id(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
    ) -> Result<Appointment, AppointmentError> {
        let record = self.load(appointment_id).await?;
        self.authorize(actor, &record.appointment).await?;
        Ok(record.appointment)
    }

    /// Lists appointments visible to the actor: patients and doctors see
    /// their own, an administrator sees everything.
    pub async fn list(
        &self,
        actor: &Actor,
        request: ListAppointmentsRequest,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let query = self.scoped_query(actor, &request).await?;
        self.store
            .find_many(&query)
            .await
            .map_err(AppointmentError::store)
    }

    /// Role-scoped aggregate counts.
    pub async fn stats(
        &self,
        actor: &Actor,
        request: ListAppointmentsRequest,
    ) -> Result<AppointmentStats, AppointmentError> {
        let mut query = self.scoped_query(actor, &request).await?;
        query.page = None;

        let total = self
            .store
            .count(&query)
            .await
            .map_err(AppointmentError::store)?;
        let by_status = self
            .store
            .count_by_status(&query)
            .await
            .map_err(AppointmentError::store)?;
        let by_mode = self
            .store
            .count_by_mode(&query)
            .await
            .map_err(AppointmentError::store)?;

        let mut upcoming_query = query.clone();
        upcoming_query.statuses = Some(AppointmentStatus::ACTIVE.to_vec());
        upcoming_query.scheduled_from = Some(self.clock.now());
        let upcoming_active = self
            .store
            .count(&upcoming_query)
            .await
            .map_err(AppointmentError::store)?;

        let completed = by_status
            .iter()
            .find(|(status, _)| *status == AppointmentStatus::Completed)
            .map(|(_, count)| *count)
            .unwrap_or(0);

        Ok(AppointmentStats {
            total,
            by_status,
            by_mode,
            upcoming_active,
            completed,
        })
    }

    // ==========================================================================
    // PRIVATE HELPERS
    // ==========================================================================

    async fn load(&self, appointment_id: Uuid) -> Result<AppointmentRecord, AppointmentError> {
        self.store
            .find_by_id(appointment_id)
            .await
            .map_err(AppointmentError::store)?
            .ok_or(AppointmentError::NotFound)
    }

    /// Ownership check: doctors must own the appointment's doctor identity,
    /// patients the patient identity; administrators pass unconditionally.
    async fn authorize(
        &self,
        actor: &Actor,
        appointment: &Appointment,
    ) -> Result<(), AppointmentError> {
        match actor.role {
            ActorRole::Admin => Ok(()),
            ActorRole::Doctor => {
                let doctor_id = self
                    .profiles
                    .doctor_for_user(actor.user_id)
                    .await
                    .map_err(AppointmentError::external)?
                    .ok_or(AppointmentError::ProfileNotFound)?;
                if doctor_id == appointment.doctor_id {
                    Ok(())
                } else {
                    Err(AppointmentError::not_owner())
                }
            }
            ActorRole::Patient => {
                let patient_id = self
                    .profiles
                    .patient_for_user(actor.user_id)
                    .await
                    .map_err(AppointmentError::external)?
                    .ok_or(AppointmentError::ProfileNotFound)?;
                if patient_id == appointment.patient_id {
                    Ok(())
                } else {
                    Err(AppointmentError::not_owner())
                }
            }
        }
    }

    /// Builds the store query for a list/stats call, with the actor's role
    /// deciding the mandatory scope and the request supplying the rest.
    async fn scoped_query(
        &self,
        actor: &Actor,
        request: &ListAppointmentsRequest,
    ) -> Result<AppointmentQuery, AppointmentError> {
        let (patient_scope, doctor_scope) = match actor.role {
            ActorRole::Admin => (request.patient_id, request.doctor_id),
            ActorRole::Patient => {
                let own = self
                    .profiles
                    .patient_for_user(actor.user_id)
                    .await
                    .map_err(AppointmentError::external)?
                    .ok_or(AppointmentError::ProfileNotFound)?;
                (Some(own), request.doctor_id)
            }
            ActorRole::Doctor => {
                let own = self
                    .profiles
                    .doctor_for_user(actor.user_id)
                    .await
                    .map_err(AppointmentError::external)?
                    .ok_or(AppointmentError::ProfileNotFound)?;
                (request.patient_id, Some(own))
            }
        };

        Ok(AppointmentQuery {
            patient_id: patient_scope,
            doctor_id: doctor_scope,
            statuses: request.status.map(|status| vec![status]),
            mode: request.mode,
            scheduled_from: request.from_date,
            scheduled_to: request.to_date,
            exclude_id: None,
            order: Ordering {
                field: request.sort_by.unwrap_or_default(),
                direction: request.order.unwrap_or_default(),
            },
            page: Some(PageRequest::new(
                request.page.unwrap_or(shared_models::page::DEFAULT_PAGE),
                request.limit.unwrap_or(shared_models::page::DEFAULT_PAGE_SIZE),
            )),
        })
    }
}
