// Shared fixtures for the integration tests: in-memory collaborator fakes
// wired into the engine the same way a composition root would wire the real
// adapters.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, Once};
use uuid::Uuid;

use shared_models::{Actor, SortOrder};

use appointment_cell::models::{
    Appointment, AppointmentPatch, AppointmentQuery, AppointmentRecord, AppointmentStatus,
    BookAppointmentRequest, ConsultationMode, DoctorProfile, MeetingRef, PaymentRecord,
    PaymentStatus, SchedulingRules, SortField,
};
use appointment_cell::ports::{
    AppointmentStore, Clock, CreateMeetingRequest, DoctorDirectory, MeetingProvider, Notification,
    NotificationKind, NotificationSender, PaymentGateway, ProfileDirectory, ReminderScheduler,
};
use appointment_cell::services::booking::{AppointmentBookingService, Collaborators};

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ==============================================================================
// CLOCK
// ==============================================================================

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ==============================================================================
// APPOINTMENT STORE
// ==============================================================================

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: Mutex<HashMap<Uuid, Appointment>>,
    payments: Mutex<HashMap<Uuid, PaymentRecord>>,
}

impl InMemoryAppointmentStore {
    pub fn insert(&self, appointment: Appointment) {
        self.appointments
            .lock()
            .unwrap()
            .insert(appointment.id, appointment);
    }

    pub fn insert_payment(&self, payment: PaymentRecord) {
        self.payments.lock().unwrap().insert(payment.id, payment);
    }

    pub fn get(&self, id: Uuid) -> Option<Appointment> {
        self.appointments.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.appointments.lock().unwrap().len()
    }

    fn matching(&self, query: &AppointmentQuery) -> Vec<Appointment> {
        self.appointments
            .lock()
            .unwrap()
            .values()
            .filter(|appointment| query.matches(appointment))
            .cloned()
            .collect()
    }
}

fn status_rank(status: AppointmentStatus) -> usize {
    AppointmentStatus::ALL
        .iter()
        .position(|candidate| *candidate == status)
        .unwrap()
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn create(&self, appointment: Appointment) -> Result<Appointment> {
        self.insert(appointment.clone());
        Ok(appointment)
    }

    async fn update(&self, id: Uuid, patch: AppointmentPatch) -> Result<Appointment> {
        let mut appointments = self.appointments.lock().unwrap();
        let appointment = appointments
            .get_mut(&id)
            .ok_or_else(|| anyhow!("appointment {} not found", id))?;

        if let Some(status) = patch.status {
            appointment.status = status;
        }
        if let Some(scheduled_at) = patch.scheduled_at {
            appointment.scheduled_at = scheduled_at;
        }
        if let Some(notes) = patch.notes {
            appointment.notes = Some(notes);
        }
        if let Some(meeting) = patch.meeting {
            appointment.meeting = Some(meeting);
        }
        if let Some(payment_status) = patch.payment_status {
            appointment.payment_status = payment_status;
        }
        appointment.updated_at = patch.updated_at;

        Ok(appointment.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AppointmentRecord>> {
        let appointment = match self.get(id) {
            Some(appointment) => appointment,
            None => return Ok(None),
        };
        let payment = appointment
            .payment_id
            .and_then(|payment_id| self.payments.lock().unwrap().get(&payment_id).cloned());
        Ok(Some(AppointmentRecord {
            appointment,
            payment,
        }))
    }

    async fn find_many(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>> {
        let mut matches = self.matching(query);

        matches.sort_by(|a, b| {
            let ordering = match query.order.field {
                SortField::ScheduledAt => a.scheduled_at.cmp(&b.scheduled_at),
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::Status => status_rank(a.status).cmp(&status_rank(b.status)),
            };
            match query.order.direction {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });

        if let Some(page) = query.page {
            matches = matches
                .into_iter()
                .skip(page.offset())
                .take(page.limit())
                .collect();
        }

        Ok(matches)
    }

    async fn count(&self, query: &AppointmentQuery) -> Result<u64> {
        Ok(self.matching(query).len() as u64)
    }

    async fn count_by_status(
        &self,
        query: &AppointmentQuery,
    ) -> Result<Vec<(AppointmentStatus, u64)>> {
        let mut counts: HashMap<AppointmentStatus, u64> = HashMap::new();
        for appointment in self.matching(query) {
            *counts.entry(appointment.status).or_insert(0) += 1;
        }
        let mut grouped: Vec<(AppointmentStatus, u64)> = counts.into_iter().collect();
        grouped.sort_by_key(|(status, _)| status_rank(*status));
        Ok(grouped)
    }

    async fn count_by_mode(
        &self,
        query: &AppointmentQuery,
    ) -> Result<Vec<(ConsultationMode, u64)>> {
        let mut counts: HashMap<ConsultationMode, u64> = HashMap::new();
        for appointment in self.matching(query) {
            *counts.entry(appointment.mode).or_insert(0) += 1;
        }
        let mut grouped: Vec<(ConsultationMode, u64)> = counts.into_iter().collect();
        grouped.sort_by_key(|(mode, _)| matches!(mode, ConsultationMode::Physical) as usize);
        Ok(grouped)
    }
}

// ==============================================================================
// DIRECTORIES
// ==============================================================================

#[derive(Default)]
pub struct StaticDoctorDirectory {
    doctors: Mutex<HashMap<Uuid, DoctorProfile>>,
}

impl StaticDoctorDirectory {
    pub fn insert(&self, doctor: DoctorProfile) {
        self.doctors.lock().unwrap().insert(doctor.id, doctor);
    }
}

#[async_trait]
impl DoctorDirectory for StaticDoctorDirectory {
    async fn find_by_id(&self, doctor_id: Uuid) -> Result<Option<DoctorProfile>> {
        Ok(self.doctors.lock().unwrap().get(&doctor_id).cloned())
    }
}

/// user id <-> profile id mappings for both parties.
#[derive(Default)]
pub struct StaticProfileDirectory {
    patients: Mutex<HashMap<Uuid, Uuid>>,
    doctors: Mutex<HashMap<Uuid, Uuid>>,
}

impl StaticProfileDirectory {
    pub fn link_patient(&self, user_id: Uuid, patient_id: Uuid) {
        self.patients.lock().unwrap().insert(user_id, patient_id);
    }

    pub fn link_doctor(&self, user_id: Uuid, doctor_id: Uuid) {
        self.doctors.lock().unwrap().insert(user_id, doctor_id);
    }
}

#[async_trait]
impl ProfileDirectory for StaticProfileDirectory {
    async fn patient_for_user(&self, user_id: Uuid) -> Result<Option<Uuid>> {
        Ok(self.patients.lock().unwrap().get(&user_id).copied())
    }

    async fn doctor_for_user(&self, user_id: Uuid) -> Result<Option<Uuid>> {
        Ok(self.doctors.lock().unwrap().get(&user_id).copied())
    }

    async fn user_for_patient(&self, patient_id: Uuid) -> Result<Option<Uuid>> {
        Ok(self
            .patients
            .lock()
            .unwrap()
            .iter()
            .find(|(_, candidate)| **candidate == patient_id)
            .map(|(user_id, _)| *user_id))
    }

    async fn user_for_doctor(&self, doctor_id: Uuid) -> Result<Option<Uuid>> {
        Ok(self
            .doctors
            .lock()
            .unwrap()
            .iter()
            .find(|(_, candidate)| **candidate == doctor_id)
            .map(|(user_id, _)| *user_id))
    }
}

// ==============================================================================
// SIDE-EFFECT COLLABORATORS
// ==============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, user_id: Uuid) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|notification| notification.user_id == user_id)
            .collect()
    }

    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.sent()
            .into_iter()
            .map(|notification| notification.kind)
            .collect()
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn send(&self, notification: Notification) -> Result<()> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingReminders {
    scheduled: Mutex<Vec<Uuid>>,
    cancelled: Mutex<Vec<Uuid>>,
}

impl RecordingReminders {
    pub fn scheduled(&self) -> Vec<Uuid> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<Uuid> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReminderScheduler for RecordingReminders {
    async fn schedule_reminders(&self, appointment_id: Uuid) -> Result<()> {
        self.scheduled.lock().unwrap().push(appointment_id);
        Ok(())
    }

    async fn cancel_reminders(&self, appointment_id: Uuid) -> Result<()> {
        self.cancelled.lock().unwrap().push(appointment_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct StubMeetingProvider {
    fail: AtomicBool,
    requests: Mutex<Vec<CreateMeetingRequest>>,
}

impl StubMeetingProvider {
    pub fn fail_next_calls(&self, fail: bool) {
        self.fail.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn requests(&self) -> Vec<CreateMeetingRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MeetingProvider for StubMeetingProvider {
    async fn create_meeting(&self, request: CreateMeetingRequest) -> Result<MeetingRef> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail.load(AtomicOrdering::SeqCst) {
            return Err(anyhow!("meeting provider unavailable"));
        }
        Ok(MeetingRef {
            id: format!("meet-{}", request.appointment_id),
            join_url: format!("https://meet.example.com/{}", request.appointment_id),
        })
    }
}

#[derive(Default)]
pub struct RecordingPaymentGateway {
    payments: Mutex<HashMap<Uuid, PaymentRecord>>,
    refunds: Mutex<Vec<(Uuid, String)>>,
    fail: AtomicBool,
}

impl RecordingPaymentGateway {
    pub fn insert(&self, payment: PaymentRecord) {
        self.payments.lock().unwrap().insert(payment.id, payment);
    }

    pub fn fail_next_calls(&self, fail: bool) {
        self.fail.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn refunds(&self) -> Vec<(Uuid, String)> {
        self.refunds.lock().unwrap().clone()
    }

    pub fn payment(&self, payment_id: Uuid) -> Option<PaymentRecord> {
        self.payments.lock().unwrap().get(&payment_id).cloned()
    }
}

#[async_trait]
impl PaymentGateway for RecordingPaymentGateway {
    async fn refund(&self, payment_id: Uuid, reason: &str) -> Result<PaymentRecord> {
        if self.fail.load(AtomicOrdering::SeqCst) {
            return Err(anyhow!("payment gateway unavailable"));
        }

        let mut payments = self.payments.lock().unwrap();
        let payment = payments
            .get_mut(&payment_id)
            .ok_or_else(|| anyhow!("payment {} not found", payment_id))?;

        payment.status = PaymentStatus::Refunded;
        payment.refunded_at = Some(Utc::now());
        payment.refund_reason = Some(reason.to_string());
        self.refunds
            .lock()
            .unwrap()
            .push((payment_id, reason.to_string()));

        Ok(payment.clone())
    }
}

// ==============================================================================
// WORLD
// ==============================================================================

/// A fully wired engine over in-memory collaborators, with one eligible
/// doctor and one patient registered. The clock starts on a Monday at 09:00
/// so the default [24h, 48h] window lands on weekdays.
pub struct TestWorld {
    pub store: Arc<InMemoryAppointmentStore>,
    pub doctors: Arc<StaticDoctorDirectory>,
    pub profiles: Arc<StaticProfileDirectory>,
    pub payments: Arc<RecordingPaymentGateway>,
    pub meetings: Arc<StubMeetingProvider>,
    pub notifier: Arc<RecordingNotifier>,
    pub reminders: Arc<RecordingReminders>,
    pub clock: Arc<FixedClock>,
    pub service: AppointmentBookingService,
    pub patient_user: Uuid,
    pub patient_id: Uuid,
    pub doctor_user: Uuid,
    pub doctor_id: Uuid,
}

pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
}

pub fn eligible_doctor(id: Uuid) -> DoctorProfile {
    DoctorProfile {
        id,
        full_name: "Dr. Amara Okafor".to_string(),
        accepting_new_patients: true,
        license_verified: true,
        consultation_fee: 150.0,
        specializations: vec!["General Practice".to_string()],
        clinic_name: Some("Riverside Clinic".to_string()),
        clinic_address: Some("12 Riverside Way".to_string()),
    }
}

impl TestWorld {
    pub fn new() -> Self {
        init_tracing();

        let store = Arc::new(InMemoryAppointmentStore::default());
        let doctors = Arc::new(StaticDoctorDirectory::default());
        let profiles = Arc::new(StaticProfileDirectory::default());
        let payments = Arc::new(RecordingPaymentGateway::default());
        let meetings = Arc::new(StubMeetingProvider::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let reminders = Arc::new(RecordingReminders::default());
        let clock = Arc::new(FixedClock::new(monday_morning()));

        let patient_user = Uuid::new_v4();
        let patient_id = Uuid::new_v4();
        let doctor_user = Uuid::new_v4();
        let doctor_id = Uuid::new_v4();

        doctors.insert(eligible_doctor(doctor_id));
        profiles.link_patient(patient_user, patient_id);
        profiles.link_doctor(doctor_user, doctor_id);

        let collaborators = Collaborators {
            store: store.clone(),
            doctors: doctors.clone(),
            profiles: profiles.clone(),
            payments: payments.clone(),
            meetings: meetings.clone(),
            notifier: notifier.clone(),
            reminders: reminders.clone(),
            clock: clock.clone(),
        };
        let service = AppointmentBookingService::with_timeout(
            collaborators,
            SchedulingRules::default(),
            std::time::Duration::from_secs(1),
        );

        Self {
            store,
            doctors,
            profiles,
            payments,
            meetings,
            notifier,
            reminders,
            clock,
            service,
            patient_user,
            patient_id,
            doctor_user,
            doctor_id,
        }
    }

    pub fn patient_actor(&self) -> Actor {
        Actor::patient(self.patient_user)
    }

    pub fn doctor_actor(&self) -> Actor {
        Actor::doctor(self.doctor_user)
    }

    pub fn admin_actor(&self) -> Actor {
        Actor::admin(Uuid::new_v4())
    }

    /// Registers a second doctor with a profile mapping and returns
    /// (user id, doctor id).
    pub fn register_other_doctor(&self) -> (Uuid, Uuid) {
        let user_id = Uuid::new_v4();
        let doctor_id = Uuid::new_v4();
        let mut profile = eligible_doctor(doctor_id);
        profile.full_name = "Dr. Lena Vasquez".to_string();
        self.doctors.insert(profile);
        self.profiles.link_doctor(user_id, doctor_id);
        (user_id, doctor_id)
    }

    /// Registers a second patient and returns (user id, patient id).
    pub fn register_other_patient(&self) -> (Uuid, Uuid) {
        let user_id = Uuid::new_v4();
        let patient_id = Uuid::new_v4();
        self.profiles.link_patient(user_id, patient_id);
        (user_id, patient_id)
    }

    pub fn book_request(&self, hours_ahead: i64) -> BookAppointmentRequest {
        BookAppointmentRequest {
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            scheduled_at: self.clock.now() + Duration::hours(hours_ahead),
            mode: ConsultationMode::Online,
            notes: None,
        }
    }

    /// Inserts an appointment directly, bypassing the engine.
    pub fn seed_appointment(
        &self,
        status: AppointmentStatus,
        scheduled_at: DateTime<Utc>,
    ) -> Appointment {
        let now = self.clock.now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            scheduled_at,
            mode: ConsultationMode::Online,
            status,
            payment_status: PaymentStatus::Pending,
            notes: None,
            meeting: None,
            payment_id: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(appointment.clone());
        appointment
    }

    /// Inserts an appointment with an attached payment, registered with both
    /// the store projection and the payment gateway.
    pub fn seed_with_payment(
        &self,
        status: AppointmentStatus,
        scheduled_at: DateTime<Utc>,
        amount: f64,
        payment_status: PaymentStatus,
    ) -> (Appointment, PaymentRecord) {
        let mut appointment = self.seed_appointment(status, scheduled_at);
        let payment = PaymentRecord {
            id: Uuid::new_v4(),
            amount,
            status: payment_status,
            refunded_at: None,
            refund_reason: None,
        };

        appointment.payment_id = Some(payment.id);
        appointment.payment_status = payment_status;
        self.store.insert(appointment.clone());
        self.store.insert_payment(payment.clone());
        self.payments.insert(payment.clone());

        (appointment, payment)
    }
}
