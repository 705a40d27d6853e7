//! Persistence interface for the lifecycle services.
//!
//! Services never talk to a storage engine directly. They run a closure inside
//! [`Database::transaction`] and use the per-entity repository traits through the
//! [`Repositories`] handle it receives. Everything written inside one closure is
//! committed together, or not at all when the closure returns an error.
//!
//! Rows that take part in lifecycle transitions carry a `version`. Their `update_*`
//! methods only succeed when the version of the passed row equals the stored one, and
//! store the row with the version incremented.
//!
//! Method names are unique across the traits so they can all be called on one
//! `&mut dyn Repositories`.

pub mod local;

use chrono::{NaiveDate, NaiveTime};

use crate::models::{
    Appointment, AppointmentFilter, ChatMessage, Consultation, ConsultationFilter, Doctor,
    DoctorAvailability, EncounterRef, HomeCareProvider, HomeCareVisit, Notification, Payment,
    ProviderFilter, ProviderRef, Review, VisitFilter,
};
use crate::CoreResult;

pub use local::LocalDatabase;

/// An offset/limit window over an ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    /// A window wide enough for every row.
    pub fn all() -> Self {
        Self {
            offset: 0,
            limit: usize::MAX,
        }
    }
}

pub trait AppointmentRepository {
    /// Stores a new booking; the store assigns `id` and sets `version` to 1.
    fn insert_appointment(&mut self, appointment: Appointment) -> CoreResult<Appointment>;
    fn appointment(&self, id: i64) -> CoreResult<Option<Appointment>>;
    fn update_appointment(&mut self, appointment: Appointment) -> CoreResult<Appointment>;
    fn delete_appointment(&mut self, id: i64) -> CoreResult<bool>;
    /// Ordered by date, then start time.
    fn list_appointments(&self, filter: &AppointmentFilter, page: Page)
        -> CoreResult<Vec<Appointment>>;
    /// Non-cancelled bookings of `provider` overlapping `[start, end)` on `date`.
    fn overlapping_appointments(
        &self,
        provider: ProviderRef,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude_id: Option<i64>,
    ) -> CoreResult<Vec<Appointment>>;
}

pub trait ConsultationRepository {
    fn insert_consultation(&mut self, consultation: Consultation) -> CoreResult<Consultation>;
    fn consultation(&self, id: i64) -> CoreResult<Option<Consultation>>;
    fn update_consultation(&mut self, consultation: Consultation) -> CoreResult<Consultation>;
    /// Ordered by start time, newest first.
    fn list_consultations(
        &self,
        filter: &ConsultationFilter,
        page: Page,
    ) -> CoreResult<Vec<Consultation>>;
    fn consultation_for_appointment(&self, appointment_id: i64)
        -> CoreResult<Option<Consultation>>;
}

pub trait PaymentRepository {
    fn insert_payment(&mut self, payment: Payment) -> CoreResult<Payment>;
    fn payment(&self, id: i64) -> CoreResult<Option<Payment>>;
    fn update_payment(&mut self, payment: Payment) -> CoreResult<Payment>;
    fn payment_for(&self, target: EncounterRef) -> CoreResult<Option<Payment>>;
}

pub trait ReviewRepository {
    fn insert_review(&mut self, review: Review) -> CoreResult<Review>;
    fn review(&self, id: i64) -> CoreResult<Option<Review>>;
    fn update_review(&mut self, review: Review) -> CoreResult<Review>;
    fn delete_review(&mut self, id: i64) -> CoreResult<bool>;
    /// Ordered by creation time, newest first.
    fn list_reviews_for(&self, provider: ProviderRef, page: Page) -> CoreResult<Vec<Review>>;
    fn review_for_encounter(&self, encounter: EncounterRef) -> CoreResult<Option<Review>>;
}

pub trait AvailabilityRepository {
    fn insert_availability(
        &mut self,
        availability: DoctorAvailability,
    ) -> CoreResult<DoctorAvailability>;
    fn availability(&self, id: i64) -> CoreResult<Option<DoctorAvailability>>;
    fn update_availability(
        &mut self,
        availability: DoctorAvailability,
    ) -> CoreResult<DoctorAvailability>;
    fn delete_availability(&mut self, id: i64) -> CoreResult<bool>;
    /// Ordered by day, then start time.
    fn availability_for_doctor(&self, doctor_id: i64) -> CoreResult<Vec<DoctorAvailability>>;
    /// Ordered by doctor, day, then start time.
    fn list_availability(&self, page: Page) -> CoreResult<Vec<DoctorAvailability>>;
}

/// Provider rows are keyed by user id, which the caller supplies.
pub trait ProviderRepository {
    fn insert_doctor(&mut self, doctor: Doctor) -> CoreResult<Doctor>;
    fn doctor(&self, id: i64) -> CoreResult<Option<Doctor>>;
    fn update_doctor(&mut self, doctor: Doctor) -> CoreResult<Doctor>;
    fn list_doctors(&self, filter: &ProviderFilter, page: Page) -> CoreResult<Vec<Doctor>>;
    fn insert_home_care_provider(
        &mut self,
        provider: HomeCareProvider,
    ) -> CoreResult<HomeCareProvider>;
    fn home_care_provider(&self, id: i64) -> CoreResult<Option<HomeCareProvider>>;
    fn update_home_care_provider(
        &mut self,
        provider: HomeCareProvider,
    ) -> CoreResult<HomeCareProvider>;
    fn list_home_care_providers(
        &self,
        filter: &ProviderFilter,
        page: Page,
    ) -> CoreResult<Vec<HomeCareProvider>>;
}

pub trait VisitRepository {
    fn insert_visit(&mut self, visit: HomeCareVisit) -> CoreResult<HomeCareVisit>;
    fn visit(&self, id: i64) -> CoreResult<Option<HomeCareVisit>>;
    fn update_visit(&mut self, visit: HomeCareVisit) -> CoreResult<HomeCareVisit>;
    fn delete_visit(&mut self, id: i64) -> CoreResult<bool>;
    /// Ordered by id, newest first.
    fn list_visits(&self, filter: &VisitFilter, page: Page) -> CoreResult<Vec<HomeCareVisit>>;
    fn visit_for_appointment(&self, appointment_id: i64) -> CoreResult<Option<HomeCareVisit>>;
}

pub trait NotificationRepository {
    fn insert_notification(&mut self, notification: Notification) -> CoreResult<Notification>;
    fn notification(&self, id: i64) -> CoreResult<Option<Notification>>;
    fn update_notification(&mut self, notification: Notification) -> CoreResult<Notification>;
    /// Ordered by creation time, newest first.
    fn notifications_for(&self, user_id: i64, page: Page) -> CoreResult<Vec<Notification>>;
    fn unread_notification_count(&self, user_id: i64) -> CoreResult<usize>;
}

pub trait ChatRepository {
    fn insert_message(&mut self, message: ChatMessage) -> CoreResult<ChatMessage>;
    fn message(&self, id: i64) -> CoreResult<Option<ChatMessage>>;
    fn update_message(&mut self, message: ChatMessage) -> CoreResult<ChatMessage>;
    /// Ordered by send time, newest first.
    fn messages_for(&self, consultation_id: i64, page: Page) -> CoreResult<Vec<ChatMessage>>;
    fn unread_message_count(&self, user_id: i64) -> CoreResult<usize>;
}

/// Every repository, as handed to a transaction closure.
pub trait Repositories:
    AppointmentRepository
    + ConsultationRepository
    + PaymentRepository
    + ReviewRepository
    + AvailabilityRepository
    + ProviderRepository
    + VisitRepository
    + NotificationRepository
    + ChatRepository
{
}

impl<T> Repositories for T where
    T: AppointmentRepository
        + ConsultationRepository
        + PaymentRepository
        + ReviewRepository
        + AvailabilityRepository
        + ProviderRepository
        + VisitRepository
        + NotificationRepository
        + ChatRepository
{
}

/// A transactional store.
pub trait Database: Send + Sync + 'static {
    /// Runs `f` as one transaction.
    ///
    /// # Errors
    ///
    /// Returns the closure's error after rolling back every write it made, or a storage
    /// error if the transaction could not be started or committed.
    fn transaction<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut dyn Repositories) -> CoreResult<T>;
}
