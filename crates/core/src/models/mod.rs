//! Domain records handled by the lifecycle services.
//!
//! Stored records (`Appointment`, `Payment`, ...) only ever hold validated values.
//! Input records (`NewAppointment`, `NewPayment`, ...) carry raw request values and
//! are checked by the owning service before anything is written.

pub mod appointment;
pub mod availability;
pub mod chat;
pub mod consultation;
pub mod home_care_visit;
pub mod notification;
pub mod payment;
pub mod provider;
pub mod review;

pub use appointment::{
    Appointment, AppointmentFilter, AppointmentStatus, AppointmentUpdate, NewAppointment,
    ProviderRef, ProviderType,
};
pub use availability::{AvailabilityUpdate, DoctorAvailability, NewAvailability};
pub use chat::{ChatMessage, NewChatMessage};
pub use consultation::{
    CompleteConsultation, Consultation, ConsultationFilter, ConsultationStatus, NewConsultation,
};
pub use home_care_visit::{
    CompleteVisit, HomeCareVisit, HomeCareVisitUpdate, NewHomeCareVisit, VisitFilter, VisitStatus,
};
pub use notification::{Notification, NotificationKind};
pub use payment::{EncounterRef, NewPayment, Payment, PaymentStatus};
pub use provider::{
    Doctor, HomeCareProvider, NewDoctor, NewHomeCareProvider, ProviderFilter, ProviderStatus,
    ProviderStatusUpdate,
};
pub use review::{NewReview, RatingSummary, Review, ReviewUpdate};

/// Returns an error unless `id` identifies a row (ids start at 1).
pub(crate) fn require_id(field: &str, id: i64) -> crate::CoreResult<()> {
    if id <= 0 {
        return Err(crate::CoreError::Validation(format!("{field} is required")));
    }
    Ok(())
}
